//! Serde adapter that writes `glam::Vec3` as an `{x, y, z}` object.
//!
//! glam's own serde support uses a 3-element array; clients speak objects.
//! Use with `#[serde(with = "voxelspace_common::xyz")]`.

use glam::Vec3;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Serialize, Deserialize)]
struct Xyz {
    x: f32,
    y: f32,
    z: f32,
}

pub fn serialize<S: Serializer>(v: &Vec3, serializer: S) -> Result<S::Ok, S::Error> {
    Xyz {
        x: v.x,
        y: v.y,
        z: v.z,
    }
    .serialize(serializer)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec3, D::Error> {
    let Xyz { x, y, z } = Xyz::deserialize(deserializer)?;
    Ok(Vec3::new(x, y, z))
}
