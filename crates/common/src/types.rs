use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a non-player entity in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Player identifier. Clients may choose their own on join, so this is a
/// free-form string rather than a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// A fresh random id for clients that did not ask for one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to a connection owned by the protocol layer.
///
/// The simulator only stores it; it never resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Kinematic state shared by entities and players.
///
/// `rotation` holds Euler angles in radians. `bounds` is the full extent of
/// the axis-aligned box centered on `position`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    #[serde(with = "crate::xyz")]
    pub position: Vec3,
    #[serde(with = "crate::xyz")]
    pub rotation: Vec3,
    #[serde(with = "crate::xyz")]
    pub velocity: Vec3,
    #[serde(with = "crate::xyz")]
    pub bounds: Vec3,
}

impl Body {
    /// Player hitbox extents.
    pub const PLAYER_BOUNDS: Vec3 = Vec3::new(0.6, 1.8, 0.6);

    pub fn at(position: Vec3, bounds: Vec3) -> Self {
        Self {
            position,
            bounds,
            ..Self::default()
        }
    }

    /// Bounding box this body would occupy at `position`.
    pub fn aabb_at(&self, position: Vec3) -> crate::Aabb {
        crate::Aabb::from_center(position, self.bounds)
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.rotation.is_finite()
            && self.velocity.is_finite()
            && self.bounds.is_finite()
    }
}

impl Default for Body {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            velocity: Vec3::ZERO,
            bounds: Vec3::ONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_uniqueness() {
        let a = EntityId::new();
        let b = EntityId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn generated_player_ids_differ() {
        assert_ne!(PlayerId::generate(), PlayerId::generate());
    }

    #[test]
    fn body_default_is_unit_box_at_rest() {
        let b = Body::default();
        assert_eq!(b.position, Vec3::ZERO);
        assert_eq!(b.velocity, Vec3::ZERO);
        assert_eq!(b.bounds, Vec3::ONE);
    }

    #[test]
    fn body_serializes_vectors_as_objects() {
        let body = Body::at(Vec3::new(1.0, 2.0, 3.0), Body::PLAYER_BOUNDS);
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["position"]["y"], 2.0);
        assert_eq!(json["bounds"]["x"].as_f64().unwrap() as f32, 0.6);
    }

    #[test]
    fn non_finite_body_is_detected() {
        let mut b = Body::default();
        assert!(b.is_finite());
        b.velocity.y = f32::NAN;
        assert!(!b.is_finite());
    }
}
