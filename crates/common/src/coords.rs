//! Coordinate systems: world space (floats), block space (integers), chunk
//! lattice and chunk-local space.
//!
//! All decompositions floor toward negative infinity; truncation would fold
//! the chunks at -1 and 0 onto each other.

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Edge length of a chunk in voxels.
pub const CHUNK_SIZE: i32 = 32;
/// Voxels per chunk.
pub const CHUNK_VOLUME: usize = (CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE) as usize;

const CHUNK_SIZE_F: f32 = CHUNK_SIZE as f32;

/// Integer position of a chunk in the infinite lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chunk containing the integer block position.
    pub fn of_block(block: IVec3) -> Self {
        Self {
            x: block.x.div_euclid(CHUNK_SIZE),
            y: block.y.div_euclid(CHUNK_SIZE),
            z: block.z.div_euclid(CHUNK_SIZE),
        }
    }

    /// Block position of this chunk's minimum corner.
    pub fn origin(self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z) * CHUNK_SIZE
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Largest per-axis distance to `other`, in chunks.
    pub fn chebyshev_distance(self, other: ChunkCoord) -> i32 {
        (self.x - other.x)
            .abs()
            .max((self.y - other.y).abs())
            .max((self.z - other.z).abs())
    }

    /// Every chunk within Chebyshev `radius` of `self`, x-major.
    pub fn neighborhood(self, radius: i32) -> impl Iterator<Item = ChunkCoord> {
        let r = radius.max(0);
        (-r..=r).flat_map(move |dx| {
            (-r..=r).flat_map(move |dy| (-r..=r).map(move |dz| self.offset(dx, dy, dz)))
        })
    }

    pub fn key(self) -> ChunkKey {
        ChunkKey(self)
    }
}

/// Canonical `"x,y,z"` encoding.
impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid chunk key {0:?}: expected \"x,y,z\" integers")]
pub struct ParseCoordError(pub String);

impl FromStr for ChunkCoord {
    type Err = ParseCoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseCoordError(s.to_owned());
        let mut parts = s.split(',');
        let mut next = || -> Result<i32, ParseCoordError> {
            parts.next().ok_or_else(err)?.parse().map_err(|_| err())
        };
        let coord = ChunkCoord::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(coord)
    }
}

/// A chunk coordinate serialized as its canonical string, for use as a map
/// key in JSON and CBOR documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ChunkKey(pub ChunkCoord);

impl From<ChunkKey> for String {
    fn from(key: ChunkKey) -> Self {
        key.0.to_string()
    }
}

impl TryFrom<String> for ChunkKey {
    type Error = ParseCoordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse().map(ChunkKey)
    }
}

impl From<ChunkCoord> for ChunkKey {
    fn from(coord: ChunkCoord) -> Self {
        ChunkKey(coord)
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Position inside a chunk. Valid when every axis is in `[0, CHUNK_SIZE)`;
/// other values are representable so callers can be bounds-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl LocalCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn of_block(block: IVec3) -> Self {
        Self {
            x: block.x.rem_euclid(CHUNK_SIZE),
            y: block.y.rem_euclid(CHUNK_SIZE),
            z: block.z.rem_euclid(CHUNK_SIZE),
        }
    }

    pub fn in_bounds(self) -> bool {
        let ok = |v: i32| (0..CHUNK_SIZE).contains(&v);
        ok(self.x) && ok(self.y) && ok(self.z)
    }

    /// Flat index `y·S² + z·S + x`, or `None` when out of bounds.
    pub fn index(self) -> Option<usize> {
        self.in_bounds().then(|| {
            (self.y * CHUNK_SIZE * CHUNK_SIZE + self.z * CHUNK_SIZE + self.x) as usize
        })
    }
}

fn split_axis(v: f32) -> (i32, f32) {
    let mut local = v.rem_euclid(CHUNK_SIZE_F);
    // rem_euclid may round up to the divisor for tiny negative inputs.
    if local >= CHUNK_SIZE_F {
        local = 0.0;
    }
    let chunk = ((v - local) / CHUNK_SIZE_F).round() as i32;
    (chunk, local)
}

/// Chunk containing the world position.
pub fn world_to_chunk(pos: Vec3) -> ChunkCoord {
    ChunkCoord::new(split_axis(pos.x).0, split_axis(pos.y).0, split_axis(pos.z).0)
}

/// Offset of the world position inside its chunk; every axis is in
/// `[0, CHUNK_SIZE)`.
pub fn world_to_local(pos: Vec3) -> Vec3 {
    Vec3::new(split_axis(pos.x).1, split_axis(pos.y).1, split_axis(pos.z).1)
}

/// Integer block containing the world position.
pub fn block_of(pos: Vec3) -> IVec3 {
    pos.floor().as_ivec3()
}

/// Axis-aligned box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center(center: Vec3, extents: Vec3) -> Self {
        let half = extents * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Inclusive range of blocks whose unit cells overlap the box interior.
    /// A face lying exactly on a block boundary does not touch that block.
    pub fn block_range(&self) -> (IVec3, IVec3) {
        let lo = self.min.floor().as_ivec3();
        let hi = self.max.ceil().as_ivec3() - IVec3::ONE;
        (lo, hi.max(lo))
    }
}
