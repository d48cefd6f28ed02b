//! Block type ids.

/// A single voxel: an 8-bit block-type id. 0 is air.
pub type Voxel = u8;

pub const AIR: Voxel = 0;
pub const DIRT: Voxel = 1;
pub const STONE: Voxel = 2;
pub const SAND: Voxel = 3;
pub const CONCRETE: Voxel = 4;
pub const GRASS: Voxel = 5;
pub const METAL_WALL: Voxel = 6;
pub const GLASS: Voxel = 7;
pub const NEON: Voxel = 8;

/// Highest block id with a defined material.
pub const MAX_KNOWN: Voxel = NEON;

/// Whether `voxel` names a defined material (air included).
pub fn is_known(voxel: Voxel) -> bool {
    voxel <= MAX_KNOWN
}

pub fn name(voxel: Voxel) -> Option<&'static str> {
    Some(match voxel {
        AIR => "air",
        DIRT => "dirt",
        STONE => "stone",
        SAND => "sand",
        CONCRETE => "concrete",
        GRASS => "grass",
        METAL_WALL => "metal_wall",
        GLASS => "glass",
        NEON => "neon",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_id_has_a_name() {
        for v in 0..=MAX_KNOWN {
            assert!(name(v).is_some(), "missing name for {v}");
        }
        assert!(name(MAX_KNOWN + 1).is_none());
        assert!(!is_known(200));
    }
}
