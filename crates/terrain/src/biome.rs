use serde::{Deserialize, Serialize};
use voxelspace_common::Voxel;
use voxelspace_common::block::{CONCRETE, DIRT, GRASS, SAND};

/// Horizontal region class; selects height scale and surface materials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    Desert,
    Plains,
    Mountains,
    Cybercity,
}

impl Biome {
    pub const ALL: [Biome; 4] = [
        Biome::Desert,
        Biome::Plains,
        Biome::Mountains,
        Biome::Cybercity,
    ];

    /// Band a large-scale noise sample into one of four biomes.
    pub fn from_noise(value: f64) -> Self {
        if value < -0.5 {
            Biome::Desert
        } else if value < 0.0 {
            Biome::Plains
        } else if value < 0.5 {
            Biome::Mountains
        } else {
            Biome::Cybercity
        }
    }

    /// Multiplier applied to the terrain height amplitude.
    pub fn height_scale(self) -> f64 {
        match self {
            Biome::Plains => 0.3,
            Biome::Mountains => 1.0,
            Biome::Desert => 0.2,
            Biome::Cybercity => 0.5,
        }
    }

    /// Material for the top voxel of a column.
    pub fn surface(self) -> Voxel {
        match self {
            Biome::Desert => SAND,
            Biome::Cybercity => CONCRETE,
            Biome::Plains | Biome::Mountains => GRASS,
        }
    }

    /// Material for the four voxels beneath the surface.
    pub fn subsurface(self) -> Voxel {
        match self {
            Biome::Desert => SAND,
            Biome::Cybercity => CONCRETE,
            Biome::Plains | Biome::Mountains => DIRT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Biome::Desert => "desert",
            Biome::Plains => "plains",
            Biome::Mountains => "mountains",
            Biome::Cybercity => "cybercity",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_are_ordered() {
        assert_eq!(Biome::from_noise(-0.9), Biome::Desert);
        assert_eq!(Biome::from_noise(-0.51), Biome::Desert);
        assert_eq!(Biome::from_noise(-0.5), Biome::Plains);
        assert_eq!(Biome::from_noise(-0.01), Biome::Plains);
        assert_eq!(Biome::from_noise(0.0), Biome::Mountains);
        assert_eq!(Biome::from_noise(0.49), Biome::Mountains);
        assert_eq!(Biome::from_noise(0.5), Biome::Cybercity);
    }

    #[test]
    fn grassy_biomes_share_materials() {
        assert_eq!(Biome::Plains.surface(), Biome::Mountains.surface());
        assert_eq!(Biome::Plains.subsurface(), DIRT);
        assert_eq!(Biome::Desert.surface(), Biome::Desert.subsurface());
    }
}
