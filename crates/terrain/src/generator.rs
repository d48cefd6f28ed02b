use serde::{Deserialize, Serialize};
use voxelspace_common::block::{AIR, GLASS, METAL_WALL, NEON, STONE};
use voxelspace_common::{CHUNK_SIZE, Chunk, ChunkCoord, LocalCoord};

use crate::biome::Biome;
use crate::noise::{ChunkRng, GradientNoise};

/// Depth of the biome subsurface band below the surface voxel.
const SUBSURFACE_DEPTH: i32 = 4;
const NEON_MARKERS: i32 = 3;

/// Terrain shape parameters. The seed is the only per-world value; the rest
/// tune the look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub seed: u64,
    /// Height of a column where all noise layers are zero.
    pub base_height: f64,
    /// Amplitude of the normalized noise sum before the biome scale.
    pub height_scale: f64,
    /// Amplitude multiplier between successive octaves.
    pub persistence: f64,
    pub octaves: u32,
    /// Horizontal period of the first octave, in blocks.
    pub scale: f64,
    pub biome_scale: f64,
    /// Per-chunk noise value above which a cybercity chunk gets a building.
    pub structure_threshold: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            base_height: 64.0,
            height_scale: 32.0,
            persistence: 0.5,
            octaves: 4,
            scale: 100.0,
            biome_scale: 200.0,
            structure_threshold: 0.3,
        }
    }
}

impl TerrainConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }
}

/// Fills chunk volumes from (seed, chunk coordinate). Output depends on
/// nothing else, so evicted unmodified chunks can always be regenerated.
#[derive(Debug, Clone)]
pub struct TerrainGenerator {
    config: TerrainConfig,
    noise: GradientNoise,
}

impl TerrainGenerator {
    pub fn new(config: TerrainConfig) -> Self {
        let noise = GradientNoise::new(config.seed);
        Self { config, noise }
    }

    pub fn seed(&self) -> u64 {
        self.config.seed
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn biome_at(&self, x: i32, z: i32) -> Biome {
        let s = self.config.biome_scale;
        Biome::from_noise(self.noise.sample(x as f64 / s, z as f64 / s))
    }

    /// Surface height of the column at (x, z).
    pub fn height_at(&self, x: i32, z: i32) -> i32 {
        self.height_in(x, z, self.biome_at(x, z))
    }

    fn height_in(&self, x: i32, z: i32, biome: Biome) -> i32 {
        let c = &self.config;
        let mut sum = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut total_amplitude = 0.0;
        for _ in 0..c.octaves {
            let sx = x as f64 * frequency / c.scale;
            let sz = z as f64 * frequency / c.scale;
            sum += self.noise.sample(sx, sz) * amplitude;
            total_amplitude += amplitude;
            amplitude *= c.persistence;
            frequency *= 2.0;
        }
        let normalized = if total_amplitude > 0.0 {
            sum / total_amplitude
        } else {
            0.0
        };
        (c.base_height + normalized * c.height_scale * biome.height_scale()).floor() as i32
    }

    /// Generate the chunk at `coord`. The result is unmodified.
    pub fn generate(&self, coord: ChunkCoord) -> Chunk {
        let _span = tracing::trace_span!("generate_chunk", %coord).entered();
        let origin = coord.origin();
        let mut chunk = Chunk::empty();

        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                let wx = origin.x + x;
                let wz = origin.z + z;
                let biome = self.biome_at(wx, wz);
                let height = self.height_in(wx, wz, biome);

                // Columns entirely above the surface stay air.
                let top = (height - origin.y).min(CHUNK_SIZE - 1);
                for y in 0..=top {
                    let wy = origin.y + y;
                    let voxel = if wy < height - SUBSURFACE_DEPTH {
                        STONE
                    } else if wy < height {
                        biome.subsurface()
                    } else {
                        biome.surface()
                    };
                    chunk.fill_voxel(LocalCoord::new(x, y, z), voxel);
                }
            }
        }

        self.decorate(&mut chunk, coord);
        chunk
    }

    /// Stamp one building on qualifying cybercity chunks.
    fn decorate(&self, chunk: &mut Chunk, coord: ChunkCoord) {
        let origin = coord.origin();
        if self.biome_at(origin.x, origin.z) != Biome::Cybercity {
            return;
        }
        // Offset by half a cell: the noise is zero on the integer lattice.
        let placement = self
            .noise
            .sample(coord.x as f64 + 0.5, coord.z as f64 + 0.5);
        if placement <= self.config.structure_threshold {
            return;
        }

        let mid = CHUNK_SIZE / 2;
        let floor = self.height_at(origin.x + mid, origin.z + mid) + 1 - origin.y;
        if !(0..CHUNK_SIZE).contains(&floor) {
            return;
        }

        let height = (CHUNK_SIZE as f64 * 0.8) as i32;
        let width = (CHUNK_SIZE as f64 * 0.6) as i32;
        let depth = width;
        let start_x = (CHUNK_SIZE - width) / 2;
        let start_z = (CHUNK_SIZE - depth) / 2;
        tracing::debug!(%coord, floor, "stamping building");

        for x in start_x..start_x + width {
            for z in start_z..start_z + depth {
                let wall =
                    x == start_x || x == start_x + width - 1 || z == start_z || z == start_z + depth - 1;
                for level in 0..height {
                    let voxel = if !wall {
                        AIR
                    } else if level % 4 == 2 && (x + z) % 3 == 1 {
                        GLASS
                    } else {
                        METAL_WALL
                    };
                    // Anything past the chunk top is clipped by the bounds check.
                    chunk.fill_voxel(LocalCoord::new(x, floor + level, z), voxel);
                }
            }
        }

        let mut rng = ChunkRng::new(self.config.seed, coord);
        let sign_base = floor + (height as f64 * 0.7) as i32;
        for i in 0..NEON_MARKERS {
            let x = start_x + rng.below(width as u32) as i32;
            let z = start_z + rng.below(depth as u32) as i32;
            let y = sign_base + i * 2;
            chunk.fill_voxel(LocalCoord::new(x, y, z), NEON);
            chunk.fill_voxel(LocalCoord::new(x + 1, y, z), NEON);
            chunk.fill_voxel(LocalCoord::new(x, y + 1, z), NEON);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxelspace_common::IVec3;

    fn voxel_at(generator: &TerrainGenerator, block: IVec3) -> u8 {
        let chunk = generator.generate(ChunkCoord::of_block(block));
        chunk.voxel(LocalCoord::of_block(block))
    }

    #[test]
    fn same_seed_same_chunk() {
        let g = TerrainGenerator::new(TerrainConfig::with_seed(42));
        for coord in [
            ChunkCoord::new(0, 2, 0),
            ChunkCoord::new(-3, 1, 7),
            ChunkCoord::new(12, 2, -40),
        ] {
            assert_eq!(g.generate(coord).voxels(), g.generate(coord).voxels());
        }
        let again = TerrainGenerator::new(TerrainConfig::with_seed(42));
        let c = ChunkCoord::new(5, 2, 5);
        assert_eq!(g.generate(c).voxels(), again.generate(c).voxels());
    }

    #[test]
    fn different_seeds_change_heights() {
        let a = TerrainGenerator::new(TerrainConfig::with_seed(1));
        let b = TerrainGenerator::new(TerrainConfig::with_seed(2));
        let differs = (0..64).any(|i| a.height_at(i * 7, i * 3) != b.height_at(i * 7, i * 3));
        assert!(differs);
    }

    #[test]
    fn generated_chunks_are_unmodified() {
        let g = TerrainGenerator::new(TerrainConfig::with_seed(3));
        assert!(!g.generate(ChunkCoord::new(0, 2, 0)).is_modified());
    }

    #[test]
    fn heights_stay_near_base() {
        let c = TerrainConfig::with_seed(11);
        let g = TerrainGenerator::new(c.clone());
        for i in -50..50 {
            let (x, z) = (i * 13, -i * 5);
            let h = g.height_at(x, z);
            let reach =
                c.height_scale * g.biome_at(x, z).height_scale() * GradientNoise::MAX_MAGNITUDE;
            assert!((h as f64 - c.base_height).abs() <= reach + 1.0, "height {h}");
        }
    }

    #[test]
    fn column_layers_follow_height() {
        let g = TerrainGenerator::new(TerrainConfig::with_seed(8));
        let mut checked = 0;
        for i in 0..40 {
            let (x, z) = (i * 37 - 700, i * 11 + 90);
            let biome = g.biome_at(x, z);
            let origin = ChunkCoord::of_block(IVec3::new(x, 0, z)).origin();
            if biome == Biome::Cybercity || g.biome_at(origin.x, origin.z) == Biome::Cybercity {
                continue;
            }
            let h = g.height_at(x, z);
            assert_eq!(voxel_at(&g, IVec3::new(x, h, z)), biome.surface());
            assert_eq!(voxel_at(&g, IVec3::new(x, h + 1, z)), AIR);
            assert_eq!(voxel_at(&g, IVec3::new(x, h - 1, z)), biome.subsurface());
            assert_eq!(voxel_at(&g, IVec3::new(x, h - 4, z)), biome.subsurface());
            assert_eq!(voxel_at(&g, IVec3::new(x, h - 5, z)), STONE);
            checked += 1;
        }
        assert!(checked > 0);
    }

    #[test]
    fn sky_and_deep_chunks_are_uniform() {
        let g = TerrainGenerator::new(TerrainConfig::default());
        assert_eq!(g.generate(ChunkCoord::new(0, 10, 0)).solid_count(), 0);
        let deep = g.generate(ChunkCoord::new(0, -4, 0));
        assert!(deep.voxels().iter().all(|&v| v == STONE));
    }

    #[test]
    fn buildings_are_deterministic_where_they_appear() {
        // Flat terrain puts every floor at the same height, and a threshold
        // of -1 lets every cybercity chunk qualify.
        let config = TerrainConfig {
            seed: 77,
            height_scale: 0.0,
            structure_threshold: -1.0,
            ..TerrainConfig::default()
        };
        let g = TerrainGenerator::new(config);
        let mut stamped = 0;
        'search: for cx in -30..30 {
            for cz in -30..30 {
                let coord = ChunkCoord::new(cx * 2, 2, cz * 2);
                let origin = coord.origin();
                if g.biome_at(origin.x, origin.z) != Biome::Cybercity {
                    continue;
                }
                let first = g.generate(coord);
                assert_eq!(first.voxels(), g.generate(coord).voxels());
                if first.voxels().contains(&NEON) {
                    assert!(first.voxels().contains(&METAL_WALL));
                    assert!(first.voxels().contains(&GLASS));
                    stamped += 1;
                    if stamped == 3 {
                        break 'search;
                    }
                }
            }
        }
        assert!(stamped > 0, "no building found in the sampled area");
    }
}
