//! Terrain generation: a pure function of (seed, chunk coordinate).
//!
//! # Invariants
//! - Identical seed and coordinate always produce bit-identical chunks,
//!   decoration included.
//! - Generated chunks are never flagged modified.

mod biome;
mod generator;
mod noise;

pub use biome::Biome;
pub use generator::{TerrainConfig, TerrainGenerator};
pub use noise::{GradientNoise, PermutationTable};
