use voxelspace_common::ChunkCoord;

/// Park–Miller modulus.
const LCG_MODULUS: u64 = 2_147_483_647;
const LCG_MULTIPLIER: u64 = 16_807;

/// 256-entry permutation, duplicated so lattice lookups never wrap.
#[derive(Clone)]
pub struct PermutationTable {
    perm: [u8; 512],
}

impl PermutationTable {
    /// Fisher-Yates shuffle of 0..=255 driven by a Park–Miller LCG seeded
    /// from `seed`.
    pub fn new(seed: u64) -> Self {
        let mut base = [0u8; 256];
        for (i, slot) in base.iter_mut().enumerate() {
            *slot = i as u8;
        }

        // The LCG sticks at zero, so a zero state is bumped to one.
        let mut state = seed % LCG_MODULUS;
        if state == 0 {
            state = 1;
        }
        for i in (1..256usize).rev() {
            state = state * LCG_MULTIPLIER % LCG_MODULUS;
            let j = (state % (i as u64 + 1)) as usize;
            base.swap(i, j);
        }

        let mut perm = [0u8; 512];
        perm[..256].copy_from_slice(&base);
        perm[256..].copy_from_slice(&base);
        Self { perm }
    }

    #[inline]
    fn at(&self, i: usize) -> usize {
        self.perm[i] as usize
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.perm
    }
}

impl std::fmt::Debug for PermutationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermutationTable")
            .field("head", &&self.perm[..8])
            .finish()
    }
}

/// 2D gradient noise over a seeded permutation table. Output lies within
/// `±MAX_MAGNITUDE` and is exactly zero on integer lattice points.
#[derive(Debug, Clone)]
pub struct GradientNoise {
    table: PermutationTable,
}

impl GradientNoise {
    /// Gradients reach length 8 per axis and offsets stay below 1 per axis.
    pub const MAX_MAGNITUDE: f64 = 16.0;

    pub fn new(seed: u64) -> Self {
        Self {
            table: PermutationTable::new(seed),
        }
    }

    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let xf = x.floor();
        let yf = y.floor();
        let xi = (xf as i64 & 255) as usize;
        let yi = (yf as i64 & 255) as usize;
        let x = x - xf;
        let y = y - yf;

        let u = fade(x);
        let v = fade(y);

        let p = &self.table;
        let a = p.at(xi) + yi;
        let b = p.at(xi + 1) + yi;

        lerp(
            v,
            lerp(u, grad(p.at(a), x, y), grad(p.at(b), x - 1.0, y)),
            lerp(
                u,
                grad(p.at(a + 1), x, y - 1.0),
                grad(p.at(b + 1), x - 1.0, y - 1.0),
            ),
        )
    }
}

/// Quintic smoothstep.
#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

/// Dot product with a hashed gradient: magnitude `1 + (h & 7)` on both
/// axes, signs from bits 3 and 2.
#[inline]
fn grad(hash: usize, x: f64, y: f64) -> f64 {
    let h = hash & 15;
    let g = (1 + (h & 7)) as f64;
    let gx = if h & 8 != 0 { -g } else { g };
    let gy = if h & 4 != 0 { -g } else { g };
    gx * x + gy * y
}

/// Splitmix64 step: a fast, well-mixed function of its input.
pub(crate) fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Deterministic random stream keyed by (seed, chunk coordinate).
pub(crate) struct ChunkRng {
    state: u64,
}

impl ChunkRng {
    pub(crate) fn new(seed: u64, coord: ChunkCoord) -> Self {
        let mut state = splitmix64(seed);
        for v in [coord.x, coord.y, coord.z] {
            state = splitmix64(state ^ v as u32 as u64);
        }
        Self { state }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.state = splitmix64(self.state);
        self.state
    }

    /// Uniform-ish integer in `0..bound`.
    pub(crate) fn below(&mut self, bound: u32) -> u32 {
        (self.next_u64() % bound.max(1) as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutation_is_a_duplicated_bijection() {
        let t = PermutationTable::new(12345);
        let perm = t.as_slice();
        let mut seen = [false; 256];
        for &v in &perm[..256] {
            assert!(!seen[v as usize], "value {v} repeated");
            seen[v as usize] = true;
        }
        assert_eq!(&perm[..256], &perm[256..]);
    }

    #[test]
    fn seeds_shuffle_differently() {
        let a = PermutationTable::new(1);
        let b = PermutationTable::new(2);
        assert_ne!(a.as_slice(), b.as_slice());
        // Zero and the modulus both collapse to the same non-degenerate state.
        assert_eq!(
            PermutationTable::new(0).as_slice(),
            PermutationTable::new(LCG_MODULUS).as_slice()
        );
    }

    #[test]
    fn gradients_scale_with_the_low_hash_bits() {
        assert_eq!(grad(0, 1.0, 0.0), 1.0);
        assert_eq!(grad(7, 1.0, 1.0), 16.0);
        assert_eq!(grad(8 | 2, 1.0, 0.0), -3.0);
        assert_eq!(grad(4 | 2, 0.0, 1.0), -3.0);
        assert_eq!(grad(12 | 1, 0.5, 0.5), -6.0);
        // Only the low four bits take part.
        assert_eq!(grad(16 + 5, 1.0, 2.0), grad(5, 1.0, 2.0));
    }

    #[test]
    fn noise_vanishes_on_lattice_points() {
        let n = GradientNoise::new(7);
        for x in -3..3 {
            for y in -3..3 {
                assert_eq!(n.sample(x as f64, y as f64), 0.0);
            }
        }
    }

    #[test]
    fn noise_is_bounded_and_continuous() {
        let n = GradientNoise::new(99);
        let mut max = 0.0f64;
        for i in 0..2000 {
            let x = i as f64 * 0.173 - 150.0;
            let y = i as f64 * 0.061 + 20.0;
            let v = n.sample(x, y);
            max = max.max(v.abs());
            let nudged = n.sample(x + 1e-6, y);
            assert!((v - nudged).abs() < 1e-3);
        }
        assert!(max <= GradientNoise::MAX_MAGNITUDE, "noise magnitude {max}");
        assert!(max > 1.0);
    }

    #[test]
    fn chunk_rng_is_keyed_by_seed_and_coord() {
        let c = ChunkCoord::new(4, -2, 9);
        let a: Vec<u64> = {
            let mut r = ChunkRng::new(5, c);
            (0..4).map(|_| r.next_u64()).collect()
        };
        let b: Vec<u64> = {
            let mut r = ChunkRng::new(5, c);
            (0..4).map(|_| r.next_u64()).collect()
        };
        assert_eq!(a, b);
        let mut other = ChunkRng::new(5, c.offset(1, 0, 0));
        assert_ne!(other.next_u64(), a[0]);
        assert!(ChunkRng::new(1, c).below(10) < 10);
    }
}
