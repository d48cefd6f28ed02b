use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};
use voxelspace_common::block::AIR;
use voxelspace_common::{
    Aabb, CHUNK_SIZE, Chunk, ChunkCoord, ChunkData, ChunkError, ChunkKey, IVec3, LocalCoord,
    Vec3, Voxel,
};

use crate::storage::{ChunkStorage, StorageError};

/// Widest box, in voxels per axis, that `check_collision` will scan.
pub const MAX_COLLISION_EXTENT: f32 = 64.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkManagerConfig {
    /// Hard cap on chunks held in memory, resident and parked together.
    pub max_resident: usize,
    pub idle_timeout_ms: u64,
}

impl Default for ChunkManagerConfig {
    fn default() -> Self {
        Self {
            max_resident: 512,
            idle_timeout_ms: 30_000,
        }
    }
}

impl ChunkManagerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// Outcome of an eviction pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Unmodified chunks released outright.
    pub dropped: usize,
    /// Modified chunks moved to the write-back buffer.
    pub parked: usize,
}

impl SweepReport {
    fn absorb(&mut self, other: SweepReport) {
        self.dropped += other.dropped;
        self.parked += other.parked;
    }
}

/// Memory is at its cap and every chunk in it holds unsaved edits, so
/// nothing can be evicted to make room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("chunk memory is full: {in_memory} chunks hold unsaved edits, cap is {max}")]
pub struct Saturated {
    pub in_memory: usize,
    pub max: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub saved: usize,
    pub failed: usize,
}

/// Owns every chunk in memory.
///
/// Chunks live in one of two places. Resident chunks are served to callers.
/// Parked chunks were evicted while modified and stay in the write-back buffer
/// until storage acknowledges them; asking for a parked coordinate reclaims
/// the in-memory copy, so a load never overtakes an unfinished save.
///
/// Both places count toward `max_resident`. Only clean chunks are evicted to
/// make room; when memory holds nothing but unsaved edits, new chunks are
/// refused with [`Saturated`] until a flush succeeds.
#[derive(Debug, Default)]
pub struct ChunkManager {
    config: ChunkManagerConfig,
    resident: HashMap<ChunkCoord, Chunk>,
    parked: BTreeMap<ChunkCoord, Chunk>,
    /// Coordinates storage is known to hold.
    stored: HashSet<ChunkCoord>,
}

impl ChunkManager {
    pub fn new(config: ChunkManagerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ChunkManagerConfig {
        &self.config
    }

    /// Number of resident chunks.
    pub fn len(&self) -> usize {
        self.resident.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resident.is_empty()
    }

    pub fn parked_len(&self) -> usize {
        self.parked.len()
    }

    /// Chunks held in memory, resident and parked.
    pub fn in_memory(&self) -> usize {
        self.resident.len() + self.parked.len()
    }

    /// Whether `coord` may be brought into memory without breaking the cap.
    pub fn check_room(&self, coord: ChunkCoord) -> Result<(), Saturated> {
        let max = self.config.max_resident;
        if self.resident.contains_key(&coord)
            || self.parked.contains_key(&coord)
            || self.in_memory() < max
            || self.resident.values().any(|chunk| !chunk.is_modified())
        {
            return Ok(());
        }
        tracing::warn!(%coord, in_memory = self.in_memory(), max, "chunk refused, memory holds only unsaved chunks");
        Err(Saturated {
            in_memory: self.in_memory(),
            max,
        })
    }

    pub fn is_parked(&self, coord: ChunkCoord) -> bool {
        self.parked.contains_key(&coord)
    }

    pub fn is_stored(&self, coord: ChunkCoord) -> bool {
        self.stored.contains(&coord)
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.resident.contains_key(&coord)
    }

    pub fn coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.resident.keys().copied()
    }

    /// Resident chunk at `coord`, refreshing its access time.
    pub fn get(&mut self, coord: ChunkCoord) -> Option<&Chunk> {
        self.get_mut(coord).map(|chunk| &*chunk)
    }

    pub fn get_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        let chunk = self.resident.get_mut(&coord)?;
        chunk.touch(Instant::now());
        Some(chunk)
    }

    /// Read without refreshing the access time.
    pub fn peek(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.resident.get(&coord)
    }

    pub fn set(&mut self, coord: ChunkCoord, chunk: Chunk) -> Result<SweepReport, Saturated> {
        self.set_at(coord, chunk, Instant::now())
    }

    /// Insert or replace a chunk as of `now`, then enforce the memory cap.
    /// A new coordinate is refused when nothing can be evicted for it.
    pub fn set_at(
        &mut self,
        coord: ChunkCoord,
        chunk: Chunk,
        now: Instant,
    ) -> Result<SweepReport, Saturated> {
        self.check_room(coord)?;
        Ok(self.insert_at(coord, chunk, now))
    }

    fn insert_at(&mut self, coord: ChunkCoord, mut chunk: Chunk, now: Instant) -> SweepReport {
        if self.parked.remove(&coord).is_some() {
            tracing::debug!(%coord, "parked copy superseded");
        }
        chunk.touch(now);
        self.resident.insert(coord, chunk);
        if self.in_memory() > self.config.max_resident {
            self.enforce_cap(now, Some(coord))
        } else {
            SweepReport::default()
        }
    }

    /// Voxel at a local coordinate of a resident chunk; air when the chunk is
    /// absent or the coordinate is out of bounds.
    pub fn get_voxel(&self, coord: ChunkCoord, at: LocalCoord) -> Voxel {
        self.peek(coord).map_or(AIR, |chunk| chunk.voxel(at))
    }

    /// Write one voxel. Returns `false`, leaving everything untouched, when
    /// the chunk is not resident or `at` is out of bounds.
    pub fn set_voxel(&mut self, coord: ChunkCoord, at: LocalCoord, voxel: Voxel) -> bool {
        self.get_mut(coord)
            .is_some_and(|chunk| chunk.set_voxel(at, voxel))
    }

    pub fn world_to_chunk(pos: Vec3) -> ChunkCoord {
        voxelspace_common::world_to_chunk(pos)
    }

    pub fn world_to_local(pos: Vec3) -> Vec3 {
        voxelspace_common::world_to_local(pos)
    }

    pub fn sweep(&mut self) -> SweepReport {
        self.sweep_at(Instant::now())
    }

    /// Evict every chunk idle for longer than the configured timeout.
    pub fn sweep_at(&mut self, now: Instant) -> SweepReport {
        self.sweep_idle(now, None)
    }

    fn sweep_idle(&mut self, now: Instant, keep: Option<ChunkCoord>) -> SweepReport {
        let timeout = self.config.idle_timeout();
        let idle: Vec<ChunkCoord> = self
            .resident
            .iter()
            .filter(|(coord, chunk)| {
                Some(**coord) != keep
                    && now.saturating_duration_since(chunk.last_accessed()) > timeout
            })
            .map(|(coord, _)| *coord)
            .collect();

        let mut report = SweepReport::default();
        for coord in idle {
            self.retire(coord, &mut report);
        }
        if report != SweepReport::default() {
            tracing::debug!(
                dropped = report.dropped,
                parked = report.parked,
                resident = self.resident.len(),
                "idle sweep"
            );
        }
        report
    }

    fn enforce_cap(&mut self, now: Instant, keep: Option<ChunkCoord>) -> SweepReport {
        let mut report = self.sweep_idle(now, keep);
        let mut lru = SweepReport::default();
        while self.in_memory() > self.config.max_resident {
            // Parking frees nothing, so only clean chunks go.
            let victim = self
                .resident
                .iter()
                .filter(|(coord, chunk)| Some(**coord) != keep && !chunk.is_modified())
                .min_by_key(|(coord, chunk)| (chunk.last_accessed(), **coord))
                .map(|(coord, _)| *coord);
            let Some(victim) = victim else {
                tracing::warn!(
                    in_memory = self.in_memory(),
                    cap = self.config.max_resident,
                    "over the chunk cap with only unsaved chunks left"
                );
                break;
            };
            self.retire(victim, &mut lru);
        }
        if lru != SweepReport::default() {
            tracing::debug!(
                dropped = lru.dropped,
                parked = lru.parked,
                cap = self.config.max_resident,
                "capacity eviction"
            );
        }
        report.absorb(lru);
        report
    }

    fn retire(&mut self, coord: ChunkCoord, report: &mut SweepReport) {
        let Some(chunk) = self.resident.remove(&coord) else {
            return;
        };
        if chunk.is_modified() {
            self.parked.insert(coord, chunk);
            report.parked += 1;
        } else {
            report.dropped += 1;
        }
    }

    /// Move a parked chunk back into the resident set.
    pub fn reclaim(&mut self, coord: ChunkCoord) -> bool {
        match self.parked.remove(&coord) {
            Some(chunk) => {
                tracing::debug!(%coord, "reclaimed parked chunk");
                self.insert_at(coord, chunk, Instant::now());
                true
            }
            None => false,
        }
    }

    /// Save every parked chunk. Chunks leave memory only when their save
    /// succeeds; failures stay parked for the next flush.
    pub async fn flush<S: ChunkStorage>(&mut self, storage: &S) -> FlushReport {
        let mut report = FlushReport::default();
        let pending: Vec<ChunkCoord> = self.parked.keys().copied().collect();
        for coord in pending {
            let Some(data) = self.parked.get(&coord).map(Chunk::to_data) else {
                continue;
            };
            match storage.put(coord, data).await {
                Ok(()) => {
                    self.parked.remove(&coord);
                    self.stored.insert(coord);
                    report.saved += 1;
                    tracing::debug!(%coord, "chunk saved");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(%coord, error = %e, "chunk save failed, keeping it parked");
                }
            }
        }
        report
    }

    /// Make `coord` resident from memory or storage. Returns `Ok(false)` when
    /// neither has it.
    pub async fn load<S: ChunkStorage>(
        &mut self,
        coord: ChunkCoord,
        storage: &S,
    ) -> Result<bool, StorageError> {
        if self.get(coord).is_some() || self.reclaim(coord) {
            return Ok(true);
        }
        self.check_room(coord)?;
        let Some(data) = storage.get(coord).await? else {
            self.stored.remove(&coord);
            return Ok(false);
        };
        let chunk =
            Chunk::from_data(data).map_err(|source| StorageError::Malformed { coord, source })?;
        tracing::debug!(%coord, "chunk rehydrated");
        self.stored.insert(coord);
        self.insert_at(coord, chunk, Instant::now());
        Ok(true)
    }

    /// Record every coordinate storage already holds. Returns how many.
    pub async fn index_storage<S: ChunkStorage>(
        &mut self,
        storage: &S,
    ) -> Result<usize, StorageError> {
        let keys = storage.keys().await?;
        let count = keys.len();
        self.stored.extend(keys);
        tracing::debug!(count, "indexed stored chunks");
        Ok(count)
    }

    /// True when any voxel inside the box is non-air. Chunks that are not in
    /// memory count as empty. Boxes wider than [`MAX_COLLISION_EXTENT`] on
    /// any axis are refused and reported as colliding.
    pub fn check_collision(&self, aabb: &Aabb) -> bool {
        let size = aabb.size();
        if !size.is_finite() || size.max_element() > MAX_COLLISION_EXTENT {
            tracing::warn!(?size, "collision query too large, treating as blocked");
            return true;
        }

        let (lo, hi) = aabb.block_range();
        let first = ChunkCoord::of_block(lo);
        let last = ChunkCoord::of_block(hi);
        for cy in first.y..=last.y {
            for cz in first.z..=last.z {
                for cx in first.x..=last.x {
                    let coord = ChunkCoord::new(cx, cy, cz);
                    let Some(chunk) = self.resident.get(&coord).or_else(|| self.parked.get(&coord))
                    else {
                        continue;
                    };
                    let origin = coord.origin();
                    let from = (lo - origin).max(IVec3::ZERO);
                    let to = (hi - origin).min(IVec3::splat(CHUNK_SIZE - 1));
                    for y in from.y..=to.y {
                        for z in from.z..=to.z {
                            for x in from.x..=to.x {
                                if chunk.voxel(LocalCoord::new(x, y, z)) != AIR {
                                    return true;
                                }
                            }
                        }
                    }
                }
            }
        }
        false
    }

    /// Every modified chunk, resident or parked, keyed by canonical string.
    pub fn serialize(&self) -> BTreeMap<ChunkKey, ChunkData> {
        self.resident
            .iter()
            .chain(self.parked.iter())
            .filter(|(_, chunk)| chunk.is_modified())
            .map(|(coord, chunk)| (coord.key(), chunk.to_data()))
            .collect()
    }

    /// Replace the resident set with `chunks`. Nothing changes if any entry
    /// is malformed. Parked chunks are discarded. Callers keep `chunks`
    /// within the cap; clean chunks beyond it are evicted.
    pub fn deserialize(&mut self, chunks: BTreeMap<ChunkKey, ChunkData>) -> Result<(), ChunkError> {
        let now = Instant::now();
        let mut resident = HashMap::with_capacity(chunks.len());
        for (ChunkKey(coord), data) in chunks {
            let mut chunk = Chunk::from_data(data)?;
            chunk.touch(now);
            resident.insert(coord, chunk);
        }
        if !self.parked.is_empty() {
            tracing::warn!(count = self.parked.len(), "discarding unsaved parked chunks");
        }
        self.parked.clear();
        self.resident = resident;
        if self.in_memory() > self.config.max_resident {
            self.enforce_cap(now, None);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::ScriptedStorage;
    use voxelspace_common::block::{DIRT, STONE};

    fn config(max_resident: usize) -> ChunkManagerConfig {
        ChunkManagerConfig {
            max_resident,
            idle_timeout_ms: 1_000,
        }
    }

    fn modified_chunk(voxel: Voxel) -> Chunk {
        let mut chunk = Chunk::empty();
        chunk.set_voxel(LocalCoord::new(1, 2, 3), voxel);
        chunk
    }

    #[test]
    fn voxel_access_is_bounds_checked() {
        let mut m = ChunkManager::new(config(8));
        let c = ChunkCoord::new(0, 0, 0);
        m.set(c, Chunk::empty()).unwrap();
        assert!(m.set_voxel(c, LocalCoord::new(31, 0, 31), STONE));
        assert_eq!(m.get_voxel(c, LocalCoord::new(31, 0, 31)), STONE);
        assert!(!m.set_voxel(c, LocalCoord::new(32, 0, 0), STONE));
        assert!(!m.set_voxel(c, LocalCoord::new(0, -1, 0), STONE));
        assert_eq!(m.get_voxel(c, LocalCoord::new(0, -1, 0)), AIR);
        assert!(!m.set_voxel(ChunkCoord::new(1, 0, 0), LocalCoord::new(0, 0, 0), STONE));
        assert!(m.peek(c).is_some_and(Chunk::is_modified));
    }

    #[test]
    fn memory_cap_evicts_clean_chunks_first() {
        let mut m = ChunkManager::new(config(4));
        let t0 = Instant::now();
        for i in 0..10 {
            let chunk = if i % 2 == 0 {
                modified_chunk(DIRT)
            } else {
                Chunk::empty()
            };
            let now = t0 + Duration::from_millis(i as u64);
            let result = m.set_at(ChunkCoord::new(i, 0, 0), chunk, now);
            assert!(m.in_memory() <= 4);
            // Once only unsaved chunks remain, new ones are turned away.
            assert_eq!(result.is_ok(), i < 7, "insert {i}");
        }
        for i in [0, 2, 4, 6] {
            assert!(m.contains(ChunkCoord::new(i, 0, 0)));
        }
        assert_eq!(m.parked_len(), 0);
        assert_eq!(
            m.check_room(ChunkCoord::new(20, 0, 0)),
            Err(Saturated { in_memory: 4, max: 4 })
        );
        // Replacing a chunk already in memory needs no room.
        assert!(m.set(ChunkCoord::new(2, 0, 0), modified_chunk(STONE)).is_ok());
    }

    #[test]
    fn unsaved_chunks_stay_bounded_while_saves_fail() {
        let storage = ScriptedStorage::default();
        storage.fail_puts.set(true);
        let mut m = ChunkManager::new(config(4));
        let t0 = Instant::now();
        let mut refused = 0;
        for i in 0..200 {
            let now = t0 + Duration::from_secs(2 * i as u64);
            if m.set_at(ChunkCoord::new(i, 0, 0), modified_chunk(STONE), now).is_err() {
                refused += 1;
            }
            m.sweep_at(now);
            pollster::block_on(m.flush(&storage));
            assert!(m.in_memory() <= 4);
        }
        assert_eq!(refused, 196);
        assert_eq!(m.parked_len(), 4);

        storage.fail_puts.set(false);
        let report = pollster::block_on(m.flush(&storage));
        assert_eq!(report.saved, 4);
        assert_eq!(m.in_memory(), 0);
        assert_eq!(storage.entries.borrow().len(), 4);
        assert!(m.set(ChunkCoord::new(500, 0, 0), modified_chunk(DIRT)).is_ok());
    }

    #[test]
    fn load_is_refused_when_memory_is_saturated() {
        let storage = ScriptedStorage::default();
        let c = ChunkCoord::new(8, 0, 0);
        storage.entries.borrow_mut().insert(c, modified_chunk(DIRT).to_data());
        let mut m = ChunkManager::new(config(1));
        m.set(ChunkCoord::new(0, 0, 0), modified_chunk(STONE)).unwrap();

        let result = pollster::block_on(m.load(c, &storage));
        assert!(matches!(result, Err(StorageError::Saturated(_))));
        assert!(!m.contains(c));
    }

    #[test]
    fn idle_sweep_parks_modified_and_drops_clean() {
        let mut m = ChunkManager::new(config(16));
        let t0 = Instant::now();
        let clean = ChunkCoord::new(0, 0, 0);
        let dirty = ChunkCoord::new(1, 0, 0);
        let fresh = ChunkCoord::new(2, 0, 0);
        m.set_at(clean, Chunk::empty(), t0).unwrap();
        m.set_at(dirty, modified_chunk(STONE), t0).unwrap();
        m.set_at(fresh, Chunk::empty(), t0 + Duration::from_millis(900)).unwrap();

        let report = m.sweep_at(t0 + Duration::from_millis(1_500));
        assert_eq!(report, SweepReport { dropped: 1, parked: 1 });
        assert!(m.contains(fresh));
        assert!(m.is_parked(dirty));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn flush_moves_parked_chunks_to_storage() {
        let storage = ScriptedStorage::default();
        let mut m = ChunkManager::new(config(16));
        let t0 = Instant::now();
        let c = ChunkCoord::new(-1, 2, 5);
        m.set_at(c, modified_chunk(STONE), t0).unwrap();
        m.sweep_at(t0 + Duration::from_secs(5));

        let report = pollster::block_on(m.flush(&storage));
        assert_eq!(report, FlushReport { saved: 1, failed: 0 });
        assert_eq!(m.parked_len(), 0);
        assert!(m.is_stored(c));
        let saved = storage.entries.borrow().get(&c).cloned();
        assert!(saved.is_some_and(|d| d.voxels.contains(&STONE)));
    }

    #[test]
    fn failed_save_keeps_chunk_parked() {
        let storage = ScriptedStorage::default();
        storage.fail_puts.set(true);
        let mut m = ChunkManager::new(config(16));
        let t0 = Instant::now();
        let c = ChunkCoord::new(3, 1, 3);
        m.set_at(c, modified_chunk(DIRT), t0).unwrap();
        m.sweep_at(t0 + Duration::from_secs(5));

        let report = pollster::block_on(m.flush(&storage));
        assert_eq!(report, FlushReport { saved: 0, failed: 1 });
        assert!(m.is_parked(c));
        assert!(!m.is_stored(c));

        storage.fail_puts.set(false);
        let retry = pollster::block_on(m.flush(&storage));
        assert_eq!(retry.saved, 1);
        assert_eq!(storage.puts.get(), 2);
    }

    #[test]
    fn load_prefers_parked_copy_over_storage() {
        let storage = ScriptedStorage::default();
        let c = ChunkCoord::new(0, 1, 0);
        storage
            .entries
            .borrow_mut()
            .insert(c, modified_chunk(DIRT).to_data());

        let mut m = ChunkManager::new(config(16));
        let t0 = Instant::now();
        m.set_at(c, modified_chunk(STONE), t0).unwrap();
        m.sweep_at(t0 + Duration::from_secs(5));
        assert!(m.is_parked(c));

        assert!(pollster::block_on(m.load(c, &storage)).is_ok_and(|hit| hit));
        assert_eq!(m.get_voxel(c, LocalCoord::new(1, 2, 3)), STONE);
        assert_eq!(m.parked_len(), 0);
    }

    #[test]
    fn load_rehydrates_and_reports_misses() {
        let storage = ScriptedStorage::default();
        let c = ChunkCoord::new(4, 0, -4);
        storage
            .entries
            .borrow_mut()
            .insert(c, modified_chunk(DIRT).to_data());
        let mut m = ChunkManager::new(config(16));

        assert_eq!(pollster::block_on(m.index_storage(&storage)).ok(), Some(1));
        assert!(m.is_stored(c));
        assert!(pollster::block_on(m.load(c, &storage)).is_ok_and(|hit| hit));
        assert!(m.peek(c).is_some_and(Chunk::is_modified));

        let missing = ChunkCoord::new(9, 9, 9);
        assert!(pollster::block_on(m.load(missing, &storage)).is_ok_and(|hit| !hit));
        assert!(!m.contains(missing));
    }

    #[test]
    fn malformed_stored_chunk_is_an_error() {
        let storage = ScriptedStorage::default();
        let c = ChunkCoord::new(0, 0, 0);
        storage.entries.borrow_mut().insert(
            c,
            ChunkData {
                voxels: vec![1, 2, 3],
                modified: true,
            },
        );
        let mut m = ChunkManager::new(config(16));
        let result = pollster::block_on(m.load(c, &storage));
        assert!(matches!(result, Err(StorageError::Malformed { .. })));
        assert!(!m.contains(c));
    }

    #[test]
    fn collision_respects_missing_chunks_and_boundaries() {
        let mut m = ChunkManager::new(config(16));
        let mut floor = Chunk::empty();
        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                floor.fill_voxel(LocalCoord::new(x, 0, z), STONE);
            }
        }
        m.set(ChunkCoord::new(0, 0, 0), floor).unwrap();

        // Box resting exactly on top of the floor layer does not touch it.
        let resting = Aabb::from_center(Vec3::new(5.0, 2.0, 5.0), Vec3::new(0.5, 2.0, 0.5));
        assert!(!m.check_collision(&resting));
        let sunk = Aabb::from_center(Vec3::new(5.0, 1.75, 5.0), Vec3::new(0.5, 2.0, 0.5));
        assert!(m.check_collision(&sunk));

        // Neighbouring chunk is not loaded, so it counts as empty.
        let outside = Aabb::from_center(Vec3::new(-5.0, 0.5, 5.0), Vec3::ONE);
        assert!(!m.check_collision(&outside));

        let huge = Aabb::from_center(Vec3::new(0.0, 500.0, 0.0), Vec3::splat(100.0));
        assert!(m.check_collision(&huge));
    }

    #[test]
    fn collision_spans_chunk_seams() {
        let mut m = ChunkManager::new(config(16));
        let mut chunk = Chunk::empty();
        chunk.fill_voxel(LocalCoord::new(0, 0, 0), STONE);
        m.set(ChunkCoord::new(1, 0, 0), chunk).unwrap();
        // Straddles x = 32, the seam between chunk 0 and chunk 1.
        let seam = Aabb::from_center(Vec3::new(32.0, 0.5, 0.5), Vec3::new(1.0, 0.5, 0.5));
        assert!(m.check_collision(&seam));
    }

    #[test]
    fn serialize_keeps_only_modified_chunks() {
        let mut m = ChunkManager::new(config(16));
        m.set(ChunkCoord::new(0, 0, 0), Chunk::empty()).unwrap();
        m.set(ChunkCoord::new(1, -1, 2), modified_chunk(STONE)).unwrap();
        let map = m.serialize();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&ChunkCoord::new(1, -1, 2).key()));

        let mut restored = ChunkManager::new(config(16));
        restored.set(ChunkCoord::new(7, 7, 7), Chunk::empty()).unwrap();
        assert!(restored.deserialize(map).is_ok());
        assert_eq!(restored.len(), 1);
        assert_eq!(
            restored.get_voxel(ChunkCoord::new(1, -1, 2), LocalCoord::new(1, 2, 3)),
            STONE
        );
    }

    #[test]
    fn deserialize_is_all_or_nothing() {
        let mut m = ChunkManager::new(config(16));
        m.set(ChunkCoord::new(0, 0, 0), modified_chunk(DIRT)).unwrap();
        let mut bad = BTreeMap::new();
        bad.insert(ChunkCoord::new(1, 0, 0).key(), modified_chunk(STONE).to_data());
        bad.insert(
            ChunkCoord::new(2, 0, 0).key(),
            ChunkData {
                voxels: vec![0; 10],
                modified: true,
            },
        );
        assert!(matches!(
            m.deserialize(bad),
            Err(ChunkError::BadLength { actual: 10 })
        ));
        assert!(m.contains(ChunkCoord::new(0, 0, 0)));
        assert_eq!(m.len(), 1);
    }
}
