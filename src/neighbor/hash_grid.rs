use glam::Vec3;

use super::{BuildReport, NeighborSearch, MAX_GRID_RESOLUTION};
use crate::config::OverflowPolicy;
use crate::error::{capacity_overflow, PhysicsResult};
use crate::math::Aabb;
use crate::particle::Particle;

/// Uniform spatial hash grid.
///
/// Cells are keyed by `floor(position / spacing)` wrapped modulo the grid
/// resolution, so any volume fits a bounded bucket array. Buckets are stored
/// as one flat entry list with per-bucket start offsets.
#[derive(Debug, Clone)]
pub struct HashGridNeighborSearch {
    spacing: f32,
    resolution: [usize; 3],
    bucket_capacity: usize,
    overflow_policy: OverflowPolicy,
    /// `bucket_starts[k]..bucket_starts[k + 1]` is bucket `k` in `entries`.
    bucket_starts: Vec<u32>,
    entries: Vec<u32>,
    indices: Vec<usize>,
    cursor: Vec<u32>,
}

impl HashGridNeighborSearch {
    pub fn new(
        spacing: f32,
        resolution: [usize; 3],
        bucket_capacity: usize,
        overflow_policy: OverflowPolicy,
    ) -> Self {
        Self {
            spacing: spacing.max(f32::EPSILON),
            resolution: resolution.map(|r| r.clamp(2, MAX_GRID_RESOLUTION)),
            bucket_capacity: bucket_capacity.max(1),
            overflow_policy,
            bucket_starts: Vec::new(),
            entries: Vec::new(),
            indices: Vec::new(),
            cursor: Vec::new(),
        }
    }

    /// Resolution derived from the extent of `bounds`.
    pub fn for_bounds(
        bounds: &Aabb,
        spacing: f32,
        bucket_capacity: usize,
        overflow_policy: OverflowPolicy,
    ) -> Self {
        let size = bounds.size();
        let cells = |extent: f32| (extent / spacing).ceil().max(0.0) as usize + 1;
        Self::new(
            spacing,
            [cells(size.x), cells(size.y), cells(size.z)],
            bucket_capacity,
            overflow_policy,
        )
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn resolution(&self) -> [usize; 3] {
        self.resolution
    }

    fn bucket_count(&self) -> usize {
        self.resolution[0] * self.resolution[1] * self.resolution[2]
    }

    fn bucket_index(&self, position: Vec3) -> [i64; 3] {
        let cell = (position / self.spacing).floor();
        [cell.x as i64, cell.y as i64, cell.z as i64]
    }

    fn hash_key(&self, bucket: [i64; 3]) -> usize {
        let wrap = |value: i64, res: usize| value.rem_euclid(res as i64) as usize;
        let x = wrap(bucket[0], self.resolution[0]);
        let y = wrap(bucket[1], self.resolution[1]);
        let z = wrap(bucket[2], self.resolution[2]);
        (z * self.resolution[1] + y) * self.resolution[0] + x
    }

    /// The origin cell plus its neighbours toward the half of the cell the
    /// point lies in, one step per axis.
    fn nearby_keys_8(&self, origin: Vec3) -> [usize; 8] {
        let cell = self.bucket_index(origin);
        let mut step = [0i64; 3];
        for axis in 0..3 {
            let half = (cell[axis] as f32 + 0.5) * self.spacing;
            step[axis] = if half <= origin[axis] { 1 } else { -1 };
        }

        let mut keys = [0usize; 8];
        for (corner, key) in keys.iter_mut().enumerate() {
            let mut bucket = cell;
            if corner & 4 != 0 {
                bucket[0] += step[0];
            }
            if corner & 2 != 0 {
                bucket[1] += step[1];
            }
            if corner & 1 != 0 {
                bucket[2] += step[2];
            }
            *key = self.hash_key(bucket);
        }
        keys
    }

    /// Every cell overlapping the query sphere's bounding box.
    fn nearby_keys_range(&self, origin: Vec3, radius: f32) -> Vec<usize> {
        let lo = self.bucket_index(origin - Vec3::splat(radius));
        let hi = self.bucket_index(origin + Vec3::splat(radius));
        let mut keys = Vec::new();
        for z in lo[2]..=hi[2] {
            for y in lo[1]..=hi[1] {
                for x in lo[0]..=hi[0] {
                    keys.push(self.hash_key([x, y, z]));
                }
            }
        }
        keys
    }
}

impl NeighborSearch for HashGridNeighborSearch {
    fn build(&mut self, particles: &[Particle], indices: &[usize]) -> PhysicsResult<BuildReport> {
        let bucket_count = self.bucket_count();
        self.indices.clear();
        self.indices.extend_from_slice(indices);

        let keys: Vec<usize> = indices
            .iter()
            .map(|&global| self.hash_key(self.bucket_index(particles[global].predicted)))
            .collect();

        self.cursor.clear();
        self.cursor.resize(bucket_count, 0);
        for &key in &keys {
            self.cursor[key] += 1;
        }

        let fullest = self.cursor.iter().copied().max().unwrap_or(0) as usize;
        if fullest > self.bucket_capacity && self.overflow_policy == OverflowPolicy::Fail {
            return Err(capacity_overflow("hash grid bucket", self.bucket_capacity, fullest));
        }

        self.bucket_starts.clear();
        self.bucket_starts.reserve(bucket_count + 1);
        let mut total = 0u32;
        for count in self.cursor.iter_mut() {
            self.bucket_starts.push(total);
            total += (*count).min(self.bucket_capacity as u32);
            *count = 0;
        }
        self.bucket_starts.push(total);

        self.entries.clear();
        self.entries.resize(total as usize, 0);
        let mut dropped = 0;
        for (local, &key) in keys.iter().enumerate() {
            let start = self.bucket_starts[key];
            let end = self.bucket_starts[key + 1];
            let slot = start + self.cursor[key];
            if slot < end {
                self.entries[slot as usize] = local as u32;
                self.cursor[key] += 1;
            } else {
                dropped += 1;
            }
        }

        if dropped > 0 {
            log::warn!(
                "Hash grid bucket capacity {} exceeded (fullest bucket {}), dropped {} particles",
                self.bucket_capacity,
                fullest,
                dropped
            );
        }

        Ok(BuildReport {
            indexed: indices.len() - dropped,
            dropped,
        })
    }

    fn for_each_nearby<F>(&self, particles: &[Particle], origin: Vec3, radius: f32, mut f: F)
    where
        F: FnMut(usize, usize),
    {
        if self.entries.is_empty() {
            return;
        }

        let mut keys = if radius <= 0.5 * self.spacing {
            self.nearby_keys_8(origin).to_vec()
        } else {
            self.nearby_keys_range(origin, radius)
        };
        // Wrapped cells may alias to the same bucket.
        keys.sort_unstable();
        keys.dedup();

        let r2 = radius * radius;
        for key in keys {
            let start = self.bucket_starts[key] as usize;
            let end = self.bucket_starts[key + 1] as usize;
            for &local in &self.entries[start..end] {
                let global = self.indices[local as usize];
                if (particles[global].predicted - origin).length_squared() < r2 {
                    f(local as usize, global);
                }
            }
        }
    }

    fn len(&self) -> usize {
        self.indices.len()
    }
}
