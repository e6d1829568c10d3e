//! Pairwise distance tables for vortices and tracers.
//!
//! Two tables back the velocity kernel:
//! - [`VortexRadii`] — a packed symmetric matrix over the N vortex slots,
//! - [`TracerRadii`] — a rectangular tracer x vortex matrix.
//!
//! Both store one record per pair: (magnitude, dx, dy), flattened into a
//! `Vec<f64>`. The packed layout is a perfect hash over unordered slot
//! pairs: no collisions, no search, and the whole table can be walked by
//! incrementing an offset.

use super::states::{Tracer, Vortex};

/// Entries per record: magnitude, dx, dy.
pub const RECORD: usize = 3;

/// Offset of the record for the unordered vortex pair (i, j), i != j.
///
/// Rows are indexed by the higher slot, columns by the lower, so the record
/// for (i, j) and (j, i) is the same and distinct pairs never collide.
#[inline]
pub fn index_vv(i: usize, j: usize) -> usize {
    debug_assert!(i != j, "a vortex has no distance record to itself");
    let (lo, hi) = if i < j { (i, j) } else { (j, i) };
    (hi * (hi - 1) / 2 + lo) * RECORD
}

/// Offset of the record for tracer `t` against vortex `v`, with
/// `vortex_count` columns per tracer row.
#[inline]
pub fn index_tv(t: usize, v: usize, vortex_count: usize) -> usize {
    (t * vortex_count + v) * RECORD
}

/// Number of f64 entries a packed vortex table needs for `n` slots.
#[inline]
pub fn vv_len(n: usize) -> usize {
    n.saturating_sub(1) * n / 2 * RECORD
}

/// Packed symmetric vortex <-> vortex distance table.
///
/// Sign convention: for slots a < b the stored delta is
/// `position[a] - position[b]` (fixed by ordering, not by which side wrote
/// the record).
#[derive(Debug, Clone, Default)]
pub struct VortexRadii {
    data: Vec<f64>,
}

impl VortexRadii {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Flat view of the table (records of [`RECORD`] entries).
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Cached separation magnitude for the pair (i, j).
    pub fn magnitude(&self, i: usize, j: usize) -> f64 {
        self.data[index_vv(i, j)]
    }

    /// Cached (dx, dy) for the pair (i, j), in stored (lower - higher) order.
    pub fn delta(&self, i: usize, j: usize) -> (f64, f64) {
        let base = index_vv(i, j);
        (self.data[base + 1], self.data[base + 2])
    }

    /// Smallest cached separation, 0.0 for fewer than two vortices.
    pub fn min_radius(&self) -> f64 {
        let mut min = f64::INFINITY;
        for record in self.data.chunks_exact(RECORD) {
            if record[0] < min {
                min = record[0];
            }
        }
        if min.is_finite() { min } else { 0.0 }
    }

    /// Pre-allocate backing storage for up to `slots` vortices.
    pub fn reserve_slots(&mut self, slots: usize) {
        let target = vv_len(slots);
        if target > self.data.capacity() {
            self.data.reserve_exact(target - self.data.len());
        }
    }

    /// Resize the table for `slots` vortices. Records for new pairs are
    /// zeroed and stale until the next [`VortexRadii::refresh`].
    pub fn resize_slots(&mut self, slots: usize) {
        self.data.resize(vv_len(slots), 0.0);
    }

    /// Recompute every record from current positions (Euclidean distance).
    ///
    /// The only full-rebuild operation; must run after any position change
    /// outside the integrator's own incremental updates (spawn, merge,
    /// boundary wrap). O(N^2), once per timestep phase.
    pub fn refresh(&mut self, vortices: &[Vortex]) {
        let n = vortices.len();
        self.data.resize(vv_len(n), 0.0);
        for hi in 1..n {
            for lo in 0..hi {
                let base = index_vv(lo, hi);
                let dx = vortices[lo].position.x - vortices[hi].position.x;
                let dy = vortices[lo].position.y - vortices[hi].position.y;
                self.data[base + 1] = dx;
                self.data[base + 2] = dy;
                self.data[base] = (dx * dx + dy * dy).sqrt();
            }
        }
    }

    /// Drop one slot's row and column, compacting the packed layout in
    /// place so every surviving pair keeps its record.
    ///
    /// Equivalent to rebuilding the table for the population with `slot`
    /// absent, without touching the magnitudes. O(N^2) scan; the caller is
    /// expected to reserve this for the no-spawn-budget path.
    pub fn remove_slot(&mut self, slot: usize, vortex_count: usize) {
        debug_assert!(slot < vortex_count);
        let survivors = vortex_count - 1;
        // Forward pass: every destination offset is <= its source offset,
        // so records are never read after being overwritten.
        for new_hi in 1..survivors {
            let old_hi = if new_hi >= slot { new_hi + 1 } else { new_hi };
            for new_lo in 0..new_hi {
                let old_lo = if new_lo >= slot { new_lo + 1 } else { new_lo };
                let src = index_vv(old_lo, old_hi);
                let dst = index_vv(new_lo, new_hi);
                if src != dst {
                    for k in 0..RECORD {
                        self.data[dst + k] = self.data[src + k];
                    }
                }
            }
        }
        self.data.truncate(vv_len(survivors));
    }
}

/// Rectangular tracer <-> vortex distance table.
///
/// Rows are tracers, columns are vortex slots. Stored delta is
/// `vortex - tracer`.
#[derive(Debug, Clone, Default)]
pub struct TracerRadii {
    data: Vec<f64>,
    vortex_cols: usize,
}

impl TracerRadii {
    pub fn new() -> Self {
        Self { data: Vec::new(), vortex_cols: 0 }
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Number of vortex columns per tracer row.
    pub fn vortex_cols(&self) -> usize {
        self.vortex_cols
    }

    pub fn magnitude(&self, t: usize, v: usize) -> f64 {
        self.data[index_tv(t, v, self.vortex_cols)]
    }

    /// Pre-allocate for up to `slots` vortices against `tracers` rows.
    pub fn reserve_slots(&mut self, slots: usize, tracers: usize) {
        let target = tracers * slots * RECORD;
        if target > self.data.capacity() {
            self.data.reserve_exact(target - self.data.len());
        }
    }

    /// Resize for `slots` vortex columns. Changing the column count shifts
    /// the row stride, so all records are stale until the next refresh.
    pub fn resize_slots(&mut self, slots: usize, tracers: usize) {
        self.data.resize(tracers * slots * RECORD, 0.0);
        self.vortex_cols = slots;
    }

    /// Recompute every record from current positions. O(N*T).
    pub fn refresh(&mut self, tracers: &[Tracer], vortices: &[Vortex]) {
        let n = vortices.len();
        self.data.resize(tracers.len() * n * RECORD, 0.0);
        self.vortex_cols = n;
        for tracer in tracers {
            for vort in vortices {
                let base = index_tv(tracer.slot, vort.slot, n);
                let dx = vort.position.x - tracer.position.x;
                let dy = vort.position.y - tracer.position.y;
                self.data[base + 1] = dx;
                self.data[base + 2] = dy;
                self.data[base] = (dx * dx + dy * dy).sqrt();
            }
        }
    }

    /// Drop one vortex column from every tracer row, compacting in place.
    pub fn remove_vortex(&mut self, slot: usize, tracers: usize) {
        let n = self.vortex_cols;
        debug_assert!(slot < n);
        let survivors = n - 1;
        for t in 0..tracers {
            for new_v in 0..survivors {
                let old_v = if new_v >= slot { new_v + 1 } else { new_v };
                let src = index_tv(t, old_v, n);
                let dst = index_tv(t, new_v, survivors);
                if src != dst {
                    for k in 0..RECORD {
                        self.data[dst + k] = self.data[src + k];
                    }
                }
            }
        }
        self.data.truncate(tracers * survivors * RECORD);
        self.vortex_cols = survivors;
    }
}
