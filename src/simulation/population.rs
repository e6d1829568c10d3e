//! Vortex population lifecycle: spawn, merge, delete.
//!
//! `Population` is the single owner of the vortex array, the tracer array,
//! and both distance tables, and is the only place that mutates them
//! structurally. That keeps the central invariant in one spot: a vortex's
//! `slot` always equals its position in the dense array, and the slot is
//! the coordinate into the packed distance tables. Deleting a slot
//! renumbers every later vortex and compacts all three arrays together.
//!
//! Lifecycle operations run single-threaded between timesteps and never
//! overlap the RK4 stages.

use crate::rng::RandomSource;

use super::params::Parameters;
use super::radii::{TracerRadii, VortexRadii};
use super::states::{NVec2, Tracer, Vortex};

/// Result of one merge pass over the population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub spawns_left: usize, // unused spawn budget
    pub merges: usize,      // pairs merged
}

/// Signed-quadrature intensity combination: preserves the total squared
/// circulation rather than a simple sum, with the sign of the larger side.
pub fn merge_intensities(a: f64, b: f64) -> f64 {
    let magnitude = (a.signum() * a * a + b.signum() * b * b).abs().sqrt();
    if a + b > 0.0 {
        magnitude
    } else {
        -magnitude
    }
}

fn wrap_coord(p: f64, size: f64) -> f64 {
    if p < 0.0 {
        size + p % size
    } else if p > size {
        p % size
    } else {
        p
    }
}

/// The owning container for all simulation bodies and their distance
/// tables.
#[derive(Debug, Default)]
pub struct Population {
    vortices: Vec<Vortex>,
    tracers: Vec<Tracer>,
    vortex_radii: VortexRadii,
    tracer_radii: TracerRadii,
    next_id: u64,
}

impl Population {
    /// Empty population with a pre-built tracer set.
    pub fn with_tracers(tracers: Vec<Tracer>) -> Self {
        Self {
            vortices: Vec::new(),
            tracers,
            vortex_radii: VortexRadii::new(),
            tracer_radii: TracerRadii::new(),
            next_id: 0,
        }
    }

    /// Lay `count` tracers on a square lattice inside the domain, leaving a
    /// one-spacing gap to every edge (no tracer sits on the boundary).
    /// `count` must be a perfect square; the caller validates that.
    pub fn lattice_tracers(count: usize, domain_x: f64, domain_y: f64) -> Vec<Tracer> {
        let side = (count as f64).sqrt().round() as usize;
        debug_assert_eq!(side * side, count, "tracer count must be a perfect square");
        let sep_x = domain_x / (side as f64 + 1.0);
        let sep_y = domain_y / (side as f64 + 1.0);

        let mut tracers = Vec::with_capacity(count);
        for row in 1..=side {
            for col in 1..=side {
                tracers.push(Tracer {
                    slot: tracers.len(),
                    position: NVec2::new(col as f64 * sep_x, row as f64 * sep_y),
                    velocity: NVec2::zeros(),
                });
            }
        }
        tracers
    }

    pub fn vortex_count(&self) -> usize {
        self.vortices.len()
    }

    pub fn tracer_count(&self) -> usize {
        self.tracers.len()
    }

    pub fn vortices(&self) -> &[Vortex] {
        &self.vortices
    }

    pub fn vortices_mut(&mut self) -> &mut [Vortex] {
        &mut self.vortices
    }

    pub fn tracers(&self) -> &[Tracer] {
        &self.tracers
    }

    pub fn tracers_mut(&mut self) -> &mut [Tracer] {
        &mut self.tracers
    }

    pub fn vortex_radii(&self) -> &VortexRadii {
        &self.vortex_radii
    }

    pub fn tracer_radii(&self) -> &TracerRadii {
        &self.tracer_radii
    }

    /// Replace all bodies from a restored snapshot: slots are renumbered
    /// densely, the id counter resumes past the highest restored id, and
    /// both tables are rebuilt.
    pub fn restore_bodies(&mut self, vortices: Vec<Vortex>, tracers: Vec<Tracer>) {
        self.vortices = vortices;
        self.tracers = tracers;
        for (slot, v) in self.vortices.iter_mut().enumerate() {
            v.slot = slot;
        }
        for (slot, t) in self.tracers.iter_mut().enumerate() {
            t.slot = slot;
        }
        self.next_id = self
            .vortices
            .iter()
            .map(|v| v.id + 1)
            .max()
            .unwrap_or(self.next_id);
        self.refresh_radii();
    }

    /// Rebuild both authoritative distance tables from current positions.
    pub fn refresh_radii(&mut self) {
        self.vortex_radii.refresh(&self.vortices);
        self.tracer_radii.refresh(&self.tracers, &self.vortices);
    }

    /// Zero every body's velocity accumulator (timestep start).
    pub fn zero_velocities(&mut self) {
        for v in &mut self.vortices {
            v.velocity = NVec2::zeros();
        }
        for t in &mut self.tracers {
            t.velocity = NVec2::zeros();
        }
    }

    /// Advance every body once by `velocity * dt`.
    pub fn advance_positions(&mut self, dt: f64) {
        for v in &mut self.vortices {
            v.position += v.velocity * dt;
        }
        for t in &mut self.tracers {
            t.position += t.velocity * dt;
        }
    }

    /// Map bodies that left the primary domain back to the opposite side.
    /// The distance tables are stale afterwards; refresh before reading.
    pub fn wrap_positions(&mut self, params: &Parameters) {
        for v in &mut self.vortices {
            v.position.x = wrap_coord(v.position.x, params.domain_x);
            v.position.y = wrap_coord(v.position.y, params.domain_y);
        }
        for t in &mut self.tracers {
            t.position.x = wrap_coord(t.position.x, params.domain_x);
            t.position.y = wrap_coord(t.position.y, params.domain_y);
        }
    }

    /// Magnitude of the fastest vortex's blended velocity.
    pub fn max_velocity(&self) -> f64 {
        self.vortices
            .iter()
            .map(|v| v.velocity.norm())
            .fold(0.0, f64::max)
    }

    /// Smallest cached vortex pair separation.
    pub fn min_radius(&self) -> f64 {
        self.vortex_radii.min_radius()
    }

    fn take_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Normal intensity, rejection-resampled until its magnitude clears
    /// the minimum. Near-zero circulations would make the kernel
    /// ill-conditioned, so they are avoided by construction.
    fn sample_intensity(params: &Parameters, rng: &mut dyn RandomSource) -> f64 {
        loop {
            let intensity = rng.normal(params.intensity_sigma);
            if intensity.abs() >= params.min_intensity {
                return intensity;
            }
        }
    }

    /// Overwrite the vortex in `slot` with a freshly spawned one: next id,
    /// uniform random in-domain position, resampled intensity, zero
    /// velocity, current step as birth marker. Same effect as delete +
    /// spawn without the O(N) compaction.
    pub fn respawn_in_place(
        &mut self,
        slot: usize,
        params: &Parameters,
        rng: &mut dyn RandomSource,
        step: u64,
    ) {
        let id = self.take_id();
        let intensity = Self::sample_intensity(params, rng);
        let vort = &mut self.vortices[slot];
        vort.id = id;
        vort.position = NVec2::new(
            rng.uniform(0.0, params.domain_x),
            rng.uniform(0.0, params.domain_y),
        );
        vort.velocity = NVec2::zeros();
        vort.intensity = intensity;
        vort.birth_step = step;
    }

    /// Spawn `count` new vortices, growing the vortex array and both
    /// distance tables to 1.5x of the required total when capacity runs
    /// out. New table records are stale until the next refresh.
    pub fn spawn(
        &mut self,
        count: usize,
        params: &Parameters,
        rng: &mut dyn RandomSource,
        step: u64,
    ) {
        let required = self.vortices.len() + count;
        if required > self.vortices.capacity() {
            let target = required + required / 2;
            self.vortices.reserve_exact(target - self.vortices.len());
            self.vortex_radii.reserve_slots(target);
            self.tracer_radii.reserve_slots(target, self.tracers.len());
        }

        for _ in 0..count {
            let slot = self.vortices.len();
            let id = self.take_id();
            let intensity = Self::sample_intensity(params, rng);
            self.vortices.push(Vortex {
                id,
                slot,
                position: NVec2::new(
                    rng.uniform(0.0, params.domain_x),
                    rng.uniform(0.0, params.domain_y),
                ),
                velocity: NVec2::zeros(),
                intensity,
                birth_step: step,
            });
        }

        let n = self.vortices.len();
        self.vortex_radii.resize_slots(n);
        self.tracer_radii.resize_slots(n, self.tracers.len());
    }

    /// Remove one vortex: compact both distance tables and the vortex
    /// array in place and decrement the slot of every later vortex. O(N);
    /// the respawn-in-place path above is the fast path.
    pub fn delete(&mut self, slot: usize) {
        let n = self.vortices.len();
        assert!(slot < n, "delete of out-of-range slot {slot}");
        self.vortex_radii.remove_slot(slot, n);
        self.tracer_radii.remove_vortex(slot, self.tracers.len());
        self.vortices.remove(slot);
        for v in &mut self.vortices[slot..] {
            v.slot -= 1;
        }
    }

    /// Find and merge every vortex pair closer than the merge radius.
    ///
    /// The lower slot receives the |intensity|-weighted centroid and the
    /// signed-quadrature intensity; the higher slot is respawned in place
    /// while spawn budget remains (the respawn consumes one budget unit
    /// and never reuses the merged result), otherwise deleted. Every merge
    /// shifts indices, so the scan restarts from scratch and the operation
    /// terminates only when a full pass finds no merges.
    pub fn merge(
        &mut self,
        spawns_left: usize,
        params: &Parameters,
        rng: &mut dyn RandomSource,
        step: u64,
    ) -> MergeOutcome {
        let mut spawns_left = spawns_left;
        let mut total = 0usize;

        loop {
            let mut merged_this_pass = false;

            'scan: for hi in 1..self.vortices.len() {
                for lo in 0..hi {
                    if self.vortex_radii.magnitude(lo, hi) >= params.merge_radius {
                        continue;
                    }
                    merged_this_pass = true;
                    total += 1;

                    let (pos_lo, int_lo) =
                        (self.vortices[lo].position, self.vortices[lo].intensity);
                    let (pos_hi, int_hi) =
                        (self.vortices[hi].position, self.vortices[hi].intensity);

                    let w_lo = int_lo.abs();
                    let w_hi = int_hi.abs();
                    let centroid = (pos_lo * w_lo + pos_hi * w_hi) / (w_lo + w_hi);

                    let survivor = &mut self.vortices[lo];
                    survivor.position = centroid;
                    survivor.intensity = merge_intensities(int_lo, int_hi);

                    if spawns_left > 0 {
                        spawns_left -= 1;
                        self.respawn_in_place(hi, params, rng, step);
                    } else {
                        self.delete(hi);
                    }
                    self.refresh_radii();
                    break 'scan;
                }
            }

            if !merged_this_pass {
                break;
            }
        }

        MergeOutcome { spawns_left, merges: total }
    }
}
