//! Parallel RK4 time-stepper for the vortex population.
//!
//! One call to [`Rk4Integrator::advance`] moves every vortex and tracer
//! forward by one timestep using classical 4th-order Runge-Kutta: four
//! ordered stages, each producing a velocity sample, blended 1:2:2:1.
//!
//! Per stage the work is fanned across a fixed worker pool in two
//! barrier-joined phases: a contiguous chunk of tracers per worker, then
//! one work unit per vortex. The ordering is mandatory — stage k+1 reads
//! the intermediate distances written by stage k, and the tracer rows must
//! be rebuilt before the vortex units add their column contributions.
//!
//! Buffer discipline within one timestep:
//! - `working` is the authoritative post-previous-stage vortex distance
//!   state, mutated exactly once per stage by every vortex's worker via
//!   CAS accumulation;
//! - `intermediate` is the snapshot velocities are *read* from during a
//!   stage, overwritten in bulk from `working` between stages, after which
//!   `working` resets to the timestep-start snapshot.
//!
//! This does not refresh the authoritative radius tables; the caller wraps
//! positions and calls the population's refresh afterwards.

use super::kernel::PeriodicVelocityKernel;
use super::population::Population;
use super::radii::{index_tv, index_vv};
use super::shared::SharedRadii;
use super::states::{Tracer, Vortex};

/// RK4 blend weights for stages k1..k4 (divided by 6 when applied).
const STAGE_WEIGHTS: [f64; 4] = [1.0, 2.0, 2.0, 1.0];

/// How far each stage advances the intermediate state: half a step after
/// k1 and k2, a full step after k3 and k4 (the k4 advance is never read,
/// matching the reference scheme).
const STAGE_ADVANCE: [f64; 4] = [0.5, 0.5, 1.0, 1.0];

/// Fixed pool of workers with fork-join submission.
///
/// Work units for one phase are submitted together and the phase blocks
/// until every unit completes; that barrier is the only stage-boundary
/// synchronization. A pool of size 1 runs the same closures inline on the
/// caller's thread, which is the reference behavior for correctness
/// testing of the parallel path.
pub struct WorkerPool {
    pool: Option<rayon::ThreadPool>,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        if workers <= 1 {
            return Ok(Self { pool: None, workers: 1 });
        }
        let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
        Ok(Self { pool: Some(pool), workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run all units to completion before returning (fork-join barrier).
    pub fn run<'env>(&self, units: Vec<Box<dyn FnOnce() + Send + 'env>>) {
        match &self.pool {
            None => {
                for unit in units {
                    unit();
                }
            }
            Some(pool) => pool.scope(|s| {
                for unit in units {
                    s.spawn(move |_| unit());
                }
            }),
        }
    }
}

/// Split `slice` into `workers` contiguous chunks of equal size, with the
/// remainder appended to the last chunk.
fn split_even<T>(slice: &mut [T], workers: usize) -> Vec<&mut [T]> {
    let n = slice.len();
    if n == 0 {
        return Vec::new();
    }
    let workers = workers.max(1);
    let chunk = n / workers;
    if chunk == 0 {
        return vec![slice];
    }
    let mut chunks = Vec::with_capacity(workers);
    let mut rest = slice;
    for _ in 0..workers - 1 {
        let (head, tail) = rest.split_at_mut(chunk);
        chunks.push(head);
        rest = tail;
    }
    chunks.push(rest);
    chunks
}

/// The RK4 stepper: velocity kernel plus the worker pool the stages fan
/// their work units across.
pub struct Rk4Integrator {
    kernel: PeriodicVelocityKernel,
    pool: WorkerPool,
}

impl Rk4Integrator {
    pub fn new(kernel: PeriodicVelocityKernel, pool: WorkerPool) -> Self {
        Self { kernel, pool }
    }

    pub fn kernel(&self) -> &PeriodicVelocityKernel {
        &self.kernel
    }

    /// Advance the whole population by one timestep of size `dt`.
    ///
    /// On return every body's velocity holds the blended RK4 sample
    /// (callers use it for the max-velocity diagnostic) and positions have
    /// advanced once by `velocity * dt`. The authoritative distance tables
    /// are stale; refresh them after wrapping positions.
    pub fn advance(&self, population: &mut Population, dt: f64) {
        let tracer_count = population.tracer_count();

        // Timestep-start snapshots of the authoritative tables. Both the
        // working and intermediate buffers are seeded from these and
        // discarded at the end of the step.
        let auth_vv: Vec<f64> = population.vortex_radii().data().to_vec();
        let auth_tv: Vec<f64> = population.tracer_radii().data().to_vec();

        let mut inter_vv = auth_vv.clone();
        let working_vv = SharedRadii::from_slice(&auth_vv);
        let inter_tv = SharedRadii::from_slice(&auth_tv);

        // Intensities are constant within a timestep (lifecycle never
        // overlaps RK4 stages); snapshot them so vortex work units can
        // read all intensities while mutating their own vortex.
        let intensities: Vec<f64> =
            population.vortices().iter().map(|v| v.intensity).collect();

        population.zero_velocities();

        for stage in 0..4 {
            let weight = STAGE_WEIGHTS[stage] / 6.0;
            let advance = STAGE_ADVANCE[stage];

            // Phase A: tracer chunks. Each unit owns a contiguous block of
            // tracers; it reads only its own rows of the intermediate
            // tracer table and rebuilds them, so writers never overlap.
            {
                let kernel = &self.kernel;
                let ints = &intensities;
                let auth = &auth_tv;
                let inter = &inter_tv;
                let mut units: Vec<Box<dyn FnOnce() + Send + '_>> = Vec::new();
                for chunk in split_even(population.tracers_mut(), self.pool.workers()) {
                    units.push(Box::new(move || {
                        for tracer in chunk {
                            step_tracer(kernel, tracer, ints, auth, inter, dt, weight, advance);
                        }
                    }));
                }
                self.pool.run(units);
            }

            // Phase B: one unit per vortex. Units read the intermediate
            // vortex table, CAS-accumulate into the shared working table,
            // and each writes its own column of the tracer table.
            {
                let kernel = &self.kernel;
                let ints = &intensities;
                let inter = &inter_vv[..];
                let working = &working_vv;
                let tv = &inter_tv;
                let mut units: Vec<Box<dyn FnOnce() + Send + '_>> = Vec::new();
                for vort in population.vortices_mut() {
                    units.push(Box::new(move || {
                        step_vortex(
                            kernel,
                            vort,
                            ints,
                            inter,
                            working,
                            tv,
                            tracer_count,
                            dt,
                            weight,
                            advance,
                        );
                    }));
                }
                self.pool.run(units);
            }

            // Fold the stage's accumulated state into the intermediate
            // snapshot, then reset the working table so the next stage's
            // accumulation starts clean from the timestep-start state.
            working_vv.copy_into(&mut inter_vv);
            working_vv.copy_from(&auth_vv);
        }

        // Positions advance exactly once, by the blended velocity.
        population.advance_positions(dt);
    }
}

/// Tracer work: sample the kernel, accumulate the weighted velocity, and
/// rebuild this tracer's row of the intermediate table as the
/// timestep-start record displaced by this stage's (possibly halved)
/// velocity. The rebuild replaces, not compounds, the previous stage's
/// displacement.
#[allow(clippy::too_many_arguments)]
fn step_tracer(
    kernel: &PeriodicVelocityKernel,
    tracer: &mut Tracer,
    intensities: &[f64],
    auth_tv: &[f64],
    inter_tv: &SharedRadii,
    dt: f64,
    weight: f64,
    advance: f64,
) {
    let n = intensities.len();
    let vel = kernel.tracer_velocity(tracer.slot, intensities, inter_tv);
    tracer.velocity += weight * vel;

    let adj = advance * vel;
    for vort in 0..n {
        let base = index_tv(tracer.slot, vort, n);
        // stored delta is (vortex - tracer): the tracer moving by adj*dt
        // subtracts from it
        let dx = auth_tv[base + 1] - adj.x * dt;
        let dy = auth_tv[base + 2] - adj.y * dt;
        inter_tv.store(base + 1, dx);
        inter_tv.store(base + 2, dy);
        inter_tv.store(base, (dx * dx + dy * dy).sqrt());
    }
}

/// Vortex work: sample the kernel, accumulate the weighted velocity, then
/// publish this vortex's displacement into every shared pair record (CAS)
/// and into its own tracer-table column (single writer, plain stores).
#[allow(clippy::too_many_arguments)]
fn step_vortex(
    kernel: &PeriodicVelocityKernel,
    vort: &mut Vortex,
    intensities: &[f64],
    inter_vv: &[f64],
    working_vv: &SharedRadii,
    inter_tv: &SharedRadii,
    tracer_count: usize,
    dt: f64,
    weight: f64,
    advance: f64,
) {
    let n = intensities.len();
    let slot = vort.slot;
    let vel = kernel.vortex_velocity(slot, intensities, inter_vv);
    vort.velocity += weight * vel;

    let adj = advance * vel;
    for other in 0..n {
        if other == slot {
            continue;
        }
        let base = index_vv(slot, other);
        // The stored delta is position[lower] - position[higher], so the
        // sign of the contribution is fixed by slot order, not by which
        // side of the pair publishes it.
        let sign = if slot < other { 1.0 } else { -1.0 };
        working_vv.accumulate(base + 1, sign * adj.x * dt);
        working_vv.accumulate(base + 2, sign * adj.y * dt);
        // Magnitude from the current component snapshot, after both
        // component updates have landed.
        working_vv.refresh_magnitude(base);
    }

    // This vortex's column of the tracer table: stored delta is
    // (vortex - tracer), so the vortex moving by adj*dt adds to it. Only
    // this worker ever writes the column in this phase.
    for t in 0..tracer_count {
        let base = index_tv(t, slot, n);
        let dx = inter_tv.load(base + 1) + adj.x * dt;
        let dy = inter_tv.load(base + 2) + adj.y * dt;
        inter_tv.store(base + 1, dx);
        inter_tv.store(base + 2, dy);
        inter_tv.store(base, (dx * dx + dy * dy).sqrt());
    }
}
