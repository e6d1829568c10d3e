//! Simulation context and per-timestep orchestration.
//!
//! `Simulation` is the explicit context object threaded through every
//! component: current timestep, timestep size, population, integrator,
//! random source, and output sinks. One call to [`Simulation::step`] runs
//! the full timestep lifecycle:
//!
//! spawn/merge → RK4 (4 stages) → position wrap → radius refresh →
//! snapshot/frame hooks.

use std::time::Instant;

use thiserror::Error;
use tracing::info;

use crate::configuration::config::{ConfigError, InitialConditionConfig, ScenarioConfig};
use crate::io::{FrameSink, Snapshot, SnapshotSink};
use crate::rng::RandomSource;

use super::integrator::{Rk4Integrator, WorkerPool};
use super::kernel::PeriodicVelocityKernel;
use super::params::Parameters;
use super::population::Population;
use super::states::NVec2;

/// Near-field cutoff applied to the tracer kernel in the single-probe
/// configuration, where the tracer starts on top of a vortex.
const PROBE_CUTOFF: f64 = 0.1;

/// Simulated-time horizon of the corotating-pair analytic run.
const ANALYTIC_T_END: f64 = 50.0;

/// Startup failure: bad scenario or no worker pool.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build the worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Running,
    /// The analytic run reached its simulated-time horizon.
    Finished,
}

/// Fully-initialized simulation: parameters, population, integrator, and
/// the collaborator interfaces the engine consumes.
pub struct Simulation {
    params: Parameters,
    population: Population,
    integrator: Rk4Integrator,
    rng: Box<dyn RandomSource>,
    frames: Box<dyn FrameSink>,
    snapshots: Box<dyn SnapshotSink>,
    initial_condition: InitialConditionConfig,
    current_step: u64,
    dt: f64,      // current timestep size; differs from params.dt only in the adaptive case
    elapsed: f64, // simulated time, tracked for the analytic horizon
    total_merges: u64,
}

impl Simulation {
    /// Build a runnable simulation from a validated scenario.
    pub fn build(
        cfg: ScenarioConfig,
        rng: Box<dyn RandomSource>,
        frames: Box<dyn FrameSink>,
        snapshots: Box<dyn SnapshotSink>,
    ) -> Result<Self, BuildError> {
        cfg.validate()?;

        let params = Parameters {
            domain_x: cfg.domain.width,
            domain_y: cfg.domain.height,
            dt: cfg.parameters.dt,
            steps: cfg.parameters.steps,
            merge_radius: cfg.parameters.merge_radius,
            spawn_rate: cfg.parameters.spawn_rate,
            intensity_sigma: cfg.parameters.intensity_sigma,
            min_intensity: cfg.parameters.min_intensity,
            images: cfg.parameters.images,
            workers: cfg.parameters.workers,
            lifecycle: cfg.parameters.lifecycle,
            render_every: cfg.parameters.render_every.max(1),
            save_snapshots: cfg.parameters.save_snapshots,
        };

        let kernel = PeriodicVelocityKernel {
            domain_x: params.domain_x,
            domain_y: params.domain_y,
            images: params.images,
            probe_cutoff: match cfg.initial_condition {
                InitialConditionConfig::SingleTracerProbe => Some(PROBE_CUTOFF),
                _ => None,
            },
        };
        let pool = WorkerPool::new(params.workers)?;
        let integrator = Rk4Integrator::new(kernel, pool);

        let tracers = Population::lattice_tracers(
            cfg.population.tracers,
            params.domain_x,
            params.domain_y,
        );
        let mut population = Population::with_tracers(tracers);

        let mut rng = rng;
        let initial_vortices = match cfg.initial_condition {
            InitialConditionConfig::CorotatingPair { .. } => 2,
            _ => cfg.population.vortices,
        };
        population.spawn(initial_vortices, &params, rng.as_mut(), 0);

        match cfg.initial_condition {
            InitialConditionConfig::Random => {}
            InitialConditionConfig::CorotatingPair { separation, intensity } => {
                let center = NVec2::new(params.domain_x / 2.0, params.domain_y / 2.0);
                let offset = NVec2::new(separation / 2.0, 0.0);
                let vortices = population.vortices_mut();
                vortices[0].position = center - offset;
                vortices[0].intensity = intensity;
                vortices[1].position = center + offset;
                vortices[1].intensity = intensity;
            }
            InitialConditionConfig::SingleTracerProbe => {
                let on_vortex = population.vortices()[0].position;
                population.tracers_mut()[0].position = on_vortex;
            }
        }

        population.refresh_radii();

        let dt = params.dt;
        Ok(Self {
            params,
            population,
            integrator,
            rng,
            frames,
            snapshots,
            initial_condition: cfg.initial_condition,
            current_step: 0,
            dt,
            elapsed: 0.0,
            total_merges: 0,
        })
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn population_mut(&mut self) -> &mut Population {
        &mut self.population
    }

    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn total_merges(&self) -> u64 {
        self.total_merges
    }

    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    /// Replace the population from a saved snapshot and resume from its
    /// timestep.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.current_step = snapshot.step;
        self.population
            .restore_bodies(snapshot.vortices, snapshot.tracers);
    }

    /// Advance the simulation by one timestep.
    pub fn step(&mut self) -> anyhow::Result<StepOutcome> {
        if self.current_step % self.params.render_every == 0 {
            self.frames.frame(
                self.current_step,
                self.population.vortices(),
                self.population.tracers(),
            );
        }

        // The analytic corotating pair is the one place the timestep
        // adapts: keep the per-step rotation bounded by the current
        // minimum separation, capped at the configured dt.
        if matches!(
            self.initial_condition,
            InitialConditionConfig::CorotatingPair { .. }
        ) {
            let min_r = self.population.min_radius();
            let max_v = self.population.max_velocity();
            self.dt = if max_v > 0.0 {
                (min_r / max_v * 0.5).min(self.params.dt)
            } else {
                self.params.dt
            };
            self.elapsed += self.dt;
            if self.elapsed > ANALYTIC_T_END {
                return Ok(StepOutcome::Finished);
            }
        }

        let started = Instant::now();

        let mut merges = 0;
        if self.params.lifecycle {
            let spawn_count = self.rng.poisson(self.params.spawn_rate, self.dt) as usize;
            let outcome =
                self.population
                    .merge(spawn_count, &self.params, self.rng.as_mut(), self.current_step);
            self.population.spawn(
                outcome.spawns_left,
                &self.params,
                self.rng.as_mut(),
                self.current_step,
            );
            self.population.refresh_radii();
            // fresh spawns may have landed inside the merge radius
            let followup =
                self.population
                    .merge(0, &self.params, self.rng.as_mut(), self.current_step);
            merges = outcome.merges + followup.merges;
            self.total_merges += merges as u64;
        }

        self.integrator.advance(&mut self.population, self.dt);
        self.population.wrap_positions(&self.params);
        // wrapping can teleport bodies across the domain, so the cached
        // radii are rebuilt; once per timestep this is negligible
        self.population.refresh_radii();

        if self.params.save_snapshots {
            self.snapshots.save(Snapshot {
                step: self.current_step,
                seed: self.rng.seed(),
                vortices: self.population.vortices().to_vec(),
                tracers: self.population.tracers().to_vec(),
            })?;
        }

        info!(
            step = self.current_step,
            vortices = self.population.vortex_count(),
            merges,
            seconds = started.elapsed().as_secs_f64(),
            "step complete"
        );

        self.current_step += 1;
        Ok(StepOutcome::Running)
    }

    /// Run until the configured step count (or forever when steps == 0, or
    /// until the analytic horizon in the corotating-pair case).
    pub fn run(&mut self) -> anyhow::Result<()> {
        let started = Instant::now();
        info!(
            seed = self.rng.seed(),
            vortices = self.population.vortex_count(),
            tracers = self.population.tracer_count(),
            workers = self.params.workers,
            "starting simulation"
        );

        while self.params.steps == 0 || self.current_step < self.params.steps {
            if self.step()? == StepOutcome::Finished {
                break;
            }
        }

        info!(
            steps = self.current_step,
            total_merges = self.total_merges,
            runtime = started.elapsed().as_secs_f64(),
            "simulation complete"
        );
        Ok(())
    }
}
