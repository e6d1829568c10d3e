//! Configuration types for loading simulation scenarios from YAML.
//!
//! A scenario consists of:
//!
//! - [`DomainConfig`]     – primary domain extent
//! - [`ParametersConfig`] – numerical parameters and lifecycle settings
//! - [`PopulationConfig`] – initial vortex/tracer counts
//! - [`ScenarioConfig`]   – top-level wrapper used to load from YAML
//!
//! # YAML format
//! An example scenario YAML matching these types:
//!
//! ```yaml
//! domain:
//!   width: 10.0
//!   height: 10.0
//!
//! parameters:
//!   dt: 0.01                # timestep size (cap, in the adaptive case)
//!   steps: 1000             # 0 = run unbounded
//!   merge_radius: 0.05      # pair separation that triggers a merge
//!   spawn_rate: 0.5         # mean vortex spawns per unit time
//!   intensity_sigma: 1.0    # stddev of spawned intensities
//!   min_intensity: 0.001    # rejection threshold for near-zero intensities
//!   images: 8               # periodic images, 0 disables wrapping
//!   workers: 4              # fixed worker pool size
//!   lifecycle: true         # spawn/merge/delete between timesteps
//!   render_every: 25        # frame sink cadence
//!   save_snapshots: false
//!
//! population:
//!   vortices: 20
//!   tracers: 64             # must be a perfect square (lattice layout)
//!
//! initial_condition: random # or corotating_pair / single_tracer_probe
//! seed: 42                  # omit to seed from the wall clock
//! ```

use serde::Deserialize;
use thiserror::Error;

/// A scenario that cannot be simulated. All of these are fatal at startup,
/// before the simulation begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("tracer count {0} is not a perfect square; the lattice layout requires one")]
    TracerCountNotSquare(usize),

    #[error("{name} must be positive (got {value})")]
    NonPositive { name: &'static str, value: f64 },

    #[error("periodic image count must be at most 8 (got {0})")]
    TooManyImages(usize),

    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("single_tracer_probe requires exactly one tracer (got {0})")]
    ProbeTracerCount(usize),

    #[error("corotating_pair requires a positive separation (got {0})")]
    ProbeSeparation(f64),
}

/// Primary domain extent.
#[derive(Deserialize, Debug, Clone)]
pub struct DomainConfig {
    pub width: f64,
    pub height: f64,
}

/// Global numerical and lifecycle parameters for a scenario.
#[derive(Deserialize, Debug, Clone)]
pub struct ParametersConfig {
    pub dt: f64,                 // timestep size (or cap)
    #[serde(default)]
    pub steps: u64,              // total steps, 0 = unbounded
    pub merge_radius: f64,       // merge threshold
    #[serde(default)]
    pub spawn_rate: f64,         // mean spawns per unit time
    pub intensity_sigma: f64,    // intensity distribution width
    #[serde(default = "default_min_intensity")]
    pub min_intensity: f64,      // rejection threshold
    #[serde(default = "default_images")]
    pub images: usize,           // periodic image count
    #[serde(default = "default_workers")]
    pub workers: usize,          // worker pool size
    #[serde(default = "default_lifecycle")]
    pub lifecycle: bool,         // spawn/merge/delete enabled
    #[serde(default = "default_render_every")]
    pub render_every: u64,       // frame sink cadence
    #[serde(default)]
    pub save_snapshots: bool,    // snapshot sink every step
}

fn default_min_intensity() -> f64 {
    0.001
}

fn default_images() -> usize {
    8
}

fn default_workers() -> usize {
    1
}

fn default_lifecycle() -> bool {
    true
}

fn default_render_every() -> u64 {
    1
}

/// Initial body counts.
#[derive(Deserialize, Debug, Clone)]
pub struct PopulationConfig {
    pub vortices: usize,
    pub tracers: usize,
}

/// Which canned initial condition to start from.
#[derive(Deserialize, Debug, Clone, Default)]
pub enum InitialConditionConfig {
    /// Uniformly random vortex positions (the production setup).
    #[default]
    #[serde(rename = "random")]
    Random,

    /// Two equal vortices at a known separation. Enables the adaptive-dt
    /// analytic self-check: the pair corotates at `intensity / (pi d^2)`.
    #[serde(rename = "corotating_pair")]
    CorotatingPair { separation: f64, intensity: f64 },

    /// One tracer placed directly on the first vortex; the kernel's
    /// near-field cutoff keeps the probe out of the singular core.
    #[serde(rename = "single_tracer_probe")]
    SingleTracerProbe,
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone)]
pub struct ScenarioConfig {
    pub domain: DomainConfig,
    pub parameters: ParametersConfig,
    pub population: PopulationConfig,
    #[serde(default)]
    pub initial_condition: InitialConditionConfig,
    #[serde(default)]
    pub seed: Option<u64>, // omit to seed from the wall clock
}

impl ScenarioConfig {
    /// Reject scenarios the engine cannot run. Fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
            if value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::NonPositive { name, value })
            }
        }

        positive("domain.width", self.domain.width)?;
        positive("domain.height", self.domain.height)?;
        positive("parameters.dt", self.parameters.dt)?;
        positive("parameters.merge_radius", self.parameters.merge_radius)?;
        positive("parameters.intensity_sigma", self.parameters.intensity_sigma)?;
        positive("parameters.min_intensity", self.parameters.min_intensity)?;

        if self.parameters.images > 8 {
            return Err(ConfigError::TooManyImages(self.parameters.images));
        }
        if self.parameters.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }

        let tracers = self.population.tracers;
        let side = (tracers as f64).sqrt().round() as usize;
        if side * side != tracers {
            return Err(ConfigError::TracerCountNotSquare(tracers));
        }

        match self.initial_condition {
            InitialConditionConfig::SingleTracerProbe if tracers != 1 => {
                Err(ConfigError::ProbeTracerCount(tracers))
            }
            InitialConditionConfig::CorotatingPair { separation, .. } if separation <= 0.0 => {
                Err(ConfigError::ProbeSeparation(separation))
            }
            _ => Ok(()),
        }
    }
}
