pub mod simulation;
pub mod configuration;
pub mod rng;
pub mod io;

pub use simulation::states::{Vortex, Tracer, NVec2};
pub use simulation::params::Parameters;
pub use simulation::radii::{index_vv, index_tv, vv_len, VortexRadii, TracerRadii, RECORD};
pub use simulation::shared::{AtomicF64, SharedRadii};
pub use simulation::kernel::PeriodicVelocityKernel;
pub use simulation::integrator::{Rk4Integrator, WorkerPool};
pub use simulation::population::{Population, MergeOutcome, merge_intensities};
pub use simulation::engine::{Simulation, StepOutcome, BuildError};

pub use configuration::config::{
    ScenarioConfig, DomainConfig, ParametersConfig, PopulationConfig,
    InitialConditionConfig, ConfigError,
};

pub use rng::{RandomSource, SeededSource};
pub use io::{FrameSink, SnapshotSink, NullFrameSink, MemorySnapshotStore, Snapshot};
