pub mod states;
pub mod params;
pub mod radii;
pub mod shared;
pub mod kernel;
pub mod integrator;
pub mod population;
pub mod engine;
