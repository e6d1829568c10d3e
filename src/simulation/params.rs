//! Numerical and physical parameters for the simulation
//!
//! `Parameters` holds runtime settings:
//! - domain extent and timestep size,
//! - merge radius, spawn rate, intensity distribution,
//! - worker count and periodic image count

#[derive(Debug, Clone)]
pub struct Parameters {
    pub domain_x: f64, // domain width
    pub domain_y: f64, // domain height
    pub dt: f64, // timestep size (or cap, in the adaptive analytic case)
    pub steps: u64, // total step count, 0 = unbounded
    pub merge_radius: f64, // pair separation below which vortices merge
    pub spawn_rate: f64, // mean vortex spawns per unit time
    pub intensity_sigma: f64, // stddev of the normal intensity distribution
    pub min_intensity: f64, // rejection threshold for near-zero intensities
    pub images: usize, // periodic image count: 0 disables wrapping, 8 = full 3x3 tiling
    pub workers: usize, // fixed worker pool size
    pub lifecycle: bool, // enable spawn/merge/delete between timesteps
    pub render_every: u64, // frame sink cadence
    pub save_snapshots: bool, // snapshot sink every timestep
}
