//! Core state types for the point-vortex simulation.
//!
//! Defines the two body kinds advanced by the engine:
//! - `Vortex` — an active point source of rotational flow
//! - `Tracer` — a passive marker advected by the flow field
//!
//! Positions and velocities use `NVec2` (`nalgebra::Vector2<f64>`).

use nalgebra::Vector2;
pub type NVec2 = Vector2<f64>;

#[derive(Debug, Clone)]
pub struct Vortex {
    pub id: u64, // persistent id, monotonic across the run
    pub slot: usize, // dense index; always equals the vortex's position in the array
    pub position: NVec2, // position in the primary domain
    pub velocity: NVec2, // RK4-blended velocity accumulator for the current step
    pub intensity: f64, // signed circulation strength
    pub birth_step: u64, // timestep the vortex was created on
}

#[derive(Debug, Clone)]
pub struct Tracer {
    pub slot: usize, // fixed for the run
    pub position: NVec2,
    pub velocity: NVec2, // RK4-blended velocity accumulator for the current step
}
