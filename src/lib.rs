//! Finite-difference simulation of a vibrating 2D membrane.
//!
//! The membrane wave equation is discretised on a uniform grid and advanced
//! in time either by the explicit central-difference recurrence or by an
//! implicit θ-scheme whose sparse system is solved every step. The explicit
//! run is rendered as an animated 3D surface.

pub mod config;
pub mod grid;
pub mod operators;
pub mod problem;
pub mod simulation;
pub mod solver;
pub mod visualisation;

pub use config::Config;
pub use grid::UniformGrid;
pub use problem::{MembraneOscillation, ProblemData};
pub use simulation::{Scheme, Simulation, SimulationError, SimulationParams};
pub use solver::{SolverError, SolverOptions};
pub use visualisation::SurfaceAnimator;
