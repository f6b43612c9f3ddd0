//! Linkage kinematics: smoothing windows, geometry and the per-tick derivation engine.

pub mod engine;
pub mod geometry;
pub mod window;

pub use engine::DerivationEngine;
pub use geometry::Linkage;
pub use window::SlidingWindow;
