//! # Pull Machine Core Library
//!
//! This crate is the core library for the `pull_machine` application: a sensor pipeline
//! for a pull-training machine whose arm drives a hydraulic piston. A microcontroller
//! streams `"<angle>;<pressure>\r\n"` frames over a serial link; the library turns them
//! into piston kinematics, force and power, keeps a rolling history for display, and
//! records sessions to CSV on demand.
//!
//! ## Crate Structure
//!
//! - **`acquisition`**: Frame parsing, the shared latest-reading slot, frame sources
//!   (serial port, simulated sensor) and the background acquisition worker.
//! - **`config`**: Layered configuration (defaults, TOML, environment) via `figment`.
//! - **`data`**: The time-windowed history, the recording buffer and recording writers.
//! - **`error`**: The `PullMachineError` enum used across the crate.
//! - **`kinematics`**: Sliding windows, the linkage geometry and the per-tick derivation
//!   engine.
//! - **`logging`**: `tracing` subscriber setup.
//! - **`measurement_types`**: Derived samples and recording rows.
//! - **`sampler`**: The periodic tokio task that ticks a session.
//! - **`session`**: `PullMachine`, which wires everything together behind the control
//!   and renderer contracts.

pub mod acquisition;
pub mod config;
pub mod data;
pub mod error;
pub mod kinematics;
pub mod logging;
pub mod measurement_types;
pub mod sampler;
pub mod session;

pub use config::PullMachineConfig;
pub use error::{AppResult, PullMachineError};
pub use session::{DisplaySnapshot, LinkState, PullMachine};
