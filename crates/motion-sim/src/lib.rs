//! Simulated axis hardware.
//!
//! [`SimAxis`] implements the full [`AxisSpi`] boundary in memory, with
//! optional realistic motion timing so that stop, abort and cancellation
//! can interrupt a move in flight. It backs the engine's integration
//! tests and is useful for bring-up when no controller is on the bench.

mod sim_axis;

pub use sim_axis::{SimAxis, SimAxisBuilder, SimMode};
