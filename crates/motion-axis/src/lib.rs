//! Axis command-execution engine.
//!
//! [`Axis`] is the state machine that turns cooked-unit motion requests
//! into raw-unit hardware commands: it enforces soft travel limits
//! before anything reaches the device, runs every motion command as an
//! asynchronous cancellable [`PendingCommand`], and keeps the
//! `{enabled, initialized, stopped, ready}` flags consistent across
//! every completion path.
//!
//! The engine is device-agnostic: all hardware access goes through the
//! [`motion_core::AxisSpi`] boundary, so a TCP controller, a Modbus
//! drive and a simulation are interchangeable behind the same type.
//! [`AxisArray`] composes a fixed set of axes over one configuration
//! namespace.

mod array;
mod axis;
mod limits;
mod pending;

pub use array::{AxisArray, AxisMember};
pub use axis::{Axis, AxisDefaults, AxisFlags};
pub use limits::TravelLimits;
pub use pending::PendingCommand;
