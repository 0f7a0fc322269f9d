//! Core types and traits for rust-motion.
//!
//! This crate is the leaf of the workspace: it defines the error type,
//! move status codes, the [`spi::AxisSpi`] service-provider boundary that
//! device drivers implement, raw/cooked unit conversion, and the
//! persisted-configuration store abstraction. Everything else in the
//! workspace builds on these.

pub mod error;
pub mod spi;
pub mod status;
pub mod store;
pub mod units;

pub use error::{MotionError, MotionResult};
pub use spi::{AxisCapabilities, AxisSpi, Switches};
pub use status::MoveStatus;
pub use store::{ConfigStore, TomlStore};
pub use units::{clamp_scale, Calibration, MIN_SCALE_MAGNITUDE};

use std::time::Duration;

/// Timeout for joining background tasks during graceful shutdown.
///
/// Used when stopping transport reader tasks to allow cleanup before
/// forcing termination.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);
