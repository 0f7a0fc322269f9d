//! The axis service-provider boundary.
//!
//! [`AxisSpi`] is the raw-unit command set a concrete device driver
//! implements for the axis engine. The engine owns all cooked-unit
//! conversion, soft-limit enforcement and the busy/state discipline;
//! implementers only speak raw units to their hardware.
//!
//! Every method is async and thread-safe (`Send + Sync`) so one driver
//! instance can be shared behind an `Arc<dyn AxisSpi>`. An operation
//! whose underlying transport is unavailable fails with
//! [`MotionError::Communication`].
//!
//! Implementers in this workspace: `motion_hydra::HydraAxis` (ASCII TCP
//! controller) and `motion_sim::SimAxis` (in-memory simulation). A
//! Modbus-style controller would be a third implementer of this same
//! trait, not a different engine.

use crate::error::MotionResult;
use async_trait::async_trait;

/// Static capability flags for one device type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisCapabilities {
    /// Device has physical limit switches and a defined travel range.
    pub has_limits: bool,
    /// Device has a home switch usable by `find_home`.
    pub has_home: bool,
    /// Device has an encoder index mark usable by `find_index`.
    pub has_index: bool,
    /// Device carries an auxiliary encoder with its own calibration.
    pub has_aux_encoder: bool,
}

/// Snapshot of the device's switch inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Switches {
    pub at_upper_limit: bool,
    pub at_lower_limit: bool,
    pub index_found: bool,
}

/// Raw-unit primitives the axis engine calls on a device driver.
///
/// Motion methods (`move_absolute_raw`, `move_relative_raw`, the find
/// operations) do not return until the motion has finished; the engine
/// wraps them in a cancellable task and may drop the future mid-flight,
/// so implementations must not corrupt their state when cancelled at an
/// await point.
#[async_trait]
pub trait AxisSpi: Send + Sync {
    /// Static capability flags for this device type.
    fn capabilities(&self) -> AxisCapabilities;

    async fn position_raw(&self) -> MotionResult<f64>;
    async fn set_position_raw(&self, raw: f64) -> MotionResult<()>;

    async fn aux_encoder_position_raw(&self) -> MotionResult<f64>;
    async fn set_aux_encoder_position_raw(&self, raw: f64) -> MotionResult<()>;

    /// Speed magnitude in raw units per second.
    async fn speed_raw(&self) -> MotionResult<f64>;
    async fn set_speed_raw(&self, raw: f64) -> MotionResult<()>;

    /// Acceleration magnitude in raw units per second squared.
    async fn acceleration_raw(&self) -> MotionResult<f64>;
    async fn set_acceleration_raw(&self, raw: f64) -> MotionResult<()>;

    /// Move to an absolute raw-unit destination; resolves when motion ends.
    async fn move_absolute_raw(&self, dest: f64) -> MotionResult<()>;
    /// Move by a raw-unit distance; resolves when motion ends.
    async fn move_relative_raw(&self, dist: f64) -> MotionResult<()>;

    /// Request a graceful, decelerated halt of any motion in progress.
    async fn stop_move(&self) -> MotionResult<()>;
    /// Request an immediate abort of any motion in progress.
    async fn abort_move(&self) -> MotionResult<()>;

    /// Seek the home switch at the given raw speed.
    async fn find_home(&self, raw_speed: f64) -> MotionResult<()>;
    /// Seek the encoder index mark at the given raw speed.
    async fn find_index(&self, raw_speed: f64) -> MotionResult<()>;
    /// Drive into the lower limit switch at the given raw speed.
    async fn find_lower_limit(&self, raw_speed: f64) -> MotionResult<()>;
    /// Drive into the upper limit switch at the given raw speed.
    async fn find_upper_limit(&self, raw_speed: f64) -> MotionResult<()>;

    async fn is_enabled(&self) -> MotionResult<bool>;
    async fn enable(&self) -> MotionResult<()>;
    async fn disable(&self) -> MotionResult<()>;

    async fn is_initialized(&self) -> MotionResult<bool>;
    async fn set_initialized(&self, initialized: bool) -> MotionResult<()>;

    async fn is_ready(&self) -> MotionResult<bool>;
    async fn is_stopped(&self) -> MotionResult<bool>;

    async fn switches(&self) -> MotionResult<Switches>;

    /// Release the underlying transport. Idempotent; the owner calls
    /// this explicitly on every exit path rather than relying on drop
    /// order.
    async fn shutdown(&self) -> MotionResult<()> {
        Ok(())
    }
}
