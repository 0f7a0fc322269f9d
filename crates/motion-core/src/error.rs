//! Custom error types for the motion stack.
//!
//! `MotionError` is the single error enum used across the workspace.
//! Expected, recoverable outcomes of normal operation (a move target
//! outside the soft travel window) are *not* errors; they are reported
//! through [`crate::status::MoveStatus`] so callers can handle them
//! without unwinding.
//!
//! Two distinctions matter to callers and are kept as separate variants:
//!
//! - `Communication` vs `Timeout`: "link is down" vs "no answer yet on a
//!   link that may still be healthy".
//! - `Cancelled` vs everything else: a command resolved as cancelled was
//!   stopped by its own issuer and is usually not a fault.

use thiserror::Error;

/// Convenience alias for results using the motion error type.
pub type MotionResult<T> = std::result::Result<T, MotionError>;

/// Primary error type for the motion stack.
#[derive(Error, Debug)]
pub enum MotionError {
    /// Transport unreachable or the link dropped mid-exchange.
    ///
    /// The transport reconnects on its own, but it never retries a
    /// *command* on the caller's behalf; the caller decides whether the
    /// operation is safe to reissue.
    #[error("Communication error: {0}")]
    Communication(String),

    /// No answer within the exchange deadline.
    ///
    /// Distinct from [`MotionError::Communication`]: the link may still
    /// be up and the response may arrive later (and will be discarded).
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A command was issued while another is still in flight on the same
    /// axis. Rejected synchronously; no hardware command was sent.
    #[error("Axis is busy with another command")]
    Busy,

    /// The issuer cancelled the pending command before completion.
    #[error("Command cancelled")]
    Cancelled,

    /// A hardware abort was issued. Aborts are lossy and never report
    /// clean success.
    #[error("Move aborted")]
    Aborted,

    /// The axis has been disconnected from its transport.
    #[error("Axis is disconnected")]
    Disconnected,

    /// The device does not support the requested operation.
    #[error("Operation not supported: {0}")]
    Unsupported(String),

    /// Semantically invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The persisted-configuration store could not be read or written.
    #[error("Config store error: {0}")]
    Store(String),

    /// Malformed or unparseable device response.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Standard I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MotionError {
    /// True for outcomes a caller may choose not to treat as a fault.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, MotionError::Cancelled)
    }

    /// True when the underlying transport is unusable (as opposed to a
    /// single exchange timing out).
    pub fn is_communication(&self) -> bool {
        matches!(
            self,
            MotionError::Communication(_) | MotionError::Disconnected | MotionError::Io(_)
        )
    }
}
