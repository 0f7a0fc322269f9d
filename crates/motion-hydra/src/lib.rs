//! Driver for Hydra-family motion controllers.
//!
//! The controller speaks a line-oriented ASCII protocol over TCP, one
//! request and one response per exchange. [`HydraConnection`] owns the
//! socket and keeps it alive across controller restarts with a
//! supervised reader task; [`HydraAxis`] implements
//! [`motion_core::AxisSpi`] on top of it for a single axis number.
//!
//! Multi-axis controllers multiplex several axes over one socket. Use
//! [`shared::get_or_connect`] so the axes share a single
//! [`HydraConnection`] per address; the protocol carries no correlation
//! identifiers, so callers must not interleave exchanges on a shared
//! connection from concurrent tasks.

mod axis;
mod conn;
pub mod shared;
mod wire;

pub use axis::HydraAxis;
pub use conn::{HydraConnection, DEFAULT_PORT, EXCHANGE_TIMEOUT, MAX_MESSAGE_BYTES};
pub use wire::StatusWord;
