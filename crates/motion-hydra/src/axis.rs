//! [`AxisSpi`] implementation for one axis of a Hydra controller.

use crate::conn::{HydraConnection, EXCHANGE_TIMEOUT};
use crate::{shared, wire};
use async_trait::async_trait;
use motion_core::{AxisCapabilities, AxisSpi, MotionError, MotionResult, Switches};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

const MOTION_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One axis number on a Hydra controller.
///
/// Motion verbs are acknowledged immediately by the controller; the
/// driver then polls `status?` until the moving bit clears, so the
/// [`AxisSpi`] motion methods resolve when the mechanics have settled.
pub struct HydraAxis {
    conn: Arc<HydraConnection>,
    axisno: u32,
    caps: AxisCapabilities,
    exchange_timeout: Duration,
    motion_timeout: Duration,
    poll_interval: Duration,
    /// Set when the connection came from the shared registry; shutdown
    /// then releases the attachment instead of closing the socket.
    shared: bool,
}

impl HydraAxis {
    /// Drive an axis over a connection the caller owns.
    pub fn new(conn: Arc<HydraConnection>, axisno: u32) -> Self {
        Self {
            conn,
            axisno,
            caps: AxisCapabilities {
                has_limits: true,
                has_home: true,
                has_index: true,
                has_aux_encoder: true,
            },
            exchange_timeout: EXCHANGE_TIMEOUT,
            motion_timeout: MOTION_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            shared: false,
        }
    }

    /// Drive an axis over the process-wide shared connection for
    /// `addr`, dialing it on first use.
    pub async fn connect_shared(addr: &str, axisno: u32) -> MotionResult<Self> {
        let conn = shared::get_or_connect(addr).await?;
        let mut axis = Self::new(conn, axisno);
        axis.shared = true;
        Ok(axis)
    }

    /// Override the static capability flags, for axes missing a switch
    /// or the auxiliary encoder option.
    pub fn with_capabilities(mut self, caps: AxisCapabilities) -> Self {
        self.caps = caps;
        self
    }

    /// Override the settle deadline for long-travel axes.
    pub fn with_motion_timeout(mut self, timeout: Duration) -> Self {
        self.motion_timeout = timeout;
        self
    }

    pub fn axisno(&self) -> u32 {
        self.axisno
    }

    async fn query(&self, verb: &str) -> MotionResult<String> {
        self.conn
            .send_and_receive(&wire::cmd(self.axisno, verb), self.exchange_timeout)
            .await
    }

    async fn query_f64(&self, verb: &str) -> MotionResult<f64> {
        wire::parse_f64(&self.query(verb).await?)
    }

    async fn command(&self, line: String) -> MotionResult<()> {
        let resp = self
            .conn
            .send_and_receive(&line, self.exchange_timeout)
            .await?;
        wire::expect_ok(&resp)
    }

    async fn status(&self) -> MotionResult<wire::StatusWord> {
        wire::parse_status(&self.query("status?").await?)
    }

    /// Poll until the moving bit clears.
    #[instrument(skip(self), fields(axisno = self.axisno), err)]
    async fn wait_settled(&self) -> MotionResult<()> {
        let deadline = tokio::time::Instant::now() + self.motion_timeout;
        loop {
            let status = self.status().await?;
            if !status.moving {
                debug!(axisno = self.axisno, "motion settled");
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(MotionError::Timeout(format!(
                    "axis {} still moving after {:?}",
                    self.axisno, self.motion_timeout
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn motion(&self, line: String) -> MotionResult<()> {
        self.command(line).await?;
        self.wait_settled().await
    }
}

#[async_trait]
impl AxisSpi for HydraAxis {
    fn capabilities(&self) -> AxisCapabilities {
        self.caps
    }

    async fn position_raw(&self) -> MotionResult<f64> {
        self.query_f64("npos?").await
    }

    async fn set_position_raw(&self, raw: f64) -> MotionResult<()> {
        self.command(wire::cmd_f64(self.axisno, "setnpos", raw)).await
    }

    async fn aux_encoder_position_raw(&self) -> MotionResult<f64> {
        self.query_f64("auxpos?").await
    }

    async fn set_aux_encoder_position_raw(&self, raw: f64) -> MotionResult<()> {
        self.command(wire::cmd_f64(self.axisno, "setauxpos", raw))
            .await
    }

    async fn speed_raw(&self) -> MotionResult<f64> {
        self.query_f64("nvel?").await
    }

    async fn set_speed_raw(&self, raw: f64) -> MotionResult<()> {
        self.command(wire::cmd_f64(self.axisno, "setnvel", raw)).await
    }

    async fn acceleration_raw(&self) -> MotionResult<f64> {
        self.query_f64("nacc?").await
    }

    async fn set_acceleration_raw(&self, raw: f64) -> MotionResult<()> {
        self.command(wire::cmd_f64(self.axisno, "setnacc", raw)).await
    }

    async fn move_absolute_raw(&self, dest: f64) -> MotionResult<()> {
        self.motion(wire::cmd_f64(self.axisno, "nmove", dest)).await
    }

    async fn move_relative_raw(&self, dist: f64) -> MotionResult<()> {
        self.motion(wire::cmd_f64(self.axisno, "rmove", dist)).await
    }

    async fn stop_move(&self) -> MotionResult<()> {
        self.command(wire::cmd(self.axisno, "nstop")).await
    }

    async fn abort_move(&self) -> MotionResult<()> {
        self.command(wire::cmd(self.axisno, "nabort")).await
    }

    async fn find_home(&self, raw_speed: f64) -> MotionResult<()> {
        self.motion(wire::cmd_f64(self.axisno, "home", raw_speed))
            .await
    }

    async fn find_index(&self, raw_speed: f64) -> MotionResult<()> {
        self.motion(wire::cmd_f64(self.axisno, "index", raw_speed))
            .await
    }

    async fn find_lower_limit(&self, raw_speed: f64) -> MotionResult<()> {
        self.motion(wire::cmd_f64(self.axisno, "seeklower", raw_speed))
            .await
    }

    async fn find_upper_limit(&self, raw_speed: f64) -> MotionResult<()> {
        self.motion(wire::cmd_f64(self.axisno, "seekupper", raw_speed))
            .await
    }

    async fn is_enabled(&self) -> MotionResult<bool> {
        Ok(self.status().await?.enabled)
    }

    async fn enable(&self) -> MotionResult<()> {
        self.command(wire::cmd_flag(self.axisno, "enable", true))
            .await
    }

    async fn disable(&self) -> MotionResult<()> {
        self.command(wire::cmd_flag(self.axisno, "enable", false))
            .await
    }

    async fn is_initialized(&self) -> MotionResult<bool> {
        Ok(self.status().await?.initialized)
    }

    async fn set_initialized(&self, initialized: bool) -> MotionResult<()> {
        self.command(wire::cmd_flag(self.axisno, "init", initialized))
            .await
    }

    async fn is_ready(&self) -> MotionResult<bool> {
        Ok(self.status().await?.ready)
    }

    async fn is_stopped(&self) -> MotionResult<bool> {
        Ok(!self.status().await?.moving)
    }

    async fn switches(&self) -> MotionResult<Switches> {
        wire::parse_switches(&self.query("switch?").await?)
    }

    async fn shutdown(&self) -> MotionResult<()> {
        if self.shared {
            shared::release(self.conn.addr()).await
        } else {
            self.conn.close().await
        }
    }
}
