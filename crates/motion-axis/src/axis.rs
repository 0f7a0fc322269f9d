//! The per-axis command-execution engine.

use crate::limits::TravelLimits;
use crate::pending::PendingCommand;
use motion_core::{
    clamp_scale, AxisCapabilities, AxisSpi, Calibration, ConfigStore, MotionError, MotionResult,
    MoveStatus, Switches,
};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::instrument;

// =============================================================================
// Defaults & flags
// =============================================================================

/// Hard-coded per-device defaults, merged under persisted configuration
/// at load time.
#[derive(Debug, Clone)]
pub struct AxisDefaults {
    pub units: String,
    pub scale: f64,
    pub offset_raw: f64,
    pub speed_raw: f64,
    pub acceleration_raw: f64,
    pub lower_limit_hard_raw: f64,
    pub lower_limit_soft_raw: f64,
    pub upper_limit_soft_raw: f64,
    pub upper_limit_hard_raw: f64,
    pub aux_encoder_scale: f64,
    pub aux_encoder_offset_raw: f64,
}

impl Default for AxisDefaults {
    fn default() -> Self {
        Self {
            units: "mm".to_string(),
            scale: 1.0,
            offset_raw: 0.0,
            speed_raw: 10_000.0,
            acceleration_raw: 100_000.0,
            lower_limit_hard_raw: -1.0e9,
            lower_limit_soft_raw: -1.0e9,
            upper_limit_soft_raw: 1.0e9,
            upper_limit_hard_raw: 1.0e9,
            aux_encoder_scale: 1.0,
            aux_encoder_offset_raw: 0.0,
        }
    }
}

/// Snapshot of the axis state machine.
///
/// Four independent booleans rather than one enum because the hardware
/// reports them independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisFlags {
    pub enabled: bool,
    pub initialized: bool,
    pub stopped: bool,
    pub ready: bool,
}

impl Default for AxisFlags {
    fn default() -> Self {
        Self {
            enabled: true,
            initialized: false,
            stopped: true,
            ready: true,
        }
    }
}

#[derive(Debug, Clone)]
struct Settings {
    units: String,
    cal: Calibration,
    aux: Calibration,
    speed_raw: f64,
    accel_raw: f64,
    limits: TravelLimits,
}

/// Restores `stopped`/`ready` and frees the busy slot on every
/// completion path of a command task, including cancellation.
struct FlightGuard {
    flags: Arc<Mutex<AxisFlags>>,
    busy: Arc<AtomicBool>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        {
            let mut f = self.flags.lock();
            f.stopped = true;
            f.ready = true;
        }
        self.busy.store(false, Ordering::Release);
    }
}

// =============================================================================
// Axis
// =============================================================================

/// One motorized axis.
///
/// Owns the cooked/raw calibration, travel limits and the
/// busy/state-flag discipline; all hardware access goes through the
/// injected [`AxisSpi`]. Motion commands return a [`PendingCommand`]
/// which the caller awaits or cancels; at most one command is in flight
/// per axis and a second dispatch fails with [`MotionError::Busy`].
pub struct Axis {
    name: String,
    node: String,
    spi: Arc<dyn AxisSpi>,
    store: Arc<dyn ConfigStore>,
    defaults: AxisDefaults,
    settings: Mutex<Settings>,
    flags: Arc<Mutex<AxisFlags>>,
    busy: Arc<AtomicBool>,
    disconnected: AtomicBool,
}

impl Axis {
    /// Build an axis from its hard-coded defaults. Persisted values are
    /// merged in by a subsequent [`Axis::load_configs`].
    pub fn new(
        name: impl Into<String>,
        spi: Arc<dyn AxisSpi>,
        store: Arc<dyn ConfigStore>,
        node_root: &str,
        defaults: AxisDefaults,
    ) -> MotionResult<Self> {
        let name = name.into();
        let node = if node_root.is_empty() {
            name.clone()
        } else {
            format!("{node_root}/{name}")
        };
        let limits = TravelLimits::new(
            defaults.lower_limit_hard_raw,
            defaults.lower_limit_soft_raw,
            defaults.upper_limit_soft_raw,
            defaults.upper_limit_hard_raw,
        )?;
        let settings = Settings {
            units: defaults.units.clone(),
            cal: Calibration::new(defaults.scale, defaults.offset_raw),
            aux: Calibration::new(defaults.aux_encoder_scale, defaults.aux_encoder_offset_raw),
            speed_raw: defaults.speed_raw.abs(),
            accel_raw: defaults.acceleration_raw.abs(),
            limits,
        };
        Ok(Self {
            name,
            node,
            spi,
            store,
            defaults,
            settings: Mutex::new(settings),
            flags: Arc::new(Mutex::new(AxisFlags::default())),
            busy: Arc::new(AtomicBool::new(false)),
            disconnected: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> AxisCapabilities {
        self.spi.capabilities()
    }

    pub fn has_aux_encoder(&self) -> bool {
        self.spi.capabilities().has_aux_encoder
    }

    /// Snapshot of the local state flags.
    pub fn flags(&self) -> AxisFlags {
        *self.flags.lock()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Acquire)
    }

    // =========================================================================
    // Calibration getters/setters (persist immediately)
    // =========================================================================

    pub fn units(&self) -> String {
        self.settings.lock().units.clone()
    }

    pub fn set_units(&self, units: &str) {
        self.settings.lock().units = units.to_string();
        self.persist_str("units", units);
    }

    pub fn scale(&self) -> f64 {
        self.settings.lock().cal.scale
    }

    /// Set the raw-per-cooked scale. Magnitudes below the conversion
    /// epsilon are clamped, preserving sign.
    pub fn set_scale(&self, scale: f64) {
        let clamped = clamp_scale(scale);
        self.settings.lock().cal.scale = clamped;
        self.persist_f64("scale", clamped);
    }

    pub fn offset(&self) -> f64 {
        self.settings.lock().cal.offset_raw
    }

    pub fn set_offset(&self, offset_raw: f64) {
        self.settings.lock().cal.offset_raw = offset_raw;
        self.persist_f64("offset_raw", offset_raw);
    }

    pub fn aux_encoder_scale(&self) -> f64 {
        self.settings.lock().aux.scale
    }

    pub fn set_aux_encoder_scale(&self, scale: f64) {
        let clamped = clamp_scale(scale);
        self.settings.lock().aux.scale = clamped;
        self.persist_f64("aux_encoder_scale", clamped);
    }

    pub fn aux_encoder_offset(&self) -> f64 {
        self.settings.lock().aux.offset_raw
    }

    pub fn set_aux_encoder_offset(&self, offset_raw: f64) {
        self.settings.lock().aux.offset_raw = offset_raw;
        self.persist_f64("aux_encoder_offset_raw", offset_raw);
    }

    // =========================================================================
    // Position
    // =========================================================================

    pub async fn position(&self) -> MotionResult<f64> {
        let raw = self.position_raw().await?;
        Ok(self.settings.lock().cal.to_cooked(raw))
    }

    pub async fn position_raw(&self) -> MotionResult<f64> {
        self.ensure_connected()?;
        self.spi.position_raw().await
    }

    /// Recalibrate so the current raw position reads as `cooked`.
    /// Adjusts `offset_raw` only; the hardware does not move.
    #[instrument(skip(self), fields(axis = %self.name, cooked), err)]
    pub async fn set_position(&self, cooked: f64) -> MotionResult<()> {
        self.ensure_connected()?;
        let raw = self.spi.position_raw().await?;
        let offset = {
            let mut s = self.settings.lock();
            s.cal.offset_raw = raw - s.cal.scale * cooked;
            s.cal.offset_raw
        };
        self.persist_f64("offset_raw", offset);
        Ok(())
    }

    pub async fn aux_encoder_position(&self) -> MotionResult<f64> {
        self.ensure_aux()?;
        let raw = self.spi.aux_encoder_position_raw().await?;
        Ok(self.settings.lock().aux.to_cooked(raw))
    }

    /// Recalibrate the auxiliary encoder, same law as [`Axis::set_position`].
    pub async fn set_aux_encoder_position(&self, cooked: f64) -> MotionResult<()> {
        self.ensure_aux()?;
        let raw = self.spi.aux_encoder_position_raw().await?;
        let offset = {
            let mut s = self.settings.lock();
            s.aux.offset_raw = raw - s.aux.scale * cooked;
            s.aux.offset_raw
        };
        self.persist_f64("aux_encoder_offset_raw", offset);
        Ok(())
    }

    // =========================================================================
    // Speed & acceleration (stored as non-negative raw magnitudes)
    // =========================================================================

    pub async fn speed(&self) -> MotionResult<f64> {
        self.ensure_connected()?;
        let raw = self.spi.speed_raw().await?;
        let scale = self.settings.lock().cal.scale;
        Ok(raw / scale.abs())
    }

    pub async fn set_speed(&self, cooked: f64) -> MotionResult<()> {
        self.ensure_connected()?;
        let raw = {
            let s = self.settings.lock();
            (cooked * s.cal.scale).abs()
        };
        self.spi.set_speed_raw(raw).await?;
        self.settings.lock().speed_raw = raw;
        self.persist_f64("speed_raw", raw);
        Ok(())
    }

    pub async fn acceleration(&self) -> MotionResult<f64> {
        self.ensure_connected()?;
        let raw = self.spi.acceleration_raw().await?;
        let scale = self.settings.lock().cal.scale;
        Ok(raw / scale.abs())
    }

    pub async fn set_acceleration(&self, cooked: f64) -> MotionResult<()> {
        self.ensure_connected()?;
        let raw = {
            let s = self.settings.lock();
            (cooked * s.cal.scale).abs()
        };
        self.spi.set_acceleration_raw(raw).await?;
        self.settings.lock().accel_raw = raw;
        self.persist_f64("acceleration_raw", raw);
        Ok(())
    }

    // =========================================================================
    // Travel limits (cooked-unit surface over raw-unit bookkeeping)
    // =========================================================================

    pub fn lower_limit_hard(&self) -> f64 {
        let s = self.settings.lock();
        s.cal.to_cooked(s.limits.lower_hard())
    }

    pub fn lower_limit_soft(&self) -> f64 {
        let s = self.settings.lock();
        s.cal.to_cooked(s.limits.lower_soft())
    }

    pub fn upper_limit_soft(&self) -> f64 {
        let s = self.settings.lock();
        s.cal.to_cooked(s.limits.upper_soft())
    }

    pub fn upper_limit_hard(&self) -> f64 {
        let s = self.settings.lock();
        s.cal.to_cooked(s.limits.upper_hard())
    }

    /// Raw-unit limit snapshot.
    pub fn travel_limits(&self) -> TravelLimits {
        self.settings.lock().limits
    }

    /// Returns the violation code and mutates nothing when the request
    /// falls outside the hard window or crosses the other soft limit.
    pub fn set_lower_limit_soft(&self, cooked: f64) -> MoveStatus {
        let (status, raw) = {
            let mut s = self.settings.lock();
            let raw = s.cal.to_raw(cooked);
            (s.limits.set_lower_soft(raw), s.limits.lower_soft())
        };
        if status.is_ok() {
            self.persist_f64("lower_limit_soft_raw", raw);
        }
        status
    }

    /// Counterpart of [`Axis::set_lower_limit_soft`].
    pub fn set_upper_limit_soft(&self, cooked: f64) -> MoveStatus {
        let (status, raw) = {
            let mut s = self.settings.lock();
            let raw = s.cal.to_raw(cooked);
            (s.limits.set_upper_soft(raw), s.limits.upper_soft())
        };
        if status.is_ok() {
            self.persist_f64("upper_limit_soft_raw", raw);
        }
        status
    }

    // =========================================================================
    // Motion commands
    // =========================================================================

    #[instrument(skip(self), fields(axis = %self.name, cooked), err)]
    pub async fn move_absolute(&self, cooked: f64) -> MotionResult<PendingCommand> {
        let dest_raw = self.settings.lock().cal.to_raw(cooked);
        self.move_absolute_raw(dest_raw).await
    }

    pub async fn move_absolute_raw(&self, dest_raw: f64) -> MotionResult<PendingCommand> {
        if let Some(status) = self.soft_limit_reject(dest_raw) {
            return Ok(PendingCommand::settled(status));
        }
        let guard = self.begin_flight()?;
        let spi = self.spi.clone();
        let halt = self.spi.clone();
        Ok(self.dispatch(
            guard,
            async move {
                spi.move_absolute_raw(dest_raw).await?;
                Ok(MoveStatus::Ok)
            },
            async move {
                let _ = halt.stop_move().await;
            },
        ))
    }

    #[instrument(skip(self), fields(axis = %self.name, cooked), err)]
    pub async fn move_relative(&self, cooked: f64) -> MotionResult<PendingCommand> {
        let dist_raw = self.settings.lock().cal.scale * cooked;
        self.move_relative_raw(dist_raw).await
    }

    pub async fn move_relative_raw(&self, dist_raw: f64) -> MotionResult<PendingCommand> {
        // Claim the busy slot before the position query: a busy
        // rejection issues no hardware command at all, and the sampled
        // position stays valid for the limit check below.
        let guard = self.begin_flight()?;
        let current = self.spi.position_raw().await?;
        if let Some(status) = self.soft_limit_reject(current + dist_raw) {
            drop(guard);
            return Ok(PendingCommand::settled(status));
        }
        let spi = self.spi.clone();
        let halt = self.spi.clone();
        Ok(self.dispatch(
            guard,
            async move {
                spi.move_relative_raw(dist_raw).await?;
                Ok(MoveStatus::Ok)
            },
            async move {
                let _ = halt.stop_move().await;
            },
        ))
    }

    /// Request a graceful halt of whatever is in flight. Always
    /// succeeds locally; the running command resolves once the hardware
    /// has decelerated.
    #[instrument(skip(self), fields(axis = %self.name), err)]
    pub async fn stop_move(&self) -> MotionResult<MoveStatus> {
        self.ensure_connected()?;
        self.spi.stop_move().await?;
        Ok(MoveStatus::Ok)
    }

    /// Issue an immediate hardware abort. Aborts are lossy and never
    /// report clean success, so this always surfaces an error after the
    /// raw command is sent.
    #[instrument(skip(self), fields(axis = %self.name), err)]
    pub async fn abort_move(&self) -> MotionResult<MoveStatus> {
        self.ensure_connected()?;
        self.spi.abort_move().await?;
        Err(MotionError::Aborted)
    }

    /// Bring the axis to its reference: homes if the device can, then
    /// restarts position tracking at the discovered reference. A
    /// cancelled or failed initialize leaves `initialized` unset.
    #[instrument(skip(self), fields(axis = %self.name), err)]
    pub async fn initialize(&self) -> MotionResult<PendingCommand> {
        let guard = self.begin_flight()?;
        let spi = self.spi.clone();
        let halt = self.spi.clone();
        let flags = self.flags.clone();
        let caps = self.spi.capabilities();
        let speed = self.settings.lock().speed_raw;
        let name = self.name.clone();
        Ok(self.dispatch(
            guard,
            async move {
                if caps.has_home {
                    spi.find_home(speed).await?;
                }
                spi.set_position_raw(0.0).await?;
                spi.set_initialized(true).await?;
                flags.lock().initialized = true;
                tracing::info!(axis = %name, "axis initialized");
                Ok(MoveStatus::Ok)
            },
            async move {
                let _ = halt.stop_move().await;
            },
        ))
    }

    // =========================================================================
    // Reference-seeking (capability-gated; bypasses soft limits by design,
    // since these operations are how the soft range gets established)
    // =========================================================================

    pub async fn find_home(&self) -> MotionResult<PendingCommand> {
        if !self.spi.capabilities().has_home {
            return Err(MotionError::Unsupported(format!(
                "axis {} has no home switch",
                self.name
            )));
        }
        let guard = self.begin_flight()?;
        let spi = self.spi.clone();
        let halt = self.spi.clone();
        let speed = self.settings.lock().speed_raw;
        Ok(self.dispatch(
            guard,
            async move {
                spi.find_home(speed).await?;
                Ok(MoveStatus::Ok)
            },
            async move {
                let _ = halt.stop_move().await;
            },
        ))
    }

    pub async fn find_index(&self) -> MotionResult<PendingCommand> {
        if !self.spi.capabilities().has_index {
            return Err(MotionError::Unsupported(format!(
                "axis {} has no index mark",
                self.name
            )));
        }
        let guard = self.begin_flight()?;
        let spi = self.spi.clone();
        let halt = self.spi.clone();
        let speed = self.settings.lock().speed_raw;
        Ok(self.dispatch(
            guard,
            async move {
                spi.find_index(speed).await?;
                Ok(MoveStatus::Ok)
            },
            async move {
                let _ = halt.stop_move().await;
            },
        ))
    }

    pub async fn find_lower_limit(&self) -> MotionResult<PendingCommand> {
        if !self.spi.capabilities().has_limits {
            return Err(MotionError::Unsupported(format!(
                "axis {} has no limit switches",
                self.name
            )));
        }
        let guard = self.begin_flight()?;
        let spi = self.spi.clone();
        let halt = self.spi.clone();
        let speed = self.settings.lock().speed_raw;
        Ok(self.dispatch(
            guard,
            async move {
                spi.find_lower_limit(speed).await?;
                Ok(MoveStatus::Ok)
            },
            async move {
                let _ = halt.stop_move().await;
            },
        ))
    }

    pub async fn find_upper_limit(&self) -> MotionResult<PendingCommand> {
        if !self.spi.capabilities().has_limits {
            return Err(MotionError::Unsupported(format!(
                "axis {} has no limit switches",
                self.name
            )));
        }
        let guard = self.begin_flight()?;
        let spi = self.spi.clone();
        let halt = self.spi.clone();
        let speed = self.settings.lock().speed_raw;
        Ok(self.dispatch(
            guard,
            async move {
                spi.find_upper_limit(speed).await?;
                Ok(MoveStatus::Ok)
            },
            async move {
                let _ = halt.stop_move().await;
            },
        ))
    }

    // =========================================================================
    // Device state
    // =========================================================================

    pub async fn is_enabled(&self) -> MotionResult<bool> {
        self.ensure_connected()?;
        self.spi.is_enabled().await
    }

    pub async fn enable(&self) -> MotionResult<()> {
        self.ensure_connected()?;
        self.spi.enable().await?;
        self.flags.lock().enabled = true;
        Ok(())
    }

    pub async fn disable(&self) -> MotionResult<()> {
        self.ensure_connected()?;
        self.spi.disable().await?;
        self.flags.lock().enabled = false;
        Ok(())
    }

    pub async fn is_initialized(&self) -> MotionResult<bool> {
        self.ensure_connected()?;
        self.spi.is_initialized().await
    }

    pub async fn is_ready(&self) -> MotionResult<bool> {
        self.ensure_connected()?;
        self.spi.is_ready().await
    }

    pub async fn is_stopped(&self) -> MotionResult<bool> {
        self.ensure_connected()?;
        self.spi.is_stopped().await
    }

    pub async fn switches(&self) -> MotionResult<Switches> {
        self.ensure_connected()?;
        self.spi.switches().await
    }

    // =========================================================================
    // Configuration persistence
    // =========================================================================

    /// Merge persisted values over this axis's defaults. Malformed
    /// persisted limits degrade the axis to disconnected rather than
    /// taking the process down.
    pub fn load_configs(&self) -> MotionResult<()> {
        let d = &self.defaults;
        let units = self.store.get_str(&self.key("units"), &d.units);
        let scale = clamp_scale(self.store.get_f64(&self.key("scale"), d.scale));
        let offset = self.store.get_f64(&self.key("offset_raw"), d.offset_raw);
        let speed = self
            .store
            .get_f64(&self.key("speed_raw"), d.speed_raw)
            .abs();
        let accel = self
            .store
            .get_f64(&self.key("acceleration_raw"), d.acceleration_raw)
            .abs();
        let lower_soft = self
            .store
            .get_f64(&self.key("lower_limit_soft_raw"), d.lower_limit_soft_raw);
        let upper_soft = self
            .store
            .get_f64(&self.key("upper_limit_soft_raw"), d.upper_limit_soft_raw);
        let aux_scale = clamp_scale(
            self.store
                .get_f64(&self.key("aux_encoder_scale"), d.aux_encoder_scale),
        );
        let aux_offset = self.store.get_f64(
            &self.key("aux_encoder_offset_raw"),
            d.aux_encoder_offset_raw,
        );

        let limits = TravelLimits::new(
            d.lower_limit_hard_raw,
            lower_soft,
            upper_soft,
            d.upper_limit_hard_raw,
        )
        .map_err(|e| {
            self.disconnected.store(true, Ordering::Release);
            tracing::error!(
                axis = %self.name,
                error = %e,
                "malformed persisted limits; axis degraded to disconnected"
            );
            e
        })?;

        let mut s = self.settings.lock();
        *s = Settings {
            units,
            cal: Calibration {
                scale,
                offset_raw: offset,
            },
            aux: Calibration {
                scale: aux_scale,
                offset_raw: aux_offset,
            },
            speed_raw: speed,
            accel_raw: accel,
            limits,
        };
        Ok(())
    }

    /// Write the full configuration set back to the store and flush,
    /// normalizing defaults into it.
    pub fn save_configs(&self) -> MotionResult<()> {
        let s = self.settings.lock().clone();
        self.store.put_str(&self.key("units"), &s.units);
        self.store.put_f64(&self.key("scale"), s.cal.scale);
        self.store.put_f64(&self.key("offset_raw"), s.cal.offset_raw);
        self.store.put_f64(&self.key("speed_raw"), s.speed_raw);
        self.store
            .put_f64(&self.key("acceleration_raw"), s.accel_raw);
        self.store
            .put_f64(&self.key("lower_limit_soft_raw"), s.limits.lower_soft());
        self.store
            .put_f64(&self.key("upper_limit_soft_raw"), s.limits.upper_soft());
        self.store
            .put_f64(&self.key("aux_encoder_scale"), s.aux.scale);
        self.store
            .put_f64(&self.key("aux_encoder_offset_raw"), s.aux.offset_raw);
        self.store.flush()
    }

    /// Release the underlying transport. Idempotent; subsequent
    /// hardware operations fail with [`MotionError::Disconnected`].
    pub async fn disconnect(&self) -> MotionResult<()> {
        if self.disconnected.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::info!(axis = %self.name, "disconnecting axis");
        self.spi.shutdown().await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn key(&self, leaf: &str) -> String {
        format!("{}/{leaf}", self.node)
    }

    fn persist_f64(&self, leaf: &str, value: f64) {
        self.store.put_f64(&self.key(leaf), value);
        self.flush_logged(leaf);
    }

    fn persist_str(&self, leaf: &str, value: &str) {
        self.store.put_str(&self.key(leaf), value);
        self.flush_logged(leaf);
    }

    fn flush_logged(&self, leaf: &str) {
        if let Err(e) = self.store.flush() {
            tracing::warn!(
                axis = %self.name,
                key = leaf,
                error = %e,
                "config flush failed; keeping in-memory value"
            );
        }
    }

    fn ensure_connected(&self) -> MotionResult<()> {
        if self.disconnected.load(Ordering::Acquire) {
            return Err(MotionError::Disconnected);
        }
        Ok(())
    }

    fn ensure_aux(&self) -> MotionResult<()> {
        self.ensure_connected()?;
        if !self.spi.capabilities().has_aux_encoder {
            return Err(MotionError::Unsupported(format!(
                "axis {} has no auxiliary encoder",
                self.name
            )));
        }
        Ok(())
    }

    fn soft_limit_reject(&self, dest_raw: f64) -> Option<MoveStatus> {
        let status = self.settings.lock().limits.check(dest_raw);
        if status.is_ok() {
            None
        } else {
            tracing::debug!(
                axis = %self.name,
                dest_raw,
                status = %status,
                "move rejected by soft limits"
            );
            Some(status)
        }
    }

    fn begin_flight(&self) -> MotionResult<FlightGuard> {
        self.ensure_connected()?;
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(MotionError::Busy);
        }
        let mut f = self.flags.lock();
        f.stopped = false;
        f.ready = false;
        drop(f);
        Ok(FlightGuard {
            flags: self.flags.clone(),
            busy: self.busy.clone(),
        })
    }

    fn dispatch<W, C>(&self, guard: FlightGuard, work: W, on_cancel: C) -> PendingCommand
    where
        W: Future<Output = MotionResult<MoveStatus>> + Send + 'static,
        C: Future<Output = ()> + Send + 'static,
    {
        let cancel = Arc::new(Notify::new());
        let cancelled = cancel.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            tokio::select! {
                res = work => res,
                _ = cancelled.notified() => {
                    on_cancel.await;
                    Err(MotionError::Cancelled)
                }
            }
        });
        PendingCommand::running(handle, cancel)
    }
}
