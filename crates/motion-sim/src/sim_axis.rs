//! In-memory axis implementation.

use async_trait::async_trait;
use motion_core::{AxisCapabilities, AxisSpi, MotionError, MotionResult, Switches};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Simulation timing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimMode {
    /// Moves complete immediately. Default; keeps unit tests fast.
    #[default]
    Instant,
    /// Position is integrated in small ticks at the configured speed,
    /// so stop/abort/cancellation can interrupt a move in flight.
    Realistic,
}

/// Integration tick for realistic-mode motion.
const TICK: Duration = Duration::from_millis(5);

#[derive(Debug)]
struct SimState {
    position: f64,
    aux_position: f64,
    speed_raw: f64,
    accel_raw: f64,
    enabled: bool,
    initialized: bool,
    moving: bool,
    index_found: bool,
}

/// Clears the moving flag even when the surrounding future is dropped
/// at an await point (cancelled move).
struct MotionFlag {
    state: Arc<Mutex<SimState>>,
}

impl MotionFlag {
    fn raise(state: Arc<Mutex<SimState>>) -> Self {
        state.lock().moving = true;
        Self { state }
    }
}

impl Drop for MotionFlag {
    fn drop(&mut self) {
        self.state.lock().moving = false;
    }
}

/// Simulated motion axis.
///
/// Raw travel is bounded by a configurable `[lower, upper]` range that
/// stands in for the physical limit switches; a move past the range
/// stops at the boundary and raises the corresponding switch. Home is
/// at raw zero, index marks repeat every `index_spacing` raw units.
pub struct SimAxis {
    state: Arc<Mutex<SimState>>,
    travel: (f64, f64),
    index_spacing: f64,
    mode: SimMode,
    caps: AxisCapabilities,
    halt: Arc<AtomicBool>,
}

impl SimAxis {
    pub fn builder() -> SimAxisBuilder {
        SimAxisBuilder::new()
    }

    /// Instant-mode axis at raw zero with wide travel.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Current raw position without going through the SPI.
    pub fn raw_position(&self) -> f64 {
        self.state.lock().position
    }

    /// True while a simulated move is integrating.
    pub fn is_moving(&self) -> bool {
        self.state.lock().moving
    }

    async fn travel_to(&self, dest: f64, raw_speed: f64) -> MotionResult<()> {
        let dest = dest.clamp(self.travel.0, self.travel.1);
        self.halt.store(false, Ordering::Release);
        let _flag = MotionFlag::raise(self.state.clone());

        match self.mode {
            SimMode::Instant => {
                self.state.lock().position = dest;
            }
            SimMode::Realistic => loop {
                if self.halt.load(Ordering::Acquire) {
                    tracing::debug!(dest, "simulated move halted");
                    break;
                }
                let arrived = {
                    let mut s = self.state.lock();
                    let step = raw_speed.abs().max(1.0) * TICK.as_secs_f64();
                    let delta = dest - s.position;
                    if delta.abs() <= step {
                        s.position = dest;
                        true
                    } else {
                        s.position += step * delta.signum();
                        false
                    }
                };
                if arrived {
                    break;
                }
                tokio::time::sleep(TICK).await;
            },
        }
        Ok(())
    }

    fn current_speed(&self) -> f64 {
        self.state.lock().speed_raw
    }
}

impl Default for SimAxis {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AxisSpi for SimAxis {
    fn capabilities(&self) -> AxisCapabilities {
        self.caps
    }

    async fn position_raw(&self) -> MotionResult<f64> {
        Ok(self.state.lock().position)
    }

    async fn set_position_raw(&self, raw: f64) -> MotionResult<()> {
        self.state.lock().position = raw;
        Ok(())
    }

    async fn aux_encoder_position_raw(&self) -> MotionResult<f64> {
        if !self.caps.has_aux_encoder {
            return Err(MotionError::Unsupported("no auxiliary encoder".into()));
        }
        Ok(self.state.lock().aux_position)
    }

    async fn set_aux_encoder_position_raw(&self, raw: f64) -> MotionResult<()> {
        if !self.caps.has_aux_encoder {
            return Err(MotionError::Unsupported("no auxiliary encoder".into()));
        }
        self.state.lock().aux_position = raw;
        Ok(())
    }

    async fn speed_raw(&self) -> MotionResult<f64> {
        Ok(self.state.lock().speed_raw)
    }

    async fn set_speed_raw(&self, raw: f64) -> MotionResult<()> {
        self.state.lock().speed_raw = raw.abs();
        Ok(())
    }

    async fn acceleration_raw(&self) -> MotionResult<f64> {
        Ok(self.state.lock().accel_raw)
    }

    async fn set_acceleration_raw(&self, raw: f64) -> MotionResult<()> {
        self.state.lock().accel_raw = raw.abs();
        Ok(())
    }

    async fn move_absolute_raw(&self, dest: f64) -> MotionResult<()> {
        let speed = self.current_speed();
        self.travel_to(dest, speed).await
    }

    async fn move_relative_raw(&self, dist: f64) -> MotionResult<()> {
        let dest = self.state.lock().position + dist;
        let speed = self.current_speed();
        self.travel_to(dest, speed).await
    }

    async fn stop_move(&self) -> MotionResult<()> {
        self.halt.store(true, Ordering::Release);
        Ok(())
    }

    async fn abort_move(&self) -> MotionResult<()> {
        self.halt.store(true, Ordering::Release);
        Ok(())
    }

    async fn find_home(&self, raw_speed: f64) -> MotionResult<()> {
        if !self.caps.has_home {
            return Err(MotionError::Unsupported("no home switch".into()));
        }
        // Home reference lives at raw zero.
        self.travel_to(0.0, raw_speed).await
    }

    async fn find_index(&self, raw_speed: f64) -> MotionResult<()> {
        if !self.caps.has_index {
            return Err(MotionError::Unsupported("no index mark".into()));
        }
        let dest = {
            let s = self.state.lock();
            (s.position / self.index_spacing).round() * self.index_spacing
        };
        self.travel_to(dest, raw_speed).await?;
        self.state.lock().index_found = true;
        Ok(())
    }

    async fn find_lower_limit(&self, raw_speed: f64) -> MotionResult<()> {
        if !self.caps.has_limits {
            return Err(MotionError::Unsupported("no limit switches".into()));
        }
        self.travel_to(self.travel.0, raw_speed).await
    }

    async fn find_upper_limit(&self, raw_speed: f64) -> MotionResult<()> {
        if !self.caps.has_limits {
            return Err(MotionError::Unsupported("no limit switches".into()));
        }
        self.travel_to(self.travel.1, raw_speed).await
    }

    async fn is_enabled(&self) -> MotionResult<bool> {
        Ok(self.state.lock().enabled)
    }

    async fn enable(&self) -> MotionResult<()> {
        self.state.lock().enabled = true;
        Ok(())
    }

    async fn disable(&self) -> MotionResult<()> {
        self.state.lock().enabled = false;
        Ok(())
    }

    async fn is_initialized(&self) -> MotionResult<bool> {
        Ok(self.state.lock().initialized)
    }

    async fn set_initialized(&self, initialized: bool) -> MotionResult<()> {
        self.state.lock().initialized = initialized;
        Ok(())
    }

    async fn is_ready(&self) -> MotionResult<bool> {
        Ok(!self.state.lock().moving)
    }

    async fn is_stopped(&self) -> MotionResult<bool> {
        Ok(!self.state.lock().moving)
    }

    async fn switches(&self) -> MotionResult<Switches> {
        let s = self.state.lock();
        Ok(Switches {
            at_upper_limit: s.position >= self.travel.1,
            at_lower_limit: s.position <= self.travel.0,
            index_found: s.index_found,
        })
    }
}

/// Builder for [`SimAxis`].
pub struct SimAxisBuilder {
    initial_position: f64,
    travel: (f64, f64),
    speed_raw: f64,
    accel_raw: f64,
    index_spacing: f64,
    mode: SimMode,
    caps: AxisCapabilities,
}

impl SimAxisBuilder {
    pub fn new() -> Self {
        Self {
            initial_position: 0.0,
            travel: (-1.0e9, 1.0e9),
            speed_raw: 10_000.0,
            accel_raw: 100_000.0,
            index_spacing: 1000.0,
            mode: SimMode::Instant,
            caps: AxisCapabilities {
                has_limits: true,
                has_home: true,
                has_index: true,
                has_aux_encoder: true,
            },
        }
    }

    pub fn initial_position(mut self, raw: f64) -> Self {
        self.initial_position = raw;
        self
    }

    /// Raw travel range standing in for the physical limit switches.
    pub fn travel(mut self, lower: f64, upper: f64) -> Self {
        self.travel = (lower, upper);
        self
    }

    pub fn speed_raw(mut self, raw_per_sec: f64) -> Self {
        self.speed_raw = raw_per_sec.abs();
        self
    }

    pub fn index_spacing(mut self, raw: f64) -> Self {
        self.index_spacing = raw.abs().max(1.0);
        self
    }

    pub fn mode(mut self, mode: SimMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn capabilities(mut self, caps: AxisCapabilities) -> Self {
        self.caps = caps;
        self
    }

    pub fn build(self) -> SimAxis {
        SimAxis {
            state: Arc::new(Mutex::new(SimState {
                position: self.initial_position,
                aux_position: 0.0,
                speed_raw: self.speed_raw,
                accel_raw: self.accel_raw,
                enabled: true,
                initialized: false,
                moving: false,
                index_found: false,
            })),
            travel: self.travel,
            index_spacing: self.index_spacing,
            mode: self.mode,
            caps: self.caps,
            halt: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for SimAxisBuilder {
    fn default() -> Self {
        Self::new()
    }
}
