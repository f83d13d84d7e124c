//! Time utilities for match simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Default tick rate (ticks per second)
pub const DEFAULT_REFRESH_RATE: u32 = 100;

/// Fixed physics budget of one tick, in seconds
pub fn tick_delta(refresh_rate: u32) -> f64 {
    1.0 / refresh_rate.max(1) as f64
}

/// Tick period for the scheduler interval
pub fn tick_duration(refresh_rate: u32) -> Duration {
    Duration::from_micros(1_000_000 / refresh_rate.max(1) as u64)
}

/// Measures wall-clock time between consecutive ticks
#[derive(Debug, Clone)]
pub struct TickClock {
    last: Instant,
}

impl TickClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Seconds since the previous call (or since creation)
    pub fn lap_secs(&mut self) -> f64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last).as_secs_f64();
        self.last = now;
        elapsed
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}
