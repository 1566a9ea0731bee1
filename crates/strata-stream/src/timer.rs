//! Fixed-period timers for the host loop.

/// Upper bound on fires reported by a single [`IntervalTimer::accumulate`] call.
pub const MAX_CATCH_UP_FIRES: u32 = 1024;

/// Accumulates elapsed time and fires at a fixed period.
///
/// The host owns one timer for streaming ticks and a slower one for dirty
/// flushes.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    accumulator_secs: f64,
    period_secs: f64,
    total_fires: u64,
}

impl IntervalTimer {
    /// Creates a timer firing every `period_secs` seconds.
    ///
    /// Non-positive or non-finite periods are clamped to one millisecond.
    pub fn new(period_secs: f64) -> Self {
        let period_secs = if period_secs.is_finite() && period_secs > 0.0 {
            period_secs
        } else {
            0.001
        };
        Self {
            accumulator_secs: 0.0,
            period_secs,
            total_fires: 0,
        }
    }

    /// Accumulates elapsed time and returns how many times the timer fired.
    ///
    /// Negative or non-finite `dt_secs` counts as no time. At most
    /// [`MAX_CATCH_UP_FIRES`] fires are returned per call; any further backlog
    /// is dropped, keeping only the fractional period.
    pub fn accumulate(&mut self, dt_secs: f64) -> u32 {
        if dt_secs.is_finite() && dt_secs > 0.0 {
            self.accumulator_secs += dt_secs;
        }
        let mut fires = 0u32;
        while self.accumulator_secs >= self.period_secs && fires < MAX_CATCH_UP_FIRES {
            self.accumulator_secs -= self.period_secs;
            fires += 1;
        }
        if self.accumulator_secs >= self.period_secs {
            tracing::warn!(
                "Timer ({}s) fell {:.1}s behind; skipping the backlog",
                self.period_secs,
                self.accumulator_secs
            );
            self.accumulator_secs %= self.period_secs;
        }
        self.total_fires += u64::from(fires);
        fires
    }

    /// Total number of fires since creation.
    pub fn total_fires(&self) -> u64 {
        self.total_fires
    }

    /// The period in seconds.
    pub fn period_secs(&self) -> f64 {
        self.period_secs
    }
}
