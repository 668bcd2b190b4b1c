use tracing_subscriber::{fmt, EnvFilter};

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Telemetry for one cadence fire: how long the subscriber fan-out took.
#[derive(Debug, Clone)]
pub struct DispatchMetrics {
    pub cadence: &'static str,
    pub count: u64,
    pub subscribers: usize,
    pub duration_us: u128,
    /// The cadence's own interval in microseconds. Dispatch taking longer
    /// than this eats into the next fire.
    pub budget_us: u128,
}

impl DispatchMetrics {
    pub fn log(&self) {
        if self.duration_us > self.budget_us {
            tracing::warn!(
                cadence = self.cadence,
                count = self.count,
                subscribers = self.subscribers,
                duration_us = self.duration_us,
                "cadence dispatch exceeded its interval ({}us > {}us)",
                self.duration_us,
                self.budget_us
            );
        } else {
            tracing::trace!(
                cadence = self.cadence,
                count = self.count,
                subscribers = self.subscribers,
                duration_us = self.duration_us,
                "cadence dispatched"
            );
        }
    }
}
