pub mod cadence;
pub mod scheduler;

pub use cadence::{Cadence, TickSignal};
pub use scheduler::{CadenceStats, SchedulerStats, SubscriptionId, TickScheduler};
