use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Instant, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use observability::DispatchMetrics;

use crate::cadence::{Cadence, TickSignal};

/// A subscriber callback. Invoked on the timer task of its cadence.
pub type TickFn = Box<dyn FnMut(TickSignal) + Send>;

/// Handle returned by [`TickScheduler::subscribe`]. Registering the same
/// closure twice yields two handles and two independent deliveries per fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    callback: Arc<Mutex<TickFn>>,
}

struct CadenceState {
    cadence: Cadence,
    count: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

// Panics never unwind through these locks (every callback runs inside its
// own catch_unwind), so a poisoned guard still holds consistent data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CadenceState {
    fn new(cadence: Cadence) -> Self {
        Self {
            cadence,
            count: AtomicU64::new(0),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// One fire: bump the counter, then fan the signal out. The registry
    /// lock is released before any callback runs, so subscribers may call
    /// back into the scheduler (subscribe, stats) without deadlocking.
    fn fire(&self) {
        let started = Instant::now();
        let count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        let signal = TickSignal {
            count,
            timestamp: SystemTime::now(),
        };

        let subscribers: Vec<Subscriber> = lock(&self.subscribers).clone();
        for subscriber in &subscribers {
            let mut callback = lock(&subscriber.callback);
            if catch_unwind(AssertUnwindSafe(|| (*callback)(signal))).is_err() {
                tracing::error!(
                    cadence = %self.cadence,
                    subscription = subscriber.id.0,
                    "tick subscriber panicked; continuing with remaining subscribers"
                );
            }
        }

        DispatchMetrics {
            cadence: self.cadence.label(),
            count,
            subscribers: subscribers.len(),
            duration_us: started.elapsed().as_micros(),
            budget_us: self.cadence.interval().as_micros(),
        }
        .log();
    }
}

/// Diagnostics snapshot for one cadence.
#[derive(Debug, Clone, Copy)]
pub struct CadenceStats {
    pub cadence: Cadence,
    pub count: u64,
    pub subscribers: usize,
}

/// Diagnostics snapshot across all four cadences.
#[derive(Debug, Clone)]
pub struct SchedulerStats {
    pub cadences: [CadenceStats; 4],
}

impl SchedulerStats {
    pub fn cadence(&self, cadence: Cadence) -> &CadenceStats {
        &self.cadences[cadence.index()]
    }
}

/// Process-wide periodic broadcaster: four independent interval timers
/// (one per [`Cadence`]) fanning out to registered subscribers, so N
/// time-based systems share 4 timers instead of arming N of their own.
///
/// Owned by the composition root and passed by reference (or `Arc`) to
/// whatever registers subsystems; there is intentionally no global
/// instance.
pub struct TickScheduler {
    cadences: [Arc<CadenceState>; 4],
    tasks: Mutex<Vec<JoinHandle<()>>>,
    next_subscription: AtomicU64,
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TickScheduler {
    pub fn new() -> Self {
        Self {
            cadences: Cadence::ALL.map(|c| Arc::new(CadenceState::new(c))),
            tasks: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
        }
    }

    fn state(&self, cadence: Cadence) -> &Arc<CadenceState> {
        &self.cadences[cadence.index()]
    }

    /// Arm all four timers. Idempotent: calling on a running scheduler
    /// logs a warning and changes nothing. Must run inside a tokio
    /// runtime; the first fire of each cadence lands one full interval
    /// after this call.
    pub fn start(&self) {
        let mut tasks = lock(&self.tasks);
        if !tasks.is_empty() {
            tracing::warn!("tick scheduler already running, start ignored");
            return;
        }
        for state in &self.cadences {
            let state = Arc::clone(state);
            tasks.push(tokio::spawn(run_cadence(state)));
        }
        tracing::info!("tick scheduler started");
    }

    /// Cancel all timers and clear every subscriber registration. Fire
    /// counters are kept for post-mortem inspection. Idempotent.
    pub fn stop(&self) {
        let mut tasks = lock(&self.tasks);
        if tasks.is_empty() {
            return;
        }
        for task in tasks.drain(..) {
            task.abort();
        }
        for state in &self.cadences {
            lock(&state.subscribers).clear();
        }
        tracing::info!("tick scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        !lock(&self.tasks).is_empty()
    }

    /// Register a callback on a cadence. Each call is an independent
    /// registration, even for an identical closure.
    pub fn subscribe(
        &self,
        cadence: Cadence,
        callback: impl FnMut(TickSignal) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        lock(&self.state(cadence).subscribers).push(Subscriber {
            id,
            callback: Arc::new(Mutex::new(Box::new(callback))),
        });
        tracing::debug!(cadence = %cadence, subscription = id.0, "tick subscriber registered");
        id
    }

    /// Remove the registration behind `id`. Returns false if no such
    /// registration exists on that cadence.
    pub fn unsubscribe(&self, cadence: Cadence, id: SubscriptionId) -> bool {
        let mut subscribers = lock(&self.state(cadence).subscribers);
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        before != subscribers.len()
    }

    /// Read-only diagnostics: per-cadence fire count and subscriber count.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            cadences: Cadence::ALL.map(|cadence| {
                let state = self.state(cadence);
                CadenceStats {
                    cadence,
                    count: state.count.load(Ordering::SeqCst),
                    subscribers: lock(&state.subscribers).len(),
                }
            }),
        }
    }
}

async fn run_cadence(state: Arc<CadenceState>) {
    let period = state.cadence.interval();
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        state.fire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting(counter: &Arc<AtomicUsize>) -> impl FnMut(TickSignal) + Send + 'static {
        let counter = Arc::clone(counter);
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stats_zero_after_start() {
        let scheduler = TickScheduler::new();
        scheduler.subscribe(Cadence::Fast, |_| {});
        scheduler.subscribe(Cadence::Fast, |_| {});
        scheduler.subscribe(Cadence::Slow, |_| {});
        scheduler.start();

        let stats = scheduler.stats();
        for cadence in Cadence::ALL {
            assert_eq!(stats.cadence(cadence).count, 0);
        }
        assert_eq!(stats.cadence(Cadence::Fast).subscribers, 2);
        assert_eq!(stats.cadence(Cadence::Mid).subscribers, 0);
        assert_eq!(stats.cadence(Cadence::Slow).subscribers, 1);
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn fires_on_each_interval() {
        let scheduler = TickScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        scheduler.subscribe(Cadence::Fast, counting(&fired));
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 3);
        let stats = scheduler.stats();
        assert_eq!(stats.cadence(Cadence::Fast).count, 3);
        assert_eq!(stats.cadence(Cadence::Mid).count, 0);
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn cadences_fire_independently() {
        let scheduler = TickScheduler::new();
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(2050)).await;

        let stats = scheduler.stats();
        assert_eq!(stats.cadence(Cadence::Fast).count, 20);
        assert_eq!(stats.cadence(Cadence::Mid).count, 2);
        assert_eq!(stats.cadence(Cadence::Slow).count, 1);
        assert_eq!(stats.cadence(Cadence::Background).count, 0);
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_does_not_double_rate() {
        let scheduler = TickScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        scheduler.subscribe(Cadence::Fast, counting(&fired));
        scheduler.start();
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(550)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 5);
        assert_eq!(scheduler.stats().cadence(Cadence::Fast).count, 5);
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_registrations_fire_independently() {
        let scheduler = TickScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let a = scheduler.subscribe(Cadence::Fast, counting(&fired));
        let b = scheduler.subscribe(Cadence::Fast, counting(&fired));
        assert_ne!(a, b);
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(150)).await;

        // One fire, two registrations.
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_removes_one_registration() {
        let scheduler = TickScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let keep = scheduler.subscribe(Cadence::Fast, counting(&fired));
        let extra = scheduler.subscribe(Cadence::Fast, counting(&fired));

        assert!(scheduler.unsubscribe(Cadence::Fast, extra));
        assert!(!scheduler.unsubscribe(Cadence::Fast, extra));
        assert_eq!(scheduler.stats().cadence(Cadence::Fast).subscribers, 1);

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        assert!(scheduler.unsubscribe(Cadence::Fast, keep));
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_subscriber_does_not_block_others() {
        let scheduler = TickScheduler::new();
        scheduler.subscribe(Cadence::Fast, |_| panic!("subscriber bug"));
        let fired = Arc::new(AtomicUsize::new(0));
        scheduler.subscribe(Cadence::Fast, counting(&fired));
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(250)).await;

        // The healthy subscriber saw both fires and the timer kept going.
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.stats().cadence(Cadence::Fast).count, 2);
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_clears_subscribers_and_keeps_counts() {
        let scheduler = TickScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        scheduler.subscribe(Cadence::Fast, counting(&fired));
        scheduler.start();
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_millis(250)).await;
        scheduler.stop();
        assert!(!scheduler.is_running());

        let stats = scheduler.stats();
        assert_eq!(stats.cadence(Cadence::Fast).count, 2);
        assert_eq!(stats.cadence(Cadence::Fast).subscribers, 0);

        // No more fires after stop.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(scheduler.stats().cadence(Cadence::Fast).count, 2);
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        // Stopping again is a no-op.
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn restart_continues_counting() {
        let scheduler = TickScheduler::new();
        scheduler.start();
        tokio::time::sleep(Duration::from_millis(250)).await;
        scheduler.stop();

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(scheduler.stats().cadence(Cadence::Fast).count, 3);
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn signal_carries_post_increment_count() {
        let scheduler = TickScheduler::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        scheduler.subscribe(Cadence::Fast, move |signal| {
            lock(&sink).push(signal.count);
        });
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(*lock(&seen), vec![1, 2, 3]);
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn subscriber_may_read_stats_during_dispatch() {
        let scheduler = Arc::new(TickScheduler::new());
        let observed = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&scheduler);
        let sink = Arc::clone(&observed);
        scheduler.subscribe(Cadence::Fast, move |_| {
            sink.store(
                inner.stats().cadence(Cadence::Fast).count as usize,
                Ordering::SeqCst,
            );
        });
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(observed.load(Ordering::SeqCst), 1);
        scheduler.stop();
    }
}
