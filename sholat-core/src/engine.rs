use crate::clock::Clock;
use crate::countdown::{CountdownView, PrayerClock};
use crate::prayer::{Prayer, PrayerSchedule};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const LOG_TARGET: &str = "sholat::engine";

/// Interval between countdown evaluations
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Events emitted by the countdown engine
#[derive(Debug, Clone)]
pub enum ClockEvent {
    /// Result of every evaluation
    Tick { view: CountdownView },
    /// The prayer being counted down to changed
    NextPrayerChanged { prayer: Prayer },
    /// An adzan began (or was resumed after a restart)
    AnnouncementStarted { prayer: Prayer },
    /// The adzan window closed or was interrupted
    AnnouncementEnded { prayer: Prayer },
    /// A new schedule was installed
    ScheduleChanged { schedule: PrayerSchedule },
    /// There is no schedule to count down to
    ScheduleUnavailable,
}

struct EngineInner {
    clock: PrayerClock,
    schedule: PrayerSchedule,
    last_view: Option<CountdownView>,
}

/// Drives a [`PrayerClock`] once per second and broadcasts what changed.
///
/// The clock, its audio sink and the persisted record are only touched while
/// holding the engine lock, so ticks and schedule changes never interleave.
pub struct CountdownEngine {
    inner: Mutex<EngineInner>,
    time_source: Arc<dyn Clock>,
    event_tx: broadcast::Sender<ClockEvent>,
    tick_interval: Duration,
    cancel_token: CancellationToken,
}

impl CountdownEngine {
    /// Create a new engine with an empty schedule.
    ///
    /// # Arguments
    /// * `clock` - State machine to drive
    /// * `time_source` - Wall clock the state machine is evaluated against
    /// * `cancel_token` - Optional external cancellation token for graceful shutdown
    #[must_use]
    pub fn new(
        clock: PrayerClock,
        time_source: Arc<dyn Clock>,
        cancel_token: Option<CancellationToken>,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);

        Arc::new(Self {
            inner: Mutex::new(EngineInner {
                clock,
                schedule: PrayerSchedule::new(),
                last_view: None,
            }),
            time_source,
            event_tx,
            tick_interval: TICK_INTERVAL,
            cancel_token: cancel_token.unwrap_or_default(),
        })
    }

    /// Subscribe to clock events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClockEvent> {
        self.event_tx.subscribe()
    }

    /// Get a clone of the cancellation token
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Stop the tick loop
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    /// Current wall-clock time as seen by the engine
    #[must_use]
    pub fn now(&self) -> chrono::NaiveDateTime {
        self.time_source.now()
    }

    /// Install a new schedule and evaluate immediately.
    ///
    /// Installing a schedule equal to the current one is a no-op once the
    /// engine has ticked, so periodic refetches do not interrupt an adzan.
    pub async fn set_schedule(&self, schedule: PrayerSchedule) -> CountdownView {
        let mut inner = self.inner.lock().await;

        if inner.schedule == schedule {
            if let Some(view) = inner.last_view.clone() {
                debug!(target: LOG_TARGET, "Schedule unchanged, keeping current state");
                return view;
            }
        }

        info!(target: LOG_TARGET, "Installing schedule with {} prayer(s)", schedule.len());
        inner.clock.replace_schedule(&schedule);
        inner.schedule = schedule.clone();
        let _ = self.event_tx.send(ClockEvent::ScheduleChanged { schedule });

        self.evaluate(&mut inner)
    }

    /// Get the installed schedule
    pub async fn schedule(&self) -> PrayerSchedule {
        self.inner.lock().await.schedule.clone()
    }

    /// Get the most recent view, if the engine has ticked
    pub async fn view(&self) -> Option<CountdownView> {
        self.inner.lock().await.last_view.clone()
    }

    /// Run a single evaluation and emit events
    pub async fn tick_once(&self) -> CountdownView {
        let mut inner = self.inner.lock().await;
        self.evaluate(&mut inner)
    }

    /// Start the tick loop in a background task
    #[must_use]
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        info!(target: LOG_TARGET, "Starting prayer countdown");

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(target: LOG_TARGET, "Countdown shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.tick_once().await;
                }
            }
        }

        self.inner.lock().await.clock.dispose();
    }

    // The tick may do synchronous file I/O on the state file while the lock is
    // held. The record is small and written at most once per announcement.
    fn evaluate(&self, inner: &mut EngineInner) -> CountdownView {
        let now = self.time_source.now();
        let view = inner.clock.tick(now, &inner.schedule);

        for event in transitions(inner.last_view.as_ref(), &view) {
            let _ = self.event_tx.send(event);
        }
        let _ = self.event_tx.send(ClockEvent::Tick { view: view.clone() });

        inner.last_view = Some(view.clone());
        view
    }
}

/// Events implied by moving from `old` to `new`.
fn transitions(old: Option<&CountdownView>, new: &CountdownView) -> Vec<ClockEvent> {
    let mut events = Vec::new();

    let old_announcing = old.filter(|v| v.announcing).and_then(|v| v.next_prayer);
    let new_announcing = if new.announcing { new.next_prayer } else { None };

    if let Some(prayer) = old_announcing {
        if new_announcing != Some(prayer) {
            events.push(ClockEvent::AnnouncementEnded { prayer });
        }
    }

    if let Some(prayer) = new.next_prayer {
        if old.and_then(|v| v.next_prayer) != Some(prayer) {
            events.push(ClockEvent::NextPrayerChanged { prayer });
        }
    } else if old.map_or(true, CountdownView::is_available) {
        events.push(ClockEvent::ScheduleUnavailable);
    }

    if let Some(prayer) = new_announcing {
        if old_announcing != Some(prayer) {
            events.push(ClockEvent::AnnouncementStarted { prayer });
        }
    }

    events
}
