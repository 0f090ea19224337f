use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::snapshot::SyncSnapshot;
use crate::api::{ApiError, Job, JobsApi};

/// Delay between the end of one poll and the start of the next.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// Whether the synchronizer is currently running its poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Polling,
}

/// Keeps a local [`SyncSnapshot`] in step with the server's job list.
///
/// One poll at a time: `list_jobs`, fold the outcome into the snapshot,
/// notify subscribers, sleep for the interval, repeat. Failures never clear
/// known jobs and never stop the loop.
///
/// Every `start()`/`stop()` bumps a generation counter. Each poll carries
/// the generation it was issued under and its result is applied only if
/// that is still current, so a slow response landing after a restart cannot
/// overwrite newer state. Network calls are never aborted; their results are
/// dropped instead.
///
/// `start` and `refresh` spawn tasks and must be called inside a Tokio
/// runtime.
pub struct JobSynchronizer<C> {
    inner: Arc<Inner<C>>,
}

struct Inner<C> {
    client: Arc<C>,
    interval: Duration,
    // Handed to every poll and never cancelled.
    poll_token: CancellationToken,
    state: Mutex<PollState>,
    subscribers: Arc<Subscribers>,
}

struct PollState {
    generation: u64,
    phase: SyncPhase,
    in_flight: bool,
    // A start() arrived while a stale poll was still out.
    poll_queued: bool,
    timer: Option<JoinHandle<()>>,
    // Bumped whenever a timer is replaced; a tick from any other timer is ignored.
    timer_seq: u64,
    snapshot: SyncSnapshot,
}

impl<C> Inner<C> {
    fn lock(&self) -> MutexGuard<'_, PollState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C> JobSynchronizer<C>
where
    C: JobsApi + 'static,
{
    pub fn new(client: Arc<C>) -> Self {
        Self::with_interval(client, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(client: Arc<C>, interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                interval,
                poll_token: CancellationToken::new(),
                state: Mutex::new(PollState {
                    generation: 0,
                    phase: SyncPhase::Idle,
                    in_flight: false,
                    poll_queued: false,
                    timer: None,
                    timer_seq: 0,
                    snapshot: SyncSnapshot::default(),
                }),
                subscribers: Arc::new(Subscribers::default()),
            }),
        }
    }

    /// Idle → Polling. Starts a fresh snapshot and polls immediately.
    pub fn start(&self) {
        let mut state = self.inner.lock();
        if state.phase == SyncPhase::Polling {
            return;
        }
        state.phase = SyncPhase::Polling;
        state.generation += 1;
        state.snapshot = SyncSnapshot::default();
        tracing::debug!(generation = state.generation, "job synchronizer started");

        if state.in_flight {
            state.poll_queued = true;
        } else {
            Inner::launch(&self.inner, &mut state);
        }
    }

    /// Polls once right now unless a poll is already in flight.
    ///
    /// Returns `false` when the call was a no-op. When running, the regular
    /// schedule resumes from the end of this poll.
    pub fn refresh(&self) -> bool {
        let mut state = self.inner.lock();
        if state.in_flight {
            tracing::debug!("refresh ignored, poll already in flight");
            return false;
        }
        cancel_timer(&mut state);
        Inner::launch(&self.inner, &mut state);
        true
    }

    /// Registers an observer. It receives the current snapshot right away
    /// and every later change.
    pub fn subscribe(&self) -> Subscription {
        // Held so no broadcast can slip between the read and the registration.
        let state = self.inner.lock();
        self.inner.subscribers.add(state.snapshot.clone())
    }
}

impl<C> JobSynchronizer<C> {
    /// Polling → Idle. Cancels the pending timer and marks any in-flight
    /// poll as stale. The snapshot is discarded without notifying anyone.
    pub fn stop(&self) {
        let mut state = self.inner.lock();
        if state.phase == SyncPhase::Idle {
            return;
        }
        state.phase = SyncPhase::Idle;
        state.generation += 1;
        state.poll_queued = false;
        cancel_timer(&mut state);
        state.snapshot = SyncSnapshot::default();
        tracing::debug!(generation = state.generation, "job synchronizer stopped");
    }

    pub fn phase(&self) -> SyncPhase {
        self.inner.lock().phase
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.inner.lock().snapshot.clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.inner.lock().in_flight
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl<C> Drop for JobSynchronizer<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<C> Inner<C>
where
    C: JobsApi + 'static,
{
    fn launch(this: &Arc<Self>, state: &mut PollState) {
        state.in_flight = true;
        state.poll_queued = false;
        let generation = state.generation;
        let inner = Arc::clone(this);
        tokio::spawn(async move {
            let outcome = inner.client.list_jobs(&inner.poll_token).await;
            Inner::complete(&inner, generation, outcome);
        });
    }

    fn complete(this: &Arc<Self>, generation: u64, outcome: Result<Vec<Job>, ApiError>) {
        let mut state = this.lock();
        state.in_flight = false;

        if generation != state.generation {
            tracing::debug!(
                generation,
                current = state.generation,
                "discarding stale poll result"
            );
            if state.phase == SyncPhase::Polling && state.poll_queued {
                Inner::launch(this, &mut state);
            }
            return;
        }

        match &outcome {
            Ok(jobs) => tracing::debug!(count = jobs.len(), "job list refreshed"),
            Err(err) => tracing::warn!(error = %err, "job poll failed"),
        }
        state.snapshot.apply(outcome);
        this.subscribers.broadcast(&state.snapshot);

        if state.phase == SyncPhase::Polling {
            Inner::schedule(this, &mut state);
        }
    }

    fn schedule(this: &Arc<Self>, state: &mut PollState) {
        cancel_timer(state);
        let seq = state.timer_seq;
        let interval = this.interval;
        let inner = Arc::clone(this);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            Inner::tick(&inner, seq);
        }));
    }

    // An aborted timer can already be past its sleep and waiting on the lock,
    // so the sequence check is what actually retires it.
    fn tick(this: &Arc<Self>, seq: u64) {
        let mut state = this.lock();
        if seq != state.timer_seq || state.phase != SyncPhase::Polling {
            return;
        }
        state.timer = None;
        if !state.in_flight {
            Inner::launch(this, &mut state);
        }
    }
}

fn cancel_timer(state: &mut PollState) {
    state.timer_seq += 1;
    if let Some(timer) = state.timer.take() {
        timer.abort();
    }
}

#[derive(Default)]
struct Subscribers {
    list: Mutex<SubscriberList>,
}

#[derive(Default)]
struct SubscriberList {
    next_id: u64,
    senders: Vec<(u64, watch::Sender<SyncSnapshot>)>,
}

impl Subscribers {
    fn lock(&self) -> MutexGuard<'_, SubscriberList> {
        self.list.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add(self: &Arc<Self>, current: SyncSnapshot) -> Subscription {
        let (tx, mut rx) = watch::channel(current);
        // The current snapshot counts as unseen.
        rx.mark_changed();
        let mut list = self.lock();
        let id = list.next_id;
        list.next_id += 1;
        list.senders.push((id, tx));
        Subscription {
            id,
            rx,
            registry: Arc::downgrade(self),
        }
    }

    fn remove(&self, id: u64) {
        self.lock().senders.retain(|(sid, _)| *sid != id);
    }

    fn broadcast(&self, snapshot: &SyncSnapshot) {
        self.lock()
            .senders
            .retain(|(_, tx)| tx.send(snapshot.clone()).is_ok());
    }

    fn len(&self) -> usize {
        self.lock().senders.len()
    }
}

/// Receiving end of [`JobSynchronizer::subscribe`].
///
/// Holds at most one pending snapshot: a subscriber that falls behind skips
/// straight to the newest one. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    rx: watch::Receiver<SyncSnapshot>,
    registry: Weak<Subscribers>,
}

impl Subscription {
    /// Next unseen snapshot, or `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<SyncSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// The unseen snapshot, if any, without waiting.
    ///
    /// `None` means nothing new, whether the synchronizer is just between
    /// polls or gone for good. Use [`is_closed`](Self::is_closed) to tell
    /// the two apart.
    pub fn try_recv(&mut self) -> Option<SyncSnapshot> {
        match self.rx.has_changed() {
            Ok(true) => Some(self.rx.borrow_and_update().clone()),
            _ => None,
        }
    }

    /// `true` once unsubscribed or the synchronizer has been dropped.
    pub fn is_closed(&self) -> bool {
        self.rx.has_changed().is_err()
    }

    /// Idempotent; safe after the synchronizer has stopped or been dropped.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
