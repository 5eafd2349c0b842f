mod capacity;
mod conflict;
mod error;
mod lifecycle;
mod locks;
mod merge;
mod mutations;
mod queries;
mod slots;
mod store;
mod validate;

pub use capacity::{allocate, busy_operators, needs_operator, require_ball_option, Allocation};
pub use conflict::{find_conflicts, overlapping_active};
pub use error::{EngineError, MultiBookingError, ValidationError};
pub use lifecycle::{plan_transition, Transition};
pub use locks::{wicket_key, LockGuard, LockManager, CONFIG_KEY, OPERATOR_POOL_KEY};
pub use merge::{merge_contiguous, SlotGroup};
pub use slots::{SlotGrid, Slots};
pub use store::InMemoryStore;
pub use validate::validate_booking_time;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tracing::info;

use crate::config::{self, ConfigOverrides, Defaults, EffectiveConfig, Settings};
use crate::journal::Journal;
use crate::model::*;

// ── Group-commit journal channel ─────────────────────────

pub(super) enum JournalCommand {
    /// `guards` are the locks the caller took for this event. The writer
    /// drops them only after the event is journaled and applied.
    Append {
        event: Event,
        guards: Vec<LockGuard>,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

struct Pending {
    event: Event,
    guards: Vec<LockGuard>,
    response: oneshot::Sender<io::Result<()>>,
}

/// In-memory state that committed events land in. Shared between the engine
/// and its journal writer.
#[derive(Clone)]
struct LiveState {
    store: Arc<InMemoryStore>,
    overrides: Arc<ConfigOverrides>,
}

impl LiveState {
    fn apply(&self, event: &Event) {
        match event {
            Event::ConfigOverrideSet { key, value } => self.overrides.set(key.clone(), value.clone()),
            other => self.store.apply_event(other),
        }
    }
}

/// Background task owning the journal. Appends that queue up while a flush
/// is in progress are written together and share one fsync.
async fn journal_writer_loop(mut journal: Journal, state: LiveState, mut rx: mpsc::Receiver<JournalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let first = match cmd {
            JournalCommand::Append { event, guards, response } => Pending { event, guards, response },
            other => {
                handle_control(&mut journal, &state, other);
                continue;
            }
        };

        let mut batch = vec![first];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(JournalCommand::Append { event, guards, response }) => {
                    batch.push(Pending { event, guards, response })
                }
                // Control commands run after the batch they interrupted.
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        commit_batch(&mut journal, &state, batch);
        if let Some(cmd) = deferred {
            handle_control(&mut journal, &state, cmd);
        }
    }
}

fn commit_batch(journal: &mut Journal, state: &LiveState, batch: Vec<Pending>) {
    metrics::histogram!(crate::observability::JOURNAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = Instant::now();

    let pushed = batch.iter().try_for_each(|p| journal.push(&p.event));
    // Sync even after a failed push so half-written bytes don't bleed into
    // the next batch; every sender in this batch is told it failed.
    let synced = journal.sync();
    let outcome = pushed.and(synced);

    metrics::histogram!(crate::observability::JOURNAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    for Pending { event, guards, response } in batch {
        let reply = match &outcome {
            Ok(()) => {
                state.apply(&event);
                Ok(())
            }
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        drop(guards);
        let _ = response.send(reply);
    }
}

fn handle_control(journal: &mut Journal, state: &LiveState, cmd: JournalCommand) {
    match cmd {
        JournalCommand::Compact { events, response } => {
            let _ = response.send(journal.rewrite(&events));
        }
        JournalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(journal.appends_since_compact());
        }
        JournalCommand::Append { event, guards, response } => {
            commit_batch(journal, state, vec![Pending { event, guards, response }])
        }
    }
}

/// The booking engine. Share it behind an `Arc`; every method takes `&self`.
pub struct Engine {
    pub(super) store: Arc<InMemoryStore>,
    pub(super) overrides: Arc<ConfigOverrides>,
    pub(super) locks: LockManager,
    defaults: Defaults,
    journal_tx: mpsc::Sender<JournalCommand>,
}

impl Engine {
    /// Replay the journal at `journal_path` and start its writer task.
    /// Must be called inside a tokio runtime.
    pub fn new(journal_path: PathBuf, defaults: Defaults, lock_timeout: Duration) -> io::Result<Self> {
        let events = Journal::replay(&journal_path)?;
        let journal = Journal::open(&journal_path)?;

        let state = LiveState {
            store: Arc::new(InMemoryStore::new()),
            overrides: Arc::new(ConfigOverrides::new()),
        };
        for event in &events {
            state.apply(event);
        }

        let (journal_tx, journal_rx) = mpsc::channel(4096);
        tokio::spawn(journal_writer_loop(journal, state.clone(), journal_rx));

        let engine = Self {
            store: state.store,
            overrides: state.overrides,
            locks: LockManager::new(lock_timeout),
            defaults,
            journal_tx,
        };
        info!(
            path = %journal_path.display(),
            events = events.len(),
            bookings = engine.store.len(),
            "journal replayed"
        );
        Ok(engine)
    }

    pub fn from_settings(settings: &Settings) -> io::Result<Self> {
        Self::new(settings.journal_path(), settings.defaults.clone(), settings.lock_timeout)
    }

    /// Parameters in force right now: each override if set, else the default.
    pub fn effective_config(&self) -> EffectiveConfig {
        config::resolve(&*self.overrides, &self.defaults)
    }

    async fn journal_request<T>(
        &self,
        cmd: JournalCommand,
        rx: oneshot::Receiver<T>,
    ) -> Result<T, EngineError> {
        self.journal_tx
            .send(cmd)
            .await
            .map_err(|_| EngineError::Journal("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Journal("journal writer dropped response".into()))
    }

    /// Journal the event and apply it in memory. `guards` must cover the
    /// state the event touches; they are handed to the writer and released
    /// once the event is durable and visible, whether or not this future is
    /// still being polled.
    pub(super) async fn persist_and_apply(&self, event: Event, guards: Vec<LockGuard>) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        let cmd = JournalCommand::Append {
            event,
            guards,
            response: tx,
        };
        self.journal_request(cmd, rx)
            .await?
            .map_err(|e| EngineError::Journal(e.to_string()))
    }
}
