use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::config::{validate_override, EffectiveConfig};
use crate::limits::*;
use crate::model::*;

use super::capacity::{allocate, busy_operators, needs_operator, require_ball_option};
use super::conflict::{check_no_conflict, now_local};
use super::lifecycle::{plan_transition, Transition};
use super::locks::{wicket_key, LockGuard, CONFIG_KEY, OPERATOR_POOL_KEY};
use super::merge::merge_contiguous;
use super::validate::{validate_booking_time, validate_names};
use super::{Engine, EngineError, JournalCommand, MultiBookingError, ValidationError};

impl Engine {
    /// Validate, lock the wicket, check conflicts and operators, then journal
    /// and insert. The wicket lock is held from the conflict check through
    /// the insert.
    pub async fn create_booking(&self, req: BookingRequest) -> Result<Booking, EngineError> {
        let cfg = self.effective_config();
        self.create_booking_with(req, &cfg).await
    }

    async fn create_booking_with(&self, req: BookingRequest, cfg: &EffectiveConfig) -> Result<Booking, EngineError> {
        let wicket = req.options.wicket;
        match self.try_create_booking(req, cfg).await {
            Ok(booking) => {
                metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
                Ok(booking)
            }
            Err(e) => {
                metrics::counter!(crate::observability::BOOKING_REJECTIONS_TOTAL, "reason" => e.reason())
                    .increment(1);
                debug!(%wicket, error = %e, "booking rejected");
                Err(e)
            }
        }
    }

    async fn try_create_booking(&self, req: BookingRequest, cfg: &EffectiveConfig) -> Result<Booking, EngineError> {
        let now = now_local();
        let opts = req.options;
        let duration = req.duration_minutes.unwrap_or(cfg.slot_minutes);

        validate_names(req.requester.as_deref(), req.player_name.as_deref())?;
        validate_booking_time(req.start, duration, cfg, now)?;
        require_ball_option(opts.machine, opts.leather_option)?;
        let span = Span::from_minutes(req.start, duration);

        let mut guards = vec![self.locks.acquire(&wicket_key(opts.wicket)).await?];
        check_no_conflict(&self.store, opts.wicket, &span)?;

        // Operator count spans every wicket, so it needs its own lock.
        let busy = if needs_operator(opts.machine, opts.self_operate) {
            guards.push(self.locks.acquire(OPERATOR_POOL_KEY).await?);
            busy_operators(&self.store.overlapping_any_wicket(&span))
        } else {
            0
        };
        let allocation = allocate(opts.machine, opts.self_operate, busy, cfg.operator_capacity)?;
        if allocation.fell_back {
            metrics::counter!(crate::observability::OPERATOR_FALLBACKS_TOTAL).increment(1);
        }

        let booking = Booking {
            id: Ulid::new(),
            span,
            ball: opts.ball,
            wicket: opts.wicket,
            machine: opts.machine,
            leather_option: opts.leather_option,
            self_operated: allocation.self_operated,
            requester: req.requester,
            player_name: req.player_name.unwrap_or_else(|| GUEST_PLAYER_NAME.to_string()),
            status: BookingStatus::Pending,
        };
        self.persist_and_apply(
            Event::BookingCreated {
                booking: booking.clone(),
            },
            guards,
        )
        .await?;

        info!(
            id = %booking.id,
            wicket = %booking.wicket,
            start = %booking.span.start,
            minutes = duration,
            self_operated = booking.self_operated,
            "booking created"
        );
        Ok(booking)
    }

    /// Book several slots with shared options. Contiguous starts are merged
    /// into one booking each; groups are created in time order and the first
    /// failure stops the loop. Groups created before the failure stay booked
    /// and are returned inside the error.
    pub async fn create_multi_booking(
        &self,
        req: MultiBookingRequest,
    ) -> Result<Vec<Booking>, MultiBookingError> {
        let cfg = self.effective_config();
        self.create_multi_booking_with(req, &cfg).await
    }

    /// Merge and create every group against one config, so a concurrent
    /// slot-size change cannot split the request across two grids.
    pub(super) async fn create_multi_booking_with(
        &self,
        req: MultiBookingRequest,
        cfg: &EffectiveConfig,
    ) -> Result<Vec<Booking>, MultiBookingError> {
        if req.starts.len() > MAX_SLOTS_PER_REQUEST {
            return Err(MultiBookingError {
                committed: Vec::new(),
                source: ValidationError::TooManySlots(req.starts.len()).into(),
            });
        }

        let groups = merge_contiguous(&req.starts, cfg.slot_minutes);
        debug!(slots = req.starts.len(), groups = groups.len(), "multi-slot request merged");

        let mut committed = Vec::with_capacity(groups.len());
        for group in groups {
            let single = BookingRequest {
                start: group.start,
                duration_minutes: Some(group.duration_minutes),
                options: req.options.clone(),
                requester: req.requester.clone(),
                player_name: req.player_name.clone(),
            };
            match self.create_booking_with(single, cfg).await {
                Ok(booking) => committed.push(booking),
                Err(source) => {
                    warn!(
                        committed = committed.len(),
                        failed_start = %group.start,
                        error = %source,
                        "multi-slot booking stopped"
                    );
                    return Err(MultiBookingError { committed, source });
                }
            }
        }
        Ok(committed)
    }

    /// Mark a booking cancelled. It stays in the store and stops counting
    /// toward conflicts and operators.
    pub async fn cancel_booking(&self, id: Ulid) -> Result<(), EngineError> {
        self.transition(id, BookingStatus::Cancelled).await.map(|_| ())
    }

    pub async fn mark_done(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.transition(id, BookingStatus::Done).await
    }

    async fn transition(&self, id: Ulid, to: BookingStatus) -> Result<Booking, EngineError> {
        let wicket = self.store.wicket_of(&id).ok_or(EngineError::NotFound(id))?;
        let guard = self.locks.acquire(&wicket_key(wicket)).await?;
        let current = self.store.get(&id).ok_or(EngineError::NotFound(id))?;

        match plan_transition(id, current.status, to)? {
            Transition::NoOp => {
                debug!(%id, status = %to, "status unchanged");
                Ok(current)
            }
            Transition::Apply => {
                self.persist_and_apply(Event::BookingStatusChanged { id, status: to }, vec![guard])
                    .await?;
                info!(%id, from = %current.status, %to, "booking status changed");
                Ok(Booking { status: to, ..current })
            }
        }
    }

    /// Write an override. Known keys must parse; unknown keys are kept as-is.
    pub async fn set_config_override(&self, key: String, value: String) -> Result<(), EngineError> {
        validate_override(&key, &value)?;
        let guard = self.locks.acquire(CONFIG_KEY).await?;
        info!(%key, %value, "setting config override");
        self.persist_and_apply(Event::ConfigOverrideSet { key, value }, vec![guard])
            .await
    }

    /// Rewrite the journal as a snapshot of current state. Every wicket lock
    /// and the config lock are held while the snapshot is taken and written,
    /// so no journaled event can be missing from it.
    pub async fn compact_journal(&self) -> Result<(), EngineError> {
        let mut guards: Vec<LockGuard> = Vec::with_capacity(Wicket::ALL.len() + 1);
        for wicket in Wicket::ALL {
            guards.push(self.locks.acquire(&wicket_key(wicket)).await?);
        }
        guards.push(self.locks.acquire(CONFIG_KEY).await?);

        let mut events: Vec<Event> = self
            .overrides
            .entries()
            .into_iter()
            .map(|e| Event::ConfigOverrideSet {
                key: e.key,
                value: e.value,
            })
            .collect();
        events.extend(
            self.store
                .all()
                .into_iter()
                .map(|booking| Event::BookingCreated { booking }),
        );
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.journal_request(JournalCommand::Compact { events, response: tx }, rx)
            .await?
            .map_err(|e| EngineError::Journal(e.to_string()))?;
        info!(events = count, "journal compacted");
        Ok(())
    }

    pub async fn journal_appends_since_compact(&self) -> Result<u64, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.journal_request(JournalCommand::AppendsSinceCompact { response: tx }, rx)
            .await
    }
}
