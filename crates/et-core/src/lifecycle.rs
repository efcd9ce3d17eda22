//! Session lifecycle: per-contact `ABSENT -> LIVE -> ABSENT` state machine.
//!
//! Activity for a contact with no stored session opens one; further activity
//! continues it and pushes its inactivity timer back. When the timer fires the
//! session is finalized: validated, clamped to a plausible duration, handed to
//! [`Delivery`] if an endpoint is configured, and cleared. Every mutation
//! refreshes the aggregate badge.
//!
//! All calls for a contact are expected to be serialized on one logical
//! thread. Timer expirations carry their [`TimerId`] and are ignored unless
//! they match the contact's pending timer, so a superseded timer never
//! finalizes a session that was continued after it was scheduled.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::activity::ActivityEvent;
use crate::aggregate::{AggregateReporter, BadgeSink};
use crate::clock::Clock;
use crate::delivery::Delivery;
use crate::error::StoreError;
use crate::session::{Invalidity, MS_PER_MINUTE, Session};
use crate::store::SessionStore;
use crate::timer::{TimerId, TimerRegistry};

/// Inactivity after which a session is finalized.
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(60);

/// Allowed skew between a page timestamp and the session start.
pub const STALE_TOLERANCE_MS: i64 = 1_000;

/// Operator label used when none is configured.
pub const DEFAULT_OPERATOR: &str = "Unknown";

/// What to do with activity timestamped well before the live session started.
///
/// An event is stale when its time precedes the session start by more than
/// the stale tolerance. Times parsed from a page prefix are truncated to the
/// minute, so for those the tolerance is at least one minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    /// Finalize the live session and open a fresh one at the current time.
    #[default]
    Restart,
    /// Apply the event as a continuation at the current time.
    Continue,
    /// Ignore the event.
    Drop,
}

/// Per-call configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub endpoint_url: Option<String>,
    pub operator_label: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            operator_label: DEFAULT_OPERATOR.to_string(),
        }
    }
}

impl TrackerConfig {
    /// The delivery endpoint, ignoring blank values.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// The operator label, falling back to [`DEFAULT_OPERATOR`].
    pub fn operator(&self) -> &str {
        let label = self.operator_label.trim();
        if label.is_empty() {
            DEFAULT_OPERATOR
        } else {
            label
        }
    }
}

/// Lifecycle tunables, replaceable at runtime with `set_settings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleSettings {
    pub inactivity_timeout: Duration,
    pub stale_tolerance_ms: i64,
    pub stale_policy: StalePolicy,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            inactivity_timeout: INACTIVITY_TIMEOUT,
            stale_tolerance_ms: STALE_TOLERANCE_MS,
            stale_policy: StalePolicy::default(),
        }
    }
}

/// Result of applying an activity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// A new session was opened.
    Started,
    /// The live session was extended.
    Continued,
    /// A stale event finalized the live session and opened a fresh one.
    Restarted,
    /// The event was not applied.
    Dropped,
}

/// What happened to a finalized session's delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Submitted,
    NoEndpoint,
    Failed,
}

/// Result of finalizing a contact's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Nothing was stored for the contact.
    NoSession,
    /// The session failed validation and was dropped undelivered.
    Discarded(Invalidity),
    /// The session was valid; `session` holds the (possibly clamped) record.
    Finalized {
        session: Session,
        clamped: bool,
        delivery: DeliveryStatus,
    },
}

/// Owns the session mutation protocol for all contacts.
pub struct SessionLifecycle<S, T, D, B> {
    store: S,
    timers: T,
    delivery: D,
    reporter: AggregateReporter<B>,
    clock: Box<dyn Clock>,
    settings: LifecycleSettings,
}

impl<S, T, D, B> SessionLifecycle<S, T, D, B>
where
    S: SessionStore,
    T: TimerRegistry,
    D: Delivery,
    B: BadgeSink,
{
    pub fn new(
        store: S,
        timers: T,
        delivery: D,
        sink: B,
        clock: impl Clock + 'static,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            store,
            timers,
            delivery,
            reporter: AggregateReporter::new(sink),
            clock: Box::new(clock),
            settings,
        }
    }

    /// Applies one outgoing-activity event.
    pub fn on_activity(
        &mut self,
        event: &ActivityEvent,
        config: &TrackerConfig,
    ) -> Result<ActivityOutcome, StoreError> {
        let contact = event.contact.as_str();
        if contact.trim().is_empty() {
            tracing::warn!("ignoring activity without a contact");
            return Ok(ActivityOutcome::Dropped);
        }

        let event_time = event.event_time();
        if event_time.is_none() {
            tracing::debug!(contact, "activity has no usable timestamp, using clock time");
        }

        let stored = match self.store.load(contact) {
            Err(StoreError::Corrupt { key, source }) => {
                tracing::warn!(contact, %key, error = %source, "replacing undecodable session record");
                None
            }
            other => other?,
        };
        let Some(mut session) = stored else {
            self.start(contact, event_time, config)?;
            return Ok(ActivityOutcome::Started);
        };

        // Page prefixes only carry minutes.
        let tolerance = if event.timestamp_from_prefix() {
            self.settings.stale_tolerance_ms.max(MS_PER_MINUTE)
        } else {
            self.settings.stale_tolerance_ms
        };
        let stale_before = session.start_time.saturating_sub(tolerance);
        if event_time.is_some_and(|at| at < stale_before) {
            tracing::warn!(
                contact,
                event_time,
                start_time = session.start_time,
                policy = ?self.settings.stale_policy,
                "activity predates live session"
            );
            match self.settings.stale_policy {
                StalePolicy::Drop => return Ok(ActivityOutcome::Dropped),
                StalePolicy::Restart => {
                    self.finalize(contact, config)?;
                    self.start(contact, None, config)?;
                    return Ok(ActivityOutcome::Restarted);
                }
                StalePolicy::Continue => {}
            }
        }

        let now = self.clock.now_ms();
        if session.continue_at(now) {
            tracing::warn!(
                contact,
                now,
                start_time = session.start_time,
                "clock is behind session start, pinning end to start"
            );
        }
        self.store.save(contact, &session)?;
        self.reschedule(contact);
        tracing::debug!(
            contact,
            message_count = session.message_count,
            duration_minutes = session.duration_minutes,
            "session continued"
        );
        self.reporter.refresh(&self.store)?;
        Ok(ActivityOutcome::Continued)
    }

    /// Handles a timer expiration. Returns `None` if the timer was superseded.
    pub fn on_timer(
        &mut self,
        contact: &str,
        id: TimerId,
        config: &TrackerConfig,
    ) -> Result<Option<FinalizeOutcome>, StoreError> {
        if self.timers.pending(contact) != Some(id) {
            tracing::debug!(contact, %id, "ignoring superseded timer");
            return Ok(None);
        }
        self.finalize(contact, config).map(Some)
    }

    /// Validates, clamps, delivers and clears the contact's stored session.
    ///
    /// Always re-reads the store. Finalizing a contact with nothing stored is
    /// a no-op.
    pub fn finalize(
        &mut self,
        contact: &str,
        config: &TrackerConfig,
    ) -> Result<FinalizeOutcome, StoreError> {
        self.timers.cancel(contact);
        let stored = match self.store.load(contact) {
            Err(StoreError::Corrupt { key, source }) => {
                tracing::warn!(contact, %key, error = %source, "discarding undecodable session record");
                self.store.clear(contact)?;
                self.reporter.refresh(&self.store)?;
                return Ok(FinalizeOutcome::Discarded(Invalidity::Corrupt));
            }
            other => other?,
        };
        let Some(mut session) = stored else {
            tracing::debug!(contact, "nothing to finalize");
            return Ok(FinalizeOutcome::NoSession);
        };

        if let Err(invalidity) = session.validate() {
            tracing::warn!(contact, %invalidity, "discarding invalid session");
            self.store.clear(contact)?;
            self.reporter.refresh(&self.store)?;
            return Ok(FinalizeOutcome::Discarded(invalidity));
        }

        let clamp = session.clamp();
        if let Some(clamp) = clamp {
            tracing::warn!(
                contact,
                actual_seconds = clamp.actual_seconds,
                max_allowed_seconds = clamp.max_allowed_seconds,
                "clamping implausible session duration"
            );
        }

        let delivery = match config.endpoint() {
            None => {
                tracing::warn!(contact, "no endpoint configured, session not delivered");
                DeliveryStatus::NoEndpoint
            }
            Some(endpoint) => match self.delivery.submit(&session, endpoint) {
                Ok(()) => {
                    tracing::info!(
                        contact,
                        duration_minutes = session.duration_minutes,
                        message_count = session.message_count,
                        "session submitted"
                    );
                    DeliveryStatus::Submitted
                }
                Err(err) => {
                    tracing::error!(contact, error = %err, "session delivery failed");
                    DeliveryStatus::Failed
                }
            },
        };

        self.store.clear(contact)?;
        self.reporter.refresh(&self.store)?;
        Ok(FinalizeOutcome::Finalized {
            session,
            clamped: clamp.is_some(),
            delivery,
        })
    }

    /// Drops the contact's session without delivering it.
    pub fn clear(&mut self, contact: &str) -> Result<(), StoreError> {
        self.timers.cancel(contact);
        self.store.clear(contact)?;
        tracing::info!(contact, "session cleared");
        self.reporter.refresh(&self.store)?;
        Ok(())
    }

    /// Schedules a fresh inactivity timer for every stored session.
    ///
    /// Returns the number of sessions resumed.
    pub fn resume(&mut self) -> Result<usize, StoreError> {
        let contacts = self.store.contacts()?;
        for contact in &contacts {
            self.reschedule(contact);
        }
        if !contacts.is_empty() {
            tracing::info!(count = contacts.len(), "resumed stored sessions");
        }
        self.reporter.refresh(&self.store)?;
        Ok(contacts.len())
    }

    /// Finalizes every stored session now, returning each contact's outcome.
    pub fn finalize_all(
        &mut self,
        config: &TrackerConfig,
    ) -> Result<Vec<(String, FinalizeOutcome)>, StoreError> {
        self.store
            .contacts()?
            .into_iter()
            .map(|contact| {
                let outcome = self.finalize(&contact, config)?;
                Ok((contact, outcome))
            })
            .collect()
    }

    fn start(
        &mut self,
        contact: &str,
        event_time: Option<i64>,
        config: &TrackerConfig,
    ) -> Result<(), StoreError> {
        let at = event_time.unwrap_or_else(|| self.clock.now_ms());
        let session = Session::open(contact, at, self.clock.today(), config.operator());
        self.store.save(contact, &session)?;
        self.reschedule(contact);
        tracing::info!(contact, start_time = at, operator = %session.operator, "session started");
        self.reporter.refresh(&self.store)?;
        Ok(())
    }

    fn reschedule(&mut self, contact: &str) {
        self.timers.cancel(contact);
        let id = self
            .timers
            .schedule(contact, self.settings.inactivity_timeout);
        tracing::debug!(contact, %id, "inactivity timer scheduled");
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn timers(&self) -> &T {
        &self.timers
    }

    pub const fn timers_mut(&mut self) -> &mut T {
        &mut self.timers
    }

    pub const fn delivery(&self) -> &D {
        &self.delivery
    }

    pub const fn reporter(&self) -> &AggregateReporter<B> {
        &self.reporter
    }

    pub const fn settings(&self) -> LifecycleSettings {
        self.settings
    }

    pub const fn set_settings(&mut self, settings: LifecycleSettings) {
        self.settings = settings;
    }
}
