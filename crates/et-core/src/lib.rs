//! Core domain logic for the engagement tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Sessions: per-contact engagement windows and their time arithmetic
//! - Lifecycle: creating, continuing, validating, clamping and finalizing sessions
//! - Aggregation: summing stored durations into a display badge
//! - Activity: outgoing-message events and page timestamp parsing
//!
//! Storage, timers, delivery and the clock are traits so the lifecycle can be
//! driven deterministically in tests and by the tokio runtime in the CLI.

pub mod activity;
pub mod aggregate;
pub mod clock;
pub mod delivery;
mod error;
pub mod lifecycle;
pub mod session;
pub mod store;
pub mod testing;
pub mod timer;

pub use activity::{ActivityEvent, parse_message_timestamp};
pub use aggregate::{AggregateReporter, BadgeSink, BadgeUpdate, total_minutes};
pub use clock::{Clock, SystemClock};
pub use delivery::Delivery;
pub use error::{DeliveryError, StoreError};
pub use lifecycle::{
    ActivityOutcome, DEFAULT_OPERATOR, DeliveryStatus, FinalizeOutcome, INACTIVITY_TIMEOUT,
    LifecycleSettings, STALE_TOLERANCE_MS, SessionLifecycle, StalePolicy, TrackerConfig,
};
pub use session::{Clamp, Invalidity, Session};
pub use store::{MemoryStore, SessionStore};
pub use timer::{TimerId, TimerRegistry};
