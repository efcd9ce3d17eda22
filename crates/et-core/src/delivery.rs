//! Outbound submission of finalized sessions.

use crate::error::DeliveryError;
use crate::session::Session;

/// Best-effort, one-shot submission of a finalized session.
///
/// Implementations must not block the caller on the network: an `Ok` means
/// the submission was dispatched, not that it arrived. Failures after
/// dispatch are logged by the implementation and never retried.
pub trait Delivery {
    fn submit(&self, session: &Session, endpoint: &str) -> Result<(), DeliveryError>;
}
