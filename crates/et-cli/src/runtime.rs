//! Tokio-backed adapters for the session lifecycle.
//!
//! Timers run as sleeping tasks that report expirations over a channel; the
//! event loop feeds those back into the lifecycle on its own thread, so timer
//! callbacks and activity are serialized.

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use et_core::{BadgeSink, BadgeUpdate, TimerId, TimerRegistry};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// A timer expiration waiting to be handled by the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFired {
    pub contact: String,
    pub id: TimerId,
}

/// [`TimerRegistry`] whose timers are tokio tasks.
///
/// Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct TokioTimers {
    next_id: u64,
    pending: HashMap<String, (TimerId, JoinHandle<()>)>,
    fired: UnboundedSender<TimerFired>,
}

impl TokioTimers {
    pub fn new(fired: UnboundedSender<TimerFired>) -> Self {
        Self {
            next_id: 0,
            pending: HashMap::new(),
            fired,
        }
    }
}

impl TimerRegistry for TokioTimers {
    fn schedule(&mut self, contact: &str, after: Duration) -> TimerId {
        self.cancel(contact);
        self.next_id += 1;
        let id = TimerId::new(self.next_id);
        let fired = self.fired.clone();
        let owned = contact.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            // The receiver only goes away when the loop is shutting down.
            let _ = fired.send(TimerFired { contact: owned, id });
        });
        self.pending.insert(contact.to_string(), (id, handle));
        id
    }

    fn cancel(&mut self, contact: &str) -> bool {
        self.pending
            .remove(contact)
            .map(|(_, handle)| handle.abort())
            .is_some()
    }

    fn pending(&self, contact: &str) -> Option<TimerId> {
        self.pending.get(contact).map(|(id, _)| *id)
    }

    fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, handle) in self.pending.values() {
            handle.abort();
        }
    }
}

/// Writes badge updates as JSON lines.
#[derive(Debug)]
pub struct JsonLinesBadge<W> {
    writer: W,
}

impl<W: Write> JsonLinesBadge<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    pub const fn get_ref(&self) -> &W {
        &self.writer
    }
}

impl<W: Write> BadgeSink for JsonLinesBadge<W> {
    fn publish(&mut self, update: &BadgeUpdate) {
        let result = serde_json::to_string(update)
            .map_err(std::io::Error::from)
            .and_then(|line| {
                writeln!(self.writer, "{line}")?;
                self.writer.flush()
            });
        if let Err(err) = result {
            tracing::warn!(error = %err, "failed to publish badge update");
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_duration() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TokioTimers::new(tx);
        let id = timers.schedule("Bob", Duration::from_secs(60));

        let start = tokio::time::Instant::now();
        let fired = rx.recv().await.unwrap();
        assert_eq!(
            fired,
            TimerFired {
                contact: "Bob".to_string(),
                id
            }
        );
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert_eq!(timers.pending("Bob"), Some(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_pending_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TokioTimers::new(tx);
        let first = timers.schedule("Bob", Duration::from_secs(60));
        let second = timers.schedule("Bob", Duration::from_secs(90));
        assert_ne!(first, second);
        assert_eq!(timers.pending_count(), 1);

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.id, second);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TokioTimers::new(tx);
        timers.schedule("Bob", Duration::from_secs(60));

        assert!(timers.cancel("Bob"));
        assert!(!timers.cancel("Bob"));
        assert_eq!(timers.pending_count(), 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_badge_lines_are_json() {
        let mut sink = JsonLinesBadge::new(Vec::new());
        sink.publish(&BadgeUpdate::from_total(3));
        sink.publish(&BadgeUpdate::ClearBadge);

        let output = String::from_utf8(sink.get_ref().clone()).unwrap();
        insta::assert_snapshot!(output.trim_end(), @r#"
        {"type":"update-badge","text":"3min"}
        {"type":"clear-badge"}
        "#);
    }
}
