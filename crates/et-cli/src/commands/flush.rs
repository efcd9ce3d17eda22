//! Flush command for finalizing every live session immediately.

use std::io::{self, Write};

use anyhow::{Context, Result};
use et_core::{
    DeliveryStatus, FinalizeOutcome, SessionLifecycle, SessionStore, SystemClock, TrackerConfig,
};
use et_http::HttpDelivery;
use tokio::sync::mpsc;

use crate::Config;
use crate::runtime::{JsonLinesBadge, TokioTimers};

pub fn run<W: Write, S: SessionStore>(writer: &mut W, store: S, config: &Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    let outcomes = runtime.block_on(flush(store, config))?;
    write_summary(writer, &outcomes)
}

async fn flush<S: SessionStore>(
    store: S,
    config: &Config,
) -> Result<Vec<(String, FinalizeOutcome)>> {
    let (fired, _expired) = mpsc::unbounded_channel();
    let delivery = HttpDelivery::new().context("failed to create HTTP delivery")?;
    let mut lifecycle = SessionLifecycle::new(
        store,
        TokioTimers::new(fired),
        delivery,
        JsonLinesBadge::new(io::sink()),
        SystemClock,
        config.lifecycle(),
    );
    let tracker: TrackerConfig = config.tracker();
    let outcomes = lifecycle
        .finalize_all(&tracker)
        .context("failed to finalize sessions")?;
    lifecycle.delivery().drain().await;
    Ok(outcomes)
}

fn write_summary<W: Write>(writer: &mut W, outcomes: &[(String, FinalizeOutcome)]) -> Result<()> {
    if outcomes.is_empty() {
        writeln!(writer, "No live sessions.")?;
        return Ok(());
    }

    for (contact, outcome) in outcomes {
        match outcome {
            FinalizeOutcome::NoSession => {}
            FinalizeOutcome::Discarded(invalidity) => {
                writeln!(writer, "{contact}: discarded ({invalidity})")?;
            }
            FinalizeOutcome::Finalized {
                session,
                clamped,
                delivery,
            } => {
                let delivery = match delivery {
                    DeliveryStatus::Submitted => "submitted",
                    DeliveryStatus::NoEndpoint => "not delivered, no endpoint configured",
                    DeliveryStatus::Failed => "delivery failed",
                };
                let clamped = if *clamped { ", clamped" } else { "" };
                writeln!(
                    writer,
                    "{contact}: {}min, {} messages{clamped} ({delivery})",
                    session.duration_minutes, session.message_count
                )?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDate;
    use et_core::{MemoryStore, Session};

    use insta::assert_snapshot;

    fn session(contact: &str, end: i64, messages: u32) -> Session {
        let mut session = Session::open(
            contact,
            0,
            NaiveDate::from_ymd_opt(2025, 1, 29).unwrap(),
            "Unknown",
        );
        session.end_time = end;
        session.message_count = messages;
        session.duration_minutes = end / 60_000 + 1;
        session
    }

    #[test]
    fn test_flush_finalizes_everything_without_endpoint() {
        let mut store = MemoryStore::new();
        store.save("Alice", &session("Alice", 0, 1)).unwrap();
        store.save("Bob", &session("Bob", 30_000, 2)).unwrap();
        store.save("Carla", &session("Carla", 600_000, 2)).unwrap();

        let config = Config {
            endpoint_url: None,
            ..Config::default()
        };
        let mut output = Vec::new();
        run(&mut output, store, &config).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap().trim_end(), @r"
        Alice: discarded (empty time range 0..0)
        Bob: 1min, 2 messages (not delivered, no endpoint configured)
        Carla: 2min, 2 messages, clamped (not delivered, no endpoint configured)
        ");
    }

    #[test]
    fn test_flush_reports_empty_store() {
        let mut output = Vec::new();
        run(&mut output, MemoryStore::new(), &Config::default()).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "No live sessions.\n");
    }
}
