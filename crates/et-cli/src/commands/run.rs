//! Run command: the tracker event loop.
//!
//! Activity and control lines arrive on stdin, timer expirations arrive from
//! [`TokioTimers`]. Both are handled one at a time on a current-thread
//! runtime, so the lifecycle never sees two callbacks for a contact at once.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use et_core::{
    BadgeSink, Delivery, SessionLifecycle, SessionStore, SystemClock, TimerRegistry,
    TrackerConfig,
};
use et_http::HttpDelivery;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::Config;
use crate::input::{InputLine, parse_line};
use crate::runtime::{JsonLinesBadge, TokioTimers};

/// Loop state that survives configuration reloads.
#[derive(Debug, Clone)]
pub struct RunState {
    pub tracker: TrackerConfig,
    pub config_path: Option<PathBuf>,
}

/// Applies one input line to the lifecycle.
pub fn handle_line<S, T, D, B>(
    lifecycle: &mut SessionLifecycle<S, T, D, B>,
    state: &mut RunState,
    line: &str,
) -> Result<()>
where
    S: SessionStore,
    T: TimerRegistry,
    D: Delivery,
    B: BadgeSink,
{
    let Some(input) = parse_line(line)? else {
        return Ok(());
    };
    match input {
        InputLine::Activity(event) => {
            let outcome = lifecycle.on_activity(&event, &state.tracker)?;
            tracing::debug!(contact = %event.contact, ?outcome, "activity applied");
        }
        InputLine::Clear { contact } => lifecycle.clear(&contact)?,
        InputLine::ReloadConfig => {
            let config = Config::load_from(state.config_path.as_deref())
                .context("failed to reload configuration")?;
            tracing::info!(?config, "reloaded configuration");
            state.tracker = config.tracker();
            lifecycle.set_settings(config.lifecycle());
        }
    }
    Ok(())
}

pub fn run<S: SessionStore>(
    store: S,
    config: &Config,
    config_path: Option<PathBuf>,
    flush_on_exit: bool,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    runtime.block_on(event_loop(store, config, config_path, flush_on_exit))
}

async fn event_loop<S: SessionStore>(
    store: S,
    config: &Config,
    config_path: Option<PathBuf>,
    flush_on_exit: bool,
) -> Result<()> {
    let (fired_tx, mut fired_rx) = mpsc::unbounded_channel();
    let delivery = HttpDelivery::new().context("failed to create HTTP delivery")?;
    let mut lifecycle = SessionLifecycle::new(
        store,
        TokioTimers::new(fired_tx),
        delivery,
        JsonLinesBadge::new(io::stdout()),
        SystemClock,
        config.lifecycle(),
    );
    let mut state = RunState {
        tracker: config.tracker(),
        config_path,
    };
    if state.tracker.endpoint().is_none() {
        tracing::warn!("no endpoint configured, finalized sessions will not be delivered");
    }

    lifecycle
        .resume()
        .context("failed to resume stored sessions")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;
    let mut watch_signal = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tracing::info!("tracker running");
    while input_open || lifecycle.timers().pending_count() > 0 {
        tokio::select! {
            line = lines.next_line(), if input_open => match line {
                Ok(Some(line)) => {
                    if let Err(err) = handle_line(&mut lifecycle, &mut state, &line) {
                        tracing::warn!(error = ?err, "skipping input line");
                    }
                }
                Ok(None) => {
                    input_open = false;
                    tracing::info!(
                        pending = lifecycle.timers().pending_count(),
                        "input closed, waiting for live sessions to finalize"
                    );
                }
                Err(err) => {
                    input_open = false;
                    tracing::error!(error = %err, "failed to read input");
                }
            },
            Some(fired) = fired_rx.recv() => {
                if let Err(err) = lifecycle.on_timer(&fired.contact, fired.id, &state.tracker) {
                    tracing::error!(contact = %fired.contact, error = %err, "failed to finalize session");
                }
            }
            result = &mut ctrl_c, if watch_signal => {
                if let Err(err) = result {
                    tracing::warn!(error = %err, "cannot listen for interrupts");
                    watch_signal = false;
                    continue;
                }
                tracing::info!("interrupted");
                if flush_on_exit {
                    lifecycle
                        .finalize_all(&state.tracker)
                        .context("failed to finalize sessions")?;
                } else {
                    tracing::info!(
                        pending = lifecycle.timers().pending_count(),
                        "live sessions kept for the next run"
                    );
                }
                break;
            }
            else => break,
        }
    }

    lifecycle.delivery().drain().await;
    Ok(())
}
