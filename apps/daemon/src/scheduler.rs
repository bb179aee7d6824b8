//! Periodic acquisition passes.
//!
//! The first pass starts immediately; later passes follow the configured
//! interval. A pass still running when the next tick is due delays it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::main_lib::AppState;
use tickfill_core::scheduler::resolve_instruments;

/// Starts the pass scheduler; it stops once `cancel` fires.
pub fn start_pass_scheduler(
    state: Arc<AppState>,
    symbols: Vec<String>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Pass scheduler started ({}s interval)", every.as_secs());

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => run_scheduled_pass(&state, &symbols, &cancel).await,
            }
        }
        info!("Pass scheduler stopped");
    })
}

/// Runs a single pass over the configured instruments.
async fn run_scheduled_pass(state: &AppState, symbols: &[String], cancel: &CancellationToken) {
    let instruments = match resolve_instruments(state.instruments.as_ref(), symbols).await {
        Ok(instruments) => instruments,
        Err(e) => {
            error!("Could not resolve instruments: {}", e);
            return;
        }
    };

    if instruments.is_empty() {
        warn!("No instruments to fill; set TICKFILL_SYMBOLS to start tracking some");
        return;
    }

    info!("Starting pass over {} instrument(s)", instruments.len());
    match state.dispatcher.run_pass(instruments, cancel).await {
        Ok(summary) => {
            info!("Pass finished: {}", summary);
            for (symbol, instrument_state) in &summary.states {
                debug!("{}: {:?}", symbol, instrument_state);
            }
            if !summary.failed.is_empty() {
                warn!("Instruments failed this pass: {}", summary.failed.join(", "));
            }
            if !summary.rate_limited.is_empty() {
                info!(
                    "Provider budgets spent, retrying next pass: {}",
                    summary.rate_limited.join(", ")
                );
            }
        }
        Err(e) => error!("Pass failed: {}", e),
    }
}
