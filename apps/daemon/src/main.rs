mod config;
mod main_lib;
mod scheduler;

use config::Config;
use main_lib::{build_state, init_tracing};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(config.log_format);
    tracing::debug!("Configuration: {:?}", config);

    let state = build_state(&config).await?;
    tracing::info!("Using database {}", state.db_path);

    let cancel = CancellationToken::new();
    let mut scheduler = scheduler::start_pass_scheduler(
        state,
        config.symbols.clone(),
        config.run_interval,
        cancel.clone(),
    );

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Shutdown requested, finishing in-flight work");
            cancel.cancel();
        }
        joined = &mut scheduler => {
            joined?;
            return Ok(());
        }
    }
    scheduler.await?;
    Ok(())
}
