mod render;

use anyhow::Result;
use cryptomulti_core::{DebugChannel, RefreshScheduler, WidgetConfig};
use dotenv::dotenv;
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting crypto ticker...");

    let config = WidgetConfig::from_env()?;
    let json_output = env::var("TICKER_OUTPUT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // Debug channel: log every upstream URL
    let debug = if config.debug {
        let (channel, mut events) = DebugChannel::enabled();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                info!("[debug] {} request: {}", event.provider, event.url);
            }
        });
        channel
    } else {
        DebugChannel::disabled()
    };

    let handle = RefreshScheduler::from_config(&config, debug)?.spawn();
    let mut state_rx = handle.subscribe();

    loop {
        let state = state_rx.borrow_and_update().clone();
        if json_output {
            println!("{}", serde_json::to_string(&state)?);
        } else {
            println!("{}\n", render::render_state(&config, &state));
        }

        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    error!("Refresh scheduler exited unexpectedly");
                    break;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!("Received shutdown signal"),
                    Err(err) => error!("Unable to listen for shutdown signal: {}", err),
                }
                break;
            }
        }
    }

    handle.shutdown().await;
    info!("Crypto ticker stopped");

    Ok(())
}
