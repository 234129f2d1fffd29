use anyhow::Context;
use clap::Parser;
use o11y_client::app::{self, Client, Config, forward_lines};
use tokio::io::BufReader;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse()
        .resolve()
        .context("Configuration error")?;

    if let Err(e) = app::setup_logging(config.log_level, config.log_format) {
        eprintln!("Warning: {e}");
    }

    info!("Starting o11y-emit v{}", app::get_version());

    let line_verbosity = config.line_verbosity;
    let client = Client::new(config.into_client_config())
        .await
        .context("Failed to start o11y client")?;

    info!(identifier = client.identifier(), url = %client.url(), "Forwarding stdin");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    let outcome = forward_lines(
        BufReader::new(tokio::io::stdin()),
        &client,
        line_verbosity,
        shutdown,
    )
    .await
    .context("Failed to read stdin")?;

    client.close().await?;
    let stats = client.stats();
    info!(
        ?outcome,
        enqueued = stats.events_enqueued,
        shed = stats.events_shed,
        batches_sent = stats.batches_sent,
        batches_failed = stats.batches_failed,
        delivery_rate = stats.delivery_rate(),
        "o11y-emit finished"
    );
    Ok(())
}
