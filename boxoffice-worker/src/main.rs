use anyhow::Context;
use boxoffice_store::app_config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "boxoffice_worker=debug,boxoffice_booking=info,boxoffice_store=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("failed to load config")?;
    tracing::info!(
        consumer_tag = %config.broker.consumer_tag,
        sweep_interval_secs = config.expiry.sweep_interval_secs,
        "Starting booking expiry worker"
    );

    boxoffice_worker::run(config).await
}
