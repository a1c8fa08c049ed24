use std::error::Error;

use ai_llm_service::telemetry;
use tracing::Level;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // A missing .env is fine in containers; a malformed one is not.
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(err) if err.not_found() => {}
        Err(err) => return Err(err.into()),
    }

    // LLM client events are rendered by the telemetry layer below.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?
        .add_directive(format!("{}=off", telemetry::TARGET_PREFIX).parse()?);

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_filter(filter))
        .with(telemetry::layer(Level::INFO))
        .init();

    api::start().await?;

    Ok(())
}
