//! Receipt verification service binary.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketplace_receipts::{service, settings::Settings, util::ReceiptUtil};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    let addr = settings.bind_addr;
    let util = ReceiptUtil::from_settings(settings)?;
    service::serve(Arc::new(util), addr).await?;
    Ok(())
}
