use std::sync::Arc;

use ffb_core::config::Config;
use ffb_firefly::FireflyClient;

#[tokio::main]
async fn main() -> Result<(), ffb_core::Error> {
    ffb_core::logging::init("ffb")?;

    let cfg = Arc::new(Config::load()?);
    let ledger = Arc::new(FireflyClient::new(cfg.ledger_timeout)?);

    if let Err(e) = ffb_telegram::router::run_polling(cfg, ledger).await {
        tracing::error!(error = %e, "telegram bot failed");
        return Err(ffb_core::Error::External(format!("telegram bot failed: {e}")));
    }

    Ok(())
}
