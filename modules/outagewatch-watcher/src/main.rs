use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use outagewatch_common::Config;
use outagewatch_watcher::notifier::{DryRunNotifier, Notifier, XNotifier};
use outagewatch_watcher::quota::QuotaPolicy;
use outagewatch_watcher::scraper::TroublePageSource;
use outagewatch_watcher::state::FileStateStore;
use outagewatch_watcher::watcher::Watcher;
use x_client::XClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("outagewatch_watcher=info".parse()?),
        )
        .init();

    info!("Outage watch starting...");

    let config = Config::from_env();
    config.log_redacted();

    let source = TroublePageSource::new(&config.trouble_url, config.max_pages)?;
    let store = FileStateStore::new(&config.state_file);
    let notifier: Box<dyn Notifier> = if config.dry_run {
        info!("Dry-run mode, nothing will be posted");
        Box::new(DryRunNotifier)
    } else {
        Box::new(XNotifier::new(XClient::new(config.x_access_token.clone())))
    };

    let watcher = Watcher::new(
        Box::new(source),
        Box::new(store),
        notifier,
        QuotaPolicy::new(config.monthly_post_limit),
    );

    let stats = watcher.run().await?;
    info!("{stats}");

    Ok(())
}
