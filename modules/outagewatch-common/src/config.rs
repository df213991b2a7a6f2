use std::env;
use std::path::PathBuf;

use tracing::info;

/// Trouble-listing page polled by default.
pub const DEFAULT_TROUBLE_URL: &str = "https://www.toshima.co.jp/trouble/";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Trouble-listing page to poll.
    pub trouble_url: String,
    /// Listing pages to walk before stopping.
    pub max_pages: u32,
    /// Path of the persisted state file.
    pub state_file: PathBuf,
    /// Monthly notification cap. Kept below the post API's own cap so a
    /// counting mismatch on our side never trips the upstream limit.
    pub monthly_post_limit: u32,
    /// When set, nothing is posted and no quota is consumed.
    pub dry_run: bool,
    /// User-context bearer token for the post API. Empty in dry-run mode.
    pub x_access_token: String,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        let dry_run = env::var("DRY_RUN")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        Self {
            trouble_url: env::var("TROUBLE_URL").unwrap_or_else(|_| DEFAULT_TROUBLE_URL.to_string()),
            max_pages: env::var("MAX_PAGES")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .expect("MAX_PAGES must be a number"),
            state_file: PathBuf::from(
                env::var("STATE_FILE").unwrap_or_else(|_| "data/state.json".to_string()),
            ),
            monthly_post_limit: env::var("MONTHLY_POST_LIMIT")
                .unwrap_or_else(|_| "450".to_string())
                .parse()
                .expect("MONTHLY_POST_LIMIT must be a number"),
            x_access_token: if dry_run {
                String::new()
            } else {
                required_env("X_ACCESS_TOKEN")
            },
            dry_run,
        }
    }

    /// Log the effective configuration with credentials redacted.
    pub fn log_redacted(&self) {
        info!(
            trouble_url = %self.trouble_url,
            max_pages = self.max_pages,
            state_file = %self.state_file.display(),
            monthly_post_limit = self.monthly_post_limit,
            dry_run = self.dry_run,
            x_access_token = if self.x_access_token.is_empty() { "unset" } else { "[redacted]" },
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
