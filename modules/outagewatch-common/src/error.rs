use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Scrape error: {0}")]
    Scrape(String),

    #[error("State file corrupt: {0}")]
    StateCorrupt(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
