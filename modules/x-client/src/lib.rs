//! Minimal client for the X (Twitter) v2 post endpoint.
//!
//! Only what the watcher needs: post a text status with a user-context
//! bearer token. Token acquisition and refresh happen outside this crate.

use reqwest::Client;
use tracing::debug;

pub mod models;

use models::{TweetData, TweetResponse};

const API_BASE: &str = "https://api.twitter.com/2";

#[derive(Debug, thiserror::Error)]
pub enum XClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("API response missing tweet data")]
    MissingData,
}

#[derive(Debug, Clone)]
pub struct XClient {
    http: Client,
    bearer_token: String,
}

impl XClient {
    pub fn new(bearer_token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            bearer_token: bearer_token.into(),
        }
    }

    /// Post a text status. Returns the created tweet on success.
    pub async fn post_status(&self, text: &str) -> Result<TweetData, XClientError> {
        let url = format!("{API_BASE}/tweets");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(XClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TweetResponse = response.json().await?;
        let data = parsed.data.ok_or(XClientError::MissingData)?;
        debug!(tweet_id = %data.id, "Posted status");
        Ok(data)
    }
}
