//! Response models for the v2 tweet endpoint.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TweetResponse {
    pub data: Option<TweetData>,
}

/// The created tweet as echoed back by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct TweetData {
    pub id: String,
    pub text: String,
}
