use async_trait::async_trait;
use thiserror::Error;

use super::types::{GameInfo, LatestDraw};
use crate::db::models::GameType;

/// Failure talking to the results provider. Always worth retrying later.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Trait that every draw results provider must implement.
#[async_trait]
pub trait LottoProvider: Send + Sync {
    /// Current metadata for a game: next draw date, prize info.
    async fn fetch_game_info(&self, game_type: GameType) -> Result<GameInfo, ProviderError>;

    /// The most recently published draws for a game. Variants tied to the
    /// game are reported in the same response.
    async fn fetch_latest_draws(&self, game_type: GameType)
        -> Result<Vec<LatestDraw>, ProviderError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
