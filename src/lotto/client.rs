use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};

use super::provider::{LottoProvider, ProviderError};
use super::types::{DrawResponse, GameInfo, LatestDraw};
use crate::db::models::GameType;

pub const DEFAULT_API_URL: &str = "https://developers.lotto.pl/api/open/v1";

/// Client for the lotto.pl open API.
/// Docs: <https://developers.lotto.pl>
#[derive(Clone)]
pub struct LottoClient {
    http: Client,
    api_key: String,
    /// Base URL for overriding in tests
    base_url: String,
}

impl LottoClient {
    pub fn new(api_key: &str, base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(LottoClient {
            http,
            api_key: api_key.to_string(),
            base_url: base_url
                .unwrap_or(DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// GET `path` with the game type as query and return the raw body of a
    /// successful response.
    async fn get(&self, path: &str, game_type: GameType) -> Result<String, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Requesting {} for {}", url, game_type);

        let resp = self
            .http
            .get(&url)
            .query(&[("gameType", game_type.as_str())])
            .header("secret", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!("lotto.pl returned {} for {}: {}", status, url, body);
            return Err(ProviderError::Status { status, body });
        }

        Ok(resp.text().await?)
    }
}

#[async_trait]
impl LottoProvider for LottoClient {
    fn name(&self) -> &str {
        "lotto.pl"
    }

    async fn fetch_game_info(&self, game_type: GameType) -> Result<GameInfo, ProviderError> {
        let body = self.get("/lotteries/info", game_type).await?;
        parse_game_info(&body)
    }

    async fn fetch_latest_draws(
        &self,
        game_type: GameType,
    ) -> Result<Vec<LatestDraw>, ProviderError> {
        let body = self
            .get("/lotteries/draw-results/last-results-per-game", game_type)
            .await?;
        parse_latest_draws(&body)
    }
}

fn parse_game_info(body: &str) -> Result<GameInfo, ProviderError> {
    Ok(serde_json::from_str(body)?)
}

fn parse_latest_draws(body: &str) -> Result<Vec<LatestDraw>, ProviderError> {
    let draws: Vec<DrawResponse> = serde_json::from_str(body)?;
    Ok(draws.into_iter().map(LatestDraw::from).collect())
}
