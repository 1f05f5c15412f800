use anyhow::Context;
use clap::Parser;
use std::path::Path;
use std::time::Duration;

use crate::draws::BackoffPolicy;
use crate::lotto::client::DEFAULT_API_URL;

/// Watches lotto.pl draws and stores their results
#[derive(Parser, Debug, Clone)]
#[command(name = "lotto-watch", version, about)]
pub struct Config {
    /// Deployment environment; "development" switches to human-readable debug logs
    #[arg(long, env = "ENVIRONMENT", default_value = "development")]
    pub environment: String,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "./data/database.sqlite")]
    pub database_path: String,

    /// lotto.pl open API key, sent as the `secret` header
    #[arg(long, env = "LOTTO_API_KEY", hide_env_values = true)]
    pub lotto_api_key: Option<String>,

    /// lotto.pl open API base URL
    #[arg(long, env = "LOTTO_API_URL", default_value = DEFAULT_API_URL)]
    pub lotto_api_url: String,

    /// Timeout for a single provider request, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "10")]
    pub http_timeout_secs: u64,

    /// First retry delay while a draw's results are not published, in seconds
    #[arg(long, env = "BACKOFF_BASE_SECS", default_value = "300")]
    pub backoff_base_secs: u64,

    /// Upper bound of the retry delay, in seconds
    #[arg(long, env = "BACKOFF_MAX_SECS", default_value = "1800")]
    pub backoff_max_secs: u64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.http_timeout_secs == 0 {
            anyhow::bail!("http_timeout_secs must be positive");
        }
        if self.backoff_base_secs == 0 {
            anyhow::bail!("backoff_base_secs must be positive");
        }
        if self.backoff_max_secs < self.backoff_base_secs {
            anyhow::bail!("backoff_max_secs must not be below backoff_base_secs");
        }
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// The API key, if one was given and is not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.lotto_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_secs(self.backoff_base_secs),
            Duration::from_secs(self.backoff_max_secs),
        )
    }
}

/// Load `KEY=value` pairs from an env file into the process environment.
/// Variables already set win. A missing file is fine, a malformed one is not.
pub fn load_env_file(path: &Path) -> anyhow::Result<()> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to load {}", path.display())),
    }
}
