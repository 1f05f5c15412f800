use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::backoff::{Backoff, BackoffPolicy};
use super::sync::DrawSync;
use crate::db::models::{Game, GameType};

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("{0} is tied to {1} and cannot be watched on its own")]
    NotCheckable(GameType, GameType),

    #[error("{0} has no next draw date; refresh its metadata first")]
    MetadataMissing(GameType),
}

/// How a watcher run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchOutcome {
    /// Results of the awaited draw are stored; carries the refreshed game.
    Settled(Game),
    Cancelled,
}

/// Result of one polling cycle.
enum Cycle {
    Settled(Game),
    NotReady,
}

/// Waits for one game's next draw, then polls until its results are stored.
///
/// A watcher covers exactly one draw: once settled it stops.
pub struct GameWatcher {
    game: Game,
    next_draw: DateTime<Utc>,
    sync: Arc<DrawSync>,
    policy: BackoffPolicy,
}

impl GameWatcher {
    pub fn new(game: Game, sync: Arc<DrawSync>, policy: BackoffPolicy) -> Result<Self, WatcherError> {
        if let Some(parent) = game.tied_to {
            return Err(WatcherError::NotCheckable(game.game_type, parent));
        }
        let next_draw = game
            .next_draw_date
            .ok_or(WatcherError::MetadataMissing(game.game_type))?;
        Ok(GameWatcher {
            game,
            next_draw,
            sync,
            policy,
        })
    }

    pub fn game_type(&self) -> GameType {
        self.game.game_type
    }

    /// Run until settled or until `shutdown` fires.
    pub async fn run(mut self, shutdown: CancellationToken) -> WatchOutcome {
        let game_type = self.game.game_type;
        let wait = (self.next_draw - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        if !wait.is_zero() {
            info!(
                "{}: waiting {:?} for draw at {}",
                game_type, wait, self.next_draw
            );
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("{}: cancelled while waiting for draw", game_type);
                    return WatchOutcome::Cancelled;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        let mut backoff = Backoff::new(self.policy);
        loop {
            if shutdown.is_cancelled() {
                return WatchOutcome::Cancelled;
            }

            if let Cycle::Settled(game) = self.poll_once().await {
                info!(
                    "{}: results stored, next draw at {:?}",
                    game_type, game.next_draw_date
                );
                self.game = game;
                return WatchOutcome::Settled(self.game);
            }

            let delay = backoff.next_delay();
            debug!("{}: results not ready, retrying in {:?}", game_type, delay);
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("{}: cancelled during backoff", game_type);
                    return WatchOutcome::Cancelled;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn poll_once(&self) -> Cycle {
        let game_type = self.game.game_type;

        let refreshed = match self.sync.refresh_game(game_type).await {
            Ok(game) => game,
            Err(e) => {
                error!("{}: failed to refresh game metadata: {}", game_type, e);
                return Cycle::NotReady;
            }
        };
        // The provider moves the next draw date forward once the awaited
        // draw has taken place.
        let expected = match refreshed.next_draw_date {
            Some(date) if date != self.next_draw => date,
            _ => {
                debug!("{}: next draw date unchanged", game_type);
                return Cycle::NotReady;
            }
        };

        match self
            .sync
            .fetch_and_store_latest_results(game_type, expected)
            .await
        {
            Ok(_) => Cycle::Settled(refreshed),
            Err(e) if e.is_not_yet_available() => {
                debug!("{}: {}", game_type, e);
                Cycle::NotReady
            }
            Err(e) => {
                error!("{}: failed to fetch and store results: {}", game_type, e);
                Cycle::NotReady
            }
        }
    }
}
