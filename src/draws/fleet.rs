use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::backoff::BackoffPolicy;
use super::sync::{DrawSync, SyncError};
use super::watcher::{GameWatcher, WatchOutcome, WatcherError};
use crate::db::models::GameType;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("failed to refresh game metadata: {0}")]
    Refresh(#[from] SyncError),

    #[error("failed to create watcher: {0}")]
    Watcher(#[from] WatcherError),
}

/// Starts one watcher per independent game and stops them together.
pub struct Fleet {
    sync: Arc<DrawSync>,
    policy: BackoffPolicy,
}

/// Counts of how the watchers of a fleet ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FleetSummary {
    pub settled: usize,
    pub cancelled: usize,
    /// Tasks that panicked or were aborted.
    pub failed: usize,
}

impl Fleet {
    pub fn new(sync: Arc<DrawSync>, policy: BackoffPolicy) -> Self {
        Fleet { sync, policy }
    }

    /// Refresh metadata of every independent game in one batch and build a
    /// watcher for each. Any failure aborts the whole startup.
    pub async fn bootstrap(&self) -> Result<Vec<GameWatcher>, FleetError> {
        let games = self.sync.refresh_all_games().await?;

        for game in &games {
            match self.sync.store().latest_result(game.game_type) {
                Ok(Some(last)) => debug!(
                    "{}: last stored draw {} on {}",
                    game.game_type, last.draw_id, last.draw_date
                ),
                Ok(None) => debug!("{}: no stored draws yet", game.game_type),
                Err(e) => warn!("{}: failed to read last stored draw: {:#}", game.game_type, e),
            }
        }

        let watchers = games
            .into_iter()
            .map(|game| GameWatcher::new(game, Arc::clone(&self.sync), self.policy))
            .collect::<Result<Vec<_>, _>>()?;
        info!("Prepared {} game watcher(s)", watchers.len());
        Ok(watchers)
    }

    /// Spawn every watcher on the runtime. They all observe `shutdown`.
    pub fn launch(watchers: Vec<GameWatcher>, shutdown: CancellationToken) -> RunningFleet {
        let tasks = watchers
            .into_iter()
            .map(|watcher| {
                let game_type = watcher.game_type();
                let token = shutdown.clone();
                (game_type, tokio::spawn(watcher.run(token)))
            })
            .collect();
        RunningFleet { shutdown, tasks }
    }
}

/// Handle to the spawned watchers.
pub struct RunningFleet {
    shutdown: CancellationToken,
    tasks: Vec<(GameType, JoinHandle<WatchOutcome>)>,
}

impl RunningFleet {
    pub fn watcher_count(&self) -> usize {
        self.tasks.len()
    }

    /// Cancel every watcher and wait until all of them have stopped.
    pub async fn shutdown(self) -> FleetSummary {
        self.shutdown.cancel();
        self.join().await
    }

    /// Wait for every watcher to finish on its own.
    pub async fn join(self) -> FleetSummary {
        let (game_types, handles): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();
        let outcomes = futures_util::future::join_all(handles).await;

        let mut summary = FleetSummary::default();
        for (game_type, outcome) in game_types.into_iter().zip(outcomes) {
            match outcome {
                Ok(WatchOutcome::Settled(_)) => summary.settled += 1,
                Ok(WatchOutcome::Cancelled) => {
                    debug!("{}: watcher cancelled", game_type);
                    summary.cancelled += 1;
                }
                Err(e) => {
                    error!("{}: watcher task failed: {}", game_type, e);
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}
