use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::models::{DrawResult, Game, GameType};
use crate::db::ResultStore;
use crate::lotto::{GameInfo, LatestDraw, LottoProvider, ProviderError};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),

    #[error("provider returned no draws")]
    NoResultsAvailable,

    #[error("no {0} draw in provider response")]
    MainGameNotFound(GameType),

    /// Expected while the provider has not published the draw yet.
    #[error("latest {game_type} draw is from {latest}, waiting for {expected}")]
    ResultsNotYetAvailable {
        game_type: GameType,
        latest: DateTime<Utc>,
        expected: DateTime<Utc>,
    },

    #[error("{game_type} draw {draw_id} has no numbers")]
    EmptyResultSet { game_type: String, draw_id: u64 },
}

impl SyncError {
    /// Whether this is the routine "come back later" answer rather than a fault.
    pub fn is_not_yet_available(&self) -> bool {
        matches!(self, SyncError::ResultsNotYetAvailable { .. })
    }
}

/// Moves game metadata and draw results from the provider into the store.
pub struct DrawSync {
    provider: Arc<dyn LottoProvider>,
    store: Arc<dyn ResultStore>,
}

impl DrawSync {
    pub fn new(provider: Arc<dyn LottoProvider>, store: Arc<dyn ResultStore>) -> Self {
        DrawSync { provider, store }
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    /// Refresh metadata of every independent game and write all of it in one
    /// transaction. Nothing is written unless every fetch succeeds.
    pub async fn refresh_all_games(&self) -> Result<Vec<Game>, SyncError> {
        let games = self
            .store
            .list_independent_games()
            .map_err(SyncError::Storage)?;

        let fetches = games.iter().map(|g| self.provider.fetch_game_info(g.game_type));
        let infos = futures_util::future::join_all(fetches).await;

        let mut updated = Vec::with_capacity(games.len());
        for (game, info) in games.into_iter().zip(infos) {
            updated.push(apply_game_info(game, info?));
        }

        self.store
            .upsert_games(&updated)
            .map_err(SyncError::Storage)?;
        info!(
            "Refreshed metadata for {} game(s) from {}",
            updated.len(),
            self.provider.name()
        );
        Ok(updated)
    }

    /// Refresh metadata of one game and return the stored row.
    pub async fn refresh_game(&self, game_type: GameType) -> Result<Game, SyncError> {
        let info = self.provider.fetch_game_info(game_type).await?;
        let game = apply_game_info(Game::seed(game_type), info);
        self.store
            .upsert_games(std::slice::from_ref(&game))
            .map_err(SyncError::Storage)?;
        self.store.get_game(game_type).map_err(SyncError::Storage)
    }

    /// Fetch the latest draws for `game_type` and store them, provided the
    /// main draw is not older than `expected_next_draw`.
    ///
    /// Every draw in the response is validated before anything is written,
    /// so a bad variant never leaves a partial batch behind.
    pub async fn fetch_and_store_latest_results(
        &self,
        game_type: GameType,
        expected_next_draw: DateTime<Utc>,
    ) -> Result<Vec<DrawResult>, SyncError> {
        let draws = self.provider.fetch_latest_draws(game_type).await?;
        let results = build_results(game_type, expected_next_draw, draws, Utc::now())?;

        let inserted = self
            .store
            .insert_results(&results)
            .map_err(SyncError::Storage)?;
        info!(
            "Stored {} new result(s) for {} ({} in response)",
            inserted,
            game_type,
            results.len()
        );
        Ok(results)
    }
}

fn apply_game_info(game: Game, info: GameInfo) -> Game {
    if !info.game_type.is_empty() && info.game_type != game.game_type.as_str() {
        warn!(
            "Provider answered {} metadata with game type {}",
            game.game_type, info.game_type
        );
    }
    Game {
        next_draw_date: Some(info.next_draw_date),
        closest_prize_value: Some(info.closest_prize_value),
        draws: Some(info.draws),
        coupon_price: Some(info.coupon_price),
        closest_prize_pool: Some(info.closest_prize_pool_type),
        ..game
    }
}

/// Validate a provider response and turn it into storable records.
fn build_results(
    game_type: GameType,
    expected_next_draw: DateTime<Utc>,
    draws: Vec<LatestDraw>,
    now: DateTime<Utc>,
) -> Result<Vec<DrawResult>, SyncError> {
    if draws.is_empty() {
        return Err(SyncError::NoResultsAvailable);
    }

    // Every draw of the main game must be the awaited one or newer.
    let mut main_draws = draws
        .iter()
        .filter(|d| d.game_type == game_type.as_str())
        .peekable();
    if main_draws.peek().is_none() {
        return Err(SyncError::MainGameNotFound(game_type));
    }
    if let Some(stale) = main_draws.find(|d| d.draw_date < expected_next_draw) {
        return Err(SyncError::ResultsNotYetAvailable {
            game_type,
            latest: stale.draw_date,
            expected: expected_next_draw,
        });
    }

    if let Some(empty) = draws.iter().find(|d| d.numbers.is_empty()) {
        return Err(SyncError::EmptyResultSet {
            game_type: empty.game_type.clone(),
            draw_id: empty.draw_id,
        });
    }

    let mut results = Vec::with_capacity(draws.len());
    for draw in draws {
        let Ok(draw_game) = draw.game_type.parse::<GameType>() else {
            warn!(
                "Skipping draw {} of untracked game type {}",
                draw.draw_id, draw.game_type
            );
            continue;
        };
        debug!("{} draw {} on {}: {:?}", draw_game, draw.draw_id, draw.draw_date, draw.numbers);
        results.push(DrawResult {
            draw_id: draw.draw_id,
            game_type: draw_game,
            draw_date: draw.draw_date,
            numbers: draw.numbers,
            special_numbers: draw.special_numbers,
            created_at: now,
        });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::testing::{draw, FakeProvider};
    use chrono::{Duration, TimeZone};

    fn d(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 19, 40, 0).unwrap()
    }

    fn setup() -> (Arc<FakeProvider>, Arc<Database>, DrawSync) {
        let provider = Arc::new(FakeProvider::new());
        let db = Arc::new(Database::open_in_memory().unwrap());
        let sync = DrawSync::new(provider.clone(), db.clone());
        (provider, db, sync)
    }

    #[test]
    fn test_build_results_rejects_empty_response() {
        let err = build_results(GameType::Lotto, d(14), vec![], Utc::now()).unwrap_err();
        assert!(matches!(err, SyncError::NoResultsAvailable));
    }

    #[test]
    fn test_build_results_requires_main_game() {
        let draws = vec![draw("LottoPlus", 1, d(14), &[1, 2, 3])];
        let err = build_results(GameType::Lotto, d(14), draws, Utc::now()).unwrap_err();
        assert!(matches!(err, SyncError::MainGameNotFound(GameType::Lotto)));
    }

    #[test]
    fn test_build_results_equal_date_is_available() {
        let draws = vec![draw("Lotto", 1, d(14), &[1, 2, 3])];
        let results = build_results(GameType::Lotto, d(14), draws, Utc::now()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_build_results_rejects_any_stale_main_draw() {
        let draws = vec![
            draw("Lotto", 7001, d(14), &[3, 11, 19, 27, 35, 43]),
            draw("Lotto", 7000, d(11), &[1, 2, 3, 4, 5, 6]),
        ];
        let err = build_results(GameType::Lotto, d(14), draws, Utc::now()).unwrap_err();
        match err {
            SyncError::ResultsNotYetAvailable { latest, expected, .. } => {
                assert_eq!(latest, d(11));
                assert_eq!(expected, d(14));
            }
            other => panic!("expected not-yet-available, got {:?}", other),
        }
    }

    #[test]
    fn test_build_results_skips_untracked_variants() {
        let draws = vec![
            draw("Lotto", 1, d(14), &[1, 2, 3]),
            draw("SuperSzansa", 1, d(14), &[9, 9, 9]),
        ];
        let results = build_results(GameType::Lotto, d(14), draws, Utc::now()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].game_type, GameType::Lotto);
    }

    #[tokio::test]
    async fn test_refresh_game_persists_metadata() {
        let (provider, db, sync) = setup();
        provider.set_next_draw(GameType::MiniLotto, d(20));

        let game = sync.refresh_game(GameType::MiniLotto).await.unwrap();
        assert_eq!(game.next_draw_date, Some(d(20)));
        assert_eq!(game.coupon_price.as_deref(), Some("1.50"));
        assert_eq!(db.get_game(GameType::MiniLotto).unwrap(), game);
    }

    #[tokio::test]
    async fn test_refresh_game_reports_provider_failure() {
        let (provider, db, sync) = setup();
        provider.fail_info_for(GameType::Kaskada);

        let err = sync.refresh_game(GameType::Kaskada).await.unwrap_err();
        assert!(matches!(err, SyncError::Provider(ProviderError::Status { .. })));
        assert!(db.get_game(GameType::Kaskada).unwrap().next_draw_date.is_none());
    }

    #[tokio::test]
    async fn test_refresh_all_games_is_all_or_nothing() {
        let (provider, db, sync) = setup();
        for game_type in GameType::ALL {
            provider.set_next_draw(game_type, d(20));
        }
        provider.fail_info_for(GameType::EuroJackpot);

        assert!(sync.refresh_all_games().await.is_err());
        assert!(db
            .list_independent_games()
            .unwrap()
            .iter()
            .all(|g| g.next_draw_date.is_none()));

        provider.clear_info_failures();
        let games = sync.refresh_all_games().await.unwrap();
        assert_eq!(games.len(), GameType::ALL.len() - 1);
        assert!(db
            .list_independent_games()
            .unwrap()
            .iter()
            .all(|g| g.next_draw_date == Some(d(20))));
        assert!(db.get_game(GameType::LottoPlus).unwrap().next_draw_date.is_none());
    }

    #[tokio::test]
    async fn test_stores_main_and_tied_draws() {
        let (provider, db, sync) = setup();
        provider.script_draws(vec![vec![
            draw("Lotto", 7001, d(14), &[3, 11, 19, 27, 35, 43]),
            draw("LottoPlus", 7001, d(14), &[1, 7, 13, 22, 30, 41]),
        ]]);

        let results = sync
            .fetch_and_store_latest_results(GameType::Lotto, d(14))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(
            db.latest_result(GameType::LottoPlus).unwrap().unwrap().numbers,
            vec![1, 7, 13, 22, 30, 41]
        );
        assert_eq!(db.latest_result(GameType::Lotto).unwrap().unwrap().draw_id, 7001);
    }

    #[tokio::test]
    async fn test_older_main_draw_is_not_yet_available() {
        let (provider, db, sync) = setup();
        provider.script_draws(vec![vec![draw("Lotto", 7000, d(11), &[1, 2, 3, 4, 5, 6])]]);

        let err = sync
            .fetch_and_store_latest_results(GameType::Lotto, d(11) + Duration::seconds(1))
            .await
            .unwrap_err();
        assert!(err.is_not_yet_available());
        assert!(db.latest_result(GameType::Lotto).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_variant_blocks_whole_batch() {
        let (provider, db, sync) = setup();
        provider.script_draws(vec![vec![
            draw("Lotto", 7001, d(14), &[3, 11, 19, 27, 35, 43]),
            draw("LottoPlus", 7001, d(14), &[]),
        ]]);

        let err = sync
            .fetch_and_store_latest_results(GameType::Lotto, d(14))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::EmptyResultSet { draw_id: 7001, .. }));
        assert!(db.latest_result(GameType::Lotto).unwrap().is_none());
        assert!(db.latest_result(GameType::LottoPlus).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_provider_failure_on_draws() {
        let (provider, _db, sync) = setup();
        provider.fail_draws(true);

        let err = sync
            .fetch_and_store_latest_results(GameType::Lotto, d(14))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Provider(_)));
        assert!(!err.is_not_yet_available());
    }
}
