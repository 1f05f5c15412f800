//! Scripted provider and store for exercising the draw pipeline without the
//! network or a disk.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::db::models::{DrawResult, Game, GameType};
use crate::db::{Database, ResultStore};
use crate::lotto::{GameInfo, LatestDraw, LottoProvider, ProviderError};

pub fn draw(game_type: &str, draw_id: u64, draw_date: DateTime<Utc>, numbers: &[u32]) -> LatestDraw {
    LatestDraw {
        draw_id,
        draw_date,
        game_type: game_type.to_string(),
        numbers: numbers.to_vec(),
        special_numbers: vec![],
    }
}

/// Responses are scripted as queues: each call pops the front entry until
/// one is left, which then repeats forever.
#[derive(Default)]
pub struct FakeProvider {
    next_draws: Mutex<HashMap<GameType, VecDeque<DateTime<Utc>>>>,
    info_failures: Mutex<HashSet<GameType>>,
    draws: Mutex<VecDeque<Vec<LatestDraw>>>,
    draws_fail: AtomicBool,
    info_calls: AtomicUsize,
    draw_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_next_draw(&self, game_type: GameType, date: DateTime<Utc>) {
        self.script_next_draws(game_type, vec![date]);
    }

    pub fn script_next_draws(&self, game_type: GameType, dates: Vec<DateTime<Utc>>) {
        self.next_draws
            .lock()
            .unwrap()
            .insert(game_type, dates.into());
    }

    pub fn fail_info_for(&self, game_type: GameType) {
        self.info_failures.lock().unwrap().insert(game_type);
    }

    pub fn clear_info_failures(&self) {
        self.info_failures.lock().unwrap().clear();
    }

    pub fn script_draws(&self, responses: Vec<Vec<LatestDraw>>) {
        *self.draws.lock().unwrap() = responses.into();
    }

    pub fn fail_draws(&self, fail: bool) {
        self.draws_fail.store(fail, Ordering::SeqCst);
    }

    pub fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    pub fn draw_calls(&self) -> usize {
        self.draw_calls.load(Ordering::SeqCst)
    }

    fn unavailable() -> ProviderError {
        ProviderError::Status {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            body: "maintenance".into(),
        }
    }
}

fn pop_or_repeat<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

#[async_trait]
impl LottoProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch_game_info(&self, game_type: GameType) -> Result<GameInfo, ProviderError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        if self.info_failures.lock().unwrap().contains(&game_type) {
            return Err(Self::unavailable());
        }
        let next_draw_date = self
            .next_draws
            .lock()
            .unwrap()
            .get_mut(&game_type)
            .and_then(|queue| pop_or_repeat(queue))
            .unwrap_or_else(|| Utc::now() + Duration::days(1));
        Ok(GameInfo {
            game_type: game_type.to_string(),
            next_draw_date,
            closest_prize_value: 2_000_000.0,
            draws: "wtorek, czwartek, sobota".into(),
            coupon_price: "1.50".into(),
            closest_prize_pool_type: "Pula".into(),
        })
    }

    async fn fetch_latest_draws(
        &self,
        _game_type: GameType,
    ) -> Result<Vec<LatestDraw>, ProviderError> {
        self.draw_calls.fetch_add(1, Ordering::SeqCst);
        if self.draws_fail.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let mut draws = self.draws.lock().unwrap();
        Ok(pop_or_repeat(&mut *draws).unwrap_or_default())
    }
}

/// In-memory store whose writes can be made to fail a number of times.
pub struct FlakyStore {
    inner: Database,
    upsert_failures: AtomicUsize,
    insert_failures: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        FlakyStore {
            inner: Database::open_in_memory().unwrap(),
            upsert_failures: AtomicUsize::new(0),
            insert_failures: AtomicUsize::new(0),
        }
    }

    pub fn fail_upserts(&self, times: usize) {
        self.upsert_failures.store(times, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self, times: usize) {
        self.insert_failures.store(times, Ordering::SeqCst);
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl ResultStore for FlakyStore {
    fn list_independent_games(&self) -> anyhow::Result<Vec<Game>> {
        self.inner.list_independent_games()
    }

    fn get_game(&self, game_type: GameType) -> anyhow::Result<Game> {
        self.inner.get_game(game_type)
    }

    fn upsert_games(&self, games: &[Game]) -> anyhow::Result<()> {
        if Self::take_failure(&self.upsert_failures) {
            anyhow::bail!("disk I/O error");
        }
        self.inner.upsert_games(games)
    }

    fn insert_results(&self, results: &[DrawResult]) -> anyhow::Result<usize> {
        if Self::take_failure(&self.insert_failures) {
            anyhow::bail!("database is locked");
        }
        self.inner.insert_results(results)
    }

    fn latest_result(&self, game_type: GameType) -> anyhow::Result<Option<DrawResult>> {
        self.inner.latest_result(game_type)
    }
}
