use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub mod models;
use models::*;

/// Persistence used by the draw watchers.
///
/// Implementations must tolerate concurrent callers; every write is
/// all-or-nothing.
pub trait ResultStore: Send + Sync {
    /// Games that are not tied to a parent game.
    fn list_independent_games(&self) -> Result<Vec<Game>>;

    fn get_game(&self, game_type: GameType) -> Result<Game>;

    /// Insert or update metadata for every game in one transaction.
    /// `tied_to` of an existing row is never changed.
    fn upsert_games(&self, games: &[Game]) -> Result<()>;

    /// Store results in one transaction, skipping draws already present.
    /// Returns how many rows were newly written.
    fn insert_results(&self, results: &[DrawResult]) -> Result<usize>;

    /// Most recent stored draw for a game, by draw date.
    fn latest_result(&self, game_type: GameType) -> Result<Option<DrawResult>>;
}

/// Thread-safe SQLite handle (single connection with mutex, so writers are serialised)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path))?;
        Self::init(conn)
    }

    /// Private in-memory database, used by tests
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        // journal_mode returns a row, so it cannot go through execute_batch
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.execute_batch(
            "PRAGMA synchronous = NORMAL; PRAGMA journal_size_limit = 6144000;",
        )?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        db.seed_games()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Make sure every known game has a row so metadata refreshes can find it.
    fn seed_games(&self) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO games (game_type, tied_to) VALUES (?1, ?2)")?;
            for game_type in GameType::ALL {
                stmt.execute(params![game_type, game_type.parent()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl ResultStore for Database {
    fn list_independent_games(&self) -> Result<Vec<Game>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT game_type, next_draw_date, closest_prize_value, draws,
                    coupon_price, closest_prize_pool, tied_to
             FROM games WHERE tied_to IS NULL ORDER BY game_type",
        )?;
        let games = stmt
            .query_map([], map_game)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(games)
    }

    fn get_game(&self, game_type: GameType) -> Result<Game> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT game_type, next_draw_date, closest_prize_value, draws,
                    coupon_price, closest_prize_pool, tied_to
             FROM games WHERE game_type = ?1",
            params![game_type],
            map_game,
        )
        .with_context(|| format!("Failed to load game {}", game_type))
    }

    fn upsert_games(&self, games: &[Game]) -> Result<()> {
        debug!("Upserting {} game(s)", games.len());
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO games (game_type, next_draw_date, closest_prize_value, draws,
                                    coupon_price, closest_prize_pool, tied_to)
                 VALUES (?1,?2,?3,?4,?5,?6,?7)
                 ON CONFLICT(game_type) DO UPDATE SET
                    next_draw_date=excluded.next_draw_date,
                    closest_prize_value=excluded.closest_prize_value,
                    draws=excluded.draws,
                    coupon_price=excluded.coupon_price,
                    closest_prize_pool=excluded.closest_prize_pool",
            )?;
            for game in games {
                stmt.execute(params![
                    game.game_type,
                    game.next_draw_date,
                    game.closest_prize_value,
                    game.draws,
                    game.coupon_price,
                    game.closest_prize_pool,
                    game.tied_to,
                ])
                .with_context(|| format!("Failed to upsert game {}", game.game_type))?;
            }
        }
        tx.commit().context("Failed to commit game upsert")?;
        Ok(())
    }

    fn insert_results(&self, results: &[DrawResult]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO results (draw_id, game_type, draw_date, numbers,
                                      special_numbers, created_at)
                 VALUES (?1,?2,?3,?4,?5,?6)
                 ON CONFLICT(game_type, draw_id) DO NOTHING",
            )?;
            for result in results {
                let draw_id = i64::try_from(result.draw_id).with_context(|| {
                    format!("{} draw id {} does not fit SQLite INTEGER", result.game_type, result.draw_id)
                })?;
                inserted += stmt
                    .execute(params![
                        draw_id,
                        result.game_type,
                        result.draw_date,
                        encode_numbers(&result.numbers),
                        encode_numbers(&result.special_numbers),
                        result.created_at,
                    ])
                    .with_context(|| {
                        format!("Failed to insert {} draw {}", result.game_type, result.draw_id)
                    })?;
            }
        }
        tx.commit().context("Failed to commit results")?;
        Ok(inserted)
    }

    fn latest_result(&self, game_type: GameType) -> Result<Option<DrawResult>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                "SELECT draw_id, game_type, draw_date, numbers, special_numbers, created_at
                 FROM results WHERE game_type = ?1
                 ORDER BY draw_date DESC LIMIT 1",
                params![game_type],
                map_result,
            )
            .optional()?;
        Ok(result)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn map_game(row: &rusqlite::Row) -> rusqlite::Result<Game> {
    Ok(Game {
        game_type: row.get(0)?,
        next_draw_date: row.get(1)?,
        closest_prize_value: row.get(2)?,
        draws: row.get(3)?,
        coupon_price: row.get(4)?,
        closest_prize_pool: row.get(5)?,
        tied_to: row.get(6)?,
    })
}

fn map_result(row: &rusqlite::Row) -> rusqlite::Result<DrawResult> {
    let numbers_column = |idx: usize| -> rusqlite::Result<Vec<u32>> {
        let raw: String = row.get(idx)?;
        decode_numbers(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    };
    let draw_id: i64 = row.get(0)?;
    let draw_id = u64::try_from(draw_id).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Integer, Box::new(e))
    })?;
    Ok(DrawResult {
        draw_id,
        game_type: row.get(1)?,
        draw_date: row.get(2)?,
        numbers: numbers_column(3)?,
        special_numbers: numbers_column(4)?,
        created_at: row.get(5)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS games (
    game_type           TEXT    PRIMARY KEY,
    next_draw_date      TEXT,
    closest_prize_value REAL,
    draws               TEXT,
    coupon_price        TEXT,
    closest_prize_pool  TEXT,
    tied_to             TEXT,
    FOREIGN KEY (tied_to) REFERENCES games(game_type)
);

CREATE TABLE IF NOT EXISTS results (
    draw_id         INTEGER NOT NULL,
    game_type       TEXT    NOT NULL,
    draw_date       TEXT    NOT NULL,
    numbers         TEXT    NOT NULL,
    special_numbers TEXT    NOT NULL DEFAULT '',
    created_at      TEXT    NOT NULL,
    PRIMARY KEY (game_type, draw_id),
    FOREIGN KEY (game_type) REFERENCES games(game_type)
);

CREATE INDEX IF NOT EXISTS idx_results_game_date ON results(game_type, draw_date);
"#;
