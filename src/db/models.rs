use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

/// A lottery product tracked by the service.
///
/// The string form matches both the lotto.pl `gameType` parameter and the
/// value stored in the `games.game_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameType {
    Lotto,
    LottoPlus,
    EuroJackpot,
    MultiMulti,
    MiniLotto,
    Kaskada,
    EkstraPensja,
}

impl GameType {
    pub const ALL: [GameType; 7] = [
        GameType::Lotto,
        GameType::LottoPlus,
        GameType::EuroJackpot,
        GameType::MultiMulti,
        GameType::MiniLotto,
        GameType::Kaskada,
        GameType::EkstraPensja,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::Lotto => "Lotto",
            GameType::LottoPlus => "LottoPlus",
            GameType::EuroJackpot => "EuroJackpot",
            GameType::MultiMulti => "MultiMulti",
            GameType::MiniLotto => "MiniLotto",
            GameType::Kaskada => "Kaskada",
            GameType::EkstraPensja => "EkstraPensja",
        }
    }

    /// The game whose draw reports also carry this game's results.
    pub fn parent(&self) -> Option<GameType> {
        match self {
            GameType::LottoPlus => Some(GameType::Lotto),
            _ => None,
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown game type: {0}")]
pub struct UnknownGameType(pub String);

impl FromStr for GameType {
    type Err = UnknownGameType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameType::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| UnknownGameType(s.to_string()))
    }
}

impl ToSql for GameType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for GameType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Stored metadata for one game.
#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    pub game_type: GameType,
    /// Absent until the first successful metadata refresh.
    pub next_draw_date: Option<DateTime<Utc>>,
    pub closest_prize_value: Option<f64>,
    pub draws: Option<String>,
    pub coupon_price: Option<String>,
    pub closest_prize_pool: Option<String>,
    /// Set for variants whose draws are reported together with a parent game.
    pub tied_to: Option<GameType>,
}

impl Game {
    /// A bare row with no metadata yet, as seeded on first start.
    pub fn seed(game_type: GameType) -> Self {
        Game {
            game_type,
            next_draw_date: None,
            closest_prize_value: None,
            draws: None,
            coupon_price: None,
            closest_prize_pool: None,
            tied_to: game_type.parent(),
        }
    }
}

/// One published draw outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawResult {
    pub draw_id: u64,
    pub game_type: GameType,
    pub draw_date: DateTime<Utc>,
    /// Primary numbers in draw order; never empty once stored.
    pub numbers: Vec<u32>,
    pub special_numbers: Vec<u32>,
    pub created_at: DateTime<Utc>,
}

/// Numbers are stored as a comma-separated TEXT column.
pub fn encode_numbers(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn decode_numbers(raw: &str) -> Result<Vec<u32>, std::num::ParseIntError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',').map(|part| part.trim().parse()).collect()
}
