//! Wire types of the lotto.pl open API and their flattened domain forms.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Response of `GET /lotteries/info`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInfo {
    #[serde(default)]
    pub game_type: String,
    pub next_draw_date: DateTime<Utc>,
    #[serde(default)]
    pub closest_prize_value: f64,
    #[serde(default)]
    pub draws: String,
    #[serde(default)]
    pub coupon_price: String,
    #[serde(default)]
    pub closest_prize_pool_type: String,
}

/// One entry of `GET /lotteries/draw-results/last-results-per-game`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawResponse {
    pub draw_system_id: u64,
    pub draw_date: DateTime<Utc>,
    pub game_type: String,
    #[serde(default)]
    pub results: Vec<DrawNumbers>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawNumbers {
    #[serde(default)]
    pub results_json: Option<Vec<u32>>,
    #[serde(default)]
    pub special_results: Option<Vec<u32>>,
}

/// A published draw as the rest of the service sees it.
///
/// `game_type` stays a raw string: the provider may report variants this
/// service does not track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestDraw {
    pub draw_id: u64,
    pub draw_date: DateTime<Utc>,
    pub game_type: String,
    pub numbers: Vec<u32>,
    pub special_numbers: Vec<u32>,
}

impl From<DrawResponse> for LatestDraw {
    fn from(draw: DrawResponse) -> Self {
        // Only the first result block carries the numbers of this draw
        let (numbers, special_numbers) = draw
            .results
            .into_iter()
            .next()
            .map(|r| {
                (
                    r.results_json.unwrap_or_default(),
                    r.special_results.unwrap_or_default(),
                )
            })
            .unwrap_or_default();
        LatestDraw {
            draw_id: draw.draw_system_id,
            draw_date: draw.draw_date,
            game_type: draw.game_type,
            numbers,
            special_numbers,
        }
    }
}
