use crate::model::{MatchId, Owner};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One leaderboard row. The rank is recomputed from the live rating on
/// every query, so it always reflects the current pointer.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Standing {
    pub owner: Owner,
    pub name: String,
    /// Conservative rank, `mean - 3 * uncertainty`.
    pub rank: f64,
    pub record: Record,
}

/// Rollup results for a leaderboard row.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Record {
    WinLoss { wins: u32, losses: u32 },
    /// Finish counts for free-for-all categories, first through fourth.
    Placements { finishes: [u32; 4] },
}

/// One point of a participant's rating trajectory, newest first.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HistoryPoint {
    pub rank: f64,
    pub at: DateTime<Utc>,
}

/// A recorded result, as listed by the per-category results view.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RecordedMatch {
    pub id: MatchId,
    pub label: Option<String>,
    pub at: DateTime<Utc>,
    pub seats: Vec<SeatResult>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SeatResult {
    pub seat: String,
    pub owner: Owner,
    pub name: String,
    /// 1 for the winning side, 2 for the losing side; actual placement for
    /// free-for-all results.
    pub placing: u32,
}
