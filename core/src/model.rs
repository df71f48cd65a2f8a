use chrono::{DateTime, Utc};
use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, Display, From, FromStr, Into, PartialEq, Eq, Hash,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct PlayerId(i64);

#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, Display, From, FromStr, Into, PartialEq, Eq, Hash,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct TeamId(i64);

#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, Display, From, FromStr, Into, PartialEq, Eq, Hash,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct MatchId(i64);

#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, Display, From, FromStr, Into, PartialEq, Eq, Hash,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct RatingId(i64);

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub created_at: DateTime<Utc>,
}

/// A synthetic participant for a fixed, unordered pair of players. At most
/// one team exists per pair; creation is idempotent on membership.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub members: (PlayerId, PlayerId),
    pub created_at: DateTime<Utc>,
}

/// A rating owner: ratings, history chains and match seats belong to either
/// a player or a team.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Owner {
    Player(PlayerId),
    Team(TeamId),
}

impl Owner {
    pub fn kind(&self) -> &'static str {
        match self {
            Owner::Player(_) => "player",
            Owner::Team(_) => "team",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Owner::Player(id) => (*id).into(),
            Owner::Team(id) => (*id).into(),
        }
    }

    pub fn from_parts(kind: &str, id: i64) -> Option<Self> {
        match kind {
            "player" => Some(Owner::Player(id.into())),
            "team" => Some(Owner::Team(id.into())),
            _ => None,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.id())
    }
}
