use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A tracked game type. One variant per match ledger; the shape metadata
/// below drives a single generic implementation of validation, recording and
/// undo instead of a copy per game.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Foosball,
    Kart,
    KartTeam,
    PingPong,
    Shooter,
    ShooterTeam,
    Paper,
}

/// How results in a category are structured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// One winner, one loser.
    HeadToHead,
    /// 2-4 strictly ranked individual entrants.
    FreeForAll,
    /// Two 2-person sides; also updates the synthetic team ratings.
    TeamVersus,
}

/// Whether a result carries a free-text label, e.g. a kart course name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelRule {
    None,
    Optional,
    /// Required, and no two results in the category may share it.
    RequiredUnique,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Foosball,
        Category::Kart,
        Category::KartTeam,
        Category::PingPong,
        Category::Shooter,
        Category::ShooterTeam,
        Category::Paper,
    ];

    pub fn shape(&self) -> Shape {
        match self {
            Category::PingPong => Shape::HeadToHead,
            Category::Kart | Category::Shooter => Shape::FreeForAll,
            Category::Foosball | Category::KartTeam | Category::ShooterTeam | Category::Paper => {
                Shape::TeamVersus
            }
        }
    }

    pub fn label_rule(&self) -> LabelRule {
        match self {
            Category::Kart => LabelRule::RequiredUnique,
            Category::Shooter => LabelRule::Optional,
            _ => LabelRule::None,
        }
    }

    /// The per-player rating chains a result in this category touches, in
    /// seat order. Foosball is the only category with distinct roles.
    pub fn player_scopes(&self) -> &'static [Scope] {
        match self {
            Category::Foosball => &[Scope::FoosballOffense, Scope::FoosballDefense],
            Category::Kart => &[Scope::Kart],
            Category::KartTeam => &[Scope::KartTeam],
            Category::PingPong => &[Scope::PingPong],
            Category::Shooter => &[Scope::Shooter],
            Category::ShooterTeam => &[Scope::ShooterTeam],
            Category::Paper => &[Scope::Paper],
        }
    }

    /// The team rating chain for team-scored categories.
    pub fn team_scope(&self) -> Option<Scope> {
        match self {
            Category::Foosball => Some(Scope::FoosballTeams),
            Category::KartTeam => Some(Scope::KartTeams),
            Category::ShooterTeam => Some(Scope::ShooterTeams),
            Category::Paper => Some(Scope::PaperTeams),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Foosball => "foosball",
            Category::Kart => "kart",
            Category::KartTeam => "kart-team",
            Category::PingPong => "ping-pong",
            Category::Shooter => "shooter",
            Category::ShooterTeam => "shooter-team",
            Category::Paper => "paper",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("unknown category {s:?}")))
    }
}

/// One rating chain: a (category, role) pair a player or team holds a live
/// rating and a history for.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    FoosballOffense,
    FoosballDefense,
    Kart,
    KartTeam,
    PingPong,
    Shooter,
    ShooterTeam,
    Paper,
    FoosballTeams,
    KartTeams,
    ShooterTeams,
    PaperTeams,
}

impl Scope {
    /// Every chain a player owns, seeded at creation.
    pub const PLAYER: [Scope; 8] = [
        Scope::FoosballOffense,
        Scope::FoosballDefense,
        Scope::Kart,
        Scope::KartTeam,
        Scope::PingPong,
        Scope::Shooter,
        Scope::ShooterTeam,
        Scope::Paper,
    ];

    /// Every chain a team owns.
    pub const TEAM: [Scope; 4] = [
        Scope::FoosballTeams,
        Scope::KartTeams,
        Scope::ShooterTeams,
        Scope::PaperTeams,
    ];

    pub fn is_team(&self) -> bool {
        Scope::TEAM.contains(self)
    }

    /// The category whose results move this chain.
    pub fn category(&self) -> Category {
        match self {
            Scope::FoosballOffense | Scope::FoosballDefense | Scope::FoosballTeams => {
                Category::Foosball
            }
            Scope::Kart => Category::Kart,
            Scope::KartTeam | Scope::KartTeams => Category::KartTeam,
            Scope::PingPong => Category::PingPong,
            Scope::Shooter => Category::Shooter,
            Scope::ShooterTeam | Scope::ShooterTeams => Category::ShooterTeam,
            Scope::Paper | Scope::PaperTeams => Category::Paper,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::FoosballOffense => "foosball-offense",
            Scope::FoosballDefense => "foosball-defense",
            Scope::Kart => "kart",
            Scope::KartTeam => "kart-team",
            Scope::PingPong => "ping-pong",
            Scope::Shooter => "shooter",
            Scope::ShooterTeam => "shooter-team",
            Scope::Paper => "paper",
            Scope::FoosballTeams => "foosball-teams",
            Scope::KartTeams => "kart-teams",
            Scope::ShooterTeams => "shooter-teams",
            Scope::PaperTeams => "paper-teams",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::PLAYER
            .into_iter()
            .chain(Scope::TEAM)
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("unknown scope {s:?}")))
    }
}
