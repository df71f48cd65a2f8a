use crate::{
    category::{Category, LabelRule, Shape},
    error::{Error, Result},
    model::PlayerId,
};
use itertools::Itertools;

/// One side of a team-versus result. The offense/defense split is
/// meaningful for foosball; other team categories treat the pair as
/// unordered seats.
#[derive(Clone, Copy, Debug)]
pub struct Side {
    pub offense: PlayerId,
    pub defense: PlayerId,
}

/// A match result as submitted by the caller. Validated as a whole before
/// anything is written, so a rejected submission leaves no trace.
#[derive(Clone, Debug)]
pub enum MatchSubmission {
    HeadToHead {
        category: Category,
        winner: PlayerId,
        loser: PlayerId,
    },
    /// Placements are contiguous from first: a fourth seat cannot be filled
    /// while the third is empty.
    FreeForAll {
        category: Category,
        first: PlayerId,
        second: PlayerId,
        third: Option<PlayerId>,
        fourth: Option<PlayerId>,
        label: Option<String>,
    },
    TeamVersus {
        category: Category,
        winners: Side,
        losers: Side,
        /// Name to use if the winning pair has no team yet; a name is
        /// derived from the nicknames when absent.
        winner_team: Option<String>,
        loser_team: Option<String>,
    },
}

impl MatchSubmission {
    pub fn category(&self) -> Category {
        match self {
            MatchSubmission::HeadToHead { category, .. }
            | MatchSubmission::FreeForAll { category, .. }
            | MatchSubmission::TeamVersus { category, .. } => *category,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            MatchSubmission::FreeForAll { label, .. } => label.as_deref(),
            _ => None,
        }
    }

    /// Every player seat, in seat order.
    pub fn players(&self) -> Vec<PlayerId> {
        match self {
            MatchSubmission::HeadToHead { winner, loser, .. } => vec![*winner, *loser],
            MatchSubmission::FreeForAll {
                first,
                second,
                third,
                fourth,
                ..
            } => [Some(*first), Some(*second), *third, *fourth]
                .into_iter()
                .flatten()
                .collect(),
            MatchSubmission::TeamVersus {
                winners, losers, ..
            } => vec![
                winners.offense,
                winners.defense,
                losers.offense,
                losers.defense,
            ],
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let category = self.category();
        let shape = category.shape();
        match self {
            MatchSubmission::HeadToHead { .. } => {
                if shape != Shape::HeadToHead {
                    return Err(Error::Validation(format!(
                        "{category} is not a head-to-head game"
                    )));
                }
            }
            MatchSubmission::FreeForAll {
                third,
                fourth,
                label,
                ..
            } => {
                if shape != Shape::FreeForAll {
                    return Err(Error::Validation(format!(
                        "{category} is not a free-for-all game"
                    )));
                }
                if fourth.is_some() && third.is_none() {
                    return Err(Error::Validation(
                        "a fourth place cannot be recorded without a third".into(),
                    ));
                }
                if category.label_rule() == LabelRule::RequiredUnique
                    && label.as_deref().is_none_or(|label| label.trim().is_empty())
                {
                    return Err(Error::Validation(format!(
                        "{category} results require a course label"
                    )));
                }
            }
            MatchSubmission::TeamVersus { .. } => {
                if shape != Shape::TeamVersus {
                    return Err(Error::Validation(format!("{category} is not a team game")));
                }
            }
        }

        if !self.players().iter().all_unique() {
            return Err(Error::Validation(
                "a player cannot appear twice in one result".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: i64) -> PlayerId {
        id.into()
    }

    #[test]
    fn shape_must_match_category() {
        let submission = MatchSubmission::HeadToHead {
            category: Category::Foosball,
            winner: player(1),
            loser: player(2),
        };
        assert!(matches!(submission.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn fourth_place_requires_third() {
        let submission = MatchSubmission::FreeForAll {
            category: Category::Kart,
            first: player(1),
            second: player(2),
            third: None,
            fourth: Some(player(3)),
            label: Some("rainbow road".into()),
        };
        assert!(matches!(submission.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn kart_requires_a_course() {
        let submission = MatchSubmission::FreeForAll {
            category: Category::Kart,
            first: player(1),
            second: player(2),
            third: None,
            fourth: None,
            label: None,
        };
        assert!(matches!(submission.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn duplicate_seats_are_rejected() {
        let submission = MatchSubmission::TeamVersus {
            category: Category::Paper,
            winners: Side {
                offense: player(1),
                defense: player(2),
            },
            losers: Side {
                offense: player(3),
                defense: player(1),
            },
            winner_team: None,
            loser_team: None,
        };
        assert!(matches!(submission.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn well_formed_submissions_pass() {
        let submission = MatchSubmission::FreeForAll {
            category: Category::Shooter,
            first: player(1),
            second: player(2),
            third: Some(player(3)),
            fourth: None,
            label: None,
        };
        assert!(submission.validate().is_ok());
    }
}
