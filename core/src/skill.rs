use serde::{Deserialize, Serialize};
use skillratings::{
    trueskill::{
        trueskill, trueskill_multi_team, trueskill_two_teams, TrueSkillConfig, TrueSkillRating,
    },
    MultiTeamOutcome, Outcomes,
};

/// A two-parameter Bayesian skill estimate: the mean of the posterior and
/// its standard deviation. New participants start at the TrueSkill prior
/// (mean 25, uncertainty 25/3).
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct Skill {
    pub mean: f64,
    pub uncertainty: f64,
}

impl Skill {
    /// The conservative display rank: the skill floor at roughly 99.9%
    /// confidence under a Gaussian posterior. Leaderboards order by this.
    pub fn conservative(&self) -> f64 {
        self.mean - 3.0 * self.uncertainty
    }
}

impl Default for Skill {
    fn default() -> Self {
        TrueSkillRating::new().into()
    }
}

impl From<TrueSkillRating> for Skill {
    fn from(rating: TrueSkillRating) -> Self {
        Self {
            mean: rating.rating,
            uncertainty: rating.uncertainty,
        }
    }
}

impl From<Skill> for TrueSkillRating {
    fn from(skill: Skill) -> Self {
        Self {
            rating: skill.mean,
            uncertainty: skill.uncertainty,
        }
    }
}

fn config() -> TrueSkillConfig {
    TrueSkillConfig::new()
}

/// Posterior ratings after a decisive 1v1. Also used for the synthetic team
/// ratings of a team-scored category, treating the sides as two players.
pub fn duel(winner: Skill, loser: Skill) -> (Skill, Skill) {
    let (winner, loser) = trueskill(&winner.into(), &loser.into(), &Outcomes::WIN, &config());
    (winner.into(), loser.into())
}

/// Posterior ratings after a 2v2, seat by seat.
pub fn team_duel(winners: [Skill; 2], losers: [Skill; 2]) -> ([Skill; 2], [Skill; 2]) {
    let (winners, losers) = trueskill_two_teams(
        &[winners[0].into(), winners[1].into()],
        &[losers[0].into(), losers[1].into()],
        &Outcomes::WIN,
        &config(),
    );
    (
        [winners[0].into(), winners[1].into()],
        [losers[0].into(), losers[1].into()],
    )
}

/// Posterior ratings after a strictly ranked free-for-all. `finishers` is in
/// placement order (index 0 finished first); ties are not supported. The
/// returned ratings keep that order.
pub fn free_for_all(finishers: &[Skill]) -> Vec<Skill> {
    let singletons = finishers
        .iter()
        .map(|skill| [TrueSkillRating::from(*skill)])
        .collect::<Vec<_>>();
    let placed = singletons
        .iter()
        .enumerate()
        .map(|(place, team)| (team.as_slice(), MultiTeamOutcome::new(place + 1)))
        .collect::<Vec<_>>();
    trueskill_multi_team(&placed, &config())
        .into_iter()
        .map(|team| team[0].into())
        .collect()
}

/// Ratings persist with four decimal digits; round before writing so a
/// stored value reads back exactly.
pub fn round4(value: f64) -> f64 {
    (value * 1e4).round() / 1e4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prior_is_the_trueskill_default() {
        let prior = Skill::default();
        assert_eq!(prior.mean, 25.0);
        assert!((prior.uncertainty - 25.0 / 3.0).abs() < 1e-9);
        // Worst-case skill of a fresh participant is effectively zero.
        assert!(prior.conservative().abs() < 1e-9);
    }

    #[test]
    fn duel_moves_winner_up_and_loser_down() {
        let (winner, loser) = duel(Skill::default(), Skill::default());
        assert!(winner.conservative() > Skill::default().conservative());
        assert!(loser.conservative() < Skill::default().conservative());
        // Both posteriors tightened.
        assert!(winner.uncertainty < Skill::default().uncertainty);
        assert!(loser.uncertainty < Skill::default().uncertainty);
    }

    #[test]
    fn upset_moves_ratings_further() {
        let favorite = Skill {
            mean: 30.0,
            uncertainty: 4.0,
        };
        let underdog = Skill {
            mean: 20.0,
            uncertainty: 4.0,
        };
        let (expected_winner, _) = duel(favorite, underdog);
        let (surprise_winner, _) = duel(underdog, favorite);
        assert!(surprise_winner.mean - underdog.mean > expected_winner.mean - favorite.mean);
    }

    #[test]
    fn free_for_all_orders_means_by_placement() {
        let finishers = vec![Skill::default(); 4];
        let updated = free_for_all(&finishers);
        assert_eq!(updated.len(), 4);
        for pair in updated.windows(2) {
            assert!(pair[0].mean > pair[1].mean);
        }
        assert!(updated[0].mean > 25.0);
        assert!(updated[3].mean < 25.0);
    }

    #[test]
    fn team_duel_moves_both_seats() {
        let (winners, losers) = team_duel([Skill::default(); 2], [Skill::default(); 2]);
        for seat in winners {
            assert!(seat.mean > 25.0);
        }
        for seat in losers {
            assert!(seat.mean < 25.0);
        }
    }

    #[test]
    fn rounding_hits_four_decimals() {
        assert_eq!(round4(25.0 / 3.0), 8.3333);
        assert_eq!(round4(1.23456789), 1.2346);
        assert_eq!(round4(-1.23456789), -1.2346);
    }
}
