use crate::{
    category::{Category, Scope, Shape},
    error::{Error, Result},
    matches::{MatchSubmission, Side},
    model::{MatchId, Owner, Player, PlayerId, RatingId, Team, TeamId},
    report::{HistoryPoint, Record, RecordedMatch, SeatResult, Standing},
    skill::{self, Skill},
};
use chrono::{DateTime, Utc};
use futures::stream::{StreamExt, TryStreamExt};
use itertools::Itertools;
use sqlx::{
    migrate, query, query_as,
    sqlite::{SqliteConnectOptions, SqliteConnection},
    ConnectOptions, Connection,
};
use std::{collections::HashMap, path::Path};

const PLACEMENT_SEATS: [&str; 4] = ["first", "second", "third", "fourth"];

/// The rating ledger. Owns the storage connection; every multi-step
/// mutation runs inside a single transaction, so a failure at any step
/// rolls the whole operation back.
#[derive(Debug)]
pub struct Db {
    conn: SqliteConnection,
}

impl Db {
    pub async fn open(path: &Path) -> Result<Self> {
        Self::new(
            SqliteConnectOptions::default()
                .filename(path)
                .create_if_missing(true),
        )
        .await
    }

    pub async fn memory() -> Result<Self> {
        Self::new(Default::default()).await
    }

    async fn new(opt: SqliteConnectOptions) -> Result<Self> {
        // Dangling live-rating or seat references are hard failures, not
        // silent orphans.
        let mut conn = opt.foreign_keys(true).connect().await?;
        migrate!("db/migrations").run(&mut conn).await?;
        Ok(Self { conn })
    }

    /// Register a player and seed a default rating plus one history entry
    /// for every chain a player owns.
    pub async fn add_player(
        &mut self,
        first_name: &str,
        last_name: &str,
        nickname: &str,
    ) -> Result<Player> {
        require_nonempty([
            ("first name", first_name),
            ("last name", last_name),
            ("nickname", nickname),
        ])?;

        let at = Utc::now();
        let mut tx = self.conn.begin().await?;
        let (id,): (i64,) = query_as(
            "INSERT INTO player (first_name, last_name, nickname, created_at)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(first_name)
        .bind(last_name)
        .bind(nickname)
        .bind(at)
        .fetch_one(tx.as_mut())
        .await
        .map_err(|err| {
            Error::or_conflict(
                err,
                format!("player {nickname} ({first_name} {last_name}) already exists"),
            )
        })?;

        let id = PlayerId::from(id);
        for scope in Scope::PLAYER {
            seed_scope(tx.as_mut(), Owner::Player(id), scope, at).await?;
        }
        tx.commit().await?;

        tracing::debug!(%id, nickname, "added player");
        Ok(Player {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            nickname: nickname.into(),
            created_at: at,
        })
    }

    /// Replace a player's identity tuple.
    pub async fn edit_player(
        &mut self,
        id: PlayerId,
        first_name: &str,
        last_name: &str,
        nickname: &str,
    ) -> Result<Player> {
        require_nonempty([
            ("first name", first_name),
            ("last name", last_name),
            ("nickname", nickname),
        ])?;

        let row: Option<(DateTime<Utc>,)> = query_as(
            "UPDATE player SET first_name = $1, last_name = $2, nickname = $3
             WHERE id = $4 RETURNING created_at",
        )
        .bind(first_name)
        .bind(last_name)
        .bind(nickname)
        .bind(i64::from(id))
        .fetch_optional(&mut self.conn)
        .await
        .map_err(|err| {
            Error::or_conflict(
                err,
                format!("player {nickname} ({first_name} {last_name}) already exists"),
            )
        })?;
        let (created_at,) = row.ok_or_else(|| Error::NotFound(format!("player {id}")))?;

        tracing::debug!(%id, nickname, "edited player");
        Ok(Player {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            nickname: nickname.into(),
            created_at,
        })
    }

    /// Look a player up by nickname. Identity is unique on the full name
    /// tuple, so a nickname may be shared; an ambiguous lookup is an error
    /// rather than an arbitrary pick.
    pub async fn find_player(&mut self, nickname: &str) -> Result<Player> {
        let mut rows: Vec<(i64, String, String, String, DateTime<Utc>)> = query_as(
            "SELECT id, first_name, last_name, nickname, created_at
             FROM player WHERE nickname = $1 LIMIT 2",
        )
        .bind(nickname)
        .fetch_all(&mut self.conn)
        .await?;
        if rows.len() > 1 {
            return Err(Error::Conflict(format!(
                "nickname {nickname:?} is shared by more than one player"
            )));
        }
        let (id, first_name, last_name, nickname, created_at) = rows
            .pop()
            .ok_or_else(|| Error::NotFound(format!("player {nickname:?}")))?;
        Ok(Player {
            id: id.into(),
            first_name,
            last_name,
            nickname,
            created_at,
        })
    }

    pub async fn players(&mut self) -> Result<Vec<Player>> {
        query_as::<_, (i64, String, String, String, DateTime<Utc>)>(
            "SELECT id, first_name, last_name, nickname, created_at FROM player ORDER BY id",
        )
        .fetch(&mut self.conn)
        .map(|res| {
            let (id, first_name, last_name, nickname, created_at) = res?;
            Ok::<_, Error>(Player {
                id: id.into(),
                first_name,
                last_name,
                nickname,
                created_at,
            })
        })
        .try_collect()
        .await
    }

    /// Register a team for an unordered pair of players. Idempotent on the
    /// pair: if the two players already have a team, that team is returned
    /// unchanged, whatever name was proposed. A fresh team seeds a default
    /// rating and history entry for every team chain.
    pub async fn add_team(&mut self, a: PlayerId, b: PlayerId, name: &str) -> Result<Team> {
        require_nonempty([("team name", name)])?;
        if a == b {
            return Err(Error::Validation(
                "a team needs two distinct players".into(),
            ));
        }

        let at = Utc::now();
        let mut tx = self.conn.begin().await?;
        for player in [a, b] {
            require_player(tx.as_mut(), player).await?;
        }
        let id = match pair_team(tx.as_mut(), a, b).await? {
            Some(existing) => existing,
            None => create_team(tx.as_mut(), a, b, name, at).await?,
        };
        let team = load_team(tx.as_mut(), id).await?;
        tx.commit().await?;
        Ok(team)
    }

    pub async fn edit_team(&mut self, id: TeamId, name: &str) -> Result<Team> {
        require_nonempty([("team name", name)])?;
        let updated = query("UPDATE team SET name = $1 WHERE id = $2")
            .bind(name)
            .bind(i64::from(id))
            .execute(&mut self.conn)
            .await
            .map_err(|err| Error::or_conflict(err, format!("team name {name:?} already taken")))?;
        if updated.rows_affected() == 0 {
            return Err(Error::NotFound(format!("team {id}")));
        }
        tracing::debug!(%id, name, "renamed team");
        load_team(&mut self.conn, id).await
    }

    /// The team for an unordered pair of players, if one exists.
    pub async fn team_of(&mut self, a: PlayerId, b: PlayerId) -> Result<Option<Team>> {
        if a == b {
            // The pair self-join would match any team containing the player.
            return Ok(None);
        }
        match pair_team(&mut self.conn, a, b).await? {
            Some(id) => Ok(Some(load_team(&mut self.conn, id).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_team(&mut self, name: &str) -> Result<Team> {
        let row: Option<(i64,)> = query_as("SELECT id FROM team WHERE name = $1 LIMIT 1")
            .bind(name)
            .fetch_optional(&mut self.conn)
            .await?;
        let (id,) = row.ok_or_else(|| Error::NotFound(format!("team {name:?}")))?;
        load_team(&mut self.conn, id.into()).await
    }

    pub async fn teams(&mut self) -> Result<Vec<Team>> {
        let rows: Vec<(i64, String, DateTime<Utc>, i64)> = query_as(
            "SELECT t.id, t.name, t.created_at, tm.player_id
             FROM team t JOIN team_member tm ON tm.team_id = t.id
             ORDER BY t.id, tm.player_id",
        )
        .fetch_all(&mut self.conn)
        .await?;

        let grouped = rows.into_iter().chunk_by(|(id, ..)| *id);
        let mut teams = Vec::new();
        for (id, group) in &grouped {
            let Ok([(_, name, created_at, a), (_, _, _, b)]) =
                <[_; 2]>::try_from(group.collect::<Vec<_>>())
            else {
                return Err(Error::Corrupt(format!("team {id} does not have two members")));
            };
            teams.push(Team {
                id: id.into(),
                name,
                members: (a.into(), b.into()),
                created_at,
            });
        }
        Ok(teams)
    }

    /// The current (mean, uncertainty) behind a participant's live rating
    /// reference for one chain.
    pub async fn current_skill(&mut self, owner: Owner, scope: Scope) -> Result<Skill> {
        live_skill(&mut self.conn, owner, scope).await
    }

    /// Record a match result: validate, update every affected rating chain,
    /// and append the match row, all in one transaction.
    pub async fn record_match(&mut self, submission: &MatchSubmission) -> Result<MatchId> {
        submission.validate()?;
        let category = submission.category();
        let at = Utc::now();

        let mut tx = self.conn.begin().await?;
        for player in submission.players() {
            require_player(tx.as_mut(), player).await?;
        }

        let (id,): (i64,) = query_as(
            "INSERT INTO match_result (category, label, created_at)
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(category.as_str())
        .bind(submission.label())
        .bind(at)
        .fetch_one(tx.as_mut())
        .await
        .map_err(|err| {
            Error::or_conflict(
                err,
                format!(
                    "a {category} result for {:?} is already recorded",
                    submission.label().unwrap_or_default()
                ),
            )
        })?;
        let match_id = MatchId::from(id);

        match submission {
            MatchSubmission::HeadToHead { winner, loser, .. } => {
                let scope = category.player_scopes()[0];
                let winner = Owner::Player(*winner);
                let loser = Owner::Player(*loser);
                let (new_winner, new_loser) = skill::duel(
                    live_skill(tx.as_mut(), winner, scope).await?,
                    live_skill(tx.as_mut(), loser, scope).await?,
                );
                apply_update(tx.as_mut(), winner, scope, new_winner, at).await?;
                apply_update(tx.as_mut(), loser, scope, new_loser, at).await?;
                insert_seat(tx.as_mut(), match_id, "winner", winner, scope, 1).await?;
                insert_seat(tx.as_mut(), match_id, "loser", loser, scope, 2).await?;
            }
            MatchSubmission::FreeForAll { .. } => {
                let scope = category.player_scopes()[0];
                let entrants = submission.players();
                let mut skills = Vec::with_capacity(entrants.len());
                for player in &entrants {
                    skills.push(live_skill(tx.as_mut(), Owner::Player(*player), scope).await?);
                }
                let updated = skill::free_for_all(&skills);
                for (place, (player, new_skill)) in entrants.iter().zip(updated).enumerate() {
                    let owner = Owner::Player(*player);
                    apply_update(tx.as_mut(), owner, scope, new_skill, at).await?;
                    insert_seat(
                        tx.as_mut(),
                        match_id,
                        PLACEMENT_SEATS[place],
                        owner,
                        scope,
                        place as u32 + 1,
                    )
                    .await?;
                }
            }
            MatchSubmission::TeamVersus {
                winners,
                losers,
                winner_team,
                loser_team,
                ..
            } => {
                let scopes = category.player_scopes();
                let offense_scope = scopes[0];
                let defense_scope = scopes[scopes.len() - 1];

                // Per-seat player updates.
                let seat_owners = [
                    (winners.offense, offense_scope),
                    (winners.defense, defense_scope),
                    (losers.offense, offense_scope),
                    (losers.defense, defense_scope),
                ];
                let mut skills = Vec::with_capacity(4);
                for (player, scope) in seat_owners {
                    skills.push(live_skill(tx.as_mut(), Owner::Player(player), scope).await?);
                }
                let (new_winners, new_losers) =
                    skill::team_duel([skills[0], skills[1]], [skills[2], skills[3]]);
                let seats = ["winner-offense", "winner-defense", "loser-offense", "loser-defense"];
                let updates = [new_winners[0], new_winners[1], new_losers[0], new_losers[1]];
                for (((player, scope), seat), new_skill) in
                    seat_owners.into_iter().zip(seats).zip(updates)
                {
                    let owner = Owner::Player(player);
                    let placing = if seat.starts_with("winner") { 1 } else { 2 };
                    apply_update(tx.as_mut(), owner, scope, new_skill, at).await?;
                    insert_seat(tx.as_mut(), match_id, seat, owner, scope, placing).await?;
                }

                // The synthetic team ratings move as a 1v1 between the two
                // sides. Teams are created lazily on first co-occurrence.
                let team_scope = category
                    .team_scope()
                    .ok_or_else(|| Error::Corrupt(format!("{category} has no team chain")))?;
                let winner_team =
                    find_or_create_team(tx.as_mut(), *winners, winner_team.as_deref(), at).await?;
                let loser_team =
                    find_or_create_team(tx.as_mut(), *losers, loser_team.as_deref(), at).await?;
                let winner_team = Owner::Team(winner_team);
                let loser_team = Owner::Team(loser_team);
                let (new_winner, new_loser) = skill::duel(
                    live_skill(tx.as_mut(), winner_team, team_scope).await?,
                    live_skill(tx.as_mut(), loser_team, team_scope).await?,
                );
                apply_update(tx.as_mut(), winner_team, team_scope, new_winner, at).await?;
                apply_update(tx.as_mut(), loser_team, team_scope, new_loser, at).await?;
                insert_seat(tx.as_mut(), match_id, "winner-team", winner_team, team_scope, 1)
                    .await?;
                insert_seat(tx.as_mut(), match_id, "loser-team", loser_team, team_scope, 2)
                    .await?;
            }
        }

        tx.commit().await?;
        tracing::debug!(%match_id, %category, "recorded result");
        Ok(match_id)
    }

    /// Delete the most recent result for a category, restoring every
    /// affected participant's previous rating and pruning the newest entry
    /// of each touched history chain. Fails explicitly when the ledger is
    /// empty. Teams created by the undone match are kept.
    pub async fn undo_last_match(&mut self, category: Category) -> Result<()> {
        let mut tx = self.conn.begin().await?;
        let latest: Option<(i64,)> =
            query_as("SELECT id FROM match_result WHERE category = $1 ORDER BY id DESC LIMIT 1")
                .bind(category.as_str())
                .fetch_optional(tx.as_mut())
                .await?;
        let (match_id,) =
            latest.ok_or_else(|| Error::NotFound(format!("no {category} results recorded")))?;

        let seats: Vec<(String, i64, String)> =
            query_as("SELECT owner_kind, owner_id, scope FROM match_seat WHERE match_id = $1")
                .bind(match_id)
                .fetch_all(tx.as_mut())
                .await?;

        for (kind, owner_id, scope) in seats {
            let owner = Owner::from_parts(&kind, owner_id)
                .ok_or_else(|| Error::Corrupt(format!("unknown owner kind {kind:?}")))?;
            let scope: Scope = scope.parse().map_err(|_| {
                Error::Corrupt(format!("unknown scope {scope:?} on match {match_id}"))
            })?;

            let chain: Vec<(i64, i64)> = query_as(
                "SELECT id, rating_id FROM rating_history
                 WHERE owner_kind = $1 AND owner_id = $2 AND scope = $3
                 ORDER BY id DESC LIMIT 2",
            )
            .bind(owner.kind())
            .bind(owner.id())
            .bind(scope.as_str())
            .fetch_all(tx.as_mut())
            .await?;
            let [(newest, _), (_, previous_rating)] = chain[..] else {
                return Err(Error::Corrupt(format!(
                    "history for {owner} in {scope} has no predecessor to restore"
                )));
            };

            set_live(tx.as_mut(), owner, scope, previous_rating.into()).await?;
            query("DELETE FROM rating_history WHERE id = $1")
                .bind(newest)
                .execute(tx.as_mut())
                .await?;
        }

        // Seat rows go with the match via the cascade.
        query("DELETE FROM match_result WHERE id = $1")
            .bind(match_id)
            .execute(tx.as_mut())
            .await?;
        tx.commit().await?;

        tracing::debug!(match_id, %category, "undid latest result");
        Ok(())
    }

    /// Leaderboard for one rating chain, in participant insertion order.
    /// Ranks are recomputed from the live ratings on every call.
    pub async fn standings(&mut self, scope: Scope) -> Result<Vec<Standing>> {
        let rows: Vec<(i64, String, f64, f64)> = if scope.is_team() {
            query_as(
                "SELECT t.id, t.name, r.mean, r.uncertainty
                 FROM live_rating l
                 JOIN team t ON t.id = l.owner_id
                 JOIN rating r ON r.id = l.rating_id
                 WHERE l.scope = $1 AND l.owner_kind = 'team'
                 ORDER BY t.id",
            )
        } else {
            query_as(
                "SELECT p.id, p.nickname, r.mean, r.uncertainty
                 FROM live_rating l
                 JOIN player p ON p.id = l.owner_id
                 JOIN rating r ON r.id = l.rating_id
                 WHERE l.scope = $1 AND l.owner_kind = 'player'
                 ORDER BY p.id",
            )
        }
        .bind(scope.as_str())
        .fetch_all(&mut self.conn)
        .await?;

        let kind = if scope.is_team() { "team" } else { "player" };
        let counts: Vec<(i64, i64, i64)> = query_as(
            "SELECT owner_id, placing, COUNT(*)
             FROM match_seat
             WHERE scope = $1 AND owner_kind = $2
             GROUP BY owner_id, placing",
        )
        .bind(scope.as_str())
        .bind(kind)
        .fetch_all(&mut self.conn)
        .await?;
        let mut by_owner: HashMap<i64, [u32; 4]> = HashMap::new();
        for (owner_id, placing, count) in counts {
            let finishes = by_owner.entry(owner_id).or_default();
            if (1..=4).contains(&placing) {
                finishes[placing as usize - 1] = count as u32;
            }
        }

        let placements = scope.category().shape() == Shape::FreeForAll && !scope.is_team();
        Ok(rows
            .into_iter()
            .map(|(id, name, mean, uncertainty)| {
                let finishes = by_owner.get(&id).copied().unwrap_or_default();
                let record = if placements {
                    Record::Placements { finishes }
                } else {
                    Record::WinLoss {
                        wins: finishes[0],
                        losses: finishes[1],
                    }
                };
                let owner = match scope.is_team() {
                    true => Owner::Team(id.into()),
                    false => Owner::Player(id.into()),
                };
                Standing {
                    owner,
                    name,
                    rank: Skill { mean, uncertainty }.conservative(),
                    record,
                }
            })
            .collect())
    }

    /// A participant's conservative-rank trajectory for one chain, newest
    /// first, one point per history entry.
    pub async fn rating_history(
        &mut self,
        scope: Scope,
        owner: Owner,
    ) -> Result<Vec<HistoryPoint>> {
        if scope.is_team() != matches!(owner, Owner::Team(_)) {
            return Err(Error::Validation(format!(
                "{owner} does not hold a rating for {scope}"
            )));
        }
        let points: Vec<HistoryPoint> = query_as::<_, (f64, f64, DateTime<Utc>)>(
            "SELECT r.mean, r.uncertainty, h.created_at
             FROM rating_history h JOIN rating r ON r.id = h.rating_id
             WHERE h.owner_kind = $1 AND h.owner_id = $2 AND h.scope = $3
             ORDER BY h.id DESC",
        )
        .bind(owner.kind())
        .bind(owner.id())
        .bind(scope.as_str())
        .fetch(&mut self.conn)
        .map(|res| {
            let (mean, uncertainty, at) = res?;
            Ok::<_, Error>(HistoryPoint {
                rank: Skill { mean, uncertainty }.conservative(),
                at,
            })
        })
        .try_collect()
        .await?;
        if points.is_empty() {
            return Err(Error::NotFound(format!("no {scope} history for {owner}")));
        }
        Ok(points)
    }

    /// Recorded results for a category, newest first.
    pub async fn matches(&mut self, category: Category) -> Result<Vec<RecordedMatch>> {
        let rows: Vec<(i64, Option<String>, DateTime<Utc>)> = query_as(
            "SELECT id, label, created_at FROM match_result
             WHERE category = $1 ORDER BY id DESC",
        )
        .bind(category.as_str())
        .fetch_all(&mut self.conn)
        .await?;

        let mut results = Vec::with_capacity(rows.len());
        for (id, label, at) in rows {
            let seats: Vec<(String, String, i64, Option<String>, i64)> = query_as(
                "SELECT s.seat, s.owner_kind, s.owner_id, COALESCE(p.nickname, t.name), s.placing
                 FROM match_seat s
                 LEFT JOIN player p ON s.owner_kind = 'player' AND p.id = s.owner_id
                 LEFT JOIN team t ON s.owner_kind = 'team' AND t.id = s.owner_id
                 WHERE s.match_id = $1
                 ORDER BY s.placing, s.seat",
            )
            .bind(id)
            .fetch_all(&mut self.conn)
            .await?;

            let seats = seats
                .into_iter()
                .map(|(seat, kind, owner_id, name, placing)| {
                    let owner = Owner::from_parts(&kind, owner_id)
                        .ok_or_else(|| Error::Corrupt(format!("unknown owner kind {kind:?}")))?;
                    let name =
                        name.ok_or_else(|| Error::Corrupt(format!("{owner} has no name")))?;
                    Ok(SeatResult {
                        seat,
                        owner,
                        name,
                        placing: placing as u32,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            results.push(RecordedMatch {
                id: id.into(),
                label,
                at,
                seats,
            });
        }
        Ok(results)
    }
}

fn require_nonempty<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<()> {
    for (field, value) in fields {
        if value.trim().is_empty() {
            return Err(Error::Validation(format!("{field} must not be empty")));
        }
    }
    Ok(())
}

async fn require_player(conn: &mut SqliteConnection, id: PlayerId) -> Result<()> {
    let row: Option<(i64,)> = query_as("SELECT id FROM player WHERE id = $1")
        .bind(i64::from(id))
        .fetch_optional(conn)
        .await?;
    row.map(|_| ())
        .ok_or_else(|| Error::NotFound(format!("player {id}")))
}

async fn nickname(conn: &mut SqliteConnection, id: PlayerId) -> Result<String> {
    let row: Option<(String,)> = query_as("SELECT nickname FROM player WHERE id = $1")
        .bind(i64::from(id))
        .fetch_optional(conn)
        .await?;
    row.map(|(nickname,)| nickname)
        .ok_or_else(|| Error::NotFound(format!("player {id}")))
}

/// Insert an immutable rating row, rounded to the persisted precision.
async fn insert_rating(
    conn: &mut SqliteConnection,
    skill: Skill,
    at: DateTime<Utc>,
) -> Result<RatingId> {
    let (id,): (i64,) =
        query_as("INSERT INTO rating (mean, uncertainty, created_at) VALUES ($1, $2, $3) RETURNING id")
            .bind(skill::round4(skill.mean))
            .bind(skill::round4(skill.uncertainty))
            .bind(at)
            .fetch_one(conn)
            .await?;
    Ok(id.into())
}

/// Give `owner` a default rating for `scope`, with the seed history entry
/// that keeps every chain non-empty from birth.
async fn seed_scope(
    conn: &mut SqliteConnection,
    owner: Owner,
    scope: Scope,
    at: DateTime<Utc>,
) -> Result<()> {
    let rating = insert_rating(conn, Skill::default(), at).await?;
    query("INSERT INTO live_rating (owner_kind, owner_id, scope, rating_id) VALUES ($1, $2, $3, $4)")
        .bind(owner.kind())
        .bind(owner.id())
        .bind(scope.as_str())
        .bind(i64::from(rating))
        .execute(&mut *conn)
        .await?;
    push_history(conn, owner, scope, rating, at).await
}

async fn live_skill(conn: &mut SqliteConnection, owner: Owner, scope: Scope) -> Result<Skill> {
    let row: Option<(f64, f64)> = query_as(
        "SELECT r.mean, r.uncertainty
         FROM live_rating l JOIN rating r ON r.id = l.rating_id
         WHERE l.owner_kind = $1 AND l.owner_id = $2 AND l.scope = $3",
    )
    .bind(owner.kind())
    .bind(owner.id())
    .bind(scope.as_str())
    .fetch_optional(conn)
    .await?;
    let (mean, uncertainty) =
        row.ok_or_else(|| Error::Corrupt(format!("{owner} has no live {scope} rating")))?;
    Ok(Skill { mean, uncertainty })
}

async fn set_live(
    conn: &mut SqliteConnection,
    owner: Owner,
    scope: Scope,
    rating: RatingId,
) -> Result<()> {
    let updated = query(
        "UPDATE live_rating SET rating_id = $1
         WHERE owner_kind = $2 AND owner_id = $3 AND scope = $4",
    )
    .bind(i64::from(rating))
    .bind(owner.kind())
    .bind(owner.id())
    .bind(scope.as_str())
    .execute(conn)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(Error::Corrupt(format!(
            "{owner} has no live {scope} rating to repoint"
        )));
    }
    Ok(())
}

async fn push_history(
    conn: &mut SqliteConnection,
    owner: Owner,
    scope: Scope,
    rating: RatingId,
    at: DateTime<Utc>,
) -> Result<()> {
    query(
        "INSERT INTO rating_history (owner_kind, owner_id, scope, rating_id, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(owner.kind())
    .bind(owner.id())
    .bind(scope.as_str())
    .bind(i64::from(rating))
    .bind(at)
    .execute(conn)
    .await?;
    Ok(())
}

/// One rating-chain step: a fresh rating row, the live reference repointed
/// to it, and a history entry linking the two.
async fn apply_update(
    conn: &mut SqliteConnection,
    owner: Owner,
    scope: Scope,
    new_skill: Skill,
    at: DateTime<Utc>,
) -> Result<()> {
    let rating = insert_rating(conn, new_skill, at).await?;
    set_live(conn, owner, scope, rating).await?;
    push_history(conn, owner, scope, rating, at).await
}

async fn insert_seat(
    conn: &mut SqliteConnection,
    match_id: MatchId,
    seat: &str,
    owner: Owner,
    scope: Scope,
    placing: u32,
) -> Result<()> {
    query(
        "INSERT INTO match_seat (match_id, seat, owner_kind, owner_id, scope, placing)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(i64::from(match_id))
    .bind(seat)
    .bind(owner.kind())
    .bind(owner.id())
    .bind(scope.as_str())
    .bind(placing)
    .execute(conn)
    .await?;
    Ok(())
}

/// The team containing exactly the unordered pair `(a, b)`.
async fn pair_team(
    conn: &mut SqliteConnection,
    a: PlayerId,
    b: PlayerId,
) -> Result<Option<TeamId>> {
    let row: Option<(i64,)> = query_as(
        "SELECT ta.team_id
         FROM team_member ta JOIN team_member tb ON ta.team_id = tb.team_id
         WHERE ta.player_id = $1 AND tb.player_id = $2",
    )
    .bind(i64::from(a))
    .bind(i64::from(b))
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|(id,)| id.into()))
}

async fn create_team(
    conn: &mut SqliteConnection,
    a: PlayerId,
    b: PlayerId,
    name: &str,
    at: DateTime<Utc>,
) -> Result<TeamId> {
    let (id,): (i64,) =
        query_as("INSERT INTO team (name, created_at) VALUES ($1, $2) RETURNING id")
            .bind(name)
            .bind(at)
            .fetch_one(&mut *conn)
            .await
            .map_err(|err| Error::or_conflict(err, format!("team name {name:?} already taken")))?;
    let id = TeamId::from(id);

    for player in [a, b] {
        query("INSERT INTO team_member (team_id, player_id) VALUES ($1, $2)")
            .bind(i64::from(id))
            .bind(i64::from(player))
            .execute(&mut *conn)
            .await?;
    }
    for scope in Scope::TEAM {
        seed_scope(conn, Owner::Team(id), scope, at).await?;
    }

    tracing::debug!(%id, name, "created team");
    Ok(id)
}

async fn find_or_create_team(
    conn: &mut SqliteConnection,
    side: Side,
    proposed: Option<&str>,
    at: DateTime<Utc>,
) -> Result<TeamId> {
    if let Some(existing) = pair_team(conn, side.offense, side.defense).await? {
        return Ok(existing);
    }
    let name = match proposed {
        Some(name) => name.to_owned(),
        None => format!(
            "{} & {}",
            nickname(conn, side.offense).await?,
            nickname(conn, side.defense).await?
        ),
    };
    create_team(conn, side.offense, side.defense, &name, at).await
}

async fn load_team(conn: &mut SqliteConnection, id: TeamId) -> Result<Team> {
    let row: Option<(String, DateTime<Utc>)> =
        query_as("SELECT name, created_at FROM team WHERE id = $1")
            .bind(i64::from(id))
            .fetch_optional(&mut *conn)
            .await?;
    let (name, created_at) = row.ok_or_else(|| Error::NotFound(format!("team {id}")))?;

    let members: Vec<(i64,)> =
        query_as("SELECT player_id FROM team_member WHERE team_id = $1 ORDER BY player_id")
            .bind(i64::from(id))
            .fetch_all(conn)
            .await?;
    let [(a,), (b,)] = members[..] else {
        return Err(Error::Corrupt(format!("team {id} does not have two members")));
    };

    Ok(Team {
        id,
        name,
        members: (a.into(), b.into()),
        created_at,
    })
}
