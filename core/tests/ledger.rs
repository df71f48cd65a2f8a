use parlor_core::{
    category::{Category, Scope},
    db::Db,
    error::Error,
    matches::{MatchSubmission, Side},
    model::{Owner, Player, PlayerId},
    report::{Record, Standing},
    skill::Skill,
};
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions};

async fn start_db() -> Db {
    Db::memory().await.expect("in-memory ledger")
}

async fn add(db: &mut Db, first: &str, last: &str, nick: &str) -> Player {
    db.add_player(first, last, nick).await.expect("add player")
}

fn ping_pong(winner: PlayerId, loser: PlayerId) -> MatchSubmission {
    MatchSubmission::HeadToHead {
        category: Category::PingPong,
        winner,
        loser,
    }
}

fn kart_race(course: &str, placements: &[PlayerId]) -> MatchSubmission {
    MatchSubmission::FreeForAll {
        category: Category::Kart,
        first: placements[0],
        second: placements[1],
        third: placements.get(2).copied(),
        fourth: placements.get(3).copied(),
        label: Some(course.into()),
    }
}

fn standing<'a>(standings: &'a [Standing], name: &str) -> &'a Standing {
    standings
        .iter()
        .find(|row| row.name == name)
        .unwrap_or_else(|| panic!("no standing for {name}"))
}

#[tokio::test]
async fn fresh_players_start_at_the_prior() {
    let mut db = start_db().await;
    let alice = add(&mut db, "Alice", "Anders", "alice").await;

    // Every chain a player owns is seeded with the same default.
    for scope in Scope::PLAYER {
        let skill = db
            .current_skill(Owner::Player(alice.id), scope)
            .await
            .unwrap();
        assert_eq!(skill.mean, 25.0);
        assert_eq!(skill.uncertainty, 8.3333);
        let history = db
            .rating_history(scope, Owner::Player(alice.id))
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].rank.abs() < 0.01);
    }

    let standings = db.standings(Scope::PingPong).await.unwrap();
    assert_eq!(standings.len(), 1);
    assert_eq!(
        standings[0].record,
        Record::WinLoss { wins: 0, losses: 0 }
    );
}

#[tokio::test]
async fn stored_ratings_round_trip_at_four_decimals() {
    let mut db = start_db().await;
    let alice = add(&mut db, "Alice", "Anders", "alice").await;
    let bob = add(&mut db, "Bob", "Berg", "bob").await;
    db.record_match(&ping_pong(alice.id, bob.id)).await.unwrap();

    let expected = parlor_core::skill::duel(
        Skill {
            mean: 25.0,
            uncertainty: 8.3333,
        },
        Skill {
            mean: 25.0,
            uncertainty: 8.3333,
        },
    );
    let stored = db
        .current_skill(Owner::Player(alice.id), Scope::PingPong)
        .await
        .unwrap();
    assert!((stored.mean - expected.0.mean).abs() < 1e-4);
    assert!((stored.uncertainty - expected.0.uncertainty).abs() < 1e-4);

    // Reads are stable: the same row comes back identically.
    let again = db
        .current_skill(Owner::Player(alice.id), Scope::PingPong)
        .await
        .unwrap();
    assert_eq!(stored, again);
}

#[tokio::test]
async fn undo_restores_the_exact_previous_state() {
    let mut db = start_db().await;
    let alice = add(&mut db, "Alice", "Anders", "alice").await;
    let bob = add(&mut db, "Bob", "Berg", "bob").await;

    let before = db.standings(Scope::PingPong).await.unwrap();
    assert!(standing(&before, "alice").rank.abs() < 0.01);
    assert!(standing(&before, "bob").rank.abs() < 0.01);

    db.record_match(&ping_pong(alice.id, bob.id)).await.unwrap();
    let after = db.standings(Scope::PingPong).await.unwrap();
    assert!(standing(&after, "alice").rank > 0.0);
    assert!(standing(&after, "bob").rank < 0.0);
    assert!(standing(&after, "alice").rank > standing(&after, "bob").rank);
    assert_eq!(
        standing(&after, "alice").record,
        Record::WinLoss { wins: 1, losses: 0 }
    );

    db.undo_last_match(Category::PingPong).await.unwrap();
    let restored = db.standings(Scope::PingPong).await.unwrap();
    for row in &before {
        // Undo repoints to the original rating rows, so values match
        // exactly, not approximately.
        assert_eq!(standing(&restored, &row.name).rank, row.rank);
        assert_eq!(standing(&restored, &row.name).record, row.record);
    }
    assert!(db.matches(Category::PingPong).await.unwrap().is_empty());
}

#[tokio::test]
async fn history_grows_once_per_result() {
    let mut db = start_db().await;
    let alice = add(&mut db, "Alice", "Anders", "alice").await;
    let bob = add(&mut db, "Bob", "Berg", "bob").await;

    for _ in 0..3 {
        db.record_match(&ping_pong(alice.id, bob.id)).await.unwrap();
    }

    let history = db
        .rating_history(Scope::PingPong, Owner::Player(alice.id))
        .await
        .unwrap();
    // Seed plus one entry per recorded result, newest first.
    assert_eq!(history.len(), 4);
    for pair in history.windows(2) {
        assert!(pair[0].at >= pair[1].at);
    }
    // Alice only won, so the newest point is her highest.
    assert!(history[0].rank > history[3].rank);

    db.undo_last_match(Category::PingPong).await.unwrap();
    let pruned = db
        .rating_history(Scope::PingPong, Owner::Player(alice.id))
        .await
        .unwrap();
    assert_eq!(pruned.len(), 3);
}

#[tokio::test]
async fn team_registration_is_idempotent_on_the_pair() {
    let mut db = start_db().await;
    let alice = add(&mut db, "Alice", "Anders", "alice").await;
    let bob = add(&mut db, "Bob", "Berg", "bob").await;

    let first = db.add_team(alice.id, bob.id, "The Crushers").await.unwrap();
    let second = db.add_team(bob.id, alice.id, "Some Other Name").await.unwrap();
    assert_eq!(first.id, second.id);
    // The original registration wins; no second row appears.
    assert_eq!(second.name, "The Crushers");
    assert_eq!(db.teams().await.unwrap().len(), 1);

    let found = db.team_of(bob.id, alice.id).await.unwrap().unwrap();
    assert_eq!(found.id, first.id);
    assert_eq!(found.members, (alice.id, bob.id));
}

#[tokio::test]
async fn team_lookups_reject_a_degenerate_pair() {
    let mut db = start_db().await;
    let alice = add(&mut db, "Alice", "Anders", "alice").await;
    let bob = add(&mut db, "Bob", "Berg", "bob").await;
    db.add_team(alice.id, bob.id, "The Crushers").await.unwrap();

    // Alice is on a team, but no team has the membership (alice, alice).
    assert!(db.team_of(alice.id, alice.id).await.unwrap().is_none());
    assert!(db.team_of(alice.id, bob.id).await.unwrap().is_some());
}

#[tokio::test]
async fn shared_nicknames_make_lookup_ambiguous() {
    let mut db = start_db().await;
    let alice = add(&mut db, "Alice", "Anders", "ace").await;
    add(&mut db, "Adam", "Abbott", "ace").await;

    // Identity is unique on the full tuple, so the nickname alone no
    // longer picks a player.
    let err = db.find_player("ace").await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    db.edit_player(alice.id, "Alice", "Anders", "alice")
        .await
        .unwrap();
    assert_eq!(db.find_player("ace").await.unwrap().nickname, "ace");
    assert_eq!(db.find_player("alice").await.unwrap().id, alice.id);
}

#[tokio::test]
async fn torn_team_memberships_read_as_corrupt() {
    let path = std::env::temp_dir().join("parlor-torn-team.sqlite");
    let _ = std::fs::remove_file(&path);
    let mut db = Db::open(&path).await.unwrap();
    let alice = add(&mut db, "Alice", "Anders", "alice").await;
    let bob = add(&mut db, "Bob", "Berg", "bob").await;
    db.add_team(alice.id, bob.id, "The Crushers").await.unwrap();

    // Tear one membership row out from under the registry.
    let mut raw = SqliteConnectOptions::new()
        .filename(&path)
        .connect()
        .await
        .unwrap();
    sqlx::query("DELETE FROM team_member WHERE player_id = $1")
        .bind(i64::from(bob.id))
        .execute(&mut raw)
        .await
        .unwrap();

    assert!(matches!(db.teams().await.unwrap_err(), Error::Corrupt(_)));
    assert!(matches!(
        db.find_team("The Crushers").await.unwrap_err(),
        Error::Corrupt(_)
    ));
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn team_name_collisions_conflict() {
    let mut db = start_db().await;
    let alice = add(&mut db, "Alice", "Anders", "alice").await;
    let bob = add(&mut db, "Bob", "Berg", "bob").await;
    let carol = add(&mut db, "Carol", "Chen", "carol").await;
    let dave = add(&mut db, "Dave", "Diaz", "dave").await;

    db.add_team(alice.id, bob.id, "The Crushers").await.unwrap();
    let err = db
        .add_team(carol.id, dave.id, "The Crushers")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let err = db.add_team(alice.id, alice.id, "Solo").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn fourth_place_requires_third_and_writes_nothing() {
    let mut db = start_db().await;
    let ids: Vec<PlayerId> = {
        let mut ids = Vec::new();
        for nick in ["alice", "bob", "carol", "dave"] {
            ids.push(add(&mut db, nick, "Racer", nick).await.id);
        }
        ids
    };

    let gap = MatchSubmission::FreeForAll {
        category: Category::Kart,
        first: ids[0],
        second: ids[1],
        third: None,
        fourth: Some(ids[3]),
        label: Some("moo moo meadows".into()),
    };
    let err = db.record_match(&gap).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // Rejected before any write: no result, no new history.
    assert!(db.matches(Category::Kart).await.unwrap().is_empty());
    let history = db
        .rating_history(Scope::Kart, Owner::Player(ids[0]))
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn kart_courses_are_raced_only_once() {
    let mut db = start_db().await;
    let alice = add(&mut db, "Alice", "Anders", "alice").await;
    let bob = add(&mut db, "Bob", "Berg", "bob").await;

    let missing_label = MatchSubmission::FreeForAll {
        category: Category::Kart,
        first: alice.id,
        second: bob.id,
        third: None,
        fourth: None,
        label: None,
    };
    assert!(matches!(
        db.record_match(&missing_label).await.unwrap_err(),
        Error::Validation(_)
    ));

    db.record_match(&kart_race("rainbow road", &[alice.id, bob.id]))
        .await
        .unwrap();
    let err = db
        .record_match(&kart_race("rainbow road", &[bob.id, alice.id]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(db.matches(Category::Kart).await.unwrap().len(), 1);
}

#[tokio::test]
async fn free_for_all_updates_follow_placement() {
    let mut db = start_db().await;
    let mut ids = Vec::new();
    for nick in ["alice", "bob", "carol", "dave"] {
        ids.push(add(&mut db, nick, "Racer", nick).await.id);
    }

    db.record_match(&kart_race("bowser castle", &ids)).await.unwrap();

    let standings = db.standings(Scope::Kart).await.unwrap();
    assert!(standing(&standings, "alice").rank > standing(&standings, "dave").rank);
    assert_eq!(
        standing(&standings, "alice").record,
        Record::Placements {
            finishes: [1, 0, 0, 0]
        }
    );
    assert_eq!(
        standing(&standings, "dave").record,
        Record::Placements {
            finishes: [0, 0, 0, 1]
        }
    );
}

#[tokio::test]
async fn undo_on_an_empty_ledger_fails_explicitly() {
    let mut db = start_db().await;
    let err = db.undo_last_match(Category::Foosball).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn duplicate_player_identity_conflicts() {
    let mut db = start_db().await;
    add(&mut db, "Alice", "Anders", "alice").await;
    let err = db
        .add_player("Alice", "Anders", "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let err = db.add_player("", "Anders", "alice2").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn results_against_unknown_players_fail() {
    let mut db = start_db().await;
    let alice = add(&mut db, "Alice", "Anders", "alice").await;
    let err = db
        .record_match(&ping_pong(alice.id, PlayerId::from(999)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(db.matches(Category::PingPong).await.unwrap().is_empty());
}

#[tokio::test]
async fn foosball_moves_seats_and_teams_and_rolls_back() {
    let mut db = start_db().await;
    let alice = add(&mut db, "Alice", "Anders", "alice").await;
    let bob = add(&mut db, "Bob", "Berg", "bob").await;
    let carol = add(&mut db, "Carol", "Chen", "carol").await;
    let dave = add(&mut db, "Dave", "Diaz", "dave").await;

    let submission = MatchSubmission::TeamVersus {
        category: Category::Foosball,
        winners: Side {
            offense: alice.id,
            defense: bob.id,
        },
        losers: Side {
            offense: carol.id,
            defense: dave.id,
        },
        winner_team: Some("The Crushers".into()),
        loser_team: None,
    };
    db.record_match(&submission).await.unwrap();

    // Both teams were created lazily; the unnamed one gets a derived name.
    let teams = db.teams().await.unwrap();
    assert_eq!(teams.len(), 2);
    let losers = db.team_of(carol.id, dave.id).await.unwrap().unwrap();
    assert_eq!(losers.name, "carol & dave");

    let team_standings = db.standings(Scope::FoosballTeams).await.unwrap();
    assert!(standing(&team_standings, "The Crushers").rank > standing(&team_standings, "carol & dave").rank);

    // Seat ratings moved in their role chains only.
    let offense = db.standings(Scope::FoosballOffense).await.unwrap();
    assert!(standing(&offense, "alice").rank > 0.0);
    assert!(standing(&offense, "carol").rank < 0.0);
    assert!(standing(&offense, "bob").rank.abs() < 0.01);

    db.undo_last_match(Category::Foosball).await.unwrap();

    // Ratings roll back; the teams themselves stay registered.
    assert_eq!(db.teams().await.unwrap().len(), 2);
    let rolled_back = db.standings(Scope::FoosballTeams).await.unwrap();
    assert!(standing(&rolled_back, "The Crushers").rank.abs() < 0.01);
    let team_history = db
        .rating_history(Scope::FoosballTeams, Owner::Team(losers.id))
        .await
        .unwrap();
    assert_eq!(team_history.len(), 1);
    let offense_history = db
        .rating_history(Scope::FoosballOffense, Owner::Player(alice.id))
        .await
        .unwrap();
    assert_eq!(offense_history.len(), 1);
}

#[tokio::test]
async fn editing_keeps_identities_unique() {
    let mut db = start_db().await;
    let alice = add(&mut db, "Alice", "Anders", "alice").await;
    add(&mut db, "Bob", "Berg", "bob").await;

    let renamed = db
        .edit_player(alice.id, "Alice", "Anders", "ace")
        .await
        .unwrap();
    assert_eq!(renamed.nickname, "ace");
    assert_eq!(db.find_player("ace").await.unwrap().id, alice.id);
    assert!(matches!(
        db.find_player("alice").await.unwrap_err(),
        Error::NotFound(_)
    ));

    let err = db
        .edit_player(alice.id, "Bob", "Berg", "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn shape_mismatches_are_rejected() {
    let mut db = start_db().await;
    let alice = add(&mut db, "Alice", "Anders", "alice").await;
    let bob = add(&mut db, "Bob", "Berg", "bob").await;

    let wrong_shape = MatchSubmission::HeadToHead {
        category: Category::Kart,
        winner: alice.id,
        loser: bob.id,
    };
    assert!(matches!(
        db.record_match(&wrong_shape).await.unwrap_err(),
        Error::Validation(_)
    ));

    let same_player = ping_pong(alice.id, alice.id);
    assert!(matches!(
        db.record_match(&same_player).await.unwrap_err(),
        Error::Validation(_)
    ));
}
