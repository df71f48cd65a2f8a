use clap::{Parser, Subcommand};
use itertools::Itertools;
use parlor_core::{
    category::{Category, Scope},
    db::Db,
    matches::{MatchSubmission, Side},
    model::{Owner, PlayerId},
    report::Record,
};
use std::{
    env,
    path::{Path, PathBuf},
};
use tracing_subscriber::EnvFilter;

/// Skill ledger for the office game room.
#[derive(Parser)]
struct Options {
    /// Ledger database path.
    #[clap(short, long, env = "PARLOR_DB")]
    db: Option<PathBuf>,

    /// Emit JSON instead of text.
    #[clap(long, global = true)]
    json: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a player.
    AddPlayer {
        first_name: String,
        last_name: String,
        nickname: String,
    },
    /// Replace a player's names.
    EditPlayer {
        nickname: String,
        new_first_name: String,
        new_last_name: String,
        new_nickname: String,
    },
    /// List registered players.
    Players,
    /// Register a named team of two players (by nickname). Registering the
    /// same pair twice returns the existing team.
    AddTeam { a: String, b: String, name: String },
    /// Rename a team.
    EditTeam { name: String, new_name: String },
    /// List registered teams.
    Teams,
    /// Record a ping-pong result.
    PingPong { winner: String, loser: String },
    /// Record a kart race: 2-4 drivers in finish order.
    Kart {
        /// Course name; each course can be raced only once.
        course: String,
        #[clap(num_args = 2..=4)]
        drivers: Vec<String>,
    },
    /// Record a shooter free-for-all: 2-4 players in finish order.
    Shooter {
        #[clap(long)]
        label: Option<String>,
        #[clap(num_args = 2..=4)]
        players: Vec<String>,
    },
    /// Record a foosball result (offense then defense, winners first).
    Foosball {
        winner_offense: String,
        winner_defense: String,
        loser_offense: String,
        loser_defense: String,
        /// Name for the winning pair's team if it does not exist yet.
        #[clap(long)]
        winner_team: Option<String>,
        #[clap(long)]
        loser_team: Option<String>,
    },
    /// Record a 2v2 result for kart-team, shooter-team or paper.
    Versus {
        category: Category,
        winner_a: String,
        winner_b: String,
        loser_a: String,
        loser_b: String,
        #[clap(long)]
        winner_team: Option<String>,
        #[clap(long)]
        loser_team: Option<String>,
    },
    /// Roll back the latest result of a category.
    Undo { category: Category },
    /// Leaderboard for a rating chain, best conservative rank first.
    Standings { scope: Scope },
    /// Rating trajectory for one participant, newest first.
    History { scope: Scope, name: String },
    /// Recorded results for a category, newest first.
    Results { category: Category },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(true)
        .init();
    let opt = Options::parse();

    let db_path = match opt.db {
        Some(path) => path,
        None => Path::new(&env::var("HOME")?).join(".parlor/ledger.sqlite"),
    };
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    tracing::debug!(?db_path, "opening ledger");
    let mut db = Db::open(&db_path).await?;

    match opt.command {
        Command::AddPlayer {
            first_name,
            last_name,
            nickname,
        } => {
            let player = db.add_player(&first_name, &last_name, &nickname).await?;
            emit(opt.json, &player, |player| {
                format!(
                    "added player {} ({} {})",
                    player.nickname, player.first_name, player.last_name
                )
            })?;
        }
        Command::EditPlayer {
            nickname,
            new_first_name,
            new_last_name,
            new_nickname,
        } => {
            let id = db.find_player(&nickname).await?.id;
            let player = db
                .edit_player(id, &new_first_name, &new_last_name, &new_nickname)
                .await?;
            emit(opt.json, &player, |player| {
                format!("player {nickname} is now {}", player.nickname)
            })?;
        }
        Command::Players => {
            let players = db.players().await?;
            emit(opt.json, &players, |players| {
                players
                    .iter()
                    .map(|player| {
                        format!(
                            "{} ({} {})",
                            player.nickname, player.first_name, player.last_name
                        )
                    })
                    .join("\n")
            })?;
        }
        Command::AddTeam { a, b, name } => {
            let a = db.find_player(&a).await?.id;
            let b = db.find_player(&b).await?.id;
            let team = db.add_team(a, b, &name).await?;
            emit(opt.json, &team, |team| format!("team {} registered", team.name))?;
        }
        Command::EditTeam { name, new_name } => {
            let id = db.find_team(&name).await?.id;
            let team = db.edit_team(id, &new_name).await?;
            emit(opt.json, &team, |team| {
                format!("team {name} is now {}", team.name)
            })?;
        }
        Command::Teams => {
            let teams = db.teams().await?;
            emit(opt.json, &teams, |teams| {
                teams.iter().map(|team| team.name.clone()).join("\n")
            })?;
        }
        Command::PingPong { winner, loser } => {
            let submission = MatchSubmission::HeadToHead {
                category: Category::PingPong,
                winner: db.find_player(&winner).await?.id,
                loser: db.find_player(&loser).await?.id,
            };
            let id = db.record_match(&submission).await?;
            println!("recorded ping-pong result #{id}: {winner} beat {loser}");
        }
        Command::Kart { course, drivers } => {
            let ids = resolve(&mut db, &drivers).await?;
            let submission = MatchSubmission::FreeForAll {
                category: Category::Kart,
                first: ids[0],
                second: ids[1],
                third: ids.get(2).copied(),
                fourth: ids.get(3).copied(),
                label: Some(course.clone()),
            };
            let id = db.record_match(&submission).await?;
            println!("recorded kart race #{id} on {course}");
        }
        Command::Shooter { label, players } => {
            let ids = resolve(&mut db, &players).await?;
            let submission = MatchSubmission::FreeForAll {
                category: Category::Shooter,
                first: ids[0],
                second: ids[1],
                third: ids.get(2).copied(),
                fourth: ids.get(3).copied(),
                label,
            };
            let id = db.record_match(&submission).await?;
            println!("recorded shooter match #{id}");
        }
        Command::Foosball {
            winner_offense,
            winner_defense,
            loser_offense,
            loser_defense,
            winner_team,
            loser_team,
        } => {
            let submission = MatchSubmission::TeamVersus {
                category: Category::Foosball,
                winners: Side {
                    offense: db.find_player(&winner_offense).await?.id,
                    defense: db.find_player(&winner_defense).await?.id,
                },
                losers: Side {
                    offense: db.find_player(&loser_offense).await?.id,
                    defense: db.find_player(&loser_defense).await?.id,
                },
                winner_team,
                loser_team,
            };
            let id = db.record_match(&submission).await?;
            println!("recorded foosball result #{id}");
        }
        Command::Versus {
            category,
            winner_a,
            winner_b,
            loser_a,
            loser_b,
            winner_team,
            loser_team,
        } => {
            let submission = MatchSubmission::TeamVersus {
                category,
                winners: Side {
                    offense: db.find_player(&winner_a).await?.id,
                    defense: db.find_player(&winner_b).await?.id,
                },
                losers: Side {
                    offense: db.find_player(&loser_a).await?.id,
                    defense: db.find_player(&loser_b).await?.id,
                },
                winner_team,
                loser_team,
            };
            let id = db.record_match(&submission).await?;
            println!("recorded {category} result #{id}");
        }
        Command::Undo { category } => {
            db.undo_last_match(category).await?;
            println!("undid the latest {category} result");
        }
        Command::Standings { scope } => {
            let mut standings = db.standings(scope).await?;
            standings.sort_by(|a, b| b.rank.total_cmp(&a.rank));
            emit(opt.json, &standings, |standings| {
                standings
                    .iter()
                    .map(|row| {
                        format!("{:<20} {:>9.4}  {}", row.name, row.rank, describe(&row.record))
                    })
                    .join("\n")
            })?;
        }
        Command::History { scope, name } => {
            let owner = if scope.is_team() {
                Owner::Team(db.find_team(&name).await?.id)
            } else {
                Owner::Player(db.find_player(&name).await?.id)
            };
            let points = db.rating_history(scope, owner).await?;
            emit(opt.json, &points, |points| {
                points
                    .iter()
                    .map(|point| {
                        format!("{}  {:>9.4}", point.at.format("%Y-%m-%d %H:%M:%S"), point.rank)
                    })
                    .join("\n")
            })?;
        }
        Command::Results { category } => {
            let results = db.matches(category).await?;
            emit(opt.json, &results, |results| {
                results
                    .iter()
                    .map(|result| {
                        let label = result
                            .label
                            .as_deref()
                            .map(|label| format!(" [{label}]"))
                            .unwrap_or_default();
                        let seats = result
                            .seats
                            .iter()
                            .map(|seat| format!("{} {}", seat.seat, seat.name))
                            .join(", ");
                        format!(
                            "#{} {}{label}  {seats}",
                            result.id,
                            result.at.format("%Y-%m-%d %H:%M")
                        )
                    })
                    .join("\n")
            })?;
        }
    }
    Ok(())
}

async fn resolve(db: &mut Db, nicknames: &[String]) -> anyhow::Result<Vec<PlayerId>> {
    let mut ids = Vec::with_capacity(nicknames.len());
    for nickname in nicknames {
        ids.push(db.find_player(nickname).await?.id);
    }
    Ok(ids)
}

fn describe(record: &Record) -> String {
    match record {
        Record::WinLoss { wins, losses } => format!("{wins}W {losses}L"),
        Record::Placements { finishes } => finishes
            .iter()
            .zip(["1st", "2nd", "3rd", "4th"])
            .map(|(count, place)| format!("{place}:{count}"))
            .join(" "),
    }
}

fn emit<T: serde::Serialize>(
    json: bool,
    value: &T,
    text: impl FnOnce(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text(value));
    }
    Ok(())
}
