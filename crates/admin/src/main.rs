use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use firstblood::{ReconcileReport, UnitOfWork, reconcile};
use storage::models::{
    AccountFlags, AccountMode, AccountId, BonusSchedule, ChallengeId, ChallengeState,
    NewChallenge, SolveId,
};
use storage::{Database, LedgerStore, PgLedger};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "firstblood-admin")]
#[command(about = "Maintains first blood bonus awards", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Whether solves belong to users or teams
    #[arg(long, env = "ACCOUNT_MODE", default_value = "users")]
    account_mode: AccountMode,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create a first blood challenge
    CreateChallenge {
        name: String,

        /// Comma separated bonuses by rank, e.g. `30,20,,10`
        #[arg(long)]
        bonus: Option<BonusSchedule>,

        #[arg(long, default_value = "visible")]
        state: ChallengeState,

        #[arg(long)]
        category: Option<String>,
    },
    /// Create a user (or a team in team mode)
    AddAccount {
        name: String,

        #[arg(long)]
        team: Option<i32>,
    },
    /// Rebuild awards from the current solves
    Reconcile {
        #[command(flatten)]
        target: ReconcileTarget,
    },
    /// Report awards that drifted from a rebuild, without writing anything
    Audit,
    SetBonus {
        challenge: ChallengeId,
        schedule: BonusSchedule,
    },
    SetState {
        challenge: ChallengeId,
        state: ChallengeState,
    },
    SetFlags {
        account: AccountId,

        #[arg(long)]
        hidden: bool,

        #[arg(long)]
        banned: bool,
    },
    RecordSolve {
        challenge: ChallengeId,
        account: AccountId,
    },
    RevokeSolve {
        solve: SolveId,
    },
    /// Remove every solve of an account, or the account itself with --delete
    PurgeAccount {
        account: AccountId,

        #[arg(long)]
        delete: bool,
    },
    DeleteChallenge {
        challenge: ChallengeId,
    },
    ListAwards {
        challenge: ChallengeId,

        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
#[group(required = true, multiple = false)]
struct ReconcileTarget {
    #[arg(short, long)]
    challenge: Option<ChallengeId>,

    #[arg(short, long)]
    all: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "firstblood_admin={},firstblood={},storage={}",
                    log_level, log_level, log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = Database::new(&cli.database_url)
        .await
        .context("Failed to connect to database")?;
    let mode = cli.account_mode;

    match cli.command {
        Commands::Migrate => {
            db.run_migrations().await.context("Failed to run migrations")?;
            tracing::info!("Migrations applied");
        }
        Commands::CreateChallenge {
            name,
            bonus,
            state,
            category,
        } => {
            let mut req = NewChallenge::first_blood(name, bonus.unwrap_or_default()).with_state(state);
            if let Some(category) = category {
                req.category = category;
            }
            let mut ledger = db.begin(mode).await?;
            let challenge = ledger.challenges().create(&req).await?;
            ledger.commit().await?;
            println!(
                "Created challenge {} ({}) with bonuses {}",
                challenge.challenge_id, challenge.name, challenge.bonus_schedule
            );
        }
        Commands::AddAccount { name, team } => {
            let mut ledger = db.begin(mode).await?;
            let account_id = match mode {
                AccountMode::Users => ledger.accounts().create_user(&name, team).await?.user_id,
                AccountMode::Teams => ledger.accounts().create_team(&name).await?.team_id,
            };
            ledger.commit().await?;
            println!("Created {} account {} ({})", mode, account_id, name);
        }
        Commands::Reconcile { target } => {
            let mut uow = UnitOfWork::new(db.begin(mode).await?);
            match target.challenge {
                Some(challenge_id) => uow.challenge_edited(challenge_id),
                None => uow.solves_bulk_deleted(),
            }
            let report = uow.commit().await?;
            print_report(&report);
        }
        Commands::Audit => audit(&db, mode).await?,
        Commands::SetBonus {
            challenge,
            schedule,
        } => {
            let mut uow = UnitOfWork::new(db.begin(mode).await?);
            uow.store()
                .challenges()
                .update_bonus_schedule(challenge, &schedule)
                .await?;
            uow.challenge_edited(challenge);
            let report = uow.commit().await?;
            tracing::info!(challenge_id = challenge, %schedule, "Bonus schedule updated");
            print_report(&report);
        }
        Commands::SetState { challenge, state } => {
            let mut uow = UnitOfWork::new(db.begin(mode).await?);
            uow.store().challenges().update_state(challenge, state).await?;
            uow.challenge_edited(challenge);
            let report = uow.commit().await?;
            tracing::info!(challenge_id = challenge, %state, "Challenge state updated");
            print_report(&report);
        }
        Commands::SetFlags {
            account,
            hidden,
            banned,
        } => {
            let flags = AccountFlags { hidden, banned };
            let mut uow = UnitOfWork::new(db.begin(mode).await?);
            let before = uow.store().accounts().set_flags(mode, account, flags).await?;
            uow.account_flags_changed(account, before, flags).await?;
            let report = uow.commit().await?;
            tracing::info!(account_id = account, hidden, banned, "Account flags updated");
            print_report(&report);
        }
        Commands::RecordSolve { challenge, account } => {
            let mut uow = UnitOfWork::new(db.begin(mode).await?);
            let solve = uow.store().record_solve(challenge, account).await?;
            let award = uow.solve_recorded(&solve).await?;
            uow.commit().await?;
            match award {
                Some(award) => println!(
                    "Solve {} recorded: {} (+{})",
                    solve.solve_id, award.name, award.value
                ),
                None => println!("Solve {} recorded without bonus", solve.solve_id),
            }
        }
        Commands::RevokeSolve { solve } => {
            let mut uow = UnitOfWork::new(db.begin(mode).await?);
            let solve = uow.solve(solve).await?;
            uow.solve_deleted(&solve).await?;
            uow.store().solves().delete(solve.solve_id).await?;
            let report = uow.commit().await?;
            tracing::info!(solve_id = solve.solve_id, "Solve revoked");
            print_report(&report);
        }
        Commands::PurgeAccount { account, delete } => {
            let mut uow = UnitOfWork::new(db.begin(mode).await?);
            if delete {
                uow.account_deleting(account).await?;
                uow.store().accounts().delete(mode, account).await?;
            } else {
                let removed = uow.store().solves().delete_by_account(account).await?;
                tracing::info!(account_id = account, removed, "Solves removed");
                uow.solves_bulk_deleted();
            }
            let report = uow.commit().await?;
            print_report(&report);
        }
        Commands::DeleteChallenge { challenge } => {
            let mut uow = UnitOfWork::new(db.begin(mode).await?);
            uow.store().challenges().delete(challenge).await?;
            uow.challenge_edited(challenge);
            uow.commit().await?;
            tracing::info!(challenge_id = challenge, "Challenge deleted");
        }
        Commands::ListAwards { challenge, json } => {
            let mut ledger = db.begin(mode).await?;
            let awards = ledger.list_awards_by_challenge(challenge).await?;
            ledger.rollback().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&awards)?);
            } else if awards.is_empty() {
                println!("No awards for challenge {}", challenge);
            } else {
                for award in awards {
                    println!(
                        "#{:<3} {:>6}  account {:<6} solve {:<8} {}",
                        award.rank, award.value, award.account_id, award.solve_id, award.name
                    );
                }
            }
        }
    }

    Ok(())
}

/// Reconciles every first blood challenge inside a transaction that is
/// rolled back, so only the drift gets reported.
async fn audit(db: &Database, mode: AccountMode) -> Result<()> {
    let mut ledger: PgLedger = db.begin(mode).await?;
    let mut total = ReconcileReport::default();
    let mut drifted = 0;

    for challenge_id in ledger.list_first_blood_challenge_ids().await? {
        let report = reconcile(&mut ledger, challenge_id).await?;
        if !report.is_noop() {
            drifted += 1;
            println!(
                "Challenge {}: {} to insert, {} to update, {} to delete",
                challenge_id, report.inserted, report.updated, report.deleted
            );
        }
        total += report;
    }
    ledger.rollback().await?;

    if drifted == 0 {
        println!("All awards match their solves");
    } else {
        tracing::warn!(challenges = drifted, changes = total.changes(), "Award drift found");
    }
    Ok(())
}

fn print_report(report: &ReconcileReport) {
    println!(
        "Awards: {} inserted, {} updated, {} deleted, {} unchanged",
        report.inserted, report.updated, report.deleted, report.unchanged
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        let mut argv = vec!["firstblood-admin", "--database-url", "postgres://localhost/ctf"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv)
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_win_over_environment() {
        let cli = parse(&["--account-mode", "teams", "audit"]).unwrap();

        assert_eq!(cli.database_url, "postgres://localhost/ctf");
        assert_eq!(cli.account_mode, AccountMode::Teams);
    }

    #[test]
    fn test_reconcile_needs_exactly_one_target() {
        assert!(parse(&["reconcile"]).is_err());
        assert!(parse(&["reconcile", "--challenge", "7", "--all"]).is_err());

        let cli = parse(&["reconcile", "--challenge", "7"]).unwrap();
        match cli.command {
            Commands::Reconcile { target } => {
                assert_eq!(target.challenge, Some(7));
                assert!(!target.all);
            }
            _ => panic!("expected reconcile"),
        }
    }

    #[test]
    fn test_set_bonus_parses_schedule_list() {
        let cli = parse(&["set-bonus", "3", "30,20,,10,"]).unwrap();
        match cli.command {
            Commands::SetBonus {
                challenge,
                schedule,
            } => {
                assert_eq!(challenge, 3);
                assert_eq!(schedule.entries(), &[Some(30), Some(20), None, Some(10)]);
            }
            _ => panic!("expected set-bonus"),
        }

        assert!(parse(&["set-bonus", "3", "30,lots"]).is_err());
    }
}
