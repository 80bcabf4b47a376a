use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use cohort_tier_engine::db::{self, PgStore};
use cohort_tier_engine::{logging, report, EngineConfig, TierEngine};

#[derive(Parser)]
#[command(name = "tier-engine")]
#[command(about = "Consistency tiers, streaks and elite weeks for training cohorts", long_about = None)]
struct Cli {
    /// JSON file overriding the default tier rules
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demo cohort with realistic activity
    Seed,
    /// Import activity records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show a member's current tier and promotion outlook
    Tier {
        #[arg(long)]
        email: String,
        #[arg(long)]
        json: bool,
    },
    /// Show a member's weekly streak
    Streak {
        #[arg(long)]
        email: String,
        #[arg(long)]
        json: bool,
    },
    /// Summarize tiers across a cohort
    Cohort {
        #[arg(long)]
        cohort: String,
        #[arg(long)]
        json: bool,
    },
    /// Record this week's elite week result for a cohort
    EliteWeek {
        #[arg(long)]
        cohort: String,
    },
    /// Generate a markdown report for a cohort
    Report {
        #[arg(long)]
        cohort: String,
        #[arg(long, default_value_t = 8)]
        weeks: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

async fn user_id(pool: &PgPool, email: &str) -> anyhow::Result<Uuid> {
    db::find_user_by_email(pool, email)
        .await?
        .with_context(|| format!("no member with email {email}"))
}

async fn cohort_id(pool: &PgPool, name: &str) -> anyhow::Result<Uuid> {
    db::find_cohort_by_name(pool, name)
        .await?
        .with_context(|| format!("no cohort named {name}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    let engine = TierEngine::new(PgStore::new(pool.clone()), config)?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} activities from {}.", csv.display());
        }
        Commands::Tier { email, json } => {
            let status = engine.user_tier_status(user_id(&pool, &email).await?).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
                return Ok(());
            }

            println!(
                "{email}: {} for {} consecutive weeks ({} workouts this week)",
                status.current_tier,
                status.consecutive_weeks_at_tier,
                status.current_week_activity_count
            );
            match (status.next_tier, status.next_tier_progress) {
                (Some(next), Some(progress)) => println!(
                    "Next: {next} ({}/{} weeks at {}+ workouts, {} more needed this week){}",
                    progress.consecutive_weeks,
                    progress.weeks_required,
                    progress.min_weekly_activities,
                    progress.activities_needed_this_week,
                    if status.can_promote {
                        ", ready to promote"
                    } else {
                        ""
                    }
                ),
                _ => println!("Top tier reached."),
            }
        }
        Commands::Streak { email, json } => {
            let streak = engine.user_streak_data(user_id(&pool, &email).await?).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&streak)?);
                return Ok(());
            }

            println!(
                "{email}: current streak {} weeks, longest {} weeks",
                streak.current_streak, streak.longest_streak
            );
            match streak.last_activity_date {
                Some(last) => println!("Last workout {}", last.format("%Y-%m-%d %H:%M UTC")),
                None => println!("No workouts in the last {} weeks.", engine.config().streak_lookback_weeks),
            }
            for week in &streak.weekly_streak_entries {
                println!(
                    "- {} {} workouts, {} min{}",
                    week.week_start,
                    week.activity_count,
                    week.total_duration_minutes,
                    if week.met_goal { " *" } else { "" }
                );
            }
        }
        Commands::Cohort { cohort, json } => {
            let stats = engine.cohort_tier_stats(cohort_id(&pool, &cohort).await?).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }

            let counts = stats.tier_counts;
            println!(
                "{cohort}: elite {}, gold {}, silver {}, bronze {} (average {})",
                counts.elite, counts.gold, counts.silver, counts.bronze, stats.weighted_average_tier
            );
            println!(
                "Elite week: {}/{} needed, {}",
                stats.elite_member_count,
                stats.members_required,
                if stats.elite_week_achieved {
                    "achieved"
                } else {
                    "not yet"
                }
            );
            if !stats.skipped_members.is_empty() {
                println!("Skipped {} members, see logs.", stats.skipped_members.len());
            }
        }
        Commands::EliteWeek { cohort } => {
            let record = engine
                .update_elite_week_status(cohort_id(&pool, &cohort).await?)
                .await?;
            println!(
                "{cohort} week of {}: {}/{} elite, {}",
                record.week_start,
                record.members_completed,
                record.members_required,
                if record.elite_week_achieved {
                    "elite week achieved"
                } else {
                    "not an elite week"
                }
            );
        }
        Commands::Report { cohort, weeks, out } => {
            let id = cohort_id(&pool, &cohort).await?;
            let stats = engine.cohort_tier_stats(id).await?;
            let history = engine.elite_week_history(id, weeks).await?;
            let names = db::fetch_member_names(&pool, id).await?;
            let report = report::build_report(&cohort, &stats, &names, &history);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
