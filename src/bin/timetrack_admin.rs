//! timetrack-admin - account, pay rate and hour limit administration
//!
//! Works directly on the configured database, so it can be used before the
//! first staff account exists.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timetrack::{
    config::Config,
    db::{
        self,
        repositories::{
            SqlxAccountRepository, SqlxHourLimitRepository, SqlxPayRateRepository,
            SqlxSessionRepository, SqlxTimeEntryRepository,
        },
        DynDatabasePool,
    },
    models::{CreateAccountInput, Period},
    services::{
        AccountService, HourLimitService, PayRateService, ReportService, TimeEntryService,
    },
};

#[derive(Parser)]
#[command(
    name = "timetrack-admin",
    version = env!("CARGO_PKG_VERSION"),
    about = "Administer timetrack accounts, pay rates and hour limits"
)]
struct Cli {
    /// Configuration file shared with the server
    #[arg(global = true, long, default_value = "config.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run pending migrations and seed default hour limits
    Migrate,

    /// Create a staff account
    CreateStaff {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Grant or revoke staff access
    SetStaff {
        #[arg(long)]
        username: String,
        /// Remove staff access instead of granting it
        #[arg(long)]
        revoke: bool,
    },

    /// Activate or deactivate an account
    SetActive {
        #[arg(long)]
        username: String,
        /// Deactivate instead of activating
        #[arg(long)]
        deactivate: bool,
    },

    /// Set an account's hourly rate
    SetRate {
        #[arg(long)]
        username: String,
        #[arg(long)]
        rate: f64,
    },

    /// List pay rates
    Rates,

    /// Set the limit for a period (weekly or monthly)
    SetLimit {
        #[arg(long)]
        period: Period,
        #[arg(long)]
        hours: f64,
    },

    /// List hour limits with current usage
    Limits,

    /// List time entries, newest first
    Entries {
        /// Only entries of this account
        #[arg(long)]
        username: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timetrack=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load_with_env(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;

    run(cli.command, &config, pool).await
}

async fn run(command: Command, config: &Config, pool: DynDatabasePool) -> Result<()> {
    let tz = config.tracking.tz()?;
    let account_repo = SqlxAccountRepository::boxed(pool.clone());
    let entry_repo = SqlxTimeEntryRepository::boxed(pool.clone());
    let rate_repo = SqlxPayRateRepository::boxed(pool.clone());
    let limit_repo = SqlxHourLimitRepository::boxed(pool.clone());

    let accounts = AccountService::new(
        account_repo.clone(),
        SqlxSessionRepository::boxed(pool.clone()),
        config.session.lifetime_days,
    );
    let rates = PayRateService::new(rate_repo.clone(), account_repo.clone());
    let limits = HourLimitService::new(limit_repo.clone());

    match command {
        Command::Migrate => {
            let created = limits
                .ensure_defaults(
                    config.tracking.default_weekly_hours,
                    config.tracking.default_monthly_hours,
                )
                .await?;
            println!("Database is up to date ({} hour limits seeded)", created);
        }
        Command::CreateStaff { username, email, password } => {
            let account = accounts
                .create_account(CreateAccountInput {
                    username,
                    email,
                    password,
                    is_staff: true,
                })
                .await?;
            println!("Created staff account '{}' (id {})", account.username, account.id);
        }
        Command::SetStaff { username, revoke } => {
            let account = accounts.set_staff(&username, !revoke).await?;
            println!("{}: staff = {}", account.username, account.is_staff);
        }
        Command::SetActive { username, deactivate } => {
            let account = accounts.set_active(&username, !deactivate).await?;
            println!("{}: active = {}", account.username, account.is_active);
        }
        Command::SetRate { username, rate } => {
            let rate = rates.set_rate(&username, rate).await?;
            println!("{}: {:.2}/h", username, rate.hourly_rate);
        }
        Command::Rates => {
            let list = rates.list().await?;
            if list.is_empty() {
                println!("No pay rates set");
            }
            for row in list {
                println!("{:<20} {:>12.2}/h", row.username, row.rate.hourly_rate);
            }
        }
        Command::SetLimit { period, hours } => {
            let limit = limits.set_limit(period, hours).await?;
            println!("{}: {:.2} hours", limit.period, limit.max_hours);
        }
        Command::Limits => {
            let reports = ReportService::new(entry_repo, account_repo, rate_repo, limit_repo, tz);
            for usage in reports.limit_usage(Utc::now()).await? {
                match usage.max_hours {
                    Some(max) => println!(
                        "{:<8} {:>8.2} / {:.2} hours ({:.1}%)",
                        usage.period.as_str(), usage.hours, max, usage.usage_percent
                    ),
                    None => println!("{:<8} {:>8.2} hours (no limit)", usage.period.as_str(), usage.hours),
                }
            }
        }
        Command::Entries { username, limit } => {
            let user_id = match username {
                Some(name) => Some(accounts.get_by_username(&name).await?.id),
                None => None,
            };
            let entries = TimeEntryService::new(entry_repo, tz);
            let now = Utc::now();
            for row in entries.list_recent(user_id, limit).await? {
                let clock_out = row
                    .entry
                    .clock_out
                    .map(|t| t.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "(open)".to_string());
                println!(
                    "#{:<6} {:<20} {} -> {:<16} {:>6.2}h {}",
                    row.entry.id,
                    row.username,
                    row.entry.clock_in.with_timezone(&tz).format("%Y-%m-%d %H:%M"),
                    clock_out,
                    row.entry.hours(now),
                    row.entry.description
                );
            }
        }
    }

    Ok(())
}
