//! Timetrack - employee time tracking and payroll estimation

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timetrack::{
    config::Config,
    db::{
        self,
        repositories::{
            SqlxAccountRepository, SqlxHourLimitRepository, SqlxPayRateRepository,
            SqlxSessionRepository, SqlxTimeEntryRepository,
        },
    },
    services::{AccountService, HourLimitService, ReportService, TimeEntryService},
    views::ViewEngine,
    web::{self, AppState, WebSettings},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timetrack=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting timetrack...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    let tz = config.tracking.tz()?;
    tracing::info!("Configuration loaded (time zone {})", tz);

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    pool.ping().await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create repositories
    let account_repo = SqlxAccountRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let entry_repo = SqlxTimeEntryRepository::boxed(pool.clone());
    let rate_repo = SqlxPayRateRepository::boxed(pool.clone());
    let limit_repo = SqlxHourLimitRepository::boxed(pool.clone());

    // Seed hour limits that were never configured
    HourLimitService::new(limit_repo.clone())
        .ensure_defaults(
            config.tracking.default_weekly_hours,
            config.tracking.default_monthly_hours,
        )
        .await?;

    // Initialize services
    let accounts = Arc::new(AccountService::new(
        account_repo.clone(),
        session_repo,
        config.session.lifetime_days,
    ));
    let removed = accounts.cleanup_expired_sessions().await?;
    if removed > 0 {
        tracing::info!("Removed {} expired sessions", removed);
    }

    let entries = Arc::new(TimeEntryService::new(entry_repo.clone(), tz));
    let reports = Arc::new(ReportService::new(entry_repo, account_repo, rate_repo, limit_repo, tz));

    let views = ViewEngine::new(config.templates.override_path.as_deref(), tz)?;
    if let Some(path) = &config.templates.override_path {
        tracing::info!("Template overrides loaded from {}", path.display());
    }

    let state = AppState {
        accounts,
        entries,
        reports,
        views: Arc::new(views),
        settings: Arc::new(WebSettings {
            secure_cookie: config.session.secure_cookie,
            capture_clock_in_description: config.tracking.capture_clock_in_description,
        }),
    };

    let app = web::build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
