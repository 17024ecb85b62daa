use anyhow::Context;
use folio_auth::{BcryptHasher, JwtConfig, PasswordHasher};
use folio_core::alerts::install_panic_hook;
use folio_core::{AlertLog, AppConfig, AppConfigTrait};
use folio_http::{ensure_default_admin, init_logging, serve_on, AppState, HttpConfig};
use folio_orm::{Database, DatabaseConfig};
use folio_storage::UploadConfig;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            eprintln!("folio-api: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Loaded and validated configuration of every crate
struct Settings {
    app: AppConfig,
    database: DatabaseConfig,
    jwt: JwtConfig,
    uploads: UploadConfig,
    http: HttpConfig,
}

fn load_settings() -> anyhow::Result<Settings> {
    let app = AppConfig::from_env().context("Invalid application configuration")?;
    app.validate().context("Invalid application configuration")?;
    let database = DatabaseConfig::from_env().context("Invalid database configuration")?;
    database.validate().context("Invalid database configuration")?;
    let jwt = JwtConfig::from_env().context("Invalid JWT configuration")?;
    jwt.validate().context("Invalid JWT configuration")?;
    let uploads = UploadConfig::from_env().context("Invalid upload configuration")?;
    uploads.validate().context("Invalid upload configuration")?;
    let http = HttpConfig::from_env().context("Invalid HTTP configuration")?;
    http.validate().context("Invalid HTTP configuration")?;

    Ok(Settings {
        app,
        database,
        jwt,
        uploads,
        http,
    })
}

async fn run() -> anyhow::Result<ExitCode> {
    let settings = load_settings()?;
    init_logging(&settings.app.logging, settings.app.environment)
        .map_err(|e| anyhow::anyhow!(e))?;

    let alerts = AlertLog::new(settings.app.alert_log_path.clone());
    install_panic_hook(alerts.clone());
    info!(
        name = %settings.app.name,
        environment = %settings.app.environment,
        backend = %settings.database.backend,
        "Starting folio"
    );

    let db = match Database::connect(&settings.database).await {
        Ok(db) => db,
        Err(e) => {
            alerts.alert("database", format!("Initial database connection failed: {}", e));
            return Err(e).context("Failed to connect to the database");
        }
    };
    db.migrate().await.context("Failed to prepare the schema")?;

    let hasher: Arc<dyn PasswordHasher> = Arc::new(BcryptHasher::default());
    ensure_default_admin(&db, hasher.clone(), &settings.http.seed)
        .await
        .context("Failed to seed the default administrator")?;

    settings
        .uploads
        .ensure_upload_dir()
        .await
        .with_context(|| format!("Cannot create {}", settings.uploads.upload_dir.display()))?;

    let addr = format!("{}:{}", settings.app.server.host, settings.app.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let fatal = CancellationToken::new();
    let mut state = AppState::new(
        settings.app,
        settings.http,
        settings.uploads,
        db.clone(),
        &settings.jwt,
        hasher,
        alerts.clone(),
    )?;

    if let Some(monitor) = db.pool_monitor(alerts.clone(), settings.database.monitor.clone()) {
        let monitor = Arc::new(monitor);
        monitor.start(fatal.clone());
        state = state.with_pool_monitor(monitor);
    }
    if state.http.service_monitor.enabled {
        state.service_monitor.start();
    }

    let served = serve_on(listener, state.clone(), fatal.clone()).await;

    state.service_monitor.stop().await;
    if let Some(monitor) = &state.pool_monitor {
        monitor.stop().await;
    }
    db.close().await;
    served?;

    if fatal.is_cancelled() {
        warn!("Stopped after a fatal monitor failure");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
