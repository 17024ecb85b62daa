pub mod admin;
pub mod db;
pub mod images;

use anyhow::Context;
use folio_core::AppConfigTrait;
use folio_orm::{BackendKind, Database, DatabaseConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Open the database described by the environment
pub async fn connect() -> anyhow::Result<Database> {
    let config = DatabaseConfig::from_env().context("Invalid database configuration")?;
    config.validate().context("Invalid database configuration")?;

    if config.backend == BackendKind::Memory {
        println!("⚠️  DATABASE_BACKEND=memory: changes will not outlive this command");
    }
    println!(
        "Connection: {}",
        config.redacted_url().unwrap_or_else(|| "(in-memory)".to_string())
    );

    Database::connect(&config)
        .await
        .context("Failed to connect to the database")
}

/// Ask before a destructive operation
pub async fn confirm(prompt: &str) -> anyhow::Result<bool> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(format!("{} (y/N): ", prompt).as_bytes()).await?;
    stdout.flush().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let answer = lines.next_line().await?.unwrap_or_default().trim().to_lowercase();
    Ok(matches!(answer.as_str(), "y" | "yes"))
}
