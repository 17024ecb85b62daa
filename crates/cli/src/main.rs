mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use commands::*;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Maintenance commands for the folio portfolio CMS")]
#[command(version)]
struct Cli {
    /// Print debug logs
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create tables and indexes
    InitDb,

    /// Create an administrator account
    CreateAdmin {
        #[arg(long)]
        username: String,

        #[arg(long)]
        password: String,

        #[arg(long)]
        email: String,
    },

    /// Delete rows in bulk (and their uploaded files)
    Clear {
        target: ClearTarget,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Turn absolute upload URLs into `/uploads/<file>` paths
    RewriteImageUrls {
        /// Origin the stored URLs start with, e.g. http://localhost:3000
        #[arg(long)]
        from: String,

        /// Report changes without writing them
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClearTarget {
    Products,
    Articles,
    Users,
    All,
    /// Unpublished products and articles
    Drafts,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::InitDb => db::init_db().await?,
        Commands::CreateAdmin {
            username,
            password,
            email,
        } => admin::create_admin(&username, &password, &email).await?,
        Commands::Clear { target, yes } => db::clear(target, yes).await?,
        Commands::RewriteImageUrls { from, dry_run } => images::rewrite_image_urls(&from, dry_run).await?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).compact().try_init();
}
