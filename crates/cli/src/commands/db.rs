use super::{confirm, connect};
use crate::ClearTarget;
use anyhow::Context;
use folio_core::AppConfigTrait;
use folio_orm::Database;
use folio_storage::{remove_public_files, UploadConfig};

/// Create the schema
pub async fn init_db() -> anyhow::Result<()> {
    let db = connect().await?;
    db.migrate().await.context("Failed to create the schema")?;
    println!("✅ Schema ready ({} backend)", db.backend_name());
    db.close().await;
    Ok(())
}

/// Bulk delete rows and the files they reference
pub async fn clear(target: ClearTarget, yes: bool) -> anyhow::Result<()> {
    let description = match target {
        ClearTarget::Products => "all products",
        ClearTarget::Articles => "all articles",
        ClearTarget::Users => "all users",
        ClearTarget::All => "all products, articles and users",
        ClearTarget::Drafts => "unpublished products and articles",
    };

    if !yes && !confirm(&format!("This permanently deletes {}. Continue?", description)).await? {
        println!("Aborted");
        return Ok(());
    }

    let uploads = UploadConfig::from_env().context("Invalid upload configuration")?;
    let db = connect().await?;
    let report = run_clear(&db, &uploads, target).await?;
    db.close().await;

    println!(
        "✅ Removed {} products, {} articles, {} users ({} files)",
        report.products, report.articles, report.users, report.files
    );
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub products: u64,
    pub articles: u64,
    pub users: u64,
    pub files: usize,
}

pub async fn run_clear(db: &Database, uploads: &UploadConfig, target: ClearTarget) -> anyhow::Result<ClearReport> {
    let mut report = ClearReport::default();
    let mut files: Vec<String> = Vec::new();

    if matches!(target, ClearTarget::Products | ClearTarget::All) {
        let products = db.products.all().await?;
        files.extend(products.iter().flat_map(|p| p.file_urls()));
        report.products = db.products.delete_all().await?;
    }
    if matches!(target, ClearTarget::Articles | ClearTarget::All) {
        let articles = db.articles.all().await?;
        files.extend(articles.into_iter().map(|a| a.cover));
        report.articles = db.articles.delete_all().await?;
    }
    if matches!(target, ClearTarget::Users | ClearTarget::All) {
        report.users = db.users.delete_all().await?;
    }
    if target == ClearTarget::Drafts {
        let products = db.products.delete_drafts().await?;
        let articles = db.articles.delete_drafts().await?;
        report.products = products.len() as u64;
        report.articles = articles.len() as u64;
        files.extend(products.iter().flat_map(|p| p.file_urls()));
        files.extend(articles.into_iter().map(|a| a.cover));
    }

    report.files = files.len();
    remove_public_files(&uploads.upload_dir, &files).await;
    Ok(report)
}
