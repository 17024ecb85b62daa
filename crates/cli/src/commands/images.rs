//! Rewrite stored image URLs that embed an absolute origin

use super::connect;
use folio_orm::{ArticleChanges, Database, ProductChanges, ProductImage};
use folio_storage::{file_name_from_url, public_url};

/// Relative upload URL for `url` when it starts with `from`
pub fn rewrite_url(url: &str, from: &str) -> Option<String> {
    let rest = url.strip_prefix(from)?;
    let path = if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{}", rest)
    };
    let name = file_name_from_url(&path)?;
    let rewritten = public_url(name);
    (rewritten != url).then_some(rewritten)
}

/// Replace absolute upload links inside HTML content
pub fn rewrite_content(content: &str, from: &str) -> Option<String> {
    let needle = format!("{}/uploads/", from);
    content.contains(&needle).then(|| content.replace(&needle, "/uploads/"))
}

fn rewrite_gallery(images: &[ProductImage], from: &str) -> Option<Vec<ProductImage>> {
    let mut changed = false;
    let rewritten = images
        .iter()
        .map(|image| match rewrite_url(&image.url, from) {
            Some(url) => {
                changed = true;
                ProductImage::new(url, image.order)
            }
            None => image.clone(),
        })
        .collect();
    changed.then_some(rewritten)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RewriteReport {
    pub products: usize,
    pub articles: usize,
}

pub async fn rewrite_image_urls(from: &str, dry_run: bool) -> anyhow::Result<()> {
    let from = from.trim_end_matches('/');
    let db = connect().await?;
    let report = run_rewrite(&db, from, dry_run).await?;
    db.close().await;

    let verb = if dry_run { "Would update" } else { "Updated" };
    println!("✅ {} {} products and {} articles", verb, report.products, report.articles);
    Ok(())
}

pub async fn run_rewrite(db: &Database, from: &str, dry_run: bool) -> anyhow::Result<RewriteReport> {
    let mut report = RewriteReport::default();

    for product in db.products.all().await? {
        let changes = ProductChanges {
            cover: rewrite_url(&product.cover, from),
            images: rewrite_gallery(&product.images, from),
            ..Default::default()
        };
        if changes.cover.is_none() && changes.images.is_none() {
            continue;
        }

        println!("  product #{} {}", product.id, product.title);
        report.products += 1;
        if !dry_run {
            db.products.update(product.id, changes).await?;
        }
    }

    for article in db.articles.all().await? {
        let changes = ArticleChanges {
            cover: rewrite_url(&article.cover, from),
            content: rewrite_content(&article.content, from),
            ..Default::default()
        };
        if changes.cover.is_none() && changes.content.is_none() {
            continue;
        }

        println!("  article #{} {}", article.id, article.title);
        report.articles += 1;
        if !dry_run {
            db.articles.update(article.id, changes).await?;
        }
    }

    Ok(report)
}
