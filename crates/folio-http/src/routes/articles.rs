//! `/api/articles`

use super::{pagination, query_flag, PageInfo};
use crate::error::{HttpError, HttpResult};
use crate::extract::AuthUser;
use crate::multipart::{process_upload, FileField, UploadForm, UploadSpec};
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::Router;
use folio_orm::{Article, ArticleChanges, ArticleQuery, NewArticle, Pagination};
use folio_storage::remove_public_files;
use serde::{Deserialize, Serialize};
use tracing::info;

const PUBLIC_PAGE_SIZE: u32 = 10;

const COVER_UPLOAD: UploadSpec = UploadSpec {
    fields: &[FileField {
        name: "cover",
        max_count: 1,
    }],
    max_total: Some(1),
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_articles).post(create_article))
        .route("/admin/list", get(admin_list_articles))
        .route("/:id", get(show_article).put(update_article).delete(delete_article))
        .route("/:id/cover", put(replace_cover))
}

#[derive(Debug, Serialize)]
pub struct ArticleList {
    pub articles: Vec<Article>,
    pub pagination: PageInfo,
}

#[derive(Debug, Serialize)]
pub struct AdminArticleList {
    pub articles: Vec<Article>,
    pub total: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub featured: Option<String>,
    pub search: Option<String>,
}

async fn list_articles(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> HttpResult<ApiResponse<ArticleList>> {
    let query = ArticleQuery {
        pagination: Some(pagination(params.page, params.limit, PUBLIC_PAGE_SIZE)),
        status: Some(true),
        featured: query_flag(params.featured.as_deref()),
        search: None,
    };

    let page = state.db.articles.list(&query).await?;
    Ok(ApiResponse::ok(ArticleList {
        pagination: PageInfo::of(&page),
        articles: page.items,
    }))
}

/// Every article, drafts included; paged only when `page` or `limit` is given
async fn admin_list_articles(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<ListParams>,
) -> HttpResult<ApiResponse<AdminArticleList>> {
    let paged: Option<Pagination> = match (params.page, params.limit) {
        (None, None) => None,
        (page, limit) => Some(pagination(page, limit, PUBLIC_PAGE_SIZE)),
    };
    let query = ArticleQuery {
        pagination: paged,
        status: None,
        featured: None,
        search: params.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
    };

    let page = state.db.articles.list(&query).await?;
    Ok(ApiResponse::ok(AdminArticleList {
        total: page.total,
        articles: page.items,
    }))
}

async fn show_article(State(state): State<AppState>, Path(id): Path<i64>) -> HttpResult<ApiResponse<Article>> {
    let article = state
        .db
        .articles
        .increment_view_count(id)
        .await?
        .ok_or_else(article_not_found)?;
    Ok(ApiResponse::ok(article))
}

async fn create_article(
    State(state): State<AppState>,
    _user: AuthUser,
    multipart: Multipart,
) -> HttpResult<(StatusCode, ApiResponse<Article>)> {
    let state = &state;
    let article = process_upload(state, multipart, COVER_UPLOAD, |form| create_from_form(state, form)).await?;
    Ok(ApiResponse::with_message("Article created", article).created())
}

async fn create_from_form(state: &AppState, form: UploadForm) -> HttpResult<Article> {
    let cover = form
        .first("cover")
        .map(|file| file.url())
        .ok_or_else(|| HttpError::bad_request("Please upload a cover image"))?;

    let new_article = NewArticle {
        title: form.text("title").unwrap_or_default().trim().to_string(),
        cover,
        content: form.text("content").unwrap_or_default().to_string(),
        status: form.flag("status").unwrap_or(true),
        is_featured: form.flag("isFeatured").unwrap_or(false),
    };
    new_article.validate()?;

    let article = state.db.articles.create(new_article).await?;
    form.commit();
    info!(article_id = article.id, "Article created");
    Ok(article)
}

async fn update_article(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> HttpResult<ApiResponse<Article>> {
    let state = &state;
    let article = process_upload(state, multipart, COVER_UPLOAD, |form| update_from_form(state, id, form)).await?;
    Ok(ApiResponse::with_message("Article updated", article))
}

async fn update_from_form(state: &AppState, id: i64, form: UploadForm) -> HttpResult<Article> {
    let existing = state.db.articles.find_by_id(id).await?.ok_or_else(article_not_found)?;

    let changes = ArticleChanges {
        title: form.text("title").map(|t| t.trim().to_string()),
        cover: form.first("cover").map(|file| file.url()),
        content: form.text("content").map(str::to_string),
        status: form.flag("status"),
        is_featured: form.flag("isFeatured"),
    };
    changes.validate()?;
    let replaced_cover = changes.cover.is_some();

    let article = state
        .db
        .articles
        .update(id, changes)
        .await?
        .ok_or_else(article_not_found)?;
    form.commit();
    if replaced_cover {
        remove_public_files(&state.uploads.upload_dir, [existing.cover]).await;
    }

    info!(article_id = id, replaced_cover, "Article updated");
    Ok(article)
}

async fn replace_cover(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> HttpResult<ApiResponse<Article>> {
    let state = &state;
    let article = process_upload(state, multipart, COVER_UPLOAD, |form| cover_from_form(state, id, form)).await?;
    Ok(ApiResponse::with_message("Cover updated", article))
}

async fn cover_from_form(state: &AppState, id: i64, form: UploadForm) -> HttpResult<Article> {
    let cover = form
        .first("cover")
        .map(|file| file.url())
        .ok_or_else(|| HttpError::bad_request("Please upload a cover image"))?;
    let existing = state.db.articles.find_by_id(id).await?.ok_or_else(article_not_found)?;

    let article = state
        .db
        .articles
        .update(id, ArticleChanges::cover(cover))
        .await?
        .ok_or_else(article_not_found)?;
    form.commit();
    remove_public_files(&state.uploads.upload_dir, [existing.cover]).await;

    Ok(article)
}

async fn delete_article(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> HttpResult<ApiResponse<()>> {
    let article = state.db.articles.delete(id).await?.ok_or_else(article_not_found)?;
    remove_public_files(&state.uploads.upload_dir, [article.cover]).await;

    info!(article_id = id, "Article deleted");
    Ok(ApiResponse::message("Article deleted"))
}

fn article_not_found() -> HttpError {
    HttpError::not_found("Article not found")
}
