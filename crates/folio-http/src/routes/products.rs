//! `/api/products`: portfolio items and their image galleries

use super::{pagination, query_flag, PageInfo};
use crate::error::{HttpError, HttpResult};
use crate::extract::{AuthUser, JsonBody};
use crate::multipart::{process_upload, FileField, UploadForm, UploadSpec};
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Router;
use chrono::{NaiveDate, Utc};
use folio_orm::{parse_tags, NewProduct, Product, ProductChanges, ProductQuery, ProductSort, SortOrder};
use folio_storage::{
    append_uploads, apply_explicit_order, gallery_from_uploads, remove_by_order, remove_public_files,
    reorder_from_json, OrderEntry,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

const PUBLIC_PAGE_SIZE: u32 = 12;
const ADMIN_PAGE_SIZE: u32 = 10;
pub const MAX_GALLERY_UPLOADS: usize = 20;

const PRODUCT_UPLOAD: UploadSpec = UploadSpec {
    fields: &[
        FileField {
            name: "cover",
            max_count: 1,
        },
        FileField {
            name: "images",
            max_count: MAX_GALLERY_UPLOADS,
        },
    ],
    max_total: Some(1 + MAX_GALLERY_UPLOADS),
};

const COVER_UPLOAD: UploadSpec = UploadSpec {
    fields: &[FileField {
        name: "cover",
        max_count: 1,
    }],
    max_total: Some(1),
};

const GALLERY_UPLOAD: UploadSpec = UploadSpec {
    fields: &[FileField {
        name: "images",
        max_count: MAX_GALLERY_UPLOADS,
    }],
    max_total: Some(MAX_GALLERY_UPLOADS),
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/admin/list", get(admin_list_products))
        .route("/:id", get(show_product).put(update_product).delete(delete_product))
        .route("/:id/cover", put(replace_cover))
        .route("/:id/images", post(append_images))
        .route("/:id/images/reorder", put(reorder_images))
        .route("/:id/images/order", put(set_image_order))
        .route("/:id/images/:order", axum::routing::delete(delete_image))
}

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
    pub pagination: PageInfo,
}

#[derive(Debug, Default, Deserialize)]
pub struct PublicListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub featured: Option<String>,
}

async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<PublicListParams>,
) -> HttpResult<ApiResponse<ProductList>> {
    let mut query = ProductQuery::public(pagination(params.page, params.limit, PUBLIC_PAGE_SIZE));
    if let Some(sort) = params.sort.as_deref().filter(|s| !s.is_empty()) {
        query.sort = sort.parse::<ProductSort>()?;
    }
    if let Some(order) = params.order.as_deref().filter(|s| !s.is_empty()) {
        query.order = order.parse::<SortOrder>()?;
    }
    query.featured = query_flag(params.featured.as_deref());

    let page = state.db.products.list(&query).await?;
    Ok(ApiResponse::ok(ProductList {
        pagination: PageInfo::of(&page),
        products: page.items,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub keyword: Option<String>,
    pub status: Option<String>,
}

async fn admin_list_products(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<AdminListParams>,
) -> HttpResult<ApiResponse<ProductList>> {
    let mut query = ProductQuery::admin(pagination(params.page, params.limit, ADMIN_PAGE_SIZE));
    query.keyword = params.keyword.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
    query.status = query_flag(params.status.as_deref().filter(|s| !s.is_empty()));

    let page = state.db.products.list(&query).await?;
    Ok(ApiResponse::ok(ProductList {
        pagination: PageInfo::of(&page),
        products: page.items,
    }))
}

async fn show_product(State(state): State<AppState>, Path(id): Path<i64>) -> HttpResult<ApiResponse<Product>> {
    let product = state
        .db
        .products
        .increment_view_count(id)
        .await?
        .ok_or_else(product_not_found)?;
    Ok(ApiResponse::ok(product))
}

async fn create_product(
    State(state): State<AppState>,
    _user: AuthUser,
    multipart: Multipart,
) -> HttpResult<(StatusCode, ApiResponse<Product>)> {
    let state = &state;
    let product = process_upload(state, multipart, PRODUCT_UPLOAD, |form| create_from_form(state, form)).await?;
    Ok(ApiResponse::with_message("Product created", product).created())
}

async fn create_from_form(state: &AppState, form: UploadForm) -> HttpResult<Product> {
    let cover = form
        .first("cover")
        .map(|file| file.url())
        .ok_or_else(|| HttpError::bad_request("Please upload a cover image"))?;

    let new_product = NewProduct {
        title: form.text("title").unwrap_or_default().trim().to_string(),
        cover,
        description: form.text("description").map(str::to_string),
        stars: form.text("stars").map(parse_stars).transpose()?.unwrap_or(0),
        tags: form.text("tags").map(parse_tags).unwrap_or_default(),
        date: form
            .text("date")
            .map(parse_date)
            .transpose()?
            .unwrap_or_else(|| Utc::now().date_naive()),
        images: gallery_from_uploads(form.images("images")),
        status: form.flag("status").unwrap_or(true),
        featured: form.flag("featured").unwrap_or(false),
    };
    new_product.validate()?;

    let product = state.db.products.create(new_product).await?;
    form.commit();
    info!(product_id = product.id, images = product.images.len(), "Product created");
    Ok(product)
}

async fn update_product(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> HttpResult<ApiResponse<Product>> {
    let state = &state;
    let product = process_upload(state, multipart, PRODUCT_UPLOAD, |form| update_from_form(state, id, form)).await?;
    Ok(ApiResponse::with_message("Product updated", product))
}

async fn update_from_form(state: &AppState, id: i64, form: UploadForm) -> HttpResult<Product> {
    let existing = state.db.products.find_by_id(id).await?.ok_or_else(product_not_found)?;

    let uploaded_images = form.images("images");
    let mut changes = ProductChanges {
        title: form.text("title").map(|t| t.trim().to_string()),
        cover: form.first("cover").map(|file| file.url()),
        description: form.text("description").map(str::to_string),
        stars: form.text("stars").map(parse_stars).transpose()?,
        tags: form.text("tags").map(parse_tags),
        date: form.text("date").map(parse_date).transpose()?,
        images: None,
        status: form.flag("status"),
        featured: form.flag("featured"),
    };
    if !uploaded_images.is_empty() {
        changes.images = Some(gallery_from_uploads(uploaded_images));
    }
    changes.validate()?;

    let mut stale = Vec::new();
    if changes.cover.is_some() {
        stale.push(existing.cover.clone());
    }
    if changes.images.is_some() {
        stale.extend(existing.images.iter().map(|image| image.url.clone()));
    }

    let product = state
        .db
        .products
        .update(id, changes)
        .await?
        .ok_or_else(product_not_found)?;
    form.commit();
    remove_public_files(&state.uploads.upload_dir, &stale).await;

    info!(product_id = id, removed_files = stale.len(), "Product updated");
    Ok(product)
}

async fn replace_cover(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> HttpResult<ApiResponse<Product>> {
    let state = &state;
    let product = process_upload(state, multipart, COVER_UPLOAD, |form| cover_from_form(state, id, form)).await?;
    Ok(ApiResponse::with_message("Cover updated", product))
}

async fn cover_from_form(state: &AppState, id: i64, form: UploadForm) -> HttpResult<Product> {
    let cover = form
        .first("cover")
        .map(|file| file.url())
        .ok_or_else(|| HttpError::bad_request("Please upload a cover image"))?;
    let existing = state.db.products.find_by_id(id).await?.ok_or_else(product_not_found)?;

    let product = state
        .db
        .products
        .update(id, ProductChanges::cover(cover))
        .await?
        .ok_or_else(product_not_found)?;
    form.commit();
    remove_public_files(&state.uploads.upload_dir, [existing.cover]).await;

    Ok(product)
}

async fn append_images(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> HttpResult<ApiResponse<Product>> {
    let state = &state;
    let product = process_upload(state, multipart, GALLERY_UPLOAD, |form| append_from_form(state, id, form)).await?;
    Ok(ApiResponse::with_message("Images added", product))
}

async fn append_from_form(state: &AppState, id: i64, form: UploadForm) -> HttpResult<Product> {
    let uploads = form.images("images");
    if uploads.is_empty() {
        return Err(HttpError::bad_request("Please upload at least one image"));
    }
    let existing = state.db.products.find_by_id(id).await?.ok_or_else(product_not_found)?;

    let added = uploads.len();
    let images = append_uploads(&existing.images, uploads);
    let product = state
        .db
        .products
        .update(id, ProductChanges::images(images))
        .await?
        .ok_or_else(product_not_found)?;
    form.commit();

    info!(product_id = id, added, total = product.images.len(), "Gallery images appended");
    Ok(product)
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    #[serde(default)]
    pub images: Value,
}

async fn reorder_images(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<ReorderRequest>,
) -> HttpResult<ApiResponse<Product>> {
    state.db.products.find_by_id(id).await?.ok_or_else(product_not_found)?;
    let images = reorder_from_json(&body.images)?;

    let product = state
        .db
        .products
        .update(id, ProductChanges::images(images))
        .await?
        .ok_or_else(product_not_found)?;
    Ok(ApiResponse::with_message("Image order updated", product))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOrderRequest {
    pub image_order: Vec<OrderEntry>,
}

async fn set_image_order(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<ImageOrderRequest>,
) -> HttpResult<ApiResponse<Product>> {
    let existing = state.db.products.find_by_id(id).await?.ok_or_else(product_not_found)?;
    let images = apply_explicit_order(&existing.images, &body.image_order)?;

    let product = state
        .db
        .products
        .update(id, ProductChanges::images(images))
        .await?
        .ok_or_else(product_not_found)?;
    Ok(ApiResponse::with_message("Image order updated", product))
}

async fn delete_image(
    State(state): State<AppState>,
    _user: AuthUser,
    Path((id, order)): Path<(i64, u32)>,
) -> HttpResult<ApiResponse<Product>> {
    let existing = state.db.products.find_by_id(id).await?.ok_or_else(product_not_found)?;
    let (images, removed) = remove_by_order(&existing.images, order)
        .ok_or_else(|| HttpError::not_found(format!("No image with order {}", order)))?;

    let product = state
        .db
        .products
        .update(id, ProductChanges::images(images))
        .await?
        .ok_or_else(product_not_found)?;
    remove_public_files(&state.uploads.upload_dir, [removed.url]).await;

    Ok(ApiResponse::with_message("Image deleted", product))
}

async fn delete_product(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> HttpResult<ApiResponse<()>> {
    let product = state.db.products.delete(id).await?.ok_or_else(product_not_found)?;
    let files = product.file_urls();
    remove_public_files(&state.uploads.upload_dir, &files).await;

    info!(product_id = id, removed_files = files.len(), "Product deleted");
    Ok(ApiResponse::message("Product deleted"))
}

fn product_not_found() -> HttpError {
    HttpError::not_found("Product not found")
}

fn parse_stars(raw: &str) -> HttpResult<i32> {
    raw.trim()
        .parse()
        .map_err(|_| HttpError::bad_request(format!("Invalid stars value '{}'", raw)))
}

/// Accepts `YYYY-MM-DD` or anything starting with it, e.g. an ISO timestamp
fn parse_date(raw: &str) -> HttpResult<NaiveDate> {
    let trimmed = raw.trim();
    let day = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| HttpError::bad_request(format!("Invalid date '{}'", raw)))
}
