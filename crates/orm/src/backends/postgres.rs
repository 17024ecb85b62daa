//! PostgreSQL Backend Implementation
//!
//! Repositories over a sqlx `PgPool`. Filters and pagination are assembled
//! with `QueryBuilder`; sort columns come from a fixed whitelist.

use super::schema;
use crate::config::DatabaseConfig;
use crate::connection::{HealthProbe, PoolHandle, SqlxPoolHandle};
use crate::error::{OrmError, OrmResult};
use crate::models::{
    Article, ArticleChanges, ArticleQuery, NewArticle, NewProduct, NewUser, Page, Product, ProductChanges,
    ProductImage, ProductQuery, Role, User, UserChanges,
};
use crate::repository::{ArticleRepository, DatabaseBackend, ProductRepository, UserRepository};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password: String,
    email: String,
    role: String,
    status: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = OrmError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password,
            email: row.email,
            role: Role::from_str(&row.role)?,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    title: String,
    cover: String,
    description: Option<String>,
    stars: i32,
    tags: Json<Vec<String>>,
    date: NaiveDate,
    images: Json<Vec<ProductImage>>,
    view_count: i64,
    status: bool,
    featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            title: row.title,
            cover: row.cover,
            description: row.description,
            stars: row.stars,
            tags: row.tags.0,
            date: row.date,
            images: row.images.0,
            view_count: row.view_count,
            status: row.status,
            featured: row.featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ArticleRow {
    id: i64,
    title: String,
    cover: String,
    content: String,
    status: bool,
    view_count: i64,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: row.id,
            title: row.title,
            cover: row.cover,
            content: row.content,
            status: row.status,
            view_count: row.view_count,
            is_featured: row.is_featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Escape `%`, `_` and `\` for use inside an ILIKE pattern
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_product_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
    builder.push(" WHERE TRUE");
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(featured) = query.featured {
        builder.push(" AND featured = ").push_bind(featured);
    }
    if let Some(keyword) = &query.keyword {
        builder.push(" AND title ILIKE ").push_bind(like_pattern(keyword));
    }
}

fn push_article_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ArticleQuery) {
    builder.push(" WHERE TRUE");
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(featured) = query.featured {
        builder.push(" AND is_featured = ").push_bind(featured);
    }
    if let Some(search) = &query.search {
        let pattern = like_pattern(search);
        builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR content ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// PostgreSQL database backend
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    pool: PgPool,
    handle: Arc<SqlxPoolHandle>,
}

impl PostgresBackend {
    pub async fn connect(config: &DatabaseConfig) -> OrmResult<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| OrmError::Configuration("DATABASE_URL is not set".to_string()))?;

        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect(url)
            .await
            .map_err(|e| OrmError::Connection(format!("Failed to create PostgreSQL pool: {}", e)))?;

        tracing::info!(
            url = config.redacted_url().unwrap_or_default(),
            min = config.min_connections,
            max = config.max_connections,
            "Connected to PostgreSQL"
        );

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            handle: Arc::new(SqlxPoolHandle::new(pool.clone())),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DatabaseBackend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> OrmResult<Duration> {
        let start = Instant::now();
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(start.elapsed())
    }

    fn monitor_handles(&self) -> Option<(Arc<dyn PoolHandle>, Arc<dyn HealthProbe>)> {
        let pool: Arc<dyn PoolHandle> = self.handle.clone();
        let probe: Arc<dyn HealthProbe> = self.handle.clone();
        Some((pool, probe))
    }

    async fn migrate(&self) -> OrmResult<()> {
        for statement in schema::STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Database schema is up to date ({} statements)", schema::STATEMENTS.len());
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
    }
}

#[async_trait]
impl UserRepository for PostgresBackend {
    async fn find_by_id(&self, id: i64) -> OrmResult<Option<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_username(&self, username: &str) -> OrmResult<Option<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn list(&self) -> OrmResult<Vec<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn create(&self, user: NewUser) -> OrmResult<User> {
        user.validate()?;
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (username, password, email, role, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.status)
        .fetch_one(&self.pool)
        .await?;

        User::try_from(row)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> OrmResult<Option<User>> {
        changes.validate()?;
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let mut user = User::try_from(row)?;
        changes.apply_to(&mut user);

        let row = sqlx::query_as::<_, UserRow>(
            "UPDATE users SET username = $1, password = $2, email = $3, role = $4, status = $5, \
             updated_at = NOW() WHERE id = $6 RETURNING *",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.status)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        User::try_from(row).map(Some)
    }

    async fn delete(&self, id: i64) -> OrmResult<Option<User>> {
        sqlx::query_as::<_, UserRow>("DELETE FROM users WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn count_admins(&self) -> OrmResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn delete_all(&self) -> OrmResult<u64> {
        let result = sqlx::query("DELETE FROM users").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ProductRepository for PostgresBackend {
    async fn find_by_id(&self, id: i64) -> OrmResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Product::from))
    }

    async fn list(&self, query: &ProductQuery) -> OrmResult<Page<Product>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_product_filters(&mut count, query);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let direction = query.order.as_sql();
        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM products");
        push_product_filters(&mut select, query);
        select.push(format!(
            " ORDER BY {} {}, id {}",
            query.sort.column(),
            direction,
            direction
        ));
        select
            .push(" LIMIT ")
            .push_bind(query.pagination.limit as i64)
            .push(" OFFSET ")
            .push_bind(query.pagination.offset() as i64);

        let rows = select.build_query_as::<ProductRow>().fetch_all(&self.pool).await?;

        Ok(Page {
            items: rows.into_iter().map(Product::from).collect(),
            total: total as u64,
            page: query.pagination.page,
            limit: query.pagination.limit,
        })
    }

    async fn all(&self) -> OrmResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>("SELECT * FROM products ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn create(&self, product: NewProduct) -> OrmResult<Product> {
        product.validate()?;
        let row = sqlx::query_as::<_, ProductRow>(
            "INSERT INTO products (title, cover, description, stars, tags, date, images, status, featured) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
        )
        .bind(&product.title)
        .bind(&product.cover)
        .bind(&product.description)
        .bind(product.stars)
        .bind(Json(&product.tags))
        .bind(product.date)
        .bind(Json(&product.images))
        .bind(product.status)
        .bind(product.featured)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn update(&self, id: i64, changes: ProductChanges) -> OrmResult<Option<Product>> {
        changes.validate()?;
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let mut product = Product::from(row);
        changes.apply_to(&mut product);

        let row = sqlx::query_as::<_, ProductRow>(
            "UPDATE products SET title = $1, cover = $2, description = $3, stars = $4, tags = $5, \
             date = $6, images = $7, status = $8, featured = $9, updated_at = NOW() \
             WHERE id = $10 RETURNING *",
        )
        .bind(&product.title)
        .bind(&product.cover)
        .bind(&product.description)
        .bind(product.stars)
        .bind(Json(&product.tags))
        .bind(product.date)
        .bind(Json(&product.images))
        .bind(product.status)
        .bind(product.featured)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row.into()))
    }

    async fn increment_view_count(&self, id: i64) -> OrmResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "UPDATE products SET view_count = view_count + 1 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Product::from))
    }

    async fn delete(&self, id: i64) -> OrmResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>("DELETE FROM products WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Product::from))
    }

    async fn delete_drafts(&self) -> OrmResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>("DELETE FROM products WHERE status = FALSE RETURNING *")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn delete_all(&self) -> OrmResult<u64> {
        let result = sqlx::query("DELETE FROM products").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ArticleRepository for PostgresBackend {
    async fn find_by_id(&self, id: i64) -> OrmResult<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>("SELECT * FROM articles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Article::from))
    }

    async fn list(&self, query: &ArticleQuery) -> OrmResult<Page<Article>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM articles");
        push_article_filters(&mut count, query);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM articles");
        push_article_filters(&mut select, query);
        select.push(" ORDER BY created_at DESC, id DESC");
        if let Some(pagination) = query.pagination {
            select
                .push(" LIMIT ")
                .push_bind(pagination.limit as i64)
                .push(" OFFSET ")
                .push_bind(pagination.offset() as i64);
        }

        let rows = select.build_query_as::<ArticleRow>().fetch_all(&self.pool).await?;
        let (page, limit) = match query.pagination {
            Some(p) => (p.page, p.limit),
            None => (1, (total.max(1)) as u32),
        };

        Ok(Page {
            items: rows.into_iter().map(Article::from).collect(),
            total: total as u64,
            page,
            limit,
        })
    }

    async fn all(&self) -> OrmResult<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>("SELECT * FROM articles ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Article::from).collect())
    }

    async fn create(&self, article: NewArticle) -> OrmResult<Article> {
        article.validate()?;
        let row = sqlx::query_as::<_, ArticleRow>(
            "INSERT INTO articles (title, cover, content, status, is_featured) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(&article.title)
        .bind(&article.cover)
        .bind(&article.content)
        .bind(article.status)
        .bind(article.is_featured)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn update(&self, id: i64, changes: ArticleChanges) -> OrmResult<Option<Article>> {
        changes.validate()?;
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query_as::<_, ArticleRow>("SELECT * FROM articles WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let mut article = Article::from(row);
        changes.apply_to(&mut article);

        let row = sqlx::query_as::<_, ArticleRow>(
            "UPDATE articles SET title = $1, cover = $2, content = $3, status = $4, is_featured = $5, \
             updated_at = NOW() WHERE id = $6 RETURNING *",
        )
        .bind(&article.title)
        .bind(&article.cover)
        .bind(&article.content)
        .bind(article.status)
        .bind(article.is_featured)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row.into()))
    }

    async fn increment_view_count(&self, id: i64) -> OrmResult<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>(
            "UPDATE articles SET view_count = view_count + 1 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Article::from))
    }

    async fn delete(&self, id: i64) -> OrmResult<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>("DELETE FROM articles WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Article::from))
    }

    async fn delete_drafts(&self) -> OrmResult<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>("DELETE FROM articles WHERE status = FALSE RETURNING *")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Article::from).collect())
    }

    async fn delete_all(&self) -> OrmResult<u64> {
        let result = sqlx::query("DELETE FROM articles").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
