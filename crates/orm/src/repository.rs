//! Repository interfaces
//!
//! Routes and the CLI talk to storage only through these traits. A backend
//! implements all three entity repositories plus [`DatabaseBackend`], and
//! [`Database`] bundles them behind trait objects.

use crate::backends::{MemoryBackend, PostgresBackend};
use crate::config::{BackendKind, DatabaseConfig};
use crate::connection::{HealthProbe, PoolHandle, PoolMonitor, PoolMonitorConfig};
use crate::error::OrmResult;
use crate::models::{
    Article, ArticleChanges, ArticleQuery, NewArticle, NewProduct, NewUser, Page, Product, ProductChanges,
    ProductQuery, User, UserChanges,
};
use async_trait::async_trait;
use folio_core::AlertLog;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> OrmResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> OrmResult<Option<User>>;

    /// All users, oldest first
    async fn list(&self) -> OrmResult<Vec<User>>;

    /// Fails with a conflict when the username or email is taken
    async fn create(&self, user: NewUser) -> OrmResult<User>;

    /// `Ok(None)` when no user has this id
    async fn update(&self, id: i64, changes: UserChanges) -> OrmResult<Option<User>>;

    /// Returns the removed user
    async fn delete(&self, id: i64) -> OrmResult<Option<User>>;

    async fn count_admins(&self) -> OrmResult<u64>;

    async fn delete_all(&self) -> OrmResult<u64>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> OrmResult<Option<Product>>;

    async fn list(&self, query: &ProductQuery) -> OrmResult<Page<Product>>;

    /// Every product, ordered by id
    async fn all(&self) -> OrmResult<Vec<Product>>;

    async fn create(&self, product: NewProduct) -> OrmResult<Product>;

    async fn update(&self, id: i64, changes: ProductChanges) -> OrmResult<Option<Product>>;

    /// Bump the view counter and return the updated row
    async fn increment_view_count(&self, id: i64) -> OrmResult<Option<Product>>;

    async fn delete(&self, id: i64) -> OrmResult<Option<Product>>;

    /// Remove unpublished products, returning them so their files can be removed
    async fn delete_drafts(&self) -> OrmResult<Vec<Product>>;

    async fn delete_all(&self) -> OrmResult<u64>;
}

#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> OrmResult<Option<Article>>;

    /// Matching articles, newest first
    async fn list(&self, query: &ArticleQuery) -> OrmResult<Page<Article>>;

    async fn all(&self) -> OrmResult<Vec<Article>>;

    async fn create(&self, article: NewArticle) -> OrmResult<Article>;

    async fn update(&self, id: i64, changes: ArticleChanges) -> OrmResult<Option<Article>>;

    async fn increment_view_count(&self, id: i64) -> OrmResult<Option<Article>>;

    async fn delete(&self, id: i64) -> OrmResult<Option<Article>>;

    async fn delete_drafts(&self) -> OrmResult<Vec<Article>>;

    async fn delete_all(&self) -> OrmResult<u64>;
}

/// Lifecycle operations shared by every storage backend
#[async_trait]
pub trait DatabaseBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Round-trip to the store
    async fn ping(&self) -> OrmResult<Duration>;

    /// Pool handle and probe for the pool monitor, if the backend has a pool
    fn monitor_handles(&self) -> Option<(Arc<dyn PoolHandle>, Arc<dyn HealthProbe>)> {
        None
    }

    /// Create tables and indexes if they do not exist
    async fn migrate(&self) -> OrmResult<()>;

    async fn close(&self);
}

/// Repositories bundled for the application state
#[derive(Clone)]
pub struct Database {
    pub users: Arc<dyn UserRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub articles: Arc<dyn ArticleRepository>,
    backend: Arc<dyn DatabaseBackend>,
}

impl Database {
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: UserRepository + ProductRepository + ArticleRepository + DatabaseBackend + 'static,
    {
        Self {
            users: backend.clone(),
            products: backend.clone(),
            articles: backend.clone(),
            backend,
        }
    }

    /// Fresh in-memory store
    pub fn memory() -> Self {
        Self::from_backend(Arc::new(MemoryBackend::new()))
    }

    /// Open the configured backend
    pub async fn connect(config: &DatabaseConfig) -> OrmResult<Self> {
        match config.backend {
            BackendKind::Memory => {
                tracing::warn!("Using the in-memory backend; data is lost on restart");
                Ok(Self::memory())
            }
            BackendKind::Postgres => {
                let backend = PostgresBackend::connect(config).await?;
                Ok(Self::from_backend(Arc::new(backend)))
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn ping(&self) -> OrmResult<Duration> {
        self.backend.ping().await
    }

    pub async fn migrate(&self) -> OrmResult<()> {
        self.backend.migrate().await
    }

    pub async fn close(&self) {
        self.backend.close().await
    }

    /// Pool monitor for backends that own a connection pool
    pub fn pool_monitor(&self, alerts: AlertLog, config: PoolMonitorConfig) -> Option<PoolMonitor> {
        let (pool, probe) = self.backend.monitor_handles()?;
        Some(PoolMonitor::new(pool, probe, alerts, config))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("backend", &self.backend.name())
            .finish()
    }
}
