//! In-memory backend
//!
//! Used by the router tests and for running the server without PostgreSQL.
//! Enforces the same uniqueness and validation rules as the SQL schema.

use crate::error::{OrmError, OrmResult};
use crate::models::{
    Article, ArticleChanges, ArticleQuery, NewArticle, NewProduct, NewUser, Page, Pagination, Product,
    ProductChanges, ProductQuery, ProductSort, Role, SortOrder, User, UserChanges,
};
use crate::repository::{ArticleRepository, DatabaseBackend, ProductRepository, UserRepository};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    products: BTreeMap<i64, Product>,
    articles: BTreeMap<i64, Article>,
    last_user_id: i64,
    last_product_id: i64,
    last_article_id: i64,
}

impl Tables {
    fn check_unique_user(&self, username: &str, email: &str, except: Option<i64>) -> OrmResult<()> {
        for user in self.users.values().filter(|u| Some(u.id) != except) {
            if user.username == username {
                return Err(OrmError::conflict("Username already exists"));
            }
            if user.email == email {
                return Err(OrmError::conflict("Email already exists"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn compare_products(a: &Product, b: &Product, sort: ProductSort) -> Ordering {
    let primary = match sort {
        ProductSort::Date => a.date.cmp(&b.date),
        ProductSort::CreatedAt => a.created_at.cmp(&b.created_at),
        ProductSort::Stars => a.stars.cmp(&b.stars),
        ProductSort::ViewCount => a.view_count.cmp(&b.view_count),
        ProductSort::Title => a.title.cmp(&b.title),
        ProductSort::Id => Ordering::Equal,
    };
    primary.then(a.id.cmp(&b.id))
}

#[async_trait]
impl UserRepository for MemoryBackend {
    async fn find_by_id(&self, id: i64) -> OrmResult<Option<User>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> OrmResult<Option<User>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list(&self) -> OrmResult<Vec<User>> {
        Ok(self.tables.read().users.values().cloned().collect())
    }

    async fn create(&self, user: NewUser) -> OrmResult<User> {
        user.validate()?;
        let mut tables = self.tables.write();
        tables.check_unique_user(&user.username, &user.email, None)?;

        tables.last_user_id += 1;
        let now = Utc::now();
        let created = User {
            id: tables.last_user_id,
            username: user.username,
            password_hash: user.password_hash,
            email: user.email,
            role: user.role,
            status: user.status,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> OrmResult<Option<User>> {
        changes.validate()?;
        let mut tables = self.tables.write();
        let Some(mut user) = tables.users.get(&id).cloned() else {
            return Ok(None);
        };

        changes.apply_to(&mut user);
        tables.check_unique_user(&user.username, &user.email, Some(id))?;
        user.updated_at = Utc::now();
        tables.users.insert(id, user.clone());
        Ok(Some(user))
    }

    async fn delete(&self, id: i64) -> OrmResult<Option<User>> {
        Ok(self.tables.write().users.remove(&id))
    }

    async fn count_admins(&self) -> OrmResult<u64> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .filter(|u| u.role == Role::Admin)
            .count() as u64)
    }

    async fn delete_all(&self) -> OrmResult<u64> {
        let mut tables = self.tables.write();
        let count = tables.users.len() as u64;
        tables.users.clear();
        Ok(count)
    }
}

#[async_trait]
impl ProductRepository for MemoryBackend {
    async fn find_by_id(&self, id: i64) -> OrmResult<Option<Product>> {
        Ok(self.tables.read().products.get(&id).cloned())
    }

    async fn list(&self, query: &ProductQuery) -> OrmResult<Page<Product>> {
        let mut matching: Vec<Product> = self
            .tables
            .read()
            .products
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let ordering = compare_products(a, b, query.sort);
            match query.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        Ok(Page::from_sorted(matching, query.pagination))
    }

    async fn all(&self) -> OrmResult<Vec<Product>> {
        Ok(self.tables.read().products.values().cloned().collect())
    }

    async fn create(&self, product: NewProduct) -> OrmResult<Product> {
        product.validate()?;
        let mut tables = self.tables.write();
        tables.last_product_id += 1;

        let now = Utc::now();
        let created = Product {
            id: tables.last_product_id,
            title: product.title,
            cover: product.cover,
            description: product.description,
            stars: product.stars,
            tags: product.tags,
            date: product.date,
            images: product.images,
            view_count: 0,
            status: product.status,
            featured: product.featured,
            created_at: now,
            updated_at: now,
        };
        tables.products.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, changes: ProductChanges) -> OrmResult<Option<Product>> {
        changes.validate()?;
        let mut tables = self.tables.write();
        Ok(tables.products.get_mut(&id).map(|product| {
            changes.apply_to(product);
            product.updated_at = Utc::now();
            product.clone()
        }))
    }

    async fn increment_view_count(&self, id: i64) -> OrmResult<Option<Product>> {
        let mut tables = self.tables.write();
        Ok(tables.products.get_mut(&id).map(|product| {
            product.view_count += 1;
            product.clone()
        }))
    }

    async fn delete(&self, id: i64) -> OrmResult<Option<Product>> {
        Ok(self.tables.write().products.remove(&id))
    }

    async fn delete_drafts(&self) -> OrmResult<Vec<Product>> {
        let mut tables = self.tables.write();
        let drafts: Vec<i64> = tables
            .products
            .values()
            .filter(|p| !p.status)
            .map(|p| p.id)
            .collect();
        Ok(drafts
            .into_iter()
            .filter_map(|id| tables.products.remove(&id))
            .collect())
    }

    async fn delete_all(&self) -> OrmResult<u64> {
        let mut tables = self.tables.write();
        let count = tables.products.len() as u64;
        tables.products.clear();
        Ok(count)
    }
}

#[async_trait]
impl ArticleRepository for MemoryBackend {
    async fn find_by_id(&self, id: i64) -> OrmResult<Option<Article>> {
        Ok(self.tables.read().articles.get(&id).cloned())
    }

    async fn list(&self, query: &ArticleQuery) -> OrmResult<Page<Article>> {
        let mut matching: Vec<Article> = self
            .tables
            .read()
            .articles
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let pagination = query
            .pagination
            .unwrap_or_else(|| Pagination::new(1, matching.len() as u32));
        Ok(Page::from_sorted(matching, pagination))
    }

    async fn all(&self) -> OrmResult<Vec<Article>> {
        Ok(self.tables.read().articles.values().cloned().collect())
    }

    async fn create(&self, article: NewArticle) -> OrmResult<Article> {
        article.validate()?;
        let mut tables = self.tables.write();
        tables.last_article_id += 1;

        let now = Utc::now();
        let created = Article {
            id: tables.last_article_id,
            title: article.title,
            cover: article.cover,
            content: article.content,
            status: article.status,
            view_count: 0,
            is_featured: article.is_featured,
            created_at: now,
            updated_at: now,
        };
        tables.articles.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, changes: ArticleChanges) -> OrmResult<Option<Article>> {
        changes.validate()?;
        let mut tables = self.tables.write();
        Ok(tables.articles.get_mut(&id).map(|article| {
            changes.apply_to(article);
            article.updated_at = Utc::now();
            article.clone()
        }))
    }

    async fn increment_view_count(&self, id: i64) -> OrmResult<Option<Article>> {
        let mut tables = self.tables.write();
        Ok(tables.articles.get_mut(&id).map(|article| {
            article.view_count += 1;
            article.clone()
        }))
    }

    async fn delete(&self, id: i64) -> OrmResult<Option<Article>> {
        Ok(self.tables.write().articles.remove(&id))
    }

    async fn delete_drafts(&self) -> OrmResult<Vec<Article>> {
        let mut tables = self.tables.write();
        let drafts: Vec<i64> = tables
            .articles
            .values()
            .filter(|a| !a.status)
            .map(|a| a.id)
            .collect();
        Ok(drafts
            .into_iter()
            .filter_map(|id| tables.articles.remove(&id))
            .collect())
    }

    async fn delete_all(&self) -> OrmResult<u64> {
        let mut tables = self.tables.write();
        let count = tables.articles.len() as u64;
        tables.articles.clear();
        Ok(count)
    }
}

#[async_trait]
impl DatabaseBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> OrmResult<Duration> {
        let start = Instant::now();
        let _ = self.tables.read().users.len();
        Ok(start.elapsed())
    }

    async fn migrate(&self) -> OrmResult<()> {
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductImage;
    use crate::repository::Database;
    use chrono::NaiveDate;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "hash".into(),
            role: Role::Editor,
            status: true,
        }
    }

    fn new_product(title: &str, day: u32, status: bool) -> NewProduct {
        NewProduct {
            title: title.into(),
            cover: format!("/uploads/{}.png", title),
            description: None,
            stars: 3,
            tags: vec![],
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            images: vec![ProductImage::new("/uploads/1.png", 0)],
            status,
            featured: false,
        }
    }

    #[tokio::test]
    async fn test_duplicate_username_and_email_conflict() {
        let db = Database::memory();
        db.users.create(new_user("alice", "alice@example.com")).await.unwrap();

        let err = db.users.create(new_user("alice", "other@example.com")).await.unwrap_err();
        assert_eq!(err.to_string(), "Username already exists");

        let err = db.users.create(new_user("bob", "alice@example.com")).await.unwrap_err();
        assert_eq!(err.to_string(), "Email already exists");
    }

    #[tokio::test]
    async fn test_update_checks_uniqueness_against_other_users() {
        let db = Database::memory();
        let alice = db.users.create(new_user("alice", "alice@example.com")).await.unwrap();
        db.users.create(new_user("bob", "bob@example.com")).await.unwrap();

        let same = UserChanges {
            username: Some("alice".into()),
            ..Default::default()
        };
        assert!(db.users.update(alice.id, same).await.unwrap().is_some());

        let taken = UserChanges {
            email: Some("bob@example.com".into()),
            ..Default::default()
        };
        assert!(matches!(db.users.update(alice.id, taken).await, Err(OrmError::Conflict(_))));
        assert!(db.users.update(99, UserChanges::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_public_listing_filters_sorts_and_paginates() {
        let db = Database::memory();
        db.products.create(new_product("first", 1, true)).await.unwrap();
        db.products.create(new_product("draft", 5, false)).await.unwrap();
        db.products.create(new_product("latest", 9, true)).await.unwrap();
        db.products.create(new_product("middle", 4, true)).await.unwrap();

        let page = db
            .products
            .list(&ProductQuery::public(Pagination::new(1, 2)))
            .await
            .unwrap();
        let titles: Vec<_> = page.items.iter().map(|p| p.title.as_str()).collect();

        assert_eq!(titles, vec!["latest", "middle"]);
        assert_eq!(page.total, 3);
        assert_eq!(page.pages(), 2);
    }

    #[tokio::test]
    async fn test_view_count_and_delete_drafts() {
        let db = Database::memory();
        let product = db.products.create(new_product("one", 1, true)).await.unwrap();
        db.products.create(new_product("two", 2, false)).await.unwrap();

        db.products.increment_view_count(product.id).await.unwrap();
        let viewed = db.products.increment_view_count(product.id).await.unwrap().unwrap();
        assert_eq!(viewed.view_count, 2);

        let drafts = db.products.delete_drafts().await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(db.products.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_article_listing_is_newest_first_with_search() {
        let db = Database::memory();
        for (title, content) in [("Rust notes", "ownership"), ("Design", "grids"), ("Rust again", "traits")] {
            db.articles
                .create(NewArticle {
                    title: title.into(),
                    cover: "/uploads/c.png".into(),
                    content: content.into(),
                    status: true,
                    is_featured: false,
                })
                .await
                .unwrap();
        }

        let query = ArticleQuery {
            search: Some("rust".into()),
            ..Default::default()
        };
        let page = db.articles.list(&query).await.unwrap();
        let titles: Vec<_> = page.items.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Rust again", "Rust notes"]);
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_invalid_payload_is_rejected() {
        let db = Database::memory();
        let mut product = new_product("x", 1, true);
        product.stars = 9;
        assert!(matches!(db.products.create(product).await, Err(OrmError::Validation(_))));
    }

    #[tokio::test]
    async fn test_backend_has_no_pool_monitor() {
        let db = Database::memory();
        assert_eq!(db.backend_name(), "memory");
        assert!(db.ping().await.is_ok());
        assert!(db
            .pool_monitor(folio_core::AlertLog::in_memory(), Default::default())
            .is_none());
    }
}
