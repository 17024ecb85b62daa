use super::{validate_required, validate_title, Pagination};
use crate::error::OrmResult;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub cover: String,
    pub content: String,
    pub status: bool,
    pub view_count: i64,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub cover: String,
    pub content: String,
    pub status: bool,
    pub is_featured: bool,
}

impl NewArticle {
    pub fn validate(&self) -> OrmResult<()> {
        validate_title(&self.title)?;
        validate_required("Cover image", &self.cover)?;
        validate_required("Content", &self.content)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArticleChanges {
    pub title: Option<String>,
    pub cover: Option<String>,
    pub content: Option<String>,
    pub status: Option<bool>,
    pub is_featured: Option<bool>,
}

impl ArticleChanges {
    pub fn cover(cover: impl Into<String>) -> Self {
        Self {
            cover: Some(cover.into()),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> OrmResult<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(cover) = &self.cover {
            validate_required("Cover image", cover)?;
        }
        if let Some(content) = &self.content {
            validate_required("Content", content)?;
        }
        Ok(())
    }

    pub fn apply_to(self, article: &mut Article) {
        if let Some(title) = self.title {
            article.title = title;
        }
        if let Some(cover) = self.cover {
            article.cover = cover;
        }
        if let Some(content) = self.content {
            article.content = content;
        }
        if let Some(status) = self.status {
            article.status = status;
        }
        if let Some(is_featured) = self.is_featured {
            article.is_featured = is_featured;
        }
    }
}

/// Article listing filter. Results are always newest first.
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    /// `None` returns every matching article
    pub pagination: Option<Pagination>,
    pub status: Option<bool>,
    pub featured: Option<bool>,
    /// Case-insensitive match against title or content
    pub search: Option<String>,
}

impl ArticleQuery {
    pub fn matches(&self, article: &Article) -> bool {
        if let Some(status) = self.status {
            if article.status != status {
                return false;
            }
        }
        if let Some(featured) = self.featured {
            if article.is_featured != featured {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !article.title.to_lowercase().contains(&needle)
                && !article.content.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_is_required() {
        let article = NewArticle {
            title: "Design notes".into(),
            cover: "/uploads/cover.webp".into(),
            content: "  ".into(),
            status: true,
            is_featured: false,
        };
        assert!(article.validate().is_err());
    }

    #[test]
    fn test_search_matches_title_or_content() {
        let article = Article {
            id: 1,
            title: "Design notes".into(),
            cover: "/uploads/c.png".into(),
            content: "Working with design tokens".into(),
            status: true,
            view_count: 0,
            is_featured: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let query = ArticleQuery {
            search: Some("TOKENS".into()),
            ..Default::default()
        };
        assert!(query.matches(&article));

        let query = ArticleQuery {
            featured: Some(false),
            ..Default::default()
        };
        assert!(!query.matches(&article));
    }
}
