use super::{validate_required, validate_title, Pagination, SortOrder};
use crate::error::{OrmError, OrmResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const MAX_STARS: i32 = 5;

/// Gallery image with its display position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    pub order: u32,
}

impl ProductImage {
    pub fn new(url: impl Into<String>, order: u32) -> Self {
        Self {
            url: url.into(),
            order,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub cover: String,
    pub description: Option<String>,
    pub stars: i32,
    pub tags: Vec<String>,
    pub date: NaiveDate,
    pub images: Vec<ProductImage>,
    pub view_count: i64,
    pub status: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Every stored file referenced by this product
    pub fn file_urls(&self) -> Vec<String> {
        std::iter::once(self.cover.clone())
            .chain(self.images.iter().map(|image| image.url.clone()))
            .filter(|url| !url.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub title: String,
    pub cover: String,
    pub description: Option<String>,
    pub stars: i32,
    pub tags: Vec<String>,
    pub date: NaiveDate,
    pub images: Vec<ProductImage>,
    pub status: bool,
    pub featured: bool,
}

impl NewProduct {
    pub fn validate(&self) -> OrmResult<()> {
        validate_title(&self.title)?;
        validate_required("Cover image", &self.cover)?;
        validate_stars(self.stars)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub title: Option<String>,
    pub cover: Option<String>,
    pub description: Option<String>,
    pub stars: Option<i32>,
    pub tags: Option<Vec<String>>,
    pub date: Option<NaiveDate>,
    pub images: Option<Vec<ProductImage>>,
    pub status: Option<bool>,
    pub featured: Option<bool>,
}

impl ProductChanges {
    pub fn images(images: Vec<ProductImage>) -> Self {
        Self {
            images: Some(images),
            ..Default::default()
        }
    }

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
        if let Some(stars) = self.stars {
            validate_stars(stars)?;
        }
        Ok(())
    }

    pub fn apply_to(self, product: &mut Product) {
        if let Some(title) = self.title {
            product.title = title;
        }
        if let Some(cover) = self.cover {
            product.cover = cover;
        }
        if let Some(description) = self.description {
            product.description = Some(description);
        }
        if let Some(stars) = self.stars {
            product.stars = stars;
        }
        if let Some(tags) = self.tags {
            product.tags = tags;
        }
        if let Some(date) = self.date {
            product.date = date;
        }
        if let Some(images) = self.images {
            product.images = images;
        }
        if let Some(status) = self.status {
            product.status = status;
        }
        if let Some(featured) = self.featured {
            product.featured = featured;
        }
    }
}

/// Sortable product columns for the public listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSort {
    #[default]
    Date,
    CreatedAt,
    Stars,
    ViewCount,
    Title,
    Id,
}

impl ProductSort {
    pub fn column(&self) -> &'static str {
        match self {
            ProductSort::Date => "date",
            ProductSort::CreatedAt => "created_at",
            ProductSort::Stars => "stars",
            ProductSort::ViewCount => "view_count",
            ProductSort::Title => "title",
            ProductSort::Id => "id",
        }
    }
}

impl FromStr for ProductSort {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(ProductSort::Date),
            "createdAt" | "created_at" => Ok(ProductSort::CreatedAt),
            "stars" => Ok(ProductSort::Stars),
            "viewCount" | "view_count" => Ok(ProductSort::ViewCount),
            "title" => Ok(ProductSort::Title),
            "id" => Ok(ProductSort::Id),
            _ => Err(OrmError::validation(format!("Cannot sort products by '{}'", s))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProductQuery {
    pub pagination: Pagination,
    pub sort: ProductSort,
    pub order: SortOrder,
    pub status: Option<bool>,
    pub featured: Option<bool>,
    /// Case-insensitive title substring
    pub keyword: Option<String>,
}

impl ProductQuery {
    /// Published products, newest portfolio date first
    pub fn public(pagination: Pagination) -> Self {
        Self {
            pagination,
            sort: ProductSort::Date,
            order: SortOrder::Desc,
            status: Some(true),
            featured: None,
            keyword: None,
        }
    }

    /// Every product, highest id first
    pub fn admin(pagination: Pagination) -> Self {
        Self {
            pagination,
            sort: ProductSort::Id,
            order: SortOrder::Desc,
            status: None,
            featured: None,
            keyword: None,
        }
    }

    pub fn matches(&self, product: &Product) -> bool {
        if let Some(status) = self.status {
            if product.status != status {
                return false;
            }
        }
        if let Some(featured) = self.featured {
            if product.featured != featured {
                return false;
            }
        }
        if let Some(keyword) = &self.keyword {
            if !product.title.to_lowercase().contains(&keyword.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

pub fn validate_stars(stars: i32) -> OrmResult<()> {
    if !(0..=MAX_STARS).contains(&stars) {
        return Err(OrmError::validation(format!("Stars must be between 0 and {}", MAX_STARS)));
    }
    Ok(())
}

/// Tags arrive from multipart forms as a JSON array, a JSON string or plain text.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect(),
        Ok(serde_json::Value::String(single)) if !single.trim().is_empty() => {
            vec![single.trim().to_string()]
        }
        _ => vec![trimmed.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_product() -> Product {
        Product {
            id: 1,
            title: "Finance app redesign".into(),
            cover: "/uploads/cover.png".into(),
            description: None,
            stars: 4,
            tags: vec!["Figma".into()],
            date: NaiveDate::from_ymd_opt(2024, 2, 2).unwrap(),
            images: vec![ProductImage::new("/uploads/a.png", 0)],
            view_count: 0,
            status: true,
            featured: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_tags_accepts_every_form() {
        assert_eq!(parse_tags(r#"["Figma", "Sketch"]"#), vec!["Figma", "Sketch"]);
        assert_eq!(parse_tags(r#""Figma""#), vec!["Figma"]);
        assert_eq!(parse_tags("After Effects"), vec!["After Effects"]);
        assert!(parse_tags("  ").is_empty());
    }

    #[test]
    fn test_new_product_validation() {
        let mut product = NewProduct {
            title: "Title".into(),
            cover: "/uploads/c.png".into(),
            description: None,
            stars: 5,
            tags: vec![],
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            images: vec![],
            status: true,
            featured: false,
        };
        assert!(product.validate().is_ok());

        product.stars = 6;
        assert!(product.validate().is_err());

        product.stars = 3;
        product.cover = String::new();
        assert!(product.validate().is_err());
    }

    #[test]
    fn test_query_matching() {
        let product = sample_product();
        let mut query = ProductQuery::admin(Pagination::new(1, 10));
        query.keyword = Some("APP".into());
        assert!(query.matches(&product));

        query.featured = Some(true);
        assert!(!query.matches(&product));
    }

    #[test]
    fn test_changes_apply() {
        let mut product = sample_product();
        ProductChanges::cover("/uploads/new.png").apply_to(&mut product);
        assert_eq!(product.cover, "/uploads/new.png");
        assert_eq!(product.file_urls(), vec!["/uploads/new.png", "/uploads/a.png"]);
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!("viewCount".parse::<ProductSort>().unwrap().column(), "view_count");
        assert!("password".parse::<ProductSort>().is_err());
    }
}
