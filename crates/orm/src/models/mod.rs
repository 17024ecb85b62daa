//! Entity models, their write payloads and validation rules.

pub mod article;
pub mod product;
pub mod user;

pub use article::*;
pub use product::*;
pub use user::*;

use crate::error::{OrmError, OrmResult};
use serde::Serialize;
use std::str::FromStr;

/// Title limit shared by products and articles
pub const MAX_TITLE_LENGTH: usize = 200;

/// Page/limit pair, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

/// One page of results plus the unpaginated total
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn pages(&self) -> u64 {
        if self.limit == 0 {
            0
        } else {
            self.total.div_ceil(self.limit as u64)
        }
    }

    /// Slice an already filtered and sorted list
    pub fn from_sorted(all: Vec<T>, pagination: Pagination) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.limit as usize)
            .collect();

        Self {
            items,
            total,
            page: pagination.page,
            limit: pagination.limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ASC" => Ok(SortOrder::Asc),
            "DESC" => Ok(SortOrder::Desc),
            _ => Err(OrmError::validation(format!("Invalid sort order '{}'", s))),
        }
    }
}

pub(crate) fn validate_title(title: &str) -> OrmResult<()> {
    let length = title.trim().chars().count();
    if length == 0 {
        return Err(OrmError::validation("Title is required"));
    }
    if length > MAX_TITLE_LENGTH {
        return Err(OrmError::validation(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}

pub(crate) fn validate_required(field: &str, value: &str) -> OrmResult<()> {
    if value.trim().is_empty() {
        return Err(OrmError::validation(format!("{} is required", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_math() {
        let page = Page::from_sorted((1..=25).collect::<Vec<_>>(), Pagination::new(3, 10));
        assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.total, 25);
        assert_eq!(page.pages(), 3);
    }

    #[test]
    fn test_pagination_clamps_to_one() {
        let pagination = Pagination::new(0, 0);
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.limit, 1);
        assert_eq!(pagination.offset(), 0);
    }

    #[test]
    fn test_title_validation() {
        assert!(validate_title("Portfolio").is_ok());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(201)).is_err());
        assert!(validate_title(&"界".repeat(200)).is_ok());
    }

    #[test]
    fn test_sort_order_parsing() {
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!("sideways".parse::<SortOrder>().is_err());
    }
}
