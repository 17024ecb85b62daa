//! Gallery ordering.
//!
//! Uploaded images are ordered by the first number in their original file
//! name (`img3.png` before `img10.png`), then alphabetically. Orders are
//! positional and start at 0.

use crate::{StorageError, StorageResult};
use folio_orm::ProductImage;
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;

/// An uploaded image before it has an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub url: String,
    pub original_name: String,
}

impl UploadedImage {
    pub fn new(url: impl Into<String>, original_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            original_name: original_name.into(),
        }
    }
}

/// `{index, order}` entry of an explicit order request
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct OrderEntry {
    pub index: usize,
    pub order: u32,
}

/// First run of ASCII digits in the name.
///
/// Runs too long for a `u64` count as unnumbered.
pub fn order_token(name: &str) -> Option<u64> {
    let start = name.find(|c: char| c.is_ascii_digit())?;
    let digits: &str = &name[start..];
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse().ok()
}

fn compare_uploads(a: &UploadedImage, b: &UploadedImage) -> Ordering {
    match (order_token(&a.original_name), order_token(&b.original_name)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.original_name.cmp(&b.original_name)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.original_name.cmp(&b.original_name),
    }
}

pub fn sort_uploads(uploads: &mut [UploadedImage]) {
    uploads.sort_by(compare_uploads);
}

/// Sort and number uploads from `start`
fn number_uploads(mut uploads: Vec<UploadedImage>, start: u32) -> Vec<ProductImage> {
    sort_uploads(&mut uploads);
    uploads
        .into_iter()
        .enumerate()
        .map(|(i, upload)| ProductImage::new(upload.url, start + i as u32))
        .collect()
}

/// A fresh gallery, ordered from 0
pub fn gallery_from_uploads(uploads: Vec<UploadedImage>) -> Vec<ProductImage> {
    number_uploads(uploads, 0)
}

/// Append uploads after the highest existing order; existing entries are
/// left untouched.
pub fn append_uploads(existing: &[ProductImage], uploads: Vec<UploadedImage>) -> Vec<ProductImage> {
    let start = existing.iter().map(|image| image.order + 1).max().unwrap_or(0);
    let mut images = existing.to_vec();
    images.extend(number_uploads(uploads, start));
    images
}

/// Rebuild a gallery from a client-supplied list of URLs or `{url, ...}`
/// objects, numbered by position. Entries without a usable URL are skipped.
pub fn reorder_from_json(images: &Value) -> StorageResult<Vec<ProductImage>> {
    let entries = images
        .as_array()
        .ok_or_else(|| StorageError::validation("Images must be an array"))?;

    let urls: Vec<&str> = entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(url) => Some(url.as_str()),
            Value::Object(fields) => fields.get("url").and_then(Value::as_str),
            _ => None,
        })
        .filter(|url| !url.trim().is_empty())
        .collect();

    if urls.is_empty() {
        return Err(StorageError::validation("No valid images in the new order"));
    }

    Ok(urls
        .into_iter()
        .enumerate()
        .map(|(i, url)| ProductImage::new(url, i as u32))
        .collect())
}

/// Give the images at the listed indices their requested order; the rest
/// keep theirs. The result is sorted by order, stable for equal orders.
/// Each index may appear at most once.
pub fn apply_explicit_order(images: &[ProductImage], entries: &[OrderEntry]) -> StorageResult<Vec<ProductImage>> {
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if entry.index >= images.len() {
            return Err(StorageError::validation(format!(
                "Image index {} is out of range (gallery has {} images)",
                entry.index,
                images.len()
            )));
        }
        if !seen.insert(entry.index) {
            return Err(StorageError::validation(format!(
                "Image index {} is listed more than once",
                entry.index
            )));
        }
    }

    let mut updated = images.to_vec();
    for entry in entries {
        updated[entry.index].order = entry.order;
    }
    updated.sort_by_key(|image| image.order);
    Ok(updated)
}

/// Remove the image with `order` and renumber the rest from 0.
///
/// Returns the remaining gallery and the removed image, or `None` when no
/// image has that order.
pub fn remove_by_order(images: &[ProductImage], order: u32) -> Option<(Vec<ProductImage>, ProductImage)> {
    let position = images.iter().position(|image| image.order == order)?;
    let mut remaining = images.to_vec();
    let removed = remaining.remove(position);
    remaining.sort_by_key(|image| image.order);
    for (i, image) in remaining.iter_mut().enumerate() {
        image.order = i as u32;
    }
    Some((remaining, removed))
}
