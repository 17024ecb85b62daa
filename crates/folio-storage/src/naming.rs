//! Stored file names and their public URLs

use rand::Rng;
use std::path::Path;

/// URL prefix stored files are served under
pub const PUBLIC_PREFIX: &str = "/uploads/";

/// Build `{millis}-{random}-{stem}{.ext}` with every non-alphanumeric stem
/// character replaced by `_`
pub fn stored_name_with(original: &str, millis: i64, random: u32) -> String {
    let path = Path::new(original);
    let stem: String = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    format!("{}-{}-{}{}", millis, random, stem, extension)
}

pub fn stored_name(original: &str) -> String {
    let random = rand::thread_rng().gen_range(0..1_000_000_000);
    stored_name_with(original, chrono::Utc::now().timestamp_millis(), random)
}

pub fn public_url(stored_name: &str) -> String {
    format!("{}{}", PUBLIC_PREFIX, stored_name)
}

/// Stored file name behind a public URL.
///
/// Accepts `/uploads/<name>` and absolute URLs ending in it. Anything that
/// could escape the upload directory yields `None`.
pub fn file_name_from_url(url: &str) -> Option<&str> {
    let index = url.rfind(PUBLIC_PREFIX)?;
    let name = &url[index + PUBLIC_PREFIX.len()..];
    if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." || name == "." {
        return None;
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_name_format() {
        assert_eq!(
            stored_name_with("my photo (1).PNG", 1_700_000_000_000, 42),
            "1700000000000-42-my_photo__1_.png"
        );
        assert_eq!(stored_name_with("作品.jpg", 1, 2), "1-2-__.jpg");
    }

    #[test]
    fn test_generated_names_differ() {
        assert_ne!(stored_name("a.png"), stored_name("a.png"));
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(file_name_from_url("/uploads/1-2-a.png"), Some("1-2-a.png"));
        assert_eq!(
            file_name_from_url("http://localhost:3000/uploads/1-2-a.png"),
            Some("1-2-a.png")
        );
        assert_eq!(file_name_from_url("/uploads/../secret"), None);
        assert_eq!(file_name_from_url("/images/a.png"), None);
        assert_eq!(file_name_from_url("/uploads/"), None);
    }

    #[test]
    fn test_public_url() {
        assert_eq!(public_url("x.png"), "/uploads/x.png");
    }
}
