//! Upload configuration

use folio_core::config::env::{get_env_or_default, get_env_parsed};
use folio_core::{AppConfigTrait, ConfigError, ConfigSource};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;
pub const DEFAULT_MAX_FILES: usize = 10;
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory stored files are written to and served from
    pub upload_dir: PathBuf,
    pub max_file_size: u64,
    /// Files per request
    pub max_files: usize,
    /// Upload requests allowed in flight
    pub max_concurrent: usize,
    /// Wall-clock limit for receiving and handling one upload request
    pub processing_timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_files: DEFAULT_MAX_FILES,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            processing_timeout: Duration::from_secs(30),
        }
    }
}

impl UploadConfig {
    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    /// Create the upload directory if it does not exist
    pub async fn ensure_upload_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await
    }
}

impl AppConfigTrait for UploadConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_ms = get_env_parsed("FILE_PROCESSING_TIMEOUT_MS", 30_000u64, "milliseconds")?;

        Ok(UploadConfig {
            upload_dir: PathBuf::from(get_env_or_default("UPLOAD_PATH", "./uploads")),
            max_file_size: get_env_parsed("MAX_FILE_SIZE", DEFAULT_MAX_FILE_SIZE, "size in bytes")?,
            max_files: get_env_parsed("MAX_FILES", DEFAULT_MAX_FILES, "positive integer")?,
            max_concurrent: get_env_parsed("MAX_CONCURRENT_UPLOADS", DEFAULT_MAX_CONCURRENT, "positive integer")?,
            processing_timeout: Duration::from_millis(timeout_ms),
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_file_size == 0 {
            return Err(ConfigError::validation_failed("MAX_FILE_SIZE", "must be greater than zero"));
        }
        if self.max_files == 0 {
            return Err(ConfigError::validation_failed("MAX_FILES", "must be greater than zero"));
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::validation_failed(
                "MAX_CONCURRENT_UPLOADS",
                "must be greater than zero",
            ));
        }
        if self.processing_timeout.is_zero() {
            return Err(ConfigError::validation_failed(
                "FILE_PROCESSING_TIMEOUT_MS",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();
        sources.insert("upload_dir".to_string(), ConfigSource::env_or_default("UPLOAD_PATH", "./uploads"));
        sources.insert(
            "max_file_size".to_string(),
            ConfigSource::env_or_default("MAX_FILE_SIZE", DEFAULT_MAX_FILE_SIZE.to_string()),
        );
        sources.insert("max_files".to_string(), ConfigSource::env_or_default("MAX_FILES", "10"));
        sources.insert(
            "max_concurrent".to_string(),
            ConfigSource::env_or_default("MAX_CONCURRENT_UPLOADS", "5"),
        );
        sources.insert(
            "processing_timeout".to_string(),
            ConfigSource::env_or_default("FILE_PROCESSING_TIMEOUT_MS", "30000"),
        );
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        env::set_var("UPLOAD_PATH", "/tmp/folio-uploads");
        env::set_var("MAX_CONCURRENT_UPLOADS", "2");
        env::set_var("FILE_PROCESSING_TIMEOUT_MS", "1500");

        let config = UploadConfig::from_env().unwrap();
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/folio-uploads"));
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.processing_timeout, Duration::from_millis(1500));
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);

        for var in ["UPLOAD_PATH", "MAX_CONCURRENT_UPLOADS", "FILE_PROCESSING_TIMEOUT_MS"] {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_zero_limits_fail_validation() {
        let config = UploadConfig {
            max_concurrent: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(UploadConfig::default().validate().is_ok());
    }
}
