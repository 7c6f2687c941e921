//! Configuration management for Orderbox Server
//!
//! Built once at process start (see `main.rs`) and passed by reference into
//! each component. Nothing below `main` reads the environment.

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::TransferError;

/// Default number of concurrent fetches per bundle
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 10;

/// Default lifetime of a presigned download URL
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 300;

/// Default upper bound for a single transfer or bundle operation
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 600;

/// Sub-directory of the base directory that receives bundle archives
pub const DOWNLOADS_DIR: &str = "downloads";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub transfer: TransferConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Wasabi,
    Minio,
    R2,
    S3,
    B2,
}

impl StorageProvider {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "minio" => StorageProvider::Minio,
            "r2" => StorageProvider::R2,
            "s3" => StorageProvider::S3,
            "b2" => StorageProvider::B2,
            _ => StorageProvider::Wasabi,
        }
    }

    /// Whether the provider needs path-style bucket addressing
    pub fn force_path_style(&self) -> bool {
        !matches!(self, StorageProvider::S3)
    }
}

/// Settings for verified transfers and bundle assembly
#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    /// Root for local bundle sources and the `downloads/` output directory
    pub base_dir: PathBuf,

    /// Public prefix under which `downloads/` is served by a proxy, if any
    pub public_download_path: Option<String>,

    /// Maximum number of fetches in flight per bundle
    pub concurrency_limit: usize,

    pub signed_url_ttl_secs: u64,

    pub operation_timeout_secs: u64,
}

impl TransferConfig {
    /// Reject settings that can never produce a working transfer
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.concurrency_limit == 0 {
            return Err(TransferError::Configuration(
                "concurrency limit must be at least 1".to_string(),
            ));
        }
        if self.base_dir.as_os_str().is_empty() {
            return Err(TransferError::Configuration(
                "base directory is not set".to_string(),
            ));
        }
        if self.operation_timeout_secs == 0 {
            return Err(TransferError::Configuration(
                "operation timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }

    /// Path of the archive output directory (not created)
    pub fn downloads_path(&self) -> PathBuf {
        self.base_dir.join(DOWNLOADS_DIR)
    }

    /// Ensure the archive output directory exists and return its path
    pub async fn ensure_downloads_dir(&self) -> Result<PathBuf, TransferError> {
        let dir = self.downloads_path();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Map an archive name (`downloads/<file>`) to the path clients should use
    pub fn public_path_for(&self, archive_name: &str, archive_path: &Path) -> String {
        match &self.public_download_path {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), archive_name),
            None => archive_path.to_string_lossy().into_owned(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            base_dir: PathBuf::from("./data"),
            public_download_path: None,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            signed_url_ttl_secs: DEFAULT_SIGNED_URL_TTL_SECS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    /// Endpoint receiving order updates; log-only when unset
    pub order_update_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            storage: StorageConfig {
                provider: StorageProvider::Minio,
                endpoint: "http://localhost:9000".to_string(),
                bucket: "orders".to_string(),
                access_key: "admin".to_string(),
                secret_key: "password123".to_string(),
                region: Some("us-east-1".to_string()),
            },
            transfer: TransferConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let defaults = TransferConfig::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", 5000),
            },
            storage: StorageConfig {
                provider: StorageProvider::parse(
                    &env::var("S3_PROVIDER").unwrap_or_else(|_| "wasabi".to_string()),
                ),
                endpoint: env::var("S3_ENDPOINT")?,
                bucket: env::var("S3_BUCKET")?,
                access_key: env::var("S3_ACCESS_KEY")?,
                secret_key: env::var("S3_SECRET_KEY")?,
                region: env::var("S3_REGION").ok(),
            },
            transfer: TransferConfig {
                base_dir: env::var("DIR_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.base_dir),
                public_download_path: env::var("PROXY_LOCAL_DOWNLOAD_PATH").ok(),
                concurrency_limit: parse_var("BUNDLE_CONCURRENCY", defaults.concurrency_limit),
                signed_url_ttl_secs: parse_var("SIGNED_URL_TTL_SECS", defaults.signed_url_ttl_secs),
                operation_timeout_secs: parse_var(
                    "OPERATION_TIMEOUT_SECS",
                    defaults.operation_timeout_secs,
                ),
            },
            notify: NotifyConfig {
                order_update_url: env::var("ORDER_UPDATE_URL").ok().filter(|u| !u.is_empty()),
            },
        })
    }
}
