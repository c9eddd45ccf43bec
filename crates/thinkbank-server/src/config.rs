//! Server configuration loaded from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use thinkbank_core::defaults::{
    BACKEND_URL, DATABASE_URL, ENV_BACKEND_URL, ENV_DATABASE_URL, ENV_HOST, ENV_MAX_UPLOAD_BYTES,
    ENV_PORT, ENV_UPLOAD_ROOT, MAX_UPLOAD_BYTES, NORMALIZED_DIR, ORIGINAL_DIR, SERVER_HOST,
    SERVER_PORT, TMP_DIR, UPLOAD_ROOT,
};
use thinkbank_db::LocalFileStorage;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    /// Public base URL; storage locations handed to the inference service
    /// are built from it.
    pub backend_url: String,
    pub upload_root: PathBuf,
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: DATABASE_URL.to_string(),
            backend_url: BACKEND_URL.to_string(),
            upload_root: PathBuf::from(UPLOAD_ROOT),
            host: SERVER_HOST.to_string(),
            port: SERVER_PORT,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DATABASE_URL` | `postgres://localhost/thinkbank` |
    /// | `BACKEND_URL` | `http://localhost:8080` |
    /// | `UPLOAD_ROOT` | `./uploads` |
    /// | `HOST` | `0.0.0.0` |
    /// | `PORT` | `8080` |
    /// | `MAX_UPLOAD_BYTES` | 512 MB |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: std::env::var(ENV_DATABASE_URL).unwrap_or(defaults.database_url),
            backend_url: std::env::var(ENV_BACKEND_URL).unwrap_or(defaults.backend_url),
            upload_root: std::env::var(ENV_UPLOAD_ROOT)
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_root),
            host: std::env::var(ENV_HOST).unwrap_or(defaults.host),
            port: std::env::var(ENV_PORT)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            max_upload_bytes: std::env::var(ENV_MAX_UPLOAD_BYTES)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_upload_bytes),
        }
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    /// The three storage areas, each served under its own route.
    pub fn storage_layout(&self) -> StorageLayout {
        StorageLayout::new(&self.upload_root, Some(&self.backend_url))
    }
}

/// Original, normalized, and temporary storage under one root.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub original: LocalFileStorage,
    pub normalized: LocalFileStorage,
    pub tmp: LocalFileStorage,
}

impl StorageLayout {
    pub fn new(root: &std::path::Path, public_url: Option<&str>) -> Self {
        let area = |dir: &str| {
            let storage = LocalFileStorage::new(root.join(dir), format!("/{}", dir));
            match public_url {
                Some(url) => storage.with_public_url(url),
                None => storage,
            }
        };
        Self {
            original: area(ORIGINAL_DIR),
            normalized: area(NORMALIZED_DIR),
            tmp: area(TMP_DIR),
        }
    }

    /// `(route, directory)` pairs to expose over HTTP.
    pub fn routes(&self) -> [(String, PathBuf); 3] {
        [
            (format!("/{}", ORIGINAL_DIR), self.original.base_dir().to_path_buf()),
            (format!("/{}", NORMALIZED_DIR), self.normalized.base_dir().to_path_buf()),
            (format!("/{}", TMP_DIR), self.tmp.base_dir().to_path_buf()),
        ]
    }

    pub async fn validate(&self) -> thinkbank_core::Result<()> {
        self.original.validate().await?;
        self.normalized.validate().await?;
        self.tmp.validate().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_storage_layout_routes() {
        let layout = StorageLayout::new(std::path::Path::new("/data"), None);
        let routes = layout.routes();
        assert_eq!(routes[0].0, "/original");
        assert_eq!(routes[1].1, PathBuf::from("/data/normalized"));
        assert_eq!(routes[2].0, "/tmp");
    }
}
