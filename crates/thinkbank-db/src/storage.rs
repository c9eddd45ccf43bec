//! Directory-backed implementation of [`StorageService`].
//!
//! Files live under `{base_dir}/{sub_path}/{name}`. When a public URL is
//! configured, returned locations are `{public_url}{route}/{sub_path}/{name}`
//! so downstream consumers (the inference service) can fetch them over HTTP;
//! otherwise the filesystem path is returned.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use thinkbank_core::{Error, FileEntry, Result, StorageService};

/// Local filesystem storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    base_dir: PathBuf,
    route: String,
    public_url: Option<String>,
}

impl LocalFileStorage {
    /// Create storage rooted at `base_dir`, exposed under `route` (e.g. `/original`).
    pub fn new(base_dir: impl Into<PathBuf>, route: impl Into<String>) -> Self {
        let route = route.into();
        let route = if route.is_empty() || route.starts_with('/') {
            route
        } else {
            format!("/{}", route)
        };
        Self {
            base_dir: base_dir.into(),
            route: route.trim_end_matches('/').to_string(),
            public_url: None,
        }
    }

    /// Return `{public_url}{route}/...` locations instead of filesystem paths.
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.public_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let relative = relative.trim_matches('/');
        let rel = Path::new(relative);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::InvalidInput(format!(
                "storage path must be relative without '..': {}",
                relative
            )));
        }
        Ok(self.base_dir.join(rel))
    }

    fn location(&self, relative: &str) -> String {
        let relative = relative.trim_matches('/');
        match &self.public_url {
            Some(url) => format!("{}{}/{}", url, self.route, relative),
            None => self.base_dir.join(relative).display().to_string(),
        }
    }

    /// Check that the directory is writable, failing fast at startup.
    pub async fn validate(&self) -> Result<()> {
        let marker = self.base_dir.join(".health-check");
        fs::create_dir_all(&self.base_dir).await?;
        fs::write(&marker, b"storage-health-check").await?;
        fs::remove_file(&marker).await?;
        Ok(())
    }
}

fn join_relative(sub_path: &str, name: &str) -> String {
    let sub_path = sub_path.trim_matches('/');
    if sub_path.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", sub_path, name)
    }
}

async fn write_then_rename(temp_path: &Path, full_path: &Path, data: &[u8]) -> Result<()> {
    let mut file = fs::File::create(temp_path).await.map_err(|e| {
        warn!(temp_path = %temp_path.display(), error = %e, "storage: File::create failed");
        Error::Storage(format!("create {}: {}", temp_path.display(), e))
    })?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(temp_path, full_path).await.map_err(|e| {
        warn!(from = %temp_path.display(), to = %full_path.display(), error = %e, "storage: rename failed");
        Error::Storage(format!("rename to {}: {}", full_path.display(), e))
    })
}

#[async_trait]
impl StorageService for LocalFileStorage {
    async fn put(&self, name: &str, data: &[u8], sub_path: &str) -> Result<String> {
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(Error::InvalidInput(format!("invalid file name: {:?}", name)));
        }
        let relative = join_relative(sub_path, name);
        let full_path = self.resolve(&relative)?;
        debug!(
            subsystem = "storage",
            path = %full_path.display(),
            bytes = data.len(),
            "storage: put"
        );

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "storage: create_dir_all failed");
                Error::Storage(format!("create {}: {}", parent.display(), e))
            })?;
        }

        // Atomic write: temp file + rename. The temp file never outlives a
        // failed put.
        let temp_path = full_path.with_file_name(format!(".{}.tmp", name));
        if let Err(e) = write_then_rename(&temp_path, &full_path, data).await {
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(temp_path = %temp_path.display(), error = %cleanup, "storage: temp cleanup failed");
                }
            }
            return Err(e);
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(self.location(&relative))
    }

    async fn get(&self, sub_path: &str) -> Result<String> {
        let full_path = self.resolve(sub_path)?;
        if !fs::try_exists(&full_path).await? {
            return Err(Error::NotFound(format!("file not found: {}", sub_path)));
        }
        Ok(self.location(sub_path))
    }

    async fn delete(&self, sub_path: &str) -> Result<()> {
        let full_path = self.resolve(sub_path)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, sub_path: &str) -> Result<Vec<FileEntry>> {
        let dir = self.resolve(sub_path)?;
        let mut reader = match fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') && name.ends_with(".tmp") {
                continue;
            }
            let meta = entry.metadata().await?;
            let modified: DateTime<Utc> = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            entries.push(FileEntry {
                name,
                is_dir: meta.is_dir(),
                modified,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_normalized() {
        let s = LocalFileStorage::new("/tmp/x", "original/").with_public_url("http://h:8080/");
        assert_eq!(s.location("2025/01/02/1.jpg"), "http://h:8080/original/2025/01/02/1.jpg");
    }

    #[test]
    fn test_location_without_public_url_is_filesystem_path() {
        let s = LocalFileStorage::new("/data/normalized", "/normalized");
        assert_eq!(s.location("a/b.jpg"), "/data/normalized/a/b.jpg");
    }

    #[test]
    fn test_resolve_rejects_parent_components() {
        let s = LocalFileStorage::new("/data", "/x");
        assert!(s.resolve("../etc/passwd").is_err());
        assert!(s.resolve("2025/../../x").is_err());
        assert!(s.resolve("2025/01/02").is_ok());
    }

    #[test]
    fn test_join_relative() {
        assert_eq!(join_relative("", "a.jpg"), "a.jpg");
        assert_eq!(join_relative("/2025/01/02/", "a.jpg"), "2025/01/02/a.jpg");
    }
}
