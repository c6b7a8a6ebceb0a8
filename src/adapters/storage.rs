use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// 本機檔案系統。nginx 設定目錄通常可讀，寫入只發生在 staging 目錄
#[derive(Debug, Clone, Default)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &Path) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_file(&self, path: &Path, data: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(path, data).await?;
        Ok(())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn read_link(&self, path: &Path) -> Result<Option<PathBuf>> {
        let metadata = match tokio::fs::symlink_metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !metadata.file_type().is_symlink() {
            return Ok(None);
        }

        let target = tokio::fs::read_link(path).await?;
        if target.is_absolute() {
            return Ok(Some(normalize(&target)));
        }
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(Some(normalize(&base.join(target))))
    }
}

/// 只做字面上的 `.`/`..` 處理，不追蹤連結
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/etc/nginx/sites-enabled/../sites-available/./foo")),
            PathBuf::from("/etc/nginx/sites-available/foo")
        );
    }

    #[tokio::test]
    async fn test_read_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new();
        assert_eq!(storage.read_file(&dir.path().join("nope")).await.unwrap(), None);
        assert!(!storage.exists(&dir.path().join("nope")).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new();
        let path = dir.path().join("tmp/staging/foo.example.com");

        storage.write_file(&path, "server {}\n").await.unwrap();
        assert_eq!(
            storage.read_file(&path).await.unwrap().as_deref(),
            Some("server {}\n")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_relative_link() {
        let dir = TempDir::new().unwrap();
        let available = dir.path().join("sites-available");
        let enabled = dir.path().join("sites-enabled");
        std::fs::create_dir_all(&available).unwrap();
        std::fs::create_dir_all(&enabled).unwrap();
        std::fs::write(available.join("foo"), "x").unwrap();
        std::os::unix::fs::symlink("../sites-available/foo", enabled.join("foo")).unwrap();

        let storage = LocalStorage::new();
        assert_eq!(
            storage.read_link(&enabled.join("foo")).await.unwrap(),
            Some(available.join("foo"))
        );
        assert_eq!(storage.read_link(&available.join("foo")).await.unwrap(), None);
    }
}
