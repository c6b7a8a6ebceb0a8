use crate::adapters::process::run_checked;
use crate::domain::ports::{CommandRunner, PrivilegedFileOps};
use crate::utils::error::{Result, SiteError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

fn target_in(src: &Path, dst_dir: &Path) -> Result<PathBuf> {
    let name = src.file_name().ok_or_else(|| SiteError::ValidationError {
        message: format!("{} has no file name", src.display()),
    })?;
    Ok(dst_dir.join(name))
}

async fn is_missing(path: &Path) -> Result<bool> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(_) => Ok(false),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e.into()),
    }
}

/// 以 `sudo mv|rm|ln` 操作 nginx 目錄
pub struct SudoFileOps<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> SudoFileOps<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl<R: CommandRunner> PrivilegedFileOps for SudoFileOps<R> {
    async fn move_into(&self, src: &Path, dst_dir: &Path) -> Result<()> {
        run_checked(
            &self.runner,
            true,
            "mv",
            vec![path_arg(src), path_arg(dst_dir)],
        )
        .await?;
        Ok(())
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        if is_missing(path).await? {
            tracing::debug!("{} does not exist, nothing to remove", path.display());
            return Ok(());
        }
        run_checked(&self.runner, true, "rm", vec!["-f".to_string(), path_arg(path)]).await?;
        Ok(())
    }

    async fn symlink(&self, target: &Path, link_path: &Path) -> Result<()> {
        run_checked(
            &self.runner,
            true,
            "ln",
            vec!["-s".to_string(), path_arg(target), path_arg(link_path)],
        )
        .await?;
        Ok(())
    }
}

/// 行程本身擁有 nginx 目錄時直接使用 `tokio::fs`
#[derive(Debug, Clone, Default)]
pub struct LocalFileOps;

#[async_trait]
impl PrivilegedFileOps for LocalFileOps {
    async fn move_into(&self, src: &Path, dst_dir: &Path) -> Result<()> {
        let dst = target_in(src, dst_dir)?;
        if tokio::fs::rename(src, &dst).await.is_err() {
            // staging 與 nginx 目錄可能不在同一個檔案系統
            tokio::fs::copy(src, &dst).await?;
            tokio::fs::remove_file(src).await?;
        }
        Ok(())
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    #[cfg(unix)]
    async fn symlink(&self, target: &Path, link_path: &Path) -> Result<()> {
        tokio::fs::symlink(target, link_path).await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn symlink(&self, _target: &Path, link_path: &Path) -> Result<()> {
        Err(SiteError::CommandFailed {
            command: format!("symlink {}", link_path.display()),
            message: "symbolic links require a unix host".to_string(),
        })
    }
}
