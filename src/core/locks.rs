use crate::utils::error::Result;
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// 以設定檔名為鍵的互斥鎖，確保同一站台的轉換步驟不會交錯
///
/// 設定了鎖目錄時，另外對 `<dir>/<key>.lock` 取得獨佔檔案鎖，
/// 讓同一台主機上的其他行程也會排隊。
#[derive(Debug, Default, Clone)]
pub struct DomainLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
    lock_dir: Option<PathBuf>,
}

/// 持有期間鎖住一個站台；drop 時依序釋放檔案鎖與行程內的鎖
#[derive(Debug)]
pub struct DomainLockGuard {
    _file: Option<File>,
    _guard: OwnedMutexGuard<()>,
}

impl DomainLocks {
    /// 只在行程內有效
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::default(),
            lock_dir: Some(dir.into()),
        }
    }

    pub async fn acquire(&self, key: &str) -> Result<DomainLockGuard> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            // 清掉沒有人持有的鎖
            map.retain(|k, l| k == key || Arc::strong_count(l) > 1);
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = lock.lock_owned().await;

        let file = match &self.lock_dir {
            Some(dir) => Some(lock_file(dir.join(format!("{}.lock", key))).await?),
            None => None,
        };

        Ok(DomainLockGuard {
            _file: file,
            _guard: guard,
        })
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `lock_exclusive` 會阻塞，放到 blocking 執行緒
async fn lock_file(path: PathBuf) -> Result<File> {
    let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        tracing::debug!("Waiting for lock file {}", path.display());
        file.lock_exclusive()?;
        Ok(file)
    })
    .await
    .map_err(|e| std::io::Error::other(e.to_string()))??;
    Ok(file)
}
