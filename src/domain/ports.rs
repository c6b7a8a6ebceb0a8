use crate::domain::model::{CertificateRecord, CertificateRequest, ProxyAction};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// 一般權限即可存取的讀寫：讀取已啟用設定、寫入 staging 檔
pub trait Storage: Send + Sync {
    /// 檔案不存在時回傳 `None`
    fn read_file(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<Option<String>>> + Send;
    fn write_file(
        &self,
        path: &Path,
        data: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &Path) -> impl std::future::Future<Output = Result<bool>> + Send;
    /// 若 `path` 是符號連結，回傳其目標 (相對目標會以連結所在目錄解析)
    fn read_link(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<Option<PathBuf>>> + Send;
}

/// 需要額外權限的檔案操作
#[async_trait]
pub trait PrivilegedFileOps: Send + Sync {
    async fn move_into(&self, src: &Path, dst_dir: &Path) -> Result<()>;
    /// 路徑不存在時視為成功
    async fn remove(&self, path: &Path) -> Result<()>;
    async fn symlink(&self, target: &Path, link_path: &Path) -> Result<()>;
}

#[async_trait]
pub trait ProcessController: Send + Sync {
    async fn control(&self, action: ProxyAction) -> Result<()>;
}

#[async_trait]
pub trait AcmeClient: Send + Sync {
    async fn check(&self, domains: &[String]) -> Result<Option<CertificateRecord>>;
    async fn register(&self, request: &CertificateRequest) -> Result<CertificateRecord>;
    async fn renew(
        &self,
        request: &CertificateRequest,
        previous: &CertificateRecord,
    ) -> Result<CertificateRecord>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// 外部指令執行 (sudo / service / certbot)
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}
