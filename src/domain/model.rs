use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 需要設定的網域。身分以 `full_domain` 為準，本身不持久化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub full_domain: String,
    /// 多租戶萬用字元網域的上層 zone；自訂網域等於 `full_domain`
    pub base_domain: String,
    pub is_seeded: bool,
}

impl Domain {
    pub fn custom(host: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            base_domain: host.clone(),
            full_domain: host,
            is_seeded: false,
        }
    }

    pub fn seeded(full_domain: impl Into<String>, base_domain: impl Into<String>) -> Self {
        Self {
            full_domain: full_domain.into(),
            base_domain: base_domain.into(),
            is_seeded: true,
        }
    }

    /// sites-available / sites-enabled 中的檔名。seeded 網域共用 zone 的檔案
    pub fn config_name(&self) -> &str {
        if self.is_seeded {
            &self.base_domain
        } else {
            &self.full_domain
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_domain)
    }
}

/// 由檔案系統推導出的啟用狀態，不另外儲存
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteState {
    Absent,
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificatePaths {
    pub fullchain: PathBuf,
    pub privkey: PathBuf,
}

/// 單一網域的設定檔產物
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub domain: Domain,
    pub rendered_text: String,
    /// staging 路徑
    pub file_path: PathBuf,
    pub target_available_path: PathBuf,
    pub target_enabled_path: PathBuf,
}

/// ACME 協作者回報的憑證狀態。本系統只讀取到期時間
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    /// 第一個為主要網域
    pub domains: Vec<String>,
    /// 協作者提供的原始到期時間字串，解析失敗時視為需要更新
    pub expires_at: Option<String>,
    #[serde(default)]
    pub active: bool,
}

impl CertificateRecord {
    pub fn primary_domain(&self) -> Option<&str> {
        self.domains.first().map(String::as_str)
    }
}

/// 申請或更新憑證時交給 ACME 協作者的帳號資訊
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub domains: Vec<String>,
    pub email: String,
    pub agree_tos: bool,
    pub rsa_key_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyOperation {
    Add,
    Remove,
}

impl KeyOperation {
    /// 依操作拆成 (新增, 移除)
    pub fn split<'a>(&self, keys: &'a [String]) -> (&'a [String], &'a [String]) {
        match self {
            KeyOperation::Add => (keys, &[]),
            KeyOperation::Remove => (&[], keys),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyAction {
    Reload,
    Start,
    Stop,
}

impl fmt::Display for ProxyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProxyAction::Reload => "reload",
            ProxyAction::Start => "start",
            ProxyAction::Stop => "stop",
        })
    }
}

/// create-and-activate 時附帶的存取控制變更
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessControlUpdate {
    /// 沒有金鑰操作：已啟用時直接略過，重建時沿用現有區塊
    Keep,
    /// 金鑰操作進行中：None 表示移除區塊
    Replace(Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationOutcome {
    AlreadyEnabled,
    Activated,
}
