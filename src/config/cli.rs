use crate::domain::model::{KeyOperation, ProxyAction};
use crate::domain::request::{DomainKeyRequest, DomainPair, SiteRequest};
use crate::utils::error::{Result, SiteError};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "vhost-warden")]
#[command(about = "Manage nginx virtual hosts, domain keys and their certificates")]
pub struct Cli {
    /// TOML 設定檔
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// 覆寫 nginx.root (等同 NGINX_PATH)
    #[arg(long, global = true)]
    pub nginx_path: Option<String>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit JSON log lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 檢查、申請或更新憑證並啟用站台
    Cert(SiteArgs),
    /// 產生設定並啟用站台
    Activate(SiteArgs),
    /// 移除啟用連結
    Deactivate(SiteArgs),
    /// 停用並刪除站台設定
    Delete(SiteArgs),
    /// 新增或移除網域金鑰
    Keys {
        #[command(subcommand)]
        action: KeysCommand,
    },
    /// 顯示站台狀態
    Status(SiteArgs),
    /// 直接控制 nginx 服務
    Proxy {
        #[arg(value_enum)]
        action: ProxyArg,
    },
}

#[derive(Debug, Args)]
pub struct SiteArgs {
    /// JSON 請求，例如 `{"domains":["shop.acme.io"]}`
    #[arg(long, conflicts_with = "domain")]
    pub request: Option<String>,

    /// 網域或 URL，可重複；第一個為主網域
    #[arg(long = "domain", short = 'd')]
    pub domain: Vec<String>,
}

impl SiteArgs {
    pub fn site_request(&self) -> Result<SiteRequest> {
        if let Some(json) = &self.request {
            return Ok(serde_json::from_str(json)?);
        }
        Ok(SiteRequest::new(self.domain.clone()))
    }
}

#[derive(Debug, Subcommand)]
pub enum KeysCommand {
    Add(KeyArgs),
    Remove(KeyArgs),
}

impl KeysCommand {
    pub fn operation(&self) -> KeyOperation {
        match self {
            KeysCommand::Add(_) => KeyOperation::Add,
            KeysCommand::Remove(_) => KeyOperation::Remove,
        }
    }

    pub fn args(&self) -> &KeyArgs {
        match self {
            KeysCommand::Add(args) | KeysCommand::Remove(args) => args,
        }
    }
}

#[derive(Debug, Args)]
pub struct KeyArgs {
    /// JSON 請求，格式同 domain key API
    #[arg(long, conflicts_with_all = ["domain", "key"])]
    pub request: Option<String>,

    #[arg(long = "domain", short = 'd')]
    pub domain: Vec<String>,

    #[arg(long = "key", short = 'k')]
    pub key: Vec<String>,
}

impl KeyArgs {
    pub fn key_request(&self, operation: KeyOperation) -> Result<DomainKeyRequest> {
        if let Some(json) = &self.request {
            return Ok(serde_json::from_str(json)?);
        }
        if self.key.is_empty() {
            return Err(SiteError::ValidationError {
                message: "at least one --key is required".to_string(),
            });
        }

        let domains = self
            .domain
            .iter()
            .map(|d| DomainPair {
                domain: None,
                custom_domain: Some(d.clone()),
            })
            .collect();
        let (keys, disabled_keys) = match operation {
            KeyOperation::Add => (self.key.clone(), None),
            KeyOperation::Remove => (Vec::new(), Some(self.key.clone())),
        };
        Ok(DomainKeyRequest {
            domains,
            keys,
            disabled_keys,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProxyArg {
    Reload,
    Start,
    Stop,
}

impl From<ProxyArg> for ProxyAction {
    fn from(arg: ProxyArg) -> Self {
        match arg {
            ProxyArg::Reload => ProxyAction::Reload,
            ProxyArg::Start => ProxyAction::Start,
            ProxyArg::Stop => ProxyAction::Stop,
        }
    }
}
