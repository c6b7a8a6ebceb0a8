use crate::domain::model::KeyOperation;
use crate::utils::error::{Result, SiteError};
use serde::{Deserialize, Serialize};

/// `domains` 可以是單一字串或字串陣列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(d) => vec![d.clone()],
            OneOrMany::Many(ds) => ds.clone(),
        }
    }
}

/// 憑證申請與站台啟用/停用/刪除的請求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRequest {
    pub domains: OneOrMany,
}

impl SiteRequest {
    pub fn new(domains: Vec<String>) -> Self {
        Self {
            domains: OneOrMany::Many(domains),
        }
    }

    pub fn domains(&self) -> Vec<String> {
        self.domains
            .to_vec()
            .into_iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect()
    }

    /// 第一個網域為主要網域
    pub fn primary(&self) -> Result<String> {
        self.domains()
            .into_iter()
            .next()
            .ok_or_else(|| SiteError::ValidationError {
                message: "missing parameters in request: domains".to_string(),
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainPair {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub custom_domain: Option<String>,
}

/// 網域金鑰啟用/停用請求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainKeyRequest {
    pub domains: Vec<DomainPair>,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub disabled_keys: Option<Vec<String>>,
}

impl DomainKeyRequest {
    /// 攤平 domain/customDomain，去除空值並依出現順序去重
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = Vec::new();
        for pair in &self.domains {
            for entry in [&pair.domain, &pair.custom_domain].into_iter().flatten() {
                let entry = entry.trim();
                if !entry.is_empty() && !hosts.iter().any(|h| h == entry) {
                    hosts.push(entry.to_string());
                }
            }
        }
        hosts
    }

    /// 移除操作優先使用 `disabledKeys`
    pub fn keys_for(&self, operation: KeyOperation) -> &[String] {
        match (operation, &self.disabled_keys) {
            (KeyOperation::Remove, Some(disabled)) => disabled,
            _ => &self.keys,
        }
    }
}
