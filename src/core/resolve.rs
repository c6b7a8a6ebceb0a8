use crate::domain::model::Domain;
use crate::utils::error::{Result, SiteError};
use crate::utils::validation::validate_hostname;
use url::Url;

/// 把請求中的網域字串 (主機名稱或 URL) 轉成 `Domain`，並判斷是否屬於平台的萬用字元 zone
#[derive(Debug, Clone, Default)]
pub struct DomainResolver {
    seeded_zones: Vec<String>,
}

impl DomainResolver {
    pub fn new(seeded_zones: Vec<String>) -> Self {
        Self {
            seeded_zones: seeded_zones
                .into_iter()
                .map(|z| z.trim().trim_matches('.').to_ascii_lowercase())
                .filter(|z| !z.is_empty())
                .collect(),
        }
    }

    pub fn resolve(&self, raw: &str) -> Result<Domain> {
        let host = extract_host(raw)?;
        validate_hostname(&host)?;

        let seeded = self
            .seeded_zones
            .iter()
            .any(|zone| host.ends_with(&format!(".{}", zone)));

        if seeded {
            // 去掉第一段即為 zone 檔名
            let base = host
                .split_once('.')
                .map(|(_, rest)| rest.to_string())
                .ok_or_else(|| SiteError::InvalidDomainDescriptor {
                    reason: format!("{} has no parent zone", host),
                })?;
            Ok(Domain::seeded(host, base))
        } else {
            Ok(Domain::custom(host))
        }
    }

    pub fn resolve_all(&self, raws: &[String]) -> Result<Vec<Domain>> {
        raws.iter().map(|raw| self.resolve(raw)).collect()
    }
}

fn extract_host(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.contains("://") {
        let url = Url::parse(raw).map_err(|e| SiteError::InvalidDomainDescriptor {
            reason: format!("{:?} is not a valid URL: {}", raw, e),
        })?;
        url.host_str()
            .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
            .ok_or_else(|| SiteError::InvalidDomainDescriptor {
                reason: format!("{:?} has no host", raw),
            })
    } else {
        Ok(raw.trim_end_matches('.').to_ascii_lowercase())
    }
}
