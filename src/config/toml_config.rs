use crate::core::access_control::{AccessControlEditor, RegionParsePolicy};
use crate::core::config_text::ConfigTextBuilder;
use crate::core::layout::{CertificateLayout, SiteLayout};
use crate::core::renewal::CertificateRenewalPolicy;
use crate::core::resolve::DomainResolver;
use crate::utils::error::{Result, SiteError};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_NGINX_ROOT: &str = "/etc/nginx/";
const DEFAULT_CERT_CONFIG_DIR: &str = "/home/ubuntu/certs";
const DEFAULT_WILDCARD_DIR: &str = "/home/ubuntu/certs/wild-card-certs/letsencrypt/live";
const DEFAULT_ACME_SERVER: &str = "https://acme-v02.api.letsencrypt.org/directory";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    #[serde(default)]
    pub nginx: NginxConfig,
    #[serde(default)]
    pub certificates: CertificatesConfig,
    #[serde(default)]
    pub access_control: AccessControlConfig,
    #[serde(default)]
    pub template: TemplateConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NginxConfig {
    pub root: Option<String>,
    pub sites_available: Option<String>,
    pub sites_enabled: Option<String>,
    pub staging_dir: Option<String>,
    pub service: Option<String>,
    pub use_sudo: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertificatesConfig {
    /// certbot 的 config dir，底下的 live/ 為各網域憑證
    pub config_dir: Option<String>,
    pub wildcard_dir: Option<String>,
    pub webroot: Option<String>,
    pub email: Option<String>,
    pub acme_server: Option<String>,
    pub rsa_key_size: Option<u32>,
    pub renew_within_days: Option<i64>,
    pub certbot: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessControlConfig {
    pub header: Option<String>,
    pub seeded_zones: Option<Vec<String>>,
    pub forbidden_root: Option<String>,
    pub forbidden_page: Option<String>,
    pub on_malformed_region: Option<RegionParsePolicy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub http_includes: Option<Vec<String>>,
    pub tls_includes: Option<Vec<String>>,
}

impl WardenConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(SiteError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| SiteError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${NGINX_PATH})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| SiteError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 未在設定檔指定時，沿用 `NGINX_PATH` 環境變數
    pub fn nginx_root(&self) -> String {
        self.nginx
            .root
            .clone()
            .or_else(|| std::env::var("NGINX_PATH").ok())
            .unwrap_or_else(|| DEFAULT_NGINX_ROOT.to_string())
    }

    pub fn site_layout(&self) -> SiteLayout {
        let root = PathBuf::from(self.nginx_root());
        SiteLayout::new(
            root.join(
                self.nginx
                    .sites_available
                    .as_deref()
                    .unwrap_or("sites-available"),
            ),
            root.join(self.nginx.sites_enabled.as_deref().unwrap_or("sites-enabled")),
            PathBuf::from(self.nginx.staging_dir.as_deref().unwrap_or("./tmp")),
        )
    }

    pub fn service_name(&self) -> &str {
        self.nginx.service.as_deref().unwrap_or("nginx")
    }

    pub fn use_sudo(&self) -> bool {
        self.nginx.use_sudo.unwrap_or(true)
    }

    pub fn cert_config_dir(&self) -> PathBuf {
        PathBuf::from(
            self.certificates
                .config_dir
                .as_deref()
                .unwrap_or(DEFAULT_CERT_CONFIG_DIR),
        )
    }

    pub fn certificate_layout(&self) -> CertificateLayout {
        CertificateLayout::new(
            self.cert_config_dir().join("live"),
            PathBuf::from(
                self.certificates
                    .wildcard_dir
                    .as_deref()
                    .unwrap_or(DEFAULT_WILDCARD_DIR),
            ),
        )
    }

    pub fn webroot(&self) -> PathBuf {
        self.certificates
            .webroot
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.cert_config_dir().join("www"))
    }

    pub fn acme_server(&self) -> &str {
        self.certificates
            .acme_server
            .as_deref()
            .unwrap_or(DEFAULT_ACME_SERVER)
    }

    pub fn email(&self) -> &str {
        self.certificates.email.as_deref().unwrap_or("")
    }

    pub fn rsa_key_size(&self) -> u32 {
        self.certificates.rsa_key_size.unwrap_or(2048)
    }

    pub fn certbot_binary(&self) -> &str {
        self.certificates.certbot.as_deref().unwrap_or("certbot")
    }

    pub fn renewal_policy(&self) -> CertificateRenewalPolicy {
        CertificateRenewalPolicy::new(self.certificates.renew_within_days.unwrap_or(7))
    }

    pub fn seeded_zones(&self) -> Vec<String> {
        self.access_control.seeded_zones.clone().unwrap_or_default()
    }

    pub fn domain_resolver(&self) -> DomainResolver {
        DomainResolver::new(self.seeded_zones())
    }

    pub fn text_builder(&self) -> ConfigTextBuilder {
        let mut builder = ConfigTextBuilder::new(self.certificate_layout());
        if let Some(includes) = &self.template.http_includes {
            builder = builder.with_http_includes(includes.clone());
        }
        if let Some(includes) = &self.template.tls_includes {
            builder = builder.with_tls_includes(includes.clone());
        }
        builder
    }

    pub fn access_control_editor(&self) -> AccessControlEditor {
        let mut editor = AccessControlEditor::default();
        if let Some(header) = &self.access_control.header {
            editor = editor.with_header(header);
        }
        if let Some(root) = &self.access_control.forbidden_root {
            editor = editor.with_forbidden_root(root.clone());
        }
        if let Some(page) = &self.access_control.forbidden_page {
            editor = editor.with_forbidden_page(page.clone());
        }
        editor.with_policy(self.access_control.on_malformed_region.unwrap_or_default())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        use crate::utils::validation::*;

        validate_path("nginx.root", &self.nginx_root())?;
        validate_path(
            "nginx.staging_dir",
            self.nginx.staging_dir.as_deref().unwrap_or("./tmp"),
        )?;
        validate_non_empty_string("nginx.service", self.service_name())?;
        validate_url("certificates.acme_server", self.acme_server())?;
        validate_positive_number(
            "certificates.rsa_key_size",
            self.rsa_key_size() as usize,
            2048,
        )?;
        validate_range(
            "certificates.renew_within_days",
            self.certificates.renew_within_days.unwrap_or(7),
            1,
            89,
        )?;

        if let Some(email) = &self.certificates.email {
            if !email.contains('@') {
                return Err(SiteError::InvalidConfigValueError {
                    field: "certificates.email".to_string(),
                    value: email.clone(),
                    reason: "Not an e-mail address".to_string(),
                });
            }
        }

        for zone in self.seeded_zones() {
            validate_hostname(&zone).map_err(|_| SiteError::InvalidConfigValueError {
                field: "access_control.seeded_zones".to_string(),
                value: zone.clone(),
                reason: "Not a valid host name".to_string(),
            })?;
        }

        if let Some(header) = &self.access_control.header {
            if header.is_empty()
                || !header
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(SiteError::InvalidConfigValueError {
                    field: "access_control.header".to_string(),
                    value: header.clone(),
                    reason: "Header names may only contain letters, digits, '-' and '_'"
                        .to_string(),
                });
            }
        }

        Ok(())
    }
}

impl Validate for WardenConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
