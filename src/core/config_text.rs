use crate::core::layout::CertificateLayout;
use crate::domain::model::{CertificatePaths, Domain};
use crate::utils::error::{Result, SiteError};
use crate::utils::validation::validate_hostname;

const INDENT: &str = "    ";

/// 產生 nginx 虛擬主機設定文字 (80 轉址 + 443 TLS)。純函式，不做任何 I/O
#[derive(Debug, Clone)]
pub struct ConfigTextBuilder {
    certificates: CertificateLayout,
    http_includes: Vec<String>,
    tls_includes: Vec<String>,
}

impl ConfigTextBuilder {
    pub fn new(certificates: CertificateLayout) -> Self {
        Self {
            certificates,
            http_includes: vec!["snippets/well-known.conf".to_string()],
            tls_includes: vec![
                "snippets/ssl-params.conf".to_string(),
                "snippets/well-known.conf".to_string(),
                "common/protect.conf".to_string(),
                "common/properties.conf".to_string(),
            ],
        }
    }

    pub fn with_http_includes(mut self, includes: Vec<String>) -> Self {
        self.http_includes = includes;
        self
    }

    pub fn with_tls_includes(mut self, includes: Vec<String>) -> Self {
        self.tls_includes = includes;
        self
    }

    pub fn certificate_paths(&self, domain: &Domain) -> CertificatePaths {
        self.certificates.paths_for(domain)
    }

    /// 完整的站台設定。`access_snippet` 原樣插入 443 區塊
    pub fn build(
        &self,
        domain: &Domain,
        certificates: &CertificatePaths,
        access_snippet: Option<&str>,
    ) -> Result<String> {
        validate_descriptor(domain)?;

        let mut text = self.http_block(domain);
        text.push('\n');
        text.push_str(&self.tls_block(domain, certificates, access_snippet));
        Ok(text)
    }

    /// 只有 443 區塊，供 seeded 網域的金鑰區段使用
    pub fn build_tls_block(
        &self,
        domain: &Domain,
        certificates: &CertificatePaths,
        access_snippet: Option<&str>,
    ) -> Result<String> {
        validate_descriptor(domain)?;
        Ok(self.tls_block(domain, certificates, access_snippet))
    }

    fn http_block(&self, domain: &Domain) -> String {
        let mut lines = vec![
            "server {".to_string(),
            format!("{}listen 80;", INDENT),
            format!("{}listen [::]:80;", INDENT),
            format!("{}server_name {};", INDENT, domain.full_domain),
            format!("{}server_tokens off;", INDENT),
            String::new(),
        ];
        for include in &self.http_includes {
            lines.push(format!("{}include {};", INDENT, include));
        }
        lines.push(format!("{}location / {{", INDENT));
        lines.push(format!(
            "{0}{0}rewrite ^/$ https://$host$request_uri redirect;",
            INDENT
        ));
        lines.push(format!(
            "{0}{0}rewrite ^/(.*)$ https://$host/$1 redirect;",
            INDENT
        ));
        lines.push(format!("{}}}", INDENT));
        lines.push("}".to_string());

        let mut block = lines.join("\n");
        block.push('\n');
        block
    }

    fn tls_block(
        &self,
        domain: &Domain,
        certificates: &CertificatePaths,
        access_snippet: Option<&str>,
    ) -> String {
        let mut lines = vec![
            "server {".to_string(),
            format!("{}listen 443 ssl;", INDENT),
            format!("{}listen [::]:443 ssl;", INDENT),
            String::new(),
            format!("{}server_name {};", INDENT, domain.full_domain),
            format!("{}server_tokens off;", INDENT),
            String::new(),
            format!(
                "{}ssl_certificate {};",
                INDENT,
                certificates.fullchain.display()
            ),
            format!(
                "{}ssl_certificate_key {};",
                INDENT,
                certificates.privkey.display()
            ),
            String::new(),
        ];

        if let Some(snippet) = access_snippet.filter(|s| !s.trim().is_empty()) {
            lines.push(snippet.trim_end().to_string());
            lines.push(String::new());
        }

        for include in &self.tls_includes {
            lines.push(format!("{}include {};", INDENT, include));
        }
        lines.push("}".to_string());

        let mut block = lines.join("\n");
        block.push('\n');
        block
    }
}

fn validate_descriptor(domain: &Domain) -> Result<()> {
    validate_hostname(&domain.full_domain)?;

    if domain.is_seeded {
        if domain.base_domain.is_empty() {
            return Err(SiteError::InvalidDomainDescriptor {
                reason: format!("seeded domain {} has no base domain", domain.full_domain),
            });
        }
        if !domain
            .full_domain
            .ends_with(&format!(".{}", domain.base_domain))
        {
            return Err(SiteError::InvalidDomainDescriptor {
                reason: format!(
                    "{} is not under its base domain {}",
                    domain.full_domain, domain.base_domain
                ),
            });
        }
    }

    Ok(())
}
