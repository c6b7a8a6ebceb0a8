use crate::adapters::process::run_checked;
use crate::domain::model::{CertificateRecord, CertificateRequest};
use crate::domain::ports::{AcmeClient, CommandRunner};
use crate::utils::error::{Result, SiteError, Stage};
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct CertbotSettings {
    pub binary: String,
    pub use_sudo: bool,
    /// certbot 的 config dir；各網域憑證在其下的 live/
    pub config_dir: PathBuf,
    pub webroot: PathBuf,
    pub server: String,
}

/// 透過 certbot 指令處理 ACME。本 crate 不實作 ACME 協定
pub struct CertbotClient<R: CommandRunner> {
    runner: R,
    settings: CertbotSettings,
}

impl<R: CommandRunner> CertbotClient<R> {
    pub fn new(runner: R, settings: CertbotSettings) -> Self {
        Self { runner, settings }
    }

    fn common_args(&self) -> Vec<String> {
        let dir = &self.settings.config_dir;
        vec![
            "--non-interactive".to_string(),
            "--config-dir".to_string(),
            dir.display().to_string(),
            "--work-dir".to_string(),
            dir.join("work").display().to_string(),
            "--logs-dir".to_string(),
            dir.join("logs").display().to_string(),
        ]
    }

    async fn certbot(&self, args: Vec<String>) -> Result<String> {
        let output = run_checked(
            &self.runner,
            self.settings.use_sudo,
            &self.settings.binary,
            args,
        )
        .await?;
        Ok(output.stdout)
    }
}

fn primary(domains: &[String]) -> Result<&str> {
    domains
        .first()
        .map(String::as_str)
        .ok_or_else(|| SiteError::ValidationError {
            message: "certificate request without domains".to_string(),
        })
}

/// 解析 `certbot certificates` 輸出中指定名稱的憑證
pub fn parse_certificates(output: &str, cert_name: &str) -> Option<CertificateRecord> {
    let name_re = Regex::new(r"(?m)^\s*Certificate Name:\s*(\S+)\s*$").ok()?;
    let domains_re = Regex::new(r"(?m)^\s*Domains:\s*(.+?)\s*$").ok()?;
    let expiry_re = Regex::new(r"(?m)^\s*Expiry Date:\s*(.+?)(?:\s+\(.*\))?\s*$").ok()?;

    let starts: Vec<(usize, &str)> = name_re
        .captures_iter(output)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((whole.start(), caps.get(1)?.as_str()))
        })
        .collect();

    let index = starts.iter().position(|(_, name)| *name == cert_name)?;
    let begin = starts[index].0;
    let end = starts.get(index + 1).map(|(at, _)| *at).unwrap_or(output.len());
    let block = &output[begin..end];

    let domains = domains_re
        .captures(block)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().split_whitespace().map(str::to_string).collect())
        .unwrap_or_else(|| vec![cert_name.to_string()]);
    let expires_at = expiry_re
        .captures(block)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    Some(CertificateRecord {
        domains,
        expires_at,
        active: false,
    })
}

#[async_trait]
impl<R: CommandRunner> AcmeClient for CertbotClient<R> {
    async fn check(&self, domains: &[String]) -> Result<Option<CertificateRecord>> {
        let name = primary(domains)?;
        let mut args = vec![
            "certificates".to_string(),
            "--cert-name".to_string(),
            name.to_string(),
        ];
        args.extend(self.common_args());

        let stdout = self.certbot(args).await?;
        Ok(parse_certificates(&stdout, name))
    }

    async fn register(&self, request: &CertificateRequest) -> Result<CertificateRecord> {
        let name = primary(&request.domains)?;
        let mut args = vec![
            "certonly".to_string(),
            "--webroot".to_string(),
            "-w".to_string(),
            self.settings.webroot.display().to_string(),
            "--cert-name".to_string(),
            name.to_string(),
            "--rsa-key-size".to_string(),
            request.rsa_key_size.to_string(),
            "--server".to_string(),
            self.settings.server.clone(),
        ];
        if request.agree_tos {
            args.push("--agree-tos".to_string());
        }
        if request.email.is_empty() {
            args.push("--register-unsafely-without-email".to_string());
        } else {
            args.push("--email".to_string());
            args.push(request.email.clone());
        }
        for domain in &request.domains {
            args.push("-d".to_string());
            args.push(domain.clone());
        }
        args.extend(self.common_args());

        self.certbot(args).await?;
        self.check(&request.domains)
            .await?
            .ok_or_else(|| SiteError::CertificateOperationFailed {
                stage: Stage::IssueCertificate,
                message: format!("certbot finished but no certificate named {} exists", name),
            })
    }

    async fn renew(
        &self,
        request: &CertificateRequest,
        previous: &CertificateRecord,
    ) -> Result<CertificateRecord> {
        let name = previous
            .primary_domain()
            .map(Ok)
            .unwrap_or_else(|| primary(&request.domains))?;
        let mut args = vec![
            "renew".to_string(),
            "--cert-name".to_string(),
            name.to_string(),
            "--force-renewal".to_string(),
            "--server".to_string(),
            self.settings.server.clone(),
        ];
        args.extend(self.common_args());

        self.certbot(args).await?;
        // 沒查到新紀錄就沿用舊的
        Ok(self
            .check(&request.domains)
            .await?
            .unwrap_or_else(|| previous.clone()))
    }
}
