use crate::core::renewal::{CertificateRenewalPolicy, RenewalDecision};
use crate::core::resolve::DomainResolver;
use crate::core::site_lifecycle::SiteLifecycleManager;
use crate::domain::model::{
    AccessControlUpdate, ActivationOutcome, CertificateRecord, CertificateRequest,
};
use crate::domain::ports::{AcmeClient, PrivilegedFileOps, ProcessController, Storage};
use crate::domain::request::SiteRequest;
use crate::utils::error::{Result, SiteError, Stage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// 申請/更新憑證時使用的帳號設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcmeAccount {
    pub email: String,
    pub rsa_key_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateAction {
    Issued,
    Renewed,
    Reused,
}

#[derive(Debug, Clone, Serialize)]
pub struct CertificateOutcome {
    pub certificate: CertificateRecord,
    pub action: CertificateAction,
    pub site: ActivationOutcome,
}

/// 檢查 → 申請或更新 → 啟用站台
///
/// 憑證已簽發但站台尚未啟用的中間狀態是允許的；重送同一個請求即可補完，
/// 因為 create-and-activate 是冪等的。
pub struct CertificateOrchestrator<A, S, F, P>
where
    A: AcmeClient,
    S: Storage,
    F: PrivilegedFileOps,
    P: ProcessController,
{
    acme: A,
    sites: Arc<SiteLifecycleManager<S, F, P>>,
    resolver: DomainResolver,
    policy: CertificateRenewalPolicy,
    account: AcmeAccount,
}

impl<A, S, F, P> CertificateOrchestrator<A, S, F, P>
where
    A: AcmeClient,
    S: Storage,
    F: PrivilegedFileOps,
    P: ProcessController,
{
    pub fn new(
        acme: A,
        sites: Arc<SiteLifecycleManager<S, F, P>>,
        resolver: DomainResolver,
        policy: CertificateRenewalPolicy,
        account: AcmeAccount,
    ) -> Self {
        Self {
            acme,
            sites,
            resolver,
            policy,
            account,
        }
    }

    pub async fn generate(&self, request: &SiteRequest) -> Result<CertificateOutcome> {
        self.generate_at(request, Utc::now()).await
    }

    pub async fn generate_at(
        &self,
        request: &SiteRequest,
        now: DateTime<Utc>,
    ) -> Result<CertificateOutcome> {
        request.primary()?;
        let domains = self.resolver.resolve_all(&request.domains())?;
        let primary = domains[0].clone();
        if let Some(seeded) = domains.iter().find(|d| d.is_seeded) {
            return Err(SiteError::InvalidDomainDescriptor {
                reason: format!(
                    "{} uses the wildcard certificate of {}",
                    seeded.full_domain, seeded.base_domain
                ),
            });
        }

        let hosts: Vec<String> = domains.iter().map(|d| d.full_domain.clone()).collect();
        let cert_request = CertificateRequest {
            domains: hosts.clone(),
            email: self.account.email.clone(),
            agree_tos: true,
            rsa_key_size: self.account.rsa_key_size,
        };
        tracing::info!("📜 Certificate request for {:?}", hosts);

        let existing = self
            .acme
            .check(&hosts)
            .await
            .map_err(|e| SiteError::certificate(Stage::CheckCertificate, e))?;

        let (mut certificate, action) = match self.policy.decide(existing.as_ref(), now) {
            RenewalDecision::IssueNew => {
                tracing::info!("🆕 Issuing certificate for {}", primary);
                let issued = self
                    .acme
                    .register(&cert_request)
                    .await
                    .map_err(|e| SiteError::certificate(Stage::IssueCertificate, e))?;
                (issued, CertificateAction::Issued)
            }
            RenewalDecision::Renew => {
                tracing::info!("🔄 Renewing certificate for {}", primary);
                // decide() 只有在有紀錄時才會回傳 Renew
                let previous = existing.ok_or_else(|| SiteError::CertificateOperationFailed {
                    stage: Stage::RenewCertificate,
                    message: "no previous certificate to renew".to_string(),
                })?;
                let renewed = self
                    .acme
                    .renew(&cert_request, &previous)
                    .await
                    .map_err(|e| SiteError::certificate(Stage::RenewCertificate, e))?;
                (renewed, CertificateAction::Renewed)
            }
            RenewalDecision::Reuse => {
                tracing::info!("♻️ Certificate for {} is still valid", primary);
                let current = existing.ok_or_else(|| SiteError::CertificateOperationFailed {
                    stage: Stage::CheckCertificate,
                    message: "certificate disappeared during check".to_string(),
                })?;
                (current, CertificateAction::Reused)
            }
        };

        let site = self
            .sites
            .create_and_activate(&primary, AccessControlUpdate::Keep)
            .await
            .map_err(|e| e.at_stage(Stage::ActivateSite))?;

        certificate.active = true;
        tracing::info!("✅ Custom domain {} created and activated", primary);

        Ok(CertificateOutcome {
            certificate,
            action,
            site,
        })
    }
}
