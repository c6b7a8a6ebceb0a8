use crate::core::resolve::DomainResolver;
use crate::core::site_lifecycle::SiteLifecycleManager;
use crate::domain::model::{ActivationOutcome, Domain, KeyOperation};
use crate::domain::ports::{PrivilegedFileOps, ProcessController, Storage};
use crate::domain::request::DomainKeyRequest;
use crate::utils::error::{Result, SiteError};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct DomainKeyResult {
    pub domain: String,
    pub seeded: bool,
    pub outcome: ActivationOutcome,
}

/// 對一批網域套用金鑰操作：先處理自訂網域，再處理 seeded 網域，遇到第一個錯誤即停止
pub struct DomainKeyService<S: Storage, F: PrivilegedFileOps, P: ProcessController> {
    sites: Arc<SiteLifecycleManager<S, F, P>>,
    resolver: DomainResolver,
}

impl<S: Storage, F: PrivilegedFileOps, P: ProcessController> DomainKeyService<S, F, P> {
    pub fn new(sites: Arc<SiteLifecycleManager<S, F, P>>, resolver: DomainResolver) -> Self {
        Self { sites, resolver }
    }

    pub async fn apply(
        &self,
        request: &DomainKeyRequest,
        operation: KeyOperation,
    ) -> Result<Vec<DomainKeyResult>> {
        let hosts = request.hosts();
        if hosts.is_empty() {
            return Err(SiteError::ValidationError {
                message: "missing parameters in request: domains".to_string(),
            });
        }

        let domains = self.resolver.resolve_all(&hosts)?;
        let (seeded, custom): (Vec<Domain>, Vec<Domain>) =
            domains.into_iter().partition(|d| d.is_seeded);
        let keys = request.keys_for(operation);

        let mut results = Vec::with_capacity(custom.len() + seeded.len());
        for domain in custom.iter().chain(seeded.iter()) {
            let outcome = self
                .sites
                .update_domain_keys(domain, operation, keys)
                .await?;
            results.push(DomainKeyResult {
                domain: domain.full_domain.clone(),
                seeded: domain.is_seeded,
                outcome,
            });
        }

        tracing::info!(
            "🔑 Domain key {:?} applied to {} domain(s)",
            operation,
            results.len()
        );
        Ok(results)
    }
}
