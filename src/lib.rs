pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::Cli;
pub use config::WardenConfig;

pub use core::{
    certificate::CertificateOrchestrator, domain_keys::DomainKeyService,
    site_lifecycle::SiteLifecycleManager,
};
pub use domain::request::{DomainKeyRequest, SiteRequest};
pub use utils::error::{Result, SiteError};
