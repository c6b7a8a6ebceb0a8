pub mod access_control;
pub mod certificate;
pub mod config_text;
pub mod domain_keys;
pub mod layout;
pub mod locks;
pub mod renewal;
pub mod resolve;
pub mod site_lifecycle;

pub use crate::domain::model::{
    AccessControlUpdate, ActivationOutcome, CertificateRecord, Domain, KeyOperation, ProxyAction,
    SiteState,
};
pub use crate::domain::ports::{
    AcmeClient, CommandRunner, PrivilegedFileOps, ProcessController, Storage,
};
pub use crate::utils::error::Result;
