use std::fmt;
use thiserror::Error;

/// 編排流程中的每一個步驟，錯誤會帶上失敗的步驟名稱
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReadConfig,
    Disable,
    Render,
    WriteStaging,
    MoveToAvailable,
    RemoveStaleLink,
    CreateLink,
    Reload,
    RemoveAvailable,
    CheckCertificate,
    IssueCertificate,
    RenewCertificate,
    ActivateSite,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ReadConfig => "read-config",
            Stage::Disable => "disable",
            Stage::Render => "render",
            Stage::WriteStaging => "write-staging",
            Stage::MoveToAvailable => "move-to-available",
            Stage::RemoveStaleLink => "remove-stale-link",
            Stage::CreateLink => "create-link",
            Stage::Reload => "reload",
            Stage::RemoveAvailable => "remove-available",
            Stage::CheckCertificate => "check-certificate",
            Stage::IssueCertificate => "issue-certificate",
            Stage::RenewCertificate => "renew-certificate",
            Stage::ActivateSite => "activate-site",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Invalid domain descriptor: {reason}")]
    InvalidDomainDescriptor { reason: String },

    #[error("File operation failed during {stage}: {source}")]
    FileOperationFailed {
        stage: Stage,
        #[source]
        source: Box<SiteError>,
    },

    #[error("Process control `{action}` failed: {message}")]
    ProcessControlFailed { action: String, message: String },

    #[error("Certificate operation failed during {stage}: {message}")]
    CertificateOperationFailed { stage: Stage, message: String },

    #[error("Access-control region for {domain} is ambiguous: {reason}")]
    RegionParseAmbiguous { domain: String, reason: String },

    #[error("Command `{command}` failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl SiteError {
    /// 把協作者錯誤包裝成帶步驟名稱的檔案操作錯誤
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            // 已經帶有步驟或屬於程序控制的錯誤不再重複包裝
            e @ (SiteError::FileOperationFailed { .. }
            | SiteError::ProcessControlFailed { .. }
            | SiteError::CertificateOperationFailed { .. }
            | SiteError::RegionParseAmbiguous { .. }
            | SiteError::InvalidDomainDescriptor { .. }) => e,
            other => SiteError::FileOperationFailed {
                stage,
                source: Box::new(other),
            },
        }
    }

    pub fn certificate(stage: Stage, err: SiteError) -> Self {
        match err {
            e @ SiteError::CertificateOperationFailed { .. } => e,
            other => SiteError::CertificateOperationFailed {
                stage,
                message: other.to_string(),
            },
        }
    }

    /// 失敗的步驟 (若有)
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SiteError::FileOperationFailed { stage, .. }
            | SiteError::CertificateOperationFailed { stage, .. } => Some(*stage),
            SiteError::ProcessControlFailed { .. } => Some(Stage::Reload),
            _ => None,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SiteError::InvalidDomainDescriptor { .. }
            | SiteError::ValidationError { .. }
            | SiteError::RegionParseAmbiguous { .. } => ErrorSeverity::Low,
            SiteError::CertificateOperationFailed { .. } | SiteError::CommandFailed { .. } => {
                ErrorSeverity::Medium
            }
            SiteError::FileOperationFailed { .. }
            | SiteError::IoError(_)
            | SiteError::SerializationError(_) => ErrorSeverity::High,
            SiteError::ProcessControlFailed { .. }
            | SiteError::ConfigError { .. }
            | SiteError::InvalidConfigValueError { .. }
            | SiteError::MissingConfigError { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            SiteError::InvalidDomainDescriptor { reason } => {
                format!("The domain request is invalid: {}", reason)
            }
            SiteError::FileOperationFailed { stage, .. } => {
                format!("Unable to update nginx configuration (failed at {}).", stage)
            }
            SiteError::ProcessControlFailed { action, .. } => {
                let done = match action.as_str() {
                    "reload" => "reloaded",
                    "start" => "started",
                    "stop" => "stopped",
                    other => other,
                };
                format!("nginx could not be {}; the running proxy may be stale.", done)
            }
            SiteError::CertificateOperationFailed { stage, .. } => {
                format!("Unable to obtain a TLS certificate (failed at {}).", stage)
            }
            SiteError::RegionParseAmbiguous { domain, .. } => {
                format!("The domain key block for {} could not be read safely.", domain)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            SiteError::InvalidDomainDescriptor { .. } | SiteError::ValidationError { .. } => {
                "Check the domain names and keys in the request"
            }
            SiteError::FileOperationFailed { .. } | SiteError::IoError(_) => {
                "Inspect sites-available/sites-enabled and retry the same request"
            }
            SiteError::ProcessControlFailed { .. } => {
                "Run `nginx -t` to find the broken configuration, then reload"
            }
            SiteError::CertificateOperationFailed { .. } => {
                "Check DNS and the ACME webroot, then retry; activation is idempotent"
            }
            SiteError::RegionParseAmbiguous { .. } => {
                "Repair the DOMAIN KEY CONFIG markers by hand and retry"
            }
            SiteError::CommandFailed { .. } => "Verify sudo permissions for the service user",
            SiteError::SerializationError(_) => "Check the request payload is valid JSON",
            SiteError::ConfigError { .. }
            | SiteError::InvalidConfigValueError { .. }
            | SiteError::MissingConfigError { .. } => "Fix the configuration file and restart",
        }
    }
}

pub type Result<T> = std::result::Result<T, SiteError>;
