#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use vhost_warden::adapters::{LocalFileOps, LocalStorage};
use vhost_warden::core::access_control::AccessControlEditor;
use vhost_warden::core::config_text::ConfigTextBuilder;
use vhost_warden::core::layout::{CertificateLayout, SiteLayout};
use vhost_warden::core::resolve::DomainResolver;
use vhost_warden::core::{AcmeClient, CertificateRecord, ProcessController, ProxyAction};
use vhost_warden::domain::model::CertificateRequest;
use vhost_warden::{CertificateOrchestrator, Result, SiteError, SiteLifecycleManager};

pub const SEEDED_ZONE: &str = "tenants.example.com";

pub type Manager = SiteLifecycleManager<LocalStorage, LocalFileOps, RecordingProcess>;
pub type Orchestrator =
    CertificateOrchestrator<FakeAcme, LocalStorage, LocalFileOps, RecordingProcess>;

/// 記錄 nginx 控制指令；`fail` 為 true 時一律失敗
#[derive(Clone, Default)]
pub struct RecordingProcess {
    pub actions: Arc<Mutex<Vec<ProxyAction>>>,
    pub fail: Arc<Mutex<bool>>,
}

impl RecordingProcess {
    pub fn reloads(&self) -> usize {
        self.actions
            .lock()
            .unwrap()
            .iter()
            .filter(|a| **a == ProxyAction::Reload)
            .count()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl ProcessController for RecordingProcess {
    async fn control(&self, action: ProxyAction) -> Result<()> {
        self.actions.lock().unwrap().push(action);
        if *self.fail.lock().unwrap() {
            return Err(SiteError::ProcessControlFailed {
                action: action.to_string(),
                message: "nginx: [emerg] unexpected end of file".to_string(),
            });
        }
        Ok(())
    }
}

/// 暫存目錄中的 nginx 目錄樹
pub struct Sandbox {
    pub dir: TempDir,
    pub layout: SiteLayout,
    pub certificates: CertificateLayout,
    pub process: RecordingProcess,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let layout = SiteLayout::new(
            root.join("sites-available"),
            root.join("sites-enabled"),
            root.join("tmp"),
        );
        std::fs::create_dir_all(&layout.available_dir).unwrap();
        std::fs::create_dir_all(&layout.enabled_dir).unwrap();

        let certificates =
            CertificateLayout::new(root.join("certs/live"), root.join("certs/wildcard"));

        Self {
            dir,
            layout,
            certificates,
            process: RecordingProcess::default(),
        }
    }

    pub fn manager(&self) -> Manager {
        SiteLifecycleManager::new(
            self.layout.clone(),
            ConfigTextBuilder::new(self.certificates.clone()),
            AccessControlEditor::default(),
            LocalStorage::new(),
            LocalFileOps,
            self.process.clone(),
        )
    }

    pub fn resolver(&self) -> DomainResolver {
        DomainResolver::new(vec![SEEDED_ZONE.to_string()])
    }

    pub fn available(&self, name: &str) -> PathBuf {
        self.layout.available_path(name)
    }

    pub fn enabled(&self, name: &str) -> PathBuf {
        self.layout.enabled_path(name)
    }

    pub fn read_available(&self, name: &str) -> String {
        std::fs::read_to_string(self.available(name)).unwrap()
    }

    pub fn is_linked(&self, name: &str) -> bool {
        std::fs::symlink_metadata(self.enabled(name))
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }

    /// 預先放好一個已啟用的設定檔 (例如 seeded zone 的共用檔)
    pub fn install_enabled(&self, name: &str, text: &str) {
        std::fs::write(self.available(name), text).unwrap();
        link(&self.available(name), &self.enabled(name));
    }
}

#[cfg(unix)]
fn link(target: &Path, link_path: &Path) {
    std::os::unix::fs::symlink(target, link_path).unwrap();
}

/// ACME 假實作：回傳預設紀錄並計算呼叫次數
#[derive(Clone, Default)]
pub struct FakeAcme {
    pub existing: Arc<Mutex<Option<CertificateRecord>>>,
    pub issued_expiry: String,
    pub fail_register: bool,
    pub checks: Arc<AtomicUsize>,
    pub registrations: Arc<AtomicUsize>,
    pub renewals: Arc<AtomicUsize>,
}

impl FakeAcme {
    pub fn with_existing(expires_at: Option<&str>, domains: &[&str]) -> Self {
        let acme = Self::default();
        *acme.existing.lock().unwrap() = Some(CertificateRecord {
            domains: domains.iter().map(|d| d.to_string()).collect(),
            expires_at: expires_at.map(str::to_string),
            active: false,
        });
        acme
    }

    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn renewals(&self) -> usize {
        self.renewals.load(Ordering::SeqCst)
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    fn record(&self, domains: &[String]) -> CertificateRecord {
        CertificateRecord {
            domains: domains.to_vec(),
            expires_at: Some(if self.issued_expiry.is_empty() {
                "2026-05-30T00:00:00Z".to_string()
            } else {
                self.issued_expiry.clone()
            }),
            active: false,
        }
    }
}

#[async_trait]
impl AcmeClient for FakeAcme {
    async fn check(&self, _domains: &[String]) -> Result<Option<CertificateRecord>> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.existing.lock().unwrap().clone())
    }

    async fn register(&self, request: &CertificateRequest) -> Result<CertificateRecord> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        if self.fail_register {
            return Err(SiteError::CommandFailed {
                command: "certbot certonly".to_string(),
                message: "Challenge failed for domain".to_string(),
            });
        }
        let record = self.record(&request.domains);
        *self.existing.lock().unwrap() = Some(record.clone());
        Ok(record)
    }

    async fn renew(
        &self,
        request: &CertificateRequest,
        _previous: &CertificateRecord,
    ) -> Result<CertificateRecord> {
        self.renewals.fetch_add(1, Ordering::SeqCst);
        let record = self.record(&request.domains);
        *self.existing.lock().unwrap() = Some(record.clone());
        Ok(record)
    }
}

pub fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|k| k.to_string()).collect()
}
