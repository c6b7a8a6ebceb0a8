use crate::core::access_control::{AccessControlEditor, RegionSplit};
use crate::core::config_text::ConfigTextBuilder;
use crate::core::layout::SiteLayout;
use crate::core::locks::DomainLocks;
use crate::domain::model::{
    AccessControlUpdate, ActivationOutcome, Domain, KeyOperation, ProxyAction, SiteConfig,
    SiteState,
};
use crate::domain::ports::{PrivilegedFileOps, ProcessController, Storage};
use crate::utils::error::{Result, SiteError, Stage};
use crate::utils::validation::{validate_domain_key, validate_hostname};
use std::path::Path;

/// 站台狀態機：產生 → 啟用 → reload → 停用 → 移除
///
/// 狀態一律由 sites-enabled 的符號連結推導。每個會改變啟用集合的轉換之後都會
/// reload 一次；任何步驟失敗即中止並回報失敗的步驟，已完成的步驟不會回滾。
pub struct SiteLifecycleManager<S: Storage, F: PrivilegedFileOps, P: ProcessController> {
    layout: SiteLayout,
    builder: ConfigTextBuilder,
    editor: AccessControlEditor,
    store: S,
    files: F,
    process: P,
    locks: DomainLocks,
}

impl<S: Storage, F: PrivilegedFileOps, P: ProcessController> SiteLifecycleManager<S, F, P> {
    pub fn new(
        layout: SiteLayout,
        builder: ConfigTextBuilder,
        editor: AccessControlEditor,
        store: S,
        files: F,
        process: P,
    ) -> Self {
        Self {
            builder,
            editor,
            store,
            files,
            process,
            locks: DomainLocks::with_lock_dir(layout.staging_dir.join(".locks")),
            layout,
        }
    }

    pub fn layout(&self) -> &SiteLayout {
        &self.layout
    }

    /// 由檔案系統推導目前狀態
    pub async fn current_state(&self, domain: &Domain) -> Result<SiteState> {
        self.state_of(domain.config_name()).await
    }

    /// 產生設定並啟用。已啟用且沒有金鑰操作時直接略過，不會 reload
    pub async fn create_and_activate(
        &self,
        domain: &Domain,
        access: AccessControlUpdate,
    ) -> Result<ActivationOutcome> {
        ensure_custom(domain)?;
        let _guard = self.locks.acquire(domain.config_name()).await?;
        self.activate_locked(domain, access).await
    }

    pub async fn enable(&self, domain: &Domain) -> Result<()> {
        ensure_custom(domain)?;
        let name = domain.config_name();
        let _guard = self.locks.acquire(name).await?;
        tracing::info!("🔗 Enabling site {}", name);

        let available = self.layout.available_path(name);
        let found = self
            .store
            .exists(&available)
            .await
            .map_err(|e| e.at_stage(Stage::ReadConfig))?;
        if !found {
            return Err(SiteError::FileOperationFailed {
                stage: Stage::CreateLink,
                source: Box::new(SiteError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} does not exist", available.display()),
                ))),
            });
        }

        self.relink(name).await?;
        self.reload().await
    }

    /// 移除啟用連結 (不存在也算成功) 後 reload
    pub async fn disable(&self, domain: &Domain) -> Result<()> {
        ensure_custom(domain)?;
        let name = domain.config_name();
        let _guard = self.locks.acquire(name).await?;
        tracing::info!("⏸️ Disabling site {}", name);

        self.unlink(name, Stage::Disable).await?;
        self.reload().await
    }

    /// 先停用再刪除 available 檔案，兩個步驟各 reload 一次
    pub async fn remove(&self, domain: &Domain) -> Result<()> {
        ensure_custom(domain)?;
        let name = domain.config_name();
        let _guard = self.locks.acquire(name).await?;
        tracing::info!("🗑️ Removing site {}", name);

        self.unlink(name, Stage::Disable).await?;
        self.reload().await?;

        self.files
            .remove(&self.layout.available_path(name))
            .await
            .map_err(|e| e.at_stage(Stage::RemoveAvailable))?;
        self.reload().await
    }

    /// 新增或移除網域金鑰。讀取、合併與寫回在同一把鎖內完成
    pub async fn update_domain_keys(
        &self,
        domain: &Domain,
        operation: KeyOperation,
        keys: &[String],
    ) -> Result<ActivationOutcome> {
        validate_hostname(&domain.full_domain)?;
        for key in keys {
            validate_domain_key(key)?;
        }
        let (keys_to_add, keys_to_remove) = operation.split(keys);

        let name = domain.config_name();
        let _guard = self.locks.acquire(name).await?;
        tracing::info!(
            "🔑 {:?} {} domain key(s) for {}",
            operation,
            keys.len(),
            domain.full_domain
        );

        let enabled_path = self.layout.enabled_path(name);
        let existing = self.read_required(&enabled_path).await?;

        if domain.is_seeded {
            let certificates = self.builder.certificate_paths(domain);
            let text = self.editor.merge_with(
                &existing,
                &domain.full_domain,
                keys_to_add,
                keys_to_remove,
                |keys| {
                    let rule = self.editor.server_rule(keys);
                    self.builder
                        .build_tls_block(domain, &certificates, Some(&rule))
                },
            )?;

            let config = self.site_config(domain, text);
            self.install(&config).await?;
            self.reload().await?;
            Ok(ActivationOutcome::Activated)
        } else {
            let plan = self.editor.plan_site(
                &existing,
                &domain.full_domain,
                keys_to_add,
                keys_to_remove,
            )?;
            let snippet = self.editor.snippet(&domain.full_domain, &plan);

            self.activate_locked(domain, AccessControlUpdate::Replace(snippet))
                .await
        }
    }

    /// 直接控制 nginx 服務
    pub async fn control(&self, action: ProxyAction) -> Result<()> {
        tracing::info!("⚙️ nginx {}", action);
        self.process
            .control(action)
            .await
            .map_err(|e| process_error(action, e))
    }

    async fn activate_locked(
        &self,
        domain: &Domain,
        access: AccessControlUpdate,
    ) -> Result<ActivationOutcome> {
        let name = domain.config_name();
        let state = self.state_of(name).await?;

        if state == SiteState::Enabled && access == AccessControlUpdate::Keep {
            tracing::info!("✅ Site {} already enabled", name);
            return Ok(ActivationOutcome::AlreadyEnabled);
        }
        tracing::info!("🛠️ Creating and activating site {} (currently {:?})", name, state);

        let snippet = match access {
            AccessControlUpdate::Keep => self.carried_region(domain).await?,
            AccessControlUpdate::Replace(snippet) => snippet,
        };

        // 先拿掉舊連結，最後只 reload 一次
        if state == SiteState::Enabled {
            self.unlink(name, Stage::Disable).await?;
        }

        let certificates = self.builder.certificate_paths(domain);
        let text = self
            .builder
            .build(domain, &certificates, snippet.as_deref())
            .map_err(|e| e.at_stage(Stage::Render))?;

        let config = self.site_config(domain, text);
        self.install(&config).await?;
        self.reload().await?;

        tracing::info!("✅ Site {} activated", name);
        Ok(ActivationOutcome::Activated)
    }

    /// 重建時沿用 available 檔中既有的金鑰區塊；沒有標記的舊規則改寫成區塊
    async fn carried_region(&self, domain: &Domain) -> Result<Option<String>> {
        let available = self.layout.available_path(domain.config_name());
        let text = self
            .store
            .read_file(&available)
            .await
            .map_err(|e| e.at_stage(Stage::ReadConfig))?;
        let Some(text) = text else {
            return Ok(None);
        };

        if let Some(region) = RegionSplit::parse(&text, &domain.full_domain).region_text() {
            return Ok(Some(region.to_string()));
        }
        let plan = self.editor.plan_site(&text, &domain.full_domain, &[], &[])?;
        Ok(self.editor.snippet(&domain.full_domain, &plan))
    }

    async fn state_of(&self, name: &str) -> Result<SiteState> {
        let enabled = self.layout.enabled_path(name);
        let target = self
            .store
            .read_link(&enabled)
            .await
            .map_err(|e| e.at_stage(Stage::ReadConfig))?;

        if let Some(target) = target {
            if !self.layout.points_into_available(&target) {
                tracing::warn!(
                    "⚠️ {} points outside sites-available ({})",
                    enabled.display(),
                    target.display()
                );
            } else if self
                .store
                .exists(&target)
                .await
                .map_err(|e| e.at_stage(Stage::ReadConfig))?
            {
                return Ok(SiteState::Enabled);
            } else {
                // 懸空連結：nginx 不會載入，視同未啟用，下次啟用時會被取代
                tracing::warn!(
                    "⚠️ {} points to missing {}",
                    enabled.display(),
                    target.display()
                );
            }
        }

        let available = self
            .store
            .exists(&self.layout.available_path(name))
            .await
            .map_err(|e| e.at_stage(Stage::ReadConfig))?;
        Ok(if available {
            SiteState::Disabled
        } else {
            SiteState::Absent
        })
    }

    fn site_config(&self, domain: &Domain, rendered_text: String) -> SiteConfig {
        let name = domain.config_name();
        SiteConfig {
            domain: domain.clone(),
            rendered_text,
            file_path: self.layout.staging_path(name),
            target_available_path: self.layout.available_path(name),
            target_enabled_path: self.layout.enabled_path(name),
        }
    }

    /// staging → sites-available → sites-enabled
    async fn install(&self, config: &SiteConfig) -> Result<()> {
        tracing::debug!("Writing staging file {}", config.file_path.display());
        self.store
            .write_file(&config.file_path, &config.rendered_text)
            .await
            .map_err(|e| e.at_stage(Stage::WriteStaging))?;

        tracing::debug!(
            "Moving {} into {}",
            config.file_path.display(),
            self.layout.available_dir.display()
        );
        self.files
            .move_into(&config.file_path, &self.layout.available_dir)
            .await
            .map_err(|e| e.at_stage(Stage::MoveToAvailable))?;

        self.link(&config.target_available_path, &config.target_enabled_path)
            .await
    }

    async fn relink(&self, name: &str) -> Result<()> {
        self.link(
            &self.layout.available_path(name),
            &self.layout.enabled_path(name),
        )
        .await
    }

    /// 先移除同名連結，避免 `ln` 因衝突失敗
    async fn link(&self, available: &Path, enabled: &Path) -> Result<()> {
        self.files
            .remove(enabled)
            .await
            .map_err(|e| e.at_stage(Stage::RemoveStaleLink))?;

        tracing::debug!("Linking {} -> {}", enabled.display(), available.display());
        self.files
            .symlink(available, enabled)
            .await
            .map_err(|e| e.at_stage(Stage::CreateLink))
    }

    async fn unlink(&self, name: &str, stage: Stage) -> Result<()> {
        self.files
            .remove(&self.layout.enabled_path(name))
            .await
            .map_err(|e| e.at_stage(stage))
    }

    async fn reload(&self) -> Result<()> {
        self.process
            .control(ProxyAction::Reload)
            .await
            .map_err(|e| process_error(ProxyAction::Reload, e))
    }

    async fn read_required(&self, path: &Path) -> Result<String> {
        self.store
            .read_file(path)
            .await
            .and_then(|text| {
                text.ok_or_else(|| {
                    SiteError::IoError(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("{} does not exist", path.display()),
                    ))
                })
            })
            .map_err(|e| e.at_stage(Stage::ReadConfig))
    }
}

fn process_error(action: ProxyAction, err: SiteError) -> SiteError {
    match err {
        e @ SiteError::ProcessControlFailed { .. } => e,
        other => SiteError::ProcessControlFailed {
            action: action.to_string(),
            message: other.to_string(),
        },
    }
}

/// seeded 網域共用 zone 的設定檔，只能透過金鑰操作修改
fn ensure_custom(domain: &Domain) -> Result<()> {
    validate_hostname(&domain.full_domain)?;
    if domain.is_seeded {
        return Err(SiteError::InvalidDomainDescriptor {
            reason: format!(
                "{} is served by the shared {} configuration",
                domain.full_domain, domain.base_domain
            ),
        });
    }
    Ok(())
}
