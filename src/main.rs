use anyhow::Context;
use clap::Parser;
use serde_json::{json, Value};
use std::sync::Arc;
use vhost_warden::adapters::{
    CertbotClient, CertbotSettings, LocalFileOps, LocalStorage, ServiceController, SudoFileOps,
    TokioCommandRunner,
};
use vhost_warden::config::cli::{Cli, Command};
use vhost_warden::core::certificate::AcmeAccount;
use vhost_warden::core::{AccessControlUpdate, PrivilegedFileOps, ProxyAction};
use vhost_warden::utils::error::ErrorSeverity;
use vhost_warden::utils::{logger, validation::Validate};
use vhost_warden::{
    CertificateOrchestrator, DomainKeyService, SiteError, SiteLifecycleManager, WardenConfig,
};

type Manager<F> = SiteLifecycleManager<LocalStorage, F, ServiceController<TokioCommandRunner>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    let mut config = match &cli.config {
        Some(path) => WardenConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path))?,
        None => WardenConfig::default(),
    };
    if let Some(root) = &cli.nginx_path {
        config.nginx.root = Some(root.clone());
    }
    if cli.verbose {
        tracing::debug!("Configuration: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let result = if config.use_sudo() {
        execute(&cli, &config, SudoFileOps::new(TokioCommandRunner)).await
    } else {
        execute(&cli, &config, LocalFileOps).await
    };

    match result {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Err(e) => {
            tracing::error!(
                "❌ {} failed: {} (stage: {:?}, severity: {:?})",
                command_name(&cli.command),
                e,
                e.stage(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 4,      // 請求錯誤
                ErrorSeverity::Medium => 2,   // 可重試
                ErrorSeverity::High => 1,     // 處理錯誤
                ErrorSeverity::Critical => 3, // 系統錯誤
            };
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Cert(_) => "cert",
        Command::Activate(_) => "activate",
        Command::Deactivate(_) => "deactivate",
        Command::Delete(_) => "delete",
        Command::Keys { .. } => "keys",
        Command::Status(_) => "status",
        Command::Proxy { .. } => "proxy",
    }
}

fn build_manager<F: PrivilegedFileOps>(config: &WardenConfig, files: F) -> Manager<F> {
    SiteLifecycleManager::new(
        config.site_layout(),
        config.text_builder(),
        config.access_control_editor(),
        LocalStorage::new(),
        files,
        ServiceController::new(TokioCommandRunner, config.service_name(), config.use_sudo()),
    )
}

async fn execute<F: PrivilegedFileOps>(
    cli: &Cli,
    config: &WardenConfig,
    files: F,
) -> Result<Value, SiteError> {
    let sites = Arc::new(build_manager(config, files));
    let resolver = config.domain_resolver();

    match &cli.command {
        Command::Cert(args) => {
            let acme = CertbotClient::new(
                TokioCommandRunner,
                CertbotSettings {
                    binary: config.certbot_binary().to_string(),
                    use_sudo: config.use_sudo(),
                    config_dir: config.cert_config_dir(),
                    webroot: config.webroot(),
                    server: config.acme_server().to_string(),
                },
            );
            let account = AcmeAccount {
                email: config.email().to_string(),
                rsa_key_size: config.rsa_key_size(),
            };
            let orchestrator = CertificateOrchestrator::new(
                acme,
                sites,
                resolver,
                config.renewal_policy(),
                account,
            );
            let outcome = orchestrator.generate(&args.site_request()?).await?;
            Ok(serde_json::to_value(outcome)?)
        }
        Command::Activate(args) => {
            let domain = resolver.resolve(&args.site_request()?.primary()?)?;
            let outcome = sites
                .create_and_activate(&domain, AccessControlUpdate::Keep)
                .await?;
            Ok(json!({ "domain": domain.full_domain, "outcome": outcome }))
        }
        Command::Deactivate(args) => {
            let domain = resolver.resolve(&args.site_request()?.primary()?)?;
            sites.disable(&domain).await?;
            Ok(json!({ "domain": domain.full_domain, "state": "disabled" }))
        }
        Command::Delete(args) => {
            let domain = resolver.resolve(&args.site_request()?.primary()?)?;
            sites.remove(&domain).await?;
            Ok(json!({ "domain": domain.full_domain, "state": "absent" }))
        }
        Command::Keys { action } => {
            let operation = action.operation();
            let request = action.args().key_request(operation)?;
            let service = DomainKeyService::new(sites, resolver);
            let results = service.apply(&request, operation).await?;
            Ok(serde_json::to_value(results)?)
        }
        Command::Status(args) => {
            let domains = resolver.resolve_all(&args.site_request()?.domains())?;
            let mut states = Vec::with_capacity(domains.len());
            for domain in &domains {
                let state = sites.current_state(domain).await?;
                states.push(json!({
                    "domain": domain.full_domain,
                    "config": domain.config_name(),
                    "seeded": domain.is_seeded,
                    "state": state,
                }));
            }
            Ok(Value::Array(states))
        }
        Command::Proxy { action } => {
            let action = ProxyAction::from(*action);
            sites.control(action).await?;
            Ok(json!({ "action": action.to_string() }))
        }
    }
}
