mod common;

use common::Sandbox;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};
use vhost_warden::core::{AccessControlUpdate, ActivationOutcome, Domain, SiteState};
use vhost_warden::utils::error::Stage;
use vhost_warden::SiteError;

const HOST: &str = "shop.acme.io";

#[tokio::test]
async fn test_create_and_activate_new_site() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let domain = Domain::custom(HOST);

    let outcome = assert_ok!(
        manager
            .create_and_activate(&domain, AccessControlUpdate::Keep)
            .await
    );
    assert_eq!(outcome, ActivationOutcome::Activated);
    assert_eq!(sandbox.process.reloads(), 1);
    assert_eq!(
        assert_ok!(manager.current_state(&domain).await),
        SiteState::Enabled
    );

    let text = sandbox.read_available(HOST);
    assert!(text.contains("listen 80;"));
    assert!(text.contains("server_name shop.acme.io;"));
    let fullchain = sandbox.certificates.live_dir.join(HOST).join("fullchain.pem");
    assert!(text.contains(&format!("ssl_certificate {};", fullchain.display())));
    assert!(!text.contains("DOMAIN KEY CONFIG"));

    assert!(sandbox.is_linked(HOST));
    assert_eq!(
        std::fs::read_link(sandbox.enabled(HOST)).unwrap(),
        sandbox.available(HOST)
    );
    // staging 檔已移入 sites-available
    assert!(!sandbox.layout.staging_path(HOST).exists());
}

#[tokio::test]
async fn test_create_and_activate_is_idempotent() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let domain = Domain::custom(HOST);

    assert_ok!(manager.create_and_activate(&domain, AccessControlUpdate::Keep).await);
    let first = sandbox.read_available(HOST);

    let outcome = assert_ok!(
        manager
            .create_and_activate(&domain, AccessControlUpdate::Keep)
            .await
    );
    assert_eq!(outcome, ActivationOutcome::AlreadyEnabled);
    assert_eq!(sandbox.process.reloads(), 1);
    assert_eq!(sandbox.read_available(HOST), first);
}

#[tokio::test]
async fn test_disable_never_enabled_site_still_reloads() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let domain = Domain::custom(HOST);

    assert_ok!(manager.disable(&domain).await);
    assert_eq!(sandbox.process.reloads(), 1);
    assert_eq!(
        assert_ok!(manager.current_state(&domain).await),
        SiteState::Absent
    );
}

#[tokio::test]
async fn test_disable_then_enable() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let domain = Domain::custom(HOST);

    assert_ok!(manager.create_and_activate(&domain, AccessControlUpdate::Keep).await);
    assert_ok!(manager.disable(&domain).await);
    assert_eq!(
        assert_ok!(manager.current_state(&domain).await),
        SiteState::Disabled
    );
    assert!(!sandbox.is_linked(HOST));
    assert!(sandbox.available(HOST).exists());

    assert_ok!(manager.enable(&domain).await);
    assert_eq!(
        assert_ok!(manager.current_state(&domain).await),
        SiteState::Enabled
    );
    assert_eq!(sandbox.process.reloads(), 3);
}

#[tokio::test]
async fn test_reactivating_disabled_site_rebuilds() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let domain = Domain::custom(HOST);

    assert_ok!(manager.create_and_activate(&domain, AccessControlUpdate::Keep).await);
    assert_ok!(manager.disable(&domain).await);

    let outcome = assert_ok!(
        manager
            .create_and_activate(&domain, AccessControlUpdate::Keep)
            .await
    );
    assert_eq!(outcome, ActivationOutcome::Activated);
    assert!(sandbox.is_linked(HOST));
    assert_eq!(sandbox.process.reloads(), 3);
}

#[tokio::test]
async fn test_enable_without_available_file_fails_at_create_link() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();

    let err = assert_err!(manager.enable(&Domain::custom(HOST)).await);
    assert_eq!(err.stage(), Some(Stage::CreateLink));
    assert_eq!(sandbox.process.reloads(), 0);
}

#[tokio::test]
async fn test_remove_deletes_config_and_reloads_twice() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let domain = Domain::custom(HOST);

    assert_ok!(manager.create_and_activate(&domain, AccessControlUpdate::Keep).await);
    assert_ok!(manager.remove(&domain).await);

    assert_eq!(
        assert_ok!(manager.current_state(&domain).await),
        SiteState::Absent
    );
    assert!(!sandbox.available(HOST).exists());
    assert_eq!(sandbox.process.reloads(), 3);
}

#[tokio::test]
async fn test_reload_failure_is_reported_without_rollback() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let domain = Domain::custom(HOST);
    sandbox.process.set_failing(true);

    let err = assert_err!(
        manager
            .create_and_activate(&domain, AccessControlUpdate::Keep)
            .await
    );
    assert!(matches!(err, SiteError::ProcessControlFailed { .. }));
    assert_eq!(err.stage(), Some(Stage::Reload));

    // 已完成的步驟保留
    assert!(sandbox.available(HOST).exists());
    assert!(sandbox.is_linked(HOST));
}

#[tokio::test]
async fn test_move_failure_names_the_stage() {
    let sandbox = Sandbox::new();
    std::fs::remove_dir_all(&sandbox.layout.available_dir).unwrap();
    let manager = sandbox.manager();

    let err = assert_err!(
        manager
            .create_and_activate(&Domain::custom(HOST), AccessControlUpdate::Keep)
            .await
    );
    assert_eq!(err.stage(), Some(Stage::MoveToAvailable));
    assert!(!sandbox.is_linked(HOST));
    assert_eq!(sandbox.process.reloads(), 0);
}

#[tokio::test]
async fn test_seeded_domain_is_rejected() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let domain = Domain::seeded("acme.tenants.example.com", "tenants.example.com");

    let err = assert_err!(
        manager
            .create_and_activate(&domain, AccessControlUpdate::Keep)
            .await
    );
    assert!(matches!(err, SiteError::InvalidDomainDescriptor { .. }));
    assert!(matches!(
        manager.remove(&domain).await,
        Err(SiteError::InvalidDomainDescriptor { .. })
    ));
    assert_eq!(sandbox.process.reloads(), 0);
}

#[tokio::test]
async fn test_invalid_host_is_rejected_before_any_io() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();

    let err = assert_err!(
        manager
            .create_and_activate(&Domain::custom("bad_host!"), AccessControlUpdate::Keep)
            .await
    );
    assert!(matches!(err, SiteError::InvalidDomainDescriptor { .. }));
    assert_eq!(sandbox.process.reloads(), 0);
}

#[tokio::test]
async fn test_path_like_host_is_rejected_by_every_transition() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let domain = Domain::custom("../x");

    for err in [
        assert_err!(manager.disable(&domain).await),
        assert_err!(manager.enable(&domain).await),
        assert_err!(manager.remove(&domain).await),
    ] {
        assert!(matches!(err, SiteError::InvalidDomainDescriptor { .. }));
    }
    assert_eq!(sandbox.process.reloads(), 0);
}

#[tokio::test]
async fn test_dangling_link_is_not_enabled() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let domain = Domain::custom(HOST);

    assert_ok!(manager.create_and_activate(&domain, AccessControlUpdate::Keep).await);
    std::fs::remove_file(sandbox.available(HOST)).unwrap();
    assert!(std::fs::symlink_metadata(sandbox.enabled(HOST)).is_ok());

    assert_eq!(
        assert_ok!(manager.current_state(&domain).await),
        SiteState::Absent
    );

    let outcome = assert_ok!(
        manager
            .create_and_activate(&domain, AccessControlUpdate::Keep)
            .await
    );
    assert_eq!(outcome, ActivationOutcome::Activated);
    assert!(sandbox.available(HOST).exists());
    assert!(sandbox.is_linked(HOST));
    assert_eq!(sandbox.process.reloads(), 2);
}

#[tokio::test]
async fn test_separate_managers_share_the_domain_lock() {
    let sandbox = Sandbox::new();
    // 兩個各自建立的 manager，如同兩個 CLI 行程
    let first = Arc::new(sandbox.manager());
    let second = Arc::new(sandbox.manager());
    let domain = Domain::custom(HOST);

    let (a, b) = tokio::join!(
        first.create_and_activate(&domain, AccessControlUpdate::Keep),
        second.create_and_activate(&domain, AccessControlUpdate::Keep),
    );
    let mut outcomes = vec![assert_ok!(a), assert_ok!(b)];
    outcomes.sort_by_key(|o| *o == ActivationOutcome::AlreadyEnabled);

    assert_eq!(
        outcomes,
        vec![ActivationOutcome::Activated, ActivationOutcome::AlreadyEnabled]
    );
    assert_eq!(sandbox.process.reloads(), 1);
    assert!(sandbox
        .layout
        .staging_dir
        .join(".locks")
        .join(format!("{}.lock", HOST))
        .exists());
}

#[tokio::test]
async fn test_concurrent_requests_for_same_domain_are_serialized() {
    let sandbox = Sandbox::new();
    let manager = Arc::new(sandbox.manager());
    let domain = Domain::custom(HOST);

    let (a, b) = tokio::join!(
        manager.create_and_activate(&domain, AccessControlUpdate::Keep),
        manager.create_and_activate(&domain, AccessControlUpdate::Keep),
    );
    let mut outcomes = vec![assert_ok!(a), assert_ok!(b)];
    outcomes.sort_by_key(|o| *o == ActivationOutcome::AlreadyEnabled);

    assert_eq!(
        outcomes,
        vec![ActivationOutcome::Activated, ActivationOutcome::AlreadyEnabled]
    );
    assert_eq!(sandbox.process.reloads(), 1);
}
