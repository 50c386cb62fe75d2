use std::collections::BTreeMap;
use std::sync::Arc;

use imvu_gate::{ActionContext, ContextKey, NetworkRoute, RouteType};
use imvu_lifecycle::mocks::MockResource;
use imvu_lifecycle::{verify_bundle, Collaborators, CreateTenantRequest, ResourceKind, TenantStatus};
use imvu_platform::{ConfigError, Platform, PlatformConfig};
use imvu_revenue::CostCategory;
use imvu_types::{ResourceEnvelope, TenantId, TimeRange};

fn collaborators() -> Collaborators {
    Collaborators::new()
        .with(Arc::new(MockResource::new(ResourceKind::Compute)))
        .with(Arc::new(MockResource::new(ResourceKind::Domain)))
        .with(Arc::new(MockResource::new(ResourceKind::Mail)))
        .with(Arc::new(MockResource::new(ResourceKind::Network)))
}

fn config(exports: &tempfile::TempDir) -> PlatformConfig {
    let mut config = PlatformConfig::default();
    config.ledger.platform_key_seed = Some("2a".repeat(32));
    config.lifecycle.export_root = exports.path().to_path_buf();
    config.revenue.compute_per_cpu_second_minor = 3;
    config
}

fn ctx(owner: &str, tenant: &TenantId) -> ActionContext {
    ActionContext::new()
        .with(ContextKey::Identity, owner)
        .with(ContextKey::ImvuId, tenant.as_str())
        .with(ContextKey::RequestId, "req-7")
        .with(ContextKey::BillingAccount, "acct-7")
        .with(ContextKey::ConsentRef, "consent-7")
        .with(ContextKey::ThrottleDisclosed, true)
}

#[tokio::test]
async fn bootstrapped_platform_runs_a_tenant_end_to_end() {
    let exports = tempfile::tempdir().unwrap();
    let platform = Platform::bootstrap(&config(&exports), collaborators()).unwrap();
    let owner = platform
        .identities()
        .issue("studio-owner", BTreeMap::new())
        .unwrap()
        .id;
    let manager = platform.manager();

    let id = manager.allocate_tenant_id();
    let create_ctx = ctx(owner.as_str(), &id).with(
        ContextKey::NetworkRoutes,
        vec![NetworkRoute::new(id.as_str(), RouteType::Public, vec!["/".to_string()])],
    );
    let request = CreateTenantRequest::new("Studio 7", owner.clone(), "US", ResourceEnvelope::new(1, 2, 10, 50));
    let tenant = manager.create_tenant(request, create_ctx).await.unwrap();
    assert_eq!(tenant.id, id);
    assert_eq!(tenant.status, TenantStatus::Active);

    manager
        .record_usage(&id, CostCategory::Compute, 100, ctx(owner.as_str(), &id))
        .await
        .unwrap();
    let summary = manager.revenue_summary(&id, TimeRange::all()).await.unwrap();
    assert_eq!(summary.total_cost_minor, 300);
    assert_eq!(summary.creator_share_minor, 165);
    assert_eq!(summary.platform_share_minor, 135);
    assert!(summary.verified_sum);

    let exported = manager.export_tenant(&id, ctx(owner.as_str(), &id)).await.unwrap();
    let bundle = exported.last_export.unwrap();
    assert!(bundle.starts_with(exports.path()));
    assert_eq!(verify_bundle(&bundle).unwrap().tenant_id, id);

    let results = platform.verify_ledger().await.unwrap();
    assert!(results.iter().any(|r| r.tenant_id == id));
    assert!(results.iter().all(|r| r.is_intact()));
}

#[test]
fn same_seed_gives_same_platform_identity() {
    let exports = tempfile::tempdir().unwrap();
    let first = Platform::bootstrap(&config(&exports), Collaborators::new()).unwrap();
    let second = Platform::bootstrap(&config(&exports), Collaborators::new()).unwrap();
    assert_eq!(first.platform_identity().id, second.platform_identity().id);
    assert_eq!(first.platform_identity().public_key, second.platform_identity().public_key);
}

#[test]
fn missing_seed_generates_a_fresh_identity() {
    let first = Platform::bootstrap(&PlatformConfig::default(), Collaborators::new()).unwrap();
    let second = Platform::bootstrap(&PlatformConfig::default(), Collaborators::new()).unwrap();
    assert_ne!(first.platform_identity().id, second.platform_identity().id);
}

#[test]
fn malformed_seed_is_rejected() {
    let exports = tempfile::tempdir().unwrap();
    let mut config = config(&exports);
    config.ledger.platform_key_seed = Some("not-hex".into());
    assert!(matches!(
        Platform::bootstrap(&config, Collaborators::new()),
        Err(ConfigError::InvalidSeed(_))
    ));
}

#[test]
fn negative_price_is_rejected() {
    let exports = tempfile::tempdir().unwrap();
    let mut config = config(&exports);
    config.revenue.mail_per_message_minor = -1;
    assert!(matches!(
        Platform::bootstrap(&config, Collaborators::new()),
        Err(ConfigError::Revenue(_))
    ));
}
