mod common;

use common::Harness;
use imvu_gate::{ContextKey, GateId};
use imvu_ledger::EventType;
use imvu_lifecycle::{list_bundles, verify_bundle, LifecycleError, TenantStatus};
use imvu_revenue::CostCategory;
use imvu_types::{ErrorKind, TimeRange};

#[tokio::test]
async fn full_lifecycle_ends_in_a_verified_bundle() {
    let h = Harness::new();
    let tenant = h.create().await;
    h.manager
        .record_usage(&tenant.id, CostCategory::Compute, 1_000, h.ctx(&tenant.id))
        .await
        .unwrap();

    let exported = h.manager.export_tenant(&tenant.id, h.ctx(&tenant.id)).await.unwrap();
    assert_eq!(exported.status, TenantStatus::Exported);
    let bundle = exported.last_export.clone().unwrap();

    let root = &h.manager.config().export_root;
    assert_eq!(list_bundles(root, &tenant.id).unwrap(), vec![bundle.clone()]);
    assert_eq!(h.manager.bundles(&tenant.id).unwrap(), vec![bundle.clone()]);
    let manifest = verify_bundle(&bundle).unwrap();
    assert_eq!(manifest.tenant_id, tenant.id);
    assert_eq!(manifest.ledger_events, 2);
    let files: Vec<&str> = manifest.artifacts.iter().map(|a| a.file.as_str()).collect();
    assert_eq!(
        files,
        vec![
            "compute-image.json",
            "dns-zone.json",
            "mail-archive.json",
            "network-slice.json",
            "ledger.jsonl"
        ]
    );
    let slice = std::fs::read_to_string(bundle.join("ledger.jsonl")).unwrap();
    assert_eq!(slice.lines().count(), 2);

    let deleted = h.manager.delete_tenant(&tenant.id, h.ctx(&tenant.id)).await.unwrap();
    assert_eq!(deleted.status, TenantStatus::Deleted);
    assert!(!h.compute.is_provisioned(&tenant.id));
    assert!(!h.network.is_provisioned(&tenant.id));
    // Exported bundles outlive the tenant.
    assert!(verify_bundle(&bundle).is_ok());

    let lifecycle = h
        .ledger
        .query(&tenant.id, TimeRange::all(), Some(&EventType::TenantLifecycle))
        .await
        .unwrap();
    let to: Vec<_> = lifecycle.iter().map(|e| e.payload_str("to")).collect();
    assert_eq!(to, vec![Some("active"), Some("exported"), Some("deleted")]);
    assert!(h.manager.verify_chain(&tenant.id).await.unwrap().is_intact());
}

#[tokio::test]
async fn failed_mail_export_publishes_nothing() {
    let h = Harness::new();
    let tenant = h.create().await;
    h.mail.fail_on("export");

    let err = h
        .manager
        .export_tenant(&tenant.id, h.ctx(&tenant.id))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Collaborator(_)));
    assert!(h.journal().contains(&"domain:export".to_string()));

    assert!(list_bundles(&h.manager.config().export_root, &tenant.id)
        .unwrap()
        .is_empty());
    assert!(h.export_entries().is_empty());
    let after = h.manager.get_tenant(&tenant.id).await.unwrap();
    assert_eq!(after.status, TenantStatus::Active);
    assert_eq!(after.last_export, None);
}

#[tokio::test]
async fn tampered_chain_is_never_exported() {
    let h = Harness::new();
    let tenant = h.create().await;
    let usage = h
        .manager
        .record_usage(&tenant.id, CostCategory::Dns, 10, h.ctx(&tenant.id))
        .await
        .unwrap();

    let mut forged = usage.clone();
    forged.payload.insert("units".into(), serde_json::json!(1));
    assert!(h.backend.replace_event(&tenant.id, usage.sequence, forged));

    let err = h
        .manager
        .export_tenant(&tenant.id, h.ctx(&tenant.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    match err {
        LifecycleError::Integrity { verification } => {
            assert_eq!(verification.first_broken_event(), Some(usage.id));
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(h.export_entries().is_empty());
    assert!(h.journal().iter().all(|c| !c.ends_with(":export")));
}

#[tokio::test]
async fn export_requires_an_audit_request() {
    let h = Harness::new();
    let tenant = h.create().await;
    let mut ctx = h.ctx(&tenant.id);
    ctx.remove(ContextKey::RequestId);

    let err = h.manager.export_tenant(&tenant.id, ctx).await.unwrap_err();
    assert_eq!(
        err.as_compliance().unwrap().failed_gates(),
        vec![GateId::AuditLogging]
    );
    assert!(h.export_entries().is_empty());
}

#[tokio::test]
async fn delete_is_best_effort_and_retryable() {
    let h = Harness::new();
    let tenant = h.create().await;
    h.manager.export_tenant(&tenant.id, h.ctx(&tenant.id)).await.unwrap();
    h.domain.fail_on("deprovision");

    let err = h
        .manager
        .delete_tenant(&tenant.id, h.ctx(&tenant.id))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(
        h.manager.get_tenant(&tenant.id).await.unwrap().status,
        TenantStatus::Exported
    );
    // Deprovisioning is not undone; the other collaborators are already gone.
    assert!(!h.mail.is_provisioned(&tenant.id));
    assert!(h.domain.is_provisioned(&tenant.id));

    let audits = h
        .ledger
        .query(&tenant.id, TimeRange::all(), Some(&EventType::AuditAction))
        .await
        .unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].payload_str("action"), Some("deprovision-failed"));

    h.domain.recover("deprovision");
    let deleted = h.manager.delete_tenant(&tenant.id, h.ctx(&tenant.id)).await.unwrap();
    assert_eq!(deleted.status, TenantStatus::Deleted);
    assert!(!h.domain.is_provisioned(&tenant.id));
}

#[tokio::test]
async fn suspended_tenants_can_be_exported() {
    let h = Harness::new();
    let tenant = h.create().await;
    h.manager.suspend(&tenant.id, h.ctx(&tenant.id)).await.unwrap();
    let exported = h.manager.export_tenant(&tenant.id, h.ctx(&tenant.id)).await.unwrap();
    assert_eq!(exported.status, TenantStatus::Exported);

    let err = h
        .manager
        .export_tenant(&tenant.id, h.ctx(&tenant.id))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::IllegalTransition { .. }));
}
