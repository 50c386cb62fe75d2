mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::Harness;
use imvu_ledger::EventType;
use imvu_lifecycle::{LifecycleError, TenantStatus};
use imvu_revenue::CostCategory;
use imvu_types::{ResourceEnvelope, TimeRange};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_usage_keeps_one_linear_chain() {
    let h = Harness::new();
    let tenant = h.create().await;

    let mut tasks = Vec::new();
    for units in 1..=32u64 {
        let manager = h.manager.clone();
        let ctx = h.ctx(&tenant.id);
        let id = tenant.id.clone();
        tasks.push(tokio::spawn(async move {
            manager.record_usage(&id, CostCategory::Dns, units, ctx).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let events = h.manager.audit_trail(&tenant.id, TimeRange::all()).await.unwrap();
    assert_eq!(events.len(), 33);
    let previous: HashSet<_> = events.iter().map(|e| e.previous_hash.clone()).collect();
    assert_eq!(previous.len(), events.len());
    assert!(h.manager.verify_chain(&tenant.id).await.unwrap().is_intact());

    let summary = h.manager.revenue_summary(&tenant.id, TimeRange::all()).await.unwrap();
    assert_eq!(summary.dns_cost_minor, (1..=32).sum::<i64>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_transitions_commit_exactly_once() {
    let h = Harness::new();
    let tenant = h.create().await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let manager = h.manager.clone();
        let ctx = h.ctx(&tenant.id);
        let id = tenant.id.clone();
        tasks.push(tokio::spawn(async move { manager.suspend(&id, ctx).await }));
    }

    let mut committed = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(t) => {
                assert_eq!(t.status, TenantStatus::Suspended);
                committed += 1;
            }
            Err(LifecycleError::Conflict { .. }) | Err(LifecycleError::IllegalTransition { .. }) => {}
            Err(other) => panic!("unexpected error {other}"),
        }
    }
    assert_eq!(committed, 1);

    let after = h.manager.get_tenant(&tenant.id).await.unwrap();
    let lifecycle = h
        .ledger
        .query(&tenant.id, TimeRange::all(), Some(&EventType::TenantLifecycle))
        .await
        .unwrap();
    assert_eq!(after.version, lifecycle.len() as u64);
    assert_eq!(after.version, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scale_races_suspend_without_losing_a_transition() {
    let h = Harness::new();
    let tenant = h.create().await;

    let scale = {
        let manager = h.manager.clone();
        let ctx = h.ctx(&tenant.id);
        let id = tenant.id.clone();
        tokio::spawn(async move { manager.scale(&id, ResourceEnvelope::new(4, 8, 40, 200), ctx).await })
    };
    let suspend = {
        let manager = h.manager.clone();
        let ctx = h.ctx(&tenant.id);
        let id = tenant.id.clone();
        tokio::spawn(async move { manager.suspend(&id, ctx).await })
    };
    let scaled = scale.await.unwrap();
    let suspended = suspend.await.unwrap();
    assert!(scaled.is_ok() || suspended.is_ok());

    let after = h.manager.get_tenant(&tenant.id).await.unwrap();
    let lifecycle = h
        .ledger
        .query(&tenant.id, TimeRange::all(), Some(&EventType::TenantLifecycle))
        .await
        .unwrap();
    assert_eq!(after.version, lifecycle.len() as u64);
    let last_to = lifecycle.last().and_then(|e| e.payload_str("to")).unwrap();
    assert_eq!(last_to, after.status.as_str());
    assert!(h.manager.verify_chain(&tenant.id).await.unwrap().is_intact());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tenants_are_created_in_parallel() {
    let h = Harness::new();
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let manager = h.manager.clone();
        let id = manager.allocate_tenant_id();
        let request = h.request();
        let ctx = h.create_ctx(&id);
        tasks.push(tokio::spawn(async move { manager.create_tenant(request, ctx).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let tenants = h.manager.list_tenants().await;
    assert_eq!(tenants.len(), 8);
    let domains: HashSet<_> = tenants.iter().map(|t| t.domain.clone()).collect();
    assert_eq!(domains.len(), 8);
    for tenant in &tenants {
        assert!(h.manager.verify_chain(&tenant.id).await.unwrap().is_intact());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn usage_during_export_invalidates_the_bundle() {
    let h = Harness::new();
    let tenant = h.create().await;
    h.compute.delay_on("export", Duration::from_millis(300));

    let export = {
        let manager = h.manager.clone();
        let ctx = h.ctx(&tenant.id);
        let id = tenant.id.clone();
        tokio::spawn(async move { manager.export_tenant(&id, ctx).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let usage = h
        .manager
        .record_usage(&tenant.id, CostCategory::Compute, 10, h.ctx(&tenant.id))
        .await
        .unwrap();

    let err = export.await.unwrap().unwrap_err();
    match &err {
        LifecycleError::ChainMoved { actual, .. } => assert_eq!(actual, &usage.hash),
        other => panic!("unexpected error {other}"),
    }
    assert!(h.manager.bundles(&tenant.id).unwrap().is_empty());
    let after = h.manager.get_tenant(&tenant.id).await.unwrap();
    assert_eq!(after.status, TenantStatus::Active);
    assert_eq!(after.last_export, None);

    // A retry exports the usage event too.
    h.compute.delay_on("export", Duration::ZERO);
    let exported = h.manager.export_tenant(&tenant.id, h.ctx(&tenant.id)).await.unwrap();
    let manifest = imvu_lifecycle::verify_bundle(&exported.last_export.unwrap()).unwrap();
    assert_eq!(manifest.ledger_events, 2);
    assert_eq!(manifest.chain_head, usage.hash);
}
