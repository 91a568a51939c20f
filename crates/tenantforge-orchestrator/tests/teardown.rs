mod common;

use common::{fast_settings, harness, harness_with};
use tenantforge_core::{ProvisionError, ResourceHandle, ResourceKind, TenantConfig, TenantId};
use tenantforge_orchestrator::{DeletionStatus, TeardownOutcome, TeardownReport};
use tenantforge_providers::memory::Operation;
use tenantforge_store::{ConfigStore, DirectoryStore};

fn acme1() -> TenantId {
    TenantId::parse("acme1").unwrap()
}

fn completed(outcome: TeardownOutcome) -> TeardownReport {
    match outcome {
        TeardownOutcome::Completed(report) => report,
        TeardownOutcome::NotFound => panic!("expected a completed teardown"),
    }
}

fn teardown_order() -> Vec<ResourceKind> {
    ResourceKind::ALL.into_iter().rev().collect()
}

#[tokio::test]
async fn teardown_removes_everything_provisioning_created() {
    let h = harness();
    h.orchestrator.provision("acme1").await.unwrap();

    let report = completed(h.orchestrator.deprovision("acme1").await.unwrap());

    assert!(report.is_complete(), "{report:?}");
    let kinds: Vec<_> = report.deletions.iter().map(|d| d.kind).collect();
    assert_eq!(kinds, teardown_order());
    assert!(
        report
            .deletions
            .iter()
            .all(|d| d.status == DeletionStatus::Deleted)
    );
    assert_eq!(h.cloud.delete_order(), teardown_order());

    assert!(h.cloud.live().is_empty());
    assert!(h.store.get(&acme1()).await.unwrap().is_none());
    assert_eq!(h.store.get_mapping(&acme1()).await.unwrap(), None);
    assert!(!h.store.has_namespace("acme1"));
}

#[tokio::test]
async fn teardown_twice_succeeds_without_touching_providers_again() {
    let h = harness();
    h.orchestrator.provision("acme1").await.unwrap();

    completed(h.orchestrator.deprovision("acme1").await.unwrap());
    h.cloud.clear_calls();

    let second = h.orchestrator.deprovision("acme1").await.unwrap();
    assert_eq!(second, TeardownOutcome::NotFound);
    assert!(h.cloud.calls().is_empty());
}

#[tokio::test]
async fn teardown_without_record_is_not_found() {
    let h = harness();

    assert_eq!(
        h.orchestrator.deprovision("ghost").await.unwrap(),
        TeardownOutcome::NotFound
    );
    assert!(h.cloud.calls().is_empty());
}

#[tokio::test]
async fn teardown_rejects_invalid_identifiers() {
    let h = harness();

    let err = h.orchestrator.deprovision("").await.unwrap_err();
    assert!(err.is_invalid_identifier());
    assert!(h.cloud.calls().is_empty());
}

#[tokio::test]
async fn two_failed_deletions_do_not_stop_the_other_five() {
    let h = harness();
    h.orchestrator.provision("acme1").await.unwrap();
    h.cloud.fail_delete(ResourceKind::Function);
    h.cloud.fail_delete(ResourceKind::Bucket);

    let report = completed(h.orchestrator.deprovision("acme1").await.unwrap());

    assert_eq!(report.deletions.len(), 7);
    assert_eq!(h.cloud.delete_order(), teardown_order());

    let failures = report.failures();
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|e| matches!(e, ProvisionError::ProviderDeleteFailed { .. })));
    assert!(matches!(
        report.outcome(ResourceKind::Function),
        Some(DeletionStatus::Failed(_))
    ));
    assert!(matches!(
        report.outcome(ResourceKind::Bucket),
        Some(DeletionStatus::Failed(_))
    ));
    assert_eq!(
        report
            .deletions
            .iter()
            .filter(|d| d.status == DeletionStatus::Deleted)
            .count(),
        5
    );
    assert!(!report.is_complete());

    let live: Vec<_> = h.cloud.live().into_iter().map(|(kind, _)| kind).collect();
    assert_eq!(live, vec![ResourceKind::Bucket, ResourceKind::Function]);
}

#[tokio::test]
async fn teardown_works_from_record_names_when_handles_are_missing() {
    let h = harness();
    // A record written before handles were tracked: names only, no gateway id.
    let config = TenantConfig::derive(&acme1(), "ap-south-1");
    h.store.upsert(&config).await.unwrap();
    h.cloud.insert(ResourceKind::Bucket, "acme1-bucket");
    h.cloud.insert(ResourceKind::Function, "acme1_shopify_lambda_function");

    let report = completed(h.orchestrator.deprovision("acme1").await.unwrap());

    assert_eq!(report.outcome(ResourceKind::Gateway), Some(&DeletionStatus::NotRecorded));
    assert_eq!(report.outcome(ResourceKind::Function), Some(&DeletionStatus::Deleted));
    assert_eq!(report.outcome(ResourceKind::Bucket), Some(&DeletionStatus::Deleted));
    assert_eq!(
        report.outcome(ResourceKind::ExecutionRole),
        Some(&DeletionStatus::AlreadyAbsent)
    );
    assert_eq!(
        report.outcome(ResourceKind::JobQueue),
        Some(&DeletionStatus::AlreadyAbsent)
    );
    assert!(report.is_complete());
    assert!(h.cloud.live().is_empty());
    assert!(h.cloud.calls_for(ResourceKind::Gateway).is_empty());
}

#[tokio::test]
async fn recorded_handles_win_over_derived_names() {
    let h = harness();
    let mut config = TenantConfig::derive(&acme1(), "ap-south-1");
    config.record_handle(ResourceKind::Bucket, ResourceHandle::new("renamed-bucket"));
    h.store.upsert(&config).await.unwrap();
    h.cloud.insert(ResourceKind::Bucket, "renamed-bucket");

    let report = completed(h.orchestrator.deprovision("acme1").await.unwrap());

    let bucket = report
        .deletions
        .iter()
        .find(|d| d.kind == ResourceKind::Bucket)
        .unwrap();
    assert_eq!(bucket.handle.as_deref(), Some("renamed-bucket"));
    assert_eq!(bucket.status, DeletionStatus::Deleted);
    assert!(h.cloud.live().is_empty());
}

#[tokio::test]
async fn async_resources_are_disabled_before_deletion() {
    let h = harness();
    h.orchestrator.provision("acme1").await.unwrap();
    h.cloud.clear_calls();

    completed(h.orchestrator.deprovision("acme1").await.unwrap());

    let queue_ops: Vec<_> = h
        .cloud
        .mutations()
        .into_iter()
        .filter(|call| call.kind == ResourceKind::JobQueue)
        .map(|call| call.operation)
        .collect();
    assert_eq!(queue_ops, vec![Operation::PrepareDelete, Operation::Delete]);

    let bucket_ops: Vec<_> = h
        .cloud
        .calls_for(ResourceKind::Bucket)
        .into_iter()
        .map(|call| call.operation)
        .collect();
    assert_eq!(bucket_ops, vec![Operation::Delete]);
}

#[tokio::test]
async fn stuck_async_deletion_fails_only_that_resource() {
    let h = harness_with(fast_settings(), |cloud| {
        cloud.stuck_deleting(ResourceKind::ComputeEnvironment);
    });
    h.orchestrator.provision("acme1").await.unwrap();

    let report = completed(h.orchestrator.deprovision("acme1").await.unwrap());

    match report.outcome(ResourceKind::ComputeEnvironment) {
        Some(DeletionStatus::Failed(message)) => assert!(message.contains("still present"), "{message}"),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(report.failures().len(), 1);
    assert_eq!(report.outcome(ResourceKind::Bucket), Some(&DeletionStatus::Deleted));
    assert_eq!(report.deletions.len(), 7);
}

#[tokio::test]
async fn failed_async_resource_is_still_deleted() {
    let h = harness();
    h.orchestrator.provision("acme1").await.unwrap();
    h.cloud.fail_ready(ResourceKind::JobQueue);
    h.cloud.clear_calls();

    let report = completed(h.orchestrator.deprovision("acme1").await.unwrap());

    assert_eq!(
        report.outcome(ResourceKind::JobQueue),
        Some(&DeletionStatus::Deleted)
    );
    assert!(report.is_complete(), "{:?}", report.failures());
    let queue_ops: Vec<_> = h
        .cloud
        .mutations()
        .into_iter()
        .filter(|call| call.kind == ResourceKind::JobQueue)
        .map(|call| call.operation)
        .collect();
    assert_eq!(queue_ops, vec![Operation::PrepareDelete, Operation::Delete]);
    assert!(h.cloud.live().is_empty());
}

#[tokio::test]
async fn unavailable_store_fails_teardown_up_front() {
    let h = harness();
    h.orchestrator.provision("acme1").await.unwrap();
    h.store.set_unavailable(true);
    h.cloud.clear_calls();

    let err = h.orchestrator.deprovision("acme1").await.unwrap_err();

    assert!(matches!(err, ProvisionError::ConfigStoreUnavailable { .. }));
    assert!(h.cloud.calls().is_empty());
}

#[tokio::test]
async fn provisioning_and_teardown_agree_on_names() {
    let h = harness();
    let provisioned = h.orchestrator.provision("shop42").await.unwrap();
    let created: Vec<_> = h
        .cloud
        .live()
        .into_iter()
        .map(|(_, handle)| handle)
        .collect();

    let report = completed(h.orchestrator.deprovision("shop42").await.unwrap());
    let mut deleted: Vec<_> = report
        .deletions
        .into_iter()
        .filter_map(|d| d.handle)
        .collect();
    deleted.sort();
    let mut created = created;
    created.sort();

    assert_eq!(deleted, created);
    assert_eq!(provisioned.config, TenantConfig {
        resources: provisioned.config.resources.clone(),
        role_arn: provisioned.config.role_arn.clone(),
        function_arn: provisioned.config.function_arn.clone(),
        gateway_id: provisioned.config.gateway_id.clone(),
        gateway_url: provisioned.config.gateway_url.clone(),
        ..TenantConfig::derive(&TenantId::parse("shop42").unwrap(), "ap-south-1")
    });
}
