mod common;

use std::time::Duration;

use common::{fast_settings, harness, harness_with};
use tenantforge_core::{ConfigField, ProvisionError, ResourceKind, TenantId};
use tenantforge_orchestrator::{
    CompensationStatus, Orchestrator, ProvisioningPlan, RetryPolicy,
};
use tenantforge_providers::ProviderSet;
use tenantforge_providers::memory::{InMemoryCloud, Operation};
use tenantforge_store::{ConfigStore, DirectoryStore};

fn acme1() -> TenantId {
    TenantId::parse("acme1").unwrap()
}

fn compensated_kinds(failure: &tenantforge_orchestrator::ProvisionFailure) -> Vec<ResourceKind> {
    failure.compensations.iter().map(|c| c.kind).collect()
}

#[tokio::test]
async fn provisions_every_resource_and_registers_tenant() {
    let h = harness();

    let provisioned = h.orchestrator.provision("acme1").await.unwrap();

    let url = provisioned.gateway_url.clone().unwrap();
    assert!(url.starts_with("https://"), "{url}");
    assert!(url.ends_with(".execute-api.ap-south-1.amazonaws.com/prod"), "{url}");
    assert_eq!(h.cloud.live().len(), 7);

    let stored = h.store.get(&acme1()).await.unwrap().unwrap();
    assert_eq!(stored, provisioned.config);
    assert_eq!(stored.resources.len(), 7);
    assert!(stored.role_arn.is_some());
    assert!(stored.function_arn.is_some());
    assert_eq!(stored.gateway_url.as_deref(), Some(url.as_str()));
    assert_eq!(
        stored.field(ConfigField::GatewayId),
        stored.handle(ResourceKind::Gateway).map(|h| h.as_str())
    );

    assert_eq!(h.store.get_mapping(&acme1()).await.unwrap().as_deref(), Some("acme1"));
    assert_eq!(
        h.store.namespace_collections("acme1"),
        Some(vec!["acme1_Shopify_Product".to_string(), "acme1_Shopify_Logs".to_string()])
    );

    let created: Vec<_> = h
        .cloud
        .mutations()
        .into_iter()
        .filter(|call| call.operation == Operation::Create)
        .map(|call| call.kind)
        .collect();
    assert_eq!(created, ResourceKind::ALL);
}

#[tokio::test]
async fn acme1_failing_at_function_compensates_earlier_steps() {
    let h = harness_with(fast_settings(), |cloud| cloud.fail_create(ResourceKind::Function));

    let failure = h.orchestrator.provision("acme1").await.unwrap_err();

    assert!(matches!(
        failure.cause,
        ProvisionError::ProviderCreateFailed {
            kind: ResourceKind::Function,
            ..
        }
    ));
    assert_eq!(failure.failed_step, Some(ResourceKind::Function));
    let expected = vec![
        ResourceKind::ExecutionRole,
        ResourceKind::JobDefinition,
        ResourceKind::JobQueue,
        ResourceKind::ComputeEnvironment,
        ResourceKind::Bucket,
    ];
    assert_eq!(compensated_kinds(&failure), expected);
    assert!(
        failure
            .compensations
            .iter()
            .all(|c| c.status == CompensationStatus::Deleted)
    );
    assert!(failure.fully_compensated());

    assert_eq!(h.cloud.delete_order(), expected);
    assert!(h.cloud.calls_for(ResourceKind::Gateway).is_empty());
    assert!(h.cloud.live().is_empty());
    assert!(h.store.get(&acme1()).await.unwrap().is_none());
    assert!(!h.store.has_namespace("acme1"));
    assert_eq!(h.store.get_mapping(&acme1()).await.unwrap(), None);
}

#[tokio::test]
async fn failure_at_any_step_unwinds_in_reverse_and_leaves_nothing() {
    for (index, failing) in ResourceKind::ALL.into_iter().enumerate() {
        let h = harness_with(fast_settings(), |cloud| cloud.fail_create(failing));

        let failure = h.orchestrator.provision("shop7").await.unwrap_err();

        let expected: Vec<_> = ResourceKind::ALL[..index].iter().rev().copied().collect();
        assert_eq!(compensated_kinds(&failure), expected, "failing at {failing}");
        assert_eq!(h.cloud.delete_order(), expected, "failing at {failing}");
        assert!(h.cloud.live().is_empty(), "failing at {failing}");
        assert_eq!(h.store.record_count(), 0, "failing at {failing}");
        assert!(!h.store.has_namespace("shop7"));
    }
}

#[tokio::test]
async fn invalid_identifiers_touch_nothing() {
    let h = harness();

    for raw in ["", "a", "Acme1", "acme-1", "1acme"] {
        let failure = h.orchestrator.provision(raw).await.unwrap_err();
        assert!(failure.cause.is_invalid_identifier(), "{raw}");
        assert_eq!(failure.failed_step, None);
        assert!(failure.compensations.is_empty());
    }

    assert!(h.cloud.calls().is_empty());
    assert_eq!(h.store.record_count(), 0);
    assert_eq!(h.store.upsert_count(), 0);
}

#[tokio::test]
async fn unavailable_store_is_fatal_before_any_provider_call() {
    let h = harness();
    h.store.set_unavailable(true);

    let failure = h.orchestrator.provision("acme1").await.unwrap_err();
    assert!(matches!(failure.cause, ProvisionError::ConfigStoreUnavailable { .. }));
    assert!(failure.compensations.is_empty());
    assert!(h.cloud.calls().is_empty());
}

#[tokio::test]
async fn readiness_timeout_unwinds_including_the_waiting_resource() {
    let h = harness_with(fast_settings(), |cloud| cloud.never_ready(ResourceKind::JobQueue));

    let failure = h.orchestrator.provision("acme1").await.unwrap_err();

    assert!(failure.cause.is_timeout());
    assert_eq!(failure.cause.kind(), Some(ResourceKind::JobQueue));
    assert_eq!(failure.failed_step, Some(ResourceKind::JobQueue));
    assert_eq!(
        compensated_kinds(&failure),
        vec![
            ResourceKind::JobQueue,
            ResourceKind::ComputeEnvironment,
            ResourceKind::Bucket
        ]
    );
    assert!(h.cloud.live().is_empty());
    assert!(h.cloud.calls_for(ResourceKind::JobDefinition).is_empty());
}

#[tokio::test]
async fn request_deadline_cancels_the_running_step() {
    let settings = tenantforge_orchestrator::OrchestratorSettings {
        request_timeout: Duration::from_millis(100),
        ..fast_settings()
    };
    let h = harness_with(settings, |cloud| {
        cloud.stall_create(ResourceKind::JobDefinition, Duration::from_secs(5));
    });

    let failure = h.orchestrator.provision("acme1").await.unwrap_err();

    assert!(failure.cause.is_timeout());
    assert_eq!(failure.failed_step, Some(ResourceKind::JobDefinition));
    assert_eq!(
        compensated_kinds(&failure),
        vec![
            ResourceKind::JobQueue,
            ResourceKind::ComputeEnvironment,
            ResourceKind::Bucket
        ]
    );
    assert!(h.cloud.live().is_empty());
    assert_eq!(h.store.record_count(), 0);
}

#[tokio::test]
async fn failed_persist_compensates_the_step_that_just_ran() {
    let h = harness();
    // Upsert 1 creates the record, 2 follows the bucket, 3 the compute environment.
    h.store.fail_upsert_at(3);

    let failure = h.orchestrator.provision("acme1").await.unwrap_err();

    assert!(matches!(failure.cause, ProvisionError::ConfigStoreUnavailable { .. }));
    assert_eq!(failure.failed_step, Some(ResourceKind::ComputeEnvironment));
    assert_eq!(
        compensated_kinds(&failure),
        vec![ResourceKind::ComputeEnvironment, ResourceKind::Bucket]
    );
    assert!(h.cloud.live().is_empty());
    assert_eq!(h.store.record_count(), 0);
}

#[tokio::test]
async fn failed_compensation_does_not_stop_the_unwind() {
    let h = harness_with(fast_settings(), |cloud| {
        cloud.fail_create(ResourceKind::Gateway);
        cloud.fail_delete(ResourceKind::JobDefinition);
    });

    let failure = h.orchestrator.provision("acme1").await.unwrap_err();

    assert_eq!(failure.compensations.len(), 6);
    let failed: Vec<_> = failure
        .compensations
        .iter()
        .filter(|c| !c.succeeded())
        .map(|c| c.kind)
        .collect();
    assert_eq!(failed, vec![ResourceKind::JobDefinition]);
    assert!(!failure.fully_compensated());
    assert_eq!(failure.compensation_errors().len(), 1);

    let live: Vec<_> = h.cloud.live().into_iter().map(|(kind, _)| kind).collect();
    assert_eq!(live, vec![ResourceKind::JobDefinition]);
    assert!(matches!(
        failure.cause,
        ProvisionError::ProviderCreateFailed {
            kind: ResourceKind::Gateway,
            ..
        }
    ));
}

#[tokio::test]
async fn invalid_async_resource_is_still_deleted() {
    let h = harness_with(fast_settings(), |cloud| {
        cloud.fail_ready(ResourceKind::ComputeEnvironment);
    });

    let failure = h.orchestrator.provision("acme1").await.unwrap_err();

    assert!(matches!(
        failure.cause,
        ProvisionError::ProviderCreateFailed {
            kind: ResourceKind::ComputeEnvironment,
            ..
        }
    ));
    assert_eq!(failure.failed_step, Some(ResourceKind::ComputeEnvironment));
    assert_eq!(
        compensated_kinds(&failure),
        vec![ResourceKind::ComputeEnvironment, ResourceKind::Bucket]
    );
    assert!(failure.fully_compensated(), "{:?}", failure.compensations);
    assert_eq!(
        failure.compensations[0].status,
        CompensationStatus::Deleted
    );
    assert!(
        h.cloud
            .calls_for(ResourceKind::ComputeEnvironment)
            .iter()
            .any(|call| call.operation == Operation::Delete)
    );
    assert!(h.cloud.live().is_empty());
    assert_eq!(h.store.record_count(), 0);
}

#[tokio::test]
async fn resource_left_behind_by_a_failed_create_is_compensated() {
    let h = harness_with(fast_settings(), |cloud| {
        cloud.fail_after_create(ResourceKind::Gateway);
    });

    let failure = h.orchestrator.provision("acme1").await.unwrap_err();

    assert_eq!(failure.failed_step, Some(ResourceKind::Gateway));
    let expected: Vec<_> = ResourceKind::ALL.into_iter().rev().collect();
    assert_eq!(compensated_kinds(&failure), expected);
    assert!(failure.compensations[0].handle.starts_with("api"));
    assert_eq!(failure.compensations[0].status, CompensationStatus::Deleted);
    assert!(failure.fully_compensated());
    assert!(h.cloud.live().is_empty());
}

#[tokio::test]
async fn reprovisioning_replaces_the_previous_gateway() {
    let h = harness();
    let first = h.orchestrator.provision("acme1").await.unwrap();
    let old_gateway = first.config.gateway_id.clone().unwrap();
    assert!(first.replaced.is_empty());
    let mut recorded = h.store.get(&acme1()).await.unwrap().unwrap();
    recorded.secrets.api_key = "filled-in-later".into();
    h.store.upsert(&recorded).await.unwrap();

    let second = h.orchestrator.provision("acme1").await.unwrap();

    let new_gateway = second.config.gateway_id.clone().unwrap();
    assert_ne!(new_gateway, old_gateway);
    assert_eq!(second.replaced.len(), 1);
    assert_eq!(second.replaced[0].kind, ResourceKind::Gateway);
    assert_eq!(second.replaced[0].handle, old_gateway);
    assert_eq!(second.replaced[0].status, CompensationStatus::Deleted);
    assert!(!h.cloud.exists(ResourceKind::Gateway, &old_gateway));
    assert_eq!(h.cloud.live().len(), 7);
    assert_eq!(second.config.secrets.api_key, "filled-in-later");
}

#[tokio::test]
async fn failed_reprovision_leaves_no_resources_behind() {
    let h = harness();
    let first = h.orchestrator.provision("acme1").await.unwrap();
    let old_gateway = first.config.gateway_id.clone().unwrap();

    h.cloud.fail_create(ResourceKind::Bucket);
    let failure = h.orchestrator.provision("acme1").await.unwrap_err();

    assert_eq!(failure.failed_step, Some(ResourceKind::Bucket));
    let expected: Vec<_> = ResourceKind::ALL.into_iter().rev().collect();
    assert_eq!(compensated_kinds(&failure), expected);
    assert_eq!(failure.compensations[0].handle, old_gateway);
    assert!(failure.fully_compensated());
    assert!(h.cloud.live().is_empty());
    assert_eq!(h.store.record_count(), 0);
}

#[tokio::test]
async fn preexisting_resource_is_reused() {
    let h = harness_with(fast_settings(), |cloud| {
        cloud.insert(ResourceKind::ExecutionRole, "acme1_shopify_role");
    });

    let provisioned = h.orchestrator.provision("acme1").await.unwrap();

    assert_eq!(
        provisioned
            .config
            .handle(ResourceKind::ExecutionRole)
            .map(|h| h.as_str()),
        Some("acme1_shopify_role")
    );
    assert!(provisioned.config.role_arn.is_some());
    assert_eq!(h.cloud.live().len(), 7);
}

#[tokio::test]
async fn throttled_creates_fail_without_retries() {
    let h = harness_with(fast_settings(), |cloud| {
        cloud.throttle_create(ResourceKind::Function, 1);
    });

    let failure = h.orchestrator.provision("acme1").await.unwrap_err();

    assert_eq!(failure.failed_step, Some(ResourceKind::Function));
    assert_eq!(h.cloud.calls_for(ResourceKind::Function).len(), 1);
    assert!(h.cloud.live().is_empty());
}

#[tokio::test]
async fn throttled_creates_are_retried_when_configured() {
    let settings = tenantforge_orchestrator::OrchestratorSettings {
        create_retry: RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(1),
        },
        ..fast_settings()
    };
    let h = harness_with(settings, |cloud| {
        cloud.throttle_create(ResourceKind::Function, 2);
    });

    h.orchestrator.provision("acme1").await.unwrap();

    let creates = h
        .cloud
        .calls_for(ResourceKind::Function)
        .into_iter()
        .filter(|call| call.operation == Operation::Create)
        .count();
    assert_eq!(creates, 3);
}

#[tokio::test]
async fn rejections_are_never_retried() {
    let settings = tenantforge_orchestrator::OrchestratorSettings {
        create_retry: RetryPolicy {
            max_retries: 3,
            backoff: Duration::from_millis(1),
        },
        ..fast_settings()
    };
    let h = harness_with(settings, |cloud| cloud.fail_create(ResourceKind::Bucket));

    let failure = h.orchestrator.provision("acme1").await.unwrap_err();

    assert!(failure.compensations.is_empty());
    assert_eq!(h.cloud.calls_for(ResourceKind::Bucket).len(), 1);
}

#[tokio::test]
async fn missing_provider_fails_before_any_call() {
    let cloud = InMemoryCloud::new();
    let full = cloud.providers();
    let partial = ResourceKind::ALL
        .into_iter()
        .filter(|kind| *kind != ResourceKind::Gateway)
        .filter_map(|kind| full.get(kind).cloned())
        .fold(ProviderSet::new(), ProviderSet::with);
    let store = tenantforge_db_memory::create_memory_store();
    let orchestrator = Orchestrator::new(store.clone(), store.clone(), partial, fast_settings());

    let failure = orchestrator.provision("acme1").await.unwrap_err();

    assert_eq!(failure.cause.kind(), Some(ResourceKind::Gateway));
    assert!(cloud.calls().is_empty());
    assert_eq!(store.record_count(), 0);
}

#[tokio::test]
async fn custom_plans_are_validated() {
    let h = harness();
    let mut steps = ProvisioningPlan::standard().steps().to_vec();
    steps.reverse();

    assert!(h.orchestrator.with_plan(ProvisioningPlan::new(steps)).is_err());
}
