//! In-memory providers for tests and local dry runs.
//!
//! [`InMemoryCloud`] keeps a set of live resources and a log of every call,
//! and can be told to fail, throttle, stall or never settle per kind.
//! Faults apply per kind and stay in place until the cloud is dropped.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tenantforge_core::{ConfigField, ResourceHandle, ResourceKind};

use crate::error::ProviderError;
use crate::provider::{ProviderSet, ResourceProvider};
use crate::types::{CreateRequest, Created, Deleted, Lifecycle, ResourceState};

const FAKE_ACCOUNT: &str = "000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    PrepareDelete,
    Delete,
    Describe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub kind: ResourceKind,
    pub operation: Operation,
    pub handle: Option<String>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_create: BTreeSet<ResourceKind>,
    fail_delete: BTreeSet<ResourceKind>,
    /// Remaining throttled create attempts per kind.
    throttle_create: HashMap<ResourceKind, u32>,
    stall_create: HashMap<ResourceKind, Duration>,
    never_ready: BTreeSet<ResourceKind>,
    fail_ready: BTreeSet<ResourceKind>,
    /// Creates that make the resource and then fail without removing it.
    fail_after_create: BTreeSet<ResourceKind>,
    /// Deletions that stay in `Deleting` forever.
    stuck_deleting: BTreeSet<ResourceKind>,
}

#[derive(Debug, Default)]
struct State {
    live: BTreeSet<(ResourceKind, String)>,
    deleting: BTreeSet<(ResourceKind, String)>,
    calls: Vec<Call>,
    faults: Faults,
    next_id: u64,
}

/// A fake cloud shared by the seven in-memory providers.
#[derive(Debug)]
pub struct InMemoryCloud {
    region: String,
    stage: String,
    state: Mutex<State>,
}

impl InMemoryCloud {
    pub fn new() -> Arc<Self> {
        Self::with_region(tenantforge_core::DEFAULT_REGION)
    }

    pub fn with_region(region: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            region: region.into(),
            stage: "prod".into(),
            state: Mutex::new(State::default()),
        })
    }

    /// One provider per kind, all backed by this cloud.
    pub fn providers(self: &Arc<Self>) -> ProviderSet {
        ResourceKind::ALL
            .into_iter()
            .fold(ProviderSet::new(), |set, kind| {
                set.with(Arc::new(InMemoryProvider {
                    kind,
                    cloud: Arc::clone(self),
                }))
            })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn fail_create(&self, kind: ResourceKind) {
        self.lock().faults.fail_create.insert(kind);
    }

    pub fn fail_delete(&self, kind: ResourceKind) {
        self.lock().faults.fail_delete.insert(kind);
    }

    /// The next `times` creates of `kind` fail with a throttling error.
    pub fn throttle_create(&self, kind: ResourceKind, times: u32) {
        self.lock().faults.throttle_create.insert(kind, times);
    }

    /// Creates of `kind` sleep before answering.
    pub fn stall_create(&self, kind: ResourceKind, delay: Duration) {
        self.lock().faults.stall_create.insert(kind, delay);
    }

    /// Resources of `kind` stay `Pending` after creation.
    pub fn never_ready(&self, kind: ResourceKind) {
        self.lock().faults.never_ready.insert(kind);
    }

    /// Live resources of `kind` report a failed state, like a compute
    /// environment that went `INVALID`.
    pub fn fail_ready(&self, kind: ResourceKind) {
        self.lock().faults.fail_ready.insert(kind);
    }

    /// Creates of `kind` make the resource, then fail and report it as orphaned.
    pub fn fail_after_create(&self, kind: ResourceKind) {
        self.lock().faults.fail_after_create.insert(kind);
    }

    /// Deletions of `kind` are accepted but never complete.
    pub fn stuck_deleting(&self, kind: ResourceKind) {
        self.lock().faults.stuck_deleting.insert(kind);
    }

    /// Adds a resource as if it had been created earlier.
    pub fn insert(&self, kind: ResourceKind, handle: impl Into<String>) {
        self.lock().live.insert((kind, handle.into()));
    }

    pub fn exists(&self, kind: ResourceKind, handle: &str) -> bool {
        self.lock().live.contains(&(kind, handle.to_string()))
    }

    /// Live resources, including ones still being deleted.
    pub fn live(&self) -> BTreeSet<(ResourceKind, String)> {
        let state = self.lock();
        state.live.union(&state.deleting).cloned().collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Calls that change state (describes are left out).
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.operation != Operation::Describe)
            .collect()
    }

    pub fn calls_for(&self, kind: ResourceKind) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.kind == kind)
            .collect()
    }

    /// Kinds in the order their `delete` was called.
    pub fn delete_order(&self) -> Vec<ResourceKind> {
        self.calls()
            .into_iter()
            .filter(|call| call.operation == Operation::Delete)
            .map(|call| call.kind)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn record(&self, kind: ResourceKind, operation: Operation, handle: Option<&str>) {
        self.lock().calls.push(Call {
            kind,
            operation,
            handle: handle.map(str::to_string),
        });
    }
}

/// The name field identifying each kind's resource.
fn name_field(kind: ResourceKind) -> ConfigField {
    match kind {
        ResourceKind::Bucket => ConfigField::BucketName,
        ResourceKind::ComputeEnvironment => ConfigField::ComputeEnvironmentName,
        ResourceKind::JobQueue => ConfigField::JobQueueName,
        ResourceKind::JobDefinition => ConfigField::JobDefinitionName,
        ResourceKind::ExecutionRole => ConfigField::RoleName,
        ResourceKind::Function => ConfigField::FunctionName,
        ResourceKind::Gateway => ConfigField::GatewayName,
    }
}

#[derive(Debug)]
struct InMemoryProvider {
    kind: ResourceKind,
    cloud: Arc<InMemoryCloud>,
}

impl InMemoryProvider {
    fn outputs(&self, request: &CreateRequest, handle: &str, created: Created) -> Result<Created, ProviderError> {
        let cloud = &self.cloud;
        Ok(match self.kind {
            ResourceKind::ExecutionRole => created.with_output(
                ConfigField::RoleArn,
                format!("arn:aws:iam::{FAKE_ACCOUNT}:role/{handle}"),
            ),
            ResourceKind::Function => {
                request.input(ConfigField::RoleArn)?;
                created.with_output(
                    ConfigField::FunctionArn,
                    format!(
                        "arn:aws:lambda:{}:{FAKE_ACCOUNT}:function:{handle}",
                        cloud.region
                    ),
                )
            }
            ResourceKind::Gateway => {
                request.input(ConfigField::FunctionArn)?;
                let region = request.input(ConfigField::Region)?;
                created
                    .with_output(ConfigField::GatewayId, handle)
                    .with_output(
                        ConfigField::GatewayUrl,
                        format!(
                            "https://{handle}.execute-api.{region}.amazonaws.com/{}",
                            cloud.stage
                        ),
                    )
            }
            _ => created,
        })
    }
}

#[async_trait]
impl ResourceProvider for InMemoryProvider {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn lifecycle(&self) -> Lifecycle {
        match self.kind {
            ResourceKind::ComputeEnvironment | ResourceKind::JobQueue => Lifecycle::Async,
            _ => Lifecycle::Immediate,
        }
    }

    async fn create(&self, request: &CreateRequest) -> Result<Created, ProviderError> {
        let name = request.input(name_field(self.kind))?.to_string();
        self.cloud.record(self.kind, Operation::Create, Some(&name));

        let stall = self.cloud.lock().faults.stall_create.get(&self.kind).copied();
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }

        let (handle, reused) = {
            let mut state = self.cloud.lock();
            if state.faults.fail_create.contains(&self.kind) {
                return Err(ProviderError::rejected(format!(
                    "injected create failure for {}",
                    self.kind
                )));
            }
            if let Some(remaining) = state.faults.throttle_create.get_mut(&self.kind)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(ProviderError::throttled("Rate exceeded"));
            }

            let handle = if self.kind == ResourceKind::Gateway {
                state.next_id += 1;
                format!("api{:06}", state.next_id)
            } else {
                name
            };
            let reused = !state.live.insert((self.kind, handle.clone()));
            if state.faults.fail_after_create.contains(&self.kind) {
                return Err(ProviderError::rejected(format!(
                    "injected failure after creating {} '{handle}'",
                    self.kind
                ))
                .with_orphan(handle));
            }
            (handle, reused)
        };

        let created = if reused {
            Created::reused(handle.as_str())
        } else {
            Created::new(handle.as_str())
        };
        self.outputs(request, &handle, created)
    }

    async fn prepare_delete(&self, handle: &ResourceHandle) -> Result<(), ProviderError> {
        self.cloud
            .record(self.kind, Operation::PrepareDelete, Some(handle.as_str()));
        Ok(())
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<Deleted, ProviderError> {
        self.cloud
            .record(self.kind, Operation::Delete, Some(handle.as_str()));
        let mut state = self.cloud.lock();
        if state.faults.fail_delete.contains(&self.kind) {
            return Err(ProviderError::rejected(format!(
                "injected delete failure for {}",
                self.kind
            )));
        }
        let key = (self.kind, handle.to_string());
        if !state.live.remove(&key) {
            return Ok(Deleted::AlreadyAbsent);
        }
        if state.faults.stuck_deleting.contains(&self.kind) {
            state.deleting.insert(key);
        }
        Ok(Deleted::Removed)
    }

    async fn describe(&self, handle: &ResourceHandle) -> Result<ResourceState, ProviderError> {
        self.cloud
            .record(self.kind, Operation::Describe, Some(handle.as_str()));
        let state = self.cloud.lock();
        let key = (self.kind, handle.to_string());
        Ok(if state.deleting.contains(&key) {
            ResourceState::Deleting
        } else if !state.live.contains(&key) {
            ResourceState::NotFound
        } else if state.faults.fail_ready.contains(&self.kind) {
            ResourceState::Failed(format!("INVALID {} (injected)", self.kind))
        } else if state.faults.never_ready.contains(&self.kind) {
            ResourceState::Pending
        } else {
            ResourceState::Ready
        })
    }
}

/// Snapshot of live resources grouped by kind.
pub fn group_by_kind(live: &BTreeSet<(ResourceKind, String)>) -> BTreeMap<ResourceKind, Vec<String>> {
    let mut grouped: BTreeMap<ResourceKind, Vec<String>> = BTreeMap::new();
    for (kind, handle) in live {
        grouped.entry(*kind).or_default().push(handle.clone());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use tenantforge_core::TenantId;

    use super::*;

    fn request(kind: ResourceKind, name: &str) -> CreateRequest {
        CreateRequest::new(TenantId::parse("acme1").unwrap()).with_input(name_field(kind), name)
    }

    #[tokio::test]
    async fn create_then_delete() {
        let cloud = InMemoryCloud::new();
        let set = cloud.providers();
        let bucket = set.get(ResourceKind::Bucket).unwrap();

        let created = bucket
            .create(&request(ResourceKind::Bucket, "acme1-bucket"))
            .await
            .unwrap();
        assert!(!created.reused);
        assert!(cloud.exists(ResourceKind::Bucket, "acme1-bucket"));

        let again = bucket
            .create(&request(ResourceKind::Bucket, "acme1-bucket"))
            .await
            .unwrap();
        assert!(again.reused);

        assert_eq!(bucket.delete(&created.handle).await.unwrap(), Deleted::Removed);
        assert_eq!(
            bucket.delete(&created.handle).await.unwrap(),
            Deleted::AlreadyAbsent
        );
        assert_eq!(
            cloud.delete_order(),
            vec![ResourceKind::Bucket, ResourceKind::Bucket]
        );
    }

    #[tokio::test]
    async fn throttling_wears_off() {
        let cloud = InMemoryCloud::new();
        cloud.throttle_create(ResourceKind::JobDefinition, 1);
        let set = cloud.providers();
        let provider = set.get(ResourceKind::JobDefinition).unwrap();
        let req = request(ResourceKind::JobDefinition, "jd");

        assert!(provider.create(&req).await.unwrap_err().is_retryable());
        assert!(provider.create(&req).await.is_ok());
    }

    #[tokio::test]
    async fn async_kinds_and_stuck_deletion() {
        let cloud = InMemoryCloud::new();
        cloud.stuck_deleting(ResourceKind::JobQueue);
        let set = cloud.providers();
        let queue = set.get(ResourceKind::JobQueue).unwrap();
        assert_eq!(queue.lifecycle(), Lifecycle::Async);

        let created = queue.create(&request(ResourceKind::JobQueue, "q")).await.unwrap();
        queue.delete(&created.handle).await.unwrap();
        assert_eq!(
            queue.describe(&created.handle).await.unwrap(),
            ResourceState::Deleting
        );
        assert_eq!(group_by_kind(&cloud.live())[&ResourceKind::JobQueue], vec!["q"]);
    }

    #[tokio::test]
    async fn failed_resources_report_state_and_orphans() {
        let cloud = InMemoryCloud::new();
        cloud.fail_ready(ResourceKind::ComputeEnvironment);
        cloud.fail_after_create(ResourceKind::ExecutionRole);
        let set = cloud.providers();

        let env = set.get(ResourceKind::ComputeEnvironment).unwrap();
        let created = env
            .create(&request(ResourceKind::ComputeEnvironment, "ce"))
            .await
            .unwrap();
        assert!(matches!(
            env.describe(&created.handle).await.unwrap(),
            ResourceState::Failed(_)
        ));
        env.delete(&created.handle).await.unwrap();
        assert_eq!(
            env.describe(&created.handle).await.unwrap(),
            ResourceState::NotFound
        );

        let role = set.get(ResourceKind::ExecutionRole).unwrap();
        let err = role
            .create(&request(ResourceKind::ExecutionRole, "r"))
            .await
            .unwrap_err();
        assert_eq!(err.orphan, Some(ResourceHandle::new("r")));
        assert!(cloud.exists(ResourceKind::ExecutionRole, "r"));
    }

    #[tokio::test]
    async fn gateway_outputs_url() {
        let cloud = InMemoryCloud::new();
        let set = cloud.providers();
        let gateway = set.get(ResourceKind::Gateway).unwrap();
        let req = request(ResourceKind::Gateway, "acme1_shopify_api")
            .with_input(ConfigField::Region, "ap-south-1")
            .with_input(ConfigField::FunctionArn, "arn:aws:lambda:x");

        let created = gateway.create(&req).await.unwrap();
        let id = created.handle.as_str();
        assert_eq!(created.outputs[&ConfigField::GatewayId], id);
        assert_eq!(
            created.outputs[&ConfigField::GatewayUrl],
            format!("https://{id}.execute-api.ap-south-1.amazonaws.com/prod")
        );
    }
}
