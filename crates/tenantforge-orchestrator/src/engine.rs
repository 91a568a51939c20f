//! The saga engine driving a [`ProvisioningPlan`] forward and backward.

use tenantforge_core::{ProvisionError, ResourceHandle, ResourceKind, TenantConfig, TenantId};
use tenantforge_providers::{
    CreateRequest, Created, Deleted, DynProvider, Lifecycle, ProviderError, ProviderSet,
    TargetState, WaitOutcome, await_state,
};
use tenantforge_store::{DynConfigStore, DynDirectoryStore, StoreError};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, instrument, warn};

use crate::plan::{PlanError, ProvisioningPlan, ProvisioningStep};
use crate::report::{
    CompensationOutcome, CompensationStatus, DeletionStatus, ProvisionFailure, Provisioned,
    TeardownOutcome, TeardownReport,
};
use crate::settings::OrchestratorSettings;

fn store_error(err: StoreError) -> ProvisionError {
    ProvisionError::store_unavailable(err.to_string())
}

fn create_error(kind: ResourceKind, err: ProviderError) -> ProvisionError {
    if err.is_timeout() {
        ProvisionError::timeout(kind, err.to_string())
    } else {
        ProvisionError::create_failed(kind, err.to_string())
    }
}

/// Provisions and tears down tenant topologies.
///
/// Requests for different tenants may run concurrently; callers must not run
/// two requests for the same tenant at once.
pub struct Orchestrator {
    store: DynConfigStore,
    directory: DynDirectoryStore,
    providers: ProviderSet,
    plan: ProvisioningPlan,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        store: DynConfigStore,
        directory: DynDirectoryStore,
        providers: ProviderSet,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            directory,
            providers,
            plan: ProvisioningPlan::standard(),
            settings,
        }
    }

    /// Replaces the standard plan.
    pub fn with_plan(mut self, plan: ProvisioningPlan) -> Result<Self, PlanError> {
        plan.validate()?;
        self.plan = plan;
        Ok(self)
    }

    pub fn plan(&self) -> &ProvisioningPlan {
        &self.plan
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn store(&self) -> &DynConfigStore {
        &self.store
    }

    fn provider(&self, kind: ResourceKind) -> Result<&DynProvider, ProviderError> {
        self.providers
            .get(kind)
            .ok_or_else(|| ProviderError::rejected(format!("no provider registered for {kind}")))
    }

    /// Creates every resource in plan order, or none.
    ///
    /// On failure every recorded resource is deleted in reverse order, the
    /// tenant's record and namespace are removed, and the original cause is
    /// returned along with each compensation outcome.
    ///
    /// An existing record is not discarded: its handles, late-bound fields and
    /// secrets carry over, so a failed re-run also removes what the earlier
    /// run created.
    #[instrument(name = "provision", skip_all, fields(tenant = %raw))]
    pub async fn provision(&self, raw: &str) -> Result<Provisioned, ProvisionFailure> {
        let tenant = TenantId::parse(raw).map_err(ProvisionFailure::before_start)?;
        if let Some(kind) = self
            .plan
            .steps()
            .iter()
            .map(|step| step.kind)
            .find(|kind| self.providers.get(*kind).is_none())
        {
            return Err(ProvisionFailure::before_start(ProvisionError::create_failed(
                kind,
                "no provider registered",
            )));
        }

        let previous = self
            .store
            .get(&tenant)
            .await
            .map_err(|err| ProvisionFailure::before_start(store_error(err)))?;
        let mut config = TenantConfig::derive(&tenant, self.settings.region.clone());
        if let Some(previous) = &previous {
            info!(
                recorded = previous.resources.len(),
                "Tenant already has a record, carrying its resources over"
            );
            config.carry_over(previous);
        }
        self.store
            .upsert(&config)
            .await
            .map_err(|err| ProvisionFailure::before_start(store_error(err)))?;
        info!(namespace = %config.namespace, "Tenant record created");

        if let Err(err) = self
            .store
            .create_namespace(&config.namespace, &config.collections())
            .await
        {
            return Err(self.unwind(&config, store_error(err), None, Vec::new()).await);
        }

        let mut replaced = Vec::new();
        let deadline = Instant::now() + self.settings.request_timeout;
        for step in self.plan.steps() {
            let running = self.run_step(step, &mut config, &mut replaced);
            let result = match timeout_at(deadline, running).await {
                Ok(result) => result,
                Err(_) => Err(ProvisionError::timeout(
                    step.kind,
                    format!(
                        "request deadline of {}s exceeded",
                        self.settings.request_timeout.as_secs_f64()
                    ),
                )),
            };
            if let Err(cause) = result {
                error!(step = %step.kind, error = %cause, "Provisioning step failed, unwinding");
                return Err(self.unwind(&config, cause, Some(step.kind), replaced).await);
            }
        }

        if let Err(err) = self.directory.set_mapping(&tenant, &config.namespace).await {
            error!(error = %err, "Directory registration failed, unwinding");
            return Err(self.unwind(&config, store_error(err), None, replaced).await);
        }

        info!(gateway_url = config.gateway_url.as_deref().unwrap_or(""), "Tenant provisioned");
        Ok(Provisioned {
            gateway_url: config.gateway_url.clone(),
            config,
            replaced,
        })
    }

    /// Runs one step: create, record the handle, wait if needed, persist.
    ///
    /// The handle is recorded before any wait so that a step cancelled by the
    /// deadline is still compensated.
    #[instrument(skip_all, fields(step = %step.kind))]
    async fn run_step(
        &self,
        step: &ProvisioningStep,
        config: &mut TenantConfig,
        replaced: &mut Vec<CompensationOutcome>,
    ) -> Result<(), ProvisionError> {
        let kind = step.kind;
        let provider = self.provider(kind).map_err(|err| create_error(kind, err))?;

        let request = step.reads.iter().try_fold(
            CreateRequest::new(config.tenant_id.clone()),
            |request, field| {
                config
                    .field(*field)
                    .map(|value| request.with_input(*field, value))
                    .ok_or_else(|| {
                        ProvisionError::create_failed(kind, format!("input '{field}' is not set"))
                    })
            },
        )?;

        info!("Creating resource");
        let created = match self.create_with_retry(provider, &request).await {
            Ok(created) => created,
            Err(err) => {
                if let Some(orphan) = err.orphan.clone() {
                    warn!(handle = %orphan, "Create left a resource behind, recording it");
                    self.record(step, config, orphan, replaced).await;
                }
                return Err(create_error(kind, err));
            }
        };
        let handle = created.handle.clone();
        self.record(step, config, handle.clone(), replaced).await;
        if created.reused {
            info!(handle = %handle, "Resource already exists, reusing it");
        }

        for (field, value) in created.outputs {
            if step.writes.contains(&field) {
                config.set_field(field, value);
            } else {
                warn!(handle = %handle, field = %field, "Ignoring undeclared output");
            }
        }
        if let Some(field) = step.writes.iter().find(|f| config.field(**f).is_none()) {
            return Err(ProvisionError::create_failed(
                kind,
                format!("provider did not return '{field}'"),
            ));
        }

        if step.awaits_ready || provider.lifecycle() == Lifecycle::Async {
            self.await_ready(provider, kind, &handle).await?;
        }

        self.store.upsert(config).await.map_err(store_error)?;
        info!(handle = %handle, "Step completed");
        Ok(())
    }

    /// Records the step's handle. A different handle carried over from an
    /// earlier record is deleted, since nothing would reference it afterwards.
    async fn record(
        &self,
        step: &ProvisioningStep,
        config: &mut TenantConfig,
        handle: ResourceHandle,
        replaced: &mut Vec<CompensationOutcome>,
    ) {
        let Some(stale) = config
            .record_handle(step.kind, handle.clone())
            .filter(|stale| *stale != handle)
        else {
            return;
        };
        let status = match self.remove(step, &stale).await {
            Ok(Deleted::Removed) => CompensationStatus::Deleted,
            Ok(Deleted::AlreadyAbsent) => CompensationStatus::AlreadyAbsent,
            Err(err) => {
                error!(handle = %stale, error = %err, "Failed to delete replaced resource");
                CompensationStatus::Failed(err.to_string())
            }
        };
        info!(handle = %stale, replacement = %handle, status = ?status, "Replaced resource removed");
        replaced.push(CompensationOutcome {
            kind: step.kind,
            handle: stale.to_string(),
            status,
        });
    }

    async fn create_with_retry(
        &self,
        provider: &DynProvider,
        request: &CreateRequest,
    ) -> Result<Created, ProviderError> {
        let policy = self.settings.create_retry;
        let mut retries = 0;
        loop {
            match provider.create(request).await {
                Ok(created) => return Ok(created),
                Err(err)
                    if err.is_retryable()
                        && err.orphan.is_none()
                        && retries < policy.max_retries =>
                {
                    retries += 1;
                    warn!(
                        retry = retries,
                        max_retries = policy.max_retries,
                        error = %err,
                        "Create failed transiently, retrying"
                    );
                    tokio::time::sleep(policy.backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn await_ready(
        &self,
        provider: &DynProvider,
        kind: ResourceKind,
        handle: &ResourceHandle,
    ) -> Result<(), ProvisionError> {
        let poll = self.settings.ready_poll;
        match await_state(&**provider, handle, TargetState::Ready, poll).await {
            Ok(WaitOutcome::Reached) => {
                debug!(handle = %handle, "Resource is ready");
                Ok(())
            }
            Ok(WaitOutcome::Vanished) => Err(ProvisionError::create_failed(
                kind,
                format!("'{handle}' disappeared while waiting to become ready"),
            )),
            Ok(WaitOutcome::TimedOut { last }) => Err(ProvisionError::timeout(
                kind,
                format!(
                    "'{handle}' not ready after {} attempts, last state {last:?}",
                    poll.attempts.max(1)
                ),
            )),
            Err(err) => Err(create_error(kind, err)),
        }
    }

    /// Compensates every step that recorded a handle, newest first, then
    /// removes the tenant's record and namespace. Never stops early.
    ///
    /// `replaced` holds deletions of superseded resources that already ran;
    /// they lead the reported compensations.
    #[instrument(skip_all, fields(failed_step = ?failed_step))]
    async fn unwind(
        &self,
        config: &TenantConfig,
        cause: ProvisionError,
        failed_step: Option<ResourceKind>,
        replaced: Vec<CompensationOutcome>,
    ) -> ProvisionFailure {
        let mut compensations = replaced;
        for step in self.plan.steps().iter().rev() {
            let Some(handle) = config.handle(step.kind) else {
                continue;
            };
            let status = match self.remove(step, handle).await {
                Ok(Deleted::Removed) => CompensationStatus::Deleted,
                Ok(Deleted::AlreadyAbsent) => CompensationStatus::AlreadyAbsent,
                Err(err) => {
                    error!(step = %step.kind, handle = %handle, error = %err, "Compensation failed");
                    CompensationStatus::Failed(err.to_string())
                }
            };
            info!(step = %step.kind, handle = %handle, status = ?status, "Compensated");
            compensations.push(CompensationOutcome {
                kind: step.kind,
                handle: handle.to_string(),
                status,
            });
        }

        let mut cleanup_errors = Vec::new();
        self.remove_tenant_data(config, &mut cleanup_errors).await;

        ProvisionFailure {
            cause,
            failed_step,
            compensations,
            cleanup_errors,
        }
    }

    /// Deletes everything named in the tenant's record.
    ///
    /// Every kind is attempted regardless of earlier failures. Returns
    /// [`TeardownOutcome::NotFound`] without touching any provider when no
    /// record exists.
    #[instrument(name = "deprovision", skip_all, fields(tenant = %raw))]
    pub async fn deprovision(&self, raw: &str) -> Result<TeardownOutcome, ProvisionError> {
        let tenant = TenantId::parse(raw)?;
        let Some(config) = self.store.get(&tenant).await.map_err(store_error)? else {
            info!("No record for tenant, nothing to tear down");
            return Ok(TeardownOutcome::NotFound);
        };

        let mut report = TeardownReport::new(tenant.clone());
        for step in self.plan.steps().iter().rev() {
            let handle = config.handle(step.kind).cloned().or_else(|| {
                config
                    .field(step.compensation_reads)
                    .map(ResourceHandle::from)
            });
            let Some(handle) = handle else {
                debug!(step = %step.kind, "No resource recorded");
                report.push(step.kind, None, DeletionStatus::NotRecorded);
                continue;
            };

            let status = match self.remove(step, &handle).await {
                Ok(Deleted::Removed) => DeletionStatus::Deleted,
                Ok(Deleted::AlreadyAbsent) => DeletionStatus::AlreadyAbsent,
                Err(err) => {
                    error!(step = %step.kind, handle = %handle, error = %err, "Deletion failed");
                    DeletionStatus::Failed(err.to_string())
                }
            };
            info!(step = %step.kind, handle = %handle, status = ?status, "Teardown deletion finished");
            report.push(step.kind, Some(handle.to_string()), status);
        }

        if let Err(err) = self.directory.unset_mapping(&tenant).await {
            warn!(error = %err, "Failed to remove directory entry");
            report.cleanup_errors.push(format!("directory entry: {err}"));
        }
        self.remove_tenant_data(&config, &mut report.cleanup_errors).await;

        info!(complete = report.is_complete(), "Teardown finished");
        Ok(TeardownOutcome::Completed(report))
    }

    /// Deletes one resource.
    ///
    /// Async kinds are disabled first, given time to settle, deleted, and then
    /// polled until they are gone. Only the final delete and the wait for it
    /// to finish decide the outcome: a resource that cannot be disabled or
    /// never settles (including one in a failed state) is still deleted.
    async fn remove(
        &self,
        step: &ProvisioningStep,
        handle: &ResourceHandle,
    ) -> Result<Deleted, ProviderError> {
        let provider = self.provider(step.kind)?;
        if !(step.awaits_ready || provider.lifecycle() == Lifecycle::Async) {
            return provider.delete(handle).await;
        }

        let poll = self.settings.delete_poll;
        if let Err(err) = provider.prepare_delete(handle).await {
            warn!(handle = %handle, error = %err, "Could not disable resource, deleting anyway");
        }
        match await_state(&**provider, handle, TargetState::Ready, poll).await {
            Ok(WaitOutcome::Reached) => {}
            Ok(WaitOutcome::Vanished) => return Ok(Deleted::AlreadyAbsent),
            Ok(WaitOutcome::TimedOut { last }) => {
                warn!(handle = %handle, state = ?last, "Resource did not settle, deleting anyway");
            }
            Err(err) => {
                warn!(handle = %handle, error = %err, "Resource failed to settle, deleting anyway");
            }
        }

        let deleted = provider.delete(handle).await?;
        if deleted == Deleted::AlreadyAbsent {
            return Ok(deleted);
        }
        match await_state(&**provider, handle, TargetState::Gone, poll).await? {
            WaitOutcome::TimedOut { last } => Err(ProviderError::timeout(format!(
                "'{handle}' still present after {} attempts, last state {last:?}",
                poll.attempts.max(1)
            ))),
            WaitOutcome::Reached | WaitOutcome::Vanished => Ok(deleted),
        }
    }

    /// Drops the namespace and deletes the record. Missing ones are fine.
    async fn remove_tenant_data(&self, config: &TenantConfig, errors: &mut Vec<String>) {
        match self.store.drop_namespace(&config.namespace).await {
            Ok(()) => debug!(namespace = %config.namespace, "Namespace dropped"),
            Err(err) if err.is_not_found() => debug!(namespace = %config.namespace, "Namespace already absent"),
            Err(err) => {
                warn!(namespace = %config.namespace, error = %err, "Failed to drop namespace");
                errors.push(format!("namespace '{}': {err}", config.namespace));
            }
        }

        match self.store.delete(&config.tenant_id).await {
            Ok(()) => debug!("Tenant record deleted"),
            Err(err) if err.is_not_found() => debug!("Tenant record already absent"),
            Err(err) => {
                warn!(error = %err, "Failed to delete tenant record");
                errors.push(format!("record: {err}"));
            }
        }
    }
}
