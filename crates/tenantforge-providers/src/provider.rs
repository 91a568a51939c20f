//! The provider contract and the per-kind registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tenantforge_core::{ResourceHandle, ResourceKind};

use crate::error::ProviderError;
use crate::types::{CreateRequest, Created, Deleted, Lifecycle, ResourceState};

/// One implementation per resource kind.
///
/// Adapters classify service errors at this boundary: a delete of something
/// that is already gone returns [`Deleted::AlreadyAbsent`], a create of
/// something this workflow already owns returns [`Created`] with `reused` set.
/// If `create` fails after the resource itself was made (a follow-up sub-call
/// failed), the adapter removes what it made before returning the error. When
/// that removal fails too, the error carries the handle in
/// [`ProviderError::orphan`] and the caller compensates it.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::Immediate
    }

    async fn create(&self, request: &CreateRequest) -> Result<Created, ProviderError>;

    /// Deletes the resource. Must tolerate not-found.
    async fn delete(&self, handle: &ResourceHandle) -> Result<Deleted, ProviderError>;

    async fn describe(&self, handle: &ResourceHandle) -> Result<ResourceState, ProviderError>;

    /// Puts the resource into a deletable state (e.g. disabling it).
    /// Not-found is not an error.
    async fn prepare_delete(&self, _handle: &ResourceHandle) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Shared handle to a provider.
pub type DynProvider = Arc<dyn ResourceProvider>;

/// One provider per resource kind.
#[derive(Clone, Default)]
pub struct ProviderSet {
    providers: BTreeMap<ResourceKind, DynProvider>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider under its own kind, replacing any previous one.
    pub fn register(&mut self, provider: DynProvider) {
        self.providers.insert(provider.kind(), provider);
    }

    #[must_use]
    pub fn with(mut self, provider: DynProvider) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&DynProvider> {
        self.providers.get(&kind)
    }

    /// Kinds with no registered provider.
    pub fn missing(&self) -> Vec<ResourceKind> {
        ResourceKind::ALL
            .into_iter()
            .filter(|kind| !self.providers.contains_key(kind))
            .collect()
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("kinds", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}
