//! # tenantforge-providers
//!
//! The contract between the orchestrator and the services that own tenant
//! resources, plus the AWS implementations of it.
//!
//! - [`ResourceProvider`]: create / delete / describe for one resource kind
//! - [`await_state`]: bounded polling for providers with asynchronous state
//! - [`aws`]: adapters for object storage, batch, functions, roles and gateways
//! - [`memory`]: an in-memory cloud for tests and local dry runs

pub mod aws;
mod error;
pub mod memory;
mod provider;
mod types;
mod wait;

pub use error::{ProviderError, ProviderErrorKind};
pub use provider::{DynProvider, ProviderSet, ResourceProvider};
pub use types::{CreateRequest, Created, Deleted, Lifecycle, ResourceState, TargetState};
pub use wait::{PollPolicy, WaitOutcome, await_state, secs};
