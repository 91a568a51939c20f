#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tenantforge_db_memory::{InMemoryStore, create_memory_store};
use tenantforge_orchestrator::{Orchestrator, OrchestratorSettings};
use tenantforge_providers::PollPolicy;
use tenantforge_providers::memory::InMemoryCloud;

pub struct Harness {
    pub cloud: Arc<InMemoryCloud>,
    pub store: Arc<InMemoryStore>,
    pub orchestrator: Orchestrator,
}

pub fn fast_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        request_timeout: Duration::from_secs(5),
        ready_poll: PollPolicy::new(3, Duration::from_millis(5)),
        delete_poll: PollPolicy::new(3, Duration::from_millis(5)),
        ..Default::default()
    }
}

pub fn harness() -> Harness {
    harness_with(fast_settings(), |_| {})
}

/// Builds a harness, letting the caller inject faults before wiring.
pub fn harness_with(settings: OrchestratorSettings, setup: impl FnOnce(&InMemoryCloud)) -> Harness {
    let cloud = InMemoryCloud::new();
    setup(&*cloud);
    let store = create_memory_store();
    let orchestrator = Orchestrator::new(store.clone(), store.clone(), cloud.providers(), settings);
    Harness {
        cloud,
        store,
        orchestrator,
    }
}
