use crate::capability::Capability;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use taskbridge_core::{TaskbridgeError, TaskbridgeResult};
use tracing::{info, warn};

/// Registry binding of a name to a capability.
#[derive(Clone)]
pub struct AgentEntry {
    name: String,
    capability: Arc<dyn Capability>,
    unavailable_reason: Option<String>,
}

impl AgentEntry {
    /// Registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the agent may be dispatched to.
    pub fn is_available(&self) -> bool {
        self.unavailable_reason.is_none()
    }

    /// Why the agent is unavailable, if it is.
    pub fn unavailable_reason(&self) -> Option<&str> {
        self.unavailable_reason.as_deref()
    }

    /// The bound capability, regardless of availability.
    pub fn capability(&self) -> &Arc<dyn Capability> {
        &self.capability
    }
}

impl std::fmt::Debug for AgentEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentEntry")
            .field("name", &self.name)
            .field("unavailable_reason", &self.unavailable_reason)
            .finish_non_exhaustive()
    }
}

/// Serializable listing row for `entries()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentListing {
    pub name: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Central registry of agents, built at startup.
///
/// Read-only once handed to the orchestrator (wrapped in an `Arc`).
#[derive(Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, AgentEntry>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `capability` under `name`.
    ///
    /// Runs the capability's [`readiness`](Capability::readiness) check; an
    /// agent that fails it is kept, marked unavailable.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        capability: Arc<dyn Capability>,
    ) -> TaskbridgeResult<()> {
        let reason = capability.readiness().err();
        self.insert(name.into(), capability, reason)
    }

    /// Register an agent known to be unusable (e.g. disabled by config).
    pub fn register_unavailable(
        &mut self,
        name: impl Into<String>,
        capability: Arc<dyn Capability>,
        reason: impl Into<String>,
    ) -> TaskbridgeResult<()> {
        self.insert(name.into(), capability, Some(reason.into()))
    }

    fn insert(
        &mut self,
        name: String,
        capability: Arc<dyn Capability>,
        unavailable_reason: Option<String>,
    ) -> TaskbridgeResult<()> {
        if self.agents.contains_key(&name) {
            return Err(TaskbridgeError::DuplicateName(name));
        }
        match &unavailable_reason {
            None => info!(agent = %name, "Registered agent"),
            Some(reason) => warn!(agent = %name, reason = %reason, "Registered agent as unavailable"),
        }
        self.agents.insert(
            name.clone(),
            AgentEntry {
                name,
                capability,
                unavailable_reason,
            },
        );
        Ok(())
    }

    /// Remove an agent. Returns whether it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        let removed = self.agents.remove(name).is_some();
        if removed {
            info!(agent = %name, "Unregistered agent");
        }
        removed
    }

    /// Look up a dispatchable capability.
    pub fn get(&self, name: &str) -> TaskbridgeResult<Arc<dyn Capability>> {
        let entry = self
            .agents
            .get(name)
            .ok_or_else(|| TaskbridgeError::UnknownAgent(name.to_string()))?;
        match &entry.unavailable_reason {
            None => Ok(entry.capability.clone()),
            Some(reason) => Err(TaskbridgeError::AgentUnavailable {
                name: name.to_string(),
                reason: reason.clone(),
            }),
        }
    }

    /// Look up an entry regardless of availability.
    pub fn entry(&self, name: &str) -> Option<&AgentEntry> {
        self.agents.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.agents.get(name).is_some_and(AgentEntry::is_available)
    }

    /// Names of all registered agents, available or not.
    pub fn list(&self) -> BTreeSet<String> {
        self.agents.keys().cloned().collect()
    }

    /// All entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentEntry> {
        self.agents.values()
    }

    pub fn entries(&self) -> Vec<AgentListing> {
        self.agents
            .values()
            .map(|e| AgentListing {
                name: e.name.clone(),
                available: e.is_available(),
                reason: e.unavailable_reason.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
