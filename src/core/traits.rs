//! Seams to collaborators outside the economy core
//!
//! The engine never owns citizen data. It asks an [`OwnerDirectory`] for
//! display names and notification addresses when it needs them.

use crate::types::OwnerId;
use dashmap::DashMap;

/// Display identity of a citizen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerIdentity {
    pub owner: OwnerId,
    pub name: String,
    /// Chat address for notifications; `None` when the citizen has not linked one
    pub notify_address: Option<String>,
}

/// Identity/owner directory
pub trait OwnerDirectory: Send + Sync {
    fn resolve_owner(&self, owner: OwnerId) -> Option<OwnerIdentity>;
}

/// Directory held in memory, filled by whoever integrates the engine
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    owners: DashMap<OwnerId, OwnerIdentity>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, identity: OwnerIdentity) {
        self.owners.insert(identity.owner, identity);
    }
}

impl OwnerDirectory for InMemoryDirectory {
    fn resolve_owner(&self, owner: OwnerId) -> Option<OwnerIdentity> {
        self.owners.get(&owner).map(|entry| entry.value().clone())
    }
}
