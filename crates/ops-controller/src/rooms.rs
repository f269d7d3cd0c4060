//! Group membership index for fan-out delivery.
//!
//! Pure in-memory indexing: a connection can be a member of any number of
//! named groups, and a group can be enumerated for broadcast. Nothing here is
//! persisted — on restart every connection re-authenticates and rejoins.
//!
//! Delivery itself lives in the coordinator (it owns the outbound senders);
//! this module only answers "who is in this group".

use common::types::{ConnectionId, OperationId};
use std::collections::{HashMap, HashSet};

/// Typed key for a fan-out group.
///
/// The three group kinds are distinct variants, so an operation named
/// `"admin-ALPHA"` can never collide with the admin group of operation
/// `"ALPHA"` the way concatenated string keys could.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// Every connection bound to an operation. Used for config broadcasts.
    Operation(OperationId),
    /// All admin connections of an operation. Used for telemetry fan-out.
    Admins(OperationId),
    /// Units currently tuned to one channel of an operation.
    Channel(OperationId, String),
}

/// In-memory membership index.
#[derive(Debug, Default)]
pub struct Rooms {
    members: HashMap<GroupKey, HashSet<ConnectionId>>,
    joined: HashMap<ConnectionId, HashSet<GroupKey>>,
}

impl Rooms {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a group. Joining twice is a no-op.
    pub fn join(&mut self, connection_id: ConnectionId, group: GroupKey) {
        self.members
            .entry(group.clone())
            .or_default()
            .insert(connection_id);
        self.joined.entry(connection_id).or_default().insert(group);
    }

    /// Remove a connection from one group. Empty groups are dropped.
    pub fn leave(&mut self, connection_id: ConnectionId, group: &GroupKey) {
        if let Some(set) = self.members.get_mut(group) {
            set.remove(&connection_id);
            if set.is_empty() {
                self.members.remove(group);
            }
        }
        if let Some(groups) = self.joined.get_mut(&connection_id) {
            groups.remove(group);
            if groups.is_empty() {
                self.joined.remove(&connection_id);
            }
        }
    }

    /// Remove a connection from every group it joined (disconnect teardown).
    pub fn leave_all(&mut self, connection_id: ConnectionId) {
        let Some(groups) = self.joined.remove(&connection_id) else {
            return;
        };
        for group in groups {
            if let Some(set) = self.members.get_mut(&group) {
                set.remove(&connection_id);
                if set.is_empty() {
                    self.members.remove(&group);
                }
            }
        }
    }

    /// Current members of a group.
    #[must_use]
    pub fn members(&self, group: &GroupKey) -> Vec<ConnectionId> {
        self.members
            .get(group)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether a connection is currently in a group.
    #[must_use]
    pub fn is_member(&self, group: &GroupKey, connection_id: ConnectionId) -> bool {
        self.members
            .get(group)
            .is_some_and(|set| set.contains(&connection_id))
    }

    /// Groups a connection has joined.
    #[must_use]
    pub fn groups_of(&self, connection_id: ConnectionId) -> Vec<GroupKey> {
        self.joined
            .get(&connection_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}
