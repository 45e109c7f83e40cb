//! Bidirectional archive-id bookkeeping.
//!
//! The encode half ([`EncodeIdentities`]) answers "has this node been written
//! yet, and under which id". The decode half ([`DecodeIdentities`]) maps the
//! ids found on the wire back to the nodes materialized for them.
//!
//! Both deduplication and cycle safety come down to assigning the id *before*
//! the node's payload is processed: a node that reaches itself again while its
//! own fields are being written (or read) finds its id already present.

use std::collections::HashMap;

use crate::error::{GraphCodeError, Result};
use crate::graph::{ArchiveId, NodeId};

/// Encode side: node identity to archive-id, assign-once.
#[derive(Debug)]
pub struct EncodeIdentities {
    assigned: HashMap<NodeId, ArchiveId>,
    next: ArchiveId,
}

impl EncodeIdentities {
    /// Creates an empty table whose first id will be [`ArchiveId::FIRST`].
    pub fn new() -> Self {
        Self {
            assigned: HashMap::new(),
            next: ArchiveId::FIRST,
        }
    }

    /// Returns the node's existing id with `false`, or assigns the next
    /// sequential id and returns it with `true`.
    pub fn assign_or_lookup(&mut self, node: NodeId) -> (ArchiveId, bool) {
        if let Some(&id) = self.assigned.get(&node) {
            return (id, false);
        }
        let id = self.next;
        self.next = id.next();
        self.assigned.insert(node, id);
        (id, true)
    }

    /// Returns the node's id without assigning one.
    pub fn lookup(&self, node: NodeId) -> Option<ArchiveId> {
        self.assigned.get(&node).copied()
    }

    /// Number of ids handed out so far.
    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    /// Returns true if no id has been assigned.
    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

impl Default for EncodeIdentities {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode side: archive-id to materialized node, register-once.
#[derive(Debug, Default)]
pub struct DecodeIdentities {
    registered: HashMap<ArchiveId, NodeId>,
}

impl DecodeIdentities {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the node materialized for `id`.
    ///
    /// # Errors
    /// Registering an id twice means the session is corrupt and yields
    /// `GraphCodeError::Internal`.
    pub fn register_decoded(&mut self, id: ArchiveId, node: NodeId) -> Result<()> {
        if let Some(existing) = self.registered.insert(id, node) {
            return Err(GraphCodeError::Internal(format!(
                "archive id {id} registered twice (already bound to {existing})"
            )));
        }
        Ok(())
    }

    /// Resolves a back-reference.
    ///
    /// # Errors
    /// `GraphCodeError::DanglingReference` if `id` was never registered.
    pub fn lookup(&self, id: ArchiveId) -> Result<NodeId> {
        self.registered
            .get(&id)
            .copied()
            .ok_or(GraphCodeError::DanglingReference(id))
    }

    /// Number of registered ids.
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    /// Returns true if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }
}
