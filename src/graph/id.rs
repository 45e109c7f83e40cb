use std::fmt;

/// A strong type representing the identity of a node inside an [`ObjectGraph`].
///
/// This is an arena index: two fields holding the same `NodeId` reference the
/// same node, which is the notion of identity the archiver preserves.
///
/// [`ObjectGraph`]: super::ObjectGraph
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32); // u32 is sufficient for 4 billion nodes per graph.

impl NodeId {
    /// Creates a new NodeId.
    /// Restrict visibility to the crate to prevent arbitrary creation.
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The identifier a node receives the first time it is written to an archive.
///
/// Ids are handed out sequentially starting at 1 and are never reused within
/// a session. They only exist on the wire; decoding maps them back to fresh
/// [`NodeId`]s.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveId(u32);

impl ArchiveId {
    /// The first id assigned in every session.
    pub const FIRST: ArchiveId = ArchiveId(1);

    /// Wraps a raw archive id.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub(crate) fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Debug for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchiveId({})", self.0)
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
