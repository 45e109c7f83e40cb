//! The in-memory object graph that gets archived.
//!
//! Nodes live in an arena ([`ObjectGraph`]) and refer to each other through
//! [`NodeId`] values, so shared references and cycles need no pointer tricks.

/// Defines the `ObjectGraph` arena.
pub mod core;
/// Defines the `NodeId` and `ArchiveId` types.
pub mod id;

pub use self::core::ObjectGraph;
pub use self::id::{ArchiveId, NodeId};
