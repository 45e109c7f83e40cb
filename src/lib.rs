//! # graphcode
//!
//! Binary archiving of arbitrary, possibly cyclic graphs of typed nodes, with
//! object identity preserved across a round trip.
//!
//! ## Overview
//!
//! Most serializers treat data as a tree: a value reachable along two paths is
//! written twice and comes back as two copies, and a cycle never terminates.
//! graphcode archives *graphs*. Every node is written once; later encounters
//! are written as back-references to the node's archive-id, and decoding
//! rebuilds the same sharing and the same cycles.
//!
//! ### Key Features
//!
//! *   **Identity Preservation:** Shared nodes stay shared and cycles stay cycles.
//! *   **Conditional References:** A weak edge (say, a parent back-pointer) is
//!     written only if its target is part of the archive anyway; otherwise it
//!     decodes as `None`.
//! *   **Class Aliases:** The name stored for a class can be remapped on the way
//!     out and on the way in, so types can be renamed without breaking old
//!     archives.
//! *   **Class Versions:** Every record carries its class version; decode
//!     routines decide what they can read.
//! *   **Bounded Decoding:** Nesting depth is capped, and truncated or corrupt
//!     input is rejected with a [`GraphCodeError::Format`] instead of a panic.
//!
//! ## Architecture
//!
//! ### The Graph Model
//!
//! Nodes live in an [`ObjectGraph`] arena and refer to each other through
//! [`NodeId`]s. Two fields holding the same `NodeId` point at the same node,
//! which is the identity the archive preserves.
//!
//! ### Encoding
//!
//! The [`Archiver`] runs two passes per root. A read-only *trace* pass walks
//! the strong edges declared by [`Archivable::visit`] to find every node that
//! will certainly be written. The *write* pass then emits records depth-first,
//! and conditional references consult the traced set.
//!
//! ### Stream Format
//!
//! ```text
//! [ "GRPH" | u16 version ] [ root record ] [ root record ] ...
//!
//! record := 0x00                                        nil
//!         | 0x8E varint(archive-id)                     back-reference
//!         | 0x0E len-prefixed(class) varint(version) payload
//! ```
//!
//! Scalars inside payloads are tagged and big-endian; strings and blobs are
//! varint length-prefixed.
//!
//! ### Decoding
//!
//! The [`Unarchiver`] looks each class up in a [`TypeRegistry`], reserves the
//! node's slot before its payload is read, and fills it afterwards, so
//! self-references resolve.
//!
//! ## Usage Patterns
//!
//! ```rust,ignore
//! use graphcode::{Archivable, GraphCode, NodeId, ObjectGraph, TypeRegistry};
//!
//! #[derive(Debug, Archivable)]
//! struct Folder {
//!     name: String,
//!     children: Vec<NodeId>,
//!     #[archive(conditional)]
//!     parent: Option<NodeId>,
//! }
//!
//! let mut graph = ObjectGraph::new();
//! let root = graph.add(Folder { name: "/".into(), children: vec![], parent: None });
//!
//! let bytes = GraphCode::encode(&graph, Some(root))?;
//!
//! let mut registry = TypeRegistry::new();
//! registry.register::<Folder>();
//! let decoded = GraphCode::decode(&registry, &bytes)?;
//! assert_eq!(decoded.root_as::<Folder>().map(|f| f.name.as_str()), Some("/"));
//! ```
//!
//! ### Safety and Error Handling
//!
//! * **No Unsafe:** The crate forbids `unsafe` code.
//! * **No Panics:** No `unwrap()` or `panic!()` calls in the library (enforced by clippy lints).
//! * **Comprehensive Errors:** All failures correspond to a [`GraphCodeError`] type.
//! * **Poisoned Sessions:** After a failure a session rejects further calls.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod archiver;
pub mod class_names;
pub mod error;
pub mod format;
pub mod inspector;
pub mod options;
pub mod registry;
pub mod unarchiver;
pub mod value;
pub mod visitor;

// --- INTERNAL IMPLEMENTATION MODULES (Hidden from Docs) ---
#[doc(hidden)]
pub mod codec;
#[doc(hidden)]
pub mod graph;
#[doc(hidden)]
pub mod identity;
#[doc(hidden)]
pub mod io;
#[doc(hidden)]
pub mod varint;

// --- MACRO SUPPORT MODULES ---

/// Runtime utilities used by the derived code.
#[doc(hidden)]
pub mod rt;

// --- RE-EXPORTS ---

pub use api::{GraphCode, Unarchived, UnarchivedRoots};
pub use archiver::{Archiver, ArchiverState};
pub use class_names::ClassNameTable;
pub use error::{GraphCodeError, Result};
pub use graph::{ArchiveId, NodeId, ObjectGraph};
pub use inspector::{DebugReport, Inspector};
pub use options::ArchiveOptions;
pub use registry::{TypeDescriptor, TypeRegistry};
pub use unarchiver::{Unarchiver, UnarchiverState};
pub use value::{ArchiveValue, Blob, Opaque};
pub use visitor::{ArchiveType, Archivable, Tracer};

// Re-export the derive macro so it is accessible as `graphcode::Archivable`
pub use graphcode_derive::Archivable;

/// Constants used throughout the library.
pub mod constants {
    /// Default bound on record nesting depth.
    ///
    /// Each level costs several stack frames; 128 levels fit a 2 MiB thread
    /// stack in unoptimized builds. Raise it together with the stack size of
    /// the thread running the session.
    pub const DEFAULT_MAX_DEPTH: usize = 128;
}
