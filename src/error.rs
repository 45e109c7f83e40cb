//! Centralized error handling for graphcode.
//!
//! Every failure in an encode or decode session is reported through
//! [`GraphCodeError`]. None of them are recoverable inside the session: once an
//! operation returns `Err`, the session is poisoned and the caller must discard
//! it together with any partially decoded graph.
//!
//! ## Error Categories
//!
//! - **Format** ([`GraphCodeError::Format`]): malformed header or tag, truncated stream
//! - **Unknown Type** ([`GraphCodeError::UnknownType`]): no descriptor registered for a class
//! - **Dangling Reference** ([`GraphCodeError::DanglingReference`]): back-reference to an unseen id
//! - **Version** ([`GraphCodeError::Version`]): a type declined the archived class version
//! - **Depth Limit** ([`GraphCodeError::DepthLimit`]): nesting exceeded the configured bound
//! - **Payload** ([`GraphCodeError::Payload`]): a node's own encode/decode routine failed
//! - **Internal** ([`GraphCodeError::Internal`]): misuse of a session (should not occur in production)
//!
//! ## Usage Patterns
//!
//! ```rust
//! use graphcode::{GraphCode, GraphCodeError, TypeRegistry};
//!
//! let registry = TypeRegistry::new();
//! match GraphCode::decode(&registry, b"nope") {
//!     Ok(_) => unreachable!(),
//!     Err(GraphCodeError::Format(msg)) => println!("corrupt input: {msg}"),
//!     Err(e) => println!("other error: {e}"),
//! }
//! ```

use std::fmt;

use crate::graph::ArchiveId;

/// A specialized `Result` type for graphcode operations.
pub type Result<T> = std::result::Result<T, GraphCodeError>;

/// The master error enum covering all failure domains of an archive session.
///
/// The type is `Clone` so a poisoned session can hand the original failure
/// back to the caller more than once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphCodeError {
    /// The byte stream does not follow the wire format.
    ///
    /// ## Common Causes
    ///
    /// - Wrong signature bytes or a stream version newer than this decoder
    /// - Truncated input (a record ends before its payload does)
    /// - Unknown tag byte, or a tag of the wrong kind for the field being read
    /// - Invalid UTF-8 in a string record, or a malformed varint
    Format(String),

    /// A value record names a class that has no registered type descriptor.
    ///
    /// The string is the true class name, after alias resolution.
    UnknownType(String),

    /// A back-reference points at an archive-id that was never registered
    /// earlier in the stream.
    DanglingReference(ArchiveId),

    /// A type's decode routine does not support the archived class version.
    Version {
        /// True class name of the rejected record.
        class: String,
        /// Version found in the stream.
        found: u32,
        /// Highest version the decode routine understands.
        supported: u32,
    },

    /// Recursive encode or decode went deeper than the configured limit.
    DepthLimit(usize),

    /// A node-level encode or decode routine reported a failure of its own.
    Payload(String),

    /// Logic error: the session was used out of order or after a failure.
    Internal(String),
}

impl GraphCodeError {
    /// Shorthand for a truncated-stream format error.
    pub(crate) fn truncated(wanted: usize, offset: usize, available: usize) -> Self {
        Self::Format(format!(
            "truncated stream: wanted {wanted} bytes at offset {offset}, {available} available"
        ))
    }
}

impl fmt::Display for GraphCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(s) => write!(f, "Format Error: {s}"),
            Self::UnknownType(name) => write!(f, "Unknown Type: no descriptor for class '{name}'"),
            Self::DanglingReference(id) => {
                write!(f, "Dangling Reference: archive id {id} was never decoded")
            }
            Self::Version {
                class,
                found,
                supported,
            } => write!(
                f,
                "Version Error: class '{class}' archived at version {found}, supported up to {supported}"
            ),
            Self::DepthLimit(limit) => write!(f, "Depth Limit: nesting exceeded {limit} levels"),
            Self::Payload(s) => write!(f, "Payload Error: {s}"),
            Self::Internal(s) => write!(f, "Internal Logic Error: {s}"),
        }
    }
}

impl std::error::Error for GraphCodeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_category() {
        let err = GraphCodeError::Version {
            class: "Point".into(),
            found: 3,
            supported: 1,
        };
        assert_eq!(
            err.to_string(),
            "Version Error: class 'Point' archived at version 3, supported up to 1"
        );
        assert!(
            GraphCodeError::DanglingReference(ArchiveId::new(7))
                .to_string()
                .contains("archive id 7")
        );
    }

    #[test]
    fn truncated_reports_offsets() {
        let err = GraphCodeError::truncated(4, 10, 1);
        assert!(matches!(err, GraphCodeError::Format(ref m) if m.contains("offset 10")));
    }
}
