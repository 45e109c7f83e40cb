//! Defines the traits a node type implements to take part in archiving.
//!
//! [`Archivable`] is the object-safe half used while encoding: it names the
//! node's class, declares its strong children for the trace pass, and writes
//! its payload. [`ArchiveType`] adds the constructor side used by the
//! [`TypeRegistry`](crate::registry::TypeRegistry) while decoding.
//!
//! Most types get both from `#[derive(Archivable)]`.

use std::any::Any;
use std::fmt;

use crate::archiver::Archiver;
use crate::error::Result;
use crate::graph::NodeId;
use crate::unarchiver::Unarchiver;

/// A node that can be written into an archive.
pub trait Archivable: Any + fmt::Debug {
    /// The true class name, used to find the decoder on the way back in.
    fn class_name(&self) -> &'static str;

    /// Version written with every record of this class, unless the session
    /// overrides it.
    fn class_version(&self) -> u32 {
        0
    }

    /// Declares every strong child of this node.
    ///
    /// Called during the trace pass, before any bytes are written. It must
    /// report exactly the references [`encode`](Archivable::encode) writes
    /// with [`Archiver::encode_object`]. References written with
    /// [`Archiver::encode_conditional_object`] must be left out.
    fn visit(&self, tracer: &mut Tracer<'_>);

    /// Writes this node's payload.
    ///
    /// Child nodes are written by calling back into the archiver, which may
    /// in turn reach this node again; it will then be written as a
    /// back-reference.
    fn encode(&self, archiver: &mut Archiver<'_>) -> Result<()>;

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A node type that can be reconstructed from an archive.
pub trait ArchiveType: Archivable + Sized {
    /// True class name, identical to what [`Archivable::class_name`] returns.
    const CLASS_NAME: &'static str;

    /// Current version of the payload layout.
    const VERSION: u32 = 0;

    /// Reads the payload written by [`Archivable::encode`].
    ///
    /// `version` is the class version stored in the record. Returning
    /// `GraphCodeError::Version` for versions this type cannot read is the
    /// type's own policy.
    fn decode(unarchiver: &mut Unarchiver<'_>, version: u32) -> Result<Self>;
}

/// Collects strong edges during the read-only trace pass.
///
/// The archiver owns the work stack; a tracer only pushes onto it, so deep
/// graphs are walked iteratively.
pub struct Tracer<'s> {
    pending: &'s mut Vec<NodeId>,
}

impl<'s> Tracer<'s> {
    pub(crate) fn new(pending: &'s mut Vec<NodeId>) -> Self {
        Self { pending }
    }

    /// Records a strong reference. `None` is ignored.
    pub fn reference(&mut self, node: Option<NodeId>) {
        if let Some(node) = node {
            self.pending.push(node);
        }
    }
}

impl fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tracer(pending={})", self.pending.len())
    }
}
