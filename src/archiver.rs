//! The encode half of the protocol.
//!
//! Encoding a root runs in two explicit phases over the same read-only graph:
//!
//! 1. **Trace:** an iterative depth-first walk over strong edges (as declared
//!    by [`Archivable::visit`]) that collects every strongly reachable node.
//!    It writes no bytes and assigns no archive-ids.
//! 2. **Write:** a recursive depth-first walk driven by the nodes' own
//!    [`Archivable::encode`] routines. Each node gets its archive-id right
//!    before its record is emitted, so reaching it again (including from its
//!    own payload) produces a back-reference.
//!
//! A conditional reference is materialized only if its target already has an
//! id or was found by the trace pass; otherwise it is written as nil.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::class_names::ClassNameTable;
use crate::codec;
use crate::error::{GraphCodeError, Result};
use crate::format::{ArchiveHeader, Tag, ValueKind};
use crate::graph::{NodeId, ObjectGraph};
use crate::identity::EncodeIdentities;
use crate::io::ByteSink;
use crate::options::ArchiveOptions;
use crate::value::ArchiveValue;
use crate::visitor::{Archivable, Tracer};

/// Lifecycle of an encode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiverState {
    /// No root encoded yet.
    Idle,
    /// Computing the strongly reachable set of a root.
    Tracing,
    /// Emitting records for a root.
    Writing,
    /// The last root was written completely; another may follow.
    Done,
    /// An error occurred; the session must be discarded.
    Failed,
}

/// An encode session over one object graph.
///
/// Multiple roots may be encoded into the same session; nodes shared between
/// them are written once and back-referenced afterwards.
#[derive(Debug)]
pub struct Archiver<'g> {
    graph: &'g ObjectGraph,
    sink: ByteSink,
    identities: EncodeIdentities,
    class_names: ClassNameTable,
    strongly_reachable: HashSet<NodeId>,
    max_depth: usize,
    depth: usize,
    did_write_header: bool,
    state: ArchiverState,
    failure: Option<GraphCodeError>,
}

impl<'g> Archiver<'g> {
    /// Creates a session with default options.
    pub fn new(graph: &'g ObjectGraph) -> Self {
        Self::with_options(graph, ArchiveOptions::default())
    }

    /// Creates a session with explicit options.
    pub fn with_options(graph: &'g ObjectGraph, options: ArchiveOptions) -> Self {
        Self {
            graph,
            sink: ByteSink::new(),
            identities: EncodeIdentities::new(),
            class_names: options.class_names,
            strongly_reachable: HashSet::new(),
            max_depth: options.max_depth,
            depth: 0,
            did_write_header: false,
            state: ArchiverState::Idle,
            failure: None,
        }
    }

    /// Encodes `root` and everything strongly reachable from it.
    ///
    /// The header is written before the first root only. A `None` root is
    /// written as a nil record.
    ///
    /// # Errors
    /// Any failure is fatal: the session moves to [`ArchiverState::Failed`]
    /// and rejects all further calls.
    pub fn encode_root(&mut self, root: Option<NodeId>) -> Result<()> {
        self.ensure_usable()?;
        match self.state {
            ArchiverState::Idle | ArchiverState::Done => {}
            other => {
                return Err(GraphCodeError::Internal(format!(
                    "encode_root called while {other:?}; use encode_object inside payloads"
                )));
            }
        }

        self.state = ArchiverState::Tracing;
        if let Some(root) = root
            && let Err(e) = self.trace(root)
        {
            return Err(self.poison(e));
        }

        self.state = ArchiverState::Writing;
        if !self.did_write_header {
            self.write_header();
        }

        if let Err(e) = self.encode_object(root) {
            return Err(self.poison(e));
        }

        self.state = ArchiverState::Done;
        debug!(
            objects = self.identities.len(),
            bytes = self.sink.current_offset(),
            "root encoded"
        );
        Ok(())
    }

    /// Writes a strong reference to `node`.
    ///
    /// The first time a node is written it gets a full value record; every
    /// later encounter becomes a back-reference. `None` writes nil.
    pub fn encode_object(&mut self, node: Option<NodeId>) -> Result<()> {
        self.ensure_writing()?;
        let Some(id) = node else {
            codec::write_tag(&mut self.sink, Tag::NIL);
            return Ok(());
        };

        if let Some(archive_id) = self.identities.lookup(id) {
            trace!(node = %id, archive_id = %archive_id, "back-reference");
            codec::write_tag(&mut self.sink, Tag::Reference);
            crate::varint::write_varint(&mut self.sink, u64::from(archive_id.as_u32()));
            return Ok(());
        }

        let graph = self.graph;
        let object = graph.get(id).ok_or_else(|| {
            GraphCodeError::Internal(format!("node {id} is not part of the archived graph"))
        })?;

        if self.depth >= self.max_depth {
            return Err(GraphCodeError::DepthLimit(self.max_depth));
        }

        let (archive_id, _) = self.identities.assign_or_lookup(id);
        self.write_record_header(object);
        trace!(
            node = %id,
            archive_id = %archive_id,
            class = object.class_name(),
            "value record"
        );

        self.depth += 1;
        let result = object.encode(self);
        self.depth -= 1;
        result
    }

    /// Writes a conditional reference to `node`.
    ///
    /// Behaves like [`encode_object`](Archiver::encode_object) if the node was
    /// already written or is strongly reachable from a traced root. Otherwise
    /// writes nil and leaves the node without an archive-id.
    pub fn encode_conditional_object(&mut self, node: Option<NodeId>) -> Result<()> {
        self.ensure_writing()?;
        match node {
            Some(id)
                if self.identities.lookup(id).is_some()
                    || self.strongly_reachable.contains(&id) =>
            {
                self.encode_object(Some(id))
            }
            Some(id) => {
                trace!(node = %id, "conditional reference dropped");
                codec::write_tag(&mut self.sink, Tag::NIL);
                Ok(())
            }
            None => {
                codec::write_tag(&mut self.sink, Tag::NIL);
                Ok(())
            }
        }
    }

    /// Writes `true_name` as `alias` in every record emitted after this call.
    pub fn register_alias(&mut self, true_name: impl Into<String>, alias: impl Into<String>) {
        self.class_names.register_alias(true_name, alias);
    }

    /// Overrides the version written for `true_name` from now on.
    pub fn set_class_version(&mut self, true_name: impl Into<String>, version: u32) {
        self.class_names.set_version(true_name, version);
    }

    /// The name records of `true_name` are currently written under.
    pub fn class_name_encoded_for<'a>(&'a self, true_name: &'a str) -> &'a str {
        self.class_names.alias_for_encoding(true_name)
    }

    /// Writes any [`ArchiveValue`] (tagged).
    pub fn write_value<T: ArchiveValue>(&mut self, value: &T) -> Result<()> {
        value.encode_value(self)
    }

    /// Writes a boolean.
    pub fn write_bool(&mut self, value: bool, tagged: bool) {
        codec::write_bool(&mut self.sink, value, tagged);
    }

    /// Writes a string.
    pub fn write_string(&mut self, value: &str, tagged: bool) {
        codec::write_string(&mut self.sink, value, tagged);
    }

    /// Writes a raw byte block.
    pub fn write_blob(&mut self, value: &[u8], tagged: bool) {
        codec::write_blob(&mut self.sink, value, tagged);
    }

    /// Current session state.
    pub fn state(&self) -> ArchiverState {
        self.state
    }

    /// Number of distinct nodes written so far.
    pub fn object_count(&self) -> usize {
        self.identities.len()
    }

    /// The bytes written so far.
    pub fn bytes(&self) -> &[u8] {
        self.sink.as_slice()
    }

    /// Finishes the session and returns the archive.
    ///
    /// A session that never encoded a root still yields a valid, empty archive
    /// (header only).
    ///
    /// # Errors
    /// Fails if the session is poisoned or a root is still being written.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        self.ensure_usable()?;
        match self.state {
            ArchiverState::Idle | ArchiverState::Done => {}
            other => {
                return Err(GraphCodeError::Internal(format!(
                    "archive finished while {other:?}"
                )));
            }
        }
        if !self.did_write_header {
            self.write_header();
        }
        Ok(self.sink.into_inner())
    }

    fn trace(&mut self, root: NodeId) -> Result<()> {
        let before = self.strongly_reachable.len();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !self.strongly_reachable.insert(id) {
                continue;
            }
            let node = self.graph.get(id).ok_or_else(|| {
                GraphCodeError::Internal(format!("node {id} is not part of the archived graph"))
            })?;
            node.visit(&mut Tracer::new(&mut stack));
        }
        debug!(
            root = %root,
            newly_reachable = self.strongly_reachable.len() - before,
            "trace pass finished"
        );
        Ok(())
    }

    fn write_header(&mut self) {
        self.sink.append(&ArchiveHeader::new().to_bytes());
        self.did_write_header = true;
        debug!("archive header written");
    }

    fn write_record_header(&mut self, object: &dyn Archivable) {
        let (name, version) = self
            .class_names
            .resolve_for_encoding(object.class_name(), object.class_version());
        codec::write_tag(&mut self.sink, Tag::Value(ValueKind::Object));
        codec::write_string(&mut self.sink, name, false);
        crate::varint::write_varint(&mut self.sink, u64::from(version));
    }

    fn ensure_usable(&self) -> Result<()> {
        match &self.failure {
            Some(e) => Err(GraphCodeError::Internal(format!(
                "session poisoned by earlier failure: {e}"
            ))),
            None => Ok(()),
        }
    }

    fn ensure_writing(&self) -> Result<()> {
        self.ensure_usable()?;
        if self.state != ArchiverState::Writing {
            return Err(GraphCodeError::Internal(format!(
                "objects can only be encoded while writing a root (state: {:?})",
                self.state
            )));
        }
        Ok(())
    }

    fn poison(&mut self, err: GraphCodeError) -> GraphCodeError {
        self.state = ArchiverState::Failed;
        self.failure = Some(err.clone());
        self.depth = 0;
        err
    }
}

macro_rules! archiver_scalar_writers {
    ($($name:ident: $t:ty),* $(,)?) => {
        impl Archiver<'_> {
            $(
                #[doc = concat!("Writes a `", stringify!($t), "`.")]
                pub fn $name(&mut self, value: $t, tagged: bool) {
                    codec::$name(&mut self.sink, value, tagged);
                }
            )*
        }
    };
}

archiver_scalar_writers! {
    write_i8: i8,
    write_u8: u8,
    write_i16: i16,
    write_u16: u16,
    write_i32: i32,
    write_u32: u32,
    write_i64: i64,
    write_u64: u64,
    write_f32: f32,
    write_f64: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    #[derive(Debug)]
    struct Link {
        next: Option<NodeId>,
        back: Option<NodeId>,
    }

    impl Archivable for Link {
        fn class_name(&self) -> &'static str {
            "Link"
        }
        fn visit(&self, tracer: &mut Tracer<'_>) {
            tracer.reference(self.next);
        }
        fn encode(&self, archiver: &mut Archiver<'_>) -> Result<()> {
            archiver.encode_object(self.next)?;
            archiver.encode_conditional_object(self.back)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn chain() -> (ObjectGraph, NodeId, NodeId) {
        let mut graph = ObjectGraph::new();
        let tail = graph.add(Link {
            next: None,
            back: None,
        });
        let head = graph.add(Link {
            next: Some(tail),
            back: None,
        });
        if let Some(link) = graph.get_mut_as::<Link>(tail) {
            link.back = Some(head);
        }
        (graph, head, tail)
    }

    #[test]
    fn trace_pass_assigns_no_ids() -> Result<()> {
        let (graph, head, tail) = chain();
        let mut archiver = Archiver::new(&graph);
        archiver.trace(head)?;
        assert!(archiver.strongly_reachable.contains(&head));
        assert!(archiver.strongly_reachable.contains(&tail));
        assert!(archiver.identities.is_empty());
        assert!(archiver.bytes().is_empty());
        Ok(())
    }

    #[test]
    fn conditional_back_pointer_to_written_node_is_a_reference() -> Result<()> {
        let (graph, head, _) = chain();
        let mut archiver = Archiver::new(&graph);
        archiver.encode_root(Some(head))?;
        assert_eq!(archiver.object_count(), 2);
        assert_eq!(archiver.state(), ArchiverState::Done);

        let bytes = archiver.into_bytes()?;
        // tail's conditional `back` points at head, which already has id 1;
        // head's own `back` is empty.
        assert_eq!(&bytes[bytes.len() - 3..], &[0x8E, 0x01, 0x00]);
        Ok(())
    }

    #[test]
    fn encoding_outside_a_root_is_rejected() {
        let (graph, head, _) = chain();
        let mut archiver = Archiver::new(&graph);
        assert!(matches!(
            archiver.encode_object(Some(head)),
            Err(GraphCodeError::Internal(_))
        ));
    }

    #[test]
    fn depth_limit_poisons_the_session() {
        let (graph, head, _) = chain();
        let mut archiver = Archiver::with_options(&graph, ArchiveOptions::new().max_depth(1));
        assert_eq!(
            archiver.encode_root(Some(head)),
            Err(GraphCodeError::DepthLimit(1))
        );
        assert_eq!(archiver.state(), ArchiverState::Failed);
        assert!(matches!(
            archiver.encode_root(None),
            Err(GraphCodeError::Internal(_))
        ));
        assert!(archiver.into_bytes().is_err());
    }

    #[test]
    fn foreign_node_id_is_an_internal_error() {
        let (graph, _, _) = chain();
        let mut other = ObjectGraph::new();
        for _ in 0..5 {
            other.add(Link {
                next: None,
                back: None,
            });
        }
        let foreign = other.ids().last();
        let mut archiver = Archiver::new(&graph);
        assert!(matches!(
            archiver.encode_root(foreign),
            Err(GraphCodeError::Internal(_))
        ));
    }
}
