//! The decode half of the protocol.
//!
//! An [`Unarchiver`] reads the header once, then materializes records in the
//! order they appear. Every value record reserves its node slot and registers
//! its archive-id *before* the class's decode routine runs, so a payload that
//! refers back to its own node (directly or through a cycle) resolves to the
//! reserved slot.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::class_names::ClassNameTable;
use crate::codec;
use crate::error::{GraphCodeError, Result};
use crate::format::{ArchiveHeader, HEADER_SIZE, Tag, ValueKind};
use crate::graph::{ArchiveId, NodeId, ObjectGraph};
use crate::identity::DecodeIdentities;
use crate::inspector::RecordInfo;
use crate::io::ByteSource;
use crate::options::ArchiveOptions;
use crate::registry::TypeRegistry;
use crate::value::ArchiveValue;
use crate::varint::read_varint32;

/// Lifecycle of a decode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnarchiverState {
    /// Nothing read yet.
    Idle,
    /// Validating the archive header.
    ReadingHeader,
    /// Materializing the records of a root.
    Decoding,
    /// The last root was decoded completely; another may follow.
    Done,
    /// An error occurred; the session must be discarded.
    Failed,
}

/// A decode session over one archive.
#[derive(Debug)]
pub struct Unarchiver<'a> {
    registry: &'a TypeRegistry,
    source: ByteSource<'a>,
    graph: ObjectGraph,
    identities: DecodeIdentities,
    class_names: ClassNameTable,
    class_versions: HashMap<String, u32>,
    max_depth: usize,
    depth: usize,
    header: Option<ArchiveHeader>,
    state: UnarchiverState,
    failure: Option<GraphCodeError>,
    records: Option<Vec<RecordInfo>>,
}

impl<'a> Unarchiver<'a> {
    /// Creates a session with default options.
    pub fn new(registry: &'a TypeRegistry, bytes: &'a [u8]) -> Self {
        Self::with_options(registry, bytes, ArchiveOptions::default())
    }

    /// Creates a session with explicit options.
    pub fn with_options(registry: &'a TypeRegistry, bytes: &'a [u8], options: ArchiveOptions) -> Self {
        Self {
            registry,
            source: ByteSource::new(bytes),
            graph: ObjectGraph::new(),
            identities: DecodeIdentities::new(),
            class_names: options.class_names,
            class_versions: HashMap::new(),
            max_depth: options.max_depth,
            depth: 0,
            header: None,
            state: UnarchiverState::Idle,
            failure: None,
            records: None,
        }
    }

    /// Keeps a log of every object-position record read from now on.
    pub(crate) fn record_log(mut self) -> Self {
        self.records = Some(Vec::new());
        self
    }

    pub(crate) fn take_records(&mut self) -> Vec<RecordInfo> {
        self.records.take().unwrap_or_default()
    }

    /// Decodes the next root.
    ///
    /// The header is validated on the first call. Returns the root's node, or
    /// `None` if the root was written as nil.
    ///
    /// # Errors
    /// Any failure is fatal: the session moves to [`UnarchiverState::Failed`]
    /// and rejects all further calls.
    pub fn decode_root(&mut self) -> Result<Option<NodeId>> {
        self.ensure_between_roots("decode_root")?;
        self.ensure_header()?;

        self.state = UnarchiverState::Decoding;
        let root = match self.decode_object() {
            Ok(root) => root,
            Err(e) => return Err(self.poison(e)),
        };

        self.state = UnarchiverState::Done;
        debug!(
            objects = self.identities.len(),
            offset = self.source.position(),
            "root decoded"
        );
        Ok(root)
    }

    /// Returns true if another root follows.
    ///
    /// Validates the header on the first call, so a header-only archive
    /// reports zero roots instead of failing in [`decode_root`].
    ///
    /// A multi-root stream carries no root count: an archive cut exactly at a
    /// root boundary reads as a valid archive with fewer roots.
    ///
    /// [`decode_root`]: Unarchiver::decode_root
    pub fn has_remaining_roots(&mut self) -> Result<bool> {
        self.ensure_between_roots("has_remaining_roots")?;
        self.ensure_header()?;
        Ok(!self.source.is_at_end())
    }

    /// Reads an object reference written by `encode_object` or
    /// `encode_conditional_object`.
    ///
    /// Returns `None` for a nil record. A back-reference resolves to the node
    /// already materialized (or reserved) for its archive-id.
    pub fn decode_object(&mut self) -> Result<Option<NodeId>> {
        self.ensure_decoding()?;
        let offset = self.source.position();
        match codec::read_tag(&mut self.source)? {
            Tag::Value(ValueKind::Nil) => {
                self.log(RecordInfo::nil(offset, self.depth));
                Ok(None)
            }
            Tag::Reference => {
                let archive_id = ArchiveId::new(read_varint32(&mut self.source)?);
                let node = self.identities.lookup(archive_id)?;
                trace!(archive_id = %archive_id, node = %node, "back-reference");
                self.log(RecordInfo::back_reference(offset, archive_id, self.depth));
                Ok(Some(node))
            }
            Tag::Value(ValueKind::Object) => self.decode_record(offset).map(Some),
            Tag::Value(kind) => Err(GraphCodeError::Format(format!(
                "expected an object record at offset {offset}, found {kind:?}"
            ))),
        }
    }

    /// Maps records archived as `alias` to the class `true_name`.
    pub fn register_decode_alias(&mut self, alias: impl Into<String>, true_name: impl Into<String>) {
        self.class_names.register_decode_alias(alias, true_name);
    }

    /// The true class name records archived as `name` decode as.
    pub fn class_name_decoded_for<'n>(&'n self, name: &'n str) -> &'n str {
        self.class_names.true_name_for_decoding(name)
    }

    /// Stream format version from the header, or 0 before it is read.
    pub fn system_version(&self) -> u16 {
        self.header.map_or(0, |h| h.version)
    }

    /// Version the archive stores for the class `true_name`, if a record of
    /// that class has been read.
    pub fn class_version(&self, true_name: &str) -> Option<u32> {
        self.class_versions.get(true_name).copied()
    }

    /// Returns true when every byte of the archive has been consumed.
    pub fn is_at_end(&self) -> bool {
        self.source.is_at_end()
    }

    /// Number of undecoded bytes left.
    pub fn remaining(&self) -> usize {
        self.source.remaining()
    }

    /// Current session state.
    pub fn state(&self) -> UnarchiverState {
        self.state
    }

    /// Number of distinct nodes materialized so far.
    pub fn object_count(&self) -> usize {
        self.identities.len()
    }

    /// The nodes materialized so far.
    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    /// Finishes the session and returns the decoded graph.
    ///
    /// # Errors
    /// Fails if the session is poisoned or a root is still being decoded.
    pub fn into_graph(self) -> Result<ObjectGraph> {
        self.ensure_usable()?;
        match self.state {
            UnarchiverState::Idle | UnarchiverState::Done => {}
            other => {
                return Err(GraphCodeError::Internal(format!(
                    "graph taken while {other:?}"
                )));
            }
        }
        if !self.graph.is_complete() {
            return Err(GraphCodeError::Internal(
                "decoded graph has unfilled node slots".into(),
            ));
        }
        if !self.source.is_at_end() {
            debug!(trailing = self.source.remaining(), "archive has undecoded bytes");
        }
        Ok(self.graph)
    }

    /// Reads any [`ArchiveValue`] (tagged).
    pub fn read_value<T: ArchiveValue>(&mut self) -> Result<T> {
        T::decode_value(self)
    }

    /// Reads a boolean.
    pub fn read_bool(&mut self, tagged: bool) -> Result<bool> {
        self.ensure_decoding()?;
        codec::read_bool(&mut self.source, tagged)
    }

    /// Reads a string.
    pub fn read_string(&mut self, tagged: bool) -> Result<String> {
        self.ensure_decoding()?;
        codec::read_string(&mut self.source, tagged)
    }

    /// Reads a raw byte block, borrowed from the archive.
    pub fn read_blob(&mut self, tagged: bool) -> Result<&'a [u8]> {
        self.ensure_decoding()?;
        codec::read_blob(&mut self.source, tagged)
    }

    fn ensure_between_roots(&self, call: &str) -> Result<()> {
        self.ensure_usable()?;
        match self.state {
            UnarchiverState::Idle | UnarchiverState::Done => Ok(()),
            other => Err(GraphCodeError::Internal(format!(
                "{call} called while {other:?}; use decode_object inside payloads"
            ))),
        }
    }

    fn ensure_header(&mut self) -> Result<()> {
        if self.header.is_some() {
            return Ok(());
        }
        let previous = self.state;
        self.state = UnarchiverState::ReadingHeader;
        if let Err(e) = self.read_header() {
            return Err(self.poison(e));
        }
        self.state = previous;
        Ok(())
    }

    fn read_header(&mut self) -> Result<()> {
        let available = self.source.remaining();
        if available < HEADER_SIZE {
            return Err(GraphCodeError::truncated(HEADER_SIZE, 0, available));
        }
        let header = ArchiveHeader::from_bytes(self.source.read(HEADER_SIZE)?)?;
        debug!(version = header.version, "archive header read");
        self.header = Some(header);
        Ok(())
    }

    fn decode_record(&mut self, offset: usize) -> Result<NodeId> {
        if self.depth >= self.max_depth {
            return Err(GraphCodeError::DepthLimit(self.max_depth));
        }

        let archived_name = codec::read_string(&mut self.source, false)?;
        let version = read_varint32(&mut self.source)?;
        let true_name = self.class_names.true_name_for_decoding(&archived_name).to_owned();

        let registry = self.registry;
        let Some(descriptor) = registry.get(&true_name).copied() else {
            warn!(class = %true_name, offset, "no decoder registered");
            return Err(GraphCodeError::UnknownType(true_name));
        };
        self.class_versions.insert(true_name.clone(), version);
        if version != descriptor.version {
            debug!(
                class = %true_name,
                archived = version,
                current = descriptor.version,
                "class version differs from registered version"
            );
        }

        let node = self.graph.reserve();
        let archive_id = ArchiveId::new(self.next_archive_id()?);
        self.identities.register_decoded(archive_id, node)?;
        trace!(
            archive_id = %archive_id,
            node = %node,
            class = %true_name,
            version,
            "value record"
        );
        self.log(RecordInfo::value(
            offset,
            archived_name,
            true_name,
            (version, descriptor.version),
            archive_id,
            self.depth,
        ));

        self.depth += 1;
        let result = (descriptor.decode)(self, version);
        self.depth -= 1;

        self.graph.fill(node, result?)?;
        Ok(node)
    }

    fn next_archive_id(&self) -> Result<u32> {
        u32::try_from(self.identities.len())
            .ok()
            .and_then(|n| n.checked_add(ArchiveId::FIRST.as_u32()))
            .ok_or_else(|| GraphCodeError::Format("archive-id space exhausted".into()))
    }

    fn log(&mut self, record: RecordInfo) {
        if let Some(records) = &mut self.records {
            records.push(record);
        }
    }

    fn ensure_usable(&self) -> Result<()> {
        match &self.failure {
            Some(e) => Err(GraphCodeError::Internal(format!(
                "session poisoned by earlier failure: {e}"
            ))),
            None => Ok(()),
        }
    }

    fn ensure_decoding(&self) -> Result<()> {
        self.ensure_usable()?;
        if self.state != UnarchiverState::Decoding {
            return Err(GraphCodeError::Internal(format!(
                "objects can only be decoded while reading a root (state: {:?})",
                self.state
            )));
        }
        Ok(())
    }

    fn poison(&mut self, err: GraphCodeError) -> GraphCodeError {
        self.state = UnarchiverState::Failed;
        self.failure = Some(err.clone());
        self.depth = 0;
        err
    }
}

macro_rules! unarchiver_scalar_readers {
    ($($name:ident: $t:ty),* $(,)?) => {
        impl Unarchiver<'_> {
            $(
                #[doc = concat!("Reads a `", stringify!($t), "`.")]
                pub fn $name(&mut self, tagged: bool) -> Result<$t> {
                    self.ensure_decoding()?;
                    codec::$name(&mut self.source, tagged)
                }
            )*
        }
    };
}

unarchiver_scalar_readers! {
    read_i8: i8,
    read_u8: u8,
    read_i16: i16,
    read_u16: u16,
    read_i32: i32,
    read_u32: u32,
    read_i64: i64,
    read_u64: u64,
    read_f32: f32,
    read_f64: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archiver::Archiver;
    use crate::visitor::{ArchiveType, Archivable, Tracer};
    use std::any::Any;

    #[derive(Debug)]
    struct Link {
        label: u8,
        next: Option<NodeId>,
    }

    impl Archivable for Link {
        fn class_name(&self) -> &'static str {
            Self::CLASS_NAME
        }
        fn visit(&self, tracer: &mut Tracer<'_>) {
            tracer.reference(self.next);
        }
        fn encode(&self, archiver: &mut Archiver<'_>) -> Result<()> {
            archiver.write_u8(self.label, true);
            archiver.encode_object(self.next)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    impl ArchiveType for Link {
        const CLASS_NAME: &'static str = "Link";

        fn decode(unarchiver: &mut Unarchiver<'_>, _version: u32) -> Result<Self> {
            Ok(Self {
                label: unarchiver.read_u8(true)?,
                next: unarchiver.decode_object()?,
            })
        }
    }

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register::<Link>();
        registry
    }

    fn ring() -> Result<(ObjectGraph, NodeId, Vec<u8>)> {
        let mut graph = ObjectGraph::new();
        let a = graph.add(Link { label: 1, next: None });
        let b = graph.add(Link { label: 2, next: Some(a) });
        if let Some(link) = graph.get_mut_as::<Link>(a) {
            link.next = Some(b);
        }
        let mut archiver = Archiver::new(&graph);
        archiver.encode_root(Some(a))?;
        let bytes = archiver.into_bytes()?;
        Ok((graph, a, bytes))
    }

    #[test]
    fn cycle_resolves_to_reserved_slot() -> Result<()> {
        let (_, _, bytes) = ring()?;
        let registry = registry();
        let mut unarchiver = Unarchiver::new(&registry, &bytes);
        let root = unarchiver.decode_root()?.ok_or_else(|| GraphCodeError::Internal("nil".into()))?;
        assert!(unarchiver.is_at_end());
        assert_eq!(unarchiver.system_version(), 1);
        assert_eq!(unarchiver.class_version("Link"), Some(0));

        let graph = unarchiver.into_graph()?;
        assert_eq!(graph.len(), 2);
        let first = graph.get_as::<Link>(root).map(|l| (l.label, l.next));
        let (label, next) = first.ok_or_else(|| GraphCodeError::Internal("missing".into()))?;
        assert_eq!(label, 1);
        let second = next.and_then(|n| graph.get_as::<Link>(n));
        assert_eq!(second.map(|l| (l.label, l.next)), Some((2, Some(root))));
        Ok(())
    }

    #[test]
    fn system_version_is_zero_before_header() {
        let registry = registry();
        let unarchiver = Unarchiver::new(&registry, &[]);
        assert_eq!(unarchiver.system_version(), 0);
        assert_eq!(unarchiver.state(), UnarchiverState::Idle);
    }

    #[test]
    fn unknown_class_poisons_the_session() -> Result<()> {
        let (_, _, bytes) = ring()?;
        let registry = TypeRegistry::new();
        let mut unarchiver = Unarchiver::new(&registry, &bytes);
        assert_eq!(
            unarchiver.decode_root(),
            Err(GraphCodeError::UnknownType("Link".into()))
        );
        assert_eq!(unarchiver.state(), UnarchiverState::Failed);
        assert!(matches!(
            unarchiver.decode_root(),
            Err(GraphCodeError::Internal(ref m)) if m.contains("poisoned")
        ));
        Ok(())
    }

    #[test]
    fn dangling_back_reference() {
        let mut bytes = ArchiveHeader::new().to_bytes().to_vec();
        bytes.extend_from_slice(&[0x8E, 0x07]);
        let registry = registry();
        let mut unarchiver = Unarchiver::new(&registry, &bytes);
        assert_eq!(
            unarchiver.decode_root(),
            Err(GraphCodeError::DanglingReference(ArchiveId::new(7)))
        );
    }

    #[test]
    fn scalar_in_object_position_is_a_format_error() {
        let mut bytes = ArchiveHeader::new().to_bytes().to_vec();
        bytes.extend_from_slice(&[0x02, 0x09]);
        let registry = registry();
        let mut unarchiver = Unarchiver::new(&registry, &bytes);
        assert!(matches!(unarchiver.decode_root(), Err(GraphCodeError::Format(_))));
    }

    #[test]
    fn decode_depth_is_bounded() -> Result<()> {
        let (_, _, bytes) = ring()?;
        let registry = registry();
        let options = ArchiveOptions::new().max_depth(1);
        let mut unarchiver = Unarchiver::with_options(&registry, &bytes, options);
        assert_eq!(unarchiver.decode_root(), Err(GraphCodeError::DepthLimit(1)));
        assert!(unarchiver.into_graph().is_err());
        Ok(())
    }

    #[test]
    fn decode_alias_maps_to_registered_class() -> Result<()> {
        let mut graph = ObjectGraph::new();
        let root = graph.add(Link { label: 9, next: None });
        let mut archiver = Archiver::with_options(&graph, ArchiveOptions::new().alias("Link", "OldLink"));
        archiver.encode_root(Some(root))?;
        let bytes = archiver.into_bytes()?;

        let registry = registry();
        let mut unarchiver = Unarchiver::new(&registry, &bytes);
        unarchiver.register_decode_alias("OldLink", "Link");
        assert_eq!(unarchiver.class_name_decoded_for("OldLink"), "Link");
        let decoded = unarchiver.decode_root()?;
        let graph = unarchiver.into_graph()?;
        assert_eq!(decoded.and_then(|n| graph.get_as::<Link>(n)).map(|l| l.label), Some(9));
        Ok(())
    }
}
