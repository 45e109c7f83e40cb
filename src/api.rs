//! One-call entry points over [`Archiver`] and [`Unarchiver`].

use crate::archiver::Archiver;
use crate::error::{GraphCodeError, Result};
use crate::graph::{NodeId, ObjectGraph};
use crate::options::ArchiveOptions;
use crate::registry::TypeRegistry;
use crate::unarchiver::Unarchiver;
use crate::visitor::Archivable;

/// The main entry point for archiving object graphs.
#[derive(Debug)]
pub struct GraphCode;

impl GraphCode {
    /// Starts a configured session.
    ///
    /// ```rust,ignore
    /// let bytes = GraphCode::builder()
    ///     .alias("Document", "Doc")
    ///     .max_depth(64)
    ///     .encode(&graph, Some(root))?;
    /// ```
    pub fn builder() -> ArchiveOptions {
        ArchiveOptions::new()
    }

    /// Encodes `root` and everything strongly reachable from it.
    pub fn encode(graph: &ObjectGraph, root: Option<NodeId>) -> Result<Vec<u8>> {
        ArchiveOptions::default().encode(graph, root)
    }

    /// Encodes several roots into one archive, sharing identity between them.
    pub fn encode_roots(graph: &ObjectGraph, roots: &[Option<NodeId>]) -> Result<Vec<u8>> {
        ArchiveOptions::default().encode_roots(graph, roots)
    }

    /// Decodes an archive holding a single root.
    pub fn decode(registry: &TypeRegistry, bytes: &[u8]) -> Result<Unarchived> {
        ArchiveOptions::default().decode(registry, bytes)
    }

    /// Decodes every root of an archive.
    pub fn decode_roots(registry: &TypeRegistry, bytes: &[u8]) -> Result<UnarchivedRoots> {
        ArchiveOptions::default().decode_roots(registry, bytes)
    }
}

impl ArchiveOptions {
    /// Encodes `root` with these options.
    pub fn encode(&self, graph: &ObjectGraph, root: Option<NodeId>) -> Result<Vec<u8>> {
        self.encode_roots(graph, &[root])
    }

    /// Encodes several roots with these options.
    pub fn encode_roots(&self, graph: &ObjectGraph, roots: &[Option<NodeId>]) -> Result<Vec<u8>> {
        let mut archiver = Archiver::with_options(graph, self.clone());
        for root in roots {
            archiver.encode_root(*root)?;
        }
        archiver.into_bytes()
    }

    /// Decodes a single-root archive with these options.
    ///
    /// # Errors
    /// Besides decode failures, bytes left after the root are a format error.
    pub fn decode(&self, registry: &TypeRegistry, bytes: &[u8]) -> Result<Unarchived> {
        let mut unarchiver = Unarchiver::with_options(registry, bytes, self.clone());
        let root = unarchiver.decode_root()?;
        if !unarchiver.is_at_end() {
            return Err(GraphCodeError::Format(format!(
                "{} trailing bytes after root",
                unarchiver.remaining()
            )));
        }
        Ok(Unarchived {
            graph: unarchiver.into_graph()?,
            root,
        })
    }

    /// Decodes every root with these options.
    ///
    /// A header-only archive yields no roots. The stream does not record how
    /// many roots it holds, so an archive cut exactly between two roots
    /// decodes as the roots before the cut.
    pub fn decode_roots(&self, registry: &TypeRegistry, bytes: &[u8]) -> Result<UnarchivedRoots> {
        let mut unarchiver = Unarchiver::with_options(registry, bytes, self.clone());
        let mut roots = Vec::new();
        while unarchiver.has_remaining_roots()? {
            roots.push(unarchiver.decode_root()?);
        }
        Ok(UnarchivedRoots {
            graph: unarchiver.into_graph()?,
            roots,
        })
    }
}

/// The result of decoding a single-root archive.
#[derive(Debug)]
pub struct Unarchived {
    /// All decoded nodes.
    pub graph: ObjectGraph,
    /// The root node, `None` if it was archived as nil.
    pub root: Option<NodeId>,
}

impl Unarchived {
    /// The root, downcast to `T`.
    pub fn root_as<T: Archivable>(&self) -> Option<&T> {
        self.root.and_then(|id| self.graph.get_as::<T>(id))
    }
}

/// The result of decoding a multi-root archive.
#[derive(Debug)]
pub struct UnarchivedRoots {
    /// All decoded nodes.
    pub graph: ObjectGraph,
    /// The roots in archive order.
    pub roots: Vec<Option<NodeId>>,
}
