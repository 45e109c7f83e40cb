//! Tools for inspecting the record structure of an archive.
//! Useful for debugging aliasing and conditional-reference behaviour.

use serde::Serialize;

use crate::error::Result;
use crate::graph::ArchiveId;
use crate::options::ArchiveOptions;
use crate::registry::TypeRegistry;
use crate::unarchiver::Unarchiver;

/// A structural report of an archive.
#[derive(Debug, Clone, Serialize)]
pub struct DebugReport {
    /// Total size of the archive in bytes.
    pub archive_size: usize,
    /// Stream format version from the header.
    pub stream_version: u16,
    /// Number of roots decoded.
    pub root_count: usize,
    /// Number of distinct objects materialized.
    pub object_count: usize,
    /// Every object-position record, in stream order.
    pub records: Vec<RecordInfo>,
}

/// What sits in an object position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A full value record.
    Value,
    /// A back-reference to an earlier value record.
    BackReference,
    /// A nil marker.
    Nil,
}

/// Metadata for a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordInfo {
    /// Offset of the record's tag byte.
    pub offset: usize,
    /// Record kind.
    pub kind: RecordKind,
    /// Class name as stored in the archive.
    pub archived_name: Option<String>,
    /// Class name after decode aliases were applied.
    pub class_name: Option<String>,
    /// Class version stored with the record.
    pub version: Option<u32>,
    /// Version of the class in the registry that decoded the record.
    pub current_version: Option<u32>,
    /// Archive-id defined (value) or referenced (back-reference).
    pub archive_id: Option<u32>,
    /// Nesting depth, 0 for roots.
    pub depth: usize,
}

impl RecordInfo {
    pub(crate) fn nil(offset: usize, depth: usize) -> Self {
        Self {
            offset,
            kind: RecordKind::Nil,
            archived_name: None,
            class_name: None,
            version: None,
            current_version: None,
            archive_id: None,
            depth,
        }
    }

    pub(crate) fn back_reference(offset: usize, id: ArchiveId, depth: usize) -> Self {
        Self {
            archive_id: Some(id.as_u32()),
            kind: RecordKind::BackReference,
            ..Self::nil(offset, depth)
        }
    }

    pub(crate) fn value(
        offset: usize,
        archived_name: String,
        class_name: String,
        (version, current_version): (u32, u32),
        id: ArchiveId,
        depth: usize,
    ) -> Self {
        Self {
            offset,
            kind: RecordKind::Value,
            archived_name: Some(archived_name),
            class_name: Some(class_name),
            version: Some(version),
            current_version: Some(current_version),
            archive_id: Some(id.as_u32()),
            depth,
        }
    }
}

/// The archive inspector.
#[derive(Debug)]
pub struct Inspector;

impl Inspector {
    /// Decodes every root in `bytes` and reports the records it read.
    pub fn inspect(registry: &TypeRegistry, bytes: &[u8]) -> Result<DebugReport> {
        Self::inspect_with_options(registry, bytes, ArchiveOptions::default())
    }

    /// Like [`inspect`](Inspector::inspect), with explicit decode options
    /// (typically decode aliases).
    pub fn inspect_with_options(
        registry: &TypeRegistry,
        bytes: &[u8],
        options: ArchiveOptions,
    ) -> Result<DebugReport> {
        let mut unarchiver = Unarchiver::with_options(registry, bytes, options).record_log();
        let mut root_count = 0;
        while unarchiver.has_remaining_roots()? {
            unarchiver.decode_root()?;
            root_count += 1;
        }

        Ok(DebugReport {
            archive_size: bytes.len(),
            stream_version: unarchiver.system_version(),
            root_count,
            object_count: unarchiver.object_count(),
            records: unarchiver.take_records(),
        })
    }
}

impl std::fmt::Display for DebugReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== GRAPHCODE INSPECTOR REPORT ===")?;
        writeln!(f, "Archive Size:   {}b", self.archive_size)?;
        writeln!(f, "Stream Version: {}", self.stream_version)?;
        writeln!(f, "Roots:          {}", self.root_count)?;
        writeln!(f, "Objects:        {}", self.object_count)?;
        writeln!(f, "\n[RECORDS]")?;
        for record in &self.records {
            record.fmt_line(f)?;
        }
        Ok(())
    }
}

impl RecordInfo {
    fn fmt_line(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let indent = "    ".repeat(self.depth);
        write!(f, "{indent}@{:<6} ", self.offset)?;
        match self.kind {
            RecordKind::Nil => writeln!(f, "nil"),
            RecordKind::BackReference => {
                writeln!(f, "-> #{}", self.archive_id.unwrap_or_default())
            }
            RecordKind::Value => {
                let archived = self.archived_name.as_deref().unwrap_or_default();
                let class = self.class_name.as_deref().unwrap_or_default();
                let alias = if archived == class {
                    String::new()
                } else {
                    format!(" (archived as {archived})")
                };
                let version = self.version.unwrap_or_default();
                let current = match self.current_version {
                    Some(current) if current != version => format!(" (current v{current})"),
                    _ => String::new(),
                };
                writeln!(
                    f,
                    "#{} {} v{}{}{}",
                    self.archive_id.unwrap_or_default(),
                    class,
                    version,
                    current,
                    alias
                )
            }
        }
    }
}
