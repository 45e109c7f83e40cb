//! Session configuration.

use crate::class_names::ClassNameTable;
use crate::constants::DEFAULT_MAX_DEPTH;

/// Options shared by encode and decode sessions.
///
/// Built in the usual builder style and handed to
/// [`Archiver::with_options`](crate::archiver::Archiver::with_options) or
/// [`Unarchiver::with_options`](crate::unarchiver::Unarchiver::with_options),
/// or used directly through [`GraphCode::builder`](crate::GraphCode::builder).
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub(crate) max_depth: usize,
    pub(crate) class_names: ClassNameTable,
}

impl ArchiveOptions {
    /// Creates the default options.
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            class_names: ClassNameTable::new(),
        }
    }

    /// Bounds how deeply value records may nest.
    ///
    /// Encoding or decoding a record deeper than this fails with
    /// `GraphCodeError::DepthLimit`. Back-references and nil markers do not
    /// count towards the depth.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Seeds an encode alias: `true_name` is written as `alias`.
    pub fn alias(mut self, true_name: impl Into<String>, alias: impl Into<String>) -> Self {
        self.class_names.register_alias(true_name, alias);
        self
    }

    /// Seeds a decode alias: records named `alias` decode as `true_name`.
    pub fn decode_alias(mut self, alias: impl Into<String>, true_name: impl Into<String>) -> Self {
        self.class_names.register_decode_alias(alias, true_name);
        self
    }

    /// Seeds the version written for `true_name`.
    pub fn class_version(mut self, true_name: impl Into<String>, version: u32) -> Self {
        self.class_names.set_version(true_name, version);
        self
    }

    /// Replaces the whole class-name table.
    pub fn class_names(mut self, table: ClassNameTable) -> Self {
        self.class_names = table;
        self
    }

    /// The configured depth bound.
    pub fn depth_limit(&self) -> usize {
        self.max_depth
    }
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self::new()
    }
}
