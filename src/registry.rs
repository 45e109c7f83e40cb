//! The type registry consulted while decoding.
//!
//! Maps a true class name to a [`TypeDescriptor`], the `{name, version,
//! decode}` triple the unarchiver needs to materialize a node. The registry
//! is an explicit value passed to each decode session; there is no
//! process-wide table.

use std::collections::HashMap;
use std::fmt;

use crate::error::Result;
use crate::unarchiver::Unarchiver;
use crate::visitor::{ArchiveType, Archivable};

/// Signature of a type's decode routine.
pub type DecodeFn = fn(&mut Unarchiver<'_>, u32) -> Result<Box<dyn Archivable>>;

/// Everything the decoder knows about one class.
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    /// True class name.
    pub name: &'static str,
    /// Current version of the class.
    ///
    /// Accepting or rejecting other versions is left to `decode`; the
    /// unarchiver only logs and reports a mismatch.
    pub version: u32,
    /// Builds a node from its archived payload.
    pub decode: DecodeFn,
}

impl TypeDescriptor {
    /// Builds the descriptor of an [`ArchiveType`].
    pub fn of<T: ArchiveType>() -> Self {
        Self {
            name: T::CLASS_NAME,
            version: T::VERSION,
            decode: decode_boxed::<T>,
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

fn decode_boxed<T: ArchiveType>(
    unarchiver: &mut Unarchiver<'_>,
    version: u32,
) -> Result<Box<dyn Archivable>> {
    let node = T::decode(unarchiver, version)?;
    Ok(Box::new(node))
}

/// Centralized registry of decodable classes.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    descriptors: HashMap<String, TypeDescriptor>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an [`ArchiveType`] under its class name.
    ///
    /// If a descriptor with the same name is already registered, it is
    /// overwritten.
    pub fn register<T: ArchiveType>(&mut self) -> &mut Self {
        self.register_descriptor(TypeDescriptor::of::<T>())
    }

    /// Registers a hand-built descriptor.
    pub fn register_descriptor(&mut self, descriptor: TypeDescriptor) -> &mut Self {
        self.descriptors
            .insert(descriptor.name.to_owned(), descriptor);
        self
    }

    /// Retrieves a descriptor by true class name.
    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.descriptors.get(name)
    }

    /// Returns true if `name` has a descriptor.
    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
