//! Typed field values.
//!
//! [`ArchiveValue`] ties a Rust field type to its tagged wire representation
//! and, for object references, to the trace pass. The derive macro encodes
//! every field through this trait.
//!
//! Collections have no tag of their own: a `Vec<T>` is a tagged `u32` count
//! followed by its elements, and a `BTreeMap<String, T>` is a count followed by
//! key/value pairs.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::archiver::Archiver;
use crate::error::{GraphCodeError, Result};
use crate::graph::NodeId;
use crate::unarchiver::Unarchiver;
use crate::visitor::Tracer;

/// A value that can be stored in a node's payload.
pub trait ArchiveValue: Sized {
    /// Writes the value, tagged.
    fn encode_value(&self, archiver: &mut Archiver<'_>) -> Result<()>;

    /// Reads a value written by [`encode_value`](ArchiveValue::encode_value).
    fn decode_value(unarchiver: &mut Unarchiver<'_>) -> Result<Self>;

    /// Reports the strong references held by this value.
    fn trace_value(&self, _tracer: &mut Tracer<'_>) {}
}

macro_rules! impl_scalar_value {
    ($($t:ty => $write:ident, $read:ident);* $(;)?) => {
        $(
            impl ArchiveValue for $t {
                fn encode_value(&self, archiver: &mut Archiver<'_>) -> Result<()> {
                    archiver.$write(*self, true);
                    Ok(())
                }

                fn decode_value(unarchiver: &mut Unarchiver<'_>) -> Result<Self> {
                    unarchiver.$read(true)
                }
            }
        )*
    };
}

impl_scalar_value! {
    i8 => write_i8, read_i8;
    u8 => write_u8, read_u8;
    i16 => write_i16, read_i16;
    u16 => write_u16, read_u16;
    i32 => write_i32, read_i32;
    u32 => write_u32, read_u32;
    i64 => write_i64, read_i64;
    u64 => write_u64, read_u64;
    f32 => write_f32, read_f32;
    f64 => write_f64, read_f64;
    bool => write_bool, read_bool;
}

impl ArchiveValue for String {
    fn encode_value(&self, archiver: &mut Archiver<'_>) -> Result<()> {
        archiver.write_string(self, true);
        Ok(())
    }

    fn decode_value(unarchiver: &mut Unarchiver<'_>) -> Result<Self> {
        unarchiver.read_string(true)
    }
}

/// A raw byte block, stored with the blob tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Blob(pub Vec<u8>);

impl ArchiveValue for Blob {
    fn encode_value(&self, archiver: &mut Archiver<'_>) -> Result<()> {
        archiver.write_blob(&self.0, true);
        Ok(())
    }

    fn decode_value(unarchiver: &mut Unarchiver<'_>) -> Result<Self> {
        Ok(Self(unarchiver.read_blob(true)?.to_vec()))
    }
}

/// A required strong reference. Decoding nil into it is a format error.
impl ArchiveValue for NodeId {
    fn encode_value(&self, archiver: &mut Archiver<'_>) -> Result<()> {
        archiver.encode_object(Some(*self))
    }

    fn decode_value(unarchiver: &mut Unarchiver<'_>) -> Result<Self> {
        unarchiver.decode_object()?.ok_or_else(|| {
            GraphCodeError::Format("nil record where an object reference is required".into())
        })
    }

    fn trace_value(&self, tracer: &mut Tracer<'_>) {
        tracer.reference(Some(*self));
    }
}

/// A nullable strong reference.
impl ArchiveValue for Option<NodeId> {
    fn encode_value(&self, archiver: &mut Archiver<'_>) -> Result<()> {
        archiver.encode_object(*self)
    }

    fn decode_value(unarchiver: &mut Unarchiver<'_>) -> Result<Self> {
        unarchiver.decode_object()
    }

    fn trace_value(&self, tracer: &mut Tracer<'_>) {
        tracer.reference(*self);
    }
}

fn encode_count(archiver: &mut Archiver<'_>, len: usize) -> Result<()> {
    let count = u32::try_from(len).map_err(|_| {
        GraphCodeError::Payload(format!("collection of {len} items exceeds u32 count"))
    })?;
    archiver.write_u32(count, true);
    Ok(())
}

fn decode_count(unarchiver: &mut Unarchiver<'_>) -> Result<(usize, usize)> {
    let count = unarchiver.read_u32(true)? as usize;
    // Every element takes at least one byte, so a corrupt count cannot force
    // a huge allocation.
    let capacity = count.min(unarchiver.remaining());
    Ok((count, capacity))
}

impl<T: ArchiveValue> ArchiveValue for Vec<T> {
    fn encode_value(&self, archiver: &mut Archiver<'_>) -> Result<()> {
        encode_count(archiver, self.len())?;
        for item in self {
            item.encode_value(archiver)?;
        }
        Ok(())
    }

    fn decode_value(unarchiver: &mut Unarchiver<'_>) -> Result<Self> {
        let (count, capacity) = decode_count(unarchiver)?;
        let mut items = Vec::with_capacity(capacity);
        for _ in 0..count {
            items.push(T::decode_value(unarchiver)?);
        }
        Ok(items)
    }

    fn trace_value(&self, tracer: &mut Tracer<'_>) {
        for item in self {
            item.trace_value(tracer);
        }
    }
}

impl<T: ArchiveValue> ArchiveValue for BTreeMap<String, T> {
    fn encode_value(&self, archiver: &mut Archiver<'_>) -> Result<()> {
        encode_count(archiver, self.len())?;
        for (key, value) in self {
            archiver.write_string(key, true);
            value.encode_value(archiver)?;
        }
        Ok(())
    }

    fn decode_value(unarchiver: &mut Unarchiver<'_>) -> Result<Self> {
        let (count, _) = decode_count(unarchiver)?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let key = unarchiver.read_string(true)?;
            let value = T::decode_value(unarchiver)?;
            if map.insert(key, value).is_some() {
                return Err(GraphCodeError::Format("duplicate dictionary key".into()));
            }
        }
        Ok(map)
    }

    fn trace_value(&self, tracer: &mut Tracer<'_>) {
        for value in self.values() {
            value.trace_value(tracer);
        }
    }
}

/// Any `serde` value, stored as a bincode-encoded blob.
///
/// Useful for plain data that has no identity of its own and is not worth a
/// hand-written payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Opaque<T>(pub T);

impl<T: Serialize + DeserializeOwned> ArchiveValue for Opaque<T> {
    fn encode_value(&self, archiver: &mut Archiver<'_>) -> Result<()> {
        let bytes = bincode::serde::encode_to_vec(&self.0, bincode::config::standard())
            .map_err(|e| GraphCodeError::Payload(e.to_string()))?;
        archiver.write_blob(&bytes, true);
        Ok(())
    }

    fn decode_value(unarchiver: &mut Unarchiver<'_>) -> Result<Self> {
        let bytes = unarchiver.read_blob(true)?;
        let (value, read) =
            bincode::serde::decode_from_slice::<T, _>(bytes, bincode::config::standard())
                .map_err(|e| GraphCodeError::Format(format!("opaque value: {e}")))?;
        if read != bytes.len() {
            return Err(GraphCodeError::Format(format!(
                "opaque value: {} trailing bytes",
                bytes.len() - read
            )));
        }
        Ok(Self(value))
    }
}
