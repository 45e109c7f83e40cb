//! The tag codec: one-byte tags, fixed-width scalars, strings and blobs.
//!
//! Every scalar writer takes a `tagged` flag. With `tagged = true` the value is
//! preceded by its kind tag, and the matching reader checks that tag. With
//! `tagged = false` only the raw value is written; the reader must then be
//! called with `tagged = false` as well. The codec cannot detect a mismatch
//! between the two sides, it simply desynchronizes.

use crate::error::{GraphCodeError, Result};
use crate::format::{Tag, ValueKind};
use crate::io::{ByteSink, ByteSource};
use crate::varint::{read_varint, write_varint};

/// Writes a tag byte.
pub fn write_tag(sink: &mut ByteSink, tag: Tag) {
    sink.push(tag.as_u8());
}

/// Reads and decodes a tag byte.
pub fn read_tag(source: &mut ByteSource<'_>) -> Result<Tag> {
    let offset = source.position();
    let byte = source.read_byte()?;
    Tag::from_byte(byte).map_err(|e| match e {
        GraphCodeError::Format(msg) => GraphCodeError::Format(format!("{msg} at offset {offset}")),
        other => other,
    })
}

/// Reads a tag and checks that it announces a value of `expected` kind.
pub fn expect_kind(source: &mut ByteSource<'_>, expected: ValueKind) -> Result<()> {
    let offset = source.position();
    match read_tag(source)? {
        Tag::Value(kind) if kind == expected => Ok(()),
        found => Err(GraphCodeError::Format(format!(
            "expected {expected:?} tag at offset {offset}, found {found:?}"
        ))),
    }
}

macro_rules! scalar_codec {
    ($($write:ident, $read:ident, $t:ty, $kind:ident);* $(;)?) => {
        $(
            #[doc = concat!("Writes a `", stringify!($t), "` in network byte order.")]
            pub fn $write(sink: &mut ByteSink, value: $t, tagged: bool) {
                if tagged {
                    write_tag(sink, Tag::Value(ValueKind::$kind));
                }
                sink.append(&value.to_be_bytes());
            }

            #[doc = concat!("Reads a `", stringify!($t), "` written by [`", stringify!($write), "`].")]
            pub fn $read(source: &mut ByteSource<'_>, tagged: bool) -> Result<$t> {
                if tagged {
                    expect_kind(source, ValueKind::$kind)?;
                }
                Ok(<$t>::from_be_bytes(source.read_array()?))
            }
        )*
    };
}

scalar_codec! {
    write_i8, read_i8, i8, I8;
    write_u8, read_u8, u8, U8;
    write_i16, read_i16, i16, I16;
    write_u16, read_u16, u16, U16;
    write_i32, read_i32, i32, I32;
    write_u32, read_u32, u32, U32;
    write_i64, read_i64, i64, I64;
    write_u64, read_u64, u64, U64;
    write_f32, read_f32, f32, F32;
    write_f64, read_f64, f64, F64;
}

/// Writes a boolean as a single 0/1 byte.
pub fn write_bool(sink: &mut ByteSink, value: bool, tagged: bool) {
    if tagged {
        write_tag(sink, Tag::Value(ValueKind::Bool));
    }
    sink.push(u8::from(value));
}

/// Reads a boolean; any byte other than 0 or 1 is a format error.
pub fn read_bool(source: &mut ByteSource<'_>, tagged: bool) -> Result<bool> {
    if tagged {
        expect_kind(source, ValueKind::Bool)?;
    }
    let offset = source.position();
    match source.read_byte()? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(GraphCodeError::Format(format!(
            "invalid bool byte {other} at offset {offset}"
        ))),
    }
}

/// Writes a length-prefixed UTF-8 string.
pub fn write_string(sink: &mut ByteSink, value: &str, tagged: bool) {
    if tagged {
        write_tag(sink, Tag::Value(ValueKind::String));
    }
    write_len_prefixed(sink, value.as_bytes());
}

/// Reads a string written by [`write_string`].
pub fn read_string(source: &mut ByteSource<'_>, tagged: bool) -> Result<String> {
    if tagged {
        expect_kind(source, ValueKind::String)?;
    }
    let offset = source.position();
    let bytes = read_len_prefixed(source)?;
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| GraphCodeError::Format(format!("invalid UTF-8 string at offset {offset}: {e}")))
}

/// Writes a length-prefixed raw byte block.
pub fn write_blob(sink: &mut ByteSink, value: &[u8], tagged: bool) {
    if tagged {
        write_tag(sink, Tag::Value(ValueKind::Blob));
    }
    write_len_prefixed(sink, value);
}

/// Reads a blob written by [`write_blob`], borrowing from the source.
pub fn read_blob<'a>(source: &mut ByteSource<'a>, tagged: bool) -> Result<&'a [u8]> {
    if tagged {
        expect_kind(source, ValueKind::Blob)?;
    }
    read_len_prefixed(source)
}

fn write_len_prefixed(sink: &mut ByteSink, bytes: &[u8]) {
    write_varint(sink, bytes.len() as u64);
    sink.append(bytes);
}

fn read_len_prefixed<'a>(source: &mut ByteSource<'a>) -> Result<&'a [u8]> {
    let len = read_varint(source)?;
    let len = usize::try_from(len)
        .map_err(|_| GraphCodeError::Format(format!("length {len} exceeds address space")))?;
    source.read(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn tagged_scalars_are_big_endian() {
        let mut sink = ByteSink::new();
        write_i32(&mut sink, 42, true);
        write_u16(&mut sink, 0x0102, false);
        write_bool(&mut sink, true, true);
        assert_eq!(
            sink.as_slice(),
            &[0x05, 0x00, 0x00, 0x00, 0x2A, 0x01, 0x02, 0x0B, 0x01]
        );
    }

    #[test]
    fn string_layout() {
        let mut sink = ByteSink::new();
        write_string(&mut sink, "hi", true);
        assert_eq!(sink.as_slice(), &[0x0C, 0x02, b'h', b'i']);

        let mut source = ByteSource::new(sink.as_slice());
        assert_eq!(read_string(&mut source, true).ok().as_deref(), Some("hi"));
    }

    #[test]
    fn kind_mismatch_is_a_format_error() {
        let mut sink = ByteSink::new();
        write_u32(&mut sink, 7, true);
        let mut source = ByteSource::new(sink.as_slice());
        let err = read_i32(&mut source, true);
        assert!(matches!(err, Err(GraphCodeError::Format(ref m)) if m.contains("expected I32")));
    }

    #[test]
    fn bad_bool_and_utf8_are_rejected() {
        let mut source = ByteSource::new(&[0x0B, 0x02]);
        assert!(read_bool(&mut source, true).is_err());

        let mut source = ByteSource::new(&[0x0C, 0x02, 0xFF, 0xFE]);
        assert!(read_string(&mut source, true).is_err());
    }

    #[test]
    fn blob_length_longer_than_input_is_truncation() {
        let mut source = ByteSource::new(&[0x0D, 0x05, 1, 2]);
        assert!(matches!(read_blob(&mut source, true), Err(GraphCodeError::Format(_))));
    }

    proptest! {
        #[test]
        fn untagged_i64_round_trips(value in any::<i64>()) {
            let mut sink = ByteSink::new();
            write_i64(&mut sink, value, false);
            prop_assert_eq!(sink.as_slice().len(), 8);
            let mut source = ByteSource::new(sink.as_slice());
            prop_assert_eq!(read_i64(&mut source, false).ok(), Some(value));
        }

        #[test]
        fn strings_round_trip(value in ".*") {
            let mut sink = ByteSink::new();
            write_string(&mut sink, &value, true);
            let mut source = ByteSource::new(sink.as_slice());
            prop_assert_eq!(read_string(&mut source, true).ok(), Some(value));
            prop_assert!(source.is_at_end());
        }

        #[test]
        fn truncated_strings_never_decode(value in ".{1,40}", cut in 0usize..40) {
            let mut sink = ByteSink::new();
            write_string(&mut sink, &value, true);
            let bytes = sink.as_slice();
            let cut = cut % bytes.len();
            let mut source = ByteSource::new(&bytes[..cut]);
            prop_assert!(read_string(&mut source, true).is_err());
        }
    }
}
