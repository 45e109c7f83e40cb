//! Variable-length integer encoding (LEB128).
//!
//! Archive ids, string/blob lengths and class versions are stored as unsigned
//! LEB128: seven data bits per byte, least significant group first, with the
//! most significant bit set on every byte except the last.

use crate::error::{GraphCodeError, Result};
use crate::io::{ByteSink, ByteSource};

/// Maximum bytes for a 64-bit varint (ceil(64/7) = 10)
pub const MAX_VARINT_BYTES: usize = 10;

/// Encode a u64 as varint into a byte buffer.
/// Returns the number of bytes written.
pub fn encode_varint(mut value: u64, buf: &mut [u8; MAX_VARINT_BYTES]) -> usize {
    let mut i = 0;
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf[i] = byte;
            return i + 1;
        }
        buf[i] = byte | 0x80;
        i += 1;
    }
}

/// Encode a u64 as varint and append it to a sink.
pub fn write_varint(sink: &mut ByteSink, value: u64) {
    let mut buf = [0u8; MAX_VARINT_BYTES];
    let len = encode_varint(value, &mut buf);
    sink.append(&buf[..len]);
}

/// Decode a varint from a source.
///
/// # Errors
/// `GraphCodeError::Format` when the input ends inside the varint or the
/// value does not fit in 64 bits.
pub fn read_varint(source: &mut ByteSource<'_>) -> Result<u64> {
    let start = source.position();
    let mut result: u64 = 0;
    let mut shift = 0;

    loop {
        if shift >= 64 {
            return Err(GraphCodeError::Format(format!(
                "varint at offset {start} is longer than {MAX_VARINT_BYTES} bytes"
            )));
        }

        let byte = source.read_byte()?;
        let value = u64::from(byte & 0x7F);

        // Check for overflow before shifting
        if shift == 63 && value > 1 {
            return Err(GraphCodeError::Format(format!(
                "varint at offset {start} overflows u64"
            )));
        }

        result |= value << shift;

        if byte & 0x80 == 0 {
            return Ok(result);
        }

        shift += 7;
    }
}

/// Decode a varint that must fit in a u32.
pub fn read_varint32(source: &mut ByteSource<'_>) -> Result<u32> {
    let value = read_varint(source)?;
    u32::try_from(value)
        .map_err(|_| GraphCodeError::Format(format!("varint {value} exceeds u32 range")))
}
