//! Variable-length integer encoding utilities.
//!
//! LEB128-style unsigned varints (7 bits per byte with a continuation bit),
//! zig-zag folding for signed deltas, and a small cursor used by every
//! persisted record decoder in the crate.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, TesseraError};

/// Maximum number of bytes a `u64` varint can occupy.
pub const MAX_VARINT_LEN: usize = 10;

/// Append a variable-length encoded `u64` to `out`, returning the byte count.
pub fn encode_u64(value: u64, out: &mut Vec<u8>) -> usize {
    let mut val = value;
    let mut written = 0;

    loop {
        let mut byte = (val & 0x7F) as u8;
        val >>= 7;

        if val != 0 {
            byte |= 0x80; // Set continuation bit
        }

        out.push(byte);
        written += 1;

        if val == 0 {
            return written;
        }
    }
}

/// Decode a `u64` value from variable-length encoding.
pub fn decode_u64(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut result = 0u64;
    let mut shift = 0;
    let mut bytes_read = 0;

    for &byte in bytes {
        bytes_read += 1;

        if shift >= 64 {
            return Err(TesseraError::format("VarInt overflow"));
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok((result, bytes_read));
        }

        shift += 7;
    }

    Err(TesseraError::format("Incomplete VarInt"))
}

/// Fold a signed value so that small magnitudes encode to few bytes.
#[inline]
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[inline]
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Append a zig-zag encoded signed varint.
pub fn encode_i64(value: i64, out: &mut Vec<u8>) -> usize {
    encode_u64(zigzag_encode(value), out)
}

/// Append a length-prefixed byte slice.
pub fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    encode_u64(bytes.len() as u64, out);
    out.extend_from_slice(bytes);
}

/// Forward-only reader over a varint framed buffer.
#[derive(Debug, Clone)]
pub struct VarIntCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> VarIntCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        VarIntCursor { buf, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let (value, len) = decode_u64(&self.buf[self.pos..])?;
        self.pos += len;
        Ok(value)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_u64().map(zigzag_decode)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| TesseraError::format("unexpected end of buffer"))?;
        self.pos += 1;
        Ok(byte)
    }

    /// Read a fixed-width little-endian `u64`.
    pub fn read_fixed_u64(&mut self) -> Result<u64> {
        let raw = self.take(8)?;
        Ok(LittleEndian::read_u64(raw))
    }

    /// Read a length-prefixed byte slice.
    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u64()? as usize;
        self.take(len)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| {
                TesseraError::format(format!(
                    "record truncated: need {len} bytes at offset {}, have {}",
                    self.pos,
                    self.buf.len().saturating_sub(self.pos)
                ))
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

/// Append a fixed-width little-endian `u64`.
pub fn encode_fixed_u64(value: u64, out: &mut Vec<u8>) {
    let mut raw = [0u8; 8];
    LittleEndian::write_u64(&mut raw, value);
    out.extend_from_slice(&raw);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_u64() {
        let test_values = [0, 1, 127, 128, 255, 256, 16383, 16384, u64::MAX];

        for &value in &test_values {
            let mut encoded = Vec::new();
            let written = encode_u64(value, &mut encoded);
            let (decoded, bytes_read) = decode_u64(&encoded).unwrap();

            assert_eq!(value, decoded);
            assert_eq!(written, bytes_read);
        }
    }

    #[test]
    fn test_encoding_efficiency() {
        let len = |v: u64| encode_u64(v, &mut Vec::new());
        assert_eq!(len(0), 1);
        assert_eq!(len(127), 1);
        assert_eq!(len(128), 2);
        assert_eq!(len(16384), 3);
        assert_eq!(len(u64::MAX), MAX_VARINT_LEN);
    }

    #[test]
    fn test_zigzag_small_magnitudes() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_decode(zigzag_encode(i64::MIN)), i64::MIN);
        assert_eq!(zigzag_decode(zigzag_encode(i64::MAX)), i64::MAX);
    }

    #[test]
    fn test_incomplete_varint() {
        assert!(decode_u64(&[0x80]).is_err());
    }

    #[test]
    fn test_cursor_reads_mixed_record() {
        let mut buf = Vec::new();
        encode_u64(300, &mut buf);
        encode_i64(-7, &mut buf);
        encode_bytes(b"term", &mut buf);
        encode_fixed_u64(42, &mut buf);

        let mut cursor = VarIntCursor::new(&buf);
        assert_eq!(cursor.read_u64().unwrap(), 300);
        assert_eq!(cursor.read_i64().unwrap(), -7);
        assert_eq!(cursor.read_bytes().unwrap(), b"term");
        assert_eq!(cursor.read_fixed_u64().unwrap(), 42);
        assert!(cursor.is_empty());
        assert!(cursor.read_u8().is_err());
    }

    #[test]
    fn test_cursor_reports_truncation() {
        let mut buf = Vec::new();
        encode_u64(10, &mut buf);
        buf.extend_from_slice(b"abc");

        let err = VarIntCursor::new(&buf).read_bytes().unwrap_err();
        assert!(err.to_string().contains("record truncated"));
    }
}
