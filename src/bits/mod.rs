//! Bit-level primitives shared by the column codecs.
//!
//! Three integer codes are provided on top of raw bit I/O:
//!
//! 1. Nibble varints: groups of three data bits prefixed by a continuation
//!    bit, most-significant group first. Cheap for the small dictionary
//!    values and counts that dominate the payload.
//! 2. Zigzag nibbles: signed values folded to naturals before nibble
//!    coding, so small magnitudes of either sign stay short.
//! 3. Minimal (truncated) binary: fixed-width codes for a value within a
//!    known range, used by the query-index fallback scheme.
//!
//! The reader is bit-addressable (`bit_position`/`seek`) so a decoder can
//! skip past a length-prefixed payload deterministically.

mod arithmetic;

pub(crate) use arithmetic::{ArithmeticDecoder, ArithmeticEncoder};

use crate::error::DecodeError;
use crate::Result;

/// Fold a signed value into an unsigned one, small magnitudes first.
#[inline]
pub(crate) fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag`].
#[inline]
pub(crate) fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Width in bits of the minimal binary code for a range of `range` values.
#[inline]
pub(crate) fn minimal_binary_width(range: u64) -> u32 {
    debug_assert!(range >= 1);
    63 - range.leading_zeros()
}

/// An append-only bit buffer.
#[derive(Clone, Default)]
pub(crate) struct BitWriter {
    buf: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bits written so far.
    #[inline]
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    #[inline]
    pub fn write_bit(&mut self, bit: bool) {
        if self.bit_len % 8 == 0 {
            self.buf.push(0);
        }
        if bit {
            self.buf[self.bit_len / 8] |= 1 << (7 - (self.bit_len % 8));
        }
        self.bit_len += 1;
    }

    /// Write the low `width` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u64, width: u32) {
        debug_assert!(width <= 64);
        for shift in (0..width).rev() {
            self.write_bit((value >> shift) & 1 == 1);
        }
    }

    /// Write a non-negative integer as a nibble varint.
    pub fn write_nibble(&mut self, value: u64) {
        let mut groups = 1;
        while 3 * groups < 64 && value >> (3 * groups) != 0 {
            groups += 1;
        }
        for group in (0..groups).rev() {
            self.write_bit(group > 0);
            self.write_bits((value >> (3 * group)) & 0x7, 3);
        }
    }

    /// Write a signed integer as a zigzag-folded nibble varint.
    pub fn write_signed_nibble(&mut self, value: i64) {
        self.write_nibble(zigzag(value));
    }

    /// Write `value` in minimal binary over a range of `range` values.
    ///
    /// `value` must be in `0..range`.
    pub fn write_minimal_binary(&mut self, value: u64, range: u64) {
        debug_assert!(value < range);
        let width = minimal_binary_width(range);
        let threshold = (1 << (width + 1)) - range;
        if value < threshold {
            self.write_bits(value, width);
        } else {
            self.write_bits(value + threshold, width + 1);
        }
    }

    /// Append every bit of `other` to this buffer.
    pub fn append(&mut self, other: &BitWriter) {
        for index in 0..other.bit_len {
            let byte = other.buf[index / 8];
            self.write_bit((byte >> (7 - (index % 8))) & 1 == 1);
        }
    }

    /// Consume the writer, returning the padded byte buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// A bit-addressable reader over an in-memory payload.
pub(crate) struct BitReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current read position in bits from the start of the payload.
    #[inline]
    pub fn bit_position(&self) -> usize {
        self.pos
    }

    /// Total payload length in bits.
    #[inline]
    pub fn bit_len(&self) -> usize {
        self.buf.len() * 8
    }

    /// Reposition the reader to an absolute bit offset.
    pub fn seek(&mut self, bit_position: usize) -> Result<()> {
        if bit_position > self.buf.len() * 8 {
            return Err(DecodeError::UnexpectedEndOfPayload { bit_position }.into());
        }
        self.pos = bit_position;
        Ok(())
    }

    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.pos >= self.buf.len() * 8 {
            return Err(DecodeError::UnexpectedEndOfPayload {
                bit_position: self.pos,
            }
            .into());
        }
        let bit = (self.buf[self.pos / 8] >> (7 - (self.pos % 8))) & 1 == 1;
        self.pos += 1;
        Ok(bit)
    }

    /// Read `width` bits, most significant first.
    pub fn read_bits(&mut self, width: u32) -> Result<u64> {
        debug_assert!(width <= 64);
        let mut value = 0;
        for _ in 0..width {
            value = (value << 1) | u64::from(self.read_bit()?);
        }
        Ok(value)
    }

    /// Read a nibble varint.
    pub fn read_nibble(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        loop {
            let more = self.read_bit()?;
            // another group would shift accumulated bits out of the u64
            if value >> 61 != 0 {
                return Err(DecodeError::OverlongVarint {
                    bit_position: self.pos,
                }
                .into());
            }
            value = (value << 3) | self.read_bits(3)?;
            if !more {
                return Ok(value);
            }
        }
    }

    /// Read a zigzag-folded nibble varint.
    pub fn read_signed_nibble(&mut self) -> Result<i64> {
        Ok(unzigzag(self.read_nibble()?))
    }

    /// Read a minimal binary code over a range of `range` values.
    pub fn read_minimal_binary(&mut self, range: u64) -> Result<u64> {
        let width = minimal_binary_width(range);
        let threshold = (1 << (width + 1)) - range;
        let prefix = self.read_bits(width)?;
        if prefix < threshold {
            Ok(prefix)
        } else {
            Ok(((prefix << 1) | u64::from(self.read_bit()?)) - threshold)
        }
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_zigzag_roundtrip() {
        for value in [-1_000_000, -3, -1, 0, 1, 2, 7, 1_000_000, i64::MIN / 2] {
            assert_eq!(unzigzag(zigzag(value)), value);
        }
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
    }

    #[test]
    fn test_bit_roundtrip() {
        let mut writer = BitWriter::new();
        let pattern = [true, false, true, true, false, false, true, false, true];
        for bit in pattern {
            writer.write_bit(bit);
        }
        assert_eq!(writer.bit_len(), pattern.len());

        let bytes = writer.into_bytes();
        let mut reader = BitReader::new(&bytes);
        for bit in pattern {
            assert_eq!(reader.read_bit().unwrap(), bit);
        }
    }

    #[test]
    fn test_nibble_roundtrip() {
        let values = [
            0u64,
            1,
            7,
            8,
            63,
            64,
            511,
            512,
            1 << 20,
            u64::from(u32::MAX),
            1 << 63,
            u64::MAX,
        ];
        let mut writer = BitWriter::new();
        for value in values {
            writer.write_nibble(value);
        }
        let bytes = writer.into_bytes();
        let mut reader = BitReader::new(&bytes);
        for value in values {
            assert_eq!(reader.read_nibble().unwrap(), value);
        }
    }

    #[test]
    fn test_signed_nibble_roundtrip() {
        let values = [0i64, -1, 1, -64, 64, -4096, 4096, i64::MIN, i64::MAX];
        let mut writer = BitWriter::new();
        for value in values {
            writer.write_signed_nibble(value);
        }
        let bytes = writer.into_bytes();
        let mut reader = BitReader::new(&bytes);
        for value in values {
            assert_eq!(reader.read_signed_nibble().unwrap(), value);
        }
    }

    #[test]
    fn test_minimal_binary_roundtrip() {
        for range in [1u64, 2, 3, 6, 7, 8, 1000] {
            let mut writer = BitWriter::new();
            for value in 0..range {
                writer.write_minimal_binary(value, range);
            }
            let bytes = writer.into_bytes();
            let mut reader = BitReader::new(&bytes);
            for value in 0..range {
                assert_eq!(reader.read_minimal_binary(range).unwrap(), value);
            }
        }
    }

    #[test]
    fn test_minimal_binary_unit_range_is_free() {
        let mut writer = BitWriter::new();
        writer.write_minimal_binary(0, 1);
        assert_eq!(writer.bit_len(), 0);
    }

    #[test]
    fn test_append_preserves_unaligned_bits() {
        let mut head = BitWriter::new();
        head.write_bits(0b101, 3);

        let mut tail = BitWriter::new();
        tail.write_nibble(42);
        tail.write_bit(true);
        let tail_len = tail.bit_len();

        head.append(&tail);
        assert_eq!(head.bit_len(), 3 + tail_len);

        let bytes = head.into_bytes();
        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_nibble().unwrap(), 42);
        assert!(reader.read_bit().unwrap());
    }

    #[test]
    fn test_seek_and_position() {
        let mut writer = BitWriter::new();
        writer.write_nibble(9);
        writer.write_bits(0b1101, 4);
        let bytes = writer.into_bytes();

        let mut reader = BitReader::new(&bytes);
        reader.read_nibble().unwrap();
        let mark = reader.bit_position();
        reader.read_bits(4).unwrap();
        reader.seek(mark).unwrap();
        assert_eq!(reader.read_bits(4).unwrap(), 0b1101);
    }

    #[test]
    fn test_overlong_nibble_is_rejected() {
        // continuation bits held high past a u64's worth of groups
        let bytes = [0xFF; 12];
        let mut reader = BitReader::new(&bytes);
        assert!(reader.read_nibble().is_err());
    }

    #[test]
    fn test_read_past_end_fails() {
        let bytes = [0xFF];
        let mut reader = BitReader::new(&bytes);
        reader.read_bits(8).unwrap();
        assert!(reader.read_bit().is_err());
        assert!(reader.seek(9).is_err());
    }
}
