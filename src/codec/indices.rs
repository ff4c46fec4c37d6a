//! Query-index column codec.
//!
//! Query indices are the one column that is frequently a permutation-like
//! sequence rather than a low-cardinality set, so two mutually exclusive
//! schemes are tried. Sorted inputs produce a handful of distinct deltas
//! and go through the dictionary coder; irregular sequences would bloat
//! the delta dictionary, so they fall back to fixed-width minimal binary
//! over their value range. A single selector bit prefixes the payload.

use std::collections::BTreeSet;

use log::trace;

use crate::bits::{unzigzag, zigzag, BitReader, BitWriter};
use crate::codec::scalar::{decode_column, encode_column, MAX_COLUMN_ENTRIES};
use crate::error::{DecodeError, EncodeError};
use crate::stats::ChunkStats;
use crate::Result;

const COLUMN: &str = "query-ids";

/// Selector bit values.
const DELTA_SCHEME: bool = false;
const MINIMAL_BINARY_SCHEME: bool = true;

/// Abandon the delta scheme when distinct deltas exceed this fraction of
/// the sequence length.
const MAX_DISTINCT_DELTA_FRACTION: f64 = 0.2;

pub(crate) fn encode_query_ids(
    values: &[i64],
    out: &mut BitWriter,
    stats: &mut ChunkStats,
) -> Result<()> {
    if try_encode_deltas(values, out, stats)? {
        return Ok(());
    }

    let start = out.bit_len();
    out.write_bit(MINIMAL_BINARY_SCHEME);
    out.write_nibble(values.len() as u64);
    if values.is_empty() {
        stats.record(COLUMN, 0, out.bit_len() - start);
        return Ok(());
    }

    let mut min = i64::MAX;
    let mut max = i64::MIN;
    for value in values {
        min = min.min(*value);
        max = max.max(*value);
    }
    if min < 0 {
        return Err(EncodeError::NegativeValue {
            column: COLUMN,
            value: min,
        }
        .into());
    }
    out.write_nibble(min as u64);
    out.write_nibble(max as u64);

    let range = (max - min + 1) as u64;
    for value in values {
        out.write_minimal_binary((value - min) as u64, range);
    }
    trace!(
        "query-ids: minimal binary over [{min}, {max}] for {} entries",
        values.len()
    );
    stats.record(COLUMN, values.len(), out.bit_len() - start);
    Ok(())
}

/// Attempt the delta scheme; commits nothing when it declines.
fn try_encode_deltas(values: &[i64], out: &mut BitWriter, stats: &mut ChunkStats) -> Result<bool> {
    if values.is_empty() {
        return Ok(false);
    }
    let first = values[0];
    if first < 0 {
        return Err(EncodeError::NegativeValue {
            column: COLUMN,
            value: first,
        }
        .into());
    }

    let deltas: Vec<i64> = values
        .windows(2)
        .map(|pair| zigzag(pair[1] - pair[0]) as i64)
        .collect();
    let distinct = deltas.iter().collect::<BTreeSet<_>>().len();
    if distinct as f64 > values.len() as f64 * MAX_DISTINCT_DELTA_FRACTION {
        trace!(
            "query-ids: {distinct} distinct deltas over {} entries, falling back",
            values.len()
        );
        return Ok(false);
    }

    let start = out.bit_len();
    out.write_bit(DELTA_SCHEME);
    out.write_nibble(first as u64);
    encode_column("query-id-deltas", &deltas, out, stats);
    stats.record(COLUMN, values.len(), out.bit_len() - start);
    Ok(true)
}

/// Read a nibble that must fit a `u32` record field; corrupt payloads can
/// otherwise smuggle in values that overflow downstream arithmetic.
fn read_bounded(reader: &mut BitReader) -> Result<i64> {
    let raw = reader.read_nibble()?;
    if raw > u64::from(u32::MAX) {
        return Err(DecodeError::ValueOutOfRange {
            column: COLUMN,
            value: i64::try_from(raw).unwrap_or(i64::MAX),
        }
        .into());
    }
    Ok(raw as i64)
}

pub(crate) fn decode_query_ids(expected: usize, reader: &mut BitReader) -> Result<Vec<i64>> {
    if reader.read_bit()? == DELTA_SCHEME {
        let first = read_bounded(reader)?;
        let deltas = decode_column("query-id-deltas", reader)?;
        if deltas.len() + 1 != expected {
            return Err(DecodeError::ColumnLengthMismatch {
                column: COLUMN,
                expected,
                got: deltas.len() + 1,
            }
            .into());
        }
        let mut values = Vec::with_capacity(expected);
        let mut previous = first;
        values.push(previous);
        for delta in deltas {
            let step = unzigzag(delta as u64);
            previous = previous
                .checked_add(step)
                .ok_or(DecodeError::ValueOutOfRange {
                    column: COLUMN,
                    value: step,
                })?;
            values.push(previous);
        }
        Ok(values)
    } else {
        let count = reader.read_nibble()?;
        if count > MAX_COLUMN_ENTRIES {
            return Err(DecodeError::ImplausibleColumnSize {
                column: COLUMN,
                size: count,
            }
            .into());
        }
        let count = count as usize;
        if count != expected {
            return Err(DecodeError::ColumnLengthMismatch {
                column: COLUMN,
                expected,
                got: count,
            }
            .into());
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let min = read_bounded(reader)?;
        let max = read_bounded(reader)?;
        if max < min {
            return Err(DecodeError::InvalidRange {
                column: COLUMN,
                min,
                max,
            }
            .into());
        }
        let range = (max - min + 1) as u64;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(reader.read_minimal_binary(range)? as i64 + min);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    fn roundtrip(values: &[i64]) -> (Vec<i64>, bool) {
        let mut out = BitWriter::new();
        let mut stats = ChunkStats::default();
        encode_query_ids(values, &mut out, &mut stats).unwrap();

        let bytes = out.into_bytes();
        let mut reader = BitReader::new(&bytes);
        let scheme = reader.read_bit().unwrap();
        reader.seek(0).unwrap();
        let decoded = decode_query_ids(values.len(), &mut reader).unwrap();
        (decoded, scheme)
    }

    #[test]
    fn test_increasing_sequence_selects_delta() {
        let values: Vec<i64> = (0..1000).collect();
        let (decoded, scheme) = roundtrip(&values);
        assert_eq!(scheme, DELTA_SCHEME);
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_irregular_sequence_selects_minimal_binary() {
        // a multiplicative permutation of 0..997 has ~unique deltas
        let values: Vec<i64> = (0..997).map(|i| (i * 701) % 997).collect();
        let (decoded, scheme) = roundtrip(&values);
        assert_eq!(scheme, MINIMAL_BINARY_SCHEME);
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_descending_sequence_round_trips() {
        let values: Vec<i64> = (0..500).rev().collect();
        let (decoded, scheme) = roundtrip(&values);
        assert_eq!(scheme, DELTA_SCHEME);
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_empty_sequence() {
        let (decoded, scheme) = roundtrip(&[]);
        assert_eq!(scheme, MINIMAL_BINARY_SCHEME);
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_single_value() {
        let (decoded, _) = roundtrip(&[42]);
        assert_eq!(decoded, vec![42]);
    }

    #[test]
    fn test_count_mismatch_is_rejected() {
        let values: Vec<i64> = (0..10).collect();
        let mut out = BitWriter::new();
        let mut stats = ChunkStats::default();
        encode_query_ids(&values, &mut out, &mut stats).unwrap();
        let bytes = out.into_bytes();
        let mut reader = BitReader::new(&bytes);
        assert!(decode_query_ids(11, &mut reader).is_err());
    }

    #[test]
    fn test_out_of_range_bounds_are_rejected() {
        // a minimal-binary header claiming a max beyond any query id
        let mut out = BitWriter::new();
        out.write_bit(MINIMAL_BINARY_SCHEME);
        out.write_nibble(1);
        out.write_nibble(0);
        out.write_nibble(u64::MAX);
        let bytes = out.into_bytes();
        let mut reader = BitReader::new(&bytes);
        assert!(decode_query_ids(1, &mut reader).is_err());
    }

    #[test]
    fn test_overflowing_delta_accumulation_is_rejected() {
        // zigzag deltas decoding to steps of 2^61 overflow the running sum
        let mut out = BitWriter::new();
        let mut stats = ChunkStats::default();
        out.write_bit(DELTA_SCHEME);
        out.write_nibble(0);
        let deltas = vec![1i64 << 62; 5];
        encode_column("query-id-deltas", &deltas, &mut out, &mut stats);
        let bytes = out.into_bytes();
        let mut reader = BitReader::new(&bytes);
        assert!(decode_query_ids(6, &mut reader).is_err());
    }

    #[test]
    fn test_negative_query_id_is_rejected() {
        let mut out = BitWriter::new();
        let mut stats = ChunkStats::default();
        assert!(encode_query_ids(&[-1, 0, 1], &mut out, &mut stats).is_err());
    }
}
