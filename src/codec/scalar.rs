//! Dictionary + arithmetic serialization of one scalar column.
//!
//! Genomic integer fields are low-cardinality within a chunk, so each
//! column ships a per-chunk dictionary of its distinct values followed by
//! every entry arithmetic-coded as a dictionary index. The arithmetic
//! payload is prefixed with its exact bit length, which keeps every column
//! self-delimiting inside the shared bitstream.

use std::collections::BTreeSet;

use crate::bits::{ArithmeticDecoder, ArithmeticEncoder, BitReader, BitWriter};
use crate::error::DecodeError;
use crate::stats::ChunkStats;
use crate::Result;

/// Upper bound on declared entry counts, guarding allocations against
/// corrupt payloads.
pub(crate) const MAX_COLUMN_ENTRIES: u64 = 1 << 28;

/// Serialize one column: entry count, dictionary, arithmetic payload.
///
/// Dictionary entries are written as zigzag nibbles of `value + 1` so the
/// absent sentinel (`-1`) codes as zero.
pub(crate) fn encode_column(
    column: &'static str,
    values: &[i64],
    out: &mut BitWriter,
    stats: &mut ChunkStats,
) {
    let start = out.bit_len();
    out.write_nibble(values.len() as u64);
    if values.is_empty() {
        stats.record(column, 0, out.bit_len() - start);
        return;
    }

    let dictionary: Vec<i64> = values
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    out.write_nibble(dictionary.len() as u64);
    for value in &dictionary {
        out.write_signed_nibble(value + 1);
    }

    let mut payload = BitWriter::new();
    let mut encoder = ArithmeticEncoder::new(dictionary.len());
    for value in values {
        let Ok(symbol) = dictionary.binary_search(value) else {
            unreachable!("column dictionary must contain every value")
        };
        encoder.encode(symbol, &mut payload);
    }
    encoder.flush(&mut payload);

    out.write_nibble(payload.bit_len() as u64);
    out.append(&payload);
    stats.record(column, values.len(), out.bit_len() - start);
}

/// Deserialize one column written by [`encode_column`].
pub(crate) fn decode_column(column: &'static str, reader: &mut BitReader) -> Result<Vec<i64>> {
    let count = reader.read_nibble()?;
    if count == 0 {
        return Ok(Vec::new());
    }
    if count > MAX_COLUMN_ENTRIES {
        return Err(DecodeError::ImplausibleColumnSize {
            column,
            size: count,
        }
        .into());
    }

    let dictionary_size = reader.read_nibble()?;
    if dictionary_size == 0 {
        return Err(DecodeError::EmptyDictionary { column }.into());
    }
    if dictionary_size > count {
        return Err(DecodeError::ImplausibleColumnSize {
            column,
            size: dictionary_size,
        }
        .into());
    }
    let dictionary_size = dictionary_size as usize;
    let mut dictionary = Vec::with_capacity(dictionary_size);
    for _ in 0..dictionary_size {
        let entry = reader.read_signed_nibble()?;
        let value = entry
            .checked_sub(1)
            .ok_or(DecodeError::ValueOutOfRange {
                column,
                value: entry,
            })?;
        dictionary.push(value);
    }

    let budget = reader.read_nibble()?;
    if budget > reader.bit_len() as u64 {
        return Err(DecodeError::ImplausibleColumnSize {
            column,
            size: budget,
        }
        .into());
    }
    let budget = budget as usize;
    let payload_start = reader.bit_position();
    let mut decoder = ArithmeticDecoder::new(dictionary_size, budget, reader)?;
    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let symbol = decoder.decode(reader)?;
        let value = dictionary
            .get(symbol)
            .copied()
            .ok_or(DecodeError::SymbolOutOfRange {
                column,
                symbol,
                dictionary_size,
            })?;
        values.push(value);
    }
    reader.seek(payload_start + budget)?;
    Ok(values)
}
