//! Sequence-variation flattening and cursor replay.
//!
//! Variations split across two granularities. Metadata (position, read
//! index, from/to lengths) and the aligned from/to byte pairs describe the
//! shape of a variation, which duplicate folding requires to be identical
//! across a run, so they are stored once per reduced record and replayed
//! for every folded duplicate. Quality flags and quality bytes may legally
//! differ within a run, so they are stored once per original record and
//! their cursors never rewind.
//!
//! Aligned byte pairs pack as `(from_byte << 8) | to_byte` over
//! `max(from.len(), to.len())` positions, with `0` standing in for the
//! absent side of an insertion or deletion.

use crate::codec::columns::ColumnStore;
use crate::error::{DecodeError, EncodeError};
use crate::record::{AlignmentRecord, SequenceVariation};
use crate::Result;

/// Consumption state over the variation columns during reconstruction.
///
/// `meta` and `fromto` are rewound to a saved mark between replays of one
/// reduced template; `quality_flag` and `quality_byte` only ever advance.
#[derive(Clone, Copy, Default)]
pub(crate) struct VariationCursor {
    pub meta: usize,
    pub fromto: usize,
    pub quality_flag: usize,
    pub quality_byte: usize,
}

/// Push the per-original quality columns for one record's variations.
///
/// Validates the variation invariants on the way: ASCII bases and a
/// quality vector matching the to-side length.
pub(crate) fn record_qualities(
    record: &AlignmentRecord,
    index: usize,
    store: &mut ColumnStore,
) -> Result<()> {
    for variation in &record.variations {
        if !variation.from.is_ascii() || !variation.to.is_ascii() {
            return Err(EncodeError::NonAsciiBases { index }.into());
        }
        match &variation.to_quality {
            Some(quality) => {
                if quality.len() != variation.to.len() {
                    return Err(EncodeError::QualityLengthMismatch {
                        index,
                        expected: variation.to.len(),
                        got: quality.len(),
                    }
                    .into());
                }
                store.var_quality_flags.push(1);
                for byte in quality {
                    store.var_quality_bytes.push(i64::from(*byte));
                }
            }
            None => store.var_quality_flags.push(0),
        }
    }
    Ok(())
}

/// Push the per-reduced metadata and from/to pair columns for one record's
/// variations.
pub(crate) fn flatten(record: &AlignmentRecord, store: &mut ColumnStore) {
    for variation in &record.variations {
        store.var_positions.push(i64::from(variation.position));
        store.var_read_indices.push(i64::from(variation.read_index));
        store.var_from_lengths.push(variation.from.len() as i64);
        store.var_to_lengths.push(variation.to.len() as i64);

        let from = variation.from.as_bytes();
        let to = variation.to.as_bytes();
        for offset in 0..variation.span() {
            let from_byte = from.get(offset).copied().unwrap_or(0);
            let to_byte = to.get(offset).copied().unwrap_or(0);
            store
                .var_from_to
                .push(i64::from((u16::from(from_byte) << 8) | u16::from(to_byte)));
        }
    }
}

/// Rebuild `count` variations for one expanded record, advancing the
/// cursor across all four column groups.
pub(crate) fn replay_variations(
    store: &ColumnStore,
    cursor: &mut VariationCursor,
    count: usize,
) -> Result<Vec<SequenceVariation>> {
    if count > store.var_positions.len().saturating_sub(cursor.meta) {
        return Err(DecodeError::CursorOverrun {
            column: "var-positions",
        }
        .into());
    }
    let mut variations = Vec::with_capacity(count);
    for _ in 0..count {
        let position = meta_entry(&store.var_positions, cursor.meta, "var-positions")?;
        let read_index = meta_entry(&store.var_read_indices, cursor.meta, "var-read-indices")?;
        let from_len = meta_entry(&store.var_from_lengths, cursor.meta, "var-from-lengths")?;
        let to_len = meta_entry(&store.var_to_lengths, cursor.meta, "var-to-lengths")?;
        cursor.meta += 1;

        let from_len = narrow_length(from_len, "var-from-lengths")?;
        let to_len = narrow_length(to_len, "var-to-lengths")?;
        let span = from_len.max(to_len);
        if span > store.var_from_to.len().saturating_sub(cursor.fromto) {
            return Err(DecodeError::CursorOverrun {
                column: "var-from-to",
            }
            .into());
        }
        let mut from = String::with_capacity(from_len);
        let mut to = String::with_capacity(to_len);
        for offset in 0..span {
            let pair = store.var_from_to[cursor.fromto + offset];
            let (from_byte, to_byte) = unpack_pair(pair)?;
            if offset < from_len {
                from.push(char::from(from_byte));
            }
            if offset < to_len {
                to.push(char::from(to_byte));
            }
        }
        cursor.fromto += span;

        let has_quality = store
            .var_quality_flags
            .get(cursor.quality_flag)
            .copied()
            .ok_or(DecodeError::CursorOverrun {
                column: "var-quality-flags",
            })?;
        cursor.quality_flag += 1;
        let to_quality = if has_quality != 0 {
            let mut quality = Vec::with_capacity(to_len);
            for offset in 0..to_len {
                let byte = store
                    .var_quality_bytes
                    .get(cursor.quality_byte + offset)
                    .copied()
                    .ok_or(DecodeError::CursorOverrun {
                        column: "var-quality-bytes",
                    })?;
                quality.push(byte as u8);
            }
            cursor.quality_byte += to_len;
            Some(quality)
        } else {
            None
        };

        variations.push(SequenceVariation {
            position: narrow_field(position, "var-positions")?,
            read_index: narrow_field(read_index, "var-read-indices")?,
            from,
            to,
            to_quality,
        });
    }
    Ok(variations)
}

/// Split a packed from/to pair, rejecting entries that do not hold two
/// ASCII bytes. Encoding only ever emits ASCII bases, so anything else is
/// payload corruption.
fn unpack_pair(pair: i64) -> Result<(u8, u8)> {
    let out_of_range = || DecodeError::ValueOutOfRange {
        column: "var-from-to",
        value: pair,
    };
    if !(0..=0xFFFF).contains(&pair) {
        return Err(out_of_range().into());
    }
    let from_byte = (pair >> 8) as u8;
    let to_byte = (pair & 0xFF) as u8;
    if !from_byte.is_ascii() || !to_byte.is_ascii() {
        return Err(out_of_range().into());
    }
    Ok((from_byte, to_byte))
}

fn meta_entry(column: &[i64], index: usize, name: &'static str) -> Result<i64> {
    column
        .get(index)
        .copied()
        .ok_or_else(|| DecodeError::CursorOverrun { column: name }.into())
}

fn narrow_length(value: i64, column: &'static str) -> Result<usize> {
    usize::try_from(value).map_err(|_| DecodeError::ValueOutOfRange { column, value }.into())
}

fn narrow_field(value: i64, column: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| DecodeError::ValueOutOfRange { column, value }.into())
}
