//! The chunk codec: columnar reduction into one compressed bitstream and
//! the replay pass that reconstructs the original records.
//!
//! A chunk is self-contained; no codec state survives between calls, so
//! chunks can be decoded in any order. The payload starts with the
//! multiplicity-fields-missing bit, then the columns in a fixed order:
//!
//! 1. position deltas, target deltas (per expanded non-anchored record)
//! 2. the optional scalar fields (per reduced record)
//! 3. variation counts and variation metadata (per reduced record)
//! 4. variation quality flags and bytes (per original record)
//! 5. multiplicities (per reduced record)
//! 6. mate, forward-splice and backward-splice link columns
//! 7. query indices, last so their count can be derived from the
//!    multiplicity column
//!
//! Decoding reads the same columns in the same order, validates their
//! lengths against the reduced batch, and then expands each template
//! `multiplicity` times while the per-original cursors advance.

mod columns;
mod indices;
mod links;
mod reduce;
mod scalar;
mod variations;

use log::trace;

use crate::bits::{BitReader, BitWriter};
use crate::codec::columns::{ColumnStore, ABSENT};
use crate::codec::links::LinkCursor;
use crate::codec::scalar::{decode_column, encode_column, MAX_COLUMN_ENTRIES};
use crate::codec::variations::VariationCursor;
use crate::error::DecodeError;
use crate::record::AlignmentRecord;
use crate::stats::ChunkStats;
use crate::Result;

/// The output of [`encode_chunk`]: the reduced batch, the compressed
/// payload, and per-column bit accounting.
///
/// The reduced batch is persisted separately from the payload so a
/// container can report record counts without decoding; both halves are
/// required to reconstruct the chunk.
#[derive(Clone, Debug)]
pub struct EncodedChunk {
    /// One record per fold run, holding only anchor absolutes
    pub reduced: Vec<AlignmentRecord>,
    /// The compressed column payload
    pub payload: Vec<u8>,
    /// Bit accounting for this chunk
    pub stats: ChunkStats,
}

/// Compress a chunk of alignment records.
///
/// Records must carry `target_id`, `position` and `query_id`; compression
/// works best when the chunk is sorted by target and position but any
/// order round-trips.
///
/// # Errors
/// Returns an [`EncodeError`](crate::EncodeError) when a record is
/// missing a required field or carries malformed variations.
pub fn encode_chunk(chunk: &[AlignmentRecord]) -> Result<EncodedChunk> {
    let mut store = ColumnStore::new();
    let reduction = reduce::reduce(chunk, &mut store)?;

    let mut out = BitWriter::new();
    let mut stats = ChunkStats::default();
    out.write_bit(reduction.multiplicity_all_missing);

    encode_column("delta-positions", &store.delta_positions, &mut out, &mut stats);
    encode_column("delta-targets", &store.delta_targets, &mut out, &mut stats);
    encode_column("query-lengths", &store.query_lengths, &mut out, &mut stats);
    encode_column("mapping-qualities", &store.mapping_qualities, &mut out, &mut stats);
    encode_column("reverse-strands", &store.reverse_strands, &mut out, &mut stats);
    encode_column("indel-counts", &store.indel_counts, &mut out, &mut stats);
    encode_column("mismatch-counts", &store.mismatch_counts, &mut out, &mut stats);
    encode_column("query-aligned-lengths", &store.query_aligned_lengths, &mut out, &mut stats);
    encode_column("target-aligned-lengths", &store.target_aligned_lengths, &mut out, &mut stats);
    encode_column("query-positions", &store.query_positions, &mut out, &mut stats);
    encode_column("fragment-indices", &store.fragment_indices, &mut out, &mut stats);
    encode_column("variation-counts", &store.variation_counts, &mut out, &mut stats);
    encode_column("var-positions", &store.var_positions, &mut out, &mut stats);
    encode_column("var-from-lengths", &store.var_from_lengths, &mut out, &mut stats);
    encode_column("var-to-lengths", &store.var_to_lengths, &mut out, &mut stats);
    encode_column("var-read-indices", &store.var_read_indices, &mut out, &mut stats);
    encode_column("var-from-to", &store.var_from_to, &mut out, &mut stats);
    encode_column("var-quality-bytes", &store.var_quality_bytes, &mut out, &mut stats);
    encode_column("var-quality-flags", &store.var_quality_flags, &mut out, &mut stats);
    encode_column("multiplicities", &store.multiplicities, &mut out, &mut stats);
    store.mate_links.write(&mut out, &mut stats);
    store.forward_links.write(&mut out, &mut stats);
    store.backward_links.write(&mut out, &mut stats);
    indices::encode_query_ids(&store.query_ids, &mut out, &mut stats)?;

    stats.folded_records = reduction.folded_records;
    stats.payload_bits = out.bit_len() as u64;
    stats.log_summary();
    trace!(
        "encoded {} records into {} reduced and {} payload bits",
        chunk.len(),
        reduction.reduced.len(),
        stats.payload_bits
    );

    Ok(EncodedChunk {
        reduced: reduction.reduced,
        payload: out.into_bytes(),
        stats,
    })
}

/// Reconstruct the original records of a chunk from its reduced batch and
/// compressed payload.
///
/// # Errors
/// Returns a [`DecodeError`](crate::DecodeError) when the payload is
/// truncated, a column's length disagrees with the reduced batch, or a
/// decoded value cannot be represented in its record field. A failed
/// decode never returns a partial batch.
pub fn decode_chunk(reduced: &[AlignmentRecord], payload: &[u8]) -> Result<Vec<AlignmentRecord>> {
    let mut reader = BitReader::new(payload);
    let multiplicity_all_missing = reader.read_bit()?;

    let mut store = ColumnStore::new();
    store.delta_positions = decode_column("delta-positions", &mut reader)?;
    store.delta_targets = decode_column("delta-targets", &mut reader)?;
    store.query_lengths = decode_column("query-lengths", &mut reader)?;
    store.mapping_qualities = decode_column("mapping-qualities", &mut reader)?;
    store.reverse_strands = decode_column("reverse-strands", &mut reader)?;
    store.indel_counts = decode_column("indel-counts", &mut reader)?;
    store.mismatch_counts = decode_column("mismatch-counts", &mut reader)?;
    store.query_aligned_lengths = decode_column("query-aligned-lengths", &mut reader)?;
    store.target_aligned_lengths = decode_column("target-aligned-lengths", &mut reader)?;
    store.query_positions = decode_column("query-positions", &mut reader)?;
    store.fragment_indices = decode_column("fragment-indices", &mut reader)?;
    store.variation_counts = decode_column("variation-counts", &mut reader)?;
    store.var_positions = decode_column("var-positions", &mut reader)?;
    store.var_from_lengths = decode_column("var-from-lengths", &mut reader)?;
    store.var_to_lengths = decode_column("var-to-lengths", &mut reader)?;
    store.var_read_indices = decode_column("var-read-indices", &mut reader)?;
    store.var_from_to = decode_column("var-from-to", &mut reader)?;
    store.var_quality_bytes = decode_column("var-quality-bytes", &mut reader)?;
    store.var_quality_flags = decode_column("var-quality-flags", &mut reader)?;
    store.multiplicities = decode_column("multiplicities", &mut reader)?;
    store.mate_links.read(&mut reader)?;
    store.forward_links.read(&mut reader)?;
    store.backward_links.read(&mut reader)?;

    expect_len("query-lengths", store.query_lengths.len(), reduced.len())?;
    expect_len("mapping-qualities", store.mapping_qualities.len(), reduced.len())?;
    expect_len("reverse-strands", store.reverse_strands.len(), reduced.len())?;
    expect_len("indel-counts", store.indel_counts.len(), reduced.len())?;
    expect_len("mismatch-counts", store.mismatch_counts.len(), reduced.len())?;
    expect_len("query-aligned-lengths", store.query_aligned_lengths.len(), reduced.len())?;
    expect_len("target-aligned-lengths", store.target_aligned_lengths.len(), reduced.len())?;
    expect_len("query-positions", store.query_positions.len(), reduced.len())?;
    expect_len("fragment-indices", store.fragment_indices.len(), reduced.len())?;
    expect_len("variation-counts", store.variation_counts.len(), reduced.len())?;
    expect_len("multiplicities", store.multiplicities.len(), reduced.len())?;

    let mut expanded_total: u64 = 0;
    for multiplicity in &store.multiplicities {
        if *multiplicity < 1 {
            return Err(DecodeError::ValueOutOfRange {
                column: "multiplicities",
                value: *multiplicity,
            }
            .into());
        }
        expanded_total += *multiplicity as u64;
        // checked per addition so a corrupt run cannot overflow the sum
        if expanded_total > MAX_COLUMN_ENTRIES {
            return Err(DecodeError::ImplausibleColumnSize {
                column: "multiplicities",
                size: expanded_total,
            }
            .into());
        }
    }
    let expanded_total = expanded_total as usize;

    let anchored_count = reduced
        .iter()
        .filter(|template| template.position.is_some() || template.target_id.is_some())
        .count();
    expect_len(
        "delta-positions",
        store.delta_positions.len(),
        expanded_total - anchored_count.min(expanded_total),
    )?;
    expect_len("delta-targets", store.delta_targets.len(), store.delta_positions.len())?;
    store.mate_links.validate(expanded_total)?;
    store.forward_links.validate(expanded_total)?;
    store.backward_links.validate(expanded_total)?;

    let query_ids = indices::decode_query_ids(expanded_total, &mut reader)?;

    let mut result = Vec::with_capacity(expanded_total);
    let mut cursor = VariationCursor::default();
    let mut mate_cursor = LinkCursor::default();
    let mut forward_cursor = LinkCursor::default();
    let mut backward_cursor = LinkCursor::default();
    let mut delta_index = 0;
    let mut original_index = 0;
    let mut previous_target: i64 = 0;
    let mut previous_position: i64 = 0;

    for (template_index, template) in reduced.iter().enumerate() {
        let multiplicity = store.multiplicities[template_index];
        let variation_count = narrow_count(store.variation_counts[template_index])?;
        let anchored = template.position.is_some() || template.target_id.is_some();
        let mark = cursor;

        for replica in 0..multiplicity {
            // folded duplicates share one template; rewind the metadata
            // cursors, the per-original cursors keep advancing
            cursor.meta = mark.meta;
            cursor.fromto = mark.fromto;

            let (target, position) = if replica == 0 && anchored {
                (
                    i64::from(template.target_id.unwrap_or(0)),
                    i64::from(template.position.unwrap_or(0)),
                )
            } else {
                let delta_position = *store.delta_positions.get(delta_index).ok_or(
                    DecodeError::CursorOverrun {
                        column: "delta-positions",
                    },
                )?;
                let delta_target = *store.delta_targets.get(delta_index).ok_or(
                    DecodeError::CursorOverrun {
                        column: "delta-targets",
                    },
                )?;
                delta_index += 1;
                (
                    previous_target + delta_target,
                    previous_position + delta_position,
                )
            };
            previous_target = target;
            previous_position = position;

            result.push(AlignmentRecord {
                target_id: Some(narrow_field(target, "delta-targets")?),
                position: Some(narrow_field(position, "delta-positions")?),
                query_id: Some(narrow_field(query_ids[original_index], "query-ids")?),
                mapping_quality: optional_field(
                    store.mapping_qualities[template_index],
                    "mapping-qualities",
                )?,
                reverse_strand: optional_flag(
                    store.reverse_strands[template_index],
                    "reverse-strands",
                )?,
                indel_count: optional_field(store.indel_counts[template_index], "indel-counts")?,
                mismatch_count: optional_field(
                    store.mismatch_counts[template_index],
                    "mismatch-counts",
                )?,
                query_length: optional_field(store.query_lengths[template_index], "query-lengths")?,
                query_aligned_length: optional_field(
                    store.query_aligned_lengths[template_index],
                    "query-aligned-lengths",
                )?,
                target_aligned_length: optional_field(
                    store.target_aligned_lengths[template_index],
                    "target-aligned-lengths",
                )?,
                fragment_index: optional_field(
                    store.fragment_indices[template_index],
                    "fragment-indices",
                )?,
                query_position: optional_field(
                    store.query_positions[template_index],
                    "query-positions",
                )?,
                multiplicity: (!multiplicity_all_missing).then_some(1),
                mate_link: store.mate_links.take(&mut mate_cursor, original_index)?,
                splice_forward: store.forward_links.take(&mut forward_cursor, original_index)?,
                splice_backward: store
                    .backward_links
                    .take(&mut backward_cursor, original_index)?,
                variations: variations::replay_variations(&store, &mut cursor, variation_count)?,
            });
            original_index += 1;
        }
    }

    finish_cursor("var-positions", cursor.meta, store.var_positions.len())?;
    finish_cursor("var-from-to", cursor.fromto, store.var_from_to.len())?;
    finish_cursor(
        "var-quality-flags",
        cursor.quality_flag,
        store.var_quality_flags.len(),
    )?;
    finish_cursor(
        "var-quality-bytes",
        cursor.quality_byte,
        store.var_quality_bytes.len(),
    )?;
    store.mate_links.finish(&mate_cursor)?;
    store.forward_links.finish(&forward_cursor)?;
    store.backward_links.finish(&backward_cursor)?;

    Ok(result)
}

fn expect_len(column: &'static str, got: usize, expected: usize) -> Result<()> {
    if got == expected {
        Ok(())
    } else {
        Err(DecodeError::ColumnLengthMismatch {
            column,
            expected,
            got,
        }
        .into())
    }
}

fn finish_cursor(column: &'static str, consumed: usize, len: usize) -> Result<()> {
    if consumed == len {
        Ok(())
    } else {
        Err(DecodeError::TrailingColumnData {
            column,
            got: len - consumed,
        }
        .into())
    }
}

fn narrow_count(value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        DecodeError::ValueOutOfRange {
            column: "variation-counts",
            value,
        }
        .into()
    })
}

fn narrow_field(value: i64, column: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| DecodeError::ValueOutOfRange { column, value }.into())
}

fn optional_field(value: i64, column: &'static str) -> Result<Option<u32>> {
    if value == ABSENT {
        Ok(None)
    } else {
        narrow_field(value, column).map(Some)
    }
}

fn optional_flag(value: i64, column: &'static str) -> Result<Option<bool>> {
    match value {
        ABSENT => Ok(None),
        0 => Ok(Some(false)),
        1 => Ok(Some(true)),
        _ => Err(DecodeError::ValueOutOfRange { column, value }.into()),
    }
}
