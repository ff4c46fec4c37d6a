//! Record reduction: columnar stripping and adjacent-duplicate folding.
//!
//! Reduction walks a chunk once. Every record contributes entries to the
//! per-original columns, then its stripped form is compared to the
//! stripped form of the current run's template: a match folds the record
//! into the template's multiplicity instead of emitting a new reduced
//! record. Folding only ever compares against the immediately preceding
//! template, so it is purely run-based over adjacently sorted input.
//!
//! Target and position never take part in the comparison; they travel per
//! original record through the delta columns, so records of one run may
//! sit at different positions. A record that anchors a new target keeps
//! its absolutes in the reduced record and never folds.
//!
//! A record with an explicit multiplicity `m` stands for `m` expanded
//! records and replicates its per-original entries `m` times, keeping the
//! multiplicity column's sum equal to the expanded record count.

use log::debug;

use crate::codec::columns::{ColumnStore, ABSENT};
use crate::codec::variations;
use crate::error::EncodeError;
use crate::record::AlignmentRecord;
use crate::Result;

/// Output of one reduction pass.
#[derive(Debug)]
pub(crate) struct Reduction {
    /// One record per fold run, stripped down to anchor absolutes
    pub reduced: Vec<AlignmentRecord>,
    /// True when no input record carried an explicit multiplicity
    pub multiplicity_all_missing: bool,
    /// Expanded records beyond the one-per-template minimum
    pub folded_records: u64,
}

/// A record with everything positional, identifying or per-duplicate
/// removed; two originals fold iff their stripped forms are equal.
#[derive(PartialEq, Eq)]
struct StrippedRecord {
    mapping_quality: Option<u32>,
    reverse_strand: Option<bool>,
    indel_count: Option<u32>,
    mismatch_count: Option<u32>,
    query_length: Option<u32>,
    query_aligned_length: Option<u32>,
    target_aligned_length: Option<u32>,
    fragment_index: Option<u32>,
    query_position: Option<u32>,
    has_mate: bool,
    has_splice_forward: bool,
    has_splice_backward: bool,
    variations: Vec<StrippedVariation>,
}

/// A variation minus `to_quality`, which may differ within a run.
#[derive(PartialEq, Eq)]
struct StrippedVariation {
    position: u32,
    read_index: u32,
    from: String,
    to: String,
}

impl StrippedRecord {
    fn of(record: &AlignmentRecord) -> Self {
        Self {
            mapping_quality: record.mapping_quality,
            reverse_strand: record.reverse_strand,
            indel_count: record.indel_count,
            mismatch_count: record.mismatch_count,
            query_length: record.query_length,
            query_aligned_length: record.query_aligned_length,
            target_aligned_length: record.target_aligned_length,
            fragment_index: record.fragment_index,
            query_position: record.query_position,
            has_mate: record.mate_link.is_some(),
            has_splice_forward: record.splice_forward.is_some(),
            has_splice_backward: record.splice_backward.is_some(),
            variations: record
                .variations
                .iter()
                .map(|var| StrippedVariation {
                    position: var.position,
                    read_index: var.read_index,
                    from: var.from.clone(),
                    to: var.to.clone(),
                })
                .collect(),
        }
    }
}

/// Reduce a chunk into templates plus populated columns.
pub(crate) fn reduce(chunk: &[AlignmentRecord], store: &mut ColumnStore) -> Result<Reduction> {
    let mut reduced = Vec::new();
    let mut multiplicity_all_missing = true;
    let mut last_stripped: Option<StrippedRecord> = None;

    let mut previous_target: i64 = 0;
    let mut previous_position: i64 = 0;
    let mut original_index: usize = 0;

    for (index, record) in chunk.iter().enumerate() {
        let target = required(record.target_id, "target_id", index)?;
        let position = required(record.position, "position", index)?;
        let query_id = required(record.query_id, "query_id", index)?;

        multiplicity_all_missing &= record.multiplicity.is_none();
        let replicas = record.multiplicity.unwrap_or(1).max(1) as usize;

        let delta_eligible = original_index > 0 && i64::from(target) == previous_target;
        if delta_eligible {
            store
                .delta_positions
                .push(i64::from(position) - previous_position);
            store
                .delta_targets
                .push(i64::from(target) - previous_target);
        }
        // replicas of an explicit-multiplicity record sit at the same
        // position, so every one past the first is a zero delta
        for _ in 1..replicas {
            store.delta_positions.push(0);
            store.delta_targets.push(0);
        }
        for replica in 0..replicas {
            store.query_ids.push(i64::from(query_id));
            store
                .mate_links
                .push(original_index + replica, record.mate_link.as_ref());
            store
                .forward_links
                .push(original_index + replica, record.splice_forward.as_ref());
            store
                .backward_links
                .push(original_index + replica, record.splice_backward.as_ref());
            variations::record_qualities(record, index, store)?;
        }

        let stripped = StrippedRecord::of(record);
        let folds = delta_eligible && last_stripped.as_ref() == Some(&stripped);
        if folds {
            // `folds` implies a template was emitted before
            if let Some(last) = store.multiplicities.last_mut() {
                *last += replicas as i64;
            }
        } else {
            reduced.push(AlignmentRecord {
                target_id: (!delta_eligible).then_some(target),
                position: (!delta_eligible).then_some(position),
                ..AlignmentRecord::default()
            });
            store.multiplicities.push(replicas as i64);

            store
                .query_lengths
                .push(record.query_length.map_or(ABSENT, i64::from));
            store
                .mapping_qualities
                .push(record.mapping_quality.map_or(ABSENT, i64::from));
            store
                .reverse_strands
                .push(record.reverse_strand.map_or(ABSENT, i64::from));
            store
                .indel_counts
                .push(record.indel_count.map_or(ABSENT, i64::from));
            store
                .mismatch_counts
                .push(record.mismatch_count.map_or(ABSENT, i64::from));
            store
                .query_aligned_lengths
                .push(record.query_aligned_length.map_or(ABSENT, i64::from));
            store
                .target_aligned_lengths
                .push(record.target_aligned_length.map_or(ABSENT, i64::from));
            store
                .query_positions
                .push(record.query_position.map_or(ABSENT, i64::from));
            store
                .fragment_indices
                .push(record.fragment_index.map_or(ABSENT, i64::from));
            store
                .variation_counts
                .push(record.variations.len() as i64);
            variations::flatten(record, store);

            last_stripped = Some(stripped);
        }

        previous_target = i64::from(target);
        previous_position = i64::from(position);
        original_index += replicas;
    }

    let folded_records = (original_index - reduced.len()) as u64;
    debug!(
        "reduced {} records to {} templates ({folded_records} folded)",
        chunk.len(),
        reduced.len()
    );
    Ok(Reduction {
        reduced,
        multiplicity_all_missing,
        folded_records,
    })
}

fn required(field: Option<u32>, name: &'static str, index: usize) -> Result<u32> {
    field.ok_or_else(|| {
        EncodeError::MissingField {
            field: name,
            index,
        }
        .into()
    })
}
