use crate::codec::links::LinkColumns;

/// The per-record "absent" sentinel used inside intermediate columns.
///
/// Every optional field is unsigned in the record model, so `-1` can never
/// collide with a legal value; the scalar codec additionally shifts
/// dictionary entries by one so the sentinel itself codes as zero.
pub(crate) const ABSENT: i64 = -1;

/// One ordered sequence per scalar field of a chunk, built while scanning
/// and consumed while writing (or the reverse when decoding).
///
/// Columns come in two granularities. Per-original columns receive one
/// entry for every input record, including records folded into a previous
/// record's multiplicity; per-reduced columns receive one entry per
/// emitted reduced record only. The distinction drives the replay cursors
/// during reconstruction.
#[derive(Default)]
pub(crate) struct ColumnStore {
    // per original record
    pub delta_positions: Vec<i64>,
    pub delta_targets: Vec<i64>,
    pub query_ids: Vec<i64>,
    pub var_quality_flags: Vec<i64>,
    pub var_quality_bytes: Vec<i64>,
    pub mate_links: LinkColumns,
    pub forward_links: LinkColumns,
    pub backward_links: LinkColumns,

    // per reduced record
    pub query_lengths: Vec<i64>,
    pub mapping_qualities: Vec<i64>,
    pub reverse_strands: Vec<i64>,
    pub indel_counts: Vec<i64>,
    pub mismatch_counts: Vec<i64>,
    pub query_aligned_lengths: Vec<i64>,
    pub target_aligned_lengths: Vec<i64>,
    pub query_positions: Vec<i64>,
    pub fragment_indices: Vec<i64>,
    pub variation_counts: Vec<i64>,
    pub multiplicities: Vec<i64>,

    // per variation of reduced records
    pub var_positions: Vec<i64>,
    pub var_read_indices: Vec<i64>,
    pub var_from_lengths: Vec<i64>,
    pub var_to_lengths: Vec<i64>,

    // per aligned from/to byte pair of reduced records
    pub var_from_to: Vec<i64>,
}

impl ColumnStore {
    pub fn new() -> Self {
        Self {
            mate_links: LinkColumns::new("mate-has", "mate-delta", "mate-fragment"),
            forward_links: LinkColumns::new(
                "forward-splice-has",
                "forward-splice-delta",
                "forward-splice-fragment",
            ),
            backward_links: LinkColumns::new(
                "backward-splice-has",
                "backward-splice-delta",
                "backward-splice-fragment",
            ),
            ..Self::default()
        }
    }
}
