/// A single alignment entry within a chunk.
///
/// Every field is optional at the type level, mirroring the wire schema:
/// a reduced record (as returned by [`encode_chunk`](crate::encode_chunk))
/// is the same type with the stripped fields set to `None`. Full input
/// records must carry the required trio (`target_id`, `position`,
/// `query_id`); [`encode_chunk`](crate::encode_chunk) rejects records that
/// do not.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlignmentRecord {
    /// Index of the reference sequence this record aligns to
    pub target_id: Option<u32>,
    /// Leftmost position of the alignment on the target
    pub position: Option<u32>,
    /// Index of the query (read) this record aligns
    pub query_id: Option<u32>,

    /// Mapping quality reported by the aligner
    pub mapping_quality: Option<u32>,
    /// Whether the query matched the reverse strand
    pub reverse_strand: Option<bool>,
    /// Number of indels in the alignment
    pub indel_count: Option<u32>,
    /// Number of mismatches in the alignment
    pub mismatch_count: Option<u32>,
    /// Full length of the query sequence
    pub query_length: Option<u32>,
    /// Number of query bases covered by the alignment
    pub query_aligned_length: Option<u32>,
    /// Number of target bases covered by the alignment
    pub target_aligned_length: Option<u32>,
    /// Fragment index for multi-fragment templates
    pub fragment_index: Option<u32>,
    /// Position of the alignment start within the query
    pub query_position: Option<u32>,
    /// Explicit run-length count carried by the input record
    pub multiplicity: Option<u32>,

    /// Link to the mate record of a paired read
    pub mate_link: Option<RecordLink>,
    /// Link to the downstream half of a spliced alignment
    pub splice_forward: Option<RecordLink>,
    /// Link to the upstream half of a spliced alignment
    pub splice_backward: Option<RecordLink>,

    /// Sequence variations observed against the target, in read order
    pub variations: Vec<SequenceVariation>,
}

impl AlignmentRecord {
    /// Create a record with only the required trio set.
    #[must_use]
    pub fn new(target_id: u32, position: u32, query_id: u32) -> Self {
        Self {
            target_id: Some(target_id),
            position: Some(position),
            query_id: Some(query_id),
            ..Self::default()
        }
    }

    /// Returns true if the record carries any cross-record link.
    #[must_use]
    pub fn has_links(&self) -> bool {
        self.mate_link.is_some() || self.splice_forward.is_some() || self.splice_backward.is_some()
    }
}

/// A reference from one alignment record to another (mate or splice
/// partner).
///
/// `record_offset` is relative to the start of the chunk the referring
/// record lives in; it may be negative or beyond the chunk's end when the
/// partner was written to a different chunk, in which case the caller
/// resolves it against its global record base.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordLink {
    /// Chunk-relative offset of the referenced record
    pub record_offset: i64,
    /// Fragment index of the referenced record
    pub fragment_index: u32,
}

impl RecordLink {
    #[must_use]
    pub fn new(record_offset: i64, fragment_index: u32) -> Self {
        Self {
            record_offset,
            fragment_index,
        }
    }
}

/// A sequence variation observed within one alignment record.
///
/// `from` holds target bases and `to` holds read bases; the two may differ
/// in length and use `-` as the gap byte, so an insertion-only variation
/// has a gap-only `from`. When `to_quality` is present it holds one
/// quality byte per `to` base.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SequenceVariation {
    /// Position of the variation relative to the alignment start
    pub position: u32,
    /// Index of the first varied base within the read
    pub read_index: u32,
    /// Target-side bases ('-' for insertions)
    pub from: String,
    /// Read-side bases ('-' for deletions)
    pub to: String,
    /// Per-base quality of the read-side bases
    pub to_quality: Option<Vec<u8>>,
}

impl SequenceVariation {
    #[must_use]
    pub fn new(position: u32, read_index: u32, from: &str, to: &str) -> Self {
        Self {
            position,
            read_index,
            from: from.to_string(),
            to: to.to_string(),
            to_quality: None,
        }
    }

    /// Attach read-side quality bytes.
    #[must_use]
    pub fn with_quality(mut self, quality: &[u8]) -> Self {
        self.to_quality = Some(quality.to_vec());
        self
    }

    /// Number of aligned byte pairs this variation spans.
    #[must_use]
    pub fn span(&self) -> usize {
        self.from.len().max(self.to.len())
    }
}
