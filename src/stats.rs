use std::collections::BTreeMap;

use log::debug;

/// Bit accounting for one encoded column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FieldStats {
    /// Number of column entries encoded
    pub entries: u64,
    /// Number of payload bits the column occupied
    pub bits: u64,
}

impl FieldStats {
    /// Average bits spent per entry, or zero for an empty column.
    #[must_use]
    pub fn bits_per_entry(&self) -> f64 {
        if self.entries == 0 {
            0.0
        } else {
            self.bits as f64 / self.entries as f64
        }
    }
}

/// Per-column bit accounting returned alongside every encoded chunk.
///
/// The codec itself keeps no cross-chunk state; callers that want
/// aggregate statistics fold the per-chunk values themselves:
///
/// ```
/// use binaln::ChunkStats;
///
/// let mut aggregate = ChunkStats::default();
/// for stats in [ChunkStats::default(), ChunkStats::default()] {
///     aggregate.fold(&stats);
/// }
/// ```
#[derive(Clone, Debug, Default)]
pub struct ChunkStats {
    fields: BTreeMap<&'static str, FieldStats>,
    /// Number of records folded into a previous record's multiplicity
    pub folded_records: u64,
    /// Total size of the compressed payload in bits
    pub payload_bits: u64,
}

impl ChunkStats {
    pub(crate) fn record(&mut self, column: &'static str, entries: usize, bits: usize) {
        let field = self.fields.entry(column).or_default();
        field.entries += entries as u64;
        field.bits += bits as u64;
    }

    /// Accounting for one column, if it was encoded.
    #[must_use]
    pub fn field(&self, column: &str) -> Option<FieldStats> {
        self.fields.get(column).copied()
    }

    /// Iterate over all recorded columns in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, FieldStats)> + '_ {
        self.fields.iter().map(|(name, stats)| (*name, *stats))
    }

    /// Accumulate another chunk's accounting into this one.
    pub fn fold(&mut self, other: &ChunkStats) {
        for (column, stats) in &other.fields {
            let field = self.fields.entry(column).or_default();
            field.entries += stats.entries;
            field.bits += stats.bits;
        }
        self.folded_records += other.folded_records;
        self.payload_bits += other.payload_bits;
    }

    /// Emit a per-column summary at debug level.
    pub fn log_summary(&self) {
        for (column, stats) in &self.fields {
            debug!(
                "encoded {} {} entries in {} bits, average {:.3} bits/entry",
                stats.entries,
                column,
                stats.bits,
                stats.bits_per_entry()
            );
        }
        debug!(
            "records folded into multiplicities: {}",
            self.folded_records
        );
    }
}
