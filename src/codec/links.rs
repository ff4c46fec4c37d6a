//! Cross-record link columns (mate and splice partners).
//!
//! A link references another record by chunk-relative offset. Offsets are
//! stored as deltas against the referring record's own original index, so
//! mostly-local references produce a tiny dictionary. Because duplicate
//! folding changes the mapping between reduced index and true record
//! offset, decoding resolves deltas against the expanded index of the
//! record under reconstruction, never its reduced index.

use crate::bits::{BitReader, BitWriter};
use crate::codec::scalar::{decode_column, encode_column};
use crate::error::DecodeError;
use crate::record::RecordLink;
use crate::stats::ChunkStats;
use crate::Result;

/// The three columns backing one link type.
#[derive(Default)]
pub(crate) struct LinkColumns {
    column_has: &'static str,
    column_delta: &'static str,
    column_fragment: &'static str,

    /// One presence flag per original record
    has: Vec<i64>,
    /// One offset delta per present link
    delta: Vec<i64>,
    /// One fragment index per present link
    fragment: Vec<i64>,
}

/// Consumption state for one link type during reconstruction.
#[derive(Default)]
pub(crate) struct LinkCursor {
    next: usize,
}

impl LinkColumns {
    pub fn new(
        column_has: &'static str,
        column_delta: &'static str,
        column_fragment: &'static str,
    ) -> Self {
        Self {
            column_has,
            column_delta,
            column_fragment,
            ..Self::default()
        }
    }

    /// Record the link of the original record at `original_index`.
    pub fn push(&mut self, original_index: usize, link: Option<&RecordLink>) {
        self.has.push(i64::from(link.is_some()));
        if let Some(link) = link {
            self.delta.push(link.record_offset - original_index as i64);
            self.fragment.push(i64::from(link.fragment_index));
        }
    }

    pub fn write(&self, out: &mut BitWriter, stats: &mut ChunkStats) {
        encode_column(self.column_has, &self.has, out, stats);
        encode_column(self.column_delta, &self.delta, out, stats);
        encode_column(self.column_fragment, &self.fragment, out, stats);
    }

    pub fn read(&mut self, reader: &mut BitReader) -> Result<()> {
        self.has = decode_column(self.column_has, reader)?;
        self.delta = decode_column(self.column_delta, reader)?;
        self.fragment = decode_column(self.column_fragment, reader)?;
        Ok(())
    }

    /// Check decoded column lengths against the expanded record count.
    pub fn validate(&self, original_count: usize) -> Result<()> {
        if self.has.len() != original_count {
            return Err(DecodeError::ColumnLengthMismatch {
                column: self.column_has,
                expected: original_count,
                got: self.has.len(),
            }
            .into());
        }
        let present = self.has.iter().filter(|flag| **flag != 0).count();
        if self.delta.len() != present {
            return Err(DecodeError::ColumnLengthMismatch {
                column: self.column_delta,
                expected: present,
                got: self.delta.len(),
            }
            .into());
        }
        if self.fragment.len() != present {
            return Err(DecodeError::ColumnLengthMismatch {
                column: self.column_fragment,
                expected: present,
                got: self.fragment.len(),
            }
            .into());
        }
        Ok(())
    }

    /// Rebuild the link of the expanded record at `expanded_index`.
    pub fn take(
        &self,
        cursor: &mut LinkCursor,
        expanded_index: usize,
    ) -> Result<Option<RecordLink>> {
        let present = self
            .has
            .get(expanded_index)
            .copied()
            .ok_or(DecodeError::CursorOverrun {
                column: self.column_has,
            })?;
        if present == 0 {
            return Ok(None);
        }
        let delta = self
            .delta
            .get(cursor.next)
            .copied()
            .ok_or(DecodeError::CursorOverrun {
                column: self.column_delta,
            })?;
        let fragment = self
            .fragment
            .get(cursor.next)
            .copied()
            .ok_or(DecodeError::CursorOverrun {
                column: self.column_fragment,
            })?;
        cursor.next += 1;
        let fragment_index =
            u32::try_from(fragment).map_err(|_| DecodeError::ValueOutOfRange {
                column: self.column_fragment,
                value: fragment,
            })?;
        Ok(Some(RecordLink {
            record_offset: expanded_index as i64 + delta,
            fragment_index,
        }))
    }

    /// Ensure every stored link value was consumed during reconstruction.
    pub fn finish(&self, cursor: &LinkCursor) -> Result<()> {
        if cursor.next != self.delta.len() {
            return Err(DecodeError::TrailingColumnData {
                column: self.column_delta,
                got: self.delta.len() - cursor.next,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    fn sample_columns() -> LinkColumns {
        let mut columns = LinkColumns::new("has", "delta", "fragment");
        columns.push(0, Some(&RecordLink::new(3, 1)));
        columns.push(1, None);
        columns.push(2, Some(&RecordLink::new(0, 0)));
        columns.push(3, Some(&RecordLink::new(-5, 2)));
        columns
    }

    #[test]
    fn test_roundtrip_through_bitstream() {
        let columns = sample_columns();
        let mut out = BitWriter::new();
        let mut stats = ChunkStats::default();
        columns.write(&mut out, &mut stats);

        let bytes = out.into_bytes();
        let mut reader = BitReader::new(&bytes);
        let mut decoded = LinkColumns::new("has", "delta", "fragment");
        decoded.read(&mut reader).unwrap();
        decoded.validate(4).unwrap();

        let mut cursor = LinkCursor::default();
        assert_eq!(
            decoded.take(&mut cursor, 0).unwrap(),
            Some(RecordLink::new(3, 1))
        );
        assert_eq!(decoded.take(&mut cursor, 1).unwrap(), None);
        assert_eq!(
            decoded.take(&mut cursor, 2).unwrap(),
            Some(RecordLink::new(0, 0))
        );
        assert_eq!(
            decoded.take(&mut cursor, 3).unwrap(),
            Some(RecordLink::new(-5, 2))
        );
        decoded.finish(&cursor).unwrap();
    }

    #[test]
    fn test_offsets_resolve_against_expanded_index() {
        // two expanded records sharing one reduced template still get
        // distinct absolute offsets
        let mut columns = LinkColumns::new("has", "delta", "fragment");
        columns.push(0, Some(&RecordLink::new(1, 0)));
        columns.push(1, Some(&RecordLink::new(0, 0)));

        let mut cursor = LinkCursor::default();
        assert_eq!(
            columns.take(&mut cursor, 0).unwrap(),
            Some(RecordLink::new(1, 0))
        );
        assert_eq!(
            columns.take(&mut cursor, 1).unwrap(),
            Some(RecordLink::new(0, 0))
        );
    }

    #[test]
    fn test_validate_rejects_mismatched_lengths() {
        let columns = sample_columns();
        assert!(columns.validate(3).is_err());
        assert!(columns.validate(4).is_ok());
    }

    #[test]
    fn test_finish_rejects_unconsumed_links() {
        let columns = sample_columns();
        let mut cursor = LinkCursor::default();
        columns.take(&mut cursor, 0).unwrap();
        assert!(columns.finish(&cursor).is_err());
    }
}
