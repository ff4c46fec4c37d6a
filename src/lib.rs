//! Chunk compression codec for genomic alignment records.
//!
//! A chunk of [`AlignmentRecord`]s is compressed by folding adjacent
//! duplicates into multiplicities, transposing the surviving records into
//! per-field columns, and serializing every column through a per-chunk
//! dictionary and an adaptive arithmetic coder. [`encode_chunk`] returns
//! the reduced batch plus the compressed payload; [`decode_chunk`] takes
//! both and reconstructs the original records.

mod bits;
mod codec;
mod error;
mod record;
mod stats;

pub use codec::{decode_chunk, encode_chunk, EncodedChunk};
pub use error::{DecodeError, EncodeError, Error, IntoBinalnError, Result};
pub use record::{AlignmentRecord, RecordLink, SequenceVariation};
pub use stats::{ChunkStats, FieldStats};
