use std::error::Error as StdError;

/// Custom Result type for binaln operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the binaln library, encompassing all possible error
/// cases that can occur while compressing or reconstructing a chunk.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Errors raised while validating and encoding a chunk
    #[error("Error encoding chunk: {0}")]
    EncodeError(#[from] EncodeError),

    /// Errors raised while decoding a compressed payload
    #[error("Error decoding chunk: {0}")]
    DecodeError(#[from] DecodeError),

    /// Conversion errors from anyhow errors
    #[cfg(feature = "anyhow")]
    #[error("Generic error: {0}")]
    AnyhowError(#[from] anyhow::Error),

    /// Generic errors for other unexpected situations
    #[error("Generic error: {0}")]
    GenericError(#[from] Box<dyn StdError + Send + Sync>),
}

impl Error {
    /// Checks whether the error indicates a corrupt payload rather than a
    /// rejected input record.
    ///
    /// A corrupt payload fails the whole chunk; the caller cannot recover by
    /// fixing its input.
    #[must_use]
    pub fn is_corrupt_payload(&self) -> bool {
        matches!(self, Self::DecodeError(_))
    }
}

/// Errors raised while validating and encoding a chunk of alignment records.
///
/// These reject domain irregularities before they reach the column codecs,
/// so a malformed record can never silently corrupt the payload.
#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    /// A required field (target id, position or query id) is absent
    #[error("Record {index} is missing required field `{field}`")]
    MissingField { field: &'static str, index: usize },

    /// A sequence variation carries quality bytes whose length does not
    /// match its to-bases
    #[error(
        "Record {index}: variation quality length ({got}) does not match to-bases length ({expected})"
    )]
    QualityLengthMismatch {
        index: usize,
        expected: usize,
        got: usize,
    },

    /// A sequence variation contains non-ASCII from/to bases
    #[error("Record {index}: variation bases must be ASCII")]
    NonAsciiBases { index: usize },

    /// A value that must be encoded as an unsigned code is negative
    #[error("Cannot encode negative value {value} in column `{column}`")]
    NegativeValue { column: &'static str, value: i64 },
}

/// Errors raised while decoding a compressed payload.
///
/// The chunk is the atomic recoverable unit: any of these fails the whole
/// chunk and no partial batch is returned.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    /// The payload ended before a read completed
    #[error("Unexpected end of payload at bit {bit_position}")]
    UnexpectedEndOfPayload { bit_position: usize },

    /// A nibble varint kept its continuation bit set past 64 bits
    #[error("Overlong varint at bit {bit_position}")]
    OverlongVarint { bit_position: usize },

    /// A column declared a length inconsistent with the reduced batch
    #[error("Column `{column}` has {got} entries, expected {expected}")]
    ColumnLengthMismatch {
        column: &'static str,
        expected: usize,
        got: usize,
    },

    /// A column declared an implausible entry count
    #[error("Column `{column}` declares an implausible size ({size})")]
    ImplausibleColumnSize { column: &'static str, size: u64 },

    /// A decoded symbol fell outside the column dictionary
    #[error("Symbol {symbol} out of range for dictionary of {dictionary_size} in column `{column}`")]
    SymbolOutOfRange {
        column: &'static str,
        symbol: usize,
        dictionary_size: usize,
    },

    /// A non-empty column arrived with an empty dictionary
    #[error("Column `{column}` has entries but an empty dictionary")]
    EmptyDictionary { column: &'static str },

    /// A decoded value cannot be represented in its record field
    #[error("Value {value} out of range for column `{column}`")]
    ValueOutOfRange { column: &'static str, value: i64 },

    /// A minimal-binary range with min above max
    #[error("Invalid range specified for column `{column}`: min ({min}) is greater than max ({max})")]
    InvalidRange {
        column: &'static str,
        min: i64,
        max: i64,
    },

    /// A replay cursor ran past the end of its column
    #[error("Cursor overran column `{column}` during reconstruction")]
    CursorOverrun { column: &'static str },

    /// A column held more entries than reconstruction consumed
    #[error("Column `{column}` has {got} unconsumed entries after reconstruction")]
    TrailingColumnData { column: &'static str, got: usize },
}

/// Trait for converting arbitrary errors into `Error`
pub trait IntoBinalnError {
    fn into_binaln_error(self) -> Error;
}

impl<E> IntoBinalnError for E
where
    E: StdError + Send + Sync + 'static,
{
    fn into_binaln_error(self) -> Error {
        Error::GenericError(Box::new(self))
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum MyError {
        #[error("Custom error: {0}")]
        CustomError(String),
    }

    #[test]
    fn test_into_binaln_error() {
        let my_error = MyError::CustomError(String::from("some error"));
        let err = my_error.into_binaln_error();
        assert!(matches!(err, Error::GenericError(_)));
    }

    #[test]
    fn test_is_corrupt_payload() {
        let err = Error::DecodeError(DecodeError::UnexpectedEndOfPayload { bit_position: 17 });
        assert!(err.is_corrupt_payload());

        let err = Error::EncodeError(EncodeError::MissingField {
            field: "position",
            index: 3,
        });
        assert!(!err.is_corrupt_payload());
    }

    #[test]
    fn test_encode_error_display() {
        let err = EncodeError::QualityLengthMismatch {
            index: 4,
            expected: 3,
            got: 2,
        };
        let msg = format!("{err}");
        assert!(msg.contains('4'));
        assert!(msg.contains('3'));
        assert!(msg.contains('2'));
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::ColumnLengthMismatch {
            column: "mapping-quality",
            expected: 10,
            got: 7,
        };
        let msg = format!("{err}");
        assert!(msg.contains("mapping-quality"));
        assert!(msg.contains("10"));
        assert!(msg.contains('7'));
    }

    #[test]
    fn test_error_from_encode_error() {
        let err: Error = EncodeError::NonAsciiBases { index: 0 }.into();
        assert!(matches!(err, Error::EncodeError(_)));
    }

    #[test]
    fn test_error_from_decode_error() {
        let err: Error = DecodeError::EmptyDictionary { column: "targets" }.into();
        assert!(matches!(err, Error::DecodeError(_)));
    }
}
