//! Adaptive order-0 arithmetic coding over a finite symbol alphabet.
//!
//! The encoder and decoder share [`AdaptiveModel`], a per-symbol frequency
//! table that both sides update identically after every symbol, so no
//! probability table travels in the payload. Intervals are 32-bit
//! Witten-Neal-Cleary with underflow handled by pending-bit counting.
//!
//! The decoder never reads past the payload it was budgeted for: once the
//! budget is exhausted it feeds itself zero bits, which is sufficient
//! because the encoder's flush pins the interval for every symbol that was
//! actually coded. Callers therefore prefix each payload with its exact
//! bit length and decode exactly the symbol count they expect.

use super::{BitReader, BitWriter};
use crate::Result;

const CODE_BITS: u32 = 32;
const TOP: u64 = 1 << CODE_BITS;
const HALF: u64 = TOP >> 1;
const QUARTER: u64 = TOP >> 2;
const THREE_QUARTERS: u64 = HALF + QUARTER;

/// Frequency totals are kept below this bound so `range * total` fits
/// comfortably in 64 bits.
const MAX_TOTAL: u64 = 1 << 16;

/// Per-symbol count increment; larger steps adapt faster on the short,
/// skewed columns this coder sees.
const COUNT_INCREMENT: u32 = 32;

/// Adaptive frequency table shared by encoder and decoder.
struct AdaptiveModel {
    counts: Vec<u32>,
    total: u64,
}

impl AdaptiveModel {
    fn new(alphabet_size: usize) -> Self {
        debug_assert!(alphabet_size >= 1);
        Self {
            counts: vec![1; alphabet_size],
            total: alphabet_size as u64,
        }
    }

    /// Cumulative interval `[low, high)` of `symbol`.
    fn interval(&self, symbol: usize) -> (u64, u64) {
        let low: u64 = self.counts[..symbol].iter().map(|c| u64::from(*c)).sum();
        (low, low + u64::from(self.counts[symbol]))
    }

    /// Symbol whose cumulative interval contains `target`.
    fn locate(&self, target: u64) -> (usize, u64, u64) {
        debug_assert!(target < self.total);
        let mut low = 0;
        for (symbol, count) in self.counts.iter().enumerate() {
            let high = low + u64::from(*count);
            if target < high {
                return (symbol, low, high);
            }
            low = high;
        }
        unreachable!("cumulative target must fall within the model total")
    }

    fn bump(&mut self, symbol: usize) {
        self.counts[symbol] += COUNT_INCREMENT;
        self.total += u64::from(COUNT_INCREMENT);
        if self.total >= MAX_TOTAL {
            self.rescale();
        }
    }

    fn rescale(&mut self) {
        self.total = 0;
        for count in &mut self.counts {
            *count = (*count + 1) / 2;
            self.total += u64::from(*count);
        }
    }
}

/// Streaming arithmetic encoder writing into a [`BitWriter`].
pub(crate) struct ArithmeticEncoder {
    model: AdaptiveModel,
    low: u64,
    high: u64,
    pending: u64,
}

impl ArithmeticEncoder {
    pub fn new(alphabet_size: usize) -> Self {
        Self {
            model: AdaptiveModel::new(alphabet_size),
            low: 0,
            high: TOP - 1,
            pending: 0,
        }
    }

    pub fn encode(&mut self, symbol: usize, out: &mut BitWriter) {
        let (cum_low, cum_high) = self.model.interval(symbol);
        let total = self.model.total;
        let range = self.high - self.low + 1;
        self.high = self.low + range * cum_high / total - 1;
        self.low += range * cum_low / total;

        loop {
            if self.high < HALF {
                self.emit(false, out);
            } else if self.low >= HALF {
                self.emit(true, out);
                self.low -= HALF;
                self.high -= HALF;
            } else if self.low >= QUARTER && self.high < THREE_QUARTERS {
                self.pending += 1;
                self.low -= QUARTER;
                self.high -= QUARTER;
            } else {
                break;
            }
            self.low <<= 1;
            self.high = (self.high << 1) | 1;
        }
        self.model.bump(symbol);
    }

    /// Terminate the stream, pinning the final interval.
    pub fn flush(mut self, out: &mut BitWriter) {
        self.pending += 1;
        let bit = self.low >= QUARTER;
        self.emit(bit, out);
    }

    fn emit(&mut self, bit: bool, out: &mut BitWriter) {
        out.write_bit(bit);
        while self.pending > 0 {
            out.write_bit(!bit);
            self.pending -= 1;
        }
    }
}

/// Streaming arithmetic decoder reading through a fixed bit budget.
pub(crate) struct ArithmeticDecoder {
    model: AdaptiveModel,
    low: u64,
    high: u64,
    value: u64,
    budget: usize,
    consumed: usize,
}

impl ArithmeticDecoder {
    /// Prime a decoder over the next `budget` bits of `reader`.
    pub fn new(alphabet_size: usize, budget: usize, reader: &mut BitReader) -> Result<Self> {
        let mut decoder = Self {
            model: AdaptiveModel::new(alphabet_size),
            low: 0,
            high: TOP - 1,
            value: 0,
            budget,
            consumed: 0,
        };
        for _ in 0..CODE_BITS {
            decoder.value = (decoder.value << 1) | decoder.next_bit(reader)?;
        }
        Ok(decoder)
    }

    pub fn decode(&mut self, reader: &mut BitReader) -> Result<usize> {
        let total = self.model.total;
        let range = self.high - self.low + 1;
        let target = ((self.value - self.low + 1) * total - 1) / range;
        let (symbol, cum_low, cum_high) = self.model.locate(target);
        self.high = self.low + range * cum_high / total - 1;
        self.low += range * cum_low / total;

        loop {
            if self.high < HALF {
                // nothing to adjust
            } else if self.low >= HALF {
                self.low -= HALF;
                self.high -= HALF;
                self.value -= HALF;
            } else if self.low >= QUARTER && self.high < THREE_QUARTERS {
                self.low -= QUARTER;
                self.high -= QUARTER;
                self.value -= QUARTER;
            } else {
                break;
            }
            self.low <<= 1;
            self.high = (self.high << 1) | 1;
            self.value = (self.value << 1) | self.next_bit(reader)?;
        }
        self.model.bump(symbol);
        Ok(symbol)
    }

    fn next_bit(&mut self, reader: &mut BitReader) -> Result<u64> {
        let bit = if self.consumed < self.budget {
            u64::from(reader.read_bit()?)
        } else {
            0
        };
        self.consumed += 1;
        Ok(bit)
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    fn roundtrip(symbols: &[usize], alphabet_size: usize) {
        let mut payload = BitWriter::new();
        let mut encoder = ArithmeticEncoder::new(alphabet_size);
        for &symbol in symbols {
            encoder.encode(symbol, &mut payload);
        }
        encoder.flush(&mut payload);

        let budget = payload.bit_len();
        let bytes = payload.into_bytes();
        let mut reader = BitReader::new(&bytes);
        let mut decoder = ArithmeticDecoder::new(alphabet_size, budget, &mut reader).unwrap();
        for &symbol in symbols {
            assert_eq!(decoder.decode(&mut reader).unwrap(), symbol);
        }
    }

    #[test]
    fn test_roundtrip_small_alphabet() {
        roundtrip(&[0, 1, 0, 2, 1, 3, 0, 1, 1, 1, 2, 0], 4);
    }

    #[test]
    fn test_roundtrip_single_symbol_alphabet() {
        roundtrip(&[0; 200], 1);
    }

    #[test]
    fn test_roundtrip_empty() {
        roundtrip(&[], 3);
    }

    #[test]
    fn test_roundtrip_triggers_rescale() {
        // enough symbols to push the model total past its rescale bound
        let symbols: Vec<usize> = (0..5000).map(|i| (i * 7) % 11).collect();
        roundtrip(&symbols, 11);
    }

    #[test]
    fn test_skewed_input_compresses() {
        let mut symbols = vec![0usize; 4000];
        symbols[17] = 1;
        symbols[2999] = 1;

        let mut payload = BitWriter::new();
        let mut encoder = ArithmeticEncoder::new(2);
        for &symbol in &symbols {
            encoder.encode(symbol, &mut payload);
        }
        encoder.flush(&mut payload);

        // a near-constant column should code far below one bit per symbol
        assert!(payload.bit_len() < symbols.len() / 4);
    }

    #[test]
    fn test_decoder_respects_budget() {
        let symbols = [1usize, 0, 1, 1, 0, 2];
        let mut payload = BitWriter::new();
        let mut encoder = ArithmeticEncoder::new(3);
        for &symbol in &symbols {
            encoder.encode(symbol, &mut payload);
        }
        encoder.flush(&mut payload);
        let budget = payload.bit_len();

        // trailing data after the arithmetic payload must stay untouched
        let mut stream = payload.clone();
        stream.write_nibble(321);
        let bytes = stream.into_bytes();

        let mut reader = BitReader::new(&bytes);
        let mut decoder = ArithmeticDecoder::new(3, budget, &mut reader).unwrap();
        for &symbol in &symbols {
            assert_eq!(decoder.decode(&mut reader).unwrap(), symbol);
        }
        reader.seek(budget).unwrap();
        assert_eq!(reader.read_nibble().unwrap(), 321);
    }
}
