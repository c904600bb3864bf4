//! The Witten–Neal–Cleary arithmetic coder.
//!
//! Implements the integer coder of Witten, Neal, and Cleary, "Arithmetic Coding for
//! Data Compression" (CACM 30(6), 1987), specialized to a binary alphabet and driven
//! by an adaptive [`BinaryModel`]. The coder maintains a pair of interval bounds of
//! 32-bit width. After every coded bit the interval is rescaled: leading bits that the
//! bounds agree on are emitted, and near-half intervals are expanded while counting
//! the *follow bits* whose value the next unambiguous bit determines.

use crate::backends::{BitRead, BitWrite};
use crate::coder::{DecodeError, DecoderFrontendError};
use crate::model::BinaryModel;
use crate::CoderError;

const CODE_VALUE_BITS: u32 = 32;
const TOP_VALUE: u64 = (1 << CODE_VALUE_BITS) - 1;
const FIRST_QTR: u64 = TOP_VALUE / 4 + 1;
const HALF: u64 = 2 * FIRST_QTR;
const THIRD_QTR: u64 = 3 * FIRST_QTR;

/// Maps the model probability onto the integer code scale.
///
/// The result is below `2^32`, and the interval range never exceeds `2^32`, so the
/// `range * scaled` product in the narrowing step fits a `u64` and cannot overflow.
fn scaled_prob0(prob0: f64) -> u64 {
    (prob0 * TOP_VALUE as f64) as u64
}

/// Encoder state machine.
///
/// Feed bits with [`encode_bit`](Self::encode_bit) and seal the stream with
/// [`finish`](Self::finish); the termination bits it emits are what lets the decoder
/// resolve the final interval.
#[derive(Debug)]
pub struct Encoder<M, W>
where
    M: BinaryModel,
    W: BitWrite,
{
    model: M,
    sink: W,
    low: u64,
    high: u64,
    /// Opposite-valued bits owed to the next emitted bit.
    fbits: u64,
}

impl<M, W> Encoder<M, W>
where
    M: BinaryModel,
    W: BitWrite,
{
    /// Creates an encoder writing to `sink`, with the interval covering the full code
    /// range.
    pub fn new(model: M, sink: W) -> Self {
        Self {
            model,
            sink,
            low: 0,
            high: TOP_VALUE,
            fbits: 0,
        }
    }

    fn bit_plus_follow(&mut self, bit: bool) -> Result<(), W::WriteError> {
        self.sink.write_bit(bit)?;
        while self.fbits > 0 {
            self.sink.write_bit(!bit)?;
            self.fbits -= 1;
        }
        Ok(())
    }

    /// Codes one bit and lets the model observe it.
    pub fn encode_bit(&mut self, bit: bool) -> Result<(), W::WriteError> {
        let prob0 = self.model.prob0();
        self.model.observe(bit);

        let range = self.high - self.low + 1;
        let split = self.low + range * scaled_prob0(prob0) / TOP_VALUE;

        if bit {
            self.low = split;
        } else {
            self.high = split - 1;
        }
        debug_assert!(self.low <= self.high);
        debug_assert!(self.high <= TOP_VALUE);

        loop {
            if self.high < HALF {
                self.bit_plus_follow(false)?;
            } else if self.low >= HALF {
                self.bit_plus_follow(true)?;
                self.low -= HALF;
                self.high -= HALF;
            } else if self.low >= FIRST_QTR && self.high < THIRD_QTR {
                self.fbits += 1;
                self.low -= FIRST_QTR;
                self.high -= FIRST_QTR;
            } else {
                break;
            }
            self.low *= 2;
            self.high = 2 * self.high + 1;
        }

        Ok(())
    }

    /// Emits the termination bits that pin the final interval and returns the sink.
    pub fn finish(mut self) -> Result<W, W::WriteError> {
        self.fbits += 1;
        if self.low < FIRST_QTR {
            self.bit_plus_follow(false)?;
        } else {
            self.bit_plus_follow(true)?;
        }
        Ok(self.sink)
    }
}

/// Decoder state machine.
///
/// Mirrors the encoder's interval arithmetic and additionally tracks the `value`
/// register holding the upcoming window of the compressed stream. Once the source is
/// exhausted, up to `CODE_VALUE_BITS - 2` missing bits are substituted with ones
/// (they only ever pad the tail of the final interval); any further demand means the
/// input was truncated and decoding fails with
/// [`DecoderFrontendError::InsufficientBits`].
#[derive(Debug)]
pub struct Decoder<M, R>
where
    M: BinaryModel,
    R: BitRead,
{
    model: M,
    source: R,
    low: u64,
    high: u64,
    value: u64,
    garbage_bits: u32,
}

impl<M, R> Decoder<M, R>
where
    M: BinaryModel,
    R: BitRead,
{
    /// Creates a decoder and fills the `value` register with the first
    /// `CODE_VALUE_BITS` bits of `source`.
    pub fn new(model: M, source: R) -> Result<Self, DecodeError<R::ReadError>> {
        let mut decoder = Self {
            model,
            source,
            low: 0,
            high: TOP_VALUE,
            value: 0,
            garbage_bits: 0,
        };
        for _ in 0..CODE_VALUE_BITS {
            let bit = decoder.read_coded_bit()?;
            decoder.value = 2 * decoder.value + bit as u64;
        }
        Ok(decoder)
    }

    fn read_coded_bit(&mut self) -> Result<bool, DecodeError<R::ReadError>> {
        match self.source.read_bit()? {
            Some(bit) => Ok(bit),
            None => {
                self.garbage_bits += 1;
                if self.garbage_bits > CODE_VALUE_BITS - 2 {
                    Err(CoderError::Frontend(DecoderFrontendError::InsufficientBits))
                } else {
                    // Past the end of the payload any bit value works; the encoder's
                    // termination already determined the decoded output.
                    Ok(true)
                }
            }
        }
    }

    /// Decodes one bit and lets the model observe it.
    pub fn decode_bit(&mut self) -> Result<bool, DecodeError<R::ReadError>> {
        let prob0 = self.model.prob0();

        let range = self.high - self.low + 1;
        let split = self.low + range * scaled_prob0(prob0) / TOP_VALUE;

        let bit = self.value >= split;
        self.model.observe(bit);

        if bit {
            self.low = split;
        } else {
            self.high = split - 1;
        }
        debug_assert!(self.low <= self.value && self.value <= self.high);

        loop {
            if self.high < HALF {
                // Interval already in the lower half; only the doubling below is due.
            } else if self.low >= HALF {
                self.value -= HALF;
                self.low -= HALF;
                self.high -= HALF;
            } else if self.low >= FIRST_QTR && self.high < THIRD_QTR {
                self.value -= FIRST_QTR;
                self.low -= FIRST_QTR;
                self.high -= FIRST_QTR;
            } else {
                break;
            }
            self.low *= 2;
            self.high = 2 * self.high + 1;
            let incoming = self.read_coded_bit()?;
            self.value = 2 * self.value + incoming as u64;
        }

        Ok(bit)
    }
}

/// Encodes all bits of `source` and returns the sealed sink.
pub fn encode<M, I, W>(sink: W, source: I, model: M) -> Result<W, W::WriteError>
where
    M: BinaryModel,
    I: IntoIterator<Item = bool>,
    W: BitWrite,
{
    let mut encoder = Encoder::new(model, sink);
    for bit in source {
        encoder.encode_bit(bit)?;
    }
    encoder.finish()
}

/// Decodes `original_size` bits from `source`.
///
/// `model` must be in exactly the state the encoder's model was in when encoding
/// started.
pub fn decode<M, R>(
    source: R,
    model: M,
    original_size: u64,
) -> Result<Vec<bool>, DecodeError<R::ReadError>>
where
    M: BinaryModel,
    R: BitRead,
{
    let mut decoder = Decoder::new(model, source)?;
    let mut decoded = Vec::with_capacity(original_size as usize);
    for _ in 0..original_size {
        decoded.push(decoder.decode_bit()?);
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use rand_xoshiro::rand_core::{RngCore, SeedableRng};
    use rand_xoshiro::Xoshiro256StarStar;

    use super::*;
    use crate::backends::Cursor;
    use crate::model::Ctw;
    use crate::UnwrapInfallible;

    fn random_bits(amt: usize, seed: u64) -> Vec<bool> {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        (0..amt).map(|_| rng.next_u32() & 1 == 1).collect()
    }

    #[test]
    fn round_trip_random_bits() {
        let bits = random_bits(1000, 20210531);

        let encoded = encode(Vec::new(), bits.iter().copied(), Ctw::new(&[false; 16]))
            .unwrap_infallible();
        let decoded = decode(
            Cursor::new(&encoded[..]),
            Ctw::new(&[false; 16]),
            bits.len() as u64,
        )
        .unwrap_infallible()
        .unwrap();

        assert_eq!(decoded, bits);
    }

    #[test]
    fn round_trip_skewed_bits() {
        // Mostly zeros; the model should learn the bias and the output shrink.
        let bits: Vec<bool> = (0..4096).map(|i| i % 37 == 0).collect();

        let encoded = encode(Vec::new(), bits.iter().copied(), Ctw::new(&[false; 24]))
            .unwrap_infallible();
        assert!(encoded.len() < bits.len() / 2);

        let decoded = decode(
            Cursor::new(&encoded[..]),
            Ctw::new(&[false; 24]),
            bits.len() as u64,
        )
        .unwrap_infallible()
        .unwrap();

        assert_eq!(decoded, bits);
    }

    #[test]
    fn empty_sequence_round_trips() {
        let encoded =
            encode(Vec::new(), core::iter::empty(), Ctw::new(&[false; 8])).unwrap_infallible();
        // Termination always emits at least the disambiguating bit pair.
        assert!(!encoded.is_empty());

        let decoded = decode(Cursor::new(&encoded[..]), Ctw::new(&[false; 8]), 0)
            .unwrap_infallible()
            .unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn truncated_input_starves() {
        let bits = random_bits(800, 7);
        let encoded = encode(Vec::new(), bits.iter().copied(), Ctw::new(&[false; 8]))
            .unwrap_infallible();

        let truncated = &encoded[..32];
        let result = decode(
            Cursor::new(truncated),
            Ctw::new(&[false; 8]),
            bits.len() as u64,
        )
        .unwrap_infallible();

        assert_eq!(result, Err(DecoderFrontendError::InsufficientBits));
    }
}
