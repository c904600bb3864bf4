//! The Rissanen–Langdon arithmetic coder, precise-table form.
//!
//! Implements the binary arithmetic coder described in section 6.4 of F.M.J. Willems
//! and Tj.J. Tjalkens, "Complexity Reduction of the Context-Tree Weighting Algorithm:
//! A Study for KPN Research" (EIDMA Report RS.97.01). The coder works on an
//! `F + 1`-digit fixed-point accumulator and translates probabilities into the integer
//! domain through two precomputed exp/log tables. Carries out of the accumulator
//! propagate into a 64-bit *delay register* that holds bits whose final value is not
//! yet settled.
//!
//! The algorithm is stated for the majority-probability symbol, so the model's output
//! is relabeled whenever the probability of a zero is at most one half: internally the
//! more likely symbol plays the role of "zero". The decoder applies the inverse
//! relabeling before reporting a bit.

use std::sync::OnceLock;

use crate::backends::{BitRead, BitWrite};
use crate::coder::{DecodeError, DecoderFrontendError};
use crate::model::BinaryModel;
use crate::CoderError;

/// Fixed-point precision of the probability domain, in bits.
///
/// Cannot be raised carelessly: the exp tables are computed in `f64` and a larger `F`
/// needs more floating-point precision than building them would have. The table
/// constructor asserts the known-good boundary condition `A[1] == 2^F - 1`.
const F: u32 = 20;

/// `2^F`, the fixed-point representation of one.
const POW2_F: u64 = 1 << F;

/// Width of the delay register in bits.
const DELAY_BITS: u32 = 64;

/// Top bit of the delay register.
const DELAY_TOP: u64 = 1 << (DELAY_BITS - 1);

/// The exp/log tables of the EIDMA report, section 6.4.
///
/// `a[i] = round(2^F * 2^(-i / 2^F))` for `i` in `1..=2^F`, and `b` is its inverse,
/// `b[j] = round(-2^F * log2(j / 2^F))`, extended below `2^(F-1)` through the identity
/// `b[j] = b[2^k * j] + k * 2^F`.
#[derive(Debug)]
struct ExpTables {
    a: Vec<u64>,
    b: Vec<u64>,
}

impl ExpTables {
    fn new() -> Self {
        let pow2f = POW2_F as f64;

        let mut a = vec![0u64; POW2_F as usize + 1];
        for (i, entry) in a.iter_mut().enumerate().skip(1) {
            *entry = (pow2f * (-(i as f64) / pow2f).exp2() + 0.5) as u64;
        }
        assert_eq!(a[1], POW2_F - 1, "insufficient float precision for F");

        let mut b = vec![0u64; POW2_F as usize];
        for j in (POW2_F / 2) as usize..POW2_F as usize {
            b[j] = (-pow2f * (j as f64 / pow2f).log2() + 0.5) as u64;
        }
        for j in 1..(POW2_F / 2) as usize {
            let k = (f64::from(F) - 1.0 - (j as f64).log2()).ceil();
            let b2kj = b[k.exp2() as usize * j];
            debug_assert_ne!(b2kj, 0);
            b[j] = b2kj + (k * pow2f) as u64;
        }

        Self { a, b }
    }
}

/// The tables depend only on `F`; build them once per process and share.
fn exp_tables() -> &'static ExpTables {
    static TABLES: OnceLock<ExpTables> = OnceLock::new();
    TABLES.get_or_init(ExpTables::new)
}

/// The integer code length of the majority symbol: `max(3, round(2^F * log2(1/p)))`,
/// where `p` is the larger of the two symbol probabilities.
fn v0_step(p: f64) -> u64 {
    let rounded = (POW2_F as f64 * (1.0 / p).log2() + 0.5) as u64;
    rounded.max(3)
}

/// Encoder state machine.
#[derive(Debug)]
pub struct Encoder<M, W>
where
    M: BinaryModel,
    W: BitWrite,
{
    model: M,
    sink: W,
    tables: &'static ExpTables,
    dlreg: u64,
    /// Invariant: `accum < 2^(F + 1)`.
    accum: u64,
    v: u64,
}

impl<M, W> Encoder<M, W>
where
    M: BinaryModel,
    W: BitWrite,
{
    /// Creates an encoder writing to `sink`.
    ///
    /// The first coder constructed in a process builds the shared exp tables
    /// (`2 * 2^F` words); later constructions are cheap.
    pub fn new(model: M, sink: W) -> Self {
        Self {
            model,
            sink,
            tables: exp_tables(),
            dlreg: 0,
            accum: 0,
            v: 1,
        }
    }

    /// Codes one bit and lets the model observe it.
    pub fn encode_bit(&mut self, bit: bool) -> Result<(), W::WriteError> {
        debug_assert!(self.accum < 2 * POW2_F);
        let prob0 = self.model.prob0();
        self.model.observe(bit);

        let (p, relabeled) = if prob0 > 0.5 {
            (prob0, bit)
        } else {
            (1.0 - prob0, !bit)
        };
        let v0_step = v0_step(p);

        // Scaling and pushing.
        while self.v > POW2_F {
            if self.dlreg >= DELAY_TOP {
                self.sink.write_bit(true)?;
                self.dlreg = 2 * (self.dlreg - DELAY_TOP);
            } else {
                self.sink.write_bit(false)?;
                self.dlreg *= 2;
            }
            self.shift_accum_into_delay();
            self.v -= POW2_F;
        }

        // An all-ones delay register could not absorb a carry; emit leading ones
        // until a zero enters from the accumulator side.
        while self.dlreg == u64::MAX {
            self.sink.write_bit(true)?;
            self.dlreg = 2 * (self.dlreg - DELAY_TOP);
            self.shift_accum_into_delay();
        }

        let v0 = self.v + v0_step;
        if relabeled {
            if v0 <= POW2_F {
                self.accum += 2 * self.tables.a[v0 as usize];
                self.carry();
                self.v = self.tables.b[(self.tables.a[self.v as usize]
                    - self.tables.a[v0 as usize]) as usize];
            } else {
                self.accum += self.tables.a[(v0 - POW2_F) as usize];
                self.carry();
                self.v = self.tables.b[(2 * self.tables.a[self.v as usize]
                    - self.tables.a[(v0 - POW2_F) as usize])
                    as usize]
                    + POW2_F;
            }
        } else {
            self.v = v0;
        }

        Ok(())
    }

    fn shift_accum_into_delay(&mut self) {
        if self.accum >= POW2_F {
            self.dlreg += 1;
            self.accum = 2 * (self.accum - POW2_F);
        } else {
            self.accum *= 2;
        }
    }

    fn carry(&mut self) {
        if self.accum >= 2 * POW2_F {
            self.dlreg += 1;
            self.accum -= 2 * POW2_F;
        }
    }

    /// Flushes the delay register and the accumulator (`DELAY_BITS + F + 1` tail
    /// bits) and returns the sink.
    pub fn finish(mut self) -> Result<W, W::WriteError> {
        for _ in 0..DELAY_BITS {
            if self.dlreg < DELAY_TOP {
                self.sink.write_bit(false)?;
                self.dlreg *= 2;
            } else {
                self.sink.write_bit(true)?;
                self.dlreg = (self.dlreg - DELAY_TOP) * 2;
            }
        }
        for _ in 0..F + 1 {
            if self.accum < POW2_F {
                self.sink.write_bit(false)?;
                self.accum *= 2;
            } else {
                self.sink.write_bit(true)?;
                self.accum = (self.accum - POW2_F) * 2;
            }
        }
        Ok(self.sink)
    }
}

/// Decoder state machine.
///
/// Replays the encoder's register arithmetic while tracking the *coded* delay
/// register and accumulator filled from the compressed stream; a decoded symbol is
/// recovered by comparing the two register pairs lexicographically. Unlike the
/// [Witten–Neal–Cleary decoder](crate::coder::witten::Decoder) there is no garbage
/// allowance: the `DELAY_BITS + F + 1` termination bits always keep a well-formed
/// stream ahead of the demand, so running dry means the input was truncated.
#[derive(Debug)]
pub struct Decoder<M, R>
where
    M: BinaryModel,
    R: BitRead,
{
    model: M,
    source: R,
    tables: &'static ExpTables,
    dlreg: u64,
    accum: u64,
    v: u64,
    cdlreg: u64,
    caccum: u64,
}

impl<M, R> Decoder<M, R>
where
    M: BinaryModel,
    R: BitRead,
{
    /// Creates a decoder and fills the coded registers with the first
    /// `DELAY_BITS + F + 1` bits of `source`.
    pub fn new(model: M, source: R) -> Result<Self, DecodeError<R::ReadError>> {
        let mut decoder = Self {
            model,
            source,
            tables: exp_tables(),
            dlreg: 0,
            accum: 0,
            v: 1,
            cdlreg: 0,
            caccum: 0,
        };
        for _ in 0..DELAY_BITS {
            let pulled = decoder.pull()?;
            decoder.cdlreg = 2 * decoder.cdlreg + pulled;
        }
        for _ in 0..F + 1 {
            let pulled = decoder.pull()?;
            decoder.caccum = 2 * decoder.caccum + pulled;
        }
        Ok(decoder)
    }

    fn pull(&mut self) -> Result<u64, DecodeError<R::ReadError>> {
        match self.source.read_bit()? {
            Some(bit) => Ok(bit as u64),
            None => Err(CoderError::Frontend(DecoderFrontendError::InsufficientBits)),
        }
    }

    fn shift_registers(&mut self) -> Result<(), DecodeError<R::ReadError>> {
        if self.accum >= POW2_F {
            self.dlreg += 1;
            self.accum = 2 * (self.accum - POW2_F);
        } else {
            self.accum *= 2;
        }

        if self.cdlreg >= DELAY_TOP {
            self.cdlreg = 2 * (self.cdlreg - DELAY_TOP);
        } else {
            self.cdlreg *= 2;
        }
        let pulled = self.pull()?;
        if self.caccum >= POW2_F {
            self.cdlreg += 1;
            self.caccum = 2 * (self.caccum - POW2_F) + pulled;
        } else {
            self.caccum = 2 * self.caccum + pulled;
        }
        Ok(())
    }

    /// Decodes one bit and lets the model observe it.
    pub fn decode_bit(&mut self) -> Result<bool, DecodeError<R::ReadError>> {
        debug_assert!(self.accum < 2 * POW2_F && self.caccum < 2 * POW2_F);
        let prob0 = self.model.prob0();
        let p = if prob0 > 0.5 { prob0 } else { 1.0 - prob0 };
        let v0_step = v0_step(p);

        // Scaling and pulling.
        while self.v > POW2_F {
            if self.dlreg >= DELAY_TOP {
                self.dlreg = 2 * (self.dlreg - DELAY_TOP);
            } else {
                self.dlreg *= 2;
            }
            self.v -= POW2_F;
            self.shift_registers()?;
        }

        // Creating zeros in the delay register, mirroring the encoder.
        while self.dlreg == u64::MAX {
            self.dlreg = 2 * (self.dlreg - DELAY_TOP);
            self.shift_registers()?;
        }

        // Tentatively add the code length of a minority symbol; whether the coded
        // registers lie above or below the result decides the symbol.
        let v0 = self.v + v0_step;
        let relabeled;
        if v0 <= POW2_F {
            let mut taccum = self.accum + 2 * self.tables.a[v0 as usize];
            let mut tdlreg = self.dlreg;
            if taccum >= 2 * POW2_F {
                tdlreg += 1;
                taccum -= 2 * POW2_F;
            }
            relabeled =
                !((self.cdlreg == tdlreg && self.caccum < taccum) || self.cdlreg < tdlreg);
            if relabeled {
                self.accum = taccum;
                self.dlreg = tdlreg;
                self.v = self.tables.b[(self.tables.a[self.v as usize]
                    - self.tables.a[v0 as usize]) as usize];
            } else {
                self.v = v0;
            }
        } else {
            let mut taccum = self.accum + self.tables.a[(v0 - POW2_F) as usize];
            let mut tdlreg = self.dlreg;
            if taccum >= 2 * POW2_F {
                tdlreg += 1;
                taccum -= 2 * POW2_F;
            }
            relabeled =
                !((self.cdlreg == tdlreg && self.caccum < taccum) || self.cdlreg < tdlreg);
            if relabeled {
                self.accum = taccum;
                self.dlreg = tdlreg;
                self.v = self.tables.b[(2 * self.tables.a[self.v as usize]
                    - self.tables.a[(v0 - POW2_F) as usize])
                    as usize]
                    + POW2_F;
            } else {
                self.v = v0;
            }
        }

        // Undo the majority-symbol relabeling.
        let bit = if prob0 <= 0.5 { !relabeled } else { relabeled };
        self.model.observe(bit);
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

    #[test]
    fn exp_tables_are_mutually_consistent() {
        let tables = ExpTables::new();
        assert_eq!(tables.a[1], POW2_F - 1);
        assert_eq!(tables.a[POW2_F as usize], POW2_F / 2);
        // b inverts a up to rounding across the upper half of the domain.
        for i in (1..=POW2_F as usize).step_by(4099) {
            let j = tables.a[i];
            if j >= POW2_F / 2 {
                let back = tables.b[j as usize];
                assert!((back as i64 - i as i64).unsigned_abs() <= 2, "i={i} back={back}");
            }
        }
    }

    #[test]
    fn round_trip_random_bits() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(97);
        let bits: Vec<bool> = (0..1000).map(|_| rng.next_u32() & 1 == 1).collect();

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
    fn round_trip_crosses_the_relabeling_boundary() {
        // Alternating runs push prob0 to both sides of one half.
        let bits: Vec<bool> = (0..2048).map(|i| (i / 64) % 2 == 1).collect();

        let encoded = encode(Vec::new(), bits.iter().copied(), Ctw::new(&[false; 8]))
            .unwrap_infallible();
        let decoded = decode(
            Cursor::new(&encoded[..]),
            Ctw::new(&[false; 8]),
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
        // Termination flushes both registers in full.
        assert_eq!(encoded.len(), (DELAY_BITS + F + 1) as usize);

        let decoded = decode(Cursor::new(&encoded[..]), Ctw::new(&[false; 8]), 0)
            .unwrap_infallible()
            .unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn truncated_input_starves() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(11);
        let bits: Vec<bool> = (0..600).map(|_| rng.next_u32() & 1 == 1).collect();
        let encoded = encode(Vec::new(), bits.iter().copied(), Ctw::new(&[false; 8]))
            .unwrap_infallible();

        let truncated = &encoded[..40];
        let result = decode(
            Cursor::new(truncated),
            Ctw::new(&[false; 8]),
            bits.len() as u64,
        )
        .unwrap_infallible();

        assert_eq!(result, Err(DecoderFrontendError::InsufficientBits));
    }
}
