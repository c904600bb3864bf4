//! Binary arithmetic coders driven by a [`BinaryModel`](crate::model::BinaryModel).
//!
//! Two interchangeable realizations are provided:
//!
//! - [`witten`]: the Witten–Neal–Cleary integer coder. A pair of 32-bit interval
//!   bounds is rescaled after every coded bit; bits whose value depends on a not yet
//!   resolved interval decision are held back in a pending-follow-bit counter.
//! - [`eidma`]: the Rissanen–Langdon coder in the precise-table form of the EIDMA
//!   report, with a 64-bit delay register and precomputed exp/log tables that
//!   translate probabilities into the integer domain.
//!
//! Both coders produce different bitstreams but identical round-trip behavior: any
//! sequence of bits encoded with one of them decodes exactly with the matching decoder
//! and an identically initialized model. Bitstreams are **not** portable between the
//! two realizations.
//!
//! Encoding can only fail in the bit sink. Decoding can additionally starve: the
//! compressed input may end before the requested number of bits has been
//! reconstructed, which surfaces as
//! [`DecoderFrontendError::InsufficientBits`] wrapped in a
//! [`CoderError`](crate::CoderError). A model mismatch between encoder and decoder is
//! a silent correctness failure by design; it cannot be detected from the bitstream.

pub mod eidma;
pub mod witten;

use core::fmt::{self, Display};
use std::error::Error;

use crate::CoderError;

/// Errors reported by the decoding logic itself, as opposed to its bit source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecoderFrontendError {
    /// The compressed input ended before the requested number of bits was decoded.
    ///
    /// Typically caused by a truncated artifact or by an `original_size` larger than
    /// what the artifact encodes. Recoverable in the sense that the decoder state is
    /// simply abandoned; everything decoded before the error is valid output.
    InsufficientBits,
}

impl Display for DecoderFrontendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientBits => {
                write!(f, "insufficient bits in the compressed input")
            }
        }
    }
}

impl Error for DecoderFrontendError {}

/// Error type of the decoders: starvation in the frontend or failure in the bit
/// source.
pub type DecodeError<ReadError> = CoderError<DecoderFrontendError, ReadError>;
