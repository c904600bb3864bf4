//! Context Tree Weighting and binary arithmetic coding primitives.
//!
//! This crate provides a lossless compression/decompression library for arbitrary byte
//! streams. It couples an adaptive probabilistic model for binary sources (Context Tree
//! Weighting, CTW) with two interchangeable finite-precision binary arithmetic coders. It
//! is intended for research, teaching, and benchmarking against general-purpose
//! compressors.
//!
//! # A Primer on the Method
//!
//! Lossless compression with an adaptive model proceeds bit by bit. Before each bit is
//! coded, the model is asked for the probability that the bit is zero; the arithmetic
//! coder narrows its current interval proportionally to that probability, and the model
//! then observes the actual bit so that both sides of the channel evolve identically.
//! Decompression mirrors the process with a freshly initialized model: because the decoder
//! asks the model the exact same questions in the exact same order, it reconstructs the
//! original bit sequence exactly.
//!
//! The model implemented here is Context Tree Weighting \[1\]: a depth-bounded binary
//! suffix tree whose nodes maintain Krichevsky–Trofimov estimates in log space, blended
//! with uniform weights at every level. CTW is a Bayesian mixture over all tree sources up
//! to the configured depth and comes with strong theoretical guarantees on redundancy.
//!
//! Two arithmetic coder realizations are provided, both driven by the same
//! [`BinaryModel`] interface:
//! - [`coder::witten`]: the classic Witten–Neal–Cleary integer coder with follow-bit
//!   handling \[2\]; and
//! - [`coder::eidma`]: the Rissanen–Langdon variant with precomputed exp/log tables, in
//!   the precise-table form of the EIDMA report \[3\].
//!
//! # Usage
//!
//! Most users will want the byte-oriented façade in [`frame`]:
//!
//! ```
//! use contexture::frame;
//!
//! let original = b"abracadabra, abracadabra";
//! let mut compressed = Vec::new();
//! frame::compress_bytes(&mut compressed, original, 48).unwrap();
//!
//! let mut restored = Vec::new();
//! frame::decompress(&mut restored, &compressed[..], 48).unwrap();
//! assert_eq!(&restored, original);
//! ```
//!
//! Lower-level access to the model and the coders is available through [`model`],
//! [`coder`], and the bit-level sources and sinks in [`backends`].
//!
//! # References
//!
//! \[1\] F.M.J. Willems, Y.M. Shtarkov, and Tj.J. Tjalkens, "The Context-Tree Weighting
//! Method: Basic Properties", IEEE Transactions on Information Theory 41(3), 1995.
//!
//! \[2\] I.H. Witten, R.M. Neal, and J.G. Cleary, "Arithmetic Coding for Data
//! Compression", Communications of the ACM 30(6), 1987.
//!
//! \[3\] F.M.J. Willems and Tj.J. Tjalkens, "Complexity Reduction of the Context-Tree
//! Weighting Algorithm: A Study for KPN Research", Technical University of Eindhoven,
//! EIDMA Report RS.97.01.

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod backends;
pub mod coder;
pub mod frame;
pub mod model;
pub mod tree;

use core::convert::Infallible;
use core::fmt::{self, Display};
use std::error::Error;

pub use coder::DecoderFrontendError;
pub use model::{BinaryModel, Ctw, CtwReverter};

/// Error type for coding operations that can fail in the coding logic itself
/// ("frontend") or in the backend that supplies or receives bits.
///
/// Encoding into an in-memory sink and decoding from an in-memory source have
/// [`Infallible`] backend errors, in which case [`UnwrapInfallible::unwrap_infallible`]
/// extracts the frontend error without a runtime branch.
#[derive(Debug, PartialEq, Eq)]
pub enum CoderError<FrontendError, BackendError> {
    /// The coding logic itself reported an error (e.g., the decoder ran out of input
    /// bits before reconstructing the requested number of symbols).
    Frontend(FrontendError),

    /// The backend that reads or writes bits reported an error (e.g., an I/O error
    /// from a file-backed sink).
    Backend(BackendError),
}

impl<FrontendError: Display, BackendError: Display> Display
    for CoderError<FrontendError, BackendError>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frontend(err) => write!(f, "coding error: {err}"),
            Self::Backend(err) => write!(f, "backend error: {err}"),
        }
    }
}

impl<FrontendError, BackendError> Error for CoderError<FrontendError, BackendError>
where
    FrontendError: Error + 'static,
    BackendError: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Frontend(err) => Some(err),
            Self::Backend(err) => Some(err),
        }
    }
}

impl<FrontendError, BackendError> From<BackendError>
    for CoderError<FrontendError, BackendError>
{
    fn from(err: BackendError) -> Self {
        Self::Backend(err)
    }
}

impl<FrontendError> CoderError<FrontendError, Infallible> {
    /// Collapses a coder error with an infallible backend into its frontend error.
    pub fn into_frontend_error(self) -> FrontendError {
        match self {
            Self::Frontend(err) => err,
            Self::Backend(infallible) => match infallible {},
        }
    }
}

/// Extension trait that turns a `Result` whose error is [`Infallible`] (or wraps only
/// infallible backends) into its payload.
///
/// This is a statically checked alternative to `.unwrap()` for the in-memory backends:
/// the compiler proves that the error case cannot occur.
pub trait UnwrapInfallible<T> {
    /// Extracts the `Ok` value; the `Err` case is unrepresentable.
    fn unwrap_infallible(self) -> T;
}

impl<T> UnwrapInfallible<T> for Result<T, Infallible> {
    fn unwrap_infallible(self) -> T {
        match self {
            Ok(x) => x,
            Err(infallible) => match infallible {},
        }
    }
}

impl<T, FrontendError> UnwrapInfallible<Result<T, FrontendError>>
    for Result<T, CoderError<FrontendError, Infallible>>
{
    fn unwrap_infallible(self) -> Result<T, FrontendError> {
        self.map_err(CoderError::into_frontend_error)
    }
}
