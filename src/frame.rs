//! Byte-oriented compression façade.
//!
//! Frames arbitrary byte payloads for the bit-sequential machinery underneath: the
//! compressed artifact starts with the original payload length *in bits* as a
//! little-endian `u64`, followed by the arithmetic coder's output bits packed
//! LSB-first into bytes, with the final byte zero-padded on the high side.
//!
//! Compression and decompression construct identical [`Ctw`] models (all-zeros prior
//! context of the configured depth) and drive the [Witten–Neal–Cleary
//! coder](crate::coder::witten) with them. Since the model adapts deterministically,
//! no model state is stored in the artifact.

use std::fmt::{self, Display};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::backends::{BitWrite, PackedBitReader, PackedBitWriter};
use crate::coder::witten;
use crate::coder::DecoderFrontendError;
use crate::model::Ctw;
use crate::CoderError;

/// Errors of the byte-oriented façade.
#[derive(Debug)]
#[non_exhaustive]
pub enum CodecError {
    /// The 8-byte length header could not be read.
    Header(io::Error),

    /// An I/O operation failed; `context` names which one.
    Io {
        /// What the façade was doing when the error occurred.
        context: &'static str,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The compressed payload ended before the number of bits declared in the header
    /// was decoded. The artifact is truncated (or the header is wrong).
    InsufficientBits,
}

impl Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header(err) => write!(f, "reading the length header failed: {err}"),
            Self::Io { context, source } => write!(f, "{context} failed: {source}"),
            Self::InsufficientBits => write!(
                f,
                "compressed input ended before the declared number of bits was decoded"
            ),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Header(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::InsufficientBits => None,
        }
    }
}

fn io_error(context: &'static str) -> impl FnOnce(io::Error) -> CodecError {
    move |source| CodecError::Io { context, source }
}

fn decode_error(err: CoderError<DecoderFrontendError, io::Error>) -> CodecError {
    match err {
        CoderError::Frontend(DecoderFrontendError::InsufficientBits) => {
            CodecError::InsufficientBits
        }
        CoderError::Backend(source) => CodecError::Io {
            context: "reading the compressed payload",
            source,
        },
    }
}

/// Compresses the file at `path` into `sink`.
///
/// # Panics
///
/// Panics if `depth` is zero.
pub fn compress<W: Write>(
    sink: W,
    path: impl AsRef<Path>,
    depth: usize,
) -> Result<(), CodecError> {
    let data = fs::read(path).map_err(io_error("reading the input file"))?;
    compress_bytes(sink, &data, depth)
}

/// Compresses an in-memory payload into `sink`.
///
/// # Panics
///
/// Panics if `depth` is zero.
pub fn compress_bytes<W: Write>(mut sink: W, data: &[u8], depth: usize) -> Result<(), CodecError> {
    let num_bits = data.len() as u64 * 8;
    sink.write_u64::<LittleEndian>(num_bits)
        .map_err(io_error("writing the length header"))?;

    let model = Ctw::new(&vec![false; depth]);
    let mut encoder = witten::Encoder::new(model, PackedBitWriter::new(sink));
    for &byte in data {
        for i in 0..8 {
            encoder
                .encode_bit(byte & (1 << i) != 0)
                .map_err(io_error("writing the compressed payload"))?;
        }
    }
    let writer = encoder
        .finish()
        .map_err(io_error("writing the compressed payload"))?;
    writer
        .finish()
        .map_err(io_error("writing the compressed payload"))?;

    debug!(bytes = data.len(), depth, "compressed");
    Ok(())
}

/// Decompresses `source` into `sink`.
///
/// `depth` must equal the depth the artifact was compressed with; a mismatch is not
/// detectable and produces garbage output.
///
/// # Panics
///
/// Panics if `depth` is zero.
pub fn decompress<W: Write, R: Read>(
    mut sink: W,
    mut source: R,
    depth: usize,
) -> Result<(), CodecError> {
    let num_bits = source
        .read_u64::<LittleEndian>()
        .map_err(CodecError::Header)?;

    let model = Ctw::new(&vec![false; depth]);
    let mut decoder =
        witten::Decoder::new(model, PackedBitReader::new(source)).map_err(decode_error)?;

    let mut writer = PackedBitWriter::new(&mut sink);
    for _ in 0..num_bits {
        let bit = decoder.decode_bit().map_err(decode_error)?;
        writer
            .write_bit(bit)
            .map_err(io_error("writing the decompressed output"))?;
    }
    writer
        .finish()
        .map_err(io_error("writing the decompressed output"))?;

    debug!(bits = num_bits, depth, "decompressed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_small_payload() {
        let original = b"the quick brown fox jumps over the lazy dog";
        let mut compressed = Vec::new();
        compress_bytes(&mut compressed, original, 24).unwrap();

        let mut restored = Vec::new();
        decompress(&mut restored, &compressed[..], 24).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn header_is_little_endian_bit_count() {
        let mut compressed = Vec::new();
        compress_bytes(&mut compressed, b"abc", 8).unwrap();
        let declared = u64::from_le_bytes(compressed[..8].try_into().unwrap());
        assert_eq!(declared, 24);
    }

    #[test]
    fn empty_payload_is_header_plus_termination() {
        let mut compressed = Vec::new();
        compress_bytes(&mut compressed, b"", 48).unwrap();
        // 8 header bytes plus the coder's termination bits in a single packed byte.
        assert_eq!(compressed.len(), 9);
        assert_eq!(&compressed[..8], &[0; 8]);

        let mut restored = Vec::new();
        decompress(&mut restored, &compressed[..], 48).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn depth_mismatch_still_terminates() {
        // Wrong depth produces wrong output of the declared length, not a hang.
        let original = b"mismatched depths";
        let mut compressed = Vec::new();
        compress_bytes(&mut compressed, original, 8).unwrap();

        let mut restored = Vec::new();
        match decompress(&mut restored, &compressed[..], 16) {
            Ok(()) => assert_eq!(restored.len(), original.len()),
            Err(CodecError::InsufficientBits) => {}
            Err(err) => panic!("unexpected error: {err}"),
        }
    }

    #[test]
    fn truncated_header_errors() {
        let result = decompress(Vec::new(), &[0u8, 1, 2][..], 8);
        assert!(matches!(result, Err(CodecError::Header(_))));
    }
}
