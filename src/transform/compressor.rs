//! The compressor stage: the last forward step before a value reaches
//! storage, and the first inverse step on the way back out.

use crate::error::{MdbxError, MdbxResult};

/// Which compression codec (if any) wraps the signed bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compressor {
    /// Bytes are stored as-is.
    #[default]
    None,
    /// Google Snappy, via the `snap` crate.
    Snappy,
    /// LZ4 block format, via `lz4_flex`.
    Lz4,
}

impl Compressor {
    /// Whether this stage performs no transformation.
    pub const fn is_identity(&self) -> bool {
        matches!(self, Self::None)
    }

    pub(crate) fn compress(&self, bytes: &[u8]) -> MdbxResult<Vec<u8>> {
        match self {
            Self::None => Ok(bytes.to_vec()),
            Self::Snappy => {
                let mut encoder = snap::raw::Encoder::new();
                encoder.compress_vec(bytes).map_err(|e| MdbxError::transform("compressor", e))
            }
            Self::Lz4 => Ok(lz4_flex::block::compress_prepend_size(bytes)),
        }
    }

    pub(crate) fn decompress(&self, bytes: &[u8]) -> MdbxResult<Vec<u8>> {
        match self {
            Self::None => Ok(bytes.to_vec()),
            Self::Snappy => {
                let mut decoder = snap::raw::Decoder::new();
                decoder.decompress_vec(bytes).map_err(|e| MdbxError::transform("compressor", e))
            }
            Self::Lz4 => lz4_flex::block::decompress_size_prepended(bytes)
                .map_err(|e| MdbxError::transform("compressor", e)),
        }
    }
}
