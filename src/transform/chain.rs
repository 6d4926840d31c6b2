//! Transform Chain: the ordered (serializer, signer, compressor) triple
//! applied to a container's keys or values.

use super::{Compressor, Serializer, Signer};
use crate::error::MdbxResult;
use serde::{Serialize, de::DeserializeOwned};

/// A composable forward/inverse pipeline: serialize, then sign, then
/// compress on the way in; decompress, verify, then deserialize on the way
/// out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransformChain {
    serializer: Serializer,
    signer: Signer,
    compressor: Compressor,
}

impl TransformChain {
    /// Builds a chain from its three stages.
    pub const fn new(serializer: Serializer, signer: Signer, compressor: Compressor) -> Self {
        Self { serializer, signer, compressor }
    }

    /// A chain whose every stage is the identity — the default.
    pub const fn identity() -> Self {
        Self::new(Serializer::None, Signer::None, Compressor::None)
    }

    /// True when every stage is the identity, in which case `forward`/
    /// `inverse` on a `Vec<u8>` value never allocates beyond the input copy.
    pub const fn is_identity(&self) -> bool {
        self.serializer.is_identity() && self.signer.is_identity() && self.compressor.is_identity()
    }

    /// True when the serializer and signer stages are both the identity,
    /// irrespective of the compressor. This is the narrower test spec.md
    /// §4.6's empty-key rule uses: a key chain with only a non-identity
    /// compressor still "is identity" for key-emptiness purposes, since the
    /// underlying bytes handed to `put`/`get` are unchanged until they reach
    /// the compression stage.
    pub const fn is_identity_for_keys(&self) -> bool {
        self.serializer.is_identity() && self.signer.is_identity()
    }

    /// Runs a value through serialize -> sign -> compress.
    pub fn forward<T: Serialize + 'static>(&self, value: &T) -> MdbxResult<Vec<u8>> {
        let bytes = self.serializer.encode(value)?;
        let bytes = self.signer.sign(bytes)?;
        self.compressor.compress(&bytes)
    }

    /// Runs stored bytes back through decompress -> verify -> deserialize.
    pub fn inverse<T: DeserializeOwned + 'static>(&self, bytes: &[u8]) -> MdbxResult<T> {
        let bytes = self.compressor.decompress(bytes)?;
        let payload = self.signer.verify(&bytes)?;
        self.serializer.decode(payload)
    }
}
