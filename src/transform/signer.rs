//! The signer stage: appends and verifies a MAC over the serialized bytes.

use crate::error::{MdbxError, MdbxResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Whether (and how) entries are authenticated before being compressed and
/// written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Signer {
    /// No signature is appended.
    #[default]
    None,
    /// HMAC-SHA256 over the serialized bytes, appended as a fixed-width
    /// trailer and checked on the way back out.
    Hmac { key: Vec<u8> },
}

impl Signer {
    /// Whether this stage performs no transformation.
    pub const fn is_identity(&self) -> bool {
        matches!(self, Self::None)
    }

    pub(crate) fn sign(&self, mut payload: Vec<u8>) -> MdbxResult<Vec<u8>> {
        match self {
            Self::None => Ok(payload),
            Self::Hmac { key } => {
                let mut mac = HmacSha256::new_from_slice(key)
                    .map_err(|e| MdbxError::transform("signer", e))?;
                mac.update(&payload);
                let tag = mac.finalize().into_bytes();
                payload.extend_from_slice(&tag);
                Ok(payload)
            }
        }
    }

    pub(crate) fn verify<'a>(&self, bytes: &'a [u8]) -> MdbxResult<&'a [u8]> {
        match self {
            Self::None => Ok(bytes),
            Self::Hmac { key } => {
                let tag_len = <HmacSha256 as Mac>::output_size();
                if bytes.len() < tag_len {
                    return Err(MdbxError::SignatureMismatch);
                }
                let (payload, tag) = bytes.split_at(bytes.len() - tag_len);
                let mut mac = HmacSha256::new_from_slice(key)
                    .map_err(|e| MdbxError::transform("signer", e))?;
                mac.update(payload);
                mac.verify_slice(tag).map_err(|_| MdbxError::SignatureMismatch)?;
                Ok(payload)
            }
        }
    }
}
