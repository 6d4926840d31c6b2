//! The serializer stage: object <-> bytes.

use crate::error::{MdbxError, MdbxResult};
use serde::{Serialize, de::DeserializeOwned};
use std::any::{Any, TypeId};

/// How a typed value is turned into bytes before signing/compressing, and
/// back again on the way out.
///
/// `None` is the passthrough stage: the caller's value must already *be*
/// `Vec<u8>` (checked via [`Any`] at the call site, mirroring the original
/// implementation's runtime `TypeError` on a non-bytes value rather than a
/// compile-time bound that would rule out every other serializer for the
/// same generic container type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Serializer {
    /// The value is already raw bytes; serialization is the identity.
    #[default]
    None,
    /// Opaque in-process encoding via `bincode` (this crate's analogue of
    /// the original implementation's `Pickle` stage).
    Bincode,
    /// `MessagePack` via `rmp-serde`.
    MessagePack,
    /// JSON text, then UTF-8 bytes.
    Json,
}

impl Serializer {
    /// Whether this stage performs no transformation.
    pub const fn is_identity(&self) -> bool {
        matches!(self, Self::None)
    }

    pub(crate) fn encode<T: Serialize + 'static>(&self, value: &T) -> MdbxResult<Vec<u8>> {
        match self {
            Self::None => {
                (value as &dyn Any).downcast_ref::<Vec<u8>>().cloned().ok_or(
                    MdbxError::Unsupported(
                        "None serializer requires a Vec<u8> value",
                    ),
                )
            }
            Self::Bincode => {
                bincode::serialize(value).map_err(|e| MdbxError::transform("serializer", e))
            }
            Self::MessagePack => {
                rmp_serde::to_vec(value).map_err(|e| MdbxError::transform("serializer", e))
            }
            Self::Json => {
                serde_json::to_vec(value).map_err(|e| MdbxError::transform("serializer", e))
            }
        }
    }

    pub(crate) fn decode<T: DeserializeOwned + 'static>(&self, bytes: &[u8]) -> MdbxResult<T> {
        match self {
            Self::None => {
                if TypeId::of::<T>() != TypeId::of::<Vec<u8>>() {
                    return Err(MdbxError::Unsupported(
                        "None serializer requires a Vec<u8> value",
                    ));
                }
                let boxed: Box<dyn Any> = Box::new(bytes.to_vec());
                Ok(*boxed.downcast::<T>().expect("TypeId checked above"))
            }
            Self::Bincode => {
                bincode::deserialize(bytes).map_err(|e| MdbxError::transform("serializer", e))
            }
            Self::MessagePack => {
                rmp_serde::from_slice(bytes).map_err(|e| MdbxError::transform("serializer", e))
            }
            Self::Json => {
                serde_json::from_slice(bytes).map_err(|e| MdbxError::transform("serializer", e))
            }
        }
    }
}
