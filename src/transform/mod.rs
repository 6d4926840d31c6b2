//! Transform Chain: the (serializer, signer, compressor) pipeline that sits
//! between a container's typed API and the raw bytes MDBX stores.
//!
//! Each stage is independently selectable and composes with `forward`/
//! `inverse` being exact inverses of each other. An all-identity chain
//! (the default) costs nothing beyond a `Vec<u8>` copy — see
//! [`TransformChain::is_identity`].

mod chain;
mod compressor;
mod serializer;
mod signer;

pub use chain::TransformChain;
pub use compressor::Compressor;
pub use serializer::Serializer;
pub use signer::Signer;
