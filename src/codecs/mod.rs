//! Serialization adapters.
//!
//! Each format is reached through one explicit [`Codec`] implementation. The
//! harness never probes a library for whatever encode/decode entry points it
//! happens to export; a codec either provides all of `create`, `encode`,
//! `decode` and `restore`, or it does not compile.

use std::error::Error as StdError;

use crate::dataset::Payload;
use crate::CodecKind;

pub mod bincode;
pub mod json;
pub mod protobuf;
pub mod toon;

pub use self::bincode::BincodeCodec;
pub use self::json::JsonCodec;
pub use self::protobuf::ProtobufCodec;
pub use self::toon::ToonCodec;

#[derive(Debug, thiserror::Error)]
#[error("{op}: {source}")]
pub struct CodecError {
    op: &'static str,
    #[source]
    source: Box<dyn StdError + Send + Sync>,
}

impl CodecError {
    pub fn new(op: &'static str, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            op,
            source: source.into(),
        }
    }

    pub fn create(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::new("create", source)
    }

    pub fn encode(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::new("encode", source)
    }

    pub fn decode(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::new("decode", source)
    }

    pub fn restore(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::new("restore", source)
    }

    /// The codec operation that failed.
    pub fn op(&self) -> &'static str {
        self.op
    }
}

/// A serialization format under test.
///
/// `Model` is the codec-native value: the payload itself for serde formats, a
/// generated message type for protobuf. It is built once per run by
/// [`Codec::create`] and shared read-only by every encode iteration, so
/// schema/model construction never lands inside a measured loop.
pub trait Codec {
    const KIND: CodecKind;

    type Model;
    type Encoded: AsRef<[u8]>;

    fn create(&self, payload: &Payload) -> Result<Self::Model, CodecError>;
    fn encode(&self, model: &Self::Model) -> Result<Self::Encoded, CodecError>;
    fn decode(&self, encoded: &Self::Encoded) -> Result<Self::Model, CodecError>;

    /// Convert a decoded model back into the shared payload type.
    ///
    /// Only used for round-trip verification, never measured.
    fn restore(&self, model: Self::Model) -> Result<Payload, CodecError>;
}
