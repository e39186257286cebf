use super::{Codec, CodecError};
use crate::dataset::Payload;
use crate::CodecKind;

/// bincode 1.x with its default (fixed-width little-endian) options.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    const KIND: CodecKind = CodecKind::Bincode;

    type Model = Payload;
    type Encoded = Vec<u8>;

    fn create(&self, payload: &Payload) -> Result<Payload, CodecError> {
        Ok(payload.clone())
    }

    fn encode(&self, model: &Payload) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(model).map_err(CodecError::encode)
    }

    fn decode(&self, encoded: &Vec<u8>) -> Result<Payload, CodecError> {
        bincode::deserialize(encoded).map_err(CodecError::decode)
    }

    fn restore(&self, model: Payload) -> Result<Payload, CodecError> {
        Ok(model)
    }
}
