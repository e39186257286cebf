use super::{Codec, CodecError};
use crate::dataset::Payload;
use crate::CodecKind;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    const KIND: CodecKind = CodecKind::Json;

    type Model = Payload;
    type Encoded = String;

    fn create(&self, payload: &Payload) -> Result<Payload, CodecError> {
        Ok(payload.clone())
    }

    fn encode(&self, model: &Payload) -> Result<String, CodecError> {
        serde_json::to_string(model).map_err(CodecError::encode)
    }

    fn decode(&self, encoded: &String) -> Result<Payload, CodecError> {
        serde_json::from_str(encoded).map_err(CodecError::decode)
    }

    fn restore(&self, model: Payload) -> Result<Payload, CodecError> {
        Ok(model)
    }
}
