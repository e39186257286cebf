//! TOON, a line-oriented tabular text format.
//!
//! A uniform array of flat records such as the user list is written as one
//! header line with the field names followed by one comma-separated row per
//! record, which is where the format's size advantage over JSON comes from.

use super::{Codec, CodecError};
use crate::dataset::Payload;
use crate::CodecKind;

#[derive(Debug, Clone, Copy, Default)]
pub struct ToonCodec;

impl Codec for ToonCodec {
    const KIND: CodecKind = CodecKind::Toon;

    type Model = Payload;
    type Encoded = String;

    fn create(&self, payload: &Payload) -> Result<Payload, CodecError> {
        Ok(payload.clone())
    }

    fn encode(&self, model: &Payload) -> Result<String, CodecError> {
        serde_toon::to_string(model).map_err(CodecError::encode)
    }

    fn decode(&self, encoded: &String) -> Result<Payload, CodecError> {
        serde_toon::from_str(encoded).map_err(CodecError::decode)
    }

    fn restore(&self, model: Payload) -> Result<Payload, CodecError> {
        Ok(model)
    }
}
