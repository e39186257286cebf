//! Protocol Buffers through prost.
//!
//! The message types mirror this schema and are derived in place instead of
//! being generated by a build script:
//!
//! ```text
//! message User    { uint64 id = 1; string name = 2; string role = 3; }
//! message Payload { repeated User users = 1; }
//! ```

use prost::Message;

use super::{Codec, CodecError};
use crate::dataset::{Payload, Role, User};
use crate::CodecKind;

#[derive(Clone, PartialEq, Message)]
pub struct UserProto {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub role: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct PayloadProto {
    #[prost(message, repeated, tag = "1")]
    pub users: Vec<UserProto>,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role {0:?}")]
pub struct UnknownRole(pub String);

#[derive(Debug, Clone, Copy, Default)]
pub struct ProtobufCodec;

impl Codec for ProtobufCodec {
    const KIND: CodecKind = CodecKind::Protobuf;

    type Model = PayloadProto;
    type Encoded = Vec<u8>;

    fn create(&self, payload: &Payload) -> Result<PayloadProto, CodecError> {
        let users = payload
            .users
            .iter()
            .map(|u| UserProto {
                id: u.id,
                name: u.name.clone(),
                role: u.role.as_str().to_string(),
            })
            .collect();
        Ok(PayloadProto { users })
    }

    fn encode(&self, model: &PayloadProto) -> Result<Vec<u8>, CodecError> {
        Ok(model.encode_to_vec())
    }

    fn decode(&self, encoded: &Vec<u8>) -> Result<PayloadProto, CodecError> {
        PayloadProto::decode(encoded.as_slice()).map_err(CodecError::decode)
    }

    fn restore(&self, model: PayloadProto) -> Result<Payload, CodecError> {
        let users = model
            .users
            .into_iter()
            .map(|u| {
                let role = Role::parse(&u.role)
                    .ok_or_else(|| CodecError::restore(UnknownRole(u.role.clone())))?;
                Ok(User {
                    id: u.id,
                    name: u.name,
                    role,
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;
        Ok(Payload { users })
    }
}
