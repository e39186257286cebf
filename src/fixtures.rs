//! Read-only benchmark inputs.
//!
//! A [`Fixtures`] value is built once at startup: the payload, plus for every
//! selected codec its native model and the pre-encoded form decode cases
//! start from. Nothing is mutated after construction; cases only borrow.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::codecs::{BincodeCodec, Codec, JsonCodec, ProtobufCodec, ToonCodec};
use crate::dataset::Payload;
use crate::suite::BenchCase;
use crate::{CodecKind, Error, Result};

/// One codec's prepared inputs.
pub struct CodecFixture<C: Codec> {
    codec: C,
    model: C::Model,
    encoded: C::Encoded,
}

impl<C: Codec> CodecFixture<C> {
    /// Build the model and encode it once, then decode that output once so a
    /// broken codec fails here rather than inside a measured case.
    pub fn build(codec: C, payload: &Payload) -> Result<Self> {
        let fixture_err = |source| Error::Fixture {
            codec: C::KIND,
            source,
        };
        let model = codec.create(payload).map_err(fixture_err)?;
        let encoded = codec.encode(&model).map_err(fixture_err)?;
        codec.decode(&encoded).map_err(fixture_err)?;
        debug!(
            codec = C::KIND.as_str(),
            bytes = encoded.as_ref().len(),
            "fixture ready"
        );
        Ok(Self {
            codec,
            model,
            encoded,
        })
    }

    pub fn encoded(&self) -> &C::Encoded {
        &self.encoded
    }
}

/// Object-safe view of a [`CodecFixture`], so fixtures for different codecs
/// can live in one list.
pub trait PreparedCodec {
    fn kind(&self) -> CodecKind;
    fn encoded_bytes(&self) -> &[u8];

    /// `<codec>.encode` followed by `<codec>.decode`.
    fn cases(&self) -> Vec<BenchCase<'_>>;

    fn round_trips(&self, payload: &Payload) -> Result<bool>;
}

impl<C: Codec> PreparedCodec for CodecFixture<C> {
    fn kind(&self) -> CodecKind {
        C::KIND
    }

    fn encoded_bytes(&self) -> &[u8] {
        self.encoded.as_ref()
    }

    fn cases(&self) -> Vec<BenchCase<'_>> {
        let kind = C::KIND.as_str();
        vec![
            BenchCase::new(format!("{kind}.encode"), move || {
                self.codec.encode(std::hint::black_box(&self.model))
            }),
            BenchCase::new(format!("{kind}.decode"), move || {
                self.codec.decode(std::hint::black_box(&self.encoded))
            }),
        ]
    }

    fn round_trips(&self, payload: &Payload) -> Result<bool> {
        let verify_err = |source| Error::Verify {
            codec: C::KIND,
            source,
        };
        let encoded = self.codec.encode(&self.model).map_err(verify_err)?;
        let decoded = self.codec.decode(&encoded).map_err(verify_err)?;
        let restored = self.codec.restore(decoded).map_err(verify_err)?;
        Ok(&restored == payload)
    }
}

/// Encoded size and fingerprint of one codec's fixture.
#[derive(Debug, Clone, Serialize)]
pub struct EncodedSize {
    pub codec: CodecKind,
    pub bytes: usize,
    pub sha256: String,
}

pub struct Fixtures {
    payload: Payload,
    codecs: Vec<Box<dyn PreparedCodec>>,
}

impl Fixtures {
    /// Prepare fixtures for `kinds`. Duplicates are ignored and the fixed
    /// codec order of [`CodecKind::ALL`] is kept regardless of input order.
    pub fn build(payload: Payload, kinds: &[CodecKind]) -> Result<Self> {
        let mut codecs: Vec<Box<dyn PreparedCodec>> = Vec::new();
        for kind in CodecKind::ALL {
            if !kinds.contains(&kind) {
                continue;
            }
            let prepared: Box<dyn PreparedCodec> = match kind {
                CodecKind::Json => Box::new(CodecFixture::build(JsonCodec, &payload)?),
                CodecKind::Toon => Box::new(CodecFixture::build(ToonCodec, &payload)?),
                CodecKind::Protobuf => Box::new(CodecFixture::build(ProtobufCodec, &payload)?),
                CodecKind::Bincode => Box::new(CodecFixture::build(BincodeCodec, &payload)?),
            };
            codecs.push(prepared);
        }
        Ok(Self { payload, codecs })
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn kinds(&self) -> Vec<CodecKind> {
        self.codecs.iter().map(|c| c.kind()).collect()
    }

    /// All benchmark cases, borrowing from these fixtures.
    pub fn cases(&self) -> Vec<BenchCase<'_>> {
        self.codecs.iter().flat_map(|c| c.cases()).collect()
    }

    /// Check that every codec reproduces the payload.
    pub fn verify(&self) -> Result<()> {
        for c in &self.codecs {
            if !c.round_trips(&self.payload)? {
                return Err(Error::RoundTrip { codec: c.kind() });
            }
        }
        Ok(())
    }

    pub fn sizes(&self) -> Vec<EncodedSize> {
        self.codecs
            .iter()
            .map(|c| {
                let bytes = c.encoded_bytes();
                EncodedSize {
                    codec: c.kind(),
                    bytes: bytes.len(),
                    sha256: hex(&Sha256::digest(bytes)),
                }
            })
            .collect()
    }

    /// Write each encoded form to `dir/payload.<ext>`.
    pub fn write_to(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(self.codecs.len());
        for c in &self.codecs {
            let path = dir.join(format!("payload.{}", c.kind().extension()));
            fs::write(&path, c.encoded_bytes())?;
            written.push(path);
        }
        Ok(written)
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}
