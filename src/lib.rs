use clap::ValueEnum;
use serde::Serialize;

pub mod codecs;
pub mod dataset;
pub mod error;
pub mod fixtures;
pub mod harness;
pub mod memory;
pub mod schema;
pub mod suite;

pub use error::{Error, Result};

/// Serialization format to benchmark.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// serde_json text encoding.
    Json,
    /// TOON, the line-oriented tabular text format.
    Toon,
    /// Protocol Buffers via prost.
    Protobuf,
    /// bincode 1.x binary encoding.
    Bincode,
}

impl CodecKind {
    /// All codecs, in the order cases are emitted.
    pub const ALL: [CodecKind; 4] = [
        CodecKind::Json,
        CodecKind::Toon,
        CodecKind::Protobuf,
        CodecKind::Bincode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CodecKind::Json => "json",
            CodecKind::Toon => "toon",
            CodecKind::Protobuf => "protobuf",
            CodecKind::Bincode => "bincode",
        }
    }

    /// File extension used when dumping encoded fixtures.
    pub fn extension(&self) -> &'static str {
        match self {
            CodecKind::Json => "json",
            CodecKind::Toon => "toon",
            CodecKind::Protobuf => "pb",
            CodecKind::Bincode => "bin",
        }
    }
}

impl std::fmt::Display for CodecKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
