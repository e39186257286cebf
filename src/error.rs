use std::io;

use crate::codecs::CodecError;
use crate::CodecKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "memory probe unavailable: install toonbench::memory::TrackingAllocator as the \
         #[global_allocator] (or set BenchConfig::require_memory_probe to false)"
    )]
    ProbeUnavailable,

    #[error("duplicate benchmark case name: {0}")]
    DuplicateCase(String),

    #[error("failed to build {codec} fixture: {source}")]
    Fixture {
        codec: CodecKind,
        #[source]
        source: CodecError,
    },

    #[error("case {name} failed: {source}")]
    Case {
        name: String,
        #[source]
        source: CodecError,
    },

    #[error("{codec} round trip failed: {source}")]
    Verify {
        codec: CodecKind,
        #[source]
        source: CodecError,
    },

    #[error("{codec} round trip did not reproduce the fixture payload")]
    RoundTrip { codec: CodecKind },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::ProbeUnavailable => 2,
            _ => 1,
        }
    }
}
