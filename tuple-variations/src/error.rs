//! Error types

use font_types::Tag;
use read_fonts::ReadError;
use thiserror::Error;

use crate::serialize::SerializeErrorFlags;

/// Errors reported by the high level instancing operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Error reading variation data: {0}")]
    Read(#[from] ReadError),

    #[error("Serializing variation data failed: {0:?}")]
    Serialize(SerializeErrorFlags),

    #[error("Invalid input to --variations: {0}")]
    InvalidInstancingSpec(String),

    #[error("Invalid tag {0}")]
    InvalidTag(String),

    #[error("Invalid limits for axis '{tag}': {reason}")]
    InvalidAxisLimit { tag: Tag, reason: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SerializeErrorFlags> for Error {
    fn from(flags: SerializeErrorFlags) -> Self {
        Error::Serialize(flags)
    }
}
