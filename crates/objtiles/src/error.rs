use std::path::PathBuf;

use objtiles_mesh::MeshError;

use crate::encoder::EncodeError;

/// Errors produced while generating a tileset.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error("failed to encode tile {path}: {source}")]
    Encoding {
        path: String,
        #[source]
        source: EncodeError,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize tileset: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("output directory {0} already exists and is not empty, not overwriting")]
    OutputExists(PathBuf),

    #[error("tileset failed validation: {0}")]
    InvalidTileset(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
