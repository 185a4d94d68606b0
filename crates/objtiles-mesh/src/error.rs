use std::path::PathBuf;

/// Errors produced while loading or partitioning a mesh.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse OBJ {path}: {source}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    #[error("failed to decode texture {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode texture: {0}")]
    TextureEncode(#[source] image::ImageError),

    #[error("degenerate mesh: {0}")]
    DegenerateMesh(String),

    /// A node with no faces reached the partitioner. The octree builder
    /// prunes empty regions, so this is an internal invariant violation.
    #[error("octree node {path} has no faces")]
    EmptyRegion { path: String },
}

pub type MeshResult<T> = Result<T, MeshError>;
