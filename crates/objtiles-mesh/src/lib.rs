//! Mesh loading, octree partitioning and texture repacking for 3D Tiles.
//!
//! This crate provides the pure synchronous core of the tiler: it reads a
//! textured OBJ mesh, splits it into an octree of face sets, crops each
//! node's geometry, repacks the UV islands it samples into a smaller
//! texture, and downsamples textures by depth. Nothing here spawns threads
//! or writes output files - the caller decides how to parallelize the
//! per-node work.
//!
//! # Design principles
//!
//! - **Synchronous**: No async, no threading primitives
//! - **Read-only sharing**: A loaded [`Mesh`] is never mutated, so any number
//!   of workers can partition nodes from the same `&Mesh`
//! - **Deterministic**: Identical input and [`StopRule`] give identical node
//!   ids, vertex orders and atlas layouts
//! - **Lazy pixels**: Partitions describe their texture as an [`AtlasLayout`]
//!   over the source; texels are resampled once, at the output resolution
//!
//! # Key functions
//!
//! - [`load_obj`]: Parse an OBJ, its MTL and textures into a [`Mesh`]
//! - [`Octree::build`]: Split the mesh into an arena of octree nodes
//! - [`partition`]: Crop one node's faces and repack their UV islands
//! - [`compress`]: Render a node's atlas at its depth's resolution and encode it

mod error;

pub mod atlas;
pub mod bounds;
pub mod loader;
pub mod mesh;
pub mod octree;
pub mod partition;
pub mod path;
pub mod texture;

pub use atlas::{AtlasLayout, AtlasSlot, UvIslands};
pub use bounds::Aabb;
pub use error::{MeshError, MeshResult};
pub use loader::load_obj;
pub use mesh::{Mesh, Vertex};
pub use octree::{NodeId, Octree, OctreeNode, StopRule};
pub use partition::{CroppedMesh, Partition, PixelWindow, partition};
pub use path::OctantPath;
pub use texture::{CompressedTexture, CompressionLevel, TextureEncoding, TexturePolicy, compress};

/// Hard upper bound on octree depth, whatever the configured stop rule says.
pub const MAX_LEVEL: u32 = 20;
