//! Convert a textured OBJ mesh into a 3D Tiles tileset.
//!
//! This crate drives the geometry core in [`objtiles_mesh`]: it loads the
//! mesh, builds the octree, fans the per-tile work out over rayon, encodes
//! every node as a b3dm payload and finally writes `tileset.json`.
//!
//! # Output layout
//!
//! ```text
//! out/
//!   tileset.json
//!   tiles/0/root.b3dm
//!   tiles/1/3.b3dm
//!   tiles/2/31.b3dm
//!   debug/...            (only with the debug flags)
//! ```
//!
//! # Key functions
//!
//! - [`generate`]: Load an OBJ and write a tileset
//! - [`generate_from_mesh`]: Same, for a mesh already in memory
//! - [`encode_glb`] / [`encode_b3dm`]: Tile payload encoding
//! - [`Tileset::validate`]: Containment and error monotonicity checks

pub mod config;
pub mod debug_viewer;
pub mod encoder;
mod error;
pub mod generator;
pub mod synthetic;
pub mod tileset;

pub use config::{TilerConfig, UpAxis};
pub use encoder::{EncodeError, EncodeOptions, GlbView, encode_b3dm, encode_glb, tile_uri};
pub use error::{Error, Result};
pub use generator::{TILESET_FILE, TilesetSummary, generate, generate_from_mesh};
pub use objtiles_mesh;
pub use synthetic::SyntheticMesh;
pub use tileset::{Tile, TileRecord, Tileset};
