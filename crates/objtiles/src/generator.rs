//! End-to-end tileset generation.
//!
//! The octree is built sequentially so node ids are stable. Every node is
//! then pushed through partition, compression, encoding and writing on the
//! rayon pool; workers share the mesh and octree read-only and each writes
//! its own file. `tileset.json` is written only after every tile succeeded.

use std::fs;
use std::path::{Path, PathBuf};

use glam::DVec3;
use objtiles_mesh::{Mesh, Octree, OctreeNode, TexturePolicy, compress, load_obj, partition};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{TilerConfig, UpAxis};
use crate::debug_viewer;
use crate::encoder::{EncodeOptions, encode_b3dm, encode_glb, tile_uri};
use crate::error::{Error, Result};
use crate::tileset::{TileRecord, Tileset};

pub const TILESET_FILE: &str = "tileset.json";
pub const TILES_DIR: &str = "tiles";

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TilesetSummary {
    pub tileset_path: PathBuf,
    pub tiles: usize,
    pub leaves: usize,
    pub height: u32,
    pub faces: usize,
    pub geometric_error: f64,
    pub bytes_written: u64,
}

/// Shared, read-only inputs of the per-node pipeline.
struct Job<'a> {
    mesh: &'a Mesh,
    output_dir: &'a Path,
    config: &'a TilerConfig,
    policy: TexturePolicy,
    height: u32,
    texel_size: f64,
    mesh_center: DVec3,
}

struct NodeOutput {
    record: TileRecord,
    bytes: u64,
}

/// Load `input` and write a complete tileset into `output_dir`.
pub fn generate(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &TilerConfig,
) -> Result<TilesetSummary> {
    let (input, output_dir) = (input.as_ref(), output_dir.as_ref());
    config.validate()?;
    prepare_output_dir(output_dir, config.overwrite)?;

    info!(input = %input.display(), "loading mesh");
    let mesh = load_obj(input)?;
    generate_from_mesh(&mesh, output_dir, config)
}

/// Tile an already loaded mesh. The output directory must be prepared by
/// the caller.
pub fn generate_from_mesh(
    mesh: &Mesh,
    output_dir: &Path,
    config: &TilerConfig,
) -> Result<TilesetSummary> {
    config.validate()?;

    let octree = Octree::build(mesh, &config.stop_rule())?;
    let root_bounds = octree.root().bounds;
    let job = Job {
        mesh,
        output_dir,
        config,
        policy: config.texture_policy(),
        height: octree.height(),
        texel_size: mesh.median_texel_size(),
        mesh_center: root_bounds.center(),
    };
    info!(
        nodes = octree.len(),
        texel_size = job.texel_size,
        threads = config.threads,
        "encoding tiles"
    );

    let run = || {
        octree
            .nodes()
            .par_iter()
            .map(|node| job.process(node))
            .collect::<Result<Vec<_>>>()
    };
    let outputs = if config.threads == 0 {
        run()?
    } else {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
            .map_err(|e| Error::Config(format!("failed to start worker pool: {e}")))?
            .install(run)?
    };

    let bytes_written = outputs.iter().map(|o| o.bytes).sum();
    let records: Vec<TileRecord> = outputs.into_iter().map(|o| o.record).collect();
    let tileset = Tileset::assemble(&octree, &records, config.up_axis)?;
    tileset.validate()?;

    let debug_dir = output_dir.join(debug_viewer::DEBUG_DIR);
    let width = root_bounds.size().max_element();
    if config.debug_glb {
        let leaves: Vec<String> = octree.leaves().map(debug_glb_uri).collect();
        debug_viewer::write_glb_viewer(&debug_dir, &leaves, width)?;
    }
    if config.debug_tileset {
        debug_viewer::write_tileset_viewer(&debug_dir, root_bounds.center(), width)?;
    }

    let tileset_path = output_dir.join(TILESET_FILE);
    tileset.write_atomic(&tileset_path)?;

    let summary = TilesetSummary {
        tileset_path,
        tiles: octree.len(),
        leaves: octree.leaves().count(),
        height: octree.height(),
        faces: mesh.face_count(),
        geometric_error: tileset.geometric_error,
        bytes_written,
    };
    info!(
        tiles = summary.tiles,
        leaves = summary.leaves,
        height = summary.height,
        bytes = summary.bytes_written,
        "tileset complete"
    );
    Ok(summary)
}

impl Job<'_> {
    fn process(&self, node: &OctreeNode) -> Result<NodeOutput> {
        let is_leaf = node.is_leaf();
        let level = self.policy.level(node.depth, self.height, is_leaf);
        let margin = level.source_margin(self.config.texture_margin);
        let part = partition(self.mesh, node, margin)?;
        let texture = compress(&self.mesh.texture, &part.atlas, &level)?;

        let bounds = node.bounds.union(part.bounds);
        let center = bounds.center();
        let encode_err = |source| Error::Encoding {
            path: node.path.to_string(),
            source,
        };
        let glb = encode_glb(
            &part.mesh,
            &texture,
            &EncodeOptions {
                center,
                up_axis: self.config.up_axis,
            },
        )
        .map_err(encode_err)?;
        let b3dm = encode_b3dm(&glb, center).map_err(encode_err)?;

        let uri = tile_uri(&node.path);
        write_file(&self.output_dir.join(&uri), &b3dm)?;

        if self.config.debug_glb && is_leaf {
            // three.js viewers are Y-up and centred on the whole mesh.
            let glb = encode_glb(
                &part.mesh,
                &texture,
                &EncodeOptions {
                    center: self.mesh_center,
                    up_axis: UpAxis::Y,
                },
            )
            .map_err(encode_err)?;
            let path = self
                .output_dir
                .join(debug_viewer::DEBUG_DIR)
                .join(debug_glb_uri(node));
            write_file(&path, &glb)?;
        }

        debug!(
            path = %node.path,
            depth = node.depth,
            faces = node.faces.len(),
            vertices = part.mesh.vertex_count(),
            islands = part.atlas.slots.len(),
            texture_width = texture.width,
            texture_height = texture.height,
            mime = texture.mime_type,
            bytes = b3dm.len(),
            "wrote tile"
        );

        Ok(NodeOutput {
            record: TileRecord {
                bounds,
                geometric_error: level.geometric_error(self.texel_size, is_leaf),
                uri,
            },
            bytes: b3dm.len() as u64,
        })
    }
}

fn debug_glb_uri(node: &OctreeNode) -> String {
    format!("{TILES_DIR}/{}/{}.glb", node.depth, node.path)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, bytes).map_err(|e| Error::io(path, e))
}

/// Create `dir`, or check it can be written into.
///
/// A non-empty directory is only reused with `overwrite`, in which case
/// output from a previous run is removed first.
fn prepare_output_dir(dir: &Path, overwrite: bool) -> Result<()> {
    let occupied = match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_some(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(Error::io(dir, e)),
    };
    if occupied {
        if !overwrite {
            return Err(Error::OutputExists(dir.to_path_buf()));
        }
        for name in [TILESET_FILE, "tileset.json.tmp"] {
            let path = dir.join(name);
            if path.exists() {
                fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
            }
        }
        for name in [TILES_DIR, debug_viewer::DEBUG_DIR] {
            let path = dir.join(name);
            if path.exists() {
                fs::remove_dir_all(&path).map_err(|e| Error::io(&path, e))?;
            }
        }
        info!(dir = %dir.display(), "overwriting previous output");
    }
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_non_empty_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.txt"), "x").unwrap();
        assert!(matches!(
            prepare_output_dir(dir.path(), false),
            Err(Error::OutputExists(_))
        ));
    }

    #[test]
    fn overwrite_clears_previous_run_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.txt"), "x").unwrap();
        fs::write(dir.path().join(TILESET_FILE), "{}").unwrap();
        fs::create_dir_all(dir.path().join("tiles/3")).unwrap();

        prepare_output_dir(dir.path(), true).unwrap();
        assert!(dir.path().join("keep.txt").exists());
        assert!(!dir.path().join(TILESET_FILE).exists());
        assert!(!dir.path().join(TILES_DIR).exists());
    }

    #[test]
    fn creates_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a/b");
        prepare_output_dir(&out, false).unwrap();
        assert!(out.is_dir());
    }
}
