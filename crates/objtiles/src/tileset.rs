//! `tileset.json` model and assembly.

use std::fs;
use std::path::Path;

use objtiles_mesh::{Aabb, NodeId, Octree};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::UpAxis;
use crate::error::{Error, Result};

/// Relative slack allowed when checking box containment, to absorb
/// rounding in the 12-number box form.
const CONTAINMENT_EPS: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tileset {
    pub asset: Asset,
    pub geometric_error: f64,
    pub root: Tile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub version: String,
    #[serde(rename = "gltfUpAxis")]
    pub gltf_up_axis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    pub bounding_volume: BoundingVolume,
    pub geometric_error: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refine: Option<Refine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Tile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingVolume {
    #[serde(rename = "box")]
    pub bbox: [f64; 12],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub uri: String,
}

/// Tiles always replace their parent's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Refine {
    Replace,
}

/// Per-node output of the tile pipeline, indexed by [`NodeId`].
#[derive(Debug, Clone, PartialEq)]
pub struct TileRecord {
    pub bounds: Aabb,
    pub geometric_error: f64,
    pub uri: String,
}

impl BoundingVolume {
    #[must_use]
    pub fn from_aabb(b: &Aabb) -> Self {
        Self { bbox: b.to_box() }
    }

    /// Axis-aligned hull of the box.
    #[must_use]
    pub fn to_aabb(&self) -> Aabb {
        let b = &self.bbox;
        let c = glam::DVec3::new(b[0], b[1], b[2]);
        let reach = glam::DVec3::new(
            b[3].abs() + b[6].abs() + b[9].abs(),
            b[4].abs() + b[7].abs() + b[10].abs(),
            b[5].abs() + b[8].abs() + b[11].abs(),
        );
        Aabb::new(c - reach, c + reach)
    }
}

impl Tile {
    /// Pre-order walk over this tile and its descendants.
    pub fn walk(&self, f: &mut impl FnMut(&Tile, u32)) {
        fn go(t: &Tile, depth: u32, f: &mut impl FnMut(&Tile, u32)) {
            f(t, depth);
            for c in &t.children {
                go(c, depth + 1, f);
            }
        }
        go(self, 0, f);
    }

    #[must_use]
    pub fn count(&self) -> usize {
        let mut n = 0;
        self.walk(&mut |_, _| n += 1);
        n
    }
}

impl Tileset {
    /// Build the tile tree mirroring `octree`, one tile per node.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTileset`] unless `records` holds exactly one entry
    /// per octree node.
    pub fn assemble(octree: &Octree, records: &[TileRecord], up_axis: UpAxis) -> Result<Self> {
        if records.len() != octree.len() || octree.is_empty() {
            return Err(Error::InvalidTileset(format!(
                "{} tile records for {} octree nodes",
                records.len(),
                octree.len()
            )));
        }

        fn build(octree: &Octree, records: &[TileRecord], id: NodeId) -> Tile {
            let record = &records[id.index()];
            Tile {
                bounding_volume: BoundingVolume::from_aabb(&record.bounds),
                geometric_error: record.geometric_error,
                refine: Some(Refine::Replace),
                content: Some(Content {
                    uri: record.uri.clone(),
                }),
                children: octree
                    .node(id)
                    .children
                    .iter()
                    .map(|&c| build(octree, records, c))
                    .collect(),
            }
        }

        let root = build(octree, records, NodeId::ROOT);
        let root_diagonal = records[0].bounds.diagonal();
        Ok(Self {
            asset: Asset {
                version: "1.0".into(),
                gltf_up_axis: up_axis.as_str().into(),
                generator: Some(concat!("objtiles ", env!("CARGO_PKG_VERSION")).into()),
            },
            geometric_error: root_diagonal.max(root.geometric_error),
            root,
        })
    }

    /// Check that every child box lies inside its parent's and that
    /// geometric error never grows with depth.
    pub fn validate(&self) -> Result<()> {
        if self.root.geometric_error > self.geometric_error {
            return Err(Error::InvalidTileset(format!(
                "root error {} exceeds tileset error {}",
                self.root.geometric_error, self.geometric_error
            )));
        }

        fn check(tile: &Tile, trail: &mut Vec<usize>) -> Result<()> {
            let parent = tile.bounding_volume.to_aabb();
            let eps = CONTAINMENT_EPS * parent.diagonal().max(1.0);
            for (i, child) in tile.children.iter().enumerate() {
                trail.push(i);
                if !parent.contains(&child.bounding_volume.to_aabb(), eps) {
                    return Err(Error::InvalidTileset(format!(
                        "tile {trail:?} is not contained in its parent"
                    )));
                }
                if child.geometric_error > tile.geometric_error {
                    return Err(Error::InvalidTileset(format!(
                        "tile {trail:?} has error {} above its parent's {}",
                        child.geometric_error, tile.geometric_error
                    )));
                }
                check(child, trail)?;
                trail.pop();
            }
            Ok(())
        }
        check(&self.root, &mut Vec::new())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write to `path` through a temporary sibling file and a rename, so a
    /// reader never sees a partial tileset.
    pub fn write_atomic(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&tmp, json).map_err(|e| Error::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| Error::io(path, e))?;
        info!(
            tiles = self.root.count(),
            path = %path.display(),
            "wrote tileset.json"
        );
        Ok(())
    }
}
