//! Tiler configuration.
//!
//! Every field has a default, so a TOML file only needs the keys it wants
//! to change:
//!
//! ```toml
//! max_depth = 4
//! up_axis = "y"
//! ```

use std::path::Path;

use objtiles_mesh::{MAX_LEVEL, StopRule, TexturePolicy};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Up axis declared in the tileset and used for GLB content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpAxis {
    Y,
    #[default]
    Z,
}

impl UpAxis {
    /// Value of `asset.gltfUpAxis`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Y => "Y",
            Self::Z => "Z",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TilerConfig {
    pub max_depth: u32,
    pub max_faces_per_leaf: usize,
    pub min_region_size: f64,
    /// Stop subdividing once a node's packed UV islands fit in this many
    /// texels per side. `None` disables the rule.
    pub target_texels_per_tile: Option<u32>,
    /// Padding around each UV island, in texels of the tile's output
    /// texture. Coarse tiles take proportionally more source texels.
    pub texture_margin: u32,
    pub min_resolution_fraction: f64,
    pub min_jpeg_quality: u8,
    pub max_jpeg_quality: u8,
    pub up_axis: UpAxis,
    /// Worker threads; 0 uses the rayon default.
    pub threads: usize,
    pub overwrite: bool,
    /// Also write every leaf as a standalone GLB with a three.js viewer.
    pub debug_glb: bool,
    /// Also write a tileset viewer page.
    pub debug_tileset: bool,
}

impl Default for TilerConfig {
    fn default() -> Self {
        let stop = StopRule::default();
        let texture = TexturePolicy::default();
        Self {
            max_depth: stop.max_depth,
            max_faces_per_leaf: stop.max_faces_per_leaf,
            min_region_size: stop.min_region_size,
            target_texels_per_tile: stop.target_texels_per_tile,
            texture_margin: 2,
            min_resolution_fraction: texture.min_resolution_fraction,
            min_jpeg_quality: texture.min_jpeg_quality,
            max_jpeg_quality: texture.max_jpeg_quality,
            up_axis: UpAxis::Z,
            threads: 0,
            overwrite: false,
            debug_glb: false,
            debug_tileset: false,
        }
    }
}

impl TilerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Reject values the pipeline cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth > MAX_LEVEL {
            return Err(Error::Config(format!(
                "max_depth {} exceeds the limit of {MAX_LEVEL}",
                self.max_depth
            )));
        }
        if self.max_faces_per_leaf == 0 {
            return Err(Error::Config("max_faces_per_leaf must be at least 1".into()));
        }
        if !self.min_region_size.is_finite() || self.min_region_size < 0.0 {
            return Err(Error::Config(format!(
                "min_region_size must be a non-negative number, got {}",
                self.min_region_size
            )));
        }
        if self.target_texels_per_tile == Some(0) {
            return Err(Error::Config("target_texels_per_tile must be positive".into()));
        }
        if !(self.min_resolution_fraction > 0.0 && self.min_resolution_fraction <= 1.0) {
            return Err(Error::Config(format!(
                "min_resolution_fraction must be in (0, 1], got {}",
                self.min_resolution_fraction
            )));
        }
        let q = 1..=100;
        if !q.contains(&self.min_jpeg_quality)
            || !q.contains(&self.max_jpeg_quality)
            || self.min_jpeg_quality > self.max_jpeg_quality
        {
            return Err(Error::Config(format!(
                "JPEG quality range {}..={} must lie within 1..=100",
                self.min_jpeg_quality, self.max_jpeg_quality
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn stop_rule(&self) -> StopRule {
        StopRule {
            max_depth: self.max_depth,
            max_faces_per_leaf: self.max_faces_per_leaf,
            min_region_size: self.min_region_size,
            target_texels_per_tile: self.target_texels_per_tile,
        }
    }

    #[must_use]
    pub fn texture_policy(&self) -> TexturePolicy {
        TexturePolicy {
            min_resolution_fraction: self.min_resolution_fraction,
            min_jpeg_quality: self.min_jpeg_quality,
            max_jpeg_quality: self.max_jpeg_quality,
        }
    }
}
