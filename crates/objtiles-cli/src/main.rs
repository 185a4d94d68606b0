//! `objtiles`: convert a textured OBJ mesh into a 3D Tiles tileset.
//!
//! Settings come from the defaults, then an optional TOML file, then the
//! command-line flags.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use objtiles::{TilerConfig, UpAxis};
use tracing::Level;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AxisArg {
    Y,
    Z,
}

impl From<AxisArg> for UpAxis {
    fn from(a: AxisArg) -> Self {
        match a {
            AxisArg::Y => Self::Y,
            AxisArg::Z => Self::Z,
        }
    }
}

/// Convert a textured OBJ mesh into a hierarchical 3D Tiles tileset.
#[derive(Parser, Debug)]
#[command(name = "objtiles", version)]
struct Args {
    /// Input OBJ file. Its MTL and textures are resolved relative to it.
    in_obj: PathBuf,

    /// Output directory for tileset.json and tiles/.
    out_dir: PathBuf,

    /// TOML file with tiler settings. Flags override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum octree depth.
    #[arg(long)]
    max_depth: Option<u32>,

    /// Nodes with at most this many faces are not split further.
    #[arg(long)]
    max_faces_per_leaf: Option<usize>,

    /// Regions whose longest edge is at most this size are not split.
    #[arg(long)]
    min_region_size: Option<f64>,

    /// Desired texture size per tile in texels; 0 disables the limit.
    #[arg(short = 's', long)]
    image_size: Option<u32>,

    /// Up axis declared for tile content.
    #[arg(long, value_enum)]
    up_axis: Option<AxisArg>,

    /// Worker threads (0 = one per core).
    #[arg(long)]
    threads: Option<usize>,

    /// Reuse a non-empty output directory.
    #[arg(long)]
    overwrite: bool,

    /// Also write leaf tiles as GLB plus debug_glb_viewer.html.
    #[arg(long)]
    debug_glb: bool,

    /// Also write debug_tileset_viewer.html.
    #[arg(long)]
    debug_tileset: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn tiler_config(&self) -> Result<TilerConfig> {
        let mut config = match &self.config {
            Some(path) => TilerConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => TilerConfig::default(),
        };

        if let Some(v) = self.max_depth {
            config.max_depth = v;
        }
        if let Some(v) = self.max_faces_per_leaf {
            config.max_faces_per_leaf = v;
        }
        if let Some(v) = self.min_region_size {
            config.min_region_size = v;
        }
        if let Some(v) = self.image_size {
            config.target_texels_per_tile = (v > 0).then_some(v);
        }
        if let Some(v) = self.up_axis {
            config.up_axis = v.into();
        }
        if let Some(v) = self.threads {
            config.threads = v;
        }
        config.overwrite |= self.overwrite;
        config.debug_glb |= self.debug_glb;
        config.debug_tileset |= self.debug_tileset;

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = args.tiler_config()?;
    let summary = objtiles::generate(&args.in_obj, &args.out_dir, &config).with_context(|| {
        format!(
            "Failed to tile {} into {}",
            args.in_obj.display(),
            args.out_dir.display()
        )
    })?;

    println!(
        "Wrote {} tiles ({} leaves, depth {}) to {}",
        summary.tiles,
        summary.leaves,
        summary.height,
        summary.tileset_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "objtiles",
            "in.obj",
            "out",
            "--max-depth",
            "3",
            "-s",
            "0",
            "--up-axis",
            "y",
            "-vv",
            "--debug-glb",
        ]);
        assert_eq!(args.verbose, 2);
        let config = args.tiler_config().unwrap();
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.target_texels_per_tile, None);
        assert_eq!(config.up_axis, UpAxis::Y);
        assert!(config.debug_glb);
        assert!(!config.overwrite);
        assert_eq!(config.max_faces_per_leaf, 20_000);
    }

    #[test]
    fn invalid_flags_are_rejected() {
        let args = Args::parse_from(["objtiles", "in.obj", "out", "--max-depth", "40"]);
        assert!(args.tiler_config().is_err());
    }
}
