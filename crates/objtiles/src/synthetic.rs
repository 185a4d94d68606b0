//! Synthetic textured meshes written as OBJ/MTL/PNG sets.
//!
//! Used by the `gen_test_mesh` tool and the integration tests.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use glam::{DVec3, Vec2};
use image::{Rgba, RgbaImage};

use crate::error::{Error, Result};

/// A mesh in OBJ terms: per-vertex UVs share the position index.
#[derive(Debug, Clone)]
pub struct SyntheticMesh {
    pub positions: Vec<DVec3>,
    pub uvs: Vec<Vec2>,
    pub faces: Vec<[u32; 3]>,
    pub texture: RgbaImage,
}

/// Checkerboard with `cell`-pixel squares, black in the top-left corner.
#[must_use]
pub fn checkerboard(size: u32, cell: u32) -> RgbaImage {
    let cell = cell.max(1);
    RgbaImage::from_fn(size, size, |x, y| {
        if (x / cell + y / cell) % 2 == 0 {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    })
}

impl SyntheticMesh {
    /// One right triangle spanning the unit square, lifted at one corner so
    /// the bounding box has volume.
    #[must_use]
    pub fn triangle(texture_size: u32) -> Self {
        Self {
            positions: vec![
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(0.0, 1.0, 0.5),
            ],
            uvs: vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)],
            faces: vec![[0, 1, 2]],
            texture: checkerboard(texture_size, (texture_size / 8).max(1)),
        }
    }

    /// `cells × cells` quads over `[0, size]²` on the plane `z = slope · x`.
    ///
    /// UVs map the square onto the whole texture.
    #[must_use]
    pub fn tilted_grid(cells: u32, size: f64, slope: f64, texture_size: u32) -> Self {
        let n = cells + 1;
        let mut positions = Vec::with_capacity((n * n) as usize);
        let mut uvs = Vec::with_capacity((n * n) as usize);
        for j in 0..n {
            for i in 0..n {
                let (u, v) = (f64::from(i) / f64::from(cells), f64::from(j) / f64::from(cells));
                let x = u * size;
                positions.push(DVec3::new(x, v * size, slope * x));
                uvs.push(Vec2::new(u as f32, v as f32));
            }
        }
        let mut faces = Vec::with_capacity((cells * cells * 2) as usize);
        for j in 0..cells {
            for i in 0..cells {
                let a = j * n + i;
                let (b, c, d) = (a + 1, a + n + 1, a + n);
                faces.push([a, b, c]);
                faces.push([a, c, d]);
            }
        }
        Self {
            positions,
            uvs,
            faces,
            texture: checkerboard(texture_size, (texture_size / cells).max(1)),
        }
    }

    /// One small triangle inside each octant of the unit cube, each mapped
    /// to its own cell of a 4×2 texture grid.
    #[must_use]
    pub fn octant_clusters(texture_size: u32) -> Self {
        let mut mesh = Self {
            positions: Vec::new(),
            uvs: Vec::new(),
            faces: Vec::new(),
            texture: checkerboard(texture_size, (texture_size / 8).max(1)),
        };
        for octant in 0..8u32 {
            let bit = |b: u32| if octant & b == 0 { 0.25 } else { 0.75 };
            let c = DVec3::new(bit(4), bit(2), bit(1));
            let cell = Vec2::new((octant % 4) as f32 * 0.25, (octant / 4) as f32 * 0.5);
            let base = mesh.positions.len() as u32;
            mesh.positions.extend([
                c - DVec3::splat(0.25),
                c + DVec3::new(0.25, -0.25, 0.25),
                c + DVec3::splat(0.25),
            ]);
            mesh.uvs.extend([
                cell + Vec2::new(0.02, 0.04),
                cell + Vec2::new(0.23, 0.04),
                cell + Vec2::new(0.23, 0.46),
            ]);
            mesh.faces.push([base, base + 1, base + 2]);
        }
        mesh
    }

    /// Write `{stem}.obj`, `{stem}.mtl` and `{stem}.png` into `dir` and
    /// return the OBJ path.
    pub fn write(&self, dir: &Path, stem: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let png = dir.join(format!("{stem}.png"));
        self.texture
            .save(&png)
            .map_err(|e| Error::io(&png, std::io::Error::other(e)))?;

        let mtl = dir.join(format!("{stem}.mtl"));
        let mtl_text = format!("newmtl textured\nKd 1 1 1\nmap_Kd {stem}.png\n");
        fs::write(&mtl, mtl_text).map_err(|e| Error::io(&mtl, e))?;

        let mut obj_text = format!("mtllib {stem}.mtl\no {stem}\n");
        for p in &self.positions {
            let _ = writeln!(obj_text, "v {} {} {}", p.x, p.y, p.z);
        }
        for uv in &self.uvs {
            let _ = writeln!(obj_text, "vt {} {}", uv.x, uv.y);
        }
        obj_text.push_str("usemtl textured\n");
        for f in &self.faces {
            let [a, b, c] = f.map(|i| i + 1);
            let _ = writeln!(obj_text, "f {a}/{a} {b}/{b} {c}/{c}");
        }
        let obj = dir.join(format!("{stem}.obj"));
        fs::write(&obj, obj_text).map_err(|e| Error::io(&obj, e))?;
        Ok(obj)
    }
}
