//! OBJ/MTL/texture loading.
//!
//! Every model in the OBJ is merged into one indexed [`Mesh`]. When the
//! materials reference more than one texture the images are stacked
//! vertically into a single texture and each material's UVs are squeezed
//! into its band, so everything downstream deals with exactly one image.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glam::{DVec3, Vec2};
use image::{Rgba, RgbaImage};
use tracing::{info, warn};

use crate::error::{MeshError, MeshResult};
use crate::mesh::{Mesh, Vertex};

/// Where one material's texels live inside the combined texture.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Band {
    width: u32,
    height: u32,
    y_offset: u32,
}

impl Band {
    /// Map a UV addressing the band's own image to the combined image.
    fn remap(&self, uv: Vec2, total: (u32, u32)) -> Vec2 {
        let (tw, th) = (total.0 as f32, total.1 as f32);
        let u = uv.x * self.width as f32 / tw;
        let row = self.y_offset as f32 + (1.0 - uv.y) * self.height as f32;
        Vec2::new(u, 1.0 - row / th)
    }
}

/// Images contributing to the combined texture, deduplicated by source.
#[derive(Default)]
struct BandSet {
    images: Vec<RgbaImage>,
    by_file: HashMap<PathBuf, usize>,
    by_color: HashMap<[u8; 4], usize>,
}

impl BandSet {
    fn file(&mut self, path: PathBuf) -> MeshResult<usize> {
        if let Some(&i) = self.by_file.get(&path) {
            return Ok(i);
        }
        let img = image::open(&path)
            .map_err(|source| MeshError::Image {
                path: path.clone(),
                source,
            })?
            .to_rgba8();
        self.images.push(img);
        self.by_file.insert(path, self.images.len() - 1);
        Ok(self.images.len() - 1)
    }

    fn color(&mut self, rgba: [u8; 4]) -> usize {
        *self.by_color.entry(rgba).or_insert_with(|| {
            self.images.push(RgbaImage::from_pixel(1, 1, Rgba(rgba)));
            self.images.len() - 1
        })
    }

    /// Stack the images top to bottom. A single image is used as is.
    fn into_texture(mut self) -> (RgbaImage, Vec<Band>) {
        if self.images.len() == 1 {
            let img = self.images.remove(0);
            let band = Band {
                width: img.width(),
                height: img.height(),
                y_offset: 0,
            };
            return (img, vec![band]);
        }

        let width = self.images.iter().map(RgbaImage::width).max().unwrap_or(1);
        let height = self.images.iter().map(RgbaImage::height).sum::<u32>().max(1);
        let mut combined = RgbaImage::new(width, height);
        let mut bands = Vec::with_capacity(self.images.len());
        let mut y_offset = 0;
        for img in &self.images {
            image::imageops::replace(&mut combined, img, 0, i64::from(y_offset));
            bands.push(Band {
                width: img.width(),
                height: img.height(),
                y_offset,
            });
            y_offset += img.height();
        }
        (combined, bands)
    }
}

fn to_u8(c: f64) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn resolve_texture(obj_path: &Path, name: &str) -> PathBuf {
    let base = obj_path.parent().unwrap_or_else(|| Path::new("."));
    base.join(name.replace('\\', "/"))
}

/// Load an OBJ file, its MTL library and the textures it references.
///
/// Faces are triangulated and vertices are unified so that one index
/// addresses both position and UV.
pub fn load_obj(path: impl AsRef<Path>) -> MeshResult<Mesh> {
    let path = path.as_ref();
    std::fs::metadata(path).map_err(|source| MeshError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let options = tobj::LoadOptions {
        single_index: true,
        triangulate: true,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    };
    let obj_err = |source| MeshError::Obj {
        path: path.to_path_buf(),
        source,
    };
    let (models, materials) = tobj::load_obj(path, &options).map_err(obj_err)?;
    let materials = materials.map_err(obj_err)?;

    let mut bands = BandSet::default();
    let mut material_band = Vec::with_capacity(materials.len());
    for material in &materials {
        let band = match &material.diffuse_texture {
            Some(name) if !name.trim().is_empty() => {
                bands.file(resolve_texture(path, name.trim()))?
            }
            _ => {
                warn!(material = %material.name, "material has no map_Kd, using its diffuse colour");
                let [r, g, b] = material.diffuse.map_or([1.0; 3], |d| d.map(f64::from));
                bands.color([to_u8(r), to_u8(g), to_u8(b), 255])
            }
        };
        material_band.push(band);
    }

    // Bands for models without a usable material are only added on demand.
    let model_bands: Vec<usize> = models
        .iter()
        .map(|m| match m.mesh.material_id.and_then(|id| material_band.get(id)) {
            Some(&band) => band,
            None => bands.color([255; 4]),
        })
        .collect();

    let (texture, band_layout) = bands.into_texture();
    let dims = texture.dimensions();
    let single = band_layout.len() == 1;

    let mut vertices = Vec::new();
    let mut faces = Vec::new();
    for (model, &band_index) in models.iter().zip(&model_bands) {
        let mesh = &model.mesh;
        let base = u32::try_from(vertices.len())
            .map_err(|_| MeshError::DegenerateMesh("more than u32::MAX vertices".into()))?;
        let count = mesh.positions.len() / 3;
        let has_uvs = mesh.texcoords.len() == count * 2;
        if !has_uvs && count > 0 {
            warn!(model = %model.name, "model has no texture coordinates");
        }

        let band = band_layout[band_index];
        for i in 0..count {
            let p = &mesh.positions[i * 3..i * 3 + 3];
            let uv = if has_uvs {
                let t = &mesh.texcoords[i * 2..i * 2 + 2];
                Vec2::new(t[0] as f32, t[1] as f32).clamp(Vec2::ZERO, Vec2::ONE)
            } else {
                Vec2::ZERO
            };
            vertices.push(Vertex {
                position: DVec3::new(f64::from(p[0]), f64::from(p[1]), f64::from(p[2])),
                uv: if single { uv } else { band.remap(uv, dims) },
            });
        }

        faces.extend(
            mesh.indices
                .chunks_exact(3)
                .map(|tri| [tri[0] + base, tri[1] + base, tri[2] + base]),
        );
    }

    info!(
        path = %path.display(),
        models = models.len(),
        vertices = vertices.len(),
        faces = faces.len(),
        texture_width = dims.0,
        texture_height = dims.1,
        "loaded mesh"
    );

    Ok(Mesh {
        vertices,
        faces,
        texture,
    })
}
