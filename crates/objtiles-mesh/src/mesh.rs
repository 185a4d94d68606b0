//! In-memory textured triangle mesh.

use glam::{DVec3, Vec2};
use image::RgbaImage;

use crate::bounds::Aabb;

/// A mesh vertex: position in mesh space and texture coordinate.
///
/// UVs use the OBJ convention, `v = 0` is the bottom row of the texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: DVec3,
    pub uv: Vec2,
}

/// A triangle mesh with a single texture.
///
/// Created once by the loader and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub faces: Vec<[u32; 3]>,
    pub texture: RgbaImage,
}

impl Mesh {
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    fn corners(&self, face: usize) -> [&Vertex; 3] {
        self.faces[face].map(|i| &self.vertices[i as usize])
    }

    /// Centroid of a face, used to decide which octant owns it.
    #[must_use]
    pub fn centroid(&self, face: usize) -> DVec3 {
        let [a, b, c] = self.corners(face);
        (a.position + b.position + c.position) / 3.0
    }

    /// Bounds of all vertices referenced by faces.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(
            self.faces
                .iter()
                .flatten()
                .map(|&i| self.vertices[i as usize].position),
        )
    }

    /// Median world size of one texel, in mesh units per texel.
    ///
    /// Computed over every triangle edge as world length divided by texel
    /// length. The median keeps tiny sliver triangles from skewing the
    /// estimate; the tiler assumes roughly uniform texel density.
    #[must_use]
    pub fn median_texel_size(&self) -> f64 {
        let dims = Vec2::new(self.texture.width() as f32, self.texture.height() as f32);
        let mut ratios: Vec<f64> = Vec::with_capacity(self.faces.len() * 3);
        for face in 0..self.faces.len() {
            let corners = self.corners(face);
            for e in 0..3 {
                let (a, b) = (corners[e], corners[(e + 1) % 3]);
                let texels = f64::from(((a.uv - b.uv) * dims).length());
                if texels > 0.0 {
                    ratios.push(a.position.distance(b.position) / texels);
                }
            }
        }

        if ratios.is_empty() {
            let max_dim = self.texture.width().max(self.texture.height()).max(1);
            return self.bounds().diagonal() / f64::from(max_dim);
        }

        let mid = ratios.len() / 2;
        let (_, median, _) = ratios.select_nth_unstable_by(mid, f64::total_cmp);
        *median
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Rgba;

    /// Two triangles forming a 2x2 square tilted out of the XY plane, textured
    /// with the full image.
    pub(crate) fn tilted_quad(texture_size: u32) -> Mesh {
        let v = |x: f64, y: f64, u: f32, t: f32| Vertex {
            position: DVec3::new(x, y, x * 0.5),
            uv: Vec2::new(u, t),
        };
        Mesh {
            vertices: vec![
                v(0.0, 0.0, 0.0, 0.0),
                v(2.0, 0.0, 1.0, 0.0),
                v(2.0, 2.0, 1.0, 1.0),
                v(0.0, 2.0, 0.0, 1.0),
            ],
            faces: vec![[0, 1, 2], [0, 2, 3]],
            texture: RgbaImage::from_pixel(texture_size, texture_size, Rgba([9, 9, 9, 255])),
        }
    }

    #[test]
    fn centroid_and_bounds() {
        let mesh = tilted_quad(4);
        let c = mesh.centroid(0);
        assert!((c - DVec3::new(4.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0)).length() < 1e-12);
        let b = mesh.bounds();
        assert_eq!(b.min, DVec3::ZERO);
        assert_eq!(b.max, DVec3::new(2.0, 2.0, 1.0));
    }

    #[test]
    fn texel_size_of_axis_aligned_edges() {
        // Ratios are 0.25 (y edges), 0.265 (diagonals) and 0.280 (tilted x
        // edges), two of each; the upper median is a diagonal.
        let mesh = tilted_quad(8);
        let size = mesh.median_texel_size();
        let diagonal = 3.0 / (8.0 * 2f64.sqrt());
        assert!((size - diagonal).abs() < 1e-6, "got {size}");
    }

    #[test]
    fn texel_size_without_uvs_falls_back_to_diagonal() {
        let mut mesh = tilted_quad(10);
        for v in &mut mesh.vertices {
            v.uv = Vec2::ZERO;
        }
        let expected = mesh.bounds().diagonal() / 10.0;
        assert!((mesh.median_texel_size() - expected).abs() < 1e-12);
    }
}
