//! Cropping a node's faces out of the source mesh.
//!
//! A [`Partition`] is self-contained: a compact vertex array, local face
//! indices, and an [`AtlasLayout`] describing a new texture made only of the
//! UV islands the faces sample, with UVs remapped to address it.

use glam::{DVec3, Vec2};

use crate::atlas::{AtlasLayout, UvIslands};
use crate::bounds::Aabb;
use crate::error::{MeshError, MeshResult};
use crate::mesh::Mesh;
use crate::octree::OctreeNode;

/// Half-open pixel rectangle `[x0, x1) × [y0, y1)` in image space, rows
/// counted from the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelWindow {
    /// Identity of [`PixelWindow::union`]. Has no valid size.
    pub const EMPTY: Self = Self {
        x0: u32::MAX,
        y0: u32::MAX,
        x1: 0,
        y1: 0,
    };

    /// Window covering the UV rectangle `min..=max` of a `dims` sized image,
    /// grown by `margin` pixels on each side and clamped to the image.
    #[must_use]
    pub fn covering(min: Vec2, max: Vec2, dims: (u32, u32), margin: u32) -> Self {
        let (w, h) = (f64::from(dims.0), f64::from(dims.1));
        let m = f64::from(margin);
        let clamp = |v: f64, hi: u32| v.clamp(0.0, f64::from(hi)) as u32;

        let mut x0 = clamp((f64::from(min.x) * w).floor() - m, dims.0);
        let mut x1 = clamp((f64::from(max.x) * w).ceil() + m, dims.0);
        let mut y0 = clamp(((1.0 - f64::from(max.y)) * h).floor() - m, dims.1);
        let mut y1 = clamp(((1.0 - f64::from(min.y)) * h).ceil() + m, dims.1);

        // A degenerate UV range still needs one texel to sample.
        if x1 <= x0 {
            x0 = x0.min(dims.0.saturating_sub(1));
            x1 = x0 + 1;
        }
        if y1 <= y0 {
            y0 = y0.min(dims.1.saturating_sub(1));
            y1 = y0 + 1;
        }
        Self { x0, y0, x1, y1 }
    }

    /// Smallest window containing both.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }
}

/// Geometry of one tile with node-local vertex numbering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CroppedMesh {
    pub positions: Vec<DVec3>,
    /// UVs addressing the repacked texture, OBJ convention.
    pub uvs: Vec<Vec2>,
    pub faces: Vec<[u32; 3]>,
}

impl CroppedMesh {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Everything needed to encode one tile.
#[derive(Debug, Clone)]
pub struct Partition {
    pub mesh: CroppedMesh,
    /// Where the repacked texture takes its texels from. Rendered against
    /// the source texture by [`crate::compress`].
    pub atlas: AtlasLayout,
    /// Tight bounds of `mesh.positions`.
    pub bounds: Aabb,
}

/// Extract the faces of `node` into a self-contained [`Partition`].
///
/// `margin` is in source texels and pads every UV island.
///
/// # Errors
///
/// [`MeshError::EmptyRegion`] when the node has no faces.
pub fn partition(mesh: &Mesh, node: &OctreeNode, margin: u32) -> MeshResult<Partition> {
    if node.faces.is_empty() {
        return Err(MeshError::EmptyRegion {
            path: node.path.to_string(),
        });
    }

    let mut remap = vec![u32::MAX; mesh.vertex_count()];
    let mut used = Vec::new();
    let faces: Vec<[u32; 3]> = node
        .faces
        .iter()
        .map(|&f| {
            mesh.faces[f as usize].map(|global| {
                let slot = &mut remap[global as usize];
                if *slot == u32::MAX {
                    *slot = used.len() as u32;
                    used.push(global);
                }
                *slot
            })
        })
        .collect();

    let islands = UvIslands::detect(mesh, &node.faces, margin);
    let atlas = AtlasLayout::pack(&islands.windows);

    // A vertex lies in exactly one island, so every face maps it the same way.
    let dims = mesh.texture.dimensions();
    let mut uvs = vec![Vec2::ZERO; used.len()];
    for (local, &island) in faces.iter().zip(&islands.of_face) {
        for &l in local {
            let global = used[l as usize] as usize;
            uvs[l as usize] = atlas.remap(island, mesh.vertices[global].uv, dims);
        }
    }

    let positions: Vec<DVec3> = used
        .iter()
        .map(|&i| mesh.vertices[i as usize].position)
        .collect();
    let bounds = Aabb::from_points(positions.iter().copied());

    Ok(Partition {
        mesh: CroppedMesh {
            positions,
            uvs,
            faces,
        },
        atlas,
        bounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::tests::corner_charts;
    use crate::mesh::Vertex;
    use crate::mesh::tests::tilted_quad;
    use crate::octree::{Octree, StopRule};
    use crate::path::OctantPath;
    use image::{Rgba, RgbaImage};

    fn node_with(faces: Vec<u32>) -> OctreeNode {
        OctreeNode {
            bounds: Aabb::new(DVec3::ZERO, DVec3::ONE),
            depth: 0,
            path: OctantPath::root(),
            faces,
            children: Vec::new(),
            parent: None,
        }
    }

    /// 8x8 checkerboard of 1-pixel cells, black where `x + y` is even.
    fn checkerboard() -> RgbaImage {
        RgbaImage::from_fn(8, 8, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        })
    }

    /// Texel a UV samples in an image, nearest neighbour.
    fn sample(img: &RgbaImage, uv: Vec2) -> Rgba<u8> {
        let x = ((uv.x * img.width() as f32) as u32).min(img.width() - 1);
        let y = (((1.0 - uv.y) * img.height() as f32) as u32).min(img.height() - 1);
        *img.get_pixel(x, y)
    }

    #[test]
    fn window_formula_and_clamping() {
        let w = PixelWindow::covering(Vec2::new(0.25, 0.25), Vec2::new(0.5, 0.75), (8, 8), 1);
        assert_eq!(w, PixelWindow { x0: 1, y0: 1, x1: 5, y1: 7 });

        let full = PixelWindow::covering(Vec2::ZERO, Vec2::ONE, (8, 4), 2);
        assert_eq!(full, PixelWindow { x0: 0, y0: 0, x1: 8, y1: 4 });

        let point = PixelWindow::covering(Vec2::ONE, Vec2::ONE, (8, 8), 0);
        assert_eq!((point.width(), point.height()), (1, 1));
    }

    #[test]
    fn vertices_numbered_in_first_use_order() {
        let mesh = tilted_quad(4);
        let p = partition(&mesh, &node_with(vec![1]), 0).unwrap();
        // Face 1 is [0, 2, 3].
        assert_eq!(p.mesh.faces, vec![[0, 1, 2]]);
        assert_eq!(
            p.mesh.positions,
            vec![
                mesh.vertices[0].position,
                mesh.vertices[2].position,
                mesh.vertices[3].position
            ]
        );
        assert_eq!(p.bounds.max, DVec3::new(2.0, 2.0, 1.0));

        let both = partition(&mesh, &node_with(vec![0, 1]), 0).unwrap();
        assert_eq!(both.mesh.vertex_count(), 4);
        assert_eq!(both.mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn remapped_uvs_sample_the_same_texels() {
        let mut mesh = tilted_quad(8);
        mesh.texture = checkerboard();
        // Texel centres inside the 3..6 x 2..5 pixel block.
        let uv_of = |x: f32, y: f32| Vec2::new((x + 0.5) / 8.0, 1.0 - (y + 0.5) / 8.0);
        let corners = [uv_of(3.0, 2.0), uv_of(5.0, 2.0), uv_of(5.0, 4.0), uv_of(3.0, 4.0)];
        for (v, uv) in mesh.vertices.iter_mut().zip(corners) {
            *v = Vertex { uv, ..*v };
        }

        let p = partition(&mesh, &node_with(vec![0, 1]), 1).unwrap();
        assert_eq!(p.atlas.slots.len(), 1);
        assert_eq!(p.atlas.slots[0].source, PixelWindow { x0: 2, y0: 1, x1: 7, y1: 6 });
        assert_eq!((p.atlas.width, p.atlas.height), (5, 5));

        let texture = p.atlas.render(&mesh.texture, 1.0);
        for (local, global) in [0usize, 1, 2, 3].into_iter().zip([0usize, 1, 2, 3]) {
            let original = sample(&mesh.texture, mesh.vertices[global].uv);
            let cropped = sample(&texture, p.mesh.uvs[local]);
            assert_eq!(original, cropped, "vertex {global}");
        }
    }

    #[test]
    fn scattered_charts_are_packed_tightly() {
        let mesh = corner_charts(1024, 16);
        let tree = Octree::build(&mesh, &StopRule::default()).unwrap();
        assert!(tree.root().is_leaf());

        let p = partition(&mesh, tree.root(), 2).unwrap();
        assert_eq!(p.atlas.slots.len(), 2);
        assert!(p.atlas.texel_count() < 4096, "{}x{}", p.atlas.width, p.atlas.height);

        let texture = p.atlas.render(&mesh.texture, 1.0);
        assert_eq!(texture.dimensions(), (p.atlas.width, p.atlas.height));
        assert!(p.mesh.uvs.iter().all(|uv| uv.cmpge(Vec2::ZERO).all() && uv.cmple(Vec2::ONE).all()));

        // Island placement is a translation in pixel space, so face centres
        // land on the same texel in both images.
        let centre = |uvs: [Vec2; 3]| (uvs[0] + uvs[1] + uvs[2]) / 3.0;
        for (local, global) in p.mesh.faces.iter().zip(&mesh.faces) {
            let src = centre(global.map(|i| mesh.vertices[i as usize].uv));
            let packed = centre(local.map(|i| p.mesh.uvs[i as usize]));
            assert_eq!(sample(&mesh.texture, src), sample(&texture, packed));
        }
    }

    #[test]
    fn empty_node_is_an_error() {
        let mesh = tilted_quad(4);
        let err = partition(&mesh, &node_with(Vec::new()), 0).unwrap_err();
        assert!(matches!(err, MeshError::EmptyRegion { .. }));
    }
}
