//! Spatial subdivision of a mesh into a face-partitioning octree.

use tracing::{debug, info};

use crate::MAX_LEVEL;
use crate::atlas::{AtlasLayout, UvIslands};
use crate::bounds::Aabb;
use crate::error::{MeshError, MeshResult};
use crate::mesh::Mesh;
use crate::path::OctantPath;

/// Index of a node in [`Octree::nodes`]. Ids follow pre-order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const ROOT: Self = Self(0);

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// When a node stops subdividing.
#[derive(Debug, Clone, PartialEq)]
pub struct StopRule {
    /// Nodes at this depth are always leaves. Capped at [`MAX_LEVEL`].
    pub max_depth: u32,
    pub max_faces_per_leaf: usize,
    /// Regions whose longest edge is at most this are leaves.
    pub min_region_size: f64,
    /// Leaves once the UV islands of the node's faces pack into a texture
    /// no larger than this many texels per side.
    pub target_texels_per_tile: Option<u32>,
}

impl Default for StopRule {
    fn default() -> Self {
        Self {
            max_depth: 6,
            max_faces_per_leaf: 20_000,
            min_region_size: 0.0,
            target_texels_per_tile: Some(512),
        }
    }
}

impl StopRule {
    fn is_leaf(&self, mesh: &Mesh, bounds: &Aabb, depth: u32, faces: &[u32]) -> bool {
        if depth >= self.max_depth.min(MAX_LEVEL) || faces.len() <= self.max_faces_per_leaf {
            return true;
        }
        if bounds.size().max_element() <= self.min_region_size {
            return true;
        }
        self.target_texels_per_tile.is_some_and(|target| {
            let atlas = AtlasLayout::pack(&UvIslands::detect(mesh, faces, 0).windows);
            atlas.width <= target && atlas.height <= target
        })
    }
}

/// A node of the octree. Every node owns at least one face.
#[derive(Debug, Clone, PartialEq)]
pub struct OctreeNode {
    /// Nominal region: the root AABB or an octant of the parent's region.
    pub bounds: Aabb,
    pub depth: u32,
    pub path: OctantPath,
    /// Indices into [`Mesh::faces`] whose centroid lies in this region,
    /// ascending.
    pub faces: Vec<u32>,
    /// Non-empty children in ascending octant order.
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
}

impl OctreeNode {
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena-backed octree over the faces of a [`Mesh`].
///
/// Each level of the tree assigns every face to exactly one node, so a
/// node's faces are the disjoint union of its children's faces.
#[derive(Debug, Clone)]
pub struct Octree {
    nodes: Vec<OctreeNode>,
}

impl Octree {
    /// Subdivide `mesh` until every branch meets `rule`.
    ///
    /// # Errors
    ///
    /// [`MeshError::DegenerateMesh`] when the mesh has no faces or its
    /// bounding box has no volume.
    pub fn build(mesh: &Mesh, rule: &StopRule) -> MeshResult<Self> {
        if mesh.faces.is_empty() {
            return Err(MeshError::DegenerateMesh("mesh has no faces".into()));
        }
        let bounds = mesh.bounds();
        let size = bounds.size();
        if !size.is_finite() || size.min_element() <= f64::EPSILON * bounds.diagonal() {
            return Err(MeshError::DegenerateMesh(format!(
                "bounding box {:?}..{:?} has zero volume",
                bounds.min, bounds.max
            )));
        }

        let faces = (0..mesh.faces.len() as u32).collect();
        let mut tree = Self { nodes: Vec::new() };
        tree.subdivide(mesh, rule, bounds, OctantPath::root(), faces, None);

        info!(
            nodes = tree.len(),
            leaves = tree.leaves().count(),
            height = tree.height(),
            "built octree"
        );
        Ok(tree)
    }

    fn subdivide(
        &mut self,
        mesh: &Mesh,
        rule: &StopRule,
        bounds: Aabb,
        path: OctantPath,
        faces: Vec<u32>,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let depth = path.depth();
        let leaf = rule.is_leaf(mesh, &bounds, depth, &faces);
        debug!(%path, faces = faces.len(), leaf, "octree node");

        let mut buckets: [Vec<u32>; 8] = Default::default();
        if !leaf {
            for &f in &faces {
                buckets[usize::from(bounds.octant_of(mesh.centroid(f as usize)))].push(f);
            }
        }
        self.nodes.push(OctreeNode {
            bounds,
            depth,
            path: path.clone(),
            faces,
            children: Vec::new(),
            parent,
        });

        for (octant, bucket) in (0u8..).zip(buckets) {
            if bucket.is_empty() {
                continue;
            }
            let child = self.subdivide(
                mesh,
                rule,
                bounds.octant(octant),
                path.child(octant),
                bucket,
                Some(id),
            );
            self.nodes[id.index()].children.push(child);
        }
        id
    }

    #[must_use]
    pub fn root(&self) -> &OctreeNode {
        &self.nodes[0]
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &OctreeNode {
        &self.nodes[id.index()]
    }

    /// All nodes, in pre-order.
    #[must_use]
    pub fn nodes(&self) -> &[OctreeNode] {
        &self.nodes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Deepest realised depth.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    pub fn leaves(&self) -> impl Iterator<Item = &OctreeNode> {
        self.nodes.iter().filter(|n| n.is_leaf())
    }

    /// Node ids in pre-order, parents before children.
    pub fn preorder(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }
}
