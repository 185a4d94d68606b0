//! UV island detection and atlas packing.
//!
//! Photogrammetry textures scatter their charts over the whole image, so the
//! texels a node needs are rarely one rectangle. Faces are grouped into UV
//! islands, each island's pixel window is cut from the source, and the
//! windows are packed into a tight [`AtlasLayout`]. Pixels are only touched
//! by [`AtlasLayout::render`], which samples the source through views and
//! writes the atlas at its final resolution.

use std::cmp::Reverse;
use std::collections::HashMap;

use glam::Vec2;
use image::RgbaImage;
use image::imageops::{self, FilterType};

use crate::mesh::Mesh;
use crate::partition::PixelWindow;
use crate::texture::scaled;

/// Islands whose windows share a grid cell of this many texels are merged.
const CELL_SIZE: u32 = 32;

/// Upper bound on packed rectangles per node; the merge grid coarsens until
/// the island count fits.
const MAX_SLOTS: usize = 1024;

/// Union-find over face slots. Roots are always the smallest member, which
/// keeps island numbering independent of union order.
#[derive(Clone)]
struct DisjointSet {
    parent: Vec<u32>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len as u32).collect(),
        }
    }

    fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            let grand = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grand;
            x = grand;
        }
        x
    }

    fn union(&mut self, a: u32, b: u32) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            self.parent[a.max(b) as usize] = a.min(b);
        }
    }
}

/// Faces of a node grouped into UV islands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UvIslands {
    /// Source pixel window of each island, margin included.
    pub windows: Vec<PixelWindow>,
    /// Island index of each face, parallel to the face list it was built from.
    pub of_face: Vec<usize>,
}

impl UvIslands {
    /// Group `faces` into islands.
    ///
    /// Faces sharing a vertex (and therefore its UV) belong to one island.
    /// Islands whose windows land in a common grid cell are merged so that
    /// neighbouring charts are cut once rather than duplicated.
    #[must_use]
    pub fn detect(mesh: &Mesh, faces: &[u32], margin: u32) -> Self {
        let mut connected = DisjointSet::new(faces.len());
        let mut first_use: HashMap<u32, u32> = HashMap::with_capacity(faces.len() * 2);
        for (slot, &f) in (0u32..).zip(faces) {
            for v in mesh.faces[f as usize] {
                match first_use.get(&v) {
                    Some(&other) => connected.union(slot, other),
                    None => {
                        first_use.insert(v, slot);
                    }
                }
            }
        }

        let dims = mesh.texture.dimensions();
        let mut uv_range: Vec<Option<(Vec2, Vec2)>> = vec![None; faces.len()];
        for (slot, &f) in (0u32..).zip(faces) {
            let root = connected.find(slot) as usize;
            for v in mesh.faces[f as usize] {
                let uv = mesh.vertices[v as usize].uv;
                let range = uv_range[root].get_or_insert((uv, uv));
                *range = (range.0.min(uv), range.1.max(uv));
            }
        }
        let chart_windows: Vec<Option<PixelWindow>> = uv_range
            .iter()
            .map(|r| r.map(|(min, max)| PixelWindow::covering(min, max, dims, margin)))
            .collect();

        let mut cell = CELL_SIZE;
        loop {
            let islands = Self::merge_by_cell(&mut connected.clone(), &chart_windows, cell);
            if islands.windows.len() <= MAX_SLOTS || cell >= dims.0.max(dims.1) {
                return islands;
            }
            cell = cell.saturating_mul(2);
        }
    }

    fn merge_by_cell(
        sets: &mut DisjointSet,
        chart_windows: &[Option<PixelWindow>],
        cell: u32,
    ) -> Self {
        let mut owner: HashMap<(u32, u32), u32> = HashMap::new();
        for (slot, window) in (0u32..).zip(chart_windows) {
            let Some(w) = window else { continue };
            for cy in w.y0 / cell..=(w.y1 - 1) / cell {
                for cx in w.x0 / cell..=(w.x1 - 1) / cell {
                    match owner.get(&(cx, cy)) {
                        Some(&other) => sets.union(slot, other),
                        None => {
                            owner.insert((cx, cy), slot);
                        }
                    }
                }
            }
        }

        let mut index_of_root: HashMap<u32, usize> = HashMap::new();
        let mut windows: Vec<PixelWindow> = Vec::new();
        let mut of_face = Vec::with_capacity(chart_windows.len());
        for slot in 0..chart_windows.len() as u32 {
            let root = sets.find(slot);
            let index = *index_of_root.entry(root).or_insert_with(|| {
                windows.push(PixelWindow::EMPTY);
                windows.len() - 1
            });
            if let Some(w) = chart_windows[slot as usize] {
                windows[index] = windows[index].union(w);
            }
            of_face.push(index);
        }
        Self { windows, of_face }
    }
}

/// One source window placed in a packed atlas, at full resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasSlot {
    pub source: PixelWindow,
    pub x: u32,
    pub y: u32,
}

/// Placement of source windows in a new, smaller texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasLayout {
    pub width: u32,
    pub height: u32,
    pub slots: Vec<AtlasSlot>,
}

#[derive(Debug, Clone, Copy)]
struct FreeRect {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

/// Guillotine packing with best short side fit, or `None` if an item does
/// not fit into a `width` x `height` bin.
fn try_pack(
    order: &[usize],
    windows: &[PixelWindow],
    width: u32,
    height: u32,
) -> Option<Vec<(u32, u32)>> {
    let mut free = vec![FreeRect {
        x: 0,
        y: 0,
        w: width,
        h: height,
    }];
    let mut placed = vec![(0, 0); windows.len()];
    for &i in order {
        let (w, h) = (windows[i].width(), windows[i].height());
        let best = free
            .iter()
            .enumerate()
            .filter(|(_, r)| r.w >= w && r.h >= h)
            .min_by_key(|(_, r)| (r.w - w).min(r.h - h))?
            .0;
        let rect = free.swap_remove(best);
        placed[i] = (rect.x, rect.y);
        if rect.w > w {
            free.push(FreeRect {
                x: rect.x + w,
                y: rect.y,
                w: rect.w - w,
                h,
            });
        }
        if rect.h > h {
            free.push(FreeRect {
                x: rect.x,
                y: rect.y + h,
                w: rect.w,
                h: rect.h - h,
            });
        }
    }
    Some(placed)
}

impl AtlasLayout {
    /// A layout holding a whole `width` x `height` image unchanged.
    #[must_use]
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            slots: vec![AtlasSlot {
                source: PixelWindow {
                    x0: 0,
                    y0: 0,
                    x1: width,
                    y1: height,
                },
                x: 0,
                y: 0,
            }],
        }
    }

    /// Pack `windows` without overlap. Slots keep the order of `windows`;
    /// the layout is cut to the used area, so a single window packs to
    /// exactly its own size.
    #[must_use]
    pub fn pack(windows: &[PixelWindow]) -> Self {
        if windows.is_empty() {
            return Self {
                width: 1,
                height: 1,
                slots: Vec::new(),
            };
        }

        let mut order: Vec<usize> = (0..windows.len()).collect();
        order.sort_by_key(|&i| Reverse(windows[i].width().max(windows[i].height())));

        let area: u64 = windows
            .iter()
            .map(|w| u64::from(w.width()) * u64::from(w.height()))
            .sum();
        let side = (area as f64).sqrt().ceil() as u32;
        let max_w = windows.iter().map(PixelWindow::width).max().unwrap_or(1);
        let max_h = windows.iter().map(PixelWindow::height).max().unwrap_or(1);

        // Doubling always terminates: once the bin is as wide as the widest
        // window and as tall as all windows stacked, every window fits.
        let mut bin = (max_w.max(side).next_power_of_two(), max_h.max(side).next_power_of_two());
        let placed = loop {
            if let Some(placed) = try_pack(&order, windows, bin.0, bin.1) {
                break placed;
            }
            if bin.0 <= bin.1 {
                bin.0 = bin.0.saturating_mul(2);
            } else {
                bin.1 = bin.1.saturating_mul(2);
            }
        };

        let slots: Vec<AtlasSlot> = windows
            .iter()
            .zip(placed)
            .map(|(&source, (x, y))| AtlasSlot { source, x, y })
            .collect();
        let width = slots.iter().map(|s| s.x + s.source.width()).max().unwrap_or(1);
        let height = slots.iter().map(|s| s.y + s.source.height()).max().unwrap_or(1);
        Self {
            width,
            height,
            slots,
        }
    }

    #[must_use]
    pub fn texel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Map a UV of the `dims` sized source image, sampled through `slot`,
    /// to the same texel of the atlas.
    #[must_use]
    pub fn remap(&self, slot: usize, uv: Vec2, dims: (u32, u32)) -> Vec2 {
        let s = &self.slots[slot];
        let x = f64::from(s.x) + f64::from(uv.x) * f64::from(dims.0) - f64::from(s.source.x0);
        let row = f64::from(s.y) + (1.0 - f64::from(uv.y)) * f64::from(dims.1)
            - f64::from(s.source.y0);
        Vec2::new(
            (x / f64::from(self.width)) as f32,
            (1.0 - row / f64::from(self.height)) as f32,
        )
    }

    /// Compose the atlas from `source`, scaled by `fraction`.
    ///
    /// Each slot is resampled straight from a view of the source into its
    /// scaled rectangle; no full-resolution copy is made unless `fraction`
    /// keeps the atlas at full size.
    #[must_use]
    pub fn render(&self, source: &RgbaImage, fraction: f64) -> RgbaImage {
        let (tw, th) = (scaled(self.width, fraction), scaled(self.height, fraction));
        let mut out = RgbaImage::new(tw, th);
        let full_size = (tw, th) == (self.width, self.height);
        let (sx, sy) = (
            f64::from(tw) / f64::from(self.width),
            f64::from(th) / f64::from(self.height),
        );
        let edge = |v: u32, s: f64, limit: u32| ((f64::from(v) * s).round() as u32).min(limit);

        for slot in &self.slots {
            let src = slot.source;
            let view = imageops::crop_imm(source, src.x0, src.y0, src.width(), src.height());
            if full_size {
                imageops::replace(&mut out, &*view, i64::from(slot.x), i64::from(slot.y));
                continue;
            }
            let x0 = edge(slot.x, sx, tw - 1);
            let y0 = edge(slot.y, sy, th - 1);
            let x1 = edge(slot.x + src.width(), sx, tw).max(x0 + 1);
            let y1 = edge(slot.y + src.height(), sy, th).max(y0 + 1);
            let resized = imageops::resize(&*view, x1 - x0, y1 - y0, FilterType::CatmullRom);
            imageops::replace(&mut out, &resized, i64::from(x0), i64::from(y0));
        }
        out
    }
}
