//! Axis-aligned bounding boxes.

use glam::DVec3;

/// Axis-aligned bounding box in mesh space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// An empty box that any point will grow.
    pub const EMPTY: Self = Self {
        min: DVec3::INFINITY,
        max: DVec3::NEG_INFINITY,
    };

    #[must_use]
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point, or [`Aabb::EMPTY`].
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |b, p| b.grow(p))
    }

    #[must_use]
    pub fn grow(self, p: DVec3) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    #[must_use]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn half_extents(&self) -> DVec3 {
        (self.max - self.min) * 0.5
    }

    #[must_use]
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    #[must_use]
    pub fn volume(&self) -> f64 {
        let s = self.size();
        s.x * s.y * s.z
    }

    /// Length of the space diagonal.
    #[must_use]
    pub fn diagonal(&self) -> f64 {
        self.size().length()
    }

    /// Whether `other` lies inside this box, allowing `eps` of slack.
    #[must_use]
    pub fn contains(&self, other: &Self, eps: f64) -> bool {
        other.min.cmpge(self.min - eps).all() && other.max.cmple(self.max + eps).all()
    }

    /// Octant of this box that `p` falls into.
    ///
    /// Bits are `x << 2 | y << 1 | z`; a coordinate exactly on the centre
    /// plane goes to the upper half.
    #[must_use]
    pub fn octant_of(&self, p: DVec3) -> u8 {
        let c = self.center();
        (u8::from(p.x >= c.x) << 2) | (u8::from(p.y >= c.y) << 1) | u8::from(p.z >= c.z)
    }

    /// One of the eight equal sub-boxes, indexed as in [`Aabb::octant_of`].
    #[must_use]
    pub fn octant(&self, index: u8) -> Self {
        let c = self.center();
        let pick = |bit: u8, lo: f64, mid: f64, hi: f64| {
            if index & bit == 0 { (lo, mid) } else { (mid, hi) }
        };
        let (x0, x1) = pick(4, self.min.x, c.x, self.max.x);
        let (y0, y1) = pick(2, self.min.y, c.y, self.max.y);
        let (z0, z1) = pick(1, self.min.z, c.z, self.max.z);
        Self::new(DVec3::new(x0, y0, z0), DVec3::new(x1, y1, z1))
    }

    /// 3D Tiles `boundingVolume.box`: centre followed by the three
    /// half-axis column vectors.
    #[must_use]
    pub fn to_box(&self) -> [f64; 12] {
        let c = self.center();
        let h = self.half_extents();
        [
            c.x, c.y, c.z, //
            h.x, 0.0, 0.0, //
            0.0, h.y, 0.0, //
            0.0, 0.0, h.z,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Aabb {
        Aabb::new(DVec3::ZERO, DVec3::ONE)
    }

    #[test]
    fn octants_tile_the_parent() {
        let b = unit();
        let total: f64 = (0..8).map(|i| b.octant(i).volume()).sum();
        assert!((total - b.volume()).abs() < 1e-12);
        for i in 0..8 {
            let o = b.octant(i);
            assert!(b.contains(&o, 0.0));
            assert_eq!(b.octant_of(o.center()), i);
        }
    }

    #[test]
    fn centre_plane_goes_high() {
        let b = unit();
        assert_eq!(b.octant_of(DVec3::splat(0.5)), 7);
        assert_eq!(b.octant_of(DVec3::new(0.49, 0.5, 0.49)), 0b010);
    }

    #[test]
    fn box_layout() {
        let b = Aabb::new(DVec3::new(-1.0, 0.0, 2.0), DVec3::new(1.0, 4.0, 3.0));
        assert_eq!(
            b.to_box(),
            [0.0, 2.0, 2.5, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.5]
        );
    }

    #[test]
    fn empty_grows_to_points() {
        assert!(Aabb::EMPTY.is_empty());
        let b = Aabb::from_points([DVec3::new(1.0, 2.0, 3.0), DVec3::new(-1.0, 5.0, 0.0)]);
        assert!(!b.is_empty());
        assert_eq!(b.min, DVec3::new(-1.0, 2.0, 0.0));
        assert_eq!(b.max, DVec3::new(1.0, 5.0, 3.0));
        assert!(b.union(unit()).contains(&unit(), 0.0));
    }
}
