//! Octant paths.

use std::fmt;

/// Position of a node in the octree as the octant digits taken from the
/// root.
///
/// The root has the empty path. Each digit is an octant index `0..=7`
/// as produced by [`crate::Aabb::octant_of`].
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OctantPath(Vec<u8>);

impl OctantPath {
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Path of the child in `octant`.
    #[must_use]
    pub fn child(&self, octant: u8) -> Self {
        debug_assert!(octant < 8);
        let mut digits = self.0.clone();
        digits.push(octant);
        Self(digits)
    }

    #[must_use]
    pub fn depth(&self) -> u32 {
        self.0.len() as u32
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn digits(&self) -> &[u8] {
        &self.0
    }

    /// Whether `self` is an ancestor of (or equal to) `other`.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.0.starts_with(&self.0)
    }
}

/// `"root"` for the empty path, otherwise the digit string (e.g. `"0374"`).
impl fmt::Display for OctantPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("root");
        }
        for d in &self.0 {
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_depth() {
        let root = OctantPath::root();
        assert_eq!(root.to_string(), "root");
        assert_eq!(root.depth(), 0);

        let p = root.child(0).child(3).child(7);
        assert_eq!(p.to_string(), "037");
        assert_eq!(p.depth(), 3);
        assert!(root.is_prefix_of(&p));
        assert!(root.child(0).is_prefix_of(&p));
        assert!(!root.child(3).is_prefix_of(&p));
    }
}
