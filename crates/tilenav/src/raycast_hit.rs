//! Raycast hit information

use super::PolyRef;
use tilenav_common::vlerp;

/// Outcome of walking a segment across the mesh
#[derive(Debug, Clone, PartialEq)]
pub struct RaycastHit {
    /// Segment parameter of the wall hit, `f32::MAX` if the segment end was
    /// reached without hitting a wall
    pub t: f32,

    /// Normal of the wall that was hit, facing back towards the walkable side
    pub hit_normal: [f32; 3],

    /// Edge of the last visited polygon the wall lies on
    pub hit_edge_index: Option<usize>,

    /// Polygons visited by the walk, in order
    pub path: Vec<PolyRef>,

    /// The walk visited more polygons than `path` holds
    pub path_truncated: bool,
}

impl RaycastHit {
    /// Creates a RaycastHit with no hit (t = f32::MAX)
    pub fn no_hit() -> Self {
        Self {
            t: f32::MAX,
            hit_normal: [0.0; 3],
            hit_edge_index: None,
            path: Vec::new(),
            path_truncated: false,
        }
    }

    /// Creates a RaycastHit with a wall hit
    pub fn wall_hit(t: f32, normal: [f32; 3], edge_index: usize) -> Self {
        Self {
            t,
            hit_normal: normal,
            hit_edge_index: Some(edge_index),
            path: Vec::new(),
            path_truncated: false,
        }
    }

    /// Checks if this represents a wall hit
    pub fn hit_wall(&self) -> bool {
        self.t < f32::MAX
    }

    /// Sets the visited polygons
    pub fn with_path(mut self, path: Vec<PolyRef>) -> Self {
        self.path = path;
        self
    }

    /// Point of the wall hit on the segment `start -> end`
    pub fn hit_position(&self, start: &[f32; 3], end: &[f32; 3]) -> Option<[f32; 3]> {
        self.hit_wall().then(|| vlerp(start, end, self.t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raycast_hit_no_hit() {
        let hit = RaycastHit::no_hit();
        assert_eq!(hit.t, f32::MAX);
        assert!(!hit.hit_wall());
        assert!(hit.path.is_empty());
        assert_eq!(hit.hit_position(&[0.0; 3], &[1.0; 3]), None);
    }

    #[test]
    fn test_raycast_hit_wall() {
        let hit = RaycastHit::wall_hit(0.5, [-1.0, 0.0, 0.0], 2)
            .with_path(vec![PolyRef::new(1), PolyRef::new(2)]);
        assert!(hit.hit_wall());
        assert_eq!(hit.hit_edge_index, Some(2));
        assert_eq!(hit.path.len(), 2);
        assert_eq!(
            hit.hit_position(&[0.0, 0.0, 0.0], &[4.0, 2.0, 0.0]),
            Some([2.0, 1.0, 0.0])
        );
    }
}
