//! 2.5D geometry helpers
//!
//! Navigation polygons live on the XZ plane with a height (Y) component. Most
//! tests here ignore Y; heights are recovered afterwards by interpolation.
//! Polygons are expected to be wound so that `tri_area_2d(v0, v1, v2)` is
//! positive.

/// Squared distance under which two points are considered equal
const EQUAL_THRESHOLD_SQR: f32 = (1.0 / 16384.0) * (1.0 / 16384.0);

/// Epsilon for parallel segment tests
const PARALLEL_EPS: f32 = 0.000_001;

/// Signed area of the triangle `abc` on the XZ plane (times two)
#[inline]
pub fn tri_area_2d(a: &[f32; 3], b: &[f32; 3], c: &[f32; 3]) -> f32 {
    let abx = b[0] - a[0];
    let abz = b[2] - a[2];
    let acx = c[0] - a[0];
    let acz = c[2] - a[2];
    acx * abz - abx * acz
}

/// 2D perp dot product of `u` and `v` on the XZ plane
#[inline]
pub fn perp_2d(u: &[f32; 3], v: &[f32; 3]) -> f32 {
    u[2] * v[0] - u[0] * v[2]
}

#[inline]
pub fn vsub(a: &[f32; 3], b: &[f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vlerp(a: &[f32; 3], b: &[f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

#[inline]
pub fn vdist(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    vdist_sqr(a, b).sqrt()
}

#[inline]
pub fn vdist_sqr(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let d = vsub(b, a);
    d[0] * d[0] + d[1] * d[1] + d[2] * d[2]
}

/// Checks whether two points are equal within a small tolerance
#[inline]
pub fn v_equal(a: &[f32; 3], b: &[f32; 3]) -> bool {
    vdist_sqr(a, b) < EQUAL_THRESHOLD_SQR
}

/// Checks whether two axis-aligned boxes overlap (touching counts)
#[inline]
pub fn overlap_bounds(amin: &[f32; 3], amax: &[f32; 3], bmin: &[f32; 3], bmax: &[f32; 3]) -> bool {
    !(amin[0] > bmax[0]
        || amax[0] < bmin[0]
        || amin[1] > bmax[1]
        || amax[1] < bmin[1]
        || amin[2] > bmax[2]
        || amax[2] < bmin[2])
}

/// Squared XZ distance from `pt` to the segment `pq`, plus the segment parameter
/// of the closest point
pub fn dist_pt_seg_sqr_2d(pt: &[f32; 3], p: &[f32; 3], q: &[f32; 3]) -> (f32, f32) {
    let pqx = q[0] - p[0];
    let pqz = q[2] - p[2];
    let dx = pt[0] - p[0];
    let dz = pt[2] - p[2];
    let d = pqx * pqx + pqz * pqz;
    let mut t = pqx * dx + pqz * dz;
    if d > 0.0 {
        t /= d;
    }
    let t = t.clamp(0.0, 1.0);
    let dx = p[0] + t * pqx - pt[0];
    let dz = p[2] + t * pqz - pt[2];
    (dx * dx + dz * dz, t)
}

/// Crossing-number point in polygon test on the XZ plane
pub fn point_in_polygon_2d(pt: &[f32; 3], verts: &[[f32; 3]]) -> bool {
    let mut inside = false;
    let n = verts.len();
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let vi = &verts[i];
        let vj = &verts[j];
        if ((vi[2] > pt[2]) != (vj[2] > pt[2]))
            && (pt[0] < (vj[0] - vi[0]) * (pt[2] - vi[2]) / (vj[2] - vi[2]) + vi[0])
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Height of the triangle `abc` at the XZ location of `p`, if `p` lies inside it
///
/// Points exactly on an edge count as inside.
pub fn closest_height_on_triangle(
    p: &[f32; 3],
    a: &[f32; 3],
    b: &[f32; 3],
    c: &[f32; 3],
) -> Option<f32> {
    let v0 = vsub(c, a);
    let v1 = vsub(b, a);
    let v2 = vsub(p, a);

    let mut denom = v0[0] * v1[2] - v0[2] * v1[0];
    if denom.abs() < PARALLEL_EPS {
        return None;
    }

    let mut u = v1[2] * v2[0] - v1[0] * v2[2];
    let mut v = v0[0] * v2[2] - v0[2] * v2[0];

    if denom < 0.0 {
        denom = -denom;
        u = -u;
        v = -v;
    }

    if u >= 0.0 && v >= 0.0 && (u + v) <= denom {
        Some(a[1] + (v0[1] * u + v1[1] * v) / denom)
    } else {
        None
    }
}

/// Result of clipping a segment against a convex polygon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentClip {
    /// Segment parameter where the segment enters the polygon
    pub tmin: f32,
    /// Segment parameter where the segment leaves the polygon
    pub tmax: f32,
    /// Edge through which the segment enters, `None` if it starts inside
    pub seg_min: Option<usize>,
    /// Edge through which the segment leaves, `None` if it ends inside
    pub seg_max: Option<usize>,
}

/// Clips the segment `p0 -> p1` against a convex polygon on the XZ plane
///
/// Edge `k` runs from `verts[k]` to `verts[k + 1]`. Edges are visited in a
/// fixed order so coincident-edge cases always resolve the same way. Returns
/// `None` when the segment misses the polygon.
pub fn intersect_segment_poly_2d(
    p0: &[f32; 3],
    p1: &[f32; 3],
    verts: &[[f32; 3]],
) -> Option<SegmentClip> {
    let mut clip = SegmentClip {
        tmin: 0.0,
        tmax: 1.0,
        seg_min: None,
        seg_max: None,
    };

    let dir = vsub(p1, p0);
    let n = verts.len();
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let edge = vsub(&verts[i], &verts[j]);
        let diff = vsub(p0, &verts[j]);
        let num = perp_2d(&edge, &diff);
        let den = perp_2d(&dir, &edge);

        if den.abs() < PARALLEL_EPS {
            // Segment runs parallel to this edge
            if num < 0.0 {
                return None;
            }
            j = i;
            continue;
        }

        let t = num / den;
        if den < 0.0 {
            // Entering across this edge
            if t > clip.tmin {
                clip.tmin = t;
                clip.seg_min = Some(j);
                if clip.tmin > clip.tmax {
                    return None;
                }
            }
        } else if t < clip.tmax {
            // Leaving across this edge
            clip.tmax = t;
            clip.seg_max = Some(j);
            if clip.tmax < clip.tmin {
                return None;
            }
        }
        j = i;
    }

    Some(clip)
}

/// Closest point to `pos` on the boundary of a polygon, on the XZ plane
///
/// Returns `pos` unchanged when it lies inside the polygon. Otherwise the
/// closest edge point is returned with its height interpolated along the edge.
pub fn closest_point_on_polygon_boundary(pos: &[f32; 3], verts: &[[f32; 3]]) -> [f32; 3] {
    if verts.is_empty() || point_in_polygon_2d(pos, verts) {
        return *pos;
    }

    let n = verts.len();
    let mut best_dist = f32::MAX;
    let mut best = *pos;
    let mut j = n - 1;
    for i in 0..n {
        let (d, t) = dist_pt_seg_sqr_2d(pos, &verts[j], &verts[i]);
        if d < best_dist {
            best_dist = d;
            best = vlerp(&verts[j], &verts[i], t);
        }
        j = i;
    }
    best
}

/// Normalized wall normal for the edge `va -> vb`
///
/// The normal lies on the XZ plane and faces the inside of a polygon wound
/// with positive `tri_area_2d`, i.e. back towards a ray that crossed the edge
/// from inside.
pub fn edge_normal_2d(va: &[f32; 3], vb: &[f32; 3]) -> [f32; 3] {
    let dx = vb[0] - va[0];
    let dz = vb[2] - va[2];
    let len = (dx * dx + dz * dz).sqrt();
    if len > 0.0 {
        [dz / len, 0.0, -dx / len]
    } else {
        [0.0; 3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit square wound the way navigation polygons are
    fn unit_square() -> Vec<[f32; 3]> {
        vec![
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 0.0, 0.0],
        ]
    }

    #[test]
    fn test_tri_area_winding() {
        let sq = unit_square();
        assert!(tri_area_2d(&sq[0], &sq[1], &sq[2]) > 0.0);
        assert!(tri_area_2d(&sq[0], &sq[2], &sq[1]) < 0.0);
    }

    #[test]
    fn test_point_in_polygon() {
        let sq = unit_square();
        assert!(point_in_polygon_2d(&[0.5, 0.0, 0.5], &sq));
        assert!(point_in_polygon_2d(&[0.1, 5.0, 0.9], &sq));
        assert!(!point_in_polygon_2d(&[1.5, 0.0, 0.5], &sq));
        assert!(!point_in_polygon_2d(&[-0.1, 0.0, 0.5], &sq));
    }

    #[test]
    fn test_dist_pt_seg() {
        let (d, t) = dist_pt_seg_sqr_2d(&[0.5, 0.0, 1.0], &[0.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!((d - 1.0).abs() < 1e-6);
        assert!((t - 0.5).abs() < 1e-6);

        let (d, t) = dist_pt_seg_sqr_2d(&[-2.0, 0.0, 0.0], &[0.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!((d - 4.0).abs() < 1e-6);
        assert_eq!(t, 0.0);
    }

    #[test]
    fn test_closest_height_on_triangle() {
        let a = [0.0, 0.0, 0.0];
        let b = [0.0, 2.0, 1.0];
        let c = [1.0, 0.0, 0.0];
        let h = closest_height_on_triangle(&[0.25, 0.0, 0.5], &a, &b, &c);
        assert!(h.is_some());
        assert!((h.unwrap_or_default() - 1.0).abs() < 1e-5);

        // Edge points count as inside
        assert_eq!(closest_height_on_triangle(&[0.5, 0.0, 0.0], &a, &b, &c), Some(0.0));
        assert_eq!(closest_height_on_triangle(&[2.0, 0.0, 2.0], &a, &b, &c), None);
    }

    #[test]
    fn test_segment_leaves_through_far_edge() {
        let sq = unit_square();
        let clip = intersect_segment_poly_2d(&[0.5, 0.0, 0.5], &[3.0, 0.0, 0.5], &sq)
            .expect("segment starts inside");
        assert_eq!(clip.seg_min, None);
        // Edge 2 runs from (1,1) to (1,0)
        assert_eq!(clip.seg_max, Some(2));
        assert!((clip.tmax - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_segment_inside_polygon() {
        let sq = unit_square();
        let clip = intersect_segment_poly_2d(&[0.2, 0.0, 0.2], &[0.8, 0.0, 0.7], &sq)
            .expect("segment inside");
        assert_eq!(clip.seg_max, None);
        assert_eq!(clip.tmax, 1.0);
    }

    #[test]
    fn test_zero_length_segment() {
        let sq = unit_square();
        let p = [0.5, 0.0, 0.5];
        let clip = intersect_segment_poly_2d(&p, &p, &sq).expect("point inside");
        assert_eq!(clip.seg_max, None);

        let outside = [2.0, 0.0, 2.0];
        assert!(intersect_segment_poly_2d(&outside, &outside, &sq).is_none());
    }

    #[test]
    fn test_segment_missing_polygon() {
        let sq = unit_square();
        assert!(intersect_segment_poly_2d(&[2.0, 0.0, 2.0], &[3.0, 0.0, 3.0], &sq).is_none());
    }

    #[test]
    fn test_closest_point_on_boundary() {
        let sq = unit_square();
        let inside = [0.3, 0.0, 0.4];
        assert_eq!(closest_point_on_polygon_boundary(&inside, &sq), inside);

        let p = closest_point_on_polygon_boundary(&[2.0, 0.0, 0.5], &sq);
        assert!((p[0] - 1.0).abs() < 1e-6);
        assert!((p[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_edge_normal_faces_inside() {
        let sq = unit_square();
        // Edge 2 is the +X side of the square; its normal faces -X
        let n = edge_normal_2d(&sq[2], &sq[3]);
        assert!((n[0] + 1.0).abs() < 1e-6);
        assert_eq!(n[1], 0.0);
        assert!(n[2].abs() < 1e-6);
    }
}
