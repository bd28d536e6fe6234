//! Segment walks across adjacent polygons

use super::raycast_hit::RaycastHit;
use super::{INTERNAL_SIDE, NavMeshQuery, PolyRef, QueryFilter, Status};
use tilenav_common::{Result, dist_pt_seg_sqr_2d, edge_normal_2d, intersect_segment_poly_2d, vlerp};

impl NavMeshQuery<'_> {
    /// Walks the segment `start_pos -> end_pos` from `start_ref` until it
    /// leaves the walkable area or reaches its end
    ///
    /// The segment is clipped against each polygon in 2D; the walk continues
    /// through the link whose portal contains the exit point. When no such
    /// link exists the exit edge is a wall and the hit carries its normal.
    /// Only the first `max_visited` polygons are recorded in the hit's path,
    /// the walk itself always runs to the wall or the segment end.
    pub fn raycast(
        &self,
        start_ref: PolyRef,
        start_pos: &[f32; 3],
        end_pos: &[f32; 3],
        filter: &QueryFilter,
    ) -> Result<RaycastHit> {
        let nav_mesh = self.nav_mesh;
        let mut hit = RaycastHit::no_hit();
        hit.t = 0.0;

        // A walk that never revisits a polygon ends within this many steps
        let max_steps = nav_mesh.poly_count();
        let mut steps = 0;

        let mut current = start_ref;
        loop {
            steps += 1;
            if steps > max_steps {
                return Err(Status::Failure.with_context(format!(
                    "raycast from {start_ref} revisited polygons"
                )));
            }

            let (tile, poly) = nav_mesh.get_tile_and_poly_by_ref(current)?;
            let verts = tile.poly_vertices(poly);

            let Some(clip) = intersect_segment_poly_2d(start_pos, end_pos, &verts) else {
                // Missed the polygon by rounding, the wall is the nearest edge
                let pos = vlerp(start_pos, end_pos, hit.t);
                let nv = verts.len();
                let mut best = (f32::MAX, 0);
                for i in 0..nv {
                    let j = (i + 1) % nv;
                    let (d, _) = dist_pt_seg_sqr_2d(&pos, &verts[i], &verts[j]);
                    if d < best.0 {
                        best = (d, i);
                    }
                }
                let edge = best.1;
                hit.hit_normal = edge_normal_2d(&verts[edge], &verts[(edge + 1) % nv]);
                hit.hit_edge_index = Some(edge);
                return Ok(hit);
            };
            if hit.path.len() < self.max_visited {
                hit.path.push(current);
            } else if !hit.path_truncated {
                log::debug!(
                    "Raycast from {start_ref} visited more than {} polygons, path truncated",
                    self.max_visited
                );
                hit.path_truncated = true;
            }
            if clip.tmax > hit.t {
                hit.t = clip.tmax;
            }

            let Some(exit_edge) = clip.seg_max else {
                // Segment ends inside this polygon
                hit.t = f32::MAX;
                return Ok(hit);
            };

            let nv = verts.len();
            let mut next = None;
            for link in poly.edge_links(exit_edge) {
                let (_, next_poly) = nav_mesh.get_tile_and_poly_by_ref(link.reference)?;
                if !next_poly.is_ground() || !filter.pass_filter(next_poly.flags) {
                    continue;
                }

                if link.side == INTERNAL_SIDE || (link.bmin == 0 && link.bmax == 255) {
                    next = Some(link.reference);
                    break;
                }

                // Seam link covering only part of the edge
                let v0 = &verts[link.edge as usize];
                let v1 = &verts[(link.edge as usize + 1) % nv];
                let axis = if link.side == 0 || link.side == 4 { 2 } else { 0 };
                let s = 1.0 / 255.0;
                let mut lmin = v0[axis] + (v1[axis] - v0[axis]) * (link.bmin as f32 * s);
                let mut lmax = v0[axis] + (v1[axis] - v0[axis]) * (link.bmax as f32 * s);
                if lmin > lmax {
                    std::mem::swap(&mut lmin, &mut lmax);
                }
                let along = start_pos[axis] + (end_pos[axis] - start_pos[axis]) * clip.tmax;
                if along >= lmin && along <= lmax {
                    next = Some(link.reference);
                    break;
                }
            }

            match next {
                Some(reference) => current = reference,
                None => {
                    let va = &verts[exit_edge];
                    let vb = &verts[(exit_edge + 1) % nv];
                    hit.hit_normal = edge_normal_2d(va, vb);
                    hit.hit_edge_index = Some(exit_edge);
                    return Ok(hit);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_mesh_helpers::*;

    #[test]
    fn test_raycast_inside_single_polygon() -> Result<()> {
        let mut mesh = create_nav_mesh(10.0)?;
        mesh.add_tile(&grid_tile(0, 0, 10.0, 1)?)?;
        let filter = QueryFilter::default();
        let query = NavMeshQuery::new(&mesh);
        let (start, pos) = query
            .find_nearest_poly(&[2.0, 0.0, 2.0], &[1.0, 1.0, 1.0], &filter)
            .expect("start polygon");

        let hit = query.raycast(start, &pos, &[8.0, 0.0, 7.0], &filter)?;
        assert!(!hit.hit_wall());
        assert_eq!(hit.path, vec![start]);
        Ok(())
    }

    #[test]
    fn test_raycast_hits_outer_wall() -> Result<()> {
        let mut mesh = create_nav_mesh(10.0)?;
        mesh.add_tile(&grid_tile(0, 0, 10.0, 2)?)?;
        let filter = QueryFilter::default();
        let query = NavMeshQuery::new(&mesh);
        let start_pos = [2.0, 0.0, 2.0];
        let (start, pos) = query
            .find_nearest_poly(&start_pos, &[1.0, 1.0, 1.0], &filter)
            .expect("start polygon");

        let end_pos = [14.0, 0.0, 2.0];
        let hit = query.raycast(start, &pos, &end_pos, &filter)?;
        assert!(hit.hit_wall());
        assert!((hit.t - 8.0 / 12.0).abs() < 1e-5);
        assert_near(hit.hit_normal, [-1.0, 0.0, 0.0], 1e-5);
        assert_eq!(hit.path.len(), 2);
        assert_near(
            hit.hit_position(&pos, &end_pos).expect("wall hit"),
            [10.0, 0.0, 2.0],
            1e-4,
        );
        Ok(())
    }

    #[test]
    fn test_raycast_truncates_path_after_max_visited() -> Result<()> {
        let mut mesh = create_nav_mesh(10.0)?;
        mesh.add_tile(&grid_tile(0, 0, 10.0, 8)?)?;
        let filter = QueryFilter::default();
        let query = NavMeshQuery::with_limits(&mesh, 64, 3);
        let (start, pos) = query
            .find_nearest_poly(&[0.5, 0.0, 0.5], &[0.5, 1.0, 0.5], &filter)
            .expect("start polygon");

        // The walk keeps going past the limit and still finds the far wall
        let end_pos = [12.0, 0.0, 0.5];
        let hit = query.raycast(start, &pos, &end_pos, &filter)?;
        assert!(hit.hit_wall());
        assert!(hit.path_truncated);
        assert_eq!(hit.path.len(), 3);
        assert_near(hit.hit_normal, [-1.0, 0.0, 0.0], 1e-5);
        assert_near(
            hit.hit_position(&pos, &end_pos).expect("wall hit"),
            [10.0, 0.0, 0.5],
            1e-4,
        );

        let unlimited = NavMeshQuery::new(&mesh).raycast(start, &pos, &end_pos, &filter)?;
        assert!(!unlimited.path_truncated);
        assert_eq!(unlimited.path.len(), 8);
        assert_eq!(unlimited.t, hit.t);
        Ok(())
    }

    #[test]
    fn test_raycast_start_just_outside_polygon_hits_nearest_edge() -> Result<()> {
        let mut mesh = create_nav_mesh(10.0)?;
        mesh.add_tile(&grid_tile(0, 0, 10.0, 1)?)?;
        let filter = QueryFilter::default();
        let query = NavMeshQuery::new(&mesh);
        let (start, _) = query
            .find_nearest_poly(&[9.5, 0.0, 5.0], &[1.0, 1.0, 1.0], &filter)
            .expect("start polygon");

        // Start a hair past the +x edge, heading away from the polygon
        let start_pos = [10.01, 0.0, 5.0];
        let end_pos = [15.0, 0.0, 5.0];
        let hit = query.raycast(start, &start_pos, &end_pos, &filter)?;
        assert!(hit.hit_wall());
        assert_eq!(hit.t, 0.0);
        assert!(hit.path.is_empty());
        assert_near(hit.hit_normal, [-1.0, 0.0, 0.0], 1e-5);
        Ok(())
    }
}
