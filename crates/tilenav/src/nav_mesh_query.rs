//! Path queries over the navigation mesh
//!
//! `find_path` searches the polygon graph for a corridor with A*, and
//! `find_straight_path` pulls a string through the corridor's portals to get
//! the corner points an agent has to walk through.

use super::node_pool::{NodeFlags, NodePool, NodeQueue};
use super::{NavMesh, PolyRef, QueryFilter, Status};
use tilenav_common::{Result, dist_pt_seg_sqr_2d, tri_area_2d, v_equal, vdist};

/// Default maximum number of nodes in the search pool
pub const DEFAULT_MAX_NODES: usize = 2048;

/// Default bound on polygons recorded by a single raycast
pub const DEFAULT_MAX_VISITED: usize = 256;

/// Heuristic scale, slightly below one so the search stays admissible
const H_SCALE: f32 = 0.999;

/// Portals closer to the start than this are skipped
const PORTAL_SKIP_DIST_SQR: f32 = 0.001 * 0.001;

/// Corner points of a path, bounded by a maximum point count
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StraightPath {
    /// Points from start to end
    pub waypoints: Vec<[f32; 3]>,
    /// Polygon entered at each point, null for the end point
    pub poly_refs: Vec<PolyRef>,
    /// Set when points had to be dropped to respect the maximum
    pub truncated: bool,
    max_points: usize,
}

impl StraightPath {
    /// Creates an empty path holding at most `max_points` points
    pub fn with_capacity(max_points: usize) -> Self {
        Self {
            waypoints: Vec::with_capacity(max_points.min(256)),
            poly_refs: Vec::with_capacity(max_points.min(256)),
            truncated: false,
            max_points,
        }
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Appends a point, merging it into the previous one if they are equal
    ///
    /// Returns false once the path is full; the point is dropped and the
    /// path marked as truncated.
    fn append(&mut self, point: [f32; 3], reference: PolyRef) -> bool {
        if let Some(last) = self.waypoints.last() {
            if v_equal(last, &point) {
                if let Some(last_ref) = self.poly_refs.last_mut() {
                    *last_ref = reference;
                }
                return true;
            }
        }
        if self.waypoints.len() >= self.max_points {
            self.truncated = true;
            return false;
        }
        self.waypoints.push(point);
        self.poly_refs.push(reference);
        true
    }
}

/// Navigation mesh query structure
///
/// Borrows the mesh for the duration of the queries; the mesh cannot change
/// while a query object exists.
#[derive(Debug)]
pub struct NavMeshQuery<'a> {
    pub(crate) nav_mesh: &'a NavMesh,
    node_pool: NodePool,
    open_list: NodeQueue,
    pub(crate) max_visited: usize,
}

impl<'a> NavMeshQuery<'a> {
    /// Creates a query object with the default limits
    pub fn new(nav_mesh: &'a NavMesh) -> Self {
        Self::with_limits(nav_mesh, DEFAULT_MAX_NODES, DEFAULT_MAX_VISITED)
    }

    /// Creates a query object with explicit search limits
    pub fn with_limits(nav_mesh: &'a NavMesh, max_nodes: usize, max_visited: usize) -> Self {
        Self {
            nav_mesh,
            node_pool: NodePool::new(max_nodes),
            open_list: NodeQueue::new(),
            max_visited,
        }
    }

    pub fn nav_mesh(&self) -> &NavMesh {
        self.nav_mesh
    }

    /// Finds the polygon nearest to `center` within the query box
    pub fn find_nearest_poly(
        &self,
        center: &[f32; 3],
        half_extents: &[f32; 3],
        filter: &QueryFilter,
    ) -> Option<(PolyRef, [f32; 3])> {
        self.nav_mesh.find_nearest_poly(center, half_extents, filter)
    }

    /// Finds a polygon corridor from `start_ref` to `end_ref`
    ///
    /// Returns `None` when the goal cannot be reached, including when the
    /// node pool runs out before the goal is found.
    pub fn find_path(
        &mut self,
        start_ref: PolyRef,
        end_ref: PolyRef,
        start_pos: &[f32; 3],
        end_pos: &[f32; 3],
        filter: &QueryFilter,
    ) -> Result<Option<Vec<PolyRef>>> {
        let nav_mesh = self.nav_mesh;
        if !nav_mesh.is_valid_poly_ref(start_ref) || !nav_mesh.is_valid_poly_ref(end_ref) {
            return Err(Status::InvalidParam.with_context("invalid start or end polygon"));
        }

        if start_ref == end_ref {
            return Ok(Some(vec![start_ref]));
        }

        self.node_pool.clear();
        self.open_list.clear();

        let Some(start_index) = self.node_pool.get_node(start_ref) else {
            return Ok(None);
        };
        {
            let start = self.node_pool.node_mut(start_index);
            start.pos = *start_pos;
            start.cost = 0.0;
            start.total = vdist(start_pos, end_pos) * H_SCALE;
            start.parent = None;
            start.flags.insert(NodeFlags::OPEN);
        }
        self.open_list.push(&self.node_pool, start_index);

        let mut goal = None;
        let mut out_of_nodes = false;

        while let Some(best_index) = self.open_list.pop(&self.node_pool) {
            let (best_ref, best_pos, best_cost, best_parent) = {
                let best = self.node_pool.node_mut(best_index);
                best.flags.remove(NodeFlags::OPEN);
                best.flags.insert(NodeFlags::CLOSED);
                (best.id, best.pos, best.cost, best.parent)
            };

            if best_ref == end_ref {
                goal = Some(best_index);
                break;
            }

            let parent_ref = best_parent.map(|p| self.node_pool.node(p).id);
            let (_, best_poly) = nav_mesh.get_tile_and_poly_by_ref(best_ref)?;

            for link in &best_poly.links {
                let neighbour_ref = link.reference;
                if Some(neighbour_ref) == parent_ref {
                    continue;
                }

                let (_, neighbour_poly) = nav_mesh.get_tile_and_poly_by_ref(neighbour_ref)?;
                if !neighbour_poly.is_ground() || !filter.pass_filter(neighbour_poly.flags) {
                    continue;
                }

                let Some(neighbour_index) = self.node_pool.get_node(neighbour_ref) else {
                    out_of_nodes = true;
                    continue;
                };

                let neighbour_flags = self.node_pool.node(neighbour_index).flags;
                if neighbour_flags == NodeFlags::default() {
                    self.node_pool.node_mut(neighbour_index).pos =
                        nav_mesh.get_edge_mid_point(best_ref, neighbour_ref)?;
                }
                let neighbour_pos = self.node_pool.node(neighbour_index).pos;

                let step = filter.cost(vdist(&best_pos, &neighbour_pos), best_poly.area);
                let (cost, heuristic) = if neighbour_ref == end_ref {
                    let end_cost = filter.cost(vdist(&neighbour_pos, end_pos), neighbour_poly.area);
                    (best_cost + step + end_cost, 0.0)
                } else {
                    (best_cost + step, vdist(&neighbour_pos, end_pos) * H_SCALE)
                };
                let total = cost + heuristic;

                let neighbour = self.node_pool.node_mut(neighbour_index);
                if (neighbour.flags.contains(NodeFlags::OPEN)
                    || neighbour.flags.contains(NodeFlags::CLOSED))
                    && total >= neighbour.total
                {
                    continue;
                }

                neighbour.parent = Some(best_index);
                neighbour.cost = cost;
                neighbour.total = total;
                neighbour.flags.remove(NodeFlags::CLOSED);
                neighbour.flags.insert(NodeFlags::OPEN);
                self.open_list.push(&self.node_pool, neighbour_index);
            }
        }

        let Some(goal_index) = goal else {
            if out_of_nodes {
                log::debug!(
                    "Path search from {start_ref} to {end_ref} ran out of nodes ({} max)",
                    self.node_pool.max_nodes()
                );
            } else {
                log::debug!("No corridor from {start_ref} to {end_ref}");
            }
            return Ok(None);
        };

        let mut path = Vec::new();
        let mut current = Some(goal_index);
        while let Some(index) = current {
            let node = self.node_pool.node(index);
            path.push(node.id);
            current = node.parent;
        }
        path.reverse();

        log::debug!(
            "Found corridor of {} polygons visiting {} nodes",
            path.len(),
            self.node_pool.node_count()
        );
        Ok(Some(path))
    }

    /// Pulls a string through the portals of `path`
    ///
    /// The start and end points are clamped into the first and last polygon.
    /// Consecutive equal points are merged, and at most `max_points` points
    /// are produced; later points are dropped and the result marked as
    /// truncated.
    pub fn find_straight_path(
        &self,
        start_pos: &[f32; 3],
        end_pos: &[f32; 3],
        path: &[PolyRef],
        max_points: usize,
    ) -> Result<StraightPath> {
        let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
            return Err(Status::InvalidParam.with_context("empty corridor"));
        };

        let mut out = StraightPath::with_capacity(max_points);

        let closest_start = self.nav_mesh.closest_point_on_poly_boundary(first, start_pos)?;
        let mut closest_end = self.nav_mesh.closest_point_on_poly_boundary(last, end_pos)?;

        if !out.append(closest_start, first) {
            return Ok(out);
        }

        if path.len() > 1 {
            let mut portal_apex = closest_start;
            let mut portal_left = portal_apex;
            let mut portal_right = portal_apex;
            let mut apex_index = 0;
            let mut left_index = 0;
            let mut right_index = 0;
            let mut left_poly_ref = first;
            let mut right_poly_ref = first;

            let mut i = 0;
            while i < path.len() {
                let (left, right, next_ref) = if i + 1 < path.len() {
                    let (left, right) = match self.nav_mesh.get_portal_points(path[i], path[i + 1]) {
                        Ok(portal) => portal,
                        Err(_) => {
                            // Corridor is broken here, end the path in the last reachable polygon
                            closest_end = self.nav_mesh.closest_point_on_poly_boundary(path[i], end_pos)?;
                            out.append(closest_end, PolyRef::NULL);
                            return Ok(out);
                        }
                    };

                    if i == 0 {
                        let (d, _) = dist_pt_seg_sqr_2d(&portal_apex, &left, &right);
                        if d < PORTAL_SKIP_DIST_SQR {
                            i += 1;
                            continue;
                        }
                    }
                    (left, right, path[i + 1])
                } else {
                    (closest_end, closest_end, PolyRef::NULL)
                };

                // Right side of the funnel
                if tri_area_2d(&portal_apex, &portal_right, &right) <= 0.0 {
                    if v_equal(&portal_apex, &portal_right)
                        || tri_area_2d(&portal_apex, &portal_left, &right) > 0.0
                    {
                        portal_right = right;
                        right_poly_ref = next_ref;
                        right_index = i;
                    } else {
                        portal_apex = portal_left;
                        apex_index = left_index;
                        if !out.append(portal_apex, left_poly_ref) {
                            return Ok(out);
                        }
                        portal_left = portal_apex;
                        portal_right = portal_apex;
                        left_index = apex_index;
                        right_index = apex_index;
                        i = apex_index + 1;
                        continue;
                    }
                }

                // Left side of the funnel
                if tri_area_2d(&portal_apex, &portal_left, &left) >= 0.0 {
                    if v_equal(&portal_apex, &portal_left)
                        || tri_area_2d(&portal_apex, &portal_right, &left) < 0.0
                    {
                        portal_left = left;
                        left_poly_ref = next_ref;
                        left_index = i;
                    } else {
                        portal_apex = portal_right;
                        apex_index = right_index;
                        if !out.append(portal_apex, right_poly_ref) {
                            return Ok(out);
                        }
                        portal_left = portal_apex;
                        portal_right = portal_apex;
                        left_index = apex_index;
                        right_index = apex_index;
                        i = apex_index + 1;
                        continue;
                    }
                }

                i += 1;
            }
        }

        out.append(closest_end, PolyRef::NULL);
        Ok(out)
    }
}
