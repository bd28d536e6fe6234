//! Navigation mesh facade
//!
//! Owns a tiled `NavMesh`, streams tiles in and out and answers path and
//! raycast queries expressed in world positions.

use glam::Vec3;

use super::nav_mesh_query::{DEFAULT_MAX_NODES, DEFAULT_MAX_VISITED};
use super::{NavMesh, NavMeshParams, NavMeshQuery, QueryFilter, TileCoord, TileRef};
use tilenav_common::{Error, Result, vlerp};

/// Path query between two world positions
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct PathfindQuery {
    pub source: Vec3,
    pub target: Vec3,
    /// Half extents of the box searched when snapping source and target
    pub find_nearest_poly_extent: Vec3,
    /// Maximum number of points returned
    pub max_path_points: usize,
}

/// Result of a path query
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct PathfindResult {
    /// False when either end could not be snapped or no corridor exists
    pub path_found: bool,
    /// Corner points from source to target
    pub path_points: Vec<Vec3>,
    /// Set when points were dropped to respect `max_path_points`
    pub truncated: bool,
}

impl PathfindResult {
    fn not_found() -> Self {
        Self::default()
    }
}

/// Straight line visibility query
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct RaycastQuery {
    pub start: Vec3,
    pub end: Vec3,
    /// Half extents of the box searched when snapping the start
    pub find_nearest_poly_extent: Vec3,
}

/// Result of a raycast query
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct RaycastResult {
    /// True when the ray hit a wall before reaching its end
    pub hit: bool,
    /// Hit position, or the ray end when nothing was hit
    pub position: Vec3,
    /// Wall normal, zero when nothing was hit
    pub normal: Vec3,
}

impl RaycastResult {
    fn no_hit(end: Vec3) -> Self {
        Self {
            hit: false,
            position: end,
            normal: Vec3::ZERO,
        }
    }
}

/// Limits and filter used by the facade
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct QueryConfig {
    /// Node pool size of the corridor search
    pub max_nodes: usize,
    /// Visited polygons a raycast records before truncating its path
    pub max_visited: usize,
    /// Tiles that can be loaded at once
    pub max_tiles: usize,
    /// Polygons a single tile may carry
    pub max_polys_per_tile: usize,
    /// Filter applied to every query
    pub filter: QueryFilter,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let params = NavMeshParams::default();
        Self {
            max_nodes: DEFAULT_MAX_NODES,
            max_visited: DEFAULT_MAX_VISITED,
            max_tiles: params.max_tiles,
            max_polys_per_tile: params.max_polys_per_tile,
            filter: QueryFilter::default(),
        }
    }
}

/// Runtime navigation mesh with tile streaming and queries
#[derive(Debug, Default)]
pub struct NavigationMesh {
    nav_mesh: Option<NavMesh>,
    config: QueryConfig,
}

impl NavigationMesh {
    /// Creates an uninitialized navigation mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an uninitialized navigation mesh with custom limits
    pub fn with_config(config: QueryConfig) -> Self {
        Self {
            nav_mesh: None,
            config,
        }
    }

    /// Sets up square tiles of `cell_size` world units anchored at the origin
    ///
    /// May only be called once.
    pub fn initialize(&mut self, cell_size: f32) -> Result<()> {
        if self.nav_mesh.is_some() {
            return Err(Error::Config(
                "navigation mesh is already initialized".to_string(),
            ));
        }
        if self.config.max_nodes == 0 || self.config.max_visited == 0 {
            return Err(Error::Config(
                "query limits must be greater than zero".to_string(),
            ));
        }

        let params = NavMeshParams {
            max_tiles: self.config.max_tiles,
            max_polys_per_tile: self.config.max_polys_per_tile,
            ..NavMeshParams::with_cell_size(cell_size)
        };
        self.nav_mesh = Some(NavMesh::new(params)?);
        log::debug!("Initialized navigation mesh with cell size {cell_size}");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.nav_mesh.is_some()
    }

    /// Underlying tiled mesh, once initialized
    pub fn mesh(&self) -> Option<&NavMesh> {
        self.nav_mesh.as_ref()
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    fn nav_mesh(&self) -> Result<&NavMesh> {
        self.nav_mesh
            .as_ref()
            .ok_or_else(|| Error::Config("navigation mesh is not initialized".to_string()))
    }

    fn nav_mesh_mut(&mut self) -> Result<&mut NavMesh> {
        self.nav_mesh
            .as_mut()
            .ok_or_else(|| Error::Config("navigation mesh is not initialized".to_string()))
    }

    /// Loads a tile blob at the coordinate stored in its header
    ///
    /// Fails if that coordinate already holds a tile.
    pub fn load_tile(&mut self, data: &[u8]) -> Result<TileRef> {
        self.nav_mesh_mut()?.add_tile(data)
    }

    /// Loads a tile blob, replacing any tile at the same coordinate
    pub fn replace_tile(&mut self, data: &[u8]) -> Result<TileRef> {
        self.nav_mesh_mut()?.replace_tile(data)
    }

    /// Removes the tile at `coord`
    pub fn remove_tile(&mut self, coord: TileCoord) -> Result<()> {
        self.nav_mesh_mut()?.remove_tile(coord)
    }

    fn query(&self) -> Result<NavMeshQuery<'_>> {
        Ok(NavMeshQuery::with_limits(
            self.nav_mesh()?,
            self.config.max_nodes,
            self.config.max_visited,
        ))
    }

    /// Finds a path between two world positions
    ///
    /// An unreachable target or a position away from the mesh is a normal
    /// `path_found = false` result, not an error.
    pub fn find_path(&self, query: &PathfindQuery) -> Result<PathfindResult> {
        let mut nav_query = self.query()?;
        check_extent(query.find_nearest_poly_extent)?;
        check_position("source", query.source)?;
        check_position("target", query.target)?;

        let filter = &self.config.filter;
        let extent = query.find_nearest_poly_extent.to_array();

        let Some((start_ref, start_pos)) =
            nav_query.find_nearest_poly(&query.source.to_array(), &extent, filter)
        else {
            log::debug!("No polygon near path source {}", query.source);
            return Ok(PathfindResult::not_found());
        };
        let Some((end_ref, end_pos)) =
            nav_query.find_nearest_poly(&query.target.to_array(), &extent, filter)
        else {
            log::debug!("No polygon near path target {}", query.target);
            return Ok(PathfindResult::not_found());
        };

        let Some(corridor) = nav_query.find_path(start_ref, end_ref, &start_pos, &end_pos, filter)?
        else {
            return Ok(PathfindResult::not_found());
        };

        let straight =
            nav_query.find_straight_path(&start_pos, &end_pos, &corridor, query.max_path_points)?;
        if straight.truncated {
            log::debug!(
                "Path truncated to {} points",
                query.max_path_points
            );
        }

        Ok(PathfindResult {
            path_found: true,
            path_points: straight.waypoints.iter().map(|&p| Vec3::from_array(p)).collect(),
            truncated: straight.truncated,
        })
    }

    /// Casts a ray along the mesh surface from `start` towards `end`
    pub fn raycast(&self, query: &RaycastQuery) -> Result<RaycastResult> {
        let nav_query = self.query()?;
        check_extent(query.find_nearest_poly_extent)?;
        check_position("start", query.start)?;
        check_position("end", query.end)?;

        if query.start == query.end {
            return Ok(RaycastResult::no_hit(query.end));
        }

        let filter = &self.config.filter;
        let Some((start_ref, start_pos)) = nav_query.find_nearest_poly(
            &query.start.to_array(),
            &query.find_nearest_poly_extent.to_array(),
            filter,
        ) else {
            return Ok(RaycastResult::no_hit(query.end));
        };

        let end_pos = query.end.to_array();
        let hit = nav_query.raycast(start_ref, &start_pos, &end_pos, filter)?;
        if !hit.hit_wall() {
            return Ok(RaycastResult::no_hit(query.end));
        }

        Ok(RaycastResult {
            hit: true,
            position: Vec3::from_array(vlerp(&start_pos, &end_pos, hit.t)),
            normal: Vec3::from_array(hit.hit_normal),
        })
    }
}

fn check_extent(extent: Vec3) -> Result<()> {
    if !extent.is_finite() || extent.min_element() < 0.0 {
        return Err(Error::Config(format!(
            "nearest polygon extent must be finite and non-negative, got {extent}"
        )));
    }
    Ok(())
}

fn check_position(name: &str, pos: Vec3) -> Result<()> {
    if !pos.is_finite() {
        return Err(Error::Config(format!("{name} position is not finite: {pos}")));
    }
    Ok(())
}
