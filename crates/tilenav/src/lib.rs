//! Tiled navigation mesh runtime
//!
//! Tiles arrive as binary blobs, are indexed by their integer coordinate and
//! merged into a single polygon mesh whose seams are relinked whenever a
//! neighbouring tile is loaded or removed. Path and raycast queries run
//! synchronously against the merged mesh.

mod layers;
mod nav_mesh;
mod nav_mesh_query;
mod navigation_mesh;
mod node_pool;
mod query_filter;
mod raycast;
mod raycast_hit;
mod status;
mod tile_format;
mod tile_index;

#[cfg(test)]
mod test_mesh_helpers;

#[cfg(test)]
mod pathfinding_tests;
#[cfg(test)]
mod raycast_tests;

pub use layers::{GroupId, NavigationLayers};
pub use nav_mesh::{Link, MeshTile, NavMesh, Poly, decode_poly_ref, encode_poly_ref};
pub use nav_mesh_query::{NavMeshQuery, StraightPath};
pub use navigation_mesh::{
    NavigationMesh, PathfindQuery, PathfindResult, QueryConfig, RaycastQuery, RaycastResult,
};
pub use query_filter::QueryFilter;
pub use raycast_hit::RaycastHit;
pub use status::Status;
pub use tile_format::{
    DNAV_MAGIC, DNAV_VERSION, PolyData, PolyDetail, PolyType, TileData, TileDataBuilder,
    TileHeader, decode_tile,
};
pub use tile_index::{TileIndex, TileRef};

use bitflags::bitflags;

/// Maximum number of vertices per navigation polygon
pub const MAX_VERTS_PER_POLY: usize = 6;

/// Neighbour code flag marking an edge that lies on the tile border
pub const EXT_LINK: u16 = 0x8000;

/// Side value used for links between polygons of the same tile
pub const INTERNAL_SIDE: u8 = 0xff;

/// Number of area ids a polygon can carry
pub const MAX_AREAS: usize = 64;

/// Polygon reference
///
/// Packs a salt, a tile slot id and a polygon index. The zero value is the
/// null reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct PolyRef(u32);

impl PolyRef {
    /// Null polygon reference
    pub const NULL: PolyRef = PolyRef(0);

    /// Creates a new polygon reference
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Gets the raw id of the polygon reference
    pub fn id(&self) -> u32 {
        self.0
    }

    /// Checks if the polygon reference is non-null
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl From<u32> for PolyRef {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for PolyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

bitflags! {
    /// Polygon traversal flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(
        feature = "serialization",
        derive(serde::Serialize, serde::Deserialize)
    )]
    pub struct PolyFlags: u16 {
        /// Ground that can be walked on
        const WALK = 0x01;
        /// Water surface
        const SWIM = 0x02;
        /// Door or other passable gate
        const DOOR = 0x04;
        /// Requires a jump to enter
        const JUMP = 0x08;
        /// Disabled polygon
        const DISABLED = 0x10;
        /// All flags
        const ALL = 0xffff;
    }
}

/// Integer coordinate of a tile in the tile grid
///
/// The `y` axis of the grid runs along world Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Coordinate of the neighbouring tile across the given side
    ///
    /// Sides are numbered counter-clockwise starting at +X, diagonals on odd
    /// values. Returns `None` past the edge of the `i32` grid.
    pub fn neighbour(&self, side: u8) -> Option<TileCoord> {
        let (dx, dy) = match side & 7 {
            0 => (1, 0),
            1 => (1, 1),
            2 => (0, 1),
            3 => (-1, 1),
            4 => (-1, 0),
            5 => (-1, -1),
            6 => (0, -1),
            _ => (1, -1),
        };
        Some(TileCoord::new(self.x.checked_add(dx)?, self.y.checked_add(dy)?))
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Side of a tile seen from its neighbour
#[inline]
pub fn opposite_side(side: u8) -> u8 {
    (side + 4) & 7
}

/// Parameters for creating a tiled navigation mesh
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct NavMeshParams {
    /// World-space origin of the tile grid
    pub origin: [f32; 3],
    /// Width of each tile along X
    pub tile_width: f32,
    /// Height of each tile along Z
    pub tile_height: f32,
    /// Maximum number of tiles that can be loaded at once
    pub max_tiles: usize,
    /// Maximum number of polygons in a single tile
    pub max_polys_per_tile: usize,
}

impl NavMeshParams {
    /// Square tiles of `cell_size` world units anchored at the world origin
    pub fn with_cell_size(cell_size: f32) -> Self {
        Self {
            origin: [0.0; 3],
            tile_width: cell_size,
            tile_height: cell_size,
            ..Self::default()
        }
    }
}

impl Default for NavMeshParams {
    fn default() -> Self {
        Self {
            origin: [0.0; 3],
            tile_width: 32.0,
            tile_height: 32.0,
            max_tiles: nav_mesh::MAX_TILES,
            max_polys_per_tile: 1 << 12,
        }
    }
}
