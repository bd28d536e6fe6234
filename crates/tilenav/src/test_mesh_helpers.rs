//! Test mesh creation helpers
//!
//! Tiles are flat grids of square polygons built with `TileDataBuilder`, so
//! seams, corners and holes can be laid out cell by cell.

use crate::{NavMesh, NavMeshParams, NavigationMesh, TileCoord, TileDataBuilder};
use tilenav_common::Result;

/// Creates an empty navigation mesh with square tiles of `tile_size`
pub fn create_nav_mesh(tile_size: f32) -> Result<NavMesh> {
    NavMesh::new(NavMeshParams::with_cell_size(tile_size))
}

/// Encodes a flat grid tile at height zero
pub fn grid_tile(x: i32, y: i32, tile_size: f32, divisions: usize) -> Result<Vec<u8>> {
    TileDataBuilder::grid(TileCoord::new(x, y), tile_size, divisions, 0.0)?.to_bytes()
}

/// Encodes a flat grid tile keeping only the cells accepted by `keep`
pub fn masked_grid_tile<F>(x: i32, y: i32, tile_size: f32, divisions: usize, keep: F) -> Result<Vec<u8>>
where
    F: Fn(usize, usize) -> bool,
{
    TileDataBuilder::grid_masked(TileCoord::new(x, y), tile_size, divisions, 0.0, keep)?.to_bytes()
}

/// Initialized facade with square tiles of `tile_size` and the given tiles
/// loaded
pub fn create_navigation_mesh(tile_size: f32, tiles: &[Vec<u8>]) -> Result<NavigationMesh> {
    let mut nav = NavigationMesh::new();
    nav.initialize(tile_size)?;
    for tile in tiles {
        nav.load_tile(tile)?;
    }
    Ok(nav)
}

/// Asserts two points are equal within `tolerance` on every axis
#[track_caller]
pub fn assert_near(actual: [f32; 3], expected: [f32; 3], tolerance: f32) {
    for k in 0..3 {
        assert!(
            (actual[k] - expected[k]).abs() <= tolerance,
            "expected {expected:?}, got {actual:?}"
        );
    }
}
