//! Navigation layers
//!
//! A scene usually carries one navigation mesh per agent group, each built
//! with its own agent settings and tile size. `NavigationLayers` keeps those
//! meshes side by side and routes tile streaming and queries by group.

use std::collections::BTreeMap;

use super::{
    NavigationMesh, PathfindQuery, PathfindResult, QueryConfig, RaycastQuery, RaycastResult,
    TileCoord, TileRef,
};
use tilenav_common::{Error, Result};

/// Identifier of an agent group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct GroupId(pub u32);

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "group {}", self.0)
    }
}

/// Navigation meshes keyed by agent group
#[derive(Debug, Default)]
pub struct NavigationLayers {
    layers: BTreeMap<GroupId, NavigationMesh>,
}

impl NavigationLayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an initialized layer for `group` with the default query limits
    pub fn add_layer(&mut self, group: GroupId, cell_size: f32) -> Result<()> {
        self.add_layer_with_config(group, cell_size, QueryConfig::default())
    }

    /// Adds an initialized layer for `group`
    ///
    /// Fails if the group already has a layer.
    pub fn add_layer_with_config(
        &mut self,
        group: GroupId,
        cell_size: f32,
        config: QueryConfig,
    ) -> Result<()> {
        if self.layers.contains_key(&group) {
            return Err(Error::Config(format!("{group} already has a layer")));
        }
        let mut nav = NavigationMesh::with_config(config);
        nav.initialize(cell_size)?;
        self.layers.insert(group, nav);
        log::info!("Added navigation layer for {group} with cell size {cell_size}");
        Ok(())
    }

    /// Drops the layer of `group` with all of its tiles
    pub fn remove_layer(&mut self, group: GroupId) -> Option<NavigationMesh> {
        let removed = self.layers.remove(&group);
        if removed.is_some() {
            log::info!("Removed navigation layer for {group}");
        }
        removed
    }

    pub fn layer(&self, group: GroupId) -> Option<&NavigationMesh> {
        self.layers.get(&group)
    }

    pub fn layer_mut(&mut self, group: GroupId) -> Option<&mut NavigationMesh> {
        self.layers.get_mut(&group)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Groups with a layer, in ascending order
    pub fn groups(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.layers.keys().copied()
    }

    fn get(&self, group: GroupId) -> Result<&NavigationMesh> {
        self.layers
            .get(&group)
            .ok_or_else(|| Error::Config(format!("{group} has no navigation layer")))
    }

    fn get_mut(&mut self, group: GroupId) -> Result<&mut NavigationMesh> {
        self.layers
            .get_mut(&group)
            .ok_or_else(|| Error::Config(format!("{group} has no navigation layer")))
    }

    pub fn load_tile(&mut self, group: GroupId, data: &[u8]) -> Result<TileRef> {
        self.get_mut(group)?.load_tile(data)
    }

    pub fn replace_tile(&mut self, group: GroupId, data: &[u8]) -> Result<TileRef> {
        self.get_mut(group)?.replace_tile(data)
    }

    pub fn remove_tile(&mut self, group: GroupId, coord: TileCoord) -> Result<()> {
        self.get_mut(group)?.remove_tile(coord)
    }

    pub fn find_path(&self, group: GroupId, query: &PathfindQuery) -> Result<PathfindResult> {
        self.get(group)?.find_path(query)
    }

    pub fn raycast(&self, group: GroupId, query: &RaycastQuery) -> Result<RaycastResult> {
        self.get(group)?.raycast(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_mesh_helpers::*;
    use glam::Vec3;

    #[test]
    fn test_layers_are_independent() -> Result<()> {
        let mut layers = NavigationLayers::new();
        let small = GroupId(0);
        let large = GroupId(1);
        layers.add_layer(small, 10.0)?;
        layers.add_layer(large, 20.0)?;
        assert_eq!(layers.groups().collect::<Vec<_>>(), vec![small, large]);

        layers.load_tile(small, &grid_tile(0, 0, 10.0, 2)?)?;

        let query = PathfindQuery {
            source: Vec3::new(1.0, 0.0, 1.0),
            target: Vec3::new(8.0, 0.0, 8.0),
            find_nearest_poly_extent: Vec3::ONE,
            max_path_points: 8,
        };
        assert!(layers.find_path(small, &query)?.path_found);
        assert!(!layers.find_path(large, &query)?.path_found);

        assert_eq!(
            layers.layer(large).and_then(|l| l.mesh()).map(|m| m.tile_count()),
            Some(0)
        );
        Ok(())
    }

    #[test]
    fn test_unknown_group() {
        let mut layers = NavigationLayers::new();
        let query = RaycastQuery {
            start: Vec3::ZERO,
            end: Vec3::ONE,
            find_nearest_poly_extent: Vec3::ONE,
        };
        assert!(matches!(layers.raycast(GroupId(3), &query), Err(Error::Config(_))));
        assert!(matches!(
            layers.remove_tile(GroupId(3), TileCoord::new(0, 0)),
            Err(Error::Config(_))
        ));
        assert!(layers.remove_layer(GroupId(3)).is_none());
    }

    #[test]
    fn test_duplicate_and_invalid_layers() -> Result<()> {
        let mut layers = NavigationLayers::new();
        layers.add_layer(GroupId(7), 10.0)?;
        assert!(matches!(layers.add_layer(GroupId(7), 10.0), Err(Error::Config(_))));
        assert!(matches!(layers.add_layer(GroupId(8), 0.0), Err(Error::Config(_))));
        assert_eq!(layers.len(), 1);

        assert!(layers.remove_layer(GroupId(7)).is_some());
        assert!(layers.is_empty());
        Ok(())
    }
}
