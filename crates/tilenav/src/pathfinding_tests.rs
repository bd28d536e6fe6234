//! Path queries through the facade, across tiles, corners and filters

#[cfg(test)]
mod tests {
    use crate::test_mesh_helpers::*;
    use crate::{
        NavMeshQuery, NavigationMesh, PathfindQuery, PolyFlags, QueryConfig, QueryFilter,
        TileCoord, TileDataBuilder, decode_poly_ref,
    };
    use glam::Vec3;
    use tilenav_common::Result;

    fn query(source: Vec3, target: Vec3, max_path_points: usize) -> PathfindQuery {
        PathfindQuery {
            source,
            target,
            find_nearest_poly_extent: Vec3::new(1.0, 2.0, 1.0),
            max_path_points,
        }
    }

    /// One tile with its upper right cell cut out
    fn l_shaped_mesh() -> Result<NavigationMesh> {
        create_navigation_mesh(
            10.0,
            &[masked_grid_tile(0, 0, 10.0, 2, |i, j| !(i == 1 && j == 1))?],
        )
    }

    fn assert_points(actual: &[Vec3], expected: &[[f32; 3]]) {
        assert_eq!(actual.len(), expected.len(), "got {actual:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert_near(a.to_array(), *e, 1e-3);
        }
    }

    #[test]
    fn test_source_equals_target() -> Result<()> {
        let nav = create_navigation_mesh(10.0, &[grid_tile(0, 0, 10.0, 2)?])?;
        let point = Vec3::new(3.0, 0.0, 3.0);

        let result = nav.find_path(&query(point, point, 8))?;
        assert!(result.path_found);
        assert!(!result.truncated);
        assert_eq!(result.path_points, vec![point]);
        Ok(())
    }

    #[test]
    fn test_disjoint_tiles_are_not_connected() -> Result<()> {
        let nav = create_navigation_mesh(
            10.0,
            &[grid_tile(0, 0, 10.0, 1)?, grid_tile(2, 0, 10.0, 1)?],
        )?;
        let result = nav.find_path(&query(
            Vec3::new(5.0, 0.0, 5.0),
            Vec3::new(25.0, 0.0, 5.0),
            8,
        ))?;
        assert!(!result.path_found);
        assert!(result.path_points.is_empty());
        Ok(())
    }

    #[test]
    fn test_path_across_seam() -> Result<()> {
        let mut nav = create_navigation_mesh(
            10.0,
            &[grid_tile(0, 0, 10.0, 1)?, grid_tile(1, 0, 10.0, 1)?],
        )?;
        let across = query(Vec3::new(2.0, 0.0, 5.0), Vec3::new(18.0, 0.0, 5.0), 8);

        let result = nav.find_path(&across)?;
        assert!(result.path_found);
        assert_points(&result.path_points, &[[2.0, 0.0, 5.0], [18.0, 0.0, 5.0]]);

        // Losing either side of the seam breaks the path
        nav.remove_tile(TileCoord::new(1, 0))?;
        assert!(!nav.find_path(&across)?.path_found);

        nav.load_tile(&grid_tile(1, 0, 10.0, 1)?)?;
        assert!(nav.find_path(&across)?.path_found);

        nav.remove_tile(TileCoord::new(0, 0))?;
        assert!(!nav.find_path(&across)?.path_found);
        Ok(())
    }

    #[test]
    fn test_path_turns_around_corner() -> Result<()> {
        let nav = l_shaped_mesh()?;
        let result = nav.find_path(&query(
            Vec3::new(9.0, 0.0, 4.0),
            Vec3::new(4.0, 0.0, 9.0),
            8,
        ))?;
        assert!(result.path_found);
        assert!(!result.truncated);
        assert_points(
            &result.path_points,
            &[[9.0, 0.0, 4.0], [5.0, 0.0, 5.0], [4.0, 0.0, 9.0]],
        );
        Ok(())
    }

    #[test]
    fn test_path_turns_around_missing_tile() -> Result<()> {
        let nav = create_navigation_mesh(
            10.0,
            &[
                grid_tile(0, 0, 10.0, 1)?,
                grid_tile(1, 0, 10.0, 1)?,
                grid_tile(0, 1, 10.0, 1)?,
            ],
        )?;
        let result = nav.find_path(&query(
            Vec3::new(15.0, 0.0, 5.0),
            Vec3::new(8.0, 0.0, 18.0),
            8,
        ))?;
        assert!(result.path_found);
        assert_points(
            &result.path_points,
            &[[15.0, 0.0, 5.0], [10.0, 0.0, 10.0], [8.0, 0.0, 18.0]],
        );
        Ok(())
    }

    #[test]
    fn test_max_path_points_truncates() -> Result<()> {
        let nav = l_shaped_mesh()?;
        let source = Vec3::new(9.0, 0.0, 4.0);
        let target = Vec3::new(4.0, 0.0, 9.0);

        let one = nav.find_path(&query(source, target, 1))?;
        assert!(one.path_found);
        assert!(one.truncated);
        assert_points(&one.path_points, &[[9.0, 0.0, 4.0]]);

        let two = nav.find_path(&query(source, target, 2))?;
        assert!(two.truncated);
        assert_points(&two.path_points, &[[9.0, 0.0, 4.0], [5.0, 0.0, 5.0]]);

        let three = nav.find_path(&query(source, target, 3))?;
        assert!(!three.truncated);
        assert_eq!(three.path_points.len(), 3);
        Ok(())
    }

    #[test]
    fn test_excluded_polygons_block_the_path() -> Result<()> {
        // Middle row of a 3x3 grid is water
        let mut builder = TileDataBuilder::grid(TileCoord::new(0, 0), 9.0, 3, 0.0)?;
        for poly in &mut builder.polys_mut()[3..6] {
            poly.flags = PolyFlags::SWIM;
        }
        let tile = builder.to_bytes()?;
        let across = query(Vec3::new(4.5, 0.0, 1.0), Vec3::new(4.5, 0.0, 8.0), 8);

        let walker = {
            let mut nav = NavigationMesh::with_config(QueryConfig {
                filter: QueryFilter {
                    include_flags: PolyFlags::WALK,
                    ..Default::default()
                },
                ..QueryConfig::default()
            });
            nav.initialize(9.0)?;
            nav.load_tile(&tile)?;
            nav
        };
        assert!(!walker.find_path(&across)?.path_found);

        let swimmer = create_navigation_mesh(9.0, &[tile])?;
        assert!(swimmer.find_path(&across)?.path_found);
        Ok(())
    }

    #[test]
    fn test_expensive_area_is_avoided() -> Result<()> {
        let mut builder = TileDataBuilder::grid(TileCoord::new(0, 0), 9.0, 3, 0.0)?;
        builder.polys_mut()[4].area = 1;
        let mut mesh = create_nav_mesh(9.0)?;
        mesh.add_tile(&builder.to_bytes()?)?;

        let start_pos = [4.5, 0.0, 1.0];
        let end_pos = [4.5, 0.0, 8.0];
        let extent = [0.5, 1.0, 0.5];

        let mut cheap = QueryFilter::default();
        let mut nav_query = NavMeshQuery::new(&mesh);
        let (start, _) = nav_query.find_nearest_poly(&start_pos, &extent, &cheap).expect("start");
        let (end, _) = nav_query.find_nearest_poly(&end_pos, &extent, &cheap).expect("end");

        let direct = nav_query
            .find_path(start, end, &start_pos, &end_pos, &cheap)?
            .expect("corridor exists");
        assert_eq!(direct.len(), 3);
        assert!(direct.iter().any(|r| decode_poly_ref(*r).2 == 4));

        cheap.set_area_cost(1, 10.0);
        let around = nav_query
            .find_path(start, end, &start_pos, &end_pos, &cheap)?
            .expect("corridor exists");
        assert_eq!(around.len(), 5);
        assert!(around.iter().all(|r| decode_poly_ref(*r).2 != 4));
        Ok(())
    }
}
