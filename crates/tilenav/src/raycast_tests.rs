//! Raycasts through the facade: walls, seams and off-mesh rays

#[cfg(test)]
mod tests {
    use crate::test_mesh_helpers::*;
    use crate::{NavigationMesh, QueryConfig, RaycastQuery, RaycastResult};
    use glam::Vec3;
    use tilenav_common::Result;

    fn ray(start: Vec3, end: Vec3) -> RaycastQuery {
        RaycastQuery {
            start,
            end,
            find_nearest_poly_extent: Vec3::new(1.0, 2.0, 1.0),
        }
    }

    #[track_caller]
    fn assert_wall(result: &RaycastResult, position: [f32; 3], normal: [f32; 3]) {
        assert!(result.hit, "expected a hit, got {result:?}");
        assert_near(result.position.to_array(), position, 1e-3);
        assert_near(result.normal.to_array(), normal, 1e-5);
    }

    #[test]
    fn test_ray_to_itself() -> Result<()> {
        let nav = create_navigation_mesh(10.0, &[grid_tile(0, 0, 10.0, 2)?])?;
        let point = Vec3::new(3.0, 0.0, 3.0);
        let result = nav.raycast(&ray(point, point))?;
        assert!(!result.hit);
        assert_eq!(result.position, point);
        assert_eq!(result.normal, Vec3::ZERO);
        Ok(())
    }

    #[test]
    fn test_ray_off_mesh() -> Result<()> {
        let nav = create_navigation_mesh(10.0, &[grid_tile(0, 0, 10.0, 2)?])?;
        let result = nav.raycast(&ray(Vec3::new(50.0, 0.0, 50.0), Vec3::new(60.0, 0.0, 55.0)))?;
        assert!(!result.hit);

        // Only the start is snapped
        let result = nav.raycast(&ray(Vec3::new(-20.0, 0.0, 5.0), Vec3::new(5.0, 0.0, 5.0)))?;
        assert!(!result.hit);
        Ok(())
    }

    #[test]
    fn test_ray_inside_mesh() -> Result<()> {
        let nav = create_navigation_mesh(10.0, &[grid_tile(0, 0, 10.0, 2)?])?;
        let end = Vec3::new(8.0, 0.0, 9.0);
        let result = nav.raycast(&ray(Vec3::new(1.0, 0.0, 2.0), end))?;
        assert!(!result.hit);
        assert_eq!(result.position, end);
        Ok(())
    }

    #[test]
    fn test_ray_leaving_mesh() -> Result<()> {
        let nav = create_navigation_mesh(10.0, &[grid_tile(0, 0, 10.0, 2)?])?;
        let result = nav.raycast(&ray(Vec3::new(2.0, 0.0, 2.0), Vec3::new(2.0, 0.0, 14.0)))?;
        assert_wall(&result, [2.0, 0.0, 10.0], [0.0, 0.0, -1.0]);
        Ok(())
    }

    #[test]
    fn test_ray_hits_inner_corner_wall() -> Result<()> {
        let nav = create_navigation_mesh(
            10.0,
            &[masked_grid_tile(0, 0, 10.0, 2, |i, j| !(i == 1 && j == 1))?],
        )?;
        let result = nav.raycast(&ray(Vec3::new(7.0, 0.0, 2.0), Vec3::new(7.0, 0.0, 8.0)))?;
        assert_wall(&result, [7.0, 0.0, 5.0], [0.0, 0.0, -1.0]);
        Ok(())
    }

    #[test]
    fn test_ray_crosses_seam() -> Result<()> {
        let mut nav = create_navigation_mesh(
            10.0,
            &[grid_tile(0, 0, 10.0, 1)?, grid_tile(1, 0, 10.0, 1)?],
        )?;
        let start = Vec3::new(2.0, 0.0, 5.0);

        assert!(!nav.raycast(&ray(start, Vec3::new(18.0, 0.0, 5.0)))?.hit);

        let result = nav.raycast(&ray(start, Vec3::new(25.0, 0.0, 5.0)))?;
        assert_wall(&result, [20.0, 0.0, 5.0], [-1.0, 0.0, 0.0]);

        // Without the neighbour the seam is a wall
        nav.remove_tile(crate::TileCoord::new(1, 0))?;
        let result = nav.raycast(&ray(start, Vec3::new(18.0, 0.0, 5.0)))?;
        assert_wall(&result, [10.0, 0.0, 5.0], [-1.0, 0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_ray_through_partial_seam() -> Result<()> {
        let nav = create_navigation_mesh(
            10.0,
            &[
                grid_tile(0, 0, 10.0, 1)?,
                masked_grid_tile(1, 0, 10.0, 2, |_, row| row == 0)?,
            ],
        )?;

        // Low rows share the seam, high rows end at it
        assert!(!nav.raycast(&ray(Vec3::new(2.0, 0.0, 2.0), Vec3::new(18.0, 0.0, 2.0)))?.hit);

        let result = nav.raycast(&ray(Vec3::new(2.0, 0.0, 8.0), Vec3::new(18.0, 0.0, 8.0)))?;
        assert_wall(&result, [10.0, 0.0, 8.0], [-1.0, 0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_visit_limit_does_not_hide_walls() -> Result<()> {
        let mut nav = NavigationMesh::with_config(QueryConfig {
            max_visited: 2,
            ..QueryConfig::default()
        });
        nav.initialize(10.0)?;
        nav.load_tile(&grid_tile(0, 0, 10.0, 8)?)?;

        let query = RaycastQuery {
            start: Vec3::new(0.5, 0.0, 0.5),
            end: Vec3::new(12.0, 0.0, 0.5),
            find_nearest_poly_extent: Vec3::new(0.25, 1.0, 0.25),
        };
        let result = nav.raycast(&query)?;
        assert_wall(&result, [10.0, 0.0, 0.5], [-1.0, 0.0, 0.0]);

        let unlimited = create_navigation_mesh(10.0, &[grid_tile(0, 0, 10.0, 8)?])?;
        assert_eq!(unlimited.raycast(&query)?, result);
        Ok(())
    }

    #[test]
    fn test_long_ray_across_many_polygons() -> Result<()> {
        let tiles = (0..5)
            .map(|x| grid_tile(x, 0, 10.0, 64))
            .collect::<Result<Vec<_>>>()?;
        let nav = create_navigation_mesh(10.0, &tiles)?;

        // Crosses 320 cells before leaving the last tile
        let query = RaycastQuery {
            start: Vec3::new(0.05, 0.0, 0.05),
            end: Vec3::new(60.0, 0.0, 0.05),
            find_nearest_poly_extent: Vec3::new(0.05, 1.0, 0.05),
        };
        let result = nav.raycast(&query)?;
        assert_wall(&result, [50.0, 0.0, 0.05], [-1.0, 0.0, 0.0]);

        let inside = nav.raycast(&RaycastQuery {
            end: Vec3::new(49.0, 0.0, 0.05),
            ..query
        })?;
        assert!(!inside.hit);
        Ok(())
    }
}
