//! CLI utility for inspecting navigation mesh tiles and running queries

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use glam::Vec3;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tilenav::{
    NavigationMesh, PathfindQuery, PolyType, RaycastQuery, TileCoord, TileDataBuilder, decode_tile,
};

/// A CLI utility for tiled navigation meshes
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the header and contents of tile files
    Inspect {
        /// Tile files
        #[clap(value_parser, required = true)]
        tiles: Vec<PathBuf>,
    },

    /// Find a path across a set of tiles
    FindPath {
        /// Width and depth of a tile in world units
        #[clap(long)]
        cell_size: f32,

        /// Tile files to load
        #[clap(long, value_parser, num_args = 1.., required = true)]
        tiles: Vec<PathBuf>,

        /// Start position (x,y,z)
        #[clap(long, value_parser = parse_vector, allow_hyphen_values = true)]
        start: Vec3,

        /// End position (x,y,z)
        #[clap(long, value_parser = parse_vector, allow_hyphen_values = true)]
        end: Vec3,

        /// Half extents of the box searched around start and end (x,y,z)
        #[clap(long, value_parser = parse_vector, default_value = "2,4,2")]
        extent: Vec3,

        /// Maximum number of path points
        #[clap(long, default_value = "256")]
        max_points: usize,

        /// Output path file
        #[clap(long, value_parser)]
        output: Option<PathBuf>,
    },

    /// Cast a ray along the mesh surface
    Raycast {
        /// Width and depth of a tile in world units
        #[clap(long)]
        cell_size: f32,

        /// Tile files to load
        #[clap(long, value_parser, num_args = 1.., required = true)]
        tiles: Vec<PathBuf>,

        /// Start position (x,y,z)
        #[clap(long, value_parser = parse_vector, allow_hyphen_values = true)]
        start: Vec3,

        /// End position (x,y,z)
        #[clap(long, value_parser = parse_vector, allow_hyphen_values = true)]
        end: Vec3,

        /// Half extents of the box searched around the start (x,y,z)
        #[clap(long, value_parser = parse_vector, default_value = "2,4,2")]
        extent: Vec3,
    },

    /// Write a flat grid tile
    Grid {
        /// Tile column
        #[clap(long, allow_negative_numbers = true)]
        x: i32,

        /// Tile row
        #[clap(long, allow_negative_numbers = true)]
        y: i32,

        /// Width and depth of the tile in world units
        #[clap(long)]
        cell_size: f32,

        /// Number of cells along each side
        #[clap(long, default_value = "4")]
        divisions: usize,

        /// Surface height
        #[clap(long, default_value = "0.0", allow_negative_numbers = true)]
        height: f32,

        /// Output tile file
        #[clap(long, value_parser)]
        output: PathBuf,
    },
}

/// Parse a comma-separated vector
fn parse_vector(s: &str) -> Result<Vec3, String> {
    let parts: Vec<&str> = s.split(',').collect();

    if parts.len() != 3 {
        return Err(format!(
            "Vector must have 3 components, got {}",
            parts.len()
        ));
    }

    let x = parts[0].trim().parse::<f32>().map_err(|e| e.to_string())?;
    let y = parts[1].trim().parse::<f32>().map_err(|e| e.to_string())?;
    let z = parts[2].trim().parse::<f32>().map_err(|e| e.to_string())?;

    Ok(Vec3::new(x, y, z))
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let args = Args::parse();

    match args.command {
        Commands::Inspect { tiles } => inspect_tiles(&tiles),
        Commands::FindPath {
            cell_size,
            tiles,
            start,
            end,
            extent,
            max_points,
            output,
        } => {
            let nav = load_navigation_mesh(cell_size, &tiles)?;
            let query = PathfindQuery {
                source: start,
                target: end,
                find_nearest_poly_extent: extent,
                max_path_points: max_points,
            };
            find_path(&nav, &query, output.as_deref())
        }
        Commands::Raycast {
            cell_size,
            tiles,
            start,
            end,
            extent,
        } => {
            let nav = load_navigation_mesh(cell_size, &tiles)?;
            let query = RaycastQuery {
                start,
                end,
                find_nearest_poly_extent: extent,
            };
            raycast(&nav, &query)
        }
        Commands::Grid {
            x,
            y,
            cell_size,
            divisions,
            height,
            output,
        } => write_grid(TileCoord::new(x, y), cell_size, divisions, height, &output),
    }
}

/// Print the header and polygon counts of tile files
fn inspect_tiles(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let tile = decode_tile(&data)
            .with_context(|| format!("Failed to decode tile {}", path.display()))?;
        let header = &tile.header;
        let off_mesh = tile
            .polys
            .iter()
            .filter(|p| p.poly_type == PolyType::OffMeshConnection)
            .count();

        println!("{}:", path.display());
        println!("  coordinate: {} layer {}", header.coord(), header.layer);
        println!("  size: {} bytes", data.len());
        println!(
            "  bounds: min={:?}, max={:?}",
            header.bmin, header.bmax
        );
        println!(
            "  polygons: {} ({} off-mesh connections)",
            tile.polys.len(),
            off_mesh
        );
        println!("  vertices: {}", tile.verts.len());
        println!(
            "  detail: {} meshes, {} vertices, {} triangles",
            tile.detail_meshes.len(),
            tile.detail_verts.len(),
            tile.detail_tris.len()
        );
        println!(
            "  agent: height {}, radius {}, climb {}",
            header.walkable_height, header.walkable_radius, header.walkable_climb
        );
    }
    Ok(())
}

/// Initialize a navigation mesh and load tile files into it
fn load_navigation_mesh(cell_size: f32, paths: &[PathBuf]) -> Result<NavigationMesh> {
    let mut nav = NavigationMesh::new();
    nav.initialize(cell_size)
        .context("Failed to initialize navigation mesh")?;

    for path in paths {
        let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let tile_ref = nav
            .load_tile(&data)
            .with_context(|| format!("Failed to load tile {}", path.display()))?;
        log::info!("Loaded {} as {tile_ref}", path.display());
    }

    println!(
        "Loaded {} tiles with {} polygons",
        paths.len(),
        nav.mesh().map_or(0, |m| m.poly_count())
    );
    Ok(nav)
}

/// Find a path and print or save its points
fn find_path(nav: &NavigationMesh, query: &PathfindQuery, output: Option<&Path>) -> Result<()> {
    println!("Finding path from {} to {}...", query.source, query.target);

    let result = nav.find_path(query).context("Path query failed")?;
    if !result.path_found {
        println!("No path found");
        return Ok(());
    }

    println!(
        "Found path with {} points{}",
        result.path_points.len(),
        if result.truncated { " (truncated)" } else { "" }
    );

    if let Some(output_path) = output {
        println!("Saving path to {}...", output_path.display());
        write_path(output_path, query, &result.path_points)?;
    } else {
        println!("Path:");
        for (i, point) in result.path_points.iter().enumerate() {
            println!("{}: {},{},{}", i, point.x, point.y, point.z);
        }
    }

    Ok(())
}

fn write_path(path: &Path, query: &PathfindQuery, points: &[Vec3]) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;

    writeln!(file, "# Path from {} to {}", query.source, query.target)?;
    writeln!(file, "# {} waypoints", points.len())?;
    for point in points {
        writeln!(file, "{},{},{}", point.x, point.y, point.z)?;
    }
    Ok(())
}

/// Cast a ray and print where it stopped
fn raycast(nav: &NavigationMesh, query: &RaycastQuery) -> Result<()> {
    let result = nav.raycast(query).context("Raycast query failed")?;
    if result.hit {
        println!("Hit at {} with normal {}", result.position, result.normal);
    } else {
        println!("No hit, ray reaches {}", result.position);
    }
    Ok(())
}

/// Write a flat grid tile for experiments
fn write_grid(coord: TileCoord, cell_size: f32, divisions: usize, height: f32, output: &Path) -> Result<()> {
    if output.is_dir() {
        bail!("Output {} is a directory", output.display());
    }

    let data = TileDataBuilder::grid(coord, cell_size, divisions, height)
        .and_then(|builder| builder.to_bytes())
        .context("Failed to build grid tile")?;
    fs::write(output, &data)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Wrote tile {} with {} polygons ({} bytes) to {}",
        coord,
        divisions * divisions,
        data.len(),
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vector() {
        assert_eq!(parse_vector("1,-2.5, 3"), Ok(Vec3::new(1.0, -2.5, 3.0)));
        assert!(parse_vector("1,2").is_err());
        assert!(parse_vector("1,a,3").is_err());
    }

    #[test]
    fn test_grid_tiles_load_and_answer_queries() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let left = dir.path().join("left.tile");
        let right = dir.path().join("right.tile");
        write_grid(TileCoord::new(0, 0), 10.0, 2, 0.0, &left)?;
        write_grid(TileCoord::new(1, 0), 10.0, 2, 0.0, &right)?;
        inspect_tiles(&[left.clone(), right.clone()])?;

        let nav = load_navigation_mesh(10.0, &[left, right])?;
        let query = PathfindQuery {
            source: Vec3::new(2.0, 0.0, 2.5),
            target: Vec3::new(18.0, 0.0, 2.5),
            find_nearest_poly_extent: Vec3::new(1.0, 2.0, 1.0),
            max_path_points: 16,
        };
        let output = dir.path().join("path.txt");
        find_path(&nav, &query, Some(&output))?;

        let written = fs::read_to_string(&output)?;
        let points: Vec<&str> = written.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(points, vec!["2,0,2.5", "18,0,2.5"]);
        Ok(())
    }

    #[test]
    fn test_load_rejects_bad_tile_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let bad = dir.path().join("bad.tile");
        fs::write(&bad, b"not a tile")?;
        assert!(inspect_tiles(&[bad.clone()]).is_err());
        assert!(load_navigation_mesh(10.0, &[bad]).is_err());
        assert!(write_grid(TileCoord::new(0, 0), 10.0, 2, 0.0, dir.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "tilenav", "grid", "--x", "-1", "--y", "2", "--cell-size", "8", "--output", "t.bin",
        ])
        .expect("valid arguments");
        assert!(matches!(args.command, Commands::Grid { x: -1, y: 2, divisions: 4, .. }));
    }
}
