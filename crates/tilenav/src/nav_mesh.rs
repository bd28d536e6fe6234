//! Merged polygon mesh of all loaded tiles
//!
//! Polygons of every loaded tile are addressed through salted `PolyRef`s.
//! Adjacency is kept as per-polygon link lists: links between polygons of
//! one tile are built when the tile is added, links across tile seams are
//! built against every loaded neighbour and torn down again when either side
//! is removed.

use super::tile_format::{PolyDetail, PolyType, TileData, TileHeader, decode_tile};
use super::tile_index::{TileIndex, TileRef};
use super::{
    EXT_LINK, INTERNAL_SIDE, MAX_VERTS_PER_POLY, NavMeshParams, PolyFlags, PolyRef, QueryFilter,
    Status, TileCoord, opposite_side,
};
use tilenav_common::{
    Error, Result, closest_height_on_triangle, closest_point_on_polygon_boundary, overlap_bounds,
    point_in_polygon_2d, vdist_sqr, vlerp,
};

/// Number of bits for polygon id
const POLY_BITS: u32 = 16;
/// Number of bits for tile id
const TILE_BITS: u32 = 10;
/// Number of bits for salt
const SALT_BITS: u32 = 6;

/// Maximum polygon id value (16 bits)
const POLY_MASK: u32 = (1 << POLY_BITS) - 1;
/// Maximum tile id value (10 bits)
const TILE_MASK: u32 = (1 << TILE_BITS) - 1;
/// Maximum salt value (6 bits)
pub(crate) const SALT_MASK: u32 = (1 << SALT_BITS) - 1;

/// Largest number of tile slots a reference can address (tile id 0 is null)
pub const MAX_TILES: usize = TILE_MASK as usize;

/// Largest number of polygons a reference can address within one tile
pub const MAX_POLYS_PER_TILE: usize = 1 << POLY_BITS;

/// Maximum number of seam connections collected per edge
const MAX_SEAM_CONNECTIONS: usize = 4;

/// Creates a PolyRef from salt, tile and polygon ids
///
/// Tile ids are 1-based so that no live reference is ever zero.
#[inline]
pub fn encode_poly_ref(salt: u32, tile_id: u32, poly_id: u32) -> PolyRef {
    PolyRef::new(
        ((salt & SALT_MASK) << (POLY_BITS + TILE_BITS))
            | ((tile_id & TILE_MASK) << POLY_BITS)
            | (poly_id & POLY_MASK),
    )
}

/// Decodes a PolyRef into salt, tile and polygon ids
#[inline]
pub fn decode_poly_ref(reference: PolyRef) -> (u32, u32, u32) {
    let id = reference.id();
    (
        (id >> (POLY_BITS + TILE_BITS)) & SALT_MASK,
        (id >> POLY_BITS) & TILE_MASK,
        id & POLY_MASK,
    )
}

/// Link between two polygons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Link {
    /// Reference to the connected polygon
    pub reference: PolyRef,
    /// Edge of the owning polygon the link crosses
    pub edge: u8,
    /// Tile side of a seam link, `INTERNAL_SIDE` for links within a tile
    pub side: u8,
    /// Start of the shared part of the edge, in 1/255 of its length
    pub bmin: u8,
    /// End of the shared part of the edge, in 1/255 of its length
    pub bmax: u8,
}

/// Polygon of a loaded tile
#[derive(Debug, Clone)]
pub struct Poly {
    pub verts: [u16; MAX_VERTS_PER_POLY],
    pub neis: [u16; MAX_VERTS_PER_POLY],
    pub vert_count: u8,
    pub flags: PolyFlags,
    pub area: u8,
    pub poly_type: PolyType,
    /// Adjacency built at runtime
    pub links: Vec<Link>,
    pub bmin: [f32; 3],
    pub bmax: [f32; 3],
}

impl Poly {
    pub fn is_ground(&self) -> bool {
        self.poly_type == PolyType::Ground
    }

    /// Links crossing the given edge
    pub fn edge_links(&self, edge: usize) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(move |l| l.edge as usize == edge)
    }
}

/// Loaded tile
#[derive(Debug, Clone)]
pub struct MeshTile {
    pub header: TileHeader,
    pub verts: Vec<[f32; 3]>,
    pub polys: Vec<Poly>,
    pub detail_meshes: Vec<PolyDetail>,
    pub detail_verts: Vec<[f32; 3]>,
    pub detail_tris: Vec<[u8; 4]>,
}

impl MeshTile {
    fn from_data(data: TileData) -> Self {
        let mut tile = Self {
            header: data.header,
            verts: data.verts,
            polys: Vec::with_capacity(data.polys.len()),
            detail_meshes: data.detail_meshes,
            detail_verts: data.detail_verts,
            detail_tris: data.detail_tris,
        };

        for (i, p) in data.polys.into_iter().enumerate() {
            let mut poly = Poly {
                verts: p.verts,
                neis: p.neis,
                vert_count: p.vert_count,
                flags: p.flags,
                area: p.area,
                poly_type: p.poly_type,
                links: Vec::new(),
                bmin: [f32::MAX; 3],
                bmax: [f32::MIN; 3],
            };
            let detail = tile.detail_range(i, &poly);
            for v in tile.poly_vertices(&poly).iter().chain(detail.iter()) {
                for k in 0..3 {
                    poly.bmin[k] = poly.bmin[k].min(v[k]);
                    poly.bmax[k] = poly.bmax[k].max(v[k]);
                }
            }
            tile.polys.push(poly);
        }

        tile
    }

    /// Grid coordinate of the tile
    pub fn coord(&self) -> TileCoord {
        self.header.coord()
    }

    /// Vertices of a polygon in ring order
    pub fn poly_vertices(&self, poly: &Poly) -> Vec<[f32; 3]> {
        poly.verts[..poly.vert_count as usize]
            .iter()
            .map(|&v| self.verts[v as usize])
            .collect()
    }

    /// Extra detail vertices of a polygon
    fn detail_range(&self, index: usize, poly: &Poly) -> &[[f32; 3]] {
        if !poly.is_ground() {
            return &[];
        }
        match self.detail_meshes.get(index) {
            Some(d) => {
                let start = d.vert_base as usize;
                &self.detail_verts[start..start + d.vert_count as usize]
            }
            None => &[],
        }
    }

    fn detail_vertex(&self, poly: &Poly, detail: &PolyDetail, index: u8) -> [f32; 3] {
        let nv = poly.vert_count;
        if index < nv {
            self.verts[poly.verts[index as usize] as usize]
        } else {
            self.detail_verts[detail.vert_base as usize + (index - nv) as usize]
        }
    }

    /// Height of a polygon surface at the XZ location of `pos`
    ///
    /// Uses the detail triangles when the tile has them, else a triangle fan
    /// over the polygon. `None` when `pos` is outside the polygon.
    pub fn poly_height(&self, index: usize, pos: &[f32; 3]) -> Option<f32> {
        let poly = self.polys.get(index)?;
        if !poly.is_ground() {
            return None;
        }

        if let Some(detail) = self.detail_meshes.get(index) {
            let start = detail.tri_base as usize;
            for tri in &self.detail_tris[start..start + detail.tri_count as usize] {
                let a = self.detail_vertex(poly, detail, tri[0]);
                let b = self.detail_vertex(poly, detail, tri[1]);
                let c = self.detail_vertex(poly, detail, tri[2]);
                if let Some(h) = closest_height_on_triangle(pos, &a, &b, &c) {
                    return Some(h);
                }
            }
        }

        let verts = self.poly_vertices(poly);
        (1..verts.len() - 1)
            .find_map(|i| closest_height_on_triangle(pos, &verts[0], &verts[i], &verts[i + 1]))
    }
}

/// Tiled navigation mesh
#[derive(Debug)]
pub struct NavMesh {
    params: NavMeshParams,
    tiles: TileIndex<MeshTile>,
}

impl NavMesh {
    /// Creates an empty navigation mesh
    pub fn new(params: NavMeshParams) -> Result<Self> {
        if !(params.tile_width.is_finite() && params.tile_width > 0.0)
            || !(params.tile_height.is_finite() && params.tile_height > 0.0)
        {
            return Err(Error::Config(format!(
                "tile size must be positive and finite, got {} x {}",
                params.tile_width, params.tile_height
            )));
        }
        if params.origin.iter().any(|v| !v.is_finite()) {
            return Err(Error::Config("tile grid origin must be finite".to_string()));
        }
        if !(1..=MAX_TILES).contains(&params.max_tiles) {
            return Err(Error::Config(format!(
                "max_tiles must be within 1..={MAX_TILES}, got {}",
                params.max_tiles
            )));
        }
        if !(1..=MAX_POLYS_PER_TILE).contains(&params.max_polys_per_tile) {
            return Err(Error::Config(format!(
                "max_polys_per_tile must be within 1..={MAX_POLYS_PER_TILE}, got {}",
                params.max_polys_per_tile
            )));
        }

        log::debug!(
            "Created navigation mesh with {}x{} tiles, at most {} tiles",
            params.tile_width,
            params.tile_height,
            params.max_tiles
        );

        Ok(Self {
            tiles: TileIndex::new(params.max_tiles),
            params,
        })
    }

    pub fn params(&self) -> &NavMeshParams {
        &self.params
    }

    /// Number of loaded tiles
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Number of polygons over all loaded tiles
    pub fn poly_count(&self) -> usize {
        self.tiles.iter().map(|(_, _, tile)| tile.polys.len()).sum()
    }

    /// Tile loaded at `coord`
    pub fn tile_at(&self, coord: TileCoord) -> Option<&MeshTile> {
        self.tiles.get_at(coord)
    }

    /// Reference of the tile loaded at `coord`
    pub fn tile_ref_at(&self, coord: TileCoord) -> Option<TileRef> {
        self.tiles.tile_ref_at(coord)
    }

    /// Coordinates of all loaded tiles in ascending order
    pub fn tile_coords(&self) -> Vec<TileCoord> {
        self.tiles.coords()
    }

    /// Checks that a tile reference still points at a loaded tile
    pub fn is_valid_tile_ref(&self, tile_ref: TileRef) -> bool {
        self.tiles.resolve(tile_ref).is_some()
    }

    /// Base polygon reference of the tile in `slot`
    fn poly_ref(&self, slot: usize, poly: usize) -> PolyRef {
        encode_poly_ref(self.tiles.salt(slot), slot as u32 + 1, poly as u32)
    }

    /// Resolves a polygon reference to its slot and polygon index
    fn resolve(&self, reference: PolyRef) -> Option<(usize, usize)> {
        let (salt, tile_id, poly) = decode_poly_ref(reference);
        let slot = self.tiles.resolve_slot(salt, tile_id.checked_sub(1)? as usize)?;
        let tile = self.tiles.get(slot)?;
        ((poly as usize) < tile.polys.len()).then_some((slot, poly as usize))
    }

    /// Checks that a polygon reference resolves to a loaded polygon
    pub fn is_valid_poly_ref(&self, reference: PolyRef) -> bool {
        self.resolve(reference).is_some()
    }

    /// Gets the tile and polygon a reference points at
    pub fn get_tile_and_poly_by_ref(&self, reference: PolyRef) -> Result<(&MeshTile, &Poly)> {
        let (tile, index) = self.tile_and_index(reference)?;
        Ok((tile, &tile.polys[index]))
    }

    fn tile_and_index(&self, reference: PolyRef) -> Result<(&MeshTile, usize)> {
        let (slot, index) = self
            .resolve(reference)
            .ok_or_else(|| Status::InvalidParam.with_context(format!("polygon {reference}")))?;
        let tile = self
            .tiles
            .get(slot)
            .ok_or_else(|| Status::NotFound.with_context(format!("polygon {reference}")))?;
        Ok((tile, index))
    }

    /// Decodes a tile blob and adds it to the mesh
    pub fn add_tile(&mut self, data: &[u8]) -> Result<TileRef> {
        let tile = decode_tile(data)?;
        self.add_tile_data(tile)
    }

    /// Adds a decoded tile to the mesh
    ///
    /// Fails without changing the mesh when the coordinate is occupied or
    /// the tile or polygon capacity is exceeded.
    pub fn add_tile_data(&mut self, tile: TileData) -> Result<TileRef> {
        let coord = tile.coord();
        self.check_poly_capacity(&tile)?;
        self.tiles.check_insert(coord)?;
        self.check_tile_bounds(&tile);

        let mesh_tile = MeshTile::from_data(tile);
        let (tile_ref, slot) = self.tiles.insert(coord, mesh_tile)?;

        self.connect_int_links(slot);
        for side in 0..8u8 {
            let neighbour = coord.neighbour(side).and_then(|c| self.tiles.slot_at(c));
            if let Some(neighbour) = neighbour {
                self.connect_ext_links(slot, neighbour, side);
                self.connect_ext_links(neighbour, slot, opposite_side(side));
            }
        }

        log::debug!("Added tile {coord} as {tile_ref}");
        Ok(tile_ref)
    }

    /// Replaces the tile at the blob's coordinate, or adds it if the
    /// coordinate is empty
    ///
    /// A malformed blob leaves the mesh unchanged.
    pub fn replace_tile(&mut self, data: &[u8]) -> Result<TileRef> {
        let tile = decode_tile(data)?;
        self.check_poly_capacity(&tile)?;
        let coord = tile.coord();
        if self.tiles.contains(coord) {
            self.remove_tile(coord)?;
        }
        self.add_tile_data(tile)
    }

    /// Removes the tile at `coord` and the seam links pointing into it
    pub fn remove_tile(&mut self, coord: TileCoord) -> Result<()> {
        let slot = self
            .tiles
            .slot_at(coord)
            .ok_or_else(|| Status::NotFound.with_context(format!("tile {coord}")))?;

        let tile_id = slot as u32 + 1;
        for side in 0..8u8 {
            let neighbour = coord.neighbour(side).and_then(|c| self.tiles.slot_at(c));
            if let Some(neighbour) = neighbour {
                self.unconnect_links(neighbour, tile_id);
            }
        }

        self.tiles.remove(coord)?;
        log::debug!("Removed tile {coord}");
        Ok(())
    }

    fn check_poly_capacity(&self, tile: &TileData) -> Result<()> {
        if tile.polys.len() > self.params.max_polys_per_tile {
            return Err(Status::OutOfMemory.with_context(format!(
                "tile {} has {} polygons, limit is {}",
                tile.coord(),
                tile.polys.len(),
                self.params.max_polys_per_tile
            )));
        }
        Ok(())
    }

    /// Warns when a tile's bounds do not fall into the grid cell of its
    /// coordinate
    fn check_tile_bounds(&self, tile: &TileData) {
        if tile.polys.is_empty() {
            return;
        }
        let coord = tile.coord();
        let min_x = self.params.origin[0] + coord.x as f32 * self.params.tile_width;
        let min_z = self.params.origin[2] + coord.y as f32 * self.params.tile_height;
        let eps_x = self.params.tile_width * 1e-3;
        let eps_z = self.params.tile_height * 1e-3;
        let h = &tile.header;
        if h.bmin[0] < min_x - eps_x
            || h.bmax[0] > min_x + self.params.tile_width + eps_x
            || h.bmin[2] < min_z - eps_z
            || h.bmax[2] > min_z + self.params.tile_height + eps_z
        {
            log::warn!(
                "Tile {coord} bounds {:?}..{:?} fall outside its grid cell",
                h.bmin,
                h.bmax
            );
        }
    }

    /// Links polygons of the same tile through their shared edges
    fn connect_int_links(&mut self, slot: usize) {
        let Some(tile) = self.tiles.get(slot) else {
            return;
        };

        let mut links = Vec::new();
        for (i, poly) in tile.polys.iter().enumerate() {
            if !poly.is_ground() {
                continue;
            }
            for j in 0..poly.vert_count as usize {
                let nei = poly.neis[j];
                if nei == 0 || nei & EXT_LINK != 0 {
                    continue;
                }
                let target = (nei - 1) as usize;
                if !tile.polys[target].is_ground() {
                    continue;
                }
                links.push((
                    i,
                    Link {
                        reference: self.poly_ref(slot, target),
                        edge: j as u8,
                        side: INTERNAL_SIDE,
                        bmin: 0,
                        bmax: 255,
                    },
                ));
            }
        }

        self.apply_links(slot, links);
    }

    /// Links seam edges of the tile in `slot` facing `side` to polygons of
    /// the tile in `target`
    fn connect_ext_links(&mut self, slot: usize, target: usize, side: u8) {
        let (Some(tile), Some(target_tile)) = (self.tiles.get(slot), self.tiles.get(target)) else {
            return;
        };

        let mut links = Vec::new();
        for (i, poly) in tile.polys.iter().enumerate() {
            if !poly.is_ground() {
                continue;
            }
            let nv = poly.vert_count as usize;
            for j in 0..nv {
                let nei = poly.neis[j];
                if nei & EXT_LINK == 0 || (nei & 0xff) as u8 != side {
                    continue;
                }

                let va = tile.verts[poly.verts[j] as usize];
                let vb = tile.verts[poly.verts[(j + 1) % nv] as usize];
                for (index, cmin, cmax) in
                    find_connecting_polys(&va, &vb, target_tile, opposite_side(side))
                {
                    // Express the overlap as a parameter range along this edge
                    let axis = if side == 0 || side == 4 { 2 } else { 0 };
                    let len = vb[axis] - va[axis];
                    let (mut tmin, mut tmax) = if len.abs() > f32::EPSILON {
                        ((cmin - va[axis]) / len, (cmax - va[axis]) / len)
                    } else {
                        (0.0, 1.0)
                    };
                    if tmin > tmax {
                        std::mem::swap(&mut tmin, &mut tmax);
                    }
                    links.push((
                        i,
                        Link {
                            reference: self.poly_ref(target, index),
                            edge: j as u8,
                            side,
                            bmin: (tmin.clamp(0.0, 1.0) * 255.0).round() as u8,
                            bmax: (tmax.clamp(0.0, 1.0) * 255.0).round() as u8,
                        },
                    ));
                }
            }
        }

        if !links.is_empty() {
            log::debug!(
                "Connected {} seam links from tile {} towards side {side}",
                links.len(),
                tile.coord()
            );
        }
        self.apply_links(slot, links);
    }

    fn apply_links(&mut self, slot: usize, links: Vec<(usize, Link)>) {
        if let Some(tile) = self.tiles.get_mut(slot) {
            for (poly, link) in links {
                tile.polys[poly].links.push(link);
            }
        }
    }

    /// Drops every link of the tile in `slot` that points into tile `tile_id`
    fn unconnect_links(&mut self, slot: usize, tile_id: u32) {
        if let Some(tile) = self.tiles.get_mut(slot) {
            for poly in &mut tile.polys {
                poly.links
                    .retain(|link| decode_poly_ref(link.reference).1 != tile_id);
            }
        }
    }

    /// Grid location of the tile containing `pos`
    pub fn calc_tile_loc(&self, pos: &[f32; 3]) -> (i32, i32) {
        let x = ((pos[0] - self.params.origin[0]) / self.params.tile_width).floor() as i32;
        let y = ((pos[2] - self.params.origin[2]) / self.params.tile_height).floor() as i32;
        (x, y)
    }

    /// Polygons whose bounds overlap the query box, in ascending reference
    /// order
    pub fn query_polygons(
        &self,
        center: &[f32; 3],
        half_extents: &[f32; 3],
        filter: &QueryFilter,
    ) -> Vec<PolyRef> {
        let bmin = [
            center[0] - half_extents[0],
            center[1] - half_extents[1],
            center[2] - half_extents[2],
        ];
        let bmax = [
            center[0] + half_extents[0],
            center[1] + half_extents[1],
            center[2] + half_extents[2],
        ];

        let (min_x, min_y) = self.calc_tile_loc(&bmin);
        let (max_x, max_y) = self.calc_tile_loc(&bmax);
        let span = (max_x as i64 - min_x as i64 + 1).max(0) * (max_y as i64 - min_y as i64 + 1).max(0);

        let mut polys = Vec::new();
        if span > self.tiles.len() as i64 {
            for (slot, coord, tile) in self.tiles.iter() {
                if (min_x..=max_x).contains(&coord.x) && (min_y..=max_y).contains(&coord.y) {
                    self.query_polygons_in_tile(slot, tile, &bmin, &bmax, filter, &mut polys);
                }
            }
        } else {
            for y in min_y..=max_y {
                for x in min_x..=max_x {
                    if let Some(slot) = self.tiles.slot_at(TileCoord::new(x, y)) {
                        if let Some(tile) = self.tiles.get(slot) {
                            self.query_polygons_in_tile(slot, tile, &bmin, &bmax, filter, &mut polys);
                        }
                    }
                }
            }
        }

        polys.sort();
        polys
    }

    fn query_polygons_in_tile(
        &self,
        slot: usize,
        tile: &MeshTile,
        bmin: &[f32; 3],
        bmax: &[f32; 3],
        filter: &QueryFilter,
        out: &mut Vec<PolyRef>,
    ) {
        for (i, poly) in tile.polys.iter().enumerate() {
            if poly.is_ground()
                && filter.pass_filter(poly.flags)
                && overlap_bounds(bmin, bmax, &poly.bmin, &poly.bmax)
            {
                out.push(self.poly_ref(slot, i));
            }
        }
    }

    /// Finds the polygon nearest to `center` within the query box
    ///
    /// Returns the polygon and the closest point on it. Distance is measured
    /// in 3D, except that a point above or below a polygon only counts the
    /// height difference beyond the tile's walkable climb. Ties go to the
    /// lowest reference.
    pub fn find_nearest_poly(
        &self,
        center: &[f32; 3],
        half_extents: &[f32; 3],
        filter: &QueryFilter,
    ) -> Option<(PolyRef, [f32; 3])> {
        let mut nearest: Option<(PolyRef, [f32; 3], f32)> = None;

        for reference in self.query_polygons(center, half_extents, filter) {
            let Ok((tile, _)) = self.tile_and_index(reference) else {
                continue;
            };
            let Ok((closest, over_poly)) = self.closest_point_on_poly(reference, center) else {
                continue;
            };

            let d = if over_poly {
                let dy = (center[1] - closest[1]).abs() - tile.header.walkable_climb;
                if dy > 0.0 { dy * dy } else { 0.0 }
            } else {
                vdist_sqr(center, &closest)
            };

            if nearest.map_or(true, |(_, _, best)| d < best) {
                nearest = Some((reference, closest, d));
            }
        }

        nearest.map(|(reference, pos, _)| (reference, pos))
    }

    /// Closest point on a polygon to `pos`
    ///
    /// The flag is true when `pos` lies over the polygon in XZ, in which case
    /// the point is `pos` projected onto the polygon surface.
    pub fn closest_point_on_poly(&self, reference: PolyRef, pos: &[f32; 3]) -> Result<([f32; 3], bool)> {
        let (tile, index) = self.tile_and_index(reference)?;
        let poly = &tile.polys[index];
        let verts = tile.poly_vertices(poly);

        if point_in_polygon_2d(pos, &verts) {
            let h = tile.poly_height(index, pos).unwrap_or_else(|| {
                verts.iter().map(|v| v[1]).sum::<f32>() / verts.len() as f32
            });
            return Ok(([pos[0], h, pos[2]], true));
        }

        Ok((closest_point_on_polygon_boundary(pos, &verts), false))
    }

    /// `pos` if it lies inside the polygon in XZ, else the nearest point on
    /// the polygon boundary
    pub fn closest_point_on_poly_boundary(&self, reference: PolyRef, pos: &[f32; 3]) -> Result<[f32; 3]> {
        let (tile, poly) = self.get_tile_and_poly_by_ref(reference)?;
        Ok(closest_point_on_polygon_boundary(pos, &tile.poly_vertices(poly)))
    }

    /// Height of a polygon surface at the XZ location of `pos`
    pub fn poly_height(&self, reference: PolyRef, pos: &[f32; 3]) -> Result<Option<f32>> {
        let (tile, index) = self.tile_and_index(reference)?;
        Ok(tile.poly_height(index, pos))
    }

    /// Vertices of a polygon in ring order
    pub fn poly_vertices(&self, reference: PolyRef) -> Result<Vec<[f32; 3]>> {
        let (tile, poly) = self.get_tile_and_poly_by_ref(reference)?;
        Ok(tile.poly_vertices(poly))
    }

    /// Links of a polygon
    pub fn links(&self, reference: PolyRef) -> Result<&[Link]> {
        let (_, poly) = self.get_tile_and_poly_by_ref(reference)?;
        Ok(&poly.links)
    }

    /// First polygon linked across `edge` of a polygon
    pub fn neighbour(&self, reference: PolyRef, edge: usize) -> Option<PolyRef> {
        let (_, poly) = self.get_tile_and_poly_by_ref(reference).ok()?;
        poly.edge_links(edge).next().map(|l| l.reference)
    }

    /// Left and right end points of the portal from `from` into `to`
    ///
    /// Seam portals are narrowed to the part of the edge the two polygons
    /// actually share.
    pub fn get_portal_points(&self, from: PolyRef, to: PolyRef) -> Result<([f32; 3], [f32; 3])> {
        let (tile, poly) = self.get_tile_and_poly_by_ref(from)?;
        let link = poly
            .links
            .iter()
            .find(|l| l.reference == to)
            .ok_or_else(|| Status::InvalidParam.with_context(format!("{from} is not linked to {to}")))?;

        let nv = poly.vert_count as usize;
        let edge = link.edge as usize;
        let v0 = tile.verts[poly.verts[edge] as usize];
        let v1 = tile.verts[poly.verts[(edge + 1) % nv] as usize];

        if link.side != INTERNAL_SIDE && (link.bmin != 0 || link.bmax != 255) {
            let s = 1.0 / 255.0;
            return Ok((
                vlerp(&v0, &v1, link.bmin as f32 * s),
                vlerp(&v0, &v1, link.bmax as f32 * s),
            ));
        }

        Ok((v0, v1))
    }

    /// Midpoint of the portal from `from` into `to`
    pub fn get_edge_mid_point(&self, from: PolyRef, to: PolyRef) -> Result<[f32; 3]> {
        let (left, right) = self.get_portal_points(from, to)?;
        Ok(vlerp(&left, &right, 0.5))
    }
}

/// Coordinate along a seam that identifies the seam line
fn get_slab_coord(v: &[f32; 3], side: u8) -> f32 {
    if side == 0 || side == 4 { v[0] } else { v[2] }
}

/// End points of an edge projected onto the seam, as (along, height) pairs
/// sorted along the seam
fn calc_slab_end_points(va: &[f32; 3], vb: &[f32; 3], side: u8) -> ([f32; 2], [f32; 2]) {
    let axis = if side == 0 || side == 4 { 2 } else { 0 };
    if va[axis] < vb[axis] {
        ([va[axis], va[1]], [vb[axis], vb[1]])
    } else {
        ([vb[axis], vb[1]], [va[axis], va[1]])
    }
}

/// Checks whether two seam edges overlap along the seam and are within
/// `py` of each other in height over the overlap
fn overlap_slabs(amin: &[f32; 2], amax: &[f32; 2], bmin: &[f32; 2], bmax: &[f32; 2], px: f32, py: f32) -> bool {
    let minx = (amin[0] + px).max(bmin[0] + px);
    let maxx = (amax[0] - px).min(bmax[0] - px);
    if minx > maxx {
        return false;
    }

    let ad = (amax[1] - amin[1]) / (amax[0] - amin[0]);
    let ak = amin[1] - ad * amin[0];
    let bd = (bmax[1] - bmin[1]) / (bmax[0] - bmin[0]);
    let bk = bmin[1] - bd * bmin[0];
    let aminy = ad * minx + ak;
    let amaxy = ad * maxx + ak;
    let bminy = bd * minx + bk;
    let bmaxy = bd * maxx + bk;
    let dmin = bminy - aminy;
    let dmax = bmaxy - amaxy;

    // Crossing segments always overlap
    if dmin * dmax < 0.0 {
        return true;
    }

    let thr = (py * 2.0) * (py * 2.0);
    dmin * dmin <= thr || dmax * dmax <= thr
}

/// Polygons of `tile` whose `side` seam edges overlap the edge `va -> vb`
///
/// Returns the polygon index and the overlapping range along the seam.
fn find_connecting_polys(
    va: &[f32; 3],
    vb: &[f32; 3],
    tile: &MeshTile,
    side: u8,
) -> Vec<(usize, f32, f32)> {
    let (amin, amax) = calc_slab_end_points(va, vb, side);
    let apos = get_slab_coord(va, side);
    let climb = tile.header.walkable_climb;
    let code = EXT_LINK | side as u16;

    let mut connections = Vec::new();
    for (i, poly) in tile.polys.iter().enumerate() {
        if !poly.is_ground() {
            continue;
        }
        let nv = poly.vert_count as usize;
        for j in 0..nv {
            if poly.neis[j] != code {
                continue;
            }
            let vc = &tile.verts[poly.verts[j] as usize];
            let vd = &tile.verts[poly.verts[(j + 1) % nv] as usize];
            if (apos - get_slab_coord(vc, side)).abs() > 0.01 {
                continue;
            }
            let (bmin, bmax) = calc_slab_end_points(vc, vd, side);
            if !overlap_slabs(&amin, &amax, &bmin, &bmax, 0.01, climb) {
                continue;
            }
            if connections.len() < MAX_SEAM_CONNECTIONS {
                connections.push((i, amin[0].max(bmin[0]), amax[0].min(bmax[0])));
            }
            break;
        }
    }
    connections
}
