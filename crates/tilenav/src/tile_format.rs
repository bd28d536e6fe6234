//! Binary tile format
//!
//! Tiles use the little-endian "DNAV" version 7 layout: a fixed 100 byte
//! header followed by 4-byte aligned sections for vertices, polygons, links,
//! detail meshes, detail vertices, detail triangles, BV nodes and off-mesh
//! connections. Links, BV nodes and off-mesh connection records are skipped on
//! decode; the runtime builds its own links and bounds.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use super::{EXT_LINK, MAX_VERTS_PER_POLY, PolyFlags, Status, TileCoord};
use tilenav_common::{Error, Result};

/// Magic number of a tile blob ('DNAV')
pub const DNAV_MAGIC: u32 = 0x444E_4156;

/// Supported tile format version
pub const DNAV_VERSION: u32 = 7;

/// Size of the serialized header in bytes
pub const HEADER_SIZE: usize = 100;

const VERT_SIZE: usize = 12;
const POLY_SIZE: usize = 32;
const LINK_SIZE: usize = 12;
const DETAIL_MESH_SIZE: usize = 12;
const DETAIL_TRI_SIZE: usize = 4;
const BV_NODE_SIZE: usize = 16;
const OFF_MESH_CON_SIZE: usize = 36;

/// Null link value written into the `first_link` slot
const NULL_LINK: u32 = 0xffff_ffff;

/// Largest grid the builder lays out; internal neighbour codes must stay
/// below `EXT_LINK`
pub const MAX_GRID_DIVISIONS: usize = 181;

/// Align value to 4-byte boundary
fn align4(value: usize) -> usize {
    (value + 3) & !3
}

/// Tile header
#[derive(Debug, Clone, PartialEq)]
pub struct TileHeader {
    pub magic: u32,
    pub version: u32,
    pub x: i32,
    pub y: i32,
    pub layer: i32,
    pub user_id: u32,
    pub poly_count: i32,
    pub vert_count: i32,
    pub max_link_count: i32,
    pub detail_mesh_count: i32,
    pub detail_vert_count: i32,
    pub detail_tri_count: i32,
    pub bv_node_count: i32,
    pub off_mesh_con_count: i32,
    pub off_mesh_base: i32,
    pub walkable_height: f32,
    pub walkable_radius: f32,
    pub walkable_climb: f32,
    pub bmin: [f32; 3],
    pub bmax: [f32; 3],
    pub bv_quant_factor: f32,
}

impl Default for TileHeader {
    fn default() -> Self {
        Self {
            magic: DNAV_MAGIC,
            version: DNAV_VERSION,
            x: 0,
            y: 0,
            layer: 0,
            user_id: 0,
            poly_count: 0,
            vert_count: 0,
            max_link_count: 0,
            detail_mesh_count: 0,
            detail_vert_count: 0,
            detail_tri_count: 0,
            bv_node_count: 0,
            off_mesh_con_count: 0,
            off_mesh_base: 0,
            walkable_height: 2.0,
            walkable_radius: 0.5,
            walkable_climb: 0.5,
            bmin: [0.0; 3],
            bmax: [0.0; 3],
            bv_quant_factor: 1.0,
        }
    }
}

impl TileHeader {
    /// Tile grid coordinate stored in the header
    pub fn coord(&self) -> TileCoord {
        TileCoord::new(self.x, self.y)
    }

    fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            magic: reader.read_u32::<LittleEndian>()?,
            version: reader.read_u32::<LittleEndian>()?,
            x: reader.read_i32::<LittleEndian>()?,
            y: reader.read_i32::<LittleEndian>()?,
            layer: reader.read_i32::<LittleEndian>()?,
            user_id: reader.read_u32::<LittleEndian>()?,
            poly_count: reader.read_i32::<LittleEndian>()?,
            vert_count: reader.read_i32::<LittleEndian>()?,
            max_link_count: reader.read_i32::<LittleEndian>()?,
            detail_mesh_count: reader.read_i32::<LittleEndian>()?,
            detail_vert_count: reader.read_i32::<LittleEndian>()?,
            detail_tri_count: reader.read_i32::<LittleEndian>()?,
            bv_node_count: reader.read_i32::<LittleEndian>()?,
            off_mesh_con_count: reader.read_i32::<LittleEndian>()?,
            off_mesh_base: reader.read_i32::<LittleEndian>()?,
            walkable_height: reader.read_f32::<LittleEndian>()?,
            walkable_radius: reader.read_f32::<LittleEndian>()?,
            walkable_climb: reader.read_f32::<LittleEndian>()?,
            bmin: read_vec3(reader)?,
            bmax: read_vec3(reader)?,
            bv_quant_factor: reader.read_f32::<LittleEndian>()?,
        })
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.magic)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_i32::<LittleEndian>(self.x)?;
        writer.write_i32::<LittleEndian>(self.y)?;
        writer.write_i32::<LittleEndian>(self.layer)?;
        writer.write_u32::<LittleEndian>(self.user_id)?;
        writer.write_i32::<LittleEndian>(self.poly_count)?;
        writer.write_i32::<LittleEndian>(self.vert_count)?;
        writer.write_i32::<LittleEndian>(self.max_link_count)?;
        writer.write_i32::<LittleEndian>(self.detail_mesh_count)?;
        writer.write_i32::<LittleEndian>(self.detail_vert_count)?;
        writer.write_i32::<LittleEndian>(self.detail_tri_count)?;
        writer.write_i32::<LittleEndian>(self.bv_node_count)?;
        writer.write_i32::<LittleEndian>(self.off_mesh_con_count)?;
        writer.write_i32::<LittleEndian>(self.off_mesh_base)?;
        writer.write_f32::<LittleEndian>(self.walkable_height)?;
        writer.write_f32::<LittleEndian>(self.walkable_radius)?;
        writer.write_f32::<LittleEndian>(self.walkable_climb)?;
        write_vec3(writer, &self.bmin)?;
        write_vec3(writer, &self.bmax)?;
        writer.write_f32::<LittleEndian>(self.bv_quant_factor)?;
        Ok(())
    }

    /// Section counts as unsigned values, rejecting negative entries
    fn counts(&self) -> Result<SectionCounts> {
        let count = |value: i32, name: &str| {
            usize::try_from(value).map_err(|_| {
                Status::DataCorrupted.with_context(format!("negative {name} count {value}"))
            })
        };
        Ok(SectionCounts {
            verts: count(self.vert_count, "vertex")?,
            polys: count(self.poly_count, "polygon")?,
            links: count(self.max_link_count, "link")?,
            detail_meshes: count(self.detail_mesh_count, "detail mesh")?,
            detail_verts: count(self.detail_vert_count, "detail vertex")?,
            detail_tris: count(self.detail_tri_count, "detail triangle")?,
            bv_nodes: count(self.bv_node_count, "BV node")?,
            off_mesh_cons: count(self.off_mesh_con_count, "off-mesh connection")?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct SectionCounts {
    verts: usize,
    polys: usize,
    links: usize,
    detail_meshes: usize,
    detail_verts: usize,
    detail_tris: usize,
    bv_nodes: usize,
    off_mesh_cons: usize,
}

impl SectionCounts {
    /// Total blob size implied by the counts, `None` on overflow
    fn data_size(&self) -> Option<usize> {
        let sections = [
            (self.verts, VERT_SIZE),
            (self.polys, POLY_SIZE),
            (self.links, LINK_SIZE),
            (self.detail_meshes, DETAIL_MESH_SIZE),
            (self.detail_verts, VERT_SIZE),
            (self.detail_tris, DETAIL_TRI_SIZE),
            (self.bv_nodes, BV_NODE_SIZE),
            (self.off_mesh_cons, OFF_MESH_CON_SIZE),
        ];
        sections
            .iter()
            .try_fold(align4(HEADER_SIZE), |total, &(count, size)| {
                total.checked_add(align4(count.checked_mul(size)?))
            })
    }
}

/// Polygon type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum PolyType {
    /// Regular ground polygon
    Ground = 0,
    /// Two-vertex off-mesh connection, never traversed by queries
    OffMeshConnection = 1,
}

/// Polygon record as stored in a tile
#[derive(Debug, Clone, PartialEq)]
pub struct PolyData {
    /// Vertex indices, only the first `vert_count` entries are meaningful
    pub verts: [u16; MAX_VERTS_PER_POLY],
    /// Neighbour code per edge
    pub neis: [u16; MAX_VERTS_PER_POLY],
    pub flags: PolyFlags,
    pub vert_count: u8,
    /// Area id (6 bits)
    pub area: u8,
    pub poly_type: PolyType,
}

impl PolyData {
    fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        // first_link is runtime state of the writer, ignore it
        let _first_link = reader.read_u32::<LittleEndian>()?;

        let mut verts = [0u16; MAX_VERTS_PER_POLY];
        for v in &mut verts {
            *v = reader.read_u16::<LittleEndian>()?;
        }

        let mut neis = [0u16; MAX_VERTS_PER_POLY];
        for n in &mut neis {
            *n = reader.read_u16::<LittleEndian>()?;
        }

        let flags = PolyFlags::from_bits_retain(reader.read_u16::<LittleEndian>()?);
        let vert_count = reader.read_u8()?;
        let area_and_type = reader.read_u8()?;

        let poly_type = match area_and_type >> 6 {
            0 => PolyType::Ground,
            1 => PolyType::OffMeshConnection,
            other => {
                return Err(Status::DataCorrupted.with_context(format!("unknown polygon type {other}")));
            }
        };

        Ok(Self {
            verts,
            neis,
            flags,
            vert_count,
            area: area_and_type & 0x3F,
            poly_type,
        })
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(NULL_LINK)?;
        for &v in &self.verts {
            writer.write_u16::<LittleEndian>(v)?;
        }
        for &n in &self.neis {
            writer.write_u16::<LittleEndian>(n)?;
        }
        writer.write_u16::<LittleEndian>(self.flags.bits())?;
        writer.write_u8(self.vert_count)?;
        writer.write_u8((self.area & 0x3F) | ((self.poly_type as u8) << 6))?;
        Ok(())
    }
}

/// Detail sub-mesh of a polygon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolyDetail {
    /// Offset of the first extra vertex in the detail vertex array
    pub vert_base: u32,
    /// Offset of the first triangle in the detail triangle array
    pub tri_base: u32,
    /// Number of extra vertices
    pub vert_count: u8,
    /// Number of triangles
    pub tri_count: u8,
}

impl PolyDetail {
    fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let detail = Self {
            vert_base: reader.read_u32::<LittleEndian>()?,
            tri_base: reader.read_u32::<LittleEndian>()?,
            vert_count: reader.read_u8()?,
            tri_count: reader.read_u8()?,
        };
        // Padding
        reader.read_u16::<LittleEndian>()?;
        Ok(detail)
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.vert_base)?;
        writer.write_u32::<LittleEndian>(self.tri_base)?;
        writer.write_u8(self.vert_count)?;
        writer.write_u8(self.tri_count)?;
        writer.write_u16::<LittleEndian>(0)?;
        Ok(())
    }
}

/// Decoded tile, owning all of its data
#[derive(Debug, Clone, PartialEq)]
pub struct TileData {
    pub header: TileHeader,
    pub verts: Vec<[f32; 3]>,
    pub polys: Vec<PolyData>,
    pub detail_meshes: Vec<PolyDetail>,
    pub detail_verts: Vec<[f32; 3]>,
    pub detail_tris: Vec<[u8; 4]>,
}

impl TileData {
    /// Tile grid coordinate of the tile
    pub fn coord(&self) -> TileCoord {
        self.header.coord()
    }

    /// Encodes the tile into the binary layout
    ///
    /// Header counts are taken from the vectors, except for the link, BV node
    /// and off-mesh connection counts which are written as zero-filled
    /// sections of the size the header announces.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut header = self.header.clone();
        header.vert_count = to_count(self.verts.len())?;
        header.poly_count = to_count(self.polys.len())?;
        header.detail_mesh_count = to_count(self.detail_meshes.len())?;
        header.detail_vert_count = to_count(self.detail_verts.len())?;
        header.detail_tri_count = to_count(self.detail_tris.len())?;
        let counts = header.counts()?;
        let size = counts
            .data_size()
            .ok_or_else(|| Status::InvalidParam.with_context("tile too large"))?;

        let mut out = Vec::with_capacity(size);
        header.write_to(&mut out)?;
        for v in &self.verts {
            write_vec3(&mut out, v)?;
        }
        for poly in &self.polys {
            poly.write_to(&mut out)?;
        }
        out.resize(out.len() + counts.links * LINK_SIZE, 0);
        for detail in &self.detail_meshes {
            detail.write_to(&mut out)?;
        }
        for v in &self.detail_verts {
            write_vec3(&mut out, v)?;
        }
        for tri in &self.detail_tris {
            out.write_all(tri)?;
        }
        out.resize(
            out.len() + counts.bv_nodes * BV_NODE_SIZE + counts.off_mesh_cons * OFF_MESH_CON_SIZE,
            0,
        );
        Ok(out)
    }

    /// Checks indices, ranges and values of every section
    fn validate(&self) -> Result<()> {
        let header = &self.header;
        let floats = [
            header.walkable_height,
            header.walkable_radius,
            header.walkable_climb,
            header.bv_quant_factor,
        ];
        if floats
            .iter()
            .chain(header.bmin.iter())
            .chain(header.bmax.iter())
            .any(|f| !f.is_finite())
        {
            return Err(Status::DataCorrupted.with_context("non-finite header value"));
        }
        if header.walkable_climb < 0.0 {
            return Err(Status::DataCorrupted.with_context("negative walkable climb"));
        }

        if let Some(i) = self
            .verts
            .iter()
            .chain(self.detail_verts.iter())
            .position(|v| v.iter().any(|f| !f.is_finite()))
        {
            return Err(Status::DataCorrupted.with_context(format!("non-finite vertex {i}")));
        }

        let vert_count = self.verts.len();
        let poly_count = self.polys.len();
        for (i, poly) in self.polys.iter().enumerate() {
            let nv = poly.vert_count as usize;
            let valid_count = match poly.poly_type {
                PolyType::Ground => (3..=MAX_VERTS_PER_POLY).contains(&nv),
                PolyType::OffMeshConnection => nv == 2,
            };
            if !valid_count {
                return Err(Status::DataCorrupted
                    .with_context(format!("polygon {i} has {nv} vertices")));
            }
            if let Some(&v) = poly.verts[..nv].iter().find(|&&v| v as usize >= vert_count) {
                return Err(Status::DataCorrupted
                    .with_context(format!("polygon {i} references vertex {v} of {vert_count}")));
            }
            if poly.poly_type == PolyType::OffMeshConnection {
                continue;
            }
            for &nei in &poly.neis[..nv] {
                if nei & EXT_LINK != 0 {
                    if nei & 0xff >= 8 {
                        return Err(Status::DataCorrupted
                            .with_context(format!("polygon {i} has seam side {}", nei & 0xff)));
                    }
                } else if nei != 0 && (nei - 1) as usize >= poly_count {
                    return Err(Status::DataCorrupted
                        .with_context(format!("polygon {i} references neighbour {}", nei - 1)));
                }
            }
        }

        if !self.detail_meshes.is_empty() {
            for (i, poly) in self.polys.iter().enumerate() {
                if poly.poly_type != PolyType::Ground {
                    continue;
                }
                let Some(detail) = self.detail_meshes.get(i) else {
                    return Err(Status::DataCorrupted
                        .with_context(format!("polygon {i} has no detail mesh")));
                };
                let vert_end = detail.vert_base as usize + detail.vert_count as usize;
                let tri_end = detail.tri_base as usize + detail.tri_count as usize;
                if vert_end > self.detail_verts.len() || tri_end > self.detail_tris.len() {
                    return Err(Status::DataCorrupted
                        .with_context(format!("detail mesh {i} out of range")));
                }
                let limit = poly.vert_count as usize + detail.vert_count as usize;
                let tris = &self.detail_tris[detail.tri_base as usize..tri_end];
                if tris.iter().any(|t| t[..3].iter().any(|&k| k as usize >= limit)) {
                    return Err(Status::DataCorrupted
                        .with_context(format!("detail mesh {i} has an invalid triangle")));
                }
            }
        }

        Ok(())
    }
}

fn to_count(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| Status::InvalidParam.with_context("section too large"))
}

fn read_vec3<R: Read>(reader: &mut R) -> Result<[f32; 3]> {
    Ok([
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
    ])
}

fn write_vec3<W: Write>(writer: &mut W, v: &[f32; 3]) -> Result<()> {
    writer.write_f32::<LittleEndian>(v[0])?;
    writer.write_f32::<LittleEndian>(v[1])?;
    writer.write_f32::<LittleEndian>(v[2])?;
    Ok(())
}

/// Decodes and validates a tile blob
///
/// The blob must be exactly as long as its header announces. The returned
/// tile owns copies of everything it needs; `data` is not retained.
pub fn decode_tile(data: &[u8]) -> Result<TileData> {
    if data.len() < HEADER_SIZE {
        return Err(Error::InvalidTileData(format!(
            "tile data too short for header: {} bytes",
            data.len()
        )));
    }

    let mut cursor = Cursor::new(data);
    let header = TileHeader::read_from(&mut cursor)?;

    if header.magic != DNAV_MAGIC {
        return Err(Status::WrongMagic.with_context(format!("{:#010x}", header.magic)));
    }
    if header.version != DNAV_VERSION {
        return Err(Status::WrongVersion.with_context(header.version));
    }

    let counts = header.counts()?;
    let expected = counts
        .data_size()
        .ok_or_else(|| Status::DataCorrupted.with_context("section sizes overflow"))?;
    if data.len() != expected {
        return Err(Status::DataCorrupted.with_context(format!(
            "expected {expected} bytes, got {}",
            data.len()
        )));
    }

    cursor.seek(SeekFrom::Start(align4(HEADER_SIZE) as u64))?;

    let verts = (0..counts.verts)
        .map(|_| read_vec3(&mut cursor))
        .collect::<Result<Vec<_>>>()?;
    let polys = (0..counts.polys)
        .map(|_| PolyData::read_from(&mut cursor))
        .collect::<Result<Vec<_>>>()?;
    cursor.seek(SeekFrom::Current((counts.links * LINK_SIZE) as i64))?;
    let detail_meshes = (0..counts.detail_meshes)
        .map(|_| PolyDetail::read_from(&mut cursor))
        .collect::<Result<Vec<_>>>()?;
    let detail_verts = (0..counts.detail_verts)
        .map(|_| read_vec3(&mut cursor))
        .collect::<Result<Vec<_>>>()?;
    let detail_tris = (0..counts.detail_tris)
        .map(|_| -> Result<[u8; 4]> {
            let mut tri = [0u8; 4];
            cursor.read_exact(&mut tri)?;
            Ok(tri)
        })
        .collect::<Result<Vec<_>>>()?;

    let tile = TileData {
        header,
        verts,
        polys,
        detail_meshes,
        detail_verts,
        detail_tris,
    };
    tile.validate()?;

    log::debug!(
        "Decoded tile {} with {} polygons and {} vertices",
        tile.coord(),
        tile.polys.len(),
        tile.verts.len()
    );

    Ok(tile)
}

/// Builds tile data from polygons, mostly for tooling and tests
#[derive(Debug, Clone)]
pub struct TileDataBuilder {
    coord: TileCoord,
    walkable_height: f32,
    walkable_radius: f32,
    walkable_climb: f32,
    verts: Vec<[f32; 3]>,
    polys: Vec<PolyData>,
    detail_meshes: Vec<PolyDetail>,
    detail_verts: Vec<[f32; 3]>,
    detail_tris: Vec<[u8; 4]>,
}

impl TileDataBuilder {
    /// Creates an empty builder for the tile at `coord`
    pub fn new(coord: TileCoord) -> Self {
        let defaults = TileHeader::default();
        Self {
            coord,
            walkable_height: defaults.walkable_height,
            walkable_radius: defaults.walkable_radius,
            walkable_climb: defaults.walkable_climb,
            verts: Vec::new(),
            polys: Vec::new(),
            detail_meshes: Vec::new(),
            detail_verts: Vec::new(),
            detail_tris: Vec::new(),
        }
    }

    /// Creates a flat grid tile of `divisions * divisions` square polygons
    ///
    /// The tile covers `[x * tile_size, (x + 1) * tile_size]` along X and the
    /// same range for `y` along Z. Border edges are marked as seams.
    pub fn grid(coord: TileCoord, tile_size: f32, divisions: usize, height: f32) -> Result<Self> {
        Self::grid_masked(coord, tile_size, divisions, height, |_, _| true)
    }

    /// Like [`TileDataBuilder::grid`], only creating the cells for which
    /// `keep(column, row)` returns true
    ///
    /// Edges next to a missing cell become plain boundaries.
    pub fn grid_masked<F>(
        coord: TileCoord,
        tile_size: f32,
        divisions: usize,
        height: f32,
        keep: F,
    ) -> Result<Self>
    where
        F: Fn(usize, usize) -> bool,
    {
        if !(1..=MAX_GRID_DIVISIONS).contains(&divisions) {
            return Err(Error::Config(format!(
                "grid divisions must be within 1..={MAX_GRID_DIVISIONS}, got {divisions}"
            )));
        }
        if !tile_size.is_finite() || tile_size <= 0.0 || !height.is_finite() {
            return Err(Error::Config(format!("invalid grid tile size {tile_size}")));
        }

        let mut builder = Self::new(coord);
        let step = tile_size / divisions as f32;
        let x0 = coord.x as f32 * tile_size;
        let z0 = coord.y as f32 * tile_size;
        for j in 0..=divisions {
            for i in 0..=divisions {
                builder.verts.push([x0 + i as f32 * step, height, z0 + j as f32 * step]);
            }
        }

        let vertex = |i: usize, j: usize| (j * (divisions + 1) + i) as u16;
        let mut cell_index = vec![None; divisions * divisions];
        let mut next = 0u16;
        for j in 0..divisions {
            for i in 0..divisions {
                if keep(i, j) {
                    cell_index[j * divisions + i] = Some(next);
                    next += 1;
                }
            }
        }
        let neighbour = |i: isize, j: isize, side: u16| -> u16 {
            let d = divisions as isize;
            if i < 0 || j < 0 || i >= d || j >= d {
                return EXT_LINK | side;
            }
            cell_index[(j * d + i) as usize].map_or(0, |idx| idx + 1)
        };

        for j in 0..divisions {
            for i in 0..divisions {
                if cell_index[j * divisions + i].is_none() {
                    continue;
                }
                let (ii, jj) = (i as isize, j as isize);
                let mut poly = PolyData {
                    verts: [0; MAX_VERTS_PER_POLY],
                    neis: [0; MAX_VERTS_PER_POLY],
                    flags: PolyFlags::WALK,
                    vert_count: 4,
                    area: 0,
                    poly_type: PolyType::Ground,
                };
                poly.verts[..4].copy_from_slice(&[
                    vertex(i, j),
                    vertex(i, j + 1),
                    vertex(i + 1, j + 1),
                    vertex(i + 1, j),
                ]);
                poly.neis[..4].copy_from_slice(&[
                    neighbour(ii - 1, jj, 4),
                    neighbour(ii, jj + 1, 2),
                    neighbour(ii + 1, jj, 0),
                    neighbour(ii, jj - 1, 6),
                ]);
                builder.polys.push(poly);
            }
        }

        Ok(builder)
    }

    pub fn walkable_climb(mut self, climb: f32) -> Self {
        self.walkable_climb = climb;
        self
    }

    pub fn walkable_height(mut self, height: f32) -> Self {
        self.walkable_height = height;
        self
    }

    pub fn walkable_radius(mut self, radius: f32) -> Self {
        self.walkable_radius = radius;
        self
    }

    /// Adds a vertex and returns its index
    pub fn add_vertex(&mut self, v: [f32; 3]) -> u16 {
        self.verts.push(v);
        (self.verts.len() - 1) as u16
    }

    /// Adds a ground polygon and returns its index
    ///
    /// `neis` holds one neighbour code per vertex: 0 for a boundary edge,
    /// `index + 1` for a polygon of this tile or `EXT_LINK | side` for a seam.
    pub fn add_polygon(&mut self, verts: &[u16], neis: &[u16], flags: PolyFlags, area: u8) -> usize {
        let nv = verts.len().min(MAX_VERTS_PER_POLY);
        let mut poly = PolyData {
            verts: [0; MAX_VERTS_PER_POLY],
            neis: [0; MAX_VERTS_PER_POLY],
            flags,
            vert_count: nv as u8,
            area,
            poly_type: PolyType::Ground,
        };
        poly.verts[..nv].copy_from_slice(&verts[..nv]);
        for (slot, &nei) in poly.neis.iter_mut().zip(neis.iter().take(nv)) {
            *slot = nei;
        }
        self.polys.push(poly);
        self.polys.len() - 1
    }

    /// Adds a two-vertex off-mesh connection polygon
    pub fn add_off_mesh_connection(&mut self, a: u16, b: u16, flags: PolyFlags, area: u8) -> usize {
        let mut poly = PolyData {
            verts: [0; MAX_VERTS_PER_POLY],
            neis: [0; MAX_VERTS_PER_POLY],
            flags,
            vert_count: 2,
            area,
            poly_type: PolyType::OffMeshConnection,
        };
        poly.verts[0] = a;
        poly.verts[1] = b;
        self.polys.push(poly);
        self.polys.len() - 1
    }

    /// Sets the detail mesh of every ground polygon at once
    pub fn detail(
        mut self,
        meshes: Vec<PolyDetail>,
        verts: Vec<[f32; 3]>,
        tris: Vec<[u8; 4]>,
    ) -> Self {
        self.detail_meshes = meshes;
        self.detail_verts = verts;
        self.detail_tris = tris;
        self
    }

    /// Polygons added so far
    pub fn polys_mut(&mut self) -> &mut [PolyData] {
        &mut self.polys
    }

    /// Finalizes the tile, computing bounds and link capacity
    pub fn build(&self) -> TileData {
        let mut bmin = [f32::MAX; 3];
        let mut bmax = [f32::MIN; 3];
        for v in self.verts.iter().chain(self.detail_verts.iter()) {
            for k in 0..3 {
                bmin[k] = bmin[k].min(v[k]);
                bmax[k] = bmax[k].max(v[k]);
            }
        }
        if self.verts.is_empty() {
            bmin = [0.0; 3];
            bmax = [0.0; 3];
        }

        let mut edge_count = 0;
        let mut portal_count = 0;
        for poly in self.polys.iter().filter(|p| p.poly_type == PolyType::Ground) {
            for &nei in &poly.neis[..poly.vert_count as usize] {
                if nei & EXT_LINK != 0 {
                    portal_count += 1;
                } else if nei != 0 {
                    edge_count += 1;
                }
            }
        }
        let ground = self
            .polys
            .iter()
            .take_while(|p| p.poly_type == PolyType::Ground)
            .count();

        let header = TileHeader {
            x: self.coord.x,
            y: self.coord.y,
            poly_count: self.polys.len() as i32,
            vert_count: self.verts.len() as i32,
            max_link_count: edge_count + portal_count * 2,
            detail_mesh_count: self.detail_meshes.len() as i32,
            detail_vert_count: self.detail_verts.len() as i32,
            detail_tri_count: self.detail_tris.len() as i32,
            off_mesh_base: ground as i32,
            walkable_height: self.walkable_height,
            walkable_radius: self.walkable_radius,
            walkable_climb: self.walkable_climb,
            bmin,
            bmax,
            ..TileHeader::default()
        };

        TileData {
            header,
            verts: self.verts.clone(),
            polys: self.polys.clone(),
            detail_meshes: self.detail_meshes.clone(),
            detail_verts: self.detail_verts.clone(),
            detail_tris: self.detail_tris.clone(),
        }
    }

    /// Builds and encodes the tile
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.build().to_bytes()
    }
}
