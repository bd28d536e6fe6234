//! Tile slot arena keyed by tile coordinate
//!
//! Slots are reused through a free list. Every slot carries a salt that is
//! bumped whenever its tile is removed, so references handed out for a
//! removed tile never resolve to a later tile stored in the same slot.

use std::collections::HashMap;

use super::nav_mesh::{SALT_MASK, decode_poly_ref, encode_poly_ref};
use super::{PolyRef, Status, TileCoord};
use tilenav_common::Result;

/// Reference to a loaded tile
///
/// Encoded like a polygon reference with a zero polygon index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TileRef(u32);

impl TileRef {
    pub(crate) fn encode(salt: u32, slot: usize) -> Self {
        Self(encode_poly_ref(salt, slot as u32 + 1, 0).id())
    }

    /// Gets the raw id of the tile reference
    pub fn id(&self) -> u32 {
        self.0
    }

    /// Splits the reference into its salt and slot index
    pub fn decode(&self) -> Option<(u32, usize)> {
        let (salt, tile_id, _) = decode_poly_ref(PolyRef::new(self.0));
        let slot = tile_id.checked_sub(1)?;
        Some((salt, slot as usize))
    }
}

impl std::fmt::Display for TileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[derive(Debug)]
struct TileSlot<T> {
    salt: u32,
    coord: TileCoord,
    item: Option<T>,
}

/// Coordinate to tile mapping with salted slot reuse
#[derive(Debug)]
pub struct TileIndex<T> {
    slots: Vec<TileSlot<T>>,
    free_list: Vec<usize>,
    lookup: HashMap<TileCoord, usize>,
    max_tiles: usize,
}

impl<T> TileIndex<T> {
    /// Creates an empty index holding at most `max_tiles` tiles
    pub fn new(max_tiles: usize) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            lookup: HashMap::new(),
            max_tiles,
        }
    }

    /// Number of loaded tiles
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    pub fn max_tiles(&self) -> usize {
        self.max_tiles
    }

    pub fn contains(&self, coord: TileCoord) -> bool {
        self.lookup.contains_key(&coord)
    }

    /// Slot index of the tile at `coord`
    pub fn slot_at(&self, coord: TileCoord) -> Option<usize> {
        self.lookup.get(&coord).copied()
    }

    /// Reference of the tile at `coord`
    pub fn tile_ref_at(&self, coord: TileCoord) -> Option<TileRef> {
        let slot = self.slot_at(coord)?;
        Some(TileRef::encode(self.slots[slot].salt, slot))
    }

    /// Current salt of a slot
    pub fn salt(&self, slot: usize) -> u32 {
        self.slots.get(slot).map_or(0, |s| s.salt)
    }

    /// Checks that a tile could be inserted at `coord` without changing state
    pub fn check_insert(&self, coord: TileCoord) -> Result<()> {
        if self.contains(coord) {
            return Err(Status::AlreadyExists.with_context(format!("tile {coord}")));
        }
        if self.free_list.is_empty() && self.slots.len() >= self.max_tiles {
            return Err(Status::OutOfMemory
                .with_context(format!("tile limit of {} reached", self.max_tiles)));
        }
        Ok(())
    }

    /// Inserts a tile and returns its reference and slot
    pub fn insert(&mut self, coord: TileCoord, item: T) -> Result<(TileRef, usize)> {
        self.check_insert(coord)?;

        let slot = match self.free_list.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(TileSlot {
                    salt: 1,
                    coord,
                    item: None,
                });
                self.slots.len() - 1
            }
        };

        let entry = &mut self.slots[slot];
        entry.coord = coord;
        entry.item = Some(item);
        self.lookup.insert(coord, slot);

        Ok((TileRef::encode(entry.salt, slot), slot))
    }

    /// Removes the tile at `coord`, returning it
    ///
    /// The slot salt is advanced so outstanding references become stale.
    pub fn remove(&mut self, coord: TileCoord) -> Result<T> {
        let slot = self
            .lookup
            .remove(&coord)
            .ok_or_else(|| Status::NotFound.with_context(format!("tile {coord}")))?;

        let entry = &mut self.slots[slot];
        let item = entry
            .item
            .take()
            .ok_or_else(|| Status::NotFound.with_context(format!("tile {coord}")))?;

        entry.salt = (entry.salt + 1) & SALT_MASK;
        if entry.salt == 0 {
            entry.salt = 1;
        }
        self.free_list.push(slot);

        Ok(item)
    }

    /// Tile in `slot`
    pub fn get(&self, slot: usize) -> Option<&T> {
        self.slots.get(slot)?.item.as_ref()
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.slots.get_mut(slot)?.item.as_mut()
    }

    /// Tile at `coord`
    pub fn get_at(&self, coord: TileCoord) -> Option<&T> {
        self.get(self.slot_at(coord)?)
    }

    /// Resolves a tile reference to its slot if the reference is still live
    pub fn resolve(&self, tile_ref: TileRef) -> Option<usize> {
        let (salt, slot) = tile_ref.decode()?;
        self.resolve_slot(salt, slot)
    }

    /// Checks a salt and slot pair taken from a reference
    pub fn resolve_slot(&self, salt: u32, slot: usize) -> Option<usize> {
        let entry = self.slots.get(slot)?;
        (entry.item.is_some() && entry.salt == salt).then_some(slot)
    }

    /// Iterates over loaded tiles as `(slot, coordinate, tile)`
    pub fn iter(&self) -> impl Iterator<Item = (usize, TileCoord, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| Some((slot, entry.coord, entry.item.as_ref()?)))
    }

    /// Loaded tile coordinates in ascending order
    pub fn coords(&self) -> Vec<TileCoord> {
        let mut coords: Vec<_> = self.lookup.keys().copied().collect();
        coords.sort();
        coords
    }
}
