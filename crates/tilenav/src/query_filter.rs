//! Polygon filtering and traversal costs

use super::{MAX_AREAS, PolyFlags};

/// Decides which polygons a query may visit and what they cost to cross
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct QueryFilter {
    /// Polygons must have at least one of these flags
    pub include_flags: PolyFlags,
    /// Polygons must have none of these flags
    pub exclude_flags: PolyFlags,
    /// Cost multiplier per area id
    #[cfg_attr(feature = "serialization", serde(with = "area_costs"))]
    pub area_cost: [f32; MAX_AREAS],
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            include_flags: PolyFlags::ALL,
            exclude_flags: PolyFlags::empty(),
            area_cost: [1.0; MAX_AREAS],
        }
    }
}

impl QueryFilter {
    /// Checks if a polygon with the given flags passes the filter
    #[inline]
    pub fn pass_filter(&self, flags: PolyFlags) -> bool {
        flags.intersects(self.include_flags) && !flags.intersects(self.exclude_flags)
    }

    /// Cost of travelling `distance` across a polygon of the given area
    #[inline]
    pub fn cost(&self, distance: f32, area: u8) -> f32 {
        distance * self.area_cost[area as usize % MAX_AREAS]
    }

    /// Sets the cost multiplier of an area
    pub fn set_area_cost(&mut self, area: u8, cost: f32) {
        if let Some(slot) = self.area_cost.get_mut(area as usize) {
            *slot = cost;
        }
    }
}

#[cfg(feature = "serialization")]
mod area_costs {
    use super::MAX_AREAS;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(costs: &[f32; MAX_AREAS], s: S) -> Result<S::Ok, S::Error> {
        costs.as_slice().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[f32; MAX_AREAS], D::Error> {
        let values = Vec::<f32>::deserialize(d)?;
        let mut costs = [1.0; MAX_AREAS];
        for (slot, value) in costs.iter_mut().zip(values) {
            *slot = value;
        }
        Ok(costs)
    }
}
