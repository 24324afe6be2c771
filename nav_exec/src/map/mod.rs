//! # Map
//!
//! This module implements the static [`GridMap`] occupancy grid used for planning. The map is
//! rasterised once at startup from a list of obstacle [`Footprint`]s and is read only afterwards.

// ------------------------------------------------------------------------------------------------
// MODS
// ------------------------------------------------------------------------------------------------

/// Occupancy grid and world/grid transforms
mod grid_map;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use grid_map::{
    Footprint, GridCell, GridMap, GridMapBuilder, GridMapError, GridMapParams, Occupancy,
    RasterReport,
};

/// A point in the world (map) frame, in meters.
pub type WorldPoint = nalgebra::Point2<f64>;
