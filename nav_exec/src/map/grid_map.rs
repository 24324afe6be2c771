//! # Grid Map
//!
//! [`GridMap`] is a single layer occupancy grid. Cell `(0, 0)` has its lower corner at the map
//! origin, `i` increases along world X and `j` along world Y.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::fmt;

use log::{info, warn};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::WorldPoint;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters describing the extent of a [`GridMap`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridMapParams {
    /// The number of cells in each axis of the map, `[width, height]`
    pub num_cells: [usize; 2],

    /// The size of each (square) cell in meters per cell
    pub resolution_m: f64,

    /// World position of the lower corner of cell (0, 0)
    pub origin_m: [f64; 2],
}

/// A set of world points whose axis aligned bounding box is an obstacle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub points_m: Vec<[f64; 2]>,
}

/// Index of a cell in the grid. May lie outside the map, see [`GridMap::contains`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub i: i32,
    pub j: i32,
}

/// Result of rasterising a single footprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RasterReport {
    /// Number of cells which changed from free to occupied
    pub cells_marked: usize,

    /// Number of samples which fell outside the map and were skipped
    pub samples_skipped: usize,
}

/// Samples of a footprint along one axis.
///
/// The samples are `min + k * res` for every `k` placing them below `max`, followed by `max`
/// itself. Only the samples inside the map are visited, the rest are only counted.
struct AxisSamples {
    /// Number of samples, inside the map or not
    total: usize,

    /// Cell indices of the samples inside the map, one per sample
    in_map: Vec<usize>,
}

/// A static occupancy grid.
#[derive(Debug, Clone)]
pub struct GridMap {
    params: GridMapParams,

    origin_m: WorldPoint,

    /// Cell data indexed by `[i, j]`
    data: Array2<Occupancy>,
}

/// Builds a [`GridMap`] by rasterising obstacles into an initially free grid.
///
/// The builder is the only way to mark cells, once [`GridMapBuilder::build`] is called the map is
/// immutable.
#[derive(Debug)]
pub struct GridMapBuilder {
    map: GridMap,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Occupancy {
    Free,
    Occupied,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GridMapError {
    #[error("Cell {0} is outside the map bounds")]
    OutOfBounds(GridCell),

    #[error("Invalid map parameters: {0}")]
    InvalidParams(String),

    #[error("Obstacle footprint has no points")]
    EmptyFootprint,

    #[error("Obstacle footprint has a non-finite point {0:?}")]
    NonFiniteFootprint([f64; 2]),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GridMap {
    /// Start building a new map with all cells free.
    pub fn builder(params: GridMapParams) -> Result<GridMapBuilder, GridMapError> {
        let [width, height] = params.num_cells;

        if width == 0 || height == 0 {
            return Err(GridMapError::InvalidParams(format!(
                "map must have at least one cell in each axis, got {}x{}",
                width, height
            )));
        }
        if width > i32::MAX as usize || height > i32::MAX as usize {
            return Err(GridMapError::InvalidParams(format!(
                "map of {}x{} cells is too large to index",
                width, height
            )));
        }
        if !params.resolution_m.is_finite() || params.resolution_m <= 0.0 {
            return Err(GridMapError::InvalidParams(format!(
                "resolution must be positive, got {}",
                params.resolution_m
            )));
        }
        if !params.origin_m.iter().all(|v| v.is_finite()) {
            return Err(GridMapError::InvalidParams(format!(
                "origin must be finite, got {:?}",
                params.origin_m
            )));
        }

        Ok(GridMapBuilder {
            map: GridMap {
                origin_m: WorldPoint::new(params.origin_m[0], params.origin_m[1]),
                data: Array2::from_elem((width, height), Occupancy::Free),
                params,
            },
        })
    }

    /// Build the map from the given obstacle footprints.
    ///
    /// Samples falling outside the map, empty footprints and footprints with non-finite points are
    /// logged and skipped, none of them invalidates the rest of the map.
    pub fn from_footprints(
        params: GridMapParams,
        footprints: &[Footprint],
    ) -> Result<Self, GridMapError> {
        let mut builder = Self::builder(params)?;

        for (idx, footprint) in footprints.iter().enumerate() {
            if let Err(e) = builder.mark_obstacle(footprint) {
                warn!("Obstacle {} ignored: {}", idx, e);
            }
        }

        let map = builder.build();

        info!(
            "Grid map built: {}x{} cells at {} m, origin ({:.2}, {:.2}), {} occupied",
            map.width(),
            map.height(),
            map.resolution(),
            map.origin().x,
            map.origin().y,
            map.num_occupied()
        );

        Ok(map)
    }

    /// Number of cells along world X
    pub fn width(&self) -> usize {
        self.params.num_cells[0]
    }

    /// Number of cells along world Y
    pub fn height(&self) -> usize {
        self.params.num_cells[1]
    }

    pub fn resolution(&self) -> f64 {
        self.params.resolution_m
    }

    pub fn origin(&self) -> WorldPoint {
        self.origin_m
    }

    /// Convert a world position into the cell containing it.
    ///
    /// Positions are bucketed with `floor`, so a position below the origin maps to a negative
    /// index rather than into the first row or column. The returned cell is not bounds checked.
    pub fn world_to_grid(&self, point: &WorldPoint) -> GridCell {
        let res = self.params.resolution_m;

        GridCell {
            i: axis_index(point.x, self.origin_m.x, res),
            j: axis_index(point.y, self.origin_m.y, res),
        }
    }

    /// World position of the centre of the given cell.
    pub fn grid_to_world(&self, cell: GridCell) -> WorldPoint {
        WorldPoint::new(
            self.origin_m.x + (cell.i as f64 + 0.5) * self.params.resolution_m,
            self.origin_m.y + (cell.j as f64 + 0.5) * self.params.resolution_m,
        )
    }

    pub fn contains(&self, cell: GridCell) -> bool {
        cell.i >= 0
            && cell.j >= 0
            && (cell.i as usize) < self.width()
            && (cell.j as usize) < self.height()
    }

    /// Get the occupancy of a cell, failing if the cell is outside the map.
    pub fn get(&self, cell: GridCell) -> Result<Occupancy, GridMapError> {
        if !self.contains(cell) {
            return Err(GridMapError::OutOfBounds(cell));
        }

        Ok(self.data[[cell.i as usize, cell.j as usize]])
    }

    /// Returns whether the cell is occupied, failing if the cell is outside the map.
    pub fn is_occupied(&self, cell: GridCell) -> Result<bool, GridMapError> {
        Ok(self.get(cell)? == Occupancy::Occupied)
    }

    /// Returns true only if the cell is inside the map and free.
    pub fn is_traversable(&self, cell: GridCell) -> bool {
        matches!(self.get(cell), Ok(Occupancy::Free))
    }

    pub fn num_occupied(&self) -> usize {
        self.data.iter().filter(|&&c| c == Occupancy::Occupied).count()
    }
}

impl GridMapBuilder {
    /// Rasterise a footprint into the map.
    ///
    /// The footprint's bounding box is sampled at the map resolution on both axes, including the
    /// maximum edge, and every cell containing a sample is marked occupied. Samples outside the
    /// map are counted in the report, not visited.
    pub fn mark_obstacle(&mut self, footprint: &Footprint) -> Result<RasterReport, GridMapError> {
        if let Some(p) = footprint
            .points_m
            .iter()
            .find(|p| !p[0].is_finite() || !p[1].is_finite())
        {
            return Err(GridMapError::NonFiniteFootprint(*p));
        }

        let (min, max) = footprint.bounds().ok_or(GridMapError::EmptyFootprint)?;
        let res = self.map.params.resolution_m;
        let origin = self.map.origin_m;

        let xs = AxisSamples::new(min.x, max.x, res, origin.x, self.map.width());
        let ys = AxisSamples::new(min.y, max.y, res, origin.y, self.map.height());

        let mut report = RasterReport {
            cells_marked: 0,
            samples_skipped: xs
                .total
                .saturating_mul(ys.total)
                .saturating_sub(xs.in_map.len() * ys.in_map.len()),
        };

        for &i in xs.in_map.iter() {
            for &j in ys.in_map.iter() {
                let occ = &mut self.map.data[[i, j]];
                if *occ == Occupancy::Free {
                    *occ = Occupancy::Occupied;
                    report.cells_marked += 1;
                }
            }
        }

        if report.samples_skipped > 0 {
            warn!(
                "Obstacle ({:.2}, {:.2})-({:.2}, {:.2}): {} samples outside the map were skipped",
                min.x, min.y, max.x, max.y, report.samples_skipped
            );
        }

        Ok(report)
    }

    pub fn build(self) -> GridMap {
        self.map
    }
}

impl AxisSamples {
    fn new(min: f64, max: f64, res: f64, origin: f64, num_cells: usize) -> Self {
        let sample = |k: usize| min + (k as f64) * res;

        // Number of k with `sample(k) < max`, from an estimate corrected for round-off
        let mut below = ((max - min) / res).ceil().max(0.0) as usize;
        if below > 0 && !(sample(below - 1) < max) {
            below -= 1;
        }
        if below < usize::MAX && sample(below) < max {
            below += 1;
        }

        // Window of k which can land in the map, with a margin of one sample each side
        let map_max = origin + (num_cells as f64) * res;
        let first = ((origin - min) / res).floor() - 1.0;
        let first = if first > 0.0 { first as usize } else { 0 };
        let last = ((((map_max - min) / res).ceil() + 1.0).max(0.0) as usize).min(below);

        let in_map = (first..last.max(first))
            .map(sample)
            .chain(std::iter::once(max))
            .filter_map(|v| {
                let c = axis_index(v, origin, res);
                if c >= 0 && (c as usize) < num_cells {
                    Some(c as usize)
                } else {
                    None
                }
            })
            .collect();

        Self {
            total: below.saturating_add(1),
            in_map,
        }
    }
}

impl Footprint {
    pub fn new(points_m: Vec<[f64; 2]>) -> Self {
        Self { points_m }
    }

    /// Minimum and maximum corners of the footprint's bounding box, or `None` if it is empty.
    pub fn bounds(&self) -> Option<(WorldPoint, WorldPoint)> {
        let first = self.points_m.first()?;

        let mut min = WorldPoint::new(first[0], first[1]);
        let mut max = min;

        for p in &self.points_m[1..] {
            min.x = min.x.min(p[0]);
            min.y = min.y.min(p[1]);
            max.x = max.x.max(p[0]);
            max.y = max.y.max(p[1]);
        }

        Some((min, max))
    }
}

impl GridCell {
    pub fn new(i: i32, j: i32) -> Self {
        Self { i, j }
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.i, self.j)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Cell index along one axis.
fn axis_index(v: f64, origin: f64, res: f64) -> i32 {
    saturating_floor((v - origin) / res)
}

/// `floor` into an `i32`, saturating for positions far outside any sensible map.
fn saturating_floor(v: f64) -> i32 {
    let f = v.floor();

    if f.is_nan() {
        i32::MIN
    } else if f >= i32::MAX as f64 {
        i32::MAX
    } else if f <= i32::MIN as f64 {
        i32::MIN
    } else {
        f as i32
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn default_params() -> GridMapParams {
        GridMapParams {
            num_cells: [66, 64],
            resolution_m: 0.1,
            origin_m: [-3.34, -3.29],
        }
    }

    fn shelf() -> Footprint {
        Footprint::new(vec![[0.37, 1.07], [0.03, 1.06], [0.06, 0.07], [0.36, 0.04]])
    }

    #[test]
    fn test_world_grid_transforms() -> Result<(), GridMapError> {
        let map = GridMap::builder(default_params())?.build();

        assert_eq!(map.world_to_grid(&WorldPoint::new(0.0, 0.0)), GridCell::new(33, 32));
        assert_eq!(map.world_to_grid(&WorldPoint::new(1.0, 1.0)), GridCell::new(43, 42));
        assert_eq!(map.world_to_grid(&WorldPoint::new(-3.34, -3.29)), GridCell::new(0, 0));

        // Cell centres round trip
        let centre = map.grid_to_world(GridCell::new(10, 20));
        assert!((centre.x - (-3.34 + 1.05)).abs() < 1e-9);
        assert!((centre.y - (-3.29 + 2.05)).abs() < 1e-9);
        assert_eq!(map.world_to_grid(&centre), GridCell::new(10, 20));

        // Just below the origin is outside the map, not folded into cell 0
        let below = map.world_to_grid(&WorldPoint::new(-3.35, -3.30));
        assert_eq!(below, GridCell::new(-1, -1));
        assert!(!map.contains(below));

        Ok(())
    }

    #[test]
    fn test_bounds_checked_queries() -> Result<(), GridMapError> {
        let map = GridMap::builder(default_params())?.build();

        assert_eq!(map.is_occupied(GridCell::new(0, 0)), Ok(false));
        assert_eq!(map.is_occupied(GridCell::new(65, 63)), Ok(false));
        assert_eq!(
            map.is_occupied(GridCell::new(66, 0)),
            Err(GridMapError::OutOfBounds(GridCell::new(66, 0)))
        );
        assert_eq!(
            map.is_occupied(GridCell::new(0, -1)),
            Err(GridMapError::OutOfBounds(GridCell::new(0, -1)))
        );
        assert!(!map.is_traversable(GridCell::new(0, 64)));

        Ok(())
    }

    #[test]
    fn test_shelf_rasterisation() -> Result<(), GridMapError> {
        let mut builder = GridMap::builder(default_params())?;
        let report = builder.mark_obstacle(&shelf())?;
        let map = builder.build();

        assert_eq!(report, RasterReport { cells_marked: 55, samples_skipped: 0 });
        assert_eq!(map.num_occupied(), 55);

        for i in 33..=37 {
            for j in 33..=43 {
                assert_eq!(map.is_occupied(GridCell::new(i, j)), Ok(true), "cell ({}, {})", i, j);
            }
        }
        assert_eq!(map.is_occupied(GridCell::new(32, 33)), Ok(false));
        assert_eq!(map.is_occupied(GridCell::new(38, 33)), Ok(false));
        assert_eq!(map.is_occupied(GridCell::new(33, 32)), Ok(false));
        assert_eq!(map.is_occupied(GridCell::new(33, 44)), Ok(false));

        Ok(())
    }

    #[test]
    fn test_partially_outside_footprint() -> Result<(), GridMapError> {
        let mut builder = GridMap::builder(default_params())?;

        // Upper x edge of the map is at 3.26 m
        let report = builder.mark_obstacle(&Footprint::new(vec![[3.0, 0.0], [3.5, 0.2]]))?;

        assert_eq!(report, RasterReport { cells_marked: 9, samples_skipped: 9 });
        assert_eq!(builder.build().num_occupied(), 9);

        Ok(())
    }

    #[test]
    fn test_from_footprints_skips_bad_obstacles() -> Result<(), GridMapError> {
        let map = GridMap::from_footprints(
            default_params(),
            &[Footprint::new(vec![]), shelf(), Footprint::new(vec![[100.0, 100.0]])],
        )?;

        assert_eq!(map.num_occupied(), 55);
        assert_eq!(
            GridMap::builder(default_params())?.mark_obstacle(&Footprint::new(vec![])),
            Err(GridMapError::EmptyFootprint)
        );

        Ok(())
    }

    #[test]
    fn test_non_finite_footprint() -> Result<(), GridMapError> {
        let mut builder = GridMap::builder(default_params())?;

        assert_eq!(
            builder.mark_obstacle(&Footprint::new(vec![[0.0, 0.0], [f64::INFINITY, 0.1]])),
            Err(GridMapError::NonFiniteFootprint([f64::INFINITY, 0.1]))
        );
        assert!(matches!(
            builder.mark_obstacle(&Footprint::new(vec![[f64::NAN, 0.0], [1.0, 1.0]])),
            Err(GridMapError::NonFiniteFootprint(_))
        ));

        let map = GridMap::from_footprints(
            default_params(),
            &[
                Footprint::new(vec![[0.0, 0.0], [f64::INFINITY, 0.1]]),
                Footprint::new(vec![[f64::NEG_INFINITY, 0.0], [0.0, 0.0]]),
                shelf(),
            ],
        )?;
        assert_eq!(map.num_occupied(), 55);

        Ok(())
    }

    #[test]
    fn test_huge_footprint_covers_map() -> Result<(), GridMapError> {
        let mut builder = GridMap::builder(default_params())?;
        let report = builder.mark_obstacle(&Footprint::new(vec![[-1.0e9, -1.0e9], [1.0e9, 1.0e9]]))?;

        assert_eq!(report.cells_marked, 66 * 64);
        assert!(report.samples_skipped > 1_000_000);
        assert_eq!(builder.build().num_occupied(), 66 * 64);

        Ok(())
    }

    #[test]
    fn test_invalid_params() {
        let mut params = default_params();
        params.num_cells = [0, 64];
        assert!(matches!(GridMap::builder(params), Err(GridMapError::InvalidParams(_))));

        let mut params = default_params();
        params.resolution_m = 0.0;
        assert!(matches!(GridMap::builder(params), Err(GridMapError::InvalidParams(_))));

        let mut params = default_params();
        params.origin_m = [f64::NAN, 0.0];
        assert!(matches!(GridMap::builder(params), Err(GridMapError::InvalidParams(_))));
    }
}
