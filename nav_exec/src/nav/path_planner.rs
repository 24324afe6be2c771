//! Plans minimum cost paths through a [`GridMap`], using an A* algorithm.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
    fmt,
};

use log::{debug, info, trace};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::{
    map::{GridCell, GridMap, WorldPoint},
    path::Path,
};

use super::PathSmoother;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Log target of the planner, which traces every pushed cell.
pub const LOG_TARGET: &str = module_path!();

/// Neighbour offsets, cardinal moves first.
const MOVES: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PathPlanner {
    params: PathPlannerParams,

    smoother: PathSmoother,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathPlannerParams {
    /// If true all 8 moves are always available. If false a diagonal move is only allowed when
    /// both orthogonal neighbours it passes are free.
    pub allow_corner_cutting: bool,
}

/// Result of a successful A* search over cells.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSearch {
    /// Cells from start to goal, inclusive.
    pub cells: Vec<GridCell>,

    /// Total cost of the cell path, in cell units.
    pub cost: f64,

    /// Number of cells expanded during the search.
    pub num_expansions: usize,
}

/// A planned path, both as found by the search and after smoothing.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPath {
    pub cells: Vec<GridCell>,

    /// Cell centres of the searched path
    pub raw_path: Path,

    /// The smoothed path, which should be tracked
    pub path: Path,

    pub raw_cost: f64,

    pub num_expansions: usize,
}

/// An entry in the open set.
///
/// The ordering is reversed so that the [`BinaryHeap`] pops the lowest `f` first, with ties broken
/// by insertion order.
#[derive(Debug, Clone, Copy)]
struct OpenEntry {
    f: OrderedFloat<f64>,
    seq: usize,
    g: f64,
    cell: GridCell,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endpoint {
    Start,
    Goal,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum PlanningError {
    #[error("The {endpoint} cell {cell} is outside the map")]
    OutOfBounds { endpoint: Endpoint, cell: GridCell },

    #[error("The {endpoint} cell {cell} is occupied")]
    Occupied { endpoint: Endpoint, cell: GridCell },

    #[error("No path to the goal was found after {expansions} expansions")]
    NoPathFound { expansions: usize },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PathPlanner {
    pub fn new(params: PathPlannerParams, smoother: PathSmoother) -> Self {
        Self { params, smoother }
    }

    /// Plan a smoothed path between two world points.
    pub fn plan(
        &self,
        map: &GridMap,
        start: &WorldPoint,
        goal: &WorldPoint,
    ) -> Result<PlannedPath, PlanningError> {
        let start_cell = map.world_to_grid(start);
        let goal_cell = map.world_to_grid(goal);

        info!(
            "Planning from ({:.2}, {:.2}) {} to ({:.2}, {:.2}) {}",
            start.x, start.y, start_cell, goal.x, goal.y, goal_cell
        );

        let search = self.search(map, start_cell, goal_cell)?;

        let raw_path: Path = search
            .cells
            .iter()
            .map(|&c| map.grid_to_world(c))
            .collect::<Vec<_>>()
            .into();

        let path = self.smoother.smooth(map, &raw_path);

        info!(
            "Path found: {} cells, cost {:.3}, {} expansions, {} waypoints after smoothing",
            search.cells.len(),
            search.cost,
            search.num_expansions,
            path.get_num_points()
        );

        Ok(PlannedPath {
            cells: search.cells,
            raw_path,
            path,
            raw_cost: search.cost,
            num_expansions: search.num_expansions,
        })
    }

    /// Run A* between two cells.
    ///
    /// Both endpoints are validated before any expansion happens.
    pub fn search(
        &self,
        map: &GridMap,
        start: GridCell,
        goal: GridCell,
    ) -> Result<CellSearch, PlanningError> {
        check_endpoint(map, start, Endpoint::Start)?;
        check_endpoint(map, goal, Endpoint::Goal)?;

        let mut open = BinaryHeap::new();
        let mut best_g: HashMap<GridCell, f64> = HashMap::new();
        let mut parents: HashMap<GridCell, GridCell> = HashMap::new();

        let mut seq = 0;
        let mut num_expansions = 0;

        best_g.insert(start, 0.0);
        open.push(OpenEntry {
            f: OrderedFloat(heuristic(start, goal)),
            seq,
            g: 0.0,
            cell: start,
        });

        while let Some(entry) = open.pop() {
            // Drop stale duplicates
            match best_g.get(&entry.cell) {
                Some(&g) if entry.g > g => continue,
                _ => (),
            }

            num_expansions += 1;

            if entry.cell == goal {
                let cells = reconstruct(&parents, goal);
                debug!(
                    "A* reached goal after {} expansions, {} cells",
                    num_expansions,
                    cells.len()
                );
                return Ok(CellSearch {
                    cells,
                    cost: entry.g,
                    num_expansions,
                });
            }

            for &(di, dj) in MOVES.iter() {
                let next = GridCell::new(entry.cell.i + di, entry.cell.j + dj);

                if !self.can_move(map, entry.cell, di, dj) {
                    continue;
                }

                let step = if di != 0 && dj != 0 {
                    std::f64::consts::SQRT_2
                } else {
                    1.0
                };
                let g = entry.g + step;

                if g < best_g.get(&next).copied().unwrap_or(f64::INFINITY) {
                    best_g.insert(next, g);
                    parents.insert(next, entry.cell);
                    seq += 1;
                    open.push(OpenEntry {
                        f: OrderedFloat(g + heuristic(next, goal)),
                        seq,
                        g,
                        cell: next,
                    });
                    trace!("Pushed {} with g = {:.3}", next, g);
                }
            }
        }

        Err(PlanningError::NoPathFound {
            expansions: num_expansions,
        })
    }

    /// Whether the move from `from` by `(di, dj)` is allowed.
    fn can_move(&self, map: &GridMap, from: GridCell, di: i32, dj: i32) -> bool {
        if !map.is_traversable(GridCell::new(from.i + di, from.j + dj)) {
            return false;
        }

        if di != 0 && dj != 0 && !self.params.allow_corner_cutting {
            return map.is_traversable(GridCell::new(from.i + di, from.j))
                && map.is_traversable(GridCell::new(from.i, from.j + dj));
        }

        true
    }
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.seq == other.seq
    }
}

impl Eq for OpenEntry {}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the binary heap is a min-heap
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Start => write!(f, "start"),
            Endpoint::Goal => write!(f, "goal"),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn check_endpoint(map: &GridMap, cell: GridCell, endpoint: Endpoint) -> Result<(), PlanningError> {
    match map.is_occupied(cell) {
        Err(_) => Err(PlanningError::OutOfBounds { endpoint, cell }),
        Ok(true) => Err(PlanningError::Occupied { endpoint, cell }),
        Ok(false) => Ok(()),
    }
}

/// Euclidean distance in cells.
fn heuristic(a: GridCell, b: GridCell) -> f64 {
    ((a.i - b.i) as f64).hypot((a.j - b.j) as f64)
}

fn reconstruct(parents: &HashMap<GridCell, GridCell>, goal: GridCell) -> Vec<GridCell> {
    let mut cells = vec![goal];
    let mut current = goal;

    while let Some(&parent) = parents.get(&current) {
        cells.push(parent);
        current = parent;
    }

    cells.reverse();
    cells
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::map::{Footprint, GridMapParams};
    use crate::nav::PathSmootherParams;

    fn planner(allow_corner_cutting: bool) -> PathPlanner {
        PathPlanner::new(
            PathPlannerParams {
                allow_corner_cutting,
            },
            PathSmoother::new(PathSmootherParams {
                sample_spacing_fraction: 0.5,
            })
            .unwrap(),
        )
    }

    fn default_map() -> GridMap {
        GridMap::from_footprints(
            GridMapParams {
                num_cells: [66, 64],
                resolution_m: 0.1,
                origin_m: [-3.34, -3.29],
            },
            &[Footprint::new(vec![
                [0.37, 1.07],
                [0.03, 1.06],
                [0.06, 0.07],
                [0.36, 0.04],
            ])],
        )
        .unwrap()
    }

    /// A small map with a wall and a few scattered obstacles, unit resolution.
    fn test_map() -> GridMap {
        let params = GridMapParams {
            num_cells: [12, 10],
            resolution_m: 1.0,
            origin_m: [0.0, 0.0],
        };
        let mut builder = GridMap::builder(params).unwrap();
        let obstacles = [
            // Wall with a gap at the top
            ([4.5, 0.5], [4.5, 7.5]),
            ([7.5, 2.5], [9.5, 2.5]),
            ([8.5, 5.5], [8.5, 9.5]),
            ([1.5, 8.5], [2.5, 8.5]),
            ([6.5, 6.5], [6.5, 6.5]),
        ];
        for (a, b) in obstacles.iter() {
            builder
                .mark_obstacle(&Footprint::new(vec![*a, *b]))
                .unwrap();
        }
        builder.build()
    }

    /// Independent Dijkstra over the same move rules, returning the cost to every reachable cell.
    fn dijkstra(map: &GridMap, start: GridCell, allow_corner_cutting: bool) -> HashMap<GridCell, f64> {
        let mut dist: HashMap<GridCell, f64> = HashMap::new();
        let mut done: Vec<GridCell> = Vec::new();
        dist.insert(start, 0.0);

        loop {
            let next = dist
                .iter()
                .filter(|(c, _)| !done.contains(*c))
                .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                .map(|(c, d)| (*c, *d));

            let (cell, d) = match next {
                Some(n) => n,
                None => break,
            };
            done.push(cell);

            for &(di, dj) in MOVES.iter() {
                let n = GridCell::new(cell.i + di, cell.j + dj);
                if !map.is_traversable(n) {
                    continue;
                }
                if di != 0
                    && dj != 0
                    && !allow_corner_cutting
                    && (!map.is_traversable(GridCell::new(cell.i + di, cell.j))
                        || !map.is_traversable(GridCell::new(cell.i, cell.j + dj)))
                {
                    continue;
                }
                let step = if di != 0 && dj != 0 { 2f64.sqrt() } else { 1.0 };
                let e = dist.entry(n).or_insert(f64::INFINITY);
                if d + step < *e {
                    *e = d + step;
                }
            }
        }

        dist
    }

    fn path_cost(cells: &[GridCell]) -> f64 {
        cells
            .windows(2)
            .map(|w| {
                let di = (w[1].i - w[0].i).abs();
                let dj = (w[1].j - w[0].j).abs();
                assert!(di <= 1 && dj <= 1 && di + dj > 0, "non adjacent cells {:?}", w);
                if di + dj == 2 {
                    2f64.sqrt()
                } else {
                    1.0
                }
            })
            .sum()
    }

    #[test]
    fn test_optimal_against_dijkstra() {
        let map = test_map();

        for &corner_cutting in [false, true].iter() {
            let planner = planner(corner_cutting);
            let start = GridCell::new(0, 0);
            let costs = dijkstra(&map, start, corner_cutting);

            for i in 0..12 {
                for j in 0..10 {
                    let goal = GridCell::new(i, j);
                    if !map.is_traversable(goal) {
                        continue;
                    }

                    let search = planner.search(&map, start, goal).unwrap();
                    let expected = costs[&goal];

                    assert!(
                        (search.cost - expected).abs() < 1e-9,
                        "goal {}: A* {} vs Dijkstra {}",
                        goal,
                        search.cost,
                        expected
                    );
                    assert!((path_cost(&search.cells) - search.cost).abs() < 1e-9);
                    assert_eq!(search.cells.first(), Some(&start));
                    assert_eq!(search.cells.last(), Some(&goal));
                    assert!(search.cells.iter().all(|&c| map.is_traversable(c)));
                }
            }
        }
    }

    #[test]
    fn test_unreachable_goal() {
        let params = GridMapParams {
            num_cells: [5, 5],
            resolution_m: 1.0,
            origin_m: [0.0, 0.0],
        };
        let mut builder = GridMap::builder(params).unwrap();
        builder
            .mark_obstacle(&Footprint::new(vec![[2.5, 0.5], [2.5, 4.5]]))
            .unwrap();
        let map = builder.build();

        let result = planner(true).search(&map, GridCell::new(0, 0), GridCell::new(4, 4));
        assert!(matches!(result, Err(PlanningError::NoPathFound { expansions }) if expansions == 10));
    }

    #[test]
    fn test_precondition_errors() {
        let map = default_map();
        let planner = planner(true);
        let free = GridCell::new(10, 10);
        let occupied = GridCell::new(35, 40);
        let outside = GridCell::new(-1, 5);

        assert_eq!(
            planner.search(&map, outside, free),
            Err(PlanningError::OutOfBounds {
                endpoint: Endpoint::Start,
                cell: outside
            })
        );
        assert_eq!(
            planner.search(&map, free, GridCell::new(66, 0)),
            Err(PlanningError::OutOfBounds {
                endpoint: Endpoint::Goal,
                cell: GridCell::new(66, 0)
            })
        );
        assert_eq!(
            planner.search(&map, occupied, free),
            Err(PlanningError::Occupied {
                endpoint: Endpoint::Start,
                cell: occupied
            })
        );
        assert_eq!(
            planner.plan(&map, &WorldPoint::new(0.0, 0.0), &WorldPoint::new(0.2, 0.5)),
            Err(PlanningError::Occupied {
                endpoint: Endpoint::Goal,
                cell: GridCell::new(35, 37)
            })
        );
    }

    #[test]
    fn test_default_scenario() {
        let map = default_map();
        let planned = planner(true)
            .plan(&map, &WorldPoint::new(0.0, 0.0), &WorldPoint::new(1.0, 1.0))
            .unwrap();

        assert_eq!(planned.cells.first(), Some(&GridCell::new(33, 32)));
        assert_eq!(planned.cells.last(), Some(&GridCell::new(43, 42)));
        assert_eq!(planned.cells.len(), 15);
        assert!((planned.raw_cost - (8.0 + 6.0 * 2f64.sqrt())).abs() < 1e-9);
        assert!(planned.cells.iter().all(|&c| map.is_traversable(c)));

        // Every raw step stays visible, including diagonals past the shelf's corners
        let smoother = PathSmoother::new(PathSmootherParams::default()).unwrap();
        for w in planned.raw_path.points_m().windows(2) {
            assert!(smoother.is_segment_clear(&map, &w[0], &w[1]));
        }

        assert_eq!(planned.path.get_num_points(), 4);
        for w in planned.path.points_m().windows(2) {
            assert!(smoother.is_segment_clear(&map, &w[0], &w[1]));
        }
        assert_eq!(planned.path.first(), planned.raw_path.first());
        assert_eq!(planned.path.last(), planned.raw_path.last());
    }

    #[test]
    fn test_diagonal_past_corner() {
        let map = default_map();
        let (start, goal) = (GridCell::new(32, 33), GridCell::new(33, 32));
        assert_eq!(map.is_occupied(GridCell::new(33, 33)), Ok(true));

        let search = planner(true).search(&map, start, goal).unwrap();
        assert!((search.cost - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(search.cells, vec![start, goal]);

        // Restricted moves go round the free orthogonal neighbour instead
        let search = planner(false).search(&map, start, goal).unwrap();
        assert!((search.cost - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_log_target() {
        assert_eq!(LOG_TARGET, "nav_lib::nav::path_planner");
        assert!(module_path!().starts_with(LOG_TARGET));
    }

    #[test]
    fn test_start_is_goal() {
        let map = default_map();
        let search = planner(false)
            .search(&map, GridCell::new(5, 5), GridCell::new(5, 5))
            .unwrap();

        assert_eq!(search.cells, vec![GridCell::new(5, 5)]);
        assert_eq!(search.cost, 0.0);
        assert_eq!(search.num_expansions, 1);
    }
}
