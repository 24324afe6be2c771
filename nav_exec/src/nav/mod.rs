//! # Navigation
//!
//! This module provides global path planning over a static [`GridMap`](crate::map::GridMap).
//!
//! - [`PathPlanner`] - finds a minimum cost 8-connected cell path between two world points using
//!   A*, then simplifies it with the [`PathSmoother`].
//! - [`PathSmoother`] - removes redundant waypoints by "string pulling", keeping only the points
//!   needed for every segment to stay collision free.

// ------------------------------------------------------------------------------------------------
// MODS
// ------------------------------------------------------------------------------------------------

mod path_planner;
mod path_smoother;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use path_planner::{
    CellSearch, Endpoint, PathPlanner, PathPlannerParams, PlannedPath, PlanningError,
    LOG_TARGET as PLANNER_LOG_TARGET,
};
pub use path_smoother::{PathSmoother, PathSmootherError, PathSmootherParams};
