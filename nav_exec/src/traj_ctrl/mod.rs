//! # Trajectory control module
//!
//! Trajectory control is responsible for keeping the robot on the active path. It uses a pure
//! pursuit law: a target point is chosen on the path at a speed dependent lookahead distance
//! ahead of the robot, and the robot is steered towards it in proportion to the heading error.
//!
//! The controller itself is stateless. The caller owns the progress index, the index of the
//! waypoint the robot is currently heading past, and feeds back the index returned by each
//! step. The index only ever increases while a path is active.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;
pub mod pure_pursuit;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::PurePursuitParams;
pub use pure_pursuit::*;
