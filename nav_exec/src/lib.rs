//! # Navigation library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to access the
//! navigation core defined inside the nav crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Localisation module - the pose estimate provided by the external pose source
pub mod loc;

/// Map module - static occupancy grid built from the obstacle list
pub mod map;

/// Navigation module - A* path planning and path smoothing
pub mod nav;

/// Navigation controller - state machine tying planning and tracking together
pub mod nav_ctrl;

/// Parameters for the nav executable
pub mod params;

/// Path module - ordered sequence of world points
pub mod path;

/// Kinematic simulator - integrates velocity commands into poses
pub mod sim;

/// Trajectory control module - keeps the robot on the given path
pub mod traj_ctrl;
