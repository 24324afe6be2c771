//! Trajectory control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the pure pursuit tracker
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PurePursuitParams {
    /// Lookahead distance at zero speed
    pub base_lookahead_m: f64,

    /// Increase in lookahead per unit of forward speed, in seconds.
    pub velocity_gain_s: f64,

    /// Minimum limit on the lookahead distance
    pub min_lookahead_m: f64,

    /// Maximum limit on the lookahead distance
    pub max_lookahead_m: f64,

    /// Distance to the final waypoint under which the goal is reached.
    pub goal_tolerance_m: f64,

    /// Distance to the current waypoint under which the progress index advances.
    pub path_tolerance_m: f64,

    /// Linear speed demanded while tracking, also its limit.
    pub max_linear_speed_ms: f64,

    /// Angular speed demand limit
    pub max_angular_speed_rads: f64,

    /// Proportional gain from heading error to angular speed demand
    pub heading_gain: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PurePursuitParams {
    fn default() -> Self {
        Self {
            base_lookahead_m: 1.0,
            velocity_gain_s: 0.3,
            min_lookahead_m: 0.5,
            max_lookahead_m: 3.0,
            goal_tolerance_m: 0.3,
            path_tolerance_m: 0.2,
            max_linear_speed_ms: 1.0,
            max_angular_speed_rads: 1.5,
            heading_gain: 2.0,
        }
    }
}
