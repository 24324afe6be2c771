//! Parameters for the nav executable

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::{loc::PoseEstimate, map::WorldPoint};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavExecParams {
    /// Period of the control tick
    pub tick_period_s: f64,

    /// Period at which the simulator publishes poses
    pub pose_period_s: f64,

    /// The exec stops after this long even if goals remain.
    pub timeout_s: f64,

    /// Starting pose of the simulated robot as `[x, y, yaw, forward_speed]`
    pub initial_pose: [f64; 4],

    /// Goals to visit in order
    pub goals: Vec<[f64; 2]>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl NavExecParams {
    pub fn initial_pose(&self) -> PoseEstimate {
        let [x, y, yaw, speed] = self.initial_pose;
        PoseEstimate::new(x, y, yaw, speed)
    }

    pub fn goals(&self) -> Vec<WorldPoint> {
        self.goals
            .iter()
            .map(|g| WorldPoint::new(g[0], g[1]))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
