//! # Kinematic simulator
//!
//! A unicycle model of the robot's base, integrating velocity commands into poses. Used as the
//! pose source when no real localisation is available.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;

use crate::{loc::PoseEstimate, traj_ctrl::VelocityCmd};
use util::maths::wrap_pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct KinematicSim {
    pose: PoseEstimate,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl KinematicSim {
    pub fn new(initial_pose: PoseEstimate) -> Self {
        Self { pose: initial_pose }
    }

    pub fn pose(&self) -> PoseEstimate {
        self.pose
    }

    /// Apply the command for `dt_s` seconds and return the new pose.
    ///
    /// Position is integrated with the heading at the start of the step. The reported forward
    /// speed is the commanded linear speed.
    pub fn step(&mut self, cmd: &VelocityCmd, dt_s: f64) -> PoseEstimate {
        let yaw = self.pose.yaw_rad;

        self.pose = PoseEstimate {
            x_m: self.pose.x_m + cmd.linear_ms * yaw.cos() * dt_s,
            y_m: self.pose.y_m + cmd.linear_ms * yaw.sin() * dt_s,
            yaw_rad: wrap_pi(yaw + cmd.angular_rads * dt_s),
            forward_speed_ms: cmd.linear_ms,
        };

        trace!("Sim pose: {:?}", self.pose);

        self.pose
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
