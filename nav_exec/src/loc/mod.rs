//! # Localisation module
//!
//! Localisation itself is provided by an external pose source. This module only defines the pose
//! estimate it produces.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::map::WorldPoint;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The latest estimate of the robot's planar pose in the world frame.
///
/// Each new estimate replaces the previous one entirely, no history is kept.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseEstimate {
    /// Position along world X
    pub x_m: f64,

    /// Position along world Y
    pub y_m: f64,

    /// Heading, the angle to the positive world X axis, in radians.
    pub yaw_rad: f64,

    /// Speed along the robot's forward axis
    pub forward_speed_ms: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PoseEstimate {
    pub fn new(x_m: f64, y_m: f64, yaw_rad: f64, forward_speed_ms: f64) -> Self {
        Self {
            x_m,
            y_m,
            yaw_rad,
            forward_speed_ms,
        }
    }

    pub fn position_m(&self) -> WorldPoint {
        WorldPoint::new(self.x_m, self.y_m)
    }

    /// Returns true if every field is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x_m.is_finite()
            && self.y_m.is_finite()
            && self.yaw_rad.is_finite()
            && self.forward_speed_ms.is_finite()
    }
}
