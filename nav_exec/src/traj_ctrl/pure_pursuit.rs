//! # Pure pursuit tracker

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

// Internal
use super::PurePursuitParams;
use crate::{loc::PoseEstimate, path::Path};
use util::maths::clamp_symmetric;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Pure pursuit path tracker.
#[derive(Debug, Clone)]
pub struct PurePursuit {
    params: PurePursuitParams,
}

/// A velocity demand for the robot's base.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityCmd {
    /// Forward speed demand
    pub linear_ms: f64,

    /// Yaw rate demand, positive anticlockwise
    pub angular_rads: f64,
}

/// Output of a single tracker step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerOutput {
    pub cmd: VelocityCmd,

    /// Progress index to use for the next step
    pub progress: usize,

    /// True once the robot is within tolerance of the final waypoint. The command is zero.
    pub goal_reached: bool,

    /// Index of the pursuit target, `None` if no target was selected
    pub target_index: Option<usize>,

    pub lookahead_m: f64,

    pub heading_error_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PurePursuit {
    pub fn new(params: PurePursuitParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PurePursuitParams {
        &self.params
    }

    /// Get the lookahead distance for the given forward speed.
    pub fn lookahead(&self, forward_speed_ms: f64) -> f64 {
        let la = self.params.base_lookahead_m + self.params.velocity_gain_s * forward_speed_ms;

        la.max(self.params.min_lookahead_m)
            .min(self.params.max_lookahead_m)
    }

    /// Compute the velocity command for the current pose.
    ///
    /// `progress` is the index returned by the previous step on this path, or zero for a new
    /// path. The returned progress is never lower than the given one (after limiting it to the
    /// final waypoint index).
    pub fn step(&self, pose: &PoseEstimate, path: &Path, progress: usize) -> TrackerOutput {
        let points = path.points_m();

        let last = match path.last() {
            Some(p) => *p,
            None => {
                return TrackerOutput {
                    cmd: VelocityCmd::zero(),
                    progress: 0,
                    goal_reached: true,
                    target_index: None,
                    lookahead_m: 0.0,
                    heading_error_rad: 0.0,
                }
            }
        };
        let final_index = points.len() - 1;
        let progress = progress.min(final_index);

        if !pose.is_finite() {
            warn!("Non-finite pose {:?}, commanding stop", pose);
            return TrackerOutput {
                cmd: VelocityCmd::zero(),
                progress,
                goal_reached: false,
                target_index: None,
                lookahead_m: 0.0,
                heading_error_rad: 0.0,
            };
        }

        let position = pose.position_m();
        let lookahead_m = self.lookahead(pose.forward_speed_ms);

        // First waypoint at or beyond the lookahead, otherwise the end of the path
        let target_index = (progress..points.len())
            .find(|&k| (points[k] - position).norm() >= lookahead_m)
            .unwrap_or(final_index);

        // Target in the robot frame
        let offset: Vector2<f64> = points[target_index] - position;
        let local = Rotation2::new(-pose.yaw_rad) * offset;
        let heading_error_rad = local.y.atan2(local.x);

        if (last - position).norm() < self.params.goal_tolerance_m {
            return TrackerOutput {
                cmd: VelocityCmd::zero(),
                progress,
                goal_reached: true,
                target_index: Some(target_index),
                lookahead_m,
                heading_error_rad,
            };
        }

        let cmd = VelocityCmd {
            linear_ms: self.params.max_linear_speed_ms.max(0.0),
            angular_rads: clamp_symmetric(
                self.params.heading_gain * heading_error_rad,
                self.params.max_angular_speed_rads,
            ),
        };

        let mut next_progress = progress;
        if progress < final_index
            && (points[progress] - position).norm() < self.params.path_tolerance_m
        {
            next_progress += 1;
            debug!("Waypoint {} reached, progress now {}", progress, next_progress);
        }

        TrackerOutput {
            cmd,
            progress: next_progress,
            goal_reached: false,
            target_index: Some(target_index),
            lookahead_m,
            heading_error_rad,
        }
    }
}

impl VelocityCmd {
    pub fn new(linear_ms: f64, angular_rads: f64) -> Self {
        Self {
            linear_ms,
            angular_rads,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.linear_ms == 0.0 && self.angular_rads == 0.0
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    fn tracker() -> PurePursuit {
        PurePursuit::new(PurePursuitParams::default())
    }

    fn smoothed_path() -> Path {
        Path::from_xy(&[(0.01, -0.04), (0.51, -0.04), (1.01, 0.96)])
    }

    #[test]
    fn test_lookahead() {
        let t = tracker();

        assert!((t.lookahead(0.5) - 1.15).abs() < 1e-12);
        assert!((t.lookahead(0.0) - 1.0).abs() < 1e-12);
        assert_eq!(t.lookahead(100.0), 3.0);
        assert_eq!(t.lookahead(-10.0), 0.5);
    }

    #[test]
    fn test_first_step() {
        let out = tracker().step(&PoseEstimate::new(0.0, 0.0, 0.0, 0.5), &smoothed_path(), 0);

        assert!(!out.goal_reached);
        assert_eq!(out.target_index, Some(2));
        assert_eq!(out.cmd, VelocityCmd::new(1.0, 1.5));
        assert_eq!(out.progress, 1);
        assert!((out.heading_error_rad - 0.96f64.atan2(1.01)).abs() < 1e-9);
    }

    #[test]
    fn test_heading_in_robot_frame() {
        let path = Path::from_xy(&[(0.0, 0.0), (0.0, 5.0)]);

        // Facing along the path
        let out = tracker().step(
            &PoseEstimate::new(0.0, 0.0, std::f64::consts::FRAC_PI_2, 0.0),
            &path,
            0,
        );
        assert!(out.heading_error_rad.abs() < 1e-9);
        assert!(out.cmd.angular_rads.abs() < 1e-9);

        // Facing away, target on the left
        let out = tracker().step(&PoseEstimate::new(0.0, 0.0, 0.0, 0.0), &path, 0);
        assert!((out.heading_error_rad - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        assert_eq!(out.cmd.angular_rads, 1.5);

        // Target on the right
        let out = tracker().step(&PoseEstimate::new(0.0, 0.0, std::f64::consts::PI, 0.0), &path, 0);
        assert_eq!(out.cmd.angular_rads, -1.5);
    }

    #[test]
    fn test_goal_reached() {
        let out = tracker().step(&PoseEstimate::new(0.9, 0.8, 0.0, 1.0), &smoothed_path(), 1);

        assert!(out.goal_reached);
        assert!(out.cmd.is_zero());
        assert_eq!(out.progress, 1);
    }

    #[test]
    fn test_empty_path_and_bad_pose() {
        let out = tracker().step(&PoseEstimate::default(), &Path::default(), 3);
        assert!(out.goal_reached);
        assert!(out.cmd.is_zero());

        let out = tracker().step(&PoseEstimate::new(f64::NAN, 0.0, 0.0, 0.0), &smoothed_path(), 1);
        assert!(!out.goal_reached);
        assert!(out.cmd.is_zero());
        assert_eq!(out.progress, 1);
    }

    #[test]
    fn test_progress_capped() {
        let out = tracker().step(&PoseEstimate::new(5.0, 5.0, 0.0, 0.0), &smoothed_path(), 10);
        assert_eq!(out.progress, 2);
        assert_eq!(out.target_index, Some(2));
    }

    fn any_path() -> impl Strategy<Value = Path> {
        prop::collection::vec((-5.0..5.0f64, -5.0..5.0f64), 0..12)
            .prop_map(|pts| Path::from_xy(&pts))
    }

    fn any_coord() -> impl Strategy<Value = f64> {
        prop_oneof![
            8 => -10.0..10.0f64,
            1 => Just(f64::NAN),
            1 => Just(f64::INFINITY),
        ]
    }

    proptest! {
        #[test]
        fn prop_command_within_limits(
            path in any_path(),
            x in any_coord(),
            y in any_coord(),
            yaw in any_coord(),
            speed in any_coord(),
            progress in 0usize..20,
        ) {
            let t = tracker();
            let out = t.step(&PoseEstimate::new(x, y, yaw, speed), &path, progress);

            prop_assert!(out.cmd.linear_ms >= 0.0);
            prop_assert!(out.cmd.linear_ms <= t.params().max_linear_speed_ms);
            prop_assert!(out.cmd.angular_rads.abs() <= t.params().max_angular_speed_rads);
            prop_assert!(out.progress <= path.get_num_points().saturating_sub(1));
        }

        #[test]
        fn prop_progress_non_decreasing(
            path in any_path(),
            poses in prop::collection::vec((-5.0..5.0f64, -5.0..5.0f64, -4.0..4.0f64, 0.0..1.0f64), 1..50),
        ) {
            let t = tracker();
            let mut progress = 0;

            for (x, y, yaw, v) in poses {
                let out = t.step(&PoseEstimate::new(x, y, yaw, v), &path, progress);
                prop_assert!(out.progress >= progress.min(path.get_num_points().saturating_sub(1)));
                prop_assert!(out.progress <= progress + 1);
                progress = out.progress;
            }
        }
    }
}
