//! # Navigation controller
//!
//! This module implements the [`NavCtrl`] state machine, which ties together the map, planner and
//! tracker. It has three states:
//!
//! - `Idle` - No path is active and a zero command is output every tick.
//! - `Tracking` - A path is active and the pure pursuit tracker is run every tick.
//! - `Failed` - Planning for a goal failed. This state is only entered for as long as it takes to
//!   log the failure before returning to `Idle`.
//!
//! `NavCtrl` takes exclusive access (`&mut self`) in every handler. Pose, goal and tick events
//! from separate sources must therefore be serialised by the caller, see [`exec`] for an event
//! loop which does this.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod exec;
mod params;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::fmt::{self, Display};

use log::{debug, error, info, trace, warn};
use serde::Serialize;

use crate::{
    loc::PoseEstimate,
    map::{GridCell, GridMap, GridMapError, WorldPoint},
    nav::{PathPlanner, PathSmoother, PathSmootherError, PlannedPath, PlanningError},
    path::Path,
    traj_ctrl::{PurePursuit, VelocityCmd},
};

pub use params::NavCtrlParams;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Session relative path plan reports are archived to
const PLAN_REPORT_PATH: &str = "nav_ctrl/plan.json";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Navigation controller
pub struct NavCtrl {
    map: GridMap,

    planner: PathPlanner,

    tracker: PurePursuit,

    retry_pending_goal: bool,

    state: NavState,

    /// The latest pose, `None` until the first pose event.
    pose: Option<PoseEstimate>,

    /// Path currently being tracked, only `Some` while `Tracking`.
    active: Option<ActivePath>,

    /// Goal waiting for the first pose
    pending_goal: Option<WorldPoint>,
}

/// Output of a single control tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavStep {
    pub cmd: VelocityCmd,

    /// True on the tick the goal of the active path is reached.
    pub goal_reached: bool,

    /// Progress index along the active path, `None` when not tracking.
    pub progress: Option<usize>,
}

/// Archived summary of a successful plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub goal_m: WorldPoint,
    pub start: PoseEstimate,
    pub cells: Vec<GridCell>,
    pub raw_path: Path,
    pub path: Path,
    pub raw_cost: f64,
    pub num_expansions: usize,
}

#[derive(Debug, Clone)]
struct ActivePath {
    goal_m: WorldPoint,
    path: Path,
    progress: usize,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NavState {
    Idle,
    Tracking,
    Failed,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum NavError {
    #[error("No pose has been received yet, cannot plan a path")]
    MissingPose,

    #[error("Planning failed: {0}")]
    Planning(PlanningError),
}

/// Errors raised while building the controller from its parameters.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum NavCtrlInitError {
    #[error("Invalid map: {0}")]
    Map(#[from] GridMapError),

    #[error("Invalid smoother parameters: {0}")]
    Smoother(#[from] PathSmootherError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NavCtrl {
    /// Build the map from the static obstacles and create the controller in `Idle`.
    pub fn new(params: NavCtrlParams) -> Result<Self, NavCtrlInitError> {
        let map = GridMap::from_footprints(params.map, &params.obstacles)?;
        let smoother = PathSmoother::new(params.smoother)?;

        Ok(Self {
            map,
            planner: PathPlanner::new(params.planner, smoother),
            tracker: PurePursuit::new(params.tracker),
            retry_pending_goal: params.retry_pending_goal,
            state: NavState::Idle,
            pose: None,
            active: None,
            pending_goal: None,
        })
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn map(&self) -> &GridMap {
        &self.map
    }

    pub fn pose(&self) -> Option<&PoseEstimate> {
        self.pose.as_ref()
    }

    /// The active path, if tracking.
    pub fn path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| &a.path)
    }

    pub fn progress(&self) -> Option<usize> {
        self.active.as_ref().map(|a| a.progress)
    }

    pub fn goal(&self) -> Option<WorldPoint> {
        self.active.as_ref().map(|a| a.goal_m)
    }

    pub fn pending_goal(&self) -> Option<WorldPoint> {
        self.pending_goal
    }

    /// Replace the pose estimate.
    ///
    /// The state is not changed, unless a goal was waiting for this pose, in which case the
    /// result of planning it is returned.
    pub fn on_pose(&mut self, pose: PoseEstimate) -> Option<Result<Path, NavError>> {
        self.pose = Some(pose);

        let goal = self.pending_goal.take()?;
        info!(
            "First pose received, planning pending goal ({:.2}, {:.2})",
            goal.x, goal.y
        );

        Some(self.on_goal(goal))
    }

    /// Plan a path to a new goal, replacing any active path.
    ///
    /// On success the new path is returned and the controller is `Tracking` it. On failure the
    /// controller is `Idle` with no path, so a robot that was tracking will be stopped on the
    /// next tick.
    pub fn on_goal(&mut self, goal_m: WorldPoint) -> Result<Path, NavError> {
        info!("New goal: ({:.2}, {:.2})", goal_m.x, goal_m.y);

        let pose = match self.pose {
            Some(p) => p,
            None => {
                if self.retry_pending_goal {
                    warn!("No pose yet, goal will be planned once a pose is received");
                    self.pending_goal = Some(goal_m);
                } else {
                    warn!("No pose yet, goal dropped");
                }
                return Err(NavError::MissingPose);
            }
        };

        if let Some(old) = self.active.take() {
            info!(
                "Discarding active path to ({:.2}, {:.2})",
                old.goal_m.x, old.goal_m.y
            );
        }

        match self.planner.plan(&self.map, &pose.position_m(), &goal_m) {
            Ok(planned) => {
                let path = planned.path.clone();
                self.archive(&goal_m, &pose, planned);

                self.active = Some(ActivePath {
                    goal_m,
                    path: path.clone(),
                    progress: 0,
                });
                self.transition(NavState::Tracking);

                Ok(path)
            }
            Err(e) => {
                self.transition(NavState::Failed);
                error!("Could not plan a path to the goal: {}", e);
                self.transition(NavState::Idle);

                Err(e.into())
            }
        }
    }

    /// Run one control tick.
    ///
    /// Outside of `Tracking` this always outputs a zero command.
    pub fn step(&mut self) -> NavStep {
        let (active, pose) = match (self.active.as_mut(), self.pose.as_ref()) {
            (Some(a), Some(p)) if self.state == NavState::Tracking => (a, p),
            _ => return NavStep::idle(),
        };

        let out = self.tracker.step(pose, &active.path, active.progress);

        if out.progress > active.progress {
            debug!(
                "Progress {} / {}",
                out.progress,
                active.path.get_num_points().saturating_sub(1)
            );
        }
        active.progress = out.progress;

        if out.goal_reached {
            info!(
                "Goal ({:.2}, {:.2}) reached",
                active.goal_m.x, active.goal_m.y
            );
            self.active = None;
            self.transition(NavState::Idle);

            return NavStep {
                cmd: VelocityCmd::zero(),
                goal_reached: true,
                progress: Some(out.progress),
            };
        }

        trace!(
            "Cmd: {:.3} m/s, {:.3} rad/s (target {:?}, heading error {:.3} rad)",
            out.cmd.linear_ms,
            out.cmd.angular_rads,
            out.target_index,
            out.heading_error_rad
        );

        NavStep {
            cmd: out.cmd,
            goal_reached: false,
            progress: Some(out.progress),
        }
    }

    fn transition(&mut self, new: NavState) {
        if new != self.state {
            debug!("NavCtrl {} -> {}", self.state, new);
            self.state = new;
        }
    }

    fn archive(&self, goal_m: &WorldPoint, start: &PoseEstimate, planned: PlannedPath) {
        util::session::save_with_timestamp(
            PLAN_REPORT_PATH,
            PlanReport {
                goal_m: *goal_m,
                start: *start,
                cells: planned.cells,
                raw_path: planned.raw_path,
                path: planned.path,
                raw_cost: planned.raw_cost,
                num_expansions: planned.num_expansions,
            },
        );
    }
}

impl NavStep {
    fn idle() -> Self {
        Self {
            cmd: VelocityCmd::zero(),
            goal_reached: false,
            progress: None,
        }
    }
}

impl Display for NavState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavState::Idle => write!(f, "Idle"),
            NavState::Tracking => write!(f, "Tracking"),
            NavState::Failed => write!(f, "Failed"),
        }
    }
}

impl From<PlanningError> for NavError {
    fn from(e: PlanningError) -> Self {
        NavError::Planning(e)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
