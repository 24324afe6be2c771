//! Navigation controller parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::{
    map::{Footprint, GridMapParams},
    nav::{PathPlannerParams, PathSmootherParams},
    traj_ctrl::PurePursuitParams,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for [`super::NavCtrl`] and all the components it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavCtrlParams {
    pub map: GridMapParams,

    /// Static obstacles, rasterised into the map once at startup
    #[serde(default)]
    pub obstacles: Vec<Footprint>,

    pub planner: PathPlannerParams,

    #[serde(default)]
    pub smoother: PathSmootherParams,

    pub tracker: PurePursuitParams,

    /// If true a goal received before any pose is kept and planned on the next pose.
    pub retry_pending_goal: bool,
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
