//! Path simplification by string pulling.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    map::{GridMap, WorldPoint},
    path::Path,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PathSmoother {
    params: PathSmootherParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSmootherParams {
    /// Spacing of collision samples along a segment, as a fraction of the map resolution.
    pub sample_spacing_fraction: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum PathSmootherError {
    #[error("Sample spacing fraction must be positive and finite, got {0}")]
    InvalidSampleSpacing(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PathSmoother {
    pub fn new(params: PathSmootherParams) -> Result<Self, PathSmootherError> {
        let frac = params.sample_spacing_fraction;

        if !frac.is_finite() || frac <= 0.0 {
            return Err(PathSmootherError::InvalidSampleSpacing(frac));
        }

        Ok(Self { params })
    }

    /// Greedily remove waypoints which are not needed to keep the path collision free.
    ///
    /// The first and last points are always kept and each kept point can see the next one. Paths
    /// of two points or fewer are returned unchanged.
    pub fn smooth(&self, map: &GridMap, path: &Path) -> Path {
        let points = path.points_m();

        if points.len() <= 2 {
            return path.clone();
        }

        let mut smoothed = vec![points[0]];
        let mut anchor = 0;

        while anchor < points.len() - 1 {
            // The next point is always kept, even if the segment to it is blocked
            let mut accepted = anchor + 1;

            for candidate in (anchor + 1)..points.len() {
                if self.is_segment_clear(map, &points[anchor], &points[candidate]) {
                    accepted = candidate;
                } else {
                    break;
                }
            }

            smoothed.push(points[accepted]);
            anchor = accepted;
        }

        debug!(
            "Smoothed path from {} to {} points",
            points.len(),
            smoothed.len()
        );

        Path::new(smoothed)
    }

    /// Returns true if every sample along the segment lies in a free cell inside the map.
    pub fn is_segment_clear(&self, map: &GridMap, a: &WorldPoint, b: &WorldPoint) -> bool {
        let step = map.resolution() * self.params.sample_spacing_fraction;
        let delta = *b - *a;
        let num_steps = (delta.norm() / step).ceil();

        if !num_steps.is_finite() || num_steps < 1.0 {
            return map.is_traversable(map.world_to_grid(a));
        }

        let num_steps = num_steps as usize;

        (0..=num_steps).all(|k| {
            let t = k as f64 / num_steps as f64;
            map.is_traversable(map.world_to_grid(&(*a + delta * t)))
        })
    }
}

impl Default for PathSmootherParams {
    fn default() -> Self {
        Self {
            sample_spacing_fraction: 0.5,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
