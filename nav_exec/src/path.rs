//! # Path
//!
//! This module defines the path produced by the planner and followed by the trajectory tracker.
//! A path is an ordered sequence of world points. Once built it is never modified, a new plan
//! replaces the whole path.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::map::WorldPoint;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An ordered sequence of waypoints in the world frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Path {
    points_m: Vec<WorldPoint>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Path {
    /// Create a new path from the given points.
    pub fn new(points_m: Vec<WorldPoint>) -> Self {
        Self { points_m }
    }

    /// Create a new path from a list of `(x, y)` tuples.
    pub fn from_xy(points: &[(f64, f64)]) -> Self {
        Self {
            points_m: points.iter().map(|&(x, y)| WorldPoint::new(x, y)).collect(),
        }
    }

    /// The waypoints of the path.
    pub fn points_m(&self) -> &[WorldPoint] {
        &self.points_m
    }

    pub fn get_num_points(&self) -> usize {
        self.points_m.len()
    }

    pub fn first(&self) -> Option<&WorldPoint> {
        self.points_m.first()
    }

    pub fn last(&self) -> Option<&WorldPoint> {
        self.points_m.last()
    }

    /// Get the length of the path, i.e. the sum of the lengths of all segments.
    ///
    /// Returns `None` if the path has no points.
    pub fn get_length(&self) -> Option<f64> {
        if self.points_m.is_empty() {
            return None;
        }

        Some(
            self.points_m
                .windows(2)
                .map(|w| (w[1] - w[0]).norm())
                .sum(),
        )
    }
}

impl From<Vec<WorldPoint>> for Path {
    fn from(points_m: Vec<WorldPoint>) -> Self {
        Self::new(points_m)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_path_length() {
        assert_eq!(Path::default().get_length(), None);
        assert_eq!(Path::from_xy(&[(1.0, 1.0)]).get_length(), Some(0.0));

        let path = Path::from_xy(&[(0.0, 0.0), (3.0, 0.0), (3.0, 4.0)]);
        assert_eq!(path.get_num_points(), 3);
        assert!((path.get_length().unwrap() - 7.0).abs() < 1e-12);
        assert_eq!(path.last(), Some(&WorldPoint::new(3.0, 4.0)));
    }
}
