//! Common types used throughout lattice_nav

use std::f64::consts::PI;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Index of a discretized heading in the lattice.
pub type HeadingBucket = u8;

/// Index of a motion primitive in the engine's action space.
pub type ActionId = u8;

/// Identifier of a candidate goal; indexes the caller's target list.
pub type GoalId = usize;

/// 2D point representation [mm]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl From<Vector2<f64>> for Point2D {
    fn from(v: Vector2<f64>) -> Self {
        Self { x: v[0], y: v[1] }
    }
}

/// Robot pose in world units. This is the boundary type for every planner entry point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ContinuousState {
    pub x_mm: f64,
    pub y_mm: f64,
    pub theta_rad: f64,
}

impl ContinuousState {
    pub fn new(x_mm: f64, y_mm: f64, theta_rad: f64) -> Self {
        Self {
            x_mm,
            y_mm,
            theta_rad,
        }
    }

    pub fn origin() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x_mm, self.y_mm)
    }

    /// Euclidean distance between the two positions, heading ignored
    pub fn distance_to(&self, other: &ContinuousState) -> f64 {
        self.position().distance(&other.position())
    }
}

/// Lattice cell: grid indices plus a heading bucket.
///
/// Produced only by the engine's quantization; equality of two discrete
/// states is what the plan continuity check compares.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct DiscreteState {
    pub x: i32,
    pub y: i32,
    pub theta: HeadingBucket,
}

impl DiscreteState {
    pub fn new(x: i32, y: i32, theta: HeadingBucket) -> Self {
        Self { x, y, theta }
    }
}

impl std::fmt::Display for DiscreteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.theta)
    }
}

/// Normalize angle to [-PI, PI]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle;
    while a > PI {
        a -= 2.0 * PI;
    }
    while a < -PI {
        a += 2.0 * PI;
    }
    a
}

/// Signed shortest rotation taking `from` onto `to`
pub fn angle_diff(to: f64, from: f64) -> f64 {
    normalize_angle(to - from)
}
