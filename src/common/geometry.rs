//! Convex polygon geometry for obstacle regions and robot footprints

use itertools::Itertools;
use nalgebra::{Rotation2, Vector2};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::common::types::{ContinuousState, Point2D};

/// Vertex ordering of a polygon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winding {
    Clockwise,
    CounterClockwise,
}

/// Convex polygon in world coordinates [mm]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConvexPolygon {
    vertices: Vec<Point2D>,
}

impl ConvexPolygon {
    pub fn new(vertices: Vec<Point2D>) -> Self {
        Self { vertices }
    }

    /// Vertices from parallel coordinate slices; extra entries of the longer one are ignored
    pub fn from_xy(x: &[f64], y: &[f64]) -> Self {
        let vertices = x
            .iter()
            .zip(y.iter())
            .map(|(&x, &y)| Point2D::new(x, y))
            .collect();
        Self { vertices }
    }

    /// Axis-aligned rectangle, counter-clockwise from the lower left corner
    pub fn rectangle(min: Point2D, max: Point2D) -> Self {
        Self::new(vec![
            Point2D::new(min.x, min.y),
            Point2D::new(max.x, min.y),
            Point2D::new(max.x, max.y),
            Point2D::new(min.x, max.y),
        ])
    }

    pub fn vertices(&self) -> &[Point2D] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Fewer than three vertices cannot bound an area
    pub fn is_degenerate(&self) -> bool {
        self.vertices.len() < 3
    }

    /// Closed edge list, last vertex wrapping to the first
    pub fn edges(&self) -> impl Iterator<Item = (Point2D, Point2D)> + '_ {
        self.vertices
            .iter()
            .copied()
            .circular_tuple_windows::<(Point2D, Point2D)>()
    }

    /// Shoelace area, positive for counter-clockwise vertex order
    pub fn signed_area(&self) -> f64 {
        if self.is_degenerate() {
            return 0.0;
        }
        0.5 * self
            .edges()
            .map(|(a, b)| a.x * b.y - b.x * a.y)
            .sum::<f64>()
    }

    pub fn winding(&self) -> Winding {
        if self.signed_area() < 0.0 {
            Winding::Clockwise
        } else {
            Winding::CounterClockwise
        }
    }

    /// Reorder vertices so the polygon winds in `winding` direction
    pub fn set_winding(&mut self, winding: Winding) {
        if !self.is_degenerate() && self.winding() != winding {
            self.vertices.reverse();
        }
    }

    /// Mean of the vertices
    pub fn centroid(&self) -> Point2D {
        if self.vertices.is_empty() {
            return Point2D::origin();
        }
        let n = self.vertices.len() as f64;
        let (sx, sy) = self
            .vertices
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point2D::new(sx / n, sy / n)
    }

    /// Push every vertex `amount` further away from the centroid
    pub fn radial_expand(&mut self, amount: f64) {
        let c = self.centroid().to_vector();
        for v in self.vertices.iter_mut() {
            let dir = v.to_vector() - c;
            let norm = dir.norm();
            if norm > f64::EPSILON {
                *v = Point2D::from(v.to_vector() + dir * (amount / norm));
            }
        }
    }

    /// Scale about the coordinate origin
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(
            self.vertices
                .iter()
                .map(|p| Point2D::new(p.x * factor, p.y * factor))
                .collect(),
        )
    }

    /// Rotate by the pose heading, then translate to the pose position
    pub fn transformed(&self, pose: &ContinuousState) -> Self {
        let rot = Rotation2::new(pose.theta_rad);
        let offset = Vector2::new(pose.x_mm, pose.y_mm);
        Self::new(
            self.vertices
                .iter()
                .map(|p| Point2D::from(rot * p.to_vector() + offset))
                .collect(),
        )
    }

    /// Point containment, boundary inclusive. Works for either winding.
    pub fn contains(&self, point: &Point2D) -> bool {
        if self.is_degenerate() {
            return false;
        }
        let mut has_pos = false;
        let mut has_neg = false;
        for (a, b) in self.edges() {
            let cross = (b.x - a.x) * (point.y - a.y) - (b.y - a.y) * (point.x - a.x);
            if cross > 1e-9 {
                has_pos = true;
            } else if cross < -1e-9 {
                has_neg = true;
            }
            if has_pos && has_neg {
                return false;
            }
        }
        true
    }

    /// Largest vertex distance from the coordinate origin
    pub fn max_radius(&self) -> f64 {
        self.vertices
            .iter()
            .map(|p| OrderedFloat(p.to_vector().norm()))
            .max()
            .map(|r| r.into_inner())
            .unwrap_or(0.0)
    }

    pub fn x_coords(&self) -> Vec<f64> {
        self.vertices.iter().map(|p| p.x).collect()
    }

    pub fn y_coords(&self) -> Vec<f64> {
        self.vertices.iter().map(|p| p.y).collect()
    }
}
