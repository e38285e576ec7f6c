//! Continuous robot paths built from line, arc and point-turn segments

use std::f64::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};

use crate::common::types::{normalize_angle, ContinuousState, Point2D};

/// Velocity profile attached to each segment.
///
/// For lines and arcs `target_speed` is [mm/s], negative when driving in
/// reverse. For point turns it is [rad/s] and its sign picks the turn
/// direction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpeedProfile {
    pub target_speed: f64,
    pub accel: f64,
    pub decel: f64,
}

impl SpeedProfile {
    pub fn new(target_speed: f64, accel: f64, decel: f64) -> Self {
        Self {
            target_speed,
            accel,
            decel,
        }
    }

    pub fn is_reverse(&self) -> bool {
        self.target_speed < 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathSegment {
    Line {
        start: Point2D,
        end: Point2D,
        speed: SpeedProfile,
    },
    Arc {
        center: Point2D,
        radius: f64,
        start_rad: f64,
        sweep_rad: f64,
        speed: SpeedProfile,
    },
    PointTurn {
        position: Point2D,
        start_angle: f64,
        target_angle: f64,
        angle_tolerance: f64,
        use_shortest_dir: bool,
        speed: SpeedProfile,
    },
}

impl PathSegment {
    pub fn start_point(&self) -> Point2D {
        match *self {
            PathSegment::Line { start, .. } => start,
            PathSegment::Arc {
                center,
                radius,
                start_rad,
                ..
            } => Point2D::new(
                center.x + radius * start_rad.cos(),
                center.y + radius * start_rad.sin(),
            ),
            PathSegment::PointTurn { position, .. } => position,
        }
    }

    /// Pose of the robot once the segment has been driven
    pub fn end_pose(&self) -> ContinuousState {
        match *self {
            PathSegment::Line { start, end, speed } => {
                let mut heading = (end.y - start.y).atan2(end.x - start.x);
                if speed.is_reverse() {
                    heading += PI;
                }
                ContinuousState::new(end.x, end.y, normalize_angle(heading))
            }
            PathSegment::Arc {
                center,
                radius,
                start_rad,
                sweep_rad,
                speed,
            } => {
                let end_rad = start_rad + sweep_rad;
                let mut heading = end_rad + FRAC_PI_2.copysign(sweep_rad);
                if speed.is_reverse() {
                    heading += PI;
                }
                ContinuousState::new(
                    center.x + radius * end_rad.cos(),
                    center.y + radius * end_rad.sin(),
                    normalize_angle(heading),
                )
            }
            PathSegment::PointTurn {
                position,
                target_angle,
                ..
            } => ContinuousState::new(position.x, position.y, target_angle),
        }
    }

    pub fn is_point_turn(&self) -> bool {
        matches!(self, PathSegment::PointTurn { .. })
    }

    /// Travelled distance [mm]; point turns have zero length
    pub fn length(&self) -> f64 {
        match *self {
            PathSegment::Line { start, end, .. } => start.distance(&end),
            PathSegment::Arc {
                radius, sweep_rad, ..
            } => radius * sweep_rad.abs(),
            PathSegment::PointTurn { .. } => 0.0,
        }
    }
}

/// Ordered list of segments handed to the motion controller
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    pub fn append_line(&mut self, start: Point2D, end: Point2D, speed: SpeedProfile) {
        self.push(PathSegment::Line { start, end, speed });
    }

    pub fn append_point_turn(
        &mut self,
        position: Point2D,
        start_angle: f64,
        target_angle: f64,
        angle_tolerance: f64,
        use_shortest_dir: bool,
        speed: SpeedProfile,
    ) {
        self.push(PathSegment::PointTurn {
            position,
            start_angle,
            target_angle,
            angle_tolerance,
            use_shortest_dir,
            speed,
        });
    }

    pub fn pop_back(&mut self) -> Option<PathSegment> {
        self.segments.pop()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathSegment> {
        self.segments.iter()
    }

    /// Total travelled distance [mm]
    pub fn length(&self) -> f64 {
        self.segments.iter().map(PathSegment::length).sum()
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathSegment;
    type IntoIter = std::slice::Iter<'a, PathSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}
