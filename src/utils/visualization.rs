//! Debug drawing for the lattice planner.
//!
//! Layers are collected first and handed to gnuplot in one go when the figure
//! is shown or saved.

use gnuplot::{AutoOption, AxesCommon, Caption, Color, Figure, LineWidth, PointSize, PointSymbol};

use crate::common::{ContinuousState, ConvexPolygon, Path, PathSegment, PlannerError, PlannerResult, Point2D};
use crate::lattice_planner::shared::DebugPolygon;

/// Color palette for consistent styling
pub mod colors {
    pub const BLACK: &str = "#000000";
    pub const RED: &str = "#FF0000";
    pub const GREEN: &str = "#00FF00";
    pub const BLUE: &str = "#0000FF";
    pub const CYAN: &str = "#00FFFF";
    pub const MAGENTA: &str = "#FF00FF";
    pub const ORANGE: &str = "#FFA500";

    // Semantic colors
    pub const OBSTACLE: &str = BLACK;
    pub const REPLAN_OBSTACLE: &str = ORANGE;
    pub const START: &str = GREEN;
    pub const GOAL: &str = BLUE;
    pub const PATH: &str = RED;
    pub const POINT_TURN: &str = MAGENTA;
    pub const ROBOT: &str = CYAN;
}

/// Length of the heading tick drawn for a pose [mm]
const HEADING_TICK_MM: f64 = 30.0;
/// Arc sampling step [rad]
const ARC_STEP_RAD: f64 = 0.1;

/// Style for path rendering
#[derive(Debug, Clone)]
pub struct PathStyle {
    pub color: String,
    pub line_width: f64,
    pub caption: String,
}

impl PathStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            line_width: 2.0,
            caption: caption.to_string(),
        }
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }
}

impl Default for PathStyle {
    fn default() -> Self {
        Self::new(colors::PATH, "Path")
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Layer {
    Lines {
        x: Vec<f64>,
        y: Vec<f64>,
        color: String,
        width: f64,
        caption: Option<String>,
    },
    Points {
        x: Vec<f64>,
        y: Vec<f64>,
        color: String,
        symbol: char,
        size: f64,
        caption: Option<String>,
    },
}

pub struct Visualizer {
    figure: Figure,
    layers: Vec<Layer>,
    title: String,
    x_range: Option<(f64, f64)>,
    y_range: Option<(f64, f64)>,
    aspect_ratio: Option<f64>,
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            figure: Figure::new(),
            layers: Vec::new(),
            title: String::new(),
            x_range: None,
            y_range: None,
            aspect_ratio: Some(1.0),
        }
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    pub fn set_x_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.x_range = Some((min, max));
        self
    }

    pub fn set_y_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.y_range = Some((min, max));
        self
    }

    /// Set aspect ratio (None for auto)
    pub fn set_aspect_ratio(&mut self, ratio: Option<f64>) -> &mut Self {
        self.aspect_ratio = ratio;
        self
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Draw a polygon outline, closed back onto its first vertex
    pub fn plot_polygon(
        &mut self,
        polygon: &ConvexPolygon,
        color: &str,
        caption: Option<&str>,
    ) -> &mut Self {
        if polygon.is_empty() {
            return self;
        }
        let mut x = polygon.x_coords();
        let mut y = polygon.y_coords();
        x.push(x[0]);
        y.push(y[0]);
        self.layers.push(Layer::Lines {
            x,
            y,
            color: color.to_string(),
            width: 1.0,
            caption: caption.map(str::to_string),
        });
        self
    }

    /// Draw the obstacle polygons recorded by the last imports, captioning
    /// the first polygon of each color.
    pub fn plot_debug_obstacles(&mut self, obstacles: &[DebugPolygon]) -> &mut Self {
        let mut captioned: Vec<&str> = Vec::new();
        for obstacle in obstacles {
            let caption = if captioned.contains(&obstacle.color) {
                None
            } else {
                captioned.push(obstacle.color);
                Some(if obstacle.color == colors::REPLAN_OBSTACLE {
                    "Replan obstacles"
                } else {
                    "Obstacles"
                })
            };
            self.plot_polygon(&obstacle.polygon, obstacle.color, caption);
        }
        self
    }

    /// Draw a path: driven segments as one polyline, point turns as markers
    pub fn plot_lattice_path(&mut self, path: &Path, style: &PathStyle) -> &mut Self {
        let mut points: Vec<Point2D> = Vec::new();
        let mut turns: Vec<Point2D> = Vec::new();

        for segment in path {
            match *segment {
                PathSegment::Line { start, end, .. } => {
                    if points.last() != Some(&start) {
                        points.push(start);
                    }
                    points.push(end);
                }
                PathSegment::Arc {
                    center,
                    radius,
                    start_rad,
                    sweep_rad,
                    ..
                } => {
                    let n = (sweep_rad.abs() / ARC_STEP_RAD).ceil().max(1.0) as usize;
                    for i in 0..=n {
                        let a = start_rad + sweep_rad * i as f64 / n as f64;
                        points.push(Point2D::new(
                            center.x + radius * a.cos(),
                            center.y + radius * a.sin(),
                        ));
                    }
                }
                PathSegment::PointTurn { position, .. } => turns.push(position),
            }
        }

        if !points.is_empty() {
            self.layers.push(Layer::Lines {
                x: points.iter().map(|p| p.x).collect(),
                y: points.iter().map(|p| p.y).collect(),
                color: style.color.clone(),
                width: style.line_width,
                caption: Some(style.caption.clone()),
            });
        }
        if !turns.is_empty() {
            self.layers.push(Layer::Points {
                x: turns.iter().map(|p| p.x).collect(),
                y: turns.iter().map(|p| p.y).collect(),
                color: colors::POINT_TURN.to_string(),
                symbol: 'O',
                size: 1.0,
                caption: Some("Point turns".to_string()),
            });
        }
        self
    }

    /// Draw a pose as a marker with a short heading tick
    pub fn plot_state(&mut self, state: &ContinuousState, color: &str, caption: &str) -> &mut Self {
        self.layers.push(Layer::Points {
            x: vec![state.x_mm],
            y: vec![state.y_mm],
            color: color.to_string(),
            symbol: 'O',
            size: 1.5,
            caption: Some(caption.to_string()),
        });
        self.layers.push(Layer::Lines {
            x: vec![state.x_mm, state.x_mm + HEADING_TICK_MM * state.theta_rad.cos()],
            y: vec![state.y_mm, state.y_mm + HEADING_TICK_MM * state.theta_rad.sin()],
            color: color.to_string(),
            width: 2.0,
            caption: None,
        });
        self
    }

    pub fn plot_start(&mut self, state: &ContinuousState) -> &mut Self {
        self.plot_state(state, colors::START, "Start")
    }

    pub fn plot_goal(&mut self, state: &ContinuousState) -> &mut Self {
        self.plot_state(state, colors::GOAL, "Goal")
    }

    pub fn show(&mut self) -> PlannerResult<()> {
        self.render();
        self.figure
            .show()
            .map(|_| ())
            .map_err(|e| PlannerError::Visualization(e.to_string()))
    }

    pub fn save_png(&mut self, path: &str, width: u32, height: u32) -> PlannerResult<()> {
        self.render();
        self.figure
            .save_to_png(path, width, height)
            .map_err(|e| PlannerError::Visualization(e.to_string()))
    }

    pub fn save_svg(&mut self, path: &str) -> PlannerResult<()> {
        self.render();
        self.figure
            .save_to_svg(path, 800, 600)
            .map_err(|e| PlannerError::Visualization(e.to_string()))
    }

    fn render(&mut self) {
        self.figure.clear_axes();
        let axes = self.figure.axes2d();

        for layer in &self.layers {
            match layer {
                Layer::Lines {
                    x,
                    y,
                    color,
                    width,
                    caption,
                } => {
                    let mut options = vec![Color(color.as_str()), LineWidth(*width)];
                    if let Some(caption) = caption {
                        options.push(Caption(caption.as_str()));
                    }
                    axes.lines(x, y, &options);
                }
                Layer::Points {
                    x,
                    y,
                    color,
                    symbol,
                    size,
                    caption,
                } => {
                    let mut options = vec![
                        Color(color.as_str()),
                        PointSymbol(*symbol),
                        PointSize(*size),
                    ];
                    if let Some(caption) = caption {
                        options.push(Caption(caption.as_str()));
                    }
                    axes.points(x, y, &options);
                }
            }
        }

        if !self.title.is_empty() {
            axes.set_title(&self.title, &[]);
        }
        axes.set_x_label("X [mm]", &[]);
        axes.set_y_label("Y [mm]", &[]);
        if let Some((min, max)) = self.x_range {
            axes.set_x_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some((min, max)) = self.y_range {
            axes.set_y_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some(ratio) = self.aspect_ratio {
            axes.set_aspect_ratio(AutoOption::Fix(ratio));
        }
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}
