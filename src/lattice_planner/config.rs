//! Configuration for the lattice planner driver

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::{ContentCategory, ContinuousState, ConvexPolygon, PlannerError, PlannerResult, Point2D};

/// Planner driver configuration. Every field has a default, so a partial
/// TOML file is enough.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LatticePlannerConfig {
    /// Padding added around the robot footprint [mm]
    #[serde(default = "default_robot_padding")]
    pub robot_padding_mm: f64,

    /// Radial padding added around every obstacle region [mm]
    #[serde(default = "default_obstacle_padding")]
    pub obstacle_padding_mm: f64,

    /// Subtracted from both paddings when only re-checking an existing plan [mm]
    #[serde(default = "default_replan_padding_subtract")]
    pub replan_padding_subtract_mm: f64,

    /// Scale applied to the padded footprint before expansion
    #[serde(default = "default_robot_expansion_scaling")]
    pub robot_expansion_scaling: f64,

    /// Hard cap on node expansions for one search
    #[serde(default = "default_max_expansions")]
    pub max_expansions: u32,

    /// Traversal penalty given to every imported obstacle
    #[serde(default = "default_obstacle_penalty")]
    pub obstacle_penalty: f32,

    /// Offset from the committed plan at which it is abandoned [mm]
    #[serde(default = "default_plan_error_for_replan")]
    pub plan_error_for_replan_mm: f64,

    /// How far along the old plan a safe prefix may extend [mm]
    #[serde(default = "default_max_distance_to_follow_old_plan")]
    pub max_distance_to_follow_old_plan_mm: f64,

    /// Import proximity-sensed obstacles as well
    #[serde(default = "default_true")]
    pub use_prox_obstacles: bool,

    /// Map categories always imported as obstacles
    #[serde(default = "default_obstacle_categories")]
    pub obstacle_categories: Vec<ContentCategory>,

    /// Search all goals at once instead of the closest collision free one
    #[serde(default = "default_true")]
    pub multi_goal_planning: bool,

    /// Run searches on the caller's thread
    #[serde(default)]
    pub synchronous: bool,

    /// Delay before every search [ms]; test hook, 0 disables it
    #[serde(default)]
    pub artificial_delay_ms: u32,

    /// Granularity at which the artificial delay checks for cancellation [ms]
    #[serde(default = "default_artificial_delay_step")]
    pub artificial_delay_step_ms: u32,

    /// Directory receiving `context_<n>.json` dumps, disabled when unset
    #[serde(default)]
    pub context_dump_dir: Option<PathBuf>,

    #[serde(default)]
    pub terminal_turn: TerminalTurnConfig,

    #[serde(default)]
    pub footprint: RobotFootprint,
}

/// Motion profile of the final point turn onto the goal heading
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalTurnConfig {
    /// [rad/s]
    pub speed_rad_per_s: f64,
    /// [rad/s^2]
    pub accel_rad_per_s2: f64,
    /// [rad/s^2]
    pub decel_rad_per_s2: f64,
    pub angle_tolerance_deg: f64,
}

impl TerminalTurnConfig {
    pub fn angle_tolerance_rad(&self) -> f64 {
        self.angle_tolerance_deg.to_radians()
    }
}

impl Default for TerminalTurnConfig {
    fn default() -> Self {
        Self {
            speed_rad_per_s: 2.0,
            accel_rad_per_s2: 10.0,
            decel_rad_per_s2: 10.0,
            angle_tolerance_deg: 5.0,
        }
    }
}

/// Robot bounding box, measured in the robot frame with x pointing forward
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotFootprint {
    pub length_mm: f64,
    pub width_mm: f64,
    /// Distance from the robot origin to the front edge
    pub front_mm: f64,
    /// x of the drive center relative to the robot origin
    pub drive_center_offset_mm: f64,
}

impl Default for RobotFootprint {
    fn default() -> Self {
        Self {
            length_mm: 90.0,
            width_mm: 60.0,
            front_mm: 60.0,
            drive_center_offset_mm: -20.0,
        }
    }
}

impl RobotFootprint {
    /// Padded bounding box of the robot when its drive center sits at `pose`
    pub fn bounding_polygon(&self, pose: &ContinuousState, padding_mm: f64) -> ConvexPolygon {
        let front = self.front_mm - self.drive_center_offset_mm + padding_mm;
        let back = self.front_mm - self.length_mm - self.drive_center_offset_mm - padding_mm;
        let half_width = 0.5 * self.width_mm + padding_mm;
        ConvexPolygon::rectangle(
            Point2D::new(back, -half_width),
            Point2D::new(front, half_width),
        )
        .transformed(pose)
    }
}

fn default_robot_padding() -> f64 {
    7.0
}
fn default_obstacle_padding() -> f64 {
    6.0
}
fn default_replan_padding_subtract() -> f64 {
    5.0
}
fn default_robot_expansion_scaling() -> f64 {
    1.2
}
fn default_max_expansions() -> u32 {
    30_000_000
}
fn default_obstacle_penalty() -> f32 {
    0.1
}
fn default_plan_error_for_replan() -> f64 {
    20.0
}
fn default_max_distance_to_follow_old_plan() -> f64 {
    300.0
}
fn default_true() -> bool {
    true
}
fn default_obstacle_categories() -> Vec<ContentCategory> {
    vec![
        ContentCategory::Unknown,
        ContentCategory::InterestingEdge,
        ContentCategory::NotInterestingEdge,
        ContentCategory::Cliff,
    ]
}
fn default_artificial_delay_step() -> u32 {
    10
}

impl Default for LatticePlannerConfig {
    fn default() -> Self {
        Self {
            robot_padding_mm: default_robot_padding(),
            obstacle_padding_mm: default_obstacle_padding(),
            replan_padding_subtract_mm: default_replan_padding_subtract(),
            robot_expansion_scaling: default_robot_expansion_scaling(),
            max_expansions: default_max_expansions(),
            obstacle_penalty: default_obstacle_penalty(),
            plan_error_for_replan_mm: default_plan_error_for_replan(),
            max_distance_to_follow_old_plan_mm: default_max_distance_to_follow_old_plan(),
            use_prox_obstacles: true,
            obstacle_categories: default_obstacle_categories(),
            multi_goal_planning: true,
            synchronous: false,
            artificial_delay_ms: 0,
            artificial_delay_step_ms: default_artificial_delay_step(),
            context_dump_dir: None,
            terminal_turn: TerminalTurnConfig::default(),
            footprint: RobotFootprint::default(),
        }
    }
}

impl LatticePlannerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> PlannerResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PlannerError::Config(format!("Failed to read config file: {}", e)))?;
        let config: LatticePlannerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the driver cannot work with
    pub fn validate(&self) -> PlannerResult<()> {
        if self.replan_padding_subtract_mm < 0.0
            || self.replan_padding_subtract_mm >= self.robot_padding_mm
            || self.replan_padding_subtract_mm >= self.obstacle_padding_mm
        {
            return Err(PlannerError::Config(format!(
                "replan padding subtract {} must be non-negative and below both robot ({}) and obstacle ({}) padding",
                self.replan_padding_subtract_mm, self.robot_padding_mm, self.obstacle_padding_mm
            )));
        }
        if self.robot_expansion_scaling < 1.0 {
            return Err(PlannerError::Config(format!(
                "robot expansion scaling {} shrinks the footprint",
                self.robot_expansion_scaling
            )));
        }
        if self.max_expansions == 0 {
            return Err(PlannerError::Config("max_expansions must be positive".to_string()));
        }
        if self.plan_error_for_replan_mm <= 0.0 {
            return Err(PlannerError::Config(
                "plan_error_for_replan_mm must be positive".to_string(),
            ));
        }
        if self.artificial_delay_step_ms == 0 {
            return Err(PlannerError::Config(
                "artificial_delay_step_ms must be positive".to_string(),
            ));
        }
        if self.footprint.length_mm <= 0.0 || self.footprint.width_mm <= 0.0 {
            return Err(PlannerError::Config("footprint must have a positive size".to_string()));
        }
        Ok(())
    }

    /// (obstacle padding, robot padding) for an import
    pub fn paddings(&self, is_replanning: bool) -> (f64, f64) {
        if is_replanning {
            (
                self.obstacle_padding_mm - self.replan_padding_subtract_mm,
                self.robot_padding_mm - self.replan_padding_subtract_mm,
            )
        } else {
            (self.obstacle_padding_mm, self.robot_padding_mm)
        }
    }
}
