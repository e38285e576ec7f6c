//! Small grid lattice engine and static occupancy map for exercising the driver.
//!
//! 10 mm cells, 8 headings, three primitives (forward, turn left, turn right)
//! searched with A*.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::f64::consts::FRAC_PI_4;

use log::debug;
use ordered_float::OrderedFloat;

use crate::common::*;
use crate::lattice_planner::context::PlannerContext;

pub const RESOLUTION_MM: f64 = 10.0;
pub const NUM_HEADINGS: HeadingBucket = 8;

pub const FORWARD: ActionId = 0;
pub const TURN_LEFT: ActionId = 1;
pub const TURN_RIGHT: ActionId = 2;

const TURN_COST: f64 = 5.0;
const PENALTY_WEIGHT: f64 = 10.0;
const MAX_OBSTACLE_COST: f32 = 1000.0;
const REPLAN_PENALTY_BUFFER: f32 = 0.5;
const PATH_PENALTY_TOLERANCE: f32 = 1e-4;
const SEARCH_BOUND_CELLS: i32 = 200;
const SAMPLE_STEP_MM: f64 = 2.0;

const STEPS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

fn drive_speed() -> SpeedProfile {
    SpeedProfile::new(60.0, 200.0, 500.0)
}

#[derive(Default)]
struct SearchOutcome {
    found: Option<(GoalId, DiscretePlan)>,
    expansions: u32,
    considerations: u32,
}

pub struct GridEngine {
    obstacles: Vec<Vec<(ConvexPolygon, f32)>>,
    plan: DiscretePlan,
    chosen_goal: GoalId,
    last_expansions: u32,
    last_considerations: u32,
    pub replan_calls: usize,
    pub prepare_calls: usize,
    /// Makes every search panic
    pub panic_on_replan: bool,
}

impl Default for GridEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GridEngine {
    pub fn new() -> Self {
        Self {
            obstacles: vec![Vec::new(); NUM_HEADINGS as usize],
            plan: DiscretePlan::default(),
            chosen_goal: 0,
            last_expansions: 0,
            last_considerations: 0,
            replan_calls: 0,
            prepare_calls: 0,
            panic_on_replan: false,
        }
    }

    /// Obstacle used directly, without footprint expansion
    pub fn add_raw_obstacle(&mut self, polygon: ConvexPolygon, penalty: f32) {
        for per_heading in self.obstacles.iter_mut() {
            per_heading.push((polygon.clone(), penalty));
        }
    }

    pub fn step(&self, state: &DiscreteState, action: ActionId) -> DiscreteState {
        match action {
            FORWARD => {
                let (dx, dy) = STEPS[state.theta as usize];
                DiscreteState::new(state.x + dx, state.y + dy, state.theta)
            }
            TURN_LEFT => DiscreteState::new(state.x, state.y, (state.theta + 1) % NUM_HEADINGS),
            _ => DiscreteState::new(
                state.x,
                state.y,
                (state.theta + NUM_HEADINGS - 1) % NUM_HEADINGS,
            ),
        }
    }

    fn action_length(theta: HeadingBucket, action: ActionId) -> f64 {
        if action != FORWARD {
            0.0
        } else if theta % 2 == 0 {
            RESOLUTION_MM
        } else {
            RESOLUTION_MM * std::f64::consts::SQRT_2
        }
    }

    fn penalty_at(&self, point: &Point2D, theta: HeadingBucket) -> f32 {
        self.obstacles[theta as usize]
            .iter()
            .filter(|(poly, _)| poly.contains(point))
            .map(|(_, penalty)| *penalty)
            .fold(0.0, f32::max)
    }

    fn state_penalty(&self, state: &DiscreteState) -> f32 {
        self.penalty_at(&self.to_continuous(state).position(), state.theta)
    }

    /// Successor and the obstacle penalty of landing there
    fn apply_action(&self, state: &DiscreteState, action: ActionId) -> (DiscreteState, f32) {
        let next = self.step(state, action);
        (next, self.state_penalty(&next))
    }

    fn in_bounds(state: &DiscreteState) -> bool {
        state.x.abs() <= SEARCH_BOUND_CELLS && state.y.abs() <= SEARCH_BOUND_CELLS
    }

    fn segment_penalty(&self, segment: &PathSegment, heading: f64) -> f32 {
        let mut worst: f32 = 0.0;
        let mut sample = |x: f64, y: f64, theta: f64| {
            let bucket = self.discretize(&ContinuousState::new(x, y, theta)).theta;
            worst = worst.max(self.penalty_at(&Point2D::new(x, y), bucket));
        };
        match *segment {
            PathSegment::Line { start, end, .. } => {
                let theta = segment.end_pose().theta_rad;
                let n = (start.distance(&end) / SAMPLE_STEP_MM).ceil().max(1.0) as usize;
                for i in 0..=n {
                    let t = i as f64 / n as f64;
                    sample(
                        start.x + t * (end.x - start.x),
                        start.y + t * (end.y - start.y),
                        theta,
                    );
                }
            }
            PathSegment::Arc {
                center,
                radius,
                start_rad,
                sweep_rad,
                ..
            } => {
                let n = (radius * sweep_rad.abs() / SAMPLE_STEP_MM).ceil().max(1.0) as usize;
                for i in 0..=n {
                    let a = start_rad + sweep_rad * i as f64 / n as f64;
                    let theta = a + std::f64::consts::FRAC_PI_2.copysign(sweep_rad);
                    sample(
                        center.x + radius * a.cos(),
                        center.y + radius * a.sin(),
                        theta,
                    );
                }
            }
            PathSegment::PointTurn {
                position,
                target_angle,
                ..
            } => {
                let diff = angle_diff(target_angle, heading);
                for i in 0..=8 {
                    sample(position.x, position.y, heading + diff * i as f64 / 8.0);
                }
            }
        }
        worst
    }

    fn search(
        &self,
        start: DiscreteState,
        goals: &[(GoalId, DiscreteState, Point2D)],
        max_expansions: u32,
        cancel: &CancelToken,
    ) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();
        if goals.is_empty() {
            return outcome;
        }

        let heuristic = |state: &DiscreteState| {
            let p = self.to_continuous(state).position();
            goals
                .iter()
                .map(|(_, _, g)| OrderedFloat(p.distance(g)))
                .min()
                .map_or(0.0, |d| d.into_inner())
        };

        let mut open = BinaryHeap::new();
        let mut g_cost: HashMap<DiscreteState, f64> = HashMap::new();
        let mut came_from: HashMap<DiscreteState, (DiscreteState, ActionId, f32)> = HashMap::new();
        let mut closed: HashSet<DiscreteState> = HashSet::new();
        let mut seq: u64 = 0;

        g_cost.insert(start, 0.0);
        open.push(Reverse((OrderedFloat(heuristic(&start)), seq, start)));

        while let Some(Reverse((_, _, state))) = open.pop() {
            if cancel.is_cancelled() {
                debug!("Grid search cancelled after {} expansions", outcome.expansions);
                return outcome;
            }
            if !closed.insert(state) {
                continue;
            }
            outcome.expansions += 1;
            if outcome.expansions > max_expansions {
                return outcome;
            }

            if let Some(&(goal_id, goal, _)) = goals.iter().find(|(_, g, _)| *g == state) {
                outcome.found = Some((goal_id, self.reconstruct(start, goal, &came_from)));
                return outcome;
            }

            let g_here = g_cost.get(&state).copied().unwrap_or(f64::INFINITY);
            for action in [FORWARD, TURN_LEFT, TURN_RIGHT] {
                outcome.considerations += 1;
                let (next, penalty) = self.apply_action(&state, action);
                if !Self::in_bounds(&next) || penalty >= MAX_OBSTACLE_COST {
                    continue;
                }
                let step_cost = if action == FORWARD {
                    Self::action_length(state.theta, action)
                } else {
                    TURN_COST
                };
                let cost = g_here + step_cost + penalty as f64 * PENALTY_WEIGHT;
                if cost < g_cost.get(&next).copied().unwrap_or(f64::INFINITY) {
                    g_cost.insert(next, cost);
                    came_from.insert(next, (state, action, penalty));
                    seq += 1;
                    open.push(Reverse((OrderedFloat(cost + heuristic(&next)), seq, next)));
                }
            }
        }
        outcome
    }

    fn reconstruct(
        &self,
        start: DiscreteState,
        goal: DiscreteState,
        came_from: &HashMap<DiscreteState, (DiscreteState, ActionId, f32)>,
    ) -> DiscretePlan {
        let mut steps = Vec::new();
        let mut curr = goal;
        while curr != start {
            match came_from.get(&curr) {
                Some(&(prev, action, penalty)) => {
                    steps.push((action, penalty));
                    curr = prev;
                }
                None => break,
            }
        }
        let mut plan = DiscretePlan::new(start);
        for (action, penalty) in steps.into_iter().rev() {
            plan.push(action, penalty);
        }
        plan
    }
}

impl PlannerEngine for GridEngine {
    fn num_headings(&self) -> HeadingBucket {
        NUM_HEADINGS
    }

    fn heading_of(&self, bucket: HeadingBucket) -> f64 {
        normalize_angle(bucket as f64 * FRAC_PI_4)
    }

    fn discretize(&self, state: &ContinuousState) -> DiscreteState {
        let bucket = (normalize_angle(state.theta_rad) / FRAC_PI_4).round() as i32;
        DiscreteState::new(
            (state.x_mm / RESOLUTION_MM).round() as i32,
            (state.y_mm / RESOLUTION_MM).round() as i32,
            bucket.rem_euclid(NUM_HEADINGS as i32) as HeadingBucket,
        )
    }

    fn to_continuous(&self, state: &DiscreteState) -> ContinuousState {
        ContinuousState::new(
            state.x as f64 * RESOLUTION_MM,
            state.y as f64 * RESOLUTION_MM,
            self.heading_of(state.theta),
        )
    }

    fn start_is_valid(&self, context: &PlannerContext) -> bool {
        let start = self.discretize(&context.start);
        Self::in_bounds(&start) && self.state_penalty(&start) < MAX_OBSTACLE_COST
    }

    fn goals_are_valid(&self, context: &PlannerContext) -> bool {
        context.goals.iter().any(|(_, goal)| self.goal_is_valid(goal))
    }

    fn goal_is_valid(&self, goal: &ContinuousState) -> bool {
        let state = self.discretize(goal);
        Self::in_bounds(&state) && self.state_penalty(&state) < MAX_OBSTACLE_COST
    }

    fn collision_penalty(&self, state: &ContinuousState) -> f32 {
        self.state_penalty(&self.discretize(state))
    }

    fn max_obstacle_cost(&self) -> f32 {
        MAX_OBSTACLE_COST
    }

    fn prepare_for_planning(&mut self) {
        self.prepare_calls += 1;
    }

    fn replan(
        &mut self,
        context: &PlannerContext,
        max_expansions: u32,
        cancel: &CancelToken,
    ) -> bool {
        self.replan_calls += 1;
        if self.panic_on_replan {
            panic!("grid engine failure");
        }

        let start = self.discretize(&context.start);
        let goals: Vec<(GoalId, DiscreteState, Point2D)> = context
            .goals
            .iter()
            .filter(|(_, goal)| self.goal_is_valid(goal))
            .map(|(id, goal)| {
                let cell = self.discretize(goal);
                (*id, cell, self.to_continuous(&cell).position())
            })
            .collect();

        let outcome = self.search(start, &goals, max_expansions, cancel);
        self.last_expansions = outcome.expansions;
        self.last_considerations = outcome.considerations;
        match outcome.found {
            Some((goal_id, plan)) => {
                self.plan = plan;
                self.chosen_goal = goal_id;
                true
            }
            None => {
                self.plan = DiscretePlan::new(start);
                false
            }
        }
    }

    fn plan(&self) -> &DiscretePlan {
        &self.plan
    }

    fn chosen_goal(&self) -> GoalId {
        self.chosen_goal
    }

    fn last_num_expansions(&self) -> u32 {
        self.last_expansions
    }

    fn last_num_considerations(&self) -> u32 {
        self.last_considerations
    }

    fn plan_final_state(&self, plan: &DiscretePlan) -> DiscreteState {
        plan.actions
            .iter()
            .fold(plan.start, |state, &action| self.step(&state, action))
    }

    fn plan_is_safe(
        &self,
        plan: &DiscretePlan,
        max_lookahead_mm: f64,
        from_index: usize,
    ) -> PlanSafety {
        if plan.is_empty() {
            return PlanSafety {
                fully_safe: false,
                safe_prefix: DiscretePlan::new(plan.start),
                last_safe_state: self.to_continuous(&plan.start),
            };
        }

        let from_index = from_index.min(plan.len());
        let mut curr = plan.actions[..from_index]
            .iter()
            .fold(plan.start, |state, &action| self.step(&state, action));

        let anchor = self.to_continuous(&curr);
        let mut safety = PlanSafety {
            fully_safe: true,
            safe_prefix: DiscretePlan::new(curr),
            last_safe_state: anchor,
        };
        let mut extending = true;

        for i in from_index..plan.len() {
            let action = plan.actions[i];
            let recorded = plan.penalties[i];
            let (next, penalty) = self.apply_action(&curr, action);
            curr = next;

            if penalty > recorded + REPLAN_PENALTY_BUFFER {
                debug!(
                    "Collision along plan action {} (from {}): penalty {} -> {}",
                    i, from_index, recorded, penalty
                );
                safety.fully_safe = false;
                return safety;
            }

            if extending {
                safety.safe_prefix.push(action, recorded);
                safety.last_safe_state = self.to_continuous(&curr);
                if safety.last_safe_state.distance_to(&anchor) > max_lookahead_mm {
                    extending = false;
                }
            }
        }
        safety
    }

    fn path_is_safe(&self, path: &Path, start_heading: f64) -> (bool, Path) {
        let mut valid = Path::new();
        if path.is_empty() {
            return (false, valid);
        }

        let mut heading = start_heading;
        let mut total: f32 = 0.0;
        for segment in path {
            total += self.segment_penalty(segment, heading);
            if total > PATH_PENALTY_TOLERANCE {
                return (false, valid);
            }
            valid.push(*segment);
            heading = segment.end_pose().theta_rad;
        }
        (true, valid)
    }

    fn find_closest_plan_segment(
        &self,
        plan: &DiscretePlan,
        state: &ContinuousState,
    ) -> (usize, f64) {
        let target = self.discretize(state);
        let mut closest = (0, f64::MAX);
        let mut curr = plan.start;
        for (index, &action) in plan.actions.iter().enumerate() {
            if curr == target {
                return (index, 0.0);
            }
            let dist = self.to_continuous(&curr).distance_to(state);
            if dist < closest.1 {
                closest = (index, dist);
            }
            curr = self.step(&curr, action);
        }
        closest
    }

    fn clear_obstacles(&mut self) {
        for per_heading in self.obstacles.iter_mut() {
            per_heading.clear();
        }
    }

    fn num_obstacles(&self) -> usize {
        self.obstacles[0].len()
    }

    fn add_obstacle_with_expansion(
        &mut self,
        obstacle: &ConvexPolygon,
        robot: &ConvexPolygon,
        heading: HeadingBucket,
        penalty: f32,
    ) {
        let mut expanded = obstacle.clone();
        expanded.radial_expand(robot.max_radius());
        self.obstacles[heading as usize].push((expanded, penalty));
    }

    fn append_to_path(&self, plan: &DiscretePlan, path: &mut Path, skip_actions: usize) {
        let skip = skip_actions.min(plan.len());
        let mut curr = plan.actions[..skip]
            .iter()
            .fold(plan.start, |state, &action| self.step(&state, action));
        let mut line_start: Option<Point2D> = None;

        for &action in &plan.actions[skip..] {
            let next = self.step(&curr, action);
            let here = self.to_continuous(&curr);
            if action == FORWARD {
                line_start.get_or_insert(here.position());
            } else {
                if let Some(start) = line_start.take() {
                    path.append_line(start, here.position(), drive_speed());
                }
                let direction = if action == TURN_LEFT { 1.0 } else { -1.0 };
                path.append_point_turn(
                    here.position(),
                    here.theta_rad,
                    self.heading_of(next.theta),
                    0.05,
                    true,
                    SpeedProfile::new(direction, 10.0, 10.0),
                );
            }
            curr = next;
        }
        if let Some(start) = line_start {
            path.append_line(start, self.to_continuous(&curr).position(), drive_speed());
        }
    }

    fn describe_plan(&self, plan: &DiscretePlan) -> String {
        let actions: String = plan
            .actions
            .iter()
            .map(|&a| match a {
                FORWARD => 'F',
                TURN_LEFT => 'L',
                _ => 'R',
            })
            .collect();
        format!("{} -> {} [{}]", plan.start, self.plan_final_state(plan), actions)
    }

    fn environment_snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "resolution_mm": RESOLUTION_MM,
            "num_headings": NUM_HEADINGS,
            "obstacles": self.num_obstacles(),
        })
    }
}

/// Occupancy map whose watermark bumps on every edit
pub struct StaticMap {
    watermark: u64,
    regions: HashMap<ContentCategory, Vec<ConvexPolygon>>,
    objects: Vec<ConvexPolygon>,
}

impl Default for StaticMap {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticMap {
    pub fn new() -> Self {
        Self {
            watermark: 1,
            regions: HashMap::new(),
            objects: Vec::new(),
        }
    }

    pub fn add_region(&mut self, category: ContentCategory, polygon: ConvexPolygon) {
        self.regions.entry(category).or_default().push(polygon);
        self.watermark += 1;
    }

    pub fn add_object(&mut self, polygon: ConvexPolygon) {
        self.objects.push(polygon);
        self.watermark += 1;
    }
}

impl OccupancyMap for StaticMap {
    fn last_changed(&self) -> u64 {
        self.watermark
    }

    fn convex_regions(&self, category: ContentCategory) -> Vec<ConvexPolygon> {
        self.regions.get(&category).cloned().unwrap_or_default()
    }

    fn tracked_object_polygons(&self) -> Vec<ConvexPolygon> {
        self.objects.clone()
    }
}

/// Context with a single goal
pub fn context_to(start: ContinuousState, goal: ContinuousState) -> PlannerContext {
    PlannerContext {
        start,
        goals: vec![(0, goal)],
        force_replan_from_scratch: false,
    }
}

/// Plan of `n` forward moves from the origin facing +x
pub fn straight_plan(n: usize) -> DiscretePlan {
    let mut plan = DiscretePlan::new(DiscreteState::new(0, 0, 0));
    for _ in 0..n {
        plan.push(FORWARD, 0.0);
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_search() {
        let mut engine = GridEngine::new();
        let context = context_to(
            ContinuousState::origin(),
            ContinuousState::new(100.0, 0.0, 0.0),
        );
        assert!(engine.replan(&context, 10_000, &CancelToken::new()));
        assert_eq!(engine.plan().actions, vec![FORWARD; 10]);
        assert_eq!(
            engine.plan_final_state(engine.plan()),
            DiscreteState::new(10, 0, 0)
        );
    }

    #[test]
    fn test_cancelled_search_fails() {
        let mut engine = GridEngine::new();
        let context = context_to(
            ContinuousState::origin(),
            ContinuousState::new(100.0, 0.0, 0.0),
        );
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(!engine.replan(&context, 10_000, &cancel));
    }

    #[test]
    fn test_plan_is_safe_truncates_at_collision() {
        let mut engine = GridEngine::new();
        engine.add_raw_obstacle(
            ConvexPolygon::rectangle(Point2D::new(55.0, -5.0), Point2D::new(75.0, 5.0)),
            50.0,
        );
        let safety = engine.plan_is_safe(&straight_plan(10), 300.0, 0);
        assert!(!safety.fully_safe);
        assert_eq!(safety.safe_prefix.len(), 5);
        assert!((safety.last_safe_state.x_mm - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_plan_is_safe_limits_prefix_to_lookahead() {
        let engine = GridEngine::new();
        let safety = engine.plan_is_safe(&straight_plan(10), 25.0, 2);
        assert!(safety.fully_safe);
        assert_eq!(safety.safe_prefix.start, DiscreteState::new(2, 0, 0));
        // stops growing once more than 25 mm from the anchor
        assert_eq!(safety.safe_prefix.len(), 3);
    }

    #[test]
    fn test_closest_segment_prefers_exact_match() {
        let engine = GridEngine::new();
        let plan = straight_plan(10);
        assert_eq!(
            engine.find_closest_plan_segment(&plan, &ContinuousState::new(40.0, 0.0, 0.0)),
            (4, 0.0)
        );
        let (index, dist) =
            engine.find_closest_plan_segment(&plan, &ContinuousState::new(41.0, 12.0, 0.0));
        assert_eq!(index, 4);
        assert!((dist - (1.0f64 + 144.0).sqrt()).abs() < 1e-9);
        assert_eq!(
            engine.find_closest_plan_segment(&DiscretePlan::default(), &ContinuousState::origin()).1,
            f64::MAX
        );
    }

    #[test]
    fn test_append_to_path_merges_forward_moves() {
        let engine = GridEngine::new();
        let mut plan = straight_plan(3);
        plan.push(TURN_LEFT, 0.0);
        plan.push(TURN_LEFT, 0.0);
        plan.push(FORWARD, 0.0);

        let mut path = Path::new();
        engine.append_to_path(&plan, &mut path, 1);
        assert_eq!(path.len(), 4);
        assert_eq!(path.segments()[0].start_point(), Point2D::new(10.0, 0.0));
        assert!(path.segments()[1].is_point_turn());
        assert!(path.segments()[2].is_point_turn());
        let end = path.last().unwrap().end_pose();
        assert!((end.y_mm - 10.0).abs() < 1e-9);
    }
}
