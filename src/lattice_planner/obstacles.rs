//! Obstacle import: occupancy map regions into per-heading engine obstacles

use log::{debug, info, warn};

use crate::common::{
    ContentCategory, ContinuousState, ConvexPolygon, OccupancyMap, PlannerEngine, Winding,
};
use crate::lattice_planner::shared::{DebugPolygon, PlannerCore};

/// What an import request ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The planner was busy; nothing was touched
    Skipped,
    /// Replanning check and the map did not change since the last import
    Unchanged,
    Imported {
        regions: usize,
        obstacles_added: usize,
    },
}

/// Gather every region the robot must avoid, padded and wound clockwise
fn collect_regions<M: OccupancyMap + ?Sized>(
    map: &M,
    categories: &[ContentCategory],
    use_prox_obstacles: bool,
    obstacle_padding: f64,
) -> Vec<ConvexPolygon> {
    let mut hulls: Vec<ConvexPolygon> = Vec::new();
    for &category in categories {
        if category == ContentCategory::ObstacleProx && !use_prox_obstacles {
            continue;
        }
        hulls.extend(map.convex_regions(category));
    }
    if use_prox_obstacles && !categories.contains(&ContentCategory::ObstacleProx) {
        hulls.extend(map.convex_regions(ContentCategory::ObstacleProx));
    }
    hulls.extend(map.tracked_object_polygons());

    hulls
        .into_iter()
        .filter_map(|mut hull| {
            if hull.is_degenerate() {
                warn!(
                    "Ignoring degenerate obstacle region with {} vertices",
                    hull.len()
                );
                return None;
            }
            hull.radial_expand(obstacle_padding);
            // c-space expansion against the robot polygon expects clockwise hulls
            hull.set_winding(Winding::Clockwise);
            Some(hull)
        })
        .collect()
}

/// Rebuild the engine's obstacle set from `map` if needed.
///
/// With `is_replanning` the paddings shrink and the import only happens when
/// the map changed since the previous one.
pub fn import_obstacles<E: PlannerEngine, M: OccupancyMap + ?Sized>(
    core: &mut PlannerCore<E>,
    map: &M,
    robot_pose: &ContinuousState,
    is_replanning: bool,
    debug_color: Option<&'static str>,
) -> ImportOutcome {
    let (obstacle_padding, robot_padding) = core.config.paddings(is_replanning);

    let last_changed = map.last_changed();
    let map_changed = core
        .last_import_watermark
        .map_or(true, |seen| seen < last_changed);

    if is_replanning && !map_changed {
        debug!(
            "No obstacle update needed (robot padding {:.1}, obstacle padding {:.1})",
            robot_padding, obstacle_padding
        );
        return ImportOutcome::Unchanged;
    }
    core.last_import_watermark = Some(last_changed);

    let hulls = collect_regions(
        map,
        &core.config.obstacle_categories,
        core.config.use_prox_obstacles,
        obstacle_padding,
    );

    if debug_color.is_some() {
        core.debug_obstacles.clear();
    }
    core.engine.clear_obstacles();

    let robot_heading = core.engine.discretize(robot_pose).theta;
    let mut obstacles_added = 0;

    for theta in 0..core.engine.num_headings() {
        let heading = core.engine.heading_of(theta);
        let robot_poly = core
            .config
            .footprint
            .bounding_polygon(&ContinuousState::new(0.0, 0.0, heading), robot_padding)
            .scaled(core.config.robot_expansion_scaling);

        for hull in &hulls {
            core.engine.add_obstacle_with_expansion(
                hull,
                &robot_poly,
                theta,
                core.config.obstacle_penalty,
            );
            obstacles_added += 1;

            if theta == robot_heading {
                if let Some(color) = debug_color {
                    core.debug_obstacles.push(DebugPolygon {
                        polygon: hull.clone(),
                        color,
                    });
                }
            }
        }
    }

    info!(
        "Imported {} obstacle regions over {} headings (replanning: {}, map watermark {})",
        hulls.len(),
        core.engine.num_headings(),
        is_replanning,
        last_changed
    );

    ImportOutcome::Imported {
        regions: hulls.len(),
        obstacles_added,
    }
}
