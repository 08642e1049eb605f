use std::collections::{HashMap, HashSet, VecDeque};

use glam::{IVec3, Quat, Vec3};
use serde::Serialize;
use tracing::debug;

use crate::constants::{
    get_food_color, BFS_MAX_ITERATIONS, COLLISION_EPSILON_SQ, GLOBAL_CONE_MIN_DOT,
    PLANAR_CONE_MIN_DOT, PLANAR_TOLERANCE,
};
use crate::types::FoodCategory;
use crate::world::World;

const NEIGHBORS: [IVec3; 6] = [
    IVec3::X,
    IVec3::NEG_X,
    IVec3::Y,
    IVec3::NEG_Y,
    IVec3::Z,
    IVec3::NEG_Z,
];

/// Offsets whose alignment with local up exceeds this leave the plane.
const OFF_PLANE_DOT: f32 = 0.9;

pub const GUIDE_DASH_SIZE: f32 = 0.5;
pub const GUIDE_GAP_SIZE: f32 = 0.3;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LineStyle {
    pub color: u32,
    #[serde(rename = "dashSize")]
    pub dash_size: f32,
    #[serde(rename = "gapSize")]
    pub gap_size: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GuidePath {
    pub category: FoodCategory,
    pub target: IVec3,
    /// Head first, target last.
    pub waypoints: Vec<IVec3>,
}

impl GuidePath {
    pub fn style(&self) -> LineStyle {
        LineStyle {
            color: get_food_color(self.category),
            dash_size: GUIDE_DASH_SIZE,
            gap_size: GUIDE_GAP_SIZE,
        }
    }

    /// First cell to move into, if the path is longer than the head alone.
    pub fn next_cell(&self) -> Option<IVec3> {
        self.waypoints.get(1).copied()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Target {
    pub position: IVec3,
    pub category: FoodCategory,
}

#[derive(Clone, Copy, Debug)]
pub struct Pathfinder {
    max_iterations: usize,
}

impl Default for Pathfinder {
    fn default() -> Self {
        Self {
            max_iterations: BFS_MAX_ITERATIONS,
        }
    }
}

impl Pathfinder {
    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Self { max_iterations }
    }

    /// Guidance paths from `head` to the foods in view. Targets whose search
    /// fails are left out.
    pub fn find_guides<'a, I>(
        &self,
        world: &World,
        head: IVec3,
        obstacles: I,
        orientation: Quat,
        planar: bool,
    ) -> Vec<GuidePath>
    where
        I: IntoIterator<Item = &'a IVec3>,
    {
        let forward = orientation * Vec3::NEG_Z;
        let up = planar.then(|| orientation * Vec3::Y);
        let blocked: HashSet<IVec3> = obstacles.into_iter().copied().collect();

        select_targets(world, head, forward, up)
            .into_iter()
            .filter_map(|target| {
                let waypoints = self.find_path(world, head, target.position, &blocked, forward, up)?;
                Some(GuidePath {
                    category: target.category,
                    target: target.position,
                    waypoints,
                })
            })
            .collect()
    }

    /// Breadth-first search over 6-connected cells. Expansion stays inside the
    /// `forward` cone measured from `start`, and inside the start plane when
    /// `up` is given.
    pub fn find_path(
        &self,
        world: &World,
        start: IVec3,
        end: IVec3,
        blocked: &HashSet<IVec3>,
        forward: Vec3,
        up: Option<Vec3>,
    ) -> Option<Vec<IVec3>> {
        let mut queue = VecDeque::from([start]);
        let mut parent: HashMap<IVec3, IVec3> = HashMap::new();
        let mut visited = HashSet::from([start]);
        let mut iterations = 0usize;

        while let Some(cell) = queue.pop_front() {
            iterations += 1;
            if iterations > self.max_iterations {
                debug!(?start, ?end, iterations, "guide search hit iteration cap");
                return None;
            }
            if cell.as_vec3().distance_squared(end.as_vec3()) < COLLISION_EPSILON_SQ {
                return Some(rebuild_path(&parent, start, cell));
            }

            for dir in NEIGHBORS {
                if let Some(up) = up {
                    if dir.as_vec3().dot(up).abs() > OFF_PLANE_DOT {
                        continue;
                    }
                }
                let next = cell + dir;
                let from_start = (next - start).as_vec3();
                if let Some(up) = up {
                    if from_start.dot(up).abs() > PLANAR_TOLERANCE {
                        continue;
                    }
                }
                let to_node = from_start.normalize_or_zero();
                if to_node != Vec3::ZERO && to_node.dot(forward) < PLANAR_CONE_MIN_DOT {
                    continue;
                }
                if visited.contains(&next) || world.is_out_of_bounds(next) || blocked.contains(&next) {
                    continue;
                }
                visited.insert(next);
                parent.insert(next, cell);
                queue.push_back(next);
            }
        }
        None
    }
}

/// With `up`, every food near the local plane and inside a wide cone.
/// Without it, the nearest food of each category inside a narrow cone.
pub fn select_targets(world: &World, head: IVec3, forward: Vec3, up: Option<Vec3>) -> Vec<Target> {
    let origin = head.as_vec3();

    if let Some(up) = up {
        return world
            .foods()
            .filter(|(_, food)| {
                let diff = food.position.as_vec3() - origin;
                diff.dot(up).abs() <= PLANAR_TOLERANCE
                    && diff.normalize_or_zero().dot(forward) >= PLANAR_CONE_MIN_DOT
            })
            .map(|(_, food)| Target {
                position: food.position,
                category: food.category,
            })
            .collect();
    }

    let mut nearest: [Option<(f32, IVec3)>; 3] = [None; 3];
    for (_, food) in world.foods() {
        let diff = food.position.as_vec3() - origin;
        if diff.normalize_or_zero().dot(forward) < GLOBAL_CONE_MIN_DOT {
            continue;
        }
        let dist = diff.length_squared();
        let slot = &mut nearest[category_slot(food.category)];
        if slot.map_or(true, |(best, _)| dist < best) {
            *slot = Some((dist, food.position));
        }
    }

    FoodCategory::ALL
        .iter()
        .filter_map(|&category| {
            nearest[category_slot(category)].map(|(_, position)| Target { position, category })
        })
        .collect()
}

fn category_slot(category: FoodCategory) -> usize {
    match category {
        FoodCategory::Blue => 0,
        FoodCategory::Green => 1,
        FoodCategory::Pink => 2,
    }
}

fn rebuild_path(parent: &HashMap<IVec3, IVec3>, start: IVec3, end: IVec3) -> Vec<IVec3> {
    let mut path = vec![end];
    let mut cell = end;
    while cell != start {
        match parent.get(&cell) {
            Some(&prev) => {
                path.push(prev);
                cell = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}
