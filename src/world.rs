use std::collections::HashSet;

use glam::IVec3;
use tracing::warn;

use crate::constants::{
    get_food_category, COLLISION_EPSILON_SQ, FOOD_COUNT, PLACEMENT_ATTEMPTS, WORLD_SIZE,
};
use crate::rng::{RandomSource, Rng};
use crate::types::FoodCategory;

/// Where single-slot respawns draw their randomness from.
///
/// Bulk generation always restarts the seeded stream. `Unseeded` keeps
/// per-pickup respawns off that stream, so they are not reproducible from a
/// replay; `SeededStream` advances the world's stream instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotRespawnPolicy {
    #[default]
    Unseeded,
    SeededStream,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Food {
    pub position: IVec3,
    pub category: FoodCategory,
}

#[derive(Clone, Debug)]
pub struct World {
    size: i32,
    seed: u32,
    food_count: usize,
    foods: Vec<Option<Food>>,
    rng: Rng,
    slot_policy: SlotRespawnPolicy,
}

impl World {
    pub fn new(size: i32, seed: u32) -> Self {
        Self::with_food_count(size, seed, FOOD_COUNT)
    }

    pub fn with_food_count(size: i32, seed: u32, food_count: usize) -> Self {
        let mut world = Self {
            size,
            seed,
            food_count,
            foods: Vec::new(),
            rng: Rng::new(seed),
            slot_policy: SlotRespawnPolicy::default(),
        };
        world.respawn_food(std::iter::empty(), None);
        world
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn set_seed(&mut self, seed: u32) {
        self.seed = seed;
        self.respawn_food(std::iter::empty(), None);
    }

    pub fn slot_policy(&self) -> SlotRespawnPolicy {
        self.slot_policy
    }

    pub fn set_slot_policy(&mut self, policy: SlotRespawnPolicy) {
        self.slot_policy = policy;
    }

    /// Every slot, including ones temporarily left empty after a failed
    /// placement.
    pub fn food_slots(&self) -> &[Option<Food>] {
        &self.foods
    }

    pub fn foods(&self) -> impl Iterator<Item = (usize, &Food)> + '_ {
        self.foods
            .iter()
            .enumerate()
            .filter_map(|(idx, food)| food.as_ref().map(|food| (idx, food)))
    }

    pub fn food_positions(&self) -> Vec<IVec3> {
        self.foods().map(|(_, food)| food.position).collect()
    }

    pub fn food(&self, index: usize) -> Option<&Food> {
        self.foods.get(index).and_then(Option::as_ref)
    }

    pub fn is_out_of_bounds(&self, pos: IVec3) -> bool {
        pos.x < 0
            || pos.x > self.size
            || pos.y < 0
            || pos.y > self.size
            || pos.z < 0
            || pos.z > self.size
    }

    /// Head against every other segment. Bodies shorter than four cannot
    /// fold back onto themselves, so they never collide.
    pub fn check_self_collision<'a, I>(&self, segments: I) -> bool
    where
        I: IntoIterator<Item = &'a IVec3>,
    {
        let mut iter = segments.into_iter();
        let Some(head) = iter.next() else {
            return false;
        };
        let mut rest = 0usize;
        let mut hit = false;
        for segment in iter {
            rest += 1;
            if cell_distance_sq(*head, *segment) < COLLISION_EPSILON_SQ {
                hit = true;
            }
        }
        rest >= 3 && hit
    }

    pub fn check_food_collision(&self, head: IVec3) -> Option<usize> {
        self.foods()
            .find(|(_, food)| cell_distance_sq(head, food.position) < COLLISION_EPSILON_SQ)
            .map(|(idx, _)| idx)
    }

    /// `None` rebuilds the whole food set from a fresh seeded stream. `Some(i)`
    /// replaces one slot, drawing from the source picked by the slot policy.
    pub fn respawn_food<I>(&mut self, occupied: I, index: Option<usize>)
    where
        I: IntoIterator<Item = IVec3>,
    {
        let mut taken: HashSet<IVec3> = occupied.into_iter().collect();

        let Some(index) = index else {
            self.rng = Rng::new(self.seed);
            self.foods = vec![None; self.food_count];
            for idx in 0..self.food_count {
                self.foods[idx] = place_food(self.size, &taken, idx, &mut self.rng);
                if let Some(food) = self.foods[idx] {
                    taken.insert(food.position);
                }
            }
            return;
        };

        if index >= self.foods.len() {
            return;
        }
        for (idx, food) in self.foods.iter().enumerate() {
            if idx == index {
                continue;
            }
            if let Some(food) = food {
                taken.insert(food.position);
            }
        }
        self.foods[index] = match self.slot_policy {
            SlotRespawnPolicy::Unseeded => place_food(self.size, &taken, index, &mut rand::rng()),
            SlotRespawnPolicy::SeededStream => place_food(self.size, &taken, index, &mut self.rng),
        };
    }
}

fn place_food<R: RandomSource>(
    size: i32,
    taken: &HashSet<IVec3>,
    index: usize,
    rng: &mut R,
) -> Option<Food> {
    for _ in 0..PLACEMENT_ATTEMPTS {
        let position = IVec3::new(rng.cell(size), rng.cell(size), rng.cell(size));
        if taken.contains(&position) {
            continue;
        }
        let category = get_food_category(rng.next_unit());
        return Some(Food { position, category });
    }
    warn!(index, "could not find free spot for food");
    None
}

pub fn cell_distance_sq(a: IVec3, b: IVec3) -> f32 {
    a.as_vec3().distance_squared(b.as_vec3())
}

impl Default for World {
    fn default() -> Self {
        Self::new(WORLD_SIZE, 0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use glam::IVec3;

    use super::{SlotRespawnPolicy, World};
    use crate::rng::Rng;
    use crate::types::FoodCategory;

    fn random_snake(rng: &mut Rng, size: i32, len: usize) -> Vec<IVec3> {
        let axes = [
            IVec3::X,
            IVec3::NEG_X,
            IVec3::Y,
            IVec3::NEG_Y,
            IVec3::Z,
            IVec3::NEG_Z,
        ];
        let mut cell = IVec3::new(rng.int(0, size), rng.int(0, size), rng.int(0, size));
        let mut out = vec![cell];
        while out.len() < len {
            let next = (cell + axes[rng.pick_index(axes.len())]).clamp(IVec3::ZERO, IVec3::splat(size));
            cell = next;
            out.push(cell);
        }
        out
    }

    #[test]
    fn bulk_respawn_is_deterministic_for_a_seed() {
        let mut world = World::new(50, 42);
        let first = world.food_slots().to_vec();
        world.respawn_food(std::iter::empty(), None);
        assert_eq!(world.food_slots(), first.as_slice());

        let other = World::new(50, 42);
        assert_eq!(other.food_slots(), first.as_slice());

        let different = World::new(50, 43);
        assert_ne!(different.food_slots(), first.as_slice());
    }

    #[test]
    fn set_seed_regenerates_from_new_stream() {
        let mut world = World::new(50, 1);
        world.set_seed(42);
        assert_eq!(world.seed(), 42);
        assert_eq!(world.food_slots(), World::new(50, 42).food_slots());
    }

    #[test]
    fn placement_never_overlaps_food_or_snake() {
        for seed in 0..60u32 {
            let mut shape_rng = Rng::new(seed.wrapping_mul(7_919));
            let snake = random_snake(&mut shape_rng, 12, 40);
            let mut world = World::with_food_count(12, seed, 120);
            world.respawn_food(snake.iter().copied(), None);

            let snake_cells: HashSet<IVec3> = snake.iter().copied().collect();
            let mut food_cells = HashSet::new();
            for (_, food) in world.foods() {
                assert!(
                    !snake_cells.contains(&food.position),
                    "food on snake: seed={seed} pos={:?}",
                    food.position
                );
                assert!(
                    food_cells.insert(food.position),
                    "duplicate food: seed={seed} pos={:?}",
                    food.position
                );
                assert!(!world.is_out_of_bounds(food.position));
            }

            for index in [0usize, 17, 119] {
                world.respawn_food(snake.iter().copied(), Some(index));
                let cells: Vec<IVec3> = world.food_positions();
                let unique: HashSet<IVec3> = cells.iter().copied().collect();
                assert_eq!(unique.len(), cells.len(), "seed={seed} index={index}");
                assert!(cells.iter().all(|cell| !snake_cells.contains(cell)));
            }
        }
    }

    #[test]
    fn category_mix_roughly_matches_weights() {
        let mut counts = [0usize; 3];
        for seed in 0..20u32 {
            let world = World::new(50, seed);
            for (_, food) in world.foods() {
                let slot = match food.category {
                    FoodCategory::Blue => 0,
                    FoodCategory::Green => 1,
                    FoodCategory::Pink => 2,
                };
                counts[slot] += 1;
            }
        }
        assert_eq!(counts.iter().sum::<usize>(), 4_000);
        assert!(counts[0] > counts[1]);
        assert!(counts[1] > counts[2]);
        assert!(counts[2] > 0);
    }

    #[test]
    fn slot_respawn_only_touches_its_slot() {
        let mut world = World::new(50, 42);
        let before = world.food_slots().to_vec();
        world.respawn_food(std::iter::empty(), Some(3));
        for (idx, (a, b)) in before.iter().zip(world.food_slots()).enumerate() {
            if idx != 3 {
                assert_eq!(a, b);
            }
        }
        assert!(world.food(3).is_some());
    }

    #[test]
    fn seeded_slot_policy_reproduces_respawns() {
        let mut a = World::new(30, 5);
        let mut b = World::new(30, 5);
        a.set_slot_policy(SlotRespawnPolicy::SeededStream);
        b.set_slot_policy(SlotRespawnPolicy::SeededStream);
        for index in [4usize, 9, 4, 100] {
            a.respawn_food(std::iter::empty(), Some(index));
            b.respawn_food(std::iter::empty(), Some(index));
        }
        assert_eq!(a.food_slots(), b.food_slots());
    }

    #[test]
    fn exhausted_placement_leaves_slot_empty() {
        // 2x2x2 cells, 12 foods requested
        let world = World::with_food_count(1, 3, 12);
        let filled = world.foods().count();
        assert_eq!(filled, 8);
        assert_eq!(world.food_slots().len(), 12);
    }

    #[test]
    fn out_of_bounds_is_inclusive_of_size() {
        let world = World::with_food_count(50, 0, 0);
        assert!(!world.is_out_of_bounds(IVec3::new(0, 0, 0)));
        assert!(!world.is_out_of_bounds(IVec3::new(50, 50, 50)));
        assert!(world.is_out_of_bounds(IVec3::new(-1, 10, 10)));
        assert!(world.is_out_of_bounds(IVec3::new(10, 51, 10)));
        assert!(world.is_out_of_bounds(IVec3::new(10, 10, 51)));
    }

    #[test]
    fn self_collision_requires_four_segments() {
        let world = World::with_food_count(50, 0, 0);
        let short = [IVec3::new(1, 1, 1), IVec3::new(1, 1, 2), IVec3::new(1, 1, 1)];
        assert!(!world.check_self_collision(short.iter()));

        let folded = [
            IVec3::new(1, 1, 1),
            IVec3::new(1, 1, 2),
            IVec3::new(2, 1, 2),
            IVec3::new(1, 1, 1),
        ];
        assert!(world.check_self_collision(folded.iter()));

        let straight = [
            IVec3::new(1, 1, 1),
            IVec3::new(1, 1, 2),
            IVec3::new(1, 1, 3),
            IVec3::new(1, 1, 4),
        ];
        assert!(!world.check_self_collision(straight.iter()));
    }

    #[test]
    fn food_collision_returns_first_matching_slot() {
        let world = World::new(50, 42);
        let (idx, food) = world.foods().nth(5).map(|(i, f)| (i, *f)).expect("food");
        assert_eq!(world.check_food_collision(food.position), Some(idx));
        assert_eq!(world.check_food_collision(IVec3::new(-5, -5, -5)), None);
    }
}
