use crate::types::FoodCategory;

pub const WORLD_SIZE: i32 = 50;
pub const FOOD_COUNT: usize = 200;
pub const PLACEMENT_ATTEMPTS: u32 = 1_000;

pub const INITIAL_LENGTH: usize = 3;
pub const DEFAULT_SPM: f32 = 300.0;
pub const MIN_SPM: f32 = 60.0;

pub const MAX_FRAME_DELTA: f32 = 0.1;

pub const SPAWN_OFFSET: i32 = 5;

pub const COLLISION_EPSILON_SQ: f32 = 0.1;
pub const REPLAY_MATCH_EPSILON_SQ: f32 = 0.5;

pub const BFS_MAX_ITERATIONS: usize = 2_000;
pub const GLOBAL_CONE_MIN_DOT: f32 = 0.1;
pub const PLANAR_CONE_MIN_DOT: f32 = -0.5;
pub const PLANAR_TOLERANCE: f32 = 0.5;

pub const HUM_POOL_SIZE: usize = 16;
pub const LOW_PASS_OPEN_HZ: f32 = 22_050.0;
pub const LOW_PASS_MUFFLED_HZ: f32 = 500.0;
pub const LOW_PASS_RAMP_SECS: f32 = 0.5;

pub const MAX_PARTICLES: usize = 200;
pub const EXPLOSION_TEMPLATES: usize = 50;

pub const GAME_OVER_SHAKE: f32 = 0.6;
pub const GAME_OVER_PARTICLES: usize = 60;
pub const PICKUP_PARTICLES: usize = 12;

pub const FOOD_COLOR_GREEN: u32 = 0x5aff68;
pub const FOOD_COLOR_BLUE: u32 = 0x00b7ff;
pub const FOOD_COLOR_PINK: u32 = 0xf85bfd;

pub const PHANTOM_COLORS: [u32; 4] = [0x88ffff, 0xff88ff, 0xffff88, 0x88ff88];

/// Roll in `[0, 1)` to category: 50% blue, 40% green, 10% pink.
pub fn get_food_category(roll: f64) -> FoodCategory {
    if roll < 0.50 {
        return FoodCategory::Blue;
    }
    if roll < 0.90 {
        return FoodCategory::Green;
    }
    FoodCategory::Pink
}

/// Steps-per-minute change applied to whoever eats a food of this category.
pub fn get_food_speed_delta(category: FoodCategory) -> f32 {
    match category {
        FoodCategory::Blue => 10.0,
        FoodCategory::Green => -5.0,
        FoodCategory::Pink => 30.0,
    }
}

pub fn get_food_score(category: FoodCategory) -> u32 {
    match category {
        FoodCategory::Blue => 10,
        FoodCategory::Green => 5,
        FoodCategory::Pink => 50,
    }
}

pub fn get_food_color(category: FoodCategory) -> u32 {
    match category {
        FoodCategory::Blue => FOOD_COLOR_BLUE,
        FoodCategory::Green => FOOD_COLOR_GREEN,
        FoodCategory::Pink => FOOD_COLOR_PINK,
    }
}

/// Hum buffer slot (1..=3) the audio provider exposes for this category.
pub fn get_hum_index(category: FoodCategory) -> u8 {
    match category {
        FoodCategory::Pink => 1,
        FoodCategory::Blue => 2,
        FoodCategory::Green => 3,
    }
}

pub fn get_move_interval(spm: f32) -> f32 {
    60.0 / spm.max(MIN_SPM)
}
