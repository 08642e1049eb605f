pub mod audio;
pub mod camera;
pub mod constants;
pub mod engine;
pub mod entity;
pub mod frame_loop;
pub mod input;
pub mod particles;
pub mod pathfinder;
pub mod pool;
pub mod replay;
pub mod replay_store;
pub mod rng;
pub mod settings;
pub mod spawn;
pub mod types;
pub mod world;
