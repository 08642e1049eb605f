use std::f32::consts::PI;

use glam::{Quat, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng as _, SeedableRng};
use serde::Serialize;

use crate::constants::{EXPLOSION_TEMPLATES, MAX_PARTICLES};
use crate::pool::SlotPool;

const STOP_DECELERATION: f32 = 2.0;
const CLEARED_TIME_SCALE: f32 = 2.0;

#[derive(Clone, Copy, Debug)]
struct Particle {
    position: Vec3,
    velocity: Vec3,
    life: f32,
    max_life: f32,
    rotation: Vec3,
    spin: Vec3,
    color: u32,
}

/// One live particle as the renderer draws it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ParticleInstance {
    pub position: Vec3,
    /// Euler angles, radians.
    pub rotation: Vec3,
    pub scale: f32,
    pub color: u32,
}

pub struct ParticleSystem {
    particles: SlotPool<Particle>,
    templates: Vec<Vec3>,
    time_scale: f32,
    stopping: bool,
    rng: SmallRng,
}

impl Default for ParticleSystem {
    fn default() -> Self {
        Self::new(MAX_PARTICLES)
    }
}

impl ParticleSystem {
    pub fn new(max_particles: usize) -> Self {
        Self::with_rng(max_particles, SmallRng::from_rng(&mut rand::rng()))
    }

    pub fn with_rng(max_particles: usize, mut rng: SmallRng) -> Self {
        // Burst velocities fan out along local -Z.
        let templates = (0..EXPLOSION_TEMPLATES)
            .map(|_| {
                let spread = Vec3::new(
                    rng.random::<f32>() - 0.5,
                    rng.random::<f32>() - 0.5,
                    -(rng.random::<f32>() * 0.4 + 0.2),
                );
                spread.normalize() * (4.0 + rng.random::<f32>() * 10.0)
            })
            .collect();
        Self {
            particles: SlotPool::new(max_particles),
            templates,
            time_scale: CLEARED_TIME_SCALE,
            stopping: false,
            rng,
        }
    }

    /// Spawns up to `count` particles at `center`, burst rotated by
    /// `orientation`. Returns how many fit in the pool.
    pub fn emit(&mut self, center: Vec3, orientation: Quat, count: usize, color: u32) -> usize {
        let mut template = self.rng.random_range(0..self.templates.len().max(1));
        let mut spawned = 0;
        while spawned < count {
            let velocity = self
                .templates
                .get(template % self.templates.len().max(1))
                .map_or(Vec3::ZERO, |v| orientation * *v);
            template += 1;
            let particle = Particle {
                position: center,
                velocity,
                life: 1.0,
                max_life: 0.2 + self.rng.random::<f32>() * 0.6 + 0.2,
                rotation: Vec3::new(
                    self.rng.random::<f32>() * PI,
                    self.rng.random::<f32>() * PI,
                    self.rng.random::<f32>() * PI,
                ),
                spin: Vec3::new(
                    (self.rng.random::<f32>() - 0.5) * 10.0,
                    (self.rng.random::<f32>() - 0.5) * 10.0,
                    (self.rng.random::<f32>() - 0.5) * 10.0,
                ),
                color,
            };
            if self.particles.claim(particle).is_none() {
                break;
            }
            spawned += 1;
        }
        spawned
    }

    /// Freezes the scene gradually: the time scale falls to zero.
    pub fn stop_time(&mut self) {
        self.stopping = true;
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn update(&mut self, delta: f32) {
        if self.stopping {
            self.time_scale = (self.time_scale - delta * STOP_DECELERATION).max(0.0);
        } else {
            self.time_scale = 1.0;
        }
        let dt = delta * self.time_scale;

        for (_, particle) in self.particles.iter_mut() {
            particle.position += particle.velocity * dt;
            particle.rotation += particle.spin * dt;
            particle.life -= dt / particle.max_life;
        }
        self.particles.retain(|particle| particle.life > 0.0);
    }

    pub fn active_count(&self) -> usize {
        self.particles.active_count()
    }

    pub fn instances(&self) -> Vec<ParticleInstance> {
        self.particles
            .iter()
            .map(|(_, particle)| ParticleInstance {
                position: particle.position,
                rotation: particle.rotation,
                scale: particle.life,
                color: particle.color,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.stopping = false;
        self.time_scale = CLEARED_TIME_SCALE;
        self.particles.clear();
    }
}
