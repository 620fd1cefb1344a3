//! Animated scene dressing. Each decoration is registered with an explicit
//! tag and lands in a per-behavior collection that one routine advances.
//! Nothing here feeds back into popups or audio.

use std::f32::consts::{PI, TAU};

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::config::RoomConfig;

const FIRE_PARTICLES_PER_FIRE: usize = 20;
const RATS: usize = 5;
const BIRDS: usize = 5;
const BEES: usize = 8;
const RABBITS: usize = 4;
const RAINDROPS: usize = 1000;
const RAIN_INTERVAL: f32 = 0.1;
const RAIN_SPEED: f32 = 20.0;
const RAIN_FLOOR: f32 = 80.0;
const RAIN_CEILING: f32 = 120.0;
const BIRD_ORBIT_X: f32 = 10.0;

/// Per-frame amounts below were tuned at 60 frames per second.
const FRAME_RATE: f32 = 60.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FireParticle {
    pub fire: u8,
    pub origin: Vec3,
    pub offset: Vec3,
    pub velocity: Vec3,
    pub life: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rat {
    pub position: Vec3,
    pub speed: f32,
    pub direction: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bird {
    pub position: Vec3,
    pub speed: f32,
    pub radius: f32,
    pub angle: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bee {
    pub position: Vec3,
    pub pattern: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rabbit {
    pub position: Vec3,
    pub hop_timer: f32,
    pub direction: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TvStatic {
    pub position: Vec3,
    pub noise_seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Raindrop {
    pub position: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decoration {
    FireParticle(FireParticle),
    Rat(Rat),
    Bird(Bird),
    Bee(Bee),
    Rabbit(Rabbit),
    TvStatic(TvStatic),
    Raindrop(Raindrop),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecorationCounts {
    pub fire_particles: usize,
    pub rats: usize,
    pub birds: usize,
    pub bees: usize,
    pub rabbits: usize,
    pub tv_screens: usize,
    pub raindrops: usize,
}

pub struct DecorationRegistry {
    pub fires: Vec<FireParticle>,
    pub rats: Vec<Rat>,
    pub birds: Vec<Bird>,
    pub bees: Vec<Bee>,
    pub rabbits: Vec<Rabbit>,
    pub tv: Vec<TvStatic>,
    pub rain: Vec<Raindrop>,
    half_width: f32,
    half_depth: f32,
    rain_elapsed: f32,
    rng: ChaCha8Rng,
}

impl DecorationRegistry {
    pub fn empty(config: &RoomConfig) -> Self {
        Self {
            fires: Vec::new(),
            rats: Vec::new(),
            birds: Vec::new(),
            bees: Vec::new(),
            rabbits: Vec::new(),
            tv: Vec::new(),
            rain: Vec::new(),
            half_width: config.room.half_width(),
            half_depth: config.room.half_depth(),
            rain_elapsed: 0.0,
            rng: ChaCha8Rng::seed_from_u64(config.seed ^ 0xdec0),
        }
    }

    /// Builds the stock set of decorations for both scenes.
    pub fn populate(config: &RoomConfig) -> Self {
        let mut registry = Self::empty(config);
        let hw = registry.half_width;
        let depth = config.room.depth;

        for (fire, emitter) in config.audio.fires.iter().enumerate() {
            let origin = Vec3::from_array(emitter.position);
            for _ in 0..FIRE_PARTICLES_PER_FIRE {
                let particle = FireParticle {
                    fire: fire as u8,
                    origin,
                    offset: Vec3::ZERO,
                    velocity: registry.ember_velocity(),
                    life: registry.rng.random::<f32>(),
                };
                registry.register(Decoration::FireParticle(particle));
            }
        }
        for _ in 0..RATS {
            let rat = Rat {
                position: Vec3::new(
                    -registry.rng.random::<f32>() * (hw - 3.0) - 3.0,
                    0.1,
                    registry.spread(depth - 4.0),
                ),
                speed: registry.rng.random::<f32>() * 0.02 + 0.01,
                direction: registry.rng.random::<f32>() * TAU,
            };
            registry.register(Decoration::Rat(rat));
        }
        for _ in 0..BIRDS {
            let bird = Bird {
                position: Vec3::new(
                    registry.rng.random::<f32>() * (hw - 3.0) + 3.0,
                    registry.rng.random::<f32>() * 3.0 + 2.0,
                    registry.spread(depth - 4.0),
                ),
                speed: registry.rng.random::<f32>() * 0.03 + 0.02,
                radius: registry.rng.random::<f32>() * 5.0 + 2.0,
                angle: registry.rng.random::<f32>() * TAU,
            };
            registry.register(Decoration::Bird(bird));
        }
        for _ in 0..BEES {
            let bee = Bee {
                position: Vec3::new(
                    registry.rng.random::<f32>() * (hw - 3.0) + 3.0,
                    registry.rng.random::<f32>() * 2.0 + 1.0,
                    registry.spread(depth - 4.0),
                ),
                pattern: registry.rng.random::<f32>(),
            };
            registry.register(Decoration::Bee(bee));
        }
        for _ in 0..RABBITS {
            let rabbit = Rabbit {
                position: Vec3::new(
                    registry.rng.random::<f32>() * (hw - 3.0) + 3.0,
                    0.15,
                    registry.spread(depth - 4.0),
                ),
                hop_timer: registry.rng.random::<f32>() * 100.0,
                direction: registry.rng.random::<f32>() * TAU,
            };
            registry.register(Decoration::Rabbit(rabbit));
        }
        registry.register(Decoration::TvStatic(TvStatic {
            position: Vec3::new(12.0, 1.5, 7.0),
            noise_seed: 0,
        }));
        let roof = config.scenes.rooftop_eye_height - 1.6;
        for _ in 0..RAINDROPS {
            let drop = Raindrop {
                position: Vec3::new(
                    registry.spread(60.0),
                    roof + registry.rng.random::<f32>() * 40.0,
                    registry.spread(60.0),
                ),
            };
            registry.register(Decoration::Raindrop(drop));
        }

        log::debug!("decorations registered: {:?}", registry.counts());
        registry
    }

    pub fn register(&mut self, decoration: Decoration) {
        match decoration {
            Decoration::FireParticle(particle) => self.fires.push(particle),
            Decoration::Rat(rat) => self.rats.push(rat),
            Decoration::Bird(bird) => self.birds.push(bird),
            Decoration::Bee(bee) => self.bees.push(bee),
            Decoration::Rabbit(rabbit) => self.rabbits.push(rabbit),
            Decoration::TvStatic(tv) => self.tv.push(tv),
            Decoration::Raindrop(drop) => self.rain.push(drop),
        }
    }

    pub fn counts(&self) -> DecorationCounts {
        DecorationCounts {
            fire_particles: self.fires.len(),
            rats: self.rats.len(),
            birds: self.birds.len(),
            bees: self.bees.len(),
            rabbits: self.rabbits.len(),
            tv_screens: self.tv.len(),
            raindrops: self.rain.len(),
        }
    }

    /// Advances every main-scene collection. `elapsed` is the scene clock in
    /// seconds, used by the bees' flight pattern.
    pub fn update_main(&mut self, elapsed: f32, dt: f32) {
        let frames = dt * FRAME_RATE;
        self.update_fires(dt, frames);
        self.update_rats(frames);
        self.update_birds(frames);
        self.update_bees(elapsed, frames);
        self.update_rabbits(frames);
        self.update_tv();
    }

    /// Advances the rooftop rain, at most once per rain interval.
    pub fn update_rooftop(&mut self, dt: f32) -> bool {
        self.rain_elapsed += dt;
        if self.rain_elapsed < RAIN_INTERVAL {
            return false;
        }
        let fall = RAIN_SPEED * self.rain_elapsed;
        self.rain_elapsed = 0.0;
        for index in 0..self.rain.len() {
            let y = self.rain[index].position.y - fall;
            if y < RAIN_FLOOR {
                let reset = RAIN_CEILING + self.rng.random::<f32>() * 20.0;
                let dx = self.spread(2.0);
                let dz = self.spread(2.0);
                let drop = &mut self.rain[index].position;
                drop.y = reset;
                drop.x += dx;
                drop.z += dz;
            } else {
                self.rain[index].position.y = y;
            }
        }
        true
    }

    fn update_fires(&mut self, dt: f32, frames: f32) {
        for index in 0..self.fires.len() {
            let particle = &mut self.fires[index];
            particle.offset += particle.velocity * frames;
            particle.life += dt;
            if particle.life > 1.0 {
                let offset = Vec3::new(self.spread(0.5), 0.0, self.spread(0.5));
                let particle = &mut self.fires[index];
                particle.offset = offset;
                particle.life = 0.0;
            }
        }
    }

    fn update_rats(&mut self, frames: f32) {
        let limit_x = self.half_width - 1.0;
        let limit_z = self.half_depth - 1.0;
        for rat in self.rats.iter_mut().filter(|rat| rat.position.x < 0.0) {
            rat.position.x += rat.direction.cos() * rat.speed * frames;
            rat.position.z += rat.direction.sin() * rat.speed * frames;
            if rat.position.x.abs() > limit_x || rat.position.z.abs() > limit_z {
                rat.direction += PI;
            }
        }
    }

    fn update_birds(&mut self, frames: f32) {
        for bird in &mut self.birds {
            bird.angle += bird.speed * frames;
            bird.position.x = BIRD_ORBIT_X + bird.angle.cos() * bird.radius;
            bird.position.z = bird.angle.sin() * bird.radius;
        }
    }

    fn update_bees(&mut self, elapsed: f32, frames: f32) {
        for bee in &mut self.bees {
            bee.position.x += (elapsed * 3.0 + bee.pattern * PI).sin() * 0.02 * frames;
            bee.position.y += (elapsed * 2.0).cos() * 0.01 * frames;
        }
    }

    fn update_rabbits(&mut self, frames: f32) {
        let limit_x = self.half_width - 1.0;
        let limit_z = self.half_depth - 1.0;
        for index in 0..self.rabbits.len() {
            let turn = (self.rng.random::<f32>() - 0.5) * PI * 0.5;
            let rabbit = &mut self.rabbits[index];
            rabbit.hop_timer += frames;
            if rabbit.hop_timer <= 120.0 {
                continue;
            }
            rabbit.position.y = 0.15 + (rabbit.hop_timer * 0.1).sin().abs() * 0.3;
            if rabbit.hop_timer > 140.0 {
                rabbit.position.x =
                    (rabbit.position.x + rabbit.direction.cos() * 0.5).clamp(1.0, limit_x);
                rabbit.position.z =
                    (rabbit.position.z + rabbit.direction.sin() * 0.5).clamp(-limit_z, limit_z);
                rabbit.hop_timer = 0.0;
                rabbit.direction += turn;
            }
        }
    }

    fn update_tv(&mut self) {
        for index in 0..self.tv.len() {
            self.tv[index].noise_seed = self.rng.random();
        }
    }

    fn ember_velocity(&mut self) -> Vec3 {
        Vec3::new(
            self.spread(0.02),
            self.rng.random::<f32>() * 0.05 + 0.02,
            self.spread(0.02),
        )
    }

    /// Uniform value in `[-span / 2, span / 2)`.
    fn spread(&mut self, span: f32) -> f32 {
        (self.rng.random::<f32>() - 0.5) * span
    }
}
