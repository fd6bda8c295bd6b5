//! Enemy actors
//!
//! All small enemies share one [`Alien`] struct tagged by [`AlienKind`]; each
//! kind keeps its own registry collection so collision priority can tell them apart.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::actor::{
    ActorId, ActorRef, Category, Damageable, Shooter, Side, impl_identified, impl_movable,
};
use super::entities::Shot;
use super::terrain::Terrain;
use crate::consts::*;
use crate::{wrap_x, wrapped_dx};

pub const ZAP_RADIUS: f32 = 200.0;
pub const ZAP_COOLDOWN: u32 = 600;
pub const ZAP_DURATION: u32 = 360;
pub const DESTROYER_HOVER: f32 = 100.0;
pub const NEST_SIZE: f32 = 60.0;
pub const NEST_HEALTH: f32 = 5.0;
pub const NEST_RANGE: f32 = 500.0;
pub const NEST_SPAWN_TICKS: u32 = 900;
/// Full size of a plant seeded by the queen
pub const PLANT_SIZE: f32 = 100.0;
pub const PLANT_HEALTH: f32 = 100.0;
pub const PLANT_POINTS: u64 = 50;
const PLANT_SEED_SIZE: f32 = 5.0;
/// Per-tick chance a growing plant starts to wither
const PLANT_WITHER_CHANCE: f64 = 0.0005;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlienKind {
    /// Basic wandering shooter
    Drone,
    /// Chases and circles the ship
    Hunter,
    /// Dives in to zap the ship, then flees
    Zapper,
    /// Hovers over player structures and bombs them
    Destroyer,
}

impl AlienKind {
    pub fn category(self) -> Category {
        match self {
            AlienKind::Drone => Category::Alien,
            AlienKind::Hunter => Category::Hunter,
            AlienKind::Zapper => Category::Zapper,
            AlienKind::Destroyer => Category::Destroyer,
        }
    }

    pub fn from_category(category: Category) -> Option<Self> {
        match category {
            Category::Alien => Some(AlienKind::Drone),
            Category::Hunter => Some(AlienKind::Hunter),
            Category::Zapper => Some(AlienKind::Zapper),
            Category::Destroyer => Some(AlienKind::Destroyer),
            _ => None,
        }
    }

    /// Score for destroying one
    pub fn points(self) -> u64 {
        match self {
            AlienKind::Drone => 100,
            AlienKind::Hunter => 250,
            AlienKind::Zapper => 300,
            AlienKind::Destroyer => 400,
        }
    }
}

/// What an alien wants to do this tick beyond moving
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AlienIntent {
    pub shot: Option<Shot>,
    /// Zapper discharge hitting the ship
    pub zap: bool,
}

/// Shared world facts for enemy AI
#[derive(Debug, Clone, Copy)]
pub struct AlienEnv<'a> {
    pub terrain: &'a Terrain,
    pub world_width: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alien {
    pub id: ActorId,
    pub kind: AlienKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: f32,
    pub health: f32,
    pub max_health: f32,
    pub speed: f32,
    pub range: f32,
    pub cooldown: u32,
    /// Wander heading, circling angle or hover phase depending on kind
    pub heading: f32,
    pub zap_cooldown: u32,
    /// Structure a destroyer is working on. May go stale.
    pub target: Option<ActorRef>,
}

impl Alien {
    pub fn new(id: ActorId, kind: AlienKind, pos: Vec2, level: u32, rng: &mut impl Rng) -> Self {
        let (size, health, speed, range) = match kind {
            AlienKind::Drone => (30.0, 2.0, rng.random_range(1.5..2.5), 300.0),
            AlienKind::Hunter => (44.0, 10.0 + 2.0 * level as f32, 3.0, 300.0),
            AlienKind::Zapper => (25.0, 10.0, 2.0, 100.0),
            AlienKind::Destroyer => (30.0, 10.0, 2.0, 200.0),
        };
        Self {
            id,
            kind,
            pos,
            vel: Vec2::ZERO,
            size,
            health,
            max_health: health,
            speed,
            range,
            cooldown: rng.random_range(30..120),
            heading: rng.random_range(0.0..std::f32::consts::TAU),
            zap_cooldown: 0,
            target: None,
        }
    }

    pub fn category(&self) -> Category {
        self.kind.category()
    }

    /// Move and decide on actions. `aim` is the point this alien cares about:
    /// the ship for most kinds, the target structure for destroyers.
    pub fn update(&mut self, aim: Option<Vec2>, env: &AlienEnv, rng: &mut impl Rng) -> AlienIntent {
        let mut intent = AlienIntent::default();
        self.tick_cooldown();
        let to_aim = aim.map(|a| Vec2::new(wrapped_dx(self.pos.x, a.x, env.world_width), a.y - self.pos.y));

        match self.kind {
            AlienKind::Drone => self.drone_move(to_aim, rng),
            AlienKind::Hunter => self.hunter_move(to_aim),
            AlienKind::Zapper => {
                if let Some(delta) = to_aim {
                    if self.zap_cooldown > 0 {
                        self.zap_cooldown -= 1;
                        self.vel = -delta.normalize_or_zero() * 3.0;
                    } else {
                        self.vel = (self.vel + delta.normalize_or_zero() * 0.5).clamp_length_max(self.speed);
                        if delta.length() < ZAP_RADIUS {
                            self.zap_cooldown = ZAP_COOLDOWN;
                            intent.zap = true;
                        }
                    }
                } else {
                    self.zap_cooldown = self.zap_cooldown.saturating_sub(1);
                    self.vel *= 0.98;
                }
            }
            AlienKind::Destroyer => self.destroyer_move(to_aim),
        }

        if self.kind != AlienKind::Destroyer || to_aim.is_none() {
            self.pos += self.vel;
        }
        self.pos.x = wrap_x(self.pos.x, env.world_width);
        let ground = env.terrain.surface_y(self.pos.x) - self.size / 2.0;
        self.pos.y = self.pos.y.clamp(0.0, ground.max(0.0));

        if let Some(delta) = to_aim {
            let above_ground = self.pos.y < ground;
            if self.ready() && above_ground && delta.length() < self.range {
                intent.shot = Some(Shot::aimed(
                    self.pos,
                    self.pos + delta,
                    ENEMY_BULLET_SPEED,
                    Side::Enemy,
                ));
                self.cooldown = match self.kind {
                    AlienKind::Drone => rng.random_range(60..180),
                    AlienKind::Hunter => 60,
                    AlienKind::Zapper => 90,
                    AlienKind::Destroyer => 90,
                };
            }
        }
        intent
    }

    fn drone_move(&mut self, to_aim: Option<Vec2>, rng: &mut impl Rng) {
        let attack = to_aim.filter(|d| d.length() < 400.0);
        let desired = match attack {
            Some(delta) => {
                let dist = delta.length();
                let dir = delta.normalize_or_zero();
                let factor = 0.5 * self.speed;
                if dist > 230.0 {
                    dir * factor
                } else if dist < 130.0 {
                    -dir * factor
                } else {
                    dir.perp() * factor
                }
            }
            None => {
                if rng.random_bool(0.01) {
                    self.heading += rng.random_range(-1.0..1.0);
                }
                Vec2::from_angle(self.heading) * 0.5 * self.speed
            }
        };
        self.vel = (self.vel * 0.98 + desired * 0.1).clamp_length_max(self.speed);
    }

    fn hunter_move(&mut self, to_aim: Option<Vec2>) {
        let Some(delta) = to_aim else {
            self.vel *= 0.98;
            return;
        };
        const CIRCLE_RADIUS: f32 = 300.0;
        if delta.length() > CIRCLE_RADIUS * 1.2 {
            self.vel = (self.vel + delta.normalize_or_zero() * 0.7).clamp_length_max(self.speed);
        } else {
            self.heading += 0.03;
            let orbit = delta + Vec2::from_angle(self.heading) * CIRCLE_RADIUS;
            self.vel = (self.vel + orbit.normalize_or_zero() * 0.7).clamp_length_max(self.speed * 0.8);
        }
    }

    fn destroyer_move(&mut self, to_aim: Option<Vec2>) {
        let Some(delta) = to_aim else {
            self.vel *= 0.98;
            return;
        };
        // Hover above the structure, not on it
        let hover = delta - Vec2::new(0.0, DESTROYER_HOVER);
        if hover.length() > 50.0 {
            self.vel = (self.vel + hover.normalize_or_zero() * 0.1).clamp_length_max(self.speed);
            self.pos += self.vel;
        } else {
            self.vel = Vec2::ZERO;
            self.heading += 0.05;
            let anchor = self.pos + hover;
            self.pos = Vec2::new(anchor.x + self.heading.sin() * 50.0, anchor.y);
        }
    }
}

/// Ground hive that shoots at the ship and breeds drones
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nest {
    pub id: ActorId,
    pub pos: Vec2,
    pub size: f32,
    pub health: f32,
    pub cooldown: u32,
    pub spawn_timer: u32,
}

/// What a nest wants to do this tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NestIntent {
    pub shot: Option<Shot>,
    pub spawn: bool,
}

impl Nest {
    pub fn new(id: ActorId, x: f32, terrain: &Terrain) -> Self {
        let mut nest = Self {
            id,
            pos: Vec2::new(x, 0.0),
            size: NEST_SIZE,
            health: NEST_HEALTH,
            cooldown: 0,
            spawn_timer: NEST_SPAWN_TICKS,
        };
        nest.settle(terrain);
        nest
    }

    pub fn settle(&mut self, terrain: &Terrain) {
        self.pos.y = terrain.surface_y(self.pos.x) - self.size / 2.0;
    }

    pub fn update(&mut self, ship: Option<Vec2>, world_width: f32) -> NestIntent {
        let mut intent = NestIntent::default();
        self.tick_cooldown();

        self.spawn_timer = self.spawn_timer.saturating_sub(1);
        if self.spawn_timer == 0 {
            self.spawn_timer = NEST_SPAWN_TICKS;
            intent.spawn = true;
        }

        if let Some(ship) = ship {
            let delta = Vec2::new(wrapped_dx(self.pos.x, ship.x, world_width), ship.y - self.pos.y);
            if self.ready() && delta.length() < NEST_RANGE {
                self.cooldown = 60;
                intent.shot = Some(Shot::aimed(self.pos, self.pos + delta, 6.0, Side::Enemy));
            }
        }
        intent
    }
}

/// Alien growth on the surface. Withers slowly once grown or sickly; a plant
/// that reaches full size roots into a new nest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plant {
    pub id: ActorId,
    pub pos: Vec2,
    /// Current size, growing toward `max_size`
    pub size: f32,
    pub max_size: f32,
    pub health: f32,
    pub growth_rate: f32,
    pub decay_rate: f32,
    pub withering: bool,
}

impl Plant {
    pub fn new(id: ActorId, x: f32, max_size: f32, terrain: &Terrain, rng: &mut impl Rng) -> Self {
        let mut plant = Self {
            id,
            pos: Vec2::new(x, 0.0),
            size: PLANT_SEED_SIZE.min(max_size),
            max_size,
            health: PLANT_HEALTH,
            growth_rate: rng.random_range(0.008..0.02),
            decay_rate: rng.random_range(0.01..0.03),
            withering: false,
        };
        plant.settle(terrain);
        plant
    }

    pub fn settle(&mut self, terrain: &Terrain) {
        self.pos.y = terrain.surface_y(self.pos.x) - self.size / 2.0;
    }

    pub fn is_grown(&self) -> bool {
        self.size >= self.max_size
    }

    /// Grow for one tick. Returns true on the tick the plant reaches full size.
    pub fn update(&mut self, terrain: &Terrain, rng: &mut impl Rng) -> bool {
        let mut rooted = false;
        if !self.withering && !self.is_grown() {
            self.size = (self.size + self.growth_rate).min(self.max_size);
            if rng.random_bool(PLANT_WITHER_CHANCE) {
                self.withering = true;
            }
            rooted = self.is_grown();
        }

        // Ease onto the surface as it grows or the ground shifts
        let rest = terrain.surface_y(self.pos.x) - self.size / 2.0;
        self.pos.y += (rest - self.pos.y) * 0.1;

        if self.withering || self.is_grown() {
            self.health -= self.decay_rate;
        }
        rooted
    }
}

impl_movable!(Alien);
impl_identified!(Alien, Nest, Plant);

impl Damageable for Plant {
    fn health(&self) -> f32 {
        self.health
    }
    fn set_health(&mut self, health: f32) {
        self.health = health;
    }
    fn size(&self) -> f32 {
        self.size
    }
    fn center(&self) -> Vec2 {
        self.pos
    }
}

impl Damageable for Alien {
    fn health(&self) -> f32 {
        self.health
    }
    fn set_health(&mut self, health: f32) {
        self.health = health;
    }
    fn size(&self) -> f32 {
        self.size
    }
    fn center(&self) -> Vec2 {
        self.pos
    }
}

impl Damageable for Nest {
    fn health(&self) -> f32 {
        self.health
    }
    fn set_health(&mut self, health: f32) {
        self.health = health;
    }
    fn size(&self) -> f32 {
        self.size
    }
    fn center(&self) -> Vec2 {
        self.pos
    }
}

impl Shooter for Alien {
    fn cooldown(&self) -> u32 {
        self.cooldown
    }
    fn set_cooldown(&mut self, ticks: u32) {
        self.cooldown = ticks;
    }
}

impl Shooter for Nest {
    fn cooldown(&self) -> u32 {
        self.cooldown
    }
    fn set_cooldown(&mut self, ticks: u32) {
        self.cooldown = ticks;
    }
}
