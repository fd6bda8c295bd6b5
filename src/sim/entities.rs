//! Player-side actors and transient movers

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::actor::{ActorId, Damageable, Shooter, Side, impl_identified, impl_movable};
use super::pool::Poolable;
use super::terrain::Terrain;
use crate::consts::*;
use crate::wrap_x;

/// Ship tuning
pub const SHIP_SIZE: f32 = 30.0;
pub const SHIP_ENERGY: f32 = 10_000.0;
pub const SHIP_THRUST: f32 = 0.3;
pub const SHIP_MAX_SPEED: f32 = 8.0;
pub const SHIP_DRAG: f32 = 0.99;
pub const SHIP_FIRE_COOLDOWN: u32 = 8;
pub const SHIP_BOMB_COOLDOWN: u32 = 30;
pub const SHIP_SHIELD_COOLDOWN: u32 = 120;

pub const WINGMAN_SIZE: f32 = 20.0;
pub const WINGMAN_HEALTH: f32 = 150.0;
pub const WINGMAN_RANGE: f32 = 300.0;

pub const TURRET_SIZE: f32 = 20.0;
pub const TURRET_HEALTH: f32 = 4.0;
pub const TURRET_RANGE: f32 = 200.0;
pub const TURRET_COOLDOWN: u32 = 120;
pub const TURRET_BULLET_SPEED: f32 = 6.0;

pub const BASE_WIDTH: f32 = 100.0;
pub const BASE_HEIGHT: f32 = 20.0;
pub const BASE_HEALTH: f32 = 100.0;
pub const BASE_HEAL_MS: f64 = 3000.0;

pub const BALLOON_SIZE: f32 = 30.0;
/// Interval at which each base tops up its balloons
pub const BALLOON_LAUNCH_MS: f64 = 10_000.0;
/// Damage dealt to an alien that flies into a balloon
pub const BALLOON_RAM_DAMAGE: f32 = 5.0;
const BALLOON_RISE_SPEED: f32 = 0.2;
const BALLOON_WIND_INFLUENCE: f32 = 3.0;
const BALLOON_SWAY_SPEED: f32 = 0.02;
const BALLOON_SWAY: f32 = 3.0;

pub const METEOR_BLAST_RADIUS: f32 = 40.0;
/// Glancing blow to an alien in the meteor's path
pub const METEOR_ALIEN_DAMAGE: f32 = 30.0;
/// Ticks between meteors while a shower is on
pub const METEOR_SPAWN_TICKS: u32 = 8;
const METEOR_GRAVITY: f32 = 0.05;
const METEOR_WIND_FACTOR: f32 = 0.5;

/// A shot requested by an actor this tick, turned into a pooled [`Bullet`] by the world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shot {
    pub pos: Vec2,
    pub vel: Vec2,
    pub side: Side,
}

impl Shot {
    /// Shot from `from` toward `to` at `speed`
    pub fn aimed(from: Vec2, to: Vec2, speed: f32, side: Side) -> Self {
        let dir = (to - from).normalize_or(Vec2::X);
        Self {
            pos: from,
            vel: dir * speed,
            side,
        }
    }
}

// --- Pooled movers ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bullet {
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: f32,
    pub side: Side,
    #[serde(skip)]
    pub active: bool,
}

impl Bullet {
    pub fn advance(&mut self) {
        self.pos += self.vel;
    }

    pub fn out_of_bounds(&self, width: f32, height: f32) -> bool {
        self.pos.x < 0.0 || self.pos.x > width || self.pos.y < 0.0 || self.pos.y > height
    }
}

impl Poolable for Bullet {
    type Init = Shot;

    fn create(shot: Shot) -> Self {
        Self {
            pos: shot.pos,
            vel: shot.vel,
            size: BULLET_SIZE,
            side: shot.side,
            active: false,
        }
    }

    fn reset(&mut self, shot: Shot) {
        self.pos = shot.pos;
        self.vel = shot.vel;
        self.size = BULLET_SIZE;
        self.side = shot.side;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

/// Parameters for a debris particle
#[derive(Debug, Clone, Copy)]
pub struct ParticleInit {
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: f32,
    pub life: u32,
}

/// Cosmetic debris. Not persisted.
#[derive(Debug, Clone)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: f32,
    pub life: u32,
    pub max_life: u32,
    pub active: bool,
}

impl Particle {
    pub fn update(&mut self) {
        self.pos += self.vel;
        self.vel *= 0.98;
        self.life = self.life.saturating_sub(1);
        if self.life == 0 {
            self.active = false;
        }
    }

    /// Remaining life as 0..=1, for fading
    pub fn alpha(&self) -> f32 {
        if self.max_life == 0 {
            0.0
        } else {
            self.life as f32 / self.max_life as f32
        }
    }
}

impl Poolable for Particle {
    type Init = ParticleInit;

    fn create(init: ParticleInit) -> Self {
        Self {
            pos: init.pos,
            vel: init.vel,
            size: init.size,
            life: init.life,
            max_life: init.life,
            active: false,
        }
    }

    fn reset(&mut self, init: ParticleInit) {
        self.pos = init.pos;
        self.vel = init.vel;
        self.size = init.size;
        self.life = init.life;
        self.max_life = init.life;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

/// Falling bomb dropped by the ship. Explodes on terrain or enemy contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bomb {
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: f32,
}

impl Bomb {
    pub fn new(pos: Vec2, vel: Vec2) -> Self {
        Self {
            pos,
            vel,
            size: BOMB_SIZE,
        }
    }

    pub fn advance(&mut self, wind: Vec2) {
        self.vel.y += BOMB_GRAVITY;
        self.vel += wind * WIND_FACTOR;
        self.pos += self.vel;
    }
}

/// Falling rock from a meteor shower. Belongs to neither side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meteor {
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: f32,
}

impl Meteor {
    pub fn new(pos: Vec2, vel: Vec2, size: f32) -> Self {
        Self { pos, vel, size }
    }

    /// A meteor entering above the world at a random spot, heading down
    pub fn spawn(width: f32, rng: &mut impl Rng) -> Self {
        let x = rng.random_range(0.0..width.max(1.0));
        let dir = Vec2::from_angle(rng.random_range(0.0..std::f32::consts::TAU));
        let mut vel = dir * rng.random_range(2.0..5.0);
        vel.y = vel.y.abs();
        Self::new(Vec2::new(x, -50.0), vel, rng.random_range(10.0..30.0))
    }

    pub fn advance(&mut self, wind: Vec2) {
        self.pos += self.vel;
        self.vel.y += METEOR_GRAVITY;
        self.vel += wind * METEOR_WIND_FACTOR;
    }
}

// --- Player side ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ship {
    pub id: ActorId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: f32,
    /// Energy doubles as health
    pub health: f32,
    pub max_health: f32,
    pub fire_cooldown: u32,
    pub bomb_cooldown: u32,
    pub shield_cooldown: u32,
    /// Last direction the ship fired or moved in
    pub facing: Vec2,
}

impl Ship {
    pub fn new(id: ActorId, pos: Vec2) -> Self {
        Self {
            id,
            pos,
            vel: Vec2::ZERO,
            size: SHIP_SIZE,
            health: SHIP_ENERGY,
            max_health: SHIP_ENERGY,
            fire_cooldown: 0,
            bomb_cooldown: 0,
            shield_cooldown: 0,
            facing: Vec2::X,
        }
    }

    /// Apply thrust, drag and the speed cap, then move
    pub fn fly(&mut self, thrust: Vec2, terrain: &Terrain, width: f32) {
        let thrust = thrust.clamp_length_max(1.0);
        if thrust.x != 0.0 {
            self.facing = Vec2::new(thrust.x.signum(), 0.0);
        }
        self.vel = ((self.vel + thrust * SHIP_THRUST) * SHIP_DRAG).clamp_length_max(SHIP_MAX_SPEED);
        self.pos += self.vel;
        self.pos.x = wrap_x(self.pos.x, width);

        let ceiling = self.size / 2.0;
        let ground = terrain.surface_y(self.pos.x) - self.size / 2.0;
        if self.pos.y < ceiling {
            self.pos.y = ceiling;
            self.vel.y = 0.0;
        } else if self.pos.y > ground {
            self.pos.y = ground;
            self.vel.y = self.vel.y.min(0.0);
        }
    }

    pub fn tick_cooldowns(&mut self) {
        self.fire_cooldown = self.fire_cooldown.saturating_sub(1);
        self.bomb_cooldown = self.bomb_cooldown.saturating_sub(1);
        self.shield_cooldown = self.shield_cooldown.saturating_sub(1);
    }
}

/// Circular barrier that absorbs fire from the other side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shield {
    pub id: ActorId,
    pub pos: Vec2,
    pub radius: f32,
    pub health: f32,
    pub max_health: f32,
    pub owner: Side,
}

impl Shield {
    pub fn new(id: ActorId, pos: Vec2, owner: Side) -> Self {
        Self {
            id,
            pos,
            radius: SHIELD_RADIUS,
            health: SHIELD_HEALTH,
            max_health: SHIELD_HEALTH,
            owner,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wingman {
    pub id: ActorId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: f32,
    pub health: f32,
    pub max_health: f32,
    pub cooldown: u32,
    /// Formation slot behind the ship
    pub slot: u32,
    hover_angle: f32,
}

impl Wingman {
    pub fn new(id: ActorId, pos: Vec2, slot: u32) -> Self {
        Self {
            id,
            pos,
            vel: Vec2::ZERO,
            size: WINGMAN_SIZE,
            health: WINGMAN_HEALTH,
            max_health: WINGMAN_HEALTH,
            cooldown: 0,
            slot,
            hover_angle: 0.0,
        }
    }

    /// Hover in formation near the ship, firing at `enemy` if one is in range
    pub fn update(&mut self, ship: &Ship, enemy: Option<Vec2>, width: f32) -> Option<Shot> {
        self.hover_angle += 0.05;
        let offset = Vec2::new(
            -ship.facing.x * 60.0 * (self.slot + 1) as f32,
            -40.0 + self.hover_angle.sin() * 30.0,
        );
        let target = ship.pos + offset;
        let steer = (target - self.pos).clamp_length_max(0.09 * 20.0);
        self.vel = (self.vel * 0.9 + steer * 0.1).clamp_length_max(2.3);
        self.pos += self.vel;
        self.pos.x = wrap_x(self.pos.x, width);

        self.tick_cooldown();
        let enemy = enemy.filter(|e| e.distance(self.pos) < WINGMAN_RANGE)?;
        if !self.ready() {
            return None;
        }
        self.cooldown = 20;
        Some(Shot::aimed(self.pos, enemy, PLAYER_BULLET_SPEED, Side::Player))
    }
}

/// Ground structure the player defends. Hit test is a rectangle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoonBase {
    pub id: ActorId,
    /// Center of the rectangle
    pub pos: Vec2,
    pub width: f32,
    pub height: f32,
    pub health: f32,
    pub max_health: f32,
}

impl MoonBase {
    pub fn new(id: ActorId, x: f32, terrain: &Terrain) -> Self {
        let mut base = Self {
            id,
            pos: Vec2::new(x, 0.0),
            width: BASE_WIDTH,
            height: BASE_HEIGHT,
            health: BASE_HEALTH,
            max_health: BASE_HEALTH,
        };
        base.settle(terrain);
        base
    }

    pub fn settle(&mut self, terrain: &Terrain) {
        self.pos.y = terrain.surface_y(self.pos.x) - self.height / 2.0;
    }

    /// Returns true if any health was restored
    pub fn heal(&mut self, amount: f32) -> bool {
        if self.health >= self.max_health || self.health <= 0.0 {
            return false;
        }
        self.health = (self.health + amount).min(self.max_health);
        true
    }
}

/// Tethered balloon launched from a moon base. Pops when an alien flies into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balloon {
    pub id: ActorId,
    /// Base that launched it
    pub base: ActorId,
    pub anchor_x: f32,
    pub pos: Vec2,
    pub size: f32,
    pub health: f32,
    pub tether: f32,
    pub rising: bool,
    sway_angle: f32,
}

impl Balloon {
    pub fn new(id: ActorId, base: ActorId, pos: Vec2, tether: f32) -> Self {
        Self {
            id,
            base,
            anchor_x: pos.x,
            pos,
            size: BALLOON_SIZE,
            health: 1.0,
            tether,
            rising: true,
            sway_angle: 0.0,
        }
    }

    /// Rise to the end of the tether, then drift with the wind
    pub fn update(&mut self, terrain: &Terrain, wind: Vec2, width: f32) {
        let ground = terrain.surface_y(self.anchor_x);
        let anchor = Vec2::new(self.anchor_x, ground);

        if self.rising {
            self.pos.y -= BALLOON_RISE_SPEED;
            if self.pos.y <= ground - self.tether {
                self.pos.y = ground - self.tether;
                self.rising = false;
            }
        } else {
            let drift = wind * BALLOON_WIND_INFLUENCE * self.tether;
            self.sway_angle += BALLOON_SWAY_SPEED;
            let sway = Vec2::from_angle(self.sway_angle) * BALLOON_SWAY;
            self.pos = anchor + Vec2::new(drift.x, drift.y - self.tether) + sway;
            self.pos -= (self.pos - anchor) * 0.01;
        }

        self.pos = anchor + (self.pos - anchor).clamp_length_max(self.tether);
        self.pos.x = self.pos.x.clamp(0.0, width);
        self.pos.y = self.pos.y.clamp(0.0, terrain.floor());
    }
}

/// Stationary gun emplacement that shoots at nearby aliens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turret {
    pub id: ActorId,
    pub pos: Vec2,
    pub size: f32,
    pub health: f32,
    pub cooldown: u32,
}

impl Turret {
    pub fn new(id: ActorId, x: f32, terrain: &Terrain) -> Self {
        let mut turret = Self {
            id,
            pos: Vec2::new(x, 0.0),
            size: TURRET_SIZE,
            health: TURRET_HEALTH,
            cooldown: 0,
        };
        turret.settle(terrain);
        turret
    }

    pub fn settle(&mut self, terrain: &Terrain) {
        self.pos.y = terrain.surface_y(self.pos.x) - self.size / 2.0;
    }

    pub fn update(&mut self, enemy: Option<Vec2>) -> Option<Shot> {
        self.tick_cooldown();
        let enemy = enemy.filter(|e| e.distance(self.pos) < TURRET_RANGE)?;
        if !self.ready() {
            return None;
        }
        self.cooldown = TURRET_COOLDOWN;
        Some(Shot::aimed(self.pos, enemy, TURRET_BULLET_SPEED, Side::Player))
    }
}

// --- Trait impls ---

impl_movable!(Ship, Wingman);
impl_identified!(Ship, Shield, Wingman, MoonBase, Turret, Balloon);

macro_rules! impl_damageable_circle {
    ($($ty:ty),* $(,)?) => {
        $(impl Damageable for $ty {
            fn health(&self) -> f32 { self.health }
            fn set_health(&mut self, health: f32) { self.health = health; }
            fn size(&self) -> f32 { self.size }
            fn center(&self) -> Vec2 { self.pos }
        })*
    };
}

impl_damageable_circle!(Ship, Wingman, Turret, Balloon);

impl Damageable for Shield {
    fn health(&self) -> f32 {
        self.health
    }
    fn set_health(&mut self, health: f32) {
        self.health = health;
    }
    fn size(&self) -> f32 {
        self.radius * 2.0
    }
    fn center(&self) -> Vec2 {
        self.pos
    }
    fn hit_by(&self, p: Vec2, _size: f32) -> bool {
        p.distance(self.pos) < self.radius
    }
}

impl Damageable for MoonBase {
    fn health(&self) -> f32 {
        self.health
    }
    fn set_health(&mut self, health: f32) {
        self.health = health;
    }
    fn size(&self) -> f32 {
        self.width
    }
    fn center(&self) -> Vec2 {
        self.pos
    }
    fn hit_by(&self, p: Vec2, size: f32) -> bool {
        let d = (p - self.pos).abs();
        d.x < (self.width + size) / 2.0 && d.y < (self.height + size) / 2.0
    }
}

impl Shooter for Wingman {
    fn cooldown(&self) -> u32 {
        self.cooldown
    }
    fn set_cooldown(&mut self, ticks: u32) {
        self.cooldown = ticks;
    }
}

impl Shooter for Turret {
    fn cooldown(&self) -> u32 {
        self.cooldown
    }
    fn set_cooldown(&mut self, ticks: u32) {
        self.cooldown = ticks;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bullet_out_of_bounds() {
        let mut bullet = Bullet::create(Shot {
            pos: Vec2::new(5.0, 5.0),
            vel: Vec2::new(-10.0, 0.0),
            side: Side::Player,
        });
        assert!(!bullet.out_of_bounds(WORLD_WIDTH, WORLD_HEIGHT));
        bullet.advance();
        assert!(bullet.out_of_bounds(WORLD_WIDTH, WORLD_HEIGHT));
    }

    #[test]
    fn test_particle_expires() {
        let mut p = Particle::create(ParticleInit {
            pos: Vec2::ZERO,
            vel: Vec2::X,
            size: 2.0,
            life: 3,
        });
        p.active = true;
        for _ in 0..3 {
            p.update();
        }
        assert!(!p.active);
        assert_eq!(p.alpha(), 0.0);
    }

    #[test]
    fn test_ship_stays_above_ground() {
        let terrain = Terrain::flat(WORLD_WIDTH, 700.0, WORLD_HEIGHT);
        let mut ship = Ship::new(1, Vec2::new(100.0, 600.0));
        for _ in 0..200 {
            ship.fly(Vec2::new(0.0, 1.0), &terrain, WORLD_WIDTH);
        }
        assert!(ship.pos.y <= 700.0 - SHIP_SIZE / 2.0 + 1e-3);
    }

    #[test]
    fn test_ship_wraps() {
        let terrain = Terrain::flat(WORLD_WIDTH, 700.0, WORLD_HEIGHT);
        let mut ship = Ship::new(1, Vec2::new(2.0, 300.0));
        ship.vel = Vec2::new(-5.0, 0.0);
        ship.fly(Vec2::ZERO, &terrain, WORLD_WIDTH);
        assert!(ship.pos.x > WORLD_WIDTH - 10.0);
    }

    #[test]
    fn test_base_rect_hit_and_heal() {
        let terrain = Terrain::flat(WORLD_WIDTH, 700.0, WORLD_HEIGHT);
        let mut base = MoonBase::new(3, 1000.0, &terrain);
        assert_eq!(base.pos.y, 690.0);
        assert!(base.hit_by(Vec2::new(1045.0, 685.0), 5.0));
        assert!(!base.hit_by(Vec2::new(1000.0, 670.0), 5.0));

        assert!(!base.heal(1.0));
        base.take_damage(10.0);
        assert!(base.heal(1.0));
        assert_eq!(base.health, 91.0);
    }

    #[test]
    fn test_turret_fires_in_range_with_cooldown() {
        let terrain = Terrain::flat(WORLD_WIDTH, 700.0, WORLD_HEIGHT);
        let mut turret = Turret::new(4, 500.0, &terrain);
        assert!(turret.update(Some(Vec2::new(900.0, 600.0))).is_none());

        let shot = turret.update(Some(Vec2::new(550.0, 600.0))).unwrap();
        assert_eq!(shot.side, Side::Player);
        assert!((shot.vel.length() - TURRET_BULLET_SPEED).abs() < 1e-4);
        assert!(turret.update(Some(Vec2::new(550.0, 600.0))).is_none());
    }

    #[test]
    fn test_balloon_rises_to_tether_then_sways() {
        let terrain = Terrain::flat(WORLD_WIDTH, 700.0, WORLD_HEIGHT);
        let mut balloon = Balloon::new(5, 3, Vec2::new(1000.0, 680.0), 100.0);
        for _ in 0..500 {
            balloon.update(&terrain, Vec2::ZERO, WORLD_WIDTH);
        }
        assert!(!balloon.rising);
        let anchor = Vec2::new(1000.0, 700.0);
        assert!(balloon.pos.distance(anchor) <= 100.0 + 1e-3);
        assert!(balloon.pos.y < 610.0);
        assert!((balloon.pos.x - 1000.0).abs() <= BALLOON_SWAY + 1.0);
    }

    #[test]
    fn test_balloon_tether_holds_in_wind() {
        let terrain = Terrain::flat(WORLD_WIDTH, 700.0, WORLD_HEIGHT);
        let mut balloon = Balloon::new(5, 3, Vec2::new(1000.0, 680.0), 150.0);
        balloon.rising = false;
        for _ in 0..100 {
            balloon.update(&terrain, Vec2::new(0.5, 0.0), WORLD_WIDTH);
        }
        let anchor = Vec2::new(1000.0, 700.0);
        assert!(balloon.pos.distance(anchor) <= 150.0 + 1e-3);
        assert!(balloon.pos.x > 1000.0);
    }

    #[test]
    fn test_meteor_falls_from_above() {
        use rand::SeedableRng;
        let mut rng = rand_pcg::Pcg32::seed_from_u64(11);
        let mut meteor = Meteor::spawn(WORLD_WIDTH, &mut rng);
        assert_eq!(meteor.pos.y, -50.0);
        assert!(meteor.vel.y >= 0.0);
        assert!((10.0..30.0).contains(&meteor.size));

        let vy = meteor.vel.y;
        meteor.advance(Vec2::ZERO);
        assert!((meteor.vel.y - (vy + METEOR_GRAVITY)).abs() < 1e-6);
    }

    #[test]
    fn test_shield_hit_uses_radius() {
        let shield = Shield::new(1, Vec2::new(0.0, 0.0), Side::Player);
        assert!(shield.hit_by(Vec2::new(99.0, 0.0), 5.0));
        assert!(!shield.hit_by(Vec2::new(101.0, 0.0), 5.0));
    }
}
