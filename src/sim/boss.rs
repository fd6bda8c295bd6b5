//! Queen and King bosses
//!
//! Both are soft bodies with the same lifecycle: they drop in from above,
//! patrol the surface, and eventually leave unless destroyed first. The King
//! additionally escalates through three phases (laser, then teleport).

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::actor::{ActorId, ActorRef, Category, Damageable, HasPhysicsBody, impl_identified};
use super::aliens::AlienKind;
use super::events::GameEvent;
use super::registry::EntityRegistry;
use super::scheduler::Millis;
use super::softbody::{BodyParams, SoftBody};
use crate::consts::*;

pub const LASER_COOLDOWN_TICKS: u32 = 300;
pub const TELEPORT_COOLDOWN_TICKS: u32 = 600;
/// Pixels per enter-timer firing
pub const DESCEND_STEP: f32 = 2.0;
pub const LEAVE_SPEED: f32 = 2.0;

/// What a boss drops on each spawn cooldown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Minion {
    Alien(AlienKind),
    /// Seeded on the surface below the boss
    Plant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BossKind {
    Queen,
    King,
}

impl BossKind {
    pub fn category(self) -> Category {
        match self {
            BossKind::Queen => Category::Queen,
            BossKind::King => Category::King,
        }
    }

    pub fn size(self) -> f32 {
        match self {
            BossKind::Queen => QUEEN_SIZE,
            BossKind::King => KING_SIZE,
        }
    }

    pub fn health(self) -> f32 {
        match self {
            BossKind::Queen => QUEEN_HEALTH,
            BossKind::King => KING_HEALTH,
        }
    }

    pub fn corners(self) -> usize {
        match self {
            BossKind::Queen => QUEEN_CORNERS,
            BossKind::King => KING_CORNERS,
        }
    }

    /// Minimum gap between minion spawns
    pub fn spawn_cooldown_ms(self) -> Millis {
        match self {
            BossKind::Queen => 4000.0,
            BossKind::King => 8000.0,
        }
    }

    pub fn burst_radius(self) -> f32 {
        match self {
            BossKind::Queen => 600.0,
            BossKind::King => 200.0,
        }
    }

    pub fn burst_force(self) -> f32 {
        match self {
            BossKind::Queen => 8.0,
            BossKind::King => 10.0,
        }
    }

    pub fn burst_cooldown_ms(self) -> Millis {
        match self {
            BossKind::Queen => 5000.0,
            BossKind::King => 4000.0,
        }
    }

    /// How long the boss stays before leaving on its own
    pub fn stay_ms(self) -> Millis {
        match self {
            BossKind::Queen => 90_000.0,
            BossKind::King => 180_000.0,
        }
    }

    pub fn points(self) -> u64 {
        match self {
            BossKind::Queen => 5_000,
            BossKind::King => 20_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BossStatus {
    /// Being lowered into the world by its enter timer
    Entering,
    /// Patrolling under soft-body physics
    Active,
    /// Rising off the top of the world
    Leaving,
    /// Gone without being destroyed
    Departed,
}

/// Sustained beam locked onto a player-side actor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Laser {
    pub target: ActorRef,
    pub ticks_left: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Boss {
    pub id: ActorId,
    pub kind: BossKind,
    pub body: SoftBody,
    pub health: f32,
    pub max_health: f32,
    pub status: BossStatus,
    pub phase: u8,
    pub phase_ticks: u32,
    pub laser: Option<Laser>,
    pub laser_cooldown: u32,
    pub teleport_cooldown: u32,
}

impl Boss {
    pub fn new(id: ActorId, kind: BossKind, center: Vec2, params: &BodyParams) -> Self {
        let health = kind.health();
        Self {
            id,
            kind,
            body: SoftBody::ring(center, kind.size() / 2.0, kind.corners(), params),
            health,
            max_health: health,
            status: BossStatus::Entering,
            phase: 1,
            phase_ticks: 0,
            laser: None,
            laser_cooldown: LASER_COOLDOWN_TICKS,
            teleport_cooldown: TELEPORT_COOLDOWN_TICKS,
        }
    }

    pub fn centroid(&self) -> Vec2 {
        self.body.centroid()
    }

    pub fn actor_ref(&self) -> ActorRef {
        ActorRef::new(self.kind.category(), self.id)
    }

    /// Lower the body one step. Returns true once the centroid reaches `stop_y`.
    pub fn descend(&mut self, stop_y: f32) -> bool {
        const SNAP: f32 = 0.01;
        let y = self.centroid().y;
        if y >= stop_y - SNAP {
            return true;
        }
        self.body.translate(Vec2::new(0.0, DESCEND_STEP.min(stop_y - y)));
        self.centroid().y >= stop_y - SNAP
    }

    /// Raise the body one step. Returns true once it is entirely above the world.
    pub fn rise(&mut self) -> bool {
        self.body.translate(Vec2::new(0.0, -LEAVE_SPEED));
        self.body.bounds().1.y < 0.0
    }

    /// Count a tick toward the next phase. Returns the new phase when it changes.
    ///
    /// Phases run 1, 2, 3 and then wrap back to 1.
    pub fn advance_phase(&mut self) -> Option<u8> {
        if self.kind != BossKind::King {
            return None;
        }
        self.phase_ticks += 1;
        if self.phase_ticks >= KING_PHASE_TICKS {
            self.phase_ticks = 0;
            self.phase = self.phase % 3 + 1;
            return Some(self.phase);
        }
        None
    }

    pub fn minion(&self) -> Minion {
        match (self.kind, self.phase) {
            (BossKind::Queen, _) => Minion::Plant,
            (BossKind::King, 1) => Minion::Alien(AlienKind::Hunter),
            (BossKind::King, 2) => Minion::Alien(AlienKind::Zapper),
            (BossKind::King, _) => Minion::Alien(AlienKind::Destroyer),
        }
    }

    /// Shove whatever is at `target` away. Returns the push to apply to it.
    ///
    /// The body takes a small recoil the other way.
    pub fn burst(&mut self, target: Vec2) -> Vec2 {
        let away = (target - self.centroid()).normalize_or(Vec2::NEG_Y);
        self.body.apply_impulse(-away * self.kind.burst_force() * 0.1);
        away * self.kind.burst_force()
    }

    /// Drive the laser for one tick. Targets are re-validated every tick.
    pub fn update_laser(
        &mut self,
        registry: &mut EntityRegistry,
        damage: f32,
        events: &mut Vec<GameEvent>,
    ) {
        if self.kind != BossKind::King || self.phase < 2 {
            self.laser = None;
            return;
        }

        match self.laser {
            Some(mut laser) => {
                if !registry.contains(laser.target) {
                    self.laser = None;
                    events.push(GameEvent::LaserLost { boss: self.kind });
                    return;
                }
                registry.damage(laser.target, damage);
                laser.ticks_left = laser.ticks_left.saturating_sub(1);
                self.laser = (laser.ticks_left > 0).then_some(laser);
            }
            None => {
                if self.laser_cooldown > 0 {
                    self.laser_cooldown -= 1;
                    return;
                }
                if let Some(target) = registry.nearest_player_target(self.centroid(), LASER_RANGE) {
                    self.laser = Some(Laser {
                        target,
                        ticks_left: LASER_DURATION_TICKS,
                    });
                    self.laser_cooldown = LASER_COOLDOWN_TICKS;
                    events.push(GameEvent::LaserFired {
                        boss: self.kind,
                        target,
                    });
                }
            }
        }
    }

    /// Jump to a random spot along the world. Returns the new centroid if it jumped.
    pub fn maybe_teleport(&mut self, world_width: f32, rng: &mut impl Rng) -> Option<Vec2> {
        if self.kind != BossKind::King || self.phase < 3 {
            return None;
        }
        if self.teleport_cooldown > 0 {
            self.teleport_cooldown -= 1;
            return None;
        }
        self.teleport_cooldown = TELEPORT_COOLDOWN_TICKS;
        let margin = self.body.size;
        let x = if world_width > margin * 2.0 {
            rng.random_range(margin..world_width - margin)
        } else {
            world_width / 2.0
        };
        let to = Vec2::new(x, self.centroid().y);
        self.body.teleport(to);
        Some(to)
    }
}

impl_identified!(Boss);

impl Damageable for Boss {
    fn health(&self) -> f32 {
        self.health
    }
    fn set_health(&mut self, health: f32) {
        self.health = health;
    }
    fn size(&self) -> f32 {
        self.body.size
    }
    fn center(&self) -> Vec2 {
        self.centroid()
    }
    fn within(&self, p: Vec2, radius: f32) -> bool {
        p.distance(self.centroid()) < radius + self.body.size / 2.0
    }
}

impl HasPhysicsBody for Boss {
    fn body(&self) -> &SoftBody {
        &self.body
    }
    fn body_mut(&mut self) -> &mut SoftBody {
        &mut self.body
    }
}
