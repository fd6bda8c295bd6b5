//! Serializable world state
//!
//! Everything that affects future ticks is captured. Particles and collision
//! counters are not. Timer actions are not stored either; they are re-bound
//! from their keys.

use std::collections::HashSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::RestoreError;
use crate::SimConfig;
use crate::consts::MAX_SHIELDS;
use crate::sim::actor::{Damageable, Side};
use crate::sim::boss::{Boss, BossKind};
use crate::sim::entities::{Bomb, Bullet, Meteor, Shot};
use crate::sim::registry::EntityRegistry;
use crate::sim::scheduler::{Millis, TimerSnapshot};
use crate::sim::softbody::BodyError;
use crate::sim::state::{TimerAction, TimerKey, World, rng_for};
use crate::sim::terrain::Terrain;

/// Bumped whenever the layout below changes
pub const SNAPSHOT_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub version: u32,
    pub config: SimConfig,
    pub seed: u64,
    pub clock: Millis,
    pub ticks: u64,
    pub level: u32,
    pub score: u64,
    pub wind: Vec2,
    pub paused: bool,
    pub game_over: bool,
    pub victory: bool,
    pub king_defeated: bool,
    pub zapped_ticks: u32,
    pub terrain: Terrain,
    pub timers: Vec<TimerSnapshot<TimerKey>>,
    pub registry: EntityRegistry,
    pub bullets: Vec<Bullet>,
    pub bombs: Vec<Bomb>,
    pub meteors: Vec<Meteor>,
}

impl WorldSnapshot {
    pub fn capture(world: &World) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            config: world.config.clone(),
            seed: world.seed,
            clock: world.clock,
            ticks: world.ticks,
            level: world.level,
            score: world.score,
            wind: world.wind,
            paused: world.paused,
            game_over: world.game_over,
            victory: world.victory,
            king_defeated: world.king_defeated,
            zapped_ticks: world.zapped_ticks,
            terrain: world.terrain.clone(),
            timers: world.scheduler.snapshot(),
            registry: world.registry.clone(),
            bullets: world.bullets.live().to_vec(),
            bombs: world.bombs.clone(),
            meteors: world.meteors.clone(),
        }
    }

    /// Check every invariant a live world relies on
    pub fn validate(&self) -> Result<(), RestoreError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(RestoreError::Version {
                found: self.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        if !(self.clock.is_finite() && self.clock >= 0.0) {
            return Err(RestoreError::InvalidField("clock"));
        }
        if self.level == 0 {
            return Err(RestoreError::InvalidField("level"));
        }
        if !self.wind.is_finite() {
            return Err(RestoreError::InvalidField("wind"));
        }
        self.config
            .validate()
            .map_err(|_| RestoreError::InvalidField("config"))?;

        let points = self.terrain.points();
        if points.len() < 2
            || !points.iter().all(|p| p.is_finite())
            || points.windows(2).any(|w| w[0].x > w[1].x)
        {
            return Err(RestoreError::InvalidField("terrain"));
        }

        self.validate_registry()?;

        if !self
            .bullets
            .iter()
            .all(|b| b.pos.is_finite() && b.vel.is_finite())
        {
            return Err(RestoreError::InvalidField("bullets"));
        }
        if !self.bombs.iter().all(|b| b.pos.is_finite() && b.vel.is_finite()) {
            return Err(RestoreError::InvalidField("bombs"));
        }
        if !self
            .meteors
            .iter()
            .all(|m| m.pos.is_finite() && m.vel.is_finite() && m.size > 0.0)
        {
            return Err(RestoreError::InvalidField("meteors"));
        }
        Ok(())
    }

    fn validate_registry(&self) -> Result<(), RestoreError> {
        let registry = &self.registry;
        let mut seen = HashSet::new();
        for id in registry.ids() {
            if !seen.insert(id) {
                return Err(RestoreError::DuplicateId(id));
            }
            if id >= registry.peek_next_id() {
                return Err(RestoreError::InvalidField("next_id"));
            }
        }

        let ship = &registry.ship;
        if !(ship.pos.is_finite() && ship.vel.is_finite() && ship.health.is_finite()) {
            return Err(RestoreError::InvalidField("ship"));
        }
        for owner in [Side::Player, Side::Enemy] {
            if registry.shields.iter().filter(|s| s.owner == owner).count() > MAX_SHIELDS {
                return Err(RestoreError::InvalidField("shields"));
            }
        }

        for balloon in &registry.balloons {
            if !registry.moon_bases.iter().any(|b| b.id == balloon.base) || !balloon.pos.is_finite() {
                return Err(RestoreError::InvalidField("balloons"));
            }
        }
        if !registry.plants.iter().all(|p| p.pos.is_finite() && p.size > 0.0) {
            return Err(RestoreError::InvalidField("plants"));
        }

        for (slot, kind) in [(&registry.queen, BossKind::Queen), (&registry.king, BossKind::King)] {
            if let Some(boss) = slot {
                check_boss(boss, kind)?;
            }
        }
        Ok(())
    }

    /// Build a live world. The snapshot must already be valid.
    fn into_world(self) -> Result<World, RestoreError> {
        let mut world = World::with_terrain(self.config, self.seed, self.terrain);
        world.clock = self.clock;
        world.ticks = self.ticks;
        world.level = self.level;
        world.score = self.score;
        world.wind = self.wind;
        world.paused = self.paused;
        world.game_over = self.game_over;
        world.victory = self.victory;
        world.king_defeated = self.king_defeated;
        world.zapped_ticks = self.zapped_ticks;

        world
            .scheduler
            .restore(&self.timers, self.clock, |key| Some(TimerAction::for_key(key)))?;
        if self.paused {
            world.scheduler.pause();
        }

        world.registry = self.registry;
        world.registry.world_width = world.config.world_width;
        for bullet in self.bullets {
            world.fire(Shot {
                pos: bullet.pos,
                vel: bullet.vel,
                side: bullet.side,
            });
        }
        world.bombs = self.bombs;
        world.meteors = self.meteors;
        world.rng = rng_for(world.seed, world.ticks);
        Ok(world)
    }

    /// Validate, then build. Nothing partial survives a failure.
    pub fn restore(self) -> Result<World, RestoreError> {
        self.validate()?;
        self.into_world()
    }
}

fn check_boss(boss: &Boss, slot: BossKind) -> Result<(), RestoreError> {
    if boss.kind != slot {
        return Err(RestoreError::InvalidField("boss kind"));
    }
    if !boss.health().is_finite() {
        return Err(RestoreError::InvalidField("boss health"));
    }
    if boss.body.corners().len() != boss.kind.corners() {
        return Err(BodyError::Parameter("corner count").into());
    }
    Ok(())
}
