//! World context
//!
//! Owns every subsystem and the per-run state around them. Timers carry plain
//! [`TimerAction`] values that the world interprets in
//! [`World::apply_timer_action`].

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::actor::{ActorId, ActorRef, Category, Side};
use super::aliens::{AlienKind, Nest};
use super::boss::{Boss, BossKind, BossStatus};
use super::collision::CollisionBroker;
use super::entities::{
    BALLOON_LAUNCH_MS, BASE_HEAL_MS, Balloon, Bomb, Bullet, METEOR_SPAWN_TICKS, Meteor, MoonBase,
    Particle, ParticleInit, Ship, Shot, Turret, Wingman,
};
use super::events::GameEvent;
use super::pool::Pool;
use super::registry::EntityRegistry;
use super::scheduler::{Millis, Scheduler};
use super::softbody::BodyParams;
use super::terrain::Terrain;
use crate::SimConfig;

/// Delay between the last wave thinning out and the next one
pub const LEVEL_TRANSITION_MS: Millis = 3000.0;
/// Delay between the king dying and the win
pub const VICTORY_MS: Millis = 15_000.0;
pub const MAX_WINGMEN: usize = 2;

/// One timer per key, at most
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerKey {
    BossAppear(BossKind),
    BossEnter(BossKind),
    BossLeave(BossKind),
    /// Minion spawn cooldown
    BossSpawn(BossKind),
    /// Burst defense cooldown
    BossBurst(BossKind),
    BaseHeal(ActorId),
    /// Balloon top-up for one base
    BalloonLaunch(ActorId),
    /// Quiet time until the next meteor shower
    MeteorShower,
    /// Meteor cadence while a shower is on
    MeteorSpawn,
    ShowerEnd,
    LevelTransition,
    Victory,
}

impl TimerKey {
    /// The boss this timer belongs to, if any
    pub fn boss(self) -> Option<BossKind> {
        match self {
            TimerKey::BossAppear(k)
            | TimerKey::BossEnter(k)
            | TimerKey::BossLeave(k)
            | TimerKey::BossSpawn(k)
            | TimerKey::BossBurst(k) => Some(k),
            _ => None,
        }
    }
}

/// What happens when a timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Nothing; the timer only marks a cooldown while it exists
    Cooldown,
    Arrive(BossKind),
    Descend(BossKind),
    Depart(BossKind),
    HealBase(ActorId),
    LaunchBalloons(ActorId),
    StartShower,
    SpawnMeteor,
    EndShower,
    NextLevel,
    Victory,
}

impl TimerAction {
    /// The action a key always carries. Used to re-bind restored timers.
    pub fn for_key(key: &TimerKey) -> Self {
        match *key {
            TimerKey::BossAppear(k) => TimerAction::Arrive(k),
            TimerKey::BossEnter(k) => TimerAction::Descend(k),
            TimerKey::BossLeave(k) => TimerAction::Depart(k),
            TimerKey::BossSpawn(_) | TimerKey::BossBurst(_) => TimerAction::Cooldown,
            TimerKey::BaseHeal(id) => TimerAction::HealBase(id),
            TimerKey::BalloonLaunch(id) => TimerAction::LaunchBalloons(id),
            TimerKey::MeteorShower => TimerAction::StartShower,
            TimerKey::MeteorSpawn => TimerAction::SpawnMeteor,
            TimerKey::ShowerEnd => TimerAction::EndShower,
            TimerKey::LevelTransition => TimerAction::NextLevel,
            TimerKey::Victory => TimerAction::Victory,
        }
    }
}

pub type WorldScheduler = Scheduler<TimerKey, TimerAction>;

/// Rng for a given tick. Re-deriving per tick keeps restored runs on the same stream.
pub fn rng_for(seed: u64, ticks: u64) -> Pcg32 {
    Pcg32::seed_from_u64(seed ^ ticks.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Complete simulation state for one run
#[derive(Debug, Clone)]
pub struct World {
    pub config: SimConfig,
    /// Run seed for reproducibility
    pub seed: u64,
    /// Logical clock fed to the scheduler (ms)
    pub clock: Millis,
    pub ticks: u64,
    pub level: u32,
    pub score: u64,
    pub wind: Vec2,
    pub terrain: Terrain,
    pub registry: EntityRegistry,
    pub scheduler: WorldScheduler,
    pub bullets: Pool<Bullet>,
    /// Visual debris (not persisted)
    pub particles: Pool<Particle>,
    pub bombs: Vec<Bomb>,
    pub meteors: Vec<Meteor>,
    pub broker: CollisionBroker,
    pub paused: bool,
    pub game_over: bool,
    pub victory: bool,
    pub king_defeated: bool,
    /// Ticks left with scrambled controls
    pub zapped_ticks: u32,
    pub(crate) events: Vec<GameEvent>,
    pub(crate) rng: Pcg32,
}

impl World {
    /// Fresh level-1 world on generated terrain
    pub fn new(config: SimConfig, seed: u64) -> Self {
        let mut rng = rng_for(seed, 0);
        let terrain = Terrain::generate(config.world_width, config.world_height, &mut rng);
        let mut world = Self::with_terrain(config, seed, terrain);
        world.rng = rng;
        world.populate();
        log::info!("World reset (seed {seed})");
        world
    }

    /// Just the ship over `terrain`. Nothing else spawns until asked.
    pub fn with_terrain(config: SimConfig, seed: u64, terrain: Terrain) -> Self {
        let ship_pos = Vec2::new(200.0, config.world_height / 3.0);
        let mut registry = EntityRegistry::new(Ship::new(1, ship_pos));
        registry.world_width = config.world_width;
        Self {
            seed,
            clock: 0.0,
            ticks: 0,
            level: 1,
            score: 0,
            wind: config.wind,
            terrain,
            registry,
            scheduler: WorldScheduler::new(),
            bullets: Pool::with_capacity(config.bullet_pool_capacity),
            particles: Pool::with_capacity(config.particle_pool_capacity),
            bombs: Vec::new(),
            meteors: Vec::new(),
            broker: CollisionBroker::new(),
            paused: false,
            game_over: false,
            victory: false,
            king_defeated: false,
            zapped_ticks: 0,
            events: Vec::new(),
            rng: rng_for(seed, 0),
            config,
        }
    }

    fn populate(&mut self) {
        let width = self.config.world_width;
        let bases = self.config.moon_bases;
        for i in 0..bases {
            let x = width * (i + 1) as f32 / (bases + 1) as f32;
            self.add_moon_base(x);
            let id = self.registry.next_id();
            self.registry.turrets.push(Turret::new(id, x + 150.0, &self.terrain));
        }
        for _ in 0..self.config.nests {
            let id = self.registry.next_id();
            let x = self.rng.random_range(0.0..width);
            self.registry.nests.push(Nest::new(id, x, &self.terrain));
        }
        for slot in 0..MAX_WINGMEN as u32 {
            self.add_wingman(slot);
        }
        self.spawn_wave();

        self.scheduler.create(
            TimerKey::BossAppear(BossKind::Queen),
            TimerAction::Arrive(BossKind::Queen),
            self.config.queen_appear_ms,
            false,
        );
        self.scheduler.create(
            TimerKey::BossAppear(BossKind::King),
            TimerAction::Arrive(BossKind::King),
            self.config.king_appear_ms,
            false,
        );
        let gap = self.meteor_gap();
        self.scheduler
            .create(TimerKey::MeteorShower, TimerAction::StartShower, gap, false);
        self.events.push(GameEvent::LevelStarted { level: self.level });
    }

    fn meteor_gap(&mut self) -> Millis {
        let [lo, hi] = self.config.meteor_gap_ms;
        self.rng.random_range(lo..=hi)
    }

    pub fn body_params(&self) -> BodyParams {
        BodyParams {
            mass: self.config.corner_mass,
            friction: self.config.body_friction,
            perimeter_strength: self.config.perimeter_strength,
            bracing_strength: self.config.bracing_strength,
            rolling_sensitivity: self.config.rolling_sensitivity,
        }
    }

    /// Take every event raised since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        if self.paused {
            self.scheduler.pause();
        } else {
            self.scheduler.resume(self.clock);
        }
    }

    /// Put a projectile into play
    pub fn fire(&mut self, shot: Shot) {
        self.bullets.acquire(shot);
    }

    /// Add a moon base on the surface at `x` along with its heal and balloon timers
    pub fn add_moon_base(&mut self, x: f32) -> ActorRef {
        let id = self.registry.next_id();
        self.registry.moon_bases.push(MoonBase::new(id, x, &self.terrain));
        self.scheduler.create(
            TimerKey::BaseHeal(id),
            TimerAction::HealBase(id),
            BASE_HEAL_MS,
            true,
        );
        self.scheduler.create(
            TimerKey::BalloonLaunch(id),
            TimerAction::LaunchBalloons(id),
            BALLOON_LAUNCH_MS,
            true,
        );
        ActorRef::new(Category::MoonBase, id)
    }

    /// Bring the base's balloons back up to the configured count.
    ///
    /// Returns how many went up, or `None` if the base is gone.
    pub fn launch_balloons(&mut self, base_id: ActorId) -> Option<usize> {
        let base = self.registry.moon_bases.iter().find(|b| b.id == base_id)?;
        let (x, top, width) = (base.pos.x, base.pos.y - base.height / 2.0, base.width);
        let aloft = self
            .registry
            .balloons
            .iter()
            .filter(|b| b.base == base_id)
            .count();

        let wanted = self.config.balloons_per_base.saturating_sub(aloft);
        for _ in 0..wanted {
            let id = self.registry.next_id();
            let pos = Vec2::new(x + self.rng.random_range(-width / 2.0..width / 2.0), top);
            let tether = self.rng.random_range(100.0..300.0);
            self.registry.balloons.push(Balloon::new(id, base_id, pos, tether));
            self.events.push(GameEvent::BalloonLaunched {
                actor: ActorRef::new(Category::Balloon, id),
            });
        }
        Some(wanted)
    }

    pub fn add_wingman(&mut self, slot: u32) -> ActorRef {
        let id = self.registry.next_id();
        let pos = self.registry.ship.pos - Vec2::new(60.0 * (slot + 1) as f32, 40.0);
        self.registry.wingmen.push(Wingman::new(id, pos, slot));
        ActorRef::new(Category::Wingman, id)
    }

    pub fn deploy_shield(&mut self) -> ActorRef {
        let actor = self.registry.add_shield(self.registry.ship.pos, Side::Player);
        self.events.push(GameEvent::ShieldDeployed { actor });
        actor
    }

    /// Spawn the current level's wave, scattered across the sky
    pub fn spawn_wave(&mut self) {
        let level = self.level;
        let extra = level.saturating_sub(1) as usize;
        let counts = [
            (AlienKind::Drone, self.config.initial_aliens + 2 * extra),
            (AlienKind::Hunter, extra),
            (AlienKind::Zapper, level.saturating_sub(2) as usize),
            (AlienKind::Destroyer, level.saturating_sub(3) as usize),
        ];
        for (kind, count) in counts {
            for _ in 0..count {
                let pos = Vec2::new(
                    self.rng.random_range(0.0..self.config.world_width),
                    self.rng.random_range(50.0..self.config.world_height / 3.0),
                );
                self.registry.spawn_alien(kind, pos, level, &mut self.rng);
            }
        }
        log::debug!("Level {level} wave spawned, {} enemies", self.registry.enemy_count());
    }

    /// Throw `count` debris particles out from `pos`
    pub fn spawn_debris(&mut self, pos: Vec2, count: usize) {
        for _ in 0..count {
            let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
            let speed = self.rng.random_range(0.5..3.0);
            self.particles.acquire(ParticleInit {
                pos,
                vel: Vec2::from_angle(angle) * speed,
                size: self.rng.random_range(1.0..4.0),
                life: self.rng.random_range(20..60),
            });
        }
    }

    /// Drop a boss in above the world and start lowering it
    fn boss_arrive(&mut self, scheduler: &mut WorldScheduler, kind: BossKind) {
        if self.registry.boss(kind).is_some() || (kind == BossKind::King && self.king_defeated) {
            return;
        }
        let id = self.registry.next_id();
        let x = self
            .registry
            .ship
            .pos
            .x
            .min(self.config.world_width - kind.size())
            .max(kind.size());
        let center = Vec2::new(x, -kind.size() / 2.0);
        let boss = Boss::new(id, kind, center, &self.body_params());
        *self.registry.boss_slot(kind) = Some(boss);
        scheduler.create(
            TimerKey::BossEnter(kind),
            TimerAction::Descend(kind),
            self.config.tick_ms,
            true,
        );
        log::info!("{kind:?} arriving");
        self.events.push(GameEvent::BossArrived { boss: kind });
    }

    /// Interpret a fired timer. `scheduler` is the world's scheduler, lent
    /// out for the duration of the update.
    pub fn apply_timer_action(&mut self, scheduler: &mut WorldScheduler, key: &TimerKey, action: &TimerAction) {
        match *action {
            TimerAction::Cooldown => {}
            TimerAction::Arrive(kind) => self.boss_arrive(scheduler, kind),
            TimerAction::Descend(kind) => {
                let stop_y = self.config.world_height / 2.0;
                let Some(boss) = self.registry.boss_slot(kind).as_mut() else {
                    scheduler.clear_timer(key);
                    return;
                };
                if boss.status == BossStatus::Entering && boss.descend(stop_y) {
                    boss.status = BossStatus::Active;
                    scheduler.clear_timer(key);
                    scheduler.create(
                        TimerKey::BossLeave(kind),
                        TimerAction::Depart(kind),
                        kind.stay_ms(),
                        false,
                    );
                    self.events.push(GameEvent::BossActive { boss: kind });
                }
            }
            TimerAction::Depart(kind) => {
                if let Some(boss) = self.registry.boss_slot(kind).as_mut() {
                    boss.status = BossStatus::Leaving;
                    boss.laser = None;
                    log::info!("{kind:?} leaving");
                    self.events.push(GameEvent::BossLeaving { boss: kind });
                }
            }
            TimerAction::HealBase(id) => {
                match self.registry.moon_bases.iter_mut().find(|b| b.id == id) {
                    Some(base) => {
                        if base.heal(1.0) {
                            self.events.push(GameEvent::BaseHealed {
                                actor: ActorRef::new(Category::MoonBase, id),
                                health: base.health,
                            });
                        }
                    }
                    None => scheduler.clear_timer(key),
                }
            }
            TimerAction::LaunchBalloons(id) => {
                if self.launch_balloons(id).is_none() {
                    scheduler.clear_timer(key);
                }
            }
            TimerAction::StartShower => {
                let [lo, hi] = self.config.meteor_shower_ms;
                let length = self.rng.random_range(lo..=hi);
                scheduler.create(
                    TimerKey::MeteorSpawn,
                    TimerAction::SpawnMeteor,
                    self.config.tick_ms * METEOR_SPAWN_TICKS as f64,
                    true,
                );
                scheduler.create(TimerKey::ShowerEnd, TimerAction::EndShower, length, false);
                log::info!("Meteor shower for {:.0}s", length / 1000.0);
                self.events.push(GameEvent::MeteorShowerStarted);
            }
            TimerAction::SpawnMeteor => {
                let meteor = Meteor::spawn(self.config.world_width, &mut self.rng);
                self.meteors.push(meteor);
            }
            TimerAction::EndShower => {
                scheduler.clear_timer(&TimerKey::MeteorSpawn);
                let gap = self.meteor_gap();
                scheduler.create(TimerKey::MeteorShower, TimerAction::StartShower, gap, false);
                log::info!("Meteor shower over");
                self.events.push(GameEvent::MeteorShowerEnded);
            }
            TimerAction::NextLevel => {
                self.level += 1;
                self.spawn_wave();
                log::info!("Level {} started", self.level);
                self.events.push(GameEvent::LevelStarted { level: self.level });
            }
            TimerAction::Victory => {
                self.victory = true;
                log::info!("Victory after {} ticks", self.ticks);
                self.events.push(GameEvent::Victory);
            }
        }
    }

    /// Fire every timer due at the current clock
    pub fn run_timers(&mut self) {
        let mut scheduler = std::mem::take(&mut self.scheduler);
        scheduler.update(self.clock, |s, key, action| self.apply_timer_action(s, key, action));
        self.scheduler = scheduler;
    }
}
