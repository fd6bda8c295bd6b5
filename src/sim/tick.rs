//! Fixed timestep simulation tick
//!
//! One call advances the world by one step: timers, then every category's
//! movement and AI, then collisions, then pool reclaim and the registry sweep.
//! Actors never fire directly. They return [`Shot`]s which are pooled once
//! every update has run.

use glam::Vec2;
use rand::Rng;

use super::actor::{ActorRef, Category, Damageable, Side};
use super::aliens::{AlienEnv, AlienKind, Nest, PLANT_POINTS, PLANT_SIZE, ZAP_DURATION};
use super::boss::{BossKind, BossStatus, Minion};
use super::entities::{
    Bomb, SHIP_BOMB_COOLDOWN, SHIP_FIRE_COOLDOWN, SHIP_SHIELD_COOLDOWN, Shot, TURRET_RANGE,
    WINGMAN_RANGE,
};
use super::events::GameEvent;
use super::softbody::BodyEnv;
use super::state::{LEVEL_TRANSITION_MS, TimerAction, TimerKey, VICTORY_MS, World, rng_for};
use crate::consts::*;
use crate::wrap_x;

pub const NEST_POINTS: u64 = 250;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Desired thrust direction, length clamped to 1
    pub thrust: Vec2,
    pub fire: bool,
    /// World point to fire at. Fires along the ship's facing when absent.
    pub aim: Option<Vec2>,
    pub drop_bomb: bool,
    pub deploy_shield: bool,
    /// Pause toggle
    pub pause: bool,
}

/// Advance the world by one fixed timestep
pub fn tick(world: &mut World, input: &TickInput) {
    if input.pause {
        world.toggle_pause();
    }
    if world.paused || world.game_over || world.victory {
        return;
    }

    world.ticks += 1;
    world.clock += world.config.tick_ms;
    world.rng = rng_for(world.seed, world.ticks);

    world.run_timers();

    let mut shots = Vec::new();
    update_player(world, input, &mut shots);
    update_wingmen(world, &mut shots);
    update_turrets(world, &mut shots);
    update_balloons(world);
    update_aliens(world, &mut shots);
    update_destroyers(world, &mut shots);
    update_nests(world, &mut shots);
    update_plants(world);
    update_bosses(world);
    for particle in world.particles.live_mut() {
        particle.update();
    }
    for shot in shots {
        world.fire(shot);
    }

    resolve_collisions(world);

    world.particles.reclaim();
    world.bullets.reclaim();

    sweep(world);
    check_level(world);
}

fn update_player(world: &mut World, input: &TickInput, shots: &mut Vec<Shot>) {
    if world.registry.ship.is_destroyed() {
        return;
    }

    let thrust = if world.zapped_ticks > 0 {
        world.zapped_ticks -= 1;
        -input.thrust
    } else {
        input.thrust
    };

    let ship = &mut world.registry.ship;
    ship.tick_cooldowns();
    ship.fly(thrust, &world.terrain, world.config.world_width);

    if input.fire && ship.fire_cooldown == 0 {
        let target = input.aim.unwrap_or(ship.pos + ship.facing);
        shots.push(Shot::aimed(ship.pos, target, PLAYER_BULLET_SPEED, Side::Player));
        ship.fire_cooldown = SHIP_FIRE_COOLDOWN;
    }
    if input.drop_bomb && ship.bomb_cooldown == 0 {
        world
            .bombs
            .push(Bomb::new(ship.pos + Vec2::new(0.0, ship.size / 2.0), ship.vel));
        ship.bomb_cooldown = SHIP_BOMB_COOLDOWN;
    }
    let deploy = input.deploy_shield && ship.shield_cooldown == 0;
    if deploy {
        ship.shield_cooldown = SHIP_SHIELD_COOLDOWN;
        world.deploy_shield();
    }
}

fn update_wingmen(world: &mut World, shots: &mut Vec<Shot>) {
    let registry = &world.registry;
    let targets: Vec<Option<Vec2>> = registry
        .wingmen
        .iter()
        .map(|w| registry.nearest_enemy_pos(w.pos, WINGMAN_RANGE))
        .collect();

    let width = world.config.world_width;
    let registry = &mut world.registry;
    for (wingman, target) in registry.wingmen.iter_mut().zip(targets) {
        shots.extend(wingman.update(&registry.ship, target, width));
    }
}

fn update_turrets(world: &mut World, shots: &mut Vec<Shot>) {
    let registry = &world.registry;
    let targets: Vec<Option<Vec2>> = registry
        .turrets
        .iter()
        .map(|t| registry.nearest_enemy_pos(t.pos, TURRET_RANGE))
        .collect();

    for (turret, target) in world.registry.turrets.iter_mut().zip(targets) {
        shots.extend(turret.update(target));
    }
}

fn update_balloons(world: &mut World) {
    let width = world.config.world_width;
    for balloon in &mut world.registry.balloons {
        balloon.update(&world.terrain, world.wind, width);
    }
}

fn update_aliens(world: &mut World, shots: &mut Vec<Shot>) {
    let ship = &world.registry.ship;
    let aim = (!ship.is_destroyed()).then_some(ship.pos);
    let env = AlienEnv {
        terrain: &world.terrain,
        world_width: world.config.world_width,
    };

    let mut zapped = false;
    for kind in [AlienKind::Drone, AlienKind::Hunter, AlienKind::Zapper] {
        for alien in world.registry.aliens_of_mut(kind) {
            let intent = alien.update(aim, &env, &mut world.rng);
            shots.extend(intent.shot);
            zapped |= intent.zap;
        }
    }

    if zapped {
        world.zapped_ticks = ZAP_DURATION;
        world.events.push(GameEvent::ShipZapped);
    }
}

/// Destroyers keep a reference to the structure they are attacking. It is
/// re-checked every tick and re-acquired when stale.
fn update_destroyers(world: &mut World, shots: &mut Vec<Shot>) {
    let registry = &world.registry;
    let plans: Vec<(Option<ActorRef>, Option<Vec2>)> = registry
        .destroyers
        .iter()
        .map(|d| {
            let target = d
                .target
                .filter(|t| registry.contains(*t))
                .or_else(|| registry.nearest_structure(d.pos));
            (target, target.and_then(|t| registry.position_of(t)))
        })
        .collect();

    let env = AlienEnv {
        terrain: &world.terrain,
        world_width: world.config.world_width,
    };
    for (destroyer, (target, aim)) in world.registry.destroyers.iter_mut().zip(plans) {
        destroyer.target = target;
        shots.extend(destroyer.update(aim, &env, &mut world.rng).shot);
    }
}

fn update_nests(world: &mut World, shots: &mut Vec<Shot>) {
    let ship = &world.registry.ship;
    let aim = (!ship.is_destroyed()).then_some(ship.pos);
    let width = world.config.world_width;

    let mut spawns = Vec::new();
    for nest in &mut world.registry.nests {
        let intent = nest.update(aim, width);
        shots.extend(intent.shot);
        if intent.spawn {
            spawns.push(nest.pos - Vec2::new(0.0, nest.size));
        }
    }

    for pos in spawns {
        let actor = world
            .registry
            .spawn_alien(AlienKind::Drone, pos, world.level, &mut world.rng);
        world.events.push(GameEvent::MinionSpawned { actor });
    }
}

/// Grow plants. One that reaches full size is replaced by a nest.
fn update_plants(world: &mut World) {
    let mut rooted = Vec::new();
    for plant in &mut world.registry.plants {
        if plant.update(&world.terrain, &mut world.rng) {
            rooted.push(plant.id);
        }
    }

    for id in rooted {
        let Some(i) = world.registry.plants.iter().position(|p| p.id == id) else {
            continue;
        };
        let plant = world.registry.plants.remove(i);
        let nest_id = world.registry.next_id();
        world
            .registry
            .nests
            .push(Nest::new(nest_id, plant.pos.x, &world.terrain));
        log::debug!("Plant {id} rooted into nest {nest_id}");
        world.events.push(GameEvent::PlantRooted {
            plant: ActorRef::new(Category::Plant, id),
            nest: ActorRef::new(Category::Nest, nest_id),
        });
    }
}

fn update_bosses(world: &mut World) {
    for kind in [BossKind::Queen, BossKind::King] {
        // Out of the registry while it runs so it can act on the rest
        let Some(mut boss) = world.registry.boss_slot(kind).take() else {
            continue;
        };

        match boss.status {
            BossStatus::Entering | BossStatus::Departed => {}
            BossStatus::Active => {
                let env = BodyEnv {
                    gravity: world.config.gravity,
                    wind: world.wind,
                    terrain: &world.terrain,
                    world_width: world.config.world_width,
                };
                boss.body.step(&env, &mut world.rng);

                let spawn_key = TimerKey::BossSpawn(kind);
                if !world.scheduler.exists(&spawn_key) {
                    let minion = boss.minion();
                    let actor = match minion {
                        Minion::Alien(alien) => {
                            let pos = boss.centroid() + Vec2::new(0.0, boss.body.size / 2.0);
                            world
                                .registry
                                .spawn_alien(alien, pos, world.level, &mut world.rng)
                        }
                        Minion::Plant => {
                            let offset = world.rng.random_range(-300.0..300.0);
                            let x = wrap_x(boss.centroid().x + offset, world.config.world_width);
                            world
                                .registry
                                .spawn_plant(x, PLANT_SIZE, &world.terrain, &mut world.rng)
                        }
                    };
                    world.scheduler.create(
                        spawn_key,
                        TimerAction::Cooldown,
                        kind.spawn_cooldown_ms(),
                        false,
                    );
                    log::debug!("{kind:?} spawned a {minion:?}");
                    world.events.push(GameEvent::MinionSpawned { actor });
                }

                let burst_key = TimerKey::BossBurst(kind);
                let ship = &mut world.registry.ship;
                if !ship.is_destroyed()
                    && !world.scheduler.exists(&burst_key)
                    && ship.pos.distance(boss.centroid()) < kind.burst_radius()
                {
                    ship.vel += boss.burst(ship.pos);
                    world.scheduler.create(
                        burst_key,
                        TimerAction::Cooldown,
                        kind.burst_cooldown_ms(),
                        false,
                    );
                    world.events.push(GameEvent::BurstDefense { boss: kind });
                }

                if let Some(phase) = boss.advance_phase() {
                    log::info!("{kind:?} entered phase {phase}");
                    world.events.push(GameEvent::BossPhase { boss: kind, phase });
                }
                boss.update_laser(&mut world.registry, world.config.damage.laser, &mut world.events);
                if let Some(to) = boss.maybe_teleport(world.config.world_width, &mut world.rng) {
                    world.events.push(GameEvent::Teleported { boss: kind, to });
                }
            }
            BossStatus::Leaving => {
                if boss.rise() {
                    boss.status = BossStatus::Departed;
                }
            }
        }

        if boss.status == BossStatus::Departed {
            world.scheduler.clear_where(|k| k.boss() == Some(kind));
            log::info!("{kind:?} departed");
            world.events.push(GameEvent::BossDeparted { boss: kind });
        } else {
            *world.registry.boss_slot(kind) = Some(boss);
        }
    }
}

fn resolve_collisions(world: &mut World) {
    let hits = world.broker.resolve_bullets(
        &mut world.bullets,
        &mut world.registry,
        &world.terrain,
        &world.config,
        &mut world.events,
    );
    for hit in hits {
        world.spawn_debris(hit.pos, 3);
    }

    let explosions = world.broker.resolve_bombs(
        &mut world.bombs,
        &mut world.registry,
        &mut world.terrain,
        &world.config,
        world.wind,
        &mut world.events,
    );
    for explosion in explosions {
        world.spawn_debris(explosion.pos, 12);
    }

    let impacts = world.broker.resolve_meteors(
        &mut world.meteors,
        &mut world.registry,
        &mut world.terrain,
        &world.config,
        world.wind,
        &mut world.events,
    );
    for impact in impacts {
        world.spawn_debris(impact.pos, 16);
    }

    world
        .broker
        .resolve_balloons(&mut world.registry, &mut world.events);
}

fn points_for(category: Category) -> u64 {
    if let Some(kind) = AlienKind::from_category(category) {
        return kind.points();
    }
    match category {
        Category::Nest => NEST_POINTS,
        Category::Plant => PLANT_POINTS,
        Category::Queen => BossKind::Queen.points(),
        Category::King => BossKind::King.points(),
        _ => 0,
    }
}

fn sweep(world: &mut World) {
    let removed = world.registry.sweep_destroyed(&mut world.events);
    for actor in removed {
        world.score += points_for(actor.category);
        match actor.category {
            Category::MoonBase => {
                world.scheduler.clear_timer(&TimerKey::BaseHeal(actor.id));
                world.scheduler.clear_timer(&TimerKey::BalloonLaunch(actor.id));
                world.registry.balloons.retain(|b| b.base != actor.id);
            }
            Category::Queen | Category::King => {
                let kind = if actor.category == Category::Queen {
                    BossKind::Queen
                } else {
                    BossKind::King
                };
                world.scheduler.clear_where(|k| k.boss() == Some(kind));
                if kind == BossKind::King {
                    world.king_defeated = true;
                    world
                        .scheduler
                        .create(TimerKey::Victory, TimerAction::Victory, VICTORY_MS, false);
                    let cleared = world.registry.clear_hostiles(&mut world.events);
                    log::info!("King down, {} hostiles cleared", cleared.len());
                    world.events.push(GameEvent::HostilesCleared {
                        count: cleared.len(),
                    });
                }
            }
            _ => {}
        }
    }

    if world.registry.ship.is_destroyed() && !world.game_over {
        world.game_over = true;
        log::info!("Ship destroyed after {} ticks, score {}", world.ticks, world.score);
        world.events.push(GameEvent::PlayerDestroyed);
    }
}

fn check_level(world: &mut World) {
    if world.king_defeated || world.game_over {
        return;
    }
    if world.registry.enemy_count() <= 1 && !world.scheduler.exists(&TimerKey::LevelTransition) {
        world.scheduler.create(
            TimerKey::LevelTransition,
            TimerAction::NextLevel,
            LEVEL_TRANSITION_MS,
            false,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimConfig;
    use crate::sim::entities::Meteor;
    use crate::sim::terrain::Terrain;

    fn flat_world() -> World {
        let config = SimConfig::default();
        let terrain = Terrain::flat(config.world_width, 700.0, config.world_height);
        World::with_terrain(config, 3, terrain)
    }

    fn run(world: &mut World, ticks: usize) {
        let input = TickInput::default();
        for _ in 0..ticks {
            tick(world, &input);
        }
    }

    fn summon(world: &mut World, kind: BossKind) {
        let mut scheduler = std::mem::take(&mut world.scheduler);
        world.apply_timer_action(
            &mut scheduler,
            &TimerKey::BossAppear(kind),
            &TimerAction::Arrive(kind),
        );
        world.scheduler = scheduler;
    }

    #[test]
    fn test_deterministic_for_seed() {
        let mut a = World::new(SimConfig::default(), 1234);
        let mut b = World::new(SimConfig::default(), 1234);
        let input = TickInput {
            thrust: Vec2::new(1.0, 0.2),
            fire: true,
            ..Default::default()
        };
        for _ in 0..300 {
            tick(&mut a, &input);
            tick(&mut b, &input);
        }
        assert_eq!(a.ticks, 300);
        assert_eq!(a.score, b.score);
        assert_eq!(a.registry.ship.pos, b.registry.ship.pos);
        let pos = |w: &World| w.registry.aliens.iter().map(|a| a.pos).collect::<Vec<_>>();
        assert_eq!(pos(&a), pos(&b));
        assert_eq!(a.drain_events(), b.drain_events());
    }

    #[test]
    fn test_pause_freezes_world() {
        let mut world = flat_world();
        run(&mut world, 5);
        tick(&mut world, &TickInput { pause: true, ..Default::default() });
        let (ticks, clock) = (world.ticks, world.clock);
        run(&mut world, 10);
        assert_eq!((world.ticks, world.clock), (ticks, clock));
        assert!(world.scheduler.is_paused());

        tick(&mut world, &TickInput { pause: true, ..Default::default() });
        assert_eq!(world.ticks, ticks + 1);
        assert!(!world.scheduler.is_paused());
    }

    #[test]
    fn test_clock_is_logical() {
        let mut world = flat_world();
        run(&mut world, 60);
        assert!((world.clock - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_fire_goes_through_pool() {
        let mut world = flat_world();
        let input = TickInput {
            fire: true,
            aim: Some(Vec2::new(1000.0, 100.0)),
            ..Default::default()
        };
        tick(&mut world, &input);
        assert_eq!(world.bullets.live_count(), 1);
        assert_eq!(world.bullets.live()[0].side, Side::Player);
        // Cooldown holds the next shot back
        tick(&mut world, &input);
        assert_eq!(world.bullets.live_count(), 1);
    }

    #[test]
    fn test_destroyed_base_loses_heal_timer() {
        let mut world = flat_world();
        let base = world.add_moon_base(3000.0);
        world.registry.damage(base, 1000.0);
        run(&mut world, 1);
        assert!(world.registry.moon_bases.is_empty());
        assert!(!world.scheduler.exists(&TimerKey::BaseHeal(base.id)));
        assert!(world.drain_events().iter().any(|e| matches!(
            e,
            GameEvent::ActorDestroyed { actor, .. } if *actor == base
        )));
    }

    #[test]
    fn test_player_destroyed_once() {
        let mut world = flat_world();
        world.registry.ship.health = 0.0;
        run(&mut world, 3);
        assert!(world.game_over);
        let lost = world
            .drain_events()
            .into_iter()
            .filter(|e| *e == GameEvent::PlayerDestroyed)
            .count();
        assert_eq!(lost, 1);
    }

    #[test]
    fn test_empty_sky_starts_next_level() {
        let mut world = flat_world();
        let ticks = (LEVEL_TRANSITION_MS / world.config.tick_ms).ceil() as usize + 2;
        run(&mut world, ticks);
        assert_eq!(world.level, 2);
        assert!(world.registry.enemy_count() > 1);
        assert!(world.drain_events().contains(&GameEvent::LevelStarted { level: 2 }));
    }

    #[test]
    fn test_king_death_schedules_victory() {
        let mut world = flat_world();
        summon(&mut world, BossKind::King);
        assert!(world.scheduler.exists(&TimerKey::BossEnter(BossKind::King)));

        if let Some(king) = world.registry.king.as_mut() {
            king.health = 0.0;
        }
        run(&mut world, 1);
        assert!(world.registry.king.is_none());
        assert!(world.king_defeated);
        assert!(!world.scheduler.exists(&TimerKey::BossEnter(BossKind::King)));
        assert!(world.scheduler.exists(&TimerKey::Victory));
        assert_eq!(world.score, BossKind::King.points());

        let ticks = (VICTORY_MS / world.config.tick_ms).ceil() as usize + 1;
        run(&mut world, ticks);
        assert!(world.victory);
        assert!(world.drain_events().contains(&GameEvent::Victory));
    }

    #[test]
    fn test_king_death_clears_every_hostile() {
        let mut world = flat_world();
        summon(&mut world, BossKind::King);
        for (i, kind) in [
            AlienKind::Drone,
            AlienKind::Hunter,
            AlienKind::Zapper,
            AlienKind::Destroyer,
        ]
        .into_iter()
        .enumerate()
        {
            let pos = Vec2::new(2000.0 + 300.0 * i as f32, 150.0);
            world.registry.spawn_alien(kind, pos, 1, &mut world.rng);
        }
        let id = world.registry.next_id();
        world.registry.nests.push(Nest::new(id, 4000.0, &world.terrain));
        world
            .registry
            .spawn_plant(4500.0, PLANT_SIZE, &world.terrain, &mut world.rng);

        if let Some(king) = world.registry.king.as_mut() {
            king.health = 0.0;
        }
        run(&mut world, 1);
        assert!(world.king_defeated);
        assert_eq!(world.registry.enemy_count(), 0);
        assert!(world.registry.nests.is_empty());
        assert!(world.registry.plants.is_empty());
        // Only the king itself scores
        assert_eq!(world.score, BossKind::King.points());
        assert!(world.drain_events().contains(&GameEvent::HostilesCleared { count: 6 }));

        run(&mut world, 120);
        assert_eq!(world.registry.enemy_count(), 0);
        assert!(!world.scheduler.exists(&TimerKey::LevelTransition));
    }

    #[test]
    fn test_queen_seeds_plants_that_root_into_nests() {
        let mut world = flat_world();
        summon(&mut world, BossKind::Queen);
        let queen_x = {
            let queen = world.registry.queen.as_mut().unwrap();
            queen.status = BossStatus::Active;
            queen.centroid().x
        };

        run(&mut world, 1);
        assert_eq!(world.registry.plants.len(), 1);
        assert_eq!(world.registry.enemy_count(), 0);
        let plant = &world.registry.plants[0];
        assert!(crate::wrapped_dx(queen_x, plant.pos.x, world.config.world_width).abs() <= 300.0);
        let seeded = ActorRef::new(Category::Plant, plant.id);
        assert!(world
            .drain_events()
            .contains(&GameEvent::MinionSpawned { actor: seeded }));
        assert!(world.scheduler.exists(&TimerKey::BossSpawn(BossKind::Queen)));

        world.registry.plants[0].growth_rate = PLANT_SIZE;
        run(&mut world, 1);
        assert!(world.registry.plants.is_empty());
        assert_eq!(world.registry.nests.len(), 1);
        let nest = ActorRef::new(Category::Nest, world.registry.nests[0].id);
        assert!(world.drain_events().contains(&GameEvent::PlantRooted {
            plant: seeded,
            nest,
        }));
    }

    #[test]
    fn test_lost_base_takes_its_balloons() {
        let mut world = flat_world();
        let base = world.add_moon_base(3000.0);
        assert_eq!(world.launch_balloons(base.id), Some(2));
        run(&mut world, 1);
        assert_eq!(world.registry.balloons.len(), 2);

        world.registry.damage(base, 1000.0);
        run(&mut world, 1);
        assert!(world.registry.balloons.is_empty());
        assert!(!world.scheduler.exists(&TimerKey::BalloonLaunch(base.id)));
    }

    #[test]
    fn test_meteor_impact_reshapes_ground_during_tick() {
        let mut world = flat_world();
        world
            .meteors
            .push(Meteor::new(Vec2::new(2500.0, 670.0), Vec2::new(0.0, 3.0), 20.0));
        run(&mut world, 10);
        assert!(world.meteors.is_empty());
        assert!(world.terrain.surface_y(2500.0) > 700.0);
        assert!(world
            .drain_events()
            .iter()
            .any(|e| matches!(e, GameEvent::MeteorImpact { .. })));
        assert_eq!(world.broker.stats().meteor_impacts, 1);
    }

    #[test]
    fn test_destroyer_retargets_when_structure_dies() {
        let mut world = flat_world();
        let first = world.add_moon_base(1000.0);
        let second = world.add_moon_base(2000.0);
        let destroyer =
            world
                .registry
                .spawn_alien(AlienKind::Destroyer, Vec2::new(1100.0, 300.0), 1, &mut world.rng);
        run(&mut world, 1);
        assert_eq!(world.registry.destroyers[0].target, Some(first));

        world.registry.damage(first, 1000.0);
        run(&mut world, 2);
        assert!(world.registry.contains(destroyer));
        assert_eq!(world.registry.destroyers[0].target, Some(second));
    }
}
