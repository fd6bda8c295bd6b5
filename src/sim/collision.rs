//! Projectile and area-effect resolution
//!
//! Bullets are tested against the world edge and the terrain first, then
//! against the opposing side's categories in a fixed order. The first category
//! with a hit takes the damage and the bullet goes back to its pool. Removal of
//! anything that dies is left to the registry sweep.

use std::ops::ControlFlow;

use glam::Vec2;

use super::actor::{ActorRef, Category, Side};
use super::entities::{Bomb, Bullet, METEOR_ALIEN_DAMAGE, METEOR_BLAST_RADIUS, Meteor};
use super::events::GameEvent;
use super::pool::Pool;
use super::registry::EntityRegistry;
use super::terrain::Terrain;
use crate::SimConfig;
use crate::consts::*;

/// Running totals since the broker was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollisionStats {
    pub bullets_resolved: u64,
    pub actor_hits: u64,
    pub terrain_hits: u64,
    pub out_of_bounds: u64,
    pub explosions: u64,
    pub meteor_impacts: u64,
    pub balloons_popped: u64,
}

/// A bullet that connected with an actor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulletHit {
    pub target: ActorRef,
    pub pos: Vec2,
    pub side: Side,
}

/// A bomb or meteor that went off
#[derive(Debug, Clone, PartialEq)]
pub struct Explosion {
    pub pos: Vec2,
    pub hits: Vec<ActorRef>,
    /// Extent of the crater, if it hit the ground
    pub crater: Option<(f32, f32)>,
}

#[derive(Debug, Clone, Default)]
pub struct CollisionBroker {
    stats: CollisionStats,
}

impl CollisionBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> CollisionStats {
        self.stats
    }

    /// Damage a bullet from `side` deals to a member of `category`
    pub fn damage_for(config: &SimConfig, side: Side, category: Category) -> f32 {
        let table = &config.damage;
        match side {
            Side::Player => match category {
                Category::Plant => table.plant,
                _ => config.player_bullet_damage(),
            },
            Side::Enemy => match category {
                Category::Shield => table.shield,
                Category::Ship => table.ship,
                Category::Wingman => table.wingman,
                Category::MoonBase => table.moon_base,
                Category::Turret => table.turret,
                Category::Balloon => table.balloon,
                _ => table.player_bullet,
            },
        }
    }

    /// Find the first actor hit by a mover at `pos` and damage it.
    ///
    /// Categories are tried in the fire order for `side`; within a category
    /// the first overlapping member wins.
    pub fn first_hit(
        registry: &mut EntityRegistry,
        pos: Vec2,
        size: f32,
        side: Side,
        mut damage: impl FnMut(Category) -> f32,
    ) -> Option<ActorRef> {
        for &category in Category::fire_order(side) {
            let amount = damage(category);
            let mut hit = None;
            let _ = registry.visit_targets_mut(category, side.opponent(), |id, target| {
                if target.hit_by(pos, size) {
                    target.take_damage(amount);
                    hit = Some(id);
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            });
            if let Some(id) = hit {
                return Some(ActorRef::new(category, id));
            }
        }
        None
    }

    /// Does a mover at `pos` overlap anything `side` can hit?
    pub fn touches_any(registry: &mut EntityRegistry, pos: Vec2, size: f32, side: Side) -> bool {
        Category::fire_order(side).iter().any(|&category| {
            registry
                .visit_targets_mut(category, side.opponent(), |_, target| {
                    if target.hit_by(pos, size) {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                })
                .is_break()
        })
    }

    /// Damage everything `side` can hit within `radius` of `center`. No falloff.
    pub fn area_damage(
        registry: &mut EntityRegistry,
        center: Vec2,
        radius: f32,
        damage: f32,
        side: Side,
    ) -> Vec<ActorRef> {
        let mut hits = Vec::new();
        for &category in Category::fire_order(side) {
            let _ = registry.visit_targets_mut(category, side.opponent(), |id, target| {
                if target.within(center, radius) {
                    target.take_damage(damage);
                    hits.push(ActorRef::new(category, id));
                }
                ControlFlow::Continue(())
            });
        }
        hits
    }

    /// Move every live bullet one step and resolve what it runs into
    pub fn resolve_bullets(
        &mut self,
        bullets: &mut Pool<Bullet>,
        registry: &mut EntityRegistry,
        terrain: &Terrain,
        config: &SimConfig,
        events: &mut Vec<GameEvent>,
    ) -> Vec<BulletHit> {
        let mut hits = Vec::new();

        // Releasing swaps the last live bullet into the hole, so walk backwards
        for i in (0..bullets.live_count()).rev() {
            let Some(bullet) = bullets.get_mut(i) else {
                continue;
            };
            bullet.advance();
            let (pos, size, side) = (bullet.pos, bullet.size, bullet.side);
            self.stats.bullets_resolved += 1;

            if bullet.out_of_bounds(config.world_width, config.world_height) {
                self.stats.out_of_bounds += 1;
                bullets.release(i);
                continue;
            }
            if terrain.touches(pos, size / 2.0) {
                self.stats.terrain_hits += 1;
                bullets.release(i);
                continue;
            }

            let target = Self::first_hit(registry, pos, size, side, |category| {
                Self::damage_for(config, side, category)
            });
            if let Some(target) = target {
                self.stats.actor_hits += 1;
                if target.category == Category::Ship {
                    events.push(GameEvent::ShipHit {
                        damage: Self::damage_for(config, side, Category::Ship),
                    });
                }
                hits.push(BulletHit { target, pos, side });
                bullets.release(i);
            }
        }
        hits
    }

    /// Drop every bomb one step and detonate those that touch ground or an enemy
    pub fn resolve_bombs(
        &mut self,
        bombs: &mut Vec<Bomb>,
        registry: &mut EntityRegistry,
        terrain: &mut Terrain,
        config: &SimConfig,
        wind: Vec2,
        events: &mut Vec<GameEvent>,
    ) -> Vec<Explosion> {
        let radius = config.damage.bomb_radius;
        let mut explosions = Vec::new();

        for i in (0..bombs.len()).rev() {
            bombs[i].advance(wind);
            let Bomb { pos, size, .. } = bombs[i];

            if pos.x < 0.0 || pos.x > config.world_width || pos.y > config.world_height {
                self.stats.out_of_bounds += 1;
                bombs.remove(i);
                continue;
            }

            let grounded = terrain.touches(pos, size / 2.0);
            if !grounded && !Self::touches_any(registry, pos, size, Side::Player) {
                continue;
            }

            bombs.remove(i);
            self.stats.explosions += 1;
            let hits = Self::area_damage(registry, pos, radius, config.damage.bomb, Side::Player);
            let crater = grounded.then(|| {
                let extent = terrain.carve_crater(pos.x, radius, CRATER_DEPTH);
                registry.settle_on_terrain(terrain);
                extent
            });
            log::debug!("Bomb exploded at ({:.0}, {:.0}), {} hit", pos.x, pos.y, hits.len());
            events.push(GameEvent::BombExploded {
                pos,
                radius,
                hits: hits.len(),
            });
            explosions.push(Explosion { pos, hits, crater });
        }
        explosions
    }

    /// Move every meteor one step and resolve what it runs into.
    ///
    /// A meteor striking the ship or a shield is spent without exploding.
    /// Aliens in its path take a glancing blow and it flies on. On the ground
    /// it blasts both sides and leaves a crater.
    pub fn resolve_meteors(
        &mut self,
        meteors: &mut Vec<Meteor>,
        registry: &mut EntityRegistry,
        terrain: &mut Terrain,
        config: &SimConfig,
        wind: Vec2,
        events: &mut Vec<GameEvent>,
    ) -> Vec<Explosion> {
        let mut explosions = Vec::new();

        for i in (0..meteors.len()).rev() {
            meteors[i].advance(wind);
            let Meteor { pos, size, .. } = meteors[i];

            if pos.x < 0.0 || pos.x > config.world_width || pos.y > config.world_height {
                self.stats.out_of_bounds += 1;
                meteors.remove(i);
                continue;
            }

            let struck = |registry: &mut EntityRegistry, category: Category, owner: Side, damage: f32| {
                registry
                    .visit_targets_mut(category, owner, |_, target| {
                        if target.hit_by(pos, size) {
                            target.take_damage(damage);
                            ControlFlow::Break(())
                        } else {
                            ControlFlow::Continue(())
                        }
                    })
                    .is_break()
            };

            let ship_damage = config.damage.meteor_ship;
            if struck(registry, Category::Ship, Side::Player, ship_damage) {
                self.stats.actor_hits += 1;
                events.push(GameEvent::ShipHit { damage: ship_damage });
                meteors.remove(i);
                continue;
            }
            let shielded = [Side::Player, Side::Enemy]
                .into_iter()
                .any(|owner| struck(registry, Category::Shield, owner, config.damage.meteor));
            if shielded {
                self.stats.actor_hits += 1;
                meteors.remove(i);
                continue;
            }

            for category in [
                Category::Alien,
                Category::Hunter,
                Category::Zapper,
                Category::Destroyer,
            ] {
                let _ = registry.visit_targets_mut(category, Side::Enemy, |_, target| {
                    if target.hit_by(pos, size) {
                        target.take_damage(METEOR_ALIEN_DAMAGE);
                    }
                    ControlFlow::Continue(())
                });
            }

            if !terrain.touches(pos, size / 2.0) {
                continue;
            }

            meteors.remove(i);
            self.stats.meteor_impacts += 1;
            let radius = METEOR_BLAST_RADIUS;
            let damage = config.damage.meteor;
            let mut hits = Self::area_damage(registry, pos, radius, damage, Side::Player);
            hits.extend(Self::area_damage(registry, pos, radius, damage, Side::Enemy));
            let crater = terrain.carve_crater(pos.x, radius * 2.0, radius / 2.0);
            registry.settle_on_terrain(terrain);

            log::debug!("Meteor hit ground at ({:.0}, {:.0}), {} hit", pos.x, pos.y, hits.len());
            events.push(GameEvent::MeteorImpact {
                pos,
                hits: hits.len(),
            });
            explosions.push(Explosion {
                pos,
                hits,
                crater: Some(crater),
            });
        }
        explosions
    }

    /// Pop balloons that aliens flew into
    pub fn resolve_balloons(
        &mut self,
        registry: &mut EntityRegistry,
        events: &mut Vec<GameEvent>,
    ) -> usize {
        let pops = registry.ram_balloons();
        self.stats.balloons_popped += pops.len() as u64;
        for (balloon, by) in &pops {
            events.push(GameEvent::BalloonPopped {
                actor: *balloon,
                by: *by,
            });
        }
        pops.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::aliens::{Alien, AlienKind, Nest};
    use crate::sim::entities::{Balloon, MoonBase, SHIP_ENERGY, Ship, Shot};
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn setup() -> (EntityRegistry, Terrain, Pool<Bullet>, SimConfig) {
        let registry = EntityRegistry::new(Ship::new(1, Vec2::new(100.0, 100.0)));
        let terrain = Terrain::flat(WORLD_WIDTH, 700.0, WORLD_HEIGHT);
        (registry, terrain, Pool::with_capacity(10), SimConfig::default())
    }

    fn alien_at(registry: &mut EntityRegistry, pos: Vec2) -> ActorRef {
        let mut rng = Pcg32::seed_from_u64(9);
        registry.spawn_alien(AlienKind::Drone, pos, 1, &mut rng)
    }

    #[test]
    fn test_shield_takes_hit_before_nest() {
        let (mut registry, terrain, mut bullets, config) = setup();
        let id = registry.next_id();
        let mut nest = Nest::new(id, 1000.0, &terrain);
        nest.pos = Vec2::new(1000.0, 500.0);
        registry.nests.push(nest);
        let shield = registry.add_shield(Vec2::new(1000.0, 500.0), Side::Enemy);

        bullets.acquire(Shot {
            pos: Vec2::new(995.0, 500.0),
            vel: Vec2::new(5.0, 0.0),
            side: Side::Player,
        });
        let mut broker = CollisionBroker::new();
        let mut events = Vec::new();
        let hits = broker.resolve_bullets(&mut bullets, &mut registry, &terrain, &config, &mut events);

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].target, shield);
        assert_eq!(registry.shields[0].health, SHIELD_HEALTH - 1.0);
        assert_eq!(registry.nests[0].health, crate::sim::aliens::NEST_HEALTH);
        assert_eq!(bullets.live_count(), 0);
        assert_eq!(broker.stats().actor_hits, 1);
    }

    #[test]
    fn test_own_shield_does_not_block() {
        let (mut registry, terrain, mut bullets, config) = setup();
        registry.add_shield(Vec2::new(500.0, 300.0), Side::Player);
        let alien = alien_at(&mut registry, Vec2::new(500.0, 300.0));

        bullets.acquire(Shot {
            pos: Vec2::new(495.0, 300.0),
            vel: Vec2::new(5.0, 0.0),
            side: Side::Player,
        });
        let mut events = Vec::new();
        let hits = CollisionBroker::new().resolve_bullets(
            &mut bullets,
            &mut registry,
            &terrain,
            &config,
            &mut events,
        );
        assert_eq!(hits[0].target, alien);
        assert_eq!(registry.shields[0].health, SHIELD_HEALTH);
    }

    #[test]
    fn test_enemy_fire_hits_ship_and_reports() {
        let (mut registry, terrain, mut bullets, config) = setup();
        bullets.acquire(Shot {
            pos: Vec2::new(100.0, 95.0),
            vel: Vec2::new(0.0, 5.0),
            side: Side::Enemy,
        });
        let mut events = Vec::new();
        CollisionBroker::new().resolve_bullets(&mut bullets, &mut registry, &terrain, &config, &mut events);
        assert_eq!(registry.ship.health, SHIP_ENERGY - config.damage.ship);
        assert_eq!(events, vec![GameEvent::ShipHit { damage: config.damage.ship }]);
    }

    #[test]
    fn test_terrain_and_edge_release_bullets() {
        let (mut registry, terrain, mut bullets, config) = setup();
        bullets.acquire(Shot {
            pos: Vec2::new(2000.0, 690.0),
            vel: Vec2::new(0.0, 10.0),
            side: Side::Enemy,
        });
        bullets.acquire(Shot {
            pos: Vec2::new(3.0, 300.0),
            vel: Vec2::new(-10.0, 0.0),
            side: Side::Player,
        });
        bullets.acquire(Shot {
            pos: Vec2::new(3000.0, 300.0),
            vel: Vec2::new(10.0, 0.0),
            side: Side::Player,
        });

        let mut broker = CollisionBroker::new();
        let mut events = Vec::new();
        broker.resolve_bullets(&mut bullets, &mut registry, &terrain, &config, &mut events);
        assert_eq!(bullets.live_count(), 1);
        assert_eq!(bullets.live()[0].pos, Vec2::new(3010.0, 300.0));
        assert_eq!(broker.stats().terrain_hits, 1);
        assert_eq!(broker.stats().out_of_bounds, 1);
    }

    #[test]
    fn test_area_damage_radius() {
        let (mut registry, _, _, _) = setup();
        let center = Vec2::new(1000.0, 400.0);
        let r = 100.0;
        let near = alien_at(&mut registry, center + Vec2::new(0.5 * r, 0.0));
        let edge = alien_at(&mut registry, center + Vec2::new(0.0, 0.9 * r));
        let far = alien_at(&mut registry, center + Vec2::new(-1.5 * r, 0.0));

        let hits = CollisionBroker::area_damage(&mut registry, center, r, 1.0, Side::Player);
        assert_eq!(hits, vec![near, edge]);
        let health = |r: ActorRef, reg: &EntityRegistry| {
            reg.aliens.iter().find(|a| a.id == r.id).map(|a| a.health)
        };
        let full = registry.aliens[0].max_health;
        assert_eq!(health(near, &registry), Some(full - 1.0));
        assert_eq!(health(edge, &registry), Some(full - 1.0));
        assert_eq!(health(far, &registry), Some(full));
    }

    #[test]
    fn test_bomb_craters_ground() {
        let (mut registry, mut terrain, _, config) = setup();
        let mut bombs = vec![Bomb::new(Vec2::new(2000.0, 680.0), Vec2::new(0.0, 3.0))];
        let mut events = Vec::new();
        let mut broker = CollisionBroker::new();

        let mut explosions = Vec::new();
        for _ in 0..20 {
            explosions.extend(broker.resolve_bombs(
                &mut bombs,
                &mut registry,
                &mut terrain,
                &config,
                Vec2::ZERO,
                &mut events,
            ));
        }
        assert!(bombs.is_empty());
        assert_eq!(explosions.len(), 1);
        assert!(explosions[0].crater.is_some());
        assert!(terrain.surface_y(2000.0) > 700.0);
        assert!(matches!(events[0], GameEvent::BombExploded { hits: 0, .. }));
    }

    #[test]
    fn test_bomb_detonates_on_enemy() {
        let (mut registry, mut terrain, _, config) = setup();
        let mut rng = Pcg32::seed_from_u64(4);
        let id = registry.next_id();
        registry.aliens.push(Alien::new(id, AlienKind::Drone, Vec2::new(1500.0, 300.0), 1, &mut rng));
        let mut bombs = vec![Bomb::new(Vec2::new(1500.0, 280.0), Vec2::new(0.0, 2.0))];
        let mut events = Vec::new();

        let mut explosions = Vec::new();
        for _ in 0..10 {
            explosions.extend(CollisionBroker::new().resolve_bombs(
                &mut bombs,
                &mut registry,
                &mut terrain,
                &config,
                Vec2::ZERO,
                &mut events,
            ));
        }
        assert_eq!(explosions.len(), 1);
        assert_eq!(explosions[0].crater, None);
        assert_eq!(explosions[0].hits, vec![ActorRef::new(Category::Alien, id)]);
        assert_eq!(terrain.surface_y(1500.0), 700.0);
    }

    fn run_meteors(
        meteors: &mut Vec<Meteor>,
        registry: &mut EntityRegistry,
        terrain: &mut Terrain,
        ticks: usize,
    ) -> (Vec<Explosion>, Vec<GameEvent>) {
        let config = SimConfig::default();
        let mut broker = CollisionBroker::new();
        let mut events = Vec::new();
        let mut explosions = Vec::new();
        for _ in 0..ticks {
            explosions.extend(broker.resolve_meteors(
                meteors,
                registry,
                terrain,
                &config,
                Vec2::ZERO,
                &mut events,
            ));
        }
        (explosions, events)
    }

    #[test]
    fn test_meteor_blasts_both_sides_and_craters() {
        let (mut registry, mut terrain, _, _) = setup();
        let nest_id = registry.next_id();
        registry.nests.push(Nest::new(nest_id, 2000.0, &terrain));
        let base_id = registry.next_id();
        registry.moon_bases.push(MoonBase::new(base_id, 2030.0, &terrain));
        let mut meteors = vec![Meteor::new(Vec2::new(2010.0, 680.0), Vec2::new(0.0, 3.0), 20.0)];

        let (explosions, events) = run_meteors(&mut meteors, &mut registry, &mut terrain, 10);
        assert!(meteors.is_empty());
        assert_eq!(explosions.len(), 1);
        assert_eq!(
            explosions[0].hits,
            vec![
                ActorRef::new(Category::Nest, nest_id),
                ActorRef::new(Category::MoonBase, base_id),
            ]
        );
        assert!(explosions[0].crater.is_some());
        assert!(terrain.surface_y(2000.0) > 700.0);
        // Ground structures follow the new surface
        assert!(registry.nests[0].pos.y > 670.0);
        assert!(matches!(events[0], GameEvent::MeteorImpact { hits: 2, .. }));
    }

    #[test]
    fn test_meteor_glances_off_alien() {
        let (mut registry, mut terrain, _, _) = setup();
        let alien = alien_at(&mut registry, Vec2::new(1500.0, 300.0));
        let mut meteors = vec![Meteor::new(Vec2::new(1500.0, 290.0), Vec2::new(0.0, 1.0), 20.0)];

        let (explosions, _) = run_meteors(&mut meteors, &mut registry, &mut terrain, 1);
        assert!(explosions.is_empty());
        assert_eq!(meteors.len(), 1);
        assert!(!registry.contains(alien));
    }

    #[test]
    fn test_meteor_spent_on_shield_without_blast() {
        let (mut registry, mut terrain, _, _) = setup();
        registry.add_shield(Vec2::new(800.0, 400.0), Side::Player);
        let mut meteors = vec![Meteor::new(Vec2::new(800.0, 330.0), Vec2::new(0.0, 2.0), 20.0)];

        let (explosions, events) = run_meteors(&mut meteors, &mut registry, &mut terrain, 1);
        assert!(meteors.is_empty());
        assert!(explosions.is_empty());
        assert!(events.is_empty());
        assert_eq!(registry.shields[0].health, SHIELD_HEALTH - 100.0);
        assert_eq!(terrain.surface_y(800.0), 700.0);
    }

    #[test]
    fn test_meteor_strikes_ship_in_flight() {
        let (mut registry, mut terrain, _, config) = setup();
        let mut meteors = vec![Meteor::new(Vec2::new(100.0, 80.0), Vec2::new(0.0, 2.0), 20.0)];

        let (_, events) = run_meteors(&mut meteors, &mut registry, &mut terrain, 1);
        assert!(meteors.is_empty());
        assert_eq!(registry.ship.health, SHIP_ENERGY - config.damage.meteor_ship);
        assert_eq!(events, vec![GameEvent::ShipHit { damage: config.damage.meteor_ship }]);
    }

    #[test]
    fn test_enemy_fire_pops_balloon() {
        let (mut registry, terrain, mut bullets, config) = setup();
        let id = registry.next_id();
        registry.balloons.push(Balloon::new(id, 99, Vec2::new(3000.0, 400.0), 200.0));
        bullets.acquire(Shot {
            pos: Vec2::new(2995.0, 400.0),
            vel: Vec2::new(5.0, 0.0),
            side: Side::Enemy,
        });
        let mut events = Vec::new();
        let hits = CollisionBroker::new().resolve_bullets(
            &mut bullets,
            &mut registry,
            &terrain,
            &config,
            &mut events,
        );
        assert_eq!(hits[0].target, ActorRef::new(Category::Balloon, id));
        assert!(!registry.contains(hits[0].target));
    }

    #[test]
    fn test_player_fire_on_plant_uses_plant_damage() {
        let (mut registry, terrain, mut bullets, mut config) = setup();
        config.damage_multiplier = 3.0;
        let mut rng = Pcg32::seed_from_u64(8);
        let plant = registry.spawn_plant(1500.0, 100.0, &terrain, &mut rng);
        registry.plants[0].pos = Vec2::new(1500.0, 500.0);
        registry.plants[0].size = 50.0;
        bullets.acquire(Shot {
            pos: Vec2::new(1495.0, 500.0),
            vel: Vec2::new(5.0, 0.0),
            side: Side::Player,
        });
        let mut events = Vec::new();
        let hits = CollisionBroker::new().resolve_bullets(
            &mut bullets,
            &mut registry,
            &terrain,
            &config,
            &mut events,
        );
        assert_eq!(hits[0].target, plant);
        assert_eq!(registry.plants[0].health, 100.0 - config.damage.plant);
    }

    #[test]
    fn test_alien_ramming_balloon_is_counted() {
        let (mut registry, _, _, _) = setup();
        let alien = alien_at(&mut registry, Vec2::new(700.0, 300.0));
        let id = registry.next_id();
        registry.balloons.push(Balloon::new(id, 99, Vec2::new(700.0, 310.0), 200.0));
        let mut broker = CollisionBroker::new();
        let mut events = Vec::new();

        assert_eq!(broker.resolve_balloons(&mut registry, &mut events), 1);
        assert_eq!(broker.stats().balloons_popped, 1);
        assert_eq!(
            events,
            vec![GameEvent::BalloonPopped {
                actor: ActorRef::new(Category::Balloon, id),
                by: alien,
            }]
        );
    }
}
