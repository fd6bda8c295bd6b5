//! Per-category live actor collections
//!
//! Each collection owns its members. Anything that needs to point at an actor
//! from elsewhere holds an [`ActorRef`] and looks it up here on every use.
//! Destroyed actors stay in place until [`EntityRegistry::sweep_destroyed`]
//! runs, but are invisible to lookups and hit tests from the moment their
//! health reaches zero.

use std::ops::ControlFlow;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::actor::{ActorId, ActorRef, Category, Damageable, Identified, Side};
use super::aliens::{Alien, AlienKind, Nest, Plant};
use super::boss::{Boss, BossKind};
use super::entities::{BALLOON_RAM_DAMAGE, Balloon, MoonBase, Shield, Ship, Turret, Wingman};
use super::events::GameEvent;
use super::terrain::Terrain;
use crate::consts::*;
use crate::wrapped_dx;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRegistry {
    pub ship: Ship,
    pub shields: Vec<Shield>,
    pub wingmen: Vec<Wingman>,
    pub moon_bases: Vec<MoonBase>,
    pub turrets: Vec<Turret>,
    pub balloons: Vec<Balloon>,
    pub aliens: Vec<Alien>,
    pub hunters: Vec<Alien>,
    pub zappers: Vec<Alien>,
    pub destroyers: Vec<Alien>,
    pub nests: Vec<Nest>,
    pub plants: Vec<Plant>,
    pub queen: Option<Boss>,
    pub king: Option<Boss>,
    pub world_width: f32,
    next_id: ActorId,
}

fn find<T: Damageable + Identified>(items: &[T], id: ActorId) -> Option<&dyn Damageable> {
    items
        .iter()
        .find(|i| i.id() == id)
        .map(|i| i as &dyn Damageable)
}

fn find_mut<T: Damageable + Identified>(items: &mut [T], id: ActorId) -> Option<&mut dyn Damageable> {
    items
        .iter_mut()
        .find(|i| i.id() == id)
        .map(|i| i as &mut dyn Damageable)
}

fn visit<T, F>(items: &mut [T], f: &mut F) -> ControlFlow<()>
where
    T: Damageable + Identified,
    F: FnMut(ActorId, &mut dyn Damageable) -> ControlFlow<()>,
{
    for item in items.iter_mut().filter(|i| !i.is_destroyed()) {
        f(item.id(), item)?;
    }
    ControlFlow::Continue(())
}

fn report(removed: &[(ActorRef, Vec2)], events: &mut Vec<GameEvent>) {
    for &(actor, pos) in removed {
        events.push(GameEvent::ActorDestroyed { actor, pos });
    }
}

/// Remove destroyed members, walking from the end
fn sweep<T: Damageable + Identified>(
    items: &mut Vec<T>,
    category: Category,
    removed: &mut Vec<(ActorRef, Vec2)>,
) {
    for i in (0..items.len()).rev() {
        if items[i].is_destroyed() {
            let item = items.remove(i);
            removed.push((ActorRef::new(category, item.id()), item.center()));
        }
    }
}

impl EntityRegistry {
    pub fn new(ship: Ship) -> Self {
        let next_id = ship.id + 1;
        Self {
            ship,
            shields: Vec::new(),
            wingmen: Vec::new(),
            moon_bases: Vec::new(),
            turrets: Vec::new(),
            balloons: Vec::new(),
            aliens: Vec::new(),
            hunters: Vec::new(),
            zappers: Vec::new(),
            destroyers: Vec::new(),
            nests: Vec::new(),
            plants: Vec::new(),
            queen: None,
            king: None,
            world_width: WORLD_WIDTH,
            next_id,
        }
    }

    /// Allocate a fresh actor id
    pub fn next_id(&mut self) -> ActorId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// The id the next allocation will return
    pub fn peek_next_id(&self) -> ActorId {
        self.next_id
    }

    pub fn aliens_of(&self, kind: AlienKind) -> &Vec<Alien> {
        match kind {
            AlienKind::Drone => &self.aliens,
            AlienKind::Hunter => &self.hunters,
            AlienKind::Zapper => &self.zappers,
            AlienKind::Destroyer => &self.destroyers,
        }
    }

    pub fn aliens_of_mut(&mut self, kind: AlienKind) -> &mut Vec<Alien> {
        match kind {
            AlienKind::Drone => &mut self.aliens,
            AlienKind::Hunter => &mut self.hunters,
            AlienKind::Zapper => &mut self.zappers,
            AlienKind::Destroyer => &mut self.destroyers,
        }
    }

    pub fn spawn_alien(
        &mut self,
        kind: AlienKind,
        pos: Vec2,
        level: u32,
        rng: &mut impl Rng,
    ) -> ActorRef {
        let id = self.next_id();
        self.aliens_of_mut(kind).push(Alien::new(id, kind, pos, level, rng));
        ActorRef::new(kind.category(), id)
    }

    /// Seed a plant on the surface at `x`
    pub fn spawn_plant(
        &mut self,
        x: f32,
        max_size: f32,
        terrain: &Terrain,
        rng: &mut impl Rng,
    ) -> ActorRef {
        let id = self.next_id();
        self.plants.push(Plant::new(id, x, max_size, terrain, rng));
        ActorRef::new(Category::Plant, id)
    }

    /// Add a shield, dropping the owner's oldest once over the cap
    pub fn add_shield(&mut self, pos: Vec2, owner: Side) -> ActorRef {
        let id = self.next_id();
        self.shields.push(Shield::new(id, pos, owner));
        while self.shields.iter().filter(|s| s.owner == owner).count() > MAX_SHIELDS {
            if let Some(oldest) = self.shields.iter().position(|s| s.owner == owner) {
                self.shields.remove(oldest);
            }
        }
        ActorRef::new(Category::Shield, id)
    }

    pub fn boss(&self, kind: BossKind) -> Option<&Boss> {
        match kind {
            BossKind::Queen => self.queen.as_ref(),
            BossKind::King => self.king.as_ref(),
        }
    }

    pub fn boss_slot(&mut self, kind: BossKind) -> &mut Option<Boss> {
        match kind {
            BossKind::Queen => &mut self.queen,
            BossKind::King => &mut self.king,
        }
    }

    /// Small enemies still flying (bosses and nests excluded)
    pub fn enemy_count(&self) -> usize {
        self.aliens.len() + self.hunters.len() + self.zappers.len() + self.destroyers.len()
    }

    /// Look up a live actor
    pub fn get(&self, r: ActorRef) -> Option<&dyn Damageable> {
        let actor = match r.category {
            Category::Ship => (self.ship.id == r.id).then_some(&self.ship as &dyn Damageable),
            Category::Shield => find(&self.shields, r.id),
            Category::Wingman => find(&self.wingmen, r.id),
            Category::MoonBase => find(&self.moon_bases, r.id),
            Category::Turret => find(&self.turrets, r.id),
            Category::Balloon => find(&self.balloons, r.id),
            Category::Alien => find(&self.aliens, r.id),
            Category::Hunter => find(&self.hunters, r.id),
            Category::Zapper => find(&self.zappers, r.id),
            Category::Destroyer => find(&self.destroyers, r.id),
            Category::Nest => find(&self.nests, r.id),
            Category::Plant => find(&self.plants, r.id),
            Category::Queen => self.queen.as_ref().filter(|b| b.id == r.id).map(|b| b as &dyn Damageable),
            Category::King => self.king.as_ref().filter(|b| b.id == r.id).map(|b| b as &dyn Damageable),
        };
        actor.filter(|a| !a.is_destroyed())
    }

    pub fn get_mut(&mut self, r: ActorRef) -> Option<&mut dyn Damageable> {
        let actor = match r.category {
            Category::Ship => {
                (self.ship.id == r.id).then_some(&mut self.ship as &mut dyn Damageable)
            }
            Category::Shield => find_mut(&mut self.shields, r.id),
            Category::Wingman => find_mut(&mut self.wingmen, r.id),
            Category::MoonBase => find_mut(&mut self.moon_bases, r.id),
            Category::Turret => find_mut(&mut self.turrets, r.id),
            Category::Balloon => find_mut(&mut self.balloons, r.id),
            Category::Alien => find_mut(&mut self.aliens, r.id),
            Category::Hunter => find_mut(&mut self.hunters, r.id),
            Category::Zapper => find_mut(&mut self.zappers, r.id),
            Category::Destroyer => find_mut(&mut self.destroyers, r.id),
            Category::Nest => find_mut(&mut self.nests, r.id),
            Category::Plant => find_mut(&mut self.plants, r.id),
            Category::Queen => self
                .queen
                .as_mut()
                .filter(|b| b.id == r.id)
                .map(|b| b as &mut dyn Damageable),
            Category::King => self
                .king
                .as_mut()
                .filter(|b| b.id == r.id)
                .map(|b| b as &mut dyn Damageable),
        };
        actor.filter(|a| !a.is_destroyed())
    }

    /// Is the referenced actor still alive and registered?
    pub fn contains(&self, r: ActorRef) -> bool {
        self.get(r).is_some()
    }

    pub fn position_of(&self, r: ActorRef) -> Option<Vec2> {
        self.get(r).map(|a| a.center())
    }

    /// Damage the referenced actor. Returns false if it is gone.
    pub fn damage(&mut self, r: ActorRef, amount: f32) -> bool {
        match self.get_mut(r) {
            Some(actor) => {
                actor.take_damage(amount);
                true
            }
            None => false,
        }
    }

    /// Call `f` on each live member of `category`, stopping at the first `Break`.
    ///
    /// Shields are limited to those owned by `owner`.
    pub fn visit_targets_mut<F>(&mut self, category: Category, owner: Side, mut f: F) -> ControlFlow<()>
    where
        F: FnMut(ActorId, &mut dyn Damageable) -> ControlFlow<()>,
    {
        match category {
            Category::Ship => {
                if !self.ship.is_destroyed() {
                    f(self.ship.id, &mut self.ship)?;
                }
                ControlFlow::Continue(())
            }
            Category::Shield => {
                for shield in self
                    .shields
                    .iter_mut()
                    .filter(|s| s.owner == owner && !s.is_destroyed())
                {
                    f(shield.id, shield)?;
                }
                ControlFlow::Continue(())
            }
            Category::Wingman => visit(&mut self.wingmen, &mut f),
            Category::MoonBase => visit(&mut self.moon_bases, &mut f),
            Category::Turret => visit(&mut self.turrets, &mut f),
            Category::Balloon => visit(&mut self.balloons, &mut f),
            Category::Alien => visit(&mut self.aliens, &mut f),
            Category::Hunter => visit(&mut self.hunters, &mut f),
            Category::Zapper => visit(&mut self.zappers, &mut f),
            Category::Destroyer => visit(&mut self.destroyers, &mut f),
            Category::Nest => visit(&mut self.nests, &mut f),
            Category::Plant => visit(&mut self.plants, &mut f),
            Category::Queen | Category::King => {
                let slot = if category == Category::Queen {
                    &mut self.queen
                } else {
                    &mut self.king
                };
                match slot {
                    Some(boss) if !boss.is_destroyed() => f(boss.id, boss),
                    _ => ControlFlow::Continue(()),
                }
            }
        }
    }

    fn distance(&self, a: Vec2, b: Vec2) -> f32 {
        Vec2::new(wrapped_dx(a.x, b.x, self.world_width), b.y - a.y).length()
    }

    fn nearest_of<'a>(
        &self,
        from: Vec2,
        range: f32,
        candidates: impl Iterator<Item = (ActorRef, &'a dyn Damageable)>,
    ) -> Option<ActorRef> {
        candidates
            .filter(|(_, a)| !a.is_destroyed())
            .map(|(r, a)| (r, self.distance(from, a.center())))
            .filter(|(_, d)| *d < range)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(r, _)| r)
    }

    /// Closest ship, wingman, base or turret within `range`
    pub fn nearest_player_target(&self, from: Vec2, range: f32) -> Option<ActorRef> {
        let ship = std::iter::once((
            ActorRef::new(Category::Ship, self.ship.id),
            &self.ship as &dyn Damageable,
        ));
        let wingmen = self
            .wingmen
            .iter()
            .map(|w| (ActorRef::new(Category::Wingman, w.id), w as &dyn Damageable));
        let bases = self
            .moon_bases
            .iter()
            .map(|b| (ActorRef::new(Category::MoonBase, b.id), b as &dyn Damageable));
        let turrets = self
            .turrets
            .iter()
            .map(|t| (ActorRef::new(Category::Turret, t.id), t as &dyn Damageable));
        self.nearest_of(from, range, ship.chain(wingmen).chain(bases).chain(turrets))
    }

    /// Closest player structure (base, turret or player shield), any distance
    pub fn nearest_structure(&self, from: Vec2) -> Option<ActorRef> {
        let bases = self
            .moon_bases
            .iter()
            .map(|b| (ActorRef::new(Category::MoonBase, b.id), b as &dyn Damageable));
        let turrets = self
            .turrets
            .iter()
            .map(|t| (ActorRef::new(Category::Turret, t.id), t as &dyn Damageable));
        let shields = self
            .shields
            .iter()
            .filter(|s| s.owner == Side::Player)
            .map(|s| (ActorRef::new(Category::Shield, s.id), s as &dyn Damageable));
        self.nearest_of(from, f32::INFINITY, bases.chain(turrets).chain(shields))
    }

    /// Position of the closest enemy within `range`, bosses included
    pub fn nearest_enemy_pos(&self, from: Vec2, range: f32) -> Option<Vec2> {
        let small = [&self.aliens, &self.hunters, &self.zappers, &self.destroyers]
            .into_iter()
            .flatten()
            .map(|a| (ActorRef::new(a.category(), a.id), a as &dyn Damageable));
        let nests = self
            .nests
            .iter()
            .map(|n| (ActorRef::new(Category::Nest, n.id), n as &dyn Damageable));
        let plants = self
            .plants
            .iter()
            .map(|p| (ActorRef::new(Category::Plant, p.id), p as &dyn Damageable));
        let bosses = [&self.queen, &self.king]
            .into_iter()
            .flatten()
            .map(|b| (b.actor_ref(), b as &dyn Damageable));
        let nearest = self.nearest_of(
            from,
            range,
            small.chain(nests).chain(plants).chain(bosses),
        )?;
        self.position_of(nearest)
    }

    /// Re-seat ground structures after the surface changed
    pub fn settle_on_terrain(&mut self, terrain: &Terrain) {
        for base in &mut self.moon_bases {
            base.settle(terrain);
        }
        for turret in &mut self.turrets {
            turret.settle(terrain);
        }
        for nest in &mut self.nests {
            nest.settle(terrain);
        }
        for plant in &mut self.plants {
            plant.settle(terrain);
        }
    }

    /// Pop every balloon an alien has flown into. Each pop costs the alien
    /// [`BALLOON_RAM_DAMAGE`]. Returns `(balloon, alien)` pairs.
    pub fn ram_balloons(&mut self) -> Vec<(ActorRef, ActorRef)> {
        let mut pops = Vec::new();
        for balloon in self.balloons.iter_mut().filter(|b| !b.is_destroyed()) {
            let groups = [
                &mut self.aliens,
                &mut self.hunters,
                &mut self.zappers,
                &mut self.destroyers,
            ];
            let rammer = groups
                .into_iter()
                .flatten()
                .find(|a| !a.is_destroyed() && a.hit_by(balloon.pos, balloon.size));
            if let Some(alien) = rammer {
                alien.take_damage(BALLOON_RAM_DAMAGE);
                balloon.set_health(0.0);
                pops.push((
                    ActorRef::new(Category::Balloon, balloon.id),
                    ActorRef::new(alien.category(), alien.id),
                ));
            }
        }
        pops
    }

    /// Destroy every small enemy, nest and plant at once, raising an event for each
    pub fn clear_hostiles(&mut self, events: &mut Vec<GameEvent>) -> Vec<ActorRef> {
        for alien in [
            &mut self.aliens,
            &mut self.hunters,
            &mut self.zappers,
            &mut self.destroyers,
        ]
        .into_iter()
        .flatten()
        {
            alien.set_health(0.0);
        }
        for nest in &mut self.nests {
            nest.set_health(0.0);
        }
        for plant in &mut self.plants {
            plant.set_health(0.0);
        }

        let mut removed = Vec::new();
        sweep(&mut self.aliens, Category::Alien, &mut removed);
        sweep(&mut self.hunters, Category::Hunter, &mut removed);
        sweep(&mut self.zappers, Category::Zapper, &mut removed);
        sweep(&mut self.destroyers, Category::Destroyer, &mut removed);
        sweep(&mut self.nests, Category::Nest, &mut removed);
        sweep(&mut self.plants, Category::Plant, &mut removed);
        report(&removed, events);
        removed.into_iter().map(|(r, _)| r).collect()
    }

    /// Remove every destroyed actor, raising an event for each.
    ///
    /// The ship is never removed here. Returns what was removed.
    pub fn sweep_destroyed(&mut self, events: &mut Vec<GameEvent>) -> Vec<ActorRef> {
        let mut removed = Vec::new();
        sweep(&mut self.shields, Category::Shield, &mut removed);
        sweep(&mut self.wingmen, Category::Wingman, &mut removed);
        sweep(&mut self.moon_bases, Category::MoonBase, &mut removed);
        sweep(&mut self.turrets, Category::Turret, &mut removed);
        sweep(&mut self.balloons, Category::Balloon, &mut removed);
        sweep(&mut self.aliens, Category::Alien, &mut removed);
        sweep(&mut self.hunters, Category::Hunter, &mut removed);
        sweep(&mut self.zappers, Category::Zapper, &mut removed);
        sweep(&mut self.destroyers, Category::Destroyer, &mut removed);
        sweep(&mut self.nests, Category::Nest, &mut removed);
        sweep(&mut self.plants, Category::Plant, &mut removed);
        report(&removed, events);

        for kind in [BossKind::Queen, BossKind::King] {
            let slot = self.boss_slot(kind);
            if slot.as_ref().is_some_and(|b| b.is_destroyed()) {
                if let Some(boss) = slot.take() {
                    let pos = boss.centroid();
                    log::info!("{kind:?} destroyed at ({:.0}, {:.0})", pos.x, pos.y);
                    events.push(GameEvent::BossDied { boss: kind, pos });
                    removed.push((boss.actor_ref(), pos));
                }
            }
        }

        removed.into_iter().map(|(r, _)| r).collect()
    }

    /// Every registered actor id, ship first
    pub fn ids(&self) -> Vec<ActorId> {
        let mut ids = vec![self.ship.id];
        ids.extend(self.shields.iter().map(|a| a.id));
        ids.extend(self.wingmen.iter().map(|a| a.id));
        ids.extend(self.moon_bases.iter().map(|a| a.id));
        ids.extend(self.turrets.iter().map(|a| a.id));
        ids.extend(self.balloons.iter().map(|a| a.id));
        for kind in [
            AlienKind::Drone,
            AlienKind::Hunter,
            AlienKind::Zapper,
            AlienKind::Destroyer,
        ] {
            ids.extend(self.aliens_of(kind).iter().map(|a| a.id));
        }
        ids.extend(self.nests.iter().map(|a| a.id));
        ids.extend(self.plants.iter().map(|a| a.id));
        ids.extend(self.queen.iter().chain(self.king.iter()).map(|b| b.id));
        ids
    }
}
