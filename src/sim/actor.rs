//! Actor capabilities and identity
//!
//! Concrete actor kinds compose these traits instead of sharing a base type.
//! [`Category`] doubles as the collision priority tag.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::softbody::SoftBody;

pub type ActorId = u32;

/// Which team fired or owns something
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Player,
    Enemy,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Player => Side::Enemy,
            Side::Enemy => Side::Player,
        }
    }
}

/// One per registry collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Shield,
    Ship,
    Wingman,
    MoonBase,
    Turret,
    /// Barrage balloon tethered above a base
    Balloon,
    Alien,
    Hunter,
    Zapper,
    Destroyer,
    Queen,
    King,
    Nest,
    /// Alien plant growing into a nest
    Plant,
}

impl Category {
    /// What player fire tests, in order.
    ///
    /// The leading shield slot only ever matches enemy-owned shields, which
    /// nothing in play deploys; they exist when a registry is set up directly.
    pub const PLAYER_FIRE_ORDER: [Category; 9] = [
        Category::Shield,
        Category::Alien,
        Category::Hunter,
        Category::Zapper,
        Category::Destroyer,
        Category::Queen,
        Category::King,
        Category::Nest,
        Category::Plant,
    ];

    /// What enemy fire tests, in order
    pub const ENEMY_FIRE_ORDER: [Category; 6] = [
        Category::Shield,
        Category::Ship,
        Category::Wingman,
        Category::MoonBase,
        Category::Turret,
        Category::Balloon,
    ];

    /// Fixed test order for fire from `side`
    pub fn fire_order(side: Side) -> &'static [Category] {
        match side {
            Side::Player => &Self::PLAYER_FIRE_ORDER,
            Side::Enemy => &Self::ENEMY_FIRE_ORDER,
        }
    }

    /// Side that owns members of this category. Shields belong to either.
    pub fn side(self) -> Option<Side> {
        match self {
            Category::Shield => None,
            Category::Ship
            | Category::Wingman
            | Category::MoonBase
            | Category::Turret
            | Category::Balloon => Some(Side::Player),
            _ => Some(Side::Enemy),
        }
    }

    pub fn is_boss(self) -> bool {
        matches!(self, Category::Queen | Category::King)
    }
}

/// Non-owning reference to an actor. Always re-check it against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorRef {
    pub category: Category,
    pub id: ActorId,
}

impl ActorRef {
    pub fn new(category: Category, id: ActorId) -> Self {
        Self { category, id }
    }
}

pub trait Movable {
    fn pos(&self) -> Vec2;
    fn vel(&self) -> Vec2;
    fn set_pos(&mut self, pos: Vec2);
    fn set_vel(&mut self, vel: Vec2);

    fn push(&mut self, force: Vec2) {
        let vel = self.vel() + force;
        self.set_vel(vel);
    }
}

pub trait Damageable {
    fn health(&self) -> f32;
    fn set_health(&mut self, health: f32);
    /// Nominal diameter used by circle hit tests
    fn size(&self) -> f32;
    fn center(&self) -> Vec2;

    fn take_damage(&mut self, amount: f32) {
        let health = self.health() - amount;
        self.set_health(health);
    }

    fn is_destroyed(&self) -> bool {
        self.health() <= 0.0
    }

    /// Does a mover of diameter `size` at `p` overlap this actor?
    fn hit_by(&self, p: Vec2, size: f32) -> bool {
        p.distance(self.center()) < (self.size() + size) / 2.0
    }

    /// Is `p` within `radius` of this actor (area effects)?
    fn within(&self, p: Vec2, radius: f32) -> bool {
        p.distance(self.center()) < radius
    }
}

pub trait Shooter {
    /// Ticks until the next shot
    fn cooldown(&self) -> u32;
    fn set_cooldown(&mut self, ticks: u32);

    fn tick_cooldown(&mut self) {
        let c = self.cooldown();
        self.set_cooldown(c.saturating_sub(1));
    }

    fn ready(&self) -> bool {
        self.cooldown() == 0
    }
}

pub trait HasPhysicsBody {
    fn body(&self) -> &SoftBody;
    fn body_mut(&mut self) -> &mut SoftBody;
}

/// Anything with a stable identity in a registry collection
pub trait Identified {
    fn id(&self) -> ActorId;
}

/// Implements [`Movable`] for structs with `pos` and `vel` fields
macro_rules! impl_movable {
    ($($ty:ty),* $(,)?) => {
        $(impl $crate::sim::actor::Movable for $ty {
            fn pos(&self) -> glam::Vec2 { self.pos }
            fn vel(&self) -> glam::Vec2 { self.vel }
            fn set_pos(&mut self, pos: glam::Vec2) { self.pos = pos; }
            fn set_vel(&mut self, vel: glam::Vec2) { self.vel = vel; }
        })*
    };
}

/// Implements [`Identified`] for structs with an `id` field
macro_rules! impl_identified {
    ($($ty:ty),* $(,)?) => {
        $(impl $crate::sim::actor::Identified for $ty {
            fn id(&self) -> $crate::sim::actor::ActorId { self.id }
        })*
    };
}

pub(crate) use {impl_identified, impl_movable};

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy {
        pos: Vec2,
        health: f32,
    }

    impl Damageable for Dummy {
        fn health(&self) -> f32 {
            self.health
        }
        fn set_health(&mut self, health: f32) {
            self.health = health;
        }
        fn size(&self) -> f32 {
            20.0
        }
        fn center(&self) -> Vec2 {
            self.pos
        }
    }

    #[test]
    fn test_fire_orders_start_with_shields() {
        assert_eq!(Category::fire_order(Side::Player)[0], Category::Shield);
        assert_eq!(Category::fire_order(Side::Enemy)[0], Category::Shield);
        assert!(Category::fire_order(Side::Player)
            .iter()
            .skip(1)
            .all(|c| c.side() == Some(Side::Enemy)));
        assert!(Category::fire_order(Side::Enemy)
            .iter()
            .skip(1)
            .all(|c| c.side() == Some(Side::Player)));
    }

    #[test]
    fn test_every_category_in_one_fire_order() {
        let all = Category::PLAYER_FIRE_ORDER
            .iter()
            .chain(Category::ENEMY_FIRE_ORDER.iter())
            .filter(|c| **c != Category::Shield)
            .count();
        assert_eq!(all, 13);
        assert_eq!(Category::ENEMY_FIRE_ORDER.last(), Some(&Category::Balloon));
    }

    #[test]
    fn test_damage_and_hit_test() {
        let mut d = Dummy {
            pos: Vec2::new(100.0, 100.0),
            health: 2.0,
        };
        // (20 + 4) / 2 = 12
        assert!(d.hit_by(Vec2::new(111.0, 100.0), 4.0));
        assert!(!d.hit_by(Vec2::new(113.0, 100.0), 4.0));

        d.take_damage(1.0);
        assert!(!d.is_destroyed());
        d.take_damage(1.0);
        assert!(d.is_destroyed());
    }
}
