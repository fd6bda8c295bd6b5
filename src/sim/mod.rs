//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep and a logical clock only
//! - Seeded RNG only, re-derived from the seed each tick
//! - Stable iteration order (collection order)
//! - No rendering, audio or platform dependencies

pub mod actor;
pub mod aliens;
pub mod boss;
pub mod collision;
pub mod entities;
pub mod events;
pub mod pool;
pub mod registry;
pub mod scheduler;
pub mod softbody;
pub mod state;
pub mod terrain;
pub mod tick;

pub use actor::{ActorId, ActorRef, Category, Damageable, HasPhysicsBody, Movable, Shooter, Side};
pub use boss::{Boss, BossKind, BossStatus};
pub use collision::{CollisionBroker, CollisionStats};
pub use events::GameEvent;
pub use pool::{Pool, PoolStats, Poolable};
pub use registry::EntityRegistry;
pub use scheduler::{Millis, Scheduler, TimerError, TimerSnapshot};
pub use softbody::{BodyError, SoftBody};
pub use state::{TimerAction, TimerKey, World};
pub use terrain::Terrain;
pub use tick::{TickInput, tick};
