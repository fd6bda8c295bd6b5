//! Semantic events raised by the simulation
//!
//! Audio, narration and UI layers drain these from the world after each
//! tick. The simulation never depends on anyone listening.

use glam::Vec2;

use super::actor::ActorRef;
use super::boss::BossKind;

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// An actor was removed from its collection after reaching zero health
    ActorDestroyed { actor: ActorRef, pos: Vec2 },
    ShipHit { damage: f32 },
    ShipZapped,
    PlayerDestroyed,
    ShieldDeployed { actor: ActorRef },
    BaseHealed { actor: ActorRef, health: f32 },
    BombExploded { pos: Vec2, radius: f32, hits: usize },
    MinionSpawned { actor: ActorRef },
    /// A fully grown plant was replaced by a nest
    PlantRooted { plant: ActorRef, nest: ActorRef },
    BalloonLaunched { actor: ActorRef },
    BalloonPopped { actor: ActorRef, by: ActorRef },
    MeteorShowerStarted,
    MeteorShowerEnded,
    MeteorImpact { pos: Vec2, hits: usize },

    BossArrived { boss: BossKind },
    BossActive { boss: BossKind },
    BossLeaving { boss: BossKind },
    BossDeparted { boss: BossKind },
    BossDied { boss: BossKind, pos: Vec2 },
    BossPhase { boss: BossKind, phase: u8 },
    BurstDefense { boss: BossKind },
    LaserFired { boss: BossKind, target: ActorRef },
    LaserLost { boss: BossKind },
    Teleported { boss: BossKind, to: Vec2 },
    /// Every small enemy, nest and plant went down with the king
    HostilesCleared { count: usize },

    LevelStarted { level: u32 },
    Victory,
}
