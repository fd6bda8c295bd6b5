//! Neptune Sim - simulation core of a side-scrolling lunar defense shooter
//!
//! Core modules:
//! - `sim`: Deterministic simulation (scheduler, pools, soft bodies, collisions, world state)
//! - `persistence`: Versioned snapshots with all-or-nothing restore
//! - `settings`: Data-driven simulation tuning

pub mod persistence;
pub mod settings;
pub mod sim;

pub use settings::{DamageTable, SimConfig};

use glam::Vec2;

/// Simulation configuration constants
pub mod consts {
    /// Fixed simulation timestep in milliseconds (60 Hz logical clock)
    pub const TICK_MS: f64 = 1000.0 / 60.0;

    /// World dimensions. The world wraps horizontally for actors.
    pub const WORLD_WIDTH: f32 = 6000.0;
    pub const WORLD_HEIGHT: f32 = 800.0;

    /// Downward pull on soft bodies (pixels/tick²)
    pub const GRAVITY: f32 = 0.02;
    /// Downward pull on bombs (pixels/tick²)
    pub const BOMB_GRAVITY: f32 = 0.05;
    /// Share of the wind applied to soft bodies and bombs
    pub const WIND_FACTOR: f32 = 0.1;

    /// Soft body defaults
    pub const CORNER_MASS: f32 = 3.0;
    pub const BODY_FRICTION: f32 = 0.99;
    pub const ROLLING_SENSITIVITY: f32 = 0.01;
    pub const PERIMETER_STRENGTH: f32 = 0.8;
    pub const BRACING_STRENGTH: f32 = 0.3;
    /// Corners hover this far above the terrain line
    pub const SURFACE_GAP: f32 = 2.0;
    /// Vertical velocity kept (and inverted) after a corner hits the ground
    pub const GROUND_BOUNCE: f32 = 0.5;
    /// Per-tick chance that a patrolling body turns around
    pub const DIRECTION_FLIP_CHANCE: f64 = 0.001;

    /// Pool capacities
    pub const BULLET_POOL_CAPACITY: usize = 100;
    pub const PARTICLE_POOL_CAPACITY: usize = 1000;

    /// Bullet defaults
    pub const BULLET_SIZE: f32 = 5.0;
    pub const PLAYER_BULLET_SPEED: f32 = 10.0;
    pub const ENEMY_BULLET_SPEED: f32 = 5.0;

    /// Bomb defaults
    pub const BOMB_SIZE: f32 = 10.0;
    pub const BOMB_RADIUS: f32 = 30.0;
    pub const BOMB_DAMAGE: f32 = 3.0;
    pub const CRATER_DEPTH: f32 = 25.0;

    /// Shields
    pub const MAX_SHIELDS: usize = 3;
    pub const SHIELD_RADIUS: f32 = 100.0;
    pub const SHIELD_HEALTH: f32 = 100.0;

    /// Bosses
    pub const QUEEN_SIZE: f32 = 300.0;
    pub const QUEEN_HEALTH: f32 = 350.0;
    pub const QUEEN_CORNERS: usize = 50;
    pub const KING_SIZE: f32 = 500.0;
    pub const KING_HEALTH: f32 = 1000.0;
    pub const KING_CORNERS: usize = 60;
    pub const KING_PHASE_TICKS: u32 = 1800;
    pub const LASER_RANGE: f32 = 800.0;
    pub const LASER_DURATION_TICKS: u32 = 120;
}

/// Wrap an x coordinate into `[0, width)`
#[inline]
pub fn wrap_x(x: f32, width: f32) -> f32 {
    if width <= 0.0 {
        return x;
    }
    let wrapped = x.rem_euclid(width);
    // rem_euclid can round up to exactly `width` for tiny negative inputs
    if wrapped >= width { 0.0 } else { wrapped }
}

/// Shortest signed horizontal offset from `from` to `to` on a wrapping world
#[inline]
pub fn wrapped_dx(from: f32, to: f32, width: f32) -> f32 {
    let mut dx = to - from;
    if width > 0.0 {
        if dx > width / 2.0 {
            dx -= width;
        } else if dx < -width / 2.0 {
            dx += width;
        }
    }
    dx
}

/// Distance from point `p` to the segment `a`-`b`
#[inline]
pub fn dist_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}
