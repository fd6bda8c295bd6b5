//! Mass-spring soft bodies
//!
//! A body is a ring of point masses. Perimeter springs join neighbours and
//! bracing springs join opposite corners so the ring can't fold flat. Spring
//! forces are accumulated into each corner and picked up by the next
//! integration step. The body's position is always the mean of its corners.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::terrain::Terrain;
use crate::consts::*;

/// Invalid soft body data
#[derive(Debug, Error, PartialEq)]
pub enum BodyError {
    #[error("soft body needs at least 3 corners, got {0}")]
    TooFewCorners(usize),
    #[error("corner {0} has non-finite state or non-positive mass")]
    BadCorner(usize),
    #[error("spring {spring} references corner {corner} but the body has {len}")]
    SpringIndex {
        spring: usize,
        corner: usize,
        len: usize,
    },
    #[error("spring {0} joins a corner to itself")]
    SelfSpring(usize),
    #[error("spring {0} rest length must be positive")]
    RestLength(usize),
    #[error("spring {0} strength must be in (0, 1]")]
    Strength(usize),
    #[error("body {0} is out of range")]
    Parameter(&'static str),
}

/// Point mass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Corner {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Force accumulator already divided by mass
    #[serde(skip)]
    pub acc: Vec2,
    pub mass: f32,
}

impl Corner {
    pub fn new(pos: Vec2, mass: f32) -> Self {
        Self {
            pos,
            vel: Vec2::ZERO,
            acc: Vec2::ZERO,
            mass,
        }
    }

    #[inline]
    pub fn apply_force(&mut self, force: Vec2) {
        self.acc += force / self.mass;
    }

    /// Semi-implicit Euler step, then damping
    #[inline]
    pub fn integrate(&mut self, friction: f32) {
        self.vel += self.acc;
        self.pos += self.vel;
        self.acc = Vec2::ZERO;
        self.vel *= friction;
    }
}

/// Damped spring between two corners of the same body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spring {
    pub a: usize,
    pub b: usize,
    pub rest_length: f32,
    pub strength: f32,
}

impl Spring {
    pub fn length(&self, corners: &[Corner]) -> Option<f32> {
        Some(corners.get(self.b)?.pos.distance(corners.get(self.a)?.pos))
    }

    /// Push or pull both ends toward the rest length
    pub fn apply(&self, corners: &mut [Corner]) {
        let (Some(a), Some(b)) = (corners.get(self.a), corners.get(self.b)) else {
            return;
        };
        let delta = b.pos - a.pos;
        let len = delta.length();
        // Coincident corners have no axis to push along
        if len <= f32::EPSILON {
            return;
        }
        let force = delta / len * (self.strength * (len - self.rest_length));
        corners[self.a].apply_force(force);
        corners[self.b].apply_force(-force);
    }
}

/// Construction parameters for a ring body
#[derive(Debug, Clone, Copy)]
pub struct BodyParams {
    pub mass: f32,
    pub friction: f32,
    pub perimeter_strength: f32,
    pub bracing_strength: f32,
    pub rolling_sensitivity: f32,
}

impl Default for BodyParams {
    fn default() -> Self {
        Self {
            mass: CORNER_MASS,
            friction: BODY_FRICTION,
            perimeter_strength: PERIMETER_STRENGTH,
            bracing_strength: BRACING_STRENGTH,
            rolling_sensitivity: ROLLING_SENSITIVITY,
        }
    }
}

/// Everything outside the body that pushes on it for one tick
#[derive(Debug, Clone, Copy)]
pub struct BodyEnv<'a> {
    pub gravity: Vec2,
    pub wind: Vec2,
    pub terrain: &'a Terrain,
    pub world_width: f32,
}

/// Serialized form. Springs refer to corners by index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftBodySnapshot {
    pub corners: Vec<Corner>,
    pub springs: Vec<Spring>,
    pub size: f32,
    pub direction: f32,
    pub drift: Vec2,
    pub friction: f32,
    pub rolling_sensitivity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SoftBodySnapshot", into = "SoftBodySnapshot")]
pub struct SoftBody {
    corners: Vec<Corner>,
    springs: Vec<Spring>,
    /// Nominal diameter
    pub size: f32,
    /// Patrol direction, +1 or -1
    pub direction: f32,
    /// Rigid velocity shared by all corners
    pub drift: Vec2,
    pub friction: f32,
    pub rolling_sensitivity: f32,
    /// Force applied to every corner on the next step
    impulse: Vec2,
}

impl SoftBody {
    /// Regular polygon of `n` corners around `center`
    pub fn ring(center: Vec2, radius: f32, n: usize, params: &BodyParams) -> Self {
        let n = n.max(3);
        let radius = radius.max(1.0);
        let mass = if params.mass > 0.0 { params.mass } else { CORNER_MASS };
        let perimeter = params.perimeter_strength.clamp(0.001, 1.0);
        let bracing = params.bracing_strength.clamp(0.001, 1.0);

        let corners: Vec<Corner> = (0..n)
            .map(|i| {
                let angle = std::f32::consts::TAU * i as f32 / n as f32;
                Corner::new(center + Vec2::new(angle.cos(), angle.sin()) * radius, mass)
            })
            .collect();

        let mut springs = Vec::with_capacity(n + n / 2);
        let rest = |a: usize, b: usize| corners[a].pos.distance(corners[b].pos);
        for i in 0..n {
            let next = (i + 1) % n;
            springs.push(Spring {
                a: i,
                b: next,
                rest_length: rest(i, next),
                strength: perimeter,
            });
        }
        for i in 0..n / 2 {
            let across = i + n / 2;
            springs.push(Spring {
                a: i,
                b: across,
                rest_length: rest(i, across),
                strength: bracing,
            });
        }

        Self {
            corners,
            springs,
            size: radius * 2.0,
            direction: 1.0,
            drift: Vec2::ZERO,
            friction: params.friction.clamp(0.0, 1.0),
            rolling_sensitivity: params.rolling_sensitivity,
            impulse: Vec2::ZERO,
        }
    }

    pub fn corners(&self) -> &[Corner] {
        &self.corners
    }

    pub fn springs(&self) -> &[Spring] {
        &self.springs
    }

    /// Mean of all corner positions
    pub fn centroid(&self) -> Vec2 {
        if self.corners.is_empty() {
            return Vec2::ZERO;
        }
        self.corners.iter().map(|c| c.pos).sum::<Vec2>() / self.corners.len() as f32
    }

    pub fn radius(&self) -> f32 {
        self.size / 2.0
    }

    /// Axis-aligned bounds of the corners
    pub fn bounds(&self) -> (Vec2, Vec2) {
        self.corners.iter().fold(
            (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
            |(lo, hi), c| (lo.min(c.pos), hi.max(c.pos)),
        )
    }

    /// Queue a push on every corner for the next step
    pub fn apply_impulse(&mut self, force: Vec2) {
        self.impulse += force;
    }

    /// Rigidly move every corner
    pub fn translate(&mut self, delta: Vec2) {
        for corner in &mut self.corners {
            corner.pos += delta;
        }
    }

    /// Move the body so its centroid lands on `center`, dropping all motion
    pub fn teleport(&mut self, center: Vec2) {
        let delta = center - self.centroid();
        self.translate(delta);
        self.drift = Vec2::ZERO;
        for corner in &mut self.corners {
            corner.vel = Vec2::ZERO;
            corner.acc = Vec2::ZERO;
        }
    }

    /// Advance one tick
    pub fn step(&mut self, env: &BodyEnv, rng: &mut impl Rng) {
        let external = env.gravity + env.wind * WIND_FACTOR + std::mem::take(&mut self.impulse);
        let mut roll = Vec2::ZERO;
        let mut left = f32::INFINITY;
        let mut right = f32::NEG_INFINITY;

        for corner in &mut self.corners {
            corner.apply_force(external);
            corner.integrate(self.friction);

            let surface = env.terrain.surface_y(corner.pos.x);
            if corner.pos.y > surface - SURFACE_GAP {
                corner.pos.y = surface - SURFACE_GAP;
                corner.vel.y *= -GROUND_BOUNCE;

                // Roll along the ground in the patrol direction
                let ahead = env.terrain.surface_y(corner.pos.x + self.direction);
                let angle = (ahead - surface).atan2(self.direction);
                let jitter = 1.0 + rng.random_range(-0.1..0.1);
                roll += Vec2::new(angle.cos(), angle.sin()) * self.rolling_sensitivity * jitter;
            }

            left = left.min(corner.pos.x);
            right = right.max(corner.pos.x);
        }

        // Ease off approaching the world edges
        let edge = left.min(env.world_width - right) / self.radius().max(f32::EPSILON);
        if edge < 1.0 {
            roll *= edge.max(0.0);
        }

        if left <= 0.0 || right >= env.world_width {
            self.direction = if left <= 0.0 { 1.0 } else { -1.0 };
            self.drift.x = self.drift.x.abs() * self.direction;
            self.translate(Vec2::new(self.direction * self.size / 4.0, 0.0));
        } else if rng.random_bool(DIRECTION_FLIP_CHANCE) {
            self.direction = -self.direction;
        }

        for spring in &self.springs {
            spring.apply(&mut self.corners);
        }

        self.drift = (self.drift + roll) * self.friction;
        let drift = self.drift;
        for corner in &mut self.corners {
            corner.pos += drift;
            let surface = env.terrain.surface_y(corner.pos.x) - SURFACE_GAP;
            if corner.pos.y > surface {
                corner.pos.y = surface;
            }
        }
    }
}

impl TryFrom<SoftBodySnapshot> for SoftBody {
    type Error = BodyError;

    fn try_from(snap: SoftBodySnapshot) -> Result<Self, Self::Error> {
        let len = snap.corners.len();
        if len < 3 {
            return Err(BodyError::TooFewCorners(len));
        }
        for (i, c) in snap.corners.iter().enumerate() {
            if !(c.pos.is_finite() && c.vel.is_finite() && c.mass.is_finite() && c.mass > 0.0) {
                return Err(BodyError::BadCorner(i));
            }
        }
        for (i, s) in snap.springs.iter().enumerate() {
            for corner in [s.a, s.b] {
                if corner >= len {
                    return Err(BodyError::SpringIndex {
                        spring: i,
                        corner,
                        len,
                    });
                }
            }
            if s.a == s.b {
                return Err(BodyError::SelfSpring(i));
            }
            if !(s.rest_length.is_finite() && s.rest_length > 0.0) {
                return Err(BodyError::RestLength(i));
            }
            if !(s.strength > 0.0 && s.strength <= 1.0) {
                return Err(BodyError::Strength(i));
            }
        }
        if !(snap.size.is_finite() && snap.size > 0.0) {
            return Err(BodyError::Parameter("size"));
        }
        if !(snap.friction > 0.0 && snap.friction <= 1.0) {
            return Err(BodyError::Parameter("friction"));
        }
        if !snap.drift.is_finite() || !snap.rolling_sensitivity.is_finite() {
            return Err(BodyError::Parameter("drift"));
        }

        Ok(Self {
            corners: snap.corners,
            springs: snap.springs,
            size: snap.size,
            direction: if snap.direction < 0.0 { -1.0 } else { 1.0 },
            drift: snap.drift,
            friction: snap.friction,
            rolling_sensitivity: snap.rolling_sensitivity,
            impulse: Vec2::ZERO,
        })
    }
}

impl From<SoftBody> for SoftBodySnapshot {
    fn from(body: SoftBody) -> Self {
        Self {
            corners: body.corners,
            springs: body.springs,
            size: body.size,
            direction: body.direction,
            drift: body.drift,
            friction: body.friction,
            rolling_sensitivity: body.rolling_sensitivity,
        }
    }
}
