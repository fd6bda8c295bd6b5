//! Simulation tuning
//!
//! Loaded from an optional JSON file. Missing fields fall back to defaults,
//! so a config file only needs to list what it changes.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;

/// Failure reading or writing a config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config field {0} is out of range")]
    Invalid(&'static str),
}

/// Smallest playable world height. The sky band aliens spawn in and the
/// terrain band below mid-height both need room.
pub const MIN_WORLD_HEIGHT: f32 = 300.0;

/// Damage dealt per hit, by target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DamageTable {
    /// Base damage of a player bullet (scaled by `SimConfig::damage_multiplier`)
    pub player_bullet: f32,
    /// Enemy bullet vs shield
    pub shield: f32,
    /// Enemy bullet vs the player ship
    pub ship: f32,
    /// Enemy bullet vs a wingman
    pub wingman: f32,
    /// Enemy bullet vs a moon base
    pub moon_base: f32,
    /// Enemy bullet vs a turret
    pub turret: f32,
    /// Bomb explosion damage (area effect)
    pub bomb: f32,
    /// Bomb explosion radius
    pub bomb_radius: f32,
    /// Boss laser damage per tick
    pub laser: f32,
    /// Player bullet vs an alien plant (not scaled by upgrades)
    pub plant: f32,
    /// Enemy bullet vs a barrage balloon
    pub balloon: f32,
    /// Meteor ground blast, to everything in range
    pub meteor: f32,
    /// Meteor striking the ship in flight
    pub meteor_ship: f32,
}

impl Default for DamageTable {
    fn default() -> Self {
        Self {
            player_bullet: 1.0,
            shield: 10.0,
            ship: 500.0,
            wingman: 10.0,
            moon_base: 10.0,
            turret: 1.0,
            bomb: BOMB_DAMAGE,
            bomb_radius: BOMB_RADIUS,
            laser: 5.0,
            plant: 10.0,
            balloon: 1.0,
            meteor: 100.0,
            meteor_ship: 2000.0,
        }
    }
}

/// Simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    // === World ===
    pub world_width: f32,
    pub world_height: f32,
    /// Logical milliseconds per tick
    pub tick_ms: f64,

    // === Forces ===
    pub gravity: Vec2,
    /// Wind at world start
    pub wind: Vec2,

    // === Soft bodies ===
    pub body_friction: f32,
    pub corner_mass: f32,
    pub rolling_sensitivity: f32,
    pub perimeter_strength: f32,
    pub bracing_strength: f32,

    // === Pools ===
    pub bullet_pool_capacity: usize,
    pub particle_pool_capacity: usize,

    // === Combat ===
    pub damage: DamageTable,
    /// Upgrade multiplier on player bullet damage
    pub damage_multiplier: f32,

    // === Spawning ===
    /// Drones spawned at level 1
    pub initial_aliens: usize,
    pub moon_bases: usize,
    pub nests: usize,
    /// Delay before the queen shows up (ms)
    pub queen_appear_ms: f64,
    /// Delay before the king shows up (ms)
    pub king_appear_ms: f64,
    /// Balloons each base keeps aloft
    pub balloons_per_base: usize,

    // === Meteors ===
    /// Quiet time between showers is drawn from this range (ms)
    pub meteor_gap_ms: [f64; 2],
    /// Shower length is drawn from this range (ms)
    pub meteor_shower_ms: [f64; 2],
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            world_width: WORLD_WIDTH,
            world_height: WORLD_HEIGHT,
            tick_ms: TICK_MS,

            gravity: Vec2::new(0.0, GRAVITY),
            wind: Vec2::ZERO,

            body_friction: BODY_FRICTION,
            corner_mass: CORNER_MASS,
            rolling_sensitivity: ROLLING_SENSITIVITY,
            perimeter_strength: PERIMETER_STRENGTH,
            bracing_strength: BRACING_STRENGTH,

            bullet_pool_capacity: BULLET_POOL_CAPACITY,
            particle_pool_capacity: PARTICLE_POOL_CAPACITY,

            damage: DamageTable::default(),
            damage_multiplier: 1.0,

            initial_aliens: 10,
            moon_bases: 2,
            nests: 3,
            queen_appear_ms: 60_000.0,
            king_appear_ms: 300_000.0,
            balloons_per_base: 2,

            meteor_gap_ms: [120_000.0, 360_000.0],
            meteor_shower_ms: [10_000.0, 30_000.0],
        }
    }
}

impl SimConfig {
    /// Parse a config from JSON. Absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values a world cannot be built or run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check(ok: bool, field: &'static str) -> Result<(), ConfigError> {
            ok.then_some(()).ok_or(ConfigError::Invalid(field))
        }
        let range = |r: [f64; 2]| r[0].is_finite() && r[1].is_finite() && 0.0 < r[0] && r[0] <= r[1];

        check(self.world_width.is_finite() && self.world_width > 0.0, "world_width")?;
        check(
            self.world_height.is_finite() && self.world_height >= MIN_WORLD_HEIGHT,
            "world_height",
        )?;
        check(self.tick_ms.is_finite() && self.tick_ms > 0.0, "tick_ms")?;
        check(self.gravity.is_finite(), "gravity")?;
        check(self.wind.is_finite(), "wind")?;
        check(self.body_friction > 0.0 && self.body_friction <= 1.0, "body_friction")?;
        check(self.corner_mass.is_finite() && self.corner_mass > 0.0, "corner_mass")?;
        check(
            [
                self.rolling_sensitivity,
                self.perimeter_strength,
                self.bracing_strength,
            ]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0),
            "soft body strength",
        )?;
        check(self.bullet_pool_capacity > 0, "bullet_pool_capacity")?;

        let d = &self.damage;
        check(
            [
                d.player_bullet,
                d.shield,
                d.ship,
                d.wingman,
                d.moon_base,
                d.turret,
                d.bomb,
                d.laser,
                d.plant,
                d.balloon,
                d.meteor,
                d.meteor_ship,
            ]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0),
            "damage",
        )?;
        check(d.bomb_radius.is_finite() && d.bomb_radius > 0.0, "damage.bomb_radius")?;
        check(
            self.damage_multiplier.is_finite() && self.damage_multiplier >= 0.0,
            "damage_multiplier",
        )?;
        check(
            self.queen_appear_ms.is_finite() && self.queen_appear_ms >= 0.0,
            "queen_appear_ms",
        )?;
        check(
            self.king_appear_ms.is_finite() && self.king_appear_ms >= 0.0,
            "king_appear_ms",
        )?;
        check(range(self.meteor_gap_ms), "meteor_gap_ms")?;
        check(range(self.meteor_shower_ms), "meteor_shower_ms")?;
        Ok(())
    }

    /// Load a config file, falling back to defaults if it can't be read
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path)
            .map_err(ConfigError::from)
            .and_then(|json| Self::from_json(&json))
        {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Using default config ({}: {e})", path.display());
                Self::default()
            }
        }
    }

    /// Write the config as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Damage a player bullet deals after upgrades
    pub fn player_bullet_damage(&self) -> f32 {
        self.damage.player_bullet * self.damage_multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SimConfig::from_json(r#"{ "damage_multiplier": 2.5, "damage": { "ship": 50.0 } }"#)
            .unwrap();
        assert_eq!(config.damage_multiplier, 2.5);
        assert_eq!(config.damage.ship, 50.0);
        assert_eq!(config.damage.shield, DamageTable::default().shield);
        assert_eq!(config.world_width, WORLD_WIDTH);
        assert_eq!(config.player_bullet_damage(), 2.5);
    }

    #[test]
    fn test_bad_json_is_error() {
        assert!(matches!(
            SimConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_short_world_rejected() {
        assert!(matches!(
            SimConfig::from_json(r#"{ "world_height": 120.0 }"#),
            Err(ConfigError::Invalid("world_height"))
        ));
        assert!(SimConfig::from_json(r#"{ "world_height": 300.0 }"#).is_ok());
    }

    #[test]
    fn test_out_of_range_fields_rejected() {
        for json in [
            r#"{ "world_width": 0.0 }"#,
            r#"{ "tick_ms": -16.0 }"#,
            r#"{ "body_friction": 1.5 }"#,
            r#"{ "damage": { "bomb_radius": 0.0 } }"#,
            r#"{ "meteor_gap_ms": [5000.0, 1000.0] }"#,
        ] {
            assert!(
                matches!(SimConfig::from_json(json), Err(ConfigError::Invalid(_))),
                "{json} accepted"
            );
        }
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_invalid_file_falls_back() {
        let path = std::env::temp_dir().join(format!("neptune-sim-short-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "world_height": 90.0 }"#).unwrap();
        let config = SimConfig::load(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let config = SimConfig::load("/definitely/not/here/neptune.json");
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let path = std::env::temp_dir().join(format!("neptune-sim-config-{}.json", std::process::id()));
        let config = SimConfig {
            initial_aliens: 3,
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = SimConfig::load(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.initial_aliens, 3);
    }
}
