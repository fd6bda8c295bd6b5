//! Save/load persistence with integrity verification
//!
//! Features:
//! - Versioned JSON snapshot of the whole world
//! - Field-by-field validation before anything is rebuilt
//! - All-or-nothing restore: a bad snapshot is rejected whole, and the only
//!   recovery is a fresh world

pub mod snapshot;

use std::path::Path;

use thiserror::Error;

pub use snapshot::{SNAPSHOT_VERSION, WorldSnapshot};

use crate::SimConfig;
use crate::sim::actor::ActorId;
use crate::sim::scheduler::TimerError;
use crate::sim::softbody::BodyError;
use crate::sim::state::World;

/// Why a snapshot could not be restored
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("snapshot is not valid JSON for this layout: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot version {found} is not supported (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("actor id {0} appears more than once")]
    DuplicateId(ActorId),
    #[error("snapshot field {0} is invalid")]
    InvalidField(&'static str),
    #[error(transparent)]
    Timer(#[from] TimerError),
    #[error(transparent)]
    Body(#[from] BodyError),
}

pub fn to_json(world: &World) -> Result<String, serde_json::Error> {
    serde_json::to_string(&WorldSnapshot::capture(world))
}

pub fn from_json(json: &str) -> Result<World, RestoreError> {
    let snapshot: WorldSnapshot = serde_json::from_str(json)?;
    let world = snapshot.restore()?;
    log::info!("Restored world at tick {} (level {})", world.ticks, world.level);
    Ok(world)
}

/// Restore from `json`, or start over with a fresh world if it is unusable
pub fn load_or_reset(json: &str, config: SimConfig, seed: u64) -> World {
    match from_json(json) {
        Ok(world) => world,
        Err(e) => {
            log::warn!("Discarding saved world ({e}), starting fresh");
            World::new(config, seed)
        }
    }
}

pub fn save(world: &World, path: impl AsRef<Path>) -> Result<(), RestoreError> {
    let json = to_json(world)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load(path: impl AsRef<Path>) -> Result<World, RestoreError> {
    let json = std::fs::read_to_string(path)?;
    from_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::boss::BossKind;
    use crate::sim::entities::Meteor;
    use crate::sim::state::{TimerAction, TimerKey};
    use crate::sim::terrain::Terrain;
    use crate::sim::tick::{TickInput, tick};
    use glam::Vec2;
    use serde_json::{Value, json};

    fn played_world(ticks: usize) -> World {
        let mut world = World::new(SimConfig::default(), 77);
        let input = TickInput {
            thrust: Vec2::new(0.5, 0.1),
            fire: true,
            ..Default::default()
        };
        for _ in 0..ticks {
            tick(&mut world, &input);
        }
        world
    }

    fn world_with_queen() -> World {
        let config = SimConfig::default();
        let terrain = Terrain::flat(config.world_width, 700.0, config.world_height);
        let mut world = World::with_terrain(config, 1, terrain);
        let mut scheduler = std::mem::take(&mut world.scheduler);
        world.apply_timer_action(
            &mut scheduler,
            &TimerKey::BossAppear(BossKind::Queen),
            &TimerAction::Arrive(BossKind::Queen),
        );
        world.scheduler = scheduler;
        world
    }

    fn corrupt(world: &World, edit: impl FnOnce(&mut Value)) -> String {
        let mut value = serde_json::to_value(WorldSnapshot::capture(world)).unwrap();
        edit(&mut value);
        value.to_string()
    }

    #[test]
    fn test_restored_world_continues_identically() {
        let mut uninterrupted = played_world(120);
        let mut restored = from_json(&to_json(&uninterrupted).unwrap()).unwrap();

        assert_eq!(restored.ticks, 120);
        assert_eq!(restored.scheduler.snapshot(), uninterrupted.scheduler.snapshot());
        assert_eq!(restored.bullets.live_count(), uninterrupted.bullets.live_count());

        let input = TickInput {
            fire: true,
            ..Default::default()
        };
        for _ in 0..60 {
            tick(&mut uninterrupted, &input);
            tick(&mut restored, &input);
        }
        assert_eq!(to_json(&restored).unwrap(), to_json(&uninterrupted).unwrap());
    }

    #[test]
    fn test_boss_body_survives_roundtrip() {
        let world = world_with_queen();
        let restored = from_json(&to_json(&world).unwrap()).unwrap();
        let (a, b) = (world.registry.queen.unwrap(), restored.registry.queen.unwrap());
        assert_eq!(a.body.corners().len(), b.body.corners().len());
        assert_eq!(a.body.springs(), b.body.springs());
        assert_eq!(a.centroid(), b.centroid());
        assert!(restored.scheduler.exists(&TimerKey::BossEnter(BossKind::Queen)));
    }

    #[test]
    fn test_bad_spring_index_falls_back_to_fresh_world() {
        let json = corrupt(&world_with_queen(), |v| {
            v["registry"]["queen"]["body"]["springs"][0]["a"] = json!(9999);
        });
        assert!(matches!(from_json(&json), Err(RestoreError::Json(_))));

        let world = load_or_reset(&json, SimConfig::default(), 5);
        assert_eq!(world.ticks, 0);
        assert!(world.registry.queen.is_none());
        assert_eq!(world.registry.aliens.len(), 10);
    }

    #[test]
    fn test_zero_rest_length_rejected() {
        let json = corrupt(&world_with_queen(), |v| {
            v["registry"]["queen"]["body"]["springs"][3]["rest_length"] = json!(0.0);
        });
        assert!(from_json(&json).is_err());
    }

    #[test]
    fn test_missing_field_rejected() {
        let json = corrupt(&played_world(1), |v| {
            if let Some(obj) = v.as_object_mut() {
                obj.remove("clock");
            }
        });
        assert!(matches!(from_json(&json), Err(RestoreError::Json(_))));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let json = corrupt(&played_world(1), |v| v["version"] = json!(SNAPSHOT_VERSION + 1));
        assert!(matches!(
            from_json(&json),
            Err(RestoreError::Version { found, .. }) if found == SNAPSHOT_VERSION + 1
        ));
    }

    #[test]
    fn test_unplayable_config_rejected() {
        let json = corrupt(&played_world(1), |v| v["config"]["world_height"] = json!(90.0));
        assert!(matches!(
            from_json(&json),
            Err(RestoreError::InvalidField("config"))
        ));

        let json = corrupt(&played_world(1), |v| v["config"]["tick_ms"] = json!(0.0));
        assert!(matches!(
            from_json(&json),
            Err(RestoreError::InvalidField("config"))
        ));

        let world = load_or_reset(&json, SimConfig::default(), 5);
        assert_eq!(world.ticks, 0);
        assert_eq!(world.config.world_height, SimConfig::default().world_height);
    }

    #[test]
    fn test_meteors_and_balloons_survive_roundtrip() {
        let mut world = played_world(1);
        let base = world.registry.moon_bases[0].id;
        world.launch_balloons(base);
        world
            .meteors
            .push(Meteor::new(Vec2::new(900.0, 40.0), Vec2::new(0.5, 3.0), 18.0));

        let restored = from_json(&to_json(&world).unwrap()).unwrap();
        assert_eq!(restored.meteors.len(), 1);
        assert_eq!(restored.meteors[0].pos, Vec2::new(900.0, 40.0));
        assert_eq!(restored.registry.balloons.len(), world.registry.balloons.len());

        let json = corrupt(&world, |v| v["registry"]["balloons"][0]["base"] = json!(9999));
        assert!(matches!(
            from_json(&json),
            Err(RestoreError::InvalidField("balloons"))
        ));
        let json = corrupt(&world, |v| v["meteors"][0]["size"] = json!(0.0));
        assert!(matches!(
            from_json(&json),
            Err(RestoreError::InvalidField("meteors"))
        ));
    }

    #[test]
    fn test_duplicate_actor_id_rejected() {
        let world = played_world(1);
        let first = world.registry.aliens[0].id;
        let json = corrupt(&world, |v| v["registry"]["aliens"][1]["id"] = json!(first));
        assert!(matches!(from_json(&json), Err(RestoreError::DuplicateId(id)) if id == first));
    }

    #[test]
    fn test_duplicate_timer_key_rejected() {
        let json = corrupt(&played_world(1), |v| {
            if let Some(timers) = v["timers"].as_array_mut() {
                let dup = timers[0].clone();
                timers.push(dup);
            }
        });
        assert!(matches!(
            from_json(&json),
            Err(RestoreError::Timer(TimerError::DuplicateKey(_)))
        ));
    }

    #[test]
    fn test_wrong_boss_shape_rejected() {
        let json = corrupt(&world_with_queen(), |v| {
            if let Some(corners) = v["registry"]["queen"]["body"]["corners"].as_array_mut() {
                corners.truncate(10);
            }
            if let Some(springs) = v["registry"]["queen"]["body"]["springs"].as_array_mut() {
                springs.retain(|s| s["a"].as_u64() < Some(10) && s["b"].as_u64() < Some(10));
            }
        });
        assert!(matches!(
            from_json(&json),
            Err(RestoreError::Body(BodyError::Parameter(_)))
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("neptune-sim-{}.json", std::process::id()));
        let world = played_world(30);
        save(&world, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.ticks, 30);
        assert_eq!(loaded.registry.ids(), world.registry.ids());
        let _ = std::fs::remove_file(&path);
        assert!(matches!(load(&path), Err(RestoreError::Io(_))));
    }
}
