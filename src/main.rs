//! Neptune Sim headless runner
//!
//! Plays a scripted session against the simulation and logs what happens.
//! Usage: `neptune-sim [config.json] [ticks] [seed]`. Set `RUST_LOG=info` (or
//! `debug`) to see events.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use glam::Vec2;
    use neptune_sim::SimConfig;
    use neptune_sim::persistence;
    use neptune_sim::sim::{GameEvent, TickInput, World, tick};

    env_logger::init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => SimConfig::load(path),
        None => SimConfig::default(),
    };
    let ticks: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(3600);
    let seed: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(1);

    log::info!("Neptune Sim (headless) starting: {ticks} ticks, seed {seed}");
    let mut world = World::new(config, seed);

    for n in 0..ticks {
        // Weave along the surface and shoot at whatever is closest
        let ship = world.registry.ship.pos;
        let aim = world.registry.nearest_enemy_pos(ship, 600.0);
        let input = TickInput {
            thrust: Vec2::new(1.0, (n as f32 * 0.02).sin()),
            fire: aim.is_some(),
            aim,
            drop_bomb: n % 240 == 0,
            deploy_shield: n % 900 == 0,
            pause: false,
        };
        tick(&mut world, &input);

        for event in world.drain_events() {
            match event {
                GameEvent::ActorDestroyed { .. } | GameEvent::ShipHit { .. } => {
                    log::debug!("tick {}: {event:?}", world.ticks)
                }
                _ => log::info!("tick {}: {event:?}", world.ticks),
            }
        }
        if world.game_over || world.victory {
            break;
        }
    }

    log::info!(
        "Finished at tick {}: level {}, score {}, {} enemies, energy {:.0}",
        world.ticks,
        world.level,
        world.score,
        world.registry.enemy_count(),
        world.registry.ship.health,
    );
    log::info!("Collisions: {:?}", world.broker.stats());
    log::info!("Bullet pool: {:?}", world.bullets.stats());

    match persistence::to_json(&world).map_err(persistence::RestoreError::from) {
        Ok(json) => match persistence::from_json(&json) {
            Ok(restored) => log::info!(
                "Snapshot round trip ok ({} bytes, tick {})",
                json.len(),
                restored.ticks
            ),
            Err(e) => log::warn!("Snapshot failed to restore: {e}"),
        },
        Err(e) => log::warn!("Snapshot failed to serialize: {e}"),
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is the product on wasm; there is no headless runner
}
