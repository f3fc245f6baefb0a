//! Runtime configuration for the skirmish server.

use once_cell::sync::Lazy;
use std::env;

#[derive(Debug)]
pub struct Settings {
    /// Wall-clock seconds granted to each unit-turn.
    pub turn_seconds: u64,
    /// Seconds a player may stay disconnected before auto-surrender.
    pub disconnect_grace: u64,
    /// Seconds with every human gone before the battle is parked in the
    /// durable store and the in-memory session is freed.
    pub abandon_grace: u64,
    /// TTL of a parked battle snapshot (seconds).
    pub snapshot_ttl: u64,
    /// Redis presence-key TTL (seconds).
    pub presence_ttl: u64,
    /// Units spawned per player at battle start.
    pub units_per_player: u32,
    /// Obstacles scattered on the grid at battle start.
    pub obstacle_count: u32,
    /// Default grid dimensions when the creation request omits them.
    pub grid_width: i32,
    pub grid_height: i32,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Settings {
    fn from_env() -> Self {
        Settings {
            turn_seconds: env_parse("TURN_SECONDS", 30),
            disconnect_grace: env_parse("DISCONNECT_GRACE", 60),
            abandon_grace: env_parse("ABANDON_GRACE", 10),
            snapshot_ttl: env_parse("SNAPSHOT_TTL", 3600),
            presence_ttl: env_parse("PRESENCE_TTL", 600),
            units_per_player: env_parse("UNITS_PER_PLAYER", 3),
            obstacle_count: env_parse("OBSTACLE_COUNT", 6),
            grid_width: env_parse("GRID_WIDTH", 10),
            grid_height: env_parse("GRID_HEIGHT", 10),
        }
    }
}

static SETTINGS: Lazy<Settings> = Lazy::new(Settings::from_env);

pub fn settings() -> &'static Settings {
    &SETTINGS
}
