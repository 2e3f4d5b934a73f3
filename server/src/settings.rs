use std::default::Default;
use std::env;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use setdealer_game::Seat;

/// Layer the configuration files, then the environment, over the defaults.
pub fn load() -> Result<Settings, ConfigError> {
    let mut s = Config::new();
    s.merge(File::with_name(DEFAULT_CFG_PATH))?;
    let env = env::var(RUN_MODE_ENV).unwrap_or_else(|_| "development".into());
    s.merge(File::with_name(&format!("config/{}", env)).required(false))?;
    s.merge(File::with_name(LOCAL_CFG_PATH).required(false))?;
    s.merge(Environment::with_prefix(ENV_PREFIX).separator("__"))?;
    s.try_into()
}

const DEFAULT_CFG_PATH: &str = "config/default";
const LOCAL_CFG_PATH: &str = "config/local";
const RUN_MODE_ENV: &str = "SETDEALER_SERVER_RUN_MODE";
const ENV_PREFIX: &str = "setdealer_server";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: Logging,
    pub game: setdealer_game::Settings,
    pub players: Players,
}

#[derive(Debug, Deserialize)]
pub struct Logging {
    pub level: String,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: "info".into(),
        }
    }
}

/// How many seats of each kind to open.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Players {
    pub human: usize,
    pub computer: usize,
}

impl Default for Players {
    fn default() -> Self {
        Players {
            human: 0,
            computer: 2,
        }
    }
}

impl Players {
    /// Humans take the lowest player ids, computers the rest.
    pub fn seats(&self) -> Vec<Seat> {
        let mut seats = vec![Seat::Human; self.human];
        seats.extend(vec![Seat::Computer; self.computer]);
        seats
    }
}
