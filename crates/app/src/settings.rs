//! Handles settings for the application. Configuration is read from an
//! optional `settings.toml` and from `SPESE__`-prefixed environment variables,
//! e.g. `SPESE__ENGINE__MAX_SETTLEMENT_ATTEMPTS=10`.
use config::{Config, ConfigError, Environment, File};
use engine::EngineConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("SPESE").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = Settings::new("does-not-exist/settings").unwrap();
        assert_eq!(settings.app.level, "info");
        assert_eq!(settings.engine, EngineConfig::default());
    }
}
