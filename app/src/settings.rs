use config::{Config, ConfigError, File};
use serde::Deserialize;
use veolia::VeoliaConfig;

use crate::statestore::StateStoreConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub veolia: VeoliaConfig,
    pub statestore: StateStoreConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("veolia.toml"))
            .build()?;

        s.try_deserialize()
    }
}
