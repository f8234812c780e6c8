use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Api {
    pub base_url: String,
    pub auth_token: String,
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub listen_addr: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub api: Api,
    pub server: Server,
}

impl Settings {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .build()?;

        config.try_deserialize()
    }
}
