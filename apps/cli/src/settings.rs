//! Layered settings: defaults, then an optional TOML file, then `KEYTURN_*`
//! environment variables with `__` as the nesting separator.
//!
//! ```toml
//! [rotation]
//! inactivity_threshold = "24h"
//! max_keys_per_principal = 2
//!
//! [aws]
//! region = "us-east-1"
//! ```
//!
//! `KEYTURN_ROTATION__CALL_TIMEOUT=10s` overrides `rotation.call_timeout`.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use keyturn_credential::RotationConfig;
use keyturn_credential::providers::AwsConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File read when `--config` is not given. Missing is fine.
pub const DEFAULT_CONFIG_FILE: &str = "keyturn.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub rotation: RotationConfig,
    pub aws: AwsConfig,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let figment = Figment::from(Serialized::defaults(Self::default()));

        let figment = match path {
            Some(path) => {
                anyhow::ensure!(path.exists(), "config file not found: {}", path.display());
                figment.merge(Toml::file(path))
            }
            None => figment.merge(Toml::file(DEFAULT_CONFIG_FILE)),
        };

        let settings: Self = figment
            .merge(Env::prefixed("KEYTURN_").split("__"))
            .extract()?;

        settings.rotation.validate()?;
        Ok(settings)
    }
}
