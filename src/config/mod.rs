// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::path::Path;

pub const ENV_PREFIX: &str = "TIERED_HEALTH";

/// Resolve the process configuration once at startup.
///
/// Layers, lowest precedence first: built-in defaults, the optional YAML or
/// JSON file at `path`, `TIERED_HEALTH__*` environment variables, and finally
/// the per-tier route variables (`HEALTH_LIVE_URL`, `healthLiveUrl`, ...).
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut builder = ::config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(::config::File::from(path).required(false));
    }

    let settings = builder
        .add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to read configuration sources")?;

    let mut config: Config = settings
        .try_deserialize()
        .context("Failed to parse configuration")?;

    config.apply_route_overrides(|key| std::env::var(key).ok());
    config.validate().context("Invalid configuration")?;

    Ok(config)
}
