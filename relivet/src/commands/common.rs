//! Configuration helpers shared by relivet commands.

use std::path::Path;

use relive_build::ProjectConfig;
use relive_runtime::RuntimeConfig;

use crate::error::{RelivetError, Result};

/// Load `path`, or discover a config file when `None`, and validate it.
///
/// Environment overrides apply in both cases.
pub fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    let config = match path {
        Some(path) => {
            let mut config = RuntimeConfig::load_from_path(path)?;
            config.apply_env(|name| std::env::var(name).ok())?;
            config
        },
        None => RuntimeConfig::load()?,
    };
    config.validate()?;
    Ok(config)
}

/// The project named `name`, or the only configured project.
pub fn select_project<'a>(config: &'a RuntimeConfig, name: Option<&str>) -> Result<&'a ProjectConfig> {
    match name {
        Some(name) => config
            .project(name)
            .ok_or_else(|| RelivetError::Validation(format!("unknown project `{}`", name))),
        None => match config.projects.as_slice() {
            [only] => Ok(only),
            [] => Err(RelivetError::Validation(
                "no projects configured; run `relivet init` first".to_string(),
            )),
            _ => Err(RelivetError::Validation(format!(
                "{} projects configured; pass --project",
                config.projects.len()
            ))),
        },
    }
}
