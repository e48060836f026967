//! Init command implementation.
//!
//! Writes a starter `relive.toml` with one project into the target
//! directory.

use std::path::{Path, PathBuf};

use relive_build::ProjectConfig;
use relive_runtime::{RuntimeConfig, CONFIG_FILE_NAME};

use crate::commands::traits::{execute, Command};
use crate::error::{RelivetError, Result};

/// Arguments for the init command.
#[derive(Debug, Clone, Default)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory).
    pub path: Option<PathBuf>,
    /// Project name (default: the directory name).
    pub name: Option<String>,
    /// Compiler program for the project.
    pub compiler: Option<PathBuf>,
    /// Overwrite an existing configuration file.
    pub force: bool,
}

/// Init command handler.
pub struct Init {
    args: InitArgs,
}

impl Init {
    fn target_dir(&self) -> Result<PathBuf> {
        match &self.args.path {
            Some(path) => Ok(path.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    fn project_name(&self, dir: &Path) -> String {
        self.args
            .name
            .clone()
            .or_else(|| {
                dir.file_name()
                    .and_then(|name| name.to_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "main".to_string())
    }

    fn starter_config(&self, dir: &Path) -> RuntimeConfig {
        let mut project = ProjectConfig::new(self.project_name(dir))
            .with_intermediate_dir(Path::new("target").join("relive"));
        if let Some(compiler) = &self.args.compiler {
            project = project.with_compiler(compiler.clone());
        }
        RuntimeConfig {
            projects: vec![project],
            ..RuntimeConfig::default()
        }
    }
}

impl Command for Init {
    type Args = InitArgs;
    /// Path of the written configuration file.
    type Output = PathBuf;

    fn new(args: Self::Args) -> Self {
        Self { args }
    }

    fn execute(&self) -> Result<Self::Output> {
        let dir = self.target_dir()?;
        if dir.exists() && !dir.is_dir() {
            return Err(RelivetError::Validation(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() && !self.args.force {
            return Err(RelivetError::Validation(format!(
                "{} already exists; pass --force to overwrite",
                config_path.display()
            )));
        }

        let config = self.starter_config(&dir);
        config.validate()?;
        config.save_to_path(&config_path)?;
        tracing::info!("wrote {}", config_path.display());
        Ok(config_path)
    }

    fn name() -> &'static str {
        "init"
    }
}

pub fn run_init(args: InitArgs) -> Result<PathBuf> {
    execute::<Init>(args)
}
