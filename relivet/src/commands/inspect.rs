//! Inspect command implementation.
//!
//! Loads a built module and lists its constructors with their dependency
//! declarations.

use std::fmt;
use std::path::{Path, PathBuf};

use relive_build::{DylibLoader, ModuleLoader};
use relive_core::{ModuleExports, ObjectFactory, SingletonMode};
use serde::Serialize;

use crate::commands::traits::{execute, Command};
use crate::error::{RelivetError, Result};

/// Arguments for the inspect command.
#[derive(Debug, Clone)]
pub struct InspectArgs {
    pub module: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncludeReport {
    pub path: PathBuf,
    pub modifiable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstructorReport {
    pub name: String,
    pub source_file: PathBuf,
    pub singleton: &'static str,
    pub includes: Vec<IncludeReport>,
    pub link_libraries: Vec<String>,
    pub source_dependencies: Vec<PathBuf>,
}

impl ConstructorReport {
    fn from_factory(factory: &dyn ObjectFactory) -> Self {
        Self {
            name: factory.type_name().to_string(),
            source_file: factory.source_file().to_path_buf(),
            singleton: match factory.singleton_mode() {
                SingletonMode::None => "none",
                SingletonMode::Singleton => "singleton",
                SingletonMode::AutoConstruct => "auto-construct",
            },
            includes: factory
                .includes()
                .iter()
                .map(|include| IncludeReport {
                    path: include.path.clone(),
                    modifiable: include.modifiable,
                })
                .collect(),
            link_libraries: factory.link_libraries().to_vec(),
            source_dependencies: factory.source_dependencies().to_vec(),
        }
    }
}

/// Everything a module exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleReport {
    pub module: PathBuf,
    pub constructors: Vec<ConstructorReport>,
    pub always_compile: Vec<PathBuf>,
}

impl ModuleReport {
    pub fn from_exports(module: &Path, exports: &ModuleExports) -> Self {
        Self {
            module: module.to_path_buf(),
            constructors: exports
                .constructors
                .iter()
                .map(|factory| ConstructorReport::from_factory(factory.as_ref()))
                .collect(),
            always_compile: exports.always_compile.clone(),
        }
    }
}

impl fmt::Display for ModuleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} constructor(s)",
            self.module.display(),
            self.constructors.len()
        )?;
        for ctor in &self.constructors {
            write!(f, "\n  {} ({})", ctor.name, ctor.source_file.display())?;
            if ctor.singleton != "none" {
                write!(f, " [{}]", ctor.singleton)?;
            }
            for include in &ctor.includes {
                let marker = if include.modifiable { " (modifiable)" } else { "" };
                write!(f, "\n    include {}{}", include.path.display(), marker)?;
            }
            for library in &ctor.link_libraries {
                write!(f, "\n    link {}", library)?;
            }
            for dependency in &ctor.source_dependencies {
                write!(f, "\n    compile with {}", dependency.display())?;
            }
        }
        for path in &self.always_compile {
            write!(f, "\n  always compiled: {}", path.display())?;
        }
        Ok(())
    }
}

/// Inspect command handler.
pub struct Inspect {
    args: InspectArgs,
}

impl Command for Inspect {
    type Args = InspectArgs;
    type Output = ModuleReport;

    fn new(args: Self::Args) -> Self {
        Self { args }
    }

    fn execute(&self) -> Result<Self::Output> {
        let module = &self.args.module;
        if !module.is_file() {
            return Err(RelivetError::Validation(format!(
                "module not found: {}",
                module.display()
            )));
        }

        let exports = DylibLoader::new().load(module)?;
        Ok(ModuleReport::from_exports(module, &exports))
    }

    fn name() -> &'static str {
        "inspect"
    }
}

pub fn run_inspect(args: InspectArgs) -> Result<ModuleReport> {
    execute::<Inspect>(args)
}
