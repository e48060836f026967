//! Per-project build configuration.
//!
//! A project is one module: a set of translation units compiled together
//! into one dynamically loadable artifact by one external compiler.

use std::path::{Path, PathBuf};

use relive_core::ConfigError;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Optimization override applied to a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optimization {
    Debug,
    Perf,
    /// No override; whatever the compile options say.
    #[default]
    Default,
}

/// How a toolchain spells its flags.
///
/// Directory and library prefixes are glued to their value (`-Iinclude`);
/// the output flag takes the path as a separate argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSet {
    pub include_dir: String,
    pub library_dir: String,
    pub output: String,
    pub library: String,
    pub debug: Vec<String>,
    pub perf: Vec<String>,
    /// Flags that make the compiler produce a loadable module.
    pub module: Vec<String>,
}

impl FlagSet {
    pub fn gcc() -> Self {
        Self {
            include_dir: "-I".to_string(),
            library_dir: "-L".to_string(),
            output: "-o".to_string(),
            library: "-l".to_string(),
            debug: strings(&["-O0", "-g"]),
            perf: strings(&["-O2"]),
            module: strings(&["-shared", "-fPIC"]),
        }
    }

    pub fn rustc() -> Self {
        Self {
            include_dir: "-L".to_string(),
            library_dir: "-Lnative=".to_string(),
            output: "-o".to_string(),
            library: "-l".to_string(),
            debug: strings(&["-C", "opt-level=0", "-g"]),
            perf: strings(&["-C", "opt-level=3"]),
            module: strings(&["--crate-type", "dylib", "-C", "prefer-dynamic"]),
        }
    }

    /// Name of the first empty prefix, if any.
    fn empty_prefix(&self) -> Option<&'static str> {
        [
            ("include_dir", &self.include_dir),
            ("library_dir", &self.library_dir),
            ("output", &self.output),
            ("library", &self.library),
        ]
        .into_iter()
        .find(|(_, prefix)| prefix.is_empty())
        .map(|(flag, _)| flag)
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

/// Flag spelling preset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagStyle {
    /// gcc, clang and compatible drivers
    #[default]
    Gcc,
    Rustc,
    Custom(FlagSet),
}

impl FlagStyle {
    pub fn flags(&self) -> FlagSet {
        match self {
            FlagStyle::Gcc => FlagSet::gcc(),
            FlagStyle::Rustc => FlagSet::rustc(),
            FlagStyle::Custom(flags) => flags.clone(),
        }
    }
}

/// Build settings for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,

    /// Compiler program, looked up on `PATH` when not a path.
    ///
    /// Default: `cc`
    pub compiler: PathBuf,

    pub include_dirs: Vec<PathBuf>,
    pub library_dirs: Vec<PathBuf>,
    pub optimization: Optimization,

    /// Free-form flags placed after the output path.
    pub compile_options: Vec<String>,

    /// Free-form flags placed after the compile options.
    pub link_options: Vec<String>,

    /// Where artifacts are written.
    ///
    /// Default: `target/relive`
    pub intermediate_dir: PathBuf,

    pub flag_style: FlagStyle,

    /// Abandon an in-flight compile when new changes arrive. The process
    /// still runs to completion; its artifact is ignored.
    ///
    /// Default: false
    pub abandon_on_change: bool,

    /// Sources compiled into every build of this project.
    pub always_compile: Vec<PathBuf>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "main".to_string(),
            compiler: PathBuf::from("cc"),
            include_dirs: Vec::new(),
            library_dirs: Vec::new(),
            optimization: Optimization::Default,
            compile_options: Vec::new(),
            link_options: Vec::new(),
            intermediate_dir: PathBuf::from("target/relive"),
            flag_style: FlagStyle::Gcc,
            abandon_on_change: false,
            always_compile: Vec::new(),
        }
    }
}

impl ProjectConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_compiler(mut self, compiler: impl Into<PathBuf>) -> Self {
        self.compiler = compiler.into();
        self
    }

    pub fn with_intermediate_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.intermediate_dir = dir.into();
        self
    }

    pub fn intermediate_dir(&self) -> &Path {
        &self.intermediate_dir
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyProjectName);
        }
        if self.compiler.as_os_str().is_empty() {
            return Err(ConfigError::MissingCompiler(self.name.clone()));
        }
        if let Some(flag) = self.flag_style.flags().empty_prefix() {
            return Err(ConfigError::EmptyFlagPrefix {
                project: self.name.clone(),
                flag,
            });
        }
        Ok(())
    }
}

/// Validate every project and reject duplicate names.
pub fn validate_projects(projects: &[ProjectConfig]) -> Result<(), ConfigError> {
    let mut seen = FxHashSet::default();
    for project in projects {
        project.validate()?;
        if !seen.insert(project.name.as_str()) {
            return Err(ConfigError::DuplicateProject(project.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_project_is_valid() {
        assert!(ProjectConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let config = ProjectConfig::new("  ");
        assert_eq!(config.validate(), Err(ConfigError::EmptyProjectName));
    }

    #[test]
    fn test_missing_compiler_is_rejected() {
        let config = ProjectConfig::new("game").with_compiler("");
        assert_eq!(config.validate(), Err(ConfigError::MissingCompiler("game".to_string())));
    }

    #[test]
    fn test_empty_custom_prefix_is_rejected() {
        let mut flags = FlagSet::gcc();
        flags.library = String::new();
        let config = ProjectConfig {
            flag_style: FlagStyle::Custom(flags),
            ..ProjectConfig::new("game")
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyFlagPrefix { flag: "library", .. })
        ));
    }

    #[test]
    fn test_duplicate_projects_are_rejected() {
        let projects = [ProjectConfig::new("game"), ProjectConfig::new("game")];
        assert_eq!(
            validate_projects(&projects),
            Err(ConfigError::DuplicateProject("game".to_string()))
        );
    }

    #[test]
    fn test_rustc_preset_builds_dylibs() {
        let flags = FlagStyle::Rustc.flags();
        assert!(flags.module.contains(&"dylib".to_string()));
        assert_eq!(flags.output, "-o");
    }
}
