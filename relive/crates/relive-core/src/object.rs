//! Object Model - Reloadable Types and Their Factories
//!
//! A reloadable type is any `'static` type implementing [`Object`]. Each type
//! is described to the registry by an [`ObjectFactory`], which knows how to
//! construct instances and declares the build inputs of the type (its source
//! file, the headers it includes, the libraries it links, other sources it
//! needs).
//!
//! A freshly built module exports one factory per type. When a factory's
//! `type_name` matches a registered Constructor, the swap coordinator treats
//! it as a new implementation of that type.

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ids::ObjectId;
use crate::property::PropertyPass;

/// A live, hot-swappable instance.
///
/// # Contract
/// - `serialize` names every property that should survive a swap, in both
///   directions; see [`PropertyPass::property`].
/// - `init` runs after construction (`first_time == true`) and again after
///   each swap that touched the registry (`first_time == false`).
/// - Other instances are referenced by [`ObjectId`] only, never by
///   reference or pointer.
pub trait Object: Any {
    fn serialize(&mut self, pass: &mut PropertyPass<'_>);

    fn init(&mut self, first_time: bool) {
        let _ = first_time;
    }
}

/// Whether a Constructor may hold more than one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SingletonMode {
    #[default]
    None,
    /// At most one instance; constructing again returns the existing one.
    Singleton,
    /// Like `Singleton`, and one instance is created during a swap if none
    /// exists.
    AutoConstruct,
}

impl SingletonMode {
    pub fn is_singleton(self) -> bool {
        !matches!(self, SingletonMode::None)
    }
}

/// A header the type's translation unit includes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncludeDecl {
    pub path: PathBuf,
    /// Edits to this header rebuild every unit that includes it.
    pub modifiable: bool,
}

impl IncludeDecl {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            modifiable: false,
        }
    }

    pub fn modifiable(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            modifiable: true,
        }
    }
}

/// Describes and constructs one reloadable type.
pub trait ObjectFactory: Send + Sync {
    /// Name the registry matches replacements by.
    fn type_name(&self) -> &str;

    /// The translation unit defining the type.
    fn source_file(&self) -> &Path;

    fn includes(&self) -> &[IncludeDecl] {
        &[]
    }

    fn link_libraries(&self) -> &[String] {
        &[]
    }

    /// Other sources compiled together with `source_file`.
    fn source_dependencies(&self) -> &[PathBuf] {
        &[]
    }

    fn singleton_mode(&self) -> SingletonMode {
        SingletonMode::None
    }

    /// Build a default instance for slot `id`.
    fn construct(&self, id: ObjectId) -> Box<dyn Object>;
}

impl fmt::Debug for dyn ObjectFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectFactory")
            .field("type_name", &self.type_name())
            .field("source_file", &self.source_file())
            .finish()
    }
}

type ConstructFn = dyn Fn(ObjectId) -> Box<dyn Object> + Send + Sync;

/// Closure-backed [`ObjectFactory`] with a builder for its declarations.
///
/// # Examples
/// ```rust
/// use relive_core::{Object, ObjectFactory, PropertyPass, SimpleFactory};
///
/// #[derive(Default)]
/// struct Spinner {
///     speed: f32,
/// }
///
/// impl Object for Spinner {
///     fn serialize(&mut self, pass: &mut PropertyPass<'_>) {
///         pass.property("speed", &mut self.speed);
///     }
/// }
///
/// let factory = SimpleFactory::new("Spinner", "src/spinner.rs", |_| Box::new(Spinner::default()))
///     .modifiable_include("src/spinner.h")
///     .link_library("m");
/// assert_eq!(factory.type_name(), "Spinner");
/// assert!(factory.includes()[0].modifiable);
/// ```
pub struct SimpleFactory {
    type_name: String,
    source_file: PathBuf,
    includes: Vec<IncludeDecl>,
    link_libraries: Vec<String>,
    source_dependencies: Vec<PathBuf>,
    singleton_mode: SingletonMode,
    construct: Box<ConstructFn>,
}

impl SimpleFactory {
    pub fn new<F>(type_name: impl Into<String>, source_file: impl Into<PathBuf>, construct: F) -> Self
    where
        F: Fn(ObjectId) -> Box<dyn Object> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            source_file: source_file.into(),
            includes: Vec::new(),
            link_libraries: Vec::new(),
            source_dependencies: Vec::new(),
            singleton_mode: SingletonMode::None,
            construct: Box::new(construct),
        }
    }

    pub fn include(mut self, path: impl Into<PathBuf>) -> Self {
        self.includes.push(IncludeDecl::new(path));
        self
    }

    pub fn modifiable_include(mut self, path: impl Into<PathBuf>) -> Self {
        self.includes.push(IncludeDecl::modifiable(path));
        self
    }

    pub fn link_library(mut self, name: impl Into<String>) -> Self {
        self.link_libraries.push(name.into());
        self
    }

    pub fn source_dependency(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_dependencies.push(path.into());
        self
    }

    pub fn singleton(mut self, mode: SingletonMode) -> Self {
        self.singleton_mode = mode;
        self
    }

    /// Wrap into the shared handle modules export.
    pub fn shared(self) -> Arc<dyn ObjectFactory> {
        Arc::new(self)
    }
}

impl ObjectFactory for SimpleFactory {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn source_file(&self) -> &Path {
        &self.source_file
    }

    fn includes(&self) -> &[IncludeDecl] {
        &self.includes
    }

    fn link_libraries(&self) -> &[String] {
        &self.link_libraries
    }

    fn source_dependencies(&self) -> &[PathBuf] {
        &self.source_dependencies
    }

    fn singleton_mode(&self) -> SingletonMode {
        self.singleton_mode
    }

    fn construct(&self, id: ObjectId) -> Box<dyn Object> {
        (self.construct)(id)
    }
}
