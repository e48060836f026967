//! Module exports contract.
//!
//! A reloadable module is a dynamic library exposing one entry point,
//! [`MODULE_ENTRY_SYMBOL`], of type [`ModuleEntryFn`]. The host calls it once
//! after loading and hands the returned factories to the swap coordinator.
//!
//! Module and host must be built by the same compiler with the same
//! `relive-core`; the entry point and the factory trait objects use the Rust
//! ABI.

use std::path::PathBuf;
use std::sync::Arc;

use crate::object::ObjectFactory;

/// Name of the exported entry point.
pub const MODULE_ENTRY_SYMBOL: &str = "relive_module_exports";

/// Signature of the exported entry point.
pub type ModuleEntryFn = fn() -> ModuleExports;

/// What a loaded module provides.
#[derive(Debug, Clone, Default)]
pub struct ModuleExports {
    /// One factory per reloadable type defined in the module.
    pub constructors: Vec<Arc<dyn ObjectFactory>>,
    /// Sources compiled into every rebuild of the module's project.
    pub always_compile: Vec<PathBuf>,
}

impl ModuleExports {
    pub fn new(constructors: Vec<Arc<dyn ObjectFactory>>) -> Self {
        Self {
            constructors,
            always_compile: Vec::new(),
        }
    }

    pub fn always_compile(mut self, path: impl Into<PathBuf>) -> Self {
        self.always_compile.push(path.into());
        self
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.constructors.iter().map(|factory| factory.type_name()).collect()
    }
}

/// Emit the module entry point.
///
/// ```rust,ignore
/// relive_core::declare_module! {
///     constructors: [
///         relive_core::SimpleFactory::new("Counter", file!(), |_| Box::new(Counter::default())),
///     ],
///     always_compile: ["src/shared.rs"],
/// }
/// ```
///
/// Each constructor expression must evaluate to a type implementing
/// [`ObjectFactory`].
#[macro_export]
macro_rules! declare_module {
    (
        constructors: [$($factory:expr),* $(,)?]
        $(, always_compile: [$($path:expr),* $(,)?])?
        $(,)?
    ) => {
        #[no_mangle]
        pub extern "Rust" fn relive_module_exports() -> $crate::ModuleExports {
            let constructors: ::std::vec::Vec<::std::sync::Arc<dyn $crate::ObjectFactory>> =
                ::std::vec![$(
                    ::std::sync::Arc::new($factory) as ::std::sync::Arc<dyn $crate::ObjectFactory>
                ),*];
            #[allow(unused_mut)]
            let mut exports = $crate::ModuleExports::new(constructors);
            $($(exports = exports.always_compile($path);)*)?
            exports
        }
    };
}
