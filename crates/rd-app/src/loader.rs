//! Loading modules from named libraries.
//!
//! A library exposes its module through a factory registered under
//! [`CREATE_MODULE_SYMBOL`]. [`Application::load_module`] keeps the opened
//! library alive for as long as the application holds the module.
//!
//! [`Application::load_module`]: crate::Application::load_module

use std::fmt;

use hashbrown::HashMap;
use rd_core::Handle;

use crate::module::Module;

/// Symbol every module library must export.
pub const CREATE_MODULE_SYMBOL: &str = "CreateModule";

/// Module factory exported by a library.
pub type CreateModuleFn = fn() -> Handle<dyn Module>;

/// An opened module library.
pub trait ModuleLibrary: Send + Sync {
    fn name(&self) -> &str;

    /// Looks up an exported factory.
    fn symbol(&self, name: &str) -> Option<CreateModuleFn>;
}

/// Opens module libraries by name.
pub trait ModuleLoader {
    fn open(&self, libname: &str) -> Option<Box<dyn ModuleLibrary>>;
}

#[derive(Clone)]
struct StaticLibrary {
    name: String,
    symbols: HashMap<String, CreateModuleFn>,
}

impl ModuleLibrary for StaticLibrary {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self, name: &str) -> Option<CreateModuleFn> {
        self.symbols.get(name).copied()
    }
}

/// Loader over libraries linked into the current binary.
#[derive(Default, Clone)]
pub struct StaticLoader {
    libraries: HashMap<String, StaticLibrary>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a library exporting `factory` as [`CREATE_MODULE_SYMBOL`].
    pub fn with_library(self, libname: impl Into<String>, factory: CreateModuleFn) -> Self {
        self.with_symbol(libname, CREATE_MODULE_SYMBOL, factory)
    }

    /// Registers an arbitrary exported symbol, creating the library if needed.
    pub fn with_symbol(
        mut self,
        libname: impl Into<String>,
        symbol: impl Into<String>,
        factory: CreateModuleFn,
    ) -> Self {
        let libname = libname.into();
        self.libraries
            .entry(libname.clone())
            .or_insert_with(|| StaticLibrary {
                name: libname,
                symbols: HashMap::new(),
            })
            .symbols
            .insert(symbol.into(), factory);
        self
    }

    /// Number of registered libraries.
    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

impl ModuleLoader for StaticLoader {
    fn open(&self, libname: &str) -> Option<Box<dyn ModuleLibrary>> {
        self.libraries
            .get(libname)
            .map(|library| Box::new(library.clone()) as Box<dyn ModuleLibrary>)
    }
}

impl fmt::Debug for StaticLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.libraries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn null_module() -> Handle<dyn Module> {
        Handle::null()
    }

    #[test]
    fn unknown_library_does_not_open() {
        assert!(StaticLoader::new().open("libmissing").is_none());
    }

    #[test]
    fn registered_factory_is_exported() {
        let loader = StaticLoader::new().with_library("libnull", null_module);
        let library = loader.open("libnull").unwrap();
        assert_eq!(library.name(), "libnull");
        assert!(library.symbol(CREATE_MODULE_SYMBOL).is_some());
        assert!(library.symbol("Other").is_none());
    }

    #[test]
    fn other_symbols_do_not_export_factory() {
        let loader = StaticLoader::new().with_symbol("libodd", "MakeIt", null_module);
        assert_eq!(loader.len(), 1);
        let library = loader.open("libodd").unwrap();
        assert!(library.symbol(CREATE_MODULE_SYMBOL).is_none());
    }
}
