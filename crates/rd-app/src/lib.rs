//! Application framework for the RD engine.
//!
//! This crate provides:
//! - [`Module`], a pluggable unit with a start/update/terminate lifecycle,
//!   observed by [`ModuleListener`]s
//! - Typed capability lookup across module boundaries ([`ModuleExt::load_capability`])
//! - [`Application`], the run loop driving every registered module and
//!   reporting to an [`ApplicationDelegate`]
//! - Module loading from named libraries through a [`ModuleLoader`]
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Instant;
//! use rd_app::{AppConfig, Application, ApplicationDelegate, Module, ModuleCore};
//! use rd_core::Handle;
//!
//! struct Clock {
//!     core: ModuleCore,
//! }
//!
//! impl Module for Clock {
//!     fn core(&self) -> &ModuleCore {
//!         &self.core
//!     }
//!     fn start(&self, _: &Application, _: Instant) -> bool {
//!         self.core.did_start(self)
//!     }
//!     fn update(&self, _: &Application, _: Instant) -> bool {
//!         self.core.will_update(self) && self.core.did_update(self)
//!     }
//!     fn terminate(&self, _: &Application, _: Instant) -> bool {
//!         self.core.will_terminate(self)
//!     }
//! }
//!
//! struct StopAfterOneTick;
//!
//! impl ApplicationDelegate for StopAfterOneTick {
//!     fn on_application_did_update(&self, application: &Application, _: Instant) {
//!         application.stop();
//!     }
//! }
//!
//! let app = Application::with_config(AppConfig::new("example").with_logging(false));
//! let clock = Handle::new(Clock { core: ModuleCore::new("Clock:Any") });
//! app.add_module(clock.clone().upcast(|m| m as Arc<dyn Module>)).unwrap();
//! app.set_delegate(Handle::new(StopAfterOneTick).upcast(|d| d as Arc<dyn ApplicationDelegate>));
//! app.run();
//! assert_eq!(app.module_count(), 0);
//! ```

mod application;
mod capability;
mod config;
mod delegate;
mod loader;
pub mod logging;
mod module;

pub use application::Application;
pub use capability::{Capability, CapabilityCarrier, CapabilityKey, ModuleExt};
pub use config::AppConfig;
pub use delegate::ApplicationDelegate;
pub use loader::{CreateModuleFn, ModuleLibrary, ModuleLoader, StaticLoader, CREATE_MODULE_SYMBOL};
pub use module::{main_name, Module, ModuleCore, ModuleListener, ModuleName, ModuleState};

// Re-export commonly used types for convenience
pub use rd_core::{Error, Handle, Result};

#[cfg(test)]
pub(crate) mod test_support {
    use parking_lot::Mutex;

    /// Serializes tests that build an [`Application`](crate::Application),
    /// since each one installs the process default notification center.
    pub static APP_LOCK: Mutex<()> = Mutex::new(());
}
