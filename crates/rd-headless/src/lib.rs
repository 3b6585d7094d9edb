//! Headless backend module for the RD framework.
//!
//! Surfaces are in-memory rectangles rather than OS windows, so the whole
//! driver lifecycle can run without a window system: in tests, on servers,
//! or as a reference for real backends.
//!
//! # Example
//!
//! ```
//! use rd_app::{AppConfig, Application, ModuleExt, StaticLoader};
//! use rd_driver::{Driver, SurfaceDescriptor};
//! use rd_headless::{create_module, HeadlessDriverConfig, LIBRARY_NAME};
//!
//! let app = Application::with_config(AppConfig::new("doc").with_logging(false));
//! let loader = StaticLoader::new().with_library(LIBRARY_NAME, create_module);
//! let module = app.load_module(&loader, LIBRARY_NAME, true).unwrap();
//!
//! let config = HeadlessDriverConfig::new().with_max_surfaces(4);
//! let driver = module
//!     .get()
//!     .unwrap()
//!     .load_capability::<Driver>(Some(&config))
//!     .unwrap();
//! let surface = driver
//!     .get()
//!     .unwrap()
//!     .create_surface(&SurfaceDescriptor::new("main").with_size(640, 480))
//!     .unwrap();
//! assert!(surface.valid());
//! ```

mod backend;
mod config;
mod error;
mod module;
mod surface;

pub use backend::HeadlessBackend;
pub use config::HeadlessDriverConfig;
pub use error::{HeadlessError, Result};
pub use module::{create_module, HeadlessModule, MODULE_MAIN_NAME};
pub use surface::{HeadlessSurface, NativeWindow};

/// Library name the module is registered under.
pub const LIBRARY_NAME: &str = "rd_headless";
