//! The headless driver backend.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rd_app::Module;
use rd_core::{Handle, Result, Version};
use rd_driver::{Driver, DriverBackend, Surface, SurfaceDescriptor};
use tracing::warn;

use crate::config::HeadlessDriverConfig;
use crate::error::HeadlessError;
use crate::surface::HeadlessSurface;

/// Driver backend creating [`HeadlessSurface`]s.
pub struct HeadlessBackend {
    config: HeadlessDriverConfig,
    creator: u64,
    creator_name: String,
    surfaces: Mutex<Vec<Weak<HeadlessSurface>>>,
}

impl HeadlessBackend {
    /// Backend for a driver created by `creator`.
    pub fn new(config: HeadlessDriverConfig, creator: &dyn Module) -> Self {
        Self {
            config,
            creator: creator.core().id(),
            creator_name: creator.name(),
            surfaces: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &HeadlessDriverConfig {
        &self.config
    }

    /// Number of surfaces created by this backend and not closed yet.
    pub fn open_surfaces(&self) -> usize {
        let mut surfaces = self.surfaces.lock();
        surfaces.retain(|s| s.upgrade().is_some_and(|s| !s.surface_core().state().is_closing()));
        surfaces.len()
    }
}

impl DriverBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "HeadlessDriver"
    }

    fn version(&self) -> Version {
        self.config.version
    }

    fn create_surface(
        &self,
        driver: &Driver,
        descriptor: &SurfaceDescriptor,
    ) -> Option<Handle<dyn Surface>> {
        if let Some(max) = self.config.max_surfaces {
            if self.open_surfaces() >= max {
                warn!(max, surface = %descriptor.object_name, "surface limit reached");
                return None;
            }
        }
        let surface = Arc::new(HeadlessSurface::new(driver, descriptor, self.config.origin));
        self.surfaces.lock().push(Arc::downgrade(&surface));
        Some(Handle::from_arc(surface as Arc<dyn Surface>))
    }

    fn on_module_will_terminate(&self, driver: &Driver, module: &dyn Module) -> Result<()> {
        if module.core().id() != self.creator {
            let err = HeadlessError::InvalidModule {
                driver: driver.name().to_string(),
                module: module.name(),
            };
            warn!(creator = %self.creator_name, "{err}");
            return Err(err.into());
        }
        Ok(())
    }
}
