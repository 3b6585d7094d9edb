//! The headless module.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use rd_app::{Application, Capability, CapabilityCarrier, CapabilityKey, Module, ModuleCore, ModuleListener};
use rd_core::Handle;
use rd_driver::Driver;
use tracing::{debug, info};

use crate::backend::HeadlessBackend;
use crate::config::HeadlessDriverConfig;

/// Main part of the headless module name.
pub const MODULE_MAIN_NAME: &str = "HeadlessModule";

/// Module providing [`Driver`]s backed by in-memory surfaces.
///
/// Every driver it hands out listens to this module, so closed surfaces are
/// released on its update ticks and everything is cleared when it
/// terminates.
pub struct HeadlessModule {
    core: ModuleCore,
}

impl HeadlessModule {
    pub fn new() -> Self {
        Self {
            core: ModuleCore::new(format!("{MODULE_MAIN_NAME}:{}", std::env::consts::OS).as_str()),
        }
    }

    /// Creates a driver owned by the caller and attached to this module.
    pub fn create_driver(&self, config: HeadlessDriverConfig) -> Handle<Driver> {
        let driver = Driver::new(HeadlessBackend::new(config, self));
        let listener = driver.clone().upcast(|d| d as Arc<dyn ModuleListener>);
        if let Err(e) = self.core.listeners().add_listener(&listener) {
            tracing::error!(module = %self.core.name(), "cannot attach driver: {e}");
            return Handle::null();
        }
        debug!(module = %self.core.name(), "driver created");
        driver
    }
}

impl Default for HeadlessModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for HeadlessModule {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn start(&self, _application: &Application, _timestamp: Instant) -> bool {
        info!(module = %self.core.name(), "headless module started");
        self.core.did_start(self)
    }

    fn update(&self, _application: &Application, _timestamp: Instant) -> bool {
        let will = self.core.will_update(self);
        let did = self.core.did_update(self);
        will && did
    }

    fn terminate(&self, _application: &Application, _timestamp: Instant) -> bool {
        info!(module = %self.core.name(), "headless module terminating");
        self.core.will_terminate(self)
    }

    /// Answers [`Driver`] requests. `user_data` may carry a
    /// [`HeadlessDriverConfig`].
    fn load_by_key(
        &self,
        key: CapabilityKey,
        user_data: Option<&(dyn Any + Send + Sync)>,
    ) -> Option<CapabilityCarrier> {
        if key != Driver::KEY {
            return None;
        }
        let config = user_data
            .and_then(|data| data.downcast_ref::<HeadlessDriverConfig>())
            .cloned()
            .unwrap_or_default();
        let driver = self.create_driver(config);
        driver.valid().then(|| CapabilityCarrier::new(driver))
    }
}

/// Library entry point, registered as the module factory.
pub fn create_module() -> Handle<dyn Module> {
    Handle::new(HeadlessModule::new()).upcast(|m| m as Arc<dyn Module>)
}
