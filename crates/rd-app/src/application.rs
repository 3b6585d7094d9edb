//! The application run loop.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use rd_core::notification::{install_default_center, uninstall_default_center};
use rd_core::{Error, Handle, NotificationCenter, Result, Spinlock};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::delegate::ApplicationDelegate;
use crate::loader::{ModuleLibrary, ModuleLoader, CREATE_MODULE_SYMBOL};
use crate::logging;
use crate::module::{main_name, Module};

/// Drives a set of modules through start, update and terminate.
///
/// Building an application installs its notification center as the
/// process default; dropping it uninstalls the center again.
pub struct Application {
    config: AppConfig,
    started: AtomicBool,
    should_terminate: AtomicBool,
    delegate: RwLock<Handle<dyn ApplicationDelegate>>,
    modules: Mutex<Vec<Handle<dyn Module>>>,
    libraries: Mutex<Vec<Box<dyn ModuleLibrary>>>,
    notification_center: Spinlock<Handle<NotificationCenter>>,
}

impl Application {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let center = Handle::new(NotificationCenter::new());
        install_default_center(center.clone());
        Self {
            config,
            started: AtomicBool::new(false),
            should_terminate: AtomicBool::new(false),
            delegate: RwLock::new(Handle::null()),
            modules: Mutex::new(Vec::new()),
            libraries: Mutex::new(Vec::new()),
            notification_center: Spinlock::new(center),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The notification center of this application.
    pub fn notification_center(&self) -> Handle<NotificationCenter> {
        self.notification_center.lock().clone()
    }

    /// Sets the delegate. A null handle removes it.
    pub fn set_delegate(&self, delegate: Handle<dyn ApplicationDelegate>) {
        *self.delegate.write() = delegate;
    }

    pub fn delegate(&self) -> Handle<dyn ApplicationDelegate> {
        self.delegate.read().clone()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Returns true once [`stop`](Self::stop) was called and the loop has
    /// not resumed.
    pub fn is_stopping(&self) -> bool {
        self.should_terminate.load(Ordering::Acquire)
    }

    /// Registers a module.
    ///
    /// If the application has already started, the module is started
    /// right away.
    pub fn add_module(&self, module: Handle<dyn Module>) -> Result<()> {
        let instance = module
            .get()
            .map_err(|_| Error::NullReference("null module for 'Application::add_module()'".into()))?;
        {
            let mut modules = self.modules.lock();
            if modules.iter().any(|m| m.ptr_eq(&module)) {
                return Err(Error::HandleNotUnique(instance.name()));
            }
            modules.push(module.clone());
        }
        debug!(module = %instance.name(), "module added");

        if self.is_started() && !instance.start(self, Instant::now()) {
            warn!(module = %instance.name(), "module failed to start");
        }
        Ok(())
    }

    /// Opens `libname` and registers the module its factory creates.
    ///
    /// If the library cannot be opened, lacks [`CREATE_MODULE_SYMBOL`], or
    /// its factory returns nothing, this fails with
    /// [`Error::ModuleNotLoaded`] when `required` is set, and returns a null
    /// handle otherwise. The library stays open while the application holds
    /// the module.
    pub fn load_module(
        &self,
        loader: &dyn ModuleLoader,
        libname: &str,
        required: bool,
    ) -> Result<Handle<dyn Module>> {
        let Some(library) = loader.open(libname) else {
            return Self::not_loaded(libname, required, "library could not be opened");
        };
        let Some(create) = library.symbol(CREATE_MODULE_SYMBOL) else {
            return Self::not_loaded(libname, required, "factory symbol not found");
        };
        let module = create();
        if !module.valid() {
            return Self::not_loaded(libname, required, "factory returned no module");
        }

        self.add_module(module.clone())?;
        self.libraries.lock().push(library);
        info!(library = libname, "module library loaded");
        Ok(module)
    }

    fn not_loaded(libname: &str, required: bool, reason: &str) -> Result<Handle<dyn Module>> {
        if required {
            return Err(Error::ModuleNotLoaded(libname.to_string()));
        }
        warn!(library = libname, reason, "optional module not loaded");
        Ok(Handle::null())
    }

    /// Finds a module by its main name (the part before `:`).
    ///
    /// Returns a null handle if none matches.
    pub fn find_module(&self, name: &str) -> Handle<dyn Module> {
        let wanted = main_name(name);
        self.modules
            .lock()
            .iter()
            .find(|m| m.try_get().is_some_and(|m| main_name(&m.name()) == wanted))
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of the registered modules.
    pub fn modules(&self) -> Vec<Handle<dyn Module>> {
        self.modules.lock().clone()
    }

    pub fn module_count(&self) -> usize {
        self.modules.lock().len()
    }

    /// Starts every registered module. Only the first call has an effect.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(application = %self.config.name, "application starting");
        let delegate = self.delegate();
        if let Some(d) = delegate.try_get() {
            d.on_application_will_start(self);
        }

        let now = Instant::now();
        for module in self.modules() {
            if let Some(m) = module.try_get() {
                if !m.start(self, now) {
                    warn!(module = %m.name(), "module failed to start");
                }
            }
        }

        if let Some(d) = delegate.try_get() {
            d.on_application_did_start(self);
        }
    }

    /// Asks the loop to exit after the current tick.
    pub fn stop(&self) {
        self.should_terminate.store(true, Ordering::Release);
    }

    /// Starts the application and ticks until stopped, then terminates.
    ///
    /// When the delegate vetoes termination the loop resumes.
    pub fn run(&self) {
        if self.config.init_logging {
            logging::init(&self.config.log_filter);
        }
        self.start();

        let interval = self.config.tick_interval();
        loop {
            while !self.is_stopping() {
                let begin = Instant::now();
                self.tick(begin);
                if let Some(interval) = interval {
                    let elapsed = begin.elapsed();
                    if elapsed < interval {
                        thread::sleep(interval - elapsed);
                    }
                }
            }

            let allowed = self
                .delegate()
                .try_get()
                .map_or(true, |d| d.on_application_should_terminate(self));
            if allowed {
                break;
            }
            debug!(application = %self.config.name, "termination vetoed by delegate");
            self.should_terminate.store(false, Ordering::Release);
        }

        self.terminate();
    }

    /// Runs one update pass over every module.
    pub fn tick(&self, timestamp: Instant) {
        let delegate = self.delegate();
        if let Some(d) = delegate.try_get() {
            d.on_application_will_update(self, timestamp);
        }

        for module in self.modules() {
            if let Some(m) = module.try_get() {
                if !m.update(self, timestamp) {
                    warn!(module = %m.name(), "module update failed");
                }
            }
        }

        if let Some(d) = delegate.try_get() {
            d.on_application_did_update(self, timestamp);
        }
    }

    fn terminate(&self) {
        info!(application = %self.config.name, "application terminating");
        if let Some(d) = self.delegate().try_get() {
            d.on_application_will_terminate(self);
        }

        let now = Instant::now();
        let modules = std::mem::take(&mut *self.modules.lock());
        for module in &modules {
            if let Some(m) = module.try_get() {
                if !m.terminate(self, now) {
                    warn!(module = %m.name(), "module failed to terminate");
                }
            }
        }
        drop(modules);

        self.set_delegate(Handle::null());
        self.libraries.lock().clear();
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        let center = self.notification_center();
        uninstall_default_center(&center);
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.config.name)
            .field("started", &self.is_started())
            .field("modules", &self.module_count())
            .finish_non_exhaustive()
    }
}
