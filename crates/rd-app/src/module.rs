//! Pluggable application modules.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use rd_core::{Emitter, Result};
use tracing::{debug, error, warn};

use crate::application::Application;
use crate::capability::{CapabilityCarrier, CapabilityKey};

/// Observer of a module's lifecycle.
///
/// Returning an error from a hook makes the emitting lifecycle step report
/// failure to the application.
pub trait ModuleListener: Send + Sync {
    #[allow(unused_variables)]
    fn on_module_did_start(&self, module: &dyn Module) -> Result<()> {
        Ok(())
    }

    #[allow(unused_variables)]
    fn on_module_will_terminate(&self, module: &dyn Module) -> Result<()> {
        Ok(())
    }

    #[allow(unused_variables)]
    fn on_module_will_update(&self, module: &dyn Module) -> Result<()> {
        Ok(())
    }

    #[allow(unused_variables)]
    fn on_module_did_update(&self, module: &dyn Module) -> Result<()> {
        Ok(())
    }
}

/// A pluggable unit driven by an [`Application`].
///
/// Implementors embed a [`ModuleCore`] and call its lifecycle helpers from
/// `start`, `update` and `terminate` so listeners get notified.
pub trait Module: Send + Sync {
    /// Shared lifecycle state and listener list.
    fn core(&self) -> &ModuleCore;

    /// Called once when the application starts, or on registration if it
    /// already has. Returns false on failure.
    fn start(&self, application: &Application, timestamp: Instant) -> bool;

    /// Called once per application tick. Returns false on failure.
    fn update(&self, application: &Application, timestamp: Instant) -> bool;

    /// Called once when the application terminates. Returns false on failure.
    fn terminate(&self, application: &Application, timestamp: Instant) -> bool;

    /// Full module name, `<main>[:<platform>]`.
    fn name(&self) -> String {
        self.core().name().to_string()
    }

    /// Resolve a capability by key.
    ///
    /// Prefer [`ModuleExt::load_capability`](crate::ModuleExt::load_capability),
    /// which checks the returned type.
    #[allow(unused_variables)]
    fn load_by_key(
        &self,
        key: CapabilityKey,
        user_data: Option<&(dyn Any + Send + Sync)>,
    ) -> Option<CapabilityCarrier> {
        None
    }
}

/// Returns the main part of a module name, before the first `:`.
pub fn main_name(full: &str) -> &str {
    full.split(':').next().unwrap_or(full)
}

/// Name of a module, `<main>[:<platform>]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleName(String);

impl ModuleName {
    pub fn new(full: impl Into<String>) -> Self {
        Self(full.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Part before the first `:`.
    pub fn main(&self) -> &str {
        main_name(&self.0)
    }

    /// Part after the first `:`, if any.
    pub fn platform(&self) -> Option<&str> {
        self.0.split_once(':').map(|(_, platform)| platform)
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Lifecycle state of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleState {
    Created,
    Started,
    Updating,
    Terminated,
}

static NEXT_MODULE_ID: AtomicU64 = AtomicU64::new(1);

/// State every module carries: name, lifecycle state and listeners.
pub struct ModuleCore {
    id: u64,
    name: ModuleName,
    state: Mutex<ModuleState>,
    listeners: Emitter<dyn ModuleListener>,
}

impl ModuleCore {
    pub fn new(name: impl Into<ModuleName>) -> Self {
        Self {
            id: NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            state: Mutex::new(ModuleState::Created),
            listeners: Emitter::new(),
        }
    }

    /// Process-unique id, stable when the module is moved.
    pub const fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &ModuleName {
        &self.name
    }

    pub fn state(&self) -> ModuleState {
        *self.state.lock()
    }

    /// Listeners of this module.
    pub fn listeners(&self) -> &Emitter<dyn ModuleListener> {
        &self.listeners
    }

    /// Marks the module started and notifies `on_module_did_start`.
    pub fn did_start(&self, module: &dyn Module) -> bool {
        if !self.transition(ModuleState::Created, ModuleState::Started) {
            return false;
        }
        self.notify("did_start", |listener| listener.on_module_did_start(module))
    }

    /// Notifies `on_module_will_update` at the beginning of a tick.
    pub fn will_update(&self, module: &dyn Module) -> bool {
        if !self.transition(ModuleState::Started, ModuleState::Updating) {
            return false;
        }
        self.notify("will_update", |listener| listener.on_module_will_update(module))
    }

    /// Notifies `on_module_did_update` at the end of a tick.
    ///
    /// The state returns to started even if a listener fails.
    pub fn did_update(&self, module: &dyn Module) -> bool {
        let ok = self.notify("did_update", |listener| listener.on_module_did_update(module));
        self.transition(ModuleState::Updating, ModuleState::Started) && ok
    }

    /// Notifies `on_module_will_terminate`, then drops every listener.
    ///
    /// Listeners are cleared even if one of them fails, so nothing can
    /// reach back into a terminated module.
    pub fn will_terminate(&self, module: &dyn Module) -> bool {
        {
            let mut state = self.state.lock();
            if *state == ModuleState::Terminated {
                warn!(module = %self.name, "module terminated twice");
                return false;
            }
            *state = ModuleState::Terminated;
        }
        let ok = self.notify("will_terminate", |listener| {
            listener.on_module_will_terminate(module)
        });
        self.listeners.clear_listeners();
        ok
    }

    fn transition(&self, from: ModuleState, to: ModuleState) -> bool {
        let mut state = self.state.lock();
        if *state != from {
            warn!(module = %self.name, current = ?*state, expected = ?from, next = ?to, "invalid module state transition");
            return false;
        }
        *state = to;
        debug!(module = %self.name, state = ?to, "module state changed");
        true
    }

    fn notify<F>(&self, hook: &str, f: F) -> bool
    where
        F: Fn(&(dyn ModuleListener + 'static)) -> Result<()> + Sync,
    {
        match self.listeners.try_emit(f) {
            Ok(()) => true,
            Err(e) => {
                error!(module = %self.name, hook, code = e.code(), "module listener failed: {e}");
                false
            }
        }
    }
}

impl fmt::Debug for ModuleCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("listeners", &self.listeners.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use rd_core::{Error, Handle};

    use super::*;

    struct Plain {
        core: ModuleCore,
    }

    impl Module for Plain {
        fn core(&self) -> &ModuleCore {
            &self.core
        }
        fn start(&self, _: &Application, _: Instant) -> bool {
            self.core.did_start(self)
        }
        fn update(&self, _: &Application, _: Instant) -> bool {
            self.core.will_update(self) && self.core.did_update(self)
        }
        fn terminate(&self, _: &Application, _: Instant) -> bool {
            self.core.will_terminate(self)
        }
    }

    #[derive(Default)]
    struct Recorder {
        starts: AtomicUsize,
        updates: AtomicUsize,
        terminates: AtomicUsize,
        fail_start: bool,
    }

    impl ModuleListener for Recorder {
        fn on_module_did_start(&self, _: &dyn Module) -> Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                return Err(Error::Module {
                    code: 7,
                    message: "refused".into(),
                });
            }
            Ok(())
        }
        fn on_module_did_update(&self, _: &dyn Module) -> Result<()> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn on_module_will_terminate(&self, _: &dyn Module) -> Result<()> {
            self.terminates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn plain(name: &str) -> Plain {
        Plain {
            core: ModuleCore::new(name),
        }
    }

    fn listen(module: &Plain, recorder: &Handle<Recorder>) {
        let listener = recorder.clone().upcast(|r| r as Arc<dyn ModuleListener>);
        module.core.listeners().add_listener(&listener).unwrap();
    }

    #[test]
    fn name_parts() {
        let name = ModuleName::new("HeadlessModule:linux");
        assert_eq!(name.main(), "HeadlessModule");
        assert_eq!(name.platform(), Some("linux"));
        assert_eq!(ModuleName::new("Audio").platform(), None);
        assert_eq!(main_name("Audio"), "Audio");
        assert_eq!(plain("Net:Any").name(), "Net:Any");
    }

    #[test]
    fn lifecycle_notifies_listeners() {
        let module = plain("Test");
        let recorder = Handle::new(Recorder::default());
        listen(&module, &recorder);

        assert!(module.core.did_start(&module));
        assert!(module.core.will_update(&module));
        assert_eq!(module.core.state(), ModuleState::Updating);
        assert!(module.core.did_update(&module));
        assert_eq!(module.core.state(), ModuleState::Started);
        assert!(module.core.will_terminate(&module));

        let r = recorder.get().unwrap();
        assert_eq!(r.starts.load(Ordering::SeqCst), 1);
        assert_eq!(r.updates.load(Ordering::SeqCst), 1);
        assert_eq!(r.terminates.load(Ordering::SeqCst), 1);
        assert_eq!(module.core.state(), ModuleState::Terminated);
    }

    #[test]
    fn terminate_clears_listeners() {
        let module = plain("Test");
        let recorder = Handle::new(Recorder::default());
        listen(&module, &recorder);
        assert!(module.core.did_start(&module));
        assert!(module.core.will_terminate(&module));
        assert!(module.core.listeners().is_empty());
        assert!(!module.core.will_terminate(&module));
        assert_eq!(recorder.get().unwrap().terminates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_error_fails_step() {
        let module = plain("Test");
        let recorder = Handle::new(Recorder {
            fail_start: true,
            ..Recorder::default()
        });
        listen(&module, &recorder);
        assert!(!module.core.did_start(&module));
        assert_eq!(module.core.state(), ModuleState::Started);
    }

    #[test]
    fn id_survives_moves() {
        let a = plain("Same");
        let b = plain("Same");
        assert_ne!(a.core.id(), b.core.id());

        let id = a.core.id();
        let boxed = Box::new(a);
        assert_eq!(boxed.core.id(), id);
        let shared: Arc<dyn Module> = Arc::new(*boxed);
        assert_eq!(shared.core().id(), id);
    }

    #[test]
    fn update_requires_start() {
        let module = plain("Test");
        assert!(!module.core.will_update(&module));
        assert_eq!(module.core.state(), ModuleState::Created);
    }
}
