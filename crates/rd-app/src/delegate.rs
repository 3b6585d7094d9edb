//! `ApplicationDelegate` trait definition.

use std::time::Instant;

use crate::application::Application;

/// Receives lifecycle notifications from an [`Application`].
///
/// Every hook has a no-op default. Hooks are invoked on the thread running
/// the application and must not block for long.
pub trait ApplicationDelegate: Send + Sync {
    /// Called before any module is started.
    #[allow(unused_variables)]
    fn on_application_will_start(&self, application: &Application) {}

    /// Called after every module was started.
    #[allow(unused_variables)]
    fn on_application_did_start(&self, application: &Application) {}

    /// Called at the beginning of every tick.
    #[allow(unused_variables)]
    fn on_application_will_update(&self, application: &Application, timestamp: Instant) {}

    /// Called at the end of every tick, after every module was updated.
    #[allow(unused_variables)]
    fn on_application_did_update(&self, application: &Application, timestamp: Instant) {}

    /// Asked once the loop was asked to stop.
    ///
    /// Returning `false` vetoes the termination and the loop resumes.
    #[allow(unused_variables)]
    fn on_application_should_terminate(&self, application: &Application) -> bool {
        true
    }

    /// Called before the modules are terminated.
    #[allow(unused_variables)]
    fn on_application_will_terminate(&self, application: &Application) {}
}
