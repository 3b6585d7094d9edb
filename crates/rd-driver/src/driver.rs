//! The driver: owner and factory of surfaces and other resources.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};
use rd_app::{Capability, CapabilityKey, Module, ModuleListener};
use rd_core::notification::{notifiate_abort, notifiate_message};
use rd_core::{Asynchronized, Emitter, Error, Handle, ObjectName, Result, Version};
use tracing::{debug, trace, warn};

use crate::release_queue::ReleaseQueue;
use crate::resource::{AsResource, DriverResource, ReleaseOutcome};
use crate::surface::{Surface, SurfaceDescriptor, SurfaceObserver};

/// Published after a surface was created and registered.
pub const DRIVER_SURFACE_CREATED: &str = "RDDriverSurfaceCreated";
/// Published, abortably, when the backend fails to create a surface.
pub const DRIVER_INVALID_SURFACE_CREATION: &str = "RDDriverInvalidSurfaceCreation";
/// Published after every resource was cleared.
pub const DRIVER_DID_CLEAR: &str = "RDDriverDidClear";

/// Backend-specific part of a driver.
pub trait DriverBackend: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> Version;

    fn valid(&self) -> bool {
        true
    }

    /// Builds a surface. Called with the registry locked, so it must not
    /// call back into the driver's registry operations.
    ///
    /// Returns `None` on failure.
    fn create_surface(
        &self,
        driver: &Driver,
        descriptor: &SurfaceDescriptor,
    ) -> Option<Handle<dyn Surface>>;

    /// Called when a module the driver listens to is about to terminate,
    /// before resources are cleared. An error leaves the registries untouched.
    #[allow(unused_variables)]
    fn on_module_will_terminate(&self, driver: &Driver, module: &dyn Module) -> Result<()> {
        Ok(())
    }
}

/// Observer of a driver's registry changes.
///
/// Observers are notified concurrently, one task each.
pub trait DriverObserver: Send + Sync {
    #[allow(unused_variables)]
    fn on_driver_creates_surface(&self, driver: &Driver, surface: &Handle<dyn Surface>) {}

    #[allow(unused_variables)]
    fn on_driver_will_clear(&self, driver: &Driver) {}

    #[allow(unused_variables)]
    fn on_driver_did_clear(&self, driver: &Driver) {}
}

/// The two registries of a driver.
///
/// Every surface is also registered as a resource under the same key.
#[derive(Default)]
pub struct Registry {
    resources: BTreeMap<ObjectName, Handle<dyn DriverResource>>,
    surfaces: BTreeMap<ObjectName, Handle<dyn Surface>>,
}

impl Registry {
    /// Every registered resource, surfaces included.
    pub fn resources(&self) -> &BTreeMap<ObjectName, Handle<dyn DriverResource>> {
        &self.resources
    }

    /// The registered surfaces.
    pub fn surfaces(&self) -> &BTreeMap<ObjectName, Handle<dyn Surface>> {
        &self.surfaces
    }

    /// Registers a resource. Fails with [`Error::HandleNotUnique`] if the
    /// key is taken.
    pub fn insert_resource(
        &mut self,
        name: ObjectName,
        resource: Handle<dyn DriverResource>,
    ) -> Result<()> {
        if self.resources.contains_key(&name) {
            return Err(Error::HandleNotUnique(name.to_string()));
        }
        self.resources.insert(name, resource);
        Ok(())
    }

    /// Registers a surface in both maps.
    pub fn insert_surface(&mut self, name: ObjectName, surface: Handle<dyn Surface>) -> Result<()> {
        let resource = surface.clone().upcast(|s| s.into_resource());
        self.insert_resource(name.clone(), resource)?;
        self.surfaces.insert(name, surface);
        Ok(())
    }

    /// Unregisters `name` from both maps, returning the resource entry.
    pub fn remove(&mut self, name: &ObjectName) -> Option<Handle<dyn DriverResource>> {
        self.surfaces.remove(name);
        self.resources.remove(name)
    }

    /// Unregisters everything, returning the resources.
    fn take(&mut self) -> BTreeMap<ObjectName, Handle<dyn DriverResource>> {
        self.surfaces.clear();
        std::mem::take(&mut self.resources)
    }
}

/// Exclusive access to a driver's registries.
///
/// The lock is released when the guard drops.
pub struct RegistryGuard<'a> {
    inner: MutexGuard<'a, Registry>,
}

impl Deref for RegistryGuard<'_> {
    type Target = Registry;

    fn deref(&self) -> &Registry {
        &self.inner
    }
}

impl DerefMut for RegistryGuard<'_> {
    fn deref_mut(&mut self) -> &mut Registry {
        &mut self.inner
    }
}

/// Unregisters surfaces that report closing.
struct CloseHelper {
    driver: Weak<Driver>,
}

impl SurfaceObserver for CloseHelper {
    fn on_surface_will_close(&self, surface: &dyn Surface) {
        if let Some(driver) = self.driver.upgrade() {
            driver.surface_closing(surface);
        }
    }
}

/// Owner of surfaces and resources created through a backend.
///
/// Resources are kept in keyed registries. Unregistered resources that are
/// still in use wait in a release queue drained on every update tick of the
/// module the driver listens to.
pub struct Driver {
    this: Weak<Driver>,
    backend: Box<dyn DriverBackend>,
    registry: Mutex<Registry>,
    release_queue: Mutex<ReleaseQueue>,
    observers: Emitter<dyn DriverObserver, Asynchronized>,
    close_helper: Arc<CloseHelper>,
}

impl Driver {
    /// Creates a driver around `backend`.
    pub fn new(backend: impl DriverBackend + 'static) -> Handle<Self> {
        let driver = Arc::new_cyclic(|this: &Weak<Self>| Self {
            this: this.clone(),
            backend: Box::new(backend),
            registry: Mutex::new(Registry::default()),
            release_queue: Mutex::new(ReleaseQueue::new()),
            observers: Emitter::new(),
            close_helper: Arc::new(CloseHelper {
                driver: this.clone(),
            }),
        });
        debug!(driver = driver.name(), version = %driver.version(), "driver created");
        Handle::from_arc(driver)
    }

    /// A handle to this driver.
    pub fn handle(&self) -> Handle<Self> {
        self.this.upgrade().map(Handle::from_arc).unwrap_or_default()
    }

    pub(crate) fn downgrade(&self) -> Weak<Self> {
        self.this.clone()
    }

    /// Backend name, used in logs and notifications.
    pub fn name(&self) -> &str {
        self.backend.name()
    }

    /// Backend version.
    pub fn version(&self) -> Version {
        self.backend.version()
    }

    /// Returns false if the backend lost its native context.
    pub fn valid(&self) -> bool {
        self.backend.valid()
    }

    /// Observers of registry changes. Removing one waits for a dispatch in
    /// progress to finish.
    pub fn observers(&self) -> &Emitter<dyn DriverObserver, Asynchronized> {
        &self.observers
    }

    /// Returns the surface registered under `descriptor.object_name`, or
    /// creates and registers one.
    ///
    /// Fails with [`Error::HandleNotUnique`], before the backend is asked for
    /// anything, if a plain resource already holds the name. If the backend
    /// fails, an abortable [`DRIVER_INVALID_SURFACE_CREATION`]
    /// notification is sent: an observer abort fails with
    /// [`Error::AbortRequested`], otherwise a null handle is returned.
    pub fn create_surface(&self, descriptor: &SurfaceDescriptor) -> Result<Handle<dyn Surface>> {
        let key = descriptor.key();
        let created = {
            let mut registry = self.registry.lock();
            if let Some(existing) = registry.surfaces.get(&key) {
                trace!(driver = self.name(), surface = %key, "surface already exists");
                return Ok(existing.clone());
            }
            if registry.resources.contains_key(&key) {
                warn!(driver = self.name(), surface = %key, "name taken by a resource");
                return Err(Error::HandleNotUnique(key.to_string()));
            }

            match self.backend.create_surface(self, descriptor) {
                Some(surface) if surface.valid() => {
                    if let Some(s) = surface.try_get() {
                        // Not yet visible to anyone else, so this cannot
                        // contend with a close in progress.
                        let helper: Weak<dyn SurfaceObserver> = Arc::<CloseHelper>::downgrade(&self.close_helper);
                        s.observers().add_weak_listener(helper);
                    }
                    registry.insert_surface(key.clone(), surface.clone())?;
                    Some(surface)
                }
                _ => None,
            }
        };

        let Some(surface) = created else {
            warn!(driver = self.name(), surface = %key, "surface creation failed");
            notifiate_abort(
                self.name(),
                "create_surface",
                DRIVER_INVALID_SURFACE_CREATION,
                format!("{} could not create surface '{}'", self.name(), descriptor.object_name),
            )?;
            return Ok(Handle::null());
        };

        debug!(driver = self.name(), surface = %key, "surface created");
        self.observers
            .emit(|o| o.on_driver_creates_surface(self, &surface));
        notifiate_message(
            self.name(),
            "create_surface",
            DRIVER_SURFACE_CREATED,
            descriptor.object_name.clone(),
        );
        Ok(surface)
    }

    /// Registers an externally built resource.
    pub fn register_resource(
        &self,
        name: impl Into<ObjectName>,
        resource: Handle<dyn DriverResource>,
    ) -> Result<()> {
        if !resource.valid() {
            return Err(Error::NullReference(
                "null resource for 'Driver::register_resource()'".into(),
            ));
        }
        let name = name.into();
        self.registry.lock().insert_resource(name.clone(), resource)?;
        trace!(driver = self.name(), resource = %name, "resource registered");
        Ok(())
    }

    /// Unregisters `name` and queues it for deferred release.
    ///
    /// Returns false if nothing is registered under `name`.
    pub fn release_resource(&self, name: &str) -> bool {
        let name = ObjectName::new(name);
        let Some(resource) = self.registry.lock().remove(&name) else {
            return false;
        };
        debug!(driver = self.name(), resource = %name, "resource queued for release");
        self.release_queue.lock().queue(name, resource);
        true
    }

    /// The surface registered under `name`, or a null handle.
    pub fn find_surface(&self, name: &str) -> Handle<dyn Surface> {
        self.registry
            .lock()
            .surfaces
            .get(&ObjectName::new(name))
            .cloned()
            .unwrap_or_default()
    }

    /// The resource registered under `name`, surfaces included, or a null
    /// handle.
    pub fn find_resource(&self, name: &str) -> Handle<dyn DriverResource> {
        self.registry
            .lock()
            .resources
            .get(&ObjectName::new(name))
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of the registered surfaces.
    pub fn surfaces(&self) -> Vec<Handle<dyn Surface>> {
        self.registry.lock().surfaces.values().cloned().collect()
    }

    /// Snapshot of the registered resources, surfaces included.
    pub fn resources(&self) -> Vec<Handle<dyn DriverResource>> {
        self.registry.lock().resources.values().cloned().collect()
    }

    /// Number of registered surfaces.
    pub fn surfaces_count(&self) -> usize {
        self.registry.lock().surfaces.len()
    }

    /// Number of registered resources, surfaces included.
    pub fn resources_count(&self) -> usize {
        self.registry.lock().resources.len()
    }

    /// Number of resources waiting in the release queue.
    pub fn pending_release_count(&self) -> usize {
        self.release_queue.lock().pending_count()
    }

    /// Returns true if a resource named `name` waits for release.
    pub fn is_pending_release(&self, name: &str) -> bool {
        self.release_queue.lock().contains(&ObjectName::new(name))
    }

    /// Locks both registries.
    ///
    /// Do not create or close surfaces while holding the guard.
    pub fn lock_registry(&self) -> RegistryGuard<'_> {
        RegistryGuard {
            inner: self.registry.lock(),
        }
    }

    /// Unregisters every resource.
    ///
    /// Unused resources are released immediately, the others are queued.
    pub fn clear_resources(&self) {
        self.observers.emit(|o| o.on_driver_will_clear(self));

        let resources = self.registry.lock().take();
        let mut released = 0_usize;
        let mut deferred = 0_usize;
        for (name, resource) in resources {
            match self.release(&name, &resource) {
                ReleaseOutcome::Released => released += 1,
                ReleaseOutcome::InUse => {
                    self.release_queue.lock().queue(name, resource);
                    deferred += 1;
                }
                ReleaseOutcome::AlreadyReleased => {}
            }
        }
        debug!(driver = self.name(), released, deferred, "driver resources cleared");

        self.observers.emit(|o| o.on_driver_did_clear(self));
        notifiate_message(
            self.name(),
            "clear_resources",
            DRIVER_DID_CLEAR,
            format!("{released} released, {deferred} deferred"),
        );
    }

    /// Releases queued resources from the front while they are unused.
    ///
    /// Returns the number of resources released.
    pub fn drain_release_queue(&self) -> usize {
        let mut released = 0;
        loop {
            let next = self.release_queue.lock().pop_ready();
            let Some(pending) = next else {
                break;
            };
            match self.release(&pending.name, &pending.resource) {
                ReleaseOutcome::Released => released += 1,
                ReleaseOutcome::InUse => {
                    // Locked again since it was popped.
                    self.release_queue.lock().requeue_front(pending);
                    break;
                }
                ReleaseOutcome::AlreadyReleased => {}
            }
        }
        if released > 0 {
            trace!(driver = self.name(), released, "release queue drained");
        }
        released
    }

    /// Releases every unused queued resource regardless of queue order.
    ///
    /// Resources still in use stay queued and are reported. Returns the
    /// number of resources released.
    pub fn flush_release_queue(&self) -> usize {
        let ready = self.release_queue.lock().take_unused();
        let mut released = 0;
        let mut relocked = Vec::new();
        for pending in ready {
            match self.release(&pending.name, &pending.resource) {
                ReleaseOutcome::Released => released += 1,
                ReleaseOutcome::InUse => relocked.push(pending),
                ReleaseOutcome::AlreadyReleased => {}
            }
        }
        let still_used = {
            let mut queue = self.release_queue.lock();
            for pending in relocked.into_iter().rev() {
                queue.requeue_front(pending);
            }
            queue.names()
        };
        for name in &still_used {
            warn!(driver = self.name(), resource = %name, "resource still in use, release deferred");
        }
        released
    }

    /// Runs `on_driver_clear` if the resource can be released right now.
    fn release(&self, name: &ObjectName, resource: &Handle<dyn DriverResource>) -> ReleaseOutcome {
        let Some(r) = resource.try_get() else {
            return ReleaseOutcome::AlreadyReleased;
        };
        let outcome = r.usage().try_release();
        if outcome == ReleaseOutcome::Released {
            r.on_driver_clear();
            debug!(driver = self.name(), resource = %name, "resource released");
        }
        outcome
    }

    fn surface_closing(&self, surface: &dyn Surface) {
        let name = surface.name().clone();
        let addr = std::ptr::from_ref(surface).cast::<()>() as usize;
        let removed = {
            let mut registry = self.registry.lock();
            let registered = registry
                .surfaces
                .get(&name)
                .is_some_and(|s| s.addr() == addr);
            if registered {
                registry.remove(&name)
            } else {
                None
            }
        };
        if let Some(resource) = removed {
            debug!(driver = self.name(), surface = %name, "closed surface queued for release");
            self.release_queue.lock().queue(name, resource);
        }
    }
}

impl ModuleListener for Driver {
    fn on_module_did_update(&self, _module: &dyn Module) -> Result<()> {
        self.drain_release_queue();
        Ok(())
    }

    fn on_module_will_terminate(&self, module: &dyn Module) -> Result<()> {
        self.backend.on_module_will_terminate(self, module)?;
        self.clear_resources();
        Ok(())
    }
}

impl Capability for Driver {
    const KEY: CapabilityKey = CapabilityKey::new("Driver");
}

impl Drop for Driver {
    fn drop(&mut self) {
        let resources = self.registry.get_mut().take();
        let mut leaked = 0;
        for (name, resource) in &resources {
            if self.release(name, resource) == ReleaseOutcome::InUse {
                leaked += 1;
            }
        }
        self.flush_release_queue();
        leaked += self.pending_release_count();
        if leaked > 0 {
            warn!(driver = self.name(), leaked, "driver dropped with resources still in use");
        }
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("name", &self.name())
            .field("version", &self.version())
            .field("resources", &self.resources_count())
            .field("surfaces", &self.surfaces_count())
            .field("pending_release", &self.pending_release_count())
            .finish_non_exhaustive()
    }
}
