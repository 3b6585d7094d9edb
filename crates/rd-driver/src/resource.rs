//! Use-counted resources owned by a [`Driver`].
//!
//! A resource is never destroyed while in use. The driver decides when to
//! release it, either immediately or through the deferred release queue.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use rd_core::{Error, Handle, Result};
use tracing::warn;

use crate::driver::Driver;

const RELEASED: usize = 1 << (usize::BITS - 1);
const USES: usize = !RELEASED;

/// Result of asking a resource to be released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleaseOutcome {
    Released,
    InUse,
    AlreadyReleased,
}

/// Use counter and creator link carried by every resource.
///
/// The use count and the released flag share one atomic word, so the
/// decision to release only succeeds while the count is zero.
pub struct ResourceUsage {
    creator: Weak<Driver>,
    state: AtomicUsize,
}

impl ResourceUsage {
    /// Usage for a resource created by `driver`.
    pub fn new(driver: &Driver) -> Self {
        Self::with_creator(driver.downgrade())
    }

    /// Usage for a resource with no creating driver.
    pub const fn detached() -> Self {
        Self::with_creator(Weak::new())
    }

    const fn with_creator(creator: Weak<Driver>) -> Self {
        Self {
            creator,
            state: AtomicUsize::new(0),
        }
    }

    /// Increments the use count.
    ///
    /// Locking a released resource still counts, but does not bring its
    /// native state back. Use [`try_lock`](Self::try_lock) to refuse it.
    pub fn lock(&self) {
        self.state.fetch_add(1, Ordering::AcqRel);
    }

    /// Increments the use count unless the resource was released.
    pub fn try_lock(&self) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                (state & RELEASED == 0).then_some(state + 1)
            })
            .is_ok()
    }

    /// Decrements the use count. Unlocking an unused resource is reported
    /// and ignored.
    pub fn unlock(&self) {
        let result = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                (state & USES > 0).then(|| state - 1)
            });
        if result.is_err() {
            warn!("resource unlocked without a matching lock");
        }
    }

    pub fn uses_count(&self) -> usize {
        self.state.load(Ordering::Acquire) & USES
    }

    pub fn is_used(&self) -> bool {
        self.uses_count() > 0
    }

    /// The creating driver, or a null handle if it is gone.
    pub fn driver(&self) -> Handle<Driver> {
        self.creator.upgrade().map(Handle::from_arc).unwrap_or_default()
    }

    pub fn is_cleared(&self) -> bool {
        self.state.load(Ordering::Acquire) & RELEASED != 0
    }

    /// Marks the resource released if it is unused and was not released yet.
    pub(crate) fn try_release(&self) -> ReleaseOutcome {
        match self
            .state
            .compare_exchange(0, RELEASED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => ReleaseOutcome::Released,
            Err(state) if state & RELEASED != 0 => ReleaseOutcome::AlreadyReleased,
            Err(_) => ReleaseOutcome::InUse,
        }
    }
}

impl Default for ResourceUsage {
    fn default() -> Self {
        Self::detached()
    }
}

impl fmt::Debug for ResourceUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceUsage")
            .field("uses", &self.uses_count())
            .field("cleared", &self.is_cleared())
            .finish_non_exhaustive()
    }
}

/// An object owned by a driver whose destruction waits until it is unused.
pub trait DriverResource: Send + Sync {
    fn usage(&self) -> &ResourceUsage;

    /// Releases native state. Called by the driver at most once, when the
    /// resource is unused.
    fn on_driver_clear(&self);

    fn lock(&self) {
        self.usage().lock();
    }

    fn try_lock(&self) -> bool {
        self.usage().try_lock()
    }

    fn unlock(&self) {
        self.usage().unlock();
    }

    fn is_used(&self) -> bool {
        self.usage().is_used()
    }

    fn uses_count(&self) -> usize {
        self.usage().uses_count()
    }

    fn driver(&self) -> Handle<Driver> {
        self.usage().driver()
    }
}

/// Conversion of concrete resources and resource sub-traits into
/// `dyn DriverResource`.
pub trait AsResource {
    fn as_resource(&self) -> &dyn DriverResource;
    fn into_resource(self: Arc<Self>) -> Arc<dyn DriverResource>;
}

impl<T: DriverResource + 'static> AsResource for T {
    fn as_resource(&self) -> &dyn DriverResource {
        self
    }

    fn into_resource(self: Arc<Self>) -> Arc<dyn DriverResource> {
        self
    }
}

/// Keeps a resource in use for as long as the guard lives.
pub struct UseGuard {
    resource: Arc<dyn DriverResource>,
}

impl UseGuard {
    /// Locks `resource`. Fails with [`Error::NullReference`] on a null or
    /// already released resource.
    pub fn acquire(resource: &Handle<dyn DriverResource>) -> Result<Self> {
        let resource = resource
            .arc()
            .cloned()
            .ok_or_else(|| Error::NullReference("null resource for 'UseGuard::acquire()'".into()))?;
        if !resource.try_lock() {
            return Err(Error::NullReference(
                "released resource for 'UseGuard::acquire()'".into(),
            ));
        }
        Ok(Self { resource })
    }
}

impl Deref for UseGuard {
    type Target = dyn DriverResource;

    fn deref(&self) -> &Self::Target {
        &*self.resource
    }
}

impl Drop for UseGuard {
    fn drop(&mut self) {
        self.resource.unlock();
    }
}
