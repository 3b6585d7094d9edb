//! Typed capability lookup across module boundaries.
//!
//! A module exposes services by answering [`Module::load_by_key`] with a
//! [`CapabilityCarrier`]. Callers go through [`ModuleExt::load_capability`],
//! which matches the key and recovers the concrete handle type.

use std::any::Any;
use std::fmt;

use rd_core::object_name::fnv1a;
use rd_core::Handle;
use tracing::warn;

use crate::module::Module;

/// Stable identifier of a capability type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CapabilityKey(&'static str);

impl CapabilityKey {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn name(&self) -> &'static str {
        self.0
    }

    /// FNV-1a hash of the key name.
    pub const fn hash_value(&self) -> u64 {
        fnv1a(self.0.as_bytes())
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A type that can be requested from a module by key.
///
/// Usually implemented for trait objects:
///
/// ```
/// use rd_app::{Capability, CapabilityKey};
///
/// trait Audio: Send + Sync {}
///
/// impl Capability for dyn Audio {
///     const KEY: CapabilityKey = CapabilityKey::new("Audio");
/// }
/// ```
pub trait Capability: Send + Sync + 'static {
    const KEY: CapabilityKey;
}

/// A capability handle in transit, tagged with its key.
pub struct CapabilityCarrier {
    key: CapabilityKey,
    handle: Box<dyn Any + Send>,
}

impl CapabilityCarrier {
    pub fn new<T: Capability + ?Sized>(handle: Handle<T>) -> Self {
        Self {
            key: T::KEY,
            handle: Box::new(handle),
        }
    }

    pub const fn key(&self) -> CapabilityKey {
        self.key
    }

    /// Recovers the handle, or `None` if it is not a `Handle<T>`.
    pub fn into_handle<T: Capability + ?Sized>(self) -> Option<Handle<T>> {
        self.handle.downcast::<Handle<T>>().ok().map(|handle| *handle)
    }
}

impl fmt::Debug for CapabilityCarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityCarrier")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Typed helpers available on every [`Module`].
pub trait ModuleExt: Module {
    /// Requests the capability `T` from this module.
    ///
    /// Returns `None` if the module does not provide it, or answered with
    /// something else.
    fn load_capability<T: Capability + ?Sized>(
        &self,
        user_data: Option<&(dyn Any + Send + Sync)>,
    ) -> Option<Handle<T>> {
        let carrier = self.load_by_key(T::KEY, user_data)?;
        if carrier.key() != T::KEY {
            warn!(
                module = %self.name(),
                requested = %T::KEY,
                answered = %carrier.key(),
                "module answered a capability request with another key"
            );
            return None;
        }
        let handle = carrier.into_handle::<T>();
        if handle.is_none() {
            warn!(module = %self.name(), requested = %T::KEY, "capability type mismatch");
        }
        handle
    }
}

impl<M: Module + ?Sized> ModuleExt for M {}
