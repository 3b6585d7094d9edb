//! Shared-ownership handles.
//!
//! A [`Handle`] is a nullable, reference-counted link to a shared object.
//! Copies share ownership; the object is destroyed when the last handle is
//! dropped. Dereferencing a null handle is a reported error, never undefined
//! behaviour.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::alloc::AllocationTicket;
use crate::error::{Error, Result};

/// Shared-ownership reference to an object of type `T`.
pub struct Handle<T: ?Sized> {
    inner: Option<Arc<T>>,
    ticket: Option<Arc<AllocationTicket>>,
}

impl<T> Handle<T> {
    /// Creates the object and returns the first handle to it.
    pub fn new(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Like [`Handle::new`], but registers the object with the
    /// [`AllocationTracker`](crate::AllocationTracker) until its last handle
    /// is dropped.
    pub fn tracked(value: T) -> Self {
        let inner = Arc::new(value);
        let address = Arc::as_ptr(&inner) as usize;
        Self {
            inner: Some(inner),
            ticket: Some(Arc::new(AllocationTicket::register::<T>(address))),
        }
    }
}

impl<T: ?Sized> Handle<T> {
    /// A handle that refers to nothing.
    #[must_use]
    pub const fn null() -> Self {
        Self {
            inner: None,
            ticket: None,
        }
    }

    /// Wraps an existing shared pointer.
    pub fn from_arc(inner: Arc<T>) -> Self {
        Self {
            inner: Some(inner),
            ticket: None,
        }
    }

    /// Returns true if this handle refers to an object.
    #[inline]
    #[must_use]
    pub const fn valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Returns true if this handle is the only strong owner of its object.
    #[must_use]
    pub fn owned(&self) -> bool {
        self.inner.as_ref().is_some_and(|a| Arc::strong_count(a) == 1)
    }

    /// Number of strong owners of the object, 0 for a null handle.
    #[must_use]
    pub fn share_count(&self) -> usize {
        self.inner.as_ref().map_or(0, Arc::strong_count)
    }

    /// Dereferences the handle.
    ///
    /// Fails with [`Error::NullReference`] if the handle is null.
    pub fn get(&self) -> Result<&T> {
        self.inner.as_deref().ok_or_else(|| {
            Error::NullReference(format!(
                "{}: null handled object dereferenced",
                std::any::type_name::<Self>()
            ))
        })
    }

    /// Dereferences the handle, returning `None` if it is null.
    #[inline]
    #[must_use]
    pub fn try_get(&self) -> Option<&T> {
        self.inner.as_deref()
    }

    /// The underlying shared pointer, if any.
    #[inline]
    #[must_use]
    pub const fn arc(&self) -> Option<&Arc<T>> {
        self.inner.as_ref()
    }

    /// Address of the object, or 0 for a null handle.
    ///
    /// Stable across [`upcast`](Self::upcast), so it identifies the object
    /// whatever static type is used to look at it.
    #[must_use]
    pub fn addr(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |a| Arc::as_ptr(a).cast::<()>() as usize)
    }

    /// Returns true if both handles refer to the same object.
    ///
    /// Two null handles are not considered equal.
    #[must_use]
    pub fn ptr_eq<U: ?Sized>(&self, other: &Handle<U>) -> bool {
        self.valid() && self.addr() == other.addr()
    }

    /// Creates a non-owning reference to the object.
    #[must_use]
    pub fn downgrade(&self) -> WeakHandle<T> {
        WeakHandle {
            inner: self.inner.as_ref().map(Arc::downgrade),
            ticket: self.ticket.as_ref().map(Arc::downgrade),
        }
    }

    /// Releases this handle's share and makes it null.
    pub fn reset(&mut self) {
        self.inner = None;
        self.ticket = None;
    }

    /// Swaps the objects referred to by two handles.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    /// Converts the handle to another static type, preserving shared
    /// ownership and tracking.
    ///
    /// The conversion is usually an unsizing coercion:
    ///
    /// ```
    /// use std::sync::Arc;
    /// use rd_core::Handle;
    ///
    /// trait Named: Send + Sync {
    ///     fn name(&self) -> &str;
    /// }
    /// struct Thing;
    /// impl Named for Thing {
    ///     fn name(&self) -> &str {
    ///         "thing"
    ///     }
    /// }
    ///
    /// let thing = Handle::new(Thing);
    /// let named: Handle<dyn Named> = thing.clone().upcast(|t| t as Arc<dyn Named>);
    /// assert!(named.ptr_eq(&thing));
    /// assert_eq!(named.get().unwrap().name(), "thing");
    /// ```
    pub fn upcast<U: ?Sized>(self, convert: impl FnOnce(Arc<T>) -> Arc<U>) -> Handle<U> {
        Handle {
            inner: self.inner.map(convert),
            ticket: self.ticket,
        }
    }
}

impl<T: ?Sized> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            ticket: self.ticket.clone(),
        }
    }
}

impl<T: ?Sized> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl<T: ?Sized> Eq for Handle<T> {}

impl<T: ?Sized> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid() {
            write!(f, "Handle<{}>({:#x})", std::any::type_name::<T>(), self.addr())
        } else {
            write!(f, "Handle<{}>(null)", std::any::type_name::<T>())
        }
    }
}

impl<T: ?Sized> From<Arc<T>> for Handle<T> {
    fn from(inner: Arc<T>) -> Self {
        Self::from_arc(inner)
    }
}

/// Non-owning counterpart of [`Handle`].
pub struct WeakHandle<T: ?Sized> {
    inner: Option<Weak<T>>,
    ticket: Option<Weak<AllocationTicket>>,
}

impl<T: ?Sized> WeakHandle<T> {
    /// A weak handle that never upgrades.
    #[must_use]
    pub const fn null() -> Self {
        Self {
            inner: None,
            ticket: None,
        }
    }

    /// Returns a strong handle, or a null one if the object is gone.
    #[must_use]
    pub fn upgrade(&self) -> Handle<T> {
        match self.inner.as_ref().and_then(Weak::upgrade) {
            Some(inner) => Handle {
                inner: Some(inner),
                ticket: self.ticket.as_ref().and_then(Weak::upgrade),
            },
            None => Handle::null(),
        }
    }

    /// Returns true if the object is still alive.
    #[must_use]
    pub fn alive(&self) -> bool {
        self.inner.as_ref().is_some_and(|w| w.strong_count() > 0)
    }
}

impl<T: ?Sized> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            ticket: self.ticket.clone(),
        }
    }
}

impl<T: ?Sized> Default for WeakHandle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> fmt::Debug for WeakHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WeakHandle<{}>(alive: {})",
            std::any::type_name::<T>(),
            self.alive()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AllocationTracker;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Shape: Send + Sync {
        fn sides(&self) -> u32;
    }

    struct Square {
        drops: Arc<AtomicUsize>,
    }

    impl Shape for Square {
        fn sides(&self) -> u32 {
            4
        }
    }

    impl Drop for Square {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn null_handle_reports_error() {
        let handle: Handle<u32> = Handle::null();
        assert!(!handle.valid());
        assert_eq!(handle.addr(), 0);
        let err = handle.get().unwrap_err();
        assert_eq!(err.code(), Error::NULL_REFERENCE);
    }

    #[test]
    fn try_get_is_none_only_when_null() {
        let null: Handle<u32> = Handle::null();
        assert!(null.try_get().is_none());
        assert_eq!(Handle::new(3_u32).try_get(), Some(&3));
    }

    #[test]
    fn copies_share_and_last_drop_destroys() {
        let drops = Arc::new(AtomicUsize::new(0));
        let a = Handle::new(Square {
            drops: drops.clone(),
        });
        assert!(a.owned());

        let b = a.clone();
        assert!(!a.owned());
        assert_eq!(a.share_count(), 2);
        assert_eq!(a, b);

        drop(a);
        assert!(b.owned());
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        drop(b);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn upcast_keeps_identity_and_runs_concrete_drop() {
        let drops = Arc::new(AtomicUsize::new(0));
        let square = Handle::new(Square {
            drops: drops.clone(),
        });
        let shape: Handle<dyn Shape> = square.clone().upcast(|s| s as Arc<dyn Shape>);

        assert!(shape.ptr_eq(&square));
        assert_eq!(shape.get().unwrap().sides(), 4);

        drop(square);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(shape);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn weak_handle_does_not_keep_alive() {
        let strong = Handle::new(5_u32);
        let weak = strong.downgrade();
        assert!(weak.alive());
        assert_eq!(*weak.upgrade().get().unwrap(), 5);

        drop(strong);
        assert!(!weak.alive());
        assert!(!weak.upgrade().valid());
    }

    #[test]
    fn reset_and_swap() {
        let mut a = Handle::new(1_u8);
        let mut b = Handle::new(2_u8);
        a.swap(&mut b);
        assert_eq!(*a.get().unwrap(), 2);
        assert_eq!(*b.get().unwrap(), 1);

        a.reset();
        assert!(!a.valid());
        assert!(!a.ptr_eq(&Handle::<u8>::null()));
    }

    #[test]
    fn tracked_handle_leaves_leak_set_on_last_drop() {
        let a = Handle::tracked([0_u8; 24]);
        let address = a.addr();
        assert!(AllocationTracker::is_tracked(address));

        let b = a.clone();
        drop(a);
        assert!(AllocationTracker::is_tracked(address));

        drop(b);
        assert!(!AllocationTracker::is_tracked(address));
    }
}
