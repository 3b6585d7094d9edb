//! Typed one-to-many listener dispatch.
//!
//! An [`Emitter`] keeps non-owning references to its listeners and invokes a
//! function on each of them. The dispatch policy is part of the emitter's
//! type:
//!
//! - [`Synchronized`]: listeners are called one by one, in registration
//!   order, on the emitting thread.
//! - [`Asynchronized`]: one task is spawned per listener and the emitting
//!   thread blocks until all of them have returned. No ordering is
//!   guaranteed between listeners.
//!
//! In both cases the listener list stays locked for the whole dispatch. A
//! listener must therefore never add, remove or emit on the emitter that is
//! currently calling it: doing so deadlocks.
//!
//! Listeners are held weakly. A listener dropped without unregistering is
//! skipped and pruned at the next dispatch instead of dangling.

use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::handle::Handle;

/// Dispatch mode of an [`EmitPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitMode {
    Synchronized,
    Asynchronized,
}

/// Compile-time dispatch policy of an [`Emitter`].
pub trait EmitPolicy: 'static {
    const MODE: EmitMode;
}

/// Listeners are called in registration order on the emitting thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Synchronized;

/// Listeners are called concurrently; the emitter joins before returning.
#[derive(Debug, Clone, Copy, Default)]
pub struct Asynchronized;

impl EmitPolicy for Synchronized {
    const MODE: EmitMode = EmitMode::Synchronized;
}

impl EmitPolicy for Asynchronized {
    const MODE: EmitMode = EmitMode::Asynchronized;
}

/// Fan-out of calls to a set of listeners of type `L`.
pub struct Emitter<L: ?Sized, P: EmitPolicy = Synchronized> {
    listeners: Mutex<Vec<Weak<L>>>,
    _policy: PhantomData<fn() -> P>,
}

fn weak_addr<L: ?Sized>(weak: &Weak<L>) -> usize {
    Weak::as_ptr(weak).cast::<()>() as usize
}

impl<L: ?Sized + Send + Sync, P: EmitPolicy> Emitter<L, P> {
    /// Create an emitter with no listeners.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            _policy: PhantomData,
        }
    }

    /// The dispatch mode of this emitter.
    #[must_use]
    pub const fn mode(&self) -> EmitMode {
        P::MODE
    }

    /// Register a listener at the end of the list.
    ///
    /// Fails with [`Error::NullReference`] if `listener` is null. Registering
    /// the same listener twice is a no-op.
    pub fn add_listener(&self, listener: &Handle<L>) -> Result<()> {
        let arc = listener.arc().ok_or_else(|| {
            Error::NullReference(format!(
                "null listener for '{}::add_listener()'",
                std::any::type_name::<Self>()
            ))
        })?;
        self.add_weak_listener(Arc::downgrade(arc));
        Ok(())
    }

    /// Register a listener from a weak reference.
    ///
    /// Useful for an object registering itself while it is being built.
    pub fn add_weak_listener(&self, listener: Weak<L>) {
        let addr = weak_addr(&listener);
        let mut listeners = self.listeners.lock();
        if !listeners.iter().any(|l| weak_addr(l) == addr) {
            listeners.push(listener);
        }
    }

    /// Unregister a listener.
    ///
    /// Fails with [`Error::NullReference`] if `listener` is null.
    pub fn remove_listener(&self, listener: &Handle<L>) -> Result<()> {
        if !listener.valid() {
            return Err(Error::NullReference(format!(
                "null listener for '{}::remove_listener()'",
                std::any::type_name::<Self>()
            )));
        }
        self.remove_by_addr(listener.addr());
        Ok(())
    }

    /// Unregister the listener at the given address.
    pub fn remove_by_addr(&self, addr: usize) {
        self.listeners.lock().retain(|l| weak_addr(l) != addr);
    }

    /// Remove every listener.
    pub fn clear_listeners(&self) {
        self.listeners.lock().clear();
    }

    /// Number of listeners that are still alive.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|l| l.strong_count() > 0)
            .count()
    }

    /// Returns true if no live listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listener_count() == 0
    }

    /// Returns true if `listener` is registered.
    #[must_use]
    pub fn contains(&self, listener: &Handle<L>) -> bool {
        let addr = listener.addr();
        listener.valid() && self.listeners.lock().iter().any(|l| weak_addr(l) == addr)
    }

    /// Invoke `f` on every registered listener.
    pub fn emit<F>(&self, f: F)
    where
        F: Fn(&L) + Sync,
    {
        let _ = self.try_emit(|listener| {
            f(listener);
            Ok::<(), Infallible>(())
        });
    }

    /// Invoke a fallible `f` on every registered listener.
    ///
    /// With [`Synchronized`] dispatch stops at the first error. With
    /// [`Asynchronized`] every listener runs and the first error observed is
    /// returned once all of them have finished.
    pub fn try_emit<E, F>(&self, f: F) -> std::result::Result<(), E>
    where
        E: Send,
        F: Fn(&L) -> std::result::Result<(), E> + Sync,
    {
        let mut listeners = self.listeners.lock();
        listeners.retain(|l| l.strong_count() > 0);

        match P::MODE {
            EmitMode::Synchronized => {
                for weak in listeners.iter() {
                    if let Some(listener) = weak.upgrade() {
                        f(&listener)?;
                    }
                }
                Ok(())
            }
            EmitMode::Asynchronized => {
                let live: Vec<Arc<L>> = listeners.iter().filter_map(Weak::upgrade).collect();
                let first_error: Mutex<Option<E>> = Mutex::new(None);
                rayon::scope(|scope| {
                    for listener in &live {
                        let f = &f;
                        let first_error = &first_error;
                        scope.spawn(move |_| {
                            if let Err(e) = f(listener) {
                                first_error.lock().get_or_insert(e);
                            }
                        });
                    }
                });
                first_error.into_inner().map_or(Ok(()), Err)
            }
        }
    }
}

impl<L: ?Sized + Send + Sync, P: EmitPolicy> Default for Emitter<L, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized, P: EmitPolicy> fmt::Debug for Emitter<L, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listener", &std::any::type_name::<L>())
            .field("mode", &P::MODE)
            .field("registered", &self.listeners.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::ThreadId;

    trait Counter: Send + Sync {
        fn hit(&self, order: &Mutex<Vec<usize>>);
        fn thread(&self) -> Option<ThreadId> {
            None
        }
    }

    struct Tally {
        id: usize,
        hits: AtomicUsize,
        thread: Mutex<Option<ThreadId>>,
    }

    impl Tally {
        fn handle(id: usize) -> (Handle<Self>, Handle<dyn Counter>) {
            let tally = Handle::new(Self {
                id,
                hits: AtomicUsize::new(0),
                thread: Mutex::new(None),
            });
            let listener = tally.clone().upcast(|p| p as Arc<dyn Counter>);
            (tally, listener)
        }

        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    impl Counter for Tally {
        fn hit(&self, order: &Mutex<Vec<usize>>) {
            self.hits.fetch_add(1, Ordering::SeqCst);
            *self.thread.lock() = Some(std::thread::current().id());
            order.lock().push(self.id);
        }

        fn thread(&self) -> Option<ThreadId> {
            *self.thread.lock()
        }
    }

    #[test]
    fn sync_emit_follows_registration_order() {
        let emitter: Emitter<dyn Counter> = Emitter::new();
        let tallies: Vec<_> = (0..4).map(Tally::handle).collect();
        for (_, listener) in &tallies {
            emitter.add_listener(listener).unwrap();
        }

        let order = Mutex::new(Vec::new());
        emitter.emit(|l| l.hit(&order));

        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
        let me = std::thread::current().id();
        for (tally, _) in &tallies {
            assert_eq!(tally.get().unwrap().thread(), Some(me));
        }
    }

    #[test]
    fn emit_reaches_exactly_the_registered_listeners() {
        let emitter: Emitter<dyn Counter> = Emitter::new();
        let (a, la) = Tally::handle(0);
        let (b, lb) = Tally::handle(1);
        let (c, lc) = Tally::handle(2);

        emitter.add_listener(&la).unwrap();
        emitter.add_listener(&lb).unwrap();
        emitter.add_listener(&la).unwrap();
        emitter.add_listener(&lc).unwrap();
        emitter.remove_listener(&lb).unwrap();

        let order = Mutex::new(Vec::new());
        emitter.emit(|l| l.hit(&order));

        assert_eq!(a.get().unwrap().hits(), 1);
        assert_eq!(b.get().unwrap().hits(), 0);
        assert_eq!(c.get().unwrap().hits(), 1);
        assert_eq!(emitter.listener_count(), 2);

        emitter.clear_listeners();
        emitter.emit(|l| l.hit(&order));
        assert_eq!(a.get().unwrap().hits(), 1);
        assert!(emitter.is_empty());
    }

    #[test]
    fn dropped_listener_is_skipped() {
        let emitter: Emitter<dyn Counter> = Emitter::new();
        let (a, la) = Tally::handle(0);
        let (b, lb) = Tally::handle(1);
        emitter.add_listener(&la).unwrap();
        emitter.add_listener(&lb).unwrap();

        drop(lb);
        drop(b);

        let order = Mutex::new(Vec::new());
        emitter.emit(|l| l.hit(&order));
        assert_eq!(*order.lock(), vec![0]);
        assert_eq!(a.get().unwrap().hits(), 1);
        assert_eq!(emitter.listener_count(), 1);
    }

    #[test]
    fn null_listener_is_rejected() {
        let emitter: Emitter<dyn Counter> = Emitter::new();
        let err = emitter.add_listener(&Handle::null()).unwrap_err();
        assert_eq!(err.code(), Error::NULL_REFERENCE);
        assert!(emitter.remove_listener(&Handle::null()).is_err());
    }

    #[test]
    fn async_emit_reaches_everyone_before_returning() {
        let emitter: Emitter<dyn Counter, Asynchronized> = Emitter::new();
        assert_eq!(emitter.mode(), EmitMode::Asynchronized);
        let tallies: Vec<_> = (0..8).map(Tally::handle).collect();
        for (_, listener) in &tallies {
            emitter.add_listener(listener).unwrap();
        }

        let order = Mutex::new(Vec::new());
        emitter.emit(|l| l.hit(&order));

        let mut seen = order.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
        for (tally, _) in &tallies {
            assert_eq!(tally.get().unwrap().hits(), 1);
        }
    }

    #[test]
    fn sync_try_emit_stops_at_first_error() {
        let emitter: Emitter<dyn Counter> = Emitter::new();
        let tallies: Vec<_> = (0..3).map(Tally::handle).collect();
        for (_, listener) in &tallies {
            emitter.add_listener(listener).unwrap();
        }

        let order = Mutex::new(Vec::new());
        let calls = AtomicUsize::new(0);
        let result = emitter.try_emit(|l| {
            l.hit(&order);
            if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                Err("second listener failed")
            } else {
                Ok(())
            }
        });

        assert_eq!(result, Err("second listener failed"));
        assert_eq!(*order.lock(), vec![0, 1]);
    }

    #[test]
    fn async_try_emit_runs_everyone_and_reports_error() {
        let emitter: Emitter<dyn Counter, Asynchronized> = Emitter::new();
        let tallies: Vec<_> = (0..4).map(Tally::handle).collect();
        for (_, listener) in &tallies {
            emitter.add_listener(listener).unwrap();
        }

        let order = Mutex::new(Vec::new());
        let result = emitter.try_emit(|l| {
            l.hit(&order);
            Err(7)
        });

        assert_eq!(result, Err(7));
        assert_eq!(order.lock().len(), 4);
    }
}
