//! Deferred release of driver resources.
//!
//! A resource that is still in use when it gets unregistered cannot be
//! released immediately. It waits in this queue until it is unused and the
//! driver drains the queue on its owning module's update tick.

use std::collections::VecDeque;
use std::time::Instant;

use rd_core::{Handle, ObjectName};

use crate::resource::DriverResource;

/// A resource pending release.
pub struct PendingRelease {
    /// Registry key the resource was known under.
    pub name: ObjectName,
    /// The resource to be released.
    pub resource: Handle<dyn DriverResource>,
    /// When the resource was queued.
    pub queued_at: Instant,
}

impl PendingRelease {
    fn is_used(&self) -> bool {
        self.resource.try_get().is_some_and(|r| r.is_used())
    }
}

/// FIFO of resources waiting to become unused.
#[derive(Default)]
pub struct ReleaseQueue {
    pending: VecDeque<PendingRelease>,
}

impl ReleaseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a resource for deferred release.
    pub fn queue(&mut self, name: ObjectName, resource: Handle<dyn DriverResource>) {
        self.pending.push_back(PendingRelease {
            name,
            resource,
            queued_at: Instant::now(),
        });
    }

    /// Pop the front entry if it is unused.
    ///
    /// Draining stops at the first entry still in use, even if later
    /// entries are already unused.
    pub fn pop_ready(&mut self) -> Option<PendingRelease> {
        if self.pending.front().is_some_and(|p| !p.is_used()) {
            self.pending.pop_front()
        } else {
            None
        }
    }

    /// Put back an entry that was popped but got locked again before it
    /// could be released. It keeps its place at the front.
    pub fn requeue_front(&mut self, pending: PendingRelease) {
        self.pending.push_front(pending);
    }

    /// Remove every unused entry regardless of position.
    ///
    /// Entries still in use stay queued in their original order.
    pub fn take_unused(&mut self) -> Vec<PendingRelease> {
        let (used, unused): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(PendingRelease::is_used);
        self.pending = used.into();
        unused
    }

    /// Get the number of pending releases.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns true if a resource with `name` is queued.
    pub fn contains(&self, name: &ObjectName) -> bool {
        self.pending.iter().any(|p| &p.name == name)
    }

    /// Names of the queued resources, front first.
    pub fn names(&self) -> Vec<ObjectName> {
        self.pending.iter().map(|p| p.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::resource::ResourceUsage;

    struct Texture {
        usage: ResourceUsage,
    }

    impl DriverResource for Texture {
        fn usage(&self) -> &ResourceUsage {
            &self.usage
        }
        fn on_driver_clear(&self) {}
    }

    fn texture(uses: usize) -> Handle<dyn DriverResource> {
        let t = Texture {
            usage: ResourceUsage::detached(),
        };
        for _ in 0..uses {
            t.lock();
        }
        Handle::new(t).upcast(|t| t as Arc<dyn DriverResource>)
    }

    #[test]
    fn drains_in_order_until_used_entry() {
        let mut queue = ReleaseQueue::new();
        queue.queue("a".into(), texture(0));
        queue.queue("b".into(), texture(1));
        queue.queue("c".into(), texture(0));

        assert_eq!(queue.pop_ready().map(|p| p.name), Some("a".into()));
        // "c" is unused but waits behind "b".
        assert!(queue.pop_ready().is_none());
        assert_eq!(queue.pending_count(), 2);
        assert!(queue.contains(&"c".into()));
    }

    #[test]
    fn drains_after_unlock() {
        let mut queue = ReleaseQueue::new();
        let used = texture(1);
        queue.queue("b".into(), used.clone());
        queue.queue("c".into(), texture(0));
        assert!(queue.pop_ready().is_none());

        used.get().unwrap().unlock();
        assert_eq!(queue.pop_ready().map(|p| p.name), Some("b".into()));
        assert_eq!(queue.pop_ready().map(|p| p.name), Some("c".into()));
        assert!(queue.is_empty());
    }

    #[test]
    fn take_unused_skips_ahead() {
        let mut queue = ReleaseQueue::new();
        queue.queue("a".into(), texture(1));
        queue.queue("b".into(), texture(0));
        queue.queue("c".into(), texture(2));
        queue.queue("d".into(), texture(0));

        let names: Vec<_> = queue.take_unused().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec![ObjectName::from("b"), ObjectName::from("d")]);
        assert_eq!(queue.names(), vec![ObjectName::from("a"), ObjectName::from("c")]);
    }

    #[test]
    fn requeued_entry_stays_first() {
        let mut queue = ReleaseQueue::new();
        queue.queue("a".into(), texture(0));
        queue.queue("b".into(), texture(0));

        let a = queue.pop_ready().unwrap();
        a.resource.get().unwrap().lock();
        queue.requeue_front(a);

        assert_eq!(queue.names(), vec![ObjectName::from("a"), ObjectName::from("b")]);
        assert!(queue.pop_ready().is_none());
    }
}
