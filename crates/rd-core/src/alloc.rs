//! Allocation accounting for tracked handles.
//!
//! [`Handle::tracked`](crate::Handle::tracked) registers every object it
//! creates here, keyed by address, and the entry is removed when the last
//! handle to the object goes away. Whatever is still registered is the current
//! leak set. This is a diagnostic aid only, nothing relies on it for
//! correctness.

use std::collections::BTreeMap;

use parking_lot::Mutex;

/// Registered allocations, keyed by address.
static ALLOCATIONS: Mutex<BTreeMap<usize, Allocation>> = Mutex::new(BTreeMap::new());

/// One tracked allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Address of the allocated object.
    pub address: usize,
    /// Type name of the allocated object.
    pub type_name: &'static str,
    /// Size in bytes.
    pub size: usize,
    /// Number of elements.
    pub count: usize,
}

/// Process-wide allocation tracker.
pub struct AllocationTracker;

impl AllocationTracker {
    /// Register an allocation.
    pub fn push_allocation(allocation: Allocation) {
        tracing::trace!(
            address = allocation.address,
            type_name = allocation.type_name,
            size = allocation.size,
            "tracked allocation"
        );
        ALLOCATIONS.lock().insert(allocation.address, allocation);
    }

    /// Register the deallocation matching a previous allocation.
    ///
    /// Returns the matching allocation, if one was registered.
    pub fn push_deallocation(address: usize) -> Option<Allocation> {
        let removed = ALLOCATIONS.lock().remove(&address);
        if removed.is_none() {
            tracing::warn!(address, "deallocation without matching allocation");
        }
        removed
    }

    /// Allocations that have no matching deallocation yet.
    #[must_use]
    pub fn leaked_allocations() -> Vec<Allocation> {
        ALLOCATIONS.lock().values().cloned().collect()
    }

    /// Total size in bytes of [`leaked_allocations`](Self::leaked_allocations).
    #[must_use]
    pub fn total_leaks_size() -> usize {
        ALLOCATIONS.lock().values().map(|a| a.size).sum()
    }

    /// Returns true if an allocation is registered at `address`.
    #[must_use]
    pub fn is_tracked(address: usize) -> bool {
        ALLOCATIONS.lock().contains_key(&address)
    }
}

/// Ticket shared by every handle to a tracked object.
///
/// Dropping the last ticket registers the deallocation.
#[derive(Debug)]
pub(crate) struct AllocationTicket {
    address: usize,
}

impl AllocationTicket {
    pub(crate) fn register<T>(address: usize) -> Self {
        AllocationTracker::push_allocation(Allocation {
            address,
            type_name: std::any::type_name::<T>(),
            size: std::mem::size_of::<T>(),
            count: 1,
        });
        Self { address }
    }
}

impl Drop for AllocationTicket {
    fn drop(&mut self) {
        AllocationTracker::push_deallocation(self.address);
    }
}
