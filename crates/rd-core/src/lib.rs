//! Core building blocks of the RD application framework.
//!
//! This crate provides the substrate every other RD crate is built on:
//! - [`Handle`], the shared-ownership reference used for all cross-component links
//! - [`Emitter`], typed one-to-many listener dispatch with a per-type policy
//! - The notification bus ([`NotificationCenter`], [`Notification`],
//!   [`NotificationAnswer`]) used for decoupled request/response and
//!   cooperative aborts
//! - [`ObjectName`], a precomputed string hash used as registry key
//! - The error taxonomy shared by every crate

pub mod alloc;
pub mod emitter;
pub mod error;
pub mod handle;
pub mod notification;
pub mod object_name;
pub mod spinlock;
pub mod types;

pub use alloc::{Allocation, AllocationTracker};
pub use emitter::{Asynchronized, EmitMode, EmitPolicy, Emitter, Synchronized};
pub use error::{Error, ParseVersionError, Result};
pub use handle::{Handle, WeakHandle};
pub use notification::{
    Notification, NotificationAnswer, NotificationCenter, NotificationObserver,
    NOTIFICATION_ABORT_REQUESTED,
};
pub use object_name::ObjectName;
pub use spinlock::{Spinlock, SpinlockGuard};
pub use types::{explode, RectSize, ScreenPosition, Version};
