//! Driver resources for the RD framework.
//!
//! This crate provides:
//! - [`DriverResource`], a use-counted object that is never released while in use
//! - [`Surface`], the window-like resource, with its observers and lifecycle
//! - [`Driver`], which creates and registers surfaces through a
//!   [`DriverBackend`] and defers the release of resources still in use
//!
//! A driver is a [`ModuleListener`](rd_app::ModuleListener) of the module
//! that owns it: the release queue drains on every update tick of that
//! module, and everything is cleared when the module terminates.

pub mod driver;
pub mod release_queue;
pub mod resource;
pub mod surface;

pub use driver::{
    Driver, DriverBackend, DriverObserver, Registry, RegistryGuard, DRIVER_DID_CLEAR,
    DRIVER_INVALID_SURFACE_CREATION, DRIVER_SURFACE_CREATED,
};
pub use release_queue::{PendingRelease, ReleaseQueue};
pub use resource::{AsResource, DriverResource, ResourceUsage, UseGuard};
pub use surface::{
    Surface, SurfaceCore, SurfaceDescriptor, SurfaceLifecycle, SurfaceObserver, SurfaceStyle,
};
