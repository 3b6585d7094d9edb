//! In-memory surfaces.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rd_core::{RectSize, ScreenPosition};
use rd_driver::{
    Driver, DriverResource, ResourceUsage, Surface, SurfaceCore, SurfaceDescriptor, SurfaceStyle,
};
use tracing::trace;

static NEXT_WINDOW_ID: AtomicU64 = AtomicU64::new(1);

/// Stand-in for a native window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeWindow {
    pub id: u64,
    pub visible: bool,
}

/// A surface backed by an in-memory rectangle instead of an OS window.
pub struct HeadlessSurface {
    usage: ResourceUsage,
    core: SurfaceCore,
    window: Mutex<Option<NativeWindow>>,
}

impl HeadlessSurface {
    pub fn new(driver: &Driver, descriptor: &SurfaceDescriptor, origin: ScreenPosition) -> Self {
        let window = NativeWindow {
            id: NEXT_WINDOW_ID.fetch_add(1, Ordering::Relaxed),
            visible: false,
        };
        trace!(surface = %descriptor.object_name, window = window.id, "native window created");
        Self {
            usage: ResourceUsage::new(driver),
            core: SurfaceCore::new(descriptor, origin),
            window: Mutex::new(Some(window)),
        }
    }

    /// The native window, or `None` once closed.
    pub fn native_window(&self) -> Option<NativeWindow> {
        *self.window.lock()
    }

    fn set_visible(&self, visible: bool) {
        if let Some(window) = self.window.lock().as_mut() {
            window.visible = visible;
        }
    }
}

impl DriverResource for HeadlessSurface {
    fn usage(&self) -> &ResourceUsage {
        &self.usage
    }

    fn on_driver_clear(&self) {
        self.close();
    }
}

impl Surface for HeadlessSurface {
    fn surface_core(&self) -> &SurfaceCore {
        &self.core
    }

    fn show(&self) -> bool {
        if !self.core.did_show(self) {
            return false;
        }
        self.set_visible(true);
        true
    }

    fn hide(&self) -> bool {
        if !self.core.will_hide(self) {
            return false;
        }
        self.set_visible(false);
        true
    }

    fn unhide(&self) -> bool {
        if !self.core.did_unhide(self) {
            return false;
        }
        self.set_visible(true);
        true
    }

    fn move_to(&self, position: ScreenPosition) -> bool {
        self.core.did_move(self, position)
    }

    /// Resizes as a user drag would: enter, resize, exit.
    fn resize(&self, size: RectSize) -> bool {
        if !self.core.style().contains(SurfaceStyle::RESIZABLE) {
            return false;
        }
        let entered = self.core.enter_resizing(self);
        let resized = self.core.did_resize(self, size);
        if entered {
            self.core.exit_resizing(self);
        }
        resized
    }

    fn lock_focus(&self) -> bool {
        self.core.lock_focus(self)
    }

    fn unlock_focus(&self) -> bool {
        self.core.unlock_focus(self)
    }

    fn close(&self) -> bool {
        if !self.core.begin_close(self) {
            return false;
        }
        if let Some(window) = self.window.lock().take() {
            trace!(surface = %self.core.name(), window = window.id, "native window destroyed");
        }
        self.core.finish_close();
        true
    }
}
