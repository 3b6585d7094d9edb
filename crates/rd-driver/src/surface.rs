//! Surfaces: window-like driver resources.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::{Mutex, RwLock};
use rd_core::{Emitter, ObjectName, RectSize, ScreenPosition};
use tracing::{debug, trace};

use crate::resource::{AsResource, DriverResource};

bitflags! {
    /// Window decorations and behaviour requested for a surface.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SurfaceStyle: u32 {
        /// The surface has a close control.
        const CLOSABLE   = 0b0000_0001;
        /// The surface can be resized by the user.
        const RESIZABLE  = 0b0000_0010;
        /// The surface shows a title bar.
        const TITLED     = 0b0000_0100;
        /// The surface has no border.
        const BORDERLESS = 0b0000_1000;
        /// The surface covers the whole screen.
        const FULLSCREEN = 0b0001_0000;
    }
}

impl Default for SurfaceStyle {
    fn default() -> Self {
        Self::CLOSABLE | Self::RESIZABLE | Self::TITLED
    }
}

/// Parameters of a surface creation request.
#[derive(Clone)]
pub struct SurfaceDescriptor {
    pub width: u32,
    pub height: u32,
    pub title: String,
    /// Registry key of the surface. Requests with the same name resolve to
    /// the same surface.
    pub object_name: String,
    pub style: SurfaceStyle,
    /// Backend-specific creation data.
    pub extension: Option<Arc<dyn Any + Send + Sync>>,
}

impl SurfaceDescriptor {
    pub fn new(object_name: impl Into<String>) -> Self {
        let object_name = object_name.into();
        Self {
            width: 800,
            height: 600,
            title: object_name.clone(),
            object_name,
            style: SurfaceStyle::default(),
            extension: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_style(mut self, style: SurfaceStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_extension(mut self, extension: Arc<dyn Any + Send + Sync>) -> Self {
        self.extension = Some(extension);
        self
    }

    pub fn key(&self) -> ObjectName {
        ObjectName::new(&self.object_name)
    }

    pub const fn size(&self) -> RectSize {
        RectSize::new(self.width, self.height)
    }
}

impl fmt::Debug for SurfaceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceDescriptor")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("title", &self.title)
            .field("object_name", &self.object_name)
            .field("style", &self.style)
            .field("extension", &self.extension.is_some())
            .finish()
    }
}

/// Observer of a surface's window events.
pub trait SurfaceObserver: Send + Sync {
    #[allow(unused_variables)]
    fn on_surface_did_move(&self, surface: &dyn Surface, position: ScreenPosition) {}

    #[allow(unused_variables)]
    fn on_surface_did_resize(&self, surface: &dyn Surface, size: RectSize) {}

    #[allow(unused_variables)]
    fn on_surface_enters_resizing(&self, surface: &dyn Surface) {}

    #[allow(unused_variables)]
    fn on_surface_exits_resizing(&self, surface: &dyn Surface) {}

    #[allow(unused_variables)]
    fn on_surface_will_close(&self, surface: &dyn Surface) {}

    #[allow(unused_variables)]
    fn on_surface_will_hide(&self, surface: &dyn Surface) {}

    #[allow(unused_variables)]
    fn on_surface_lock_focus(&self, surface: &dyn Surface) {}

    #[allow(unused_variables)]
    fn on_surface_unlock_focus(&self, surface: &dyn Surface) {}

    #[allow(unused_variables)]
    fn on_surface_unhide(&self, surface: &dyn Surface) {}
}

/// Lifecycle state of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceLifecycle {
    Created,
    Shown,
    Hidden,
    Closing,
    Closed,
}

impl SurfaceLifecycle {
    /// Closing or closed.
    pub const fn is_closing(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    position: ScreenPosition,
    size: RectSize,
}

/// State shared by every surface implementation.
///
/// Each helper checks and applies a state transition, then notifies the
/// surface observers. Helpers return false, without notifying, when the
/// transition does not apply.
pub struct SurfaceCore {
    name: ObjectName,
    title: RwLock<String>,
    style: SurfaceStyle,
    frame: Mutex<Frame>,
    state: Mutex<SurfaceLifecycle>,
    resizing: AtomicBool,
    focused: AtomicBool,
    observers: Emitter<dyn SurfaceObserver>,
}

impl SurfaceCore {
    pub fn new(descriptor: &SurfaceDescriptor, position: ScreenPosition) -> Self {
        Self {
            name: descriptor.key(),
            title: RwLock::new(descriptor.title.clone()),
            style: descriptor.style,
            frame: Mutex::new(Frame {
                position,
                size: descriptor.size(),
            }),
            state: Mutex::new(SurfaceLifecycle::Created),
            resizing: AtomicBool::new(false),
            focused: AtomicBool::new(false),
            observers: Emitter::new(),
        }
    }

    pub fn name(&self) -> &ObjectName {
        &self.name
    }

    pub fn title(&self) -> String {
        self.title.read().clone()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        *self.title.write() = title.into();
    }

    pub const fn style(&self) -> SurfaceStyle {
        self.style
    }

    pub fn position(&self) -> ScreenPosition {
        self.frame.lock().position
    }

    pub fn size(&self) -> RectSize {
        self.frame.lock().size
    }

    pub fn state(&self) -> SurfaceLifecycle {
        *self.state.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SurfaceLifecycle::Closed
    }

    pub fn is_resizing(&self) -> bool {
        self.resizing.load(Ordering::Acquire)
    }

    pub fn has_focus(&self) -> bool {
        self.focused.load(Ordering::Acquire)
    }

    pub fn observers(&self) -> &Emitter<dyn SurfaceObserver> {
        &self.observers
    }

    /// Created or hidden to shown. Unhiding notifies `on_surface_unhide`.
    pub fn did_show(&self, surface: &dyn Surface) -> bool {
        let previous = {
            let mut state = self.state.lock();
            match *state {
                SurfaceLifecycle::Created | SurfaceLifecycle::Hidden => {
                    let previous = *state;
                    *state = SurfaceLifecycle::Shown;
                    previous
                }
                _ => return false,
            }
        };
        trace!(surface = %self.name, "surface shown");
        if previous == SurfaceLifecycle::Hidden {
            self.observers.emit(|o| o.on_surface_unhide(surface));
        }
        true
    }

    /// Shown to hidden.
    pub fn will_hide(&self, surface: &dyn Surface) -> bool {
        if !self.transition(SurfaceLifecycle::Shown, SurfaceLifecycle::Hidden) {
            return false;
        }
        self.observers.emit(|o| o.on_surface_will_hide(surface));
        true
    }

    /// Hidden to shown.
    pub fn did_unhide(&self, surface: &dyn Surface) -> bool {
        if !self.transition(SurfaceLifecycle::Hidden, SurfaceLifecycle::Shown) {
            return false;
        }
        self.observers.emit(|o| o.on_surface_unhide(surface));
        true
    }

    pub fn did_move(&self, surface: &dyn Surface, position: ScreenPosition) -> bool {
        if self.state().is_closing() {
            return false;
        }
        self.frame.lock().position = position;
        self.observers.emit(|o| o.on_surface_did_move(surface, position));
        true
    }

    pub fn did_resize(&self, surface: &dyn Surface, size: RectSize) -> bool {
        if self.state().is_closing() {
            return false;
        }
        self.frame.lock().size = size;
        self.observers.emit(|o| o.on_surface_did_resize(surface, size));
        true
    }

    pub fn enter_resizing(&self, surface: &dyn Surface) -> bool {
        if self.state().is_closing() || self.resizing.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.observers.emit(|o| o.on_surface_enters_resizing(surface));
        true
    }

    pub fn exit_resizing(&self, surface: &dyn Surface) -> bool {
        if !self.resizing.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.observers.emit(|o| o.on_surface_exits_resizing(surface));
        true
    }

    pub fn lock_focus(&self, surface: &dyn Surface) -> bool {
        if self.state().is_closing() || self.focused.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.observers.emit(|o| o.on_surface_lock_focus(surface));
        true
    }

    pub fn unlock_focus(&self, surface: &dyn Surface) -> bool {
        if !self.focused.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.observers.emit(|o| o.on_surface_unlock_focus(surface));
        true
    }

    /// Enters the closing state and notifies `on_surface_will_close`.
    ///
    /// Only the first caller gets true; concurrent and repeated closes are
    /// no-ops.
    pub fn begin_close(&self, surface: &dyn Surface) -> bool {
        {
            let mut state = self.state.lock();
            if state.is_closing() {
                return false;
            }
            *state = SurfaceLifecycle::Closing;
        }
        debug!(surface = %self.name, "surface closing");
        self.resizing.store(false, Ordering::Release);
        self.focused.store(false, Ordering::Release);
        self.observers.emit(|o| o.on_surface_will_close(surface));
        true
    }

    /// Marks the surface closed.
    pub fn finish_close(&self) {
        *self.state.lock() = SurfaceLifecycle::Closed;
        debug!(surface = %self.name, "surface closed");
    }

    fn transition(&self, from: SurfaceLifecycle, to: SurfaceLifecycle) -> bool {
        let mut state = self.state.lock();
        if *state != from {
            return false;
        }
        *state = to;
        true
    }
}

impl fmt::Debug for SurfaceCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceCore")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("frame", &*self.frame.lock())
            .finish_non_exhaustive()
    }
}

/// A window or drawable owned by a driver.
///
/// Implementations perform the native operation, then call the matching
/// [`SurfaceCore`] helper so observers are notified. `close` must be safe to
/// call from [`DriverResource::on_driver_clear`].
pub trait Surface: DriverResource + AsResource {
    fn surface_core(&self) -> &SurfaceCore;

    fn show(&self) -> bool;
    fn hide(&self) -> bool;
    fn unhide(&self) -> bool;
    fn move_to(&self, position: ScreenPosition) -> bool;
    fn resize(&self, size: RectSize) -> bool;
    fn lock_focus(&self) -> bool;
    fn unlock_focus(&self) -> bool;
    fn close(&self) -> bool;

    /// Returns true once the surface reached its terminal state.
    fn closed(&self) -> bool {
        self.surface_core().is_closed()
    }

    fn name(&self) -> &ObjectName {
        self.surface_core().name()
    }

    fn observers(&self) -> &Emitter<dyn SurfaceObserver> {
        self.surface_core().observers()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use rd_core::Handle;

    use super::*;
    use crate::resource::ResourceUsage;

    struct Plain {
        usage: ResourceUsage,
        core: SurfaceCore,
    }

    impl DriverResource for Plain {
        fn usage(&self) -> &ResourceUsage {
            &self.usage
        }
        fn on_driver_clear(&self) {
            self.close();
        }
    }

    impl Surface for Plain {
        fn surface_core(&self) -> &SurfaceCore {
            &self.core
        }
        fn show(&self) -> bool {
            self.core.did_show(self)
        }
        fn hide(&self) -> bool {
            self.core.will_hide(self)
        }
        fn unhide(&self) -> bool {
            self.core.did_unhide(self)
        }
        fn move_to(&self, position: ScreenPosition) -> bool {
            self.core.did_move(self, position)
        }
        fn resize(&self, size: RectSize) -> bool {
            self.core.did_resize(self, size)
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
            self.core.finish_close();
            true
        }
    }

    #[derive(Default)]
    struct Events {
        moves: AtomicUsize,
        resizes: AtomicUsize,
        hides: AtomicUsize,
        unhides: AtomicUsize,
        closes: AtomicUsize,
        focus: AtomicUsize,
    }

    impl SurfaceObserver for Events {
        fn on_surface_did_move(&self, _: &dyn Surface, _: ScreenPosition) {
            self.moves.fetch_add(1, Ordering::SeqCst);
        }
        fn on_surface_did_resize(&self, _: &dyn Surface, _: RectSize) {
            self.resizes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_surface_will_hide(&self, _: &dyn Surface) {
            self.hides.fetch_add(1, Ordering::SeqCst);
        }
        fn on_surface_unhide(&self, _: &dyn Surface) {
            self.unhides.fetch_add(1, Ordering::SeqCst);
        }
        fn on_surface_will_close(&self, _: &dyn Surface) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_surface_lock_focus(&self, _: &dyn Surface) {
            self.focus.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn observed(descriptor: &SurfaceDescriptor) -> (Arc<Plain>, Handle<Events>) {
        let surface = Arc::new(Plain {
            usage: ResourceUsage::detached(),
            core: SurfaceCore::new(descriptor, ScreenPosition::default()),
        });
        let events = Handle::new(Events::default());
        surface
            .observers()
            .add_listener(&events.clone().upcast(|e| e as Arc<dyn SurfaceObserver>))
            .unwrap();
        (surface, events)
    }

    #[test]
    fn descriptor_defaults() {
        let d = SurfaceDescriptor::new("main");
        assert_eq!(d.title, "main");
        assert_eq!(d.style, SurfaceStyle::CLOSABLE | SurfaceStyle::RESIZABLE | SurfaceStyle::TITLED);
        assert_eq!(d.key(), ObjectName::new("main"));
        assert!(d.extension.is_none());

        let d = d
            .with_size(320, 200)
            .with_title("Main window")
            .with_style(SurfaceStyle::BORDERLESS)
            .with_extension(Arc::new(42_u32));
        assert_eq!(d.size(), RectSize::new(320, 200));
        assert_eq!(d.title, "Main window");
        assert_eq!(d.extension.as_ref().and_then(|e| e.downcast_ref::<u32>()), Some(&42));
    }

    #[test]
    fn hide_and_unhide() {
        let (surface, events) = observed(&SurfaceDescriptor::new("s"));
        assert!(!surface.hide());
        assert!(surface.show());
        assert!(surface.hide());
        assert!(!surface.hide());
        assert!(surface.unhide());
        assert_eq!(surface.core.state(), SurfaceLifecycle::Shown);

        let e = events.get().unwrap();
        assert_eq!(e.hides.load(Ordering::SeqCst), 1);
        assert_eq!(e.unhides.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn move_and_resize_update_frame() {
        let (surface, events) = observed(&SurfaceDescriptor::new("s").with_size(10, 10));
        assert!(surface.move_to(ScreenPosition::new(5, 6)));
        assert!(surface.resize(RectSize::new(30, 40)));
        assert_eq!(surface.core.position(), ScreenPosition::new(5, 6));
        assert_eq!(surface.core.size(), RectSize::new(30, 40));

        let e = events.get().unwrap();
        assert_eq!(e.moves.load(Ordering::SeqCst), 1);
        assert_eq!(e.resizes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn resizing_and_focus_are_edge_triggered() {
        let (surface, events) = observed(&SurfaceDescriptor::new("s"));
        assert!(surface.core.enter_resizing(&*surface));
        assert!(!surface.core.enter_resizing(&*surface));
        assert!(surface.core.is_resizing());
        assert!(surface.core.exit_resizing(&*surface));
        assert!(!surface.core.exit_resizing(&*surface));

        assert!(surface.lock_focus());
        assert!(!surface.lock_focus());
        assert!(surface.unlock_focus());
        assert_eq!(events.get().unwrap().focus.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn close_is_idempotent() {
        let (surface, events) = observed(&SurfaceDescriptor::new("s"));
        assert!(surface.close());
        assert!(!surface.close());
        surface.on_driver_clear();
        assert!(surface.closed());
        assert_eq!(events.get().unwrap().closes.load(Ordering::SeqCst), 1);
        assert!(!surface.move_to(ScreenPosition::new(1, 1)));
    }

    #[test]
    fn racing_closes_notify_once() {
        let (surface, events) = observed(&SurfaceDescriptor::new("s"));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let surface = surface.clone();
                std::thread::spawn(move || surface.close())
            })
            .collect();
        let winners = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|closed| *closed)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(events.get().unwrap().closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn converts_to_resource() {
        let (surface, _) = observed(&SurfaceDescriptor::new("s"));
        let as_surface: Arc<dyn Surface> = surface.clone();
        let resource = as_surface.into_resource();
        resource.lock();
        assert!(surface.is_used());
    }
}
