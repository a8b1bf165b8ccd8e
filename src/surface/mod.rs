// Presentation surface
// GPU drawable embedded in the host container, scaled to its viewport

mod wgpu_target;

pub use wgpu_target::WgpuRasterTarget;

use crate::buffer::FrameDimensions;
use crate::input::{InputForwarder, ListenerRegistration};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use winit::window::CursorIcon;

#[derive(Error, Debug)]
pub enum RendererError {
    #[error("Failed to initialize renderer: {0}")]
    InitError(String),
    #[error("Render failed: {0}")]
    RenderError(String),
    #[error("Invalid surface state: {0}")]
    InvalidState(String),
    #[error("Window error: {0}")]
    WindowError(String),
    #[error("GPU not available: {0}")]
    GpuNotAvailable(String),
}

/// Size of a host area in physical pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Minimized windows report a zero-area size
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Viewport width and height packed into one word so readers never see a torn pair
#[derive(Debug, Default)]
pub struct ViewportState {
    packed: AtomicU64,
    /// Set after the first store and never cleared
    sized: AtomicBool,
}

impl ViewportState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, size: SurfaceSize) {
        let packed = ((size.width as u64) << 32) | size.height as u64;
        self.packed.store(packed, Ordering::Release);
        self.sized.store(true, Ordering::Release);
    }

    /// `None` until the first resize
    pub fn load(&self) -> Option<SurfaceSize> {
        if !self.sized.load(Ordering::Acquire) {
            return None;
        }
        let packed = self.packed.load(Ordering::Acquire);
        Some(SurfaceSize::new((packed >> 32) as u32, packed as u32))
    }
}

/// Shared handle through which the host thread reports container resizes
#[derive(Debug, Clone)]
pub struct ViewportHandle {
    state: Arc<ViewportState>,
}

impl ViewportHandle {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ViewportState::new()),
        }
    }

    /// Record the new container size; picked up by the next render tick
    pub fn on_resize(&self, size: SurfaceSize) {
        log::debug!("Viewport resized to {}x{}", size.width, size.height);
        self.state.store(size);
    }

    pub fn current(&self) -> Option<SurfaceSize> {
        self.state.load()
    }
}

impl Default for ViewportHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-axis raster scale from frame pixels to viewport pixels.
///
/// `y` is negative: frame rows are stored top-down while the raster origin
/// sits at the bottom left, so the blit walks rows downwards from the top-left
/// anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelZoom {
    pub x: f32,
    pub y: f32,
}

impl PixelZoom {
    pub fn for_viewport(viewport: SurfaceSize, frame: FrameDimensions) -> Self {
        Self {
            x: viewport.width as f32 / frame.width as f32,
            y: -(viewport.height as f32 / frame.height as f32),
        }
    }
}

/// One consistent read of the viewport, taken once per tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportSnapshot {
    pub size: SurfaceSize,
    pub zoom: PixelZoom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Uninitialized,
    Created,
    Sized,
    Disposed,
}

/// GPU drawable built by the host container
pub trait RasterTarget: Send {
    /// Draw `frame` (packed 32-bit BGRA, top-down rows) anchored at the top-left
    /// corner of a `viewport`-sized area, scaled by `zoom`. When `fresh` is false
    /// the frame content is unchanged since the previous call.
    fn present(
        &mut self,
        frame: &[u8],
        viewport: SurfaceSize,
        zoom: PixelZoom,
        fresh: bool,
    ) -> Result<(), RendererError>;

    fn set_cursor(&mut self, _cursor: CursorIcon) {}

    /// Free GPU resources; further presents fail
    fn release(&mut self);
}

/// What the container routes to a subscribed surface
#[derive(Clone)]
pub struct SurfaceSubscription {
    pub viewport: ViewportHandle,
    pub input: InputForwarder,
}

/// The host UI region the presentation surface is embedded in
pub trait HostContainer: Send + Sync {
    fn size(&self) -> SurfaceSize;

    fn cursor(&self) -> CursorIcon;

    /// Listeners registered on the container, to be forwarded onto the surface
    fn input_listeners(&self) -> Vec<ListenerRegistration>;

    fn create_raster_target(
        &self,
        size: SurfaceSize,
        frame: FrameDimensions,
    ) -> Result<Box<dyn RasterTarget>, RendererError>;

    /// Start routing resize and input events to the surface
    fn subscribe(&self, subscription: SurfaceSubscription) -> Result<(), RendererError>;

    fn unsubscribe(&self);
}

/// Display surface for one session
pub struct PresentationSurface {
    frame: FrameDimensions,
    state: SurfaceState,
    viewport: ViewportHandle,
    input: InputForwarder,
    target: Option<Box<dyn RasterTarget>>,
    container: Option<Arc<dyn HostContainer>>,
    subscribed: bool,
    /// A fresh frame arrived while the viewport had no area and was never blitted
    upload_pending: bool,
}

impl PresentationSurface {
    pub fn new(frame: FrameDimensions) -> Self {
        Self {
            frame,
            state: SurfaceState::Uninitialized,
            viewport: ViewportHandle::new(),
            input: InputForwarder::default(),
            target: None,
            container: None,
            subscribed: false,
            upload_pending: false,
        }
    }

    /// Build the drawable at the container's current size and take over its
    /// cursor and input listeners
    pub fn create(&mut self, container: Arc<dyn HostContainer>) -> Result<(), RendererError> {
        if self.state != SurfaceState::Uninitialized {
            return Err(RendererError::InvalidState(format!(
                "create called in state {:?}",
                self.state
            )));
        }

        let size = container.size();
        let mut target = container.create_raster_target(size, self.frame)?;
        target.set_cursor(container.cursor());
        self.input = InputForwarder::new(container.input_listeners());

        log::info!(
            "Presentation surface created: {}x{} frame in {}x{} container, {} forwarded listeners",
            self.frame.width,
            self.frame.height,
            size.width,
            size.height,
            self.input.listener_count()
        );

        self.target = Some(target);
        self.container = Some(container);
        self.state = SurfaceState::Created;
        Ok(())
    }

    /// Register with the container so resizes and input reach this surface
    pub fn subscribe(&mut self) -> Result<(), RendererError> {
        let container = self.container.as_ref().ok_or_else(|| {
            RendererError::InvalidState("subscribe before create".to_string())
        })?;
        container.subscribe(SurfaceSubscription {
            viewport: self.viewport.clone(),
            input: self.input.clone(),
        })?;
        self.subscribed = true;
        Ok(())
    }

    pub fn on_resize(&self, size: SurfaceSize) {
        self.viewport.on_resize(size);
    }

    pub fn viewport(&self) -> &ViewportHandle {
        &self.viewport
    }

    pub fn input(&self) -> &InputForwarder {
        &self.input
    }

    pub fn frame_dimensions(&self) -> FrameDimensions {
        self.frame
    }

    pub fn state(&self) -> SurfaceState {
        match self.state {
            SurfaceState::Created if self.viewport.current().is_some() => SurfaceState::Sized,
            state => state,
        }
    }

    /// Read the viewport once and derive the zoom for this tick
    pub fn snapshot(&self) -> Option<ViewportSnapshot> {
        self.viewport.current().map(|size| ViewportSnapshot {
            size,
            zoom: PixelZoom::for_viewport(size, self.frame),
        })
    }

    pub fn present(
        &mut self,
        frame: &[u8],
        snapshot: Option<ViewportSnapshot>,
        fresh: bool,
    ) -> Result<(), RendererError> {
        let state = self.state();
        let (target, snapshot) = match (state, self.target.as_mut(), snapshot) {
            (SurfaceState::Sized, Some(target), Some(snapshot)) => (target, snapshot),
            _ => {
                return Err(RendererError::InvalidState(format!(
                    "present called in state {:?}",
                    state
                )));
            }
        };

        if snapshot.size.is_empty() {
            self.upload_pending |= fresh;
            return Ok(());
        }

        let fresh = fresh || std::mem::take(&mut self.upload_pending);
        target.present(frame, snapshot.size, snapshot.zoom, fresh)
    }

    /// Release the drawable and stop receiving container events. Safe to call
    /// more than once.
    pub fn dispose(&mut self) {
        if self.state == SurfaceState::Disposed {
            return;
        }

        if let Some(mut target) = self.target.take() {
            target.release();
        }
        if let Some(container) = self.container.take() {
            if self.subscribed {
                container.unsubscribe();
            }
        }
        self.subscribed = false;
        self.state = SurfaceState::Disposed;
        log::info!("Presentation surface disposed");
    }
}

impl Drop for PresentationSurface {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Everything a mock target saw
    #[derive(Debug, Default)]
    pub struct TargetLog {
        pub presents: Vec<(Vec<u8>, SurfaceSize, PixelZoom, bool)>,
        pub cursor: Option<CursorIcon>,
        pub released: u32,
    }

    pub struct MockTarget {
        pub log: Arc<Mutex<TargetLog>>,
        pub fail_present: bool,
    }

    impl RasterTarget for MockTarget {
        fn present(
            &mut self,
            frame: &[u8],
            viewport: SurfaceSize,
            zoom: PixelZoom,
            fresh: bool,
        ) -> Result<(), RendererError> {
            if self.fail_present {
                return Err(RendererError::RenderError("device lost".to_string()));
            }
            self.log
                .lock()
                .presents
                .push((frame.to_vec(), viewport, zoom, fresh));
            Ok(())
        }

        fn set_cursor(&mut self, cursor: CursorIcon) {
            self.log.lock().cursor = Some(cursor);
        }

        fn release(&mut self) {
            self.log.lock().released += 1;
        }
    }

    pub struct MockContainer {
        pub size: SurfaceSize,
        pub listeners: Vec<ListenerRegistration>,
        pub target_log: Arc<Mutex<TargetLog>>,
        pub fail_present: bool,
        pub refuse_subscribe: bool,
        pub subscription: Mutex<Option<SurfaceSubscription>>,
        pub unsubscribes: Mutex<u32>,
    }

    impl MockContainer {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                size: SurfaceSize::new(width, height),
                listeners: Vec::new(),
                target_log: Arc::new(Mutex::new(TargetLog::default())),
                fail_present: false,
                refuse_subscribe: false,
                subscription: Mutex::new(None),
                unsubscribes: Mutex::new(0),
            }
        }

        /// Simulate the host window being resized
        pub fn resize(&self, width: u32, height: u32) {
            if let Some(subscription) = self.subscription.lock().as_ref() {
                subscription.viewport.on_resize(SurfaceSize::new(width, height));
            }
        }
    }

    impl HostContainer for MockContainer {
        fn size(&self) -> SurfaceSize {
            self.size
        }

        fn cursor(&self) -> CursorIcon {
            CursorIcon::Crosshair
        }

        fn input_listeners(&self) -> Vec<ListenerRegistration> {
            self.listeners.clone()
        }

        fn create_raster_target(
            &self,
            _size: SurfaceSize,
            _frame: FrameDimensions,
        ) -> Result<Box<dyn RasterTarget>, RendererError> {
            Ok(Box::new(MockTarget {
                log: self.target_log.clone(),
                fail_present: self.fail_present,
            }))
        }

        fn subscribe(&self, subscription: SurfaceSubscription) -> Result<(), RendererError> {
            if self.refuse_subscribe {
                return Err(RendererError::WindowError("container detached".to_string()));
            }
            *self.subscription.lock() = Some(subscription);
            Ok(())
        }

        fn unsubscribe(&self) {
            *self.subscription.lock() = None;
            *self.unsubscribes.lock() += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::input::{InputEvent, InputListener, ListenerKind, MouseButton};
    use parking_lot::Mutex;

    fn dims_720p() -> FrameDimensions {
        FrameDimensions::new(1280, 720)
    }

    #[test]
    fn test_viewport_packing() {
        let state = ViewportState::new();
        assert_eq!(state.load(), None);

        state.store(SurfaceSize::new(1920, 1080));
        assert_eq!(state.load(), Some(SurfaceSize::new(1920, 1080)));

        state.store(SurfaceSize::new(0, 0));
        assert_eq!(state.load(), Some(SurfaceSize::new(0, 0)));
    }

    #[test]
    fn test_viewport_at_max_extent_is_sized() {
        let state = ViewportState::new();
        state.store(SurfaceSize::new(u32::MAX, u32::MAX));
        assert_eq!(state.load(), Some(SurfaceSize::new(u32::MAX, u32::MAX)));
    }

    #[test]
    fn test_zoom_factors() {
        let frame = dims_720p();
        assert_eq!(
            PixelZoom::for_viewport(SurfaceSize::new(1280, 720), frame),
            PixelZoom { x: 1.0, y: -1.0 }
        );
        assert_eq!(
            PixelZoom::for_viewport(SurfaceSize::new(1920, 1080), frame),
            PixelZoom { x: 1.5, y: -1.5 }
        );
        assert_eq!(
            PixelZoom::for_viewport(SurfaceSize::new(640, 720), frame),
            PixelZoom { x: 0.5, y: -1.0 }
        );
    }

    #[test]
    fn test_state_machine() {
        let container = Arc::new(MockContainer::new(1280, 720));
        let mut surface = PresentationSurface::new(dims_720p());
        assert_eq!(surface.state(), SurfaceState::Uninitialized);

        surface.create(container.clone()).unwrap();
        assert_eq!(surface.state(), SurfaceState::Created);
        assert!(matches!(
            surface.present(&[0; 4], surface.snapshot(), true),
            Err(RendererError::InvalidState(_))
        ));

        surface.on_resize(container.size());
        assert_eq!(surface.state(), SurfaceState::Sized);

        surface.dispose();
        assert_eq!(surface.state(), SurfaceState::Disposed);
        assert!(matches!(
            surface.create(container),
            Err(RendererError::InvalidState(_))
        ));
    }

    #[test]
    fn test_create_copies_cursor_and_listeners() {
        struct Noop;
        impl InputListener for Noop {
            fn on_input(&self, _event: &InputEvent) {}
        }

        let mut container = MockContainer::new(800, 600);
        container.listeners = vec![
            ListenerRegistration::new(ListenerKind::Pointer, Arc::new(Noop)),
            ListenerRegistration::new(ListenerKind::Keyboard, Arc::new(Noop)),
        ];
        let container = Arc::new(container);

        let mut surface = PresentationSurface::new(dims_720p());
        surface.create(container.clone()).unwrap();

        assert_eq!(surface.input().listener_count(), 2);
        assert_eq!(container.target_log.lock().cursor, Some(CursorIcon::Crosshair));
    }

    #[test]
    fn test_subscription_routes_resize_and_input() {
        #[derive(Default)]
        struct Clicks(Mutex<u32>);
        impl InputListener for Clicks {
            fn on_input(&self, _event: &InputEvent) {
                *self.0.lock() += 1;
            }
        }

        let clicks = Arc::new(Clicks::default());
        let mut container = MockContainer::new(1280, 720);
        container.listeners = vec![ListenerRegistration::new(ListenerKind::Pointer, clicks.clone())];
        let container = Arc::new(container);

        let mut surface = PresentationSurface::new(dims_720p());
        surface.create(container.clone()).unwrap();
        surface.subscribe().unwrap();

        container.resize(1920, 1080);
        assert_eq!(surface.viewport().current(), Some(SurfaceSize::new(1920, 1080)));

        let subscription = container.subscription.lock().clone().unwrap();
        subscription
            .input
            .dispatch(&InputEvent::MouseDown { button: MouseButton::Left });
        assert_eq!(*clicks.0.lock(), 1);
    }

    #[test]
    fn test_present_passes_zoom_from_snapshot() {
        let container = Arc::new(MockContainer::new(1280, 720));
        let mut surface = PresentationSurface::new(FrameDimensions::new(2, 1));
        surface.create(container.clone()).unwrap();
        surface.on_resize(SurfaceSize::new(4, 3));

        let snapshot = surface.snapshot();
        surface.present(&[7; 8], snapshot, true).unwrap();

        let log = container.target_log.lock();
        let (bytes, size, zoom, fresh) = &log.presents[0];
        assert_eq!(bytes, &vec![7; 8]);
        assert_eq!(*size, SurfaceSize::new(4, 3));
        assert_eq!(*zoom, PixelZoom { x: 2.0, y: -3.0 });
        assert!(*fresh);
    }

    #[test]
    fn test_zero_area_viewport_skips_blit() {
        let container = Arc::new(MockContainer::new(1280, 720));
        let mut surface = PresentationSurface::new(dims_720p());
        surface.create(container.clone()).unwrap();
        surface.on_resize(SurfaceSize::new(0, 0));

        assert!(surface.present(&[], surface.snapshot(), true).is_ok());
        assert!(container.target_log.lock().presents.is_empty());
    }

    #[test]
    fn test_frame_skipped_while_minimized_is_uploaded_on_restore() {
        let container = Arc::new(MockContainer::new(2, 1));
        let mut surface = PresentationSurface::new(FrameDimensions::new(2, 1));
        surface.create(container.clone()).unwrap();

        surface.on_resize(SurfaceSize::new(0, 0));
        surface.present(&[5; 8], surface.snapshot(), true).unwrap();
        surface.present(&[5; 8], surface.snapshot(), false).unwrap();

        surface.on_resize(SurfaceSize::new(2, 1));
        surface.present(&[5; 8], surface.snapshot(), false).unwrap();
        surface.present(&[5; 8], surface.snapshot(), false).unwrap();

        let log = container.target_log.lock();
        assert_eq!(log.presents.len(), 2);
        assert!(log.presents[0].3);
        assert!(!log.presents[1].3);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let container = Arc::new(MockContainer::new(1280, 720));
        let mut surface = PresentationSurface::new(dims_720p());
        surface.create(container.clone()).unwrap();
        surface.subscribe().unwrap();

        surface.dispose();
        surface.dispose();
        drop(surface);

        assert_eq!(container.target_log.lock().released, 1);
        assert_eq!(*container.unsubscribes.lock(), 1);
        assert!(container.subscription.lock().is_none());
    }
}
