// Viewer window
// winit host container for the presentation surface

use crate::bench::BenchSink;
use crate::buffer::FrameDimensions;
use crate::config::PresenterConfig;
use crate::decoder::DecodeBridge;
use crate::input::{InputEvent, ListenerRegistration, Modifiers};
use crate::session::{SessionError, StreamLifecycleController};
use crate::surface::{
    HostContainer, RasterTarget, RendererError, SurfaceSize, SurfaceSubscription,
    WgpuRasterTarget,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow},
    platform::scancode::PhysicalKeyExtScancode,
    window::{CursorIcon, Window, WindowAttributes, WindowId},
};

/// How often the event loop checks whether the render loop died
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A winit window acting as the host container
pub struct WinitContainer {
    window: Arc<Window>,
    cursor: CursorIcon,
    listeners: Vec<ListenerRegistration>,
    subscription: Mutex<Option<SurfaceSubscription>>,
}

impl WinitContainer {
    pub fn new(window: Arc<Window>, listeners: Vec<ListenerRegistration>) -> Self {
        Self {
            window,
            cursor: CursorIcon::Default,
            listeners,
            subscription: Mutex::new(None),
        }
    }

    pub fn with_cursor(mut self, cursor: CursorIcon) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Route a resize to the subscribed surface
    pub fn notify_resize(&self, size: SurfaceSize) {
        if let Some(subscription) = self.subscription.lock().as_ref() {
            subscription.viewport.on_resize(size);
        }
    }

    /// Route input to the surface's forwarded listeners, or straight to the
    /// container's own listeners when no surface is attached
    pub fn notify_input(&self, event: &InputEvent) {
        let forwarder = self.subscription.lock().as_ref().map(|s| s.input.clone());
        match forwarder {
            Some(forwarder) => forwarder.dispatch(event),
            None => {
                let kind = event.kind();
                for registration in self.listeners.iter().filter(|r| r.kind == kind) {
                    registration.listener.on_input(event);
                }
            }
        }
    }
}

impl HostContainer for WinitContainer {
    fn size(&self) -> SurfaceSize {
        let size = self.window.inner_size();
        SurfaceSize::new(size.width, size.height)
    }

    fn cursor(&self) -> CursorIcon {
        self.cursor
    }

    fn input_listeners(&self) -> Vec<ListenerRegistration> {
        self.listeners.clone()
    }

    fn create_raster_target(
        &self,
        size: SurfaceSize,
        frame: FrameDimensions,
    ) -> Result<Box<dyn RasterTarget>, RendererError> {
        let target = pollster::block_on(WgpuRasterTarget::new(self.window.clone(), size, frame))?;
        Ok(Box::new(target))
    }

    fn subscribe(&self, subscription: SurfaceSubscription) -> Result<(), RendererError> {
        let mut slot = self.subscription.lock();
        if slot.is_some() {
            return Err(RendererError::WindowError(
                "Container already hosts a surface".to_string(),
            ));
        }
        *slot = Some(subscription);
        Ok(())
    }

    fn unsubscribe(&self) {
        self.subscription.lock().take();
    }
}

/// Translate a wheel delta into (x, y) scroll amounts
fn scroll_amount(delta: MouseScrollDelta) -> (f64, f64) {
    match delta {
        MouseScrollDelta::LineDelta(x, y) => (x as f64, y as f64),
        MouseScrollDelta::PixelDelta(pos) => (pos.x, pos.y),
    }
}

/// Translate the winit events the surface forwards; everything else is `None`
fn translate_input(event: &WindowEvent, modifiers: Modifiers) -> Option<InputEvent> {
    match event {
        WindowEvent::CursorMoved { position, .. } => Some(InputEvent::MouseMove {
            x: position.x,
            y: position.y,
        }),
        WindowEvent::MouseInput { state, button, .. } => {
            let button = (*button).into();
            Some(match state {
                ElementState::Pressed => InputEvent::MouseDown { button },
                ElementState::Released => InputEvent::MouseUp { button },
            })
        }
        WindowEvent::MouseWheel { delta, .. } => {
            let (delta_x, delta_y) = scroll_amount(*delta);
            Some(InputEvent::MouseScroll { delta_x, delta_y })
        }
        WindowEvent::KeyboardInput { event, .. } => {
            let scancode = event.physical_key.to_scancode().unwrap_or(0);
            Some(if event.state.is_pressed() {
                InputEvent::KeyDown { scancode, modifiers }
            } else {
                InputEvent::KeyUp { scancode, modifiers }
            })
        }
        _ => None,
    }
}

/// Event-loop application that hosts one streaming session
pub struct ViewerApp {
    config: PresenterConfig,
    session: StreamLifecycleController,
    listeners: Vec<ListenerRegistration>,
    container: Option<Arc<WinitContainer>>,
    modifiers: Modifiers,
    result: Result<(), SessionError>,
}

impl ViewerApp {
    pub fn new(
        config: PresenterConfig,
        decoder: Arc<dyn DecodeBridge>,
        sink: Arc<dyn BenchSink>,
        listeners: Vec<ListenerRegistration>,
    ) -> Self {
        let session = StreamLifecycleController::new(&config, decoder, sink);
        Self {
            config,
            session,
            listeners,
            container: None,
            modifiers: Modifiers::default(),
            result: Ok(()),
        }
    }

    /// Outcome of the session once the event loop has returned
    pub fn finish(mut self) -> Result<(), SessionError> {
        let stopped = self.session.stop();
        self.result.and(stopped)
    }

    fn end_session(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.session.stop() {
            log::error!("Session ended with error: {}", e);
            self.result = Err(e);
        }
        event_loop.exit();
    }

    fn open(&mut self, event_loop: &ActiveEventLoop) -> Result<(), SessionError> {
        let window_attrs = WindowAttributes::default()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));

        let window = event_loop
            .create_window(window_attrs)
            .map_err(|e| SessionError::Setup(format!("Failed to create window: {}", e)))?;

        let container = Arc::new(
            WinitContainer::new(Arc::new(window), self.listeners.clone())
                .with_cursor(CursorIcon::Crosshair),
        );
        self.container = Some(container.clone());

        self.session.setup(container, self.config.target_fps)?;
        self.session.start()?;
        log::info!(
            "Viewer window opened: {}x{}",
            self.config.width,
            self.config.height
        );
        Ok(())
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.container.is_some() {
            return;
        }
        if let Err(e) = self.open(event_loop) {
            log::error!("Failed to start session: {}", e);
            self.result = Err(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(container) = self.container.clone() else {
            return;
        };

        match &event {
            WindowEvent::CloseRequested => {
                log::info!("Viewer window closed");
                self.end_session(event_loop);
            }
            WindowEvent::Resized(size) => {
                container.notify_resize(SurfaceSize::new(size.width, size.height));
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = modifiers.state().into();
            }
            _ => {
                if let Some(input) = translate_input(&event, self.modifiers) {
                    container.notify_input(&input);
                }
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_running() {
            if let Err(e) = self.session.poll() {
                log::error!("Session failed: {}", e);
                self.result = Err(e);
                event_loop.exit();
                return;
            }
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + POLL_INTERVAL));
    }
}
