// Input event types
// What the host window hands to the listeners forwarded onto the display surface

/// Mouse button types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
    Other(u16),
}

impl From<winit::event::MouseButton> for MouseButton {
    fn from(value: winit::event::MouseButton) -> Self {
        match value {
            winit::event::MouseButton::Left => MouseButton::Left,
            winit::event::MouseButton::Right => MouseButton::Right,
            winit::event::MouseButton::Middle => MouseButton::Middle,
            winit::event::MouseButton::Back => MouseButton::Back,
            winit::event::MouseButton::Forward => MouseButton::Forward,
            winit::event::MouseButton::Other(id) => MouseButton::Other(id),
        }
    }
}

/// Keyboard modifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool, // Cmd on macOS, Win on Windows
}

impl From<winit::keyboard::ModifiersState> for Modifiers {
    fn from(state: winit::keyboard::ModifiersState) -> Self {
        Self {
            shift: state.shift_key(),
            ctrl: state.control_key(),
            alt: state.alt_key(),
            meta: state.super_key(),
        }
    }
}

/// Listener category, one per kind of host listener that gets forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    /// Button presses and releases
    Pointer,
    /// Cursor movement
    Motion,
    /// Scroll wheel
    Wheel,
    Keyboard,
}

/// Input event delivered to forwarded listeners
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Cursor moved to position in surface pixels
    MouseMove { x: f64, y: f64 },

    MouseDown { button: MouseButton },

    MouseUp { button: MouseButton },

    /// Mouse wheel scrolled
    MouseScroll { delta_x: f64, delta_y: f64 },

    /// Key pressed (scancode for cross-platform compatibility)
    KeyDown { scancode: u32, modifiers: Modifiers },

    KeyUp { scancode: u32, modifiers: Modifiers },
}

impl InputEvent {
    /// Which listener category receives this event
    pub fn kind(&self) -> ListenerKind {
        match self {
            InputEvent::MouseMove { .. } => ListenerKind::Motion,
            InputEvent::MouseDown { .. } | InputEvent::MouseUp { .. } => ListenerKind::Pointer,
            InputEvent::MouseScroll { .. } => ListenerKind::Wheel,
            InputEvent::KeyDown { .. } | InputEvent::KeyUp { .. } => ListenerKind::Keyboard,
        }
    }
}
