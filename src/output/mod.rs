//! Output subsystem: the OS-facing side of the remapper.
//!
//! The engine never talks to the platform directly. Everything it emits goes
//! through the [`OutputSink`] capability:
//!
//! ```text
//! Executor ──► OutputSink ──► Win32Sink (SendInput, window manager; Windows)
//!                  │
//!                  ├────────► RdevSink (XTest / CGEvent; everywhere else)
//!                  │
//!                  └────────► DryRunSink (log + record)
//! ```
//!
//! The value types in here (key combos, mouse buttons, scroll directions,
//! window queries, rectangles) are shared with the binding grammar so that a
//! configuration that loads is a configuration the sink understands.

pub mod dry_run;
pub mod keys;
pub mod rdev_sink;
pub mod win32;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use dry_run::{CallLog, DryRunSink, SinkCall};
pub use keys::{KeyCombo, KeyName};
pub use rdev_sink::RdevSink;
#[cfg(windows)]
pub use win32::Win32Sink;

/// Output errors. All of them are transient from the engine's point of view:
/// they are logged and the action is skipped for the current tick.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Failed to inject input: {0}")]
    InjectionFailed(String),

    #[error("Unsupported by this backend: {0}")]
    Unsupported(String),

    #[error("Window not available: {0}")]
    WindowUnavailable(String),
}

/// Mouse buttons addressable as `MB1`..`MB5`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    X1,
    X2,
}

impl MouseButton {
    /// Maps the 1-based `MB<n>` number to a button.
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(MouseButton::Left),
            2 => Some(MouseButton::Right),
            3 => Some(MouseButton::Middle),
            4 => Some(MouseButton::X1),
            5 => Some(MouseButton::X2),
            _ => None,
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = match self {
            MouseButton::Left => 1,
            MouseButton::Right => 2,
            MouseButton::Middle => 3,
            MouseButton::X1 => 4,
            MouseButton::X2 => 5,
        };
        write!(f, "MB{}", n)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrollDirection::Up => write!(f, "WheelUp"),
            ScrollDirection::Down => write!(f, "WheelDown"),
            ScrollDirection::Left => write!(f, "WheelLeft"),
            ScrollDirection::Right => write!(f, "WheelRight"),
        }
    }
}

/// Whether cursor output is sent as deltas or as absolute positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionMode {
    #[default]
    Relative,
    Absolute,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MotionAxis {
    X,
    Y,
}

impl MotionAxis {
    /// Splits a signed step into an `(dx, dy)` pair along this axis.
    pub fn delta(self, step: i32) -> (i32, i32) {
        match self {
            MotionAxis::X => (step, 0),
            MotionAxis::Y => (0, step),
        }
    }
}

/// How a target window is looked up.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum WindowQuery {
    Class(String),
    Title(String),
}

impl fmt::Display for WindowQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowQuery::Class(class) => write!(f, "class '{}'", class),
            WindowQuery::Title(title) => write!(f, "title '{}'", title),
        }
    }
}

/// Opaque platform window handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

/// Screen rectangle in desktop pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Point at the given fraction of the rectangle, relative to its origin.
    pub fn point_at_fraction(&self, fx: f64, fy: f64) -> (i32, i32) {
        (
            self.x + (fx * self.width as f64) as i32,
            self.y + (fy * self.height as f64) as i32,
        )
    }

    /// Point at a pixel offset from the origin, kept inside the rectangle.
    pub fn point_at_offset(&self, px: i32, py: i32) -> (i32, i32) {
        (
            self.x + px.clamp(0, (self.width - 1).max(0)),
            self.y + py.clamp(0, (self.height - 1).max(0)),
        )
    }

    /// Clamps a point to the addressable pixels of the rectangle.
    pub fn clamp_point(&self, x: i32, y: i32) -> (i32, i32) {
        (
            x.clamp(self.x, self.x + (self.width - 1).max(0)),
            y.clamp(self.y, self.y + (self.height - 1).max(0)),
        )
    }

    pub fn center(&self) -> (i32, i32) {
        self.point_at_fraction(0.5, 0.5)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }
}

/// OS output capability consumed by the executor.
///
/// Injection calls are expected to return promptly. The executor never
/// retries a failed call within a tick.
pub trait OutputSink {
    fn move_cursor_absolute(&mut self, x: i32, y: i32) -> Result<(), OutputError>;

    fn move_cursor_relative(&mut self, dx: i32, dy: i32) -> Result<(), OutputError>;

    /// Real cursor position, if the backend can read it back.
    fn cursor_position(&self) -> Option<(i32, i32)>;

    /// Whether this backend can send `key` at all. Checked once at load.
    fn supports_key(&self, _key: KeyName) -> bool {
        true
    }

    fn set_key(&mut self, combo: &KeyCombo, down: bool) -> Result<(), OutputError>;

    /// Presses and releases a combo, holding it for `hold`.
    fn tap_key(&mut self, combo: &KeyCombo, hold: Duration) -> Result<(), OutputError>;

    fn set_mouse_button(&mut self, button: MouseButton, down: bool) -> Result<(), OutputError>;

    fn click_mouse_button(&mut self, button: MouseButton, hold: Duration)
        -> Result<(), OutputError>;

    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), OutputError>;

    fn find_window(&self, query: &WindowQuery) -> Option<WindowHandle>;

    /// Restores the window if it is minimized.
    fn restore_window(&mut self, handle: WindowHandle) -> Result<(), OutputError>;

    /// Tries to bring the window to the foreground. `Ok(false)` means the
    /// platform refused the request.
    fn set_foreground(&mut self, handle: WindowHandle) -> Result<bool, OutputError>;

    fn window_rect(&self, handle: WindowHandle) -> Option<Rect>;

    fn monitor_rect(&self, index: usize) -> Option<Rect>;

    fn virtual_desktop_rect(&self) -> Rect;
}
