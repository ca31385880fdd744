//! Output sink that only logs and records what it was asked to do.
//!
//! Used for `--dry-run` and as the observable sink in tests. It keeps a
//! simulated cursor inside a configurable desktop so absolute/relative motion
//! behaves like the real thing.

use super::{
    KeyCombo, MouseButton, OutputError, OutputSink, Rect, ScrollDirection, WindowHandle,
    WindowQuery,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::info;

/// One recorded sink call.
#[derive(Clone, Debug, PartialEq)]
pub enum SinkCall {
    MoveAbsolute(i32, i32),
    MoveRelative(i32, i32),
    Key { combo: String, down: bool },
    TapKey { combo: String, hold_ms: u64 },
    MouseButton { button: MouseButton, down: bool },
    Click { button: MouseButton, hold_ms: u64 },
    Scroll(ScrollDirection),
    RestoreWindow(WindowHandle),
    SetForeground(WindowHandle),
}

/// Shared view on the calls a [`DryRunSink`] recorded. Stays usable after
/// the sink itself was handed to the engine.
#[derive(Clone, Debug, Default)]
pub struct CallLog(Rc<RefCell<Vec<SinkCall>>>);

impl CallLog {
    pub fn snapshot(&self) -> Vec<SinkCall> {
        self.0.borrow().clone()
    }

    pub fn take(&self) -> Vec<SinkCall> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    fn push(&self, call: SinkCall) {
        self.0.borrow_mut().push(call);
    }
}

#[derive(Debug)]
pub struct DryRunSink {
    desktop: Rect,
    monitors: Vec<Rect>,
    windows: Vec<(WindowQuery, Rect)>,
    cursor: (i32, i32),
    refuse_foreground: u32,
    calls: CallLog,
}

impl DryRunSink {
    /// Creates a sink with a single monitor covering `desktop`; the cursor
    /// starts in its center.
    pub fn new(desktop: Rect) -> Self {
        Self {
            desktop,
            monitors: vec![desktop],
            windows: Vec::new(),
            cursor: desktop.center(),
            refuse_foreground: 0,
            calls: CallLog::default(),
        }
    }

    pub fn with_monitors(mut self, monitors: Vec<Rect>) -> Self {
        self.monitors = monitors;
        self
    }

    pub fn with_window(mut self, query: WindowQuery, rect: Rect) -> Self {
        self.windows.push((query, rect));
        self
    }

    /// Makes the next `count` foreground requests fail the way a locked-down
    /// platform refuses them.
    pub fn refusing_foreground(mut self, count: u32) -> Self {
        self.refuse_foreground = count;
        self
    }

    pub fn call_log(&self) -> CallLog {
        self.calls.clone()
    }

    pub fn take_calls(&mut self) -> Vec<SinkCall> {
        self.calls.take()
    }

    pub fn cursor(&self) -> (i32, i32) {
        self.cursor
    }

    fn known_window(&self, handle: WindowHandle) -> Result<(), OutputError> {
        match self.window_rect(handle) {
            Some(_) => Ok(()),
            None => Err(OutputError::WindowUnavailable(format!(
                "{:?} is not a simulated window",
                handle
            ))),
        }
    }
}

impl OutputSink for DryRunSink {
    fn move_cursor_absolute(&mut self, x: i32, y: i32) -> Result<(), OutputError> {
        info!("[dry-run] cursor -> ({}, {})", x, y);
        self.cursor = (x, y);
        self.calls.push(SinkCall::MoveAbsolute(x, y));
        Ok(())
    }

    fn move_cursor_relative(&mut self, dx: i32, dy: i32) -> Result<(), OutputError> {
        info!("[dry-run] cursor += ({}, {})", dx, dy);
        self.cursor = self
            .desktop
            .clamp_point(self.cursor.0 + dx, self.cursor.1 + dy);
        self.calls.push(SinkCall::MoveRelative(dx, dy));
        Ok(())
    }

    fn cursor_position(&self) -> Option<(i32, i32)> {
        Some(self.cursor)
    }

    fn set_key(&mut self, combo: &KeyCombo, down: bool) -> Result<(), OutputError> {
        info!("[dry-run] key {} {}", combo, if down { "DOWN" } else { "UP" });
        self.calls.push(SinkCall::Key {
            combo: combo.to_string(),
            down,
        });
        Ok(())
    }

    fn tap_key(&mut self, combo: &KeyCombo, hold: Duration) -> Result<(), OutputError> {
        info!("[dry-run] tap {} ({} ms)", combo, hold.as_millis());
        self.calls.push(SinkCall::TapKey {
            combo: combo.to_string(),
            hold_ms: hold.as_millis() as u64,
        });
        Ok(())
    }

    fn set_mouse_button(&mut self, button: MouseButton, down: bool) -> Result<(), OutputError> {
        info!("[dry-run] {} {}", button, if down { "DOWN" } else { "UP" });
        self.calls.push(SinkCall::MouseButton { button, down });
        Ok(())
    }

    fn click_mouse_button(
        &mut self,
        button: MouseButton,
        hold: Duration,
    ) -> Result<(), OutputError> {
        info!("[dry-run] click {} ({} ms)", button, hold.as_millis());
        self.calls.push(SinkCall::Click {
            button,
            hold_ms: hold.as_millis() as u64,
        });
        Ok(())
    }

    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), OutputError> {
        info!("[dry-run] {}", direction);
        self.calls.push(SinkCall::Scroll(direction));
        Ok(())
    }

    fn find_window(&self, query: &WindowQuery) -> Option<WindowHandle> {
        self.windows
            .iter()
            .position(|(q, _)| q == query)
            .map(|i| WindowHandle(i as u64 + 1))
    }

    fn restore_window(&mut self, handle: WindowHandle) -> Result<(), OutputError> {
        self.known_window(handle)?;
        self.calls.push(SinkCall::RestoreWindow(handle));
        Ok(())
    }

    fn set_foreground(&mut self, handle: WindowHandle) -> Result<bool, OutputError> {
        self.known_window(handle)?;
        self.calls.push(SinkCall::SetForeground(handle));
        if self.refuse_foreground > 0 {
            self.refuse_foreground -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn window_rect(&self, handle: WindowHandle) -> Option<Rect> {
        let index = (handle.0 as usize).checked_sub(1)?;
        self.windows.get(index).map(|(_, rect)| *rect)
    }

    fn monitor_rect(&self, index: usize) -> Option<Rect> {
        self.monitors.get(index).copied()
    }

    fn virtual_desktop_rect(&self) -> Rect {
        self.desktop
    }
}
