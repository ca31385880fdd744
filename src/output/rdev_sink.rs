//! Portable OS output via `rdev::simulate`, used where the Win32 sink is not
//! available.
//!
//! rdev covers keyboard, mouse buttons, wheel and absolute cursor motion on
//! X11 and macOS. It has no relative motion, no cursor readback and no
//! window management. Relative moves are emulated as absolute moves from
//! the last position this sink placed the cursor at, so a physical mouse
//! move in between is overridden. Window lookups report nothing and only
//! the main display is known. Keys without an rdev name (F13..F24) are
//! rejected when the configuration is loaded.

use super::{
    KeyCombo, KeyName, MouseButton, OutputError, OutputSink, Rect, ScrollDirection, WindowHandle,
    WindowQuery,
};
use rdev::{simulate, Button, EventType, Key};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Desktop used when the display size cannot be queried.
const FALLBACK_DESKTOP: Rect = Rect::new(0, 0, 1920, 1080);

pub struct RdevSink {
    desktop: Rect,
    cursor: (i32, i32),
}

impl RdevSink {
    pub fn new() -> Self {
        let desktop = match rdev::display_size() {
            Ok((w, h)) => {
                info!("Display size reported by rdev: {}x{}", w, h);
                Rect::new(0, 0, w as i32, h as i32)
            }
            Err(e) => {
                warn!(
                    "Unable to query display size ({:?}), assuming {}x{}",
                    e, FALLBACK_DESKTOP.width, FALLBACK_DESKTOP.height
                );
                FALLBACK_DESKTOP
            }
        };
        warn!("rdev output: relative motion is emulated and window actions are unavailable");
        Self {
            desktop,
            cursor: desktop.center(),
        }
    }

    fn send(&self, event: &EventType) -> Result<(), OutputError> {
        simulate(event).map_err(|e| {
            OutputError::InjectionFailed(format!("{:?} rejected: {:?}", event, e))
        })?;
        debug!("Injected {:?}", event);
        Ok(())
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<(), OutputError> {
        self.send(&EventType::MouseMove {
            x: x as f64,
            y: y as f64,
        })?;
        self.cursor = (x, y);
        Ok(())
    }
}

impl Default for RdevSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for RdevSink {
    fn move_cursor_absolute(&mut self, x: i32, y: i32) -> Result<(), OutputError> {
        self.move_to(x, y)
    }

    fn move_cursor_relative(&mut self, dx: i32, dy: i32) -> Result<(), OutputError> {
        let (x, y) = self
            .desktop
            .clamp_point(self.cursor.0 + dx, self.cursor.1 + dy);
        self.move_to(x, y)
    }

    fn cursor_position(&self) -> Option<(i32, i32)> {
        // the tracked position is a guess, not a reading
        None
    }

    fn supports_key(&self, key: KeyName) -> bool {
        rdev_key(key).is_ok()
    }

    fn set_key(&mut self, combo: &KeyCombo, down: bool) -> Result<(), OutputError> {
        if down {
            for key in combo.press_order() {
                self.send(&EventType::KeyPress(rdev_key(*key)?))?;
            }
        } else {
            for key in combo.release_order() {
                self.send(&EventType::KeyRelease(rdev_key(*key)?))?;
            }
        }
        Ok(())
    }

    fn tap_key(&mut self, combo: &KeyCombo, hold: Duration) -> Result<(), OutputError> {
        self.set_key(combo, true)?;
        std::thread::sleep(hold);
        self.set_key(combo, false)
    }

    fn set_mouse_button(&mut self, button: MouseButton, down: bool) -> Result<(), OutputError> {
        let button = rdev_button(button);
        if down {
            self.send(&EventType::ButtonPress(button))
        } else {
            self.send(&EventType::ButtonRelease(button))
        }
    }

    fn click_mouse_button(
        &mut self,
        button: MouseButton,
        hold: Duration,
    ) -> Result<(), OutputError> {
        self.set_mouse_button(button, true)?;
        std::thread::sleep(hold);
        self.set_mouse_button(button, false)
    }

    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), OutputError> {
        let (delta_x, delta_y) = match direction {
            ScrollDirection::Up => (0, 1),
            ScrollDirection::Down => (0, -1),
            ScrollDirection::Left => (-1, 0),
            ScrollDirection::Right => (1, 0),
        };
        self.send(&EventType::Wheel { delta_x, delta_y })
    }

    fn find_window(&self, query: &WindowQuery) -> Option<WindowHandle> {
        debug!("Window lookup for {} not supported by rdev backend", query);
        None
    }

    fn restore_window(&mut self, handle: WindowHandle) -> Result<(), OutputError> {
        Err(OutputError::Unsupported(format!(
            "restore window {:?}",
            handle
        )))
    }

    fn set_foreground(&mut self, handle: WindowHandle) -> Result<bool, OutputError> {
        Err(OutputError::Unsupported(format!(
            "focus window {:?}",
            handle
        )))
    }

    fn window_rect(&self, _handle: WindowHandle) -> Option<Rect> {
        None
    }

    fn monitor_rect(&self, index: usize) -> Option<Rect> {
        // rdev only knows the main display
        (index == 0).then_some(self.desktop)
    }

    fn virtual_desktop_rect(&self) -> Rect {
        self.desktop
    }
}

fn rdev_button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
        MouseButton::X1 => Button::Unknown(1),
        MouseButton::X2 => Button::Unknown(2),
    }
}

fn rdev_key(key: KeyName) -> Result<Key, OutputError> {
    let key = match key {
        KeyName::Letter(c) => letter_key(c)?,
        KeyName::Digit(d) => digit_key(d)?,
        KeyName::Function(n) => function_key(n)?,
        KeyName::Ctrl => Key::ControlLeft,
        KeyName::Alt => Key::Alt,
        KeyName::Shift => Key::ShiftLeft,
        KeyName::LeftWin => Key::MetaLeft,
        KeyName::RightWin => Key::MetaRight,
        KeyName::Enter => Key::Return,
        KeyName::Escape => Key::Escape,
        KeyName::Space => Key::Space,
        KeyName::Tab => Key::Tab,
        KeyName::Backspace => Key::Backspace,
        KeyName::Delete => Key::Delete,
        KeyName::Insert => Key::Insert,
        KeyName::Home => Key::Home,
        KeyName::End => Key::End,
        KeyName::PageUp => Key::PageUp,
        KeyName::PageDown => Key::PageDown,
        KeyName::Left => Key::LeftArrow,
        KeyName::Right => Key::RightArrow,
        KeyName::Up => Key::UpArrow,
        KeyName::Down => Key::DownArrow,
    };
    Ok(key)
}

fn letter_key(c: char) -> Result<Key, OutputError> {
    let key = match c {
        'A' => Key::KeyA,
        'B' => Key::KeyB,
        'C' => Key::KeyC,
        'D' => Key::KeyD,
        'E' => Key::KeyE,
        'F' => Key::KeyF,
        'G' => Key::KeyG,
        'H' => Key::KeyH,
        'I' => Key::KeyI,
        'J' => Key::KeyJ,
        'K' => Key::KeyK,
        'L' => Key::KeyL,
        'M' => Key::KeyM,
        'N' => Key::KeyN,
        'O' => Key::KeyO,
        'P' => Key::KeyP,
        'Q' => Key::KeyQ,
        'R' => Key::KeyR,
        'S' => Key::KeyS,
        'T' => Key::KeyT,
        'U' => Key::KeyU,
        'V' => Key::KeyV,
        'W' => Key::KeyW,
        'X' => Key::KeyX,
        'Y' => Key::KeyY,
        'Z' => Key::KeyZ,
        other => return Err(OutputError::Unsupported(format!("letter '{}'", other))),
    };
    Ok(key)
}

fn digit_key(d: u8) -> Result<Key, OutputError> {
    let key = match d {
        0 => Key::Num0,
        1 => Key::Num1,
        2 => Key::Num2,
        3 => Key::Num3,
        4 => Key::Num4,
        5 => Key::Num5,
        6 => Key::Num6,
        7 => Key::Num7,
        8 => Key::Num8,
        9 => Key::Num9,
        other => return Err(OutputError::Unsupported(format!("digit {}", other))),
    };
    Ok(key)
}

fn function_key(n: u8) -> Result<Key, OutputError> {
    let key = match n {
        1 => Key::F1,
        2 => Key::F2,
        3 => Key::F3,
        4 => Key::F4,
        5 => Key::F5,
        6 => Key::F6,
        7 => Key::F7,
        8 => Key::F8,
        9 => Key::F9,
        10 => Key::F10,
        11 => Key::F11,
        12 => Key::F12,
        // rdev has no named F13..F24
        other => return Err(OutputError::Unsupported(format!("F{}", other))),
    };
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_table_covers_parsed_names() {
        let combo: KeyCombo = "Ctrl+Alt+Shift+LWin+Enter+PgUp+Z+9+F12".parse().unwrap();
        for key in combo.keys() {
            assert!(rdev_key(*key).is_ok(), "{} has no rdev key", key);
        }
        assert!(rdev_key(KeyName::Function(13)).is_err());
        assert!(rdev_key(KeyName::Function(24)).is_err());
    }
}
