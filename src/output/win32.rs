//! Native Windows output through `SendInput` and the window manager.
//!
//! Relative motion goes out as real `MOUSEEVENTF_MOVE` deltas, so programs
//! reading raw mouse input see it, and the cursor is read back with
//! `GetCursorPos`. Window lookups walk the visible top-level windows that
//! are neither owned nor tool windows; the largest match wins.
//!
//! The key table and the window matching are plain functions so they can be
//! checked on any platform. Only [`Win32Sink`] itself is Windows-only.

use super::{KeyName, Rect, ScrollDirection, WindowHandle, WindowQuery};

/// One wheel notch (`WHEEL_DELTA`).
pub const WHEEL_STEP: i32 = 120;

/// Virtual-key code for a key, plus whether it needs the extended flag.
pub fn virtual_key(key: KeyName) -> (u16, bool) {
    match key {
        KeyName::Letter(c) => (c.to_ascii_uppercase() as u16, false),
        KeyName::Digit(d) => (0x30 + d as u16, false),
        // VK_F1 = 0x70 .. VK_F24 = 0x87
        KeyName::Function(n) => (0x6F + n as u16, false),
        KeyName::Ctrl => (0x11, false),
        KeyName::Alt => (0x12, false),
        KeyName::Shift => (0x10, false),
        KeyName::LeftWin => (0x5B, true),
        KeyName::RightWin => (0x5C, true),
        KeyName::Enter => (0x0D, false),
        KeyName::Escape => (0x1B, false),
        KeyName::Space => (0x20, false),
        KeyName::Tab => (0x09, false),
        KeyName::Backspace => (0x08, false),
        KeyName::Delete => (0x2E, true),
        KeyName::Insert => (0x2D, true),
        KeyName::Home => (0x24, true),
        KeyName::End => (0x23, true),
        KeyName::PageUp => (0x21, true),
        KeyName::PageDown => (0x22, true),
        KeyName::Left => (0x25, true),
        KeyName::Up => (0x26, true),
        KeyName::Right => (0x27, true),
        KeyName::Down => (0x28, true),
    }
}

/// Signed wheel amount and whether it goes on the horizontal wheel.
pub fn wheel_delta(direction: ScrollDirection) -> (i32, bool) {
    match direction {
        ScrollDirection::Up => (WHEEL_STEP, false),
        ScrollDirection::Down => (-WHEEL_STEP, false),
        ScrollDirection::Right => (WHEEL_STEP, true),
        ScrollDirection::Left => (-WHEEL_STEP, true),
    }
}

/// Top-level window as seen during enumeration.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowCandidate {
    pub handle: WindowHandle,
    pub class: String,
    pub title: String,
    pub rect: Rect,
}

/// Class names match exactly, titles as a case-insensitive substring. On
/// equal area the first candidate wins.
pub fn pick_window(query: &WindowQuery, candidates: &[WindowCandidate]) -> Option<WindowHandle> {
    let matches = |candidate: &&WindowCandidate| match query {
        WindowQuery::Class(class) => candidate.class == *class,
        WindowQuery::Title(title) => candidate
            .title
            .to_lowercase()
            .contains(&title.to_lowercase()),
    };
    candidates
        .iter()
        .rev()
        .filter(matches)
        .max_by_key(|c| c.rect.area())
        .map(|c| c.handle)
}

/// Primary monitor (the one holding the desktop origin) first, the rest in
/// enumeration order.
pub fn order_monitors(mut monitors: Vec<Rect>) -> Vec<Rect> {
    monitors.sort_by_key(|rect| !rect.contains(0, 0));
    monitors
}

#[cfg(windows)]
pub use sys::Win32Sink;

#[cfg(windows)]
mod sys {
    use super::{order_monitors, pick_window, virtual_key, wheel_delta, WindowCandidate};
    use crate::output::{
        KeyCombo, KeyName, MouseButton, OutputError, OutputSink, Rect, ScrollDirection,
        WindowHandle, WindowQuery,
    };
    use std::ffi::c_void;
    use std::time::Duration;
    use tracing::{debug, info, warn};
    use windows::Win32::Foundation::{BOOL, HWND, LPARAM, POINT, RECT, TRUE};
    use windows::Win32::Graphics::Gdi::{ClientToScreen, EnumDisplayMonitors, HDC, HMONITOR};
    use windows::Win32::UI::Input::KeyboardAndMouse::*;
    use windows::Win32::UI::WindowsAndMessaging::*;

    pub struct Win32Sink;

    impl Win32Sink {
        pub fn new() -> Self {
            // physical pixels for every coordinate below
            unsafe {
                let _ = SetProcessDPIAware();
            }
            let sink = Self;
            info!(
                "Win32 output: virtual desktop {:?}, {} monitor(s)",
                sink.virtual_desktop_rect(),
                enumerate_monitors().len()
            );
            sink
        }

        fn send(&self, inputs: &[INPUT]) -> Result<(), OutputError> {
            let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
            if sent as usize != inputs.len() {
                return Err(OutputError::InjectionFailed(format!(
                    "SendInput accepted {} of {} event(s)",
                    sent,
                    inputs.len()
                )));
            }
            debug!("Injected {} event(s)", sent);
            Ok(())
        }

        fn live_window(&self, handle: WindowHandle) -> Result<HWND, OutputError> {
            let hwnd = to_hwnd(handle);
            if unsafe { IsWindow(hwnd) }.as_bool() {
                Ok(hwnd)
            } else {
                Err(OutputError::WindowUnavailable(format!("{:?} is gone", handle)))
            }
        }
    }

    impl Default for Win32Sink {
        fn default() -> Self {
            Self::new()
        }
    }

    impl OutputSink for Win32Sink {
        fn move_cursor_absolute(&mut self, x: i32, y: i32) -> Result<(), OutputError> {
            unsafe { SetCursorPos(x, y) }.map_err(|e| {
                OutputError::InjectionFailed(format!("SetCursorPos({}, {}): {}", x, y, e))
            })
        }

        fn move_cursor_relative(&mut self, dx: i32, dy: i32) -> Result<(), OutputError> {
            self.send(&[mouse_input(dx, dy, 0, MOUSEEVENTF_MOVE)])
        }

        fn cursor_position(&self) -> Option<(i32, i32)> {
            let mut point = POINT::default();
            unsafe { GetCursorPos(&mut point) }.ok()?;
            Some((point.x, point.y))
        }

        fn set_key(&mut self, combo: &KeyCombo, down: bool) -> Result<(), OutputError> {
            let inputs: Vec<INPUT> = if down {
                combo.press_order().map(|k| key_input(*k, true)).collect()
            } else {
                combo.release_order().map(|k| key_input(*k, false)).collect()
            };
            self.send(&inputs)
        }

        fn tap_key(&mut self, combo: &KeyCombo, hold: Duration) -> Result<(), OutputError> {
            self.set_key(combo, true)?;
            std::thread::sleep(hold);
            self.set_key(combo, false)
        }

        fn set_mouse_button(&mut self, button: MouseButton, down: bool) -> Result<(), OutputError> {
            let (down_flag, up_flag, data) = match button {
                MouseButton::Left => (MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, 0),
                MouseButton::Right => (MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, 0),
                MouseButton::Middle => (MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP, 0),
                MouseButton::X1 => (MOUSEEVENTF_XDOWN, MOUSEEVENTF_XUP, 1),
                MouseButton::X2 => (MOUSEEVENTF_XDOWN, MOUSEEVENTF_XUP, 2),
            };
            let flag = if down { down_flag } else { up_flag };
            self.send(&[mouse_input(0, 0, data, flag)])
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
            let (delta, horizontal) = wheel_delta(direction);
            let flag = if horizontal {
                MOUSEEVENTF_HWHEEL
            } else {
                MOUSEEVENTF_WHEEL
            };
            self.send(&[mouse_input(0, 0, delta, flag)])
        }

        fn find_window(&self, query: &WindowQuery) -> Option<WindowHandle> {
            let handle = pick_window(query, &top_level_windows());
            if handle.is_none() {
                debug!("No top-level window matches {}", query);
            }
            handle
        }

        fn restore_window(&mut self, handle: WindowHandle) -> Result<(), OutputError> {
            let hwnd = self.live_window(handle)?;
            unsafe {
                if IsIconic(hwnd).as_bool() {
                    debug!("Restoring minimized window {:?}", handle);
                    let _ = ShowWindow(hwnd, SW_RESTORE);
                }
            }
            Ok(())
        }

        fn set_foreground(&mut self, handle: WindowHandle) -> Result<bool, OutputError> {
            let hwnd = self.live_window(handle)?;
            Ok(unsafe { SetForegroundWindow(hwnd) }.as_bool())
        }

        fn window_rect(&self, handle: WindowHandle) -> Option<Rect> {
            let hwnd = self.live_window(handle).ok()?;
            window_bounds(hwnd)
        }

        fn monitor_rect(&self, index: usize) -> Option<Rect> {
            enumerate_monitors().get(index).copied()
        }

        fn virtual_desktop_rect(&self) -> Rect {
            unsafe {
                Rect::new(
                    GetSystemMetrics(SM_XVIRTUALSCREEN),
                    GetSystemMetrics(SM_YVIRTUALSCREEN),
                    GetSystemMetrics(SM_CXVIRTUALSCREEN),
                    GetSystemMetrics(SM_CYVIRTUALSCREEN),
                )
            }
        }
    }

    fn mouse_input(dx: i32, dy: i32, data: i32, flags: MOUSE_EVENT_FLAGS) -> INPUT {
        INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx,
                    dy,
                    mouseData: data as _,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }

    fn key_input(key: KeyName, down: bool) -> INPUT {
        let (vk, extended) = virtual_key(key);
        let mut flags = KEYBD_EVENT_FLAGS(0);
        if extended {
            flags |= KEYEVENTF_EXTENDEDKEY;
        }
        if !down {
            flags |= KEYEVENTF_KEYUP;
        }
        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(vk),
                    wScan: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }

    fn to_hwnd(handle: WindowHandle) -> HWND {
        HWND(handle.0 as usize as *mut c_void)
    }

    fn to_handle(hwnd: HWND) -> WindowHandle {
        WindowHandle(hwnd.0 as usize as u64)
    }

    fn from_rect(rect: &RECT) -> Rect {
        Rect::new(
            rect.left,
            rect.top,
            rect.right - rect.left,
            rect.bottom - rect.top,
        )
    }

    unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let handles = &mut *(lparam.0 as *mut Vec<HWND>);
        handles.push(hwnd);
        TRUE
    }

    unsafe extern "system" fn collect_monitor(
        _monitor: HMONITOR,
        _hdc: HDC,
        rect: *mut RECT,
        lparam: LPARAM,
    ) -> BOOL {
        let monitors = &mut *(lparam.0 as *mut Vec<Rect>);
        if let Some(rect) = rect.as_ref() {
            monitors.push(from_rect(rect));
        }
        TRUE
    }

    fn enumerate_monitors() -> Vec<Rect> {
        let mut monitors: Vec<Rect> = Vec::new();
        unsafe {
            let _ = EnumDisplayMonitors(
                HDC::default(),
                None,
                Some(collect_monitor),
                LPARAM(&mut monitors as *mut Vec<Rect> as isize),
            );
        }
        order_monitors(monitors)
    }

    fn top_level_windows() -> Vec<WindowCandidate> {
        let mut handles: Vec<HWND> = Vec::new();
        let result = unsafe {
            EnumWindows(
                Some(collect_window),
                LPARAM(&mut handles as *mut Vec<HWND> as isize),
            )
        };
        if let Err(e) = result {
            warn!("EnumWindows failed: {}", e);
        }

        handles
            .into_iter()
            .filter(|hwnd| is_app_window(*hwnd))
            .filter_map(|hwnd| {
                Some(WindowCandidate {
                    handle: to_handle(hwnd),
                    class: class_name(hwnd),
                    title: window_title(hwnd),
                    rect: window_bounds(hwnd)?,
                })
            })
            .collect()
    }

    fn is_app_window(hwnd: HWND) -> bool {
        unsafe {
            if !IsWindowVisible(hwnd).as_bool() {
                return false;
            }
            if matches!(GetWindow(hwnd, GW_OWNER), Ok(owner) if !owner.is_invalid()) {
                return false;
            }
            let ex_style = GetWindowLongW(hwnd, GWL_EXSTYLE) as u32;
            ex_style & WS_EX_TOOLWINDOW.0 == 0
        }
    }

    fn class_name(hwnd: HWND) -> String {
        let mut buffer = [0u16; 256];
        let len = unsafe { GetClassNameW(hwnd, &mut buffer) };
        String::from_utf16_lossy(&buffer[..len.max(0) as usize])
    }

    fn window_title(hwnd: HWND) -> String {
        let capacity = unsafe { GetWindowTextLengthW(hwnd) }.max(0) as usize + 1;
        let mut buffer = vec![0u16; capacity];
        let len = unsafe { GetWindowTextW(hwnd, &mut buffer) };
        String::from_utf16_lossy(&buffer[..len.max(0) as usize])
    }

    /// Client area in screen coordinates, the outer frame if that fails.
    fn window_bounds(hwnd: HWND) -> Option<Rect> {
        unsafe {
            let mut client = RECT::default();
            if GetClientRect(hwnd, &mut client).is_ok() {
                let mut origin = POINT {
                    x: client.left,
                    y: client.top,
                };
                if ClientToScreen(hwnd, &mut origin).as_bool() {
                    let rect = Rect::new(
                        origin.x,
                        origin.y,
                        client.right - client.left,
                        client.bottom - client.top,
                    );
                    if rect.area() > 0 {
                        return Some(rect);
                    }
                }
            }
            let mut outer = RECT::default();
            GetWindowRect(hwnd, &mut outer).ok()?;
            Some(from_rect(&outer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::KeyCombo;

    fn window(handle: u64, class: &str, title: &str, rect: Rect) -> WindowCandidate {
        WindowCandidate {
            handle: WindowHandle(handle),
            class: class.to_string(),
            title: title.to_string(),
            rect,
        }
    }

    #[test]
    fn test_virtual_key_codes() {
        assert_eq!(virtual_key(KeyName::Letter('a')), (0x41, false));
        assert_eq!(virtual_key(KeyName::Digit(7)), (0x37, false));
        assert_eq!(virtual_key(KeyName::Function(1)), (0x70, false));
        assert_eq!(virtual_key(KeyName::Function(13)), (0x7C, false));
        assert_eq!(virtual_key(KeyName::Function(24)), (0x87, false));
        assert_eq!(virtual_key(KeyName::Up), (0x26, true));

        // every name a combo can hold has a code
        let combo: KeyCombo = "Ctrl+Alt+Shift+F24".parse().unwrap();
        assert!(combo.keys().iter().all(|k| virtual_key(*k).0 != 0));
    }

    #[test]
    fn test_wheel_notches() {
        assert_eq!(wheel_delta(ScrollDirection::Up), (120, false));
        assert_eq!(wheel_delta(ScrollDirection::Down), (-120, false));
        assert_eq!(wheel_delta(ScrollDirection::Left), (-120, true));
    }

    #[test]
    fn test_window_pick_prefers_largest_match() {
        let candidates = vec![
            window(1, "DCS", "Digital Combat Simulator", Rect::new(0, 0, 640, 480)),
            window(2, "Notepad", "combat notes", Rect::new(0, 0, 800, 600)),
            window(3, "DCS", "DCS launcher", Rect::new(0, 0, 1920, 1080)),
            window(4, "Other", "Digital Combat Simulator", Rect::new(0, 0, 640, 480)),
        ];

        assert_eq!(
            pick_window(&WindowQuery::Class("DCS".to_string()), &candidates),
            Some(WindowHandle(3))
        );
        assert_eq!(
            pick_window(&WindowQuery::Title("COMBAT".to_string()), &candidates),
            Some(WindowHandle(2))
        );
        // equal area: first in enumeration order
        assert_eq!(
            pick_window(&WindowQuery::Title("simulator".to_string()), &candidates),
            Some(WindowHandle(1))
        );
        assert_eq!(pick_window(&WindowQuery::Class("dcs".to_string()), &candidates), None);
    }

    #[test]
    fn test_primary_monitor_comes_first() {
        let left = Rect::new(-1280, 0, 1280, 1024);
        let primary = Rect::new(0, 0, 1920, 1080);
        let right = Rect::new(1920, 0, 1920, 1080);
        assert_eq!(
            order_monitors(vec![left, right, primary]),
            vec![primary, left, right]
        );
    }
}
