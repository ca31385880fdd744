//! In-memory input source. Values are set by hand, mostly from tests.

use super::{DeviceIndex, DeviceInfo, InputSource};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Debug)]
struct MemoryDevice {
    info: DeviceInfo,
    buttons: Vec<bool>,
    axes: Vec<f32>,
}

#[derive(Debug, Default)]
struct MemoryState {
    devices: Vec<MemoryDevice>,
    refreshes: u64,
}

/// Clones are handles onto the same devices, so a test can keep one while
/// the engine owns the other.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    state: Rc<RefCell<MemoryState>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connected device and returns its index.
    pub fn add_device(&self, guid: &str, buttons: u32, axes: u32) -> DeviceIndex {
        let mut state = self.state.borrow_mut();
        let index = state.devices.len();
        state.devices.push(MemoryDevice {
            info: DeviceInfo {
                index,
                guid: guid.to_ascii_lowercase(),
                name: format!("Memory Pad {}", index),
                button_count: buttons,
                axis_count: axes,
                connected: true,
            },
            buttons: vec![false; buttons as usize],
            axes: vec![0.0; axes as usize],
        });
        index
    }

    pub fn set_button(&self, device: DeviceIndex, id: u32, pressed: bool) {
        if let Some(slot) = self
            .state
            .borrow_mut()
            .devices
            .get_mut(device)
            .and_then(|d| d.buttons.get_mut(id as usize))
        {
            *slot = pressed;
        }
    }

    pub fn set_axis(&self, device: DeviceIndex, id: u32, value: f32) {
        if let Some(slot) = self
            .state
            .borrow_mut()
            .devices
            .get_mut(device)
            .and_then(|d| d.axes.get_mut(id as usize))
        {
            *slot = value.clamp(-1.0, 1.0);
        }
    }

    pub fn set_connected(&self, device: DeviceIndex, connected: bool) {
        if let Some(d) = self.state.borrow_mut().devices.get_mut(device) {
            d.info.connected = connected;
        }
    }

    pub fn refreshes(&self) -> u64 {
        self.state.borrow().refreshes
    }

    fn read<T>(
        &self,
        device: DeviceIndex,
        f: impl FnOnce(&MemoryDevice) -> Option<T>,
    ) -> Option<T> {
        let state = self.state.borrow();
        state
            .devices
            .get(device)
            .filter(|d| d.info.connected)
            .and_then(f)
    }
}

impl InputSource for MemorySource {
    fn refresh(&mut self) {
        self.state.borrow_mut().refreshes += 1;
    }

    fn devices(&self) -> Vec<DeviceInfo> {
        self.state
            .borrow()
            .devices
            .iter()
            .map(|d| d.info.clone())
            .collect()
    }

    fn button(&self, device: DeviceIndex, id: u32) -> Option<bool> {
        self.read(device, |d| d.buttons.get(id as usize).copied())
    }

    fn axis(&self, device: DeviceIndex, id: u32) -> Option<f32> {
        self.read(device, |d| d.axes.get(id as usize).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_device_reads_none() {
        let source = MemorySource::new();
        let pad = source.add_device("abcd", 4, 2);
        source.set_button(pad, 1, true);
        assert_eq!(source.button(pad, 1), Some(true));
        assert_eq!(source.button(pad, 9), None);

        source.set_connected(pad, false);
        assert_eq!(source.button(pad, 1), None);
        assert_eq!(source.axis(pad, 0), None);
    }

    #[test]
    fn test_clones_share_state() {
        let source = MemorySource::new();
        let mut handle = source.clone();
        let pad = source.add_device("abcd", 0, 1);
        source.set_axis(pad, 0, 3.0);
        assert_eq!(handle.axis(pad, 0), Some(1.0));
        handle.refresh();
        assert_eq!(source.refreshes(), 1);
    }
}
