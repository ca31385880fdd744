//! Device subsystem: where raw controller state comes from.
//!
//! The engine only sees the [`InputSource`] capability. A source is refreshed
//! once per tick and then sampled per binding:
//!
//! ```text
//! gilrs ──► GilrsSource ─┐
//!                        ├──► InputSource ──► Detector
//! tests ──► MemorySource ┘
//! ```
//!
//! Devices are addressed by a session-local [`DeviceIndex`]. Stable GUIDs are
//! resolved to indices once at load time by the [`DeviceRegistry`].

pub mod gilrs_source;
pub mod memory;
pub mod registry;

use std::fmt;

pub use gilrs_source::GilrsSource;
pub use memory::MemorySource;
pub use registry::{DeviceRegistry, Resolution};

/// Session-local device number, in enumeration order.
pub type DeviceIndex = usize;

/// Snapshot of one enumerated device.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceInfo {
    pub index: DeviceIndex,
    /// Normalized GUID: lower case hex, no dashes
    pub guid: String,
    pub name: String,
    pub button_count: u32,
    pub axis_count: u32,
    pub connected: bool,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} guid={} buttons={} axes={}{}",
            self.index,
            self.name,
            self.guid,
            self.button_count,
            self.axis_count,
            if self.connected { "" } else { " (disconnected)" }
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Failed to initialize input backend: {0}")]
    InitializationError(String),
}

/// Raw controller state, sampled by the detector.
///
/// `None` from a sampling call means the device is gone or the id is out of
/// range; callers treat that as "inactive", never as an error.
pub trait InputSource {
    /// Pulls pending backend events so the next samples are current.
    fn refresh(&mut self);

    fn devices(&self) -> Vec<DeviceInfo>;

    fn button(&self, device: DeviceIndex, id: u32) -> Option<bool>;

    /// Axis value in `[-1, 1]`.
    fn axis(&self, device: DeviceIndex, id: u32) -> Option<f32>;
}
