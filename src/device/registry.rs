//! Device registry: resolves device selectors against the enumerated devices.
//!
//! Built once at load time from an [`InputSource`] snapshot and passed to the
//! binding table and the detector. It never touches the backend itself.

use super::{DeviceIndex, DeviceInfo, InputSource};
use crate::binding::DeviceSelector;
use tracing::{info, warn};

/// Outcome of resolving a selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Device is enumerated and connected
    Attached(DeviceIndex),
    /// Index selector without a device behind it (yet)
    Detached(DeviceIndex),
    /// GUID not found among the enumerated devices
    Unknown,
}

#[derive(Clone, Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<DeviceInfo>,
}

impl DeviceRegistry {
    pub fn new(devices: Vec<DeviceInfo>) -> Self {
        Self { devices }
    }

    pub fn from_source(source: &dyn InputSource) -> Self {
        let registry = Self::new(source.devices());
        registry.log_devices();
        registry
    }

    pub fn resolve(&self, selector: &DeviceSelector) -> Resolution {
        match selector {
            DeviceSelector::Index(index) => match self.devices.iter().find(|d| d.index == *index) {
                Some(d) if d.connected => Resolution::Attached(*index),
                _ => Resolution::Detached(*index),
            },
            DeviceSelector::Guid(guid) => self
                .devices
                .iter()
                .find(|d| d.guid == *guid)
                .map(|d| {
                    if d.connected {
                        Resolution::Attached(d.index)
                    } else {
                        Resolution::Detached(d.index)
                    }
                })
                .unwrap_or(Resolution::Unknown),
        }
    }

    fn log_devices(&self) {
        if self.devices.is_empty() {
            warn!("No controllers detected, bindings stay inert until one connects");
            return;
        }
        info!("Detected {} controller(s):", self.devices.len());
        for device in &self.devices {
            info!("  {}", device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemorySource;

    fn registry() -> DeviceRegistry {
        let source = MemorySource::new();
        source.add_device("030000005e040000", 12, 6);
        let second = source.add_device("0300beef", 8, 4);
        source.set_connected(second, false);
        DeviceRegistry::from_source(&source)
    }

    #[test]
    fn test_resolve_by_index() {
        let registry = registry();
        assert_eq!(registry.resolve(&DeviceSelector::Index(0)), Resolution::Attached(0));
        assert_eq!(registry.resolve(&DeviceSelector::Index(1)), Resolution::Detached(1));
        assert_eq!(registry.resolve(&DeviceSelector::Index(7)), Resolution::Detached(7));
    }

    #[test]
    fn test_resolve_by_guid() {
        let registry = registry();
        assert_eq!(
            registry.resolve(&DeviceSelector::guid("030000005E040000")),
            Resolution::Attached(0)
        );
        assert_eq!(
            registry.resolve(&DeviceSelector::guid("0300-BEEF")),
            Resolution::Detached(1)
        );
        assert_eq!(registry.resolve(&DeviceSelector::guid("ffff")), Resolution::Unknown);
    }
}
