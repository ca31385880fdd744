//! Detector: turns raw device samples into edge-filtered, layer-gated events.
//!
//! Per tick the global modifier is evaluated exactly once, then every binding
//! in the table is sampled in id order. Digital bindings keep one cached
//! pressed flag each (indexed by [`BindingId`]) and only emit on a change;
//! continuous axes emit every tick they are live.
//!
//! During the startup grace window the cache follows the hardware silently,
//! so a button already held at launch does not fire once the window closes.

use crate::binding::{
    AxisMode, BindingEntry, BindingId, BindingTable, InputBinding, InputControl, Threshold,
};
use crate::device::{DeviceIndex, DeviceRegistry, InputSource, Resolution};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    Digital { binding: BindingId, pressed: bool },
    Analog { binding: BindingId, value: f32 },
}

impl InputEvent {
    pub fn binding(&self) -> BindingId {
        match self {
            InputEvent::Digital { binding, .. } | InputEvent::Analog { binding, .. } => *binding,
        }
    }
}

/// Why a binding is or is not live this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    Live,
    /// Wrong layer for the current modifier state
    Inhibited,
    /// Base binding shadowed by a modifier binding on the same input
    Overridden,
}

pub fn layer_gate(table: &BindingTable, entry: &BindingEntry, modifier_active: bool) -> Gate {
    if entry.map.input.modifier_layer == modifier_active {
        return Gate::Live;
    }
    if modifier_active && table.has_modified_counterpart(entry.id) {
        Gate::Overridden
    } else {
        Gate::Inhibited
    }
}

/// Axis-as-button evaluation with hysteresis.
///
/// Presses at `threshold`, releases only once the value falls back below
/// `threshold - hysteresis`. The hysteresis is clamped to `[0, threshold]`.
pub fn axis_pressed(
    value: f32,
    mode: AxisMode,
    threshold: Threshold,
    hysteresis: f32,
    was_pressed: bool,
) -> bool {
    let t = threshold.value();
    let h = hysteresis.clamp(0.0, t);
    let magnitude = match mode {
        AxisMode::Pos => value,
        AxisMode::Neg => -value,
        AxisMode::Abs => value.abs(),
    };
    if was_pressed {
        magnitude >= t - h
    } else {
        magnitude >= t
    }
}

/// The global modifier input, resolved to a device.
#[derive(Clone, Debug, PartialEq)]
pub struct ModifierInput {
    pub binding: InputBinding,
    pub device: DeviceIndex,
}

impl ModifierInput {
    /// Returns `None` (with a warning) when the modifier's device GUID is not
    /// enumerated; modifier-layer bindings then never go live.
    pub fn resolve(binding: InputBinding, registry: &DeviceRegistry) -> Option<Self> {
        match registry.resolve(&binding.selector) {
            Resolution::Attached(device) => Some(Self { binding, device }),
            Resolution::Detached(device) => {
                warn!("Modifier {}: device {} is not attached yet", binding, device);
                Some(Self { binding, device })
            }
            Resolution::Unknown => {
                warn!(
                    "Modifier {}: device GUID not found, modifier layer disabled",
                    binding
                );
                None
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorSettings {
    pub hysteresis: f32,
    /// Digital edges are swallowed for this long after the first poll
    pub startup_grace: Duration,
    pub log_buttons: bool,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            hysteresis: 0.10,
            startup_grace: Duration::from_millis(200),
            log_buttons: false,
        }
    }
}

#[derive(Debug)]
pub struct Detector {
    settings: DetectorSettings,
    modifier: Option<ModifierInput>,
    modifier_active: bool,
    // set on the first poll
    grace_until: Option<Instant>,
    // indexed by BindingId
    pressed: Vec<bool>,
}

impl Detector {
    pub fn new(
        table: &BindingTable,
        modifier: Option<ModifierInput>,
        settings: DetectorSettings,
    ) -> Self {
        if modifier.is_none() && table.entries().iter().any(|e| e.map.input.modifier_layer) {
            warn!("Modifier-layer bindings configured without a usable modifier, they stay inert");
        }
        Self {
            settings,
            modifier,
            modifier_active: false,
            grace_until: None,
            pressed: vec![false; table.len()],
        }
    }

    pub fn modifier_active(&self) -> bool {
        self.modifier_active
    }

    pub fn is_pressed(&self, binding: BindingId) -> bool {
        self.pressed.get(binding).copied().unwrap_or(false)
    }

    /// Samples every binding once and appends the resulting events.
    pub fn poll(
        &mut self,
        table: &BindingTable,
        source: &dyn InputSource,
        now: Instant,
        events: &mut Vec<InputEvent>,
    ) {
        let grace_until = *self
            .grace_until
            .get_or_insert_with(|| now + self.settings.startup_grace);
        let silent = now < grace_until;

        self.update_modifier(source);

        for entry in table.entries() {
            let gate = layer_gate(table, entry, self.modifier_active);
            if gate != Gate::Live {
                if self.is_pressed(entry.id) {
                    debug!(
                        "Binding {} suppressed ({:?}) while held, releasing",
                        entry.map.input, gate
                    );
                    self.set_state(entry, false, silent, events);
                }
                continue;
            }

            match entry.map.input.control {
                InputControl::Button(id) => {
                    // absent device counts as released
                    let pressed = source.button(entry.device, id).unwrap_or(false);
                    self.set_state(entry, pressed, silent, events);
                }
                InputControl::AxisButton {
                    axis,
                    mode,
                    threshold,
                } => {
                    let was = self.is_pressed(entry.id);
                    let pressed = source
                        .axis(entry.device, axis)
                        .map(|v| axis_pressed(v, mode, threshold, self.settings.hysteresis, was))
                        .unwrap_or(false);
                    self.set_state(entry, pressed, silent, events);
                }
                InputControl::Axis(axis) => {
                    if let Some(value) = source.axis(entry.device, axis) {
                        events.push(InputEvent::Analog {
                            binding: entry.id,
                            value,
                        });
                    }
                }
            }
        }
    }

    fn update_modifier(&mut self, source: &dyn InputSource) {
        let Some(modifier) = &self.modifier else {
            return;
        };

        let was = self.modifier_active;
        let active = match modifier.binding.control {
            InputControl::Button(id) => source.button(modifier.device, id).unwrap_or(false),
            InputControl::Axis(axis) => source
                .axis(modifier.device, axis)
                .map(|v| {
                    let hysteresis = self.settings.hysteresis;
                    axis_pressed(v, AxisMode::Abs, Threshold::DEFAULT, hysteresis, was)
                })
                .unwrap_or(false),
            InputControl::AxisButton {
                axis,
                mode,
                threshold,
            } => source
                .axis(modifier.device, axis)
                .map(|v| axis_pressed(v, mode, threshold, self.settings.hysteresis, was))
                .unwrap_or(false),
        };

        if active != was {
            info!("Modifier {}", if active { "ON" } else { "OFF" });
            self.modifier_active = active;
        }
    }

    fn set_state(
        &mut self,
        entry: &BindingEntry,
        pressed: bool,
        silent: bool,
        events: &mut Vec<InputEvent>,
    ) {
        let Some(cached) = self.pressed.get_mut(entry.id) else {
            return;
        };
        if *cached == pressed {
            return;
        }
        *cached = pressed;

        if silent {
            debug!("Input {} changed during startup grace, ignored", entry.map.input);
            return;
        }

        if self.settings.log_buttons {
            info!(
                "Input {} {}",
                entry.map.input,
                if pressed { "pressed" } else { "released" }
            );
        } else {
            debug!(
                "Input {} {}",
                entry.map.input,
                if pressed { "pressed" } else { "released" }
            );
        }
        events.push(InputEvent::Digital {
            binding: entry.id,
            pressed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{parse_input, parse_mapping};
    use crate::device::MemorySource;

    struct Rig {
        source: MemorySource,
        table: BindingTable,
        detector: Detector,
        now: Instant,
    }

    impl Rig {
        fn new(lines: &[&str], modifier: Option<&str>) -> Self {
            let source = MemorySource::new();
            source.add_device("030000005e040000", 16, 6);
            let registry = DeviceRegistry::new(source.devices());
            let maps = lines.iter().map(|l| parse_mapping(l).unwrap()).collect();
            let table = BindingTable::build(maps, &registry);
            let modifier = modifier
                .map(|m| ModifierInput::resolve(parse_input(m).unwrap(), &registry).unwrap());
            let settings = DetectorSettings {
                startup_grace: Duration::ZERO,
                ..DetectorSettings::default()
            };
            let detector = Detector::new(&table, modifier, settings);
            Self {
                source,
                table,
                detector,
                now: Instant::now(),
            }
        }

        fn tick(&mut self) -> Vec<InputEvent> {
            self.now += Duration::from_millis(4);
            let mut events = Vec::new();
            self.detector
                .poll(&self.table, &self.source, self.now, &mut events);
            events
        }
    }

    fn press(binding: BindingId) -> InputEvent {
        InputEvent::Digital {
            binding,
            pressed: true,
        }
    }

    fn release(binding: BindingId) -> InputEvent {
        InputEvent::Digital {
            binding,
            pressed: false,
        }
    }

    #[test]
    fn test_press_boundary_above_release_boundary() {
        let t = Threshold::new(0.5).unwrap();
        for mode in [AxisMode::Pos, AxisMode::Neg, AxisMode::Abs] {
            let sign = if mode == AxisMode::Neg { -1.0 } else { 1.0 };
            assert!(!axis_pressed(sign * 0.49, mode, t, 0.1, false));
            assert!(axis_pressed(sign * 0.5, mode, t, 0.1, false));
            assert!(axis_pressed(sign * 0.41, mode, t, 0.1, true));
            assert!(!axis_pressed(sign * 0.39, mode, t, 0.1, true));
        }
        // hysteresis larger than the threshold is clamped
        let low = Threshold::new(0.05).unwrap();
        assert!(axis_pressed(0.0, AxisMode::Pos, low, 0.5, true));
        assert!(!axis_pressed(-0.01, AxisMode::Pos, low, 0.5, true));
    }

    #[test]
    fn test_no_chatter_inside_hysteresis_band() {
        let mut rig = Rig::new(&["dev:0:axis:2:pos:0.5 => WheelUp"], None);

        // released: oscillating strictly inside (t-h, t) never presses
        for i in 0..50 {
            rig.source.set_axis(0, 2, if i % 2 == 0 { 0.41 } else { 0.49 });
            assert!(rig.tick().is_empty());
        }

        rig.source.set_axis(0, 2, 0.8);
        assert_eq!(rig.tick(), vec![press(0)]);

        // pressed: the same band never releases
        for i in 0..50 {
            rig.source.set_axis(0, 2, if i % 2 == 0 { 0.41 } else { 0.49 });
            assert!(rig.tick().is_empty());
        }

        rig.source.set_axis(0, 2, 0.3);
        assert_eq!(rig.tick(), vec![release(0)]);
    }

    #[test]
    fn test_edges_are_idempotent() {
        let mut rig = Rig::new(&["dev:0:button:1 => F1"], None);
        rig.source.set_button(0, 0, true);
        let events: Vec<InputEvent> = (0..100).flat_map(|_| rig.tick()).collect();
        assert_eq!(events, vec![press(0)]);

        rig.source.set_button(0, 0, false);
        let events: Vec<InputEvent> = (0..100).flat_map(|_| rig.tick()).collect();
        assert_eq!(events, vec![release(0)]);
    }

    #[test]
    fn test_modifier_overrides_base_mid_hold() {
        let mut rig = Rig::new(
            &["dev:0:button:4 => F1:hold", "dev:0:button:4:M => F2:hold"],
            Some("dev:0:button:6"),
        );

        rig.source.set_button(0, 3, true);
        assert_eq!(rig.tick(), vec![press(0)]);

        // modifier asserted while the base is held: base released, layer live
        rig.source.set_button(0, 5, true);
        assert_eq!(rig.tick(), vec![release(0), press(1)]);
        assert!(rig.detector.modifier_active());
        assert_eq!(
            layer_gate(&rig.table, &rig.table.entries()[0], true),
            Gate::Overridden
        );
        assert!(rig.tick().is_empty());

        // base comes back only after the modifier release is observed
        rig.source.set_button(0, 5, false);
        assert_eq!(rig.tick(), vec![press(0), release(1)]);
        assert!(!rig.detector.modifier_active());
    }

    #[test]
    fn test_modifier_layer_is_inert_without_modifier() {
        let mut rig = Rig::new(&["dev:0:button:4:M => F2"], None);
        rig.source.set_button(0, 3, true);
        assert!(rig.tick().is_empty());
    }

    #[test]
    fn test_modifier_on_axis_defaults_to_half_deflection() {
        let mut rig = Rig::new(&["dev:0:button:1:M => F2"], Some("dev:0:axis:5"));
        rig.source.set_button(0, 0, true);
        rig.source.set_axis(0, 5, -0.3);
        assert!(rig.tick().is_empty());
        rig.source.set_axis(0, 5, -0.6);
        assert_eq!(rig.tick(), vec![press(0)]);
    }

    #[test]
    fn test_continuous_axis_emits_every_tick() {
        let mut rig = Rig::new(&["dev:0:axis:0 => mouse_x"], None);
        rig.source.set_axis(0, 0, 0.25);
        for _ in 0..3 {
            assert_eq!(
                rig.tick(),
                vec![InputEvent::Analog {
                    binding: 0,
                    value: 0.25
                }]
            );
        }
    }

    #[test]
    fn test_device_loss_is_inactive() {
        let mut rig = Rig::new(&["dev:0:button:1 => F1:hold", "dev:0:axis:0 => mouse_x"], None);
        rig.source.set_button(0, 0, true);
        assert_eq!(rig.tick().len(), 2);

        rig.source.set_connected(0, false);
        assert_eq!(rig.tick(), vec![release(0)]);
        assert!(rig.tick().is_empty());

        rig.source.set_connected(0, true);
        assert_eq!(rig.tick()[0], press(0));
    }

    #[test]
    fn test_startup_grace_swallows_edges() {
        let mut rig = Rig::new(
            &["dev:0:button:1 => F1:hold", "dev:0:button:2 => F2", "dev:0:axis:0 => mouse_x"],
            None,
        );
        rig.detector.settings.startup_grace = Duration::from_millis(200);
        let start = rig.now;
        let poll = |rig: &mut Rig, ms: u64| {
            let mut events = Vec::new();
            let now = start + Duration::from_millis(ms);
            rig.detector.poll(&rig.table, &rig.source, now, &mut events);
            events
        };

        // held at launch: cached, never reported
        rig.source.set_button(0, 0, true);
        rig.source.set_axis(0, 0, 0.5);
        let analog = InputEvent::Analog {
            binding: 2,
            value: 0.5,
        };
        assert_eq!(poll(&mut rig, 0), vec![analog]);
        rig.source.set_button(0, 1, true);
        assert_eq!(poll(&mut rig, 100), vec![analog]);
        assert!(rig.detector.is_pressed(0));

        // after the window only real changes count
        assert_eq!(poll(&mut rig, 200), vec![analog]);
        rig.source.set_button(0, 1, false);
        assert_eq!(poll(&mut rig, 204), vec![release(1), analog]);
        rig.source.set_button(0, 0, false);
        assert_eq!(poll(&mut rig, 208), vec![release(0), analog]);
    }
}
