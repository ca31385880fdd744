//! Value types for logical inputs, output actions and their pairing.

use crate::output::{KeyCombo, MotionAxis, MotionMode, MouseButton, ScrollDirection, WindowQuery};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies a physical device: stable GUID (preferred) or session index.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeviceSelector {
    Index(usize),
    /// Normalized: lower case, no dashes
    Guid(String),
}

impl DeviceSelector {
    pub fn guid(raw: &str) -> Self {
        DeviceSelector::Guid(normalize_guid(raw))
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::Index(i) => write!(f, "{}", i),
            DeviceSelector::Guid(g) => write!(f, "{}", g),
        }
    }
}

pub fn normalize_guid(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| *c != '-' && *c != '{' && *c != '}')
        .collect::<String>()
        .to_ascii_lowercase()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputKind {
    Button,
    Axis,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Button => write!(f, "button"),
            InputKind::Axis => write!(f, "axis"),
        }
    }
}

/// Direction an axis must travel to count as pressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AxisMode {
    Pos,
    Neg,
    Abs,
}

impl fmt::Display for AxisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisMode::Pos => write!(f, "pos"),
            AxisMode::Neg => write!(f, "neg"),
            AxisMode::Abs => write!(f, "abs"),
        }
    }
}

/// Threshold in `[0, 1]`. Compared and hashed by bit pattern so it can be
/// part of a binding's identity.
#[derive(Clone, Copy, Debug)]
pub struct Threshold(f32);

impl Threshold {
    pub const DEFAULT: Threshold = Threshold(0.5);

    /// Returns `None` for values outside `[0, 1]` or non-finite input.
    pub fn new(value: f32) -> Option<Self> {
        (value.is_finite() && (0.0..=1.0).contains(&value)).then_some(Threshold(value))
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl PartialEq for Threshold {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Threshold {}

impl Hash for Threshold {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// The control a binding reads. Axis mode and threshold only exist for the
/// axis-as-button case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputControl {
    Button(u32),
    Axis(u32),
    AxisButton {
        axis: u32,
        mode: AxisMode,
        threshold: Threshold,
    },
}

impl InputControl {
    pub fn kind(&self) -> InputKind {
        match self {
            InputControl::Button(_) => InputKind::Button,
            InputControl::Axis(_) | InputControl::AxisButton { .. } => InputKind::Axis,
        }
    }

    /// 0-based button or axis number.
    pub fn id(&self) -> u32 {
        match self {
            InputControl::Button(id) | InputControl::Axis(id) => *id,
            InputControl::AxisButton { axis, .. } => *axis,
        }
    }
}

/// A logical input. Equality covers the full identity: selector, control
/// (kind, id, axis mode, threshold) and layer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InputBinding {
    pub selector: DeviceSelector,
    pub control: InputControl,
    pub modifier_layer: bool,
}

impl InputBinding {
    pub fn button(selector: DeviceSelector, id: u32) -> Self {
        Self {
            selector,
            control: InputControl::Button(id),
            modifier_layer: false,
        }
    }

    pub fn axis(selector: DeviceSelector, id: u32) -> Self {
        Self {
            selector,
            control: InputControl::Axis(id),
            modifier_layer: false,
        }
    }

    pub fn axis_button(
        selector: DeviceSelector,
        id: u32,
        mode: AxisMode,
        threshold: Threshold,
    ) -> Self {
        Self {
            selector,
            control: InputControl::AxisButton {
                axis: id,
                mode,
                threshold,
            },
            modifier_layer: false,
        }
    }

    pub fn on_modifier_layer(mut self) -> Self {
        self.modifier_layer = true;
        self
    }

    /// Unconditioned analog axis, emitted every tick.
    pub fn is_continuous(&self) -> bool {
        matches!(self.control, InputControl::Axis(_))
    }
}

impl fmt::Display for InputBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.control {
            // buttons are shown 1-based, the way they are written
            InputControl::Button(id) => write!(f, "dev:{}:button:{}", self.selector, id + 1)?,
            InputControl::Axis(id) => write!(f, "dev:{}:axis:{}", self.selector, id)?,
            InputControl::AxisButton {
                axis,
                mode,
                threshold,
            } => write!(
                f,
                "dev:{}:axis:{}:{}:{:.2}",
                self.selector,
                axis,
                mode,
                threshold.value()
            )?,
        }
        if self.modifier_layer {
            write!(f, ":M")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ActivationMode {
    #[default]
    Single,
    Hold,
    Toggle,
}

impl fmt::Display for ActivationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationMode::Single => write!(f, "single"),
            ActivationMode::Hold => write!(f, "hold"),
            ActivationMode::Toggle => write!(f, "toggle"),
        }
    }
}

/// Highest accepted ramp rate, in ticks per second.
pub const MAX_RAMP_RATE: u32 = 1000;

/// Longest accepted ramp time.
pub const MAX_RAMP_MS: u64 = 60_000;

/// Acceleration curve of a repeating hold action, as written. Zero fields
/// fall back to the defaults when the ramp is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct RampSpec {
    pub init_rate: u32,
    pub max_rate: u32,
    pub ramp_ms: u64,
}

/// Space a center action positions inside.
#[derive(Clone, Debug, PartialEq)]
pub enum TargetSpace {
    Virtual,
    Monitor(usize),
    Window(WindowQuery),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TargetPoint {
    /// Fractions of the target's width and height
    Fraction(f64, f64),
    /// Pixel offset from the target's origin
    Pixels(i32, i32),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CenterTarget {
    pub space: TargetSpace,
    pub point: Option<TargetPoint>,
}

impl CenterTarget {
    pub fn point_or_center(&self) -> TargetPoint {
        self.point.unwrap_or(TargetPoint::Fraction(0.5, 0.5))
    }
}

/// Wiggle parameters; missing values come from the `[wiggle]` defaults.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct WiggleSpec {
    pub mode: Option<MotionMode>,
    pub amplitude_px: Option<i32>,
    pub period_ms: Option<u64>,
}

/// The session toggle: recenter on, restore off.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionToggleSpec {
    pub center: CenterTarget,
    pub focus: Option<WindowQuery>,
    pub restore_on_off: bool,
    pub repeat_ms: u64,
    pub debounce_ms: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ActionKind {
    Key {
        combo: KeyCombo,
    },
    MouseButton {
        button: MouseButton,
        hold_ms: u64,
    },
    MouseWheel {
        direction: ScrollDirection,
        ramp: RampSpec,
    },
    MouseAxis {
        axis: MotionAxis,
    },
    MouseCenter(CenterTarget),
    MouseWiggle(WiggleSpec),
    FocusWindow(WindowQuery),
    MouseIncrement {
        axis: MotionAxis,
        amount: i32,
        mode: MotionMode,
        ramp: RampSpec,
    },
    SessionToggle(SessionToggleSpec),
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Key { .. } => "key",
            ActionKind::MouseButton { .. } => "mouse_button",
            ActionKind::MouseWheel { .. } => "mouse_wheel",
            ActionKind::MouseAxis { .. } => "mouse_axis",
            ActionKind::MouseCenter(_) => "mouse_center",
            ActionKind::MouseWiggle(_) => "mouse_wiggle",
            ActionKind::FocusWindow(_) => "focus_window",
            ActionKind::MouseIncrement { .. } => "mouse_increment",
            ActionKind::SessionToggle(_) => "session_toggle",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutputAction {
    pub kind: ActionKind,
    /// Source text of the action, kept for logs
    pub value: String,
    pub mode: ActivationMode,
}

impl fmt::Display for OutputAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind.name(), self.value, self.mode)
    }
}

/// One logical input and the actions it drives, in order.
#[derive(Clone, Debug, PartialEq)]
pub struct BindingMap {
    pub input: InputBinding,
    pub outputs: Vec<OutputAction>,
}
