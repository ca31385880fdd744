//! TOML settings.
//!
//! Everything is read once at startup. Any error in here is fatal: the loop
//! never starts with a partially understood configuration.

use crate::binding::{
    parse_input, parse_mapping, parse_output, ActionKind, ActivationMode, BindingError,
    BindingMap, InputBinding, OutputAction, SessionToggleSpec, TargetSpace,
};
use crate::engine::{DetectorSettings, ExecutorSettings, MotionSettings, WiggleDefaults};
use crate::output::{MotionMode, Rect, WindowQuery};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, Level};

const CONFIG_DIR: &str = "joymouse";
const CONFIG_FILE: &str = "joymouse.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("No configuration directory available on this platform")]
    NoConfigDir,

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("No bindings configured: add [mappings] entries or a [toggle] binding")]
    NoBindings,

    #[error(transparent)]
    Binding(#[from] BindingError),
}

/// Area absolute cursor motion is clamped to.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClampSpace {
    /// `clamp_monitor`
    #[default]
    Monitor,
    Virtual,
    /// The `[toggle] focus` window
    Window,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    /// Global modifier binding, e.g. `dev:0:button:5`
    pub modifier: Option<String>,
    pub poll_hz: u32,
    /// Button and threshold edges are ignored this long after startup
    pub startup_grace_ms: u64,
    pub axis_deadzone: f32,
    /// Overrides `axis_deadzone` for mouse_x
    pub axis_deadzone_x: Option<f32>,
    /// Overrides `axis_deadzone` for mouse_y
    pub axis_deadzone_y: Option<f32>,
    pub axis_speed: f64,
    pub axis_mode: MotionMode,
    pub axis_hysteresis: f32,
    pub axis_invert_x: bool,
    pub axis_invert_y: bool,
    pub clamp_space: ClampSpace,
    pub clamp_monitor: usize,
    pub debug_inputs: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            modifier: None,
            poll_hz: 250,
            startup_grace_ms: 200,
            axis_deadzone: 0.05,
            axis_deadzone_x: None,
            axis_deadzone_y: None,
            axis_speed: 400.0,
            axis_mode: MotionMode::Relative,
            axis_hysteresis: 0.10,
            axis_invert_x: false,
            axis_invert_y: false,
            clamp_space: ClampSpace::Monitor,
            clamp_monitor: 0,
            debug_inputs: false,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ToggleConfig {
    pub binding: Option<String>,
    pub center: String,
    pub focus: Option<String>,
    pub restore_on_off: bool,
    pub repeat_ms: u64,
    pub debounce_ms: u64,
}

impl Default for ToggleConfig {
    fn default() -> Self {
        Self {
            binding: None,
            center: "CenterMouse:Virtual".to_string(),
            focus: None,
            restore_on_off: true,
            repeat_ms: 0,
            debounce_ms: 150,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct WiggleConfig {
    pub mode: MotionMode,
    pub amplitude_px: i32,
    pub period_ms: u64,
}

impl Default for WiggleConfig {
    fn default() -> Self {
        Self {
            mode: MotionMode::Relative,
            amplitude_px: 5,
            period_ms: 1000,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Win32 on Windows, rdev elsewhere
    #[default]
    Native,
    Rdev,
    DryRun,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub backend: Backend,
    pub tap_hold_ms: u64,
    pub key_repeat_ms: u64,
    /// Desktop size the dry-run backend simulates
    pub desktop: [i32; 2],
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Native,
            tap_hold_ms: 30,
            key_repeat_ms: 50,
            desktop: [1920, 1080],
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_buttons: bool,
    pub log_axes: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_buttons: false,
            log_axes: false,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct MappingsConfig {
    pub keys: Vec<String>,
    pub axes: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub input: InputConfig,
    pub toggle: ToggleConfig,
    pub wiggle: WiggleConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
    pub mappings: MappingsConfig,
}

impl Settings {
    /// `<config dir>/joymouse/joymouse.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    /// Reads, parses and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let input = &self.input;
        if !(1..=2000).contains(&input.poll_hz) {
            return Err(invalid("input.poll_hz", format!("{} is outside 1..=2000", input.poll_hz)));
        }
        let deadzones = [
            ("input.axis_deadzone", Some(input.axis_deadzone)),
            ("input.axis_deadzone_x", input.axis_deadzone_x),
            ("input.axis_deadzone_y", input.axis_deadzone_y),
        ];
        for (key, value) in deadzones {
            if let Some(value) = value.filter(|v| !in_unit_range(*v)) {
                return Err(invalid(key, format!("{} is outside [0, 1]", value)));
            }
        }
        if !in_unit_range(input.axis_hysteresis) {
            return Err(invalid(
                "input.axis_hysteresis",
                format!("{} is outside [0, 1]", input.axis_hysteresis),
            ));
        }
        if !input.axis_speed.is_finite() || input.axis_speed < 0.0 {
            return Err(invalid(
                "input.axis_speed",
                format!("{} must be a finite value >= 0", input.axis_speed),
            ));
        }
        self.clamp_target()?;
        if self.wiggle.period_ms == 0 {
            return Err(invalid("wiggle.period_ms", "must be > 0".to_string()));
        }
        if self.output.key_repeat_ms == 0 {
            return Err(invalid("output.key_repeat_ms", "must be > 0".to_string()));
        }
        let [width, height] = self.output.desktop;
        if width <= 0 || height <= 0 {
            return Err(invalid(
                "output.desktop",
                format!("{}x{} is not a usable size", width, height),
            ));
        }
        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<Level, ConfigError> {
        self.logging
            .level
            .parse()
            .map_err(|_| {
                invalid(
                    "logging.level",
                    format!("unknown level '{}'", self.logging.level),
                )
            })
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.input.poll_hz.max(1) as f64)
    }

    pub fn modifier_binding(&self) -> Result<Option<InputBinding>, ConfigError> {
        match &self.input.modifier {
            Some(expr) if !expr.trim().is_empty() => Ok(Some(parse_input(expr)?)),
            _ => Ok(None),
        }
    }

    /// Parses every mapping line plus the session toggle.
    pub fn binding_maps(&self) -> Result<Vec<BindingMap>, ConfigError> {
        let mut maps = Vec::new();
        for line in self.mappings.keys.iter().chain(self.mappings.axes.iter()) {
            if line.trim().is_empty() {
                continue;
            }
            maps.push(parse_mapping(line)?);
        }
        if let Some(toggle) = self.session_toggle()? {
            maps.push(toggle);
        }

        if maps.is_empty() {
            return Err(ConfigError::NoBindings);
        }
        info!("Parsed {} mapping(s)", maps.len());
        Ok(maps)
    }

    fn session_toggle(&self) -> Result<Option<BindingMap>, ConfigError> {
        let toggle = &self.toggle;
        let Some(expr) = toggle.binding.as_deref().filter(|b| !b.trim().is_empty()) else {
            return Ok(None);
        };

        let input = parse_input(expr)?;
        if input.is_continuous() {
            return Err(invalid(
                "toggle.binding",
                format!("'{}' needs a button or an axis with pos/neg/abs", expr),
            ));
        }

        let center = match parse_output(&toggle.center)?.kind {
            ActionKind::MouseCenter(target) => target,
            _ => {
                return Err(invalid(
                    "toggle.center",
                    format!("'{}' is not a CenterMouse action", toggle.center),
                ))
            }
        };
        let focus = self.toggle_focus()?;

        Ok(Some(BindingMap {
            input,
            outputs: vec![OutputAction {
                kind: ActionKind::SessionToggle(SessionToggleSpec {
                    center,
                    focus,
                    restore_on_off: toggle.restore_on_off,
                    repeat_ms: toggle.repeat_ms,
                    debounce_ms: toggle.debounce_ms,
                }),
                value: "session_toggle".to_string(),
                mode: ActivationMode::Toggle,
            }],
        }))
    }

    fn toggle_focus(&self) -> Result<Option<WindowQuery>, ConfigError> {
        match self.toggle.focus.as_deref().filter(|f| !f.trim().is_empty()) {
            None => Ok(None),
            Some(raw) => Ok(Some(focus_query(raw)?)),
        }
    }

    fn clamp_target(&self) -> Result<TargetSpace, ConfigError> {
        let space = match self.input.clamp_space {
            ClampSpace::Monitor => TargetSpace::Monitor(self.input.clamp_monitor),
            ClampSpace::Virtual => TargetSpace::Virtual,
            ClampSpace::Window => match self.toggle_focus()? {
                Some(query) => TargetSpace::Window(query),
                None => {
                    return Err(invalid(
                        "input.clamp_space",
                        "'window' needs [toggle] focus to name the window".to_string(),
                    ))
                }
            },
        };
        Ok(space)
    }

    pub fn detector_settings(&self) -> DetectorSettings {
        DetectorSettings {
            hysteresis: self.input.axis_hysteresis,
            startup_grace: Duration::from_millis(self.input.startup_grace_ms),
            log_buttons: self.logging.log_buttons,
        }
    }

    pub fn executor_settings(&self) -> Result<ExecutorSettings, ConfigError> {
        let input = &self.input;
        Ok(ExecutorSettings {
            tap_hold: Duration::from_millis(self.output.tap_hold_ms),
            key_repeat: Duration::from_millis(self.output.key_repeat_ms),
            motion: MotionSettings {
                deadzone_x: input.axis_deadzone_x.unwrap_or(input.axis_deadzone),
                deadzone_y: input.axis_deadzone_y.unwrap_or(input.axis_deadzone),
                speed: input.axis_speed,
                mode: input.axis_mode,
                invert_x: input.axis_invert_x,
                invert_y: input.axis_invert_y,
                tick: self.tick_period(),
                clamp: self.clamp_target()?,
            },
            wiggle: WiggleDefaults {
                mode: self.wiggle.mode,
                amplitude_px: self.wiggle.amplitude_px,
                period: Duration::from_millis(self.wiggle.period_ms),
            },
            debug_inputs: input.debug_inputs,
            log_axes: self.logging.log_axes,
        })
    }

    pub fn dry_run_desktop(&self) -> Rect {
        let [width, height] = self.output.desktop;
        Rect::new(0, 0, width, height)
    }
}

/// Accepts `FocusWindow:...` or a bare window title.
fn focus_query(raw: &str) -> Result<WindowQuery, ConfigError> {
    let expr = if raw.trim_start().to_ascii_lowercase().starts_with("focuswindow") {
        raw.to_string()
    } else {
        format!("FocusWindow:{}", raw)
    };
    match parse_output(&expr)?.kind {
        ActionKind::FocusWindow(query) => Ok(query),
        _ => Err(invalid("toggle.focus", format!("'{}' is not a window", raw))),
    }
}

fn invalid(key: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { key, reason }
}

fn in_unit_range(value: f32) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}
