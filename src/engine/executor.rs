//! Executor: turns detector events into output and owns every piece of state
//! that evolves over time (ramps, motion remainders, wiggle phase, toggle
//! repeat, the session toggle).
//!
//! State lives in a flat vector indexed by [`ActionId`]; a binding with three
//! outputs owns three independent slots. Discrete events go through
//! [`Executor::handle_event`], continuations through [`Executor::update`],
//! which the engine calls once per tick after all events are drained.

use super::detector::InputEvent;
use super::motion::{apply_deadzone, MotionAccumulator};
use super::ramp::{Ramp, RampTimer};
use crate::binding::{
    ActionId, ActionKind, ActivationMode, BindingTable, CenterTarget, OutputAction,
    SessionToggleSpec, TargetPoint, TargetSpace, WiggleSpec,
};
use crate::output::{
    KeyCombo, KeyName, MotionAxis, MotionMode, OutputError, OutputSink, Rect, WindowQuery,
};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq)]
pub struct MotionSettings {
    pub deadzone_x: f32,
    pub deadzone_y: f32,
    /// Pixels per second at full deflection
    pub speed: f64,
    pub mode: MotionMode,
    pub invert_x: bool,
    pub invert_y: bool,
    /// Tick period the analog integration assumes
    pub tick: Duration,
    /// Area absolute moves and wiggles are kept inside. Falls back to the
    /// virtual desktop when the monitor or window cannot be found.
    pub clamp: TargetSpace,
}

impl MotionSettings {
    fn deadzone(&self, axis: MotionAxis) -> f32 {
        match axis {
            MotionAxis::X => self.deadzone_x,
            MotionAxis::Y => self.deadzone_y,
        }
    }

    fn inverted(&self, axis: MotionAxis) -> bool {
        match axis {
            MotionAxis::X => self.invert_x,
            MotionAxis::Y => self.invert_y,
        }
    }
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            deadzone_x: 0.05,
            deadzone_y: 0.05,
            speed: 400.0,
            mode: MotionMode::Relative,
            invert_x: false,
            invert_y: false,
            tick: Duration::from_millis(4),
            clamp: TargetSpace::Monitor(0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WiggleDefaults {
    pub mode: MotionMode,
    pub amplitude_px: i32,
    pub period: Duration,
}

impl Default for WiggleDefaults {
    fn default() -> Self {
        Self {
            mode: MotionMode::Relative,
            amplitude_px: 5,
            period: Duration::from_millis(1000),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExecutorSettings {
    pub tap_hold: Duration,
    pub key_repeat: Duration,
    pub motion: MotionSettings,
    pub wiggle: WiggleDefaults,
    /// Log every executed action at info instead of debug
    pub debug_inputs: bool,
    pub log_axes: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            tap_hold: Duration::from_millis(30),
            key_repeat: Duration::from_millis(50),
            motion: MotionSettings::default(),
            wiggle: WiggleDefaults::default(),
            debug_inputs: false,
            log_axes: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct SessionState {
    active: bool,
    saved_cursor: Option<(i32, i32)>,
    last_press: Option<Instant>,
    next_repeat: Option<Instant>,
}

#[derive(Clone, Debug, Default)]
enum ActionState {
    #[default]
    Idle,
    KeyHeld,
    /// Toggled key. Autorepeat re-sends key-down like a physically held
    /// key; the single key-up comes when the toggle turns off.
    KeyRepeat {
        next: Instant,
    },
    ButtonHeld,
    Ramp(RampTimer),
    Motion(MotionAccumulator),
    Wiggle {
        next: Instant,
        phase: bool,
    },
    Session(SessionState),
}

impl ActionState {
    fn is_engaged(&self) -> bool {
        match self {
            ActionState::Idle | ActionState::Motion(_) => false,
            ActionState::Session(s) => s.active,
            _ => true,
        }
    }
}

#[derive(Debug)]
pub struct Executor {
    settings: ExecutorSettings,
    // indexed by ActionId
    states: Vec<ActionState>,
    // last absolute position this executor placed the cursor at
    cursor: Option<(i32, i32)>,
}

impl Executor {
    pub fn new(table: &BindingTable, settings: ExecutorSettings) -> Self {
        Self {
            settings,
            states: vec![ActionState::Idle; table.action_count()],
            cursor: None,
        }
    }

    /// Actions currently holding, repeating, ramping or otherwise engaged.
    pub fn engaged_count(&self) -> usize {
        self.states.iter().filter(|s| s.is_engaged()).count()
    }

    pub fn handle_event(
        &mut self,
        table: &BindingTable,
        event: InputEvent,
        now: Instant,
        sink: &mut dyn OutputSink,
    ) {
        let Some(entry) = table.get(event.binding()) else {
            warn!("Event for unknown binding {}", event.binding());
            return;
        };

        for (id, action) in entry.actions() {
            let mut state = self.take_state(id);
            match event {
                InputEvent::Digital { pressed, .. } => {
                    self.on_digital(action, &mut state, pressed, now, sink)
                }
                InputEvent::Analog { value, .. } => self.on_analog(action, &mut state, value, sink),
            }
            self.put_state(id, state);
        }
    }

    /// Advances every time-driven action to `now`.
    pub fn update(&mut self, table: &BindingTable, now: Instant, sink: &mut dyn OutputSink) {
        for entry in table.entries() {
            for (id, action) in entry.actions() {
                let mut state = self.take_state(id);
                self.advance(action, &mut state, now, sink);
                self.put_state(id, state);
            }
        }
    }

    /// Lets go of everything: held keys and buttons go up, toggled keys get
    /// their final up, ramps and wiggles stop, an active session toggle
    /// restores the cursor.
    pub fn release_all(&mut self, table: &BindingTable, sink: &mut dyn OutputSink) {
        for entry in table.entries() {
            for (id, action) in entry.actions() {
                let state = self.take_state(id);
                match (&action.kind, state) {
                    (
                        ActionKind::Key { combo },
                        ActionState::KeyHeld | ActionState::KeyRepeat { .. },
                    ) => {
                        info!("Releasing held key {}", combo);
                        report(action, sink.set_key(combo, false));
                    }
                    (ActionKind::MouseButton { button, .. }, ActionState::ButtonHeld) => {
                        info!("Releasing held {}", button);
                        report(action, sink.set_mouse_button(*button, false));
                    }
                    (ActionKind::SessionToggle(spec), ActionState::Session(s)) if s.active => {
                        if spec.restore_on_off {
                            if let Some((x, y)) = s.saved_cursor {
                                info!("Session toggle active at shutdown, restoring cursor");
                                report(action, sink.move_cursor_absolute(x, y));
                            }
                        }
                    }
                    (_, ActionState::Idle) => {}
                    (_, other) => debug!("Dropping state of {}: {:?}", action, other),
                }
            }
        }
    }

    fn take_state(&mut self, id: ActionId) -> ActionState {
        self.states
            .get_mut(id)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    fn put_state(&mut self, id: ActionId, state: ActionState) {
        if let Some(slot) = self.states.get_mut(id) {
            *slot = state;
        }
    }

    fn trace(&self, action: &OutputAction, what: &str) {
        if self.settings.debug_inputs {
            info!("{} -> {}", action, what);
        } else {
            debug!("{} -> {}", action, what);
        }
    }

    fn on_digital(
        &mut self,
        action: &OutputAction,
        state: &mut ActionState,
        pressed: bool,
        now: Instant,
        sink: &mut dyn OutputSink,
    ) {
        match &action.kind {
            ActionKind::Key { combo } => self.key(action, combo, state, pressed, now, sink),
            ActionKind::MouseButton { button, hold_ms } => match action.mode {
                ActivationMode::Single => {
                    if pressed {
                        self.trace(action, "click");
                        report(
                            action,
                            sink.click_mouse_button(*button, Duration::from_millis(*hold_ms)),
                        );
                    }
                }
                ActivationMode::Hold => {
                    let held = matches!(state, ActionState::ButtonHeld);
                    if pressed != held {
                        self.trace(action, if pressed { "down" } else { "up" });
                        report(action, sink.set_mouse_button(*button, pressed));
                        *state = if pressed {
                            ActionState::ButtonHeld
                        } else {
                            ActionState::Idle
                        };
                    }
                }
                ActivationMode::Toggle => {
                    if pressed {
                        let latch = !matches!(state, ActionState::ButtonHeld);
                        self.trace(action, if latch { "latch down" } else { "latch up" });
                        report(action, sink.set_mouse_button(*button, latch));
                        *state = if latch {
                            ActionState::ButtonHeld
                        } else {
                            ActionState::Idle
                        };
                    }
                }
            },
            ActionKind::MouseWheel { direction, ramp } => {
                let engage = match action.mode {
                    ActivationMode::Single => {
                        if pressed {
                            self.trace(action, "scroll");
                            report(action, sink.scroll(*direction));
                        }
                        return;
                    }
                    ActivationMode::Hold => pressed,
                    ActivationMode::Toggle => {
                        if !pressed {
                            return;
                        }
                        !matches!(state, ActionState::Ramp(_))
                    }
                };
                if engage {
                    // first notch right away, the ramp takes over from here
                    self.trace(action, "scroll (ramp start)");
                    report(action, sink.scroll(*direction));
                    *state = ActionState::Ramp(RampTimer::start(Ramp::from_spec(ramp), now));
                } else {
                    self.trace(action, "ramp stop");
                    *state = ActionState::Idle;
                }
            }
            ActionKind::MouseIncrement {
                axis,
                amount,
                mode,
                ramp,
            } => match action.mode {
                ActivationMode::Single => {
                    if pressed {
                        self.step(action, *axis, *amount, *mode, sink);
                    }
                }
                ActivationMode::Hold | ActivationMode::Toggle => {
                    let engage = if action.mode == ActivationMode::Hold {
                        pressed
                    } else if pressed {
                        !matches!(state, ActionState::Ramp(_))
                    } else {
                        return;
                    };
                    *state = if engage {
                        self.trace(action, "ramp start");
                        ActionState::Ramp(RampTimer::start(Ramp::from_spec(ramp), now))
                    } else {
                        self.trace(action, "ramp stop");
                        ActionState::Idle
                    };
                }
            },
            ActionKind::MouseAxis { .. } => {
                debug!("{} ignores digital input", action);
            }
            ActionKind::MouseCenter(target) => {
                if pressed {
                    self.center(action, target, sink);
                }
            }
            ActionKind::MouseWiggle(spec) => {
                if pressed {
                    self.toggle_wiggle(action, spec, state, now);
                }
            }
            ActionKind::FocusWindow(query) => {
                if pressed {
                    self.focus(action, query, sink);
                }
            }
            ActionKind::SessionToggle(spec) => {
                if pressed {
                    self.session_press(action, spec, state, now, sink);
                }
            }
        }
    }

    fn key(
        &mut self,
        action: &OutputAction,
        combo: &KeyCombo,
        state: &mut ActionState,
        pressed: bool,
        now: Instant,
        sink: &mut dyn OutputSink,
    ) {
        match action.mode {
            ActivationMode::Single => {
                if pressed {
                    self.trace(action, "tap");
                    report(action, sink.tap_key(combo, self.settings.tap_hold));
                }
            }
            ActivationMode::Hold => {
                let held = matches!(state, ActionState::KeyHeld);
                if pressed != held {
                    self.trace(action, if pressed { "down" } else { "up" });
                    report(action, sink.set_key(combo, pressed));
                    *state = if pressed {
                        ActionState::KeyHeld
                    } else {
                        ActionState::Idle
                    };
                }
            }
            ActivationMode::Toggle => {
                if !pressed {
                    return;
                }
                if matches!(state, ActionState::KeyRepeat { .. }) {
                    info!("Key toggle {} OFF", combo);
                    report(action, sink.set_key(combo, false));
                    *state = ActionState::Idle;
                } else {
                    info!("Key toggle {} ON", combo);
                    report(action, sink.set_key(combo, true));
                    *state = ActionState::KeyRepeat {
                        next: now + self.settings.key_repeat,
                    };
                }
            }
        }
    }

    fn on_analog(
        &mut self,
        action: &OutputAction,
        state: &mut ActionState,
        value: f32,
        sink: &mut dyn OutputSink,
    ) {
        let ActionKind::MouseAxis { axis } = action.kind else {
            debug!("{} ignores analog input", action);
            return;
        };

        let motion = &self.settings.motion;
        let value = if motion.inverted(axis) { -value } else { value };
        let value = apply_deadzone(value, motion.deadzone(axis));
        let (speed, tick, mode) = (motion.speed, motion.tick, motion.mode);

        let mut accumulator = match state {
            ActionState::Motion(acc) => *acc,
            _ => MotionAccumulator::default(),
        };
        if value == 0.0 {
            accumulator.reset();
            *state = ActionState::Motion(accumulator);
            return;
        }

        let step = accumulator.advance(value as f64 * speed, tick.as_secs_f64());
        *state = ActionState::Motion(accumulator);
        if step == 0 {
            return;
        }

        if self.settings.log_axes {
            info!("{} value={:.3} step={}", action, value, step);
        }
        let (dx, dy) = axis.delta(step);
        self.move_by(action, mode, dx, dy, sink);
    }

    fn advance(
        &mut self,
        action: &OutputAction,
        state: &mut ActionState,
        now: Instant,
        sink: &mut dyn OutputSink,
    ) {
        match state {
            ActionState::KeyRepeat { next } => {
                if now >= *next {
                    if let ActionKind::Key { combo } = &action.kind {
                        debug!("{} repeat", action);
                        report(action, sink.set_key(combo, true));
                    }
                    *next = now + self.settings.key_repeat;
                }
            }
            ActionState::Ramp(timer) => {
                let ticks = timer.due_ticks(now);
                if ticks > 0 {
                    debug!(
                        "{} ramp: {} tick(s) at {:.1}/s",
                        action,
                        ticks,
                        timer.current_rate(now)
                    );
                }
                for _ in 0..ticks {
                    match &action.kind {
                        ActionKind::MouseWheel { direction, .. } => {
                            report(action, sink.scroll(*direction))
                        }
                        ActionKind::MouseIncrement {
                            axis, amount, mode, ..
                        } => self.step(action, *axis, *amount, *mode, sink),
                        _ => {}
                    }
                }
            }
            ActionState::Wiggle { next, phase } => {
                if now >= *next {
                    let spec = match &action.kind {
                        ActionKind::MouseWiggle(spec) => *spec,
                        _ => WiggleSpec::default(),
                    };
                    let (mode, amplitude, period) = self.wiggle_params(&spec);
                    let offset = if *phase { -amplitude } else { amplitude };
                    debug!("{} wiggle {:+}", action, offset);
                    match mode {
                        MotionMode::Relative => {
                            report(action, sink.move_cursor_relative(offset, 0))
                        }
                        MotionMode::Absolute => {
                            let (x, y) = self.current_cursor(sink);
                            let (x, y) = self.clamp_rect(sink).clamp_point(x + offset, y);
                            report(action, sink.move_cursor_absolute(x, y));
                            self.cursor = Some((x, y));
                        }
                    }
                    *phase = !*phase;
                    *next = now + period;
                }
            }
            ActionState::Session(session) => {
                if let (ActionKind::SessionToggle(spec), Some(due)) =
                    (&action.kind, session.next_repeat)
                {
                    if session.active && now >= due {
                        debug!("Session toggle repeat");
                        self.center(action, &spec.center, sink);
                        session.next_repeat = Some(now + Duration::from_millis(spec.repeat_ms));
                    }
                }
            }
            ActionState::Idle
            | ActionState::KeyHeld
            | ActionState::ButtonHeld
            | ActionState::Motion(_) => {}
        }
    }

    fn wiggle_params(&self, spec: &WiggleSpec) -> (MotionMode, i32, Duration) {
        let defaults = self.settings.wiggle;
        (
            spec.mode.unwrap_or(defaults.mode),
            spec.amplitude_px.unwrap_or(defaults.amplitude_px),
            spec.period_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.period),
        )
    }

    fn toggle_wiggle(
        &mut self,
        action: &OutputAction,
        spec: &WiggleSpec,
        state: &mut ActionState,
        now: Instant,
    ) {
        if matches!(state, ActionState::Wiggle { .. }) {
            info!("Wiggle OFF ({})", action);
            *state = ActionState::Idle;
        } else {
            let (mode, amplitude, period) = self.wiggle_params(spec);
            info!(
                "Wiggle ON ({:?}, {} px every {} ms)",
                mode,
                amplitude,
                period.as_millis()
            );
            // first nudge on the next update
            *state = ActionState::Wiggle {
                next: now,
                phase: false,
            };
        }
    }

    fn current_cursor(&self, sink: &dyn OutputSink) -> (i32, i32) {
        sink.cursor_position()
            .or(self.cursor)
            .unwrap_or_else(|| sink.virtual_desktop_rect().center())
    }

    fn clamp_rect(&self, sink: &dyn OutputSink) -> Rect {
        let rect = match &self.settings.motion.clamp {
            TargetSpace::Virtual => None,
            TargetSpace::Monitor(index) => sink.monitor_rect(*index),
            TargetSpace::Window(query) => {
                sink.find_window(query).and_then(|handle| sink.window_rect(handle))
            }
        };
        rect.unwrap_or_else(|| sink.virtual_desktop_rect())
    }

    fn move_by(
        &mut self,
        action: &OutputAction,
        mode: MotionMode,
        dx: i32,
        dy: i32,
        sink: &mut dyn OutputSink,
    ) {
        match mode {
            MotionMode::Relative => report(action, sink.move_cursor_relative(dx, dy)),
            MotionMode::Absolute => {
                let (x, y) = self.current_cursor(sink);
                let (x, y) = self.clamp_rect(sink).clamp_point(x + dx, y + dy);
                report(action, sink.move_cursor_absolute(x, y));
                self.cursor = Some((x, y));
            }
        }
    }

    fn step(
        &mut self,
        action: &OutputAction,
        axis: MotionAxis,
        amount: i32,
        mode: MotionMode,
        sink: &mut dyn OutputSink,
    ) {
        let (dx, dy) = axis.delta(amount);
        self.move_by(action, mode, dx, dy, sink);
    }

    fn resolve_space(&self, space: &TargetSpace, sink: &dyn OutputSink) -> Option<Rect> {
        match space {
            TargetSpace::Virtual => Some(sink.virtual_desktop_rect()),
            TargetSpace::Monitor(index) => {
                let rect = sink.monitor_rect(*index);
                if rect.is_none() {
                    warn!("Monitor {} not found", index);
                }
                rect
            }
            TargetSpace::Window(query) => {
                let rect = sink
                    .find_window(query)
                    .and_then(|handle| sink.window_rect(handle));
                if rect.is_none() {
                    warn!("Window {} not found", query);
                }
                rect
            }
        }
    }

    fn center(&mut self, action: &OutputAction, target: &CenterTarget, sink: &mut dyn OutputSink) {
        let Some(rect) = self.resolve_space(&target.space, sink) else {
            return;
        };
        let (x, y) = match target.point_or_center() {
            TargetPoint::Fraction(fx, fy) => rect.point_at_fraction(fx, fy),
            TargetPoint::Pixels(px, py) => rect.point_at_offset(px, py),
        };
        self.trace(action, "center");
        report(action, sink.move_cursor_absolute(x, y));
        self.cursor = Some((x, y));
    }

    /// Restores and raises a window. Returns whether it ended up in front.
    fn focus(
        &mut self,
        action: &OutputAction,
        query: &WindowQuery,
        sink: &mut dyn OutputSink,
    ) -> bool {
        let Some(handle) = sink.find_window(query) else {
            warn!("Window {} not found, cannot focus", query);
            return false;
        };
        self.trace(action, "focus");
        report(action, sink.restore_window(handle));

        match sink.set_foreground(handle) {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => {
                warn!("Focusing {} failed: {}", query, e);
                return false;
            }
        }

        // foreground lock: a synthetic Alt tap makes us the last input source
        debug!("Foreground request for {} refused, retrying after Alt tap", query);
        let alt = KeyCombo::single(KeyName::Alt);
        report(action, sink.set_key(&alt, true));
        report(action, sink.set_key(&alt, false));
        match sink.set_foreground(handle) {
            Ok(true) => true,
            Ok(false) => {
                warn!("Window {} refused foreground twice", query);
                false
            }
            Err(e) => {
                warn!("Focusing {} failed: {}", query, e);
                false
            }
        }
    }

    fn session_press(
        &mut self,
        action: &OutputAction,
        spec: &SessionToggleSpec,
        state: &mut ActionState,
        now: Instant,
        sink: &mut dyn OutputSink,
    ) {
        let mut session = match state {
            ActionState::Session(s) => *s,
            _ => SessionState::default(),
        };

        if let Some(last) = session.last_press {
            if now.saturating_duration_since(last) < Duration::from_millis(spec.debounce_ms) {
                debug!("Session toggle press debounced");
                return;
            }
        }
        session.last_press = Some(now);

        if session.active {
            if spec.restore_on_off {
                if let Some((x, y)) = session.saved_cursor.take() {
                    report(action, sink.move_cursor_absolute(x, y));
                    self.cursor = Some((x, y));
                }
            }
            session.active = false;
            session.next_repeat = None;
            info!("Session toggle INACTIVE (restore)");
        } else {
            session.saved_cursor = sink.cursor_position().or(self.cursor);
            if let Some(query) = &spec.focus {
                self.focus(action, query, sink);
            }
            self.center(action, &spec.center, sink);
            session.active = true;
            session.next_repeat =
                (spec.repeat_ms > 0).then(|| now + Duration::from_millis(spec.repeat_ms));
            info!("Session toggle ACTIVE (recenter)");
        }

        *state = ActionState::Session(session);
    }
}

fn report(action: &OutputAction, result: Result<(), OutputError>) {
    if let Err(e) = result {
        warn!("{} failed: {}", action, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{parse_mapping, BindingMap, DeviceSelector, InputBinding};
    use crate::device::{DeviceRegistry, InputSource, MemorySource};
    use crate::output::{DryRunSink, MouseButton, ScrollDirection, SinkCall};

    const DESKTOP: Rect = Rect::new(0, 0, 1920, 1080);

    struct Rig {
        table: BindingTable,
        executor: Executor,
        sink: DryRunSink,
        start: Instant,
    }

    impl Rig {
        fn from_maps(maps: Vec<BindingMap>, settings: ExecutorSettings) -> Self {
            let source = MemorySource::new();
            source.add_device("030000005e040000", 16, 6);
            let registry = DeviceRegistry::new(source.devices());
            let table = BindingTable::build(maps, &registry);
            let executor = Executor::new(&table, settings);
            Self {
                table,
                executor,
                sink: DryRunSink::new(DESKTOP),
                start: Instant::now(),
            }
        }

        fn new(lines: &[&str]) -> Self {
            Self::from_maps(
                lines.iter().map(|l| parse_mapping(l).unwrap()).collect(),
                ExecutorSettings::default(),
            )
        }

        fn at(&self, ms: u64) -> Instant {
            self.start + Duration::from_millis(ms)
        }

        fn digital(&mut self, binding: usize, pressed: bool, ms: u64) {
            let now = self.at(ms);
            self.executor.handle_event(
                &self.table,
                InputEvent::Digital { binding, pressed },
                now,
                &mut self.sink,
            );
        }

        fn analog(&mut self, binding: usize, value: f32) {
            let now = self.at(0);
            self.executor.handle_event(
                &self.table,
                InputEvent::Analog { binding, value },
                now,
                &mut self.sink,
            );
        }

        fn update(&mut self, ms: u64) {
            let now = self.at(ms);
            self.executor.update(&self.table, now, &mut self.sink);
        }

        fn calls(&mut self) -> Vec<SinkCall> {
            self.sink.take_calls()
        }
    }

    fn key(combo: &str, down: bool) -> SinkCall {
        SinkCall::Key {
            combo: combo.to_string(),
            down,
        }
    }

    #[test]
    fn test_key_single_taps_on_press_only() {
        let mut rig = Rig::new(&["dev:0:button:1 => F1"]);
        rig.digital(0, true, 0);
        rig.digital(0, false, 10);
        assert_eq!(
            rig.calls(),
            vec![SinkCall::TapKey {
                combo: "F1".to_string(),
                hold_ms: 30
            }]
        );
    }

    #[test]
    fn test_key_hold() {
        let mut rig = Rig::new(&["dev:0:button:1 => Ctrl+F2:hold"]);
        rig.digital(0, true, 0);
        rig.digital(0, false, 500);
        assert_eq!(rig.calls(), vec![key("Ctrl+F2", true), key("Ctrl+F2", false)]);
    }

    #[test]
    fn test_key_toggle_repeats_until_toggled_off() {
        let mut rig = Rig::new(&["dev:0:button:1 => F3:toggle"]);
        rig.digital(0, true, 0);
        rig.digital(0, false, 20);
        assert_eq!(rig.calls(), vec![key("F3", true)]);

        rig.update(40);
        assert!(rig.calls().is_empty());
        rig.update(50);
        rig.update(100);
        assert_eq!(rig.calls(), vec![key("F3", true), key("F3", true)]);
        assert_eq!(rig.executor.engaged_count(), 1);

        rig.digital(0, true, 120);
        assert_eq!(rig.calls(), vec![key("F3", false)]);
        rig.update(500);
        assert!(rig.calls().is_empty());
        assert_eq!(rig.executor.engaged_count(), 0);
    }

    #[test]
    fn test_mouse_button_modes() {
        let mut rig = Rig::new(&[
            "dev:0:button:1 => MB1:80",
            "dev:0:button:2 => MB2:hold",
            "dev:0:button:3 => MB3:toggle",
        ]);
        rig.digital(0, true, 0);
        rig.digital(1, true, 0);
        rig.digital(1, false, 100);
        rig.digital(2, true, 200);
        rig.digital(2, false, 250);
        rig.digital(2, true, 300);
        assert_eq!(
            rig.calls(),
            vec![
                SinkCall::Click {
                    button: MouseButton::Left,
                    hold_ms: 80
                },
                SinkCall::MouseButton {
                    button: MouseButton::Right,
                    down: true
                },
                SinkCall::MouseButton {
                    button: MouseButton::Right,
                    down: false
                },
                SinkCall::MouseButton {
                    button: MouseButton::Middle,
                    down: true
                },
                SinkCall::MouseButton {
                    button: MouseButton::Middle,
                    down: false
                },
            ]
        );
    }

    #[test]
    fn test_wheel_ramp_resets_on_release() {
        let mut rig = Rig::new(&["dev:0:axis:2:pos:0.5 => WheelDown:5:30:1000:hold"]);
        let down = SinkCall::Scroll(ScrollDirection::Down);

        rig.digital(0, true, 0);
        assert_eq!(rig.calls(), vec![down.clone()]);
        rig.update(100);
        assert!(rig.calls().is_empty());
        rig.update(200);
        assert_eq!(rig.calls(), vec![down.clone()]);

        rig.digital(0, false, 250);
        rig.update(2000);
        assert!(rig.calls().is_empty());

        // a new press starts from the initial rate again
        rig.digital(0, true, 3000);
        rig.update(3100);
        assert_eq!(rig.calls(), vec![down]);
    }

    #[test]
    fn test_increment_steps_with_ramp() {
        let mut rig = Rig::new(&["dev:0:button:4 => MouseInc:x:relative:hold:5:30:1000"]);
        rig.digital(0, true, 0);
        assert!(rig.calls().is_empty());
        rig.update(200);
        assert_eq!(rig.calls(), vec![SinkCall::MoveRelative(1, 0)]);
        rig.digital(0, false, 250);
        rig.update(1000);
        assert!(rig.calls().is_empty());
    }

    #[test]
    fn test_analog_motion_relative_and_deadzone() {
        let settings = ExecutorSettings {
            motion: MotionSettings {
                speed: 250.0,
                tick: Duration::from_millis(4),
                ..MotionSettings::default()
            },
            ..ExecutorSettings::default()
        };
        let maps = vec![
            parse_mapping("dev:0:axis:0 => mouse_x").unwrap(),
            parse_mapping("dev:0:axis:1 => mouse_y").unwrap(),
        ];
        let mut rig = Rig::from_maps(maps, settings);

        rig.analog(0, 1.0);
        rig.analog(1, -0.5);
        rig.analog(1, -0.5);
        rig.analog(0, 0.01);
        assert_eq!(
            rig.calls(),
            vec![SinkCall::MoveRelative(1, 0), SinkCall::MoveRelative(0, -1)]
        );
    }

    #[test]
    fn test_analog_motion_absolute_is_clamped() {
        let settings = ExecutorSettings {
            motion: MotionSettings {
                speed: 10_000.0,
                tick: Duration::from_millis(100),
                mode: MotionMode::Absolute,
                invert_x: true,
                ..MotionSettings::default()
            },
            ..ExecutorSettings::default()
        };
        let maps = vec![parse_mapping("dev:0:axis:0 => mouse_x").unwrap()];
        let mut rig = Rig::from_maps(maps, settings);

        // inverted: pushing right moves left, 1000 px per tick
        rig.analog(0, 1.0);
        assert_eq!(rig.calls(), vec![SinkCall::MoveAbsolute(0, 540)]);
    }

    #[test]
    fn test_deadzone_is_per_axis() {
        let settings = ExecutorSettings {
            motion: MotionSettings {
                deadzone_x: 0.5,
                deadzone_y: 0.0,
                speed: 1000.0,
                tick: Duration::from_millis(4),
                ..MotionSettings::default()
            },
            ..ExecutorSettings::default()
        };
        let maps = vec![
            parse_mapping("dev:0:axis:0 => mouse_x").unwrap(),
            parse_mapping("dev:0:axis:1 => mouse_y").unwrap(),
        ];
        let mut rig = Rig::from_maps(maps, settings);

        rig.analog(0, 0.3);
        rig.analog(1, 0.3);
        assert_eq!(rig.calls(), vec![SinkCall::MoveRelative(0, 1)]);
    }

    #[test]
    fn test_absolute_motion_stays_in_clamp_space() {
        let monitors = vec![Rect::new(0, 0, 1920, 1080), Rect::new(1920, 0, 1280, 720)];
        let absolute = |clamp: TargetSpace| ExecutorSettings {
            motion: MotionSettings {
                speed: 10_000.0,
                tick: Duration::from_millis(100),
                mode: MotionMode::Absolute,
                clamp,
                ..MotionSettings::default()
            },
            ..ExecutorSettings::default()
        };
        let lines = ["dev:0:axis:0 => mouse_x", "dev:0:axis:1 => mouse_y"];
        let maps = || lines.iter().map(|l| parse_mapping(l).unwrap()).collect();

        let mut rig = Rig::from_maps(maps(), absolute(TargetSpace::Monitor(1)));
        rig.sink = DryRunSink::new(Rect::new(0, 0, 3200, 1080)).with_monitors(monitors.clone());
        rig.sink.move_cursor_absolute(2000, 100).unwrap();
        rig.calls();
        rig.analog(0, -1.0);
        rig.analog(1, 1.0);
        assert_eq!(
            rig.calls(),
            vec![SinkCall::MoveAbsolute(1920, 100), SinkCall::MoveAbsolute(1920, 719)]
        );

        // unknown window: the whole desktop is the limit
        let missing = TargetSpace::Window(WindowQuery::Title("Nowhere".to_string()));
        let mut rig = Rig::from_maps(maps(), absolute(missing));
        rig.sink = DryRunSink::new(Rect::new(0, 0, 3200, 1080)).with_monitors(monitors);
        rig.sink.move_cursor_absolute(2000, 100).unwrap();
        rig.calls();
        rig.analog(0, 1.0);
        assert_eq!(rig.calls(), vec![SinkCall::MoveAbsolute(3000, 100)]);
    }

    #[test]
    fn test_center_targets() {
        let mut rig = Rig::new(&[
            "dev:0:button:1 => CenterMouse",
            "dev:0:button:2 => CenterMouse:Monitor:1:[0.5,0.5]",
            "dev:0:button:3 => CenterMouse:WindowName:Sim:[100,50]",
            "dev:0:button:4 => CenterMouse:Monitor:5",
        ]);
        rig.sink = DryRunSink::new(Rect::new(0, 0, 3840, 1080))
            .with_monitors(vec![Rect::new(0, 0, 1920, 1080), Rect::new(1920, 0, 1920, 1080)])
            .with_window(
                WindowQuery::Title("Sim".to_string()),
                Rect::new(200, 100, 800, 600),
            );

        for binding in 0..4 {
            rig.digital(binding, true, 0);
        }
        assert_eq!(
            rig.calls(),
            vec![
                SinkCall::MoveAbsolute(1920, 540),
                SinkCall::MoveAbsolute(2880, 540),
                SinkCall::MoveAbsolute(300, 150),
            ]
        );
    }

    #[test]
    fn test_wiggle_alternates_and_stops() {
        let mut rig = Rig::new(&["dev:0:button:1 => WiggleMouse:relative:3:500"]);
        rig.digital(0, true, 0);
        rig.update(0);
        rig.update(400);
        rig.update(500);
        rig.update(1000);
        assert_eq!(
            rig.calls(),
            vec![
                SinkCall::MoveRelative(3, 0),
                SinkCall::MoveRelative(-3, 0),
                SinkCall::MoveRelative(3, 0),
            ]
        );

        rig.digital(0, true, 1100);
        rig.update(5000);
        assert!(rig.calls().is_empty());
    }

    #[test]
    fn test_absolute_wiggle_is_clamped() {
        let mut rig = Rig::new(&["dev:0:button:1 => WiggleMouse:absolute:4:500"]);
        rig.sink.move_cursor_absolute(1918, 10).unwrap();
        rig.calls();

        rig.digital(0, true, 0);
        rig.update(0);
        rig.update(500);
        rig.update(1000);
        assert_eq!(
            rig.calls(),
            vec![
                SinkCall::MoveAbsolute(1919, 10),
                SinkCall::MoveAbsolute(1915, 10),
                SinkCall::MoveAbsolute(1919, 10),
            ]
        );
    }

    #[test]
    fn test_focus_falls_back_to_alt_tap() {
        let mut rig = Rig::new(&["dev:0:button:1 => FocusWindow:WindowClass:SimWnd"]);
        rig.sink = DryRunSink::new(DESKTOP)
            .with_window(
                WindowQuery::Class("SimWnd".to_string()),
                Rect::new(0, 0, 800, 600),
            )
            .refusing_foreground(1);
        rig.digital(0, true, 0);

        let handle = crate::output::WindowHandle(1);
        assert_eq!(
            rig.calls(),
            vec![
                SinkCall::RestoreWindow(handle),
                SinkCall::SetForeground(handle),
                key("Alt", true),
                key("Alt", false),
                SinkCall::SetForeground(handle),
            ]
        );
    }

    #[test]
    fn test_missing_window_is_a_no_op() {
        let mut rig = Rig::new(&["dev:0:button:1 => FocusWindow:Nowhere"]);
        rig.digital(0, true, 0);
        assert!(rig.calls().is_empty());
    }

    fn session_map(debounce_ms: u64, repeat_ms: u64) -> BindingMap {
        BindingMap {
            input: InputBinding::button(DeviceSelector::Index(0), 11),
            outputs: vec![OutputAction {
                kind: ActionKind::SessionToggle(SessionToggleSpec {
                    center: CenterTarget {
                        space: TargetSpace::Virtual,
                        point: None,
                    },
                    focus: None,
                    restore_on_off: true,
                    repeat_ms,
                    debounce_ms,
                }),
                value: "toggle".to_string(),
                mode: ActivationMode::Toggle,
            }],
        }
    }

    #[test]
    fn test_session_toggle_recenters_then_restores() {
        let mut rig = Rig::from_maps(vec![session_map(150, 0)], ExecutorSettings::default());
        rig.sink.move_cursor_absolute(100, 200).unwrap();
        rig.calls();

        rig.digital(0, true, 0);
        rig.digital(0, false, 50);
        assert_eq!(rig.calls(), vec![SinkCall::MoveAbsolute(960, 540)]);
        assert_eq!(rig.executor.engaged_count(), 1);

        rig.digital(0, true, 1000);
        assert_eq!(rig.calls(), vec![SinkCall::MoveAbsolute(100, 200)]);
        assert_eq!(rig.executor.engaged_count(), 0);

        // no third state: the next press recenters again
        rig.digital(0, true, 2000);
        assert_eq!(rig.calls(), vec![SinkCall::MoveAbsolute(960, 540)]);
    }

    #[test]
    fn test_session_toggle_debounce_and_repeat() {
        let mut rig = Rig::from_maps(vec![session_map(150, 1000)], ExecutorSettings::default());
        rig.digital(0, true, 0);
        rig.digital(0, true, 100);
        assert_eq!(rig.calls(), vec![SinkCall::MoveAbsolute(960, 540)]);

        rig.update(999);
        assert!(rig.calls().is_empty());
        rig.update(1000);
        assert_eq!(rig.calls(), vec![SinkCall::MoveAbsolute(960, 540)]);
    }

    #[test]
    fn test_release_all_lets_go_of_held_output() {
        let mut rig = Rig::new(&[
            "dev:0:button:1 => Shift:hold",
            "dev:0:button:2 => MB1:toggle",
            "dev:0:button:3 => WheelUp:hold",
        ]);
        rig.digital(0, true, 0);
        rig.digital(1, true, 0);
        rig.digital(2, true, 0);
        rig.calls();

        rig.executor.release_all(&rig.table, &mut rig.sink);
        assert_eq!(
            rig.calls(),
            vec![
                key("Shift", false),
                SinkCall::MouseButton {
                    button: MouseButton::Left,
                    down: false
                },
            ]
        );
        assert_eq!(rig.executor.engaged_count(), 0);
    }

    #[test]
    fn test_release_all_ends_key_toggle() {
        let mut rig = Rig::new(&["dev:0:button:1 => F3:toggle"]);
        rig.digital(0, true, 0);
        rig.update(50);
        assert_eq!(rig.calls(), vec![key("F3", true), key("F3", true)]);

        rig.executor.release_all(&rig.table, &mut rig.sink);
        assert_eq!(rig.calls(), vec![key("F3", false)]);
        rig.update(500);
        assert!(rig.calls().is_empty());
    }
}
