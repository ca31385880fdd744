//! Parser für die Binding-Ausdruckssprache.
//!
//! Inputs:
//!
//! ```text
//! dev:<index|guid>:button:<n>[:M]              n is 1-based
//! dev:<index|guid>:axis:<n>[:M]                continuous
//! dev:<index|guid>:axis:<n>:<pos|neg|abs>[:<threshold>][:M]
//! ```
//!
//! The modifier marker may also be glued to the last token (`button:3M`).
//!
//! Outputs:
//!
//! ```text
//! Ctrl+Shift+F5[:single|hold|toggle]
//! MB<n>[:hold_ms][:mode]
//! Wheel<Up|Down|Left|Right>[:init:max:ramp_ms][:mode]
//! mouse_x | mouse_y
//! CenterMouse[:Virtual|Monitor|WindowClass|WindowName][:target][:[x,y]]
//! WiggleMouse[:relative|absolute][:amplitude_px][:period_ms]
//! FocusWindow[:WindowClass|WindowName]:<target>
//! MouseInc|MouseDec:<x|y>:<relative|absolute>:hold:<init>:<max>:<ramp_ms>
//! ```

use super::error::BindingError;
use super::model::{
    ActionKind, ActivationMode, AxisMode, BindingMap, CenterTarget, DeviceSelector, InputBinding,
    OutputAction, RampSpec, TargetPoint, TargetSpace, Threshold, WiggleSpec, MAX_RAMP_MS,
    MAX_RAMP_RATE,
};
use crate::output::{KeyCombo, MotionAxis, MotionMode, MouseButton, ScrollDirection, WindowQuery};

/// Hold time of a mouse click when none is given.
pub const DEFAULT_CLICK_HOLD_MS: u64 = 30;

/// Parses one `input => output` mapping line.
pub fn parse_mapping(line: &str) -> Result<BindingMap, BindingError> {
    let (lhs, rhs) = line
        .split_once("=>")
        .ok_or_else(|| BindingError::MissingSeparator(line.trim().to_string()))?;

    let input = parse_input(lhs)?;
    let output = parse_output(rhs)?;
    check_compatible(&input, &output)?;

    Ok(BindingMap {
        input,
        outputs: vec![output],
    })
}

/// Continuous axes only drive cursor motion, and cursor motion needs a
/// continuous axis.
pub fn check_compatible(input: &InputBinding, output: &OutputAction) -> Result<(), BindingError> {
    let is_motion = matches!(output.kind, ActionKind::MouseAxis { .. });
    let reason = match (input.is_continuous(), is_motion) {
        (true, false) => "continuous axes can only drive mouse_x / mouse_y",
        (false, true) => "mouse_x / mouse_y need an axis without a pos/neg/abs mode",
        _ => return Ok(()),
    };
    Err(BindingError::Incompatible {
        input: input.to_string(),
        output: output.value.clone(),
        reason: reason.to_string(),
    })
}

pub fn parse_input(expr: &str) -> Result<InputBinding, BindingError> {
    let expr = expr.trim();
    let mut parts: Vec<&str> = expr.split(':').map(str::trim).collect();
    let mut modifier_layer = false;

    // Modifier-Marker: eigenes Token oder Suffix am letzten Token
    if let Some(last) = parts.last().copied() {
        if last.eq_ignore_ascii_case("m") {
            modifier_layer = true;
            parts.pop();
        } else if let Some(stripped) = last
            .strip_suffix('M')
            .or_else(|| last.strip_suffix('m'))
        {
            if !stripped.is_empty() && stripped.parse::<f32>().is_ok() {
                modifier_layer = true;
                if let Some(slot) = parts.last_mut() {
                    *slot = stripped;
                }
            }
        }
    }

    if parts.len() < 4 {
        return Err(BindingError::input(
            expr,
            "expected dev:<device>:<button|axis>:<n>",
        ));
    }
    if !parts[0].eq_ignore_ascii_case("dev") {
        return Err(BindingError::input(expr, "binding must start with 'dev:'"));
    }

    let selector = parse_device(expr, parts[1])?;
    let kind = parts[2].to_ascii_lowercase();

    let binding = match kind.as_str() {
        "button" => {
            if parts.len() > 4 {
                return Err(BindingError::input(expr, "unexpected tokens after button number"));
            }
            let number: u32 = parts[3].parse().map_err(|_| {
                BindingError::input(expr, format!("bad button number '{}'", parts[3]))
            })?;
            if number == 0 {
                return Err(BindingError::input(
                    expr,
                    "button numbers are 1-based (got 0)",
                ));
            }
            InputBinding::button(selector, number - 1)
        }
        "axis" => {
            let axis: u32 = parts[3]
                .parse()
                .map_err(|_| BindingError::input(expr, format!("bad axis number '{}'", parts[3])))?;
            match parts.get(4) {
                None => InputBinding::axis(selector, axis),
                Some(mode) => {
                    let mode = parse_axis_mode(expr, mode)?;
                    let threshold = match parts.get(5) {
                        None => Threshold::DEFAULT,
                        Some(raw) => parse_threshold(expr, raw)?,
                    };
                    if parts.len() > 6 {
                        return Err(BindingError::input(expr, "unexpected tokens after threshold"));
                    }
                    InputBinding::axis_button(selector, axis, mode, threshold)
                }
            }
        }
        other => {
            return Err(BindingError::input(
                expr,
                format!("unsupported input type '{}'", other),
            ))
        }
    };

    Ok(if modifier_layer {
        binding.on_modifier_layer()
    } else {
        binding
    })
}

fn parse_device(expr: &str, token: &str) -> Result<DeviceSelector, BindingError> {
    if token.is_empty() {
        return Err(BindingError::input(expr, "missing device"));
    }
    if token.chars().all(|c| c.is_ascii_digit()) {
        let index = token
            .parse()
            .map_err(|_| BindingError::input(expr, format!("bad device index '{}'", token)))?;
        return Ok(DeviceSelector::Index(index));
    }
    Ok(DeviceSelector::guid(token))
}

fn parse_axis_mode(expr: &str, token: &str) -> Result<AxisMode, BindingError> {
    match token.to_ascii_lowercase().as_str() {
        "pos" => Ok(AxisMode::Pos),
        "neg" => Ok(AxisMode::Neg),
        "abs" => Ok(AxisMode::Abs),
        other => Err(BindingError::input(
            expr,
            format!("axis mode must be pos, neg or abs (got '{}')", other),
        )),
    }
}

fn parse_threshold(expr: &str, token: &str) -> Result<Threshold, BindingError> {
    let value: f32 = token
        .parse()
        .map_err(|_| BindingError::input(expr, format!("bad threshold '{}'", token)))?;
    Threshold::new(value).ok_or_else(|| BindingError::ThresholdOutOfRange {
        expr: expr.to_string(),
        value: token.to_string(),
    })
}

/// Splits on `:` but keeps `[x,y]` groups together.
fn split_tokens(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut buf = String::new();
    let mut in_brackets = false;
    for ch in s.chars() {
        match ch {
            '[' => {
                in_brackets = true;
                buf.push(ch);
            }
            ']' => {
                in_brackets = false;
                buf.push(ch);
            }
            ':' if !in_brackets => parts.push(std::mem::take(&mut buf)),
            _ => buf.push(ch),
        }
    }
    parts.push(buf);
    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn parse_activation(token: &str) -> Option<ActivationMode> {
    match token.to_ascii_lowercase().as_str() {
        "single" => Some(ActivationMode::Single),
        "hold" => Some(ActivationMode::Hold),
        "toggle" => Some(ActivationMode::Toggle),
        _ => None,
    }
}

pub fn parse_output(expr: &str) -> Result<OutputAction, BindingError> {
    let expr = expr.trim();
    let mut parts = split_tokens(expr);
    if parts.is_empty() {
        return Err(BindingError::output(expr, "empty action"));
    }

    let mut mode = ActivationMode::Single;
    if parts.len() > 1 {
        if let Some(m) = parts.last().and_then(|last| parse_activation(last)) {
            // MouseInc/Dec carry their own literal `hold`
            if !is_increment(&parts[0]) {
                mode = m;
                parts.pop();
            }
        }
    }

    let base = parts[0].clone();
    let lower = base.to_ascii_lowercase();

    let (kind, mode) = if let Some(number) = lower.strip_prefix("mb") {
        (parse_mouse_button(expr, number, &parts)?, mode)
    } else if let Some(direction) = lower.strip_prefix("wheel") {
        (parse_wheel(expr, direction, &parts)?, mode)
    } else if let Some(axis) = lower.strip_prefix("mouse_") {
        let axis = parse_motion_axis(expr, axis)?;
        if parts.len() > 1 {
            return Err(BindingError::output(expr, "mouse axis takes no parameters"));
        }
        (ActionKind::MouseAxis { axis }, ActivationMode::Hold)
    } else if lower == "centermouse" {
        (
            ActionKind::MouseCenter(parse_center_target(expr, &parts[1..])?),
            ActivationMode::Single,
        )
    } else if lower == "wigglemouse" {
        (parse_wiggle(expr, &parts)?, ActivationMode::Toggle)
    } else if lower == "focuswindow" {
        (parse_focus(expr, &parts)?, ActivationMode::Single)
    } else if is_increment(&base) {
        (parse_increment(expr, &lower, &parts)?, ActivationMode::Hold)
    } else {
        if parts.len() > 1 {
            return Err(BindingError::output(
                expr,
                format!("unexpected token '{}' after key combo", parts[1]),
            ));
        }
        let combo: KeyCombo = base.parse().map_err(|key| BindingError::UnknownKey {
            expr: expr.to_string(),
            key,
        })?;
        (ActionKind::Key { combo }, mode)
    };

    Ok(OutputAction {
        kind,
        value: base,
        mode,
    })
}

fn is_increment(token: &str) -> bool {
    token.eq_ignore_ascii_case("mouseinc") || token.eq_ignore_ascii_case("mousedec")
}

fn parse_mouse_button(
    expr: &str,
    number: &str,
    parts: &[String],
) -> Result<ActionKind, BindingError> {
    let button = number
        .parse::<u8>()
        .ok()
        .and_then(MouseButton::from_number)
        .ok_or_else(|| BindingError::output(expr, "mouse buttons are MB1..MB5"))?;

    let hold_ms = match parts.get(1) {
        None => DEFAULT_CLICK_HOLD_MS,
        Some(raw) => raw
            .parse()
            .map_err(|_| BindingError::output(expr, format!("bad hold duration '{}'", raw)))?,
    };
    if parts.len() > 2 {
        return Err(BindingError::output(expr, "unexpected tokens after hold duration"));
    }
    Ok(ActionKind::MouseButton { button, hold_ms })
}

fn parse_wheel(expr: &str, direction: &str, parts: &[String]) -> Result<ActionKind, BindingError> {
    let direction = match direction {
        "up" => ScrollDirection::Up,
        "down" => ScrollDirection::Down,
        "left" => ScrollDirection::Left,
        "right" => ScrollDirection::Right,
        other => {
            return Err(BindingError::output(
                expr,
                format!("unknown wheel direction '{}'", other),
            ))
        }
    };

    let ramp = match parts.len() {
        1 => RampSpec::default(),
        4 => parse_ramp(expr, &parts[1..])?,
        _ => {
            return Err(BindingError::output(
                expr,
                "wheel takes either no parameters or init:max:ramp_ms",
            ))
        }
    };
    Ok(ActionKind::MouseWheel { direction, ramp })
}

fn parse_motion_axis(expr: &str, token: &str) -> Result<MotionAxis, BindingError> {
    match token.to_ascii_lowercase().as_str() {
        "x" => Ok(MotionAxis::X),
        "y" => Ok(MotionAxis::Y),
        other => Err(BindingError::output(
            expr,
            format!("motion axis must be x or y (got '{}')", other),
        )),
    }
}

fn parse_motion_mode(expr: &str, token: &str) -> Result<MotionMode, BindingError> {
    match token.to_ascii_lowercase().as_str() {
        "relative" => Ok(MotionMode::Relative),
        "absolute" => Ok(MotionMode::Absolute),
        other => Err(BindingError::output(
            expr,
            format!("motion mode must be relative or absolute (got '{}')", other),
        )),
    }
}

fn parse_number<T: std::str::FromStr>(
    expr: &str,
    token: &str,
    what: &str,
) -> Result<T, BindingError> {
    token
        .parse()
        .map_err(|_| BindingError::output(expr, format!("bad {} '{}'", what, token)))
}

/// `init:max:ramp_ms`, rates in ticks per second.
fn parse_ramp(expr: &str, tokens: &[String]) -> Result<RampSpec, BindingError> {
    let [init, max, ramp_ms] = tokens else {
        return Err(BindingError::output(expr, "expected init:max:ramp_ms"));
    };
    let init_rate = parse_rate(expr, init, "init rate")?;
    let max_rate = parse_rate(expr, max, "max rate")?;
    let ramp_ms: u64 = parse_number(expr, ramp_ms, "ramp time")?;
    if ramp_ms > MAX_RAMP_MS {
        return Err(BindingError::output(
            expr,
            format!("ramp time {} ms is above {} ms", ramp_ms, MAX_RAMP_MS),
        ));
    }
    Ok(RampSpec {
        init_rate,
        max_rate,
        ramp_ms,
    })
}

fn parse_rate(expr: &str, token: &str, what: &'static str) -> Result<u32, BindingError> {
    let rate: u32 = parse_number(expr, token, what)?;
    if !(1..=MAX_RAMP_RATE).contains(&rate) {
        return Err(BindingError::RateOutOfRange {
            expr: expr.to_string(),
            what,
            value: token.to_string(),
        });
    }
    Ok(rate)
}

fn parse_center_target(expr: &str, tokens: &[String]) -> Result<CenterTarget, BindingError> {
    let mut space_kind = "virtual".to_string();
    let mut target: Option<&str> = None;
    let mut point = None;

    for token in tokens {
        let lower = token.to_ascii_lowercase();
        match lower.as_str() {
            "virtual" | "monitor" | "windowclass" | "windowname" => space_kind = lower,
            _ if token.starts_with('[') => point = Some(parse_point(expr, token)?),
            _ => {
                if target.is_some() {
                    return Err(BindingError::output(
                        expr,
                        format!("unexpected token '{}'", token),
                    ));
                }
                target = Some(token.as_str());
            }
        }
    }

    let space = match space_kind.as_str() {
        "monitor" => TargetSpace::Monitor(match target {
            None => 0,
            Some(raw) => parse_number(expr, raw, "monitor index")?,
        }),
        "windowclass" => TargetSpace::Window(WindowQuery::Class(
            target
                .ok_or_else(|| BindingError::output(expr, "WindowClass needs a class name"))?
                .to_string(),
        )),
        "windowname" => TargetSpace::Window(WindowQuery::Title(
            target
                .ok_or_else(|| BindingError::output(expr, "WindowName needs a window title"))?
                .to_string(),
        )),
        _ => {
            if let Some(extra) = target {
                return Err(BindingError::output(
                    expr,
                    format!("Virtual takes no target (got '{}')", extra),
                ));
            }
            TargetSpace::Virtual
        }
    };

    Ok(CenterTarget { space, point })
}

/// `[fx,fy]` with both in `[0, 1]` is a fraction, anything else a pixel offset.
fn parse_point(expr: &str, token: &str) -> Result<TargetPoint, BindingError> {
    let inner = token
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| BindingError::output(expr, format!("malformed position '{}'", token)))?;
    let (xs, ys) = inner
        .split_once(',')
        .ok_or_else(|| BindingError::output(expr, format!("position needs x,y ('{}')", token)))?;
    let x: f64 = parse_number(expr, xs.trim(), "x position")?;
    let y: f64 = parse_number(expr, ys.trim(), "y position")?;
    if !x.is_finite() || !y.is_finite() {
        return Err(BindingError::output(expr, "position must be finite"));
    }

    if (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y) {
        Ok(TargetPoint::Fraction(x, y))
    } else {
        Ok(TargetPoint::Pixels(x as i32, y as i32))
    }
}

fn parse_wiggle(expr: &str, parts: &[String]) -> Result<ActionKind, BindingError> {
    if parts.len() > 4 {
        return Err(BindingError::output(expr, "WiggleMouse takes mode:amplitude:period"));
    }
    let mode = parts
        .get(1)
        .map(|t| parse_motion_mode(expr, t))
        .transpose()?;
    let amplitude_px = parts
        .get(2)
        .map(|t| parse_number::<i32>(expr, t, "wiggle amplitude"))
        .transpose()?;
    let period_ms = parts
        .get(3)
        .map(|t| parse_number::<u64>(expr, t, "wiggle period"))
        .transpose()?;
    if period_ms == Some(0) {
        return Err(BindingError::output(expr, "wiggle period must be > 0"));
    }
    Ok(ActionKind::MouseWiggle(WiggleSpec {
        mode,
        amplitude_px,
        period_ms,
    }))
}

fn parse_focus(expr: &str, parts: &[String]) -> Result<ActionKind, BindingError> {
    let query = match &parts[1..] {
        [kind, value] if kind.eq_ignore_ascii_case("windowclass") => {
            WindowQuery::Class(value.clone())
        }
        [kind, value] if kind.eq_ignore_ascii_case("windowname") => {
            WindowQuery::Title(value.clone())
        }
        [value]
            if !value.eq_ignore_ascii_case("windowclass")
                && !value.eq_ignore_ascii_case("windowname") =>
        {
            WindowQuery::Title(value.clone())
        }
        _ => {
            return Err(BindingError::output(
                expr,
                "expected FocusWindow[:WindowClass|WindowName]:<target>",
            ))
        }
    };
    Ok(ActionKind::FocusWindow(query))
}

fn parse_increment(expr: &str, lower: &str, parts: &[String]) -> Result<ActionKind, BindingError> {
    if parts.len() != 7 || !parts[3].eq_ignore_ascii_case("hold") {
        return Err(BindingError::output(
            expr,
            "MouseInc/MouseDec require axis:mode:hold:init:max:ramp_ms",
        ));
    }
    let axis = parse_motion_axis(expr, &parts[1])?;
    let mode = parse_motion_mode(expr, &parts[2])?;
    let ramp = parse_ramp(expr, &parts[4..])?;
    let amount = if lower == "mouseinc" { 1 } else { -1 };
    Ok(ActionKind::MouseIncrement {
        axis,
        amount,
        mode,
        ramp,
    })
}
