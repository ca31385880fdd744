//! Key names and `+`-joined key combos such as `Ctrl+Shift+F5`.

use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyName {
    /// `A`..`Z`, stored upper case
    Letter(char),
    /// `0`..`9`
    Digit(u8),
    /// `F1`..`F24`
    Function(u8),
    Ctrl,
    Alt,
    Shift,
    LeftWin,
    RightWin,
    Enter,
    Escape,
    Space,
    Tab,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Left,
    Right,
    Up,
    Down,
}

impl FromStr for KeyName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let mut chars = upper.chars();

        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_uppercase() {
                return Ok(KeyName::Letter(c));
            }
            if let Some(d) = c.to_digit(10) {
                return Ok(KeyName::Digit(d as u8));
            }
        }

        if let Some(rest) = upper.strip_prefix('F') {
            if let Ok(n) = rest.parse::<u8>() {
                if (1..=24).contains(&n) {
                    return Ok(KeyName::Function(n));
                }
            }
        }

        let key = match upper.as_str() {
            "CTRL" | "CONTROL" => KeyName::Ctrl,
            "ALT" => KeyName::Alt,
            "SHIFT" => KeyName::Shift,
            "WIN" | "LWIN" => KeyName::LeftWin,
            "RWIN" => KeyName::RightWin,
            "ENTER" | "RETURN" => KeyName::Enter,
            "ESC" | "ESCAPE" => KeyName::Escape,
            "SPACE" => KeyName::Space,
            "TAB" => KeyName::Tab,
            "BACKSPACE" | "BKSP" => KeyName::Backspace,
            "DEL" | "DELETE" => KeyName::Delete,
            "INS" | "INSERT" => KeyName::Insert,
            "HOME" => KeyName::Home,
            "END" => KeyName::End,
            "PGUP" | "PAGEUP" => KeyName::PageUp,
            "PGDN" | "PAGEDOWN" => KeyName::PageDown,
            "LEFT" => KeyName::Left,
            "RIGHT" => KeyName::Right,
            "UP" => KeyName::Up,
            "DOWN" => KeyName::Down,
            _ => return Err(s.trim().to_string()),
        };
        Ok(key)
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyName::Letter(c) => write!(f, "{}", c),
            KeyName::Digit(d) => write!(f, "{}", d),
            KeyName::Function(n) => write!(f, "F{}", n),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Ordered key chord. Pressed left to right, released right to left.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    keys: Vec<KeyName>,
}

impl KeyCombo {
    pub fn single(key: KeyName) -> Self {
        Self { keys: vec![key] }
    }

    pub fn keys(&self) -> &[KeyName] {
        &self.keys
    }

    /// Keys in press order.
    pub fn press_order(&self) -> impl Iterator<Item = &KeyName> {
        self.keys.iter()
    }

    /// Keys in release order.
    pub fn release_order(&self) -> impl Iterator<Item = &KeyName> {
        self.keys.iter().rev()
    }
}

impl FromStr for KeyCombo {
    /// The offending key name.
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('+').map(str::trim).filter(|p| !p.is_empty()).collect();
        if parts.is_empty() {
            return Err(s.to_string());
        }
        let keys = parts
            .into_iter()
            .map(KeyName::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { keys })
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.keys.iter().map(|k| k.to_string()).collect();
        write!(f, "{}", names.join("+"))
    }
}
