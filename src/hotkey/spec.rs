//! Hotkey text parsing
//!
//! Turns config strings such as `Ctrl+Shift+F1` into a modifier bitmask and
//! a Windows virtual-key code. Parsing is pure; registration happens later.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Modifier bitmask using the `RegisterHotKey` bit values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers(u32);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const ALT: Modifiers = Modifiers(0x0001);
    pub const CONTROL: Modifiers = Modifiers(0x0002);
    pub const SHIFT: Modifiers = Modifiers(0x0004);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

impl BitOrAssign for Modifiers {
    fn bitor_assign(&mut self, rhs: Modifiers) {
        self.0 |= rhs.0;
    }
}

/// Windows virtual-key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u32);

impl KeyCode {
    pub fn code(self) -> u32 {
        self.0
    }
}

/// A parsed, immutable shortcut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeySpec {
    pub modifiers: Modifiers,
    pub key: KeyCode,
}

impl fmt::Display for HotkeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.contains(Modifiers::CONTROL) {
            write!(f, "Ctrl+")?;
        }
        if self.modifiers.contains(Modifiers::ALT) {
            write!(f, "Alt+")?;
        }
        if self.modifiers.contains(Modifiers::SHIFT) {
            write!(f, "Shift+")?;
        }
        match key_name(self.key) {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "0x{:02X}", self.key.0),
        }
    }
}

/// Hotkey text that failed to parse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown key: {0}")]
    UnknownKey(String),

    #[error("no key specified in hotkey: {0}")]
    NoKey(String),
}

/// Map a normalized (upper-case) token to its virtual-key code.
///
/// Letters and digits share their ASCII value with the VK code; F1-F12 are
/// 0x70-0x7B.
fn lookup_key(token: &str) -> Option<KeyCode> {
    let bytes = token.as_bytes();
    match bytes {
        [c] if c.is_ascii_uppercase() || c.is_ascii_digit() => Some(KeyCode(*c as u32)),
        [b'F', ..] => {
            let n: u32 = token[1..].parse().ok()?;
            // Reject forms like "F01" so only canonical names match
            if (1..=12).contains(&n) && token[1..] == n.to_string() {
                Some(KeyCode(0x70 + n - 1))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn key_name(key: KeyCode) -> Option<String> {
    match key.0 {
        0x30..=0x39 | 0x41..=0x5A => char::from_u32(key.0).map(|c| c.to_string()),
        0x70..=0x7B => Some(format!("F{}", key.0 - 0x70 + 1)),
        _ => None,
    }
}

/// Parse hotkey text.
///
/// Returns `Ok(None)` for empty or whitespace-only text: the entry is valid
/// but has no shortcut. Tokens are split on `+`, trimmed and compared
/// case-insensitively; empty tokens (as in `Ctrl+`) are ignored. When more
/// than one key token is present the last one wins.
pub fn parse_hotkey(text: &str) -> Result<Option<HotkeySpec>, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let mut modifiers = Modifiers::NONE;
    let mut key = None;

    for raw in trimmed.split('+') {
        let token = raw.trim().to_uppercase();
        match token.as_str() {
            "" => continue,
            "CTRL" | "CONTROL" => modifiers |= Modifiers::CONTROL,
            "ALT" => modifiers |= Modifiers::ALT,
            "SHIFT" => modifiers |= Modifiers::SHIFT,
            other => match lookup_key(other) {
                Some(code) => key = Some(code),
                None => return Err(ParseError::UnknownKey(other.to_string())),
            },
        }
    }

    match key {
        Some(key) => Ok(Some(HotkeySpec { modifiers, key })),
        None => Err(ParseError::NoKey(trimmed.to_string())),
    }
}
