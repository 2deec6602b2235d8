//! Core types for the keymap system: Keystroke, Modifiers, KeyCode
//!
//! Also owns chord-string parsing ("ctrl+x", "g g", "alt+shift+enter"),
//! since every layer above (presets, compiler, CLI) speaks this notation.

use std::fmt;

/// Modifier keys as a bitfield for efficient storage and comparison
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const CTRL: Modifiers = Modifiers(0b0001);
    pub const ALT: Modifiers = Modifiers(0b0010);
    pub const SHIFT: Modifiers = Modifiers(0b0100);
    pub const META: Modifiers = Modifiers(0b1000); // Cmd on macOS, Win on Windows

    pub const fn new(ctrl: bool, alt: bool, shift: bool, meta: bool) -> Self {
        let mut bits = 0u8;
        if ctrl {
            bits |= 0b0001;
        }
        if alt {
            bits |= 0b0010;
        }
        if shift {
            bits |= 0b0100;
        }
        if meta {
            bits |= 0b1000;
        }
        Modifiers(bits)
    }

    #[inline]
    pub const fn ctrl(self) -> bool {
        self.0 & 0b0001 != 0
    }

    #[inline]
    pub const fn alt(self) -> bool {
        self.0 & 0b0010 != 0
    }

    #[inline]
    pub const fn shift(self) -> bool {
        self.0 & 0b0100 != 0
    }

    #[inline]
    pub const fn meta(self) -> bool {
        self.0 & 0b1000 != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn union(self, other: Modifiers) -> Modifiers {
        Modifiers(self.0 | other.0)
    }

    /// Get the platform-specific "command" modifier (Cmd on macOS, Ctrl elsewhere)
    pub fn cmd() -> Modifiers {
        if cfg!(target_os = "macos") {
            Modifiers::META
        } else {
            Modifiers::CTRL
        }
    }

    /// Modifier names in canonical composition order (ctrl, alt, shift, meta)
    pub fn names(self) -> Vec<&'static str> {
        let mut parts = Vec::new();
        if self.ctrl() {
            parts.push("ctrl");
        }
        if self.alt() {
            parts.push("alt");
        }
        if self.shift() {
            parts.push("shift");
        }
        if self.meta() {
            parts.push("meta");
        }
        parts
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join("+"))
    }
}

/// A key code representing a logical key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyCode {
    /// A character key (normalized to lowercase)
    Char(char),

    // Named keys
    Enter,
    Escape,
    Tab,
    Backspace,
    Delete,
    Space,

    // Arrow keys
    Up,
    Down,
    Left,
    Right,

    // Navigation
    Home,
    End,
    PageUp,
    PageDown,
    Insert,

    // Function keys
    F(u8), // F1-F12
}

impl KeyCode {
    /// Canonical lowercase name as it appears in preset files
    pub fn canonical_name(&self) -> String {
        match self {
            KeyCode::Char(c) => c.to_string(),
            KeyCode::Enter => "enter".to_string(),
            KeyCode::Escape => "escape".to_string(),
            KeyCode::Tab => "tab".to_string(),
            KeyCode::Backspace => "backspace".to_string(),
            KeyCode::Delete => "delete".to_string(),
            KeyCode::Space => "space".to_string(),
            KeyCode::Up => "up".to_string(),
            KeyCode::Down => "down".to_string(),
            KeyCode::Left => "left".to_string(),
            KeyCode::Right => "right".to_string(),
            KeyCode::Home => "home".to_string(),
            KeyCode::End => "end".to_string(),
            KeyCode::PageUp => "pageup".to_string(),
            KeyCode::PageDown => "pagedown".to_string(),
            KeyCode::Insert => "insert".to_string(),
            KeyCode::F(n) => format!("f{}", n),
        }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_name())
    }
}

/// A single keystroke: a key with modifiers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Keystroke {
    pub mods: Modifiers,
    pub key: KeyCode,
}

impl Keystroke {
    pub const fn new(key: KeyCode, mods: Modifiers) -> Self {
        Self { mods, key }
    }

    /// Create a keystroke with a character key and no modifiers
    pub fn char(c: char) -> Self {
        Self {
            key: KeyCode::Char(c.to_ascii_lowercase()),
            mods: Modifiers::NONE,
        }
    }

    /// Create a keystroke with a character and modifiers
    pub fn char_with_mods(c: char, mods: Modifiers) -> Self {
        Self {
            key: KeyCode::Char(c.to_ascii_lowercase()),
            mods,
        }
    }

    /// The digit value if this is a bare digit key (no modifiers)
    pub fn as_digit(&self) -> Option<u32> {
        if !self.mods.is_empty() {
            return None;
        }
        match self.key {
            KeyCode::Char(c) => c.to_digit(10),
            _ => None,
        }
    }
}

impl fmt::Display for Keystroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mods.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}+{}", self.mods, self.key)
        }
    }
}

/// Render a key sequence in canonical notation ("ctrl+x ctrl+s")
pub fn format_sequence(seq: &[Keystroke]) -> String {
    seq.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Failure to parse a chord or sequence string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParseError {
    pub input: String,
    pub message: String,
}

impl fmt::Display for KeyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid key {:?}: {}", self.input, self.message)
    }
}

impl std::error::Error for KeyParseError {}

fn err(input: &str, message: impl Into<String>) -> KeyParseError {
    KeyParseError {
        input: input.to_string(),
        message: message.into(),
    }
}

/// Parse a single chord like "ctrl+shift+s" into a Keystroke
pub fn parse_chord(chord: &str) -> Result<Keystroke, KeyParseError> {
    if chord.is_empty() {
        return Err(err(chord, "empty chord"));
    }

    let mut mods = Modifiers::NONE;
    let mut key = None;

    for part in chord.split('+') {
        let part_lower = part.to_lowercase();
        match part_lower.as_str() {
            "cmd" => mods = mods | Modifiers::cmd(),
            "ctrl" | "control" => mods = mods | Modifiers::CTRL,
            "alt" | "option" | "opt" => mods = mods | Modifiers::ALT,
            "shift" => mods = mods | Modifiers::SHIFT,
            "meta" | "super" | "win" => mods = mods | Modifiers::META,
            _ => {
                if key.is_some() {
                    return Err(err(chord, "more than one non-modifier key"));
                }
                key = Some(parse_key_code(chord, &part_lower)?);
            }
        }
    }

    match key {
        Some(key) => Ok(Keystroke::new(key, mods)),
        None => Err(err(chord, "no non-modifier key")),
    }
}

/// Parse a whitespace-separated key sequence like "ctrl+x ctrl+s" or "g g"
pub fn parse_sequence(input: &str) -> Result<Vec<Keystroke>, KeyParseError> {
    let chords: Vec<&str> = input.split_whitespace().collect();
    if chords.is_empty() {
        return Err(err(input, "empty key sequence"));
    }
    chords.iter().map(|c| parse_chord(c)).collect()
}

fn parse_key_code(chord: &str, name: &str) -> Result<KeyCode, KeyParseError> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Ok(KeyCode::Char(c.to_ascii_lowercase()));
    }

    match name {
        "enter" | "return" => Ok(KeyCode::Enter),
        "escape" | "esc" => Ok(KeyCode::Escape),
        "tab" => Ok(KeyCode::Tab),
        "backspace" | "back" => Ok(KeyCode::Backspace),
        "delete" | "del" => Ok(KeyCode::Delete),
        "space" => Ok(KeyCode::Space),

        "up" | "arrowup" => Ok(KeyCode::Up),
        "down" | "arrowdown" => Ok(KeyCode::Down),
        "left" | "arrowleft" => Ok(KeyCode::Left),
        "right" | "arrowright" => Ok(KeyCode::Right),

        "home" => Ok(KeyCode::Home),
        "end" => Ok(KeyCode::End),
        "pageup" | "pgup" => Ok(KeyCode::PageUp),
        "pagedown" | "pgdown" | "pgdn" => Ok(KeyCode::PageDown),
        "insert" | "ins" => Ok(KeyCode::Insert),

        _ => {
            if let Some(num) = name.strip_prefix('f') {
                if let Ok(n) = num.parse::<u8>() {
                    if (1..=12).contains(&n) {
                        return Ok(KeyCode::F(n));
                    }
                }
            }
            Err(err(chord, format!("unknown key {:?}", name)))
        }
    }
}
