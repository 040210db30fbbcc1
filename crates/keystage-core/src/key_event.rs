// Keystage Key Events
// Event states, events and flat event sequences

use std::fmt;

use strum_macros::{Display, EnumIter};

use crate::Key;

/// State of a key event.
///
/// The meaning differs slightly between input sequences (what has to happen)
/// and output sequences (what is emitted):
///
/// | state | input | output |
/// |---|---|---|
/// | `Down` | key has to be pressed | press key |
/// | `Up` | key has to be released right here | release key |
/// | `DownAsync` | key is part of a simultaneous group | - |
/// | `UpAsync` | key may be released any time later | - |
/// | `Not` | key must not be held | release key while triggered |
/// | `OutputOnRelease` | - | split between press and release phase |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum KeyState {
    #[strum(serialize = "+")]
    Down,
    #[strum(serialize = "-")]
    Up,
    #[strum(serialize = "*")]
    DownAsync,
    #[strum(serialize = "~")]
    UpAsync,
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "^")]
    OutputOnRelease,
}

/// A single event of a key sequence.
///
/// `value` is only meaningful for events of `Key::TIMEOUT`, where it holds a
/// duration in milliseconds (see [`crate::timeout`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub key: Key,
    pub state: KeyState,
    pub value: u16,
}

impl KeyEvent {
    pub const fn new(key: Key, state: KeyState) -> Self {
        Self {
            key,
            state,
            value: 0,
        }
    }

    pub const fn with_value(key: Key, state: KeyState, value: u16) -> Self {
        Self { key, state, value }
    }

    pub const fn down(key: Key) -> Self {
        Self::new(key, KeyState::Down)
    }

    pub const fn up(key: Key) -> Self {
        Self::new(key, KeyState::Up)
    }

    /// The release marker of output sequences
    pub const fn output_on_release() -> Self {
        Self::new(Key::NONE, KeyState::OutputOnRelease)
    }

    pub fn is_timeout(&self) -> bool {
        self.key == Key::TIMEOUT
    }

    /// A timeout which has to elapse (or a pause, in output sequences)
    pub fn is_plain_timeout(&self) -> bool {
        self.is_timeout() && self.state != KeyState::Not
    }

    /// A timeout which must not elapse
    pub fn is_not_timeout(&self) -> bool {
        self.is_timeout() && self.state == KeyState::Not
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_timeout() {
            let prefix = if self.is_not_timeout() { "!" } else { "" };
            return write!(f, "{}{}ms", prefix, self.value);
        }
        if self.state == KeyState::OutputOnRelease {
            return write!(f, "^");
        }
        write!(f, "{}{}", self.state, self.key)
    }
}

/// Flat, ordered list of key events
pub type KeySequence = Vec<KeyEvent>;

/// Render a sequence in the compact `+A ~A 500ms` notation
pub fn format_sequence(sequence: &[KeyEvent]) -> String {
    sequence
        .iter()
        .map(|event| event.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
