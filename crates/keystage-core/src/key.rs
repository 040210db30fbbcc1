// Keystage Key Vocabulary
// Key names, aliases and the reserved parts of the key code space

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

include!(concat!(env!("OUT_DIR"), "/key_codes.rs"));

/// Number of virtual keys (`Virtual0` .. `Virtual255`)
pub const VIRTUAL_KEY_COUNT: usize = 256;

/// Canonical key names with their Linux input-event codes.
///
/// Names follow the `KeyboardEvent.code` vocabulary, shortened for letters.
const KEY_TABLE: &[(&str, u16)] = &[
    ("Escape", 1),
    ("Digit1", 2),
    ("Digit2", 3),
    ("Digit3", 4),
    ("Digit4", 5),
    ("Digit5", 6),
    ("Digit6", 7),
    ("Digit7", 8),
    ("Digit8", 9),
    ("Digit9", 10),
    ("Digit0", 11),
    ("Minus", 12),
    ("Equal", 13),
    ("Backspace", 14),
    ("Tab", 15),
    ("Q", 16),
    ("W", 17),
    ("E", 18),
    ("R", 19),
    ("T", 20),
    ("Y", 21),
    ("U", 22),
    ("I", 23),
    ("O", 24),
    ("P", 25),
    ("BracketLeft", 26),
    ("BracketRight", 27),
    ("Enter", 28),
    ("ControlLeft", 29),
    ("A", 30),
    ("S", 31),
    ("D", 32),
    ("F", 33),
    ("G", 34),
    ("H", 35),
    ("J", 36),
    ("K", 37),
    ("L", 38),
    ("Semicolon", 39),
    ("Quote", 40),
    ("Backquote", 41),
    ("ShiftLeft", 42),
    ("Backslash", 43),
    ("Z", 44),
    ("X", 45),
    ("C", 46),
    ("V", 47),
    ("B", 48),
    ("N", 49),
    ("M", 50),
    ("Comma", 51),
    ("Period", 52),
    ("Slash", 53),
    ("ShiftRight", 54),
    ("NumpadMultiply", 55),
    ("AltLeft", 56),
    ("Space", 57),
    ("CapsLock", 58),
    ("F1", 59),
    ("F2", 60),
    ("F3", 61),
    ("F4", 62),
    ("F5", 63),
    ("F6", 64),
    ("F7", 65),
    ("F8", 66),
    ("F9", 67),
    ("F10", 68),
    ("NumLock", 69),
    ("ScrollLock", 70),
    ("Numpad7", 71),
    ("Numpad8", 72),
    ("Numpad9", 73),
    ("NumpadSubtract", 74),
    ("Numpad4", 75),
    ("Numpad5", 76),
    ("Numpad6", 77),
    ("NumpadAdd", 78),
    ("Numpad1", 79),
    ("Numpad2", 80),
    ("Numpad3", 81),
    ("Numpad0", 82),
    ("NumpadDecimal", 83),
    ("IntlBackslash", 86),
    ("F11", 87),
    ("F12", 88),
    ("IntlRo", 89),
    ("NumpadEnter", 96),
    ("ControlRight", 97),
    ("NumpadDivide", 98),
    ("PrintScreen", 99),
    ("AltRight", 100),
    ("Home", 102),
    ("ArrowUp", 103),
    ("PageUp", 104),
    ("ArrowLeft", 105),
    ("ArrowRight", 106),
    ("End", 107),
    ("ArrowDown", 108),
    ("PageDown", 109),
    ("Insert", 110),
    ("Delete", 111),
    ("AudioVolumeMute", 113),
    ("AudioVolumeDown", 114),
    ("AudioVolumeUp", 115),
    ("Power", 116),
    ("NumpadEqual", 117),
    ("Pause", 119),
    ("NumpadComma", 121),
    ("IntlYen", 124),
    ("MetaLeft", 125),
    ("MetaRight", 126),
    ("ContextMenu", 127),
    ("BrowserBack", 158),
    ("BrowserForward", 159),
    ("MediaTrackNext", 163),
    ("MediaPlayPause", 164),
    ("MediaTrackPrevious", 165),
    ("MediaStop", 166),
    ("F13", 183),
    ("F14", 184),
    ("F15", 185),
    ("F16", 186),
    ("F17", 187),
    ("F18", 188),
    ("F19", 189),
    ("F20", 190),
    ("F21", 191),
    ("F22", 192),
    ("F23", 193),
    ("F24", 194),
    ("ButtonLeft", 272),
    ("ButtonRight", 273),
    ("ButtonMiddle", 274),
    ("ButtonBack", 275),
    ("ButtonForward", 276),
];

/// Alternative spellings, resolved to the canonical name
const ALIASES: &[(&str, &str)] = &[
    ("0", "Digit0"),
    ("1", "Digit1"),
    ("2", "Digit2"),
    ("3", "Digit3"),
    ("4", "Digit4"),
    ("5", "Digit5"),
    ("6", "Digit6"),
    ("7", "Digit7"),
    ("8", "Digit8"),
    ("9", "Digit9"),
    ("Esc", "Escape"),
    ("OSLeft", "MetaLeft"),
    ("OSRight", "MetaRight"),
    ("Meta", "MetaLeft"),
    ("Return", "Enter"),
];

fn names_by_upper() -> &'static HashMap<String, Key> {
    static NAME_TO_KEY: OnceLock<HashMap<String, Key>> = OnceLock::new();
    NAME_TO_KEY.get_or_init(|| {
        let mut map = HashMap::new();
        for (name, code) in KEY_TABLE {
            map.insert(name.to_uppercase(), Key(*code));
            // Letters can also be written with the "Key" prefix
            if name.len() == 1 {
                map.insert(format!("KEY{}", name), Key(*code));
            }
        }
        for (alias, canonical) in ALIASES {
            if let Some(key) = map.get(&canonical.to_uppercase()).copied() {
                map.insert(alias.to_uppercase(), key);
            }
        }
        map.insert("ANY".to_string(), Key::ANY);
        map
    })
}

/// Display name for a key
pub fn key_name(key: Key) -> Cow<'static, str> {
    static CODE_TO_NAME: OnceLock<HashMap<u16, &'static str>> = OnceLock::new();
    let names = CODE_TO_NAME.get_or_init(|| KEY_TABLE.iter().map(|(n, c)| (*c, *n)).collect());

    match key {
        Key::NONE => Cow::Borrowed("None"),
        Key::ANY => Cow::Borrowed("Any"),
        Key::TIMEOUT => Cow::Borrowed("Timeout"),
        key if key.is_virtual() => {
            Cow::Owned(format!("Virtual{}", key.0 - Key::FIRST_VIRTUAL.0))
        }
        key => match names.get(&key.0) {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(key.0.to_string()),
        },
    }
}

/// Try to parse a key name to a key. Lookup ignores case.
pub fn key_from_name(name: &str) -> Option<Key> {
    let upper = name.to_uppercase();
    if let Some(key) = names_by_upper().get(&upper) {
        return Some(*key);
    }
    match parse_virtual_index(name) {
        Some(Ok(index)) => Some(Key::virtual_key(index)),
        _ => None,
    }
}

/// Parse the index of a `VirtualN` name.
///
/// Returns `None` when `name` does not have the shape of a virtual key name and
/// `Some(Err(index))` when the index is out of range.
pub fn parse_virtual_index(name: &str) -> Option<Result<u8, u64>> {
    let prefix = name.get(..7)?;
    if !prefix.eq_ignore_ascii_case("virtual") {
        return None;
    }
    let digits = &name[7..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index = digits.parse::<u64>().unwrap_or(u64::MAX);
    Some(u8::try_from(index).map_err(|_| index))
}
