// Keystage Timeout Codec
// Conversion between durations and the millisecond field of timeout events

use std::time::Duration;

use crate::{Key, KeyEvent, KeyState};

/// Bit width of the encoded timeout field
pub const TIMEOUT_BITS: u32 = 16;

/// Largest encodable timeout in milliseconds (65.5 seconds)
pub const MAX_TIMEOUT_MS: u16 = ((1u32 << TIMEOUT_BITS) - 1) as u16;

/// Convert a duration to milliseconds, saturating at [`MAX_TIMEOUT_MS`]
pub fn duration_to_timeout(duration: Duration) -> u16 {
    let millis = duration.as_millis().min(MAX_TIMEOUT_MS as u128);
    millis as u16
}

/// Clamp a millisecond count given as plain integer
pub fn millis_to_timeout(millis: u64) -> u16 {
    duration_to_timeout(Duration::from_millis(millis))
}

/// Exact inverse of [`duration_to_timeout`] for in-range values
pub fn timeout_to_duration(timeout: u16) -> Duration {
    Duration::from_millis(timeout as u64)
}

/// Saturating sum of two encoded timeouts
pub fn sum_timeouts(a: u16, b: u16) -> u16 {
    (a as u32 + b as u32).min(MAX_TIMEOUT_MS as u32) as u16
}

/// Timeout which has to elapse (input) or pause (output)
pub fn make_timeout(duration: Duration) -> KeyEvent {
    KeyEvent::with_value(Key::TIMEOUT, KeyState::Up, duration_to_timeout(duration))
}

/// Timeout which must not elapse
pub fn make_not_timeout(duration: Duration) -> KeyEvent {
    KeyEvent::with_value(Key::TIMEOUT, KeyState::Not, duration_to_timeout(duration))
}

/// The notification a scheduler delivers after `elapsed` passed
pub fn make_input_timeout_event(elapsed: Duration) -> KeyEvent {
    make_timeout(elapsed)
}

pub fn is_input_timeout_event(event: &KeyEvent) -> bool {
    event.key == Key::TIMEOUT && event.state == KeyState::Up
}
