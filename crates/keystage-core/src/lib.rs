// Keystage Core Library
// Key sequence expressions, sequence matching and the remapping stage

pub mod config;
pub mod event;
pub mod key;
pub mod key_event;
pub mod mapping;
pub mod output;
pub mod timeout;
pub mod transform;

pub use config::{parse_input, parse_output, GrammarError};
pub use key::Key;
pub use key_event::{format_sequence, KeyEvent, KeySequence, KeyState};
pub use mapping::{resolve_output, Mapping, MappingOverride, MappingOverrideSet};
pub use output::{OutputDown, OutputState};
pub use timeout::{
    duration_to_timeout, make_input_timeout_event, sum_timeouts, timeout_to_duration,
    MAX_TIMEOUT_MS,
};
pub use transform::{MappingMatch, MatchResult, SequenceMatcher, Stage};

#[cfg(feature = "toml-config")]
pub use config::{Config, ConfigError};
