// Keystage Config API
// Expression compiler and TOML configuration loading

pub mod sequence_parser;

#[cfg(feature = "toml-config")]
pub mod parser;

pub use sequence_parser::{parse_input, parse_output, GrammarError};

#[cfg(feature = "toml-config")]
pub use parser::{Config, ConfigError, ContextFilter, ConfigToml, ContextToml, MappingToml};
