// Keystage Config Parser - TOML with Serde
// Loads mappings and per-context override sets from TOML files

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;

use crate::config::sequence_parser::{parse_input, parse_output, GrammarError};
use crate::transform::Stage;
use crate::{KeyEvent, KeySequence, KeyState, Mapping, MappingOverride, MappingOverrideSet};

/// Configuration parser errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("invalid expression '{expression}': {source}")]
    Grammar {
        expression: String,
        #[source]
        source: GrammarError,
    },

    #[error("invalid context '{name}': {reason}")]
    InvalidContext { name: String, reason: String },

    #[error("mapping input '{0}' matches no key event")]
    EmptyInput(String),
}

/// Root TOML table
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigToml {
    #[serde(default)]
    pub mappings: Vec<MappingToml>,

    #[serde(default)]
    pub contexts: Vec<ContextToml>,
}

/// `input = "..."`, `output = "..."` pair
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingToml {
    pub input: String,
    pub output: String,
}

/// Context with its override mappings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextToml {
    /// Name used in diagnostics and by `--context`
    pub name: Option<String>,
    /// Regex the window class has to match
    pub class: Option<String>,
    /// Regex the window title has to match
    pub title: Option<String>,
    #[serde(default)]
    pub overrides: Vec<MappingToml>,
}

/// Window filter of a context
#[derive(Debug, Clone)]
pub struct ContextFilter {
    pub class: Option<Regex>,
    pub title: Option<Regex>,
}

impl ContextFilter {
    /// Check if every configured pattern matches
    pub fn matches(&self, class: &str, title: &str) -> bool {
        self.class.as_ref().map_or(true, |re| re.is_match(class))
            && self.title.as_ref().map_or(true, |re| re.is_match(title))
    }
}

/// Compiled configuration, ready to construct a [`Stage`]
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub mappings: Vec<Mapping>,
    /// One override set per context, in context order
    pub override_sets: Vec<MappingOverrideSet>,
    /// Context filters by name, index equals the override set index
    pub contexts: IndexMap<String, ContextFilter>,
}

impl Config {
    /// `<config dir>/keystage/keystage.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("keystage").join("keystage.toml"))
    }

    /// Parse a TOML configuration file
    pub fn from_toml_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let toml_config: ConfigToml =
            toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))?;
        toml_config.to_config()
    }

    /// Index of the first context whose filter matches the window
    pub fn find_context(&self, class: &str, title: &str) -> Option<usize> {
        self.contexts
            .values()
            .position(|filter| filter.matches(class, title))
    }

    pub fn context_index(&self, name: &str) -> Option<usize> {
        self.contexts.get_index_of(name)
    }

    pub fn build_stage(&self) -> Stage {
        Stage::new(self.mappings.clone(), self.override_sets.clone())
    }
}

impl ConfigToml {
    fn to_config(&self) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        for entry in &self.mappings {
            let input = compile_input(&entry.input)?;
            let output = compile(&entry.output, parse_output)?;
            config.mappings.push(Mapping::new(input, output));
        }

        for (i, context) in self.contexts.iter().enumerate() {
            let name = context
                .name
                .clone()
                .unwrap_or_else(|| format!("context{}", i));
            if config.contexts.contains_key(&name) {
                return Err(ConfigError::InvalidContext {
                    name,
                    reason: "duplicate name".into(),
                });
            }

            let filter = ContextFilter {
                class: compile_regex(&name, context.class.as_deref())?,
                title: compile_regex(&name, context.title.as_deref())?,
            };

            let mut override_set = MappingOverrideSet::new();
            for entry in &context.overrides {
                let input = compile_input(&entry.input)?;
                let output = compile(&entry.output, parse_output)?;
                let index = match config.mappings.iter().position(|m| m.input == input) {
                    Some(index) => index,
                    None => {
                        // only mapped in this context, elsewhere the keys pass through
                        let forward = forward_output(&input);
                        config.mappings.push(Mapping::new(input, forward));
                        config.mappings.len() - 1
                    }
                };
                override_set.push(MappingOverride::new(index, output));
            }

            log::debug!(
                "context '{}' with {} overrides",
                name,
                override_set.len()
            );
            config.contexts.insert(name, filter);
            config.override_sets.push(override_set);
        }

        log::debug!(
            "compiled {} mappings and {} contexts",
            config.mappings.len(),
            config.contexts.len()
        );
        Ok(config)
    }
}

fn compile(
    expression: &str,
    parse: fn(&str) -> Result<KeySequence, GrammarError>,
) -> Result<KeySequence, ConfigError> {
    parse(expression).map_err(|source| ConfigError::Grammar {
        expression: expression.to_string(),
        source,
    })
}

fn compile_input(expression: &str) -> Result<KeySequence, ConfigError> {
    let input = compile(expression, parse_input)?;
    if !input.iter().any(|e| e.state == KeyState::Down) {
        return Err(ConfigError::EmptyInput(expression.to_string()));
    }
    if never_completes(&input) {
        log::warn!(
            "mapping input '{}' ends waiting for a timeout not to elapse and never triggers",
            expression
        );
    }
    Ok(input)
}

/// An input whose last requirement is a negated timeout can not complete:
/// only a following key satisfies it and there is none.
fn never_completes(input: &[KeyEvent]) -> bool {
    input
        .iter()
        .rev()
        .find(|e| e.is_timeout() || e.state != KeyState::Not)
        .is_some_and(|e| e.is_not_timeout())
}

fn compile_regex(name: &str, pattern: Option<&str>) -> Result<Option<Regex>, ConfigError> {
    pattern
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| ConfigError::InvalidContext {
                name: name.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

/// Output reproducing the key presses of an input
fn forward_output(input: &[KeyEvent]) -> KeySequence {
    input
        .iter()
        .filter(|e| !e.is_timeout() && !e.key.is_virtual())
        .filter_map(|e| match e.state {
            KeyState::Down => Some(KeyEvent::down(e.key)),
            KeyState::Up | KeyState::UpAsync => Some(KeyEvent::up(e.key)),
            _ => None,
        })
        .collect()
}
