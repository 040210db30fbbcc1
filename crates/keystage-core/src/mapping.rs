// Keystage Mapping Structures
// Mapping, MappingOverride, MappingOverrideSet

use std::fmt;

use crate::key_event::format_sequence;
use crate::KeySequence;

/// A remapping rule: when `input` is satisfied, `output` is emitted
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mapping {
    pub input: KeySequence,
    pub output: KeySequence,
}

impl Mapping {
    pub fn new(input: KeySequence, output: KeySequence) -> Self {
        Self { input, output }
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} >> {}",
            format_sequence(&self.input),
            format_sequence(&self.output)
        )
    }
}

/// Replacement output for one mapping while an override set is active
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingOverride {
    pub mapping_index: usize,
    pub output: KeySequence,
}

impl MappingOverride {
    pub fn new(mapping_index: usize, output: KeySequence) -> Self {
        Self {
            mapping_index,
            output,
        }
    }
}

/// Sparse list of overrides, selected as a unit
pub type MappingOverrideSet = Vec<MappingOverride>;

/// Output of `mapping_index`, taking the override set into account.
///
/// The first override naming the mapping wins.
pub fn resolve_output<'a>(
    mappings: &'a [Mapping],
    override_set: Option<&'a MappingOverrideSet>,
    mapping_index: usize,
) -> &'a KeySequence {
    override_set
        .and_then(|set| set.iter().find(|o| o.mapping_index == mapping_index))
        .map(|o| &o.output)
        .unwrap_or(&mappings[mapping_index].output)
}
