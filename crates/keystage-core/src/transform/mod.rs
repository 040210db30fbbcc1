// Keystage Transform Module
// Sequence matching and the runtime stage

pub mod matcher;
pub mod stage;

pub use matcher::{MappingMatch, MatchResult, SequenceMatcher};
pub use stage::Stage;
