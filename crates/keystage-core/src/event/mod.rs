// Keystage Event Handling
// Scripted event replay through a stage

pub mod replay;

pub use replay::{
    collect_output, parse_script, replay_file, replay_script, Replay, ReplayError, ReplayRecord,
    ReplayResult, ScriptStep,
};
