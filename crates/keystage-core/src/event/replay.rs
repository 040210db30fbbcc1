// Keystage Event Replay
// Drives a stage from a scripted event file, acting as its timeout scheduler

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use smallvec::SmallVec;

use crate::key::key_from_name;
use crate::key_event::format_sequence;
use crate::timeout::make_input_timeout_event;
use crate::transform::Stage;
use crate::{Key, KeyEvent, KeySequence};

/// Result type for replay operations
pub type ReplayResult<T> = Result<T, ReplayError>;

/// Errors that can occur while reading a script
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: unknown key '{name}'")]
    UnknownKey { line: usize, name: String },

    #[error("line {line}: invalid command '{text}'")]
    InvalidCommand { line: usize, text: String },
}

/// One line of a replay script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStep {
    Press(Key),
    Release(Key),
    /// Let milliseconds pass
    Wait(u64),
    /// Activate an override set
    Context(Option<usize>),
    /// Reconcile against the keys the script holds
    Validate,
}

/// Parse a script:
///
/// ```text
/// # tap CapsLock
/// +CapsLock
/// wait 100
/// -CapsLock
/// context 0
/// validate
/// ```
pub fn parse_script(text: &str) -> ReplayResult<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let invalid = || ReplayError::InvalidCommand {
            line: line_no,
            text: line.to_string(),
        };
        let key = |name: &str| {
            key_from_name(name.trim()).ok_or_else(|| ReplayError::UnknownKey {
                line: line_no,
                name: name.trim().to_string(),
            })
        };

        let step = if let Some(name) = line.strip_prefix('+') {
            ScriptStep::Press(key(name)?)
        } else if let Some(name) = line.strip_prefix('-') {
            ScriptStep::Release(key(name)?)
        } else {
            let mut words = line.split_whitespace();
            match (words.next(), words.next(), words.next()) {
                (Some("wait"), Some(ms), None) => {
                    let ms = ms.strip_suffix("ms").unwrap_or(ms);
                    ScriptStep::Wait(ms.parse().map_err(|_| invalid())?)
                }
                (Some("context"), Some("none"), None) => ScriptStep::Context(None),
                (Some("context"), Some(index), None) => {
                    ScriptStep::Context(Some(index.parse().map_err(|_| invalid())?))
                }
                (Some("validate"), None, None) => ScriptStep::Validate,
                _ => return Err(invalid()),
            }
        };
        steps.push(step);
    }
    Ok(steps)
}

/// What the stage emitted for one delivered input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRecord {
    /// Script time in milliseconds
    pub time: u64,
    /// The delivered event, `None` for a validation
    pub input: Option<KeyEvent>,
    pub output: KeySequence,
}

impl fmt::Display for ReplayRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let input = match &self.input {
            Some(event) => event.to_string(),
            None => "validate".to_string(),
        };
        write!(f, "{:>6}ms {:<10} => {}", self.time, input, format_sequence(&self.output))
    }
}

/// A pending wake-up request
#[derive(Debug, Clone, Copy)]
struct Wakeup {
    requested_at: u64,
    deadline: u64,
}

/// Plays script steps through a stage
pub struct Replay<'a> {
    stage: &'a mut Stage,
    now: u64,
    wakeup: Option<Wakeup>,
    held: SmallVec<[Key; 8]>,
    records: Vec<ReplayRecord>,
}

impl<'a> Replay<'a> {
    pub fn new(stage: &'a mut Stage) -> Self {
        Self {
            stage,
            now: 0,
            wakeup: None,
            held: SmallVec::new(),
            records: Vec::new(),
        }
    }

    pub fn run(mut self, steps: &[ScriptStep]) -> Vec<ReplayRecord> {
        for step in steps {
            self.step(*step);
        }
        self.records
    }

    fn step(&mut self, step: ScriptStep) {
        match step {
            ScriptStep::Press(key) => {
                if !self.held.contains(&key) {
                    self.held.push(key);
                }
                self.deliver_key(KeyEvent::down(key));
            }
            ScriptStep::Release(key) => {
                self.held.retain(|k| *k != key);
                self.deliver_key(KeyEvent::up(key));
            }
            ScriptStep::Wait(ms) => self.wait(ms),
            ScriptStep::Context(index) => self.stage.activate_override_set(index),
            ScriptStep::Validate => {
                let held = &self.held;
                let output = self.stage.validate_state(|key| held.contains(&key));
                self.records.push(ReplayRecord {
                    time: self.now,
                    input: None,
                    output,
                });
            }
        }
    }

    fn wait(&mut self, ms: u64) {
        let target = self.now.saturating_add(ms);
        while let Some(wakeup) = self.wakeup.filter(|w| w.deadline <= target) {
            self.now = wakeup.deadline;
            self.deliver_timeout(wakeup);
        }
        self.now = target;
    }

    fn deliver_key(&mut self, event: KeyEvent) {
        // the key arrived first, the stage learns how long it waited
        if let Some(wakeup) = self.wakeup.filter(|w| w.requested_at < self.now) {
            self.deliver_timeout(wakeup);
        }
        self.deliver(event);
    }

    fn deliver_timeout(&mut self, wakeup: Wakeup) {
        let elapsed = Duration::from_millis(self.now - wakeup.requested_at);
        self.deliver(make_input_timeout_event(elapsed));
    }

    fn deliver(&mut self, event: KeyEvent) {
        let output = self.stage.update(event);
        self.wakeup = self.stage.timeout_request().map(|ms| Wakeup {
            requested_at: self.now,
            deadline: self.now + ms as u64,
        });
        log::trace!("{}ms {} => {}", self.now, event, format_sequence(&output));
        self.records.push(ReplayRecord {
            time: self.now,
            input: Some(event),
            output,
        });
    }
}

/// Run a script against a stage
pub fn replay_script(stage: &mut Stage, script: &str) -> ReplayResult<Vec<ReplayRecord>> {
    let steps = parse_script(script)?;
    Ok(Replay::new(stage).run(&steps))
}

/// Run a script file against a stage
pub fn replay_file<P: AsRef<Path>>(stage: &mut Stage, path: P) -> ReplayResult<Vec<ReplayRecord>> {
    let script = fs::read_to_string(path)?;
    replay_script(stage, &script)
}

/// Concatenated output of all records
pub fn collect_output(records: &[ReplayRecord]) -> KeySequence {
    records
        .iter()
        .flat_map(|r| r.output.iter().copied())
        .collect()
}
