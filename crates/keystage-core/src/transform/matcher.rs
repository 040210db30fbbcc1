// Keystage Sequence Matcher
// Classifies the unresolved input against the compiled mapping inputs

use smallvec::SmallVec;

use crate::timeout::sum_timeouts;
use crate::{Key, KeyEvent, KeyState, Mapping};

/// Result of matching the input against a single expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    /// The input can never become the expression
    NoMatch,
    /// Further input could still complete the expression.
    /// `timeout` is set when the expression waits for a timeout to decide.
    MightMatch { timeout: Option<u16> },
    /// The input completes the expression
    Match,
}

/// Result of matching the input against all mappings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingMatch {
    NoMatch,
    /// `timeout` is the shortest wait any still viable mapping asks for
    MightMatch { timeout: Option<u16> },
    Match(usize),
}

/// Why the walk could not advance over a non consuming event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Blocked {
    /// A negated key is held
    Negation,
    /// A virtual key condition does not hold
    Condition,
}

/// Matches input sequences against compiled expressions.
///
/// Keeps its scratch buffers between calls so matching does not allocate.
#[derive(Debug, Default)]
pub struct SequenceMatcher {
    /// Releases which may still happen at any time
    async_ups: SmallVec<[Key; 8]>,
    /// Members of a simultaneous group which were not pressed yet
    group: SmallVec<[Key; 4]>,
    /// The physical key `Any` was bound to
    any_key: Option<Key>,
}

impl SequenceMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match `sequence` (the events since the last resolution) against
    /// `expression` (a compiled input).
    ///
    /// `is_down` reports keys which are currently held, it is consulted for
    /// keys the sequence does not tell anything about and for virtual keys.
    pub fn match_sequence<F>(
        &mut self,
        expression: &[KeyEvent],
        sequence: &[KeyEvent],
        is_down: F,
    ) -> MatchResult
    where
        F: Fn(Key) -> bool,
    {
        self.async_ups.clear();
        self.group.clear();
        self.any_key = None;

        let mut e = 0;
        let mut s = 0;
        while s < sequence.len() {
            // releases following an incomplete group are not registered yet
            if self.group.is_empty() {
                e = match self.advance(expression, e, sequence, s, &is_down, false) {
                    Ok(e) => e,
                    Err(_) => return MatchResult::NoMatch,
                };
            }
            let event = sequence[s];

            if event.is_timeout() {
                let (elapsed, next) = accumulate_timeouts(sequence, s);
                let at_end = next == sequence.len();
                match expression.get(e) {
                    Some(expected) if expected.is_plain_timeout() => {
                        if elapsed >= expected.value {
                            e += 1;
                        } else if at_end {
                            return MatchResult::MightMatch {
                                timeout: Some(expected.value - elapsed),
                            };
                        } else {
                            return MatchResult::NoMatch;
                        }
                    }
                    Some(expected) if expected.is_not_timeout() => {
                        if elapsed >= expected.value {
                            return MatchResult::NoMatch;
                        }
                        if at_end {
                            return MatchResult::MightMatch {
                                timeout: Some(expected.value - elapsed),
                            };
                        }
                        e += 1;
                    }
                    // not waiting for a timeout here
                    _ => {}
                }
                s = next;
                continue;
            }

            if event.state == KeyState::Up {
                if let Some(pos) = self.async_ups.iter().position(|k| *k == event.key) {
                    self.async_ups.swap_remove(pos);
                    s += 1;
                    continue;
                }
            }

            if !self.group.is_empty() {
                if event.state != KeyState::Down || !self.take_group_member(event.key) {
                    return MatchResult::NoMatch;
                }
                s += 1;
                continue;
            }

            e = match self.advance(expression, e, sequence, s, &is_down, true) {
                Ok(e) => e,
                Err(_) => return MatchResult::NoMatch,
            };
            let Some(expected) = expression.get(e) else {
                return MatchResult::NoMatch;
            };

            if expected.is_not_timeout() {
                // the key arrived before the timeout could elapse
                e += 1;
                continue;
            }
            if expected.is_timeout() {
                return MatchResult::NoMatch;
            }

            match expected.state {
                KeyState::DownAsync => {
                    while let Some(member) = expression.get(e) {
                        if member.state != KeyState::DownAsync {
                            break;
                        }
                        self.group.push(member.key);
                        e += 1;
                    }
                    // the ordered presses of the group follow
                    e += self.group.len();
                }
                KeyState::Down if event.state == KeyState::Down => {
                    if expected.key == Key::ANY && event.key.is_physical() {
                        self.any_key = Some(event.key);
                    } else if expected.key != event.key {
                        return MatchResult::NoMatch;
                    }
                    e += 1;
                    s += 1;
                }
                KeyState::Up if event.state == KeyState::Up => {
                    if self.bound(expected.key) != event.key {
                        return MatchResult::NoMatch;
                    }
                    e += 1;
                    s += 1;
                }
                _ => return MatchResult::NoMatch,
            }
        }

        // the input is exhausted, what remains must not require more input
        if !self.group.is_empty() {
            return MatchResult::MightMatch { timeout: None };
        }
        match self.advance(expression, e, sequence, sequence.len(), &is_down, true) {
            Ok(e) => match expression.get(e) {
                None => MatchResult::Match,
                Some(expected) if expected.is_timeout() => MatchResult::MightMatch {
                    timeout: Some(expected.value),
                },
                Some(_) => MatchResult::MightMatch { timeout: None },
            },
            // the negated key may still be released
            Err(Blocked::Negation) => MatchResult::MightMatch { timeout: None },
            Err(Blocked::Condition) => MatchResult::NoMatch,
        }
    }

    /// Find the mapping the sequence resolves to.
    ///
    /// A complete match is only reported while no mapping might still match,
    /// unless `accept_might_match` is set. The first mapping in order wins.
    pub fn find_mapping<F>(
        &mut self,
        mappings: &[Mapping],
        sequence: &[KeyEvent],
        accept_might_match: bool,
        is_down: F,
    ) -> MappingMatch
    where
        F: Fn(Key) -> bool,
    {
        let mut matched = None;
        let mut might_match = false;
        let mut timeout: Option<u16> = None;

        for (index, mapping) in mappings.iter().enumerate() {
            match self.match_sequence(&mapping.input, sequence, &is_down) {
                MatchResult::Match => {
                    matched.get_or_insert(index);
                }
                MatchResult::MightMatch { timeout: wait } => {
                    might_match = true;
                    timeout = match (timeout, wait) {
                        (Some(a), Some(b)) => Some(a.min(b)),
                        (a, b) => a.or(b),
                    };
                }
                MatchResult::NoMatch => {}
            }
        }

        match matched {
            Some(index) if accept_might_match || !might_match => MappingMatch::Match(index),
            _ if might_match && !accept_might_match => MappingMatch::MightMatch { timeout },
            _ => MappingMatch::NoMatch,
        }
    }

    /// Advance over expression events which do not consume input: async
    /// releases are registered, virtual key conditions checked and, when
    /// `check_not` is set, negations evaluated at input position `s`.
    fn advance<F>(
        &mut self,
        expression: &[KeyEvent],
        mut e: usize,
        sequence: &[KeyEvent],
        s: usize,
        is_down: &F,
        check_not: bool,
    ) -> Result<usize, Blocked>
    where
        F: Fn(Key) -> bool,
    {
        while let Some(expected) = expression.get(e) {
            if expected.is_timeout() {
                break;
            }
            if expected.key.is_virtual() {
                let held = is_down(expected.key);
                match expected.state {
                    KeyState::Down | KeyState::DownAsync if !held => {
                        return Err(Blocked::Condition)
                    }
                    KeyState::Not if held => return Err(Blocked::Condition),
                    _ => {}
                }
                e += 1;
                continue;
            }
            match expected.state {
                KeyState::UpAsync => {
                    let key = self.bound(expected.key);
                    self.async_ups.push(key);
                }
                KeyState::Not if check_not => {
                    if is_down_at(expected.key, sequence, s, is_down) {
                        return Err(Blocked::Negation);
                    }
                }
                _ => break,
            }
            e += 1;
        }
        Ok(e)
    }

    fn take_group_member(&mut self, key: Key) -> bool {
        let position = self
            .group
            .iter()
            .position(|k| *k == key || (*k == Key::ANY && key.is_physical()));
        match position {
            Some(pos) => {
                if self.group[pos] == Key::ANY {
                    self.any_key = Some(key);
                }
                self.group.remove(pos);
                true
            }
            None => false,
        }
    }

    fn bound(&self, key: Key) -> Key {
        match (key, self.any_key) {
            (Key::ANY, Some(any_key)) => any_key,
            _ => key,
        }
    }
}

/// Sum of the run of timeout events starting at `s` and the index after it
fn accumulate_timeouts(sequence: &[KeyEvent], s: usize) -> (u16, usize) {
    let mut elapsed = 0;
    let mut next = s;
    while let Some(event) = sequence.get(next).filter(|event| event.is_timeout()) {
        elapsed = sum_timeouts(elapsed, event.value);
        next += 1;
    }
    (elapsed, next)
}

/// Whether `key` was held at input position `s`
fn is_down_at<F>(key: Key, sequence: &[KeyEvent], s: usize, is_down: &F) -> bool
where
    F: Fn(Key) -> bool,
{
    let is_key = |event: &&KeyEvent| {
        event.key == key && matches!(event.state, KeyState::Down | KeyState::Up)
    };
    if let Some(last) = sequence[..s].iter().rev().find(is_key) {
        return last.state == KeyState::Down;
    }
    if let Some(next) = sequence[s..].iter().find(is_key) {
        return next.state == KeyState::Up;
    }
    is_down(key)
}
