// Keystage Config - Key Sequence Expression Parser
// Compiles expressions like "A{B} !C 500ms" into flat key event sequences

use crate::key::{key_from_name, parse_virtual_index};
use crate::timeout::{millis_to_timeout, sum_timeouts};
use crate::{Key, KeyEvent, KeySequence, KeyState};

/// Errors that can occur while compiling an expression
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected '{0}'")]
    UnexpectedToken(String),

    #[error("unknown key name: '{0}'")]
    UnknownKey(String),

    #[error("invalid key code: '{0}'")]
    InvalidKeyCode(String),

    #[error("invalid virtual key: '{0}'")]
    InvalidVirtualKey(String),

    #[error("unbalanced group")]
    UnbalancedGroup,

    #[error("hold without preceding key")]
    HoldWithoutKey,

    #[error("invalid negation: {0}")]
    InvalidNot(String),

    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("negated timeout is not allowed in output")]
    NotTimeoutInOutput,

    #[error("release marker '^' may only appear once")]
    DuplicateReleaseMarker,

    #[error("release marker '^' is not allowed in a group")]
    ReleaseMarkerInGroup,

    #[error("release marker '^' is not allowed in input")]
    ReleaseMarkerInInput,
}

/// Compile an input expression (what has to happen to trigger a mapping)
///
/// # Examples
/// ```
/// use keystage_core::config::parse_input;
/// use keystage_core::{Key, KeyEvent, KeyState};
/// let a = Key::from(30);
/// assert_eq!(
///     parse_input("A").unwrap(),
///     vec![KeyEvent::down(a), KeyEvent::new(a, KeyState::UpAsync)]
/// );
/// ```
pub fn parse_input(text: &str) -> Result<KeySequence, GrammarError> {
    SequenceParser::new(text, true).compile()
}

/// Compile an output expression (what is emitted when a mapping triggers)
pub fn parse_output(text: &str) -> Result<KeySequence, GrammarError> {
    SequenceParser::new(text, false).compile()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Not,
    OpenGroup,
    CloseGroup,
    OpenHold,
    CloseHold,
    ReleaseMarker,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => s.clone(),
            Token::Not => "!".into(),
            Token::OpenGroup => "(".into(),
            Token::CloseGroup => ")".into(),
            Token::OpenHold => "{".into(),
            Token::CloseHold => "}".into(),
            Token::ReleaseMarker => "^".into(),
        }
    }
}

/// What an identifier token stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Atom {
    Key(Key),
    Timeout(u16),
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut ident = String::new();

    for c in text.chars() {
        let token = match c {
            '!' => Some(Token::Not),
            '(' => Some(Token::OpenGroup),
            ')' => Some(Token::CloseGroup),
            '{' => Some(Token::OpenHold),
            '}' => Some(Token::CloseHold),
            '^' => Some(Token::ReleaseMarker),
            c if c.is_whitespace() => None,
            c => {
                ident.push(c);
                continue;
            }
        };
        if !ident.is_empty() {
            tokens.push(Token::Ident(std::mem::take(&mut ident)));
        }
        tokens.extend(token);
    }
    if !ident.is_empty() {
        tokens.push(Token::Ident(ident));
    }
    tokens
}

fn resolve_atom(ident: &str) -> Result<Atom, GrammarError> {
    if let Some(key) = key_from_name(ident) {
        return Ok(Atom::Key(key));
    }
    if let Some(Err(_)) = parse_virtual_index(ident) {
        return Err(GrammarError::InvalidVirtualKey(ident.to_string()));
    }
    if let Some(millis) = ident.strip_suffix("ms") {
        if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
            return Err(GrammarError::InvalidTimeout(ident.to_string()));
        }
        let millis = millis.parse::<u64>().unwrap_or(u64::MAX);
        return Ok(Atom::Timeout(millis_to_timeout(millis)));
    }
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        return match parse_integer_literal(ident) {
            Some(code) if code >= 1 && code <= Key::LAST_PHYSICAL.code() as u64 => {
                Ok(Atom::Key(Key::from(code as u16)))
            }
            _ => Err(GrammarError::InvalidKeyCode(ident.to_string())),
        };
    }
    Err(GrammarError::UnknownKey(ident.to_string()))
}

/// Parse an integer literal with C rules: `0x` hex, leading `0` octal, decimal
fn parse_integer_literal(literal: &str) -> Option<u64> {
    let (digits, radix) = if let Some(hex) = literal
        .strip_prefix("0x")
        .or_else(|| literal.strip_prefix("0X"))
    {
        (hex, 16)
    } else if literal.len() > 1 && literal.starts_with('0') {
        (&literal[1..], 8)
    } else {
        (literal, 10)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

/// Recursive descent compiler emitting directly into a flat event list
struct SequenceParser {
    tokens: Vec<Token>,
    pos: usize,
    is_input: bool,
    has_release_marker: bool,
    sequence: KeySequence,
}

impl SequenceParser {
    fn new(text: &str, is_input: bool) -> Self {
        Self {
            tokens: tokenize(text),
            pos: 0,
            is_input,
            has_release_marker: false,
            sequence: KeySequence::new(),
        }
    }

    fn compile(mut self) -> Result<KeySequence, GrammarError> {
        self.parse_sequence(false)?;
        if self.is_input {
            synchronize_releases_before_timeouts(&mut self.sequence);
        }
        merge_timeouts(&mut self.sequence);
        Ok(self.sequence)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn push(&mut self, key: Key, state: KeyState) {
        self.sequence.push(KeyEvent::new(key, state));
    }

    fn parse_sequence(&mut self, in_hold: bool) -> Result<(), GrammarError> {
        loop {
            match self.peek() {
                None if in_hold => return Err(GrammarError::UnbalancedGroup),
                None => return Ok(()),
                Some(Token::CloseHold) if in_hold => {
                    self.next();
                    return Ok(());
                }
                Some(Token::CloseHold) | Some(Token::CloseGroup) => {
                    return Err(GrammarError::UnbalancedGroup)
                }
                Some(Token::OpenHold) => return Err(GrammarError::HoldWithoutKey),
                Some(_) => self.parse_element(in_hold)?,
            }
        }
    }

    fn parse_element(&mut self, in_hold: bool) -> Result<(), GrammarError> {
        match self.next() {
            Some(Token::Not) => self.parse_not(in_hold),
            Some(Token::ReleaseMarker) => self.parse_release_marker(in_hold),
            Some(Token::OpenGroup) => {
                let keys = self.parse_group_members()?;
                self.emit_keys(&keys, true, in_hold)
            }
            Some(Token::Ident(ident)) => match resolve_atom(&ident)? {
                Atom::Key(key) => self.emit_keys(&[key], false, in_hold),
                Atom::Timeout(millis) => {
                    self.emit_timeout(KeyState::Up, millis)?;
                    self.reject_hold()
                }
            },
            Some(token) => Err(GrammarError::UnexpectedToken(token.describe())),
            None => Err(GrammarError::UnexpectedEnd),
        }
    }

    fn parse_not(&mut self, in_hold: bool) -> Result<(), GrammarError> {
        match self.next() {
            Some(Token::Ident(ident)) => match resolve_atom(&ident)? {
                Atom::Key(key) => {
                    if in_hold {
                        return Err(GrammarError::InvalidNot(format!("'!{}' inside hold", ident)));
                    }
                    if self.peek() == Some(&Token::OpenHold) {
                        return Err(GrammarError::InvalidNot(format!("'!{}' with hold", ident)));
                    }
                    self.push(key, KeyState::Not);
                    Ok(())
                }
                Atom::Timeout(millis) => {
                    if !self.is_input {
                        return Err(GrammarError::NotTimeoutInOutput);
                    }
                    self.emit_timeout(KeyState::Not, millis)?;
                    self.reject_hold()
                }
            },
            Some(Token::OpenGroup) => Err(GrammarError::InvalidNot("group".into())),
            Some(Token::ReleaseMarker) => Err(GrammarError::InvalidNot("release marker".into())),
            Some(token) => Err(GrammarError::UnexpectedToken(token.describe())),
            None => Err(GrammarError::UnexpectedEnd),
        }
    }

    fn parse_release_marker(&mut self, in_hold: bool) -> Result<(), GrammarError> {
        if self.is_input {
            return Err(GrammarError::ReleaseMarkerInInput);
        }
        if in_hold {
            return Err(GrammarError::ReleaseMarkerInGroup);
        }
        if self.has_release_marker {
            return Err(GrammarError::DuplicateReleaseMarker);
        }
        self.has_release_marker = true;
        self.sequence.push(KeyEvent::output_on_release());
        self.reject_hold()
    }

    fn parse_group_members(&mut self) -> Result<Vec<Key>, GrammarError> {
        let mut keys = Vec::new();
        loop {
            match self.next() {
                Some(Token::CloseGroup) if keys.is_empty() => {
                    return Err(GrammarError::UnexpectedToken(")".into()))
                }
                Some(Token::CloseGroup) => return Ok(keys),
                Some(Token::Ident(ident)) => match resolve_atom(&ident)? {
                    Atom::Key(key) => keys.push(key),
                    Atom::Timeout(_) => {
                        return Err(GrammarError::InvalidTimeout(format!("'{}' in group", ident)))
                    }
                },
                Some(Token::Not) => {
                    return Err(GrammarError::InvalidNot("inside group".into()));
                }
                Some(Token::ReleaseMarker) => return Err(GrammarError::ReleaseMarkerInGroup),
                Some(token) => return Err(GrammarError::UnexpectedToken(token.describe())),
                None => return Err(GrammarError::UnbalancedGroup),
            }
        }
    }

    /// Press a key or group, optionally holding it during a following body
    fn emit_keys(&mut self, keys: &[Key], is_group: bool, in_hold: bool) -> Result<(), GrammarError> {
        if is_group && self.is_input {
            for key in keys {
                self.push(*key, KeyState::DownAsync);
            }
        }
        for key in keys {
            self.push(*key, KeyState::Down);
        }

        let mut release = if self.is_input {
            KeyState::UpAsync
        } else {
            KeyState::Up
        };
        if self.peek() == Some(&Token::OpenHold) {
            self.next();
            self.parse_sequence(true)?;
            // a trailing "must not elapse" makes the release part of the timing
            if self.sequence.last().is_some_and(|e| e.is_not_timeout()) {
                release = KeyState::Up;
            }
        } else if is_group && self.is_input && !in_hold && self.peek().is_none() {
            // a group closing the input completes it, its releases are not awaited
            return Ok(());
        }
        for key in keys.iter().rev() {
            self.push(*key, release);
        }
        Ok(())
    }

    fn emit_timeout(&mut self, state: KeyState, millis: u16) -> Result<(), GrammarError> {
        if self.is_input && self.sequence.is_empty() {
            return Err(GrammarError::InvalidTimeout(
                "input must not start with a timeout".into(),
            ));
        }
        self.sequence
            .push(KeyEvent::with_value(Key::TIMEOUT, state, millis));
        Ok(())
    }

    fn reject_hold(&self) -> Result<(), GrammarError> {
        match self.peek() {
            Some(Token::OpenHold) => Err(GrammarError::HoldWithoutKey),
            _ => Ok(()),
        }
    }
}

/// A release directly followed by a timeout has to happen before the timeout
/// starts, so it can no longer be asynchronous.
fn synchronize_releases_before_timeouts(sequence: &mut KeySequence) {
    for i in 1..sequence.len() {
        if sequence[i].is_timeout() && sequence[i - 1].state == KeyState::UpAsync {
            sequence[i - 1].state = KeyState::Up;
        }
    }
}

/// Collapse runs of timeouts with the same polarity into one
fn merge_timeouts(sequence: &mut KeySequence) {
    sequence.dedup_by(|next, prev| {
        if next.is_timeout() && prev.is_timeout() && next.state == prev.state {
            prev.value = sum_timeouts(prev.value, next.value);
            true
        } else {
            false
        }
    });
}
