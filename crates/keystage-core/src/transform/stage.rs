// Keystage Stage
// Runtime driver turning physical key events into output key events
//
// The stage buffers input events until the matcher can decide on them,
// applies the output of matched mappings and keeps track of which output
// keys are down on behalf of which input key.

use smallvec::SmallVec;

use crate::key_event::format_sequence;
use crate::mapping::resolve_output;
use crate::output::{OutputDown, OutputState};
use crate::transform::matcher::{MappingMatch, SequenceMatcher};
use crate::{Key, KeyEvent, KeySequence, KeyState, Mapping, MappingOverrideSet};

/// The remapping state machine of one input device
#[derive(Debug)]
pub struct Stage {
    mappings: Vec<Mapping>,
    override_sets: Vec<MappingOverrideSet>,
    active_override_set: Option<usize>,
    matcher: SequenceMatcher,
    /// Input events which were not resolved yet, after the presses of
    /// matched keys which are still held
    sequence: KeySequence,
    /// Number of leading matched presses in `sequence`
    held_len: usize,
    sequence_might_match: bool,
    /// Physical keys currently held
    input_down: SmallVec<[Key; 8]>,
    output_down: OutputState,
    /// Virtual keys toggled on
    virtual_keys_down: SmallVec<[Key; 4]>,
    /// Output to play when the trigger is released
    release_phases: Vec<(Key, KeySequence)>,
    output_buffer: KeySequence,
    timeout_request: Option<u16>,
}

impl Stage {
    pub fn new(mappings: Vec<Mapping>, override_sets: Vec<MappingOverrideSet>) -> Self {
        Self {
            mappings,
            override_sets,
            active_override_set: None,
            matcher: SequenceMatcher::new(),
            sequence: KeySequence::new(),
            held_len: 0,
            sequence_might_match: false,
            input_down: SmallVec::new(),
            output_down: OutputState::new(),
            virtual_keys_down: SmallVec::new(),
            release_phases: Vec::new(),
            output_buffer: KeySequence::new(),
            timeout_request: None,
        }
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn override_sets(&self) -> &[MappingOverrideSet] {
        &self.override_sets
    }

    pub fn active_override_set(&self) -> Option<usize> {
        self.active_override_set
    }

    /// The input events waiting for a decision, including the presses of
    /// matched keys which are still held
    pub fn sequence(&self) -> &[KeyEvent] {
        &self.sequence
    }

    /// Milliseconds after which the last `update` wants a timeout event.
    ///
    /// `None` cancels any earlier request.
    pub fn timeout_request(&self) -> Option<u16> {
        self.timeout_request
    }

    pub fn is_output_down(&self, key: Key) -> bool {
        self.output_down.is_down(key)
    }

    pub fn is_virtual_key_down(&self, key: Key) -> bool {
        self.virtual_keys_down.contains(&key)
    }

    /// No input pending and no output key held
    pub fn is_clear(&self) -> bool {
        self.sequence.is_empty() && self.output_down.is_empty() && self.input_down.is_empty()
    }

    /// Hand back a sequence returned by [`Stage::update`] so its allocation
    /// can be reused
    pub fn reuse_buffer(&mut self, mut buffer: KeySequence) {
        buffer.clear();
        if buffer.capacity() > self.output_buffer.capacity() {
            self.output_buffer = buffer;
        }
    }

    /// Select the override set used by mappings matched from now on
    pub fn activate_override_set(&mut self, index: Option<usize>) {
        self.active_override_set = match index {
            Some(index) if index >= self.override_sets.len() => {
                log::warn!(
                    "override set {} does not exist ({} configured), deactivating overrides",
                    index,
                    self.override_sets.len()
                );
                None
            }
            index => index,
        };
        log::debug!("active override set: {:?}", self.active_override_set);
    }

    /// Process one physical key event or one timeout notification and
    /// return the output events to apply
    pub fn update(&mut self, event: KeyEvent) -> KeySequence {
        self.output_buffer.clear();
        self.timeout_request = None;
        log::trace!("update {}", event);

        if event.is_timeout() {
            if !self.is_pending() {
                return std::mem::take(&mut self.output_buffer);
            }
            self.sequence.push(event);
        } else {
            match event.state {
                KeyState::Down if self.input_down.contains(&event.key) => {
                    // autorepeat
                    if !self.sequence.iter().any(|e| e.key == event.key) {
                        self.repeat_triggered(event.key);
                    }
                }
                KeyState::Down => {
                    self.input_down.push(event.key);
                    self.sequence.push(event);
                }
                KeyState::Up => {
                    self.input_down.retain(|k| *k != event.key);
                    self.release_input(event);
                }
                state => log::warn!("ignoring input event with state {:?}", state),
            }
        }

        self.process();
        std::mem::take(&mut self.output_buffer)
    }

    /// Reconcile the held keys with the keys `is_down` reports as held and
    /// release what got stuck
    pub fn validate_state<F>(&mut self, is_down: F) -> KeySequence
    where
        F: Fn(Key) -> bool,
    {
        self.output_buffer.clear();

        self.input_down.retain(|key| {
            let down = is_down(*key);
            if !down {
                log::warn!("input key {} is no longer down", key);
            }
            down
        });

        let stale_sequence = self
            .sequence
            .iter()
            .any(|e| e.state == KeyState::Down && !e.is_timeout() && !is_down(e.key));
        if stale_sequence {
            log::warn!(
                "discarding pending input {}",
                format_sequence(&self.sequence)
            );
            self.sequence.clear();
            self.held_len = 0;
            self.sequence_might_match = false;
            self.timeout_request = None;
        }

        self.release_phases.retain(|(trigger, _)| is_down(*trigger));

        let mut triggers: SmallVec<[Key; 8]> = SmallVec::new();
        for entry in self.output_down.entries() {
            if !is_down(entry.trigger) && !triggers.contains(&entry.trigger) {
                triggers.push(entry.trigger);
            }
        }
        for trigger in triggers {
            log::warn!("releasing output keys stuck by {}", trigger);
            self.release_triggered(trigger);
        }

        std::mem::take(&mut self.output_buffer)
    }

    /// Whether there is input beyond the held presses
    fn is_pending(&self) -> bool {
        self.sequence.len() > self.held_len
    }

    fn process(&mut self) {
        while self.is_pending() {
            match self.find_mapping(self.sequence.len(), false) {
                MappingMatch::MightMatch { timeout } => {
                    self.sequence_might_match = true;
                    self.timeout_request = timeout;
                    log::trace!(
                        "might match {} (timeout {:?})",
                        format_sequence(&self.sequence),
                        timeout
                    );
                    return;
                }
                MappingMatch::Match(index) => self.apply_match(index),
                MappingMatch::NoMatch => {
                    if self.sequence_might_match && self.resolve_confirmed_prefix() {
                        continue;
                    }
                    self.sequence_might_match = false;
                    self.forward_from_sequence();
                }
            }
        }
    }

    /// Take the longest prefix of the buffer which completes a mapping and
    /// put the events after it back
    fn resolve_confirmed_prefix(&mut self) -> bool {
        for len in (self.held_len + 1..self.sequence.len()).rev() {
            if let MappingMatch::Match(index) = self.find_mapping(len, true) {
                let rest = self.sequence.split_off(len);
                log::trace!("resolving prefix, requeueing {}", format_sequence(&rest));
                self.apply_match(index);
                for event in rest {
                    self.requeue(event);
                }
                return true;
            }
        }
        false
    }

    /// Apply a match of the whole buffer. Presses of other keys which are
    /// still held stay in the buffer, so they can form the next match.
    fn apply_match(&mut self, index: usize) {
        let trigger = self.sequence_trigger();
        let sequence = std::mem::take(&mut self.sequence);
        for (i, event) in sequence.iter().enumerate() {
            let held = event.state == KeyState::Down
                && event.key.is_physical()
                && event.key != trigger
                && self.input_down.contains(&event.key)
                && !sequence[i + 1..].iter().any(|e| e.key == event.key)
                && !self.sequence.iter().any(|e| e.key == event.key);
            if held {
                self.sequence.push(*event);
            }
        }
        self.held_len = self.sequence.len();
        self.sequence_might_match = false;
        self.apply_mapping(index, trigger);
    }

    fn find_mapping(&mut self, len: usize, accept_might_match: bool) -> MappingMatch {
        let input_down = &self.input_down;
        let virtual_keys_down = &self.virtual_keys_down;
        self.matcher.find_mapping(
            &self.mappings,
            &self.sequence[..len],
            accept_might_match,
            |key| {
                if key.is_virtual() {
                    virtual_keys_down.contains(&key)
                } else {
                    input_down.contains(&key)
                }
            },
        )
    }

    /// The key of the last press in the buffer
    fn sequence_trigger(&self) -> Key {
        self.sequence
            .iter()
            .rev()
            .find(|e| e.state == KeyState::Down && !e.is_timeout())
            .map(|e| e.key)
            .unwrap_or(Key::NONE)
    }

    /// Put an event back into the resolved buffer
    fn requeue(&mut self, event: KeyEvent) {
        match event.state {
            _ if event.is_timeout() => {}
            KeyState::Up => self.release_input(event),
            _ => self.sequence.push(event),
        }
    }

    /// Route the release of an input key
    fn release_input(&mut self, event: KeyEvent) {
        let key = event.key;
        if !self.is_pending() {
            // a held press of an earlier match ends
            if let Some(pos) = self.sequence.iter().position(|e| e.key == key) {
                self.sequence.remove(pos);
                self.held_len -= 1;
            }
            self.release_triggered(key);
            return;
        }
        let pending = self
            .sequence
            .iter()
            .any(|e| e.key == key && e.state == KeyState::Down);
        if pending {
            self.sequence.push(event);
        } else {
            self.release_triggered(key);
        }
    }

    /// Pass the first buffered event through unmapped
    fn forward_from_sequence(&mut self) {
        let event = self.sequence.remove(0);
        self.held_len = self.held_len.saturating_sub(1);
        if event.state == KeyState::Down && !event.is_timeout() {
            log::trace!("forwarding {}", event);
            let key = event.key;
            if self.output_down.is_suppressed(key) {
                let mut entry = OutputDown::new(key, key);
                entry.temporarily_released = true;
                self.output_down.push(entry);
            } else if let Some(index) = self.output_down.position(key) {
                self.press_existing(index);
            } else {
                self.output_down.push(OutputDown::new(key, key));
                self.output_buffer.push(KeyEvent::down(key));
            }

            // its release is no longer part of the pending input
            if let Some(pos) = self
                .sequence
                .iter()
                .position(|e| e.key == key && e.state == KeyState::Up)
            {
                self.sequence.remove(pos);
                self.release_triggered(key);
            }
        }

        while let Some(first) = self.sequence.first().copied() {
            if !first.is_timeout() && first.state == KeyState::Down {
                break;
            }
            self.sequence.remove(0);
            if !first.is_timeout() {
                self.release_triggered(first.key);
            }
        }
    }

    fn apply_mapping(&mut self, index: usize, trigger: Key) {
        let override_set = self
            .active_override_set
            .and_then(|set| self.override_sets.get(set));
        let output = resolve_output(&self.mappings, override_set, index).clone();
        log::debug!(
            "mapping {} ({}) triggered by {}: {}",
            index,
            self.mappings[index],
            trigger,
            format_sequence(&output)
        );

        let (press, release) = match output
            .iter()
            .position(|e| e.state == KeyState::OutputOnRelease)
        {
            Some(pos) => (&output[..pos], &output[pos + 1..]),
            None => (&output[..], &[][..]),
        };

        match chord_press_len(press) {
            // the releases are deferred until the trigger is released
            Some(len) => self.apply_output(&press[..len], trigger),
            None => self.apply_output(press, trigger),
        }

        self.release_phases.retain(|(k, _)| *k != trigger);
        if !release.is_empty() {
            self.release_phases.push((trigger, release.to_vec()));
        }

        if !self.input_down.contains(&trigger) {
            self.release_triggered(trigger);
        }
    }

    fn apply_output(&mut self, events: &[KeyEvent], trigger: Key) {
        for event in events {
            if event.is_timeout() {
                self.output_buffer.push(*event);
                continue;
            }
            let key = if event.key == Key::ANY {
                trigger
            } else {
                event.key
            };
            if key.is_virtual() {
                if event.state == KeyState::Down {
                    self.toggle_virtual_key(key);
                }
                continue;
            }
            match event.state {
                KeyState::Down => self.press_output(key, trigger),
                KeyState::Up => self.release_output(key),
                KeyState::Not => self.suppress_output(key, trigger),
                _ => {}
            }
        }
    }

    fn toggle_virtual_key(&mut self, key: Key) {
        if let Some(pos) = self.virtual_keys_down.iter().position(|k| *k == key) {
            self.virtual_keys_down.remove(pos);
        } else {
            self.virtual_keys_down.push(key);
        }
        log::debug!("{} toggled {}", key, if self.is_virtual_key_down(key) { "on" } else { "off" });
    }

    fn press_output(&mut self, key: Key, trigger: Key) {
        match self.output_down.position(key) {
            Some(index) => self.press_existing(index),
            None => {
                self.output_down.push(OutputDown::new(key, trigger));
                self.output_buffer.push(KeyEvent::down(key));
            }
        }
    }

    /// Press a key which already has an entry
    fn press_existing(&mut self, index: usize) {
        if let Some(entry) = self.output_down.get_mut(index) {
            if entry.temporarily_released {
                entry.temporarily_released = false;
            } else {
                entry.pressed_twice = true;
            }
            self.output_buffer.push(KeyEvent::down(entry.key));
        }
    }

    fn release_output(&mut self, key: Key) {
        let Some(index) = self.output_down.position(key) else {
            return;
        };
        if let Some(entry) = self.output_down.get_mut(index) {
            if entry.pressed_twice {
                entry.pressed_twice = false;
                return;
            }
        }
        let entry = self.output_down.remove(index);
        if entry.is_down() {
            self.output_buffer.push(KeyEvent::up(key));
        }
    }

    /// Release `key` on the output while `trigger` is held
    fn suppress_output(&mut self, key: Key, trigger: Key) {
        for entry in self.output_down.iter_mut() {
            if entry.key == key && entry.is_down() {
                entry.temporarily_released = true;
                self.output_buffer.push(KeyEvent::up(key));
            }
        }
        self.output_down.push(OutputDown::suppression(key, trigger));
    }

    fn repeat_triggered(&mut self, trigger: Key) {
        self.output_buffer
            .extend(self.output_down.keys_down_for(trigger).map(KeyEvent::down));
    }

    /// Release everything `trigger` holds on the output and play its release
    /// phase
    fn release_triggered(&mut self, trigger: Key) {
        let entries = self.output_down.take_triggered(trigger);
        for entry in entries.iter().rev() {
            if entry.is_down() {
                self.output_buffer.push(KeyEvent::up(entry.key));
            }
        }

        // keys the trigger negated come back while their own trigger is held
        for suppression in entries.iter().filter(|e| e.suppressed) {
            if self.output_down.is_suppressed(suppression.key) {
                continue;
            }
            for entry in self.output_down.iter_mut() {
                if entry.key == suppression.key
                    && entry.temporarily_released
                    && self.input_down.contains(&entry.trigger)
                {
                    entry.temporarily_released = false;
                    self.output_buffer.push(KeyEvent::down(entry.key));
                }
            }
        }

        if let Some(pos) = self.release_phases.iter().position(|(k, _)| *k == trigger) {
            let (_, release) = self.release_phases.remove(pos);
            log::trace!("release phase of {}: {}", trigger, format_sequence(&release));
            self.apply_output(&release, trigger);
            for entry in self.output_down.take_triggered(trigger).iter().rev() {
                if entry.is_down() {
                    self.output_buffer.push(KeyEvent::up(entry.key));
                }
            }
        }
    }
}

/// Length of the presses of an output which is a plain chord, where the
/// releases mirror the presses (`+A +B -B -A`). Leading negations are part
/// of the chord.
fn chord_press_len(press: &[KeyEvent]) -> Option<usize> {
    let is_key = |e: &KeyEvent| !e.is_timeout() && !e.key.is_virtual();
    let nots = press
        .iter()
        .take_while(|e| e.state == KeyState::Not && is_key(*e))
        .count();
    let downs = press[nots..]
        .iter()
        .take_while(|e| e.state == KeyState::Down && is_key(*e))
        .count();
    if downs == 0 || press.len() != nots + 2 * downs {
        return None;
    }
    let presses = &press[nots..nots + downs];
    let releases = &press[nots + downs..];
    let mirrored = presses
        .iter()
        .rev()
        .zip(releases)
        .all(|(down, up)| up.state == KeyState::Up && up.key == down.key);
    mirrored.then_some(nots + downs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_input, parse_output};
    use crate::MappingOverride;

    const A: Key = Key(30);
    const B: Key = Key(48);
    const C: Key = Key(46);
    const X: Key = Key(45);

    fn mapping(input: &str, output: &str) -> Mapping {
        Mapping::new(parse_input(input).unwrap(), parse_output(output).unwrap())
    }

    fn down(key: Key) -> KeyEvent {
        KeyEvent::down(key)
    }

    fn up(key: Key) -> KeyEvent {
        KeyEvent::up(key)
    }

    #[test]
    fn test_unmapped_keys_pass_through() {
        let mut stage = Stage::new(vec![mapping("A", "B")], vec![]);
        assert_eq!(stage.update(down(C)), vec![down(C)]);
        assert!(stage.is_output_down(C));
        assert_eq!(stage.update(up(C)), vec![up(C)]);
        assert!(stage.is_clear());
    }

    #[test]
    fn test_chord_output_is_held_with_trigger() {
        let mut stage = Stage::new(vec![mapping("A", "B")], vec![]);
        assert_eq!(stage.update(down(A)), vec![down(B)]);
        assert!(stage.is_output_down(B));
        assert_eq!(stage.update(down(A)), vec![down(B)]);
        assert_eq!(stage.update(up(A)), vec![up(B)]);
        assert!(!stage.is_output_down(B));
    }

    #[test]
    fn test_sequence_output_plays_completely() {
        let mut stage = Stage::new(vec![mapping("A", "B C")], vec![]);
        assert_eq!(stage.update(down(A)), vec![down(B), up(B), down(C), up(C)]);
        assert!(stage.update(up(A)).is_empty());
    }

    #[test]
    fn test_release_phase() {
        let mut stage = Stage::new(vec![mapping("A", "B ^ C")], vec![]);
        assert_eq!(stage.update(down(A)), vec![down(B)]);
        assert_eq!(stage.update(up(A)), vec![up(B), down(C), up(C)]);
    }

    #[test]
    fn test_might_match_holds_output() {
        let mut stage = Stage::new(vec![mapping("A B", "X")], vec![]);
        assert!(stage.update(down(A)).is_empty());
        assert_eq!(stage.sequence(), &[down(A)]);
        assert_eq!(stage.update(down(B)), vec![down(X)]);
        assert!(stage.update(up(A)).is_empty());
        assert_eq!(stage.update(up(B)), vec![up(X)]);
    }

    #[test]
    fn test_no_match_forwards_buffer() {
        let mut stage = Stage::new(vec![mapping("A B", "X")], vec![]);
        assert!(stage.update(down(A)).is_empty());
        assert_eq!(stage.update(down(C)), vec![down(A), down(C)]);
        assert_eq!(stage.update(up(A)), vec![up(A)]);
        assert_eq!(stage.update(up(C)), vec![up(C)]);
    }

    #[test]
    fn test_shorter_mapping_resolves_when_longer_fails() {
        let mut stage = Stage::new(vec![mapping("A B", "X"), mapping("A", "Y")], vec![]);
        let y = parse_output("Y").unwrap()[0].key;
        assert!(stage.update(down(A)).is_empty());
        assert_eq!(stage.update(down(C)), vec![down(y), down(C)]);
        assert_eq!(stage.update(up(A)), vec![up(y)]);
    }

    #[test]
    fn test_held_key_forms_next_match() {
        let shift = Key(42);
        let mut stage = Stage::new(vec![mapping("ShiftLeft{A}", "B")], vec![]);
        assert!(stage.update(down(shift)).is_empty());
        assert_eq!(stage.update(down(A)), vec![down(B)]);
        assert_eq!(stage.sequence(), &[down(shift)]);
        assert_eq!(stage.update(up(A)), vec![up(B)]);
        assert_eq!(stage.update(down(A)), vec![down(B)]);
        assert_eq!(stage.update(up(A)), vec![up(B)]);
        assert!(stage.update(up(shift)).is_empty());
        assert!(stage.is_clear());
    }

    #[test]
    fn test_held_key_is_forwarded_before_other_keys() {
        let shift = Key(42);
        let mut stage = Stage::new(vec![mapping("ShiftLeft{A}", "B")], vec![]);
        stage.update(down(shift));
        stage.update(down(A));
        stage.update(up(A));
        assert_eq!(stage.update(down(C)), vec![down(shift), down(C)]);
        assert_eq!(stage.update(up(C)), vec![up(C)]);
        // the forwarded key no longer forms the mapping
        assert_eq!(stage.update(down(A)), vec![down(A)]);
        assert_eq!(stage.update(up(A)), vec![up(A)]);
        assert_eq!(stage.update(up(shift)), vec![up(shift)]);
        assert!(stage.is_clear());
    }

    #[test]
    fn test_held_key_timeout_is_ignored() {
        let shift = Key(42);
        let mut stage = Stage::new(vec![mapping("ShiftLeft{A}", "B")], vec![]);
        stage.update(down(shift));
        stage.update(down(A));
        let timeout = crate::timeout::make_input_timeout_event(std::time::Duration::from_millis(50));
        assert!(stage.update(timeout).is_empty());
        assert_eq!(stage.sequence(), &[down(shift)]);
    }

    #[test]
    fn test_earlier_match_is_taken_when_longer_fails() {
        let y = parse_output("Y").unwrap()[0].key;
        let d = Key(32);
        let mut stage = Stage::new(vec![mapping("A", "Y"), mapping("A B C", "X")], vec![]);
        assert!(stage.update(down(A)).is_empty());
        assert!(stage.update(down(B)).is_empty());
        assert_eq!(stage.update(down(d)), vec![down(y), down(B), down(d)]);
        assert_eq!(stage.update(up(d)), vec![up(d)]);
        assert_eq!(stage.update(up(B)), vec![up(B)]);
        assert_eq!(stage.update(up(A)), vec![up(y)]);
        assert!(stage.is_clear());
    }

    #[test]
    fn test_timeout_request() {
        let mut stage = Stage::new(vec![mapping("A{500ms}", "X")], vec![]);
        assert!(stage.update(down(A)).is_empty());
        assert_eq!(stage.timeout_request(), Some(500));
        let timeout = crate::timeout::make_input_timeout_event(std::time::Duration::from_millis(500));
        assert_eq!(stage.update(timeout), vec![down(X)]);
        assert_eq!(stage.timeout_request(), None);
        assert_eq!(stage.update(up(A)), vec![up(X)]);
    }

    #[test]
    fn test_output_not_releases_held_key() {
        let shift = Key(42);
        let mut stage = Stage::new(vec![mapping("A", "!ShiftLeft B")], vec![]);
        assert_eq!(stage.update(down(shift)), vec![down(shift)]);
        assert_eq!(stage.update(down(A)), vec![up(shift), down(B)]);
        assert_eq!(stage.update(up(A)), vec![up(B), down(shift)]);
        assert_eq!(stage.update(up(shift)), vec![up(shift)]);
    }

    #[test]
    fn test_virtual_key_toggle() {
        let mut stage = Stage::new(
            vec![mapping("Virtual1{A}", "X"), mapping("C", "Virtual1")],
            vec![],
        );
        assert_eq!(stage.update(down(A)), vec![down(A)]);
        assert_eq!(stage.update(up(A)), vec![up(A)]);
        assert!(stage.update(down(C)).is_empty());
        assert!(stage.update(up(C)).is_empty());
        assert!(stage.is_virtual_key_down(Key::virtual_key(1)));
        assert_eq!(stage.update(down(A)), vec![down(X)]);
    }

    #[test]
    fn test_override_set() {
        let overrides = vec![vec![MappingOverride::new(0, parse_output("C").unwrap())]];
        let mut stage = Stage::new(vec![mapping("A", "B")], overrides);
        stage.activate_override_set(Some(0));
        assert_eq!(stage.update(down(A)), vec![down(C)]);
        assert_eq!(stage.update(up(A)), vec![up(C)]);
        stage.activate_override_set(None);
        assert_eq!(stage.update(down(A)), vec![down(B)]);
        assert_eq!(stage.update(up(A)), vec![up(B)]);
    }

    #[test]
    fn test_invalid_override_set_deactivates() {
        let mut stage = Stage::new(vec![], vec![vec![]]);
        stage.activate_override_set(Some(0));
        assert_eq!(stage.active_override_set(), Some(0));
        stage.activate_override_set(Some(3));
        assert_eq!(stage.active_override_set(), None);
    }

    #[test]
    fn test_validate_state_releases_stuck_keys() {
        let mut stage = Stage::new(vec![mapping("A", "B")], vec![]);
        assert_eq!(stage.update(down(A)), vec![down(B)]);
        assert!(stage.validate_state(|k| k == A).is_empty());
        assert_eq!(stage.validate_state(|_| false), vec![up(B)]);
        assert!(!stage.is_output_down(B));
        assert!(stage.is_clear());
    }

    #[test]
    fn test_chord_press_len() {
        let chord = |text: &str| chord_press_len(&parse_output(text).unwrap());
        assert_eq!(chord("B"), Some(1));
        assert_eq!(chord("(B C)"), Some(2));
        assert_eq!(chord("ShiftLeft{B}"), Some(2));
        assert_eq!(chord("!ShiftLeft B"), Some(2));
        assert_eq!(chord("B C"), None);
        assert_eq!(chord("B 100ms"), None);
        assert_eq!(chord(""), None);
    }
}
