// Keystage Stage Scenarios
//
// These tests drive the matcher and the stage through complete key
// sequences, the way a device layer and a timer would.
//
// Run with: cargo test --test stage_scenarios

use keystage_core::event::{collect_output, replay_script};
use keystage_core::key::key_from_name;
use keystage_core::timeout::MAX_TIMEOUT_MS;
use keystage_core::{
    parse_input, parse_output, Key, KeyEvent, KeySequence, KeyState, Mapping, MappingOverride,
    MatchResult, SequenceMatcher, Stage,
};

// =========================================================================
// Test Helpers
// =========================================================================

fn key(name: &str) -> Key {
    key_from_name(name).unwrap_or_else(|| panic!("unknown key {}", name))
}

fn down(name: &str) -> KeyEvent {
    KeyEvent::down(key(name))
}

fn up(name: &str) -> KeyEvent {
    KeyEvent::up(key(name))
}

fn mapping(input: &str, output: &str) -> Mapping {
    Mapping::new(parse_input(input).unwrap(), parse_output(output).unwrap())
}

fn stage(mappings: &[(&str, &str)]) -> Stage {
    Stage::new(
        mappings.iter().map(|(i, o)| mapping(i, o)).collect(),
        vec![],
    )
}

fn play(stage: &mut Stage, script: &str) -> KeySequence {
    collect_output(&replay_script(stage, script).unwrap())
}

/// The events a user produces to satisfy an input expression, with `Any`
/// played by `any`
fn user_events(expression: &[KeyEvent], any: Key) -> KeySequence {
    let mut events = KeySequence::new();
    for event in expression {
        if event.is_timeout() {
            if event.is_plain_timeout() {
                events.push(*event);
            }
            continue;
        }
        if event.key.is_virtual() {
            continue;
        }
        let k = if event.key == Key::ANY { any } else { event.key };
        match event.state {
            KeyState::Down => events.push(KeyEvent::down(k)),
            KeyState::Up | KeyState::UpAsync => events.push(KeyEvent::up(k)),
            _ => {}
        }
    }
    events
}

// =========================================================================
// Matcher round trip
// =========================================================================

#[test]
fn test_expressions_match_their_own_events() {
    let expressions = [
        "A",
        "A B",
        "A{B}",
        "A{B{C}}",
        "(A B)",
        "(A B) C",
        "A(B C)",
        "A{(B C)}",
        "(A B){C D}",
        "A !A B",
        "A 1000ms",
        "A{1000ms}",
        "A 1000ms B",
        "A{1000ms B}",
        "A{!1000ms}",
        "A{1000ms !1000ms}",
        "ShiftLeft{A} !ShiftLeft B",
        "Any",
        "A{Any}",
        "Virtual1{A}",
    ];
    let mut matcher = SequenceMatcher::new();
    let is_down = |k: Key| k.is_virtual();

    for text in expressions {
        let expression = parse_input(text).unwrap();
        let events = user_events(&expression, key("Z"));
        assert!(!events.is_empty(), "'{}' produced no events", text);

        for len in 1..events.len() {
            let result = matcher.match_sequence(&expression, &events[..len], is_down);
            assert_ne!(
                result,
                MatchResult::NoMatch,
                "'{}' rejected prefix of length {}",
                text,
                len
            );
        }
        assert_eq!(
            matcher.match_sequence(&expression, &events, is_down),
            MatchResult::Match,
            "'{}' did not match its events",
            text
        );
    }
}

// =========================================================================
// Stage scenarios
// =========================================================================

#[test]
fn test_forwarded_keys_keep_order() {
    let mut stage = stage(&[("A B", "X")]);
    let output = play(&mut stage, "+ShiftLeft\n+A\n-A\n+C\n-C\n-ShiftLeft\n");
    assert_eq!(
        output,
        vec![
            down("ShiftLeft"),
            down("A"),
            up("A"),
            down("C"),
            up("C"),
            up("ShiftLeft"),
        ]
    );
    assert!(stage.is_clear());
}

#[test]
fn test_sequence_mapping() {
    let mut stage = stage(&[("A B", "X")]);
    let output = play(&mut stage, "+A\n-A\n+B\n-B\n");
    assert_eq!(output, vec![down("X"), up("X")]);
    assert!(stage.is_clear());
}

#[test]
fn test_hold_mapping() {
    let mut stage = stage(&[("ControlLeft{C}", "(ControlLeft Insert)")]);
    let output = play(&mut stage, "+ControlLeft\n+C\n-C\n+C\n-C\n-ControlLeft\n");
    assert_eq!(
        output,
        vec![
            down("ControlLeft"),
            down("Insert"),
            up("Insert"),
            up("ControlLeft"),
            down("ControlLeft"),
            down("Insert"),
            up("Insert"),
            up("ControlLeft"),
        ]
    );
    assert!(stage.is_clear());
}

#[test]
fn test_held_modifier_reaches_other_keys() {
    let mut stage = stage(&[("ShiftLeft{A}", "B")]);
    let output = play(
        &mut stage,
        "+ShiftLeft\n+A\n-A\n+A\n-A\n+K\n-K\n-ShiftLeft\n",
    );
    assert_eq!(
        output,
        vec![
            down("B"),
            up("B"),
            down("B"),
            up("B"),
            down("ShiftLeft"),
            down("K"),
            up("K"),
            up("ShiftLeft"),
        ]
    );
    assert!(stage.is_clear());
}

#[test]
fn test_confirmed_match_survives_failed_longer_mapping() {
    let mut stage = stage(&[("A", "Y"), ("A B C", "X")]);
    let output = play(&mut stage, "+A\n+B\n+D\n-D\n-B\n-A\n");
    assert_eq!(
        output,
        vec![
            down("Y"),
            down("B"),
            down("D"),
            up("D"),
            up("B"),
            up("Y"),
        ]
    );
    assert!(stage.is_clear());
}

#[test]
fn test_tap_hold() {
    let mappings = [
        ("CapsLock{!250ms}", "Escape"),
        ("CapsLock", "ControlLeft"),
    ];

    let mut tap = stage(&mappings);
    assert_eq!(
        play(&mut tap, "+CapsLock\nwait 100\n-CapsLock\n"),
        vec![down("Escape"), up("Escape")]
    );
    assert!(tap.is_clear());

    let mut hold = stage(&mappings);
    assert_eq!(
        play(&mut hold, "+CapsLock\nwait 300\n+C\n-C\n-CapsLock\n"),
        vec![
            down("ControlLeft"),
            down("C"),
            up("C"),
            up("ControlLeft"),
        ]
    );
    assert!(hold.is_clear());
}

#[test]
fn test_timeout_request_is_cancelled_by_match() {
    let mut stage = stage(&[("A{500ms}", "X")]);
    assert!(stage.update(down("A")).is_empty());
    assert_eq!(stage.timeout_request(), Some(500));
    assert_eq!(stage.update(up("A")), vec![down("A"), up("A")]);
    assert_eq!(stage.timeout_request(), None);
}

#[test]
fn test_requested_timeout_is_clamped() {
    let mut stage = stage(&[("A 10000000ms", "X")]);
    assert!(stage.update(down("A")).is_empty());
    assert!(stage.update(up("A")).is_empty());
    assert_eq!(stage.timeout_request(), Some(MAX_TIMEOUT_MS));
}

#[test]
fn test_output_pause_passes_through() {
    let mut stage = stage(&[("A", "B 100ms C")]);
    assert_eq!(
        stage.update(down("A")),
        vec![
            down("B"),
            up("B"),
            KeyEvent::with_value(Key::TIMEOUT, KeyState::Up, 100),
            down("C"),
            up("C"),
        ]
    );
}

#[test]
fn test_any_output_is_trigger() {
    let mut stage = stage(&[("ShiftLeft{Any}", "Any Any")]);
    let output = play(&mut stage, "+ShiftLeft\n+K\n-K\n-ShiftLeft\n");
    assert_eq!(output, vec![down("K"), up("K"), down("K"), up("K")]);
}

#[test]
fn test_release_phase_on_trigger_release() {
    let mut stage = stage(&[("A", "B ^ C")]);
    let output = play(&mut stage, "+A\nwait 1000\n-A\n");
    assert_eq!(output, vec![down("B"), up("B"), down("C"), up("C")]);
}

#[test]
fn test_autorepeat_repeats_output() {
    let mut stage = stage(&[("A", "B")]);
    let output = play(&mut stage, "+A\n+A\n+A\n-A\n");
    assert_eq!(output, vec![down("B"), down("B"), down("B"), up("B")]);
}

#[test]
fn test_validate_state_releases_stuck_output() {
    let mut stage = stage(&[("A", "B"), ("C D", "X")]);
    assert_eq!(stage.update(down("A")), vec![down("B")]);
    assert!(stage.update(down("C")).is_empty());

    // A and C were released while events got lost
    let output = stage.validate_state(|_| false);
    assert_eq!(output, vec![up("B")]);
    assert!(!stage.is_output_down(key("B")));
    assert!(stage.sequence().is_empty());
    assert!(stage.is_clear());

    // nothing left to release
    assert!(stage.validate_state(|_| false).is_empty());
}

#[test]
fn test_validate_state_keeps_held_output() {
    let mut stage = stage(&[("A", "B")]);
    stage.update(down("A"));
    let a = key("A");
    assert!(stage.validate_state(|k| k == a).is_empty());
    assert!(stage.is_output_down(key("B")));
}

#[test]
fn test_override_set_replaces_output() {
    let mappings = vec![
        mapping("A", "B"),
        mapping("C", "D"),
        mapping("E", "F"),
    ];
    let overrides = vec![vec![MappingOverride::new(2, parse_output("G").unwrap())]];
    let mut stage = Stage::new(mappings, overrides);

    stage.activate_override_set(Some(0));
    assert_eq!(stage.update(down("E")), vec![down("G")]);
    assert_eq!(stage.update(up("E")), vec![up("G")]);
    // mappings without override keep their output
    assert_eq!(stage.update(down("A")), vec![down("B")]);
    assert_eq!(stage.update(up("A")), vec![up("B")]);

    stage.activate_override_set(None);
    assert_eq!(stage.update(down("E")), vec![down("F")]);
    assert_eq!(stage.update(up("E")), vec![up("F")]);
}

#[test]
fn test_override_does_not_affect_held_output() {
    let overrides = vec![vec![MappingOverride::new(0, parse_output("C").unwrap())]];
    let mut stage = Stage::new(vec![mapping("A", "B")], overrides);
    assert_eq!(stage.update(down("A")), vec![down("B")]);
    stage.activate_override_set(Some(0));
    assert_eq!(stage.update(up("A")), vec![up("B")]);
}

#[test]
fn test_context_switch_in_script() {
    let overrides = vec![vec![MappingOverride::new(0, parse_output("C").unwrap())]];
    let mut stage = Stage::new(vec![mapping("A", "B")], overrides);
    let output = play(&mut stage, "+A\n-A\ncontext 0\n+A\n-A\ncontext none\n+A\n-A\n");
    assert_eq!(
        output,
        vec![
            down("B"),
            up("B"),
            down("C"),
            up("C"),
            down("B"),
            up("B"),
        ]
    );
}

#[test]
fn test_virtual_key_layer() {
    let mut stage = stage(&[("ScrollLock", "Virtual1"), ("Virtual1{J}", "ArrowDown")]);
    let output = play(
        &mut stage,
        "+J\n-J\n+ScrollLock\n-ScrollLock\n+J\n-J\n+ScrollLock\n-ScrollLock\n+J\n-J\n",
    );
    assert_eq!(
        output,
        vec![
            down("J"),
            up("J"),
            down("ArrowDown"),
            up("ArrowDown"),
            down("J"),
            up("J"),
        ]
    );
}
