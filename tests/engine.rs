//! Key-sequence state machine scenarios
//!
//! End-to-end runs of the documented engine behaviors: chord sequences,
//! timeout ambiguity, counts with computed args, and the reset invariant.

mod common;

use common::{dispatched, engine_from_json, feed, scheduled_timeout};
use keyloom::keymap::{EngineState, Event};

#[test]
fn test_emacs_style_sequences() {
    // ctrl+x enters the prefix, ctrl+s then dispatches save
    let mut engine = engine_from_json(
        r#"{
            "modes": [{"name": "normal"}],
            "bindings": [
                {"key": "ctrl+x ctrl+s", "command": "save", "mode": "normal"},
                {"key": "ctrl+x ctrl+f", "command": "open", "mode": "normal"}
            ]
        }"#,
    );

    let effects = feed(&mut engine, "ctrl+x");
    assert!(dispatched(&effects).is_empty());
    assert_eq!(engine.machine_state(), EngineState::AccumulatingPrefix);

    let effects = feed(&mut engine, "ctrl+s");
    let invocations = dispatched(&effects);
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].command, "save");
    assert!(engine.state().is_empty());

    // The other branch of the prefix still works afterwards
    feed(&mut engine, "ctrl+x");
    let effects = feed(&mut engine, "ctrl+f");
    assert_eq!(dispatched(&effects)[0].command, "open");
}

#[test]
fn test_timeout_fires_shorter_binding() {
    let mut engine = engine_from_json(
        r#"{"bindings": [
            {"key": "g", "command": "gotoLineStart"},
            {"key": "g g", "command": "gotoFileStart"}
        ]}"#,
    );

    let effects = feed(&mut engine, "g");
    assert!(dispatched(&effects).is_empty());
    assert_eq!(engine.machine_state(), EngineState::AwaitingTimeout);
    let generation = scheduled_timeout(&effects).expect("timer scheduled");

    let effects = engine.handle(Event::TimeoutElapsed(generation));
    let invocations = dispatched(&effects);
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].command, "gotoLineStart");
    // No args were declared
    assert!(invocations[0].args.is_null());
    assert!(engine.state().is_empty());
}

#[test]
fn test_second_key_cancels_timer_and_fires_longer_binding() {
    let mut engine = engine_from_json(
        r#"{"bindings": [
            {"key": "g", "command": "gotoLineStart"},
            {"key": "g g", "command": "gotoFileStart"}
        ]}"#,
    );

    let effects = feed(&mut engine, "g");
    let generation = scheduled_timeout(&effects).unwrap();

    let effects = feed(&mut engine, "g");
    assert_eq!(dispatched(&effects)[0].command, "gotoFileStart");

    // The cancelled timer firing late must be a no-op
    assert!(engine.handle(Event::TimeoutElapsed(generation)).is_empty());
    assert!(engine.state().is_empty());
    assert_eq!(engine.machine_state(), EngineState::Idle);
}

#[test]
fn test_count_feeds_computed_args() {
    let mut engine = engine_from_json(
        r#"{"bindings": [{"key": "d", "command": "delete",
            "args": {"amount": {"computed": "count * 2"}}}]}"#,
    );

    feed(&mut engine, "3");
    let effects = feed(&mut engine, "d");
    let invocations = dispatched(&effects);
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].args, serde_json::json!({"amount": 6}));
    assert_eq!(invocations[0].count, 3);
}

#[test]
fn test_reset_property_after_every_outcome() {
    let mut engine = engine_from_json(
        r#"{"bindings": [
            {"key": "ctrl+x ctrl+s", "command": "save"},
            {"key": "a", "command": "apply"}
        ]}"#,
    );

    // After dispatch
    feed(&mut engine, "a");
    assert!(engine.state().is_empty());
    assert_eq!(engine.machine_state(), EngineState::Idle);

    // After mismatch
    feed(&mut engine, "ctrl+x");
    feed(&mut engine, "z");
    assert!(engine.state().is_empty());
    assert_eq!(engine.machine_state(), EngineState::Idle);

    // After explicit cancel
    feed(&mut engine, "9");
    feed(&mut engine, "ctrl+x");
    engine.handle(Event::Cancel);
    assert!(engine.state().is_empty());
    assert_eq!(engine.machine_state(), EngineState::Idle);

    // After mode change
    feed(&mut engine, "ctrl+x");
    engine.handle(Event::SetMode("normal".to_string()));
    assert!(engine.state().is_empty());
    assert_eq!(engine.machine_state(), EngineState::Idle);
}

#[test]
fn test_leading_zero_continues_count() {
    let mut engine = engine_from_json(
        r#"{"bindings": [{"key": "j", "command": "down",
            "args": {"n": {"computed": "count"}}}]}"#,
    );

    feed(&mut engine, "2");
    feed(&mut engine, "0");
    let effects = feed(&mut engine, "j");
    assert_eq!(dispatched(&effects)[0].args, serde_json::json!({"n": 20}));
}

#[test]
fn test_absent_count_means_one() {
    let mut engine = engine_from_json(
        r#"{"bindings": [{"key": "j", "command": "down",
            "args": {"n": {"computed": "count"}}}]}"#,
    );
    let effects = feed(&mut engine, "j");
    assert_eq!(dispatched(&effects)[0].args, serde_json::json!({"n": 1}));
}

#[test]
fn test_stale_timeout_after_cancel_is_ignored() {
    let mut engine = engine_from_json(
        r#"{"bindings": [
            {"key": "g", "command": "short"},
            {"key": "g g", "command": "long"}
        ]}"#,
    );

    let effects = feed(&mut engine, "g");
    let generation = scheduled_timeout(&effects).unwrap();

    engine.handle(Event::Cancel);
    let effects = engine.handle(Event::TimeoutElapsed(generation));
    assert!(effects.is_empty());
    assert!(engine.state().is_empty());
}

#[test]
fn test_sequences_do_not_carry_across_modes() {
    let mut engine = engine_from_json(
        r#"{
            "modes": [{"name": "normal"}, {"name": "visual"}],
            "bindings": [{"key": "d d", "command": "deleteLines", "mode": "normal"}]
        }"#,
    );

    feed(&mut engine, "d");
    engine.handle(Event::SetMode("visual".to_string()));

    // The second d must not complete the normal-mode sequence
    let effects = feed(&mut engine, "d");
    assert!(dispatched(&effects).is_empty());
}
