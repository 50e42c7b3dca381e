//! Domain-specific assertion macros for fwdlog harnesses.
//!
//! These wrap `pretty_assertions` and add context-rich failure messages that
//! make it clear *what* forward-protocol invariant was violated.

use fwdlog::{FaultKind, Receiver};

// ---------------------------------------------------------------------------
// Event assertions
// ---------------------------------------------------------------------------

/// Assert that an `EventRecord` carries the expected tag.
///
/// ```rust
/// assert_tag!(event, "fluent.test");
/// ```
#[macro_export]
macro_rules! assert_tag {
    ($event:expr, $tag:expr) => {{
        let event: &fwdlog::EventRecord = &$event;
        let expected: &str = $tag;
        if event.tag != expected {
            panic!(
                "assert_tag! failed:\n  expected: {:?}\n  actual:   {:?}",
                expected, event.tag
            );
        }
    }};
}

/// Assert that an `EventRecord` has a payload field with an expected value.
///
/// ```rust
/// assert_field!(event, "from", "userA");
/// ```
#[macro_export]
macro_rules! assert_field {
    ($event:expr, $key:expr, $value:expr) => {{
        let event: &fwdlog::EventRecord = &$event;
        let key: &str = $key;
        let expected = fwdlog::FieldValue::from($value);
        match event.get(key) {
            Some(actual) if *actual == expected => {}
            Some(actual) => panic!(
                "assert_field! failed:\n  payload[{:?}]\n  expected: {:?}\n  actual:   {:?}",
                key, expected, actual
            ),
            None => panic!(
                "assert_field! failed: field {:?} not found.\n  Available fields: {:?}",
                key,
                event.payload.keys().collect::<Vec<_>>()
            ),
        }
    }};
}

/// Assert that a sequence of events carries `seq` fields `0..n` in order.
#[macro_export]
macro_rules! assert_in_sequence {
    ($events:expr) => {{
        let events: &[fwdlog::EventRecord] = &$events;
        for (i, event) in events.iter().enumerate() {
            match event.get("seq").and_then(|v| v.as_i64()) {
                Some(seq) if seq == i as i64 => {}
                other => panic!(
                    "assert_in_sequence! failed at position {}: seq = {:?}\n  {} events checked.",
                    i,
                    other,
                    events.len()
                ),
            }
        }
    }};
}

// ---------------------------------------------------------------------------
// Receiver fault assertions
// ---------------------------------------------------------------------------

/// Assert that the receiver recorded no faults at all.
pub fn assert_no_faults(rx: &Receiver) {
    let faults = rx.faults();
    assert!(faults.is_empty(), "expected no faults, got {faults:#?}");
}

/// Assert that exactly one fault of `kind` was recorded.
pub fn assert_single_fault(rx: &Receiver, kind: FaultKind) {
    let faults = rx.faults();
    let matching = faults.iter().filter(|f| f.kind == kind).count();
    assert_eq!(
        matching, 1,
        "expected exactly one {kind:?} fault, got {faults:#?}"
    );
}
