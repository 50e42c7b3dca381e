//! Test builders: ergonomic constructors for `EventRecord` fixtures.
//!
//! These builders are designed for readability in test assertions, not for
//! production use. They panic on invalid input rather than returning `Result`.

use fwdlog::{EventRecord, FieldValue, Record};

// ---------------------------------------------------------------------------
// EventBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`EventRecord`] test fixtures.
///
/// # Example
///
/// ```rust
/// let event = EventBuilder::new("fluent.test")
///     .ts(1_700_000_000)
///     .field("from", "userA")
///     .field("to", "userB")
///     .build();
/// ```
pub struct EventBuilder {
    tag: String,
    timestamp: u64,
    payload: Record,
}

impl EventBuilder {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            timestamp: fwdlog::unix_now(),
            payload: Record::new(),
        }
    }

    pub fn ts(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> EventRecord {
        EventRecord::new(self.tag, self.timestamp, self.payload).expect("builder tag must not be empty")
    }
}

// ---------------------------------------------------------------------------
// Convenience constructors
// ---------------------------------------------------------------------------

/// The canonical client scenario: `fluent.test` from userA to userB.
pub fn scenario_event() -> EventRecord {
    EventBuilder::new("fluent.test")
        .field("from", "userA")
        .field("to", "userB")
        .build()
}

/// `n` events on `tag` carrying a `seq` field 0..n, for ordering checks.
pub fn numbered_events(tag: &str, n: usize) -> Vec<EventRecord> {
    (0..n)
        .map(|i| {
            EventBuilder::new(tag)
                .ts(1_700_000_000 + i as u64)
                .field("seq", i as i64)
                .build()
        })
        .collect()
}

/// A payload exercising every value kind, including nesting.
pub fn rich_event() -> EventRecord {
    let mut inner = Record::new();
    inner.insert("depth".into(), 2i64.into());
    inner.insert("ok".into(), true.into());

    EventBuilder::new("app.rich")
        .ts(42)
        .field("nil", FieldValue::Nil)
        .field("neg", -17i64)
        .field("big", u64::MAX)
        .field("ratio", 0.25f64)
        .field("bytes", FieldValue::Bin(vec![0, 1, 2, 255]))
        .field("list", vec![FieldValue::from("a"), FieldValue::from(1i64)])
        .field("nested", inner)
        .build()
}
