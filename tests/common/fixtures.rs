//! Raw byte fixtures for harnesses that talk to the receiver below the
//! client API.
//!
//! Every fixture is built with `rmpv` directly so the bytes come from an
//! encoder other than the one under test.

use rmpv::Value;

/// Serialize any MessagePack value.
pub fn msgpack(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    rmpv::encode::write_value(&mut out, value).expect("writing into a Vec cannot fail");
    out
}

/// Valid MessagePack that is not a 3-element `[tag, ts, payload]` frame,
/// each paired with a short name for failure messages.
pub fn malformed_frames() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("bare string", msgpack(&Value::from("hello"))),
        ("bare integer", msgpack(&Value::from(12))),
        ("empty array", msgpack(&Value::Array(vec![]))),
        (
            "two elements",
            msgpack(&Value::Array(vec![Value::from("a.b"), Value::from(1)])),
        ),
        (
            "four elements",
            msgpack(&Value::Array(vec![
                Value::from("a.b"),
                Value::from(1),
                Value::Map(vec![]),
                Value::Map(vec![]),
            ])),
        ),
    ]
}

/// A correctly shaped frame whose timestamp is a string.
pub fn string_timestamp_frame() -> Vec<u8> {
    msgpack(&Value::Array(vec![
        Value::from("fluent.test"),
        Value::from("yesterday"),
        Value::Map(vec![]),
    ]))
}

/// The scenario event written with deliberately wide encodings (str8,
/// uint32, map16) the way some other MessagePack implementations emit them.
pub fn wide_encoding_frame(timestamp: u32) -> Vec<u8> {
    fn str8(out: &mut Vec<u8>, s: &str) {
        out.push(0xd9);
        out.push(s.len() as u8);
        out.extend_from_slice(s.as_bytes());
    }

    let mut out = vec![0x93];
    str8(&mut out, "fluent.test");
    out.push(0xce);
    out.extend_from_slice(&timestamp.to_be_bytes());
    out.extend_from_slice(&[0xde, 0x00, 0x02]);
    for (k, v) in [("from", "userA"), ("to", "userB")] {
        str8(&mut out, k);
        str8(&mut out, v);
    }
    out
}
