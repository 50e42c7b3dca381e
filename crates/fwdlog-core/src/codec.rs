//! Frame codec: [`EventRecord`] to and from its MessagePack wire form.
//!
//! A frame is the 3-element array `[tag, timestamp, payload]`. Frames are
//! concatenated on the stream without any envelope; MessagePack's own length
//! prefixes delimit them. [`FrameDecoder`] plugs into `tokio_util`'s
//! [`FramedRead`] so a socket can be turned into a stream of records that
//! tolerates arbitrarily small reads.

use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use rmpv::Value;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead};

use crate::types::{EventRecord, FieldValue, Record};

/// Largest partial frame the decoder will buffer before giving up.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Decode-time failure for a single frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The bytes are not a 3-element MessagePack array.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    /// The frame has the right shape but a field has the wrong type.
    #[error("type mismatch in `{field}`: expected {expected}, found {found}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
        found: String,
    },
    /// The underlying byte source failed.
    #[error("i/o error while reading frames: {0}")]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode `[tag, timestamp, payload]` as one self-delimiting frame.
pub fn encode(tag: &str, timestamp: u64, payload: &Record) -> Bytes {
    let mut out = BytesMut::with_capacity(64);
    encode_into(tag, timestamp, payload, &mut out);
    out.freeze()
}

/// Append one encoded frame to `dst`.
pub fn encode_into(tag: &str, timestamp: u64, payload: &Record, dst: &mut BytesMut) {
    let frame = Value::Array(vec![
        Value::from(tag),
        Value::from(timestamp),
        record_to_value(payload),
    ]);
    rmpv::encode::write_value(&mut dst.writer(), &frame)
        .expect("writing MessagePack into a BytesMut cannot fail");
}

fn record_to_value(record: &Record) -> Value {
    Value::Map(
        record
            .iter()
            .map(|(k, v)| (Value::from(k.as_str()), field_to_value(v)))
            .collect(),
    )
}

fn field_to_value(field: &FieldValue) -> Value {
    match field {
        FieldValue::Nil => Value::Nil,
        FieldValue::Bool(b) => Value::Boolean(*b),
        FieldValue::Int(n) => Value::from(*n),
        FieldValue::UInt(n) => Value::from(*n),
        FieldValue::Float(f) => Value::F64(*f),
        FieldValue::Str(s) => Value::from(s.as_str()),
        FieldValue::Bin(b) => Value::Binary(b.clone()),
        FieldValue::Array(items) => Value::Array(items.iter().map(field_to_value).collect()),
        FieldValue::Map(map) => record_to_value(map),
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode exactly one complete frame. Trailing bytes are an error.
pub fn decode(bytes: &[u8]) -> Result<EventRecord, FrameError> {
    let mut cursor = bytes;
    let value = rmpv::decode::read_value(&mut cursor)
        .map_err(|e| FrameError::MalformedFrame(e.to_string()))?;
    if !cursor.is_empty() {
        return Err(FrameError::MalformedFrame(format!(
            "{} trailing bytes after frame",
            cursor.len()
        )));
    }
    frame_from_value(value)
}

/// Turn a byte source into a lazy stream of decoded records.
///
/// The stream ends at EOF or after the first error. Any partial frame left at
/// EOF is dropped; [`FrameDecoder::discarded`] reports how many bytes.
pub fn decode_stream<R: AsyncRead>(source: R) -> FramedRead<R, FrameDecoder> {
    FramedRead::new(source, FrameDecoder::new())
}

/// Incremental decoder for concatenated frames.
///
/// Partial frames are scanned once: the decoder remembers how far into the
/// buffered frame it has walked and resumes there when more bytes arrive.
/// The value tree is only built once the whole frame is buffered.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    max_frame_bytes: usize,
    discarded: usize,
    scan: FrameScan,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_frame_bytes(DEFAULT_MAX_FRAME_BYTES)
    }

    pub fn with_max_frame_bytes(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            discarded: 0,
            scan: FrameScan::default(),
        }
    }

    /// Bytes of an incomplete trailing frame dropped at end of stream.
    pub fn discarded(&self) -> usize {
        self.discarded
    }
}

impl Decoder for FrameDecoder {
    type Item = EventRecord;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<EventRecord>, FrameError> {
        let Some(len) = self.scan.advance(&src[..], self.max_frame_bytes)? else {
            // Wait for more bytes.
            return Ok(None);
        };
        self.scan = FrameScan::default();

        let frame = src.split_to(len);
        let value = rmpv::decode::read_value(&mut &frame[..])
            .map_err(|e| FrameError::MalformedFrame(e.to_string()))?;
        frame_from_value(value).map(Some)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<EventRecord>, FrameError> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        if !buf.is_empty() {
            tracing::warn!(bytes = buf.len(), "dropping incomplete frame at end of stream");
            self.discarded += buf.len();
            buf.clear();
            self.scan = FrameScan::default();
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Frame boundary scan
// ---------------------------------------------------------------------------

/// Resumable walk over the MessagePack headers of one frame.
#[derive(Debug, Clone, Default)]
struct FrameScan {
    /// Offset of the next value header not yet walked.
    pos: usize,
    /// Values still owed to each open array or map, innermost last.
    open: Vec<u64>,
}

impl FrameScan {
    /// Walk as far as `buf` allows. Returns the frame length once the
    /// top-level value is complete.
    fn advance(&mut self, buf: &[u8], max_frame_bytes: usize) -> Result<Option<usize>, FrameError> {
        loop {
            let Some(&marker) = buf.get(self.pos) else {
                return self.incomplete(buf, max_frame_bytes);
            };
            let Some((head, body, children)) = layout(marker, &buf[self.pos + 1..])? else {
                return self.incomplete(buf, max_frame_bytes);
            };
            let end = self.pos + head + body;
            if end > max_frame_bytes {
                return Err(oversized(max_frame_bytes));
            }
            if end > buf.len() {
                return Ok(None);
            }
            self.pos = end;

            if children > 0 {
                self.open.push(children);
                continue;
            }
            // A leaf closes every container it was the last child of.
            loop {
                match self.open.last_mut() {
                    None => return Ok(Some(self.pos)),
                    Some(owed) => {
                        *owed -= 1;
                        if *owed > 0 {
                            break;
                        }
                        self.open.pop();
                    }
                }
            }
        }
    }

    fn incomplete(&self, buf: &[u8], max_frame_bytes: usize) -> Result<Option<usize>, FrameError> {
        if buf.len() > max_frame_bytes {
            return Err(oversized(max_frame_bytes));
        }
        Ok(None)
    }
}

fn oversized(max_frame_bytes: usize) -> FrameError {
    FrameError::MalformedFrame(format!("partial frame exceeds {max_frame_bytes} bytes"))
}

/// `(header bytes including the marker, body bytes, child values)` for the
/// value starting with `marker`, or `None` while its length field is cut off.
fn layout(marker: u8, rest: &[u8]) -> Result<Option<(usize, usize, u64)>, FrameError> {
    let be = |width: usize| -> Option<u64> {
        let bytes = rest.get(..width)?;
        Some(bytes.iter().fold(0u64, |n, b| (n << 8) | u64::from(*b)))
    };
    let sized = |width: usize, type_byte: usize| {
        be(width).map(|len| (1 + width + type_byte, len as usize, 0))
    };
    let counted = |width: usize, per_entry: u64| be(width).map(|n| (1 + width, 0, n * per_entry));
    let fixed = |size: usize| Some((size, 0, 0));

    Ok(match marker {
        0x00..=0x7f | 0xc0 | 0xc2 | 0xc3 | 0xe0..=0xff => fixed(1),
        0x80..=0x8f => Some((1, 0, u64::from(marker & 0x0f) * 2)),
        0x90..=0x9f => Some((1, 0, u64::from(marker & 0x0f))),
        0xa0..=0xbf => Some((1, usize::from(marker & 0x1f), 0)),
        0xc1 => return Err(FrameError::MalformedFrame("reserved marker 0xc1".to_string())),
        0xc4 | 0xd9 => sized(1, 0),
        0xc5 | 0xda => sized(2, 0),
        0xc6 | 0xdb => sized(4, 0),
        0xc7 => sized(1, 1),
        0xc8 => sized(2, 1),
        0xc9 => sized(4, 1),
        0xcc | 0xd0 => fixed(2),
        0xcd | 0xd1 => fixed(3),
        0xca | 0xce | 0xd2 => fixed(5),
        0xcb | 0xcf | 0xd3 => fixed(9),
        0xd4 => fixed(3),
        0xd5 => fixed(4),
        0xd6 => fixed(6),
        0xd7 => fixed(10),
        0xd8 => fixed(18),
        0xdc => counted(2, 1),
        0xdd => counted(4, 1),
        0xde => counted(2, 2),
        0xdf => counted(4, 2),
    })
}

fn frame_from_value(value: Value) -> Result<EventRecord, FrameError> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(FrameError::MalformedFrame(format!(
                "expected a 3-element array, found {}",
                value_kind(&other)
            )))
        }
    };
    let [tag, timestamp, payload]: [Value; 3] = items.try_into().map_err(|items: Vec<Value>| {
        FrameError::MalformedFrame(format!(
            "expected a 3-element array, found {} elements",
            items.len()
        ))
    })?;

    let tag = match tag {
        Value::String(s) => s.into_str().ok_or_else(|| FrameError::TypeMismatch {
            field: "tag",
            expected: "string",
            found: "invalid UTF-8".to_string(),
        })?,
        other => return Err(mismatch("tag", "string", &other)),
    };

    let timestamp = match timestamp {
        Value::Integer(n) => n.as_u64().ok_or_else(|| FrameError::TypeMismatch {
            field: "timestamp",
            expected: "non-negative integer",
            found: "negative integer".to_string(),
        })?,
        other => return Err(mismatch("timestamp", "non-negative integer", &other)),
    };

    let payload = match payload {
        Value::Map(pairs) => record_from_pairs(pairs)?,
        other => return Err(mismatch("payload", "map", &other)),
    };

    EventRecord::new(tag, timestamp, payload)
}

fn record_from_pairs(pairs: Vec<(Value, Value)>) -> Result<Record, FrameError> {
    let mut record = Record::with_capacity(pairs.len());
    for (key, value) in pairs {
        let key = match key {
            Value::String(s) => lossy_string(s),
            other => return Err(mismatch("payload", "string key", &other)),
        };
        record.insert(key, field_from_value(value)?);
    }
    Ok(record)
}

fn field_from_value(value: Value) -> Result<FieldValue, FrameError> {
    Ok(match value {
        Value::Nil => FieldValue::Nil,
        Value::Boolean(b) => FieldValue::Bool(b),
        Value::Integer(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => FieldValue::Int(i),
            (None, Some(u)) => FieldValue::UInt(u),
            (None, None) => return Err(mismatch("payload", "integer", &Value::Integer(n))),
        },
        Value::F32(f) => FieldValue::Float(f64::from(f)),
        Value::F64(f) => FieldValue::Float(f),
        Value::String(s) => FieldValue::Str(lossy_string(s)),
        Value::Binary(b) => FieldValue::Bin(b),
        Value::Array(items) => FieldValue::Array(
            items
                .into_iter()
                .map(field_from_value)
                .collect::<Result<_, _>>()?,
        ),
        Value::Map(pairs) => FieldValue::Map(record_from_pairs(pairs)?),
        other @ Value::Ext(..) => return Err(mismatch("payload", "plain value", &other)),
    })
}

fn lossy_string(s: rmpv::Utf8String) -> String {
    match s.as_str() {
        Some(valid) => valid.to_string(),
        None => String::from_utf8_lossy(s.as_bytes()).into_owned(),
    }
}

fn mismatch(field: &'static str, expected: &'static str, found: &Value) -> FrameError {
    FrameError::TypeMismatch {
        field,
        expected,
        found: value_kind(found).to_string(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Nil => "nil",
        Value::Boolean(_) => "boolean",
        Value::Integer(_) => "integer",
        Value::F32(_) | Value::F64(_) => "float",
        Value::String(_) => "string",
        Value::Binary(_) => "binary",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Ext(..) => "extension",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
