//! Key model: stream identifiers, key kinds and segment keys.
//!
//! Every stored segment is addressed by an [`AtomKey`]. Keys are never
//! allocated from a shared counter: each writer draws a fresh random version
//! id, so concurrent writers obtain distinct keys without coordinating.
//!
//! ## Textual Encoding
//!
//! ```text
//! <kind>.<stream>.<version_id:016x>.<creation_ts>.<content_hash:016x>.<start_index>.<end_index>
//! ```
//!
//! `<stream>` is `n<decimal>` for numeric ids and `s<hex utf-8>` for string
//! ids, so the encoding never contains path separators. The layout is stable;
//! stores persist it and list by parsing it back.

use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Value on the logical index: nanoseconds for timestamp-indexed streams,
/// row numbers for row-count-indexed streams.
pub type IndexValue = i64;

/// Identifier of a logical stream (symbol).
///
/// Numeric ids sort before string ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StreamId {
    /// Numeric stream id.
    Num(u64),
    /// String stream id.
    Str(String),
}

impl StreamId {
    /// Returns the path-safe token used in key encodings and store layouts.
    #[must_use]
    pub fn token(&self) -> String {
        match self {
            Self::Num(n) => format!("n{n}"),
            Self::Str(s) => {
                let mut token = String::with_capacity(1 + s.len() * 2);
                token.push('s');
                for byte in s.as_bytes() {
                    token.push_str(&format!("{byte:02x}"));
                }
                token
            }
        }
    }

    /// Parses a token produced by [`StreamId::token`].
    pub fn from_token(token: &str) -> StorageResult<Self> {
        let invalid = || StorageError::Codec(format!("invalid stream token: {token:?}"));

        if let Some(num) = token.strip_prefix('n') {
            return num.parse().map(Self::Num).map_err(|_| invalid());
        }

        let hex = token.strip_prefix('s').ok_or_else(invalid)?;
        if hex.len() % 2 != 0 {
            return Err(invalid());
        }
        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| invalid())?;
        String::from_utf8(bytes).map(Self::Str).map_err(|_| invalid())
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<u64> for StreamId {
    fn from(n: u64) -> Self {
        Self::Num(n)
    }
}

/// Kind of a stored key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    /// Staged segment awaiting compaction.
    AppendData,
    /// Compacted segment belonging to the version chain.
    TableData,
    /// Per-stream marker noting that staged data may exist.
    AppendRef,
    /// Per-stream head record.
    HeadRef,
}

impl KeyKind {
    /// All kinds, in encoding order.
    pub const ALL: [Self; 4] = [
        Self::AppendData,
        Self::TableData,
        Self::AppendRef,
        Self::HeadRef,
    ];

    /// Returns true for kinds addressed by [`RefKey`].
    #[must_use]
    pub const fn is_ref(self) -> bool {
        matches!(self, Self::AppendRef | Self::HeadRef)
    }

    /// Single-character code used in encodings.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::AppendData => 'A',
            Self::TableData => 'T',
            Self::AppendRef => 'R',
            Self::HeadRef => 'H',
        }
    }

    /// Directory name used by file-based stores.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::AppendData => "append_data",
            Self::TableData => "table_data",
            Self::AppendRef => "append_ref",
            Self::HeadRef => "head_ref",
        }
    }

    /// Parses a code produced by [`KeyKind::code`].
    #[must_use]
    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Immutable identity of a stored segment.
///
/// Keys order by `start_index`, then `creation_ts`, then `version_id`. The
/// remaining fields only break ties so that ordering agrees with equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AtomKey {
    stream_id: StreamId,
    kind: KeyKind,
    version_id: u64,
    creation_ts: i64,
    content_hash: u64,
    start_index: IndexValue,
    end_index: IndexValue,
}

impl AtomKey {
    /// Returns the stream this key belongs to.
    #[must_use]
    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    /// Returns the key kind.
    #[must_use]
    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Returns the version/sequence value.
    #[must_use]
    pub fn version_id(&self) -> u64 {
        self.version_id
    }

    /// Returns the creation time in nanoseconds since the Unix epoch.
    #[must_use]
    pub fn creation_ts(&self) -> i64 {
        self.creation_ts
    }

    /// Returns the digest of the segment contents.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }

    /// First index value covered (inclusive).
    #[must_use]
    pub fn start_index(&self) -> IndexValue {
        self.start_index
    }

    /// End of the covered index range (exclusive).
    #[must_use]
    pub fn end_index(&self) -> IndexValue {
        self.end_index
    }

    /// Returns the stable textual encoding of this key.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}.{}.{:016x}.{}.{:016x}.{}.{}",
            self.kind.code(),
            self.stream_id.token(),
            self.version_id,
            self.creation_ts,
            self.content_hash,
            self.start_index,
            self.end_index
        )
    }

    /// Parses an encoding produced by [`AtomKey::encode`].
    pub fn decode(encoded: &str) -> StorageResult<Self> {
        let invalid = |what: &str| StorageError::Codec(format!("invalid {what} in key {encoded:?}"));

        let parts: Vec<&str> = encoded.split('.').collect();
        if parts.len() != 7 {
            return Err(invalid("field count"));
        }

        let mut kind_chars = parts[0].chars();
        let kind = match (kind_chars.next(), kind_chars.next()) {
            (Some(code), None) => KeyKind::from_code(code).ok_or_else(|| invalid("kind"))?,
            _ => return Err(invalid("kind")),
        };
        if kind.is_ref() {
            return Err(invalid("kind"));
        }

        Ok(Self {
            stream_id: StreamId::from_token(parts[1])?,
            kind,
            version_id: u64::from_str_radix(parts[2], 16).map_err(|_| invalid("version"))?,
            creation_ts: parts[3].parse().map_err(|_| invalid("creation time"))?,
            content_hash: u64::from_str_radix(parts[4], 16).map_err(|_| invalid("hash"))?,
            start_index: parts[5].parse().map_err(|_| invalid("start index"))?,
            end_index: parts[6].parse().map_err(|_| invalid("end index"))?,
        })
    }
}

impl Ord for AtomKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start_index
            .cmp(&other.start_index)
            .then_with(|| self.creation_ts.cmp(&other.creation_ts))
            .then_with(|| self.version_id.cmp(&other.version_id))
            .then_with(|| self.end_index.cmp(&other.end_index))
            .then_with(|| self.content_hash.cmp(&other.content_hash))
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.stream_id.cmp(&other.stream_id))
    }
}

impl PartialOrd for AtomKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AtomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:v{:x}@{} [{}, {})",
            self.kind, self.stream_id, self.version_id, self.creation_ts, self.start_index, self.end_index
        )
    }
}

/// Builder for [`AtomKey`].
///
/// Unset fields default to zero, except `version_id` which defaults to a
/// fresh random value and `creation_ts` which defaults to the current time.
#[derive(Debug, Clone, Default)]
pub struct AtomKeyBuilder {
    version_id: Option<u64>,
    creation_ts: Option<i64>,
    content_hash: u64,
    start_index: IndexValue,
    end_index: IndexValue,
}

impl AtomKeyBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the version/sequence value.
    #[must_use]
    pub const fn version_id(mut self, version_id: u64) -> Self {
        self.version_id = Some(version_id);
        self
    }

    /// Sets the creation time.
    #[must_use]
    pub const fn creation_ts(mut self, creation_ts: i64) -> Self {
        self.creation_ts = Some(creation_ts);
        self
    }

    /// Sets the content digest.
    #[must_use]
    pub const fn content_hash(mut self, content_hash: u64) -> Self {
        self.content_hash = content_hash;
        self
    }

    /// Sets the covered index range `[start, end)`.
    #[must_use]
    pub const fn index_range(mut self, start: IndexValue, end: IndexValue) -> Self {
        self.start_index = start;
        self.end_index = end;
        self
    }

    /// Builds the key.
    #[must_use]
    pub fn build(self, stream_id: impl Into<StreamId>, kind: KeyKind) -> AtomKey {
        AtomKey {
            stream_id: stream_id.into(),
            kind,
            version_id: self.version_id.unwrap_or_else(fresh_version_id),
            creation_ts: self.creation_ts.unwrap_or_else(current_timestamp_ns),
            content_hash: self.content_hash,
            start_index: self.start_index,
            end_index: self.end_index,
        }
    }
}

/// Address of a per-stream ref record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefKey {
    kind: KeyKind,
    stream_id: StreamId,
}

impl RefKey {
    /// Creates a ref key.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `kind` is not a ref kind.
    #[must_use]
    pub fn new(kind: KeyKind, stream_id: impl Into<StreamId>) -> Self {
        debug_assert!(kind.is_ref(), "{kind} is not a ref kind");
        Self {
            kind,
            stream_id: stream_id.into(),
        }
    }

    /// Returns the ref kind.
    #[must_use]
    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Returns the stream this ref belongs to.
    #[must_use]
    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    /// Returns the stable textual encoding of this ref.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}.{}", self.kind.code(), self.stream_id.token())
    }
}

impl fmt::Display for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.stream_id)
    }
}

/// Returns the current time in nanoseconds since the Unix epoch.
#[must_use]
pub fn current_timestamp_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Draws a fresh, uncoordinated version id.
#[must_use]
pub fn fresh_version_id() -> u64 {
    (Uuid::new_v4().as_u128() >> 64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(start: i64, ts: i64, version: u64) -> AtomKey {
        AtomKeyBuilder::new()
            .version_id(version)
            .creation_ts(ts)
            .index_range(start, start + 10)
            .build("sym", KeyKind::AppendData)
    }

    #[test]
    fn ordering_is_start_then_time_then_version() {
        let mut keys = vec![key(10, 1, 1), key(0, 5, 1), key(0, 5, 0), key(0, 2, 9)];
        keys.sort();

        let order: Vec<_> = keys
            .iter()
            .map(|k| (k.start_index(), k.creation_ts(), k.version_id()))
            .collect();
        assert_eq!(order, vec![(0, 2, 9), (0, 5, 0), (0, 5, 1), (10, 1, 1)]);
    }

    #[test]
    fn encode_decode_string_stream() {
        let k = AtomKeyBuilder::new()
            .version_id(0xdead_beef)
            .creation_ts(1_700_000_000_000_000_000)
            .content_hash(42)
            .index_range(-5, 17)
            .build("prices.eu/fx", KeyKind::AppendData);

        let encoded = k.encode();
        assert!(!encoded.contains('/'));
        assert_eq!(AtomKey::decode(&encoded).unwrap(), k);
    }

    #[test]
    fn encode_decode_numeric_stream() {
        let k = AtomKeyBuilder::new()
            .version_id(7)
            .creation_ts(3)
            .index_range(100, 200)
            .build(StreamId::Num(99), KeyKind::TableData);
        assert_eq!(AtomKey::decode(&k.encode()).unwrap(), k);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(AtomKey::decode("").is_err());
        assert!(AtomKey::decode("A.n1.zz.0.0.0.0").is_err());
        assert!(AtomKey::decode("X.n1.0.0.0.0.0").is_err());
        assert!(AtomKey::decode("R.n1.0.0.0.0.0").is_err());
        assert!(AtomKey::decode("A.s4.0.0.0.0.0").is_err());
    }

    #[test]
    fn fresh_keys_are_distinct() {
        let a = AtomKeyBuilder::new().build("s", KeyKind::AppendData);
        let b = AtomKeyBuilder::new().build("s", KeyKind::AppendData);
        assert_ne!(a, b);
    }

    #[test]
    fn stream_id_ordering_and_display() {
        assert!(StreamId::Num(u64::MAX) < StreamId::from("a"));
        assert_eq!(StreamId::from("abc").to_string(), "abc");
        assert_eq!(StreamId::from(5u64).to_string(), "5");
    }

    #[test]
    fn ref_key_encoding() {
        let r = RefKey::new(KeyKind::HeadRef, 3u64);
        assert_eq!(r.encode(), "H.n3");
        assert_eq!(r.stream_id(), &StreamId::Num(3));
    }

    proptest! {
        #[test]
        fn stream_token_roundtrip(s in ".{0,40}") {
            let id = StreamId::Str(s);
            prop_assert_eq!(StreamId::from_token(&id.token()).unwrap(), id);
        }

        #[test]
        fn ord_consistent_with_eq(a in 0i64..4, b in 0i64..4, va in 0u64..3, vb in 0u64..3) {
            let ka = key(a, 1, va);
            let kb = key(b, 1, vb);
            prop_assert_eq!(ka == kb, ka.cmp(&kb) == Ordering::Equal);
        }
    }
}
