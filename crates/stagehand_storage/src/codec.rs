//! Encoding of segments and ref records.
//!
//! ## Segment File Format
//!
//! ```text
//! | magic "SHSG" (4) | version (2) | header_len (4) | header (CBOR) | payload (CBOR) | crc32 (4) |
//! ```
//!
//! The header is a [`SegmentHeader`] and sits before the payload so that it
//! can be read without decoding (or even reading) the rows. The CRC covers
//! every byte before it and is verified whenever the full file is decoded.

use crate::error::{StorageError, StorageResult};
use crate::segment::{Segment, SegmentHeader};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Magic bytes at the start of every segment file.
pub const SEGMENT_MAGIC: [u8; 4] = *b"SHSG";

/// Current segment file format version.
pub const SEGMENT_FORMAT_VERSION: u16 = 1;

/// Bytes before the header: magic (4) + version (2) + header_len (4).
pub const SEGMENT_PREFIX_SIZE: usize = 10;

const CRC_SIZE: usize = 4;

/// Encodes a value as CBOR.
pub fn to_cbor<T: Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StorageError::Codec(e.to_string()))?;
    Ok(buf)
}

/// Decodes a value from CBOR.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    ciborium::from_reader(bytes).map_err(|e| StorageError::Codec(e.to_string()))
}

/// Computes the 64-bit content digest of a segment.
///
/// The digest is the first eight bytes of the SHA-256 of the segment's CBOR
/// encoding.
pub fn content_hash(segment: &Segment) -> StorageResult<u64> {
    let encoded = to_cbor(segment)?;
    let digest = Sha256::digest(&encoded);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    Ok(u64::from_be_bytes(prefix))
}

/// Encodes a segment into the segment file format.
pub fn encode_segment_file(segment: &Segment) -> StorageResult<Vec<u8>> {
    let header = to_cbor(&segment.header())?;
    let payload = to_cbor(segment)?;
    let header_len = u32::try_from(header.len())
        .map_err(|_| StorageError::Codec("segment header too large".into()))?;

    let mut buf =
        Vec::with_capacity(SEGMENT_PREFIX_SIZE + header.len() + payload.len() + CRC_SIZE);
    buf.extend_from_slice(&SEGMENT_MAGIC);
    buf.extend_from_slice(&SEGMENT_FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&header_len.to_le_bytes());
    buf.extend_from_slice(&header);
    buf.extend_from_slice(&payload);

    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());

    Ok(buf)
}

/// Parses the fixed prefix of a segment file, returning the header length.
pub fn decode_segment_prefix(prefix: &[u8]) -> StorageResult<usize> {
    if prefix.len() < SEGMENT_PREFIX_SIZE {
        return Err(StorageError::Corrupted("segment file too short".into()));
    }
    if prefix[0..4] != SEGMENT_MAGIC {
        return Err(StorageError::Corrupted("invalid segment magic".into()));
    }

    let version = u16::from_le_bytes([prefix[4], prefix[5]]);
    if version > SEGMENT_FORMAT_VERSION {
        return Err(StorageError::Corrupted(format!(
            "unsupported segment format version: {version}"
        )));
    }

    let header_len = u32::from_le_bytes([prefix[6], prefix[7], prefix[8], prefix[9]]) as usize;
    Ok(header_len)
}

/// Decodes only the header of a segment file.
///
/// `data` needs to hold at least the prefix and the header; the payload and
/// CRC are neither required nor checked.
pub fn decode_segment_header(data: &[u8]) -> StorageResult<SegmentHeader> {
    let header_len = decode_segment_prefix(data)?;
    let header_end = SEGMENT_PREFIX_SIZE + header_len;
    if data.len() < header_end {
        return Err(StorageError::Corrupted("segment header truncated".into()));
    }
    from_cbor(&data[SEGMENT_PREFIX_SIZE..header_end])
}

/// Decodes a complete segment file, verifying its checksum.
pub fn decode_segment_file(data: &[u8]) -> StorageResult<Segment> {
    let header_len = decode_segment_prefix(data)?;
    let header_end = SEGMENT_PREFIX_SIZE + header_len;
    if data.len() < header_end + CRC_SIZE {
        return Err(StorageError::Corrupted("segment file truncated".into()));
    }

    let body_end = data.len() - CRC_SIZE;
    let stored_crc = u32::from_le_bytes([
        data[body_end],
        data[body_end + 1],
        data[body_end + 2],
        data[body_end + 3],
    ]);
    let computed_crc = crc32fast::hash(&data[..body_end]);
    if stored_crc != computed_crc {
        return Err(StorageError::Corrupted(format!(
            "checksum mismatch: expected {stored_crc:08x}, got {computed_crc:08x}"
        )));
    }

    from_cbor(&data[header_end..body_end])
}
