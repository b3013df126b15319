//! Integrity digests for transfer sessions.
//!
//! A transfer session may carry an overall digest fed every segment payload
//! in issuance order, attached to the finalize call. The digest is a small
//! capability: anything that can absorb bytes and render a final value. Two
//! standard implementations cover the common cases, a streaming MD5
//! accumulator and a fixed passthrough for caller-supplied values.
//!
//! Independently of the overall digest, each segment can carry its own
//! content checksum (base64 MD5) for receipt-time verification by the
//! remote store; see [`content_md5`].

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use digest::Digest;

/// Output encoding for a rendered digest value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestEncoding {
    /// Lowercase hexadecimal.
    Hex,
    /// Standard base64.
    Base64,
}

/// Capability interface for an overall transfer digest.
///
/// `update` absorbs one segment payload; `digest` renders the value over
/// everything absorbed so far without consuming the accumulator.
pub trait IntegrityDigest: Send + fmt::Debug {
    /// Absorb more payload bytes.
    fn update(&mut self, data: &[u8]);

    /// Render the digest over everything absorbed so far.
    fn digest(&self, encoding: DigestEncoding) -> String;
}

// ---------------------------------------------------------------------------
// RollingDigest
// ---------------------------------------------------------------------------

/// Streaming MD5 accumulator.
///
/// Rendering clones the internal state, so the accumulator stays usable
/// after a read.
///
/// # Examples
///
/// ```
/// use objstream_core::digest::{DigestEncoding, IntegrityDigest, RollingDigest};
///
/// let mut rolling = RollingDigest::new();
/// rolling.update(b"hello");
/// assert_eq!(
///     rolling.digest(DigestEncoding::Hex),
///     "5d41402abc4b2a76b9719d911017c592",
/// );
/// ```
#[derive(Debug, Default)]
pub struct RollingDigest {
    md5: md5::Md5,
}

impl RollingDigest {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IntegrityDigest for RollingDigest {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.md5, data);
    }

    fn digest(&self, encoding: DigestEncoding) -> String {
        let hash = Digest::finalize(self.md5.clone());
        match encoding {
            DigestEncoding::Hex => hex::encode(hash),
            DigestEncoding::Base64 => BASE64_STANDARD.encode(hash),
        }
    }
}

// ---------------------------------------------------------------------------
// FixedDigest
// ---------------------------------------------------------------------------

/// Passthrough digest holding a caller-supplied value.
///
/// `update` is a no-op and `digest` returns the value verbatim regardless of
/// the requested encoding.
#[derive(Debug, Clone)]
pub struct FixedDigest {
    value: String,
}

impl FixedDigest {
    /// Wrap a precomputed digest value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl IntegrityDigest for FixedDigest {
    fn update(&mut self, _data: &[u8]) {}

    fn digest(&self, _encoding: DigestEncoding) -> String {
        self.value.clone()
    }
}

// ---------------------------------------------------------------------------
// Per-segment checksum
// ---------------------------------------------------------------------------

/// Compute the base64-encoded MD5 of one segment payload.
///
/// This is the content checksum a remote store verifies on receipt of the
/// segment.
///
/// # Examples
///
/// ```
/// use objstream_core::digest::content_md5;
///
/// assert_eq!(content_md5(b"hello"), "XUFAKrxLKna5cZ2REBfFkg==");
/// ```
#[must_use]
pub fn content_md5(data: &[u8]) -> String {
    BASE64_STANDARD.encode(md5::Md5::digest(data))
}
