//! Upload-side data types.
//!
//! A multi-part transfer targets a [`Locator`], produces one
//! [`SegmentReceipt`] per uploaded segment, and closes with a
//! [`FinalizeManifest`] listing every receipt in ascending sequence order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Location of an object within the remote store: bucket plus key.
///
/// # Examples
///
/// ```
/// use objstream_model::Locator;
///
/// let locator = Locator::new("backups", "2026/08/archive.bin");
/// assert_eq!(locator.to_string(), "backups/2026/08/archive.bin");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locator {
    /// The bucket (or container) holding the object.
    pub bucket: String,
    /// The object key within the bucket.
    pub key: String,
}

impl Locator {
    /// Create a locator from bucket and key.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Acknowledgment for one uploaded segment.
///
/// The remote acknowledgment is an opaque tag (an entity tag for S3-style
/// services); finalize echoes it back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentReceipt {
    /// Sequence number of the segment (1-based, issuance order).
    pub sequence_number: u32,
    /// Opaque acknowledgment tag returned by the remote store.
    pub remote_ack: String,
}

/// The manifest sent to the remote store when finalizing a transfer session.
///
/// Receipts are listed in ascending sequence order. The overall digest, when
/// present, covers every segment payload in that order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeManifest {
    /// One receipt per segment, ascending by sequence number.
    pub segments: Vec<SegmentReceipt>,
    /// Optional digest over the whole transferred byte stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl FinalizeManifest {
    /// Number of segments in the manifest.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

/// What the remote store reports once a transfer session is finalized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeReceipt {
    /// Entity tag of the assembled object, if the store reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Location URL of the assembled object, if the store reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}
