//! Transfer configuration.
//!
//! Provides [`TransferConfig`], the configuration surface consumed by both
//! transfer engines, and the segment sizing constants. Validation is
//! synchronous and happens before any remote call.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use objstream_model::Locator;

use crate::error::{TransferError, TransferResult};

/// Hard floor for the segment threshold: remote stores refuse non-final
/// segments smaller than 5 MiB.
pub const MIN_SEGMENT_BYTES: usize = 5 * 1024 * 1024;

/// Default segment threshold (10 MiB).
pub const DEFAULT_SEGMENT_BYTES: usize = 10 * 1024 * 1024;

/// How the overall integrity digest for a transfer is produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DigestStrategy {
    /// No overall digest is attached at finalize.
    #[default]
    None,
    /// A streaming MD5 accumulator is fed every segment in issuance order.
    Rolling,
    /// A caller-supplied value attached verbatim at finalize.
    Fixed(String),
}

/// Configuration for one transfer (upload or download) of a single object.
///
/// # Examples
///
/// ```
/// use objstream_core::config::TransferConfig;
/// use objstream_model::Locator;
///
/// let config = TransferConfig::builder()
///     .locator(Locator::new("backups", "db.dump"))
///     .build();
/// assert_eq!(config.threshold_bytes, 10 * 1024 * 1024);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct TransferConfig {
    /// Target object location.
    pub locator: Locator,

    /// Whether each segment carries a content checksum the remote store can
    /// verify on receipt.
    #[builder(default = false)]
    pub content_integrity_check: bool,

    /// Overall digest strategy applied at finalize.
    #[builder(default)]
    pub digest: DigestStrategy,

    /// Buffered byte count at which the write adapter dispatches a segment.
    #[builder(default = DEFAULT_SEGMENT_BYTES)]
    pub threshold_bytes: usize,

    /// Whether the read channel is opened without request signing.
    #[builder(default = false)]
    pub unauthenticated_request: bool,
}

impl TransferConfig {
    /// Validate the configuration.
    ///
    /// Checks the locator fields and the segment threshold floor. This is
    /// synchronous and has no side effects; adapters call it before touching
    /// the remote store.
    pub fn validate(&self) -> TransferResult<()> {
        if self.locator.bucket.is_empty() {
            return Err(TransferError::configuration("locator bucket is required"));
        }
        if self.locator.key.is_empty() {
            return Err(TransferError::configuration("locator key is required"));
        }
        if self.threshold_bytes < MIN_SEGMENT_BYTES {
            return Err(TransferError::configuration(format!(
                "threshold_bytes {} is below the {MIN_SEGMENT_BYTES}-byte segment floor",
                self.threshold_bytes
            )));
        }
        Ok(())
    }
}
