//! Download-side data types.
//!
//! A remote read channel is observed as a sequence of [`ReadEvent`]s: at most
//! one meaningful [`ResponseHeaders`] delivery followed by zero or more data
//! chunks. [`ObjectMeta`] is what a reader surfaces to its consumer once the
//! headers are known.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::Locator;

/// Response headers observed when a remote read channel opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseHeaders {
    /// HTTP-style status code; anything at or above 300 is a failure.
    pub status: u16,
    /// Reported object length in bytes, when the store sends one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    /// Reported content type, when the store sends one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl ResponseHeaders {
    /// Whether the status code indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status < 300
    }
}

/// One occurrence on an open read channel.
#[derive(Debug, Clone)]
pub enum ReadEvent {
    /// Response headers arrived. May be observed more than once; only the
    /// first successful delivery surfaces metadata downstream.
    Headers(ResponseHeaders),
    /// A chunk of object payload arrived.
    Data(Bytes),
}

/// Object metadata surfaced exactly once per read session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Where the object lives.
    pub locator: Locator,
    /// Object length in bytes, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    /// Content type, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}
