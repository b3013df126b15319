//! Remote store abstraction.
//!
//! The transfer engines never speak a wire protocol themselves; they drive a
//! [`RemoteStore`], an opaque asynchronous peer exposing the five operations
//! a multi-part transfer needs. Backends implement this trait over a real
//! service client; tests implement it with scripted behavior.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use objstream_model::{FinalizeManifest, FinalizeReceipt, Locator, ReadEvent};

use crate::error::TransferResult;

/// Stream of events observed on one remote read channel.
///
/// The channel delivers headers and data interleaved; stream termination is
/// the transport-level end of the response.
pub type ReadEventStream = BoxStream<'static, TransferResult<ReadEvent>>;

/// Input for one segment upload.
#[derive(Debug, Clone)]
pub struct SegmentUpload {
    /// Target object location.
    pub locator: Locator,
    /// Identifier of the owning transfer session.
    pub session_id: String,
    /// Sequence number of this segment (1-based).
    pub sequence_number: u32,
    /// Segment payload.
    pub payload: Bytes,
    /// Base64 MD5 content checksum, when receipt-time verification was
    /// requested.
    pub content_md5: Option<String>,
}

/// Options applied when opening a remote read channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Open the channel without request signing.
    pub unauthenticated: bool,
}

/// An opaque asynchronous object-storage peer.
///
/// All upload-side operations address a session previously opened with
/// [`create_session`](Self::create_session). None of them retry; failures
/// surface to the calling engine exactly once.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Open a multi-part transfer session, returning its opaque identifier.
    async fn create_session(&self, locator: &Locator) -> TransferResult<String>;

    /// Upload one segment, returning the remote acknowledgment tag.
    async fn upload_segment(&self, upload: SegmentUpload) -> TransferResult<String>;

    /// Abort a session. Best-effort: segments already dispatched are not
    /// recalled.
    async fn abort_session(&self, locator: &Locator, session_id: &str) -> TransferResult<()>;

    /// Finalize a session from the manifest of acknowledged segments.
    async fn finalize_session(
        &self,
        locator: &Locator,
        session_id: &str,
        manifest: FinalizeManifest,
    ) -> TransferResult<FinalizeReceipt>;

    /// Open a read channel for an object.
    ///
    /// Returns immediately; connection establishment and header receipt are
    /// observed as events on the stream.
    fn read_object(&self, locator: &Locator, options: ReadOptions) -> ReadEventStream;
}
