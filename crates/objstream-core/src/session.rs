//! Transfer session management.
//!
//! A [`TransferSession`] owns one remote multi-part upload from creation
//! through finalize or abort. Session creation and every segment upload run
//! as spawned tasks behind shared futures, so dispatch never waits on the
//! network and a settled result is observable both by the caller that issued
//! the segment and by finalize.
//!
//! Sequence numbers are assigned in issuance order, gapless from 1, and
//! finalize lists them ascending regardless of the order in which the
//! uploads completed on the wire.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::debug;

use objstream_model::{FinalizeManifest, FinalizeReceipt, Locator, SegmentReceipt};

use crate::config::{DigestStrategy, TransferConfig};
use crate::digest::{DigestEncoding, FixedDigest, IntegrityDigest, RollingDigest, content_md5};
use crate::error::{TransferError, TransferResult};
use crate::store::{RemoteStore, SegmentUpload};

/// A segment's settlement, shared between the issuing caller and finalize.
///
/// Settles exactly once; cloning shares the same settlement.
pub type SegmentFuture = Shared<BoxFuture<'static, TransferResult<SegmentReceipt>>>;

type SessionFuture = Shared<BoxFuture<'static, TransferResult<String>>>;

/// Spawn `future` immediately and wrap its outcome in a shared future.
fn spawn_shared<T, F>(future: F) -> Shared<BoxFuture<'static, TransferResult<T>>>
where
    T: Clone + Send + 'static,
    F: Future<Output = TransferResult<T>> + Send + 'static,
{
    let handle = tokio::spawn(future);
    async move {
        match handle.await {
            Ok(result) => result,
            Err(join) => Err(TransferError::transport(format!(
                "background task failed: {join}"
            ))),
        }
    }
    .boxed()
    .shared()
}

/// One remote multi-part upload: creation, per-segment dispatch, abort,
/// finalize.
///
/// The remote session is opened as soon as the value is constructed; the
/// identifier resolves asynchronously and every dependent operation awaits
/// it. Segment uploads dispatch concurrently with no in-flight ceiling.
pub struct TransferSession<S: RemoteStore> {
    store: Arc<S>,
    locator: Locator,
    session: SessionFuture,
    segments: Vec<SegmentFuture>,
    digest: Option<Box<dyn IntegrityDigest>>,
    content_integrity_check: bool,
    finished: bool,
    aborted: bool,
}

impl<S: RemoteStore> TransferSession<S> {
    /// Validate `config` and open a remote session for its locator.
    ///
    /// Validation is synchronous; nothing is dispatched when it fails. On
    /// success the remote create call is already in flight when this
    /// returns.
    pub fn create(store: Arc<S>, config: &TransferConfig) -> TransferResult<Self> {
        config.validate()?;

        let locator = config.locator.clone();
        let digest: Option<Box<dyn IntegrityDigest>> = match &config.digest {
            DigestStrategy::None => None,
            DigestStrategy::Rolling => Some(Box::new(RollingDigest::new())),
            DigestStrategy::Fixed(value) => Some(Box::new(FixedDigest::new(value.clone()))),
        };

        let create_store = Arc::clone(&store);
        let create_locator = locator.clone();
        let session = spawn_shared(async move {
            let session_id = create_store.create_session(&create_locator).await?;
            debug!(locator = %create_locator, session_id = %session_id, "create_session completed");
            Ok(session_id)
        });

        Ok(Self {
            store,
            locator,
            session,
            segments: Vec::new(),
            digest,
            content_integrity_check: config.content_integrity_check,
            finished: false,
            aborted: false,
        })
    }

    /// The locator this session uploads to.
    #[must_use]
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Number of segments issued so far.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Dispatch one segment upload.
    ///
    /// Assigns the next sequence number, feeds the rolling digest if one is
    /// configured, and spawns the remote upload. The returned future settles
    /// with the segment's receipt; the same settlement is observed again by
    /// [`finish`](Self::finish). Rejected synchronously, with no remote
    /// call, once the session is finalized or aborted.
    pub fn upload_segment(&mut self, payload: Bytes) -> TransferResult<SegmentFuture> {
        if self.aborted {
            return Err(TransferError::configuration(
                "cannot upload a segment on an aborted session",
            ));
        }
        if self.finished {
            return Err(TransferError::configuration(
                "cannot upload a segment on a finalized session",
            ));
        }

        let sequence_number = self.next_sequence_number();

        if let Some(digest) = self.digest.as_mut() {
            digest.update(&payload);
        }
        let content_md5 = self.content_integrity_check.then(|| content_md5(&payload));

        let store = Arc::clone(&self.store);
        let session = self.session.clone();
        let locator = self.locator.clone();
        let payload_len = payload.len();

        let segment = spawn_shared(async move {
            let session_id = session.await?;
            let remote_ack = store
                .upload_segment(SegmentUpload {
                    locator,
                    session_id,
                    sequence_number,
                    payload,
                    content_md5,
                })
                .await
                .map_err(|err| TransferError::segment(sequence_number, err))?;
            debug!(sequence_number, bytes = payload_len, "segment upload acknowledged");
            Ok(SegmentReceipt {
                sequence_number,
                remote_ack,
            })
        });

        self.segments.push(segment.clone());
        Ok(segment)
    }

    /// Abort the session.
    ///
    /// Waits for creation, then issues the remote abort. Valid with zero
    /// segments uploaded. Segment uploads already dispatched are not
    /// recalled; this only prevents further issuance and finalization.
    pub async fn abort(&mut self) -> TransferResult<()> {
        self.aborted = true;
        let session_id = self.session.clone().await?;
        self.store.abort_session(&self.locator, &session_id).await?;
        debug!(locator = %self.locator, session_id = %session_id, "abort_session completed");
        Ok(())
    }

    /// Finalize the session.
    ///
    /// Waits for creation, then awaits every issued segment in issuance
    /// order, then sends one finalize call listing all receipts ascending,
    /// with the overall digest attached when one is configured. Fails with
    /// the first failed segment's error if any segment rejected. Finalizing
    /// with zero segments is valid.
    pub async fn finish(&mut self) -> TransferResult<FinalizeReceipt> {
        if self.aborted {
            return Err(TransferError::configuration(
                "cannot finalize an aborted session",
            ));
        }
        if self.finished {
            return Err(TransferError::configuration(
                "session is already finalized",
            ));
        }
        self.finished = true;

        let session_id = self.session.clone().await?;

        let mut receipts = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            receipts.push(segment.clone().await?);
        }

        let digest = self
            .digest
            .as_ref()
            .map(|digest| digest.digest(DigestEncoding::Hex));

        let manifest = FinalizeManifest {
            segments: receipts,
            digest,
        };
        let segment_total = manifest.segment_count();

        let receipt = self
            .store
            .finalize_session(&self.locator, &session_id, manifest)
            .await?;
        debug!(
            locator = %self.locator,
            session_id = %session_id,
            segments = segment_total,
            "finalize_session completed"
        );
        Ok(receipt)
    }

    // Sequence numbers are 1-based; a transfer never reaches u32::MAX
    // segments before the remote store refuses it.
    #[allow(clippy::cast_possible_truncation)]
    fn next_sequence_number(&self) -> u32 {
        self.segments.len() as u32 + 1
    }
}

impl<S: RemoteStore> fmt::Debug for TransferSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferSession")
            .field("locator", &self.locator)
            .field("segments", &self.segments.len())
            .field("finished", &self.finished)
            .field("aborted", &self.aborted)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStore;

    fn config(locator: Locator) -> TransferConfig {
        TransferConfig::builder().locator(locator).build()
    }

    fn plain_session(store: &Arc<MockStore>) -> TransferSession<MockStore> {
        TransferSession::create(Arc::clone(store), &config(Locator::new("bucket", "key")))
            .expect("session")
    }

    #[tokio::test]
    async fn test_should_assign_sequence_numbers_in_issuance_order() {
        let store = Arc::new(MockStore::new());
        // First segment resolves last.
        store.delay_segment(1, 40);
        let mut session = plain_session(&store);

        session
            .upload_segment(Bytes::from_static(b"first"))
            .expect("segment 1");
        session
            .upload_segment(Bytes::from_static(b"second"))
            .expect("segment 2");
        session
            .upload_segment(Bytes::from_static(b"third"))
            .expect("segment 3");

        session.finish().await.expect("finish");

        let manifest = store.finalized().expect("manifest");
        let numbers: Vec<u32> = manifest
            .segments
            .iter()
            .map(|receipt| receipt.sequence_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_should_reject_finish_when_any_segment_failed() {
        let store = Arc::new(MockStore::new());
        store.fail_segment(2, "disk full");
        let mut session = plain_session(&store);

        let first = session
            .upload_segment(Bytes::from_static(b"ok"))
            .expect("segment 1");
        session
            .upload_segment(Bytes::from_static(b"bad"))
            .expect("segment 2");

        // The healthy segment settles successfully on its own.
        first.await.expect("segment 1 resolves");

        let err = session.finish().await.expect_err("finish must fail");
        match err {
            TransferError::Segment {
                sequence_number, ..
            } => assert_eq!(sequence_number, 2),
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.finalized().is_none());
    }

    #[tokio::test]
    async fn test_should_finalize_empty_session() {
        let store = Arc::new(MockStore::new());
        let mut session = plain_session(&store);

        session.finish().await.expect("empty finalize is valid");
        let manifest = store.finalized().expect("manifest");
        assert_eq!(manifest.segment_count(), 0);
    }

    #[tokio::test]
    async fn test_should_abort_with_zero_segments() {
        let store = Arc::new(MockStore::new());
        let mut session = plain_session(&store);

        session.abort().await.expect("abort");
        assert!(store.was_aborted());
    }

    #[tokio::test]
    async fn test_should_refuse_finish_after_abort() {
        let store = Arc::new(MockStore::new());
        let mut session = plain_session(&store);

        session.abort().await.expect("abort");
        let err = session.finish().await.expect_err("finish after abort");
        assert!(matches!(err, TransferError::Configuration { .. }));
        assert!(store.finalized().is_none());
    }

    #[tokio::test]
    async fn test_should_refuse_segments_after_finish() {
        let store = Arc::new(MockStore::new());
        let mut session = plain_session(&store);

        session.finish().await.expect("finish");
        let err = session
            .upload_segment(Bytes::from_static(b"late"))
            .expect_err("upload after finish");
        assert!(matches!(err, TransferError::Configuration { .. }));
        assert_eq!(store.segment_count(), 0);
    }

    #[tokio::test]
    async fn test_should_propagate_create_failure() {
        let store = Arc::new(MockStore::new());
        store.fail_create("not authorized");
        let mut session = plain_session(&store);

        session
            .upload_segment(Bytes::from_static(b"data"))
            .expect("dispatch is still synchronous");
        let err = session.finish().await.expect_err("finish must fail");
        assert!(matches!(err, TransferError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_should_attach_rolling_digest_at_finalize() {
        let store = Arc::new(MockStore::new());
        let config = TransferConfig::builder()
            .locator(Locator::new("bucket", "key"))
            .digest(DigestStrategy::Rolling)
            .build();
        let mut session =
            TransferSession::create(Arc::clone(&store), &config).expect("session");

        session
            .upload_segment(Bytes::from_static(b"hello "))
            .expect("segment 1");
        session
            .upload_segment(Bytes::from_static(b"world"))
            .expect("segment 2");
        session.finish().await.expect("finish");

        let manifest = store.finalized().expect("manifest");
        // MD5 of the full stream, hex-encoded.
        assert_eq!(
            manifest.digest.as_deref(),
            Some("5eb63bbbe01eeed093cb22bb8f5acdc3"),
        );
    }

    #[tokio::test]
    async fn test_should_attach_fixed_digest_verbatim() {
        let store = Arc::new(MockStore::new());
        let config = TransferConfig::builder()
            .locator(Locator::new("bucket", "key"))
            .digest(DigestStrategy::Fixed("precomputed".to_owned()))
            .build();
        let mut session =
            TransferSession::create(Arc::clone(&store), &config).expect("session");

        session
            .upload_segment(Bytes::from_static(b"payload"))
            .expect("segment 1");
        session.finish().await.expect("finish");

        let manifest = store.finalized().expect("manifest");
        assert_eq!(manifest.digest.as_deref(), Some("precomputed"));
    }

    #[tokio::test]
    async fn test_should_send_content_checksum_when_requested() {
        let store = Arc::new(MockStore::new());
        let config = TransferConfig::builder()
            .locator(Locator::new("bucket", "key"))
            .content_integrity_check(true)
            .build();
        let mut session =
            TransferSession::create(Arc::clone(&store), &config).expect("session");

        session
            .upload_segment(Bytes::from_static(b"hello"))
            .expect("segment 1");
        session.finish().await.expect("finish");

        assert_eq!(
            store.segment_checksum(1).as_deref(),
            Some("XUFAKrxLKna5cZ2REBfFkg=="),
        );
    }

    #[tokio::test]
    async fn test_should_share_segment_settlement_with_caller() {
        let store = Arc::new(MockStore::new());
        let mut session = plain_session(&store);

        let segment = session
            .upload_segment(Bytes::from_static(b"data"))
            .expect("segment 1");
        let receipt = segment.await.expect("receipt");
        assert_eq!(receipt.sequence_number, 1);

        session.finish().await.expect("finish");
        let manifest = store.finalized().expect("manifest");
        assert_eq!(manifest.segments[0].remote_ack, receipt.remote_ack);
    }
}
