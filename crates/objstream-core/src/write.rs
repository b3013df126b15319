//! Buffered write adapter.
//!
//! [`BlobWriter`] converts an unbounded sequence of local writes into
//! appropriately sized remote segments. Writes accumulate locally with no
//! network activity until the buffered size reaches the configured
//! threshold; everything buffered then flushes as one segment and buffering
//! resumes immediately. The write call never waits on the remote upload, so
//! a fast producer can have many segments in flight at once. There is no
//! ceiling on concurrent uploads; a producer that outruns the network grows
//! unbounded pending work.
//!
//! `finish` flushes the remainder (even below the threshold) as the final
//! segment and drives session finalization; its result is the adapter's
//! single terminal signal. A failed segment does not interrupt subsequent
//! writes; it surfaces when `finish` awaits that segment.

use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info};

use objstream_model::FinalizeReceipt;

use crate::config::TransferConfig;
use crate::error::{TransferError, TransferResult};
use crate::session::TransferSession;
use crate::store::RemoteStore;

/// Lifecycle of a [`BlobWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Accepting writes; segments flush as the threshold is crossed.
    Buffering,
    /// `finish` is driving the final flush and session finalization.
    Finalizing,
    /// Finalized successfully; the terminal completion has been surfaced.
    Closed,
    /// Aborted by the caller.
    Aborted,
    /// A terminal error has been surfaced; the remote session is left
    /// un-finalized for the caller to abort or abandon.
    Errored,
}

/// Push sink turning local writes into a multi-part upload.
pub struct BlobWriter<S: RemoteStore> {
    session: TransferSession<S>,
    pending: Vec<Bytes>,
    buffered_bytes: usize,
    total_bytes: u64,
    threshold_bytes: usize,
    state: WriterState,
}

impl<S: RemoteStore> BlobWriter<S> {
    /// Validate `config` and open the underlying transfer session.
    ///
    /// An invalid threshold or locator is rejected here, synchronously,
    /// before anything is dispatched to the remote store.
    pub fn new(store: Arc<S>, config: &TransferConfig) -> TransferResult<Self> {
        let session = TransferSession::create(store, config)?;
        Ok(Self {
            session,
            pending: Vec::new(),
            buffered_bytes: 0,
            total_bytes: 0,
            threshold_bytes: config.threshold_bytes,
            state: WriterState::Buffering,
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Number of segments dispatched so far.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.session.segment_count()
    }

    /// Append `chunk` to the accumulation buffer.
    ///
    /// No network call happens below the threshold. Reaching or exceeding it
    /// flushes everything buffered as one segment and returns immediately;
    /// the upload proceeds in the background.
    pub fn write(&mut self, chunk: impl Into<Bytes>) -> TransferResult<()> {
        self.ensure_buffering("write")?;
        let chunk = chunk.into();
        self.buffered_bytes += chunk.len();
        self.total_bytes += chunk.len() as u64;
        self.pending.push(chunk);

        if self.buffered_bytes >= self.threshold_bytes {
            self.flush_segment()?;
        }
        Ok(())
    }

    /// Finish the transfer.
    ///
    /// `trailing`, when given, is treated as one final write. Whatever
    /// remains buffered flushes as the final segment even below the
    /// threshold, then the session finalizes. Resolves exactly once with
    /// the finalize receipt, or fails exactly once (including when any
    /// earlier segment upload failed), leaving the writer in
    /// [`WriterState::Errored`] with the remote session un-finalized.
    pub async fn finish(&mut self, trailing: Option<Bytes>) -> TransferResult<FinalizeReceipt> {
        if let Some(chunk) = trailing {
            self.write(chunk)?;
        } else {
            self.ensure_buffering("finish")?;
        }

        if self.buffered_bytes > 0 {
            self.flush_segment()?;
        }
        self.state = WriterState::Finalizing;

        match self.session.finish().await {
            Ok(receipt) => {
                self.state = WriterState::Closed;
                info!(
                    locator = %self.session.locator(),
                    segments = self.session.segment_count(),
                    bytes = self.total_bytes,
                    "transfer completed"
                );
                Ok(receipt)
            }
            Err(err) => {
                self.state = WriterState::Errored;
                Err(err)
            }
        }
    }

    /// Abort the transfer.
    ///
    /// Callable while buffering and after a failed `finish`; the decision to
    /// abort after a failure stays with the caller. Already-dispatched
    /// segment uploads are not recalled.
    pub async fn abort(&mut self) -> TransferResult<()> {
        if self.state == WriterState::Closed {
            return Err(TransferError::configuration(
                "cannot abort a completed transfer",
            ));
        }
        self.state = WriterState::Aborted;
        self.pending.clear();
        self.buffered_bytes = 0;
        self.session.abort().await
    }

    fn ensure_buffering(&self, operation: &str) -> TransferResult<()> {
        if self.state == WriterState::Buffering {
            Ok(())
        } else {
            Err(TransferError::configuration(format!(
                "cannot {operation} in {:?} state",
                self.state
            )))
        }
    }

    /// Concatenate everything buffered into one segment and dispatch it.
    fn flush_segment(&mut self) -> TransferResult<()> {
        let payload = if self.pending.len() == 1 {
            self.pending.remove(0)
        } else {
            let mut joined = BytesMut::with_capacity(self.buffered_bytes);
            for chunk in self.pending.drain(..) {
                joined.extend_from_slice(&chunk);
            }
            joined.freeze()
        };
        self.buffered_bytes = 0;

        let bytes = payload.len();
        self.session.upload_segment(payload)?;
        debug!(
            bytes,
            segments = self.session.segment_count(),
            "segment flushed"
        );
        Ok(())
    }
}

impl<S: RemoteStore> fmt::Debug for BlobWriter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobWriter")
            .field("state", &self.state)
            .field("buffered_bytes", &self.buffered_bytes)
            .field("threshold_bytes", &self.threshold_bytes)
            .field("segments", &self.session.segment_count())
            .finish_non_exhaustive()
    }
}
