//! Scripted in-memory remote store shared by the engine tests.
//!
//! Upload-side behavior is programmed per sequence number (delays to force
//! out-of-order completion, injected failures); the read side replays a
//! scripted event sequence, optionally leaving the channel open afterwards.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;

use objstream_model::{FinalizeManifest, FinalizeReceipt, Locator, ReadEvent};

use crate::error::{TransferError, TransferResult};
use crate::store::{ReadEventStream, ReadOptions, RemoteStore, SegmentUpload};

#[derive(Debug, Default)]
pub(crate) struct MockStore {
    create_failure: Mutex<Option<String>>,
    segment_delays: Mutex<BTreeMap<u32, u64>>,
    segment_failures: Mutex<BTreeMap<u32, String>>,
    segments: Mutex<BTreeMap<u32, SegmentUpload>>,
    finalized: Mutex<Option<FinalizeManifest>>,
    aborted: AtomicBool,
    read_events: Mutex<Vec<TransferResult<ReadEvent>>>,
    read_stays_open: AtomicBool,
    reads_opened: AtomicUsize,
}

impl MockStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_create(&self, message: &str) {
        *self.create_failure.lock().expect("lock") = Some(message.to_owned());
    }

    /// Delay the upload of segment `sequence_number` by `millis`.
    pub(crate) fn delay_segment(&self, sequence_number: u32, millis: u64) {
        self.segment_delays
            .lock()
            .expect("lock")
            .insert(sequence_number, millis);
    }

    pub(crate) fn fail_segment(&self, sequence_number: u32, message: &str) {
        self.segment_failures
            .lock()
            .expect("lock")
            .insert(sequence_number, message.to_owned());
    }

    /// Script the events replayed by the next opened read channel.
    pub(crate) fn script_read(&self, events: Vec<TransferResult<ReadEvent>>) {
        *self.read_events.lock().expect("lock") = events;
    }

    /// Leave the read channel open (pending) after the scripted events.
    pub(crate) fn keep_read_open(&self) {
        self.read_stays_open.store(true, Ordering::SeqCst);
    }

    pub(crate) fn finalized(&self) -> Option<FinalizeManifest> {
        self.finalized.lock().expect("lock").clone()
    }

    pub(crate) fn was_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub(crate) fn segment_count(&self) -> usize {
        self.segments.lock().expect("lock").len()
    }

    pub(crate) fn segment_payload(&self, sequence_number: u32) -> Option<Bytes> {
        self.segments
            .lock()
            .expect("lock")
            .get(&sequence_number)
            .map(|upload| upload.payload.clone())
    }

    pub(crate) fn segment_checksum(&self, sequence_number: u32) -> Option<String> {
        self.segments
            .lock()
            .expect("lock")
            .get(&sequence_number)
            .and_then(|upload| upload.content_md5.clone())
    }

    pub(crate) fn reads_opened(&self) -> usize {
        self.reads_opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for MockStore {
    async fn create_session(&self, _locator: &Locator) -> TransferResult<String> {
        let failure = self.create_failure.lock().expect("lock").clone();
        match failure {
            Some(message) => Err(TransferError::transport(message)),
            None => Ok("session-1".to_owned()),
        }
    }

    async fn upload_segment(&self, upload: SegmentUpload) -> TransferResult<String> {
        let delay = self
            .segment_delays
            .lock()
            .expect("lock")
            .get(&upload.sequence_number)
            .copied();
        if let Some(millis) = delay {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }

        let failure = self
            .segment_failures
            .lock()
            .expect("lock")
            .get(&upload.sequence_number)
            .cloned();
        if let Some(message) = failure {
            return Err(TransferError::transport(message));
        }

        let sequence_number = upload.sequence_number;
        self.segments
            .lock()
            .expect("lock")
            .insert(sequence_number, upload);
        Ok(format!("\"ack-{sequence_number}\""))
    }

    async fn abort_session(&self, _locator: &Locator, _session_id: &str) -> TransferResult<()> {
        self.aborted.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn finalize_session(
        &self,
        locator: &Locator,
        _session_id: &str,
        manifest: FinalizeManifest,
    ) -> TransferResult<FinalizeReceipt> {
        let receipt = FinalizeReceipt {
            etag: Some("\"assembled\"".to_owned()),
            location: Some(format!("https://store.example/{locator}")),
        };
        *self.finalized.lock().expect("lock") = Some(manifest);
        Ok(receipt)
    }

    fn read_object(&self, _locator: &Locator, _options: ReadOptions) -> ReadEventStream {
        self.reads_opened.fetch_add(1, Ordering::SeqCst);
        let events = std::mem::take(&mut *self.read_events.lock().expect("lock"));
        if self.read_stays_open.load(Ordering::SeqCst) {
            stream::iter(events).chain(stream::pending()).boxed()
        } else {
            stream::iter(events).boxed()
        }
    }
}
