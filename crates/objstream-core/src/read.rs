//! Demand-driven read adapter.
//!
//! [`ObjectReader`] is a pull source over a remote object. The remote read
//! channel opens lazily on the first demand increment and at most once per
//! reader. Demand is cumulative: [`request`](ObjectReader::request) adds to
//! the outstanding counter and the stream forwards transport bytes only up
//! to that counter, holding any excess until demand rises again; bytes are
//! never force-pushed past what was asked for.
//!
//! Object metadata surfaces exactly once, through a oneshot handed out at
//! construction, as soon as a successful header delivery is observed.
//! Duplicate header deliveries update internal bookkeeping only.

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use objstream_model::{Locator, ObjectMeta, ReadEvent, ResponseHeaders};

use crate::config::TransferConfig;
use crate::error::{TransferError, TransferResult};
use crate::store::{ReadEventStream, ReadOptions, RemoteStore};

/// Resolves once with the object's metadata, as soon as response headers
/// are observed on the read channel.
///
/// Resolves to `None` when the reader fails or is dropped before any
/// successful header delivery.
#[derive(Debug)]
pub struct MetadataReady {
    receiver: oneshot::Receiver<ObjectMeta>,
}

impl Future for MetadataReady {
    type Output = Option<ObjectMeta>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(Result::ok)
    }
}

/// A sink for header-like hints, notified once before the first byte.
///
/// Attach one with [`ObjectReader::set_hint_sink`] to propagate content
/// type and length downstream (for example onto an HTTP response) ahead of
/// the payload. Hints fire at most once, under the same latch as the
/// metadata notification.
pub trait MetadataHintSink: Send + fmt::Debug {
    /// Receive the object's content type.
    fn hint_content_type(&mut self, content_type: &str);

    /// Receive the object's content length.
    fn hint_content_length(&mut self, content_length: u64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    /// No demand yet; the channel is unopened.
    Idle,
    /// The channel is open (events may not have arrived yet).
    Open,
    /// Transport completed normally after metadata was delivered.
    Ended,
    /// A terminal error has been surfaced.
    Failed,
}

/// Pull source over one remote object.
///
/// Implements [`Stream`] yielding payload chunks; the stream only makes
/// progress against outstanding demand registered with
/// [`request`](Self::request).
pub struct ObjectReader<S: RemoteStore> {
    store: Arc<S>,
    locator: Locator,
    options: ReadOptions,
    state: ReadState,
    channel: Option<ReadEventStream>,
    demand: u64,
    buffered: VecDeque<Bytes>,
    headers_seen: bool,
    content_length: Option<u64>,
    content_type: Option<String>,
    metadata_tx: Option<oneshot::Sender<ObjectMeta>>,
    hint_sink: Option<Box<dyn MetadataHintSink>>,
    waker: Option<Waker>,
}

impl<S: RemoteStore> ObjectReader<S> {
    /// Validate `config` and build a reader plus its one-time metadata
    /// notification.
    ///
    /// Nothing touches the remote store until the first demand increment.
    pub fn new(store: Arc<S>, config: &TransferConfig) -> TransferResult<(Self, MetadataReady)> {
        config.validate()?;
        let (metadata_tx, receiver) = oneshot::channel();
        let reader = Self {
            store,
            locator: config.locator.clone(),
            options: ReadOptions {
                unauthenticated: config.unauthenticated_request,
            },
            state: ReadState::Idle,
            channel: None,
            demand: 0,
            buffered: VecDeque::new(),
            headers_seen: false,
            content_length: None,
            content_type: None,
            metadata_tx: Some(metadata_tx),
            hint_sink: None,
            waker: None,
        };
        Ok((reader, MetadataReady { receiver }))
    }

    /// Attach a hint sink. Only effective before headers have been
    /// observed; hints fire at most once.
    pub fn set_hint_sink(&mut self, sink: Box<dyn MetadataHintSink>) {
        self.hint_sink = Some(sink);
    }

    /// Register demand for `bytes` more bytes.
    ///
    /// The first call opens the remote read channel, even when `bytes` is
    /// zero; later calls only raise the outstanding counter and wake the
    /// consumer.
    pub fn request(&mut self, bytes: u64) {
        self.demand = self.demand.saturating_add(bytes);
        if self.state == ReadState::Idle {
            debug!(locator = %self.locator, "opening read channel");
            self.channel = Some(self.store.read_object(&self.locator, self.options));
            self.state = ReadState::Open;
        }
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }

    /// Outstanding requested-but-undelivered byte count.
    #[must_use]
    pub fn demand(&self) -> u64 {
        self.demand
    }

    /// Latest content length reported by the transport.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Latest content type reported by the transport.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Record a header delivery.
    ///
    /// Bookkeeping fields always track the latest delivery; the metadata
    /// notification and hints fire only on the first.
    fn on_headers(&mut self, headers: ResponseHeaders) {
        self.content_length = headers.content_length;
        if headers.content_type.is_some() {
            self.content_type = headers.content_type.clone();
        }

        if self.headers_seen {
            debug!(locator = %self.locator, "duplicate header delivery, bookkeeping only");
            return;
        }
        self.headers_seen = true;

        let meta = ObjectMeta {
            locator: self.locator.clone(),
            content_length: headers.content_length,
            content_type: headers.content_type,
        };

        if let Some(sink) = self.hint_sink.as_mut() {
            if let Some(content_type) = meta.content_type.as_deref() {
                sink.hint_content_type(content_type);
            }
            if let Some(content_length) = meta.content_length {
                sink.hint_content_length(content_length);
            }
        }

        debug!(
            locator = %self.locator,
            content_length = ?meta.content_length,
            content_type = ?meta.content_type,
            "metadata ready"
        );
        if let Some(tx) = self.metadata_tx.take() {
            // The receiver may already be gone; delivery stays best-effort.
            let _ = tx.send(meta);
        }
    }

    /// Pop the next deliverable chunk, honoring outstanding demand.
    fn take_buffered(&mut self) -> Option<Bytes> {
        if self.demand == 0 {
            return None;
        }
        let mut front = self.buffered.pop_front()?;
        let limit = usize::try_from(self.demand).unwrap_or(usize::MAX);
        let chunk = if front.len() > limit {
            let chunk = front.split_to(limit);
            self.buffered.push_front(front);
            chunk
        } else {
            front
        };
        self.demand -= chunk.len() as u64;
        Some(chunk)
    }

    fn fail(&mut self, err: TransferError) -> Poll<Option<TransferResult<Bytes>>> {
        warn!(locator = %self.locator, error = %err, "read channel failed");
        self.state = ReadState::Failed;
        self.channel = None;
        // Dropping the sender resolves a pending metadata wait to `None`.
        self.metadata_tx = None;
        Poll::Ready(Some(Err(err)))
    }
}

impl<S: RemoteStore> Stream for ObjectReader<S> {
    type Item = TransferResult<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.state {
                ReadState::Ended | ReadState::Failed => return Poll::Ready(None),
                ReadState::Idle => {
                    this.waker = Some(cx.waker().clone());
                    return Poll::Pending;
                }
                ReadState::Open => {}
            }

            if let Some(chunk) = this.take_buffered() {
                return Poll::Ready(Some(Ok(chunk)));
            }
            if !this.buffered.is_empty() {
                // Payload is waiting but demand is exhausted.
                this.waker = Some(cx.waker().clone());
                return Poll::Pending;
            }

            let Some(channel) = this.channel.as_mut() else {
                return Poll::Ready(None);
            };
            match channel.as_mut().poll_next(cx) {
                Poll::Pending => {
                    this.waker = Some(cx.waker().clone());
                    return Poll::Pending;
                }
                Poll::Ready(Some(Ok(ReadEvent::Headers(headers)))) => {
                    if headers.is_success() {
                        this.on_headers(headers);
                    } else {
                        let status = headers.status;
                        return this.fail(TransferError::transport_status(
                            status,
                            "read channel returned failure status",
                        ));
                    }
                }
                Poll::Ready(Some(Ok(ReadEvent::Data(bytes)))) => {
                    if !bytes.is_empty() {
                        this.buffered.push_back(bytes);
                    }
                }
                Poll::Ready(Some(Err(err))) => return this.fail(err),
                Poll::Ready(None) => {
                    if this.headers_seen {
                        debug!(locator = %this.locator, "read channel ended");
                        this.state = ReadState::Ended;
                        this.channel = None;
                        return Poll::Ready(None);
                    }
                    return this.fail(TransferError::protocol("no header received"));
                }
            }
        }
    }
}

impl<S: RemoteStore> fmt::Debug for ObjectReader<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectReader")
            .field("locator", &self.locator)
            .field("state", &self.state)
            .field("demand", &self.demand)
            .field("headers_seen", &self.headers_seen)
            .finish_non_exhaustive()
    }
}
