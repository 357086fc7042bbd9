use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;

use crate::types::{Entity, MutationEvent};
use crate::CockpitError;

// ─── EventStream ──────────────────────────────────────────────────────────

/// A single-consumer, ordered pull sequence over one push connection.
///
/// The producer half ([`EventSink`]) delivers events whenever they occur;
/// they are buffered in an unbounded FIFO until [`EventStream::next`] takes
/// them. The sequence ends (`None`) when the producer goes away (transport
/// error or server close) or when the stream is closed. After the first
/// `None`, every call returns `None`.
///
/// `next` takes `&mut self`, so two concurrent waiters on the same stream
/// cannot be expressed.
///
/// ```rust,ignore
/// let mut stream = backend.open_stream::<Command>(&Scope::Commands);
/// while let Some(event) = stream.next().await {
///     println!("{:?} {}", event.kind, event.entity.id);
/// }
/// ```
pub struct EventStream<E> {
    rx: mpsc::UnboundedReceiver<MutationEvent<E>>,
    closed_rx: watch::Receiver<bool>,
    closer: StreamCloser,
    finished: bool,
}

impl<E: Entity> EventStream<E> {
    /// Create an unattached stream and its producer half.
    ///
    /// `label` names the connection in log output (usually the scope).
    pub fn channel(label: impl Into<String>) -> (EventSink<E>, EventStream<E>) {
        let label: Arc<str> = Arc::from(label.into());
        let (tx, rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);

        let closer = StreamCloser {
            shared: Arc::new(Shared {
                label: Arc::clone(&label),
                closed: closed_tx,
                reader: Mutex::new(None),
            }),
        };
        let sink = EventSink { tx, label };
        let stream = EventStream {
            rx,
            closed_rx,
            closer,
            finished: false,
        };
        (sink, stream)
    }

    /// Run `producer` as a background task that feeds the returned stream.
    ///
    /// Returns immediately; the connection is established inside the task.
    /// Closing the stream aborts the task, which drops whatever connection
    /// it holds. Must be called from within a Tokio runtime.
    pub fn spawn<F, Fut>(label: impl Into<String>, producer: F) -> Self
    where
        F: FnOnce(EventSink<E>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (sink, stream) = Self::channel(label);
        let task = tokio::spawn(producer(sink));
        stream.closer.attach_reader(task.abort_handle());
        stream
    }

    /// Wait for the next event.
    ///
    /// Buffered events are returned oldest first without waiting. Events
    /// still buffered when the stream is closed are discarded.
    pub async fn next(&mut self) -> Option<MutationEvent<E>> {
        if self.finished {
            return None;
        }
        if *self.closed_rx.borrow() {
            self.finish();
            return None;
        }

        let next = tokio::select! {
            biased;
            _ = self.closed_rx.wait_for(|closed| *closed) => None,
            event = self.rx.recv() => event,
        };

        if next.is_none() {
            self.finish();
        }
        next
    }

    /// Adapt into a [`futures::Stream`].
    pub fn into_stream(self) -> impl Stream<Item = MutationEvent<E>> {
        futures::stream::unfold(self, |mut stream| async move {
            stream.next().await.map(|event| (event, stream))
        })
    }
}

impl<E> EventStream<E> {
    /// Release the underlying connection. Idempotent.
    pub fn close(&self) {
        self.closer.close();
    }

    /// A handle that can close this stream from another task.
    pub fn closer(&self) -> StreamCloser {
        self.closer.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.finished || self.closer.is_closed()
    }

    fn finish(&mut self) {
        self.finished = true;
        self.rx.close();
    }
}

impl<E> Drop for EventStream<E> {
    fn drop(&mut self) {
        self.closer.close();
    }
}

// ─── StreamCloser ─────────────────────────────────────────────────────────

struct Shared {
    label: Arc<str>,
    closed: watch::Sender<bool>,
    reader: Mutex<Option<AbortHandle>>,
}

/// Cloneable close handle for an [`EventStream`].
#[derive(Clone)]
pub struct StreamCloser {
    shared: Arc<Shared>,
}

impl StreamCloser {
    /// Mark the stream finished and abort its reader task. Any pending
    /// `next` resolves to `None`. Calling this more than once has no effect.
    pub fn close(&self) {
        if self.shared.closed.send_replace(true) {
            return;
        }
        if let Some(reader) = self.take_reader() {
            reader.abort();
        }
        tracing::info!(stream = %self.shared.label, "event stream closed");
    }

    pub fn is_closed(&self) -> bool {
        *self.shared.closed.borrow()
    }

    fn attach_reader(&self, reader: AbortHandle) {
        if self.is_closed() {
            reader.abort();
            return;
        }
        if let Ok(mut slot) = self.shared.reader.lock() {
            *slot = Some(reader);
        }
    }

    fn take_reader(&self) -> Option<AbortHandle> {
        self.shared.reader.lock().ok().and_then(|mut slot| slot.take())
    }
}

// ─── EventSink ────────────────────────────────────────────────────────────

/// Producer half of an [`EventStream`]: the callback side of the bridge.
///
/// Dropping the sink ends the sequence once the consumer has drained what
/// was already delivered.
pub struct EventSink<E> {
    tx: mpsc::UnboundedSender<MutationEvent<E>>,
    label: Arc<str>,
}

impl<E: Entity> EventSink<E> {
    /// Decode one raw message payload and deliver it.
    ///
    /// Malformed payloads are logged and dropped; the stream keeps going.
    /// Returns `false` once the consumer side is gone, so the producer can
    /// stop reading.
    pub fn push(&self, payload: &str) -> bool {
        match E::decode_event(payload) {
            Ok(event) => self.send(event),
            Err(source) => {
                let err = CockpitError::Decode {
                    payload: payload.to_owned(),
                    source,
                };
                tracing::warn!(stream = %self.label, error = %err, "dropping malformed event payload");
                !self.tx.is_closed()
            }
        }
    }

    /// Deliver an already-decoded event.
    pub fn send(&self, event: MutationEvent<E>) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// End the sequence. Equivalent to dropping the sink.
    pub fn finish(self) {}
}

// ─── Tests ────────────────────────────────────────────────────────────────
