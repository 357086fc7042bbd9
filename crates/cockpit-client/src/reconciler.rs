use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::backend::{Backend, Scope};
use crate::collection::Collection;
use crate::config::ClientConfig;
use crate::stream::{EventStream, StreamCloser};
use crate::types::{Command, Entity, LogLine};
use crate::{CockpitError, Result};

// ─── Reconciler ───────────────────────────────────────────────────────────

/// Builds live collections for scopes served by one backend.
///
/// Each [`activate`](Reconciler::activate) call follows the same protocol:
/// open the event stream, await the first page, then apply every event the
/// stream delivers, in order, until the returned [`Activation`] is
/// deactivated or dropped.
///
/// ```rust,ignore
/// let backend = Arc::new(HttpBackend::new(&config)?);
/// let reconciler = Reconciler::from_config(backend, &config);
///
/// let commands = reconciler.commands().await?;
/// let mut updates = commands.subscribe();
/// while updates.changed().await.is_ok() {
///     let snapshot = updates.borrow_and_update().clone();
///     render(&snapshot);
/// }
/// ```
pub struct Reconciler<B> {
    backend: Arc<B>,
    page_size: usize,
}

impl<B> Clone for Reconciler<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            page_size: self.page_size,
        }
    }
}

impl<B: Backend> Reconciler<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            page_size: ClientConfig::default().page_size,
        }
    }

    pub fn from_config(backend: Arc<B>, config: &ClientConfig) -> Self {
        Self::new(backend).with_page_size(config.page_size)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Seed a collection for `scope` and keep it live.
    ///
    /// Fails only if the seed fetch fails, in which case the event stream
    /// is closed again and nothing keeps running.
    pub async fn activate<E: Entity>(&self, scope: Scope) -> Result<Activation<E, B>> {
        // Opened before the seed fetch so mutations racing the fetch are
        // buffered and applied after the seed.
        let stream = self.backend.open_stream::<E>(&scope);

        let page = match self
            .backend
            .fetch_page::<E>(&scope, None, self.page_size)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                stream.close();
                tracing::warn!(%scope, error = %e, "seed fetch failed");
                return Err(e);
            }
        };

        let has_more = page.len() >= self.page_size;
        let mut collection = Collection::new();
        collection.seed(page);
        tracing::info!(%scope, items = collection.len(), has_more, "seed applied");

        let state = State {
            collection,
            has_more,
            live: true,
            active: true,
            version: 0,
        };
        let (snapshots, _) = watch::channel(state.snapshot());
        let inner = Arc::new(Inner {
            scope,
            state: Mutex::new(state),
            snapshots,
        });

        let closer = stream.closer();
        tokio::spawn(drain(Arc::clone(&inner), stream));

        Ok(Activation {
            inner,
            backend: Arc::clone(&self.backend),
            page_size: self.page_size,
            closer,
            page_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// All commands, newest first.
    pub async fn commands(&self) -> Result<Activation<Command, B>> {
        self.activate(Scope::Commands).await
    }

    /// Output of one command, newest line first.
    pub async fn logs(&self, command_id: &str) -> Result<Activation<LogLine, B>> {
        self.activate(Scope::logs(command_id)).await
    }
}

// ─── Snapshot ─────────────────────────────────────────────────────────────

/// Read-only view of a live collection at one point in time.
#[derive(Debug, Clone)]
pub struct Snapshot<E> {
    /// Newest first. Entities are shared with the live collection and with
    /// other snapshots.
    pub items: Arc<[Arc<E>]>,
    /// `false` once a short page showed there is nothing older to load.
    pub has_more: bool,
    /// `false` once live updates stopped (stream ended or deactivated).
    pub live: bool,
    /// Bumped on every published change.
    pub version: u64,
}

impl<E: Entity> Snapshot<E> {
    pub fn get(&self, id: &str) -> Option<&E> {
        self.items.iter().find(|e| e.id() == id).map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|e| e.id()).collect()
    }

    /// Chronological order, for consumers that print output top to bottom.
    pub fn iter_oldest_first(&self) -> impl Iterator<Item = &E> {
        self.iter().rev()
    }

    /// Newest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &E> {
        self.items.iter().map(Arc::as_ref)
    }
}

// ─── Activation ───────────────────────────────────────────────────────────

struct State<E> {
    collection: Collection<E>,
    has_more: bool,
    live: bool,
    active: bool,
    version: u64,
}

impl<E: Entity> State<E> {
    fn snapshot(&self) -> Snapshot<E> {
        Snapshot {
            items: self.collection.shared(),
            has_more: self.has_more,
            live: self.live,
            version: self.version,
        }
    }
}

struct Inner<E> {
    scope: Scope,
    state: Mutex<State<E>>,
    snapshots: watch::Sender<Snapshot<E>>,
}

impl<E: Entity> Inner<E> {
    fn lock(&self) -> MutexGuard<'_, State<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bump the version and hand consumers a fresh snapshot. Called with
    /// the state lock held so snapshots are published in mutation order.
    fn publish(&self, state: &mut State<E>) {
        state.version += 1;
        self.snapshots.send_replace(state.snapshot());
    }
}

/// One live collection. Owns the event stream; dropping the activation
/// deactivates it.
pub struct Activation<E: Entity, B> {
    inner: Arc<Inner<E>>,
    backend: Arc<B>,
    page_size: usize,
    closer: StreamCloser,
    /// Serializes `load_more` so each call reads the cursor left by the last.
    page_lock: tokio::sync::Mutex<()>,
}

impl<E: Entity, B: Backend> Activation<E, B> {
    /// Fetch the next older page and append it.
    ///
    /// The cursor is the id of the oldest loaded entity, so live inserts at
    /// the head never move it. Returns the number of entities added; `Ok(0)`
    /// without fetching once the history is exhausted. On failure the
    /// collection is left as it was.
    pub async fn load_more(&self) -> Result<usize> {
        let _page = self.page_lock.lock().await;

        let cursor = {
            let state = self.inner.lock();
            if !state.active {
                return Err(CockpitError::Inactive);
            }
            if !state.has_more {
                return Ok(0);
            }
            state.collection.tail_cursor().map(str::to_owned)
        };

        let page = self
            .backend
            .fetch_page::<E>(&self.inner.scope, cursor.as_deref(), self.page_size)
            .await?;

        let mut state = self.inner.lock();
        if !state.active {
            return Err(CockpitError::Inactive);
        }
        let exhausted = page.len() < self.page_size;
        let added = state.collection.append_page(page);
        if exhausted {
            state.has_more = false;
        }
        self.inner.publish(&mut state);
        tracing::debug!(
            scope = %self.inner.scope,
            before = cursor.as_deref().unwrap_or(""),
            added,
            exhausted,
            "page loaded"
        );
        Ok(added)
    }
}

impl<E: Entity, B> Activation<E, B> {
    /// Stop applying events and release the stream connection.
    ///
    /// Once this returns the collection is inert: no event or page will
    /// touch it again. Idempotent.
    pub fn deactivate(&self) {
        {
            let mut state = self.inner.lock();
            if !state.active {
                return;
            }
            state.active = false;
            state.live = false;
            self.inner.publish(&mut state);
        }
        self.closer.close();
        tracing::info!(scope = %self.inner.scope, "deactivated");
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }

    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Snapshot<E> {
        self.inner.snapshots.borrow().clone()
    }

    /// Receive a snapshot after every applied change.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<E>> {
        self.inner.snapshots.subscribe()
    }

    /// Resolves once live updates have stopped, whether because the stream
    /// ended or because of [`deactivate`](Self::deactivate).
    pub async fn closed(&self) {
        let mut rx = self.subscribe();
        let _ = rx.wait_for(|snapshot| !snapshot.live).await;
    }
}

impl<E: Entity, B> Drop for Activation<E, B> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// Apply stream events to the collection until the stream ends.
async fn drain<E: Entity>(inner: Arc<Inner<E>>, mut stream: EventStream<E>) {
    while let Some(event) = stream.next().await {
        let mut state = inner.lock();
        if !state.active {
            return;
        }
        let kind = event.kind;
        let id = event.entity.id().to_owned();
        if state.collection.apply(event) {
            inner.publish(&mut state);
        } else {
            tracing::trace!(scope = %inner.scope, ?kind, %id, "event did not change the collection");
        }
    }

    let mut state = inner.lock();
    if state.live {
        state.live = false;
        inner.publish(&mut state);
        tracing::info!(scope = %inner.scope, "live updates stopped: stream ended");
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
