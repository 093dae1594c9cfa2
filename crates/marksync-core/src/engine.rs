//! BookmarkSync - one tab's view of a user's bookmarks
//!
//! BookmarkSync reconciles three sources of truth:
//! - local optimistic state (the visible [`BookmarkList`])
//! - the durable store (a [`BookmarkStore`])
//! - the per-user broadcast topic (a [`BroadcastBus`])
//!
//! ```text
//!   add_bookmark ──► store.create ──► insert at head ──► publish bookmark_added
//!   delete_bookmark ──► remove + tombstone ──► publish bookmark_deleted ──► store.delete
//!   listener task ◄── topic frames ──► on_broadcast_add / on_broadcast_delete
//! ```
//!
//! Every list mutation happens under a `parking_lot::Mutex` that is never held
//! across an `.await`, so each one is atomic with respect to the others.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use marksync_core::{BookmarkSync, LocalBus, MemoryStore, OwnerId};
//!
//! let store = Arc::new(MemoryStore::new());
//! let bus = Arc::new(LocalBus::default());
//!
//! let tab = BookmarkSync::new(store, bus);
//! tab.initialize(OwnerId::parse("alice")?).await?;
//! let docs = tab.add_bookmark("Docs", "https://docs.example").await?;
//! tab.delete_bookmark(docs.id).await?;
//! tab.shutdown().await;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{StoreError, SyncError, SyncResult};
use crate::list::{BookmarkList, LoadOutcome, LoadTicket};
use crate::storage::BookmarkStore;
use crate::sync::{
    BookmarkEvent, BroadcastBus, EngineEvent, EngineStatus, Origin, Subscription,
};
use crate::types::{Bookmark, BookmarkId, NewBookmark, OwnerId, SessionId, TopicId};

const BROADCAST_CLOSED: &str = "broadcast closed";

/// Mutable engine state, guarded by one lock
#[derive(Default)]
struct State {
    owner: Option<OwnerId>,
    topic: Option<TopicId>,
    list: BookmarkList,
    status: EngineStatus,
    /// The topic ended; no further broadcasts will arrive
    bus_closed: bool,
}

/// State shared with the listener task
struct Inner {
    session: SessionId,
    store: Arc<dyn BookmarkStore>,
    bus: Arc<dyn BroadcastBus>,
    state: Mutex<State>,
    event_tx: broadcast::Sender<EngineEvent>,
    cancel: CancellationToken,
    disposed: AtomicBool,
}

impl Inner {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn emit(&self, event: EngineEvent) {
        // No observers is fine
        let _ = self.event_tx.send(event);
    }

    /// The listener's topic ended while the engine was still live
    fn mark_bus_closed(&self) {
        if self.is_disposed() {
            return;
        }
        let mut state = self.state.lock();
        state.bus_closed = true;
        self.set_status(
            &mut state,
            EngineStatus::Degraded(BROADCAST_CLOSED.to_string()),
        );
    }

    fn set_status(&self, state: &mut State, status: EngineStatus) {
        if state.status != status {
            state.status = status.clone();
            self.emit(EngineEvent::StatusChanged(status));
        }
    }

    /// Owner and topic of a live, initialized engine
    fn live_target(&self) -> SyncResult<(OwnerId, TopicId)> {
        if self.is_disposed() {
            return Err(SyncError::Disposed);
        }
        let state = self.state.lock();
        match (&state.owner, state.topic) {
            (Some(owner), Some(topic)) => Ok((owner.clone(), topic)),
            _ => Err(SyncError::NotInitialized),
        }
    }

    fn apply_add(&self, record: Bookmark, origin: Origin) -> bool {
        if self.is_disposed() {
            return false;
        }
        let mut state = self.state.lock();
        match &state.owner {
            Some(owner) if *owner == record.owner_id => {}
            Some(owner) => {
                debug!(%owner, foreign = %record.owner_id, id = %record.id, "Ignoring bookmark of another owner");
                return false;
            }
            None => return false,
        }

        let id = record.id;
        if !state.list.insert_head(record) {
            debug!(%id, %origin, "Add already applied or tombstoned");
            return false;
        }
        drop(state);

        debug!(%id, %origin, "Bookmark added");
        self.emit(EngineEvent::Added { id, origin });
        true
    }

    fn apply_delete(&self, id: BookmarkId, origin: Origin) -> bool {
        if self.is_disposed() {
            return false;
        }
        let mut state = self.state.lock();
        if state.owner.is_none() {
            return false;
        }
        if state.list.remove(&id).is_none() {
            debug!(%id, %origin, "Delete for absent bookmark recorded");
            return false;
        }
        drop(state);

        debug!(%id, %origin, "Bookmark removed");
        self.emit(EngineEvent::Removed { id, origin });
        true
    }

    async fn publish(&self, topic: TopicId, event: BookmarkEvent) {
        match self.bus.publish(topic, self.session, &event).await {
            Ok(receivers) => {
                debug!(%topic, kind = event.kind(), id = %event.bookmark_id(), receivers, "Published");
            }
            Err(e) => {
                warn!(%topic, kind = event.kind(), id = %event.bookmark_id(), error = %e, "Publish failed");
            }
        }
    }

    /// Fetch the owner's listing and merge it under `ticket`
    async fn load(&self, owner: &OwnerId, ticket: LoadTicket) -> SyncResult<usize> {
        let fetched = self.store.list(owner).await;

        if self.is_disposed() {
            return Err(SyncError::Disposed);
        }

        let mut state = self.state.lock();
        match fetched {
            Ok(listing) => match state.list.finish_load(ticket, listing) {
                LoadOutcome::Applied { count } => {
                    let status = if state.bus_closed {
                        EngineStatus::Degraded(BROADCAST_CLOSED.to_string())
                    } else {
                        EngineStatus::Ready
                    };
                    self.set_status(&mut state, status);
                    drop(state);
                    info!(%owner, count, "Bookmarks loaded");
                    self.emit(EngineEvent::Loaded { count });
                    Ok(count)
                }
                LoadOutcome::Stale => {
                    debug!(%owner, "Discarding stale listing");
                    Ok(state.list.len())
                }
            },
            Err(e) => {
                state.list.abort_load(ticket);
                // A newer load still owns the status
                if !state.list.is_loading() {
                    self.set_status(&mut state, EngineStatus::Degraded(e.to_string()));
                }
                drop(state);
                warn!(%owner, error = %e, "Failed to load bookmarks");
                Err(SyncError::from_load(e))
            }
        }
    }
}

/// Background task applying frames from the owner's topic
async fn run_listener(
    inner: Weak<Inner>,
    mut subscription: Subscription,
    bus: Arc<dyn BroadcastBus>,
    cancel: CancellationToken,
) {
    let topic = subscription.topic();
    debug!(%topic, session = %subscription.session(), "Listener started");

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = subscription.recv() => match frame {
                Some(frame) => frame,
                None => {
                    if let Some(engine) = inner.upgrade() {
                        engine.mark_bus_closed();
                    }
                    warn!(%topic, "Broadcast topic closed; live updates stopped");
                    break;
                }
            },
        };

        let Some(engine) = inner.upgrade() else {
            break;
        };

        match frame.decode() {
            Ok(BookmarkEvent::Added(record)) => {
                engine.apply_add(record, Origin::Remote(frame.origin));
            }
            Ok(BookmarkEvent::Deleted { id }) => {
                engine.apply_delete(id, Origin::Remote(frame.origin));
            }
            Err(e) => {
                warn!(%topic, origin = %frame.origin, error = %e, "Skipping undecodable frame");
            }
        }
    }

    bus.unsubscribe(subscription).await;
    debug!(%topic, "Listener stopped");
}

/// Sync engine for one tab
///
/// Not `Clone`: one engine is one session. Dropping it cancels the listener
/// and stops all further list changes.
pub struct BookmarkSync {
    inner: Arc<Inner>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl BookmarkSync {
    /// Create an engine with default configuration
    pub fn new(store: Arc<dyn BookmarkStore>, bus: Arc<dyn BroadcastBus>) -> Self {
        Self::with_config(store, bus, &EngineConfig::default())
    }

    /// Create an engine; only `event_capacity` is read from `config`
    pub fn with_config(
        store: Arc<dyn BookmarkStore>,
        bus: Arc<dyn BroadcastBus>,
        config: &EngineConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                session: SessionId::new(),
                store,
                bus,
                state: Mutex::new(State::default()),
                event_tx,
                cancel: CancellationToken::new(),
                disposed: AtomicBool::new(false),
            }),
            listener: Mutex::new(None),
        }
    }

    /// Subscribe to the owner's topic, then load the owner's bookmarks.
    ///
    /// The subscription is live before the listing is requested, so nothing
    /// published in between is missed. Returns the number of visible
    /// bookmarks after the load.
    ///
    /// If subscribing fails the engine stays uninitialized and this may be
    /// called again. If the listing fails the subscription stays live, the
    /// status becomes `Degraded` and [`reload`](Self::reload) can retry.
    pub async fn initialize(&self, owner: OwnerId) -> SyncResult<usize> {
        if self.inner.is_disposed() {
            return Err(SyncError::Disposed);
        }

        let topic = TopicId::for_owner(&owner);
        let ticket = {
            let mut state = self.inner.state.lock();
            if state.owner.is_some() {
                return Err(SyncError::AlreadyInitialized);
            }
            state.owner = Some(owner.clone());
            state.topic = Some(topic);
            let ticket = state.list.begin_load();
            self.inner.set_status(&mut state, EngineStatus::Loading);
            ticket
        };

        info!(%owner, %topic, session = %self.inner.session, "Initializing bookmark sync");

        let subscription = match self.inner.bus.subscribe(topic, self.inner.session).await {
            Ok(subscription) => subscription,
            Err(e) => {
                let mut state = self.inner.state.lock();
                state.list.abort_load(ticket);
                state.owner = None;
                state.topic = None;
                self.inner.set_status(&mut state, EngineStatus::Idle);
                drop(state);
                warn!(%owner, %topic, error = %e, "Failed to subscribe");
                return Err(SyncError::Broadcast(e));
            }
        };

        if self.inner.is_disposed() {
            self.inner.bus.unsubscribe(subscription).await;
            return Err(SyncError::Disposed);
        }

        let handle = tokio::spawn(run_listener(
            Arc::downgrade(&self.inner),
            subscription,
            self.inner.bus.clone(),
            self.inner.cancel.clone(),
        ));
        *self.listener.lock() = Some(handle);

        self.inner.load(&owner, ticket).await
    }

    /// Fetch the listing again and merge it
    ///
    /// Entries the store no longer has are dropped, which repairs the list
    /// after missed broadcasts. Returns the number of visible bookmarks.
    pub async fn reload(&self) -> SyncResult<usize> {
        let (owner, _) = self.inner.live_target()?;
        let ticket = {
            let mut state = self.inner.state.lock();
            let ticket = state.list.begin_load();
            self.inner.set_status(&mut state, EngineStatus::Loading);
            ticket
        };
        debug!(%owner, "Reloading bookmarks");
        self.inner.load(&owner, ticket).await
    }

    /// Persist a new bookmark, show it, and tell the other sessions.
    ///
    /// Input is validated before anything else happens. A store failure is
    /// returned with the list unchanged. Publishing is fire and forget.
    pub async fn add_bookmark(&self, title: &str, url: &str) -> SyncResult<Bookmark> {
        let (owner, topic) = self.inner.live_target()?;
        let new = NewBookmark::parse(title, url)?;

        let record = self
            .inner
            .store
            .create(&owner, &new)
            .await
            .map_err(SyncError::Persistence)?;

        if self.inner.is_disposed() {
            debug!(id = %record.id, "Engine shut down during create; not applying");
            return Ok(record);
        }

        self.inner.apply_add(record.clone(), Origin::Local);
        self.inner
            .publish(topic, BookmarkEvent::Added(record.clone()))
            .await;

        Ok(record)
    }

    /// Remove a bookmark now, tell the other sessions, then delete it from
    /// the store.
    ///
    /// The removal is visible before the store is called. A store failure is
    /// returned but the removal and the broadcast stay in place. Deleting a
    /// record the store no longer has succeeds.
    pub async fn delete_bookmark(&self, id: BookmarkId) -> SyncResult<()> {
        let (owner, topic) = self.inner.live_target()?;

        self.inner.apply_delete(id, Origin::Local);
        self.inner.publish(topic, BookmarkEvent::Deleted { id }).await;

        match self.inner.store.delete(&owner, &id).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => {
                debug!(%owner, %id, "Bookmark already gone from store");
                Ok(())
            }
            Err(e) => {
                warn!(%owner, %id, error = %e, "Store delete failed; local removal kept");
                Err(SyncError::Persistence(e))
            }
        }
    }

    /// Merge a broadcast add. Returns whether the list changed.
    pub fn on_broadcast_add(&self, record: Bookmark) -> bool {
        self.inner.apply_add(record, Origin::Broadcast)
    }

    /// Merge a broadcast delete. Returns whether the list changed.
    pub fn on_broadcast_delete(&self, id: BookmarkId) -> bool {
        self.inner.apply_delete(id, Origin::Broadcast)
    }

    /// Stop the listener and release the subscription. Idempotent.
    ///
    /// Store calls already in flight complete, but their results are no
    /// longer applied.
    pub async fn shutdown(&self) {
        let first = !self.inner.disposed.swap(true, Ordering::SeqCst);
        self.inner.cancel.cancel();

        let handle = self.listener.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Listener task ended abnormally");
            }
        }

        if first {
            let mut state = self.inner.state.lock();
            self.inner.set_status(&mut state, EngineStatus::Disposed);
            info!(session = %self.inner.session, "Bookmark sync shut down");
        }
    }

    /// Snapshot of the visible list, newest first
    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.inner.state.lock().list.to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().list.is_empty()
    }

    pub fn contains(&self, id: &BookmarkId) -> bool {
        self.inner.state.lock().list.contains(id)
    }

    pub fn status(&self) -> EngineStatus {
        self.inner.state.lock().status.clone()
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.inner.state.lock().owner.clone()
    }

    pub fn session_id(&self) -> SessionId {
        self.inner.session
    }

    pub fn topic(&self) -> Option<TopicId> {
        self.inner.state.lock().topic
    }

    /// Receive [`EngineEvent`]s from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.event_tx.subscribe()
    }
}

impl Drop for BookmarkSync {
    fn drop(&mut self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner.cancel.cancel();
    }
}
