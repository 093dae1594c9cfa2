//! Broadcast bus: per-owner topics shared by every open session
//!
//! The engine only depends on the [`BroadcastBus`] trait. [`LocalBus`] is the
//! in-process implementation: one tokio broadcast channel per topic, so a
//! publish is an O(1) send and every subscription gets an independent
//! receiver buffering up to `capacity` frames.
//!
//! Delivery is best effort. A subscriber that falls more than `capacity`
//! frames behind loses the oldest ones, and nothing is replayed to late
//! subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::protocol::{BookmarkEvent, WireMessage};
use crate::config::BusConfig;
use crate::error::BusError;
use crate::types::{SessionId, TopicId};

/// One published event as seen by a subscriber
#[derive(Debug, Clone)]
pub struct Frame {
    /// Session that published the frame
    pub origin: SessionId,
    /// Encoded [`WireMessage`]
    pub payload: Arc<Vec<u8>>,
}

impl Frame {
    /// Encode an event into a frame
    pub fn encode(origin: SessionId, event: &BookmarkEvent) -> Result<Self, BusError> {
        let payload = WireMessage::from(event.clone()).to_bytes()?;
        Ok(Self {
            origin,
            payload: Arc::new(payload),
        })
    }

    /// Decode the carried event
    pub fn decode(&self) -> Result<BookmarkEvent, BusError> {
        WireMessage::event_from_bytes(&self.payload)
    }
}

/// A live subscription to one topic
///
/// Dropping it releases the underlying receiver. [`BroadcastBus::unsubscribe`]
/// also frees the topic at once; otherwise [`LocalBus`] frees it on the next
/// publish to that topic.
pub struct Subscription {
    topic: TopicId,
    session: SessionId,
    receiver: broadcast::Receiver<Frame>,
    echo: bool,
}

impl Subscription {
    /// Wrap a receiver. With `echo` disabled, frames published by `session`
    /// itself are skipped.
    pub fn new(
        topic: TopicId,
        session: SessionId,
        receiver: broadcast::Receiver<Frame>,
        echo: bool,
    ) -> Self {
        Self {
            topic,
            session,
            receiver,
            echo,
        }
    }

    pub fn topic(&self) -> TopicId {
        self.topic
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Receive the next frame
    ///
    /// Returns None once the topic is closed.
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            match self.receiver.recv().await {
                Ok(frame) => {
                    if !self.echo && frame.origin == self.session {
                        continue;
                    }
                    return Some(frame);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, session = %self.session, skipped, "Lagged behind on topic");
                    // Continue with the oldest frame still buffered
                }
                Err(RecvError::Closed) => {
                    debug!(topic = %self.topic, session = %self.session, "Topic closed");
                    return None;
                }
            }
        }
    }
}

/// Publish/subscribe transport scoped to per-owner topics
#[async_trait]
pub trait BroadcastBus: Send + Sync {
    /// Start receiving frames published on `topic`
    async fn subscribe(&self, topic: TopicId, session: SessionId)
        -> Result<Subscription, BusError>;

    /// Publish an event. Returns how many subscriptions the frame was handed
    /// to; zero is not an error.
    async fn publish(
        &self,
        topic: TopicId,
        origin: SessionId,
        event: &BookmarkEvent,
    ) -> Result<usize, BusError>;

    /// Release a subscription
    async fn unsubscribe(&self, subscription: Subscription);
}

/// In-process bus: one broadcast channel per topic
pub struct LocalBus {
    topics: RwLock<HashMap<TopicId, broadcast::Sender<Frame>>>,
    config: BusConfig,
    closed: AtomicBool,
    frames_published: AtomicU64,
}

impl LocalBus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            config,
            closed: AtomicBool::new(false),
            frames_published: AtomicU64::new(0),
        }
    }

    /// Number of topics with a channel
    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }

    /// Number of live subscriptions on a topic
    pub fn subscriber_count(&self, topic: &TopicId) -> usize {
        self.topics
            .read()
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Total frames accepted by `publish`
    pub fn frames_published(&self) -> u64 {
        self.frames_published.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Close every topic. Subscribers see the end of their stream; later
    /// publishes and subscribes fail with [`BusError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.topics.write().clear();
    }

    /// Drop the channel of a topic nobody listens to any more. Subscriptions
    /// dropped without `unsubscribe` are collected by the next publish.
    fn prune(&self, topic: &TopicId) {
        let mut topics = self.topics.write();
        if topics
            .get(topic)
            .map(|tx| tx.receiver_count() == 0)
            .unwrap_or(false)
        {
            topics.remove(topic);
        }
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        Ok(())
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

#[async_trait]
impl BroadcastBus for LocalBus {
    async fn subscribe(
        &self,
        topic: TopicId,
        session: SessionId,
    ) -> Result<Subscription, BusError> {
        self.ensure_open()?;

        let receiver = {
            let mut topics = self.topics.write();
            let capacity = self.config.capacity.max(1);
            topics
                .entry(topic)
                .or_insert_with(|| broadcast::channel(capacity).0)
                .subscribe()
        };

        debug!(%topic, %session, "Subscribed");
        Ok(Subscription::new(
            topic,
            session,
            receiver,
            self.config.echo_to_publisher,
        ))
    }

    async fn publish(
        &self,
        topic: TopicId,
        origin: SessionId,
        event: &BookmarkEvent,
    ) -> Result<usize, BusError> {
        self.ensure_open()?;

        let frame = Frame::encode(origin, event)?;
        let sender = self.topics.read().get(&topic).cloned();
        self.frames_published.fetch_add(1, Ordering::Relaxed);

        // No channel or no receivers: nobody is listening, the frame is dropped
        let delivered = match sender {
            Some(tx) => tx.send(frame).unwrap_or(0),
            None => 0,
        };
        if delivered == 0 {
            self.prune(&topic);
        }

        debug!(%topic, %origin, kind = event.kind(), delivered, "Published");
        Ok(delivered)
    }

    async fn unsubscribe(&self, subscription: Subscription) {
        let topic = subscription.topic;
        let session = subscription.session;
        drop(subscription);

        self.prune(&topic);
        debug!(%topic, %session, "Unsubscribed");
    }
}
