//! Per-collection lifecycle event bus.
//!
//! Indexes subscribe to the lifecycle events of the collection they
//! cover. Every write opens one transaction and emits its event before
//! committing; each handler stages its own maintenance operations onto
//! that transaction, so the primary write and all index updates land in
//! a single commit.
//!
//! # Ordering
//!
//! Handlers for one event run concurrently and must not rely on each
//! other's order. An emit waits for all of them and fails on the first
//! error, which aborts the enclosing write.
//!
//! # Lifetime
//!
//! A registration lives as long as its [`Subscription`]. Indexes hold
//! their subscriptions, so dropping an index unregisters it.

use crate::document::Document;
use crate::error::CoreResult;
use async_trait::async_trait;
use docdex_storage::Transaction;
use futures::future::try_join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Document lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// A document was created.
    Create,
    /// A document was merged with new fields.
    Update,
    /// A document was deleted.
    Delete,
}

impl Event {
    /// Every lifecycle event.
    pub const ALL: [Event; 3] = [Event::Create, Event::Update, Event::Delete];

    /// Returns the event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reacts to a lifecycle event by staging writes onto the shared
/// transaction.
///
/// Handlers must only stage. Committing is the emitter's job.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles `event` for a batch of documents.
    async fn handle(
        &self,
        event: Event,
        tx: &dyn Transaction,
        documents: &[Document],
    ) -> CoreResult<()>;
}

type Handlers = HashMap<Event, HashMap<Uuid, Arc<dyn EventHandler>>>;

/// Registry of lifecycle handlers for one collection.
///
/// Cloning shares the registry.
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<RwLock<Handlers>>,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `event`.
    ///
    /// The handler stays registered until the returned [`Subscription`]
    /// is cancelled or dropped.
    #[must_use = "dropping the subscription unregisters the handler"]
    pub fn listen(&self, event: Event, handler: Arc<dyn EventHandler>) -> Subscription {
        let id = Uuid::new_v4();
        self.handlers
            .write()
            .entry(event)
            .or_default()
            .insert(id, handler);
        tracing::trace!(%event, %id, "handler registered");
        Subscription {
            registry: Arc::downgrade(&self.handlers),
            event,
            id,
        }
    }

    /// Invokes every handler registered for `event` and waits for all.
    ///
    /// Handlers registered or cancelled while an emit is running do not
    /// affect it.
    ///
    /// # Errors
    ///
    /// Returns the first handler error. Other handlers may already have
    /// staged writes; the caller must not commit.
    pub async fn emit(
        &self,
        event: Event,
        tx: &dyn Transaction,
        documents: &[Document],
    ) -> CoreResult<()> {
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .handlers
            .read()
            .get(&event)
            .map(|registered| registered.values().cloned().collect())
            .unwrap_or_default();

        tracing::debug!(
            %event,
            handlers = handlers.len(),
            documents = documents.len(),
            "emitting"
        );

        try_join_all(
            handlers
                .iter()
                .map(|handler| handler.handle(event, tx, documents)),
        )
        .await?;
        Ok(())
    }

    /// Returns the number of handlers registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: Event) -> usize {
        self.handlers.read().get(&event).map_or(0, HashMap::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        let mut map = f.debug_map();
        for event in Event::ALL {
            map.entry(&event, &handlers.get(&event).map_or(0, HashMap::len));
        }
        map.finish()
    }
}

/// Handle to one handler registration.
///
/// Dropping it unregisters the handler.
pub struct Subscription {
    registry: Weak<RwLock<Handlers>>,
    event: Event,
    id: Uuid,
}

impl Subscription {
    /// Returns the event this subscription listens to.
    #[must_use]
    pub fn event(&self) -> Event {
        self.event
    }

    /// Returns the subscription id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Unregisters the handler.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut handlers = registry.write();
            if let Some(registered) = handlers.get_mut(&self.event) {
                registered.remove(&self.id);
                if registered.is_empty() {
                    handlers.remove(&self.event);
                }
            }
            tracing::trace!(event = %self.event, id = %self.id, "handler unregistered");
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use docdex_storage::{InMemoryBackend, StorageBackend};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(Event, usize)>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(
            &self,
            event: Event,
            tx: &dyn Transaction,
            documents: &[Document],
        ) -> CoreResult<()> {
            tx.sadd("seen", &[event.to_string()])?;
            self.seen.lock().push((event, documents.len()));
            Ok(())
        }
    }

    /// Stages one write, waits for its peer, then stages a second.
    struct Rendezvous {
        tag: &'static str,
        barrier: Arc<tokio::sync::Barrier>,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventHandler for Rendezvous {
        async fn handle(&self, _: Event, tx: &dyn Transaction, _: &[Document]) -> CoreResult<()> {
            for step in 1..=2 {
                let member = format!("{}{step}", self.tag);
                tx.sadd("interleaved", &[member.clone()])?;
                self.log.lock().push(member);
                if step == 1 {
                    self.barrier.wait().await;
                }
            }
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventHandler for Failing {
        async fn handle(&self, _: Event, _: &dyn Transaction, _: &[Document]) -> CoreResult<()> {
            Err(CoreError::invalid_index("failing", "always fails"))
        }
    }

    #[tokio::test]
    async fn emit_reaches_registered_handlers_only() {
        let bus = EventBus::new();
        let create = Arc::new(Recorder::default());
        let delete = Arc::new(Recorder::default());
        let _a = bus.listen(Event::Create, create.clone());
        let _b = bus.listen(Event::Delete, delete.clone());

        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        bus.emit(Event::Create, tx.as_ref(), &[]).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(create.seen.lock().as_slice(), &[(Event::Create, 0)]);
        assert!(delete.seen.lock().is_empty());
        assert_eq!(backend.smembers("seen").await.unwrap(), vec!["create"]);
    }

    #[tokio::test]
    async fn all_handlers_share_the_transaction() {
        let bus = EventBus::new();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let _a = bus.listen(Event::Update, first.clone());
        let _b = bus.listen(Event::Update, second.clone());

        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        bus.emit(Event::Update, tx.as_ref(), &[]).await.unwrap();
        assert!(backend.smembers("seen").await.unwrap().is_empty());

        tx.commit().await.unwrap();
        assert_eq!(first.seen.lock().len(), 1);
        assert_eq!(second.seen.lock().len(), 1);
        assert_eq!(backend.smembers("seen").await.unwrap(), vec!["update"]);
    }

    #[tokio::test]
    async fn handlers_run_concurrently_and_interleave_on_one_commit() {
        let bus = EventBus::new();
        let barrier = Arc::new(tokio::sync::Barrier::new(2));
        let log = Arc::new(Mutex::new(Vec::new()));
        let _subs: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|tag| {
                let handler = Rendezvous {
                    tag,
                    barrier: Arc::clone(&barrier),
                    log: Arc::clone(&log),
                };
                bus.listen(Event::Create, Arc::new(handler))
            })
            .collect();

        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        tokio::time::timeout(
            std::time::Duration::from_secs(3),
            bus.emit(Event::Create, tx.as_ref(), &[]),
        )
        .await
        .expect("handlers ran one after another")
        .unwrap();

        let order = log.lock().clone();
        let mut first_steps = order[..2].to_vec();
        first_steps.sort();
        assert_eq!(first_steps, ["a1", "b1"]);
        assert!(backend.smembers("interleaved").await.unwrap().is_empty());

        tx.commit().await.unwrap();
        let mut members = backend.smembers("interleaved").await.unwrap();
        members.sort();
        assert_eq!(members, ["a1", "a2", "b1", "b2"]);
    }

    #[tokio::test]
    async fn handler_error_fails_emit() {
        let bus = EventBus::new();
        let _ok = bus.listen(Event::Create, Arc::new(Recorder::default()));
        let _bad = bus.listen(Event::Create, Arc::new(Failing));

        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        let err = bus.emit(Event::Create, tx.as_ref(), &[]).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidIndex { .. }));
    }

    #[tokio::test]
    async fn dropping_subscription_unregisters() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder::default());
        let sub = bus.listen(Event::Create, recorder.clone());
        let kept = bus.listen(Event::Delete, recorder.clone());
        assert_eq!(bus.listener_count(Event::Create), 1);

        sub.cancel();
        assert_eq!(bus.listener_count(Event::Create), 0);
        assert_eq!(kept.event(), Event::Delete);
        assert_eq!(bus.listener_count(Event::Delete), 1);

        let backend = InMemoryBackend::new();
        let tx = backend.tx();
        bus.emit(Event::Create, tx.as_ref(), &[]).await.unwrap();
        assert!(recorder.seen.lock().is_empty());
    }

    #[test]
    fn subscription_outliving_bus_is_harmless() {
        let bus = EventBus::new();
        let sub = bus.listen(Event::Create, Arc::new(Recorder::default()));
        drop(bus);
        drop(sub);
    }

    #[test]
    fn debug_lists_counts() {
        let bus = EventBus::new();
        let _sub = bus.listen(Event::Create, Arc::new(Recorder::default()));
        let rendered = format!("{bus:?}");
        assert!(rendered.contains("Create: 1"));
        assert!(rendered.contains("Delete: 0"));
    }
}
