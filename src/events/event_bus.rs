/// Event Bus - Pub/Sub between master and worker processes
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::types::{Event, EventType};
use crate::error::{Result, SyncError};
use crate::utils::RecentKeys;

/// Published keys remembered for duplicate detection
const PUBLISHED_KEYS_CAPACITY: usize = 4096;

pub type EventHandler = Arc<dyn Fn(Event) -> futures_util::future::BoxFuture<'static, Result<()>> + Send + Sync>;

/// Stream of events of one kind; dropping it unsubscribes
pub type Subscription = mpsc::UnboundedReceiver<Event>;

/// Publish/subscribe by event kind, at-least-once delivery
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: Event) -> Result<()>;

    async fn subscribe(&self, event_type: EventType) -> Result<Subscription>;
}

/// Run `handler` for every event of `event_type`, one at a time
pub async fn register(
    bus: &dyn EventBus,
    event_type: EventType,
    handler: EventHandler,
) -> Result<JoinHandle<()>> {
    let mut rx = bus.subscribe(event_type).await?;
    debug!("Subscribed handler to event: {:?}", event_type);

    Ok(tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            debug!("Processing event: {} at {}", event_type.as_str(), event.timestamp);

            match handler(event).await {
                Ok(_) => {
                    debug!("Handler executed successfully for: {:?}", event_type);
                }
                Err(e) => {
                    error!(
                        "Handler failed for event {:?}: {} ({})",
                        event_type,
                        e,
                        e.error_code()
                    );
                }
            }
        }
        debug!("Subscription closed for event: {:?}", event_type);
    }))
}

/// In-process event bus for single-process mode and tests
pub struct LocalEventBus {
    /// Live subscriber channels for each event type
    subscribers: Arc<RwLock<HashMap<EventType, Vec<mpsc::UnboundedSender<Event>>>>>,

    /// Recently published keys; a repeat within the window is rejected
    published: Mutex<RecentKeys>,
}

impl LocalEventBus {
    pub fn new() -> Self {
        LocalEventBus {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            published: Mutex::new(RecentKeys::with_capacity(PUBLISHED_KEYS_CAPACITY)),
        }
    }
}

impl Default for LocalEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for LocalEventBus {
    async fn publish(&self, event: Event) -> Result<()> {
        if !self.published.lock().await.insert(&event.idempotency_key) {
            warn!(
                "Duplicate event detected: {} ({})",
                event.event_type.as_str(),
                event.idempotency_key
            );
            return Err(SyncError::DuplicateEvent(event.idempotency_key.clone()));
        }

        let mut subscribers = self.subscribers.write().await;
        match subscribers.get_mut(&event.event_type) {
            Some(senders) => {
                senders.retain(|tx| tx.send(event.clone()).is_ok());
            }
            None => {
                debug!("No handlers registered for event: {:?}", event.event_type);
            }
        }

        Ok(())
    }

    async fn subscribe(&self, event_type: EventType) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscribers = self.subscribers.write().await;
        subscribers.entry(event_type).or_default().push(tx);
        Ok(rx)
    }
}
