/// Redis pub/sub transport for the event bus
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use super::event_bus::{EventBus, Subscription};
use super::types::{Event, EventType};
use crate::error::{Result, SyncError};

const CHANNEL_PREFIX: &str = "barsync.events";

pub struct RedisEventBus {
    client: redis::Client,
    publisher: Mutex<ConnectionManager>,
}

impl RedisEventBus {
    pub async fn connect(dsn: &str) -> Result<Self> {
        let client = redis::Client::open(dsn)?;
        let publisher = client.get_connection_manager().await?;
        Ok(Self {
            client,
            publisher: Mutex::new(publisher),
        })
    }

    pub fn channel(event_type: EventType) -> String {
        format!("{}.{}", CHANNEL_PREFIX, event_type.as_str())
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, event: Event) -> Result<()> {
        let channel = Self::channel(event.event_type);
        let json = serde_json::to_string(&event)
            .map_err(|e| SyncError::InternalError(format!("Event serialization failed: {}", e)))?;

        let receivers: i64 = {
            let mut conn = self.publisher.lock().await;
            redis::cmd("PUBLISH")
                .arg(&channel)
                .arg(json)
                .query_async(&mut *conn)
                .await?
        };

        if receivers == 0 {
            debug!("No subscribers on {}", channel);
        }
        Ok(())
    }

    async fn subscribe(&self, event_type: EventType) -> Result<Subscription> {
        let channel = Self::channel(event_type);
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&channel).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    msg = messages.next() => {
                        let Some(msg) = msg else { break };
                        let payload: String = match msg.get_payload() {
                            Ok(p) => p,
                            Err(e) => {
                                warn!("Unreadable message on {}: {}", channel, e);
                                continue;
                            }
                        };
                        match serde_json::from_str::<Event>(&payload) {
                            Ok(event) => {
                                if tx.send(event).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Dropping malformed event on {}: {}", channel, e),
                        }
                    }
                }
            }
            debug!("Unsubscribed from {}", channel);
        });

        Ok(rx)
    }
}
