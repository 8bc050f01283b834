pub mod event_bus;
pub mod redis_bus;
pub mod types;

pub use event_bus::{register, EventBus, EventHandler, LocalEventBus, Subscription};
pub use redis_bus::RedisEventBus;
pub use types::{Event, EventPayload, EventType};
