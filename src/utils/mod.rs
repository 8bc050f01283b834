pub mod idempotency;
pub mod recent_keys;

pub use idempotency::generate_idempotency_key;
pub use recent_keys::RecentKeys;
