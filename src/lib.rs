pub mod cache;
pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod logging;
pub mod master;
pub mod sync;
pub mod time;
pub mod types;
pub mod utils;
pub mod worker;

pub use context::AppContext;
pub use error::{Result, SyncError};
pub use types::*;
