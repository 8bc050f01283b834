/// Sync coordination: cursors, windows and task dispatch
pub mod calendar;
pub mod cursor;
pub mod keys;
pub mod securities;
pub mod task;
pub mod window;

pub use calendar::{cache_trade_days, cached_trade_days, load_cached_calendar};
pub use cursor::{CursorKey, CursorStore};
pub use securities::{cache_security_list, cached_securities, cached_security_codes};
pub use task::{BarsSyncTask, TaskOutcome, TaskState};
pub use window::{compute_window, SyncWindow};
