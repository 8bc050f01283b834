pub mod calendar;
pub mod holidays;
pub mod session;

pub use calendar::{ExchangeCalendar, TradingCalendar};
pub use holidays::{get_sse_holidays, is_weekend};
pub use session::{parse_clock, SessionHours};
