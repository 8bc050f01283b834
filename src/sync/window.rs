/// Incremental sync window computation
use chrono::{NaiveDateTime, NaiveTime};
use std::time::Duration;

use crate::time::TradingCalendar;
use crate::types::FrameType;

/// Contiguous run of frames to fetch, both ends inclusive and frame-aligned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub n_frames: usize,
}

impl SyncWindow {
    /// Dispatch timeout for this window, linear in the number of frames
    pub fn timeout(&self, per_frame: Duration) -> Duration {
        per_frame * self.n_frames.max(1) as u32
    }
}

/// Next window to sync for `frame_type` given the last synced frame.
///
/// Returns `None` when there is nothing to do at `now`: a non-trading day,
/// before the first frame of the session (minute level), before the session
/// close (day level), or when `last_cursor` already covers the end frame.
pub fn compute_window(
    now: NaiveDateTime,
    last_cursor: Option<NaiveDateTime>,
    calendar: &dyn TradingCalendar,
    frame_type: FrameType,
) -> Option<SyncWindow> {
    let today = now.date();
    if !calendar.is_trade_day(today) {
        return None;
    }

    let (start, end) = if frame_type.is_minute_level() {
        let first = calendar.first_min_frame(today, frame_type);
        if now < first {
            return None;
        }

        let close = calendar.session_close(today);
        let end = calendar.floor(now.min(close), frame_type);

        // a tail left over from an earlier session restarts at today's open
        let start = match last_cursor {
            Some(tail) if tail >= first => calendar.next_frame(calendar.floor(tail, frame_type), frame_type),
            _ => first,
        };
        (start, end)
    } else {
        if now < calendar.session_close(today) {
            return None;
        }

        let end = calendar.floor(today.and_time(NaiveTime::MIN), frame_type);
        let start = match last_cursor {
            Some(tail) => calendar.next_frame(calendar.floor(tail, frame_type), frame_type),
            None => end,
        };
        (start, end)
    };

    if start > end {
        return None;
    }

    Some(SyncWindow {
        start,
        end,
        n_frames: calendar.count_frames(start, end, frame_type),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ExchangeCalendar;
    use crate::types::parse_frame;
    use chrono::{Duration as ChronoDuration, Timelike};

    fn dt(s: &str) -> NaiveDateTime {
        parse_frame(s).unwrap()
    }

    #[test]
    fn test_intraday_window_from_cursor() {
        let cal = ExchangeCalendar::default();
        let window = compute_window(
            dt("2022-02-18 11:35:00"),
            Some(dt("2022-02-18 11:29:00")),
            &cal,
            FrameType::Min1,
        )
        .unwrap();

        assert_eq!(window.start, dt("2022-02-18 11:30:00"));
        assert_eq!(window.end, dt("2022-02-18 11:35:00"));
        assert_eq!(window.n_frames, 6);
    }

    #[test]
    fn test_non_trading_day_is_noop_all_day() {
        let cal = ExchangeCalendar::default();
        let mut now = dt("2022-02-19 00:00:00"); // Saturday
        while now < dt("2022-02-20 00:00:00") {
            assert_eq!(compute_window(now, None, &cal, FrameType::Min1), None);
            assert_eq!(compute_window(now, None, &cal, FrameType::Day), None);
            now += ChronoDuration::minutes(17);
        }

        // Spring Festival
        assert_eq!(compute_window(dt("2022-02-01 10:00:00"), None, &cal, FrameType::Min1), None);
    }

    #[test]
    fn test_before_first_frame_is_noop() {
        let cal = ExchangeCalendar::default();
        assert_eq!(compute_window(dt("2022-02-18 09:00:00"), None, &cal, FrameType::Min1), None);
        assert_eq!(compute_window(dt("2022-02-18 09:30:59"), None, &cal, FrameType::Min1), None);

        let first = compute_window(dt("2022-02-18 09:31:00"), None, &cal, FrameType::Min1).unwrap();
        assert_eq!(first.start, dt("2022-02-18 09:31:00"));
        assert_eq!(first.n_frames, 1);
    }

    #[test]
    fn test_stale_cursor_clamped_to_session_start() {
        let cal = ExchangeCalendar::default();
        let window = compute_window(
            dt("2022-02-21 09:33:10"),
            Some(dt("2022-02-18 15:00:00")),
            &cal,
            FrameType::Min1,
        )
        .unwrap();

        assert_eq!(window.start, dt("2022-02-21 09:31:00"));
        assert_eq!(window.end, dt("2022-02-21 09:33:00"));
        assert_eq!(window.n_frames, 3);
    }

    #[test]
    fn test_end_capped_at_close() {
        let cal = ExchangeCalendar::default();
        let window = compute_window(
            dt("2022-02-18 16:20:00"),
            Some(dt("2022-02-18 14:58:00")),
            &cal,
            FrameType::Min1,
        )
        .unwrap();
        assert_eq!(window.end, dt("2022-02-18 15:00:00"));
        assert_eq!(window.n_frames, 2);

        // already synced to the close
        assert_eq!(
            compute_window(dt("2022-02-18 15:01:00"), Some(dt("2022-02-18 15:00:00")), &cal, FrameType::Min1),
            None
        );
    }

    #[test]
    fn test_end_aligned_and_ordered_through_session() {
        let cal = ExchangeCalendar::default();
        for frame_type in [FrameType::Min1, FrameType::Min5, FrameType::Min30] {
            let step = frame_type.minutes().unwrap() as u32;
            let mut now = dt("2022-02-18 09:00:00");
            while now < dt("2022-02-18 16:00:00") {
                if let Some(window) = compute_window(now, None, &cal, frame_type) {
                    assert!(window.start <= window.end);
                    assert_eq!(window.end.second(), 0);
                    let from_open = (window.end - dt("2022-02-18 09:30:00")).num_minutes() as u32;
                    assert!(from_open % step == 0 || window.end == dt("2022-02-18 15:00:00"));
                }
                now += ChronoDuration::seconds(97);
            }
        }
    }

    #[test]
    fn test_same_inputs_same_window() {
        let cal = ExchangeCalendar::default();
        let now = dt("2022-02-18 13:47:31");
        let tail = Some(dt("2022-02-18 13:40:00"));
        assert_eq!(
            compute_window(now, tail, &cal, FrameType::Min1),
            compute_window(now, tail, &cal, FrameType::Min1)
        );
    }

    #[test]
    fn test_day_window_waits_for_close() {
        let cal = ExchangeCalendar::default();
        assert_eq!(compute_window(dt("2022-02-18 14:59:00"), None, &cal, FrameType::Day), None);

        let window = compute_window(dt("2022-02-18 15:05:00"), None, &cal, FrameType::Day).unwrap();
        assert_eq!(window.start, dt("2022-02-18"));
        assert_eq!(window.end, dt("2022-02-18"));
        assert_eq!(window.n_frames, 1);

        let catch_up =
            compute_window(dt("2022-02-18 15:05:00"), Some(dt("2022-02-16")), &cal, FrameType::Day).unwrap();
        assert_eq!(catch_up.start, dt("2022-02-17"));
        assert_eq!(catch_up.n_frames, 2);
    }

    #[test]
    fn test_week_window_needs_complete_week() {
        let cal = ExchangeCalendar::default();

        // Wednesday: last complete week already synced
        assert_eq!(
            compute_window(dt("2022-02-16 15:30:00"), Some(dt("2022-02-11")), &cal, FrameType::Week),
            None
        );

        let window =
            compute_window(dt("2022-02-18 15:30:00"), Some(dt("2022-02-11")), &cal, FrameType::Week).unwrap();
        assert_eq!(window.start, dt("2022-02-18"));
        assert_eq!(window.end, dt("2022-02-18"));
        assert_eq!(window.n_frames, 1);
    }

    #[test]
    fn test_timeout_scales_with_frames() {
        let window = SyncWindow {
            start: dt("2022-02-18 11:30:00"),
            end: dt("2022-02-18 11:35:00"),
            n_frames: 6,
        };
        assert_eq!(window.timeout(Duration::from_secs(60)), Duration::from_secs(360));
    }
}
