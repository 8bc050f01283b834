/// SSE/SZSE Holiday Calendar Management
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::HashSet;

/// Weekday closures per year; later years come from the provider calendar
/// or `calendar.holidays`
const SSE_HOLIDAYS: &[(i32, &[(u32, u32)])] = &[
    (
        2022,
        &[
            (1, 3),   // New Year
            (1, 31),  // Spring Festival
            (2, 1),
            (2, 2),
            (2, 3),
            (2, 4),
            (4, 4),   // Qingming
            (4, 5),
            (5, 2),   // Labour Day
            (5, 3),
            (5, 4),
            (6, 3),   // Dragon Boat
            (9, 12),  // Mid-Autumn
            (10, 3),  // National Day
            (10, 4),
            (10, 5),
            (10, 6),
            (10, 7),
        ],
    ),
    (
        2023,
        &[
            (1, 2),
            (1, 23),
            (1, 24),
            (1, 25),
            (1, 26),
            (1, 27),
            (4, 5),
            (5, 1),
            (5, 2),
            (5, 3),
            (6, 22),
            (6, 23),
            (9, 29),
            (10, 2),
            (10, 3),
            (10, 4),
            (10, 5),
            (10, 6),
        ],
    ),
    (
        2024,
        &[
            (1, 1),
            (2, 9),
            (2, 12),
            (2, 13),
            (2, 14),
            (2, 15),
            (2, 16),
            (4, 4),
            (4, 5),
            (5, 1),
            (5, 2),
            (5, 3),
            (6, 10),
            (9, 16),
            (9, 17),
            (10, 1),
            (10, 2),
            (10, 3),
            (10, 4),
            (10, 7),
        ],
    ),
    (
        2025,
        &[
            (1, 1),
            (1, 28),
            (1, 29),
            (1, 30),
            (1, 31),
            (2, 3),
            (2, 4),
            (4, 4),
            (5, 1),
            (5, 2),
            (5, 5),
            (6, 2),
            (10, 1),
            (10, 2),
            (10, 3),
            (10, 6),
            (10, 7),
            (10, 8),
        ],
    ),
];

/// Built-in exchange holidays
pub fn get_sse_holidays() -> HashSet<NaiveDate> {
    SSE_HOLIDAYS
        .iter()
        .flat_map(|(year, days)| {
            days.iter()
                .filter_map(move |(m, d)| NaiveDate::from_ymd_opt(*year, *m, *d))
        })
        .collect()
}

/// Check if a date falls on Saturday or Sunday
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
