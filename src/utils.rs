//! Shared time utilities for the portal's operating timezone.
//!
//! The portal operates on Asia/Dhaka wall-clock time (UTC+6, no DST), so
//! hour buckets, hour-window labels and log timestamps are all rendered in
//! that offset regardless of where the process runs.

use chrono::{DateTime, FixedOffset, Timelike, Utc};

/// Portal operating timezone offset in hours (Asia/Dhaka, UTC+6).
pub const PORTAL_UTC_OFFSET_HOURS: i32 = 6;

/// Fixed offset for the portal timezone.
pub fn portal_offset() -> FixedOffset {
    FixedOffset::east_opt(PORTAL_UTC_OFFSET_HOURS * 3600).expect("valid portal offset")
}

/// Wall-clock hour (0-23) in the portal timezone, used as the hourly
/// rollover bucket.
pub fn hour_bucket(now: DateTime<Utc>) -> i32 {
    now.with_timezone(&portal_offset()).hour() as i32
}

fn format_hour_12(hour24: u32) -> String {
    let suffix = if hour24 >= 12 { "PM" } else { "AM" };
    let hour12 = match hour24 % 12 {
        0 => 12,
        h => h,
    };
    format!("{hour12} {suffix}")
}

/// Human display of the current hour window, e.g. "3 PM - 4 PM".
pub fn hour_window_label(now: DateTime<Utc>) -> String {
    let hour = now.with_timezone(&portal_offset()).hour();
    format!("{} - {}", format_hour_12(hour), format_hour_12((hour + 1) % 24))
}

/// Clock time in the portal timezone, e.g. "03:12 PM".
pub fn format_clock(time: DateTime<Utc>) -> String {
    time.with_timezone(&portal_offset()).format("%I:%M %p").to_string()
}
