use chrono::{FixedOffset, SecondsFormat, TimeZone, Utc};

/// Number of seconds between 1601-01-01 and the Unix epoch
const SECONDS_TO_UNIX: i64 = 11_644_473_600;
/// FILETIME counts 100-ns intervals
const WINDOWS_TICKS: u64 = 10_000_000;
/// All timestamps render in UTC+9 (KST)
const DISPLAY_OFFSET_SECONDS: i32 = 9 * 3600;

/// Convert Windows FILETIME values to unixepoch seconds
pub(crate) fn filetime_to_unixepoch(filetime: &u64) -> i64 {
    // We should not overflow because of the division.
    (filetime / WINDOWS_TICKS) as i64 - SECONDS_TO_UNIX
}

/// The sub-second remainder of a FILETIME value in nanoseconds
pub(crate) fn filetime_subsec_nanos(filetime: &u64) -> u32 {
    ((filetime % WINDOWS_TICKS) * 100) as u32
}

/// Render a FILETIME value as ISO8601 in UTC+9. Zero renders as the empty string
pub(crate) fn filetime_to_iso(filetime: &u64) -> String {
    if *filetime == 0 {
        return String::new();
    }

    unixepoch_to_iso(filetime_to_unixepoch(filetime), filetime_subsec_nanos(filetime))
}

/// Render unixepoch seconds + nanoseconds as ISO8601 in UTC+9
pub(crate) fn unixepoch_to_iso(seconds: i64, nanos: u32) -> String {
    // Offset is a constant in range, construction cannot fail
    let display = match FixedOffset::east_opt(DISPLAY_OFFSET_SECONDS) {
        Some(result) => result,
        None => return String::new(),
    };

    match Utc.timestamp_opt(seconds, nanos).single() {
        Some(result) => result
            .with_timezone(&display)
            .to_rfc3339_opts(SecondsFormat::Micros, false),
        None => String::new(),
    }
}
