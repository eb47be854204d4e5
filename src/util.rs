use std::time::{SystemTime, UNIX_EPOCH};

/// A monotonically increasing timestamp for log lines. Logging
/// presentation is out of scope for this design (it is the thin
/// operator-facing wrapper the spec defers to an external layer), so this
/// stays a plain seconds-since-epoch counter rather than a calendar
/// formatter.
pub fn timestr() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    secs.to_string()
}

/// Log a line in the `[<timestamp>][<tag>] <msg>` shape used throughout the
/// tracker and peer.
#[macro_export]
macro_rules! log_line {
    ($tag:expr, $($arg:tt)*) => {
        println!("[{}][{}] {}", $crate::util::timestr(), $tag, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! warn_line {
    ($tag:expr, $($arg:tt)*) => {
        println!("[{}][{}][WARN] {}", $crate::util::timestr(), $tag, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestr_is_numeric() {
        assert!(timestr().parse::<u64>().is_ok());
    }
}
