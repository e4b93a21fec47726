//! Human-readable rendering of remaining cooldown time.

const SECONDS_IN_MINUTE: u64 = 60;
const SECONDS_IN_HOUR: u64 = 3_600;
const SECONDS_IN_DAY: u64 = 86_400;

/// Format whole seconds as `"2d 3h 5m 30s"`, omitting zero components.
pub fn format_seconds(seconds: u64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }

    let days = seconds / SECONDS_IN_DAY;
    let hours = (seconds % SECONDS_IN_DAY) / SECONDS_IN_HOUR;
    let minutes = (seconds % SECONDS_IN_HOUR) / SECONDS_IN_MINUTE;
    let secs = seconds % SECONDS_IN_MINUTE;

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{days}d "));
    }
    if hours > 0 {
        out.push_str(&format!("{hours}h "));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m "));
    }
    if secs > 0 || out.is_empty() {
        out.push_str(&format!("{secs}s"));
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_zero_seconds() {
        assert_eq!(format_seconds(0), "0s");
    }

    #[test]
    fn seconds_only() {
        assert_eq!(format_seconds(45), "45s");
    }

    #[test]
    fn minutes_and_seconds() {
        assert_eq!(format_seconds(330), "5m 30s");
    }

    #[test]
    fn whole_minutes_omit_seconds() {
        assert_eq!(format_seconds(120), "2m");
    }

    #[test]
    fn full_spread() {
        // 1 day, 1 hour, 1 minute, 1 second
        assert_eq!(format_seconds(90_061), "1d 1h 1m 1s");
    }

    #[test]
    fn exact_day() {
        assert_eq!(format_seconds(86_400), "1d");
    }
}
