/// `MM:SS`, or `HH:MM:SS` once an hour has been logged.
pub fn format_duration(total_seconds: u64) -> String {
    let (hrs, mins, secs) = split(total_seconds);
    if hrs == 0 {
        format!("{:02}:{:02}", mins, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hrs, mins, secs)
    }
}

/// Always `HH:MM:SS`.
pub fn format_clock(total_seconds: u64) -> String {
    let (hrs, mins, secs) = split(total_seconds);
    format!("{:02}:{:02}:{:02}", hrs, mins, secs)
}

fn split(total_seconds: u64) -> (u64, u64, u64) {
    (
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(75), "01:15");
        assert_eq!(format_duration(3599), "59:59");
        assert_eq!(format_duration(3600), "01:00:00");
        assert_eq!(format_duration(45_296), "12:34:56");
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "00:00:00");
        assert_eq!(format_clock(75), "00:01:15");
        assert_eq!(format_clock(360_000), "100:00:00");
    }
}
