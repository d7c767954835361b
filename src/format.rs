//! Text helpers shared by the runner replies and the inspector reports.

use std::time::Duration;

/// Default ceiling for a single chat message body.
pub const DISPLAY_LIMIT: usize = 3500;

/// Appended when output is cut at the display limit.
pub const TRUNCATION_SUFFIX: &str = "\n... (output truncated)";

/// Longest command line echoed back above a result.
pub const COMMAND_ECHO_LIMIT: usize = 200;

/// Cut `text` to `limit` characters and append [`TRUNCATION_SUFFIX`].
///
/// Text at or under the limit comes back unchanged. Counts characters, not
/// bytes, so multi-byte output is never split mid-character.
pub fn truncate_for_display(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + TRUNCATION_SUFFIX.len());
            out.push_str(&text[..cut]);
            out.push_str(TRUNCATION_SUFFIX);
            out
        }
        None => text.to_string(),
    }
}

/// Reply body for a command run: the command echoed back, then the result in
/// a code block. The echo is capped at [`COMMAND_ECHO_LIMIT`] characters and
/// the result at `limit`.
pub fn command_reply(command: &str, result: &str, limit: usize) -> String {
    let echo = match command.char_indices().nth(COMMAND_ECHO_LIMIT) {
        Some((cut, _)) => format!("{}…", &command[..cut]),
        None => command.to_string(),
    };
    format!(
        "*Command:* `{}`\n\n*Result:*\n```\n{}\n```",
        echo,
        truncate_for_display(result, limit)
    )
}

pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Share of `part` in `total` as a percentage; 0 when `total` is 0.
pub fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// `3d 4h 5m`, or `4h 5m` when under a day.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else {
        format!("{}h {}m", hours, minutes)
    }
}

/// Thousands separators for counters: `1234567` → `1,234,567`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(truncate_for_display("hello", 10), "hello");
        let exact = "x".repeat(DISPLAY_LIMIT);
        assert_eq!(truncate_for_display(&exact, DISPLAY_LIMIT), exact);
    }

    #[test]
    fn test_long_text_cut_at_limit() {
        let long = "a".repeat(DISPLAY_LIMIT + 1);
        let out = truncate_for_display(&long, DISPLAY_LIMIT);
        assert_eq!(out.len(), DISPLAY_LIMIT + TRUNCATION_SUFFIX.len());
        assert!(out.ends_with(TRUNCATION_SUFFIX));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let text = "ж".repeat(20);
        let out = truncate_for_display(&text, 5);
        assert_eq!(out, format!("{}{}", "ж".repeat(5), TRUNCATION_SUFFIX));
    }

    #[test]
    fn test_command_reply_bounds_echo_and_result() {
        let command = format!("echo {}", "a".repeat(5000));
        let result = "b".repeat(DISPLAY_LIMIT * 2);
        let reply = command_reply(&command, &result, DISPLAY_LIMIT);
        assert!(reply.chars().count() < 4096, "reply is {} chars", reply.chars().count());
        assert!(reply.contains("…`"));
        assert!(reply.contains(TRUNCATION_SUFFIX));
    }

    #[test]
    fn test_uptime_formatting() {
        assert_eq!(format_uptime(Duration::from_secs(3 * 3600 + 7 * 60)), "3h 7m");
        assert_eq!(
            format_uptime(Duration::from_secs(2 * 86_400 + 3600 + 60)),
            "2d 1h 1m"
        );
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn test_percent_of_zero_total() {
        assert_eq!(percent(5, 0), 0.0);
        assert_eq!(percent(1, 4), 25.0);
    }
}
