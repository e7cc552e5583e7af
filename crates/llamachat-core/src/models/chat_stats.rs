use chrono::{DateTime, Local};
use std::time::Duration;

use super::message::ChatMessage;

/// Running usage statistics for one chat session
#[derive(Debug, Clone, PartialEq)]
pub struct ChatStatistics {
    /// Completed assistant replies
    total_exchanges: u64,

    /// Characters of user + assistant content across completed exchanges
    total_chars: u64,

    session_start: DateTime<Local>,
}

impl ChatStatistics {
    pub fn new() -> Self {
        Self::started_at(Local::now())
    }

    pub fn started_at(session_start: DateTime<Local>) -> Self {
        Self {
            total_exchanges: 0,
            total_chars: 0,
            session_start,
        }
    }

    /// Account for one successful exchange
    pub fn record_exchange(&mut self, user: &ChatMessage, assistant: &ChatMessage) {
        let chars = user.char_count() + assistant.char_count();
        self.total_exchanges += 1;
        self.total_chars += chars as u64;
    }

    pub fn total_exchanges(&self) -> u64 {
        self.total_exchanges
    }

    pub fn total_chars(&self) -> u64 {
        self.total_chars
    }

    pub fn session_start(&self) -> DateTime<Local> {
        self.session_start
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Local::now())
    }

    pub fn elapsed_at(&self, now: DateTime<Local>) -> Duration {
        (now - self.session_start).to_std().unwrap_or_default()
    }
}

impl Default for ChatStatistics {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a session duration as `"{minutes}m {seconds}s"`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}m {}s", secs / 60, secs % 60)
}

/// Format a count with comma thousands separators, e.g. `12,345`
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
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
    use chrono::TimeDelta;

    #[test]
    fn test_record_exchange_sums_both_sides() {
        let mut stats = ChatStatistics::new();
        stats.record_exchange(&ChatMessage::user("Hi"), &ChatMessage::assistant("Hello there"));
        stats.record_exchange(&ChatMessage::user("Wie geht's?"), &ChatMessage::assistant("Grüße"));

        assert_eq!(stats.total_exchanges(), 2);
        // characters, not bytes
        assert_eq!(stats.total_chars(), 2 + 11 + 11 + 5);
    }

    #[test]
    fn test_elapsed_from_start() {
        let start = Local::now();
        let stats = ChatStatistics::started_at(start);
        let later = start + TimeDelta::seconds(125);
        assert_eq!(stats.elapsed_at(later), Duration::from_secs(125));
    }

    #[test]
    fn test_elapsed_never_negative() {
        let start = Local::now();
        let stats = ChatStatistics::started_at(start);
        let earlier = start - TimeDelta::seconds(5);
        assert_eq!(stats.elapsed_at(earlier), Duration::ZERO);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0m 0s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "60m 0s");
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(1234567), "1,234,567");
    }
}
