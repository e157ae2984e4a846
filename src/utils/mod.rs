use crate::models::Period;
use chrono::{Datelike, Local};
use regex::Regex;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Wall-clock timer that logs when a command starts and when it is dropped.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!("Finished: {} (took {:.2?})", self.label, self.elapsed());
    }
}

/// Format a large integer with thousands separators.
pub fn fmt_number(n: i64) -> String {
    let s = n.abs().to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    if n < 0 {
        result.push('-');
    }
    result.chars().rev().collect()
}

// ── Months & periods ──────────────────────────────────────────────────────────

pub const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

/// "November" for 11. Out-of-range months yield `None`.
pub fn month_name(month: u32) -> Option<&'static str> {
    MONTH_NAMES.get(month.checked_sub(1)? as usize).copied()
}

/// Accepts full names and three-letter abbreviations, any case.
pub fn month_from_name(name: &str) -> Option<u32> {
    let name = name.trim().to_lowercase();
    if name.len() < 3 {
        return None;
    }
    MONTH_NAMES
        .iter()
        .position(|m| {
            let m = m.to_lowercase();
            m == name || (name.len() <= 4 && m.starts_with(&name))
        })
        .map(|i| i as u32 + 1)
}

pub fn current_period() -> Period {
    let today = Local::now().date_naive();
    Period { year: today.year(), month: today.month() }
}

static PERIOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\b[\s,.\-]*(\d{4})\b",
    )
    .expect("period regex")
});

/// First "<month name> <4-digit year>" in free text. Unparseable text → `None`.
pub fn parse_period(text: &str) -> Option<Period> {
    let caps = PERIOD_RE.captures(text)?;
    let month = month_from_name(caps.get(1)?.as_str())?;
    let year = caps.get(2)?.as_str().parse().ok()?;
    Some(Period { year, month })
}

/// True when `text` names both the full month and the year of `period`.
pub fn mentions_period(text: &str, period: Period) -> bool {
    let Some(name) = month_name(period.month) else {
        return false;
    };
    let Ok(month_re) = Regex::new(&format!(r"(?i)\b{}\b", name)) else {
        return false;
    };
    let Ok(year_re) = Regex::new(&format!(r"\b{}\b", period.year)) else {
        return false;
    };
    month_re.is_match(text) && year_re.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_number() {
        assert_eq!(fmt_number(1_234_567), "1,234,567");
        assert_eq!(fmt_number(0), "0");
        assert_eq!(fmt_number(-42_000), "-42,000");
    }

    #[test]
    fn test_month_lookup() {
        assert_eq!(month_name(11), Some("November"));
        assert_eq!(month_name(0), None);
        assert_eq!(month_name(13), None);
        assert_eq!(month_from_name("nov"), Some(11));
        assert_eq!(month_from_name("SEPT"), Some(9));
        assert_eq!(month_from_name("June"), Some(6));
        assert_eq!(month_from_name("Ju"), None);
    }

    #[test]
    fn test_parse_period() {
        assert_eq!(
            parse_period("Offers for Hyundai cars November 2025"),
            Some(Period { year: 2025, month: 11 })
        );
        assert_eq!(
            parse_period("Kia discounts - Sep, 2024 edition"),
            Some(Period { year: 2024, month: 9 })
        );
        assert_eq!(parse_period("Hyundai offers this month"), None);
        assert_eq!(parse_period("Maybe 2025"), None);
    }

    #[test]
    fn test_mentions_period() {
        let nov = Period { year: 2025, month: 11 };
        assert!(mentions_period("Tata offers november 2025", nov));
        assert!(!mentions_period("Tata offers November 2024", nov));
        assert!(!mentions_period("Tata offers Nov 2025", nov));
    }
}
