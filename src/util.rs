use core::{fmt, str::FromStr, time::Duration};
use std::sync::LazyLock;

use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};
use rand::Rng;
use regex::Regex;

pub const DAY_SECS: i64 = 60 * 60 * 24;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Unix seconds -> `2015-06-18 14:57:44` in local time.
pub fn time_string(timestamp: i64) -> Option<String> {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|t| t.format(TIME_FORMAT).to_string())
}

pub fn now() -> i64 {
    Local::now().timestamp()
}

/// How far back the fetcher scrolls, in unix seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cutoff(pub i64);

impl Cutoff {
    /// Whole days between the cutoff and `now`, never less than one.
    pub fn elapsed_days(self, now: i64) -> i64 {
        let days = (now.saturating_sub(self.0) as f64 / DAY_SECS as f64).round() as i64;
        days.max(1)
    }
}

impl FromStr for Cutoff {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        if let Ok(secs) = s.parse() {
            return Ok(Self(secs));
        }
        let naive = match NaiveDateTime::parse_from_str(s, TIME_FORMAT) {
            Ok(t) => t,
            Err(_) => NaiveDate::parse_from_str(s, "%Y-%m-%d")?
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| anyhow::anyhow!("invalid cutoff {s:?}"))?,
        };
        let local = Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| anyhow::anyhow!("cutoff {s:?} does not exist in local time"))?;
        Ok(Self(local.timestamp()))
    }
}

impl fmt::Display for Cutoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match time_string(self.0) {
            Some(t) => f.write_str(&t),
            None => write!(f, "@{}", self.0),
        }
    }
}

static COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)([KkMm]?)$").unwrap());

/// Parses a displayed counter such as `1,234`, `1.2K` or `3M`.
pub fn parse_count(text: &str) -> Option<u64> {
    let text = text.replace([',', ' ', '\n'], "");
    let cap = COUNT.captures(&text)?;
    let number = cap.get(1)?.as_str();
    let scale = match cap.get(2).map(|m| m.as_str()) {
        Some("K" | "k") => 1_000,
        Some("M" | "m") => 1_000_000,
        _ => return number.parse().ok(),
    };
    let value = number.parse::<f64>().ok()? * f64::from(scale);
    Some(value.round() as u64)
}

/// Base delay plus uniform jitter in `[0, jitter)`.
pub fn jitter(base: Duration, jitter: Duration) -> Duration {
    base + jitter.mul_f64(rand::rng().random::<f64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts() {
        assert_eq!(parse_count("42"), Some(42));
        assert_eq!(parse_count("1,234"), Some(1234));
        assert_eq!(parse_count(" 7 "), Some(7));
        assert_eq!(parse_count("1.2K"), Some(1200));
        assert_eq!(parse_count("3M"), Some(3_000_000));
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("Retweet"), None);
    }

    #[test]
    fn cutoff_forms() {
        assert_eq!("1433116800".parse::<Cutoff>().unwrap(), Cutoff(1_433_116_800));

        let day: Cutoff = "2015-06-01".parse().unwrap();
        let full: Cutoff = "2015-06-01 00:00:00".parse().unwrap();
        assert_eq!(day, full);
        assert_eq!(time_string(day.0).as_deref(), Some("2015-06-01 00:00:00"));

        assert!("last tuesday".parse::<Cutoff>().is_err());
    }

    #[test]
    fn elapsed_days_is_rounded_and_guarded() {
        let cutoff = Cutoff(1_000_000);
        assert_eq!(cutoff.elapsed_days(1_000_000 + 3 * DAY_SECS), 3);
        assert_eq!(cutoff.elapsed_days(1_000_000 + 3 * DAY_SECS - 3600), 3);
        assert_eq!(cutoff.elapsed_days(1_000_000 + 3600), 1);
        assert_eq!(cutoff.elapsed_days(1_000_000 - 10 * DAY_SECS), 1);
    }

    #[test]
    fn elapsed_days_saturates_at_extremes() {
        let far_past: Cutoff = "-9223372036854775808".parse().unwrap();
        assert!(far_past.elapsed_days(now()) > 100_000_000_000_000);
        assert_eq!(Cutoff(i64::MAX).elapsed_days(now()), 1);
        assert_eq!(Cutoff(i64::MAX).elapsed_days(i64::MIN), 1);
    }

    #[test]
    fn jitter_stays_in_range() {
        let base = Duration::from_millis(50);
        let span = Duration::from_millis(10);
        for _ in 0..32 {
            let d = jitter(base, span);
            assert!(d >= base && d <= base + span);
        }
        assert_eq!(jitter(Duration::ZERO, Duration::ZERO), Duration::ZERO);
    }
}
