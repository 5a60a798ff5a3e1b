use std::fmt;

use chrono::{DateTime, FixedOffset, LocalResult, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

/// A wall-clock time of day in a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyCadence {
    tz: FixedOffset,
    target: NaiveTime,
}

impl DailyCadence {
    pub fn new(tz: FixedOffset, hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(|target| Self { tz, target })
    }

    /// Parse `"HH:MM"`.
    pub fn parse(tz: FixedOffset, hhmm: &str) -> anyhow::Result<Self> {
        let target = NaiveTime::parse_from_str(hhmm.trim(), "%H:%M")
            .map_err(|e| anyhow::anyhow!("invalid time of day '{hhmm}': {e}"))?;
        Ok(Self { tz, target })
    }

    /// Next occurrence strictly after `now`.
    pub fn next_run_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let localized_now = now.with_timezone(&self.tz);
        let mut date = localized_now.date_naive();
        if localized_now.time() >= self.target {
            date = advance_day(date);
        }

        let local_target = date.and_time(self.target);
        match self.tz.from_local_datetime(&local_target) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(first, _) => first.with_timezone(&Utc),
            // Fixed offsets have no gaps.
            LocalResult::None => Utc.from_utc_datetime(
                &(local_target - chrono::Duration::seconds(i64::from(self.tz.local_minus_utc()))),
            ),
        }
    }
}

impl fmt::Display for DailyCadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target.format("%H:%M"))
    }
}

/// `hours` east of UTC (negative for the Americas). Out-of-range offsets fall back to UTC.
pub fn offset_hours(hours: i32) -> FixedOffset {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

fn advance_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}

pub(crate) fn duration_until(next: DateTime<Utc>, now: DateTime<Utc>) -> std::time::Duration {
    (next - now).to_std().unwrap_or(std::time::Duration::from_secs(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_utc(ts: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(ts)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn brt() -> FixedOffset {
        offset_hours(-3)
    }

    #[test]
    fn next_run_same_day_when_before_trigger() {
        let c = DailyCadence::parse(brt(), "09:00").unwrap();
        let now = parse_utc("2025-10-14T10:30:00Z"); // 07:30 local
        assert_eq!(c.next_run_from(now), parse_utc("2025-10-14T12:00:00Z"));
    }

    #[test]
    fn next_run_next_day_when_past_trigger() {
        let c = DailyCadence::parse(brt(), "09:00").unwrap();
        let now = parse_utc("2025-10-14T20:00:00Z"); // 17:00 local
        assert_eq!(c.next_run_from(now), parse_utc("2025-10-15T12:00:00Z"));
    }

    #[test]
    fn exact_trigger_schedules_tomorrow() {
        let c = DailyCadence::parse(brt(), "09:00").unwrap();
        let now = parse_utc("2025-10-14T12:00:00Z");
        assert_eq!(c.next_run_from(now), parse_utc("2025-10-15T12:00:00Z"));
    }

    #[test]
    fn local_midnight_crosses_utc_date() {
        let c = DailyCadence::parse(brt(), "00:00").unwrap();
        let now = parse_utc("2025-10-14T23:00:00Z"); // 20:00 local
        assert_eq!(c.next_run_from(now), parse_utc("2025-10-15T03:00:00Z"));
    }

    #[test]
    fn rejects_bad_times() {
        assert!(DailyCadence::parse(brt(), "25:00").is_err());
        assert!(DailyCadence::parse(brt(), "nine").is_err());
        assert_eq!(DailyCadence::parse(brt(), " 18:00 ").unwrap().to_string(), "18:00");
    }

    #[test]
    fn huge_offsets_fall_back_to_utc() {
        assert_eq!(offset_hours(i32::MAX), Utc.fix());
        assert_eq!(offset_hours(-30), Utc.fix());
        assert_eq!(offset_hours(14).local_minus_utc(), 14 * 3600);
    }
}
