use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use fancy_regex::Regex;
use regor_common::prelude::*;

pub struct DateTimeUtils;

impl DateTimeUtils {
    /// Parses `"1d 2h 30m 10s"`, `"45 seconds"`, `"2 hrs"` and the like into seconds.
    pub fn parse_duration(text: &str) -> RegorResult<i64> {
        lazy_static! {
            static ref DURATION_REGEX: Regex = Regex::new(
                r"(?i)^\s*(?:(\d+)\s*(?:days?|d))?\s*(?:(\d+)\s*(?:hours?|hrs?|h))?\s*(?:(\d+)\s*(?:minutes?|mins?|m))?\s*(?:(\d+)\s*(?:seconds?|secs?|s))?\s*$"
            )
            .expect("regex compile error");
        }

        let captures = DURATION_REGEX
            .captures(text)
            .map_err(|e| ErrorCode::IllegalArgument(format!("Not valid duration: {}, {}", text, e)))?
            .ok_or_else(|| ErrorCode::IllegalArgument(format!("Not valid duration: {}", text)))?;

        let mut parts = [0i64; 4];
        let mut matched = false;
        for (i, part) in parts.iter_mut().enumerate() {
            if let Some(m) = captures.get(i + 1) {
                *part = m.as_str().parse::<i64>()?;
                matched = true;
            }
        }
        if !matched {
            return fmt_err!(IllegalArgument, "Not valid duration: {}", text);
        }

        let [days, hours, minutes, seconds] = parts;
        Ok(((days * 24 + hours) * 60 + minutes) * 60 + seconds)
    }

    /// Parses `yyyy-MM-dd HH:mm`, `yyyy-MM-dd HH:mm <zone>` or `yyyy-MM-dd` into epoch millis.
    /// A date without a zone is read as UTC.
    pub fn parse_date(date: &str) -> RegorResult<i64> {
        let date = date.trim();

        if let Ok(date_time) = NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M") {
            return Ok(Utc.from_utc_datetime(&date_time).timestamp_millis());
        }

        if let Some((local, zone)) = date.rsplit_once(' ') {
            if let (Ok(date_time), Ok(tz)) = (
                NaiveDateTime::parse_from_str(local.trim(), "%Y-%m-%d %H:%M"),
                zone.parse::<Tz>(),
            ) {
                return tz
                    .from_local_datetime(&date_time)
                    .earliest()
                    .map(|x| x.timestamp_millis())
                    .ok_or_else(|| {
                        ErrorCode::IllegalArgument(format!("Invalid local time: {}", date))
                    });
            }
        }

        if let Ok(day) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            if let Some(date_time) = day.and_hms_opt(0, 0, 0) {
                return Ok(Utc.from_utc_datetime(&date_time).timestamp_millis());
            }
        }

        fmt_err!(IllegalArgument, "Unable to parse date: {}", date)
    }
}

#[cfg(test)]
mod tests {
    use super::DateTimeUtils;

    #[test]
    fn durations() {
        assert_eq!(DateTimeUtils::parse_duration("10s").unwrap(), 10);
        assert_eq!(DateTimeUtils::parse_duration("2 mins 5 secs").unwrap(), 125);
        assert_eq!(DateTimeUtils::parse_duration("1d 1h").unwrap(), 90_000);
        assert_eq!(DateTimeUtils::parse_duration(" 3 HOURS ").unwrap(), 10_800);
        assert!(DateTimeUtils::parse_duration("soon").is_err());
        assert!(DateTimeUtils::parse_duration("").is_err());
    }

    #[test]
    fn dates() {
        assert_eq!(
            DateTimeUtils::parse_date("2022-01-01").unwrap(),
            1_640_995_200_000
        );
        assert_eq!(
            DateTimeUtils::parse_date("2022-01-01 01:30").unwrap(),
            1_640_995_200_000 + 90 * 60 * 1000
        );
        assert_eq!(
            DateTimeUtils::parse_date("2022-01-01 09:00 Asia/Shanghai").unwrap(),
            1_640_995_200_000 + 60 * 60 * 1000
        );
        assert!(DateTimeUtils::parse_date("next tuesday").is_err());
    }
}
