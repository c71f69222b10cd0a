//! The backup schedule grammar.
//!
//! The grammar is deliberately narrow: it covers every cadence the engine
//! needs and rejects everything else at job-creation time. There is no
//! fallback cadence; an unrecognized expression is an error, not a
//! default. Supported forms, all evaluated in UTC:
//!
//! - `@hourly`, `@daily`, `@weekly`, `@monthly`
//! - `@every_Nm`, `@every_Nh` for a positive integer N
//! - `*/N * * * *` — every N minutes from the reference instant
//! - `M */N * * *` — at minute M, every N hours
//! - `M H * * *` — daily at H:M
//!
//! Day-of-month, month and day-of-week fields are not supported.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};

use crate::error::{BackupError, Result};

/// Validate a schedule expression without computing anything from it.
pub fn validate(expr: &str) -> Result<()> {
    next_run(expr, Utc::now()).map(|_| ())
}

/// Compute the next run instant for `expr` relative to `after`.
///
/// For every form except `@every_*` and `*/N`, the result strictly
/// follows `after`.
pub fn next_run(expr: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let invalid = |reason: &str| BackupError::InvalidSchedule {
        expr: expr.to_string(),
        reason: reason.to_string(),
    };

    match expr {
        "@hourly" => {
            let top = date_at(after.date_naive(), after.hour(), 0)?;
            Ok(top + Duration::hours(1))
        }
        "@daily" => date_at((after + Duration::days(1)).date_naive(), 0, 0),
        "@weekly" => {
            let days_since_monday = after.weekday().num_days_from_monday() as i64;
            let monday = after.date_naive() - Duration::days(days_since_monday);
            let mut candidate = date_at(monday, 0, 0)?;
            while candidate <= after {
                candidate += Duration::days(7);
            }
            Ok(candidate)
        }
        "@monthly" => {
            let (year, month) = if after.month() == 12 {
                (after.year() + 1, 1)
            } else {
                (after.year(), after.month() + 1)
            };
            let first = NaiveDate::from_ymd_opt(year, month, 1)
                .ok_or_else(|| invalid("date out of range"))?;
            date_at(first, 0, 0)
        }
        _ if expr.starts_with("@every_") => every(expr, after),
        _ => cron_subset(expr, after),
    }
}

/// `@every_Nm` / `@every_Nh`.
fn every(expr: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let invalid = |reason: String| BackupError::InvalidSchedule {
        expr: expr.to_string(),
        reason,
    };

    let spec = &expr["@every_".len()..];
    let (digits, unit) = match spec.char_indices().last() {
        Some((idx, unit @ ('m' | 'h'))) => (&spec[..idx], unit),
        _ => {
            return Err(invalid(
                "interval must end in 'm' (minutes) or 'h' (hours)".to_string(),
            ))
        }
    };

    let n: u32 = digits
        .parse()
        .map_err(|_| invalid(format!("interval {:?} is not a positive integer", digits)))?;
    if n == 0 {
        return Err(invalid("interval must be greater than zero".to_string()));
    }

    match unit {
        'm' => Ok(after + Duration::minutes(n as i64)),
        _ => Ok(after + Duration::hours(n as i64)),
    }
}

/// The three supported five-field forms.
fn cron_subset(expr: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let invalid = |reason: &str| BackupError::InvalidSchedule {
        expr: expr.to_string(),
        reason: reason.to_string(),
    };

    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(invalid("expected a five-field expression or an @-shortcut"));
    }
    if fields[2..] != ["*", "*", "*"] {
        return Err(invalid(
            "day-of-month, month and day-of-week fields are not supported",
        ));
    }

    let (minute_field, hour_field) = (fields[0], fields[1]);

    if let Some(step) = minute_field.strip_prefix("*/") {
        if hour_field != "*" {
            return Err(invalid("minute steps are only supported with hour '*'"));
        }
        let n = parse_bounded(expr, step, 1, 59, "minute step")?;
        return Ok(after + Duration::minutes(n as i64));
    }

    let minute = parse_bounded(expr, minute_field, 0, 59, "minute")?;

    if let Some(step) = hour_field.strip_prefix("*/") {
        let n = parse_bounded(expr, step, 1, 23, "hour step")?;
        let mut candidate = date_at(after.date_naive(), after.hour(), minute)?;
        while candidate <= after {
            candidate += Duration::hours(n as i64);
        }
        return Ok(candidate);
    }

    let hour = parse_bounded(expr, hour_field, 0, 23, "hour")?;
    let mut candidate = date_at(after.date_naive(), hour, minute)?;
    if candidate <= after {
        candidate += Duration::days(1);
    }
    Ok(candidate)
}

fn parse_bounded(expr: &str, field: &str, lo: u32, hi: u32, what: &str) -> Result<u32> {
    let n: u32 = field.parse().map_err(|_| BackupError::InvalidSchedule {
        expr: expr.to_string(),
        reason: format!("{} {:?} is not an integer", what, field),
    })?;
    if n < lo || n > hi {
        return Err(BackupError::InvalidSchedule {
            expr: expr.to_string(),
            reason: format!("{} must be between {} and {}", what, lo, hi),
        });
    }
    Ok(n)
}

fn date_at(date: NaiveDate, hour: u32, minute: u32) -> Result<DateTime<Utc>> {
    date.and_hms_opt(hour, minute, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| BackupError::InvalidSchedule {
            expr: String::new(),
            reason: "date out of range".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // 2024-05-14 is a Tuesday.
    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 14, 10, 30, 0).unwrap()
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn shortcut_forms() {
        let now = reference();
        assert_eq!(next_run("@hourly", now).unwrap(), at(2024, 5, 14, 11, 0));
        assert_eq!(next_run("@daily", now).unwrap(), at(2024, 5, 15, 0, 0));
        assert_eq!(next_run("@weekly", now).unwrap(), at(2024, 5, 20, 0, 0));
        assert_eq!(next_run("@monthly", now).unwrap(), at(2024, 6, 1, 0, 0));
    }

    #[test]
    fn weekly_from_monday_midnight_is_next_monday() {
        let monday_midnight = at(2024, 5, 13, 0, 0);
        assert_eq!(
            next_run("@weekly", monday_midnight).unwrap(),
            at(2024, 5, 20, 0, 0)
        );
    }

    #[test]
    fn monthly_rolls_over_december() {
        let december = at(2024, 12, 31, 23, 59);
        assert_eq!(next_run("@monthly", december).unwrap(), at(2025, 1, 1, 0, 0));
    }

    #[test]
    fn interval_forms() {
        let now = reference();
        assert_eq!(next_run("@every_15m", now).unwrap(), at(2024, 5, 14, 10, 45));
        assert_eq!(next_run("@every_2h", now).unwrap(), at(2024, 5, 14, 12, 30));
        assert_eq!(next_run("*/5 * * * *", now).unwrap(), at(2024, 5, 14, 10, 35));
    }

    #[test]
    fn minute_with_hour_step_advances_strictly_past_reference() {
        let now = reference();
        // 10:30 itself is not strictly after the reference.
        assert_eq!(
            next_run("30 */4 * * *", now).unwrap(),
            at(2024, 5, 14, 14, 30)
        );
        assert_eq!(
            next_run("45 */4 * * *", now).unwrap(),
            at(2024, 5, 14, 10, 45)
        );
    }

    #[test]
    fn daily_at_fixed_time() {
        let now = reference();
        assert_eq!(next_run("45 12 * * *", now).unwrap(), at(2024, 5, 14, 12, 45));
        // Already past today, so tomorrow.
        assert_eq!(next_run("0 2 * * *", now).unwrap(), at(2024, 5, 15, 2, 0));
    }

    #[test]
    fn strictly_follows_reference_for_non_interval_forms() {
        let now = reference();
        for expr in ["@hourly", "@daily", "@weekly", "@monthly", "30 10 * * *"] {
            assert!(next_run(expr, now).unwrap() > now, "{} not strict", expr);
        }
    }

    #[test]
    fn rejected_expressions() {
        let now = reference();
        let rejected = [
            "",
            "not a schedule",
            "@every_0m",
            "@every_-5h",
            "@every_5x",
            "@every_m",
            "*/0 * * * *",
            "*/5 2 * * *",
            "* * * * *",
            "60 2 * * *",
            "0 24 * * *",
            "0 0 1 * *",
            "0 0 * * 0",
            "0 0 * 1 *",
            "@hourly extra",
        ];
        for expr in rejected {
            assert!(next_run(expr, now).is_err(), "{:?} was accepted", expr);
        }
    }

    #[test]
    fn unsupported_fields_name_the_limitation() {
        let err = next_run("0 0 1 * *", reference()).unwrap_err();
        assert!(err
            .to_string()
            .contains("day-of-month, month and day-of-week fields are not supported"));
    }
}
