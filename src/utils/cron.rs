//! Cron schedule parsing utilities

use chrono::DateTime;
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidExpression { expr: String, reason: String },

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
}

/// Parse a cron expression
///
/// Classic 5-field expressions (minute precision) are accepted alongside the
/// 6/7-field form with seconds and years.
pub fn parse_schedule(expr: &str) -> Result<Schedule, ScheduleError> {
    let normalized = normalize_expression(expr);
    Schedule::from_str(&normalized).map_err(|e| ScheduleError::InvalidExpression {
        expr: expr.to_string(),
        reason: e.to_string(),
    })
}

/// Parse an IANA timezone name
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    name.parse::<Tz>()
        .map_err(|_| ScheduleError::UnknownTimezone(name.to_string()))
}

/// Next fire time strictly after `reference`
pub fn next_run(schedule: &Schedule, reference: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    schedule.after(reference).next()
}

fn normalize_expression(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}
