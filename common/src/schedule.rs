// Schedule parsing and next run calculation for daemon mode
//
// Cron expressions use the `cron` crate syntax with second precision and are
// evaluated in the configured timezone.

use crate::errors::ScheduleError;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::str::FromStr;

/// Parse and validate a cron expression
pub fn parse_cron_expression(expression: &str) -> Result<CronSchedule, ScheduleError> {
    CronSchedule::from_str(expression).map_err(|e| ScheduleError::InvalidCronExpression {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Parse an IANA timezone name
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    name.parse::<Tz>()
        .map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))
}

/// Dispatch schedule: a cron expression bound to a timezone
#[derive(Debug, Clone)]
pub struct DispatchSchedule {
    expression: String,
    schedule: CronSchedule,
    timezone: Tz,
}

impl DispatchSchedule {
    pub fn new(expression: &str, timezone: &str) -> Result<Self, ScheduleError> {
        Ok(Self {
            expression: expression.to_string(),
            schedule: parse_cron_expression(expression)?,
            timezone: parse_timezone(timezone)?,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `reference`, in UTC
    pub fn next_after(&self, reference: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        let reference_in_tz = reference.with_timezone(&self.timezone);

        let next_in_tz = self
            .schedule
            .after(&reference_in_tz)
            .next()
            .ok_or_else(|| ScheduleError::NoNextExecution(self.expression.clone()))?;

        Ok(next_in_tz.with_timezone(&Utc))
    }

    /// Time left until the next fire time, zero if already due
    pub fn until_next(&self, now: DateTime<Utc>) -> Result<std::time::Duration, ScheduleError> {
        let next = self.next_after(now)?;
        Ok((next - now).to_std().unwrap_or_default())
    }
}
