//! Human-relative time phrases ("in 3 days", "2 months ago").
//!
//! Unit boundaries follow the moment.js defaults so alert text reads the way
//! operators are used to.

use chrono::{DateTime, Utc};

const SECONDS_THRESHOLD: f64 = 45.0;
const MINUTES_THRESHOLD: f64 = 45.0;
const HOURS_THRESHOLD: f64 = 22.0;
const DAYS_THRESHOLD: f64 = 26.0;
const MONTHS_THRESHOLD: f64 = 11.0;

/// Describes `target` relative to `now`.
///
/// # Examples
///
/// ```
/// use certwatch_notify::humanize::from_now;
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// assert_eq!(from_now(now + Duration::days(3), now), "in 3 days");
/// assert_eq!(from_now(now - Duration::hours(5), now), "5 hours ago");
/// ```
pub fn from_now(target: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let millis = (target - now).num_milliseconds();
    let phrase = duration_phrase(millis.unsigned_abs() as f64 / 1000.0);
    if millis > 0 {
        format!("in {phrase}")
    } else {
        format!("{phrase} ago")
    }
}

fn duration_phrase(secs: f64) -> String {
    let seconds = secs.round();
    let minutes = (secs / 60.0).round();
    let hours = (secs / 3600.0).round();
    let days_exact = secs / 86_400.0;
    let days = days_exact.round();
    let months_exact = days_exact * 4800.0 / 146_097.0;
    let months = months_exact.round();
    let years = (months_exact / 12.0).round();

    if seconds < SECONDS_THRESHOLD {
        "a few seconds".to_string()
    } else if minutes <= 1.0 {
        "a minute".to_string()
    } else if minutes < MINUTES_THRESHOLD {
        format!("{minutes} minutes")
    } else if hours <= 1.0 {
        "an hour".to_string()
    } else if hours < HOURS_THRESHOLD {
        format!("{hours} hours")
    } else if days <= 1.0 {
        "a day".to_string()
    } else if days < DAYS_THRESHOLD {
        format!("{days} days")
    } else if months <= 1.0 {
        "a month".to_string()
    } else if months < MONTHS_THRESHOLD {
        format!("{months} months")
    } else if years <= 1.0 {
        "a year".to_string()
    } else {
        format!("{years} years")
    }
}
