use crate::model::{DateRange, Granularity};
use chrono::{DateTime, Datelike, Days, FixedOffset, Months, NaiveDate, Utc};

/// ISO week label, using the ISO week-year so late-December days that belong
/// to week 1 are labelled with the following year.
pub fn week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

pub fn interval_label(date: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Day => format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day()),
        Granularity::Week => week_key(date),
        Granularity::Month => format!("{:04}-{:02}", date.year(), date.month()),
    }
}

/// First day of the bucket containing `date`.
pub fn bucket_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Day => date,
        Granularity::Week => date
            .checked_sub_days(Days::new(date.weekday().num_days_from_monday() as u64))
            .unwrap_or(date),
        Granularity::Month => date.with_day(1).unwrap_or(date),
    }
}

fn next_bucket(start: NaiveDate, granularity: Granularity) -> Option<NaiveDate> {
    match granularity {
        Granularity::Day => start.checked_add_days(Days::new(1)),
        Granularity::Week => start.checked_add_days(Days::new(7)),
        Granularity::Month => start.checked_add_months(Months::new(1)),
    }
}

/// Every bucket label touching `range`, ascending and without gaps.
pub fn interval_labels(range: &DateRange, granularity: Granularity) -> Vec<String> {
    let mut labels = Vec::new();
    let mut cursor = Some(bucket_start(range.start(), granularity));
    while let Some(current) = cursor.filter(|c| *c <= range.end()) {
        labels.push(interval_label(current, granularity));
        cursor = next_bucket(current, granularity);
    }
    labels
}

/// Calendar day a commit is bucketed under. Timestamps are normalised to UTC.
pub fn commit_day(timestamp: &DateTime<FixedOffset>) -> NaiveDate {
    timestamp.with_timezone(&Utc).date_naive()
}
