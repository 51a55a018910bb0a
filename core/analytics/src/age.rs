//! FILENAME: core/analytics/src/age.rs
//! Calendar age and age-bucket lookup.

use chrono::{Datelike, NaiveDate};
use herd_model::Record;

use crate::definition::{AgeBucket, AgeBucketTable};

/// Whole years between `birth_date` and `now`.
///
/// One year is subtracted while this year's birthday (month, day) has not
/// been reached yet. Negative when `birth_date` lies after `now`.
pub fn age_in_years(birth_date: NaiveDate, now: NaiveDate) -> i32 {
    let mut years = now.year() - birth_date.year();
    if (now.month(), now.day()) < (birth_date.month(), birth_date.day()) {
        years -= 1;
    }
    years
}

/// Age of a record, `None` when its birth date is missing or unreadable.
pub fn record_age(record: &Record, now: NaiveDate) -> Option<i32> {
    record.birth_date.map(|birth| age_in_years(birth, now))
}

/// Bucket of a record, `None` when it has no usable age.
pub fn record_bucket<'t>(
    record: &Record,
    now: NaiveDate,
    table: &'t AgeBucketTable,
) -> Option<&'t AgeBucket> {
    table.bucket_for(record_age(record, now))
}
