//! Age filter: keep records whose owner is between 30 and 40 years old

use std::ops::Range;

use chrono::{Local, NaiveDate};

use crate::record::Record;

/// Accepted ages, in whole years
pub const AGE_RANGE: Range<u32> = 30..41;

/// Whole years between `birthdate` and `today`, calendar-aware.
///
/// The year only counts once the birthday has been reached. `None` for a
/// birth date in the future.
pub fn age_on(birthdate: NaiveDate, today: NaiveDate) -> Option<u32> {
    today.years_since(birthdate)
}

/// Age of the record's owner as of `today` if it falls in [`AGE_RANGE`].
///
/// Missing or malformed birth dates never qualify.
pub fn qualifying_age(record: &Record, today: NaiveDate) -> Option<u32> {
    let age = age_on(record.birthdate()?, today)?;
    AGE_RANGE.contains(&age).then_some(age)
}

/// Local calendar date used for validation
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
