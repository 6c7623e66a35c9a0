//! Cohort key assignment — calendar date or Monday-anchored ISO week.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use cohortlens_core::CohortGrain;

/// Derive the cohort key for a creation timestamp. Daily grain keys on
/// the calendar date; weekly grain keys on the Monday starting the ISO
/// week containing the timestamp, so week-boundary rows always land in
/// the week that contains them.
pub fn cohort_key(created_at: NaiveDateTime, grain: CohortGrain) -> NaiveDate {
    match grain {
        CohortGrain::Daily => created_at.date(),
        CohortGrain::Weekly => created_at.date().week(Weekday::Mon).first_day(),
    }
}
