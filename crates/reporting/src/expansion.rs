//! Period expansion — the one fan-out step in the pipeline. Each
//! subscription becomes one row per paid billing period.

use chrono::NaiveDate;
use cohortlens_core::{CohortGrain, SubscriptionRecord};

use crate::cohort::cohort_key;

/// One (subscription, paid period) pair. Recreated on every
/// recomputation and discarded after aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandedPeriodRow {
    pub cohort: NaiveDate,
    pub period: u32,
}

/// Expand each filtered row into `charges_count` rows with period
/// indices `0..charges_count`, all carrying the originating row's
/// cohort key. A row with zero paid periods produces nothing and so
/// never reaches period 0.
pub fn expand(rows: &[&SubscriptionRecord], grain: CohortGrain) -> Vec<ExpandedPeriodRow> {
    let mut expanded = Vec::new();
    for record in rows {
        let cohort = cohort_key(record.created_at, grain);
        for period in 0..record.charges_count {
            expanded.push(ExpandedPeriodRow { cohort, period });
        }
    }
    expanded
}
