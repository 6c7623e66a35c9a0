//! Cohort retention analytics — filter, cohort assignment, period
//! expansion, aggregation, and chart-series derivation over an
//! in-memory subscription table.
//!
//! The pipeline is a pure function of (table, config): filter rows,
//! assign each a cohort key, expand one row per paid period, then
//! aggregate into a cohort-by-period matrix with churn, revenue, and
//! LTV columns plus a size-weighted TOTAL row.

pub mod aggregate;
pub mod cohort;
pub mod expansion;
pub mod filter;
pub mod series;

pub use aggregate::{
    build_report, ChurnMetrics, CohortMetrics, CohortReport, RetentionCell, RevenueMetrics,
    TotalMetrics,
};
pub use cohort::cohort_key;
pub use expansion::{expand, ExpandedPeriodRow};
pub use filter::apply_filters;
pub use series::{
    ltv_curve, modeled_ltv_curve, new_subscriptions, retention_heatmap, HeatmapCell, SeriesPoint,
};
