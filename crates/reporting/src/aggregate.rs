//! Aggregation engine — cohort sizes, the retention matrix, churn,
//! revenue/LTV, and the size-weighted TOTAL row.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use cohortlens_core::{
    ChurnSignal, CohortGrain, ReportConfig, SchemaNotice, SubscriptionRecord, SubscriptionTable,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cohort::cohort_key;
use crate::expansion::expand;
use crate::filter::apply_filters;

/// One cell of the retention matrix. A terminal-churn cell marks a
/// fully churned cohort with no occurrences at that period, as opposed
/// to a genuine zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RetentionCell {
    Value { count: u64, pct: f64 },
    TerminalChurn,
}

impl RetentionCell {
    pub fn count(&self) -> u64 {
        match self {
            RetentionCell::Value { count, .. } => *count,
            RetentionCell::TerminalChurn => 0,
        }
    }

    pub fn pct(&self) -> f64 {
        match self {
            RetentionCell::Value { pct, .. } => *pct,
            RetentionCell::TerminalChurn => 0.0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RetentionCell::TerminalChurn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChurnMetrics {
    pub count: u64,
    pub pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevenueMetrics {
    pub sum: f64,
    /// Average cumulative revenue per period-0 subscriber.
    pub ltv: f64,
}

/// Metrics for one dated cohort. Cohorts that never reach period 0 are
/// excluded from the report entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortMetrics {
    pub cohort: NaiveDate,
    /// Subscribers at period 0.
    pub size: u64,
    /// One cell per period index `0..=max_period`.
    pub retention: Vec<RetentionCell>,
    /// `None` when the configured churn signal's column is absent.
    pub dead: Option<ChurnMetrics>,
    /// `None` when the monetary column is absent.
    pub revenue: Option<RevenueMetrics>,
}

/// The synthetic TOTAL row: size-weighted means for percentage metrics
/// and LTV, plain sums for size, death count, and revenue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalMetrics {
    pub size: u64,
    pub retention_pct: Vec<f64>,
    pub dead_count: Option<u64>,
    pub dead_pct: Option<f64>,
    pub revenue_sum: Option<f64>,
    pub ltv: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortReport {
    pub grain: CohortGrain,
    /// Dated cohorts, most recent first.
    pub cohorts: Vec<CohortMetrics>,
    /// Rendered after all dated cohorts regardless of sort direction.
    pub total: Option<TotalMetrics>,
    /// Period indices run `0..=max_period` across the whole matrix.
    pub max_period: u32,
    pub notices: Vec<SchemaNotice>,
    pub computed_at: DateTime<Utc>,
}

/// Run the full pipeline: filter, assign cohorts, expand periods,
/// aggregate. Pure with respect to (table, config); an empty filtered
/// set yields an empty report, never an error.
pub fn build_report(table: &SubscriptionTable, config: &ReportConfig) -> CohortReport {
    let filtered = apply_filters(table, config);
    let expanded = expand(&filtered, config.grain);
    debug!(
        filtered = filtered.len(),
        expanded = expanded.len(),
        "pipeline expanded"
    );

    // cohort -> period -> occurrence count
    let mut period_counts: BTreeMap<NaiveDate, BTreeMap<u32, u64>> = BTreeMap::new();
    let mut max_period = 0u32;
    for row in &expanded {
        *period_counts
            .entry(row.cohort)
            .or_default()
            .entry(row.period)
            .or_insert(0) += 1;
        max_period = max_period.max(row.period);
    }

    let churn_enabled = table.schema.supports_churn(config.churn_signal);
    if !churn_enabled {
        warn!(
            signal = ?config.churn_signal,
            "churn signal column absent, death metrics disabled"
        );
    }
    let revenue_enabled = table.schema.has_amount;

    // churn and revenue come from the filtered rows, not the expansion
    #[derive(Default)]
    struct RowAggregate {
        dead: u64,
        revenue: f64,
    }
    let mut row_aggregates: BTreeMap<NaiveDate, RowAggregate> = BTreeMap::new();
    for record in &filtered {
        let cohort = cohort_key(record.created_at, config.grain);
        let aggregate = row_aggregates.entry(cohort).or_default();
        if churn_enabled && is_churned(record, config.churn_signal) {
            aggregate.dead += 1;
        }
        if let Some(amount) = record.amount {
            aggregate.revenue += amount;
        }
    }

    let mut cohorts = Vec::new();
    for (cohort, periods) in &period_counts {
        let size = periods.get(&0).copied().unwrap_or(0);
        if size == 0 {
            // never a division target
            continue;
        }

        let aggregate = row_aggregates.get(cohort);
        let dead = churn_enabled.then(|| {
            let count = aggregate.map(|a| a.dead).unwrap_or(0);
            ChurnMetrics {
                count,
                pct: round1(count as f64 / size as f64 * 100.0),
            }
        });
        let revenue = revenue_enabled.then(|| {
            let sum = aggregate.map(|a| a.revenue).unwrap_or(0.0);
            RevenueMetrics {
                sum,
                ltv: round2(sum / size as f64),
            }
        });

        let fully_churned = dead.map(|d| d.pct == 100.0).unwrap_or(false);
        let retention = (0..=max_period)
            .map(|period| {
                let count = periods.get(&period).copied().unwrap_or(0);
                if fully_churned && count == 0 {
                    RetentionCell::TerminalChurn
                } else {
                    RetentionCell::Value {
                        count,
                        pct: round1(count as f64 / size as f64 * 100.0),
                    }
                }
            })
            .collect();

        cohorts.push(CohortMetrics {
            cohort: *cohort,
            size,
            retention,
            dead,
            revenue,
        });
    }

    // most recent cohort first
    cohorts.sort_by(|a, b| b.cohort.cmp(&a.cohort));

    let total = build_total(&cohorts);

    CohortReport {
        grain: config.grain,
        cohorts,
        total,
        max_period,
        notices: table.schema.notices.clone(),
        computed_at: Utc::now(),
    }
}

fn is_churned(record: &SubscriptionRecord, signal: ChurnSignal) -> bool {
    match signal {
        ChurnSignal::NextChargeMissing => record.next_charge_date.is_none(),
        ChurnSignal::StatusCanceled => record
            .status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("canceled"))
            .unwrap_or(false),
    }
}

fn build_total(cohorts: &[CohortMetrics]) -> Option<TotalMetrics> {
    if cohorts.is_empty() {
        return None;
    }

    let total_size: u64 = cohorts.iter().map(|c| c.size).sum();
    let width = cohorts[0].retention.len();

    let retention_pct = (0..width)
        .map(|period| {
            let weighted: f64 = cohorts
                .iter()
                .map(|c| c.retention[period].pct() * c.size as f64)
                .sum();
            round1(weighted / total_size as f64)
        })
        .collect();

    let churn_enabled = cohorts.iter().all(|c| c.dead.is_some());
    let (dead_count, dead_pct) = if churn_enabled {
        let count = cohorts.iter().filter_map(|c| c.dead).map(|d| d.count).sum();
        let weighted: f64 = cohorts
            .iter()
            .filter_map(|c| c.dead.map(|d| d.pct * c.size as f64))
            .sum();
        (Some(count), Some(round1(weighted / total_size as f64)))
    } else {
        (None, None)
    };

    let revenue_enabled = cohorts.iter().all(|c| c.revenue.is_some());
    let (revenue_sum, ltv) = if revenue_enabled {
        let sum = cohorts
            .iter()
            .filter_map(|c| c.revenue)
            .map(|r| r.sum)
            .sum::<f64>();
        let weighted: f64 = cohorts
            .iter()
            .filter_map(|c| c.revenue.map(|r| r.ltv * c.size as f64))
            .sum();
        (Some(round2(sum)), Some(round2(weighted / total_size as f64)))
    } else {
        (None, None)
    };

    Some(TotalMetrics {
        size: total_size,
        retention_pct,
        dead_count,
        dead_pct,
        revenue_sum,
        ltv,
    })
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
