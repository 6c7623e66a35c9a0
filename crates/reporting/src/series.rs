//! Derived chart series — numeric values only, ready for a line chart
//! or heat map. Colours, glyphs, and cell text belong to the
//! presentation layer.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use cohortlens_core::{ReportConfig, SubscriptionTable};
use serde::{Deserialize, Serialize};

use crate::aggregate::{round2, CohortReport};
use crate::cohort::cohort_key;
use crate::filter::apply_filters;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub cohort: NaiveDate,
    pub period: u32,
    pub pct: f64,
}

/// New subscription records entering per cohort bucket, optionally
/// split by a categorical dimension. Rows missing a value for the
/// split dimension are labelled "unknown".
pub fn new_subscriptions(
    table: &SubscriptionTable,
    config: &ReportConfig,
    group_dim: Option<&str>,
) -> Vec<SeriesPoint> {
    let filtered = apply_filters(table, config);

    let mut counts: BTreeMap<(NaiveDate, String), u64> = BTreeMap::new();
    for record in filtered {
        let date = cohort_key(record.created_at, config.grain);
        let label = match group_dim {
            Some(dim) if table.schema.has_dimension(dim) => record
                .dimensions
                .get(dim)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string()),
            _ => "all".to_string(),
        };
        *counts.entry((date, label)).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|((date, label), count)| SeriesPoint {
            date,
            label,
            value: count as f64,
        })
        .collect()
}

/// Flatten the retention matrix into (cohort, period, pct) triples.
/// Terminal-churn cells are skipped so the heat map shows no value
/// where the cohort had already fully churned.
pub fn retention_heatmap(report: &CohortReport) -> Vec<HeatmapCell> {
    let mut cells = Vec::new();
    for cohort in &report.cohorts {
        for (period, cell) in cohort.retention.iter().enumerate() {
            if cell.is_terminal() {
                continue;
            }
            cells.push(HeatmapCell {
                cohort: cohort.cohort,
                period: period as u32,
                pct: cell.pct(),
            });
        }
    }
    cells
}

/// Actual cumulative LTV per period, derived from the report. The
/// export carries one total amount per subscription, so the observed
/// average revenue per paid (subscription, period) is spread across
/// the weighted retention profile; the final point equals the TOTAL
/// row's LTV up to rounding. `None` when revenue is disabled or no
/// period was ever paid.
pub fn ltv_curve(report: &CohortReport) -> Option<Vec<f64>> {
    let total = report.total.as_ref()?;
    let revenue_sum = total.revenue_sum?;

    let paid_periods: u64 = report
        .cohorts
        .iter()
        .flat_map(|c| c.retention.iter())
        .map(|cell| cell.count())
        .sum();
    if paid_periods == 0 {
        return None;
    }
    let revenue_per_period = revenue_sum / paid_periods as f64;

    let mut cumulative = 0.0;
    Some(
        total
            .retention_pct
            .iter()
            .map(|pct| {
                cumulative += revenue_per_period * pct / 100.0;
                round2(cumulative)
            })
            .collect(),
    )
}

/// Illustrative modeled LTV overlay from assumed per-period retention
/// rates (slider inputs, not derived from data). Rates are fractions
/// in [0, 1]; the last rate extends to any remaining periods.
pub fn modeled_ltv_curve(
    assumed_retention: &[f64],
    revenue_per_period: f64,
    periods: usize,
) -> Vec<f64> {
    let mut survival = 1.0;
    let mut cumulative = 0.0;
    (0..periods)
        .map(|period| {
            if period > 0 {
                let rate = assumed_retention
                    .get(period - 1)
                    .or(assumed_retention.last())
                    .copied()
                    .unwrap_or(0.0);
                survival *= rate.clamp(0.0, 1.0);
            }
            cumulative += revenue_per_period * survival;
            round2(cumulative)
        })
        .collect()
}
