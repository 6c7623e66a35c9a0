//! Table rendering for the CLI. The reporting crate returns typed
//! numbers; this is the one place values become strings.

use cohortlens_reporting::{CohortMetrics, CohortReport, RetentionCell, TotalMetrics};
use tabled::builder::Builder;
use tabled::settings::Style;

/// A metric whose backing column was absent from the source.
const DISABLED: &str = "n/a";
/// A period the cohort never reached because it had fully churned.
const TERMINAL: &str = "-";

pub fn render_table(report: &CohortReport) -> String {
    let mut builder = Builder::default();

    let mut header = vec![
        "Cohort".to_string(),
        "Size".to_string(),
        "Dead".to_string(),
        "Revenue".to_string(),
        "LTV".to_string(),
    ];
    for period in 0..=report.max_period {
        header.push(format!("Period {period}"));
    }
    builder.push_record(header);

    for cohort in &report.cohorts {
        builder.push_record(cohort_row(cohort));
    }
    if let Some(total) = &report.total {
        builder.push_record(total_row(total));
    }

    let mut table = builder.build();
    table.with(Style::sharp());
    table.to_string()
}

fn cohort_row(cohort: &CohortMetrics) -> Vec<String> {
    let mut row = vec![
        cohort.cohort.format("%Y-%m-%d").to_string(),
        cohort.size.to_string(),
        cohort
            .dead
            .map(|d| format!("{:.1}% ({})", d.pct, d.count))
            .unwrap_or_else(|| DISABLED.to_string()),
        cohort
            .revenue
            .map(|r| format!("{:.2}", r.sum))
            .unwrap_or_else(|| DISABLED.to_string()),
        cohort
            .revenue
            .map(|r| format!("{:.2}", r.ltv))
            .unwrap_or_else(|| DISABLED.to_string()),
    ];
    for cell in &cohort.retention {
        row.push(match cell {
            RetentionCell::Value { count, pct } => format!("{pct:.1}% ({count})"),
            RetentionCell::TerminalChurn => TERMINAL.to_string(),
        });
    }
    row
}

fn total_row(total: &TotalMetrics) -> Vec<String> {
    let mut row = vec![
        "TOTAL".to_string(),
        total.size.to_string(),
        match (total.dead_pct, total.dead_count) {
            (Some(pct), Some(count)) => format!("{pct:.1}% ({count})"),
            _ => DISABLED.to_string(),
        },
        total
            .revenue_sum
            .map(|sum| format!("{sum:.2}"))
            .unwrap_or_else(|| DISABLED.to_string()),
        total
            .ltv
            .map(|ltv| format!("{ltv:.2}"))
            .unwrap_or_else(|| DISABLED.to_string()),
    ];
    for pct in &total.retention_pct {
        row.push(format!("{pct:.1}%"));
    }
    row
}
