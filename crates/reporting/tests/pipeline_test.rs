//! End-to-end pipeline tests over an in-memory subscription table:
//! filters, weekly bucketing, and the aggregated report together.

use chrono::NaiveDate;
use cohortlens_core::{ChurnSignal, CohortGrain, ReportConfig, SubscriptionRecord, SubscriptionTable, TableSchema};
use cohortlens_reporting::{build_report, RetentionCell};
use std::collections::{HashMap, HashSet};

fn record(
    date: &str,
    charges_count: u32,
    churned: bool,
    amount: f64,
    utm: Option<&str>,
) -> SubscriptionRecord {
    let created_at = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(14, 30, 0)
        .unwrap();
    let mut dimensions = HashMap::new();
    if let Some(utm) = utm {
        dimensions.insert("utm_source".to_string(), utm.to_string());
    }
    SubscriptionRecord {
        created_at,
        charges_count,
        real_payment: true,
        next_charge_date: if churned { None } else { Some(created_at) },
        status: None,
        amount: Some(amount),
        dimensions,
    }
}

fn table(records: Vec<SubscriptionRecord>) -> SubscriptionTable {
    SubscriptionTable {
        records,
        schema: TableSchema {
            has_next_charge_date: true,
            has_status: false,
            has_amount: true,
            dimensions: ["utm_source".to_string()].into_iter().collect(),
            ..TableSchema::default()
        },
    }
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn test_weekly_report_merges_days_into_monday_cohorts() {
    // 2024-03-04 (Mon), 2024-03-06 (Wed), 2024-03-10 (Sun) share a
    // week; 2024-03-11 (Mon) opens the next one
    let t = table(vec![
        record("2024-03-04", 2, false, 10.0, None),
        record("2024-03-06", 1, false, 5.0, None),
        record("2024-03-10", 3, false, 15.0, None),
        record("2024-03-11", 1, false, 7.0, None),
    ]);
    let config = ReportConfig {
        grain: CohortGrain::Weekly,
        ..ReportConfig::default()
    };
    let report = build_report(&t, &config);

    assert_eq!(report.cohorts.len(), 2);
    // most recent first
    assert_eq!(report.cohorts[0].cohort, date("2024-03-11"));
    assert_eq!(report.cohorts[1].cohort, date("2024-03-04"));

    let week_one = &report.cohorts[1];
    assert_eq!(week_one.size, 3);
    assert_eq!(week_one.retention[0].count(), 3);
    assert_eq!(week_one.retention[1].count(), 2);
    assert_eq!(week_one.retention[2].count(), 1);
    assert!((week_one.revenue.unwrap().sum - 30.0).abs() < 1e-9);
    assert_eq!(week_one.revenue.unwrap().ltv, 10.0);
}

#[test]
fn test_filters_and_aggregation_compose() {
    let t = table(vec![
        record("2024-01-01", 3, false, 10.0, Some("google")),
        record("2024-01-01", 2, false, 8.0, Some("facebook")),
        record("2024-01-05", 1, true, 5.0, Some("google")),
        record("2024-02-01", 4, false, 20.0, Some("google")),
    ]);
    let config = ReportConfig {
        date_range: Some((date("2024-01-01"), date("2024-01-31"))),
        dimension_filters: HashMap::from([(
            "utm_source".to_string(),
            HashSet::from(["google".to_string()]),
        )]),
        ..ReportConfig::default()
    };
    let report = build_report(&t, &config);

    // the February row and the facebook row are filtered out
    assert_eq!(report.cohorts.len(), 2);
    let total = report.total.unwrap();
    assert_eq!(total.size, 2);
    assert_eq!(total.dead_count, Some(1));
    assert_eq!(total.revenue_sum, Some(15.0));
}

#[test]
fn test_switching_churn_signal_changes_death_counts() {
    let mut by_status = record("2024-01-01", 1, false, 1.0, None);
    by_status.status = Some("canceled".to_string());
    let active = record("2024-01-01", 1, false, 1.0, None);

    let mut t = table(vec![by_status, active]);
    t.schema.has_status = true;

    let by_next_charge = build_report(&t, &ReportConfig::default());
    assert_eq!(by_next_charge.cohorts[0].dead.unwrap().count, 0);

    let config = ReportConfig {
        churn_signal: ChurnSignal::StatusCanceled,
        ..ReportConfig::default()
    };
    let by_cancellation = build_report(&t, &config);
    assert_eq!(by_cancellation.cohorts[0].dead.unwrap().count, 1);
}

#[test]
fn test_no_matching_rows_is_empty_not_an_error() {
    let t = table(vec![record("2024-01-01", 3, false, 10.0, None)]);
    let config = ReportConfig {
        date_range: Some((date("2030-01-01"), date("2030-12-31"))),
        ..ReportConfig::default()
    };
    let report = build_report(&t, &config);
    assert!(report.cohorts.is_empty());
    assert!(report.total.is_none());
}

#[test]
fn test_percentages_match_counts_everywhere() {
    let t = table(vec![
        record("2024-01-01", 5, false, 1.0, None),
        record("2024-01-01", 2, true, 1.0, None),
        record("2024-01-02", 3, false, 1.0, None),
        record("2024-01-02", 1, false, 1.0, None),
        record("2024-01-02", 1, true, 1.0, None),
    ]);
    let report = build_report(&t, &ReportConfig::default());

    for cohort in &report.cohorts {
        for cell in &cohort.retention {
            if let RetentionCell::Value { count, pct } = cell {
                let expected = (*count as f64 / cohort.size as f64 * 1000.0).round() / 10.0;
                assert_eq!(*pct, expected);
            }
        }
    }
}
