//! Row-level filter stage. Pure: produces a borrowed view of the
//! table, the source rows are never touched.

use cohortlens_core::{ReportConfig, SubscriptionRecord, SubscriptionTable};

/// Apply the configured predicates and return the surviving rows.
///
/// A row survives when it represents a genuine payment, its creation
/// date falls inside the (inclusive) configured range, and its value
/// for every filtered dimension is in the allowed set. A filter on a
/// column the source does not carry is skipped entirely.
pub fn apply_filters<'a>(
    table: &'a SubscriptionTable,
    config: &ReportConfig,
) -> Vec<&'a SubscriptionRecord> {
    table
        .records
        .iter()
        .filter(|record| matches(record, table, config))
        .collect()
}

fn matches(record: &SubscriptionRecord, table: &SubscriptionTable, config: &ReportConfig) -> bool {
    if !record.real_payment {
        return false;
    }

    if let Some((start, end)) = config.date_range {
        let date = record.created_at.date();
        if date < start || date > end {
            return false;
        }
    }

    for (column, allowed) in &config.dimension_filters {
        if !table.schema.has_dimension(column) {
            // optional column absent from this export: the filter is
            // inert rather than an error
            continue;
        }
        match record.dimensions.get(column) {
            Some(value) if allowed.contains(value) => {}
            // null value in a filtered column excludes the row
            _ => return false,
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cohortlens_core::TableSchema;
    use std::collections::{HashMap, HashSet};

    fn record(date: &str, real_payment: bool, utm: Option<&str>) -> SubscriptionRecord {
        let mut dimensions = HashMap::new();
        if let Some(utm) = utm {
            dimensions.insert("utm_source".to_string(), utm.to_string());
        }
        SubscriptionRecord {
            created_at: NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            charges_count: 1,
            real_payment,
            next_charge_date: None,
            status: None,
            amount: None,
            dimensions,
        }
    }

    fn table(records: Vec<SubscriptionRecord>, dimensions: &[&str]) -> SubscriptionTable {
        SubscriptionTable {
            records,
            schema: TableSchema {
                dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
                ..TableSchema::default()
            },
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_real_payment_required() {
        let t = table(
            vec![record("2024-01-01", true, None), record("2024-01-01", false, None)],
            &[],
        );
        assert_eq!(apply_filters(&t, &ReportConfig::default()).len(), 1);
    }

    #[test]
    fn test_date_range_inclusive_both_ends() {
        let t = table(
            vec![
                record("2024-01-01", true, None),
                record("2024-01-15", true, None),
                record("2024-01-31", true, None),
                record("2024-02-01", true, None),
            ],
            &[],
        );
        let config = ReportConfig {
            date_range: Some((date("2024-01-01"), date("2024-01-31"))),
            ..ReportConfig::default()
        };
        assert_eq!(apply_filters(&t, &config).len(), 3);
    }

    #[test]
    fn test_dimension_membership() {
        let t = table(
            vec![
                record("2024-01-01", true, Some("google")),
                record("2024-01-01", true, Some("facebook")),
                record("2024-01-01", true, None),
            ],
            &["utm_source"],
        );
        let mut filters = HashMap::new();
        filters.insert(
            "utm_source".to_string(),
            HashSet::from(["google".to_string()]),
        );
        let config = ReportConfig {
            dimension_filters: filters,
            ..ReportConfig::default()
        };
        // the row with no utm_source value is excluded too
        let kept = apply_filters(&t, &config);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].dimensions.get("utm_source").unwrap(), "google");
    }

    #[test]
    fn test_filter_on_absent_column_is_skipped() {
        let t = table(vec![record("2024-01-01", true, None)], &[]);
        let mut filters = HashMap::new();
        filters.insert(
            "country_code".to_string(),
            HashSet::from(["US".to_string()]),
        );
        let config = ReportConfig {
            dimension_filters: filters,
            ..ReportConfig::default()
        };
        assert_eq!(apply_filters(&t, &config).len(), 1);
    }

    #[test]
    fn test_idempotent() {
        let t = table(
            vec![
                record("2024-01-01", true, Some("google")),
                record("2024-01-02", false, None),
            ],
            &["utm_source"],
        );
        let config = ReportConfig::default();
        let first: Vec<_> = apply_filters(&t, &config)
            .iter()
            .map(|r| r.created_at)
            .collect();
        let second: Vec<_> = apply_filters(&t, &config)
            .iter()
            .map(|r| r.created_at)
            .collect();
        assert_eq!(first, second);
    }
}
