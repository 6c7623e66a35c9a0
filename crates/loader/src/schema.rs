//! Header resolution for subscription exports. Upstream joins produce
//! dotted "table.column" header names alongside plain ones; a dotted
//! header matches a known column by the suffix after the final dot.

use std::collections::HashMap;

use cohortlens_core::{CohortError, CohortResult, SchemaNotice, TableSchema};
use tracing::warn;

pub const CREATED_AT: &str = "created_at";
pub const CHARGES_COUNT: &str = "charges_count";
pub const REAL_PAYMENT: &str = "real_payment";
pub const NEXT_CHARGE_DATE: &str = "next_charge_date";
pub const STATUS: &str = "status";

/// Accepted names for the monetary column, first match wins.
pub const AMOUNT_COLUMNS: &[&str] = &["send_event_amount", "amount"];

/// Optional categorical columns usable as filter predicates.
pub const DIMENSION_COLUMNS: &[&str] =
    &["utm_source", "price_option", "subscription_id", "country_code"];

/// Resolved header positions for one source file.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    pub created_at: usize,
    pub charges_count: usize,
    pub real_payment: usize,
    pub next_charge_date: Option<usize>,
    pub status: Option<usize>,
    pub amount: Option<usize>,
    /// Canonical name the monetary column matched, for error reporting.
    pub amount_header: Option<String>,
    /// Present categorical columns, by canonical (plain) name.
    pub dimensions: Vec<(String, usize)>,
}

/// Resolve headers into a column map plus the schema the rest of the
/// pipeline consults. Required columns abort the load when absent;
/// optional columns only record a notice.
pub fn resolve_columns(headers: &csv::StringRecord) -> CohortResult<(ColumnMap, TableSchema)> {
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for (idx, header) in headers.iter().enumerate() {
        let plain = plain_name(header);
        // first occurrence wins when a join repeats a column
        by_name.entry(plain.to_string()).or_insert(idx);
    }

    let required = |name: &str| -> CohortResult<usize> {
        by_name
            .get(name)
            .copied()
            .ok_or_else(|| CohortError::MissingColumn(name.to_string()))
    };

    let mut notices = Vec::new();
    let mut optional = |name: &str, disables: &str| -> Option<usize> {
        let found = by_name.get(name).copied();
        if found.is_none() {
            warn!(column = name, "optional column absent, {} disabled", disables);
            notices.push(SchemaNotice {
                column: name.to_string(),
                message: format!("column absent; {disables} disabled"),
            });
        }
        found
    };

    let next_charge_date = optional(NEXT_CHARGE_DATE, "churn by next charge date");
    let status = optional(STATUS, "churn by cancellation status");
    let amount = AMOUNT_COLUMNS
        .iter()
        .find_map(|name| by_name.get(*name).map(|idx| (*idx, name.to_string())));
    if amount.is_none() {
        warn!("monetary column absent, revenue and LTV disabled");
        notices.push(SchemaNotice {
            column: AMOUNT_COLUMNS[0].to_string(),
            message: "column absent; revenue and LTV disabled".to_string(),
        });
    }

    let mut dimensions = Vec::new();
    for name in DIMENSION_COLUMNS {
        if let Some(idx) = by_name.get(*name) {
            dimensions.push((name.to_string(), *idx));
        }
    }

    let column_map = ColumnMap {
        created_at: required(CREATED_AT)?,
        charges_count: required(CHARGES_COUNT)?,
        real_payment: required(REAL_PAYMENT)?,
        next_charge_date,
        status,
        amount: amount.as_ref().map(|(idx, _)| *idx),
        amount_header: amount.map(|(_, name)| name),
        dimensions: dimensions.clone(),
    };

    let schema = TableSchema {
        has_next_charge_date: column_map.next_charge_date.is_some(),
        has_status: column_map.status.is_some(),
        has_amount: column_map.amount.is_some(),
        dimensions: dimensions.into_iter().map(|(name, _)| name).collect(),
        notices,
    };

    Ok((column_map, schema))
}

/// Strip a "table." qualifier from a dotted header name.
fn plain_name(header: &str) -> &str {
    match header.rsplit_once('.') {
        Some((_, suffix)) => suffix,
        None => header,
    }
}
