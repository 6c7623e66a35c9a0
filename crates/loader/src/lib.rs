//! Delimited-file ingest for subscription exports. Reads a TSV/CSV
//! with a header row into an immutable in-memory table; any malformed
//! required value aborts the load before aggregation can run.

pub mod cache;
pub mod schema;

use std::io;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use cohortlens_core::{CohortError, CohortResult, SubscriptionRecord, SubscriptionTable};
use tracing::info;

use crate::schema::ColumnMap;

pub use crate::cache::LoadCache;

/// Load a subscription export from disk.
pub fn load_table(path: &Path, delimiter: u8) -> CohortResult<SubscriptionTable> {
    let file = std::fs::File::open(path)?;
    let table = read_table(file, delimiter)?;
    info!(
        path = %path.display(),
        rows = table.records.len(),
        "source table loaded"
    );
    Ok(table)
}

/// Parse a delimited export from any reader.
pub fn read_table<R: io::Read>(reader: R, delimiter: u8) -> CohortResult<SubscriptionTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let (columns, schema) = schema::resolve_columns(&headers)?;

    let mut records = Vec::new();
    for (idx, row) in csv_reader.records().enumerate() {
        let row = row?;
        // header occupies line 1
        let line = idx as u64 + 2;
        records.push(parse_record(&row, &columns, line)?);
    }

    Ok(SubscriptionTable { records, schema })
}

fn parse_record(
    row: &csv::StringRecord,
    columns: &ColumnMap,
    line: u64,
) -> CohortResult<SubscriptionRecord> {
    let field = |idx: usize| row.get(idx).unwrap_or("");

    let created_at = parse_timestamp(field(columns.created_at), schema::CREATED_AT, line)?;
    let charges_count = parse_charges(field(columns.charges_count), line)?;
    let real_payment = parse_flag(field(columns.real_payment), line)?;

    let next_charge_date = match columns.next_charge_date {
        Some(idx) if !field(idx).is_empty() => {
            Some(parse_timestamp(field(idx), schema::NEXT_CHARGE_DATE, line)?)
        }
        _ => None,
    };
    let status = columns
        .status
        .map(|idx| field(idx))
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let amount = match columns.amount {
        Some(idx) if !field(idx).is_empty() => {
            let column = columns
                .amount_header
                .as_deref()
                .unwrap_or(schema::AMOUNT_COLUMNS[0]);
            Some(field(idx).parse::<f64>().map_err(|e| CohortError::Malformed {
                line,
                column: column.to_string(),
                reason: e.to_string(),
            })?)
        }
        _ => None,
    };

    let mut dimensions = std::collections::HashMap::new();
    for (name, idx) in &columns.dimensions {
        let value = field(*idx);
        if !value.is_empty() {
            dimensions.insert(name.clone(), value.to_string());
        }
    }

    Ok(SubscriptionRecord {
        created_at,
        charges_count,
        real_payment,
        next_charge_date,
        status,
        amount,
        dimensions,
    })
}

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

fn parse_timestamp(value: &str, column: &str, line: u64) -> CohortResult<NaiveDateTime> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(ts);
        }
    }
    // bare calendar date
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Ok(ts);
        }
    }
    Err(CohortError::Malformed {
        line,
        column: column.to_string(),
        reason: format!("unrecognized timestamp '{value}'"),
    })
}

/// Paid-period count. Rejects negative and fractional values outright;
/// a numeric string with a zero fractional part is accepted.
fn parse_charges(value: &str, line: u64) -> CohortResult<u32> {
    let malformed = |reason: String| CohortError::Malformed {
        line,
        column: schema::CHARGES_COUNT.to_string(),
        reason,
    };

    if let Ok(count) = value.parse::<i64>() {
        return u32::try_from(count)
            .map_err(|_| malformed(format!("'{value}' is not a non-negative integer")));
    }
    match value.parse::<f64>() {
        Ok(count) if count >= 0.0 && count.fract() == 0.0 && count <= u32::MAX as f64 => {
            Ok(count as u32)
        }
        Ok(_) => Err(malformed(format!("'{value}' is not a non-negative integer"))),
        Err(e) => Err(malformed(e.to_string())),
    }
}

fn parse_flag(value: &str, line: u64) -> CohortResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "t" => Ok(true),
        // an empty flag means the record is not a genuine payment
        "0" | "false" | "no" | "f" | "" => Ok(false),
        other => Err(CohortError::Malformed {
            line,
            column: schema::REAL_PAYMENT.to_string(),
            reason: format!("unrecognized flag '{other}'"),
        }),
    }
}
