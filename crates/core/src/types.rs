use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One row of the subscription export — a single subscription/payment record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub created_at: NaiveDateTime,
    /// Number of billing periods successfully paid. Period 0 is the
    /// initial charge; a record with 0 never enters any cohort.
    pub charges_count: u32,
    pub real_payment: bool,
    /// `None` signals the subscription has no further charge scheduled.
    pub next_charge_date: Option<NaiveDateTime>,
    pub status: Option<String>,
    /// Monetary amount attributed to this record (`send_event_amount`).
    pub amount: Option<f64>,
    /// Optional categorical columns (utm_source, price_option, ...),
    /// used as filter predicates only, never aggregated over.
    #[serde(default)]
    pub dimensions: HashMap<String, String>,
}

/// Cohort bucketing granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortGrain {
    Daily,
    Weekly,
}

/// Which column marks a subscription as churned. Source exports
/// disagree, so the signal is configurable per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChurnSignal {
    /// `next_charge_date` is null.
    NextChargeMissing,
    /// `status` equals "canceled", case-insensitively.
    StatusCanceled,
}

/// Full configuration for one report computation. The pipeline is a
/// pure function of (table, config); every control change re-runs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub grain: CohortGrain,
    pub churn_signal: ChurnSignal,
    /// Inclusive calendar-date range applied to `created_at`.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Column name -> allowed values. A filter on a column absent from
    /// the source schema is skipped rather than excluding everything.
    pub dimension_filters: HashMap<String, HashSet<String>>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            grain: CohortGrain::Daily,
            churn_signal: ChurnSignal::NextChargeMissing,
            date_range: None,
            dimension_filters: HashMap::new(),
        }
    }
}

/// Which optional columns the loaded source actually carries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSchema {
    pub has_next_charge_date: bool,
    pub has_status: bool,
    pub has_amount: bool,
    /// Optional categorical columns present in the header.
    pub dimensions: HashSet<String>,
    /// Non-fatal degradations recorded at load time.
    pub notices: Vec<SchemaNotice>,
}

impl TableSchema {
    pub fn has_dimension(&self, name: &str) -> bool {
        self.dimensions.contains(name)
    }

    /// Whether the column backing the given churn signal is present.
    pub fn supports_churn(&self, signal: ChurnSignal) -> bool {
        match signal {
            ChurnSignal::NextChargeMissing => self.has_next_charge_date,
            ChurnSignal::StatusCanceled => self.has_status,
        }
    }
}

/// A visible but non-fatal notice about a degraded metric or filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaNotice {
    pub column: String,
    pub message: String,
}

/// The immutable in-memory source table. Loaded once, never mutated;
/// every recomputation reads from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionTable {
    pub records: Vec<SubscriptionRecord>,
    pub schema: TableSchema,
}

impl SubscriptionTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
