pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{CohortError, CohortResult};
pub use types::{
    ChurnSignal, CohortGrain, ReportConfig, SchemaNotice, SubscriptionRecord, SubscriptionTable,
    TableSchema,
};
