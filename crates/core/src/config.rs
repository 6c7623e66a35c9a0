use serde::Deserialize;

use crate::types::{ChurnSignal, CohortGrain};

/// Root application configuration. Loaded from environment variables
/// with the prefix `COHORTLENS__`; CLI flags override individual fields.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub report: ReportSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_path")]
    pub path: String,
    /// Field delimiter; "tab" or "\t" for TSV, "," for CSV.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportSettings {
    #[serde(default = "default_grain")]
    pub grain: CohortGrain,
    #[serde(default = "default_churn_signal")]
    pub churn_signal: ChurnSignal,
}

fn default_source_path() -> String {
    "subscriptions.tsv".to_string()
}
fn default_delimiter() -> String {
    "\t".to_string()
}
fn default_grain() -> CohortGrain {
    CohortGrain::Daily
}
fn default_churn_signal() -> ChurnSignal {
    ChurnSignal::NextChargeMissing
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: default_source_path(),
            delimiter: default_delimiter(),
        }
    }
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            grain: default_grain(),
            churn_signal: default_churn_signal(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            report: ReportSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("COHORTLENS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Resolve the configured delimiter to a single byte.
    pub fn delimiter_byte(&self) -> u8 {
        match self.source.delimiter.as_str() {
            "tab" | "\\t" | "\t" => b'\t',
            other => other.bytes().next().unwrap_or(b'\t'),
        }
    }
}
