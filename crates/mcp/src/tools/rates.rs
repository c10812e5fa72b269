// Rate lookup tools: today, historical and time series

use crate::protocol::ToolSchema;
use crate::tools::{
    json_schema_object, json_schema_string, json_schema_string_default, parse_arguments, to_document,
    Tool,
};
use fx_core::{FxOperations, FxResult};
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_BASE: &str = "EUR";

fn default_base() -> String {
    DEFAULT_BASE.to_string()
}

fn symbols_schema() -> serde_json::Value {
    json_schema_string("Comma-separated currency codes to include, e.g. USD,GBP (default: all)")
}

/// Tool returning the latest rates for a base currency
pub struct TodayRatesTool {
    ops: Arc<FxOperations>,
}

impl TodayRatesTool {
    pub const NAME: &'static str = "today_rates";

    pub fn new(ops: Arc<FxOperations>) -> Self {
        Self { ops }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TodayRatesArgs {
    code: String,
}

#[async_trait::async_trait]
impl Tool for TodayRatesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.to_string(),
            description: "Current exchange rates for every supported currency relative to the base".to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "code": json_schema_string("Base currency code, e.g. USD")
                }),
                vec!["code"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> FxResult<serde_json::Value> {
        let args: TodayRatesArgs = parse_arguments(Self::NAME, arguments)?;
        tracing::info!(code = %args.code, "Fetching today's rates");

        let rates = self.ops.today_rates(&args.code).await?;
        tracing::info!(code = %rates.base, date = %rates.date, "Fetched today's rates");
        to_document(&rates)
    }
}

/// Tool returning rates for a past date
pub struct HistoricalRatesTool {
    ops: Arc<FxOperations>,
}

impl HistoricalRatesTool {
    pub const NAME: &'static str = "historical_rates";

    pub fn new(ops: Arc<FxOperations>) -> Self {
        Self { ops }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HistoricalRatesArgs {
    date: String,
    #[serde(default = "default_base")]
    base: String,
    #[serde(default)]
    symbols: Option<String>,
}

#[async_trait::async_trait]
impl Tool for HistoricalRatesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.to_string(),
            description: "Exchange rates on a specific date (2020-01-01 or later)".to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "date": json_schema_string("Date in YYYY-MM-DD format, e.g. 2024-01-15"),
                    "base": json_schema_string_default("Base currency code", DEFAULT_BASE),
                    "symbols": symbols_schema()
                }),
                vec!["date"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> FxResult<serde_json::Value> {
        let args: HistoricalRatesArgs = parse_arguments(Self::NAME, arguments)?;
        tracing::info!(
            date = %args.date,
            base = %args.base,
            symbols = ?args.symbols,
            "Fetching historical rates"
        );

        let rates = self
            .ops
            .historical_rates(&args.date, &args.base, args.symbols.as_deref())
            .await?;
        to_document(&rates)
    }
}

/// Tool returning rates over a date range
pub struct TimeSeriesRatesTool {
    ops: Arc<FxOperations>,
}

impl TimeSeriesRatesTool {
    pub const NAME: &'static str = "time_series_rates";

    pub fn new(ops: Arc<FxOperations>) -> Self {
        Self { ops }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimeSeriesRatesArgs {
    start_date: String,
    end_date: String,
    #[serde(default = "default_base")]
    base: String,
    #[serde(default)]
    symbols: Option<String>,
}

#[async_trait::async_trait]
impl Tool for TimeSeriesRatesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.to_string(),
            description: "Daily exchange rates between two dates, inclusive, ordered by date".to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "start_date": json_schema_string("Start date in YYYY-MM-DD format"),
                    "end_date": json_schema_string("End date in YYYY-MM-DD format, not before start_date"),
                    "base": json_schema_string_default("Base currency code", DEFAULT_BASE),
                    "symbols": symbols_schema()
                }),
                vec!["start_date", "end_date"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> FxResult<serde_json::Value> {
        let args: TimeSeriesRatesArgs = parse_arguments(Self::NAME, arguments)?;
        tracing::info!(
            start = %args.start_date,
            end = %args.end_date,
            base = %args.base,
            symbols = ?args.symbols,
            "Fetching time series rates"
        );

        let series = self
            .ops
            .time_series_rates(&args.start_date, &args.end_date, &args.base, args.symbols.as_deref())
            .await?;
        tracing::info!(days = series.entries.len(), "Fetched time series rates");
        to_document(&series)
    }
}
