// Currency listing and conversion tools

use crate::tools::{
    json_schema_number, json_schema_object, json_schema_string, parse_arguments, to_document, Tool,
};
use crate::protocol::ToolSchema;
use fx_core::{FxOperations, FxResult};
use serde::Deserialize;
use std::sync::Arc;

/// Tool listing every supported currency
pub struct AvailableCurrenciesTool {
    ops: Arc<FxOperations>,
}

impl AvailableCurrenciesTool {
    pub const NAME: &'static str = "available_currencies";

    pub fn new(ops: Arc<FxOperations>) -> Self {
        Self { ops }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AvailableCurrenciesArgs {}

#[async_trait::async_trait]
impl Tool for AvailableCurrenciesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.to_string(),
            description: "List the supported currencies as a mapping of currency code to name".to_string(),
            input_schema: json_schema_object(serde_json::json!({}), vec![]),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> FxResult<serde_json::Value> {
        let _: AvailableCurrenciesArgs = parse_arguments(Self::NAME, arguments)?;
        tracing::info!("Listing available currencies");

        to_document(&self.ops.available_currencies())
    }
}

/// Tool converting an amount between two currencies
pub struct ConvertCurrencyTool {
    ops: Arc<FxOperations>,
}

impl ConvertCurrencyTool {
    pub const NAME: &'static str = "convert_currency";

    pub fn new(ops: Arc<FxOperations>) -> Self {
        Self { ops }
    }
}

fn default_amount() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConvertCurrencyArgs {
    from_code: String,
    to_code: String,
    #[serde(default = "default_amount")]
    amount: f64,
}

#[async_trait::async_trait]
impl Tool for ConvertCurrencyTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.to_string(),
            description: "Convert an amount from one currency to another at the latest rate".to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "from_code": json_schema_string("Currency to convert from, e.g. USD"),
                    "to_code": json_schema_string("Currency to convert to, e.g. EUR"),
                    "amount": json_schema_number("Non-negative amount to convert", 1.0)
                }),
                vec!["from_code", "to_code"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> FxResult<serde_json::Value> {
        let args: ConvertCurrencyArgs = parse_arguments(Self::NAME, arguments)?;
        tracing::info!(
            from = %args.from_code,
            to = %args.to_code,
            amount = args.amount,
            "Converting currency"
        );

        let result = self
            .ops
            .convert_currency(&args.from_code, &args.to_code, args.amount)
            .await?;

        tracing::info!(
            "Converted {} {} = {} {}",
            result.amount,
            result.base,
            result.converted_amount,
            result.target
        );
        to_document(&result)
    }
}
