pub mod currencies;
pub mod rates;
mod registry;

pub use currencies::{AvailableCurrenciesTool, ConvertCurrencyTool};
pub use rates::{HistoricalRatesTool, TimeSeriesRatesTool, TodayRatesTool};
pub use registry::{
    json_schema_number, json_schema_object, json_schema_string, json_schema_string_default,
    parse_arguments, to_document, Tool, ToolRegistry,
};

use fx_core::FxOperations;
use std::sync::Arc;

/// Registry holding the five FX tools.
pub fn fx_registry(ops: Arc<FxOperations>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(AvailableCurrenciesTool::new(ops.clone())));
    registry.register(Arc::new(ConvertCurrencyTool::new(ops.clone())));
    registry.register(Arc::new(TodayRatesTool::new(ops.clone())));
    registry.register(Arc::new(HistoricalRatesTool::new(ops.clone())));
    registry.register(Arc::new(TimeSeriesRatesTool::new(ops)));
    registry
}
