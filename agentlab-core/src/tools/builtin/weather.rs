//! Mock weather lookup
//!
//! The date argument is compared to today's date as plain text. Nothing is
//! parsed, so a malformed date never matches and reports rain.

use super::clock::SharedClock;
use crate::tools::{
    Tool, ToolError, ToolExecutionContext, ToolMetadata, ToolSchema, ValidationError, string_arg,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

pub const SUNNY: &str = "Sunny, 72°F";
pub const RAINY: &str = "Rainy, 55°F";

/// Weather for a `yyyy-MM-dd` date: sunny today, rainy any other day
pub struct WeatherTool {
    metadata: ToolMetadata,
    clock: SharedClock,
}

impl WeatherTool {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            metadata: ToolMetadata::new(
                "get_weather",
                "Returns mock weather for a date string formatted 'YYYY-MM-DD'.",
            )
            .with_returns("Short weather description")
            .with_tag("mock"),
            clock,
        }
    }

    pub fn forecast(&self, date: &str) -> &'static str {
        if date == self.clock.today_string() {
            SUNNY
        } else {
            RAINY
        }
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::single_string("date", "Date formatted as YYYY-MM-DD")
    }

    fn validate(&self, args: &Value) -> Result<(), Vec<ValidationError>> {
        string_arg(args, "date").map(|_| ()).map_err(|e| vec![e])
    }

    async fn execute(&self, args: Value, _ctx: &ToolExecutionContext) -> Result<Value, ToolError> {
        let date = string_arg(&args, "date").map_err(|e| ToolError::validation(vec![e]))?;
        let forecast = self.forecast(date);
        info!(date = %date, forecast, "get_weather");
        Ok(Value::String(forecast.to_string()))
    }
}
