//! Built-in mock tools
//!
//! None of these reach outside the process. Date-dependent tools read from an
//! injected [`Clock`].

mod calculator;
mod clock;
mod reverse;
mod weather;

pub use calculator::CalculatorTool;
pub use clock::{
    Clock, CurrentDateTool, CurrentTimeTool, DATE_FORMAT, DATETIME_FORMAT, FixedClock,
    SharedClock, SystemClock,
};
pub use reverse::{ReverseStringTool, reverse};
pub use weather::{RAINY, SUNNY, WeatherTool};

use super::{BoxedTool, ToolRegistry};
use std::sync::Arc;

/// All built-in tools, in the order they are offered to the model
pub fn builtin_tools(clock: SharedClock) -> Vec<BoxedTool> {
    vec![
        Arc::new(CalculatorTool::new()),
        Arc::new(CurrentDateTool::new(clock.clone())),
        Arc::new(CurrentTimeTool::new(clock.clone())),
        Arc::new(WeatherTool::new(clock)),
        Arc::new(ReverseStringTool::new()),
    ]
}

/// Registry holding every built-in tool
pub fn builtin_registry(clock: SharedClock) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in builtin_tools(clock) {
        // Built-in names are distinct; a collision here would be a programming error.
        if let Err(err) = registry.register(tool) {
            tracing::error!(error = %err, "Skipping built-in tool");
        }
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolExecutionContext, ToolRuntime};
    use serde_json::json;

    fn registry() -> ToolRegistry {
        builtin_registry(Arc::new(FixedClock::on(2023, 4, 5).unwrap()))
    }

    #[test]
    fn test_registry_order_and_names() {
        assert_eq!(
            registry().names(),
            vec![
                "calculator",
                "get_current_date",
                "get_current_time",
                "get_weather",
                "reverse_string"
            ]
        );
    }

    #[test]
    fn test_descriptors_carry_schemas() {
        let descriptors = registry().descriptors();
        let weather = descriptors.iter().find(|d| d.name == "get_weather").unwrap();
        assert_eq!(weather.parameters["required"], json!(["date"]));
    }

    #[tokio::test]
    async fn test_weather_for_today_via_date_tool() {
        let registry = registry();
        let runtime = ToolRuntime::new();
        let ctx = ToolExecutionContext::new();

        let date = runtime
            .execute_by_name(&registry, "get_current_date", json!({}), &ctx)
            .await
            .to_model_content();
        assert_eq!(date, "2023-04-05");

        let weather = runtime
            .execute_by_name(&registry, "get_weather", json!({ "date": date }), &ctx)
            .await;
        assert_eq!(weather.to_model_content(), SUNNY);
    }

    #[tokio::test]
    async fn test_calculator_rejection_is_a_failed_result() {
        let registry = registry();
        let envelope = ToolRuntime::new()
            .execute_by_name(
                &registry,
                "calculator",
                json!({"expression": "__import__('os')"}),
                &ToolExecutionContext::new(),
            )
            .await;
        assert!(!envelope.is_success());
        assert!(envelope.to_model_content().starts_with("Error: "));
    }
}
