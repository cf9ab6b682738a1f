//! Date and time tools, plus the clock they read from

use crate::tools::{Tool, ToolError, ToolExecutionContext, ToolMetadata, ToolSchema};
use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Date format shared by the date and weather tools
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Date-time format of the time tool
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of "now" in the process's local time zone
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }

    /// Today's date rendered with [`DATE_FORMAT`]
    fn today_string(&self) -> String {
        self.today().format(DATE_FORMAT).to_string()
    }
}

/// Wall clock, local time zone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock stopped at a given instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    /// Midnight of the given date; `None` for an impossible date
    pub fn on(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(FixedClock)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

pub type SharedClock = Arc<dyn Clock>;

/// Returns today's date as `yyyy-MM-dd`
pub struct CurrentDateTool {
    metadata: ToolMetadata,
    clock: SharedClock,
}

impl CurrentDateTool {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            metadata: ToolMetadata::new("get_current_date", "Returns today's date as 'YYYY-MM-DD'.")
                .with_returns("Date string")
                .with_tag("time"),
            clock,
        }
    }
}

#[async_trait]
impl Tool for CurrentDateTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty()
    }

    async fn execute(&self, _args: Value, _ctx: &ToolExecutionContext) -> Result<Value, ToolError> {
        let today = self.clock.today_string();
        info!(today = %today, "get_current_date");
        Ok(Value::String(today))
    }
}

/// Returns the current local date and time as `yyyy-MM-dd HH:mm:ss`
pub struct CurrentTimeTool {
    metadata: ToolMetadata,
    clock: SharedClock,
}

impl CurrentTimeTool {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            metadata: ToolMetadata::new(
                "get_current_time",
                "Returns current date and time as 'YYYY-MM-DD HH:MM:SS'.",
            )
            .with_returns("Date-time string")
            .with_tag("time"),
            clock,
        }
    }
}

#[async_trait]
impl Tool for CurrentTimeTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty()
    }

    async fn execute(&self, _args: Value, _ctx: &ToolExecutionContext) -> Result<Value, ToolError> {
        let now = self.clock.now().format(DATETIME_FORMAT).to_string();
        info!(now = %now, "get_current_time");
        Ok(Value::String(now))
    }
}
