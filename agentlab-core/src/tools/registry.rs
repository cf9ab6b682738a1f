//! Tool registry for registration and lookup
//!
//! The `ToolRegistry` provides:
//! - Tool registration with duplicate detection
//! - Lookup by name
//! - Stable, registration-ordered listing for the provider
//!
//! # Example
//!
//! ```rust,ignore
//! use agentlab_core::tools::ToolRegistry;
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(Arc::new(CalculatorTool::new()))?;
//! registry.register(Arc::new(ReverseStringTool::new()))?;
//!
//! let tool = registry.get("calculator").unwrap();
//! let offered = registry.descriptors();
//! ```

use super::tool::{BoxedTool, Tool, ToolDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Tool with this name already exists
    DuplicateTool(String),
    /// Tool not found
    NotFound(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::DuplicateTool(name) => {
                write!(f, "Tool '{}' is already registered", name)
            }
            RegistryError::NotFound(name) => {
                write!(f, "Tool '{}' not found", name)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Summary of a tool for listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSummary {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// What the tool returns
    pub returns: String,
    /// Tags for categorization
    pub tags: Vec<String>,
}

impl From<&dyn Tool> for ToolSummary {
    fn from(tool: &dyn Tool) -> Self {
        let metadata = tool.metadata();
        Self {
            name: metadata.name.clone(),
            description: metadata.description.clone(),
            returns: metadata.returns.clone(),
            tags: metadata.tags.clone(),
        }
    }
}

/// Registry for managing tools.
///
/// Names are unique; iteration follows registration order so the model sees
/// the same tool list on every call.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<BoxedTool>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tool_count", &self.tools.len())
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    ///
    /// Returns an error if a tool with the same name is already registered.
    pub fn register(&mut self, tool: BoxedTool) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Build a registry from a list of tools
    pub fn from_tools(tools: Vec<BoxedTool>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register_all(tools)?;
        Ok(registry)
    }

    /// Register multiple tools at once
    ///
    /// Fails on the first duplicated name; tools before it stay registered.
    pub fn register_all(&mut self, tools: Vec<BoxedTool>) -> Result<(), RegistryError> {
        for tool in tools {
            self.register(tool)?;
        }
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&BoxedTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Get a tool by name or fail with `NotFound`
    pub fn require(&self, name: &str) -> Result<&BoxedTool, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Check if a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Iterate over registered tools in order
    pub fn iter(&self) -> impl Iterator<Item = &BoxedTool> {
        self.tools.iter()
    }

    /// List all tools with their summaries
    pub fn list(&self) -> Vec<ToolSummary> {
        self.tools
            .iter()
            .map(|t| ToolSummary::from(t.as_ref()))
            .collect()
    }

    /// Provider-facing descriptors for every registered tool
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|t| ToolDescriptor::of(t.as_ref()))
            .collect()
    }
}
