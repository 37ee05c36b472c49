// hive-collab/src/tool.rs
// ============================================================================
// Module: Tool Plugin Surface
// Description: Narrow trait and registry for dispatching `ToolCall`s a
//              collaborator returns.
// Purpose: Let the engine execute tool invocations a collaborator requests
//          without depending on any one plugin implementation.
// Dependencies: hive_core::ToolCall
// ============================================================================

//! ## Overview
//! A [`hive_core::CollaboratorResponse`] may carry zero or more
//! [`hive_core::ToolCall`]s the collaborator wants executed. This module
//! defines [`ToolPlugin`], the trait a tool implementation satisfies, and
//! [`ToolRegistry`], a name-keyed lookup the orchestrator consults when
//! dispatching calls. [`EchoToolPlugin`] is a trivial reference plugin
//! that returns its arguments unchanged, useful for wiring tests together
//! without a real side-effecting tool.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hive_core::ToolCall;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while dispatching or executing a [`ToolCall`].
#[derive(Debug, Error)]
pub enum ToolError {
    /// No plugin is registered under the requested tool name.
    #[error("no tool plugin registered for '{0}'")]
    NotFound(String),
    /// The plugin rejected the call's arguments or failed during execution.
    #[error("tool '{name}' failed: {reason}")]
    ExecutionFailed {
        /// Name of the tool that failed.
        name: String,
        /// Human-readable failure reason.
        reason: String,
    },
}

// ============================================================================
// SECTION: Tool Plugin
// ============================================================================

/// A single named tool a collaborator may invoke via a [`ToolCall`].
#[async_trait]
pub trait ToolPlugin: Send + Sync {
    /// The name this plugin answers to in a [`ToolCall::name`].
    fn name(&self) -> &str;

    /// Executes the tool with `arguments`, returning an opaque JSON result.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::ExecutionFailed`] if the plugin cannot
    /// complete the call.
    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError>;
}

// ============================================================================
// SECTION: Tool Registry
// ============================================================================

/// A name-keyed lookup of [`ToolPlugin`]s.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    plugins: HashMap<String, Arc<dyn ToolPlugin>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { plugins: HashMap::new() }
    }

    /// Registers `plugin` under its own [`ToolPlugin::name`], replacing
    /// any existing plugin with that name.
    pub fn register(&mut self, plugin: Arc<dyn ToolPlugin>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    /// Dispatches `call` to the registered plugin matching its name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] if no plugin is registered for
    /// `call.name`, or whatever error the plugin itself returns.
    pub async fn dispatch(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let plugin = self.plugins.get(&call.name).ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        plugin.invoke(call.arguments.clone()).await
    }
}

// ============================================================================
// SECTION: Echo Tool Plugin
// ============================================================================

/// A reference [`ToolPlugin`] that returns its arguments unchanged.
pub struct EchoToolPlugin {
    name: String,
}

impl EchoToolPlugin {
    /// Creates an echo plugin registered under `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl ToolPlugin for EchoToolPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError> {
        Ok(arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn registry_dispatches_to_the_matching_plugin() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoToolPlugin::new("echo")));

        let call = ToolCall { name: "echo".to_string(), arguments: json!({"hello": "world"}) };
        let result = registry.dispatch(&call).await.expect("dispatch");
        assert_eq!(result, json!({"hello": "world"}));
    }

    #[tokio::test]
    async fn registry_errors_on_unknown_tool_name() {
        let registry = ToolRegistry::new();
        let call = ToolCall { name: "missing".to_string(), arguments: Value::Null };
        let result = registry.dispatch(&call).await;
        assert!(matches!(result, Err(ToolError::NotFound(name)) if name == "missing"));
    }
}
