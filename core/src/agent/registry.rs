//! Tool registry and dispatch.
//!
//! Dispatch never raises: unknown names, bad arguments and tool failures all
//! come back as plain result strings the model can read.

use crate::agent::tool::Tool;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool definitions in OpenAI function-calling format, None when no
    /// tools are registered.
    pub fn to_schema(&self) -> Option<Value> {
        if self.tools.is_empty() {
            return None;
        }
        let defs: Vec<Value> = self
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.parameters(),
                    },
                })
            })
            .collect();
        Some(Value::Array(defs))
    }

    pub async fn execute(&self, name: &str, args: Value) -> String {
        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            return format!("Unknown tool: {}", name);
        };
        match tool.execute(args).await {
            Ok(result) => result,
            Err(e) => {
                crate::error_log!("tool {} failed: {:#}", name, e);
                format!("Error executing {}: {:#}", name, e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echo back the input"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }
        async fn execute(&self, args: Value) -> anyhow::Result<String> {
            Ok(args["text"].as_str().unwrap_or_default().to_string())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _args: Value) -> anyhow::Result<String> {
            bail!("deliberate failure")
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_result_string() {
        let registry = ToolRegistry::new();
        let result = registry.execute("frobnicate", json!({})).await;
        assert_eq!(result, "Unknown tool: frobnicate");
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let result = registry.execute("echo", json!({"text": "hi"})).await;
        assert_eq!(result, "hi");
    }

    #[tokio::test]
    async fn test_tool_error_becomes_result_string() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FailingTool));
        let result = registry.execute("broken", json!({})).await;
        assert!(result.starts_with("Error executing broken:"));
        assert!(result.contains("deliberate failure"));
    }

    #[test]
    fn test_schema_lists_all_tools_in_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(FailingTool));
        let schema = registry.to_schema().unwrap();
        let names: Vec<&str> = schema
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["function"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["echo", "broken"]);
    }

    #[test]
    fn test_empty_registry_has_no_schema() {
        assert!(ToolRegistry::new().to_schema().is_none());
    }
}
