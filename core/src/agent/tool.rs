use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A model-callable tool: a name, a JSON-schema parameter description sent to
/// the model, and an async dispatch function.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments.
    fn parameters(&self) -> Value;

    /// Run the tool. An Err here is converted to an error string by the
    /// registry; it never propagates past dispatch.
    async fn execute(&self, args: Value) -> Result<String>;
}
