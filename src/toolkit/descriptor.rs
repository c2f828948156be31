//! Tool descriptors built from JSON Schema generation

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use crate::llm::core::types::ToolDeclaration;

/// Public description of a registered tool
///
/// This is what `GET /mcp/list_tools` returns for every tool, and what remote
/// clients turn back into provider tool declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within a registry
    pub name: String,
    /// Natural-language description shown to the model
    pub description: String,
    /// JSON Schema of the input parameters
    pub input_schema: serde_json::Value,
    /// JSON Schema of the `{"result": ...}` envelope
    pub output_schema: serde_json::Value,
}

impl ToolDescriptor {
    /// The part of the descriptor a provider needs to offer the tool to a model
    pub fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// Envelope a tool's return value is wrapped in
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolOutput<R> {
    /// Function result
    pub result: R,
}

/// Create a tool descriptor from an input type and a result type
///
/// Field doc comments on `I` become parameter descriptions in the schema.
///
/// # Example
///
/// ```ignore
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct AddInput {
///     /// First addend
///     a: i64,
///     /// Second addend
///     b: i64,
/// }
///
/// let descriptor = create_tool_descriptor::<AddInput, i64>("add", "Add two numbers.");
/// ```
pub fn create_tool_descriptor<I: JsonSchema, R: JsonSchema>(
    name: impl Into<String>,
    description: impl Into<String>,
) -> ToolDescriptor {
    ToolDescriptor {
        name: name.into(),
        description: description.into(),
        input_schema: schema_value(schema_for!(I)),
        output_schema: schema_value(schema_for!(ToolOutput<R>)),
    }
}

fn schema_value(schema: schemars::schema::RootSchema) -> serde_json::Value {
    // RootSchema only holds maps, strings and numbers
    serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
}
