//! Tool registry: name → descriptor + callable

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::descriptor::{create_tool_descriptor, ToolDescriptor};
use super::error::{InvokeError, RegistryError};

/// Type-erased tool function: validated JSON in, JSON result out
pub type ToolHandler =
    Box<dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value, InvokeError>> + Send + Sync>;

/// Everything needed to register one tool
///
/// Produced by the `#[tool]` attribute (`add_tool::registration()`) or built
/// by hand from a descriptor and a handler.
pub struct ToolRegistration {
    pub descriptor: ToolDescriptor,
    pub handler: ToolHandler,
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: ToolHandler,
}

/// In-memory registry of tools, built once before the server starts
///
/// Tools keep their registration order, which is the order they are listed in.
///
/// # Example
///
/// ```ignore
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct AddInput {
///     a: i64,
///     b: i64,
/// }
///
/// let mut registry = ToolRegistry::new();
/// registry.register_sync("add", "Add two numbers.", |input: AddInput| {
///     Ok::<_, String>(input.a + input.b)
/// })?;
///
/// let result = registry.invoke("add", Some(json!({"a": 1, "b": 2}))).await?;
/// assert_eq!(result, json!(3));
/// ```
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prepared tool
    pub fn register(&mut self, registration: ToolRegistration) -> Result<(), RegistryError> {
        let name = registration.descriptor.name.clone();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if !is_url_safe(&name) {
            return Err(RegistryError::InvalidName(name));
        }
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }

        tracing::debug!(tool = %name, "registered tool");
        self.index.insert(name, self.tools.len());
        self.tools.push(RegisteredTool {
            descriptor: registration.descriptor,
            handler: registration.handler,
        });
        Ok(())
    }

    /// Register an async function, deriving both schemas from its types
    ///
    /// # Type Parameters
    ///
    /// * `I` - The input type (fields are the tool's parameters)
    /// * `R` - The result type, wrapped as `{"result": R}`
    /// * `E` - The error type, reported as an execution failure
    pub fn register_async<F, I, R, E, Fut>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        func: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        I: DeserializeOwned + JsonSchema + Send + 'static,
        R: Serialize + JsonSchema + Send + 'static,
        E: Display + Send + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let descriptor = create_tool_descriptor::<I, R>(name, description);
        let handler = move |payload: serde_json::Value| {
            let input = match parse_input::<I>(payload) {
                Ok(input) => input,
                Err(e) => return Box::pin(async move { Err(e) }) as BoxFuture<'static, _>,
            };

            let future = func(input);
            Box::pin(async move { into_output(future.await) }) as BoxFuture<'static, _>
        };

        self.register(ToolRegistration {
            descriptor,
            handler: Box::new(handler),
        })
    }

    /// Register a synchronous function, deriving both schemas from its types
    pub fn register_sync<F, I, R, E>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        func: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(I) -> Result<R, E> + Send + Sync + 'static,
        I: DeserializeOwned + JsonSchema + Send + 'static,
        R: Serialize + JsonSchema + Send + 'static,
        E: Display + Send + 'static,
    {
        let descriptor = create_tool_descriptor::<I, R>(name, description);
        let handler = move |payload: serde_json::Value| {
            let output = parse_input::<I>(payload).and_then(|input| into_output(func(input)));
            Box::pin(async move { output }) as BoxFuture<'static, _>
        };

        self.register(ToolRegistration {
            descriptor,
            handler: Box::new(handler),
        })
    }

    /// Invoke a tool by name
    ///
    /// A missing or `null` payload is treated as an empty object.
    pub async fn invoke(
        &self,
        name: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, InvokeError> {
        let tool = self.index.get(name).map(|&i| &self.tools[i]).ok_or_else(|| {
            InvokeError::NotFound {
                name: name.to_string(),
                available: self.names(),
            }
        })?;

        let payload = match payload {
            None | Some(serde_json::Value::Null) => serde_json::Value::Object(Default::default()),
            Some(value) => value,
        };

        // A panicking tool fails this invocation only
        match AssertUnwindSafe(async { (tool.handler)(payload).await })
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(InvokeError::Execution(panic_message(panic))),
        }
    }

    /// Descriptor of a single tool
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i].descriptor)
    }

    /// All descriptors in registration order
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|tool| tool.descriptor.clone()).collect()
    }

    /// All tool names in registration order
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.descriptor.name.clone()).collect()
    }

    /// Check if a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// RFC 3986 unreserved characters, minus '~'
fn is_url_safe(name: &str) -> bool {
    name.bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
}

/// Deserialize a payload into a tool's input type
///
/// Public so `#[tool]` expansions share the exact same validation path.
pub fn parse_input<I: DeserializeOwned>(payload: serde_json::Value) -> Result<I, InvokeError> {
    let payload = match payload {
        serde_json::Value::Null => serde_json::Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(payload).map_err(|e| InvokeError::InvalidInput(e.to_string()))
}

/// Serialize a tool's return value, mapping its error to an execution failure
pub fn into_output<R: Serialize, E: Display>(
    result: Result<R, E>,
) -> Result<serde_json::Value, InvokeError> {
    match result {
        Ok(value) => serde_json::to_value(value)
            .map_err(|e| InvokeError::Execution(format!("Failed to serialize result: {}", e))),
        Err(e) => Err(InvokeError::Execution(e.to_string())),
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("tool panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("tool panicked: {}", message)
    } else {
        "tool panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct AddArgs {
        a: i32,
        b: i32,
    }

    #[derive(Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
    struct AddResult {
        sum: i32,
    }

    fn add(args: AddArgs) -> Result<AddResult, String> {
        Ok(AddResult { sum: args.a + args.b })
    }

    #[tokio::test]
    async fn test_register_sync_function() {
        let mut registry = ToolRegistry::new();
        registry.register_sync("add", "Add two numbers", add).unwrap();

        assert!(registry.contains("add"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("add").unwrap().description, "Add two numbers");
    }

    #[tokio::test]
    async fn test_invoke_sync_function() {
        let mut registry = ToolRegistry::new();
        registry.register_sync("add", "Add two numbers", add).unwrap();

        let result = registry.invoke("add", Some(json!({"a": 5, "b": 3}))).await.unwrap();
        assert_eq!(result, json!({"sum": 8}));
    }

    #[tokio::test]
    async fn test_invoke_async_function() {
        let mut registry = ToolRegistry::new();
        registry
            .register_async("add_async", "Add later", |args: AddArgs| async move {
                tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
                Ok::<_, String>(args.a + args.b)
            })
            .unwrap();

        let result = registry
            .invoke("add_async", Some(json!({"a": 10, "b": 20})))
            .await
            .unwrap();
        assert_eq!(result, json!(30));
    }

    #[tokio::test]
    async fn test_function_error_is_execution_failure() {
        let mut registry = ToolRegistry::new();
        registry
            .register_sync("divide", "Divide", |args: AddArgs| {
                if args.b == 0 {
                    Err("Division by zero")
                } else {
                    Ok(args.a / args.b)
                }
            })
            .unwrap();

        let err = registry
            .invoke("divide", Some(json!({"a": 10, "b": 0})))
            .await
            .unwrap_err();
        assert_eq!(err, InvokeError::Execution("Division by zero".to_string()));
        assert_eq!(err.to_string(), "Tool execution failed: Division by zero");
    }

    #[tokio::test]
    async fn test_missing_field_is_invalid_input() {
        let mut registry = ToolRegistry::new();
        registry.register_sync("add", "Add", add).unwrap();

        let err = registry.invoke("add", Some(json!({"a": 5}))).await.unwrap_err();
        match err {
            InvokeError::InvalidInput(msg) => assert!(msg.contains("missing field `b`")),
            other => panic!("expected invalid input, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_type_is_invalid_input() {
        let mut registry = ToolRegistry::new();
        registry.register_sync("add", "Add", add).unwrap();

        let err = registry
            .invoke("add", Some(json!({"a": "five", "b": 1})))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 422);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let mut registry = ToolRegistry::new();
        registry.register_sync("add", "Add", add).unwrap();

        let err = registry.invoke("unknown", None).await.unwrap_err();
        assert_eq!(
            err,
            InvokeError::NotFound {
                name: "unknown".to_string(),
                available: vec!["add".to_string()],
            }
        );
    }

    #[derive(Debug, Deserialize, JsonSchema)]
    struct EmptyArgs {}

    #[tokio::test]
    async fn test_missing_payload_means_empty_object() {
        let mut registry = ToolRegistry::new();
        registry
            .register_sync("ping", "Ping", |_: EmptyArgs| Ok::<_, String>("pong"))
            .unwrap();

        assert_eq!(registry.invoke("ping", None).await.unwrap(), json!("pong"));
        assert_eq!(
            registry.invoke("ping", Some(serde_json::Value::Null)).await.unwrap(),
            json!("pong")
        );
    }

    #[tokio::test]
    async fn test_extra_fields_are_ignored() {
        let mut registry = ToolRegistry::new();
        registry.register_sync("add", "Add", add).unwrap();

        let result = registry
            .invoke("add", Some(json!({"a": 1, "b": 2, "c": 3})))
            .await
            .unwrap();
        assert_eq!(result, json!({"sum": 3}));
    }

    #[tokio::test]
    async fn test_duplicate_and_empty_names_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register_sync("add", "Add", add).unwrap();

        assert_eq!(
            registry.register_sync("add", "Again", add),
            Err(RegistryError::DuplicateTool("add".to_string()))
        );
        assert_eq!(
            registry.register_sync("", "Nameless", add),
            Err(RegistryError::EmptyName)
        );
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_names_must_be_path_safe() {
        let mut registry = ToolRegistry::new();

        for name in ["say hello", "a/b", "caf\u{e9}", "50%", "q?x"] {
            assert_eq!(
                registry.register_sync(name, "Bad name", add),
                Err(RegistryError::InvalidName(name.to_string()))
            );
        }
        assert!(registry.is_empty());

        registry.register_sync("get_weather.v2-beta", "Fine", add).unwrap();
        assert!(registry.contains("get_weather.v2-beta"));
    }

    #[tokio::test]
    async fn test_panicking_tool_fails_invocation_only() {
        let mut registry = ToolRegistry::new();
        registry
            .register_sync("explode", "Always panics", |_: EmptyArgs| -> Result<i32, String> {
                panic!("kaboom")
            })
            .unwrap();

        let err = registry.invoke("explode", None).await.unwrap_err();
        assert_eq!(err, InvokeError::Execution("tool panicked: kaboom".to_string()));
        assert!(registry.contains("explode"));
    }

    #[tokio::test]
    async fn test_listing_keeps_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register_sync("zeta", "Z", add).unwrap();
        registry.register_sync("alpha", "A", add).unwrap();
        registry.register_sync("mid", "M", add).unwrap();

        assert_eq!(registry.names(), vec!["zeta", "alpha", "mid"]);
        let descriptors = registry.descriptors();
        assert_eq!(descriptors[1].name, "alpha");
    }

    #[derive(Debug, Serialize, JsonSchema)]
    struct ComplexResult {
        message: String,
        data: Vec<i32>,
        nested: NestedData,
    }

    #[derive(Debug, Serialize, JsonSchema)]
    struct NestedData {
        value: String,
    }

    #[tokio::test]
    async fn test_complex_serialization() {
        let mut registry = ToolRegistry::new();
        registry
            .register_sync("get_data", "Fetch data", |_args: EmptyArgs| {
                Ok::<_, String>(ComplexResult {
                    message: "Success".to_string(),
                    data: vec![1, 2, 3],
                    nested: NestedData {
                        value: "nested".to_string(),
                    },
                })
            })
            .unwrap();

        let result = registry.invoke("get_data", Some(json!({}))).await.unwrap();
        assert_eq!(result["message"], "Success");
        assert_eq!(result["data"][0], 1);
        assert_eq!(result["nested"]["value"], "nested");
    }
}
