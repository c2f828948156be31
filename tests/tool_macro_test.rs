//! `#[tool]` expansion: descriptors, schemas and registered handlers

use polymcp::{register_tools, tool, InvokeError, RegistryError, ToolRegistry};
use serde::Serialize;
use serde_json::json;

/// Add two integers.
///
/// Both operands must fit in an i64.
///
/// # Arguments
///
/// * `a` - First addend
/// * `b` - Second addend
#[tool]
fn add(a: i64, #[arg(default = 1)] b: i64) -> i64 {
    a + b
}

/// Repeat a word.
///
/// # Arguments
///
/// * `word` - Word to repeat
/// * `times` - How many copies, at most 10
/// * `separator` - Placed between copies
#[tool(name = "repeat_word")]
async fn repeat(word: String, times: u32, separator: Option<String>) -> Result<String, String> {
    if times > 10 {
        return Err(format!("refusing to repeat {} times", times));
    }
    let separator = separator.unwrap_or_else(|| " ".to_string());
    Ok(vec![word; times as usize].join(&separator))
}

#[derive(Serialize, schemars::JsonSchema)]
struct Stats {
    count: usize,
    mean: f64,
}

#[tool(description = "Summarize a list of numbers")]
fn stats(values: Vec<f64>) -> Result<Stats, &'static str> {
    if values.is_empty() {
        return Err("no values");
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Ok(Stats {
        count: values.len(),
        mean,
    })
}

/// Always panics.
#[tool]
fn explode() -> bool {
    panic!("boom")
}

fn registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    register_tools!(registry, add_tool, repeat_tool, stats_tool, explode_tool);
    Ok(registry)
}

#[test]
fn test_descriptor_from_doc_comment() {
    let descriptor = add_tool::descriptor();
    assert_eq!(descriptor.name, "add");
    assert_eq!(descriptor.description, "Add two integers.");
    assert_eq!(add_tool::NAME, "add");

    let schema = &descriptor.input_schema;
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["properties"]["a"]["type"], "integer");
    assert_eq!(schema["properties"]["a"]["description"], "First addend");
    assert_eq!(schema["properties"]["b"]["description"], "Second addend");
    // Defaulted parameters are optional
    assert_eq!(schema["required"], json!(["a"]));

    assert_eq!(
        descriptor.output_schema["properties"]["result"]["type"],
        "integer"
    );
    assert_eq!(descriptor.output_schema["required"], json!(["result"]));
}

#[test]
fn test_name_and_description_overrides() {
    assert_eq!(repeat_tool::NAME, "repeat_word");
    assert_eq!(repeat_tool::descriptor().description, "Repeat a word.");

    let descriptor = stats_tool::descriptor();
    assert_eq!(descriptor.description, "Summarize a list of numbers");
    assert_eq!(descriptor.input_schema["properties"]["values"]["type"], "array");
}

#[test]
fn test_option_parameters_are_optional() {
    let schema = repeat_tool::descriptor().input_schema;
    let required: Vec<&str> = schema["required"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|value| value.as_str())
        .collect();
    assert_eq!(required, vec!["times", "word"]);
}

#[test]
fn test_tool_function_still_callable() {
    assert_eq!(add(2, 3), 5);
}

#[test]
fn test_duplicate_registration() {
    let mut registry = registry().unwrap();
    let err = registry.register(add_tool::registration()).unwrap_err();
    assert_eq!(err, RegistryError::DuplicateTool("add".to_string()));
}

#[tokio::test]
async fn test_sync_tool_with_default() {
    let registry = registry().unwrap();

    let result = registry.invoke("add", Some(json!({"a": 41}))).await;
    assert_eq!(result, Ok(json!(42)));

    let result = registry.invoke("add", Some(json!({"a": 1, "b": 2}))).await;
    assert_eq!(result, Ok(json!(3)));
}

#[tokio::test]
async fn test_async_tool_result() {
    let registry = registry().unwrap();

    let result = registry
        .invoke("repeat_word", Some(json!({"word": "ha", "times": 3})))
        .await;
    assert_eq!(result, Ok(json!("ha ha ha")));

    let result = registry
        .invoke(
            "repeat_word",
            Some(json!({"word": "ha", "times": 2, "separator": "-"})),
        )
        .await;
    assert_eq!(result, Ok(json!("ha-ha")));

    let err = registry
        .invoke("repeat_word", Some(json!({"word": "ha", "times": 11})))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        InvokeError::Execution("refusing to repeat 11 times".to_string())
    );
}

#[tokio::test]
async fn test_struct_result() {
    let registry = registry().unwrap();
    let result = registry
        .invoke("stats", Some(json!({"values": [1.0, 2.0, 6.0]})))
        .await
        .unwrap();
    assert_eq!(result, json!({"count": 3, "mean": 3.0}));
}

#[tokio::test]
async fn test_invalid_input() {
    let registry = registry().unwrap();

    // Strings are not coerced to numbers
    let err = registry
        .invoke("add", Some(json!({"a": "5"})))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 422);

    let err = registry.invoke("add", None).await.unwrap_err();
    assert_eq!(
        err,
        InvokeError::InvalidInput("missing field `a`".to_string())
    );
}

#[tokio::test]
async fn test_zero_argument_tool_panic_is_contained() {
    let registry = registry().unwrap();
    let err = registry.invoke("explode", None).await.unwrap_err();
    assert_eq!(err.status_code(), 500);
    assert!(err.to_string().contains("boom"));

    // The registry keeps working
    assert_eq!(
        registry.invoke("add", Some(json!({"a": 1}))).await,
        Ok(json!(2))
    );
}
