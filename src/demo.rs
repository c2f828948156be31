//! Tools bundled with `polymcp serve`
//!
//! Small arithmetic and text tools, handy for trying an agent against a
//! running server.

use crate::register_tools;
use crate::tool;
use crate::toolkit::{RegistryError, ToolRegistry};

/// Add two numbers together.
///
/// # Arguments
///
/// * `a` - First number
/// * `b` - Second number
#[tool]
pub fn add(a: f64, b: f64) -> f64 {
    a + b
}

/// Multiply two numbers.
///
/// # Arguments
///
/// * `a` - First factor
/// * `b` - Second factor
#[tool]
pub fn multiply(a: f64, b: f64) -> f64 {
    a * b
}

/// Divide one number by another.
///
/// # Arguments
///
/// * `dividend` - Number to divide
/// * `divisor` - Number to divide by, must not be zero
#[tool]
pub fn divide(dividend: f64, divisor: f64) -> Result<f64, String> {
    if divisor == 0.0 {
        return Err("Division by zero".to_string());
    }
    Ok(dividend / divisor)
}

/// Greet someone by name.
///
/// # Arguments
///
/// * `name` - Who to greet
/// * `greeting` - Word to greet with
/// * `punctuation` - Optional trailing punctuation
#[tool]
pub fn greet(
    name: String,
    #[arg(default = String::from("Hello"))] greeting: String,
    punctuation: Option<String>,
) -> String {
    format!(
        "{}, {}{}",
        greeting,
        name,
        punctuation.as_deref().unwrap_or("!")
    )
}

/// Count the words in a piece of text.
///
/// # Arguments
///
/// * `text` - Text to analyse
#[tool]
pub async fn word_count(text: String) -> usize {
    text.split_whitespace().count()
}

/// Registry holding every bundled tool
pub fn registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    register_tools!(
        registry,
        add_tool,
        multiply_tool,
        divide_tool,
        greet_tool,
        word_count_tool
    );
    Ok(registry)
}
