//! Tool registration framework
//!
//! Turns plain Rust functions into tools: a [`ToolDescriptor`] carrying JSON
//! schemas for input and output, plus a type-erased handler that validates a
//! JSON payload, calls the function and serializes the result. The
//! [`ToolRegistry`] holds them by name for the server and the agent.

pub mod descriptor;
pub mod error;
pub mod registry;

// Re-export commonly used types
pub use descriptor::{create_tool_descriptor, ToolDescriptor, ToolOutput};
pub use error::{InvokeError, RegistryError};
pub use registry::{ToolHandler, ToolRegistration, ToolRegistry};

/// Helper macro to register multiple `#[tool]` functions at once
///
/// Each argument is the module path generated by the `#[tool]` attribute
/// (`<function>_tool`). Expands to a sequence of `register` calls joined
/// with `?`, so it must be used inside a function returning a `Result`
/// whose error converts from [`RegistryError`].
///
/// # Example
///
/// ```ignore
/// /// Add two numbers.
/// #[tool]
/// fn add(a: i64, b: i64) -> i64 {
///     a + b
/// }
///
/// /// Multiply two numbers.
/// #[tool]
/// async fn multiply(a: i64, b: i64) -> i64 {
///     a * b
/// }
///
/// let mut registry = ToolRegistry::new();
/// register_tools!(registry, add_tool, multiply_tool);
/// ```
#[macro_export]
macro_rules! register_tools {
    ($registry:expr, $($tool_mod:path),+ $(,)?) => {
        $(
            {
                use $tool_mod as tool;
                $registry.register(tool::registration())?;
            }
        )+
    };
}
