//! Tool executor trait, in-process implementation and name routing

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::core::types::ToolDeclaration;
use crate::toolkit::{InvokeError, ToolRegistry};

/// Trait for executing tool calls from the LLM
///
/// Implementations run a named tool with JSON arguments and return its JSON
/// result. Failures use the same [`InvokeError`] taxonomy as the HTTP server
/// so local and remote tools fail the same way.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute a tool call
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the tool to execute
    /// * `arguments` - Tool arguments as a JSON object
    async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, InvokeError>;
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, InvokeError> {
        self.invoke(name, Some(arguments)).await
    }
}

/// Lets one registry back both a server and an agent
#[async_trait]
impl<T: ToolExecutor + ?Sized> ToolExecutor for Arc<T> {
    async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, InvokeError> {
        (**self).execute(name, arguments).await
    }
}

/// Dispatches each call to the executor that declared the tool
///
/// Lets one agent use HTTP servers and stdio servers together. The first
/// executor added wins on duplicate names.
#[derive(Default)]
pub struct ToolRouter {
    executors: Vec<Box<dyn ToolExecutor>>,
    declarations: Vec<ToolDeclaration>,
    routes: HashMap<String, usize>,
}

impl ToolRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an executor together with the tools it serves
    pub fn with(
        mut self,
        executor: Box<dyn ToolExecutor>,
        declarations: Vec<ToolDeclaration>,
    ) -> Self {
        let position = self.executors.len();
        for declaration in declarations {
            if self.routes.contains_key(&declaration.name) {
                tracing::warn!(tool = %declaration.name, "duplicate tool name, keeping first executor");
                continue;
            }
            self.routes.insert(declaration.name.clone(), position);
            self.declarations.push(declaration);
        }
        self.executors.push(executor);
        self
    }

    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.declarations.clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.declarations
            .iter()
            .map(|declaration| declaration.name.clone())
            .collect()
    }
}

#[async_trait]
impl ToolExecutor for ToolRouter {
    async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, InvokeError> {
        match self.routes.get(name) {
            Some(&position) => self.executors[position].execute(name, arguments).await,
            None => Err(InvokeError::NotFound {
                name: name.to_string(),
                available: self.names(),
            }),
        }
    }
}
