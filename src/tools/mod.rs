//! MCP tool surface: `addMemory`, `search`, `whoAmI`, `getProjects`.
//!
//! [`LoopTools`] serves the tools over MCP through the `rmcp` macros, and
//! [`LoopTools::dispatch`] exposes the same handlers to the HTTP API.

pub mod add_memory;
pub mod search;

use std::str::FromStr;
use std::sync::Arc;

use add_memory::AddMemoryParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use search::SearchParams;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::LoopConfig;
use crate::error::MemoryError;
use crate::memory::types::{Identity, Project, SearchResult};
use crate::memory::MemoryPipeline;

/// Names of the registered tools, as seen by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    AddMemory,
    Search,
    WhoAmI,
    GetProjects,
}

impl ToolName {
    pub const ALL: [ToolName; 4] = [
        ToolName::AddMemory,
        ToolName::Search,
        ToolName::WhoAmI,
        ToolName::GetProjects,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::AddMemory => "addMemory",
            ToolName::Search => "search",
            ToolName::WhoAmI => "whoAmI",
            ToolName::GetProjects => "getProjects",
        }
    }
}

impl FromStr for ToolName {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MemoryError::UnknownTool(s.to_string()))
    }
}

/// The Loopmemory MCP tool handler.
#[derive(Clone)]
pub struct LoopTools {
    tool_router: ToolRouter<Self>,
    pipeline: Arc<MemoryPipeline>,
    config: Arc<LoopConfig>,
}

#[tool_router]
impl LoopTools {
    pub fn new(pipeline: Arc<MemoryPipeline>, config: Arc<LoopConfig>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            pipeline,
            config,
        }
    }

    #[tool(name = "addMemory", description = "Add a new memory to the database")]
    async fn add_memory(
        &self,
        Parameters(params): Parameters<AddMemoryParams>,
    ) -> Result<String, String> {
        reply(self.run_add_memory(params).await)
    }

    #[tool(name = "search", description = "Search for memories using semantic search")]
    async fn search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<String, String> {
        reply(self.run_search(params).await)
    }

    #[tool(name = "whoAmI", description = "Get current user identity")]
    async fn who_am_i(&self) -> Result<String, String> {
        reply(Ok(self.identity()))
    }

    #[tool(name = "getProjects", description = "Get list of projects")]
    async fn get_projects(&self) -> Result<String, String> {
        reply(self.run_get_projects().await)
    }
}

impl LoopTools {
    /// Invoke a tool by name with raw JSON arguments.
    ///
    /// Arguments are checked against the same parameter types the MCP
    /// surface uses, so both fronts reject the same inputs.
    pub async fn dispatch(&self, name: &str, arguments: Value) -> Result<Value, MemoryError> {
        let tool: ToolName = name.parse()?;
        tracing::debug!(tool = tool.as_str(), "dispatching tool call");

        match tool {
            ToolName::AddMemory => to_value(self.run_add_memory(parse_args(arguments)?).await?),
            ToolName::Search => to_value(self.run_search(parse_args(arguments)?).await?),
            ToolName::WhoAmI => {
                expect_no_args(&arguments)?;
                to_value(self.identity())
            }
            ToolName::GetProjects => {
                expect_no_args(&arguments)?;
                to_value(self.run_get_projects().await?)
            }
        }
    }

    async fn run_add_memory(&self, params: AddMemoryParams) -> Result<Value, MemoryError> {
        let ingested = self
            .pipeline
            .add_memory(params.content, params.metadata)
            .await?;
        Ok(json!({
            "success": true,
            "memory": ingested.memory,
            "indexed": ingested.indexed,
        }))
    }

    async fn run_search(
        &self,
        params: SearchParams,
    ) -> Result<Vec<SearchResult>, MemoryError> {
        self.pipeline.search(&params.query, params.limit).await
    }

    async fn run_get_projects(&self) -> Result<Vec<Project>, MemoryError> {
        self.pipeline.list_projects().await.inspect_err(|err| {
            tracing::error!(error = %err, "getProjects failed");
        })
    }

    fn identity(&self) -> Identity {
        Identity {
            username: self.config.identity.username.clone(),
            role: self.config.identity.role.clone(),
        }
    }
}

/// Missing object arguments are treated as `{}` so no-argument tools accept `null`.
fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, MemoryError> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| MemoryError::Validation(e.to_string()))
}

/// No-argument tools still take an object (or nothing), like their schema says.
fn expect_no_args(arguments: &Value) -> Result<(), MemoryError> {
    if arguments.is_null() || arguments.is_object() {
        Ok(())
    } else {
        Err(MemoryError::Validation(format!(
            "arguments must be an object, got {arguments}"
        )))
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, MemoryError> {
    serde_json::to_value(value)
        .map_err(|e| MemoryError::Persistence(format!("failed to serialize result: {e}")))
}

/// Render a tool outcome as MCP text content: pretty JSON, or `Error: ...`
/// which the transport flags with `isError`.
fn reply<T: Serialize>(result: Result<T, MemoryError>) -> Result<String, String> {
    match result {
        Ok(value) => serde_json::to_string_pretty(&value)
            .map_err(|e| format!("Error: failed to serialize result: {e}")),
        Err(err) => {
            tracing::warn!(code = err.code(), error = %err, "tool call failed");
            Err(format!("Error: {err}"))
        }
    }
}

#[tool_handler]
impl ServerHandler for LoopTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Loopmemory stores notes for later semantic recall. Use addMemory to save \
                 a memory, search to find related memories, whoAmI for the current user, \
                 and getProjects to list projects."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_round_trip() {
        for tool in ToolName::ALL {
            assert_eq!(tool.as_str().parse::<ToolName>().unwrap(), tool);
        }
    }

    #[test]
    fn unknown_tool_name_is_typed() {
        let err = "deleteEverything".parse::<ToolName>().unwrap_err();
        assert!(matches!(err, MemoryError::UnknownTool(name) if name == "deleteEverything"));
    }

    #[test]
    fn reply_renders_errors_with_prefix() {
        let out = reply::<()>(Err(MemoryError::Validation("content must not be empty".into())));
        assert_eq!(
            out.unwrap_err(),
            "Error: validation error: content must not be empty"
        );
    }

    #[test]
    fn reply_pretty_prints_success() {
        let out = reply(Ok(json!({"username": "User"}))).unwrap();
        assert!(out.contains('\n'));
        assert!(out.contains("\"username\": \"User\""));
    }

    #[test]
    fn missing_required_field_is_validation_error() {
        let err = parse_args::<SearchParams>(json!({"limit": 3})).unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));
    }

    #[test]
    fn no_arg_tools_reject_non_objects() {
        for args in [json!("abc"), json!([1]), json!(3)] {
            let err = expect_no_args(&args).unwrap_err();
            assert!(matches!(err, MemoryError::Validation(_)), "{args}");
        }
        assert!(expect_no_args(&Value::Null).is_ok());
        assert!(expect_no_args(&json!({})).is_ok());
    }

    #[test]
    fn wrong_type_is_validation_error() {
        let err = parse_args::<AddMemoryParams>(json!({"content": 42})).unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));
    }
}
