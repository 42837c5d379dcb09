use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::error::Result;

use super::protocol::{error_codes, methods, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use super::registry::{PromptRegistry, ResourceRegistry, ToolRegistry};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Grace period for in-flight calls after shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// A tool-server process: registries plus the stdio JSON-RPC loop. Log
/// output goes to stderr; stdout belongs to the transport.
pub struct McpServer {
    pub info: ServerInfo,
    pub instructions: Option<String>,
    pub tools: ToolRegistry,
    pub resources: ResourceRegistry,
    pub prompts: PromptRegistry,
}

impl McpServer {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            info: ServerInfo {
                name: name.to_string(),
                version: version.to_string(),
            },
            instructions: None,
            tools: ToolRegistry::new(),
            resources: ResourceRegistry::new(),
            prompts: PromptRegistry::new(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Answers one request. `None` means the request was a notification or a
    /// shutdown (the loop handles those).
    pub async fn dispatch(&self, request: &JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone()?;
        let response = match request.method.as_str() {
            methods::INITIALIZE => JsonRpcResponse::success(id, self.initialize_result()),
            methods::TOOLS_LIST => JsonRpcResponse::success(id, self.tools.describe()),
            methods::TOOLS_CALL => {
                let params = request.params.clone().unwrap_or(Value::Null);
                let name = params.get("name").and_then(|n| n.as_str()).unwrap_or_default();
                let arguments = params
                    .get("arguments")
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Default::default()));
                debug!("tools/call {}", name);
                match self.tools.call(name, arguments).await {
                    Some(output) => match serde_json::to_value(&output) {
                        Ok(result) => JsonRpcResponse::success(id, result),
                        Err(err) => JsonRpcResponse::failure(
                            id,
                            JsonRpcError::new(error_codes::INTERNAL_ERROR, err.to_string()),
                        ),
                    },
                    None => JsonRpcResponse::failure(
                        id,
                        JsonRpcError::invalid_params(format!("unknown tool '{}'", name)),
                    ),
                }
            }
            methods::RESOURCES_LIST => JsonRpcResponse::success(id, self.resources.describe()),
            methods::RESOURCES_READ => {
                let uri = request
                    .params
                    .as_ref()
                    .and_then(|p| p.get("uri"))
                    .and_then(|u| u.as_str())
                    .unwrap_or_default();
                match self.resources.read(uri) {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(err) => JsonRpcResponse::failure(
                        id,
                        JsonRpcError::invalid_params(err.to_string()),
                    ),
                }
            }
            methods::PROMPTS_LIST => JsonRpcResponse::success(id, self.prompts.describe()),
            methods::PROMPTS_GET => {
                let params = request.params.clone().unwrap_or(Value::Null);
                let name = params.get("name").and_then(|n| n.as_str()).unwrap_or_default();
                let arguments = params.get("arguments").cloned();
                match self.prompts.get(name, arguments) {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(err) => JsonRpcResponse::failure(
                        id,
                        JsonRpcError::invalid_params(err.to_string()),
                    ),
                }
            }
            methods::SHUTDOWN => JsonRpcResponse::success(id, Value::Null),
            other => JsonRpcResponse::failure(id, JsonRpcError::method_not_found(other)),
        };
        Some(response)
    }

    fn initialize_result(&self) -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {},
                "resources": {},
                "prompts": {},
            },
            "serverInfo": {
                "name": self.info.name,
                "version": self.info.version,
            },
            "instructions": self.instructions,
        })
    }

    /// Runs the line-delimited JSON-RPC loop over stdin/stdout until the
    /// client closes the stream or issues `shutdown`. Tool calls run on
    /// their own tasks so concurrent calls interleave at await points; after
    /// shutdown, in-flight calls get a bounded grace period.
    pub async fn run_stdio(self) -> Result<()> {
        let server = Arc::new(self);
        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();

        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(response) = rx.recv().await {
                match serde_json::to_string(&response) {
                    Ok(line) => {
                        if stdout.write_all(line.as_bytes()).await.is_err()
                            || stdout.write_all(b"\n").await.is_err()
                            || stdout.flush().await.is_err()
                        {
                            break;
                        }
                    }
                    Err(err) => warn!("failed to serialize response: {}", err),
                }
            }
        });

        let mut in_flight: JoinSet<()> = JoinSet::new();
        info!("{} listening on stdio", server.info.name);

        while let Some(line) = lines.next_line().await? {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            let request: JsonRpcRequest = match serde_json::from_str(&line) {
                Ok(request) => request,
                Err(err) => {
                    let _ = tx.send(JsonRpcResponse::failure(
                        Value::Null,
                        JsonRpcError::new(error_codes::PARSE_ERROR, err.to_string()),
                    ));
                    continue;
                }
            };

            if request.is_notification() {
                debug!("ignoring notification {}", request.method);
                continue;
            }
            if request.method == methods::SHUTDOWN {
                if let Some(response) = server.dispatch(&request).await {
                    let _ = tx.send(response);
                }
                break;
            }

            let server = Arc::clone(&server);
            let tx = tx.clone();
            in_flight.spawn(async move {
                if let Some(response) = server.dispatch(&request).await {
                    let _ = tx.send(response);
                }
            });
        }

        // Cooperative shutdown: await in-flight calls up to the grace period,
        // then abort whatever is left.
        let drain = async {
            while in_flight.join_next().await.is_some() {}
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            warn!("grace period elapsed with calls still in flight; aborting them");
            in_flight.abort_all();
        }
        drop(tx);
        let _ = writer.await;
        info!("{} shut down", server.info.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: i64, method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(serde_json::json!(id)),
            method: method.to_string(),
            params: Some(params),
        }
    }

    #[tokio::test]
    async fn test_initialize_advertises_capabilities() {
        let server = McpServer::new("test-server", "0.1.0").with_instructions("hello");
        let response = server
            .dispatch(&request(1, methods::INITIALIZE, Value::Null))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "test-server");
        assert_eq!(result["instructions"], "hello");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_unknown_method_is_rpc_error() {
        let server = McpServer::new("test-server", "0.1.0");
        let response = server
            .dispatch(&request(2, "bogus/method", Value::Null))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invalid_params() {
        let server = McpServer::new("test-server", "0.1.0");
        let response = server
            .dispatch(&request(
                3,
                methods::TOOLS_CALL,
                serde_json::json!({"name": "ghost", "arguments": {}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, error_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let server = McpServer::new("test-server", "0.1.0");
        let note = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: "notifications/initialized".to_string(),
            params: None,
        };
        assert!(server.dispatch(&note).await.is_none());
    }
}
