use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LedgerError, Result};

/// One typed content part of a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
    Resource { uri: String, text: String },
    Image { data: String, mime_type: String },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    /// A `{"success": true, ...}` JSON payload rendered as a text part.
    pub fn json(payload: &impl Serialize) -> Result<Self> {
        Ok(Content::Text {
            text: serde_json::to_string_pretty(payload)?,
        })
    }
}

/// A tool result: ordered content parts plus the error flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    pub content: Vec<Content>,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(content: Vec<Content>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::success(vec![Content::text(text)])
    }

    /// Domain errors become error results with the stable kind tag embedded
    /// in the message text.
    pub fn from_domain_error(err: &LedgerError) -> Self {
        Self {
            content: vec![Content::text(err.to_string())],
            is_error: true,
        }
    }
}

pub type ToolHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<ToolOutput>> + Send + Sync>;

/// A registered tool: the advertised contract plus its callback.
#[derive(Clone)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub handler: ToolHandler,
}

/// Decodes `params.arguments` into a tool's typed argument record. Decode
/// failures surface as `ValidationError` naming the problem, so untyped maps
/// never reach business logic.
pub fn decode_args<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|err| LedgerError::Validation(format!("invalid arguments: {}", err)))
}

/// JSON Schema for a tool argument record, via schemars.
pub fn tool_schema<T: schemars::JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| Value::Null)
}

/// Registry mapping tool name to contract and callback.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDef>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: ToolDef) {
        self.tools.insert(tool.name.clone(), tool);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// The `tools/list` payload.
    pub fn describe(&self) -> Value {
        let tools: Vec<Value> = self
            .tools
            .values()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema,
                })
            })
            .collect();
        serde_json::json!({ "tools": tools })
    }

    /// Runs a tool to completion. Domain errors are converted into error
    /// results; only an unknown tool name is reported to the transport.
    pub async fn call(&self, name: &str, arguments: Value) -> Option<ToolOutput> {
        let tool = self.tools.get(name)?;
        let output = match (tool.handler)(arguments).await {
            Ok(output) => output,
            Err(err) => ToolOutput::from_domain_error(&err),
        };
        Some(output)
    }

    pub fn handler(&self, name: &str) -> Option<ToolHandler> {
        self.tools.get(name).map(|t| t.handler.clone())
    }
}

/// A static resource producer, URI-addressed.
#[derive(Clone)]
pub struct ResourceDef {
    pub uri: String,
    pub name: String,
    pub producer: Arc<dyn Fn() -> Result<String> + Send + Sync>,
}

#[derive(Clone, Default)]
pub struct ResourceRegistry {
    resources: BTreeMap<String, ResourceDef>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resource: ResourceDef) {
        self.resources.insert(resource.uri.clone(), resource);
    }

    pub fn describe(&self) -> Value {
        let resources: Vec<Value> = self
            .resources
            .values()
            .map(|r| serde_json::json!({ "uri": r.uri, "name": r.name, "mimeType": "text/plain" }))
            .collect();
        serde_json::json!({ "resources": resources })
    }

    pub fn read(&self, uri: &str) -> Result<Value> {
        let resource = self
            .resources
            .get(uri)
            .ok_or_else(|| LedgerError::NotFound(format!("resource '{}' not found", uri)))?;
        let text = (resource.producer)()?;
        Ok(serde_json::json!({
            "contents": [{ "uri": resource.uri, "mimeType": "text/plain", "text": text }]
        }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

/// A prompt template producer.
#[derive(Clone)]
pub struct PromptDef {
    pub name: String,
    pub description: String,
    pub producer: Arc<dyn Fn(Option<Value>) -> Result<Vec<PromptMessage>> + Send + Sync>,
}

#[derive(Clone, Default)]
pub struct PromptRegistry {
    prompts: BTreeMap<String, PromptDef>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, prompt: PromptDef) {
        self.prompts.insert(prompt.name.clone(), prompt);
    }

    pub fn describe(&self) -> Value {
        let prompts: Vec<Value> = self
            .prompts
            .values()
            .map(|p| serde_json::json!({ "name": p.name, "description": p.description }))
            .collect();
        serde_json::json!({ "prompts": prompts })
    }

    pub fn get(&self, name: &str, arguments: Option<Value>) -> Result<Value> {
        let prompt = self
            .prompts
            .get(name)
            .ok_or_else(|| LedgerError::NotFound(format!("prompt '{}' not found", name)))?;
        let messages = (prompt.producer)(arguments)?;
        let rendered: Vec<Value> = messages
            .into_iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role,
                    "content": { "type": "text", "text": m.content }
                })
            })
            .collect();
        Ok(serde_json::json!({ "description": prompt.description, "messages": rendered }))
    }
}
