//! Minimal MCP tool-server framework: a JSON-RPC 2.0 envelope over
//! line-delimited stdio, registries for tools, resources and prompt
//! templates, and the cooperative server loop the three bookkeeping servers
//! share.

pub mod protocol;
pub mod registry;
pub mod server;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use registry::{
    decode_args, tool_schema, Content, PromptDef, PromptMessage, PromptRegistry, ResourceDef,
    ResourceRegistry, ToolDef, ToolOutput, ToolRegistry,
};
pub use server::{McpServer, ServerInfo};
