//! The three tool servers built on the MCP framework: the Accountant (the
//! bookkeeping tool surface), the Terminal and the Context Manager.

pub mod accountant;
pub mod context;
pub mod terminal;

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::company_file::LedgerStores;
use crate::config::Settings;

/// Domain stores shared across concurrent tool calls: exclusive writer,
/// multiple readers.
pub type SharedStores = Arc<RwLock<LedgerStores>>;

pub fn shared(stores: LedgerStores) -> SharedStores {
    Arc::new(RwLock::new(stores))
}

/// Launch descriptor entry for `config/mcp_servers.json`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: std::collections::BTreeMap<String, String>,
}

/// Reads the tool-server registry file.
pub fn load_server_registry(settings: &Settings) -> crate::error::Result<Vec<McpServerConfig>> {
    let path = settings.server_registry_path();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_registry_round_trip() {
        let entry = McpServerConfig {
            name: "accountant".to_string(),
            command: "accountant_server".to_string(),
            args: vec![],
            env: [("RUST_LOG".to_string(), "info".to_string())].into(),
        };
        let raw = serde_json::to_string(&vec![entry]).unwrap();
        let parsed: Vec<McpServerConfig> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed[0].name, "accountant");
        assert_eq!(parsed[0].env["RUST_LOG"], "info");
    }
}
