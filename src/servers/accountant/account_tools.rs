use std::sync::Arc;

use futures::FutureExt;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::config::Settings;
use crate::error::LedgerError;
use crate::mcp::{decode_args, tool_schema, Content, ToolDef, ToolOutput, ToolRegistry};
use crate::schema::{Account, AccountType, GstTreatment};
use crate::servers::SharedStores;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AddAccountArgs {
    name: String,
    #[serde(rename = "type")]
    account_type: AccountType,
    /// Whether GST applies to this account.
    gst: bool,
    gst_type: GstTreatment,
    /// Explicit three digit code; omitted means auto-assign.
    code: Option<String>,
    /// Force code suggestion from the type band even when taken codes exist.
    suggest_code: Option<bool>,
}

pub fn register(tools: &mut ToolRegistry, stores: SharedStores, settings: Arc<Settings>) {
    let state = Arc::clone(&stores);
    tools.register(ToolDef {
        name: "add_account".to_string(),
        description: "Add a chart account; the bank range 001-099 is refused".to_string(),
        input_schema: tool_schema::<AddAccountArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            let settings = Arc::clone(&settings);
            async move {
                let args: AddAccountArgs = decode_args(args)?;
                if args.account_type == AccountType::Bank {
                    return Err(LedgerError::Protected(
                        "bank accounts (codes 001-099) are created by the bootstrap loader only"
                            .to_string(),
                    ));
                }
                let mut stores = state.write().await;
                let code = match (&args.code, args.suggest_code.unwrap_or(false)) {
                    (Some(code), false) => code.clone(),
                    (Some(code), true) => {
                        let start = code.parse::<u32>().map_err(|_| {
                            LedgerError::Validation(format!(
                                "code '{}' must be exactly three digits",
                                code
                            ))
                        })?;
                        stores.chart.get_next_available_account_code(start)?
                    }
                    (None, _) => stores
                        .chart
                        .get_next_available_account_code(args.account_type.base_code())?,
                };
                let account = Account {
                    code,
                    name: args.name,
                    account_type: args.account_type,
                    gst_applicable: args.gst,
                    gst_treatment: args.gst_type,
                };
                stores.chart.add_account(account.clone())?;
                stores.chart.save()?;
                stores.sync_company_file(&settings)?;
                let payload = serde_json::json!({ "success": true, "account": account });
                Ok(ToolOutput::success(vec![Content::json(&payload)?]))
            }
            .boxed()
        }),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::company_file::LedgerStores;
    use crate::servers::shared;

    async fn call(
        tools: &ToolRegistry,
        args: serde_json::Value,
    ) -> crate::mcp::ToolOutput {
        tools.call("add_account", args).await.unwrap()
    }

    fn fixture(dir: &tempfile::TempDir) -> (ToolRegistry, SharedStores) {
        let settings = Settings {
            company_file: None,
            inputs_dir: dir.path().join("inputs"),
            data_dir: dir.path().join("data"),
            config_dir: dir.path().join("config"),
            backup_dir: dir.path().join("backups"),
            gst_clearing_code: "506".to_string(),
            terminal_root: dir.path().to_path_buf(),
            terminal_timeout_secs: 30,
            terminal_output_cap: 65536,
        };
        let stores = shared(LedgerStores::open(&settings).unwrap());
        let mut tools = ToolRegistry::new();
        register(&mut tools, Arc::clone(&stores), Arc::new(settings));
        (tools, stores)
    }

    #[tokio::test]
    async fn test_auto_assigns_from_type_band() {
        let dir = tempfile::tempdir().unwrap();
        let (tools, stores) = fixture(&dir);
        let output = call(
            &tools,
            serde_json::json!({
                "name": "Office Supplies",
                "type": "Expense",
                "gst": true,
                "gstType": "GSTOnExpenses",
            }),
        )
        .await;
        assert!(!output.is_error, "{:?}", output.content);
        let stores = stores.read().await;
        assert!(stores.chart.get_account("300").is_some());
    }

    #[tokio::test]
    async fn test_bank_type_is_protected() {
        let dir = tempfile::tempdir().unwrap();
        let (tools, _stores) = fixture(&dir);
        let output = call(
            &tools,
            serde_json::json!({
                "name": "Sneaky Bank",
                "type": "Bank",
                "gst": false,
                "gstType": "BASExcluded",
                "code": "050",
            }),
        )
        .await;
        assert!(output.is_error);
        match &output.content[0] {
            Content::Text { text } => assert!(text.starts_with("Protected:")),
            other => panic!("expected text, got {:?}", other),
        }
    }
}
