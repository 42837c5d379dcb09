use std::sync::Arc;

use futures::FutureExt;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::config::Settings;
use crate::error::{LedgerError, Result};
use crate::mcp::{decode_args, tool_schema, Content, ToolDef, ToolOutput, ToolRegistry};
use crate::schema::is_bank_code;
use crate::servers::SharedStores;
use crate::suppliers::SupplierSort;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CreateSupplierArgs {
    name: String,
    /// What the supplier provides; free text the categorizer reads.
    supplies: String,
    /// Preferred categorization target account code.
    account: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ReadSupplierArgs {
    query: String,
    exact_match: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UpdateSupplierArgs {
    name: String,
    supplies: Option<String>,
    account: Option<String>,
    /// Set true to clear the preferred account.
    clear_account: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DeleteSupplierArgs {
    name: String,
    confirm: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ListSuppliersArgs {
    /// Substring filter over name and supplies.
    filter: Option<String>,
    /// `name` (default) or `account`.
    sort: Option<String>,
    limit: Option<usize>,
}

fn validate_account_target(
    stores: &crate::company_file::LedgerStores,
    account: &Option<String>,
) -> Result<()> {
    if let Some(code) = account {
        if is_bank_code(code) {
            return Err(LedgerError::Validation(format!(
                "supplier account {} may not be a bank account",
                code
            )));
        }
        if stores.chart.get_account(code).is_none() {
            return Err(LedgerError::Validation(format!(
                "supplier account {} is not in the chart of accounts",
                code
            )));
        }
    }
    Ok(())
}

pub fn register(tools: &mut ToolRegistry, stores: SharedStores, settings: Arc<Settings>) {
    let state = Arc::clone(&stores);
    let create_settings = Arc::clone(&settings);
    tools.register(ToolDef {
        name: "create_supplier".to_string(),
        description: "Create a supplier; fuzzy duplicates are refused".to_string(),
        input_schema: tool_schema::<CreateSupplierArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            let settings = Arc::clone(&create_settings);
            async move {
                let args: CreateSupplierArgs = decode_args(args)?;
                let mut stores = state.write().await;
                validate_account_target(&stores, &args.account)?;
                let created = stores
                    .suppliers
                    .create(&args.name, &args.supplies, args.account)?
                    .clone();
                stores.suppliers.save()?;
                stores.sync_company_file(&settings)?;
                let payload = serde_json::json!({ "success": true, "supplier": created });
                Ok(ToolOutput::success(vec![Content::json(&payload)?]))
            }
            .boxed()
        }),
    });

    let state = Arc::clone(&stores);
    tools.register(ToolDef {
        name: "read_supplier".to_string(),
        description: "Look a supplier up by name, fuzzy by default".to_string(),
        input_schema: tool_schema::<ReadSupplierArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            async move {
                let args: ReadSupplierArgs = decode_args(args)?;
                let stores = state.read().await;
                let supplier = stores
                    .suppliers
                    .read(&args.query, args.exact_match.unwrap_or(false))?;
                let payload = serde_json::json!({ "success": true, "supplier": supplier });
                Ok(ToolOutput::success(vec![Content::json(&payload)?]))
            }
            .boxed()
        }),
    });

    let state = Arc::clone(&stores);
    let update_settings = Arc::clone(&settings);
    tools.register(ToolDef {
        name: "update_supplier".to_string(),
        description: "Update a supplier's supplies or preferred account".to_string(),
        input_schema: tool_schema::<UpdateSupplierArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            let settings = Arc::clone(&update_settings);
            async move {
                let args: UpdateSupplierArgs = decode_args(args)?;
                let mut stores = state.write().await;
                validate_account_target(&stores, &args.account)?;
                let account = if args.clear_account.unwrap_or(false) {
                    Some(None)
                } else {
                    args.account.map(Some)
                };
                let updated = stores
                    .suppliers
                    .update(&args.name, args.supplies, account)?
                    .clone();
                stores.suppliers.save()?;
                stores.sync_company_file(&settings)?;
                let payload = serde_json::json!({ "success": true, "supplier": updated });
                Ok(ToolOutput::success(vec![Content::json(&payload)?]))
            }
            .boxed()
        }),
    });

    let state = Arc::clone(&stores);
    let delete_settings = Arc::clone(&settings);
    tools.register(ToolDef {
        name: "delete_supplier".to_string(),
        description: "Delete a supplier; requires confirm: true".to_string(),
        input_schema: tool_schema::<DeleteSupplierArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            let settings = Arc::clone(&delete_settings);
            async move {
                let args: DeleteSupplierArgs = decode_args(args)?;
                let mut stores = state.write().await;
                let removed = stores.suppliers.delete(&args.name, args.confirm)?;
                stores.suppliers.save()?;
                stores.sync_company_file(&settings)?;
                let payload = serde_json::json!({ "success": true, "deleted": removed });
                Ok(ToolOutput::success(vec![Content::json(&payload)?]))
            }
            .boxed()
        }),
    });

    let state = Arc::clone(&stores);
    tools.register(ToolDef {
        name: "list_suppliers".to_string(),
        description: "List suppliers with filter, sort and limit".to_string(),
        input_schema: tool_schema::<ListSuppliersArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            async move {
                let args: ListSuppliersArgs = decode_args(args)?;
                let sort = match args.sort.as_deref() {
                    None | Some("name") => SupplierSort::Name,
                    Some("account") => SupplierSort::Account,
                    Some(other) => {
                        return Err(LedgerError::Validation(format!(
                            "sort '{}' is not one of name | account",
                            other
                        )))
                    }
                };
                let stores = state.read().await;
                let suppliers = stores
                    .suppliers
                    .list(args.filter.as_deref(), sort, args.limit);
                let payload = serde_json::json!({
                    "success": true,
                    "count": suppliers.len(),
                    "suppliers": suppliers,
                });
                Ok(ToolOutput::success(vec![Content::json(&payload)?]))
            }
            .boxed()
        }),
    });
}
