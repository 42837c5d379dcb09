use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::config::Settings;
use crate::error::{LedgerError, Result};
use crate::mcp::{decode_args, tool_schema, Content, ToolDef, ToolOutput, ToolRegistry};
use crate::schema::{is_bank_code, AccountingRule, AccountType, GstTreatment};
use crate::servers::SharedStores;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AddRuleArgs {
    name: String,
    /// 1 (highest) to 10.
    priority: u8,
    condition: String,
    action: String,
    account_code: String,
    notes: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UpdateRuleArgs {
    name: String,
    priority: Option<u8>,
    condition: Option<String>,
    action: Option<String>,
    account_code: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DeleteRuleArgs {
    name: String,
    confirm: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ListRulesArgs {
    /// Substring filter over rule conditions.
    condition_filter: Option<String>,
    account_code: Option<String>,
    sort_by_priority: Option<bool>,
    limit: Option<usize>,
}

/// Resolves a rule target to its account snapshot. Rules may never target
/// the bank range.
fn resolve_target(
    stores: &crate::company_file::LedgerStores,
    code: &str,
) -> Result<(String, AccountType, GstTreatment)> {
    if is_bank_code(code) {
        return Err(LedgerError::Protected(format!(
            "rules may not target account {} in the bank range 001-099",
            code
        )));
    }
    let account = stores.chart.get_account(code).ok_or_else(|| {
        LedgerError::Validation(format!("accountCode {} is not in the chart of accounts", code))
    })?;
    Ok((
        account.code.clone(),
        account.account_type,
        account.gst_treatment,
    ))
}

pub fn register(tools: &mut ToolRegistry, stores: SharedStores, settings: Arc<Settings>) {
    let state = Arc::clone(&stores);
    let add_settings = Arc::clone(&settings);
    tools.register(ToolDef {
        name: "add_accounting_rule".to_string(),
        description: "Add a named categorization rule; duplicate names are refused".to_string(),
        input_schema: tool_schema::<AddRuleArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            let settings = Arc::clone(&add_settings);
            async move {
                let args: AddRuleArgs = decode_args(args)?;
                let mut stores = state.write().await;
                let (account_code, account_type, gst_handling) =
                    resolve_target(&stores, &args.account_code)?;
                let now = Utc::now();
                let rule = AccountingRule {
                    name: args.name,
                    created: now,
                    updated: now,
                    priority: args.priority,
                    condition: args.condition,
                    action: args.action,
                    account_code,
                    account_type,
                    gst_handling,
                    notes: args.notes.unwrap_or_default(),
                };
                let added = stores.rules.add(rule)?.clone();
                stores.rules.save()?;
                stores.sync_company_file(&settings)?;
                let payload = serde_json::json!({ "success": true, "rule": added });
                Ok(ToolOutput::success(vec![Content::json(&payload)?]))
            }
            .boxed()
        }),
    });

    let state = Arc::clone(&stores);
    let update_settings = Arc::clone(&settings);
    tools.register(ToolDef {
        name: "update_accounting_rule".to_string(),
        description: "Update a rule, keeping its created timestamp".to_string(),
        input_schema: tool_schema::<UpdateRuleArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            let settings = Arc::clone(&update_settings);
            async move {
                let args: UpdateRuleArgs = decode_args(args)?;
                let mut stores = state.write().await;
                let target = match &args.account_code {
                    Some(code) => Some(resolve_target(&stores, code)?),
                    None => None,
                };
                let updated = stores
                    .rules
                    .update(
                        &args.name,
                        args.priority,
                        args.condition,
                        args.action,
                        target,
                        args.notes,
                    )?
                    .clone();
                stores.rules.save()?;
                stores.sync_company_file(&settings)?;
                let payload = serde_json::json!({ "success": true, "rule": updated });
                Ok(ToolOutput::success(vec![Content::json(&payload)?]))
            }
            .boxed()
        }),
    });

    let state = Arc::clone(&stores);
    let delete_settings = Arc::clone(&settings);
    tools.register(ToolDef {
        name: "delete_accounting_rule".to_string(),
        description: "Delete a rule; requires confirm: true".to_string(),
        input_schema: tool_schema::<DeleteRuleArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            let settings = Arc::clone(&delete_settings);
            async move {
                let args: DeleteRuleArgs = decode_args(args)?;
                let mut stores = state.write().await;
                let removed = stores.rules.delete(&args.name, args.confirm)?;
                stores.rules.save()?;
                stores.sync_company_file(&settings)?;
                let payload = serde_json::json!({ "success": true, "deleted": removed });
                Ok(ToolOutput::success(vec![Content::json(&payload)?]))
            }
            .boxed()
        }),
    });

    let state = Arc::clone(&stores);
    tools.register(ToolDef {
        name: "list_accounting_rules".to_string(),
        description: "List rules with condition/account filters, priority sort and limit"
            .to_string(),
        input_schema: tool_schema::<ListRulesArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            async move {
                let args: ListRulesArgs = decode_args(args)?;
                let stores = state.read().await;
                let rules = stores.rules.list(
                    args.condition_filter.as_deref(),
                    args.account_code.as_deref(),
                    args.sort_by_priority.unwrap_or(false),
                    args.limit,
                );
                let payload = serde_json::json!({
                    "success": true,
                    "count": rules.len(),
                    "rules": rules,
                });
                Ok(ToolOutput::success(vec![Content::json(&payload)?]))
            }
            .boxed()
        }),
    });
}
