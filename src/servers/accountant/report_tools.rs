use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures::FutureExt;
use log::info;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::backup::create_zip_backup;
use crate::config::Settings;
use crate::error::Result;
use crate::mcp::{decode_args, tool_schema, Content, ToolDef, ToolOutput, ToolRegistry};
use crate::reports::{
    generate_account_activity, generate_balance_sheet, generate_cash_flow, generate_profit_loss,
    generate_trial_balance, SortOrder,
};
use crate::servers::SharedStores;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct BalanceSheetArgs {
    as_of_date: NaiveDate,
    include_zero_balances: Option<bool>,
    sort_by: Option<SortOrder>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ProfitLossArgs {
    start_date: NaiveDate,
    end_date: NaiveDate,
    include_zero_balances: Option<bool>,
    sort_by: Option<SortOrder>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct TrialBalanceArgs {
    as_of_date: NaiveDate,
    include_zero_balances: Option<bool>,
    group_by_type: Option<bool>,
    sort_by: Option<SortOrder>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CashFlowArgs {
    start_date: NaiveDate,
    end_date: NaiveDate,
    cash_account_codes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AccountActivityArgs {
    account_codes: Vec<String>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    include_running_balance: Option<bool>,
    sort_by: Option<SortOrder>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RegenerateReportsArgs {
    /// Why the regeneration is happening; recorded in the log.
    reason: String,
    create_zip_backup: Option<bool>,
    /// Directories to bundle, relative to the working directory.
    backup_directories: Option<Vec<String>>,
}

fn plaintext(report: String) -> Result<ToolOutput> {
    Ok(ToolOutput::text(report))
}

pub fn register(tools: &mut ToolRegistry, stores: SharedStores, settings: Arc<Settings>) {
    let state = Arc::clone(&stores);
    tools.register(ToolDef {
        name: "generate_balance_sheet_audit".to_string(),
        description: "Plaintext balance sheet with owner-equity plug and verification".to_string(),
        input_schema: tool_schema::<BalanceSheetArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            async move {
                let args: BalanceSheetArgs = decode_args(args)?;
                let stores = state.read().await;
                plaintext(generate_balance_sheet(
                    &stores.journal,
                    &stores.chart,
                    args.as_of_date,
                    args.include_zero_balances.unwrap_or(false),
                    args.sort_by.unwrap_or_default(),
                ))
            }
            .boxed()
        }),
    });

    let state = Arc::clone(&stores);
    tools.register(ToolDef {
        name: "generate_profit_loss_audit".to_string(),
        description: "Plaintext profit & loss with per-account transaction counts".to_string(),
        input_schema: tool_schema::<ProfitLossArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            async move {
                let args: ProfitLossArgs = decode_args(args)?;
                let stores = state.read().await;
                plaintext(generate_profit_loss(
                    &stores.journal,
                    &stores.chart,
                    args.start_date,
                    args.end_date,
                    args.include_zero_balances.unwrap_or(false),
                    args.sort_by.unwrap_or_default(),
                ))
            }
            .boxed()
        }),
    });

    let state = Arc::clone(&stores);
    tools.register(ToolDef {
        name: "generate_trial_balance_audit".to_string(),
        description: "Plaintext trial balance with natural-balance columns".to_string(),
        input_schema: tool_schema::<TrialBalanceArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            async move {
                let args: TrialBalanceArgs = decode_args(args)?;
                let stores = state.read().await;
                plaintext(generate_trial_balance(
                    &stores.journal,
                    &stores.chart,
                    args.as_of_date,
                    args.include_zero_balances.unwrap_or(false),
                    args.group_by_type.unwrap_or(false),
                    args.sort_by.unwrap_or_default(),
                ))
            }
            .boxed()
        }),
    });

    let state = Arc::clone(&stores);
    tools.register(ToolDef {
        name: "generate_cash_flow_audit".to_string(),
        description: "Plaintext cash flow per bank account with running balances".to_string(),
        input_schema: tool_schema::<CashFlowArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            async move {
                let args: CashFlowArgs = decode_args(args)?;
                let stores = state.read().await;
                plaintext(generate_cash_flow(
                    &stores.journal,
                    &stores.chart,
                    args.start_date,
                    args.end_date,
                    args.cash_account_codes.as_deref(),
                ))
            }
            .boxed()
        }),
    });

    let state = Arc::clone(&stores);
    tools.register(ToolDef {
        name: "generate_account_activity_audit".to_string(),
        description: "Plaintext per-account activity listing for a period".to_string(),
        input_schema: tool_schema::<AccountActivityArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            async move {
                let args: AccountActivityArgs = decode_args(args)?;
                let stores = state.read().await;
                plaintext(generate_account_activity(
                    &stores.journal,
                    &stores.chart,
                    &args.account_codes,
                    args.start_date,
                    args.end_date,
                    args.include_running_balance.unwrap_or(false),
                    args.sort_by.unwrap_or(SortOrder::Date),
                ))
            }
            .boxed()
        }),
    });

    tools.register(ToolDef {
        name: "regenerate_reports".to_string(),
        description: "Trigger HTML report regeneration and optionally ZIP-backup directories"
            .to_string(),
        input_schema: tool_schema::<RegenerateReportsArgs>(),
        handler: Arc::new(move |args| {
            let settings = Arc::clone(&settings);
            async move {
                let args: RegenerateReportsArgs = decode_args(args)?;
                info!("regenerating reports: {}", args.reason);

                let backup = if args.create_zip_backup.unwrap_or(false) {
                    let directories: Vec<PathBuf> = args
                        .backup_directories
                        .unwrap_or_else(|| vec!["inputs".to_string(), "data".to_string()])
                        .into_iter()
                        .map(PathBuf::from)
                        .collect();
                    Some(create_zip_backup(&settings.backup_dir, &directories, Utc::now())?)
                } else {
                    None
                };

                // HTML rendering is an external collaborator; this surface
                // only records that the run was requested.
                let payload = serde_json::json!({
                    "success": true,
                    "reason": args.reason,
                    "htmlReports": "delegated",
                    "backup": backup,
                });
                Ok(ToolOutput::success(vec![Content::json(&payload)?]))
            }
            .boxed()
        }),
    });
}
