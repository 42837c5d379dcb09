use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures::FutureExt;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{LedgerError, Result};
use crate::gst::split_gross;
use crate::mcp::{decode_args, tool_schema, Content, ToolDef, ToolOutput, ToolRegistry};
use crate::schema::{
    is_bank_code, round2, AccountType, JournalEntry, Side, SplitLine, TransactionRef,
};
use crate::servers::SharedStores;

const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Wire form of a journal entry in tool responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub transaction_id: Option<String>,
    pub date: NaiveDate,
    pub description: String,
    pub debits: Vec<SplitLine>,
    pub credits: Vec<SplitLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_balance: Option<Decimal>,
    pub notes: String,
}

impl From<&JournalEntry> for TransactionView {
    fn from(entry: &JournalEntry) -> Self {
        Self {
            transaction_id: entry.transaction_id(),
            date: entry.date,
            description: entry.description.clone(),
            debits: entry.debits.clone(),
            credits: entry.credits.clone(),
            bank_balance: entry.bank_balance,
            notes: entry.notes.clone(),
        }
    }
}

fn search_result(entries: Vec<&JournalEntry>, limit: Option<usize>) -> Result<ToolOutput> {
    let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let views: Vec<TransactionView> = entries.into_iter().take(limit).map(Into::into).collect();
    let payload = serde_json::json!({
        "success": true,
        "count": views.len(),
        "transactions": views,
    });
    Ok(ToolOutput::success(vec![Content::json(&payload)?]))
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SearchByStringArgs {
    /// Case-insensitive substring matched against description and notes.
    search_string: String,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SearchByAccountArgs {
    account_code: String,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SearchByAmountArgs {
    amount: f64,
    /// Absolute tolerance, default 0.01.
    tolerance: Option<f64>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SearchByDateRangeArgs {
    start_date: NaiveDate,
    end_date: NaiveDate,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UpdateTransactionAccountArgs {
    /// `yyyy-MM-dd_<description>_<amount>_<bankCode>`.
    transaction_id: String,
    new_account_code: String,
    notes: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct MatchSupplierFuzzyArgs {
    transaction_description: String,
    is_income_transaction: bool,
    max_candidates: Option<usize>,
}

fn decimal_from_f64(value: f64, field: &str) -> Result<Decimal> {
    Decimal::try_from(value)
        .map(round2)
        .map_err(|_| LedgerError::Validation(format!("{} '{}' is not a valid amount", field, value)))
}

pub fn register(tools: &mut ToolRegistry, stores: SharedStores, settings: Arc<Settings>) {
    let state = Arc::clone(&stores);
    tools.register(ToolDef {
        name: "search_transactions_by_string".to_string(),
        description: "Search journal entries whose description or notes contain a string"
            .to_string(),
        input_schema: tool_schema::<SearchByStringArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            async move {
                let args: SearchByStringArgs = decode_args(args)?;
                let needle = args.search_string.to_lowercase();
                let stores = state.read().await;
                let matches: Vec<&JournalEntry> = stores
                    .journal
                    .get_all_entries()
                    .iter()
                    .filter(|e| {
                        e.description.to_lowercase().contains(&needle)
                            || e.notes.to_lowercase().contains(&needle)
                    })
                    .collect();
                search_result(matches, args.limit)
            }
            .boxed()
        }),
    });

    let state = Arc::clone(&stores);
    tools.register(ToolDef {
        name: "search_transactions_by_account".to_string(),
        description: "Search journal entries touching an account code, optionally date-bounded"
            .to_string(),
        input_schema: tool_schema::<SearchByAccountArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            async move {
                let args: SearchByAccountArgs = decode_args(args)?;
                let stores = state.read().await;
                let matches: Vec<&JournalEntry> = stores
                    .journal
                    .get_entries_by_account(&args.account_code)
                    .into_iter()
                    .filter(|e| args.start_date.map(|s| e.date >= s).unwrap_or(true))
                    .filter(|e| args.end_date.map(|s| e.date <= s).unwrap_or(true))
                    .collect();
                search_result(matches, args.limit)
            }
            .boxed()
        }),
    });

    let state = Arc::clone(&stores);
    tools.register(ToolDef {
        name: "search_transactions_by_amount".to_string(),
        description: "Search journal entries by transacted amount within a tolerance".to_string(),
        input_schema: tool_schema::<SearchByAmountArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            async move {
                let args: SearchByAmountArgs = decode_args(args)?;
                let amount = decimal_from_f64(args.amount, "amount")?;
                let tolerance = match args.tolerance {
                    Some(t) => decimal_from_f64(t, "tolerance")?,
                    None => Decimal::new(1, 2),
                };
                let stores = state.read().await;
                let matches: Vec<&JournalEntry> = stores
                    .journal
                    .get_all_entries()
                    .iter()
                    .filter(|e| {
                        e.amount()
                            .map(|a| (a - amount).abs() <= tolerance)
                            .unwrap_or(false)
                    })
                    .collect();
                search_result(matches, args.limit)
            }
            .boxed()
        }),
    });

    let state = Arc::clone(&stores);
    tools.register(ToolDef {
        name: "search_transactions_by_date_range".to_string(),
        description: "Search journal entries within an inclusive date range".to_string(),
        input_schema: tool_schema::<SearchByDateRangeArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            async move {
                let args: SearchByDateRangeArgs = decode_args(args)?;
                if args.end_date < args.start_date {
                    return Err(LedgerError::Validation(format!(
                        "endDate {} is before startDate {}",
                        args.end_date, args.start_date
                    )));
                }
                let stores = state.read().await;
                let matches: Vec<&JournalEntry> = stores
                    .journal
                    .get_all_entries()
                    .iter()
                    .filter(|e| e.date >= args.start_date && e.date <= args.end_date)
                    .collect();
                search_result(matches, args.limit)
            }
            .boxed()
        }),
    });

    let state = Arc::clone(&stores);
    let update_settings = Arc::clone(&settings);
    tools.register(ToolDef {
        name: "update_transaction_account".to_string(),
        description: "Recategorize the non-bank leg of a journal entry, GST split included"
            .to_string(),
        input_schema: tool_schema::<UpdateTransactionAccountArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            let settings = Arc::clone(&update_settings);
            async move {
                let args: UpdateTransactionAccountArgs = decode_args(args)?;
                update_transaction_account(&state, &settings, args).await
            }
            .boxed()
        }),
    });

    let state = Arc::clone(&stores);
    tools.register(ToolDef {
        name: "match_supplier_fuzzy".to_string(),
        description: "Rank supplier candidates for a raw statement description".to_string(),
        input_schema: tool_schema::<MatchSupplierFuzzyArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&state);
            async move {
                let args: MatchSupplierFuzzyArgs = decode_args(args)?;
                let stores = state.read().await;
                let candidates = stores
                    .suppliers
                    .match_candidates(&args.transaction_description, args.max_candidates.unwrap_or(3));
                let rendered: Vec<serde_json::Value> = candidates
                    .into_iter()
                    .filter(|(_, supplier)| {
                        // A preferred account pointing the wrong way rules a
                        // candidate out; suppliers without one always pass.
                        match supplier
                            .account
                            .as_deref()
                            .and_then(|code| stores.chart.get_account(code))
                        {
                            Some(account) => {
                                let income = matches!(
                                    account.account_type,
                                    AccountType::Revenue | AccountType::OtherIncome
                                );
                                income == args.is_income_transaction
                            }
                            None => true,
                        }
                    })
                    .map(|(score, supplier)| {
                        serde_json::json!({
                            "name": supplier.name,
                            "supplies": supplier.supplies,
                            "account": supplier.account,
                            "score": (score * 100.0).round() / 100.0,
                        })
                    })
                    .collect();
                let payload = serde_json::json!({
                    "success": true,
                    "count": rendered.len(),
                    "candidates": rendered,
                });
                Ok(ToolOutput::success(vec![Content::json(&payload)?]))
            }
            .boxed()
        }),
    });
}

/// The only mutation path for the non-bank leg of an entry.
async fn update_transaction_account(
    state: &SharedStores,
    settings: &Settings,
    args: UpdateTransactionAccountArgs,
) -> Result<ToolOutput> {
    let reference = TransactionRef::parse(&args.transaction_id)?;
    let mut stores = state.write().await;

    let entry = stores
        .journal
        .find_by_ref(&reference)
        .cloned()
        .ok_or_else(|| {
            LedgerError::NotFound(format!("transaction '{}' not found", args.transaction_id))
        })?;

    if is_bank_code(&args.new_account_code) {
        return Err(LedgerError::Validation(format!(
            "cannot categorize against bank account {}; bank legs are immutable",
            args.new_account_code
        )));
    }
    let target = stores
        .chart
        .get_account(&args.new_account_code)
        .cloned()
        .ok_or_else(|| {
            LedgerError::Validation(format!(
                "newAccountCode {} is not in the chart of accounts",
                args.new_account_code
            ))
        })?;

    let previous: Vec<String> = entry
        .category_lines()
        .iter()
        .map(|l| l.account_code.clone())
        .collect();
    let current_primary = previous
        .iter()
        .find(|code| **code != settings.gst_clearing_code)
        .or(previous.first())
        .cloned()
        .unwrap_or_default();
    if current_primary == args.new_account_code {
        return Err(LedgerError::Conflict(format!(
            "transaction is already categorized to {}",
            args.new_account_code
        )));
    }

    let amount = entry.amount().ok_or_else(|| {
        LedgerError::Validation("entry has no single bank leg".to_string())
    })?;
    let lines = split_gross(&target, amount, &settings.gst_clearing_code)?;

    // Direction is preserved: the bank leg stays where it is and the new
    // category lines take the opposite side.
    let mut updated = entry.clone();
    match entry.bank_side().ok_or_else(|| {
        LedgerError::Validation("entry has no single bank leg".to_string())
    })? {
        Side::Debit => updated.credits = lines.clone(),
        Side::Credit => updated.debits = lines.clone(),
    }

    let note_text = args
        .notes
        .unwrap_or_else(|| format!("Recategorized {} -> {}", current_primary, target.code));
    let dated = format!("[{}] {}", Utc::now().format("%Y-%m-%d"), note_text);
    if updated.notes.is_empty() {
        updated.notes = dated;
    } else {
        updated.notes.push('\n');
        updated.notes.push_str(&dated);
    }

    stores.journal.update_entry(&entry, updated.clone())?;
    stores.journal.save_entries()?;
    stores.sync_company_file(settings)?;

    let payload = serde_json::json!({
        "success": true,
        "transactionId": args.transaction_id,
        "previousAccountCodes": previous,
        "transaction": TransactionView::from(&updated),
    });
    Ok(ToolOutput::success(vec![Content::json(&payload)?]))
}
