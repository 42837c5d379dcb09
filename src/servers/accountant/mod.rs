//! The Accountant tool server: supplier CRUD, transaction search and
//! recategorization, rule governance, account management, audit reports and
//! backups, all over the shared MCP framework.

mod account_tools;
mod report_tools;
mod rule_tools;
mod supplier_tools;
mod transactions;

pub use transactions::TransactionView;

use std::sync::Arc;

use crate::config::Settings;
use crate::error::Result;
use crate::mcp::{McpServer, PromptDef, PromptMessage, ResourceDef, ToolRegistry};
use crate::servers::SharedStores;

/// Shown to clients on `initialize`.
const SERVER_INSTRUCTIONS: &str = r#"Double-entry bookkeeping tools for an AI bookkeeper.

## Ground rules

- Bank accounts live in codes 001-099. They are immutable: never the target
  of a categorization, a rule, or add_account.
- Account 999 is the Uncategorized placeholder. Freshly imported entries sit
  there until update_transaction_account moves them.
- Transaction IDs have the form yyyy-MM-dd_<description>_<amount>_<bankCode>.
- Amounts are positive two-decimal numbers; direction comes from the debit or
  credit side an amount sits on, never from a sign.
- GST-applicable accounts are split automatically: gross * 0.1 / 1.1 goes to
  the GST clearing account and the remainder to the target account.

## Typical categorization flow

1. search_transactions_by_account with accountCode 999
2. match_supplier_fuzzy on each description
3. list_accounting_rules for standing guidance
4. update_transaction_account with the chosen code and a justification note

Destructive operations (delete_supplier, delete_accounting_rule) require
confirm: true."#;

/// Builds the Accountant server over the shared stores.
pub fn build_server(stores: SharedStores, settings: Arc<Settings>) -> McpServer {
    let mut tools = ToolRegistry::new();
    transactions::register(&mut tools, Arc::clone(&stores), Arc::clone(&settings));
    supplier_tools::register(&mut tools, Arc::clone(&stores), Arc::clone(&settings));
    rule_tools::register(&mut tools, Arc::clone(&stores), Arc::clone(&settings));
    account_tools::register(&mut tools, Arc::clone(&stores), Arc::clone(&settings));
    report_tools::register(&mut tools, Arc::clone(&stores), Arc::clone(&settings));

    let mut server = McpServer::new("accountant", env!("CARGO_PKG_VERSION"))
        .with_instructions(SERVER_INSTRUCTIONS);
    server.tools = tools;

    let chart_stores = Arc::clone(&stores);
    server.resources.register(ResourceDef {
        uri: "bookkeeping://chart-of-accounts".to_string(),
        name: "Chart of accounts with codes, types and GST treatment".to_string(),
        producer: Arc::new(move || chart_listing(&chart_stores)),
    });

    server.prompts.register(PromptDef {
        name: "categorize_transactions".to_string(),
        description: "Workflow prompt for categorizing uncategorized entries".to_string(),
        producer: Arc::new(|_arguments| {
            Ok(vec![PromptMessage {
                role: "user".to_string(),
                content: "Fetch the uncategorized transactions (account 999), consult the \
                          supplier registry and accounting rules, then recategorize each one \
                          with update_transaction_account, citing the rule or supplier that \
                          justified the choice."
                    .to_string(),
            }])
        }),
    });

    server
}

fn chart_listing(stores: &SharedStores) -> Result<String> {
    // Resource producers are synchronous; reads are short and writers never
    // hold the lock across a resources/read, so try_read suffices.
    let stores = stores.try_read().map_err(|_| {
        crate::error::LedgerError::Timeout("chart of accounts is busy; retry".to_string())
    })?;
    let mut out = String::from("CODE  TYPE              GST  NAME\n");
    for account in stores.chart.get_all_accounts() {
        out.push_str(&format!(
            "{:<5} {:<17} {:<4} {}\n",
            account.code,
            format!("{:?}", account.account_type),
            if account.gst_applicable { "yes" } else { "no" },
            account.name
        ));
    }
    Ok(out)
}
