use log::{info, warn};
use serde_json::Value;

use crate::error::{LedgerError, Result};
use crate::mcp::{Content, ToolRegistry};
use crate::schema::{is_bank_code, UNCATEGORIZED_CODE};
use crate::servers::SharedStores;

use super::client::ChatEndpoint;
use super::prompts::SYSTEM_PROMPT_CATEGORIZER;
use super::types::{BatchItem, CategorizationResponse};

const BATCH_SIZE: usize = 10;

/// Outcome of one categorization run.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizationSummary {
    pub uncategorized: usize,
    pub batches: usize,
    pub applied: usize,
    pub failed: usize,
}

/// Drives the LLM/tool loop over account-999 entries. The orchestrator never
/// mutates the journal itself: reads go through the Accountant's search
/// tools and every write goes through `update_transaction_account`, so each
/// model suggestion is revalidated like any other caller's input.
pub struct CategorizationOrchestrator<'a, C: ChatEndpoint> {
    endpoint: &'a C,
    tools: &'a ToolRegistry,
    stores: SharedStores,
}

impl<'a, C: ChatEndpoint> CategorizationOrchestrator<'a, C> {
    pub fn new(endpoint: &'a C, tools: &'a ToolRegistry, stores: SharedStores) -> Self {
        Self {
            endpoint,
            tools,
            stores,
        }
    }

    pub async fn run(&self) -> Result<CategorizationSummary> {
        let items = self.load_uncategorized().await?;
        let mut summary = CategorizationSummary {
            uncategorized: items.len(),
            ..Default::default()
        };
        info!("categorizing {} uncategorized transactions", items.len());

        for batch in items.chunks(BATCH_SIZE) {
            summary.batches += 1;
            // The stores may have changed since the previous batch; refresh
            // the context the model sees every time.
            let context = self.build_context().await?;
            let user = self.render_batch(batch, &context)?;
            let schema = serde_json::to_value(schemars::schema_for!(CategorizationResponse))?;

            let raw = match self.endpoint.complete(SYSTEM_PROMPT_CATEGORIZER, &user, schema).await {
                Ok(raw) => raw,
                Err(err) => {
                    warn!("batch {} failed at the chat endpoint: {}", summary.batches, err);
                    summary.failed += batch.len();
                    continue;
                }
            };
            let parsed: CategorizationResponse = match serde_json::from_str(&raw) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!("batch {} returned malformed JSON: {}", summary.batches, err);
                    summary.failed += batch.len();
                    continue;
                }
            };

            for suggestion in parsed.classifications {
                if suggestion.account_code == UNCATEGORIZED_CODE {
                    continue;
                }
                let arguments = serde_json::json!({
                    "transactionId": suggestion.transaction_id,
                    "newAccountCode": suggestion.account_code,
                    "notes": suggestion.justification,
                });
                match self.tools.call("update_transaction_account", arguments).await {
                    Some(output) if !output.is_error => summary.applied += 1,
                    Some(output) => {
                        summary.failed += 1;
                        if let Some(Content::Text { text }) = output.content.first() {
                            warn!(
                                "suggestion for {} rejected: {}",
                                suggestion.transaction_id, text
                            );
                        }
                    }
                    None => {
                        return Err(LedgerError::NotFound(
                            "update_transaction_account is not registered".to_string(),
                        ))
                    }
                }
            }
        }

        info!(
            "categorization done: {} applied, {} failed of {}",
            summary.applied, summary.failed, summary.uncategorized
        );
        Ok(summary)
    }

    /// Reads the 999 entries through the Accountant's own search tool.
    async fn load_uncategorized(&self) -> Result<Vec<BatchItem>> {
        let arguments = serde_json::json!({
            "accountCode": UNCATEGORIZED_CODE,
            "limit": 1_000_000,
        });
        let output = self
            .tools
            .call("search_transactions_by_account", arguments)
            .await
            .ok_or_else(|| {
                LedgerError::NotFound("search_transactions_by_account is not registered".to_string())
            })?;
        if output.is_error {
            return Err(LedgerError::Validation(
                "search_transactions_by_account failed".to_string(),
            ));
        }
        let Some(Content::Text { text }) = output.content.first() else {
            return Ok(Vec::new());
        };
        let payload: Value = serde_json::from_str(text)?;
        let mut items = Vec::new();
        for view in payload["transactions"].as_array().into_iter().flatten() {
            match batch_item_from_view(view) {
                Some(item) => items.push(item),
                None => warn!("skipping malformed transaction view: {}", view),
            }
        }
        Ok(items)
    }

    async fn build_context(&self) -> Result<String> {
        let suppliers = self.call_listing("list_suppliers").await?;
        let rules = self.call_listing("list_accounting_rules").await?;
        let stores = self.stores.read().await;
        let accounts: Vec<Value> = stores
            .chart
            .get_all_accounts()
            .into_iter()
            .map(|a| {
                serde_json::json!({
                    "code": a.code,
                    "name": a.name,
                    "type": a.account_type,
                    "gstApplicable": a.gst_applicable,
                })
            })
            .collect();
        Ok(serde_json::to_string_pretty(&serde_json::json!({
            "chartOfAccounts": accounts,
            "suppliers": suppliers,
            "accountingRules": rules,
        }))?)
    }

    async fn call_listing(&self, tool: &str) -> Result<Value> {
        let output = self
            .tools
            .call(tool, serde_json::json!({}))
            .await
            .ok_or_else(|| LedgerError::NotFound(format!("{} is not registered", tool)))?;
        if output.is_error {
            return Err(LedgerError::Validation(format!("{} failed", tool)));
        }
        match output.content.first() {
            Some(Content::Text { text }) => Ok(serde_json::from_str(text)?),
            _ => Ok(Value::Null),
        }
    }

    fn render_batch(&self, batch: &[BatchItem], context: &str) -> Result<String> {
        Ok(format!(
            "## CONTEXT\n{}\n\n## TRANSACTIONS TO CATEGORIZE\n{}",
            context,
            serde_json::to_string_pretty(batch)?
        ))
    }
}

fn batch_item_from_view(view: &Value) -> Option<BatchItem> {
    let transaction_id = view["transactionId"].as_str()?.to_string();
    let date = view["date"].as_str()?.parse().ok()?;
    let description = view["description"].as_str()?.to_string();
    // The bank leg carries the amount; its side gives the direction.
    let bank_in = |side: &str| -> Option<(String, bool)> {
        view[side].as_array()?.iter().find_map(|line| {
            let code = line["accountCode"].as_str()?;
            is_bank_code(code).then(|| (line["amount"].as_str().unwrap_or("0").to_string(), true))
        })
    };
    let (amount, direction) = match bank_in("debits") {
        Some((amount, _)) => (amount, "inflow"),
        None => {
            let (amount, _) = bank_in("credits")?;
            (amount, "outflow")
        }
    };
    Some(BatchItem {
        transaction_id,
        date,
        description,
        amount: amount.parse().ok()?,
        direction: direction.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::company_file::LedgerStores;
    use crate::config::Settings;
    use crate::schema::{Account, AccountType, GstTreatment, JournalEntry, SplitLine};
    use crate::servers::{accountant, shared};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::sync::Mutex;

    /// Scripted endpoint: returns queued responses, capturing requests.
    struct ScriptedEndpoint {
        responses: Mutex<Vec<String>>,
        requests: Mutex<Vec<String>>,
    }

    impl ChatEndpoint for ScriptedEndpoint {
        async fn complete(
            &self,
            _system_prompt: &str,
            user_content: &str,
            _response_schema: serde_json::Value,
        ) -> crate::error::Result<String> {
            self.requests.lock().unwrap().push(user_content.to_string());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(r#"{"classifications": []}"#.to_string())
            } else {
                Ok(responses.remove(0))
            }
        }
    }

    fn fixture(dir: &tempfile::TempDir) -> (SharedStores, Arc<Settings>) {
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
        let mut stores = LedgerStores::open(&settings).unwrap();
        for (code, name, account_type, gst) in [
            ("001", "Business Cheque", AccountType::Bank, false),
            ("200", "Office Supplies", AccountType::Expense, true),
        ] {
            stores
                .chart
                .add_account_bootstrap(Account {
                    code: code.to_string(),
                    name: name.to_string(),
                    account_type,
                    gst_applicable: gst,
                    gst_treatment: GstTreatment::GstOnExpenses,
                })
                .unwrap();
        }
        stores
            .journal
            .add_entry(
                JournalEntry {
                    date: chrono::NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
                    description: "Office Supplies 1".to_string(),
                    debits: vec![SplitLine::new("999", dec!(55.00))],
                    credits: vec![SplitLine::new("001", dec!(55.00))],
                    bank_balance: None,
                    notes: String::new(),
                },
                false,
            )
            .unwrap();
        (shared(stores), Arc::new(settings))
    }

    #[tokio::test]
    async fn test_run_applies_valid_suggestions_through_the_tool_surface() {
        let dir = tempfile::tempdir().unwrap();
        let (stores, settings) = fixture(&dir);
        let server = accountant::build_server(Arc::clone(&stores), settings);
        let endpoint = ScriptedEndpoint {
            responses: Mutex::new(vec![
                r#"{"classifications": [
                    {"transactionId": "2025-01-10_Office Supplies 1_55.00_001",
                     "accountCode": "200",
                     "justification": "stationery supplier"}
                ]}"#
                .to_string(),
            ]),
            requests: Mutex::new(Vec::new()),
        };

        let orchestrator =
            CategorizationOrchestrator::new(&endpoint, &server.tools, Arc::clone(&stores));
        let summary = orchestrator.run().await.unwrap();
        assert_eq!(summary.uncategorized, 1);
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.failed, 0);

        // The entry was recategorized with the GST split.
        let stores = stores.read().await;
        let entry = &stores.journal.get_all_entries()[0];
        assert_eq!(entry.debits[0].account_code, "200");
        assert_eq!(entry.debits[0].amount, dec!(50.00));
        assert!(entry.notes.contains("stationery supplier"));

        // The batch context included chart, suppliers and rules.
        let requests = endpoint.requests.lock().unwrap();
        assert!(requests[0].contains("chartOfAccounts"));
        assert!(requests[0].contains("suppliers"));
        assert!(requests[0].contains("accountingRules"));
    }

    #[tokio::test]
    async fn test_invalid_suggestions_are_logged_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (stores, settings) = fixture(&dir);
        let server = accountant::build_server(Arc::clone(&stores), settings);
        let endpoint = ScriptedEndpoint {
            responses: Mutex::new(vec![
                // Unknown id, bank-range target, unknown code: all rejected
                // by the tool, none fatal.
                r#"{"classifications": [
                    {"transactionId": "2025-01-10_Ghost_9.99_001", "accountCode": "200", "justification": "x"},
                    {"transactionId": "2025-01-10_Office Supplies 1_55.00_001", "accountCode": "050", "justification": "x"},
                    {"transactionId": "2025-01-10_Office Supplies 1_55.00_001", "accountCode": "777", "justification": "x"}
                ]}"#
                .to_string(),
            ]),
            requests: Mutex::new(Vec::new()),
        };

        let orchestrator =
            CategorizationOrchestrator::new(&endpoint, &server.tools, Arc::clone(&stores));
        let summary = orchestrator.run().await.unwrap();
        assert_eq!(summary.applied, 0);
        assert_eq!(summary.failed, 3);

        // The journal is untouched.
        let stores = stores.read().await;
        assert_eq!(
            stores.journal.get_all_entries()[0].debits[0].account_code,
            "999"
        );
    }

    #[tokio::test]
    async fn test_malformed_model_json_fails_the_batch_only() {
        let dir = tempfile::tempdir().unwrap();
        let (stores, settings) = fixture(&dir);
        let server = accountant::build_server(Arc::clone(&stores), settings);
        let endpoint = ScriptedEndpoint {
            responses: Mutex::new(vec!["not json at all".to_string()]),
            requests: Mutex::new(Vec::new()),
        };

        let orchestrator =
            CategorizationOrchestrator::new(&endpoint, &server.tools, Arc::clone(&stores));
        let summary = orchestrator.run().await.unwrap();
        assert_eq!(summary.batches, 1);
        assert_eq!(summary.failed, 1);
    }
}
