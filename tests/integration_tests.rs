use std::io::Write;
use std::sync::Arc;

use ai_bookkeeper::company_file::LedgerStores;
use ai_bookkeeper::config::Settings;
use ai_bookkeeper::import::import_csv;
use ai_bookkeeper::mcp::{Content, McpServer};
use ai_bookkeeper::schema::{Account, AccountType, GstTreatment};
use ai_bookkeeper::servers::{accountant, shared, terminal, SharedStores};
use rust_decimal_macros::dec;

fn settings(dir: &tempfile::TempDir) -> Settings {
    Settings {
        company_file: None,
        inputs_dir: dir.path().join("inputs"),
        data_dir: dir.path().join("data"),
        config_dir: dir.path().join("config"),
        backup_dir: dir.path().join("backups"),
        gst_clearing_code: "506".to_string(),
        terminal_root: dir.path().to_path_buf(),
        terminal_timeout_secs: 5,
        terminal_output_cap: 65536,
    }
}

fn account(code: &str, name: &str, account_type: AccountType, gst: bool) -> Account {
    Account {
        code: code.to_string(),
        name: name.to_string(),
        account_type,
        gst_applicable: gst,
        gst_treatment: if gst {
            GstTreatment::GstOnExpenses
        } else {
            GstTreatment::BasExcluded
        },
    }
}

/// A workspace with bank 001 and a GST-applicable expense account 200; 999
/// and the clearing account 506 come from the bootstrap.
fn open_workspace(dir: &tempfile::TempDir) -> (SharedStores, Arc<Settings>) {
    let settings = settings(dir);
    let mut stores = LedgerStores::open(&settings).unwrap();
    stores
        .chart
        .add_account_bootstrap(account("001", "Business Cheque", AccountType::Bank, false))
        .unwrap();
    stores
        .chart
        .add_account_bootstrap(account("200", "Office Supplies", AccountType::Expense, true))
        .unwrap();
    (shared(stores), Arc::new(settings))
}

async fn call_tool(server: &McpServer, name: &str, args: serde_json::Value) -> (bool, String) {
    let output = server
        .tools
        .call(name, args)
        .await
        .unwrap_or_else(|| panic!("tool {} is not registered", name));
    let text = match output.content.first() {
        Some(Content::Text { text }) => text.clone(),
        other => panic!("expected text content, got {:?}", other),
    };
    (output.is_error, text)
}

#[tokio::test]
async fn test_import_categorize_audit_end_to_end() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (stores, settings) = open_workspace(&dir);

    // Import two $55.00 outflows from the bank statement for account 001.
    std::fs::create_dir_all(dir.path().join("inputs"))?;
    let csv_path = dir.path().join("inputs/001.csv");
    let mut file = std::fs::File::create(&csv_path)?;
    writeln!(file, "Date,Description,Debit,Credit,Balance")?;
    writeln!(file, "2025-01-10,Office Supplies 1,55.00,,945.00")?;
    writeln!(file, "2025-01-11,Office Supplies 2,55.00,,890.00")?;
    drop(file);

    {
        let mut guard = stores.write().await;
        let summary = import_csv(&csv_path, None, &mut guard.journal, true)?;
        assert_eq!(summary.added, 2);
        assert_eq!(summary.deduplicated, 0);

        for entry in guard.journal.get_all_entries() {
            assert_eq!(entry.debits[0].account_code, "999");
            assert_eq!(entry.debits[0].amount, dec!(55.00));
            assert_eq!(entry.credits[0].account_code, "001");
            assert!(entry.bank_balance.is_some());
        }
    }

    let server = accountant::build_server(Arc::clone(&stores), Arc::clone(&settings));

    // Recategorize the first entry: 999 -> 200 with the GST split.
    let (is_error, _) = call_tool(
        &server,
        "update_transaction_account",
        serde_json::json!({
            "transactionId": "2025-01-10_Office Supplies 1_55.00_001",
            "newAccountCode": "200",
        }),
    )
    .await;
    assert!(!is_error);

    {
        let guard = stores.read().await;
        let entry = &guard.journal.get_all_entries()[0];
        assert_eq!(entry.debits[0].account_code, "200");
        assert_eq!(entry.debits[0].amount, dec!(50.00));
        assert_eq!(entry.debits[1].account_code, "506");
        assert_eq!(entry.debits[1].amount, dec!(5.00));
        // The bank credit is unchanged.
        assert_eq!(entry.credits[0].account_code, "001");
        assert_eq!(entry.credits[0].amount, dec!(55.00));
    }

    // The balance sheet shows the bank at -110 and the GST clearing at 5,
    // and verifies balanced.
    let (is_error, balance_sheet) = call_tool(
        &server,
        "generate_balance_sheet_audit",
        serde_json::json!({"asOfDate": "2025-01-31"}),
    )
    .await;
    assert!(!is_error);
    assert!(balance_sheet.contains("-110.00"));
    assert!(balance_sheet.contains("GST Clearing"));
    assert!(balance_sheet.contains('✓'));

    // The trial balance carries the expense legs: 200 at 50, 999 at 55.
    let (is_error, trial_balance) = call_tool(
        &server,
        "generate_trial_balance_audit",
        serde_json::json!({"asOfDate": "2025-01-31"}),
    )
    .await;
    assert!(!is_error);
    assert!(trial_balance.contains("50.00"));
    assert!(trial_balance.contains("55.00"));
    assert!(trial_balance.contains('✓'));
    Ok(())
}

#[tokio::test]
async fn test_duplicate_supplier_create_directs_to_update() {
    let dir = tempfile::tempdir().unwrap();
    let (stores, settings) = open_workspace(&dir);
    let server = accountant::build_server(stores, settings);

    let (is_error, _) = call_tool(
        &server,
        "create_supplier",
        serde_json::json!({"name": "Linkt Brisbane", "supplies": "tolls"}),
    )
    .await;
    assert!(!is_error);

    let (is_error, message) = call_tool(
        &server,
        "create_supplier",
        serde_json::json!({"name": "Sp Linkt", "supplies": "tolls"}),
    )
    .await;
    assert!(is_error);
    assert!(message.starts_with("Conflict:"));
    assert!(message.contains("update_supplier"));
}

#[tokio::test]
async fn test_accounting_rule_cannot_target_bank_range() {
    let dir = tempfile::tempdir().unwrap();
    let (stores, settings) = open_workspace(&dir);
    let server = accountant::build_server(stores, settings);

    let (is_error, message) = call_tool(
        &server,
        "add_accounting_rule",
        serde_json::json!({
            "name": "Sneaky",
            "priority": 5,
            "condition": "anything",
            "action": "categorize",
            "accountCode": "050",
        }),
    )
    .await;
    assert!(is_error);
    assert!(message.starts_with("Protected:"));
    assert!(message.contains("001-099"));
}

#[tokio::test]
async fn test_terminal_blacklist_blocks_rm_before_spawn() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Arc::new(settings(&dir));
    let server = terminal::build_server(settings);

    let (is_error, message) = call_tool(
        &server,
        "execute_terminal_command",
        serde_json::json!({"command": "rm", "arguments": ["-rf", "/"]}),
    )
    .await;
    assert!(is_error);
    assert!(message.starts_with("Blocked:"));
    assert!(message.contains("blocked_keyword: \"rm\""));

    // validate_command applies the same policy without executing.
    let (is_error, verdict) = call_tool(
        &server,
        "validate_command",
        serde_json::json!({"command": "rm", "arguments": ["-rf", "/"]}),
    )
    .await;
    assert!(!is_error);
    let verdict: serde_json::Value = serde_json::from_str(&verdict).unwrap();
    assert_eq!(verdict["allowed"], false);
}

#[tokio::test]
async fn test_fuzzy_match_ranks_github_first() {
    let dir = tempfile::tempdir().unwrap();
    let (stores, settings) = open_workspace(&dir);
    let server = accountant::build_server(stores, settings);

    for (name, supplies) in [("GitHub", "code hosting"), ("Coles", "groceries")] {
        let (is_error, _) = call_tool(
            &server,
            "create_supplier",
            serde_json::json!({"name": name, "supplies": supplies}),
        )
        .await;
        assert!(!is_error);
    }

    let (is_error, result) = call_tool(
        &server,
        "match_supplier_fuzzy",
        serde_json::json!({
            "transactionDescription": "Visa Purchase 04Feb Github.Com",
            "isIncomeTransaction": false,
        }),
    )
    .await;
    assert!(!is_error);
    let result: serde_json::Value = serde_json::from_str(&result).unwrap();
    assert_eq!(result["candidates"][0]["name"], "GitHub");
}

#[tokio::test]
async fn test_regenerate_reports_zips_named_directories() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (stores, settings) = open_workspace(&dir);

    // Both directories exist and carry files by the time we back up.
    std::fs::create_dir_all(dir.path().join("data"))?;
    std::fs::write(dir.path().join("data/general_journal.json"), "[]")?;

    let server = accountant::build_server(stores, settings);
    let (is_error, result) = call_tool(
        &server,
        "regenerate_reports",
        serde_json::json!({
            "reason": "month-end",
            "createZipBackup": true,
            "backupDirectories": [
                dir.path().join("inputs").display().to_string(),
                dir.path().join("data").display().to_string(),
            ],
        }),
    )
    .await;
    assert!(!is_error, "{}", result);
    let result: serde_json::Value = serde_json::from_str(&result)?;

    let archive = result["backup"]["archive"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("backup result has no archive path"))?;
    assert!(archive.contains("backup_"));
    assert!(archive.ends_with(".zip"));
    assert!(result["backup"]["fileCounts"]["inputs"].as_u64().unwrap() >= 1);
    assert!(result["backup"]["fileCounts"]["data"].as_u64().unwrap() >= 1);

    // Every file from both directories is inside the archive.
    let file = std::fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;
    let names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).map(|f| f.name().to_string()))
        .collect::<Result<_, _>>()?;
    assert!(names.iter().any(|n| n == "inputs/accounts.json"));
    assert!(names.iter().any(|n| n == "data/general_journal.json"));
    Ok(())
}

#[tokio::test]
async fn test_full_tool_surface_over_jsonrpc_dispatch() {
    use ai_bookkeeper::mcp::JsonRpcRequest;

    let dir = tempfile::tempdir().unwrap();
    let (stores, settings) = open_workspace(&dir);
    let server = accountant::build_server(stores, settings);

    let init = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(serde_json::json!(1)),
        method: "initialize".to_string(),
        params: None,
    };
    let response = server.dispatch(&init).await.unwrap();
    let result = response.result.unwrap();
    assert_eq!(result["serverInfo"]["name"], "accountant");

    let list = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(serde_json::json!(2)),
        method: "tools/list".to_string(),
        params: None,
    };
    let response = server.dispatch(&list).await.unwrap();
    let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
    assert_eq!(tools, 22);

    let call = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(serde_json::json!(3)),
        method: "tools/call".to_string(),
        params: Some(serde_json::json!({
            "name": "list_suppliers",
            "arguments": {},
        })),
    };
    let response = server.dispatch(&call).await.unwrap();
    let result = response.result.unwrap();
    assert_eq!(result["isError"], false);
}
