//! Runs one categorization pass: every account-999 entry is batched to the
//! chat endpoint and the suggestions are applied back through the
//! Accountant's tool surface.

use std::sync::Arc;

use ai_bookkeeper::company_file::LedgerStores;
use ai_bookkeeper::config::Settings;
use ai_bookkeeper::llm::{CategorizationOrchestrator, ChatClient};
use ai_bookkeeper::servers::{accountant, shared};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let settings = Arc::new(Settings::from_env());
    let stores = match LedgerStores::open(&settings) {
        Ok(stores) => shared(stores),
        Err(err) => {
            log::error!("failed to open ledger stores: {}", err);
            std::process::exit(1);
        }
    };
    let client = match ChatClient::from_env() {
        Ok(client) => client,
        Err(err) => {
            log::error!("{}", err);
            std::process::exit(1);
        }
    };

    let server = accountant::build_server(Arc::clone(&stores), settings);
    let orchestrator = CategorizationOrchestrator::new(&client, &server.tools, stores);
    match orchestrator.run().await {
        Ok(summary) => log::info!(
            "applied {} of {} uncategorized transactions in {} batches ({} failed)",
            summary.applied,
            summary.uncategorized,
            summary.batches,
            summary.failed
        ),
        Err(err) => {
            log::error!("categorization run failed: {}", err);
            std::process::exit(1);
        }
    }
}
