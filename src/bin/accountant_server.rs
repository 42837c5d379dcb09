use std::sync::Arc;

use ai_bookkeeper::company_file::LedgerStores;
use ai_bookkeeper::config::Settings;
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

    let server = accountant::build_server(stores, settings);
    if let Err(err) = server.run_stdio().await {
        log::error!("accountant server failed: {}", err);
        std::process::exit(1);
    }
}
