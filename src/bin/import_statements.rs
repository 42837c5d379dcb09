//! Imports every bank-statement CSV found in the inputs directory. Files
//! are matched by name: a three digit bank-code stem with a `.csv`
//! extension, e.g. `inputs/001.csv`.

use ai_bookkeeper::company_file::LedgerStores;
use ai_bookkeeper::config::Settings;
use ai_bookkeeper::import::import_csv;
use ai_bookkeeper::schema::is_bank_code;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let settings = Settings::from_env();
    let mut stores = match LedgerStores::open(&settings) {
        Ok(stores) => stores,
        Err(err) => {
            log::error!("failed to open ledger stores: {}", err);
            std::process::exit(1);
        }
    };

    let entries = match std::fs::read_dir(&settings.inputs_dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::error!(
                "cannot read inputs directory {}: {}",
                settings.inputs_dir.display(),
                err
            );
            std::process::exit(1);
        }
    };

    let mut failures = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_statement = path.extension().and_then(|e| e.to_str()) == Some("csv")
            && path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(is_bank_code)
                .unwrap_or(false);
        if !is_statement {
            continue;
        }
        match import_csv(&path, None, &mut stores.journal, true) {
            Ok(summary) => log::info!(
                "{}: {} added, {} duplicates, {} skipped",
                summary.file,
                summary.added,
                summary.deduplicated,
                summary.skipped
            ),
            Err(err) => {
                log::error!("{}: import failed: {}", path.display(), err);
                failures += 1;
            }
        }
    }

    if let Err(err) = stores.sync_company_file(&settings) {
        log::error!("failed to sync company file: {}", err);
        failures += 1;
    }
    if failures > 0 {
        std::process::exit(1);
    }
}
