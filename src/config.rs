use std::env;
use std::path::PathBuf;

use crate::schema::DEFAULT_GST_CLEARING_CODE;

/// Process-wide configuration. Tool servers take no positional arguments;
/// everything is read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Unified company file. When set, persistence uses the single-document
    /// layout instead of the legacy four-file layout.
    pub company_file: Option<PathBuf>,
    pub inputs_dir: PathBuf,
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub gst_clearing_code: String,
    /// Terminal server policy.
    pub terminal_root: PathBuf,
    pub terminal_timeout_secs: u64,
    pub terminal_output_cap: usize,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            company_file: env::var("AI_ACCOUNTING_COMPANY_FILE").ok().map(PathBuf::from),
            inputs_dir: dir_var("AI_ACCOUNTING_INPUTS_DIR", "inputs"),
            data_dir: dir_var("AI_ACCOUNTING_DATA_DIR", "data"),
            config_dir: dir_var("AI_ACCOUNTING_CONFIG_DIR", "config"),
            backup_dir: dir_var("AI_ACCOUNTING_BACKUP_DIR", "backups"),
            gst_clearing_code: env::var("GST_CLEARING_ACCOUNT_CODE")
                .unwrap_or_else(|_| DEFAULT_GST_CLEARING_CODE.to_string()),
            terminal_root: dir_var("TERMINAL_ROOT_DIR", "."),
            terminal_timeout_secs: num_var("TERMINAL_TIMEOUT_SECS", 30),
            terminal_output_cap: num_var("TERMINAL_OUTPUT_CAP", 64 * 1024) as usize,
        }
    }

    pub fn accounts_path(&self) -> PathBuf {
        self.inputs_dir.join("accounts.json")
    }

    pub fn suppliers_path(&self) -> PathBuf {
        self.inputs_dir.join("supplier_list.json")
    }

    pub fn rules_path(&self) -> PathBuf {
        self.inputs_dir.join("accounting_rules.txt")
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join("general_journal.json")
    }

    pub fn server_registry_path(&self) -> PathBuf {
        self.config_dir.join("mcp_servers.json")
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}

fn dir_var(name: &str, default: &str) -> PathBuf {
    env::var(name).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}

fn num_var(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
