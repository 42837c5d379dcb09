use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{LedgerError, Result};
use crate::persist::write_atomic;
use crate::schema::{is_bank_code, is_valid_code_format, Account, AccountType};

/// Typed catalogue of accounts, keyed by code. Bank codes (001-099) may only
/// be created by the bootstrap loader and are protected from mutation.
#[derive(Debug, Default)]
pub struct ChartOfAccounts {
    accounts: BTreeMap<String, Account>,
    path: Option<PathBuf>,
}

impl ChartOfAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `inputs/accounts.json`. A missing file yields an empty chart so
    /// first runs can bootstrap.
    pub fn load(path: &Path) -> Result<Self> {
        let mut chart = Self {
            accounts: BTreeMap::new(),
            path: Some(path.to_path_buf()),
        };
        if !path.exists() {
            return Ok(chart);
        }
        let raw = std::fs::read_to_string(path)?;
        let parsed: Vec<Account> = serde_json::from_str(&raw)?;
        for account in parsed {
            chart.insert_unchecked(account)?;
        }
        info!("loaded {} accounts from {}", chart.accounts.len(), path.display());
        Ok(chart)
    }

    pub fn save(&self) -> Result<()> {
        let path = self.path.as_ref().ok_or_else(|| {
            LedgerError::Validation("chart of accounts has no backing file".to_string())
        })?;
        write_atomic(path, &self.to_json()?)
    }

    pub fn to_json(&self) -> Result<String> {
        let all: Vec<&Account> = self.accounts.values().collect();
        Ok(serde_json::to_string_pretty(&all)?)
    }

    pub fn get_account(&self, code: &str) -> Option<&Account> {
        self.accounts.get(code)
    }

    pub fn get_accounts_by_type(&self, account_type: AccountType) -> Vec<&Account> {
        self.accounts
            .values()
            .filter(|a| a.account_type == account_type)
            .collect()
    }

    pub fn get_all_accounts(&self) -> Vec<&Account> {
        self.accounts.values().collect()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn is_account_code_available(&self, code: &str) -> bool {
        is_valid_code_format(code) && !self.accounts.contains_key(code)
    }

    /// Scans upward from `starting_from` for a free code. The scan stays
    /// advisory: it stops at 998 and never suggests 999.
    pub fn get_next_available_account_code(&self, starting_from: u32) -> Result<String> {
        let mut candidate = starting_from.max(1);
        while candidate < 999 {
            let code = format!("{:03}", candidate);
            if self.is_account_code_available(&code) {
                return Ok(code);
            }
            candidate += 1;
        }
        Err(LedgerError::Validation(format!(
            "no account code available at or above {:03}",
            starting_from
        )))
    }

    /// Adds an account through the tool surface. The bank range is reserved
    /// for the bootstrap loader.
    pub fn add_account(&mut self, account: Account) -> Result<()> {
        if is_bank_code(&account.code) {
            return Err(LedgerError::Protected(format!(
                "account code {} is in the bank range 001-099 and cannot be created here",
                account.code
            )));
        }
        self.insert_checked(account)
    }

    /// Bootstrap path used when seeding the chart from disk; bank codes are
    /// allowed but all other validation still applies.
    pub fn add_account_bootstrap(&mut self, account: Account) -> Result<()> {
        self.insert_checked(account)
    }

    fn insert_checked(&mut self, account: Account) -> Result<()> {
        if !is_valid_code_format(&account.code) {
            return Err(LedgerError::Validation(format!(
                "account code '{}' must be exactly three digits",
                account.code
            )));
        }
        if is_bank_code(&account.code) && account.account_type != AccountType::Bank {
            return Err(LedgerError::Validation(format!(
                "code {} is in the bank range 001-099 but type is {:?}",
                account.code, account.account_type
            )));
        }
        if self.accounts.contains_key(&account.code) {
            return Err(LedgerError::Conflict(format!(
                "account code {} already exists",
                account.code
            )));
        }
        self.accounts.insert(account.code.clone(), account);
        Ok(())
    }

    fn insert_unchecked(&mut self, account: Account) -> Result<()> {
        if !is_valid_code_format(&account.code) {
            return Err(LedgerError::Validation(format!(
                "account code '{}' in accounts file must be exactly three digits",
                account.code
            )));
        }
        self.accounts.insert(account.code.clone(), account);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::GstTreatment;

    fn account(code: &str, account_type: AccountType) -> Account {
        Account {
            code: code.to_string(),
            name: format!("Account {}", code),
            account_type,
            gst_applicable: false,
            gst_treatment: GstTreatment::BasExcluded,
        }
    }

    #[test]
    fn test_add_and_lookup() {
        let mut chart = ChartOfAccounts::new();
        chart.add_account(account("300", AccountType::Expense)).unwrap();
        assert!(chart.get_account("300").is_some());
        assert_eq!(chart.get_accounts_by_type(AccountType::Expense).len(), 1);
    }

    #[test]
    fn test_bank_range_is_protected() {
        let mut chart = ChartOfAccounts::new();
        let err = chart.add_account(account("050", AccountType::Bank)).unwrap_err();
        assert!(matches!(err, LedgerError::Protected(_)));

        // The bootstrap path may seed bank accounts.
        chart.add_account_bootstrap(account("001", AccountType::Bank)).unwrap();
        assert!(chart.get_account("001").is_some());
    }

    #[test]
    fn test_duplicate_code_is_conflict() {
        let mut chart = ChartOfAccounts::new();
        chart.add_account(account("300", AccountType::Expense)).unwrap();
        let err = chart.add_account(account("300", AccountType::Expense)).unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[test]
    fn test_code_format_enforced() {
        let mut chart = ChartOfAccounts::new();
        let err = chart.add_account(account("30", AccountType::Expense)).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_next_available_code_scans_upward() {
        let mut chart = ChartOfAccounts::new();
        chart.add_account(account("300", AccountType::Expense)).unwrap();
        chart.add_account(account("301", AccountType::Expense)).unwrap();
        assert_eq!(chart.get_next_available_account_code(300).unwrap(), "302");
        assert_eq!(chart.get_next_available_account_code(100).unwrap(), "100");
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let chart = ChartOfAccounts::load(&dir.path().join("accounts.json")).unwrap();
        assert!(chart.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        let mut chart = ChartOfAccounts::load(&path).unwrap();
        chart.add_account(account("300", AccountType::Expense)).unwrap();
        chart.save().unwrap();

        let reloaded = ChartOfAccounts::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get_account("300").unwrap().name, "Account 300");
    }
}
