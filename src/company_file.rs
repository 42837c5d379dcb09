use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::chart_of_accounts::ChartOfAccounts;
use crate::config::Settings;
use crate::error::Result;
use crate::journal::GeneralJournal;
use crate::persist::write_atomic;
use crate::rules::AccountingRulesStore;
use crate::schema::{
    Account, AccountType, CompanyProfile, GstTreatment, JournalEntry, Supplier,
    UNCATEGORIZED_CODE,
};
use crate::suppliers::SupplierRegistry;

/// The unified company document. The section payloads are exactly what the
/// legacy four-file layout persists, so the two layouts stay bit-exact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyFile {
    pub profile: CompanyProfile,
    pub accounts: Vec<Account>,
    pub journal: Vec<JournalEntry>,
    pub suppliers: Vec<Supplier>,
    /// The rules file verbatim, block format included.
    pub rules: String,
}

impl CompanyFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        write_atomic(path, &json)
    }
}

/// Every domain store the Accountant server needs, opened from either the
/// unified company file or the legacy directory layout.
pub struct LedgerStores {
    pub profile: CompanyProfile,
    pub chart: ChartOfAccounts,
    pub journal: GeneralJournal,
    pub suppliers: SupplierRegistry,
    pub rules: AccountingRulesStore,
}

impl LedgerStores {
    /// Opens the stores. When `AI_ACCOUNTING_COMPANY_FILE` points at an
    /// existing document its sections are unpacked over the legacy files
    /// first, so the per-store load/save paths keep working unchanged.
    pub fn open(settings: &Settings) -> Result<Self> {
        if let Some(company_path) = &settings.company_file {
            if company_path.exists() {
                let company = CompanyFile::load(company_path)?;
                info!("opening stores from company file {}", company_path.display());
                unpack_to_legacy(&company, settings)?;
            }
        }

        let chart = ChartOfAccounts::load(&settings.accounts_path())?;
        let journal = GeneralJournal::load_entries(
            &settings.journal_path(),
            &settings.backup_dir,
            None,
        )?;
        let suppliers = SupplierRegistry::load(&settings.suppliers_path())?;
        let rules = AccountingRulesStore::load(&settings.rules_path())?;
        let profile = load_profile(settings);

        let mut stores = Self {
            profile,
            chart,
            journal,
            suppliers,
            rules,
        };
        stores.bootstrap_chart(settings)?;
        Ok(stores)
    }

    /// Seeds the accounts every run depends on: the Uncategorized account and
    /// the configured GST clearing account. Bank accounts are never invented.
    fn bootstrap_chart(&mut self, settings: &Settings) -> Result<()> {
        let mut seeded = false;
        if self.chart.get_account(UNCATEGORIZED_CODE).is_none() {
            self.chart.add_account_bootstrap(Account {
                code: UNCATEGORIZED_CODE.to_string(),
                name: "Uncategorized".to_string(),
                account_type: AccountType::Expense,
                gst_applicable: false,
                gst_treatment: GstTreatment::BasExcluded,
            })?;
            seeded = true;
        }
        if self.chart.get_account(&settings.gst_clearing_code).is_none() {
            self.chart.add_account_bootstrap(Account {
                code: settings.gst_clearing_code.clone(),
                name: "GST Clearing".to_string(),
                account_type: AccountType::CurrentAsset,
                gst_applicable: false,
                gst_treatment: GstTreatment::BasExcluded,
            })?;
            seeded = true;
        }
        if seeded {
            self.chart.save()?;
        }
        Ok(())
    }

    /// Assembles the unified document from the live stores.
    pub fn to_company_file(&self) -> CompanyFile {
        CompanyFile {
            profile: self.profile.clone(),
            accounts: self.chart.get_all_accounts().into_iter().cloned().collect(),
            journal: self.journal.get_all_entries().to_vec(),
            suppliers: self.suppliers.all().to_vec(),
            rules: self.rules.to_text(),
        }
    }

    /// Writes the unified document when one is configured. Called after any
    /// store save so both layouts stay in step.
    pub fn sync_company_file(&self, settings: &Settings) -> Result<()> {
        if let Some(path) = &settings.company_file {
            self.to_company_file().save(path)?;
        }
        Ok(())
    }
}

fn unpack_to_legacy(company: &CompanyFile, settings: &Settings) -> Result<()> {
    write_atomic(
        &settings.accounts_path(),
        &serde_json::to_string_pretty(&company.accounts)?,
    )?;
    write_atomic(
        &settings.journal_path(),
        &serde_json::to_string_pretty(&company.journal)?,
    )?;
    write_atomic(&settings.suppliers_path(), &{
        let mut s = serde_json::to_string_pretty(&company.suppliers)?;
        s.push('\n');
        s
    })?;
    write_atomic(&settings.rules_path(), &company.rules)?;
    Ok(())
}

fn load_profile(settings: &Settings) -> CompanyProfile {
    let path = settings.config_dir.join("company_profile.json");
    if let Ok(raw) = std::fs::read_to_string(&path) {
        if let Ok(profile) = serde_json::from_str(&raw) {
            return profile;
        }
    }
    CompanyProfile {
        name: "Company".to_string(),
        abn: None,
    }
}
