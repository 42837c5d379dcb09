use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use log::{error, info, warn};
use rust_decimal::Decimal;

use crate::chart_of_accounts::ChartOfAccounts;
use crate::error::{LedgerError, Result};
use crate::persist::{snapshot_into, verify_latest_snapshot, write_atomic};
use crate::schema::{JournalEntry, Side, TransactionRef};

/// The general journal: an insertion-ordered sequence of balanced entries
/// with at-most-one entry per bank-transaction identity.
#[derive(Debug)]
pub struct GeneralJournal {
    entries: Vec<JournalEntry>,
    path: PathBuf,
    backup_dir: PathBuf,
}

impl GeneralJournal {
    pub fn new(path: PathBuf, backup_dir: PathBuf) -> Self {
        Self {
            entries: Vec::new(),
            path,
            backup_dir,
        }
    }

    /// Parses the persisted journal. Malformed entries are skipped with a
    /// warning so one bad row never fails a bulk load. Passing a chart turns
    /// on per-entry account validation; `None` skips it for throughput.
    pub fn load_entries(
        path: &Path,
        backup_dir: &Path,
        chart: Option<&ChartOfAccounts>,
    ) -> Result<Self> {
        let mut journal = Self::new(path.to_path_buf(), backup_dir.to_path_buf());
        if !path.exists() {
            return Ok(journal);
        }
        let raw = std::fs::read_to_string(path)?;
        let rows: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
        for (index, row) in rows.into_iter().enumerate() {
            let entry: JournalEntry = match serde_json::from_value(row) {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping journal row {}: {}", index, err);
                    continue;
                }
            };
            if let Err(err) = journal.accept(entry, chart) {
                warn!("skipping journal row {}: {}", index, err);
            }
        }
        info!(
            "loaded {} journal entries from {}",
            journal.entries.len(),
            path.display()
        );
        Ok(journal)
    }

    fn accept(&mut self, entry: JournalEntry, chart: Option<&ChartOfAccounts>) -> Result<()> {
        entry.validate()?;
        if let Some(chart) = chart {
            for line in entry.debits.iter().chain(entry.credits.iter()) {
                if chart.get_account(&line.account_code).is_none() {
                    return Err(LedgerError::Validation(format!(
                        "account {} is not in the chart of accounts",
                        line.account_code
                    )));
                }
            }
        }
        if self.find_same_transaction(&entry).is_some() {
            return Err(LedgerError::Conflict(format!(
                "duplicate bank transaction {}",
                entry.transaction_id().unwrap_or_default()
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Appends an entry. Returns `Ok(false)` without error when an existing
    /// entry is the same bank transaction, making statement re-imports a
    /// no-op. With `persist` the journal is saved after the append.
    pub fn add_entry(&mut self, entry: JournalEntry, persist: bool) -> Result<bool> {
        entry.validate()?;
        if self.find_same_transaction(&entry).is_some() {
            return Ok(false);
        }
        self.entries.push(entry);
        if persist {
            self.save_entries()?;
        }
        Ok(true)
    }

    /// Swaps `old_entry` for `new_entry` in place, matching by
    /// bank-transaction identity.
    pub fn update_entry(&mut self, old_entry: &JournalEntry, new_entry: JournalEntry) -> Result<()> {
        new_entry.validate()?;
        let position = self
            .entries
            .iter()
            .position(|e| e.same_bank_transaction(old_entry))
            .ok_or_else(|| {
                LedgerError::NotFound(format!(
                    "journal entry {} not found",
                    old_entry.transaction_id().unwrap_or_default()
                ))
            })?;
        self.entries[position] = new_entry;
        Ok(())
    }

    /// Deletes by identity. Only the out-of-band cleanup collaborator calls
    /// this; the tool surface never does.
    pub fn remove_entry(&mut self, entry: &JournalEntry) -> Result<()> {
        let position = self
            .entries
            .iter()
            .position(|e| e.same_bank_transaction(entry))
            .ok_or_else(|| {
                LedgerError::NotFound(format!(
                    "journal entry {} not found",
                    entry.transaction_id().unwrap_or_default()
                ))
            })?;
        self.entries.remove(position);
        Ok(())
    }

    pub fn find_same_transaction(&self, entry: &JournalEntry) -> Option<&JournalEntry> {
        self.entries.iter().find(|e| e.same_bank_transaction(entry))
    }

    pub fn find_by_ref(&self, reference: &TransactionRef) -> Option<&JournalEntry> {
        self.entries.iter().find(|e| reference.matches(e))
    }

    pub fn get_all_entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn get_entries_by_account(&self, code: &str) -> Vec<&JournalEntry> {
        self.entries
            .iter()
            .filter(|e| {
                e.debits.iter().chain(e.credits.iter()).any(|l| l.account_code == code)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Account balance as of `as_of` (inclusive), signed so that positive
    /// means the account's natural balance per its type. The single
    /// convention applies uniformly to every report.
    pub fn calculate_account_balance(
        &self,
        chart: &ChartOfAccounts,
        code: &str,
        as_of: Option<NaiveDate>,
    ) -> Decimal {
        let natural = chart
            .get_account(code)
            .map(|a| a.account_type.natural_balance())
            .unwrap_or(Side::Debit);
        let mut debits = Decimal::ZERO;
        let mut credits = Decimal::ZERO;
        for entry in &self.entries {
            if let Some(cutoff) = as_of {
                if entry.date > cutoff {
                    continue;
                }
            }
            for line in &entry.debits {
                if line.account_code == code {
                    debits += line.amount;
                }
            }
            for line in &entry.credits {
                if line.account_code == code {
                    credits += line.amount;
                }
            }
        }
        match natural {
            Side::Debit => debits - credits,
            Side::Credit => credits - debits,
        }
    }

    /// Writes the journal atomically and drops a timestamped snapshot into
    /// the backup directory. If the write fails, the latest snapshot is
    /// verified before the failure is surfaced.
    pub fn save_entries(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        if let Err(err) = write_atomic(&self.path, &json) {
            let stem = self
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("general_journal");
            if verify_latest_snapshot(&self.backup_dir, stem) {
                error!("journal save failed but latest backup verifies: {}", err);
            } else {
                error!("journal save failed and no verified backup exists: {}", err);
            }
            return Err(err);
        }
        snapshot_into(&self.path, &self.backup_dir, Utc::now())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SplitLine;
    use rust_decimal_macros::dec;

    fn entry(day: u32, description: &str) -> JournalEntry {
        JournalEntry {
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            description: description.to_string(),
            debits: vec![SplitLine::new("999", dec!(55.00))],
            credits: vec![SplitLine::new("001", dec!(55.00))],
            bank_balance: None,
            notes: String::new(),
        }
    }

    fn journal(dir: &tempfile::TempDir) -> GeneralJournal {
        GeneralJournal::new(
            dir.path().join("general_journal.json"),
            dir.path().join("backups"),
        )
    }

    #[test]
    fn test_add_is_idempotent_per_identity() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = journal(&dir);
        assert!(journal.add_entry(entry(10, "Office Supplies 1"), false).unwrap());
        assert!(!journal.add_entry(entry(10, "Office Supplies 1"), false).unwrap());
        assert!(journal.add_entry(entry(11, "Office Supplies 1"), false).unwrap());
        assert_eq!(journal.len(), 2);
    }

    #[test]
    fn test_recategorized_entry_still_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = journal(&dir);
        journal.add_entry(entry(10, "Office Supplies 1"), false).unwrap();

        let mut recategorized = entry(10, "Office Supplies 1");
        recategorized.debits = vec![
            SplitLine::new("200", dec!(50.00)),
            SplitLine::new("506", dec!(5.00)),
        ];
        journal
            .update_entry(&entry(10, "Office Supplies 1"), recategorized)
            .unwrap();

        // A re-import of the same statement row is still a no-op.
        assert!(!journal.add_entry(entry(10, "Office Supplies 1"), false).unwrap());
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn test_update_missing_entry_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = journal(&dir);
        let err = journal
            .update_entry(&entry(10, "ghost"), entry(10, "ghost"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = journal(&dir);
        journal.add_entry(entry(10, "Office Supplies 1"), false).unwrap();
        journal.add_entry(entry(11, "Office Supplies 2"), false).unwrap();
        journal.save_entries().unwrap();

        let reloaded = GeneralJournal::load_entries(
            &dir.path().join("general_journal.json"),
            &dir.path().join("backups"),
            None,
        )
        .unwrap();
        assert_eq!(reloaded.get_all_entries(), journal.get_all_entries());

        // The save also produced a timestamped snapshot.
        let backups: Vec<_> = std::fs::read_dir(dir.path().join("backups"))
            .unwrap()
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn test_load_skips_malformed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("general_journal.json");
        let good = serde_json::to_value(entry(10, "good")).unwrap();
        let raw = serde_json::to_string(&vec![
            good,
            serde_json::json!({"date": "not-a-date", "description": 3}),
        ])
        .unwrap();
        std::fs::write(&path, raw).unwrap();

        let journal =
            GeneralJournal::load_entries(&path, &dir.path().join("backups"), None).unwrap();
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn test_balance_uses_natural_side() {
        use crate::schema::{Account, AccountType, GstTreatment};
        let dir = tempfile::tempdir().unwrap();
        let mut chart = ChartOfAccounts::new();
        chart
            .add_account_bootstrap(Account {
                code: "001".to_string(),
                name: "Cheque".to_string(),
                account_type: AccountType::Bank,
                gst_applicable: false,
                gst_treatment: GstTreatment::BasExcluded,
            })
            .unwrap();
        let mut journal = journal(&dir);
        journal.add_entry(entry(10, "Office Supplies 1"), false).unwrap();
        journal.add_entry(entry(11, "Office Supplies 2"), false).unwrap();

        // Two 55.00 outflows: the bank's natural-debit balance is -110.
        assert_eq!(
            journal.calculate_account_balance(&chart, "001", None),
            dec!(-110.00)
        );
        // Cutoff before the second entry.
        assert_eq!(
            journal.calculate_account_balance(
                &chart,
                "001",
                NaiveDate::from_ymd_opt(2025, 1, 10)
            ),
            dec!(-55.00)
        );
    }
}
