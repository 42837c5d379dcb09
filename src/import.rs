use std::path::Path;

use chrono::NaiveDate;
use log::{info, warn};
use rust_decimal::Decimal;

use crate::error::{LedgerError, Result};
use crate::journal::GeneralJournal;
use crate::schema::{is_bank_code, round2, JournalEntry, SplitLine, UNCATEGORIZED_CODE};

/// One parsed bank-statement row.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementRow {
    pub date: NaiveDate,
    pub description: String,
    pub debit: Option<Decimal>,
    pub credit: Option<Decimal>,
    pub balance: Option<Decimal>,
}

/// Per-file outcome of an import run.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub file: String,
    pub bank_code: String,
    pub added: usize,
    pub deduplicated: usize,
    pub skipped: usize,
}

/// Synthesizes the uncategorized journal entry for a statement row: the bank
/// leg mirrors the row direction (outflow credits the bank account) and the
/// opposite side lands on account 999. The splitter is not consulted here
/// because 999 is BAS excluded by construction.
pub fn entry_from_statement_row(row: &StatementRow, bank_code: &str) -> Result<JournalEntry> {
    if !is_bank_code(bank_code) {
        return Err(LedgerError::Validation(format!(
            "'{}' is not a bank account code in the range 001-099",
            bank_code
        )));
    }
    let (outflow, amount) = match (row.debit, row.credit) {
        (Some(debit), None) if debit > Decimal::ZERO => (true, debit),
        (None, Some(credit)) if credit > Decimal::ZERO => (false, credit),
        (Some(debit), Some(credit)) if debit > Decimal::ZERO && credit.is_zero() => (true, debit),
        (Some(debit), Some(credit)) if credit > Decimal::ZERO && debit.is_zero() => (false, credit),
        _ => {
            return Err(LedgerError::Validation(format!(
                "row '{}' must have exactly one positive debit or credit",
                row.description
            )))
        }
    };
    let amount = round2(amount);
    let bank_line = vec![SplitLine::new(bank_code, amount)];
    let uncategorized = vec![SplitLine::new(UNCATEGORIZED_CODE, amount)];
    let (debits, credits) = if outflow {
        (uncategorized, bank_line)
    } else {
        (bank_line, uncategorized)
    };
    Ok(JournalEntry {
        date: row.date,
        description: row.description.trim().to_string(),
        debits,
        credits,
        bank_balance: row.balance.map(round2),
        notes: String::new(),
    })
}

/// Imports one bank-statement CSV. The bank account code comes from the file
/// stem (`001.csv`) unless overridden. Rows already present in the journal
/// count as deduplicated; unparseable rows are skipped with a warning.
pub fn import_csv(
    path: &Path,
    bank_code_override: Option<&str>,
    journal: &mut GeneralJournal,
    persist: bool,
) -> Result<ImportSummary> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let bank_code = bank_code_override.unwrap_or(&stem).to_string();
    if !is_bank_code(&bank_code) {
        return Err(LedgerError::Validation(format!(
            "cannot derive a bank account code from '{}'; pass an explicit code",
            path.display()
        )));
    }

    let mut summary = ImportSummary {
        file: path.display().to_string(),
        bank_code: bank_code.clone(),
        added: 0,
        deduplicated: 0,
        skipped: 0,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    for (index, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!("{}: skipping row {}: {}", path.display(), index + 1, err);
                summary.skipped += 1;
                continue;
            }
        };
        if index == 0 && looks_like_header(&record) {
            continue;
        }
        let row = match parse_record(&record) {
            Ok(row) => row,
            Err(err) => {
                warn!("{}: skipping row {}: {}", path.display(), index + 1, err);
                summary.skipped += 1;
                continue;
            }
        };
        let entry = entry_from_statement_row(&row, &bank_code)?;
        if journal.add_entry(entry, false)? {
            summary.added += 1;
        } else {
            summary.deduplicated += 1;
        }
    }

    if persist && summary.added > 0 {
        journal.save_entries()?;
    }
    info!(
        "{}: imported {} rows, {} duplicates, {} skipped",
        path.display(),
        summary.added,
        summary.deduplicated,
        summary.skipped
    );
    Ok(summary)
}

fn looks_like_header(record: &csv::StringRecord) -> bool {
    record
        .get(0)
        .map(|f| f.trim().eq_ignore_ascii_case("date"))
        .unwrap_or(false)
}

fn parse_record(record: &csv::StringRecord) -> Result<StatementRow> {
    if record.len() < 4 {
        return Err(LedgerError::Validation(format!(
            "expected at least 4 columns (date, description, debit, credit), got {}",
            record.len()
        )));
    }
    let date = parse_date(record.get(0).unwrap_or_default())?;
    let description = record.get(1).unwrap_or_default().trim().to_string();
    if description.is_empty() {
        return Err(LedgerError::Validation("description column is empty".to_string()));
    }
    Ok(StatementRow {
        date,
        description,
        debit: parse_amount(record.get(2).unwrap_or_default())?,
        credit: parse_amount(record.get(3).unwrap_or_default())?,
        balance: parse_amount(record.get(4).unwrap_or_default())?,
    })
}

fn parse_date(field: &str) -> Result<NaiveDate> {
    let field = field.trim();
    NaiveDate::parse_from_str(field, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(field, "%d/%m/%Y"))
        .map_err(|_| {
            LedgerError::Validation(format!(
                "date '{}' is neither YYYY-MM-DD nor DD/MM/YYYY",
                field
            ))
        })
}

fn parse_amount(field: &str) -> Result<Option<Decimal>> {
    let cleaned: String = field
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ','))
        .collect();
    if cleaned.is_empty() {
        return Ok(None);
    }
    cleaned
        .parse::<Decimal>()
        .map(Some)
        .map_err(|_| LedgerError::Validation(format!("amount '{}' is not a number", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn write_statement(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    fn journal(dir: &tempfile::TempDir) -> GeneralJournal {
        GeneralJournal::new(
            dir.path().join("general_journal.json"),
            dir.path().join("backups"),
        )
    }

    #[test]
    fn test_outflow_debits_uncategorized() {
        let row = StatementRow {
            date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            description: "Office Supplies 1".to_string(),
            debit: Some(dec!(55.00)),
            credit: None,
            balance: Some(dec!(945.00)),
        };
        let entry = entry_from_statement_row(&row, "001").unwrap();
        assert_eq!(entry.debits[0].account_code, "999");
        assert_eq!(entry.credits[0].account_code, "001");
        assert_eq!(entry.amount(), Some(dec!(55.00)));
        assert_eq!(entry.bank_balance, Some(dec!(945.00)));
        entry.validate().unwrap();
    }

    #[test]
    fn test_inflow_credits_uncategorized() {
        let row = StatementRow {
            date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            description: "Client Payment".to_string(),
            debit: None,
            credit: Some(dec!(250.00)),
            balance: None,
        };
        let entry = entry_from_statement_row(&row, "001").unwrap();
        assert_eq!(entry.debits[0].account_code, "001");
        assert_eq!(entry.credits[0].account_code, "999");
    }

    #[test]
    fn test_import_counts_and_idempotence() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = write_statement(
            &dir,
            "001.csv",
            "Date,Description,Debit,Credit,Balance\n\
             2025-01-10,Office Supplies 1,55.00,,945.00\n\
             2025-01-11,Office Supplies 2,55.00,,890.00\n",
        );
        let mut journal = journal(&dir);

        let first = import_csv(&csv_path, None, &mut journal, false).unwrap();
        assert_eq!(first.bank_code, "001");
        assert_eq!(first.added, 2);
        assert_eq!(first.deduplicated, 0);

        // Importing the same statement twice changes nothing.
        let second = import_csv(&csv_path, None, &mut journal, false).unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.deduplicated, 2);
        assert_eq!(journal.len(), 2);
    }

    #[test]
    fn test_bad_rows_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = write_statement(
            &dir,
            "002.csv",
            "2025-01-10,Coffee,4.50,,100.00\n\
             not-a-date,Broken,1.00,,\n\
             11/01/2025,Eftpos Lunch,,20.00,120.00\n",
        );
        let mut journal = journal(&dir);
        let summary = import_csv(&csv_path, None, &mut journal, false).unwrap();
        assert_eq!(summary.added, 2);
        assert_eq!(summary.skipped, 1);
        // The slash-format date parsed day-first.
        assert_eq!(
            journal.get_all_entries()[1].date,
            NaiveDate::from_ymd_opt(2025, 1, 11).unwrap()
        );
    }

    #[test]
    fn test_filename_must_be_bank_code() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = write_statement(&dir, "statement.csv", "2025-01-10,Coffee,4.50,,\n");
        let mut journal = journal(&dir);
        assert!(import_csv(&csv_path, None, &mut journal, false).is_err());
        // An explicit override fixes it.
        let summary = import_csv(&csv_path, Some("001"), &mut journal, false).unwrap();
        assert_eq!(summary.added, 1);
    }
}
