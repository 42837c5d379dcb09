use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::chart_of_accounts::ChartOfAccounts;
use crate::journal::GeneralJournal;
use crate::schema::{format_amount, Side};

use super::{header_band, rule, total_row, truncate, SortOrder};

/// Account activity over a period: every entry touching each requested
/// account, with an optional running balance column.
#[allow(clippy::too_many_arguments)]
pub fn generate_account_activity(
    journal: &GeneralJournal,
    chart: &ChartOfAccounts,
    account_codes: &[String],
    start: NaiveDate,
    end: NaiveDate,
    include_running_balance: bool,
    sort_by: SortOrder,
) -> String {
    let mut out = header_band(
        "ACCOUNT ACTIVITY AUDIT",
        &format!("{} to {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d")),
    );

    for code in account_codes {
        let (name, natural) = match chart.get_account(code) {
            Some(account) => (account.name.clone(), account.account_type.natural_balance()),
            None => ("Unknown account".to_string(), Side::Debit),
        };
        out.push_str(&format!("ACCOUNT {} — {}\n", code, name));
        out.push_str(&rule());

        let mut rows: Vec<(NaiveDate, String, Decimal)> = Vec::new();
        for entry in journal.get_all_entries() {
            if entry.date < start || entry.date > end {
                continue;
            }
            let mut movement = Decimal::ZERO;
            for line in &entry.debits {
                if line.account_code == *code {
                    movement += match natural {
                        Side::Debit => line.amount,
                        Side::Credit => -line.amount,
                    };
                }
            }
            for line in &entry.credits {
                if line.account_code == *code {
                    movement += match natural {
                        Side::Debit => -line.amount,
                        Side::Credit => line.amount,
                    };
                }
            }
            if !movement.is_zero() {
                rows.push((entry.date, entry.description.clone(), movement));
            }
        }
        match sort_by {
            SortOrder::Description => rows.sort_by(|a, b| a.1.cmp(&b.1)),
            SortOrder::Amount => rows.sort_by(|a, b| b.2.abs().cmp(&a.2.abs())),
            _ => rows.sort_by(|a, b| a.0.cmp(&b.0)),
        }

        let opening = match start.pred_opt() {
            Some(day_before) => journal.calculate_account_balance(chart, code, Some(day_before)),
            None => Decimal::ZERO,
        };
        let mut running = opening;
        if include_running_balance {
            out.push_str(&total_row("Opening balance", opening));
        }
        let mut period_total = Decimal::ZERO;
        for (date, description, movement) in &rows {
            period_total += *movement;
            if include_running_balance {
                running += *movement;
                out.push_str(&format!(
                    "{:<12} {:<34} {:>14} {:>15}\n",
                    date.format("%Y-%m-%d"),
                    truncate(description, 34),
                    format_amount(*movement),
                    format_amount(running)
                ));
            } else {
                out.push_str(&format!(
                    "{:<12} {:<49} {:>15}\n",
                    date.format("%Y-%m-%d"),
                    truncate(description, 49),
                    format_amount(*movement)
                ));
            }
        }
        out.push_str(&rule());
        out.push_str(&total_row(
            &format!("Period movement ({} txns)", rows.len()),
            period_total,
        ));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Account, AccountType, GstTreatment, JournalEntry, SplitLine};
    use rust_decimal_macros::dec;

    #[test]
    fn test_activity_lists_entries_with_running_balance() {
        let dir = tempfile::tempdir().unwrap();
        let mut chart = ChartOfAccounts::new();
        for (code, account_type) in [("001", AccountType::Bank), ("300", AccountType::Expense)] {
            chart
                .add_account_bootstrap(Account {
                    code: code.to_string(),
                    name: format!("Account {}", code),
                    account_type,
                    gst_applicable: false,
                    gst_treatment: GstTreatment::BasExcluded,
                })
                .unwrap();
        }
        let mut journal = GeneralJournal::new(
            dir.path().join("journal.json"),
            dir.path().join("backups"),
        );
        for (day, amount) in [(10, dec!(100.00)), (12, dec!(50.00))] {
            journal
                .add_entry(
                    JournalEntry {
                        date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
                        description: format!("Rent {}", day),
                        debits: vec![SplitLine::new("300", amount)],
                        credits: vec![SplitLine::new("001", amount)],
                        bank_balance: None,
                        notes: String::new(),
                    },
                    false,
                )
                .unwrap();
        }

        let report = generate_account_activity(
            &journal,
            &chart,
            &["300".to_string()],
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            true,
            SortOrder::Date,
        );
        assert!(report.contains("Rent 10"));
        assert!(report.contains("Rent 12"));
        assert!(report.contains("Period movement (2 txns)"));
        assert!(report.contains("150.00"));
    }
}
