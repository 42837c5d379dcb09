use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::chart_of_accounts::ChartOfAccounts;
use crate::journal::GeneralJournal;
use crate::schema::{Account, AccountType};

use super::{
    account_row, header_band, rule, sort_account_rows, total_row, verification_block, SortOrder,
};

/// Balance sheet as of a date: Assets / Liabilities / Equity groups with an
/// owner-equity plug of `Assets − Liabilities` and a closing verification
/// block.
pub fn generate_balance_sheet(
    journal: &GeneralJournal,
    chart: &ChartOfAccounts,
    as_of: NaiveDate,
    include_zero_balances: bool,
    sort_by: SortOrder,
) -> String {
    let mut out = header_band(
        "BALANCE SHEET AUDIT",
        &format!("As of {}", as_of.format("%Y-%m-%d")),
    );

    let collect = |types: &[AccountType]| -> Vec<(Account, Decimal)> {
        let mut rows: Vec<(Account, Decimal)> = chart
            .get_all_accounts()
            .into_iter()
            .filter(|a| types.contains(&a.account_type))
            .map(|a| {
                let balance = journal.calculate_account_balance(chart, &a.code, Some(as_of));
                (a.clone(), balance)
            })
            .filter(|(_, balance)| include_zero_balances || !balance.is_zero())
            .collect();
        sort_account_rows(&mut rows, sort_by);
        rows
    };

    let assets = collect(&[
        AccountType::Bank,
        AccountType::CurrentAsset,
        AccountType::Inventory,
        AccountType::FixedAsset,
    ]);
    let liabilities = collect(&[AccountType::CurrentLiability]);
    let equity = collect(&[AccountType::Equity]);

    let mut section = |title: &str, rows: &[(Account, Decimal)]| -> Decimal {
        out.push_str(title);
        out.push('\n');
        out.push_str(&rule());
        let mut total = Decimal::ZERO;
        for (account, balance) in rows {
            out.push_str(&account_row(&account.code, &account.name, *balance));
            total += *balance;
        }
        out.push_str(&rule());
        out.push_str(&total_row(&format!("TOTAL {}", title), total));
        out.push('\n');
        total
    };

    let total_assets = section("ASSETS", &assets);
    let total_liabilities = section("LIABILITIES", &liabilities);

    // Listed equity accounts plus the owner-equity plug.
    let listed_equity: Decimal = equity.iter().map(|(_, b)| *b).sum();
    let plug = total_assets - total_liabilities - listed_equity;
    out.push_str("EQUITY\n");
    out.push_str(&rule());
    for (account, balance) in &equity {
        out.push_str(&account_row(&account.code, &account.name, *balance));
    }
    out.push_str(&account_row("", "Owner's Equity (Assets - Liabilities)", plug));
    let total_equity = listed_equity + plug;
    out.push_str(&rule());
    out.push_str(&total_row("TOTAL EQUITY", total_equity));
    out.push('\n');

    let imbalance = total_assets - (total_liabilities + total_equity);
    out.push_str(&verification_block(imbalance));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{GstTreatment, JournalEntry, SplitLine};
    use rust_decimal_macros::dec;

    fn chart() -> ChartOfAccounts {
        let mut chart = ChartOfAccounts::new();
        for (code, name, account_type) in [
            ("001", "Business Cheque", AccountType::Bank),
            ("200", "Office Supplies", AccountType::Expense),
            ("506", "GST Clearing", AccountType::CurrentAsset),
            ("999", "Uncategorized", AccountType::Expense),
        ] {
            chart
                .add_account_bootstrap(Account {
                    code: code.to_string(),
                    name: name.to_string(),
                    account_type,
                    gst_applicable: false,
                    gst_treatment: GstTreatment::BasExcluded,
                })
                .unwrap();
        }
        chart
    }

    #[test]
    fn test_balance_sheet_shows_scenario_balances() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = GeneralJournal::new(
            dir.path().join("journal.json"),
            dir.path().join("backups"),
        );
        journal
            .add_entry(
                JournalEntry {
                    date: chrono::NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
                    description: "Office Supplies 1".to_string(),
                    debits: vec![
                        SplitLine::new("200", dec!(50.00)),
                        SplitLine::new("506", dec!(5.00)),
                    ],
                    credits: vec![SplitLine::new("001", dec!(55.00))],
                    bank_balance: None,
                    notes: String::new(),
                },
                false,
            )
            .unwrap();
        journal
            .add_entry(
                JournalEntry {
                    date: chrono::NaiveDate::from_ymd_opt(2025, 1, 11).unwrap(),
                    description: "Office Supplies 2".to_string(),
                    debits: vec![SplitLine::new("999", dec!(55.00))],
                    credits: vec![SplitLine::new("001", dec!(55.00))],
                    bank_balance: None,
                    notes: String::new(),
                },
                false,
            )
            .unwrap();

        let report = generate_balance_sheet(
            &journal,
            &chart(),
            chrono::NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            true,
            SortOrder::AccountCode,
        );
        assert!(report.contains("-110.00"));
        assert!(report.contains("GST Clearing"));
        assert!(report.contains('✓'));
    }

    #[test]
    fn test_zero_balances_hidden_by_default_flag() {
        let dir = tempfile::tempdir().unwrap();
        let journal = GeneralJournal::new(
            dir.path().join("journal.json"),
            dir.path().join("backups"),
        );
        let report = generate_balance_sheet(
            &journal,
            &chart(),
            chrono::NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            false,
            SortOrder::AccountCode,
        );
        assert!(!report.contains("Business Cheque"));
        assert!(report.contains('✓'));
    }
}
