use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::chart_of_accounts::ChartOfAccounts;
use crate::journal::GeneralJournal;
use crate::schema::{format_amount, Account, Side};

use super::{header_band, rule, sort_account_rows, truncate, verification_block, SortOrder};

/// Trial balance as of a date. Each account's natural balance lands in the
/// debit or credit column per its type; the totals row and verification
/// block close the report.
pub fn generate_trial_balance(
    journal: &GeneralJournal,
    chart: &ChartOfAccounts,
    as_of: NaiveDate,
    include_zero_balances: bool,
    group_by_type: bool,
    sort_by: SortOrder,
) -> String {
    let mut out = header_band(
        "TRIAL BALANCE AUDIT",
        &format!("As of {}", as_of.format("%Y-%m-%d")),
    );
    out.push_str(&format!("{:<5} {:<40} {:>15} {:>15}\n", "CODE", "ACCOUNT", "DEBIT", "CREDIT"));
    out.push_str(&rule());

    let mut rows: Vec<(Account, Decimal)> = chart
        .get_all_accounts()
        .into_iter()
        .map(|a| {
            let balance = journal.calculate_account_balance(chart, &a.code, Some(as_of));
            (a.clone(), balance)
        })
        .filter(|(_, balance)| include_zero_balances || !balance.is_zero())
        .collect();
    sort_account_rows(
        &mut rows,
        if group_by_type { SortOrder::AccountType } else { sort_by },
    );

    let mut debit_total = Decimal::ZERO;
    let mut credit_total = Decimal::ZERO;
    let mut current_group: Option<String> = None;
    for (account, balance) in &rows {
        if group_by_type {
            let group = format!("{:?}", account.account_type);
            if current_group.as_deref() != Some(group.as_str()) {
                out.push_str(&format!("[{}]\n", group));
                current_group = Some(group);
            }
        }
        let (debit, credit) = match account.account_type.natural_balance() {
            Side::Debit => {
                debit_total += *balance;
                (format_amount(*balance), String::new())
            }
            Side::Credit => {
                credit_total += *balance;
                (String::new(), format_amount(*balance))
            }
        };
        out.push_str(&format!(
            "{:<5} {:<40} {:>15} {:>15}\n",
            account.code,
            truncate(&account.name, 40),
            debit,
            credit
        ));
    }

    out.push_str(&rule());
    out.push_str(&format!(
        "{:<5} {:<40} {:>15} {:>15}\n",
        "",
        "TOTALS",
        format_amount(debit_total),
        format_amount(credit_total)
    ));
    out.push('\n');
    out.push_str(&verification_block(debit_total - credit_total));
    out
}
