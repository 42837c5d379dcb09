//! Plaintext audit reports. Every report is a pure function of
//! `(journal, chart, parameters)` and renders a fixed-column layout with a
//! header band, `-` section rules and a verification block.

mod activity;
mod balance_sheet;
mod cash_flow;
mod profit_loss;
mod trial_balance;

pub use activity::generate_account_activity;
pub use balance_sheet::generate_balance_sheet;
pub use cash_flow::generate_cash_flow;
pub use profit_loss::generate_profit_loss;
pub use trial_balance::generate_trial_balance;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::chart_of_accounts::ChartOfAccounts;
use crate::journal::GeneralJournal;
use crate::schema::{format_amount, Account, Side};

/// Caller-selectable sort orders shared across the report tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    AccountCode,
    AccountName,
    Balance,
    Amount,
    AccountType,
    Date,
    Description,
}

pub(crate) const WIDTH: usize = 78;

/// Imbalances at or below this are reported as balanced.
pub(crate) const BALANCE_TOLERANCE: &str = "0.01";

pub(crate) fn balance_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

pub(crate) fn header_band(title: &str, subtitle: &str) -> String {
    let mut out = String::new();
    out.push_str(&"=".repeat(WIDTH));
    out.push('\n');
    out.push_str(&center(title));
    out.push('\n');
    out.push_str(&center(subtitle));
    out.push('\n');
    out.push_str(&"=".repeat(WIDTH));
    out.push('\n');
    out
}

pub(crate) fn rule() -> String {
    format!("{}\n", "-".repeat(WIDTH))
}

fn center(text: &str) -> String {
    if text.len() >= WIDTH {
        return text.to_string();
    }
    let pad = (WIDTH - text.len()) / 2;
    format!("{}{}", " ".repeat(pad), text)
}

/// One account row: code, name, right-aligned amount.
pub(crate) fn account_row(code: &str, name: &str, amount: Decimal) -> String {
    format!("{:<5} {:<56} {:>15}\n", code, truncate(name, 56), format_amount(amount))
}

/// A label/amount row used for totals and derived lines.
pub(crate) fn total_row(label: &str, amount: Decimal) -> String {
    format!("{:<62} {:>15}\n", truncate(label, 62), format_amount(amount))
}

pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

/// The verification band closing every statement-style report.
pub(crate) fn verification_block(imbalance: Decimal) -> String {
    let mut out = String::new();
    out.push_str("VERIFICATION\n");
    out.push_str(&rule());
    let abs = imbalance.abs();
    if abs <= balance_tolerance() {
        out.push_str(&format!(
            "✓ Balanced (absolute imbalance {} within {})\n",
            format_amount(abs),
            BALANCE_TOLERANCE
        ));
    } else {
        out.push_str(&format!(
            "⚠ NOT BALANCED (absolute imbalance {} exceeds {})\n",
            format_amount(abs),
            BALANCE_TOLERANCE
        ));
    }
    out
}

/// Sorts account/balance pairs by the requested order. `Balance` and
/// `Amount` sort by descending absolute value; codes sort numerically.
pub(crate) fn sort_account_rows(rows: &mut [(Account, Decimal)], order: SortOrder) {
    match order {
        SortOrder::AccountName => rows.sort_by(|a, b| a.0.name.cmp(&b.0.name)),
        SortOrder::Balance | SortOrder::Amount => {
            rows.sort_by(|a, b| b.1.abs().cmp(&a.1.abs()))
        }
        SortOrder::AccountType => rows.sort_by(|a, b| {
            format!("{:?}", a.0.account_type)
                .cmp(&format!("{:?}", b.0.account_type))
                .then_with(|| a.0.code.cmp(&b.0.code))
        }),
        _ => rows.sort_by(|a, b| a.0.code.cmp(&b.0.code)),
    }
}

/// Movement of an account over a period in its natural sign, plus the number
/// of journal entries touching it.
pub(crate) fn period_movement(
    journal: &GeneralJournal,
    chart: &ChartOfAccounts,
    code: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> (Decimal, usize) {
    let natural = chart
        .get_account(code)
        .map(|a| a.account_type.natural_balance())
        .unwrap_or(Side::Debit);
    let mut debits = Decimal::ZERO;
    let mut credits = Decimal::ZERO;
    let mut count = 0usize;
    for entry in journal.get_all_entries() {
        if entry.date < start || entry.date > end {
            continue;
        }
        let mut touched = false;
        for line in &entry.debits {
            if line.account_code == code {
                debits += line.amount;
                touched = true;
            }
        }
        for line in &entry.credits {
            if line.account_code == code {
                credits += line.amount;
                touched = true;
            }
        }
        if touched {
            count += 1;
        }
    }
    let movement = match natural {
        Side::Debit => debits - credits,
        Side::Credit => credits - debits,
    };
    (movement, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_verification_block_marks() {
        assert!(verification_block(dec!(0.00)).contains('✓'));
        assert!(verification_block(dec!(0.01)).contains('✓'));
        assert!(verification_block(dec!(-0.02)).contains('⚠'));
    }

    #[test]
    fn test_account_row_is_width_aligned() {
        let row = account_row("200", "Office Supplies", dec!(50.00));
        assert_eq!(row.trim_end().len(), WIDTH);
        assert!(row.ends_with("50.00\n"));
    }
}
