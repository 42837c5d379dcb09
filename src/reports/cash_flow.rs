use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::chart_of_accounts::ChartOfAccounts;
use crate::journal::GeneralJournal;
use crate::schema::{format_amount, is_bank_code, Side};

use super::{header_band, rule, total_row, truncate};

/// Cash flow over a period: per bank account, opening and closing balances
/// with each period transaction and a running balance.
pub fn generate_cash_flow(
    journal: &GeneralJournal,
    chart: &ChartOfAccounts,
    start: NaiveDate,
    end: NaiveDate,
    cash_account_codes: Option<&[String]>,
) -> String {
    let mut out = header_band(
        "CASH FLOW AUDIT",
        &format!("{} to {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d")),
    );

    let codes: Vec<String> = match cash_account_codes {
        Some(codes) => codes.to_vec(),
        None => chart
            .get_all_accounts()
            .into_iter()
            .filter(|a| is_bank_code(&a.code))
            .map(|a| a.code.clone())
            .collect(),
    };

    for code in &codes {
        let name = chart
            .get_account(code)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "Unknown account".to_string());
        out.push_str(&format!("BANK ACCOUNT {} — {}\n", code, name));
        out.push_str(&rule());

        let opening = match start.pred_opt() {
            Some(day_before) => journal.calculate_account_balance(chart, code, Some(day_before)),
            None => Decimal::ZERO,
        };
        out.push_str(&total_row("Opening balance", opening));

        let mut running = opening;
        for entry in journal.get_all_entries() {
            if entry.date < start || entry.date > end {
                continue;
            }
            if entry.bank_code() != Some(code.as_str()) {
                continue;
            }
            let amount = entry.amount().unwrap_or_default();
            // Natural-debit movement: inflows positive, outflows negative.
            let signed = match entry.bank_side() {
                Some(Side::Debit) => amount,
                _ => -amount,
            };
            running += signed;
            out.push_str(&format!(
                "{:<12} {:<34} {:>14} {:>15}\n",
                entry.date.format("%Y-%m-%d"),
                truncate(&entry.description, 34),
                format_amount(signed),
                format_amount(running)
            ));
        }
        out.push_str(&rule());
        out.push_str(&total_row("Closing balance", running));
        out.push_str(&total_row("Net movement", running - opening));
        out.push('\n');
    }
    out
}
