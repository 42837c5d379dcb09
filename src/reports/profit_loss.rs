use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::chart_of_accounts::ChartOfAccounts;
use crate::journal::GeneralJournal;
use crate::schema::{Account, AccountType};

use super::{
    header_band, period_movement, rule, sort_account_rows, total_row, truncate, SortOrder,
};

/// Profit and loss over a period: revenue, cost of goods sold and expenses
/// with per-account transaction counts, deriving gross and net profit.
pub fn generate_profit_loss(
    journal: &GeneralJournal,
    chart: &ChartOfAccounts,
    start: NaiveDate,
    end: NaiveDate,
    include_zero_balances: bool,
    sort_by: SortOrder,
) -> String {
    let mut out = header_band(
        "PROFIT & LOSS AUDIT",
        &format!("{} to {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d")),
    );

    let collect = |types: &[AccountType]| -> Vec<(Account, Decimal, usize)> {
        let mut rows: Vec<(Account, Decimal, usize)> = chart
            .get_all_accounts()
            .into_iter()
            .filter(|a| types.contains(&a.account_type))
            .map(|a| {
                let (movement, count) = period_movement(journal, chart, &a.code, start, end);
                (a.clone(), movement, count)
            })
            .filter(|(_, movement, _)| include_zero_balances || !movement.is_zero())
            .collect();
        let mut sortable: Vec<(Account, Decimal)> =
            rows.iter().map(|(a, m, _)| (a.clone(), *m)).collect();
        sort_account_rows(&mut sortable, sort_by);
        rows.sort_by_key(|(a, _, _)| {
            sortable
                .iter()
                .position(|(s, _)| s.code == a.code)
                .unwrap_or(usize::MAX)
        });
        rows
    };

    let mut section = |out: &mut String, title: &str, rows: &[(Account, Decimal, usize)]| -> Decimal {
        out.push_str(title);
        out.push('\n');
        out.push_str(&rule());
        let mut total = Decimal::ZERO;
        for (account, movement, count) in rows {
            let label = format!("{} ({} txns)", account.name, count);
            out.push_str(&format!(
                "{:<5} {:<56} {:>15}\n",
                account.code,
                truncate(&label, 56),
                crate::schema::format_amount(*movement)
            ));
            total += *movement;
        }
        out.push_str(&rule());
        out.push_str(&total_row(&format!("TOTAL {}", title), total));
        out.push('\n');
        total
    };

    let revenue_rows = collect(&[AccountType::Revenue, AccountType::OtherIncome]);
    let cogs_rows = collect(&[AccountType::Cogs]);
    let expense_rows = collect(&[AccountType::Expense, AccountType::Depreciation]);

    let revenue = section(&mut out, "REVENUE", &revenue_rows);
    let cogs = section(&mut out, "COST OF GOODS SOLD", &cogs_rows);
    let gross_profit = revenue - cogs;
    out.push_str(&total_row("GROSS PROFIT", gross_profit));
    out.push('\n');

    let expenses = section(&mut out, "EXPENSES", &expense_rows);
    let net_profit = gross_profit - expenses;
    out.push_str(&rule());
    out.push_str(&total_row("NET PROFIT", net_profit));
    out
}
