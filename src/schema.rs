use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// First and last codes of the protected bank range.
pub const BANK_RANGE_START: u32 = 1;
pub const BANK_RANGE_END: u32 = 99;

/// Placeholder account that receives the non-bank leg of every imported entry.
pub const UNCATEGORIZED_CODE: &str = "999";

/// Default clearing account absorbing the GST component of a gross amount.
pub const DEFAULT_GST_CLEARING_CODE: &str = "506";

/// Account taxonomy. Bank accounts live in codes 001-099 and appear in
/// exactly one leg of every journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum AccountType {
    Bank,
    Revenue,
    OtherIncome,
    #[serde(rename = "COGS")]
    Cogs,
    Expense,
    Depreciation,
    CurrentAsset,
    Inventory,
    FixedAsset,
    CurrentLiability,
    Equity,
}

/// Which side of an entry an account grows on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }
}

impl AccountType {
    /// The column this type naturally balances on in a trial balance.
    pub fn natural_balance(self) -> Side {
        match self {
            AccountType::Bank
            | AccountType::Cogs
            | AccountType::Expense
            | AccountType::Depreciation
            | AccountType::CurrentAsset
            | AccountType::Inventory
            | AccountType::FixedAsset => Side::Debit,
            AccountType::Revenue
            | AccountType::OtherIncome
            | AccountType::CurrentLiability
            | AccountType::Equity => Side::Credit,
        }
    }

    /// Start of the advisory code band used when auto-assigning codes.
    pub fn base_code(self) -> u32 {
        match self {
            AccountType::Bank => 1,
            AccountType::Revenue | AccountType::OtherIncome => 100,
            AccountType::Cogs => 200,
            AccountType::Expense | AccountType::Depreciation => 300,
            AccountType::CurrentAsset => 500,
            AccountType::Inventory | AccountType::FixedAsset => 600,
            AccountType::CurrentLiability => 700,
            AccountType::Equity => 800,
        }
    }

    pub fn is_balance_sheet(self) -> bool {
        matches!(
            self,
            AccountType::Bank
                | AccountType::CurrentAsset
                | AccountType::Inventory
                | AccountType::FixedAsset
                | AccountType::CurrentLiability
                | AccountType::Equity
        )
    }

    pub fn all() -> &'static [AccountType] {
        &[
            AccountType::Bank,
            AccountType::Revenue,
            AccountType::OtherIncome,
            AccountType::Cogs,
            AccountType::Expense,
            AccountType::Depreciation,
            AccountType::CurrentAsset,
            AccountType::Inventory,
            AccountType::FixedAsset,
            AccountType::CurrentLiability,
            AccountType::Equity,
        ]
    }
}

/// GST treatment recorded against an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum GstTreatment {
    #[serde(rename = "GSTOnIncome")]
    GstOnIncome,
    #[serde(rename = "GSTOnExpenses")]
    GstOnExpenses,
    #[serde(rename = "GSTFreeExpenses")]
    GstFreeExpenses,
    #[serde(rename = "BASExcluded")]
    BasExcluded,
    #[serde(rename = "GSTOnCapital")]
    GstOnCapital,
}

/// A single account in the chart. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub gst_applicable: bool,
    pub gst_treatment: GstTreatment,
}

/// Returns true when `code` is exactly three digits.
pub fn is_valid_code_format(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_digit())
}

/// Returns true when `code` falls in the protected bank range 001-099.
pub fn is_bank_code(code: &str) -> bool {
    if !is_valid_code_format(code) {
        return false;
    }
    match code.parse::<u32>() {
        Ok(n) => (BANK_RANGE_START..=BANK_RANGE_END).contains(&n),
        Err(_) => false,
    }
}

/// Rounds to the 2-decimal currency precision used everywhere in the journal.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp(2)
}

/// Formats an amount with exactly two decimal places, e.g. `55.00`.
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

/// One leg line of a journal entry. Direction is encoded by placement in
/// debits vs credits, never by sign, so the amount is strictly positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitLine {
    pub account_code: String,
    pub amount: Decimal,
}

impl SplitLine {
    pub fn new(account_code: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account_code: account_code.into(),
            amount: round2(amount),
        }
    }
}

/// A balanced double-entry journal entry. Exactly one of `debits`/`credits`
/// holds a single bank-account line; the other side carries the
/// categorization legs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub date: NaiveDate,
    pub description: String,
    pub debits: Vec<SplitLine>,
    pub credits: Vec<SplitLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_balance: Option<Decimal>,
    #[serde(default)]
    pub notes: String,
}

impl JournalEntry {
    pub fn total_debits(&self) -> Decimal {
        self.debits.iter().map(|l| l.amount).sum()
    }

    pub fn total_credits(&self) -> Decimal {
        self.credits.iter().map(|l| l.amount).sum()
    }

    /// Balanced to 2-decimal precision (tolerance 0.005).
    pub fn is_balanced(&self) -> bool {
        (self.total_debits() - self.total_credits()).abs() < Decimal::new(5, 3)
    }

    /// The side holding the single bank line, if the entry is well formed.
    pub fn bank_side(&self) -> Option<Side> {
        let debit_banks = self.debits.iter().filter(|l| is_bank_code(&l.account_code)).count();
        let credit_banks = self.credits.iter().filter(|l| is_bank_code(&l.account_code)).count();
        match (debit_banks, credit_banks) {
            (1, 0) if self.debits.len() == 1 => Some(Side::Debit),
            (0, 1) if self.credits.len() == 1 => Some(Side::Credit),
            _ => None,
        }
    }

    /// The bank-account code of this entry's bank leg.
    pub fn bank_code(&self) -> Option<&str> {
        match self.bank_side()? {
            Side::Debit => Some(self.debits[0].account_code.as_str()),
            Side::Credit => Some(self.credits[0].account_code.as_str()),
        }
    }

    /// Total transacted amount, taken from the bank leg.
    pub fn amount(&self) -> Option<Decimal> {
        match self.bank_side()? {
            Side::Debit => Some(self.debits[0].amount),
            Side::Credit => Some(self.credits[0].amount),
        }
    }

    /// The non-bank legs, in order.
    pub fn category_lines(&self) -> &[SplitLine] {
        match self.bank_side() {
            Some(Side::Debit) => &self.credits,
            Some(Side::Credit) => &self.debits,
            None => &[],
        }
    }

    /// Externally visible identifier: `yyyy-MM-dd_<description>_<amount>_<bankCode>`.
    pub fn transaction_id(&self) -> Option<String> {
        let amount = self.amount()?;
        let bank = self.bank_code()?;
        Some(format!(
            "{}_{}_{}_{}",
            self.date.format("%Y-%m-%d"),
            self.description,
            format_amount(amount),
            bank
        ))
    }

    /// Two entries are the same bank transaction iff they agree on
    /// `(day, description, amount, bankCode)` regardless of categorization.
    pub fn same_bank_transaction(&self, other: &JournalEntry) -> bool {
        self.date == other.date
            && self.description == other.description
            && self.amount() == other.amount()
            && self.bank_code() == other.bank_code()
    }

    /// Structural validation shared by the journal and the import pipeline.
    /// Account existence is checked by the journal when a chart is attached.
    pub fn validate(&self) -> Result<()> {
        if self.debits.is_empty() || self.credits.is_empty() {
            return Err(LedgerError::Validation(
                "entry must have at least one debit and one credit line".to_string(),
            ));
        }
        for line in self.debits.iter().chain(self.credits.iter()) {
            if !is_valid_code_format(&line.account_code) {
                return Err(LedgerError::Validation(format!(
                    "accountCode '{}' is not a three digit code",
                    line.account_code
                )));
            }
            if line.amount <= Decimal::ZERO {
                return Err(LedgerError::Validation(format!(
                    "amount for account {} must be strictly positive",
                    line.account_code
                )));
            }
        }
        if !self.is_balanced() {
            return Err(LedgerError::Validation(format!(
                "entry is not balanced: debits {} != credits {}",
                format_amount(self.total_debits()),
                format_amount(self.total_credits())
            )));
        }
        if self.bank_side().is_none() {
            return Err(LedgerError::Validation(
                "exactly one side must consist of a single bank-account (001-099) line"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Parsed form of a transaction id. The description may itself contain
/// underscores, so the date is the first segment, the amount the
/// penultimate and the bank code the last.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRef {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub bank_code: String,
}

impl TransactionRef {
    pub fn parse(id: &str) -> Result<TransactionRef> {
        let parts: Vec<&str> = id.split('_').collect();
        if parts.len() < 4 {
            return Err(LedgerError::Validation(format!(
                "transactionId '{}' does not match yyyy-MM-dd_<description>_<amount>_<bankCode>",
                id
            )));
        }
        let date = NaiveDate::parse_from_str(parts[0], "%Y-%m-%d").map_err(|_| {
            LedgerError::Validation(format!("transactionId '{}' has an invalid date segment", id))
        })?;
        let bank_code = parts[parts.len() - 1].to_string();
        let amount: Decimal = parts[parts.len() - 2].parse().map_err(|_| {
            LedgerError::Validation(format!(
                "transactionId '{}' has an invalid amount segment",
                id
            ))
        })?;
        let description = parts[1..parts.len() - 2].join("_");
        Ok(TransactionRef {
            date,
            description,
            amount: round2(amount),
            bank_code,
        })
    }

    pub fn matches(&self, entry: &JournalEntry) -> bool {
        entry.date == self.date
            && entry.description == self.description
            && entry.amount() == Some(self.amount)
            && entry.bank_code() == Some(self.bank_code.as_str())
    }
}

/// A supplier the AI can categorize against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub name: String,
    pub supplies: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

/// A human-readable categorization rule. Guidance for the AI, not a DSL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountingRule {
    pub name: String,
    pub created: chrono::DateTime<chrono::Utc>,
    pub updated: chrono::DateTime<chrono::Utc>,
    pub priority: u8,
    pub condition: String,
    pub action: String,
    pub account_code: String,
    pub account_type: AccountType,
    pub gst_handling: GstTreatment,
    #[serde(default)]
    pub notes: String,
}

/// Company metadata carried by the unified company file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abn: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry() -> JournalEntry {
        JournalEntry {
            date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            description: "Office Supplies 1".to_string(),
            debits: vec![SplitLine::new("999", dec!(55.00))],
            credits: vec![SplitLine::new("001", dec!(55.00))],
            bank_balance: Some(dec!(1000.00)),
            notes: String::new(),
        }
    }

    #[test]
    fn test_bank_leg_detection() {
        let e = entry();
        assert_eq!(e.bank_side(), Some(Side::Credit));
        assert_eq!(e.bank_code(), Some("001"));
        assert_eq!(e.amount(), Some(dec!(55.00)));
        assert_eq!(e.category_lines().len(), 1);
        assert_eq!(e.category_lines()[0].account_code, "999");
    }

    #[test]
    fn test_transaction_id_round_trip_with_underscores() {
        let mut e = entry();
        e.description = "VISA_PURCHASE_04FEB".to_string();
        let id = e.transaction_id().unwrap();
        assert_eq!(id, "2025-01-10_VISA_PURCHASE_04FEB_55.00_001");

        let parsed = TransactionRef::parse(&id).unwrap();
        assert_eq!(parsed.description, "VISA_PURCHASE_04FEB");
        assert_eq!(parsed.amount, dec!(55.00));
        assert_eq!(parsed.bank_code, "001");
        assert!(parsed.matches(&e));
    }

    #[test]
    fn test_unbalanced_entry_rejected() {
        let mut e = entry();
        e.debits[0].amount = dec!(54.99);
        assert!(!e.is_balanced());
        assert!(matches!(e.validate(), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_split_entry_still_has_one_bank_leg() {
        let e = JournalEntry {
            date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            description: "Office Supplies".to_string(),
            debits: vec![
                SplitLine::new("200", dec!(50.00)),
                SplitLine::new("506", dec!(5.00)),
            ],
            credits: vec![SplitLine::new("001", dec!(55.00))],
            bank_balance: None,
            notes: String::new(),
        };
        assert!(e.validate().is_ok());
        assert_eq!(e.bank_side(), Some(Side::Credit));
        assert_eq!(e.amount(), Some(dec!(55.00)));
    }

    #[test]
    fn test_identity_ignores_categorization() {
        let a = entry();
        let mut b = entry();
        b.debits = vec![
            SplitLine::new("200", dec!(50.00)),
            SplitLine::new("506", dec!(5.00)),
        ];
        assert!(a.same_bank_transaction(&b));
    }

    #[test]
    fn test_code_helpers() {
        assert!(is_bank_code("001"));
        assert!(is_bank_code("099"));
        assert!(!is_bank_code("100"));
        assert!(!is_bank_code("999"));
        assert!(!is_valid_code_format("1"));
        assert!(!is_valid_code_format("01a"));
    }

    #[test]
    fn test_account_type_serde_names() {
        assert_eq!(
            serde_json::to_string(&AccountType::Cogs).unwrap(),
            "\"COGS\""
        );
        assert_eq!(
            serde_json::to_string(&GstTreatment::BasExcluded).unwrap(),
            "\"BASExcluded\""
        );
        let t: AccountType = serde_json::from_str("\"CurrentLiability\"").unwrap();
        assert_eq!(t, AccountType::CurrentLiability);
    }
}
