use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One suggestion returned by the model. Everything here is untrusted input
/// and gets revalidated by `update_transaction_account`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Categorization {
    /// The transaction id exactly as presented in the batch.
    pub transaction_id: String,
    /// Target account code from the chart.
    pub account_code: String,
    /// Why this account fits; recorded in the entry notes.
    pub justification: String,
}

/// The response schema sent to the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategorizationResponse {
    pub classifications: Vec<Categorization>,
}

/// What the model sees for each uncategorized entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub transaction_id: String,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    /// `inflow` when money entered the bank account, `outflow` otherwise.
    pub direction: String,
}
