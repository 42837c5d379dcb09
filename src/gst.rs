use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::{LedgerError, Result};
use crate::schema::{round2, Account, SplitLine};

/// Flat GST rate applied when splitting a gross amount: gst = gross * 0.1/1.1.
const GST_RATE: Decimal = dec!(0.1);
const GST_DIVISOR: Decimal = dec!(1.1);

/// Turns a gross amount against a non-bank account into its split lines.
///
/// The splitter is pure and direction-blind: it returns positive line
/// amounts only, and the journal decides which side they land on based on
/// where the bank leg sits. When the target account is not GST applicable
/// the gross passes through untouched; otherwise the GST component goes to
/// the clearing account and the rounding residual stays in the net line.
pub fn split_gross(account: &Account, gross: Decimal, clearing_code: &str) -> Result<Vec<SplitLine>> {
    if gross <= Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "amount must be strictly positive, got {}",
            gross
        )));
    }
    let gross = round2(gross);
    if !account.gst_applicable {
        return Ok(vec![SplitLine::new(account.code.clone(), gross)]);
    }

    let gst = round2(gross * GST_RATE / GST_DIVISOR);
    let net = gross - gst;
    Ok(vec![
        SplitLine::new(account.code.clone(), net),
        SplitLine::new(clearing_code, gst),
    ])
}
