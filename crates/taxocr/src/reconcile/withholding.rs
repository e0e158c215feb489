//! Derived totals and red flags for withholding-summary line items.

use crate::document::{Amount, SummaryRecord, WithholdingSummary};

/// Statutory wage withholding rates in percent, each with a ±1 point band.
const VALID_WAGE_RATE_BANDS: [(f64, f64); 4] = [(0.0, 1.0), (4.0, 6.0), (5.0, 7.0), (17.0, 19.0)];

/// Recomputes every record's totals and raises its `has_warning` flag when
/// a red flag fires. A flag already set is never cleared. Returns the number
/// of records the checks flagged.
pub fn reconcile(summary: &mut WithholdingSummary) -> usize {
    let mut flagged = 0;
    for record in &mut summary.records {
        record.total_payment = record.individual_payment + record.non_individual_payment;
        record.total_tax = record.individual_tax + record.non_individual_tax;
        if is_duplicated_split(record) || has_invalid_wage_rate(record) {
            record.has_warning = true;
            flagged += 1;
            tracing::warn!(item = %record.item, "Withholding line item flagged for review");
        }
    }
    flagged
}

/// Individual and non-individual columns carrying the same non-zero figures
/// is a known OCR duplication artifact.
fn is_duplicated_split(record: &SummaryRecord) -> bool {
    record.individual_payment == record.non_individual_payment
        && record.individual_tax == record.non_individual_tax
        && !(record.individual_payment.is_zero() && record.individual_tax.is_zero())
}

fn has_invalid_wage_rate(record: &SummaryRecord) -> bool {
    if !record.is_wage_item() {
        return false;
    }
    !rate_is_valid(record.individual_payment, record.individual_tax)
        || !rate_is_valid(record.non_individual_payment, record.non_individual_tax)
}

/// A column without payments has no rate to check.
fn rate_is_valid(payment: Amount, tax: Amount) -> bool {
    if payment.value() <= 0 {
        return true;
    }
    let rate = tax.value() as f64 / payment.value() as f64 * 100.0;
    VALID_WAGE_RATE_BANDS
        .iter()
        .any(|(low, high)| (*low..=*high).contains(&rate))
}
