//! Deterministic post-processing of model output.
//!
//! Reconciliation derives convenience fields and records arithmetic
//! discrepancies as warnings. It never rejects a result and never rewrites a
//! source field. Running it twice yields the same result as running it once.

use crate::document::ExtractionPayload;

pub mod sales_return;
pub mod withholding;
pub mod zero_rate;

pub use sales_return::{ControlCheck, Mismatch};
pub use zero_rate::ZeroRateAmounts;

/// Applies the category's control checks in place.
pub fn reconcile(payload: &mut ExtractionPayload) {
    match payload {
        ExtractionPayload::SalesReturn(form, doc) => {
            sales_return::reconcile(*form, doc);
        }
        ExtractionPayload::WithholdingSummary(summary) => {
            withholding::reconcile(summary);
        }
        ExtractionPayload::WithholdingCertificate(_) | ExtractionPayload::DividendVoucher(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::DocumentCategory;
    use serde_json::json;

    #[test]
    fn test_reconcile_dispatches_by_category() {
        let mut payload = ExtractionPayload::from_value(
            DocumentCategory::SalesReturnA,
            json!({"sales": {"general": {"taxable": {"tripleFormInvoices": 10, "total": 9}}}}),
        )
        .unwrap();
        reconcile(&mut payload);
        assert_eq!(payload.warnings(), ["taxable", "grand_total"]);
    }

    #[test]
    fn test_certificates_pass_through() {
        let original = ExtractionPayload::from_value(
            DocumentCategory::WithholdingCertificate,
            json!({"paymentAmount": 100, "taxWithheld": 100}),
        )
        .unwrap();
        let mut payload = original.clone();
        reconcile(&mut payload);
        assert_eq!(payload, original);
    }
}
