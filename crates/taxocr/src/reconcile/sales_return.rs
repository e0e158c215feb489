//! Control checks for general sales-tax returns.

use crate::document::{Amount, SalesForm, SalesReturn};

/// One arithmetic identity of the sales return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCheck {
    Taxable,
    ZeroRate,
    GrandTotal,
}

impl ControlCheck {
    pub const ALL: [ControlCheck; 3] = [
        ControlCheck::Taxable,
        ControlCheck::ZeroRate,
        ControlCheck::GrandTotal,
    ];

    /// Tag written to the result's `warnings` list.
    pub fn tag(&self) -> &'static str {
        match self {
            ControlCheck::Taxable => "taxable",
            ControlCheck::ZeroRate => "zero_rate",
            ControlCheck::GrandTotal => "grand_total",
        }
    }
}

/// A failed identity: what the form says against what its parts add up to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub check: ControlCheck,
    pub reported: Amount,
    pub computed: Amount,
}

/// Writes the derived triple-form total and replaces `warnings` with the
/// tags of every identity that does not hold. Source fields are untouched.
pub fn reconcile(form: SalesForm, doc: &mut SalesReturn) -> Vec<Mismatch> {
    let taxable = &mut doc.sales.general.taxable;
    taxable.triple_form_total = taxable.triple_form_invoices + taxable.register_invoices;

    let mismatches: Vec<Mismatch> = ControlCheck::ALL
        .iter()
        .filter_map(|check| {
            let (reported, computed) = evaluate(*check, form, doc);
            (reported != computed).then_some(Mismatch {
                check: *check,
                reported,
                computed,
            })
        })
        .collect();

    doc.warnings = mismatches.iter().map(|m| m.check.tag().to_string()).collect();

    for m in &mismatches {
        tracing::warn!(
            check = m.check.tag(),
            reported = m.reported.value(),
            computed = m.computed.value(),
            "Control check failed"
        );
    }

    mismatches
}

fn evaluate(check: ControlCheck, form: SalesForm, doc: &SalesReturn) -> (Amount, Amount) {
    let sales = &doc.sales;
    let taxable = &sales.general.taxable;
    let zero = &sales.general.zero_rate;

    match check {
        ControlCheck::Taxable => (
            taxable.total,
            taxable.triple_form_total + taxable.two_form - sales.sales_returns,
        ),
        ControlCheck::ZeroRate => (
            zero.total,
            zero.non_customs + zero.customs - zero.customs_returns,
        ),
        ControlCheck::GrandTotal => {
            let common = taxable.triple_form_total
                + taxable.two_form
                + zero.customs
                + zero.non_customs
                + sales.general.exempt;

            let computed = match form {
                SalesForm::A => {
                    common + sales.special_tax_total + sales.other
                        - sales.sales_returns
                        - zero.customs_returns
                }
                // Sub-form B reports special tax net of its returns, so the
                // returns are added back and then subtracted as their own line.
                SalesForm::B => {
                    let special_returns = sales.special_tax_returns.unwrap_or_default();
                    common
                        + (sales.special_tax_total + special_returns)
                        + sales.other
                        - sales.sales_returns
                        - zero.customs_returns
                        - special_returns
                }
            };
            (sales.grand_total, computed)
        }
    }
}
