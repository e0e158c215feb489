//! General sales-tax return payload (sub-forms A and B).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::amount::Amount;

/// Which sub-form a sales return was filed on. Sub-form B reports
/// special-tax returns separately, which changes the grand-total identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SalesForm {
    A,
    B,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SalesReturn {
    pub sales: Sales,
    /// Names of the control checks that failed. Empty means all passed.
    pub warnings: Vec<String>,
    /// Set by a human reviewer, never by the pipeline.
    #[serde(rename = "warnings_acknowledged")]
    pub warnings_acknowledged: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Sales {
    pub general: GeneralSales,
    pub sales_returns: Amount,
    pub special_tax_total: Amount,
    /// Only reported on sub-form B.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_tax_returns: Option<Amount>,
    pub other: Amount,
    pub grand_total: Amount,
    /// Sub-form B summary lines recomputed when the zero-rate fallback
    /// corrects the model. Absent unless reported or recomputed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales_total: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_total: Option<Amount>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneralSales {
    pub taxable: TaxableSales,
    pub zero_rate: ZeroRateSales,
    pub exempt: Amount,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaxableSales {
    pub triple_form_invoices: Amount,
    pub register_invoices: Amount,
    pub two_form: Amount,
    /// Derived: triple-form invoices plus register-tape invoices.
    pub triple_form_total: Amount,
    /// Model-reported taxable total, checked against its constituents.
    pub total: Amount,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ZeroRateSales {
    /// Zero-rate sales not cleared through customs (domestic channel).
    pub non_customs: Amount,
    /// Zero-rate sales cleared through customs (export channel).
    pub customs: Amount,
    pub customs_returns: Amount,
    pub total: Amount,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
