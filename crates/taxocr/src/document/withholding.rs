//! Withholding summary and withholding certificate payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::amount::Amount;

/// Annual withholding summary: one line item per income type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WithholdingSummary {
    /// The withholding unit that filed the summary.
    pub withholder_name: Option<String>,
    pub stream: Option<String>,
    pub records: Vec<SummaryRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SummaryRecord {
    /// Income type, e.g. wages, rent, interest.
    pub item: String,
    pub individual_payment: Amount,
    pub non_individual_payment: Amount,
    pub individual_tax: Amount,
    pub non_individual_tax: Amount,
    /// Derived: individual + non-individual payment.
    pub total_payment: Amount,
    /// Derived: individual + non-individual withheld tax.
    pub total_tax: Amount,
    #[serde(rename = "has_warning")]
    pub has_warning: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SummaryRecord {
    /// Wage lines are the only ones held to the statutory rate table.
    pub fn is_wage_item(&self) -> bool {
        let item = self.item.trim();
        item == "薪資"
            || item.eq_ignore_ascii_case("wages")
            || item.eq_ignore_ascii_case("wage")
            || item.eq_ignore_ascii_case("salary")
    }
}

/// A single withholding certificate issued to one recipient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WithholdingCertificate {
    pub withholder_name: Option<String>,
    pub stream: Option<String>,
    pub recipient_name: Option<String>,
    pub income_type: Option<String>,
    pub payment_amount: Amount,
    pub tax_withheld: Amount,
    pub net_payment: Amount,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
