use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::amount::Amount;

/// A page of dividend vouchers. A page may hold several vouchers, each
/// with its own payer and stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DividendVoucher {
    pub withholder_name: Option<String>,
    pub stream: Option<String>,
    pub records: Vec<DividendRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DividendRecord {
    /// The company paying the dividend.
    pub withholder_name: Option<String>,
    pub stream: Option<String>,
    pub shareholder_name: Option<String>,
    pub dividend_amount: Amount,
    pub tax_withheld: Amount,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
