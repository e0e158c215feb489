use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of filing a job carries. Drives prompt selection, payload shape
/// and which control checks apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentCategory {
    /// General sales-tax return, sub-form A.
    SalesReturnA,
    /// General sales-tax return, sub-form B (carries special-tax returns).
    SalesReturnB,
    WithholdingSummary,
    WithholdingCertificate,
    DividendVoucher,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown document category: '{0}'")]
pub struct UnknownCategory(pub String);

impl DocumentCategory {
    pub const ALL: [DocumentCategory; 5] = [
        DocumentCategory::SalesReturnA,
        DocumentCategory::SalesReturnB,
        DocumentCategory::WithholdingSummary,
        DocumentCategory::WithholdingCertificate,
        DocumentCategory::DividendVoucher,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentCategory::SalesReturnA => "sales-return-a",
            DocumentCategory::SalesReturnB => "sales-return-b",
            DocumentCategory::WithholdingSummary => "withholding-summary",
            DocumentCategory::WithholdingCertificate => "withholding-certificate",
            DocumentCategory::DividendVoucher => "dividend-voucher",
        }
    }

    pub fn is_sales_return(&self) -> bool {
        matches!(
            self,
            DocumentCategory::SalesReturnA | DocumentCategory::SalesReturnB
        )
    }

    /// Sales returns have neither an income/expense stream nor a counterparty.
    pub fn has_direction(&self) -> bool {
        !self.is_sales_return()
    }

    pub fn has_counterparty(&self) -> bool {
        !self.is_sales_return()
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentCategory {
    type Err = UnknownCategory;

    /// Accepts the canonical names plus the form codes used by the upload
    /// front end (`401`, `403`, `withholding-statement`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "sales-return-a" | "401" => Ok(DocumentCategory::SalesReturnA),
            "sales-return-b" | "403" => Ok(DocumentCategory::SalesReturnB),
            "withholding-summary" | "withholding-statement" => {
                Ok(DocumentCategory::WithholdingSummary)
            }
            "withholding-certificate" | "withholding-slip" => {
                Ok(DocumentCategory::WithholdingCertificate)
            }
            "dividend-voucher" | "dividend-slip" => Ok(DocumentCategory::DividendVoucher),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}
