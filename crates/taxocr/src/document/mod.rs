//! Typed extraction payloads, one variant per document category.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::job::{DocumentCategory, FlowDirection};

pub mod amount;
pub mod dividend;
pub mod sales_return;
pub mod withholding;

pub use amount::Amount;
pub use dividend::{DividendRecord, DividendVoucher};
pub use sales_return::{GeneralSales, Sales, SalesForm, SalesReturn, TaxableSales, ZeroRateSales};
pub use withholding::{SummaryRecord, WithholdingCertificate, WithholdingSummary};

/// Key wrapping the ordered page list of a multi-page result.
pub const PAGES_KEY: &str = "pages";
pub const PAGE_NUMBER_KEY: &str = "pageNumber";
pub const TOTAL_PAGES_KEY: &str = "totalPages";

/// The structured result of one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExtractionPayload {
    SalesReturn(SalesForm, SalesReturn),
    WithholdingSummary(WithholdingSummary),
    WithholdingCertificate(WithholdingCertificate),
    DividendVoucher(DividendVoucher),
}

impl ExtractionPayload {
    /// Interprets parsed model output according to the job's category.
    pub fn from_value(category: DocumentCategory, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match category {
            DocumentCategory::SalesReturnA => {
                ExtractionPayload::SalesReturn(SalesForm::A, serde_json::from_value(value)?)
            }
            DocumentCategory::SalesReturnB => {
                ExtractionPayload::SalesReturn(SalesForm::B, serde_json::from_value(value)?)
            }
            DocumentCategory::WithholdingSummary => {
                ExtractionPayload::WithholdingSummary(serde_json::from_value(value)?)
            }
            DocumentCategory::WithholdingCertificate => {
                ExtractionPayload::WithholdingCertificate(serde_json::from_value(value)?)
            }
            DocumentCategory::DividendVoucher => {
                ExtractionPayload::DividendVoucher(serde_json::from_value(value)?)
            }
        })
    }

    pub fn to_value(&self) -> Value {
        let value = match self {
            ExtractionPayload::SalesReturn(_, form) => serde_json::to_value(form),
            ExtractionPayload::WithholdingSummary(s) => serde_json::to_value(s),
            ExtractionPayload::WithholdingCertificate(c) => serde_json::to_value(c),
            ExtractionPayload::DividendVoucher(d) => serde_json::to_value(d),
        };
        // Plain structs with string keys always serialize.
        value.unwrap_or(Value::Null)
    }

    /// Stream tags in document order. A page that wraps several records
    /// contributes one tag per record; otherwise the page's own tag.
    pub fn stream_tags(&self) -> Vec<FlowDirection> {
        let page_tag = |stream: &Option<String>| {
            stream
                .as_deref()
                .and_then(FlowDirection::from_tag)
                .into_iter()
                .collect::<Vec<_>>()
        };

        match self {
            ExtractionPayload::SalesReturn(..) => Vec::new(),
            ExtractionPayload::WithholdingSummary(s) => page_tag(&s.stream),
            ExtractionPayload::WithholdingCertificate(c) => page_tag(&c.stream),
            ExtractionPayload::DividendVoucher(d) => {
                let record_tags: Vec<FlowDirection> = d
                    .records
                    .iter()
                    .filter_map(|r| r.stream.as_deref().and_then(FlowDirection::from_tag))
                    .collect();
                if record_tags.is_empty() {
                    page_tag(&d.stream)
                } else {
                    record_tags
                }
            }
        }
    }

    /// The counterparty named on this page: the first record's payer when
    /// the page wraps records, else the page-level withholder.
    pub fn counterparty(&self) -> Option<String> {
        let name = match self {
            ExtractionPayload::SalesReturn(..) => None,
            ExtractionPayload::WithholdingSummary(s) => s.withholder_name.as_deref(),
            ExtractionPayload::WithholdingCertificate(c) => c.withholder_name.as_deref(),
            ExtractionPayload::DividendVoucher(d) => d
                .records
                .first()
                .and_then(|r| r.withholder_name.as_deref())
                .or(d.withholder_name.as_deref()),
        };
        name.map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            ExtractionPayload::SalesReturn(_, form) => &form.warnings,
            _ => &[],
        }
    }
}

/// One page's payload tagged with its position in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    pub page_number: usize,
    pub total_pages: usize,
    pub payload: ExtractionPayload,
}

impl PageResult {
    pub fn to_value(&self) -> Value {
        let mut value = self.payload.to_value();
        if let Value::Object(map) = &mut value {
            map.insert(PAGE_NUMBER_KEY.to_string(), Value::from(self.page_number));
            map.insert(TOTAL_PAGES_KEY.to_string(), Value::from(self.total_pages));
        }
        value
    }
}

/// Aggregates ordered page results into the job's stored result: the lone
/// page object for single-page jobs, otherwise `{"pages": [...]}`.
pub fn aggregate_pages(pages: &[PageResult]) -> Value {
    if let [single] = pages {
        return single.to_value();
    }
    let mut wrapper = Map::new();
    wrapper.insert(
        PAGES_KEY.to_string(),
        Value::Array(pages.iter().map(PageResult::to_value).collect()),
    );
    Value::Object(wrapper)
}
