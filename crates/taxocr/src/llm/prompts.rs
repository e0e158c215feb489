//! Prompt templates, one group per document category.

use crate::job::DocumentCategory;

const SYSTEM: &str = include_str!("prompts/system.txt");
const SALES_RETURN_A: &str = include_str!("prompts/sales_return_a.txt");
const SALES_RETURN_B: &str = include_str!("prompts/sales_return_b.txt");
const CERTIFICATE_EXPENSE: &str = include_str!("prompts/certificate_expense.txt");
const SUMMARY_EXPENSE: &str = include_str!("prompts/summary_expense.txt");
const DIVIDEND_EXPENSE: &str = include_str!("prompts/dividend_expense.txt");

const COMPANY_NAME: &str = "{{COMPANY_NAME}}";
const VOUCHER_COUNT: &str = "{{VOUCHER_COUNT}}";
const OCR_TEXT: &str = "{{OCR_TEXT}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptGroup {
    SalesReturnA,
    SalesReturnB,
    CertificateExpense,
    SummaryExpense,
    DividendExpense,
}

/// A rendered request: system instructions plus the user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl PromptGroup {
    pub fn for_category(category: DocumentCategory) -> Self {
        match category {
            DocumentCategory::SalesReturnA => PromptGroup::SalesReturnA,
            DocumentCategory::SalesReturnB => PromptGroup::SalesReturnB,
            DocumentCategory::WithholdingCertificate => PromptGroup::CertificateExpense,
            DocumentCategory::WithholdingSummary => PromptGroup::SummaryExpense,
            DocumentCategory::DividendVoucher => PromptGroup::DividendExpense,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            PromptGroup::SalesReturnA => "prompt-A1",
            PromptGroup::SalesReturnB => "prompt-A2",
            PromptGroup::CertificateExpense => "prompt-B-certificate-expense",
            PromptGroup::SummaryExpense => "prompt-B-summary-expense",
            PromptGroup::DividendExpense => "prompt-B-dividend-expense",
        }
    }

    fn template(&self) -> &'static str {
        match self {
            PromptGroup::SalesReturnA => SALES_RETURN_A,
            PromptGroup::SalesReturnB => SALES_RETURN_B,
            PromptGroup::CertificateExpense => CERTIFICATE_EXPENSE,
            PromptGroup::SummaryExpense => SUMMARY_EXPENSE,
            PromptGroup::DividendExpense => DIVIDEND_EXPENSE,
        }
    }

    /// Fills the template. OCR text goes in last so placeholders that happen
    /// to appear in scanned text are left alone.
    pub fn render(&self, ocr_text: &str, company_name: &str, voucher_count: u32) -> Prompt {
        let user = self
            .template()
            .replace(COMPANY_NAME, company_name)
            .replace(VOUCHER_COUNT, &voucher_count.to_string())
            .replace(OCR_TEXT, ocr_text);

        Prompt {
            system: SYSTEM.trim_end().to_string(),
            user,
        }
    }
}
