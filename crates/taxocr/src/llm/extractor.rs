use std::sync::Arc;

use base64::Engine as _;

use crate::document::ExtractionPayload;
use crate::error::ExtractionError;
use crate::job::DocumentCategory;
use crate::processor::TempImage;
use crate::reconcile;
use crate::sanitize::preview;

use super::client::{GenerativeModel, ModelRequest};
use super::prompts::PromptGroup;
use super::repair::parse_model_output;

/// Default base64 budget for the page image (19 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 19 * 1024 * 1024;

const LOGGED_OUTPUT_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub max_attempts: u32,
    pub max_image_bytes: usize,
    /// Cross-checks sub-form B zero-rate amounts against the OCR text.
    pub zero_rate_fallback: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            zero_rate_fallback: false,
        }
    }
}

/// Everything the extractor needs to know about one page.
pub struct PageInput<'a> {
    pub text: &'a str,
    pub image: Option<&'a TempImage>,
    pub company_name: &'a str,
    pub voucher_count: u32,
}

/// Calls the model for one page, repairs and types its output, and runs the
/// category's deterministic post-processing.
pub struct GenerativeExtractor {
    model: Arc<dyn GenerativeModel>,
    config: ExtractorConfig,
}

impl GenerativeExtractor {
    pub fn new(model: Arc<dyn GenerativeModel>, config: ExtractorConfig) -> Self {
        Self { model, config }
    }

    pub fn extract(
        &self,
        category: DocumentCategory,
        page: &PageInput<'_>,
    ) -> Result<ExtractionPayload, ExtractionError> {
        let group = PromptGroup::for_category(category);
        let prompt = group.render(page.text, page.company_name, page.voucher_count);
        let request = ModelRequest {
            system: prompt.system,
            user: prompt.user,
            image_base64: page.image.and_then(|image| self.encode_image(image)),
        };

        let attempts = self.config.max_attempts.max(1);
        let mut last_error = ExtractionError::EmptyResponse;

        for attempt in 1..=attempts {
            let _span =
                tracing::info_span!("llm.attempt", attempt, prompt_group = group.id()).entered();

            match self.attempt(category, &request, page.text) {
                Ok(payload) => return Ok(payload),
                Err(e) => {
                    tracing::warn!(attempt, attempts, error = %e, "Extraction attempt failed");
                    last_error = e;
                }
            }
        }

        Err(ExtractionError::Exhausted {
            attempts,
            last: Box::new(last_error),
        })
    }

    fn attempt(
        &self,
        category: DocumentCategory,
        request: &ModelRequest,
        ocr_text: &str,
    ) -> Result<ExtractionPayload, ExtractionError> {
        let raw = self.model.complete(request)?;
        tracing::debug!(output = %preview(&raw, LOGGED_OUTPUT_CHARS), "Model output");

        let value = parse_model_output(&raw)?;
        let mut payload = ExtractionPayload::from_value(category, value)
            .map_err(|e| ExtractionError::Shape(e.to_string()))?;

        self.post_process(&mut payload, ocr_text);
        Ok(payload)
    }

    fn post_process(&self, payload: &mut ExtractionPayload, ocr_text: &str) {
        if let ExtractionPayload::SalesReturn(form, doc) = payload {
            doc.warnings_acknowledged = false;
            if self.config.zero_rate_fallback && *form == crate::document::SalesForm::B {
                reconcile::zero_rate::apply(doc, ocr_text);
            }
        }
        reconcile::reconcile(payload);
    }

    /// Base64 of the page image, or `None` to send text only when the image
    /// cannot be read or exceeds the size budget.
    fn encode_image(&self, image: &TempImage) -> Option<String> {
        let bytes = match image.read() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "Page image unreadable, sending text only");
                return None;
            }
        };

        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        if encoded.len() > self.config.max_image_bytes {
            tracing::warn!(
                encoded_bytes = encoded.len(),
                limit = self.config.max_image_bytes,
                "Page image too large, sending text only"
            );
            return None;
        }
        Some(encoded)
    }
}
