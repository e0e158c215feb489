use std::sync::Arc;

use crate::error::ProcessError;

/// Languages used when none are configured: traditional Chinese forms with
/// Latin digits and company names.
pub const DEFAULT_LANGUAGES: &str = "chi_tra+eng";

/// Turns a rasterised page into text.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, png: &[u8]) -> Result<String, ProcessError>;
}

/// Tesseract via leptess. A fresh Tesseract handle is created per call so
/// the engine can be shared across worker threads.
#[derive(Clone)]
pub struct TesseractEngine {
    inner: Arc<TesseractInner>,
}

struct TesseractInner {
    languages: String,
}

impl TesseractEngine {
    pub fn new(languages: &[String]) -> Self {
        let languages = if languages.is_empty() {
            DEFAULT_LANGUAGES.to_string()
        } else {
            languages.join("+")
        };
        Self {
            inner: Arc::new(TesseractInner { languages }),
        }
    }

    pub fn languages(&self) -> &str {
        &self.inner.languages
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, png: &[u8]) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.ocr").entered();

        // Reject undecodable input before paying for Tesseract start-up.
        image::load_from_memory(png)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to load image: {}", e)))?;

        let mut lt = leptess::LepTess::new(None, &self.inner.languages).map_err(|e| {
            ProcessError::OcrFailed(format!("Failed to initialize Tesseract: {}", e))
        })?;

        lt.set_image_from_mem(png)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to set image for OCR: {}", e)))?;

        lt.get_utf8_text()
            .map_err(|e| ProcessError::OcrFailed(format!("OCR failed: {}", e)))
    }
}
