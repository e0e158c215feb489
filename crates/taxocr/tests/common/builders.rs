//! Builders for fake page sources and canned model replies.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Value};

use taxocr::error::ProcessError;
use taxocr::processor::{PageContent, PageExtractor, SourceFormat, TempImage};

type PageHook = Box<dyn Fn(usize) + Send + Sync>;

/// A `PageExtractor` that serves fixed OCR text instead of rasterising.
pub struct FakePages {
    texts: Vec<String>,
    delay: Option<Duration>,
    image_dir: Option<PathBuf>,
    on_page: Option<PageHook>,
    written: Mutex<Vec<PathBuf>>,
}

impl FakePages {
    pub fn new() -> Self {
        Self {
            texts: vec!["page text".to_string()],
            delay: None,
            image_dir: None,
            on_page: None,
            written: Mutex::new(Vec::new()),
        }
    }

    /// One OCR text per page.
    pub fn texts(mut self, texts: &[&str]) -> Self {
        self.texts = texts.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Sleeps before returning each page.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Writes a scratch image for each page into `dir`.
    pub fn with_images(mut self, dir: &Path) -> Self {
        self.image_dir = Some(dir.to_path_buf());
        self
    }

    /// Runs `hook` with the page number before each page is returned.
    pub fn on_page(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_page = Some(Box::new(hook));
        self
    }

    /// Paths of every scratch image handed out so far.
    pub fn written_images(&self) -> Vec<PathBuf> {
        self.written.lock().unwrap().clone()
    }
}

impl PageExtractor for FakePages {
    fn page_count(&self, _path: &Path, _format: SourceFormat) -> Result<usize, ProcessError> {
        Ok(self.texts.len())
    }

    fn extract_page(
        &self,
        _path: &Path,
        _format: SourceFormat,
        page_number: usize,
    ) -> Result<PageContent, ProcessError> {
        if let Some(hook) = &self.on_page {
            hook(page_number);
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let text = self
            .texts
            .get(page_number - 1)
            .cloned()
            .ok_or(ProcessError::PageOutOfRange {
                page: page_number,
                total: self.texts.len(),
            })?;

        let image = match &self.image_dir {
            Some(dir) => {
                let image = TempImage::write(dir, b"\x89PNG fake page")?;
                self.written.lock().unwrap().push(image.path().to_path_buf());
                Some(image)
            }
            None => None,
        };

        Ok(PageContent { text, image })
    }
}

/// Sub-form A reply whose taxable lines sum to `taxable_total` when the
/// total is 180.
pub fn sales_return_reply(taxable_total: i64) -> String {
    json!({
        "companyName": "Acme Trading Co.",
        "sales": {
            "general": {
                "taxable": {
                    "tripleFormInvoices": 100,
                    "registerInvoices": 50,
                    "twoForm": 30,
                    "total": taxable_total
                }
            },
            "grandTotal": 180
        }
    })
    .to_string()
}

pub fn certificate_reply(stream: &str, withholder: &str, amount: i64) -> String {
    json!({
        "stream": stream,
        "withholderName": withholder,
        "paymentAmount": amount,
        "taxWithheld": amount / 10
    })
    .to_string()
}

pub fn summary_reply(stream: &str, withholder: &str) -> String {
    json!({
        "stream": stream,
        "withholderName": withholder,
        "records": []
    })
    .to_string()
}

/// Parses a stored `result_json` column.
pub fn stored(result_json: &Option<String>) -> Value {
    serde_json::from_str(result_json.as_deref().expect("result_json is set"))
        .expect("result_json is valid JSON")
}
