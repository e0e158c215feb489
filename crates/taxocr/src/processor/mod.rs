//! Page rasterisation and OCR.
//!
//! Uploaded documents are either PDFs (one or more pages) or single raster
//! images. Each page is rendered to a PNG in the scratch directory, read by
//! the OCR engine, and handed to the extractor along with that image.

pub mod image;
pub mod ocr;
pub mod pdf;
pub mod temp;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ProcessError;

pub use ocr::{OcrEngine, TesseractEngine};
pub use temp::TempImage;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "gif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Pdf,
    Image,
}

impl SourceFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        if ext == "pdf" {
            Some(Self::Pdf)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else {
            None
        }
    }

    pub fn detect(path: &Path) -> Result<Self, ProcessError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Self::from_extension(extension)
            .ok_or_else(|| ProcessError::UnsupportedFormat(extension.to_string()))
    }
}

/// OCR text of one page plus the rendered image, if one was kept.
#[derive(Debug)]
pub struct PageContent {
    pub text: String,
    pub image: Option<TempImage>,
}

/// Splits a document into pages and produces the text of each.
pub trait PageExtractor: Send + Sync {
    fn page_count(&self, path: &Path, format: SourceFormat) -> Result<usize, ProcessError>;

    /// `page_number` is 1-based.
    fn extract_page(
        &self,
        path: &Path,
        format: SourceFormat,
        page_number: usize,
    ) -> Result<PageContent, ProcessError>;
}

pub struct OcrPageExtractor {
    ocr: Arc<dyn OcrEngine>,
    dpi: u32,
    scratch_dir: PathBuf,
}

impl OcrPageExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>, dpi: u32, scratch_dir: PathBuf) -> Self {
        Self {
            ocr,
            dpi,
            scratch_dir,
        }
    }

    fn render(
        &self,
        path: &Path,
        format: SourceFormat,
        page_number: usize,
    ) -> Result<Vec<u8>, ProcessError> {
        match format {
            SourceFormat::Pdf => pdf::render_page(path, page_number, self.dpi, &self.scratch_dir),
            SourceFormat::Image => image::to_png(path),
        }
    }
}

impl PageExtractor for OcrPageExtractor {
    fn page_count(&self, path: &Path, format: SourceFormat) -> Result<usize, ProcessError> {
        match format {
            SourceFormat::Pdf => pdf::page_count(path),
            SourceFormat::Image => Ok(1),
        }
    }

    fn extract_page(
        &self,
        path: &Path,
        format: SourceFormat,
        page_number: usize,
    ) -> Result<PageContent, ProcessError> {
        let png = self.render(path, format, page_number)?;
        let image = TempImage::write(&self.scratch_dir, &png)?;
        let text = self.ocr.recognize(&png)?;

        tracing::debug!(page_number, chars = text.chars().count(), "Page recognised");

        Ok(PageContent {
            text,
            image: Some(image),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedOcr(&'static str);

    impl OcrEngine for FixedOcr {
        fn recognize(&self, _png: &[u8]) -> Result<String, ProcessError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingOcr;

    impl OcrEngine for FailingOcr {
        fn recognize(&self, _png: &[u8]) -> Result<String, ProcessError> {
            Err(ProcessError::OcrFailed("engine down".to_string()))
        }
    }

    fn scratch_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    fn sample_png(dir: &Path) -> PathBuf {
        let path = dir.join("upload.png");
        ::image::RgbImage::from_pixel(2, 2, ::image::Rgb([0, 0, 0]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_source_format_detection() {
        assert_eq!(
            SourceFormat::detect(Path::new("a/b/return.PDF")).unwrap(),
            SourceFormat::Pdf
        );
        for name in ["x.jpg", "x.jpeg", "x.png", "x.bmp", "x.tif", "x.tiff", "x.gif"] {
            assert_eq!(
                SourceFormat::detect(Path::new(name)).unwrap(),
                SourceFormat::Image,
                "{name}"
            );
        }
    }

    #[test]
    fn test_unsupported_format() {
        match SourceFormat::detect(Path::new("notes.docx")) {
            Err(ProcessError::UnsupportedFormat(ext)) => assert_eq!(ext, "docx"),
            other => panic!("Expected UnsupportedFormat, got {:?}", other),
        }
        assert!(matches!(
            SourceFormat::detect(Path::new("no_extension")),
            Err(ProcessError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_image_is_single_page() {
        let scratch = tempfile::tempdir().unwrap();
        let extractor =
            OcrPageExtractor::new(Arc::new(FixedOcr("")), 300, scratch.path().to_path_buf());
        assert_eq!(
            extractor
                .page_count(Path::new("anything.png"), SourceFormat::Image)
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_pdf_page_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("return.pdf");
        std::fs::write(&path, pdf::tests::blank_pdf(2)).unwrap();

        let extractor =
            OcrPageExtractor::new(Arc::new(FixedOcr("")), 300, dir.path().to_path_buf());
        assert_eq!(extractor.page_count(&path, SourceFormat::Pdf).unwrap(), 2);
    }

    #[test]
    fn test_extract_image_page_keeps_upload() {
        let upload_dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let upload = sample_png(upload_dir.path());

        let extractor = OcrPageExtractor::new(
            Arc::new(FixedOcr("營業人銷售額與稅額申報書")),
            300,
            scratch.path().to_path_buf(),
        );
        let page = extractor
            .extract_page(&upload, SourceFormat::Image, 1)
            .unwrap();
        assert_eq!(page.text, "營業人銷售額與稅額申報書");
        assert_eq!(scratch_files(scratch.path()), 1);

        drop(page);
        assert_eq!(scratch_files(scratch.path()), 0);
        assert!(upload.exists());
    }

    #[test]
    fn test_scratch_image_removed_when_ocr_fails() {
        let upload_dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let upload = sample_png(upload_dir.path());

        let extractor =
            OcrPageExtractor::new(Arc::new(FailingOcr), 300, scratch.path().to_path_buf());
        let result = extractor.extract_page(&upload, SourceFormat::Image, 1);

        assert!(matches!(result, Err(ProcessError::OcrFailed(_))));
        assert_eq!(scratch_files(scratch.path()), 0);
    }
}
