use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::ProcessError;

/// Number of pages in a PDF. Uses lopdf, falling back to `pdfinfo` for files
/// lopdf cannot parse (broken cross-reference tables and the like).
pub fn page_count(path: &Path) -> Result<usize, ProcessError> {
    let count = match lopdf::Document::load(path) {
        Ok(doc) => doc.get_pages().len(),
        Err(e) => {
            tracing::warn!(
                file = %crate::sanitize::redact_path(path),
                error = %e,
                "lopdf could not parse PDF, asking pdfinfo"
            );
            pdfinfo_page_count(path)?
        }
    };

    if count == 0 {
        return Err(ProcessError::PdfProcessing("PDF has no pages".to_string()));
    }
    Ok(count)
}

fn pdfinfo_page_count(path: &Path) -> Result<usize, ProcessError> {
    let output = Command::new("pdfinfo").arg(path).output().map_err(|e| {
        ProcessError::PdfProcessing(format!(
            "Failed to run pdfinfo: {}. Make sure poppler-utils is installed.",
            e
        ))
    })?;

    if !output.status.success() {
        return Err(ProcessError::PdfProcessing(format!(
            "pdfinfo failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    parse_pdfinfo_pages(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        ProcessError::PdfProcessing("pdfinfo did not report a page count".to_string())
    })
}

fn parse_pdfinfo_pages(stdout: &str) -> Option<usize> {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|count| count.trim().parse().ok())
}

/// Renders one page (1-based) to PNG bytes with `pdftoppm`. The intermediate
/// file lives in `scratch_dir` and is removed before returning.
pub fn render_page(
    path: &Path,
    page_number: usize,
    dpi: u32,
    scratch_dir: &Path,
) -> Result<Vec<u8>, ProcessError> {
    let _span = tracing::info_span!("processor.pdf_render", page_number).entered();

    let stem = format!("taxocr_render_{}", uuid::Uuid::new_v4());
    let page = page_number.to_string();

    let output = Command::new("pdftoppm")
        .arg("-png")
        .arg("-r")
        .arg(dpi.to_string())
        .arg("-f")
        .arg(&page)
        .arg("-l")
        .arg(&page)
        .arg(path)
        .arg(scratch_dir.join(&stem))
        .output()
        .map_err(|e| {
            ProcessError::PdfProcessing(format!(
                "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                e
            ))
        })?;

    let outputs = rendered_outputs(scratch_dir, &stem);
    let result = if !output.status.success() {
        Err(ProcessError::PdfProcessing(format!(
            "pdftoppm failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )))
    } else {
        match outputs.iter().find(|(n, _)| *n == page_number) {
            Some((_, rendered)) => std::fs::read(rendered).map_err(|e| ProcessError::ReadDocument {
                path: rendered.clone(),
                source: e,
            }),
            None => Err(ProcessError::PageOutOfRange {
                page: page_number,
                total: 0,
            }),
        }
    };

    for (_, file) in &outputs {
        if let Err(e) = std::fs::remove_file(file) {
            tracing::warn!(error = %e, "Failed to remove pdftoppm output");
        }
    }
    result
}

/// Files pdftoppm wrote for `stem`, with the page number parsed from the
/// suffix. The suffix is zero-padded to the width of the document's page
/// count, so any padding is accepted.
fn rendered_outputs(dir: &Path, stem: &str) -> Vec<(usize, PathBuf)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let prefix = format!("{}-", stem);
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let page = name
                .to_str()?
                .strip_prefix(&prefix)?
                .strip_suffix(".png")?
                .parse()
                .ok()?;
            Some((page, entry.path()))
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::{dictionary, Document, Object};

    /// Builds a PDF with `pages` empty pages.
    pub(crate) fn blank_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                });
                page_id.into()
            })
            .collect();

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_page_count_from_lopdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("three.pdf");
        std::fs::write(&path, blank_pdf(3)).unwrap();
        assert_eq!(page_count(&path).unwrap(), 3);
    }

    #[test]
    fn test_single_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.pdf");
        std::fs::write(&path, blank_pdf(1)).unwrap();
        assert_eq!(page_count(&path).unwrap(), 1);
    }

    #[test]
    fn test_rendered_outputs_accept_any_padding() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "taxocr_render_x-7.png",
            "taxocr_render_x-0042.png",
            "taxocr_render_x-1234.png",
            "taxocr_render_y-0007.png",
            "taxocr_render_x-cover.png",
            "taxocr_render_x-0009.ppm",
        ] {
            std::fs::write(dir.path().join(name), b"png").unwrap();
        }

        let mut pages: Vec<usize> = rendered_outputs(dir.path(), "taxocr_render_x")
            .into_iter()
            .map(|(page, _)| page)
            .collect();
        pages.sort_unstable();
        assert_eq!(pages, vec![7, 42, 1234]);
    }

    #[test]
    fn test_rendered_outputs_of_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(rendered_outputs(&dir.path().join("gone"), "taxocr_render_x").is_empty());
    }

    #[test]
    fn test_parse_pdfinfo_output() {
        let stdout = "Title:          scan\nProducer:       x\nPages:          12\nEncrypted:      no\n";
        assert_eq!(parse_pdfinfo_pages(stdout), Some(12));
        assert_eq!(parse_pdfinfo_pages("Title: none\n"), None);
        assert_eq!(parse_pdfinfo_pages("Pages: many\n"), None);
    }
}
