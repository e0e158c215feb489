use std::io::Cursor;
use std::path::Path;

use crate::error::ProcessError;

/// Decodes an uploaded raster image of any supported format and re-encodes
/// it as PNG for OCR and the model's vision input.
pub fn to_png(path: &Path) -> Result<Vec<u8>, ProcessError> {
    let _span = tracing::info_span!("processor.image").entered();

    let data = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
        path: path.to_path_buf(),
        source: e,
    })?;

    let img = image::load_from_memory(&data)
        .map_err(|e| ProcessError::ImageProcessing(format!("Failed to load image: {}", e)))?;

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| ProcessError::ImageProcessing(format!("Failed to encode PNG: {}", e)))?;
    Ok(png)
}
