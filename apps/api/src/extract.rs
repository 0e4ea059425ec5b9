//! Document extraction — recovers plain text from uploaded candidate
//! materials. Unsupported formats and empty documents are client-input
//! errors, never server faults.

use crate::errors::AppError;

/// Extracts text from an uploaded document, dispatching on the filename
/// extension. Supported: `.pdf` (via pdf-extract), `.txt` and `.md` (UTF-8).
pub fn extract_text(filename: &str, bytes: &[u8]) -> Result<String, AppError> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let text = match extension.as_str() {
        "pdf" => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| AppError::Validation(format!("could not read PDF '{filename}': {e}")))?,
        "txt" | "md" => String::from_utf8(bytes.to_vec()).map_err(|_| {
            AppError::Validation(format!("'{filename}' is not valid UTF-8 text"))
        })?,
        _ => {
            return Err(AppError::Validation(format!(
                "unsupported document type '{filename}'; expected .pdf, .txt, or .md"
            )))
        }
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!(
            "'{filename}' contained no extractable text"
        )));
    }
    Ok(trimmed.to_string())
}
