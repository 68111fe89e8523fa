//! Plain-text extraction from uploaded bytes.

use bytes::Bytes;

use crate::errors::AppError;

fn is_pdf(filename: &str) -> bool {
    filename.to_lowercase().ends_with(".pdf")
}

/// Extracts text from an upload. PDFs go through `pdf-extract`; anything else
/// is decoded as UTF-8, replacing invalid sequences.
pub async fn extract_text(filename: &str, data: Bytes) -> Result<String, AppError> {
    if !is_pdf(filename) {
        return Ok(String::from_utf8_lossy(&data).into_owned());
    }

    // PDF parsing is CPU-bound; keep it off the async executor.
    let name = filename.to_string();
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in PDF extraction: {e}")))?
        .map_err(|e| AppError::UnprocessableEntity(format!("Failed to extract text from PDF '{name}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_detection_is_case_insensitive() {
        assert!(is_pdf("CV.PDF"));
        assert!(is_pdf("resume.pdf"));
        assert!(!is_pdf("resume.txt"));
        assert!(!is_pdf("pdf"));
    }

    #[tokio::test]
    async fn test_plain_text_is_lossy_utf8() {
        let text = extract_text("cv.txt", Bytes::from_static(b"Rust \xff dev"))
            .await
            .unwrap();
        assert_eq!(text, "Rust \u{fffd} dev");
    }

    #[tokio::test]
    async fn test_garbage_pdf_is_an_error() {
        let result = extract_text("cv.pdf", Bytes::from_static(b"not a pdf")).await;
        assert!(result.is_err());
    }
}
