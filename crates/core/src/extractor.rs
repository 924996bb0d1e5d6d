use crate::error::ExtractionError;
use lopdf::Document;
use tracing::debug;

/// Turns raw PDF bytes into the document's full text, pages in order.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, pdf_bytes: &[u8]) -> Result<String, ExtractionError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl TextExtractor for LopdfExtractor {
    fn extract(&self, pdf_bytes: &[u8]) -> Result<String, ExtractionError> {
        let document =
            Document::load_mem(pdf_bytes).map_err(|error| ExtractionError::Parse(error.to_string()))?;

        // get_pages is keyed by page number, so iteration follows page order.
        let mut pages = Vec::new();
        for page_no in document.get_pages().into_keys() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| ExtractionError::Parse(format!("page {page_no}: {error}")))?;
            pages.push(text);
        }

        debug!(pages = pages.len(), "extracted pdf text");
        Ok(pages.join("\n"))
    }
}
