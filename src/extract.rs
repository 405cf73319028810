//! Whole-document text extraction

use crate::error::Result;
use crate::pdf::PdfBackend;

/// Separator placed between consecutive pages
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Extract the text of every page, in order, as `(page_number, text)` pairs
pub fn extract_pages<B: PdfBackend>(backend: &B, data: &[u8]) -> Result<Vec<(u32, String)>> {
    backend.with_document(data, |document| {
        let page_count = document.page_count();
        let mut pages = Vec::with_capacity(page_count as usize);
        for page in 1..=page_count {
            pages.push((page, document.page_text(page)?));
        }
        Ok(pages)
    })
}

/// Extract the text of the whole document.
///
/// Pages are joined by a single blank line; nothing precedes the first page
/// and nothing follows the last.
pub fn extract_text<B: PdfBackend>(backend: &B, data: &[u8]) -> Result<String> {
    let pages = extract_pages(backend, data)?;
    tracing::debug!(pages = pages.len(), "extracted document text");

    Ok(pages
        .into_iter()
        .map(|(_, text)| text)
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR))
}
