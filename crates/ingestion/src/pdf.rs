//! PDF page extraction
//!
//! Splits a PDF into pages using lopdf. Every page in the page tree gets a
//! slot numbered 1..N in document order, even when no text can be read from
//! it, so sequence numbers never have gaps.

use crate::page_labels::page_labels;
use lopdf::Document;
use repoharvest_common::catalog::Page;
use tracing::{debug, warn};

/// Extract every page of an in-memory PDF
pub fn extract_pages(bytes: &[u8]) -> lopdf::Result<Vec<Page>> {
    let doc = Document::load_mem(bytes)?;

    let pages = doc.get_pages();
    let labels = page_labels(&doc, pages.len());

    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut result = Vec::with_capacity(pages.len());

    for (index, &page_number) in pages.keys().enumerate() {
        // An unreadable page keeps its slot with empty text
        let text = doc.extract_text(&[page_number]).unwrap_or_else(|e| {
            warn!(page = page_number, error = %e, "Page text could not be decoded");
            String::new()
        });

        result.push(Page::new(
            index as i32 + 1,
            labels[index].clone(),
            &clean_text(&text),
        ));
    }

    Ok(result)
}

/// Drop byte order marks and trailing whitespace; line structure is kept
fn clean_text(text: &str) -> String {
    text.replace('\u{FEFF}', "").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_an_error() {
        assert!(extract_pages(b"<html>not a pdf</html>").is_err());
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("\u{FEFF}Line one\nLine two  \n\n"), "Line one\nLine two");
    }
}
