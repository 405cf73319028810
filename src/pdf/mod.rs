//! PDF processing layer
//!
//! The extractor and highlighter only see the [`PdfBackend`] /
//! [`PdfDocumentAccess`] pair; [`PdfiumBackend`] binds it to PDFium.

mod backend;
mod color;
mod pdfium;

#[cfg(test)]
pub(crate) mod testing;

pub(crate) use backend::check_pdf_header;
pub use backend::{Glyph, PdfBackend, PdfDocumentAccess, Rect};
pub use color::HighlightColor;
pub use pdfium::{highlight_annotations, PdfiumBackend};
