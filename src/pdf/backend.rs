//! Document model the extractor and highlighter are written against

use crate::error::Result;
use crate::pdf::HighlightColor;

/// Axis-aligned rectangle in PDF user space (points, origin bottom-left)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl Rect {
    pub fn new(left: f32, bottom: f32, right: f32, top: f32) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    /// Degenerate boxes come from generated characters and carry no position
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.min(other.left),
            bottom: self.bottom.min(other.bottom),
            right: self.right.max(other.right),
            top: self.top.max(other.top),
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.bottom < other.top
            && other.bottom < self.top
    }

    /// Vertical overlap as a fraction of the shorter of the two heights
    pub fn vertical_overlap(&self, other: &Rect) -> f32 {
        let overlap = self.top.min(other.top) - self.bottom.max(other.bottom);
        let shorter = self.height().min(other.height());
        if shorter <= 0.0 {
            return 0.0;
        }
        (overlap / shorter).max(0.0)
    }
}

/// One character of page text with its box, if the engine placed it
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub bounds: Option<Rect>,
}

impl Glyph {
    pub fn new(ch: char, bounds: Option<Rect>) -> Self {
        Self { ch, bounds }
    }
}

/// An opened document. Only reachable inside [`PdfBackend::with_document`].
///
/// Pages are 1-indexed.
pub trait PdfDocumentAccess {
    fn page_count(&self) -> u32;

    /// Plain text of one page
    fn page_text(&self, page: u32) -> Result<String>;

    /// Page text as a glyph sequence in reading order
    fn page_glyphs(&self, page: u32) -> Result<Vec<Glyph>>;

    /// Add one highlight annotation per rectangle
    fn add_highlights(&mut self, page: u32, rects: &[Rect], color: HighlightColor) -> Result<()>;

    /// Serialize the document, including any added annotations
    fn save_to_bytes(&self) -> Result<Vec<u8>>;
}

/// A PDF engine.
///
/// The document handle lives only for the duration of `f`; it is closed when
/// `with_document` returns, whether `f` succeeded or not.
pub trait PdfBackend: Send + Sync + 'static {
    fn with_document<R>(
        &self,
        data: &[u8],
        f: impl FnOnce(&mut dyn PdfDocumentAccess) -> Result<R>,
    ) -> Result<R>;
}

/// Cheap header check shared by every backend
pub(crate) fn check_pdf_header(data: &[u8]) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(crate::error::Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}
