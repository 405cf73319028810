//! In-memory document model for unit tests.
//!
//! A "document" is `%PDF-fake\n` followed by JSON. Each page is a string;
//! lines are laid out in a fixed-pitch grid so glyph boxes are predictable:
//! column `c` of line `l` spans x `72 + 6c .. 78 + 6c` and
//! y `710 - 14l .. 720 - 14l`. Newlines are generated glyphs without a box.

use crate::error::{Error, Result};
use crate::pdf::backend::check_pdf_header;
use crate::pdf::{Glyph, HighlightColor, PdfBackend, PdfDocumentAccess, Rect};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const HEADER: &[u8] = b"%PDF-fake\n";
pub const CHAR_WIDTH: f32 = 6.0;
pub const LINE_PITCH: f32 = 14.0;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FakeContent {
    pub pages: Vec<String>,
    /// (page, [left, bottom, right, top], "#RRGGBB")
    #[serde(default)]
    pub highlights: Vec<(u32, [f32; 4], String)>,
}

/// Build a fake PDF with the given page texts
pub fn fake_pdf(pages: &[&str]) -> Vec<u8> {
    let content = FakeContent {
        pages: pages.iter().map(|p| p.to_string()).collect(),
        highlights: Vec::new(),
    };
    encode(&content)
}

/// Decode a fake PDF written by [`FakeBackend`]
pub fn decode(data: &[u8]) -> Result<FakeContent> {
    check_pdf_header(data)?;
    let body = data.strip_prefix(HEADER).ok_or_else(|| Error::InvalidPdf {
        reason: "missing fake header".to_string(),
    })?;
    serde_json::from_slice(body).map_err(|e| Error::InvalidPdf {
        reason: e.to_string(),
    })
}

fn encode(content: &FakeContent) -> Vec<u8> {
    let mut data = HEADER.to_vec();
    data.extend(serde_json::to_vec(content).unwrap_or_default());
    data
}

fn glyph_box(line: usize, column: usize) -> Rect {
    let left = 72.0 + column as f32 * CHAR_WIDTH;
    let top = 720.0 - line as f32 * LINE_PITCH;
    Rect::new(left, top - 10.0, left + CHAR_WIDTH, top)
}

/// Test backend with a live-handle counter
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    open_handles: Arc<AtomicUsize>,
    opened_total: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles currently open
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    /// Handles opened since creation
    pub fn opened_total(&self) -> usize {
        self.opened_total.load(Ordering::SeqCst)
    }
}

impl PdfBackend for FakeBackend {
    fn with_document<R>(
        &self,
        data: &[u8],
        f: impl FnOnce(&mut dyn PdfDocumentAccess) -> Result<R>,
    ) -> Result<R> {
        let content = decode(data)?;
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        self.opened_total.fetch_add(1, Ordering::SeqCst);
        let mut document = FakeDocument {
            content,
            open_handles: Arc::clone(&self.open_handles),
        };
        f(&mut document)
    }
}

struct FakeDocument {
    content: FakeContent,
    open_handles: Arc<AtomicUsize>,
}

impl FakeDocument {
    fn page(&self, page: u32) -> Result<&str> {
        let total = self.page_count();
        if page < 1 || page > total {
            return Err(Error::PageOutOfBounds { page, total });
        }
        Ok(&self.content.pages[(page - 1) as usize])
    }
}

impl Drop for FakeDocument {
    fn drop(&mut self) {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PdfDocumentAccess for FakeDocument {
    fn page_count(&self) -> u32 {
        self.content.pages.len() as u32
    }

    fn page_text(&self, page: u32) -> Result<String> {
        Ok(self.page(page)?.to_string())
    }

    fn page_glyphs(&self, page: u32) -> Result<Vec<Glyph>> {
        let text = self.page(page)?;
        let mut glyphs = Vec::new();
        for (line_index, line) in text.split('\n').enumerate() {
            if line_index > 0 {
                glyphs.push(Glyph::new('\n', None));
            }
            for (column, ch) in line.chars().enumerate() {
                glyphs.push(Glyph::new(ch, Some(glyph_box(line_index, column))));
            }
        }
        Ok(glyphs)
    }

    fn add_highlights(&mut self, page: u32, rects: &[Rect], color: HighlightColor) -> Result<()> {
        self.page(page)?;
        for rect in rects {
            self.content.highlights.push((
                page,
                [rect.left, rect.bottom, rect.right, rect.top],
                color.to_string(),
            ));
        }
        Ok(())
    }

    fn save_to_bytes(&self) -> Result<Vec<u8>> {
        Ok(encode(&self.content))
    }
}
