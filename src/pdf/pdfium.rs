//! PDFium binding of the document model

use crate::error::{Error, Result};
use crate::pdf::backend::check_pdf_header;
use crate::pdf::{Glyph, HighlightColor, PdfBackend, PdfDocumentAccess, Rect};
use pdfium_render::prelude::*;
use std::path::PathBuf;

/// Directories searched for the PDFium shared library before falling back to
/// the system library path
const DEFAULT_LIBRARY_DIRS: &[&str] = &["./", "/opt/pdfium/lib"];

/// PDF engine backed by PDFium.
///
/// A fresh binding is created for every document; PDFium is not thread-safe,
/// so no binding is shared between calls.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    library_dir: Option<PathBuf>,
}

impl PdfiumBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look for the PDFium library in `dir` first
    pub fn with_library_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: Some(dir.into()),
        }
    }

    /// Whether the shared library can be bound at all
    pub fn is_available(&self) -> bool {
        self.bind().is_ok()
    }

    fn bind(&self) -> Result<Pdfium> {
        let mut dirs: Vec<String> = Vec::new();
        if let Some(dir) = &self.library_dir {
            dirs.push(dir.to_string_lossy().into_owned());
        }
        dirs.extend(DEFAULT_LIBRARY_DIRS.iter().map(|d| d.to_string()));

        for dir in &dirs {
            if let Ok(bindings) =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            {
                return Ok(Pdfium::new(bindings));
            }
        }

        let bindings = Pdfium::bind_to_system_library().map_err(|e| Error::PdfiumUnavailable {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

        Ok(Pdfium::new(bindings))
    }
}

impl PdfBackend for PdfiumBackend {
    fn with_document<R>(
        &self,
        data: &[u8],
        f: impl FnOnce(&mut dyn PdfDocumentAccess) -> Result<R>,
    ) -> Result<R> {
        check_pdf_header(data)?;

        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(map_load_error)?;

        let mut handle = PdfiumDocument { document };
        let result = f(&mut handle);
        // FPDF_CloseDocument runs here, before the result leaves the scope
        drop(handle);
        result
    }
}

/// Map load failures to document-parse errors
fn map_load_error(err: PdfiumError) -> Error {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            Error::PasswordRequired
        }
        _ => Error::InvalidPdf {
            reason: format!("{}", err),
        },
    }
}

fn pdfium_error(context: &str, err: PdfiumError) -> Error {
    Error::Pdfium {
        reason: format!("{}: {}", context, err),
    }
}

fn to_rect(rect: &PdfRect) -> Rect {
    Rect::new(
        rect.left().value,
        rect.bottom().value,
        rect.right().value,
        rect.top().value,
    )
}

fn to_pdf_rect(rect: &Rect) -> PdfRect {
    PdfRect::new_from_values(rect.bottom, rect.left, rect.top, rect.right)
}

fn to_pdf_color(color: HighlightColor) -> PdfColor {
    PdfColor::new(color.red, color.green, color.blue, 255)
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl PdfiumDocument<'_> {
    fn page(&self, page: u32) -> Result<PdfPage<'_>> {
        let total = self.page_count();
        if page < 1 || page > total {
            return Err(Error::PageOutOfBounds { page, total });
        }

        self.document
            .pages()
            .get((page - 1) as u16)
            .map_err(|e| pdfium_error(&format!("Failed to get page {}", page), e))
    }
}

impl PdfDocumentAccess for PdfiumDocument<'_> {
    fn page_count(&self) -> u32 {
        self.document.pages().len() as u32
    }

    fn page_text(&self, page_number: u32) -> Result<String> {
        let page = self.page(page_number)?;
        // Pages without a text layer (scans) read as empty
        let result = match page.text() {
            Ok(text) => Ok(text.all()),
            Err(e) => {
                tracing::warn!(page = page_number, error = %e, "no text layer, reading page as empty");
                Ok(String::new())
            }
        };
        result
    }

    fn page_glyphs(&self, page_number: u32) -> Result<Vec<Glyph>> {
        let page = self.page(page_number)?;
        let text = match page.text() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(page = page_number, error = %e, "no text layer, page cannot match");
                return Ok(Vec::new());
            }
        };

        let glyphs = text
            .chars()
            .iter()
            .filter_map(|char_result| {
                let ch = char_result.unicode_char()?;
                let bounds = char_result
                    .loose_bounds()
                    .ok()
                    .map(|b| to_rect(&b))
                    .filter(|r| !r.is_empty());
                Some(Glyph::new(ch, bounds))
            })
            .collect();

        Ok(glyphs)
    }

    fn add_highlights(&mut self, page: u32, rects: &[Rect], color: HighlightColor) -> Result<()> {
        if rects.is_empty() {
            return Ok(());
        }

        let mut page = self.page(page)?;
        let color = to_pdf_color(color);

        for rect in rects {
            let bounds = to_pdf_rect(rect);
            let mut annotation = page
                .annotations_mut()
                .create_highlight_annotation()
                .map_err(|e| pdfium_error("Failed to create highlight", e))?;

            annotation
                .set_bounds(bounds)
                .map_err(|e| pdfium_error("Failed to set highlight bounds", e))?;
            annotation
                .attachment_points_mut()
                .create_attachment_point_at_end(PdfQuadPoints::from_rect(&bounds))
                .map_err(|e| pdfium_error("Failed to set highlight quad points", e))?;
            annotation
                .set_stroke_color(color)
                .map_err(|e| pdfium_error("Failed to set highlight color", e))?;
            annotation
                .set_fill_color(color)
                .map_err(|e| pdfium_error("Failed to set highlight color", e))?;
        }

        Ok(())
    }

    fn save_to_bytes(&self) -> Result<Vec<u8>> {
        self.document
            .save_to_bytes()
            .map_err(|e| pdfium_error("Failed to save PDF", e))
    }
}

/// Bounds of every highlight annotation, grouped by page (1-indexed)
pub fn highlight_annotations(
    backend: &PdfiumBackend,
    data: &[u8],
) -> Result<Vec<(u32, Vec<Rect>)>> {
    check_pdf_header(data)?;

    let pdfium = backend.bind()?;
    let document = pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(map_load_error)?;

    let mut result = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let rects: Vec<Rect> = page
            .annotations()
            .iter()
            .filter(|annotation| annotation.annotation_type() == PdfPageAnnotationType::Highlight)
            .filter_map(|annotation| annotation.bounds().ok().map(|b| to_rect(&b)))
            .collect();
        result.push((index as u32 + 1, rects));
    }

    Ok(result)
}
