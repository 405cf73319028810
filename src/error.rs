//! Error types for the CorBas PDF bridge

use serde::Serialize;
use thiserror::Error;

/// Result type alias for the CorBas PDF bridge
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], as reported across the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The input is not a PDF the engine can open
    DocumentParse,
    /// Reading the input failed
    Io,
    /// The highlighted copy could not be written
    OutputWrite,
    /// Caller-supplied arguments were rejected
    InvalidInput,
    /// The PDF engine or the companion server is unavailable
    Backend,
}

/// Error types for the CorBas PDF bridge
#[derive(Error, Debug)]
pub enum Error {
    /// Document reference points at nothing
    #[error("PDF not found: {path}")]
    DocumentNotFound { path: String },

    /// Bytes are not a parseable PDF
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// PDF is encrypted and cannot be opened without a password
    #[error("PDF is password protected")]
    PasswordRequired,

    /// PDFium rejected or failed on the document
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// PDFium shared library could not be bound
    #[error("PDFium library unavailable: {reason}")]
    PdfiumUnavailable { reason: String },

    /// Page out of bounds
    #[error("Page {page} out of bounds (total: {total})")]
    PageOutOfBounds { page: u32, total: u32 },

    /// Output directory or file could not be written
    #[error("Failed to write output {path}: {source}")]
    OutputWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Phrase list was not a JSON array of strings
    #[error("Invalid phrase list: {0}")]
    InvalidPhrases(#[from] serde_json::Error),

    /// Color string could not be parsed
    #[error("Invalid highlight color: {value}")]
    InvalidColor { value: String },

    /// Reference scheme is not supported
    #[error("Unsupported document reference: {reference}")]
    UnsupportedReference { reference: String },

    /// Source resolution error
    #[error("Failed to resolve source: {reason}")]
    SourceResolution { reason: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// URL host resolves to a loopback, link-local or private address
    #[error("URL resolves to a non-public address: {url}")]
    PrivateUrlBlocked { url: String },

    /// Download too large
    #[error("Download too large: {size} bytes (max: {max_size} bytes)")]
    DownloadTooLarge { size: u64, max_size: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Companion server did not become ready in time
    #[error("Companion server at {url} not ready after {waited_ms} ms: {reason}")]
    BackendNotReady {
        url: String,
        waited_ms: u64,
        reason: String,
    },

    /// Blocking worker failed to complete
    #[error("Worker task failed: {reason}")]
    TaskJoin { reason: String },
}

impl Error {
    /// Classify the error for the bridge boundary
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidPdf { .. } | Error::PasswordRequired | Error::Pdfium { .. } => {
                ErrorKind::DocumentParse
            }
            Error::PageOutOfBounds { .. } => ErrorKind::DocumentParse,
            Error::OutputWrite { .. } => ErrorKind::OutputWrite,
            Error::InvalidPhrases(_)
            | Error::InvalidColor { .. }
            | Error::PrivateUrlBlocked { .. } => ErrorKind::InvalidInput,
            Error::DocumentNotFound { .. }
            | Error::UnsupportedReference { .. }
            | Error::SourceResolution { .. }
            | Error::Base64Decode(_)
            | Error::HttpRequest(_)
            | Error::DownloadTooLarge { .. }
            | Error::Io(_) => ErrorKind::Io,
            Error::PdfiumUnavailable { .. }
            | Error::BackendNotReady { .. }
            | Error::TaskJoin { .. } => ErrorKind::Backend,
        }
    }

    /// Return a sanitized error message safe to show to the end user.
    /// Internal details (paths, library errors, file sizes) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::DocumentNotFound { .. } => "PDF not found".to_string(),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::PasswordRequired => "PDF is password protected".to_string(),
            Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::PdfiumUnavailable { .. } => "PDF engine unavailable".to_string(),
            Error::PageOutOfBounds { page, total } => {
                format!("Page {} out of bounds (total: {})", page, total)
            }
            Error::OutputWrite { .. } => "Could not save highlighted PDF".to_string(),
            Error::InvalidPhrases(_) => "Phrases must be a JSON array of strings".to_string(),
            Error::InvalidColor { value } => format!("Invalid highlight color: {}", value),
            Error::UnsupportedReference { .. } => "Unsupported document reference".to_string(),
            Error::SourceResolution { .. } => "Failed to resolve PDF source".to_string(),
            Error::Base64Decode(_) => "Invalid base64 data".to_string(),
            Error::HttpRequest(_) => "HTTP request failed".to_string(),
            Error::PrivateUrlBlocked { .. } => "URL not allowed".to_string(),
            Error::DownloadTooLarge { max_size, .. } => {
                format!("Download exceeds maximum size of {} bytes", max_size)
            }
            Error::Io(_) => "I/O error".to_string(),
            Error::BackendNotReady { .. } => "Companion server is not ready".to_string(),
            Error::TaskJoin { .. } => "Internal error".to_string(),
        }
    }
}
