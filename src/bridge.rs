//! Bridge between the UI layer and the document operations
//!
//! Every call resolves the document reference, runs the PDF work on the
//! blocking pool and turns any failure into a [`BridgeError`]. Nothing
//! panics or propagates past this boundary.

use crate::error::{Error, ErrorKind, Result};
use crate::extract::{self, PAGE_SEPARATOR};
use crate::highlight::{self, HighlightOutcome};
use crate::output::OutputStore;
use crate::pdf::{HighlightColor, PdfBackend};
use crate::source::{resolve_reference, DocumentRef, ResolvedPdf};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Prefix of a failed call in the legacy string encoding
pub const LEGACY_ERROR_PREFIX: &str = "ERROR: ";

/// Default download limit for URL references (100MB)
pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Failure as seen by the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct BridgeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for BridgeError {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.client_message(),
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for BridgeError {}

/// Encoding of a success value for hosts that only pass strings
pub trait LegacyEncode {
    fn legacy_encode(&self) -> String;
}

impl LegacyEncode for String {
    fn legacy_encode(&self) -> String {
        self.clone()
    }
}

impl LegacyEncode for HighlightOutcome {
    /// `<absolutePath>|<matchCount>`
    fn legacy_encode(&self) -> String {
        format!("{}|{}", self.output_path.display(), self.match_count)
    }
}

/// Legacy string form of a bridge result: the encoded value, or
/// `ERROR: <message>`
pub fn legacy_response<T: LegacyEncode>(result: &std::result::Result<T, BridgeError>) -> String {
    match result {
        Ok(value) => value.legacy_encode(),
        Err(err) => format!("{}{}", LEGACY_ERROR_PREFIX, err.message),
    }
}

/// Fire-and-forget user notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Writes notifications to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        tracing::info!(target: "corbas::toast", text = message, "notification");
    }
}

/// Forwards notifications to a receiver owned by the UI layer
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, message: &str) {
        if self.tx.send(message.to_string()).is_err() {
            tracing::debug!(text = message, "notification dropped, receiver closed");
        }
    }
}

/// Document operations exposed to the UI layer
pub struct Bridge<B: PdfBackend> {
    backend: Arc<B>,
    store: OutputStore,
    notifier: Arc<dyn Notifier>,
    max_download_bytes: u64,
    allow_private_urls: bool,
}

impl<B: PdfBackend> Clone for Bridge<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            store: self.store.clone(),
            notifier: Arc::clone(&self.notifier),
            max_download_bytes: self.max_download_bytes,
            allow_private_urls: self.allow_private_urls,
        }
    }
}

impl<B: PdfBackend> Bridge<B> {
    pub fn new(backend: B, store: OutputStore) -> Self {
        Self {
            backend: Arc::new(backend),
            store,
            notifier: Arc::new(LogNotifier),
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
            allow_private_urls: false,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_max_download_bytes(mut self, max_download_bytes: u64) -> Self {
        self.max_download_bytes = max_download_bytes;
        self
    }

    /// Permit URL sources on loopback, link-local and private networks
    pub fn with_allow_private_urls(mut self, allow: bool) -> Self {
        self.allow_private_urls = allow;
        self
    }

    pub fn output_store(&self) -> &OutputStore {
        &self.store
    }

    /// Text of every page as `(page_number, text)`
    pub async fn extract_pdf_pages(
        &self,
        reference: &str,
    ) -> std::result::Result<Vec<(u32, String)>, BridgeError> {
        self.process_extract(reference)
            .await
            .map_err(|e| Self::boundary_error("extract", reference, e))
    }

    /// Text of the whole document, pages separated by a blank line
    pub async fn extract_pdf_text(&self, reference: &str) -> std::result::Result<String, BridgeError> {
        let pages = self.extract_pdf_pages(reference).await?;
        Ok(pages
            .into_iter()
            .map(|(_, text)| text)
            .collect::<Vec<_>>()
            .join(PAGE_SEPARATOR))
    }

    /// Highlight the phrases of a JSON string array in the given color
    pub async fn highlight_pdf(
        &self,
        reference: &str,
        phrases_json: &str,
        color: &str,
    ) -> std::result::Result<HighlightOutcome, BridgeError> {
        let phrases = match highlight::parse_phrases_json(phrases_json) {
            Ok(p) => p,
            Err(e) => return Err(Self::boundary_error("highlight", reference, e)),
        };
        self.highlight_phrases(reference, phrases, color).await
    }

    /// Highlight an already-decoded phrase list
    pub async fn highlight_phrases(
        &self,
        reference: &str,
        phrases: Vec<String>,
        color: &str,
    ) -> std::result::Result<HighlightOutcome, BridgeError> {
        self.process_highlight(reference, phrases, color)
            .await
            .map_err(|e| Self::boundary_error("highlight", reference, e))
    }

    /// Show a message to the user; never fails
    pub fn show_toast(&self, message: &str) {
        self.notifier.notify(message);
    }

    fn boundary_error(operation: &str, reference: &str, err: Error) -> BridgeError {
        let source = DocumentRef::parse(reference)
            .map(|r| r.display_name())
            .unwrap_or_else(|_| "<unparsed>".to_string());
        tracing::warn!(operation, source = %source, error = %err, "bridge call failed");
        BridgeError::from(&err)
    }

    async fn resolve(&self, reference: &str) -> Result<ResolvedPdf> {
        let reference = DocumentRef::parse(reference)?;
        resolve_reference(
            &reference,
            self.allow_private_urls,
            self.max_download_bytes,
        )
        .await
    }

    async fn process_extract(&self, reference: &str) -> Result<Vec<(u32, String)>> {
        let resolved = self.resolve(reference).await?;
        let backend = Arc::clone(&self.backend);

        // Move CPU-heavy PDF work to blocking thread pool
        tokio::task::spawn_blocking(move || extract::extract_pages(backend.as_ref(), &resolved.data))
            .await
            .map_err(|e| Error::TaskJoin {
                reason: format!("Task join error: {}", e),
            })?
    }

    async fn process_highlight(
        &self,
        reference: &str,
        phrases: Vec<String>,
        color: &str,
    ) -> Result<HighlightOutcome> {
        let color: HighlightColor = color.parse()?;
        let resolved = self.resolve(reference).await?;
        let backend = Arc::clone(&self.backend);
        let store = self.store.clone();

        tokio::task::spawn_blocking(move || {
            highlight::highlight(backend.as_ref(), &resolved.data, &phrases, color, &store)
        })
        .await
        .map_err(|e| Error::TaskJoin {
            reason: format!("Task join error: {}", e),
        })?
    }
}
