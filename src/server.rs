//! MCP server implementation using rmcp

use crate::bridge::{legacy_response, Bridge, BridgeError, Notifier};
use crate::config::Config;
use crate::error::ErrorKind;
use crate::output::OutputStore;
use crate::pdf::{PdfBackend, PdfiumBackend};
use crate::readiness::{probe, ProbeStatus, ReadinessConfig};
use anyhow::Result;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Where to read a PDF from
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum PdfSource {
    /// File path (absolute or relative)
    Path {
        /// Path to the PDF file
        path: String,
    },
    /// Document URI as handed over by a UI (`file://` or `data:`)
    Uri {
        /// URI of the PDF
        uri: String,
    },
    /// Base64 encoded PDF data
    Base64 {
        /// Base64 encoded PDF content
        base64: String,
    },
    /// URL to download PDF from
    Url {
        /// URL of the PDF file
        url: String,
    },
}

const SOURCE_KEYS: [&str; 4] = ["path", "uri", "base64", "url"];

impl<'de> serde::Deserialize<'de> for PdfSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        let Some(obj) = value.as_object() else {
            return Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\", \"uri\", \"base64\", or \"url\", but got {}",
                match &value {
                    serde_json::Value::Array(_) => "an array",
                    serde_json::Value::String(_) => "a string",
                    serde_json::Value::Number(_) => "a number",
                    serde_json::Value::Bool(_) => "a boolean",
                    serde_json::Value::Null => "null",
                    _ => "unknown type",
                }
            )));
        };

        for key in SOURCE_KEYS {
            let Some(v) = obj.get(key) else { continue };
            let Some(s) = v.as_str() else {
                return Err(serde::de::Error::custom(format!(
                    "\"{}\" must be a string",
                    key
                )));
            };
            let s = s.to_string();
            return Ok(match key {
                "path" => PdfSource::Path { path: s },
                "uri" => PdfSource::Uri { uri: s },
                "base64" => PdfSource::Base64 { base64: s },
                _ => PdfSource::Url { url: s },
            });
        }

        let keys: Vec<&String> = obj.keys().collect();
        Err(serde::de::Error::custom(format!(
            "Invalid source: expected an object with one of \"path\", \"uri\", \"base64\", or \"url\", but got keys: {:?}",
            keys
        )))
    }
}

impl PdfSource {
    /// Reference string understood by the bridge
    pub fn reference(&self) -> String {
        match self {
            PdfSource::Path { path } => path.clone(),
            PdfSource::Uri { uri } => uri.clone(),
            PdfSource::Base64 { base64 } => format!("data:application/pdf;base64,{}", base64),
            PdfSource::Url { url } => url.clone(),
        }
    }

    /// Name reported back in results; never echoes inline payloads
    pub fn name(&self) -> String {
        match self {
            PdfSource::Path { path } => path.clone(),
            PdfSource::Uri { uri } if uri.starts_with("data:") => "<data-uri>".to_string(),
            PdfSource::Uri { uri } => uri.clone(),
            PdfSource::Base64 { .. } => "<base64>".to_string(),
            PdfSource::Url { url } => url.clone(),
        }
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractPdfTextParams {
    /// PDF source
    pub source: PdfSource,
    /// Return the bare legacy string (raw text or "ERROR: <message>") instead of JSON
    #[serde(default)]
    pub legacy: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ExtractPdfTextResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct HighlightPdfParams {
    /// PDF source
    pub source: PdfSource,
    /// Phrases to highlight, matched case-insensitively
    pub phrases: Vec<String>,
    /// Highlight color: a name ("yellow"), "#RRGGBB" or "rgb(r, g, b)" (default: yellow)
    #[serde(default)]
    pub color: Option<String>,
    /// Return the bare legacy string ("<path>|<count>" or "ERROR: <message>") instead of JSON
    #[serde(default)]
    pub legacy: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct HighlightPdfResult {
    pub source: String,
    /// Absolute path of the highlighted copy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Number of highlighted occurrences across all phrases
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phrase_counts: Option<BTreeMap<String, u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ShowToastParams {
    /// Message to show to the user
    pub message: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct BackendStatusResult {
    pub url: String,
    pub ready: bool,
    pub status: ProbeStatus,
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

async fn extract_response<B: PdfBackend>(
    bridge: &Bridge<B>,
    params: &ExtractPdfTextParams,
) -> String {
    let reference = params.source.reference();

    if params.legacy {
        return legacy_response(&bridge.extract_pdf_text(&reference).await);
    }

    let result = match bridge.extract_pdf_pages(&reference).await {
        Ok(pages) => ExtractPdfTextResult {
            source: params.source.name(),
            page_count: Some(pages.len() as u32),
            text: Some(
                pages
                    .into_iter()
                    .map(|(_, text)| text)
                    .collect::<Vec<_>>()
                    .join(crate::extract::PAGE_SEPARATOR),
            ),
            error: None,
            error_kind: None,
        },
        Err(BridgeError { kind, message }) => ExtractPdfTextResult {
            source: params.source.name(),
            text: None,
            page_count: None,
            error: Some(message),
            error_kind: Some(kind),
        },
    };
    to_json(&result)
}

async fn highlight_response<B: PdfBackend>(
    bridge: &Bridge<B>,
    params: HighlightPdfParams,
) -> String {
    let reference = params.source.reference();
    let color = params.color.unwrap_or_default();
    let outcome = bridge
        .highlight_phrases(&reference, params.phrases, &color)
        .await;

    if params.legacy {
        return legacy_response(&outcome);
    }

    let result = match outcome {
        Ok(outcome) => HighlightPdfResult {
            source: params.source.name(),
            output_path: Some(outcome.output_path.display().to_string()),
            match_count: Some(outcome.match_count),
            phrase_counts: Some(outcome.phrase_counts),
            error: None,
            error_kind: None,
        },
        Err(BridgeError { kind, message }) => HighlightPdfResult {
            source: params.source.name(),
            output_path: None,
            match_count: None,
            phrase_counts: None,
            error: Some(message),
            error_kind: Some(kind),
        },
    };
    to_json(&result)
}

async fn status_response(readiness: &ReadinessConfig) -> String {
    let status = probe(readiness).await;
    to_json(&BackendStatusResult {
        url: readiness.health_url.clone(),
        ready: status.is_ready(),
        status,
    })
}

/// CorBas MCP server
#[derive(Clone)]
pub struct CorbasServer {
    bridge: Bridge<PdfiumBackend>,
    readiness: Arc<ReadinessConfig>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl CorbasServer {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new CorbasServer with full configuration
    pub fn with_config(config: Config) -> Self {
        let backend = match &config.pdfium_lib_dir {
            Some(dir) => PdfiumBackend::with_library_dir(dir),
            None => PdfiumBackend::new(),
        };
        let bridge = Bridge::new(backend, OutputStore::new(&config.output_dir))
            .with_max_download_bytes(config.max_download_bytes)
            .with_allow_private_urls(config.allow_private_urls);
        Self {
            bridge,
            readiness: Arc::new(config.readiness()),
            tool_router: Self::tool_router(),
        }
    }

    /// Route `show_toast` to a custom notifier
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.bridge = self.bridge.with_notifier(notifier);
        self
    }

    /// Extract the text of a PDF
    #[tool(
        description = "Extract the text of every page of a PDF, in page order, pages separated by a blank line.

Source format: one of {\"path\": \"/absolute/path.pdf\"}, {\"uri\": \"file:///...\" or \"data:application/pdf;base64,...\"}, {\"url\": \"https://...\"}, or {\"base64\": \"...\"}"
    )]
    async fn extract_pdf_text(
        &self,
        Parameters(params): Parameters<ExtractPdfTextParams>,
    ) -> String {
        extract_response(&self.bridge, &params).await
    }

    /// Highlight phrases in a copy of a PDF
    #[tool(
        description = "Highlight every case-insensitive occurrence of the given phrases and save the result as a new PDF in the output directory. Returns the absolute path of the copy and the number of highlighted occurrences.

Source format: one of {\"path\": \"/absolute/path.pdf\"}, {\"uri\": \"file:///...\" or \"data:application/pdf;base64,...\"}, {\"url\": \"https://...\"}, or {\"base64\": \"...\"}"
    )]
    async fn highlight_pdf(&self, Parameters(params): Parameters<HighlightPdfParams>) -> String {
        highlight_response(&self.bridge, params).await
    }

    /// Show a short notification to the user
    #[tool(description = "Show a short notification message to the user.")]
    async fn show_toast(&self, Parameters(params): Parameters<ShowToastParams>) -> String {
        self.bridge.show_toast(&params.message);
        to_json(&serde_json::json!({ "delivered": true }))
    }

    /// Report whether the companion server answers its health check
    #[tool(description = "Check whether the companion server answers its health endpoint.")]
    async fn backend_status(&self) -> String {
        status_response(&self.readiness).await
    }
}

impl Default for CorbasServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for CorbasServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "CorBas extracts text from PDFs and writes highlighted copies of them. \
                 Highlighted copies are saved as new files; the input is never modified."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server with configuration from the environment
pub async fn run_server() -> Result<()> {
    run_server_with_config(Config::from_env()).await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: Config) -> Result<()> {
    tracing::info!(output_dir = %config.output_dir.display(), "output directory");
    let server = CorbasServer::with_config(config);

    tracing::info!("CorBas MCP server ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
