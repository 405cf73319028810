//! CorBas PDF bridge
//!
//! Text extraction and phrase highlighting for PDF documents, exposed to a
//! UI layer through [`Bridge`] and to MCP clients through [`CorbasServer`]:
//! - `extract_pdf_text`: Extract the text of every page
//! - `highlight_pdf`: Highlight phrases into a new copy of the document
//! - `show_toast`: Notify the user
//! - `backend_status`: Check the companion server

pub mod bridge;
pub mod config;
pub mod error;
pub mod extract;
pub mod highlight;
pub mod output;
pub mod pdf;
pub mod readiness;
pub mod server;
pub mod source;

pub use bridge::{legacy_response, Bridge, BridgeError, ChannelNotifier, LogNotifier, Notifier};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use highlight::HighlightOutcome;
pub use output::OutputStore;
pub use readiness::{wait_until_ready, Companion, ProbeStatus, ReadinessConfig, ReadyReport};
pub use server::{run_server, run_server_with_config, CorbasServer, PdfSource};
