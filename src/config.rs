//! Configuration for the CorBas PDF bridge

use crate::bridge::DEFAULT_MAX_DOWNLOAD_BYTES;
use crate::readiness::{ReadinessConfig, DEFAULT_HEALTH_URL};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default output directory for highlighted copies
pub const DEFAULT_OUTPUT_DIR: &str = "./CorBas";

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory receiving highlighted copies
    pub output_dir: PathBuf,
    /// Companion server health endpoint
    pub backend_url: String,
    /// Companion command line, started before serving when set
    pub backend_command: Option<Vec<String>>,
    /// Upper bound on the companion readiness wait
    pub ready_timeout: Duration,
    /// Maximum download size in bytes for URL sources (default: 100MB)
    pub max_download_bytes: u64,
    /// Allow URL sources that resolve to private/reserved IPs (default: false)
    pub allow_private_urls: bool,
    /// Directory holding the PDFium shared library
    pub pdfium_lib_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            backend_url: DEFAULT_HEALTH_URL.to_string(),
            backend_command: None,
            ready_timeout: Duration::from_secs(30),
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
            allow_private_urls: false,
            pdfium_lib_dir: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unparsable numbers fall
    /// back to their defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Config {
            output_dir: non_empty("CORBAS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            backend_url: non_empty("CORBAS_BACKEND_URL").unwrap_or(defaults.backend_url),
            backend_command: non_empty("CORBAS_BACKEND_CMD")
                .map(|cmd| cmd.split_whitespace().map(str::to_string).collect()),
            ready_timeout: non_empty("CORBAS_READY_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.ready_timeout),
            max_download_bytes: non_empty("CORBAS_MAX_DOWNLOAD_BYTES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_download_bytes),
            allow_private_urls: non_empty("CORBAS_ALLOW_PRIVATE_URLS")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.allow_private_urls),
            pdfium_lib_dir: non_empty("PDFIUM_LIB_DIR").map(PathBuf::from),
        }
    }

    pub fn readiness(&self) -> ReadinessConfig {
        ReadinessConfig {
            health_url: self.backend_url.clone(),
            timeout: self.ready_timeout,
            ..ReadinessConfig::default()
        }
    }
}
