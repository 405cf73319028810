//! Resolution of document references to PDF bytes

use crate::error::{Error, Result};
use crate::pdf::check_pdf_header;
use base64::Engine;
use futures_util::StreamExt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolved PDF data
pub struct ResolvedPdf {
    pub data: Vec<u8>,
    pub source_name: String,
}

/// A parsed document reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentRef {
    /// Local file, from a plain path or a `file://` URI
    Path(PathBuf),
    /// Inline base64 payload, from a `data:` URI
    Base64(String),
    /// Remote document
    Url(String),
}

impl DocumentRef {
    /// Parse a reference as handed over by the UI.
    ///
    /// Accepts `file://` URIs, `data:<mime>;base64,<payload>` URIs,
    /// `http(s)://` URLs and plain paths. Other URI schemes (for example
    /// Android `content://`) are rejected.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(Error::UnsupportedReference {
                reference: String::new(),
            });
        }

        if let Some(rest) = reference.strip_prefix("data:") {
            let (_, payload) = rest.split_once(";base64,").ok_or_else(|| {
                Error::UnsupportedReference {
                    reference: "data: URI without base64 payload".to_string(),
                }
            })?;
            return Ok(DocumentRef::Base64(payload.to_string()));
        }

        if !reference.contains("://") {
            return Ok(DocumentRef::Path(PathBuf::from(reference)));
        }

        let parsed = url::Url::parse(reference).map_err(|e| Error::SourceResolution {
            reason: format!("Invalid URI: {}", e),
        })?;

        match parsed.scheme() {
            "file" => parsed
                .to_file_path()
                .map(DocumentRef::Path)
                .map_err(|_| Error::SourceResolution {
                    reason: format!("Not a local file URI: {}", reference),
                }),
            "http" | "https" => Ok(DocumentRef::Url(reference.to_string())),
            _ => Err(Error::UnsupportedReference {
                reference: reference.to_string(),
            }),
        }
    }

    /// Name used in logs and results; never contains inline payloads
    pub fn display_name(&self) -> String {
        match self {
            DocumentRef::Path(path) => path.display().to_string(),
            DocumentRef::Base64(_) => "<base64>".to_string(),
            DocumentRef::Url(url) => url.clone(),
        }
    }
}

/// Resolve a file path to PDF data
pub fn resolve_path<P: AsRef<Path>>(path: P) -> Result<ResolvedPdf> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::DocumentNotFound {
            path: path.display().to_string(),
        });
    }

    let data = std::fs::read(path).map_err(Error::Io)?;
    check_pdf_header(&data)?;

    Ok(ResolvedPdf {
        data,
        source_name: path.display().to_string(),
    })
}

/// Resolve base64 encoded data to PDF data
pub fn resolve_base64(base64_data: &str) -> Result<ResolvedPdf> {
    let engine = base64::engine::general_purpose::STANDARD;
    let data = engine.decode(base64_data.trim())?;
    check_pdf_header(&data)?;

    Ok(ResolvedPdf {
        data,
        source_name: "<base64>".to_string(),
    })
}

/// Loopback, link-local, private and other non-public addresses
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                // 169.254/16, cloud metadata lives here
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // CGNAT 100.64/10
                || (octets[0] == 100 && (octets[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (first & 0xFE00) == 0xFC00
                // fe80::/10 link-local
                || (first & 0xFFC0) == 0xFE80
        }
    }
}

/// Resolve the URL's host and refuse it if any address is not public
async fn check_public_host(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).map_err(|e| Error::SourceResolution {
        reason: format!("Invalid URL: {}", e),
    })?;
    let host = parsed.host_str().ok_or_else(|| Error::SourceResolution {
        reason: "URL has no host".to_string(),
    })?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = parsed.port_or_known_default().unwrap_or(443);

    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| Error::SourceResolution {
            reason: format!("DNS resolution failed for {}: {}", host, e),
        })?;

    for addr in addrs {
        if is_private_ip(&addr.ip()) {
            tracing::warn!(url, ip = %addr.ip(), "refusing download from non-public address");
            return Err(Error::PrivateUrlBlocked {
                url: url.to_string(),
            });
        }
    }

    Ok(())
}

/// Resolve a URL to PDF data with a download size limit.
///
/// Hosts resolving to non-public addresses are refused unless
/// `allow_private_urls` is set.
pub async fn resolve_url(
    url: &str,
    allow_private_urls: bool,
    max_download_bytes: u64,
) -> Result<ResolvedPdf> {
    if !allow_private_urls {
        check_public_host(url).await?;
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(Error::HttpRequest)?;

    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(Error::SourceResolution {
            reason: format!("HTTP request failed with status: {}", response.status()),
        });
    }

    // Check Content-Length header for early rejection
    if let Some(content_length) = response.content_length() {
        if content_length > max_download_bytes {
            return Err(Error::DownloadTooLarge {
                size: content_length,
                max_size: max_download_bytes,
            });
        }
    }

    // Stream the body so an oversized response is cut off early
    let mut data = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Error::HttpRequest)?;
        data.extend_from_slice(&chunk);
        if data.len() as u64 > max_download_bytes {
            return Err(Error::DownloadTooLarge {
                size: data.len() as u64,
                max_size: max_download_bytes,
            });
        }
    }

    check_pdf_header(&data)?;

    Ok(ResolvedPdf {
        data,
        source_name: url.to_string(),
    })
}

/// Resolve any supported reference. File reads happen on the blocking pool.
pub async fn resolve_reference(
    reference: &DocumentRef,
    allow_private_urls: bool,
    max_download_bytes: u64,
) -> Result<ResolvedPdf> {
    match reference {
        DocumentRef::Path(path) => {
            let path = path.clone();
            tokio::task::spawn_blocking(move || resolve_path(path))
                .await
                .map_err(|e| Error::TaskJoin {
                    reason: e.to_string(),
                })?
        }
        DocumentRef::Base64(payload) => resolve_base64(payload),
        DocumentRef::Url(url) => resolve_url(url, allow_private_urls, max_download_bytes).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `body` once per connection over plain HTTP on loopback
    async fn serve_once(body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.write_all(body).await;
                let _ = stream.shutdown().await;
            }
        });
        format!("http://{}/doc.pdf", addr)
    }

    #[test]
    fn test_parse_plain_path() {
        assert_eq!(
            DocumentRef::parse("/docs/report.pdf").unwrap(),
            DocumentRef::Path(PathBuf::from("/docs/report.pdf"))
        );
        assert_eq!(
            DocumentRef::parse("relative/report.pdf").unwrap(),
            DocumentRef::Path(PathBuf::from("relative/report.pdf"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_file_uri_decodes_percent_escapes() {
        assert_eq!(
            DocumentRef::parse("file:///docs/my%20report.pdf").unwrap(),
            DocumentRef::Path(PathBuf::from("/docs/my report.pdf"))
        );
    }

    #[test]
    fn test_parse_data_uri() {
        assert_eq!(
            DocumentRef::parse("data:application/pdf;base64,JVBERi0xLjQ=").unwrap(),
            DocumentRef::Base64("JVBERi0xLjQ=".to_string())
        );
        assert!(matches!(
            DocumentRef::parse("data:text/plain,hello"),
            Err(Error::UnsupportedReference { .. })
        ));
    }

    #[test]
    fn test_parse_url() {
        assert_eq!(
            DocumentRef::parse("https://example.com/a.pdf").unwrap(),
            DocumentRef::Url("https://example.com/a.pdf".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_content_uri() {
        let result = DocumentRef::parse("content://com.android.providers/document/42");
        assert!(matches!(result, Err(Error::UnsupportedReference { .. })));
        assert!(matches!(
            DocumentRef::parse("   "),
            Err(Error::UnsupportedReference { .. })
        ));
    }

    #[test]
    fn test_display_name_hides_payload() {
        let reference = DocumentRef::Base64("JVBERi0xLjQ=".to_string());
        assert_eq!(reference.display_name(), "<base64>");
    }

    #[test]
    fn test_resolve_base64() {
        let resolved = resolve_base64("JVBERi0xLjQ=").unwrap(); // "%PDF-1.4"
        assert_eq!(resolved.data, b"%PDF-1.4");
        assert_eq!(resolved.source_name, "<base64>");
    }

    #[test]
    fn test_resolve_base64_invalid() {
        // Valid base64 but not PDF
        let result = resolve_base64("SGVsbG8gV29ybGQ="); // "Hello World"
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));
    }

    #[test]
    fn test_resolve_base64_invalid_base64() {
        let result = resolve_base64("not valid base64!!!");
        assert!(matches!(result, Err(Error::Base64Decode(_))));
    }

    #[test]
    fn test_resolve_path_not_found() {
        let result = resolve_path("/nonexistent/path/file.pdf");
        assert!(matches!(result, Err(Error::DocumentNotFound { .. })));
    }

    #[test]
    fn test_resolve_path_truncated_header() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("broken.pdf");
        std::fs::write(&path, b"%PD").unwrap();
        assert!(matches!(resolve_path(&path), Err(Error::InvalidPdf { .. })));
    }

    #[tokio::test]
    async fn test_resolve_reference_path() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("ok.pdf");
        std::fs::write(&path, b"%PDF-1.7 body").unwrap();

        let resolved = resolve_reference(&DocumentRef::Path(path.clone()), false, 1024)
            .await
            .unwrap();
        assert_eq!(resolved.data, b"%PDF-1.7 body");
        assert_eq!(resolved.source_name, path.display().to_string());
    }

    #[rstest]
    #[case("127.0.0.1", true)]
    #[case("10.1.2.3", true)]
    #[case("172.16.0.9", true)]
    #[case("192.168.1.1", true)]
    #[case("169.254.169.254", true)]
    #[case("100.64.0.1", true)]
    #[case("0.0.0.0", true)]
    #[case("::1", true)]
    #[case("fd00::1", true)]
    #[case("fe80::1", true)]
    #[case("::ffff:127.0.0.1", true)]
    #[case("93.184.216.34", false)]
    #[case("2606:4700::1111", false)]
    fn test_is_private_ip(#[case] ip: &str, #[case] private: bool) {
        let ip: IpAddr = ip.parse().unwrap();
        assert_eq!(is_private_ip(&ip), private);
    }

    #[tokio::test]
    async fn test_resolve_url_refuses_loopback() {
        let url = serve_once(b"%PDF-1.4 remote").await;
        let result = resolve_url(&url, false, 1024).await;
        assert!(matches!(result, Err(Error::PrivateUrlBlocked { .. })));
    }

    #[tokio::test]
    async fn test_resolve_url_refuses_metadata_address() {
        let result = resolve_url("http://169.254.169.254/latest/meta-data", false, 1024).await;
        assert!(matches!(result, Err(Error::PrivateUrlBlocked { .. })));
    }

    #[tokio::test]
    async fn test_resolve_url_private_allowed_when_enabled() {
        let url = serve_once(b"%PDF-1.4 remote").await;
        let resolved = resolve_url(&url, true, 1024).await.unwrap();
        assert_eq!(resolved.data, b"%PDF-1.4 remote");
        assert_eq!(resolved.source_name, url);
    }

    #[tokio::test]
    async fn test_resolve_url_enforces_size_limit() {
        let url = serve_once(b"%PDF-1.4 this body is longer than sixteen bytes").await;
        let result = resolve_url(&url, true, 16).await;
        assert!(matches!(result, Err(Error::DownloadTooLarge { .. })));
    }
}
