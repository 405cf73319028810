//! Companion server readiness
//!
//! Polls the companion's health endpoint until it answers with a 2xx
//! status, bounded by a timeout.

use crate::error::{Error, Result};
use serde::Serialize;
use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::Instant;

/// Default health endpoint of the companion server
pub const DEFAULT_HEALTH_URL: &str = "http://127.0.0.1:5000/health";

/// How to wait for the companion server
#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    pub health_url: String,
    /// Upper bound on the whole wait
    pub timeout: Duration,
    /// Pause between attempts
    pub poll_interval: Duration,
    /// Timeout of a single health request
    pub request_timeout: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            health_url: DEFAULT_HEALTH_URL.to_string(),
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(250),
            request_timeout: Duration::from_secs(2),
        }
    }
}

impl ReadinessConfig {
    pub fn new(health_url: impl Into<String>) -> Self {
        Self {
            health_url: health_url.into(),
            ..Self::default()
        }
    }
}

/// Result of a single health probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProbeStatus {
    /// Answered with a success status
    Ready { status: u16 },
    /// Answered, but not with a success status
    NotReady { status: u16 },
    /// No answer
    Unreachable { reason: String },
}

impl ProbeStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeStatus::Ready { .. })
    }

    fn describe(&self) -> String {
        match self {
            ProbeStatus::Ready { status } => format!("ready (HTTP {})", status),
            ProbeStatus::NotReady { status } => format!("HTTP {}", status),
            ProbeStatus::Unreachable { reason } => reason.clone(),
        }
    }
}

/// Successful wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyReport {
    pub url: String,
    pub attempts: u32,
    pub elapsed: Duration,
    pub status: u16,
}

fn build_client(config: &ReadinessConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(Error::HttpRequest)
}

async fn probe_with(client: &reqwest::Client, url: &str) -> ProbeStatus {
    match client.get(url).send().await {
        Ok(response) => {
            let status = response.status();
            if status.is_success() {
                ProbeStatus::Ready {
                    status: status.as_u16(),
                }
            } else {
                ProbeStatus::NotReady {
                    status: status.as_u16(),
                }
            }
        }
        Err(e) => ProbeStatus::Unreachable {
            reason: e.to_string(),
        },
    }
}

/// Single health request
pub async fn probe(config: &ReadinessConfig) -> ProbeStatus {
    match build_client(config) {
        Ok(client) => probe_with(&client, &config.health_url).await,
        Err(e) => ProbeStatus::Unreachable {
            reason: e.to_string(),
        },
    }
}

/// Poll until the companion answers or `config.timeout` elapses
pub async fn wait_until_ready(config: &ReadinessConfig) -> Result<ReadyReport> {
    poll_until_ready(config, || None).await
}

/// `exited` is checked before every attempt; `Some(reason)` ends the wait
async fn poll_until_ready<F>(config: &ReadinessConfig, mut exited: F) -> Result<ReadyReport>
where
    F: FnMut() -> Option<String>,
{
    let client = build_client(config)?;
    let started = Instant::now();
    let deadline = started + config.timeout;
    let mut attempts = 0u32;

    loop {
        if let Some(reason) = exited() {
            return Err(Error::BackendNotReady {
                url: config.health_url.clone(),
                waited_ms: started.elapsed().as_millis() as u64,
                reason,
            });
        }

        attempts += 1;
        let status = probe_with(&client, &config.health_url).await;
        if let ProbeStatus::Ready { status } = status {
            let report = ReadyReport {
                url: config.health_url.clone(),
                attempts,
                elapsed: started.elapsed(),
                status,
            };
            tracing::info!(
                url = %report.url,
                attempts,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "companion server ready"
            );
            return Ok(report);
        }
        tracing::debug!(url = %config.health_url, attempts, status = %status.describe(), "companion not ready");

        let now = Instant::now();
        if now >= deadline {
            return Err(Error::BackendNotReady {
                url: config.health_url.clone(),
                waited_ms: started.elapsed().as_millis() as u64,
                reason: status.describe(),
            });
        }
        tokio::time::sleep(config.poll_interval.min(deadline - now)).await;
    }
}

/// Companion server process, killed when dropped
#[derive(Debug)]
pub struct Companion {
    child: Child,
    report: ReadyReport,
}

impl Companion {
    /// Launch the companion and wait until its health endpoint is up.
    ///
    /// A child that exits before becoming ready fails the wait immediately.
    pub async fn spawn<I, S>(command: &str, args: I, config: &ReadinessConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        // stdout carries the MCP transport; keep the child off it
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        tracing::info!(command, pid = child.id(), "spawned companion server");

        let report = poll_until_ready(config, || match child.try_wait() {
            Ok(Some(status)) => Some(format!("companion exited early ({})", status)),
            Ok(None) => None,
            Err(e) => Some(format!("companion status unavailable: {}", e)),
        })
        .await?;

        Ok(Self { child, report })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn report(&self) -> &ReadyReport {
        &self.report
    }

    /// Kill the companion and wait for it to exit
    pub async fn shutdown(mut self) -> Result<()> {
        self.child.kill().await?;
        Ok(())
    }
}
