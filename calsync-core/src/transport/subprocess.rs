//! Transport backed by an external worker binary.
//!
//! The worker (e.g. `calsync-transport-caldav`) receives one JSON request
//! line on stdin. For a request it answers with one response line; for a
//! stream it writes one entity per line and finishes with a status line:
//!
//! ```text
//! {"type":"event","data":{...}}
//! {"type":"missingEvents","data":["cal1-a"]}
//! {"status":"success"}
//! ```
//!
//! Workers manage their own connections and credentials handling; the engine
//! only passes the account and calendar descriptors along.

use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

use crate::transport::{RemoteStream, StreamEntity, Transport, TransportError, TransportRequest};

const BINARY_PREFIX: &str = "calsync-transport-";
const UNAVAILABLE: &str = "transport-unavailable";
const MALFORMED: &str = "transport-malformed";

/// Response line written by a worker.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Response {
    Success {
        #[serde(default)]
        data: serde_json::Value,
    },
    Error {
        error: TransportError,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StreamLine {
    End(Response),
    Entity(StreamEntity),
}

#[derive(Clone, Debug)]
pub struct SubprocessTransport {
    name: String,
    /// Directories searched instead of `PATH`.
    search_path: Option<OsString>,
}

impl SubprocessTransport {
    pub fn from_name(name: &str) -> Self {
        SubprocessTransport {
            name: name.to_string(),
            search_path: None,
        }
    }

    /// Look the worker up in `search_path` (same syntax as `PATH`) only.
    pub fn with_search_path(name: &str, search_path: impl Into<OsString>) -> Self {
        SubprocessTransport {
            name: name.to_string(),
            search_path: Some(search_path.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn binary_path(&self) -> Result<PathBuf, TransportError> {
        let binary_name = format!("{BINARY_PREFIX}{}", self.name);
        let found = match &self.search_path {
            Some(paths) => which::which_in(&binary_name, Some(paths), "."),
            None => which::which(&binary_name),
        };
        found.map_err(|_| {
            TransportError::with_message(
                UNAVAILABLE,
                format!("Transport worker '{binary_name}' not found in PATH"),
            )
        })
    }

    /// Start the worker and hand it the request.
    async fn spawn(&self, request: &TransportRequest) -> Result<Child, TransportError> {
        let request_json = serde_json::to_string(request)
            .map_err(|e| TransportError::with_message(MALFORMED, e.to_string()))?;

        let binary_path = self.binary_path()?;

        let mut child = Command::new(&binary_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TransportError::with_message(
                    UNAVAILABLE,
                    format!("Failed to spawn {}: {}", binary_path.display(), e),
                )
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::with_message(UNAVAILABLE, "worker stdin unavailable"))?;
        stdin
            .write_all(format!("{request_json}\n").as_bytes())
            .await
            .map_err(io_error)?;
        drop(stdin);

        Ok(child)
    }
}

fn io_error(err: std::io::Error) -> TransportError {
    TransportError::with_message(UNAVAILABLE, err.to_string())
}

#[async_trait]
impl Transport for SubprocessTransport {
    async fn request(&self, request: TransportRequest) -> Result<serde_json::Value, TransportError> {
        let child = self.spawn(&request).await?;
        let output = child.wait_with_output().await.map_err(io_error)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let Some(line) = stdout.lines().find(|l| !l.trim().is_empty()) else {
            return Err(TransportError::with_message(
                MALFORMED,
                format!(
                    "Worker returned no response (exit status {})",
                    output.status.code().unwrap_or(-1)
                ),
            ));
        };

        let response: Response = serde_json::from_str(line)
            .map_err(|e| TransportError::with_message(MALFORMED, e.to_string()))?;

        match response {
            Response::Success { data } => Ok(data),
            Response::Error { error } => Err(error),
        }
    }

    fn stream(&self, request: TransportRequest) -> RemoteStream {
        let transport = self.clone();

        RemoteStream::new(move |sink| async move {
            let mut child = transport.spawn(&request).await?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| TransportError::with_message(UNAVAILABLE, "worker stdout unavailable"))?;
            let mut lines = BufReader::new(stdout).lines();

            while let Some(line) = lines.next_line().await.map_err(io_error)? {
                if line.trim().is_empty() {
                    continue;
                }

                match serde_json::from_str::<StreamLine>(&line) {
                    Ok(StreamLine::Entity(entity)) => {
                        sink.push(entity);
                    }
                    Ok(StreamLine::End(Response::Success { .. })) => {
                        child.wait().await.map_err(io_error)?;
                        return Ok(());
                    }
                    Ok(StreamLine::End(Response::Error { error })) => return Err(error),
                    Err(e) => return Err(TransportError::with_message(MALFORMED, e.to_string())),
                }
            }

            // Output ended without a status line.
            let status = child.wait().await.map_err(io_error)?;
            Err(TransportError::stream_closed(format!(
                "worker exited with status {}",
                status.code().unwrap_or(-1)
            )))
        })
    }
}
