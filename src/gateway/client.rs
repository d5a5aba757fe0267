//! Resolution client — sends decisions to the endpoint over a Unix socket.
//!
//! Used by reviewer-side tooling and by the integration tests to exercise
//! the full resolution flow.

use crate::gateway::protocol::{ResolutionRequest, ResolutionResponse};
use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

/// Client for the changegate resolution endpoint.
pub struct ResolutionClient {
    socket_path: PathBuf,
}

impl ResolutionClient {
    /// Create a new client pointing at a resolution socket.
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    /// Send a resolution and receive the response (synchronous).
    /// Each call opens a new connection — simple and reliable.
    pub fn resolve(&self, request: &ResolutionRequest) -> Result<ResolutionResponse> {
        let mut stream = UnixStream::connect(&self.socket_path).with_context(|| {
            format!(
                "Failed to connect to resolution endpoint at {}",
                self.socket_path.display()
            )
        })?;

        // Send the request as a JSON line
        let json = serde_json::to_string(request)?;
        stream.write_all(json.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;

        // Read the response
        let mut reader = BufReader::new(stream);
        let mut response_line = String::new();
        reader.read_line(&mut response_line)?;

        let response: ResolutionResponse = serde_json::from_str(response_line.trim())
            .context("Failed to parse resolution response")?;
        Ok(response)
    }
}
