//! Resolution server — the exposed endpoint of the approval engine.
//!
//! Listens on a Unix domain socket. A reviewer frontend sends JSON-line
//! [`ResolutionRequest`]s; the server:
//! 1. Resolves the session token to an identity
//! 2. Hands the decision to the replay engine (which runs the review gate)
//! 3. Answers with an HTTP-style status
//! 4. Logs every resolution attempt, regardless of outcome

use crate::audit::{AuditLogger, ResolutionLogEntry};
use crate::error::ApprovalError;
use crate::gateway::protocol::{ResolutionRequest, ResolutionResponse};
use crate::identity::IdentityResolver;
use crate::replay::{ReplayEngine, ResolutionDecision};
use crate::request::RequestId;
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::Mutex;

/// The server that mediates all resolution traffic.
pub struct ResolutionServer {
    /// Path to the Unix socket
    socket_path: PathBuf,
    /// Resolves session tokens to identities
    identities: Arc<dyn IdentityResolver>,
    /// The engine that validates and applies resolutions
    engine: Arc<ReplayEngine>,
    /// Audit logger
    logger: Arc<Mutex<AuditLogger>>,
}

impl ResolutionServer {
    pub fn new(
        socket_path: impl AsRef<Path>,
        identities: Arc<dyn IdentityResolver>,
        engine: Arc<ReplayEngine>,
        logger: AuditLogger,
    ) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            identities,
            engine,
            logger: Arc::new(Mutex::new(logger)),
        }
    }

    /// Start the server. Listens for connections and handles requests.
    pub async fn run(&self) -> Result<()> {
        // Remove existing socket if present
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("Failed to bind socket: {}", self.socket_path.display()))?;

        tracing::info!("Resolution endpoint listening on {}", self.socket_path.display());

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let identities = self.identities.clone();
                    let engine = self.engine.clone();
                    let logger = self.logger.clone();

                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(stream, identities, engine, logger).await
                        {
                            tracing::error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

/// Handle a single connection from a reviewer frontend.
async fn handle_connection(
    stream: tokio::net::UnixStream,
    identities: Arc<dyn IdentityResolver>,
    engine: Arc<ReplayEngine>,
    logger: Arc<Mutex<AuditLogger>>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // Connection closed
        }

        let response = match serde_json::from_str::<ResolutionRequest>(line.trim()) {
            Ok(request) => process_resolution(&request, &identities, &engine, &logger).await,
            Err(e) => ResolutionResponse::failure(400, format!("Invalid request JSON: {e}")),
        };

        let json = serde_json::to_string(&response)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Process a single resolution request.
pub async fn process_resolution(
    request: &ResolutionRequest,
    identities: &Arc<dyn IdentityResolver>,
    engine: &Arc<ReplayEngine>,
    logger: &Mutex<AuditLogger>,
) -> ResolutionResponse {
    let start = std::time::Instant::now();
    let decision = if request.approved {
        ResolutionDecision::Approve
    } else {
        ResolutionDecision::Reject
    };

    let reviewer = match identities.resolve(&request.token).await {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            return ResolutionResponse::from_error(&ApprovalError::Unauthenticated);
        }
        Err(e) => {
            tracing::error!("Identity resolver failed: {}", e);
            return ResolutionResponse::failure(500, format!("identity resolution failed: {e}"));
        }
    };

    // An unparseable id cannot name any known request.
    let Ok(request_id) = request.request_id.parse::<RequestId>() else {
        return ResolutionResponse::failure(
            404,
            format!("approval request {} not found", request.request_id),
        );
    };

    let result = engine
        .resolve(
            &request_id,
            decision,
            &reviewer,
            request.verification_code.as_deref(),
        )
        .await;
    let duration_us = start.elapsed().as_micros() as u64;

    // Log the attempt (always, regardless of outcome)
    let entry = match &result {
        Ok(resolution) => ResolutionLogEntry {
            timestamp: Utc::now(),
            request_id: request.request_id.clone(),
            resource: Some(resolution.request.resource_id.clone()),
            action: Some(resolution.request.action),
            decision,
            reviewer: Some(reviewer.username.clone()),
            requester: Some(resolution.request.requester_id.clone()),
            ok: true,
            error: None,
            duration_us: Some(duration_us),
        },
        Err(e) => ResolutionLogEntry {
            timestamp: Utc::now(),
            request_id: request.request_id.clone(),
            resource: None,
            action: None,
            decision,
            reviewer: Some(reviewer.username.clone()),
            requester: None,
            ok: false,
            error: Some(e.to_string()),
            duration_us: Some(duration_us),
        },
    };
    if let Err(e) = logger.lock().await.log(&entry) {
        tracing::error!("Failed to write audit log: {}", e);
    }

    match result {
        Ok(_) => ResolutionResponse::success(),
        Err(e) => ResolutionResponse::from_error(&e),
    }
}
