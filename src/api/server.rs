//! TCP server for responder consoles
//!
//! One task per connection. Frames on a connection are handled in order, so
//! replies come back in the order the requests were sent.

use super::handler::{self, SERVER_ID};
use crate::coordinator::Coordinator;
use aeroreach_shared::codec::{self, CodecError, FrameDecoder};
use aeroreach_shared::protocol::{ApiResponse, Envelope, Header, RequestEnvelope};
use aeroreach_shared::ErrorCode;
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

pub struct ApiServer {
    listener: TcpListener,
    coordinator: Arc<Coordinator>,
}

impl ApiServer {
    pub async fn bind(addr: SocketAddr, coordinator: Arc<Coordinator>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            coordinator,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails
    pub async fn run(self) -> Result<()> {
        info!("API listening on {}", self.local_addr()?);

        loop {
            let (stream, addr) = self.listener.accept().await?;
            info!("Console connected: {}", addr);

            let coordinator = self.coordinator.clone();
            tokio::spawn(async move {
                match serve_connection(stream, coordinator).await {
                    Ok(()) => info!("Console disconnected: {}", addr),
                    Err(e) => warn!("Console {} dropped: {}", addr, e),
                }
            });
        }
    }
}

/// Reply for a frame that never made it to the coordinator
fn rejection(sequence_id: u64, message: impl Into<String>) -> Envelope<ApiResponse> {
    Envelope {
        header: Header::new(SERVER_ID, sequence_id),
        body: ApiResponse::bad_request(message),
    }
}

/// Stand-in for a reply that does not fit in one frame
fn oversized(sequence_id: u64, size: usize) -> Envelope<ApiResponse> {
    Envelope {
        header: Header::new(SERVER_ID, sequence_id),
        body: ApiResponse::Error {
            code: ErrorCode::ResponseTooLarge,
            message: format!(
                "reply of {size} bytes exceeds the {} byte frame limit; pass a filter or limit",
                codec::MAX_MESSAGE_SIZE
            ),
        },
    }
}

/// Decode a frame payload, keeping the sequence id when only the body is bad
fn parse_envelope(value: serde_json::Value) -> std::result::Result<RequestEnvelope, Envelope<ApiResponse>> {
    let sequence_id = value
        .pointer("/header/sequenceId")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0);

    serde_json::from_value(value).map_err(|e| rejection(sequence_id, format!("invalid request: {e}")))
}

async fn serve_connection(stream: TcpStream, coordinator: Arc<Coordinator>) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; 4096];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        decoder.extend(&buf[..n]);

        // Process all complete frames
        loop {
            let reply = match decoder.decode_next::<serde_json::Value>() {
                Ok(Some(value)) => match parse_envelope(value) {
                    Ok(envelope) => handler::respond(&coordinator, envelope).await,
                    Err(rejected) => rejected,
                },
                Ok(None) => break,
                Err(CodecError::Json(e)) => rejection(0, format!("malformed frame: {e}")),
                Err(e) => {
                    // Length prefix is garbage; the stream cannot be resynchronised
                    let reply = codec::encode(&rejection(0, e.to_string()))?;
                    writer.write_all(&reply).await?;
                    return Err(e.into());
                }
            };

            if reply.body.is_error() {
                debug!("Rejected frame seq={}", reply.header.sequence_id);
            }
            let encoded = match codec::encode(&reply) {
                Ok(encoded) => encoded,
                Err(CodecError::MessageTooLarge(size)) => {
                    warn!(
                        "Reply seq={} too large ({} bytes), sending error instead",
                        reply.header.sequence_id, size
                    );
                    codec::encode(&oversized(reply.header.sequence_id, size))?
                }
                Err(e) => return Err(e.into()),
            };
            writer.write_all(&encoded).await?;
        }
    }
}
