// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the full lifecycle of a client connection.

use super::codec::CommandCodec;
use super::guard::ConnectionGuard;
use crate::core::NexronError;
use crate::server::ServerContext;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::{Instrument, debug, info_span, warn};

/// Owns one client stream and runs its read, dispatch, write cycle.
///
/// Commands on one connection are handled strictly in order: the next command is
/// not read until the acknowledgement for the previous one has been written.
pub struct ConnectionHandler<S> {
    framed: Framed<S, CommandCodec>,
    addr: SocketAddr,
    session_id: u64,
    ctx: Arc<ServerContext>,
    idle_timeout: Option<Duration>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Creates a new `ConnectionHandler`.
    pub fn new(stream: S, addr: SocketAddr, session_id: u64, ctx: Arc<ServerContext>) -> Self {
        let settings = &ctx.connection;
        let codec = CommandCodec::new(settings.framing, settings.buffer_size);
        let framed = Framed::with_capacity(stream, codec, settings.buffer_size);
        let idle_timeout = match settings.idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Self {
            framed,
            addr,
            session_id,
            ctx,
            idle_timeout,
        }
    }

    /// Runs the connection to completion. Errors end this connection only; they
    /// are logged here and never returned.
    pub async fn run(mut self) {
        let span = info_span!(
            "connection",
            client.addr = %self.addr,
            client.id = %self.session_id,
        );

        async move {
            let guard = ConnectionGuard::new(
                self.ctx.stats.clone(),
                self.ctx.events.clone(),
                self.addr,
            );

            match self.process().await {
                Ok(()) => debug!("Connection from {} closed by peer.", self.addr),
                Err(e) => {
                    if e.is_normal_disconnect() {
                        debug!("Connection from {} closed by peer: {}", self.addr, e);
                    } else {
                        warn!("Connection error for {}: {}", self.addr, e);
                    }
                    self.ctx
                        .events
                        .log(format!("Client handling error: {e}"));
                }
            }

            // Close the socket before the disconnect is reported.
            drop(self.framed);
            drop(guard);
        }
        .instrument(span)
        .await
    }

    /// The read, dispatch, write loop.
    async fn process(&mut self) -> Result<(), NexronError> {
        while let Some(result) = self.next_command().await? {
            let command = result?;
            let command = command.trim();
            if command.is_empty() {
                continue;
            }

            debug!("Session {}: Received command: {:?}", self.session_id, command);
            self.ctx.events.log(format!("Received command: {command}"));

            let ack = self.ctx.dispatcher.dispatch(command).await;
            self.framed.send(ack.into_text()).await?;
        }
        Ok(())
    }

    /// Reads the next frame, applying the idle timeout if one is configured.
    async fn next_command(&mut self) -> Result<Option<Result<String, NexronError>>, NexronError> {
        match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, self.framed.next())
                .await
                .map_err(|_| NexronError::IdleTimeout(limit.as_secs())),
            None => Ok(self.framed.next().await),
        }
    }
}
