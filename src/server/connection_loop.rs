// src/server/connection_loop.rs

//! Contains the accept loop that hands each new connection to its own task.

use super::context::ServerContext;
use crate::connection::ConnectionHandler;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Pause after a failed accept, so a persistent error (e.g. fd exhaustion)
/// does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections until a shutdown signal arrives, then closes the listener.
///
/// Connection tasks are never aborted by shutdown: they are handed to a reaper
/// task that lets them drain and reports any panics.
pub async fn run(
    listener: TcpListener,
    ctx: Arc<ServerContext>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut session_id_counter: u64 = 0;
    let mut client_tasks = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, closing listener.");
                break;
            }

            res = listener.accept() => {
                match res {
                    Ok((socket, addr)) => {
                        info!("Accepted new connection from: {}", addr);
                        session_id_counter = session_id_counter.wrapping_add(1);
                        let session_id = session_id_counter;
                        let handler = ConnectionHandler::new(socket, addr, session_id, ctx.clone());
                        client_tasks.spawn(handler.run());
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        ctx.events.log(format!("Accept error: {e}"));
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                }
            }

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A client handler panicked: {e:?}");
                }
            }
        }
    }

    drop(listener);
    debug!("Listener closed.");

    if !client_tasks.is_empty() {
        info!(
            "Letting {} open connection(s) drain after shutdown.",
            client_tasks.len()
        );
        tokio::spawn(async move {
            while let Some(res) = client_tasks.join_next().await {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A client handler panicked: {e:?}");
                }
            }
            debug!("All drained connections finished.");
        });
    }
}
