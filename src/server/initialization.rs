// src/server/initialization.rs

//! Listener setup performed by `Server::start`.

use crate::core::NexronError;
use std::net::IpAddr;
use tokio::net::{TcpListener, UdpSocket};
use tracing::{debug, info};

/// A public address used only to ask the OS which local interface routes outward.
/// Connecting a UDP socket sends no packets.
const ROUTE_PROBE_ADDR: (&str, u16) = ("8.8.8.8", 65530);

/// Binds the command listener.
pub async fn bind_listener(host: &str, port: u16) -> Result<TcpListener, NexronError> {
    let listener = TcpListener::bind((host, port))
        .await
        .map_err(|e| NexronError::Bind {
            host: host.to_string(),
            port,
            source: e,
        })?;
    info!("Nexron server listening on {}:{}", host, port);
    Ok(listener)
}

/// Discovers the address other hosts on the network should use to reach us.
pub async fn local_ip_address() -> Option<IpAddr> {
    let lookup = async {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
        socket.connect(ROUTE_PROBE_ADDR).await?;
        Ok::<_, std::io::Error>(socket.local_addr()?.ip())
    };
    match lookup.await {
        Ok(ip) => Some(ip),
        Err(e) => {
            debug!("IP address detection error: {}", e);
            None
        }
    }
}
