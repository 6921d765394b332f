use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::{Result, ServerError};
use crate::responder::QueryResponder;

/// Largest message accepted on a UDP socket
const UDP_BUFFER_SIZE: usize = 4096;

/// How long a TCP connection may sit idle between messages
const TCP_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub async fn bind_udp(addr: SocketAddr) -> Result<UdpSocket> {
    UdpSocket::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

pub async fn bind_tcp(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Serves DNS over UDP until a shutdown signal arrives.
///
/// Each datagram is answered on its own task. Lookups run on the blocking
/// pool: they share a lock with record writes, which hold it across a file
/// sync. Receive errors are logged and the loop keeps going.
pub async fn run_udp_server(
    socket: UdpSocket,
    responder: Arc<QueryResponder>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let sock = Arc::new(socket);
    info!("UDP DNS server listening on {}", sock.local_addr()?);

    let mut buf = vec![0u8; UDP_BUFFER_SIZE];
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("UDP server received shutdown signal");
                break;
            }

            result = sock.recv_from(&mut buf) => {
                let (read_bytes, src_addr) = match result {
                    Ok(received) => received,
                    Err(e) => {
                        warn!("UDP receive error: {}", e);
                        continue;
                    }
                };

                let data = buf[..read_bytes].to_vec();
                let responder = responder.clone();
                let sock = sock.clone();

                tokio::spawn(async move {
                    let result =
                        tokio::task::spawn_blocking(move || responder.handle_udp(&data)).await;
                    let result = match result {
                        Ok(result) => result,
                        Err(e) => {
                            error!("UDP query task from {} failed: {}", src_addr, e);
                            return;
                        }
                    };
                    match result {
                        Ok(Some(response)) => {
                            if let Err(e) = sock.send_to(&response, src_addr).await {
                                error!("Failed to send UDP response to {}: {}", src_addr, e);
                            }
                        }
                        Ok(None) => debug!("Dropped UDP message from {}", src_addr),
                        Err(e) => warn!("Failed to answer UDP query from {}: {}", src_addr, e),
                    }
                });
            }
        }
    }

    Ok(())
}

/// Serves DNS over TCP until a shutdown signal arrives.
///
/// Each connection gets its own task and may carry several length-prefixed
/// requests. Accept errors are logged and retried after a short pause.
pub async fn run_tcp_server(
    listener: TcpListener,
    responder: Arc<QueryResponder>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    info!("TCP DNS server listening on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("TCP server received shutdown signal");
                break;
            }

            result = listener.accept() => {
                let (stream, src_addr) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("TCP accept error: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                };

                let responder = responder.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_tcp_connection(stream, src_addr, responder).await {
                        warn!("TCP connection error from {}: {}", src_addr, e);
                    }
                });
            }
        }
    }

    Ok(())
}

/// Answers requests on one connection until the peer closes it, it goes
/// idle, or an error occurs. Errors end this connection only.
async fn handle_tcp_connection(
    mut stream: TcpStream,
    src_addr: SocketAddr,
    responder: Arc<QueryResponder>,
) -> Result<()> {
    debug!("Accepted TCP connection from {}", src_addr);

    loop {
        let mut len_buf = [0u8; 2];
        match timeout(TCP_IDLE_TIMEOUT, stream.read_exact(&mut len_buf)).await {
            Err(_) => {
                debug!("TCP connection from {} idle, closing", src_addr);
                return Ok(());
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("TCP connection from {} closed", src_addr);
                return Ok(());
            }
            Ok(Err(e)) => return Err(e.into()),
            Ok(Ok(_)) => {}
        }

        let len = u16::from_be_bytes(len_buf) as usize;
        let mut request = vec![0u8; len];
        match timeout(TCP_IDLE_TIMEOUT, stream.read_exact(&mut request)).await {
            Err(_) => return Ok(()),
            Ok(result) => {
                result?;
            }
        }

        let responder = responder.clone();
        let response = tokio::task::spawn_blocking(move || responder.handle(&request))
            .await
            .map_err(std::io::Error::other)??;
        let Some(response) = response else {
            continue;
        };
        let Ok(response_len) = u16::try_from(response.len()) else {
            warn!("Response to {} exceeds TCP message size, dropping", src_addr);
            continue;
        };

        stream.write_all(&response_len.to_be_bytes()).await?;
        stream.write_all(&response).await?;
    }
}
