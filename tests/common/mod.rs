//! Shared helpers for the integration tests: a full server on ephemeral
//! ports backed by a temporary data directory, and small DNS clients.

#![allow(dead_code)] // Not every test file uses every helper

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tsns::{
    admin::AdminServer,
    dns::{DNSPacket, enums::DNSResourceType, question::DNSQuestion},
    graceful_shutdown::GracefulShutdown,
    records::RecordStore,
    responder::QueryResponder,
    server::{bind_tcp, bind_udp, run_tcp_server, run_udp_server},
};

pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestServer {
    pub udp_addr: SocketAddr,
    pub tcp_addr: SocketAddr,
    pub http_addr: SocketAddr,
    pub store: Arc<RecordStore>,
    pub data_dir: TempDir,
    shutdown: GracefulShutdown,
}

impl TestServer {
    /// Starts UDP, TCP and admin listeners over an empty data directory.
    pub async fn start() -> Self {
        Self::start_in(tempfile::tempdir().expect("Failed to create temp dir")).await
    }

    /// Starts the listeners over an existing data directory, loading any
    /// snapshot it holds.
    pub async fn start_in(data_dir: TempDir) -> Self {
        let store = Arc::new(RecordStore::open(data_dir.path()).expect("Failed to open store"));
        let responder = Arc::new(QueryResponder::new(store.clone()));

        let any: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let udp_socket = bind_udp(any).await.unwrap();
        let tcp_listener = bind_tcp(any).await.unwrap();
        let http_listener = bind_tcp(any).await.unwrap();
        let udp_addr = udp_socket.local_addr().unwrap();
        let tcp_addr = tcp_listener.local_addr().unwrap();
        let http_addr = http_listener.local_addr().unwrap();

        let mut shutdown = GracefulShutdown::new();
        let udp = tokio::spawn(run_udp_server(
            udp_socket,
            responder.clone(),
            shutdown.subscribe(),
        ));
        let tcp = tokio::spawn(run_tcp_server(
            tcp_listener,
            responder,
            shutdown.subscribe(),
        ));
        let http = tokio::spawn(
            AdminServer::new(store.clone(), "test-ns").serve(http_listener, shutdown.subscribe()),
        );
        shutdown.register_component("udp", udp);
        shutdown.register_component("tcp", tcp);
        shutdown.register_component("http", http);

        Self {
            udp_addr,
            tcp_addr,
            http_addr,
            store,
            data_dir,
            shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.http_addr, path)
    }

    pub fn snapshot_path(&self) -> std::path::PathBuf {
        self.data_dir.path().join("records.json")
    }

    pub async fn stop(self) {
        self.shutdown.shutdown().await;
    }
}

pub fn query_bytes(id: u16, names: &[&str], qtype: DNSResourceType) -> Vec<u8> {
    let mut packet = DNSPacket::default();
    packet.header.id = id;
    packet.header.rd = true;
    for name in names {
        packet.questions.push(DNSQuestion::new(name, qtype));
    }
    packet.serialize().expect("Failed to serialize query")
}

/// Sends one query over UDP and waits for the reply.
pub async fn udp_query(server: SocketAddr, name: &str, qtype: DNSResourceType) -> DNSPacket {
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(&query_bytes(0x4242, &[name], qtype), server)
        .await
        .unwrap();

    let mut buf = vec![0u8; 4096];
    let (len, _) = timeout(TEST_TIMEOUT, client.recv_from(&mut buf))
        .await
        .expect("UDP query timed out")
        .unwrap();
    DNSPacket::parse(&buf[..len]).expect("Failed to parse UDP response")
}

/// Sends one length-prefixed query on an open TCP stream and reads the reply.
pub async fn tcp_exchange(stream: &mut TcpStream, request: &[u8]) -> DNSPacket {
    stream
        .write_all(&(request.len() as u16).to_be_bytes())
        .await
        .unwrap();
    stream.write_all(request).await.unwrap();

    let mut len_buf = [0u8; 2];
    timeout(TEST_TIMEOUT, stream.read_exact(&mut len_buf))
        .await
        .expect("TCP response timed out")
        .unwrap();
    let mut response = vec![0u8; u16::from_be_bytes(len_buf) as usize];
    stream.read_exact(&mut response).await.unwrap();
    DNSPacket::parse(&response).expect("Failed to parse TCP response")
}
