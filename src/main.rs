use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tsns::{
    admin::AdminServer,
    config::{CliArgs, ServerConfig},
    graceful_shutdown::GracefulShutdown,
    records::RecordStore,
    responder::QueryResponder,
    server::{bind_tcp, bind_udp, run_tcp_server, run_udp_server},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = CliArgs::parse();
    let config = match ServerConfig::from_env() {
        Ok(config) => config.with_cli(cli),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("{}", e);
        return Err(e.into());
    }

    let store = match RecordStore::open(&config.data_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to load records: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Starting {} with {} records from {}",
        config.server_name,
        store.len(),
        config.data_dir.display()
    );

    // Bind everything before serving so a bad address stops startup.
    let udp_socket = bind_udp(config.dns_bind_addr).await?;
    let tcp_listener = bind_tcp(config.dns_bind_addr).await?;
    let http_listener = bind_tcp(config.http_bind_addr).await?;

    let responder = Arc::new(QueryResponder::new(store.clone()));
    let admin = AdminServer::new(store, config.server_name.clone());
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
    let http = tokio::spawn(admin.serve(http_listener, shutdown.subscribe()));

    shutdown.register_component("udp", udp);
    shutdown.register_component("tcp", tcp);
    shutdown.register_component("http", http);

    tokio::signal::ctrl_c().await?;
    info!("Received ctrl-c");
    shutdown.shutdown().await;

    Ok(())
}
