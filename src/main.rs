use record_mesh::config::NodeConfig;
use record_mesh::router::handlers;
use record_mesh::router::{ContentRouter, HttpTransport, RecordTransport};
use record_mesh::state::{StateHandle, StateStore};
use record_mesh::table::LocalTable;
use record_mesh::topology::TopologyTable;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        // .with_max_level(tracing::Level::DEBUG)
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = NodeConfig::from_env()?;
    tracing::info!("Starting node {} on {}", config.node_id, config.bind_addr);

    // 1. Topology:
    let topology = Arc::new(TopologyTable::load(&config.topology_path)?);

    // 2. Durable state and local table:
    let store = StateStore::open(&config.data_dir, &config.user_id, config.layout())?;
    let state = StateHandle::new(store);
    let table = Arc::new(LocalTable::open(config.table_path(), config.table_columns)?);
    tracing::info!("Local table at {}", table.path().display());

    // 3. Router:
    let transport: Arc<dyn RecordTransport> = Arc::new(HttpTransport::new());
    let router = Arc::new(ContentRouter::new(
        config.node_id.clone(),
        topology,
        state,
        table,
        transport,
    )?);

    // 4. HTTP Router:
    let app = handlers::routes(router);

    // 5. Start HTTP server:
    tracing::info!("HTTP server listening on {}", config.bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
