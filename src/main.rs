//! Server entry point: wire collaborators and serve the REST API.

use std::sync::Arc;
use tokio::net::TcpListener;

use studyrag::api::{AppState, build_router};
use studyrag::chat::{ChatOrchestrator, VectorRetriever};
use studyrag::embedding::OpenAiEmbeddingClient;
use studyrag::ingest::Ingestor;
use studyrag::llm::OpenAiClient;
use studyrag::registry::{SessionRegistry, TaskRegistry};
use studyrag::storage::{HttpObjectStore, ObjectStore};
use studyrag::vector::VectorService;
use studyrag::{config, logging};

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();

    let state = build_state().expect("Failed to initialize collaborators");
    let app = build_router(state);

    let (listener, port) = bind_listener().await.expect("Failed to bind listener");
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.expect("Server crashed");
}

fn build_state() -> anyhow::Result<AppState> {
    let config = config::get_config();

    let sessions = SessionRegistry::new(config.session_timeout_hours);
    let tasks = TaskRegistry::new();

    let vectors = Arc::new(VectorService::new()?);
    let embeddings = Arc::new(OpenAiEmbeddingClient::new()?);
    let llm = Arc::new(OpenAiClient::new()?);
    let store: Option<Arc<dyn ObjectStore>> = match &config.storage_base_url {
        Some(base_url) => Some(Arc::new(HttpObjectStore::new(base_url)?)),
        None => None,
    };

    let retriever = Arc::new(VectorRetriever::new(embeddings.clone(), vectors.clone()));
    let orchestrator =
        ChatOrchestrator::new(retriever, llm.clone(), llm.clone(), sessions.clone());
    let ingestor = Ingestor::new(
        vectors.clone(),
        embeddings,
        llm.clone(),
        store,
        tasks.clone(),
    );

    Ok(AppState {
        sessions,
        tasks,
        orchestrator,
        ingestor,
        vectors,
        generator: llm,
    })
}

async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    let config = config::get_config();
    if let Some(port) = config.server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 8000..=8099;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 8000-8099",
    ))
}
