//! Foreground node run.

use itinerary_types::{Itinerary, MessageEnvelope, NodeState, SignInResponse, JSON_CONTENT_TYPE};
use messaging_backend::{BackendEvent, LoopbackBackend};
use node_config_and_utils::{Config, PayloadCipher, Paths};
use node_runtime::{settings_from_config, NodeRuntime, RuntimeExit, RuntimeOptions};
use persistence_store::PersistenceStore;
use service_host::ServiceRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// What to do once the node is up.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Itinerary file to sign in with.
    pub itinerary: Option<PathBuf>,
    /// Payload delivered to `to` after sign-in.
    pub send: Option<String>,
    pub to: Option<String>,
    pub content_type: String,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            itinerary: None,
            send: None,
            to: None,
            content_type: JSON_CONTENT_TYPE.to_string(),
        }
    }
}

fn load_itinerary(path: &Path) -> Result<Itinerary, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read itinerary {}: {}", path.display(), e))?;
    let itinerary: Itinerary = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid itinerary {}: {}", path.display(), e))?;
    Ok(itinerary)
}

/// Run the node until it is interrupted or decides to exit.
///
/// The node signs in to an in-process loopback backend: deliveries to this
/// node loop straight back, deliveries to other nodes are persisted.
pub async fn run_node(
    config: Config,
    paths: Paths,
    request: RunRequest,
) -> Result<RuntimeExit, Box<dyn std::error::Error>> {
    paths.ensure_dirs()?;

    info!(
        node = %config.node_name,
        hub = %config.hub_uri,
        tracking = config.enable_tracking,
        encryption = config.use_encryption,
        "Starting edge node"
    );

    let persist_dir = config.persist_dir(&paths);
    let store = PersistenceStore::open(&persist_dir)
        .await
        .map_err(|e| format!("Failed to open persistence store: {}", e))?;
    let pending = store.len().await?;
    info!(path = %persist_dir.display(), pending, "Persistence store opened");

    let cipher = match config.node_secret.as_deref() {
        Some(secret) if config.use_encryption => Some(PayloadCipher::from_secret(secret)?),
        _ => None,
    };

    let backend = Arc::new(LoopbackBackend::new(&config.node_name));
    let runtime = NodeRuntime::new(
        settings_from_config(&config),
        RuntimeOptions::from_config(&config),
        backend.clone(),
        Arc::new(store),
        Arc::new(ServiceRegistry::with_builtins()),
        cipher,
    )?;
    let handle = runtime.handle();

    let itinerary = match &request.itinerary {
        Some(path) => Some(load_itinerary(path)?),
        None => None,
    };
    let first_message = match (&request.send, &request.to, &itinerary) {
        (Some(payload), Some(to), Some(itinerary)) => Some((
            MessageEnvelope::new(
                itinerary.itinerary_id.clone(),
                payload.as_str(),
                &request.content_type,
            ),
            to.clone(),
        )),
        _ => None,
    };
    if itinerary.is_none() {
        warn!("No itinerary given, the node will idle");
    }

    backend.inject(BackendEvent::SignInComplete(SignInResponse {
        itineraries: itinerary.into_iter().collect(),
        state: NodeState::Active,
        debug: config.debug,
        tags: config.tags.clone(),
        enable_tracking: config.enable_tracking,
        organization_id: Some(config.organization_id.clone()).filter(|id| !id.is_empty()),
    }));
    if let Some((envelope, service)) = first_message {
        info!(service = %service, interchange_id = %envelope.interchange_id, "Queueing message");
        backend.inject(BackendEvent::QueueMessage {
            body: envelope,
            service,
        });
    }

    let run = runtime.run();
    tokio::pin!(run);
    let exit = tokio::select! {
        exit = &mut run => exit,
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt, shutting down");
            handle.shutdown();
            run.await
        }
    };

    info!(?exit, "Edge node stopped");
    Ok(exit)
}
