//! NATS message handlers

pub mod import;
pub mod ping;

use std::sync::Arc;
use anyhow::Result;
use async_nats::Client;
use tracing::{info, error};
use tokio::select;

use crate::config::Config;
use crate::services::takeoff::ComponentStore;

use self::import::ImportState;

/// Start all message handlers
pub async fn start_handlers(client: Client, store: Arc<dyn ComponentStore>, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let store_name = store.name();
    let import_state = Arc::new(ImportState {
        store,
        settings: Arc::new(config.import.clone()),
        jwt_secret: Arc::new(config.jwt_secret.clone()),
    });

    // Subscribe to all subjects
    let ping_sub = client.subscribe("takeoff.ping").await?;
    let import_sub = client.subscribe("takeoff.import").await?;

    info!("Subscribed to NATS subjects");

    let client_ping = client.clone();
    let ping_handle = tokio::spawn(async move {
        ping::handle_ping(client_ping, ping_sub, store_name).await
    });

    let client_import = client.clone();
    let import_handle = tokio::spawn(async move {
        import::handle_import(client_import, import_sub, import_state).await
    });

    info!(
        "All handlers started (store: {}, max rows: {}, identity scope: {})",
        store_name,
        config.import.max_rows,
        config.import.identity_scope.as_str()
    );

    // Wait for any handler to finish (which shouldn't happen normally)
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = import_handle => {
            error!("Import handler finished: {:?}", result);
        }
    }

    Ok(())
}
