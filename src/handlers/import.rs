//! Takeoff import handler
//!
//! Subject: `takeoff.import`. Every message is processed on its own task so a
//! large upload never blocks the subscription.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth;
use crate::config::ImportSettings;
use crate::services::takeoff::vocabulary::ComponentTypeVocabulary;
use crate::services::takeoff::{ComponentStore, TakeoffImporter};
use crate::types::{
    ErrorResponse, ImportContext, ImportErrorKind, ImportIssue, ImportResult, ImportTakeoffRequest, Request,
    SuccessResponse,
};

const ACCESS_DENIED: &str = "Project not found or access denied";

/// Shared dependencies of the import handler
pub struct ImportState {
    pub store: Arc<dyn ComponentStore>,
    pub settings: Arc<ImportSettings>,
    pub jwt_secret: Arc<String>,
}

/// Reply body, serialized as whichever envelope it holds
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ImportReply {
    Done(SuccessResponse<ImportResult>),
    Rejected(ErrorResponse),
}

/// Handle takeoff.import messages
pub async fn handle_import(client: Client, mut subscriber: Subscriber, state: Arc<ImportState>) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received takeoff.import message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let client = client.clone();
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let response = process_import(&msg.payload, &state).await;
            match serde_json::to_vec(&response) {
                Ok(bytes) => {
                    if let Err(e) = client.publish(reply, bytes.into()).await {
                        error!("Failed to publish import reply: {}", e);
                    }
                }
                Err(e) => error!("Failed to serialize import reply: {}", e),
            }
        });
    }

    Ok(())
}

/// Authenticate, authorize and run one import request
pub async fn process_import(payload: &[u8], state: &ImportState) -> ImportReply {
    // Parse request
    let request: Request<ImportTakeoffRequest> = match serde_json::from_slice(payload) {
        Ok(req) => req,
        Err(e) => {
            error!("Failed to parse request: {}", e);
            return ImportReply::Rejected(ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string()));
        }
    };

    // Check auth
    let auth_info = match auth::extract_auth(&request, &state.jwt_secret) {
        Ok(info) => info,
        Err(e) => {
            debug!("Rejected unauthenticated import: {}", e);
            return ImportReply::Rejected(ErrorResponse::new(request.id, "UNAUTHORIZED", "Authentication required"));
        }
    };

    let body = request.payload;
    if body.user_id.is_some_and(|claimed| claimed != auth_info.user_id) {
        warn!(user_id = %auth_info.user_id, "Import request names a different user");
        return forbidden(request.id);
    }

    let context = ImportContext {
        project_id: body.project_id,
        user_id: auth_info.user_id,
    };

    let access = match state.store.project_access(&context).await {
        Ok(Some(access)) => access,
        Ok(None) => {
            warn!(project_id = %context.project_id, user_id = %context.user_id, "Import into inaccessible project");
            return forbidden(request.id);
        }
        Err(e) => {
            error!("Failed to check project access: {}", e);
            let result = ImportResult::failed_with(ImportIssue::file(
                ImportErrorKind::PersistenceError,
                "Import failed: project access could not be verified, please try again",
            ));
            return ImportReply::Done(SuccessResponse::new(request.id, result));
        }
    };

    let mut importer = TakeoffImporter::new(Arc::clone(&state.settings), Arc::clone(&state.store));
    if let Some(types) = access.component_types {
        debug!(project_id = %access.project_id, count = types.len(), "Using project component types");
        importer = importer.with_vocabulary(ComponentTypeVocabulary::new(types));
    }

    let result = importer.import_takeoff(&body.csv_content, &context).await;
    if result.success {
        info!(
            project_id = %context.project_id,
            components = result.components_created.unwrap_or(0),
            "Takeoff import succeeded"
        );
    }

    ImportReply::Done(SuccessResponse::new(request.id, result))
}

fn forbidden(request_id: Uuid) -> ImportReply {
    let result = ImportResult::failed_with(ImportIssue::file(ImportErrorKind::PermissionError, ACCESS_DENIED));
    ImportReply::Rejected(ErrorResponse::new(request_id, "FORBIDDEN", ACCESS_DENIED).with_details(result))
}
