//! Component store abstraction
//!
//! The import pipeline only ever talks to a `ComponentStore`:
//! - `PgComponentStore` for production (one transaction per import)
//! - `MockComponentStore` for tests and local development (in memory)
//!
//! Configuration via COMPONENT_STORE env variable:
//! - "postgres" → PgComponentStore (default)
//! - "mock" → MockComponentStore

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::PgPool;
use uuid::Uuid;

use super::error::StoreError;
use super::identity::{ComponentDraft, IdentityKey};
use crate::db::queries;
use crate::types::ImportContext;

/// What the caller may do with a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectAccess {
    pub project_id: Uuid,
    /// Project-specific component types; `None` means use the default vocabulary
    pub component_types: Option<Vec<String>>,
}

/// Persistence collaborator for takeoff imports
#[async_trait]
pub trait ComponentStore: Send + Sync {
    /// Access info when `context.user_id` may import into `context.project_id`
    async fn project_access(&self, context: &ImportContext) -> Result<Option<ProjectAccess>, StoreError>;

    /// Persist every draft or none of them. Returns the number of rows written.
    async fn insert_components(&self, context: &ImportContext, drafts: &[ComponentDraft]) -> Result<u64, StoreError>;

    /// Name of this store implementation
    fn name(&self) -> &'static str;
}

// ==========================================================================
// PostgreSQL
// ==========================================================================

pub struct PgComponentStore {
    pool: PgPool,
}

impl PgComponentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ComponentStore for PgComponentStore {
    async fn project_access(&self, context: &ImportContext) -> Result<Option<ProjectAccess>, StoreError> {
        let accessible = queries::project::is_project_member(&self.pool, context.project_id, context.user_id)
            .await
            .map_err(StoreError::from_database)?;
        if !accessible {
            return Ok(None);
        }

        let component_types = queries::project::list_component_types(&self.pool, context.project_id)
            .await
            .map_err(StoreError::from_database)?;

        Ok(Some(ProjectAccess {
            project_id: context.project_id,
            component_types: (!component_types.is_empty()).then_some(component_types),
        }))
    }

    async fn insert_components(&self, context: &ImportContext, drafts: &[ComponentDraft]) -> Result<u64, StoreError> {
        queries::component::insert_components(&self.pool, context, drafts)
            .await
            .map_err(StoreError::from_database)
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

// ==========================================================================
// In-memory
// ==========================================================================

type StoredKey = (String, IdentityKey);

/// In-memory store with the same per-drawing uniqueness rule as the database
#[derive(Default)]
pub struct MockComponentStore {
    /// `None` grants access to every project
    allowed_projects: Option<HashSet<Uuid>>,
    component_types: HashMap<Uuid, Vec<String>>,
    components: Mutex<HashMap<Uuid, Vec<ComponentDraft>>>,
    keys: Mutex<HashMap<Uuid, HashSet<StoredKey>>>,
    failure: Mutex<Option<String>>,
    delay: Option<Duration>,
    insert_calls: Mutex<u32>,
}

impl MockComponentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl MockComponentStore {
    /// Only these projects are accessible
    pub fn with_projects(mut self, projects: impl IntoIterator<Item = Uuid>) -> Self {
        self.allowed_projects = Some(projects.into_iter().collect());
        self
    }

    pub fn with_component_types(mut self, project_id: Uuid, types: &[&str]) -> Self {
        self.component_types
            .insert(project_id, types.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Every insert fails with `message` until cleared
    pub fn fail_inserts(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    /// Inserts sleep for `delay` before doing anything
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn components(&self, project_id: Uuid) -> Vec<ComponentDraft> {
        self.components.lock().get(&project_id).cloned().unwrap_or_default()
    }

    pub fn insert_calls(&self) -> u32 {
        *self.insert_calls.lock()
    }
}

#[async_trait]
impl ComponentStore for MockComponentStore {
    async fn project_access(&self, context: &ImportContext) -> Result<Option<ProjectAccess>, StoreError> {
        let allowed = self
            .allowed_projects
            .as_ref()
            .map_or(true, |projects| projects.contains(&context.project_id));
        if !allowed {
            return Ok(None);
        }
        Ok(Some(ProjectAccess {
            project_id: context.project_id,
            component_types: self.component_types.get(&context.project_id).cloned(),
        }))
    }

    async fn insert_components(&self, context: &ImportContext, drafts: &[ComponentDraft]) -> Result<u64, StoreError> {
        *self.insert_calls.lock() += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.failure.lock().clone() {
            return Err(StoreError::Unavailable(message));
        }

        let mut keys = self.keys.lock();
        let project_keys = keys.entry(context.project_id).or_default();
        if let Some(existing) = drafts
            .iter()
            .find(|d| project_keys.contains(&(d.drawing.clone(), d.identity_key.clone())))
        {
            return Err(StoreError::Conflict(format!(
                "{} already exists on drawing {}",
                existing.identity_key, existing.drawing
            )));
        }
        for draft in drafts {
            project_keys.insert((draft.drawing.clone(), draft.identity_key.clone()));
        }

        self.components
            .lock()
            .entry(context.project_id)
            .or_default()
            .extend(drafts.iter().cloned());

        Ok(drafts.len() as u64)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Create the component store named by COMPONENT_STORE
pub fn create_component_store(backend: &str, pool: Option<PgPool>) -> anyhow::Result<Box<dyn ComponentStore>> {
    match (backend, pool) {
        ("postgres", Some(pool)) => {
            tracing::info!("Using PgComponentStore");
            Ok(Box::new(PgComponentStore::new(pool)))
        }
        ("postgres", None) => anyhow::bail!("COMPONENT_STORE=postgres requires a database connection"),
        ("mock", _) => {
            tracing::info!("Using MockComponentStore");
            Ok(Box::new(MockComponentStore::new()))
        }
        (other, _) => anyhow::bail!("Unknown COMPONENT_STORE '{}' (expected 'postgres' or 'mock')", other),
    }
}
