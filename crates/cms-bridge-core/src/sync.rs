//! # Sync Orchestration
//!
//! Decides whether a content item already exists on a remote platform and
//! routes it down the create or update path accordingly.
//!
//! Per content item and platform the orchestrator moves through:
//!
//! ```text
//! Unsynced --lookup found--> update --ok--> Synced
//!    |                         |
//!    |                         +--404 (policy)--> create
//!    +--lookup absent-------> create --ok--> Synced
//!                              |
//!                              +--409 (policy)--> re-lookup --> update
//! ```
//!
//! The ledger remembers the remote identifier of every synced item so later
//! syncs can skip the remote lookup. A stale ledger entry heals itself through
//! the 404 fallback.

use crate::platform::{PlatformError, PlatformKind};
use crate::transform::{TransformError, Transformer};
use crate::{Clock, ContentId, RemoteId, SystemClock, Timestamp, ValidationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

// ============================================================================
// Core Types
// ============================================================================

/// A record as the remote platform reports it
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    pub remote_id: RemoteId,
    pub data: Value,
}

impl RemoteRecord {
    pub fn new(remote_id: RemoteId, data: Value) -> Self {
        Self { remote_id, data }
    }
}

/// Sync status of one content item against one platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    Unsynced,
    Synced {
        remote_id: RemoteId,
        synced_at: Timestamp,
    },
}

impl SyncState {
    pub fn remote_id(&self) -> Option<&RemoteId> {
        match self {
            Self::Unsynced => None,
            Self::Synced { remote_id, .. } => Some(remote_id),
        }
    }
}

/// What a sync or delete call did on the remote side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Created { remote_id: RemoteId },
    Updated { remote_id: RemoteId },
    Deleted { remote_id: RemoteId },
    /// Delete found nothing to remove
    AlreadyAbsent,
}

impl SyncOutcome {
    pub fn remote_id(&self) -> Option<&RemoteId> {
        match self {
            Self::Created { remote_id }
            | Self::Updated { remote_id }
            | Self::Deleted { remote_id } => Some(remote_id),
            Self::AlreadyAbsent => None,
        }
    }
}

/// Platform-specific fallback conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPolicy {
    /// A 404 from the update endpoint falls back to creating the record
    pub create_when_update_missing: bool,
    /// A 409 from the create endpoint re-runs the lookup and updates instead
    pub update_when_create_conflicts: bool,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            create_when_update_missing: true,
            update_when_create_conflicts: false,
        }
    }
}

impl SyncPolicy {
    /// Policy for platforms that report duplicate keys with 409 (Drupal, Shopify handles)
    pub fn conflict_tolerant() -> Self {
        Self {
            create_when_update_missing: true,
            update_when_create_conflicts: true,
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    #[error("Content rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("Transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Platform request failed: {0}")]
    Platform(#[from] PlatformError),
}

impl SyncError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Platform(e) => e.is_transient(),
            Self::Validation(_) | Self::Transform(_) => false,
        }
    }
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// A platform that stores synced content
#[async_trait]
pub trait RemotePlatform: Send + Sync {
    fn kind(&self) -> PlatformKind;

    /// Find the record carrying this CMS id in its metadata
    async fn find_by_external_key(
        &self,
        content_id: &ContentId,
    ) -> Result<Option<RemoteRecord>, PlatformError>;

    async fn create(&self, document: &Value) -> Result<RemoteRecord, PlatformError>;

    async fn update(
        &self,
        remote_id: &RemoteId,
        document: &Value,
    ) -> Result<RemoteRecord, PlatformError>;

    async fn delete(&self, remote_id: &RemoteId) -> Result<(), PlatformError>;
}

/// Remembers which remote record each content item was synced to
#[async_trait]
pub trait SyncLedger: Send + Sync {
    async fn state(&self, content_id: &ContentId) -> SyncState;

    async fn record(&self, content_id: &ContentId, remote_id: RemoteId, synced_at: Timestamp);

    async fn forget(&self, content_id: &ContentId);
}

/// Process-local ledger
#[derive(Debug, Default, Clone)]
pub struct InMemorySyncLedger {
    entries: Arc<RwLock<HashMap<ContentId, SyncState>>>,
}

impl InMemorySyncLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SyncLedger for InMemorySyncLedger {
    async fn state(&self, content_id: &ContentId) -> SyncState {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(content_id).cloned())
            .unwrap_or(SyncState::Unsynced)
    }

    async fn record(&self, content_id: &ContentId, remote_id: RemoteId, synced_at: Timestamp) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                content_id.clone(),
                SyncState::Synced {
                    remote_id,
                    synced_at,
                },
            );
        }
    }

    async fn forget(&self, content_id: &ContentId) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(content_id);
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Create-vs-update decision maker for one platform
pub struct SyncOrchestrator {
    platform: Arc<dyn RemotePlatform>,
    transformer: Transformer,
    ledger: Arc<dyn SyncLedger>,
    policy: SyncPolicy,
    clock: Arc<dyn Clock>,
}

impl SyncOrchestrator {
    pub fn new(platform: Arc<dyn RemotePlatform>, transformer: Transformer) -> Self {
        Self {
            platform,
            transformer,
            ledger: Arc::new(InMemorySyncLedger::new()),
            policy: SyncPolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn SyncLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    pub async fn state(&self, content_id: &ContentId) -> SyncState {
        self.ledger.state(content_id).await
    }

    /// Push a CMS content item to the platform.
    ///
    /// The item is transformed before any remote call so a validation failure
    /// never touches the platform.
    pub async fn sync(&self, content: &Value) -> Result<SyncOutcome, SyncError> {
        let content_id = ContentId::from_document(content)?;
        let document = self.transformer.forward(content)?;
        let platform = self.platform.kind();

        let outcome = match self.resolve_remote_id(&content_id).await? {
            Some(remote_id) => {
                debug!(%platform, %content_id, %remote_id, "Updating existing remote record");
                match self.platform.update(&remote_id, &document).await {
                    Ok(record) => SyncOutcome::Updated {
                        remote_id: record.remote_id,
                    },
                    Err(e) if e.is_not_found() && self.policy.create_when_update_missing => {
                        warn!(
                            %platform,
                            %content_id,
                            %remote_id,
                            "Remote record missing on update, creating instead"
                        );
                        self.ledger.forget(&content_id).await;
                        self.create(&content_id, &document).await?
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            None => self.create(&content_id, &document).await?,
        };

        if let Some(remote_id) = outcome.remote_id() {
            self.ledger
                .record(&content_id, remote_id.clone(), self.clock.now())
                .await;
        }

        info!(%platform, %content_id, outcome = ?outcome, "Content synced");
        Ok(outcome)
    }

    /// Remove the platform's copy of a content item.
    ///
    /// Deleting something the platform no longer has succeeds with
    /// [`SyncOutcome::AlreadyAbsent`].
    pub async fn delete(&self, content_id: &ContentId) -> Result<SyncOutcome, SyncError> {
        let platform = self.platform.kind();

        let outcome = match self.resolve_remote_id(content_id).await? {
            None => SyncOutcome::AlreadyAbsent,
            Some(remote_id) => match self.platform.delete(&remote_id).await {
                Ok(()) => SyncOutcome::Deleted { remote_id },
                Err(e) if e.is_not_found() => SyncOutcome::AlreadyAbsent,
                Err(e) => return Err(e.into()),
            },
        };

        self.ledger.forget(content_id).await;
        info!(%platform, %content_id, outcome = ?outcome, "Content deleted");
        Ok(outcome)
    }

    async fn create(
        &self,
        content_id: &ContentId,
        document: &Value,
    ) -> Result<SyncOutcome, SyncError> {
        let platform = self.platform.kind();
        debug!(%platform, %content_id, "Creating remote record");

        match self.platform.create(document).await {
            Ok(record) => Ok(SyncOutcome::Created {
                remote_id: record.remote_id,
            }),
            Err(e) if e.is_conflict() && self.policy.update_when_create_conflicts => {
                warn!(%platform, %content_id, "Create conflicted, looking up existing record");
                let existing = self
                    .platform
                    .find_by_external_key(content_id)
                    .await?
                    .ok_or(e)?;
                let record = self.platform.update(&existing.remote_id, document).await?;
                Ok(SyncOutcome::Updated {
                    remote_id: record.remote_id,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Ledger first, then the platform's own lookup. A 404 from the lookup
    /// endpoint means there is nothing to find.
    async fn resolve_remote_id(
        &self,
        content_id: &ContentId,
    ) -> Result<Option<RemoteId>, SyncError> {
        if let Some(remote_id) = self.ledger.state(content_id).await.remote_id() {
            return Ok(Some(remote_id.clone()));
        }

        match self.platform.find_by_external_key(content_id).await {
            Ok(found) => Ok(found.map(|record| record.remote_id)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
