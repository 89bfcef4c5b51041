use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::account::AccountProvider;
use crate::events::UploadEvent;
use crate::record::{NewUpload, UploadRecord, UploadResult, UploadStatus, ValidationError};
use crate::store::{StoreError, UploadStore};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid upload record: {0}")]
    InvalidRecord(#[from] ValidationError),
    #[error("upload {0} not found")]
    NotFound(i64),
    #[error("illegal status transition: {from:?} -> {to:?}")]
    IllegalTransition {
        from: UploadStatus,
        to: UploadStatus,
    },
    #[error("scan cancelled")]
    Cancelled,
    #[error("store unavailable: {0}")]
    Store(StoreError),
}

impl From<StoreError> for UploadError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Cancelled => UploadError::Cancelled,
            other => UploadError::Store(other),
        }
    }
}

/// Owns all mutations of the upload table. Callers never touch the store
/// directly; the manager validates, enforces the status lifecycle and
/// broadcasts events after each persisted change.
pub struct UploadManager {
    store: UploadStore,
    accounts: Arc<dyn AccountProvider>,
    events: broadcast::Sender<UploadEvent>,
}

impl UploadManager {
    pub fn new(store: UploadStore, accounts: Arc<dyn AccountProvider>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store,
            accounts,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.events.subscribe()
    }

    /// Validates and persists a new upload, returning the assigned id.
    /// A terminal status is accepted here so a backup can be restored,
    /// provided the record carries its end timestamp and result.
    pub async fn store_upload(&self, upload: NewUpload) -> Result<i64, UploadError> {
        let mut upload = upload;
        if upload.upload_time == 0 {
            upload.upload_time = now_millis();
        }
        upload.validate()?;
        let id = self.store.insert(&upload).await?;
        debug!(id, account = %upload.account_name, "stored upload");
        let _ = self.events.send(UploadEvent::Stored {
            id,
            account_name: upload.account_name,
        });
        Ok(id)
    }

    /// Batch variant; all records are validated up front and the inserts
    /// share one transaction.
    pub async fn store_uploads(&self, uploads: Vec<NewUpload>) -> Result<Vec<i64>, UploadError> {
        let now = now_millis();
        let mut stamped = uploads;
        for upload in &mut stamped {
            if upload.upload_time == 0 {
                upload.upload_time = now;
            }
            upload.validate()?;
        }
        let ids = self.store.insert_batch(&stamped).await?;
        debug!(count = ids.len(), "stored upload batch");
        for (id, upload) in ids.iter().zip(&stamped) {
            let _ = self.events.send(UploadEvent::Stored {
                id: *id,
                account_name: upload.account_name.clone(),
            });
        }
        Ok(ids)
    }

    /// Replaces the row with the matching id. A status change must follow
    /// the lifecycle; replacing a row under the same status is not a
    /// transition and is always allowed.
    pub async fn update_upload(&self, record: &UploadRecord) -> Result<(), UploadError> {
        let existing = self
            .store
            .get(record.id)
            .await?
            .ok_or(UploadError::NotFound(record.id))?;
        if existing.status != record.status && !existing.status.can_transition_to(record.status) {
            return Err(UploadError::IllegalTransition {
                from: existing.status,
                to: record.status,
            });
        }
        record.validate()?;
        if self.store.update(record).await? == 0 {
            return Err(UploadError::NotFound(record.id));
        }
        debug!(id = record.id, status = ?record.status, "updated upload");
        let _ = self.events.send(UploadEvent::Updated {
            id: record.id,
            status: record.status,
        });
        Ok(())
    }

    /// Moves the upload to `to`, stamping `upload_end` and `last_result` on
    /// terminal entry and clearing both when the upload re-enters PENDING.
    pub async fn transition(
        &self,
        id: i64,
        to: UploadStatus,
        result: UploadResult,
    ) -> Result<UploadRecord, UploadError> {
        let mut record = self.store.get(id).await?.ok_or(UploadError::NotFound(id))?;
        if !record.status.can_transition_to(to) {
            return Err(UploadError::IllegalTransition {
                from: record.status,
                to,
            });
        }
        record.status = to;
        if to.is_terminal() {
            record.upload_end = now_millis();
            record.last_result = result;
        } else if to == UploadStatus::Pending {
            record.upload_end = 0;
            record.last_result = UploadResult::Unknown;
        }
        record.validate()?;
        if self.store.update(&record).await? == 0 {
            return Err(UploadError::NotFound(id));
        }
        debug!(id, status = ?to, result = ?record.last_result, "upload transition");
        let _ = self.events.send(UploadEvent::Updated { id, status: to });
        Ok(record)
    }

    pub async fn retry(&self, id: i64) -> Result<UploadRecord, UploadError> {
        self.transition(id, UploadStatus::Pending, UploadResult::Unknown)
            .await
    }

    pub async fn remove_upload(&self, id: i64) -> Result<u64, UploadError> {
        let removed = self.store.delete(id).await?;
        if removed > 0 {
            debug!(id, "removed upload");
            let _ = self.events.send(UploadEvent::Removed { id });
        }
        Ok(removed)
    }

    pub async fn remove_account_uploads(&self, account_name: &str) -> Result<u64, UploadError> {
        let removed = self.store.delete_by_account(account_name).await?;
        if removed > 0 {
            info!(account = %account_name, removed, "removed account uploads");
            let _ = self.events.send(UploadEvent::AccountRemoved {
                account_name: account_name.to_string(),
                removed,
            });
        }
        Ok(removed)
    }

    pub async fn remove_current_account_uploads(&self) -> Result<u64, UploadError> {
        match self.accounts.current_account() {
            Some(account) => self.remove_account_uploads(&account.name()).await,
            None => Ok(0),
        }
    }

    /// Deletes SUCCEEDED uploads older than the retention window.
    pub async fn sweep_succeeded(&self, older_than: Duration) -> Result<u64, UploadError> {
        let cutoff = now_millis().saturating_sub(older_than.as_millis() as i64);
        let removed = self.store.delete_succeeded_before(cutoff).await?;
        if removed > 0 {
            info!(removed, "swept finished uploads");
            let _ = self.events.send(UploadEvent::Swept { removed });
        }
        Ok(removed)
    }

    pub async fn get_upload_by_id(&self, id: i64) -> Result<Option<UploadRecord>, UploadError> {
        Ok(self.store.get(id).await?)
    }

    pub async fn get_all_stored_uploads(&self) -> Result<Vec<UploadRecord>, UploadError> {
        Ok(self.store.list_all().await?)
    }

    pub async fn scan_all_uploads(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<UploadRecord>, UploadError> {
        Ok(self.store.scan_all(cancel).await?)
    }

    pub async fn get_uploads_for_account(
        &self,
        account_name: &str,
    ) -> Result<Vec<UploadRecord>, UploadError> {
        Ok(self.store.list_by_account(account_name).await?)
    }

    pub async fn get_uploads_for_current_account(
        &self,
    ) -> Result<Vec<UploadRecord>, UploadError> {
        match self.accounts.current_account() {
            Some(account) => self.get_uploads_for_account(&account.name()).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_current_uploads(&self) -> Result<Vec<UploadRecord>, UploadError> {
        self.list_current_account_by_status(&[UploadStatus::Pending, UploadStatus::InProgress])
            .await
    }

    pub async fn get_failed_uploads(&self) -> Result<Vec<UploadRecord>, UploadError> {
        self.list_current_account_by_status(&[UploadStatus::Failed])
            .await
    }

    pub async fn get_finished_uploads(&self) -> Result<Vec<UploadRecord>, UploadError> {
        self.list_current_account_by_status(&[UploadStatus::Succeeded])
            .await
    }

    // Status-filtered views never cross the account partition; only the
    // full snapshots do.
    async fn list_current_account_by_status(
        &self,
        statuses: &[UploadStatus],
    ) -> Result<Vec<UploadRecord>, UploadError> {
        match self.accounts.current_account() {
            Some(account) => Ok(self
                .store
                .list_by_statuses(&account.name(), statuses)
                .await?),
            None => Ok(Vec::new()),
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
