use std::{fs, path::PathBuf};

use futures_util::StreamExt;
use sqlx::{
    Row, SqlitePool,
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqliteRow},
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::record::{
    CollisionPolicy, CreatedBy, LocalAction, NewUpload, UploadRecord, UploadResult, UploadStatus,
};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XDG data directory is unavailable")]
    MissingDataDir,
    #[error("invalid status code: {0}")]
    InvalidStatus(i64),
    #[error("invalid result code: {0}")]
    InvalidResult(i64),
    #[error("invalid collision policy code: {0}")]
    InvalidCollisionPolicy(i64),
    #[error("invalid created-by code: {0}")]
    InvalidCreatedBy(i64),
    #[error("invalid local action code: {0}")]
    InvalidLocalAction(i64),
    #[error("scan cancelled")]
    Cancelled,
}

const SELECT_COLUMNS: &str = "SELECT id, local_path, remote_path, account_name, file_size, \
     status, last_result, created_by, upload_time, upload_end, collision, local_action, \
     create_folder, wifi_only, charging_only, folder_token FROM uploads";

pub struct UploadStore {
    pool: SqlitePool,
}

impl UploadStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePool::connect(database_url).await?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    pub async fn new_default() -> Result<Self, StoreError> {
        let db_path = default_db_path()?;
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    pub async fn init(&self) -> Result<(), StoreError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub async fn insert(&self, upload: &NewUpload) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO uploads (local_path, remote_path, account_name, file_size, status, \
             last_result, created_by, upload_time, upload_end, collision, local_action, \
             create_folder, wifi_only, charging_only, folder_token) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .bind(&upload.local_path)
        .bind(&upload.remote_path)
        .bind(&upload.account_name)
        .bind(upload.file_size)
        .bind(upload.status.code())
        .bind(upload.last_result.code())
        .bind(upload.created_by.code())
        .bind(upload.upload_time)
        .bind(upload.upload_end)
        .bind(upload.collision_policy.code())
        .bind(upload.local_action.code())
        .bind(if upload.create_remote_folder { 1 } else { 0 })
        .bind(if upload.use_wifi_only { 1 } else { 0 })
        .bind(if upload.while_charging_only { 1 } else { 0 })
        .bind(&upload.folder_unlock_token)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn insert_batch(&self, uploads: &[NewUpload]) -> Result<Vec<i64>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let result = sqlx::query(
                "INSERT INTO uploads (local_path, remote_path, account_name, file_size, status, \
                 last_result, created_by, upload_time, upload_end, collision, local_action, \
                 create_folder, wifi_only, charging_only, folder_token) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            )
            .bind(&upload.local_path)
            .bind(&upload.remote_path)
            .bind(&upload.account_name)
            .bind(upload.file_size)
            .bind(upload.status.code())
            .bind(upload.last_result.code())
            .bind(upload.created_by.code())
            .bind(upload.upload_time)
            .bind(upload.upload_end)
            .bind(upload.collision_policy.code())
            .bind(upload.local_action.code())
            .bind(if upload.create_remote_folder { 1 } else { 0 })
            .bind(if upload.use_wifi_only { 1 } else { 0 })
            .bind(if upload.while_charging_only { 1 } else { 0 })
            .bind(&upload.folder_unlock_token)
            .execute(&mut *tx)
            .await?;
            ids.push(result.last_insert_rowid());
        }
        tx.commit().await?;
        Ok(ids)
    }

    pub async fn update(&self, record: &UploadRecord) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE uploads SET local_path = ?1, remote_path = ?2, account_name = ?3, \
             file_size = ?4, status = ?5, last_result = ?6, created_by = ?7, upload_time = ?8, \
             upload_end = ?9, collision = ?10, local_action = ?11, create_folder = ?12, \
             wifi_only = ?13, charging_only = ?14, folder_token = ?15 WHERE id = ?16",
        )
        .bind(&record.local_path)
        .bind(&record.remote_path)
        .bind(&record.account_name)
        .bind(record.file_size)
        .bind(record.status.code())
        .bind(record.last_result.code())
        .bind(record.created_by.code())
        .bind(record.upload_time)
        .bind(record.upload_end)
        .bind(record.collision_policy.code())
        .bind(record.local_action.code())
        .bind(if record.create_remote_folder { 1 } else { 0 })
        .bind(if record.use_wifi_only { 1 } else { 0 })
        .bind(if record.while_charging_only { 1 } else { 0 })
        .bind(&record.folder_unlock_token)
        .bind(record.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete(&self, id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM uploads WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // Single statement so a concurrent reader sees all of the account's rows or none.
    pub async fn delete_by_account(&self, account_name: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM uploads WHERE account_name = ?1")
            .bind(account_name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_succeeded_before(&self, cutoff_millis: i64) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM uploads WHERE status = ?1 AND upload_end < ?2")
                .bind(UploadStatus::Succeeded.code())
                .bind(cutoff_millis)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn get(&self, id: i64) -> Result<Option<UploadRecord>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(record_from_row(&row)?))
    }

    pub async fn list_all(&self) -> Result<Vec<UploadRecord>, StoreError> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }

    pub async fn scan_all(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<UploadRecord>, StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let sql = format!("{SELECT_COLUMNS} ORDER BY id ASC");
        let mut rows = sqlx::query(&sql).fetch(&self.pool);
        let mut out = Vec::new();
        while let Some(row) = rows.next().await {
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            out.push(record_from_row(&row?)?);
        }
        Ok(out)
    }

    pub async fn list_by_account(
        &self,
        account_name: &str,
    ) -> Result<Vec<UploadRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE account_name = ?1 ORDER BY id ASC"
        ))
        .bind(account_name)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(record_from_row).collect()
    }

    // Status filters stay scoped to one account; only list_all/scan_all may
    // cross the partition.
    pub async fn list_by_statuses(
        &self,
        account_name: &str,
        statuses: &[UploadStatus],
    ) -> Result<Vec<UploadRecord>, StoreError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = (2..=statuses.len() + 1)
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "{SELECT_COLUMNS} WHERE account_name = ?1 AND status IN ({placeholders}) \
             ORDER BY id ASC"
        );
        let mut query = sqlx::query(&sql).bind(account_name);
        for status in statuses {
            query = query.bind(status.code());
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }
}

fn record_from_row(row: &SqliteRow) -> Result<UploadRecord, StoreError> {
    let status: i64 = row.try_get("status")?;
    let last_result: i64 = row.try_get("last_result")?;
    let collision: i64 = row.try_get("collision")?;
    let created_by: i64 = row.try_get("created_by")?;
    let local_action: i64 = row.try_get("local_action")?;
    let create_folder: i64 = row.try_get("create_folder")?;
    let wifi_only: i64 = row.try_get("wifi_only")?;
    let charging_only: i64 = row.try_get("charging_only")?;

    Ok(UploadRecord {
        id: row.try_get("id")?,
        local_path: row.try_get("local_path")?,
        remote_path: row.try_get("remote_path")?,
        account_name: row.try_get("account_name")?,
        file_size: row.try_get("file_size")?,
        status: UploadStatus::from_code(status).ok_or(StoreError::InvalidStatus(status))?,
        last_result: UploadResult::from_code(last_result)
            .ok_or(StoreError::InvalidResult(last_result))?,
        collision_policy: CollisionPolicy::from_code(collision)
            .ok_or(StoreError::InvalidCollisionPolicy(collision))?,
        created_by: CreatedBy::from_code(created_by)
            .ok_or(StoreError::InvalidCreatedBy(created_by))?,
        local_action: LocalAction::from_code(local_action)
            .ok_or(StoreError::InvalidLocalAction(local_action))?,
        create_remote_folder: create_folder != 0,
        use_wifi_only: wifi_only != 0,
        while_charging_only: charging_only != 0,
        upload_time: row.try_get("upload_time")?,
        upload_end: row.try_get("upload_end")?,
        folder_unlock_token: row.try_get("folder_token")?,
    })
}

fn default_db_path() -> Result<PathBuf, StoreError> {
    let mut path = dirs::data_dir().ok_or(StoreError::MissingDataDir)?;
    path.push("upload-queue");
    path.push("uploads.db");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn make_store() -> UploadStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = UploadStore::from_pool(pool);
        store.init().await.unwrap();
        store
    }

    fn sample(account: &str) -> NewUpload {
        let mut upload = NewUpload::new("/tmp/photo.jpg", "/Photos/photo.jpg", account);
        upload.file_size = 1024;
        upload.use_wifi_only = true;
        upload.folder_unlock_token = Some("tok-123".into());
        upload
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let store = make_store().await;
        let upload = sample("user@server");

        let id = store.insert(&upload).await.unwrap();
        let fetched = store.get(id).await.unwrap().expect("row should exist");

        assert_eq!(fetched.id, id);
        assert_eq!(fetched.local_path, upload.local_path);
        assert_eq!(fetched.remote_path, upload.remote_path);
        assert_eq!(fetched.account_name, upload.account_name);
        assert_eq!(fetched.file_size, 1024);
        assert_eq!(fetched.status, UploadStatus::Pending);
        assert!(fetched.use_wifi_only);
        assert_eq!(fetched.folder_unlock_token.as_deref(), Some("tok-123"));
    }

    #[tokio::test]
    async fn get_unknown_id_returns_none() {
        let store = make_store().await;
        assert!(store.get(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ids_are_assigned_in_insert_order() {
        let store = make_store().await;
        let first = store.insert(&sample("a@s")).await.unwrap();
        let second = store.insert(&sample("a@s")).await.unwrap();
        assert!(second > first);

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first);
        assert_eq!(all[1].id, second);
    }

    #[tokio::test]
    async fn update_replaces_row_and_reports_count() {
        let store = make_store().await;
        let id = store.insert(&sample("a@s")).await.unwrap();
        let mut record = store.get(id).await.unwrap().unwrap();
        record.file_size = 9000;
        record.status = UploadStatus::InProgress;

        assert_eq!(store.update(&record).await.unwrap(), 1);
        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.file_size, 9000);
        assert_eq!(fetched.status, UploadStatus::InProgress);

        record.id = 9999;
        assert_eq!(store.update(&record).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_by_account_removes_only_that_account() {
        let store = make_store().await;
        for _ in 0..3 {
            store.insert(&sample("a@s")).await.unwrap();
        }
        for _ in 0..4 {
            store.insert(&sample("b@s")).await.unwrap();
        }

        assert_eq!(store.delete_by_account("b@s").await.unwrap(), 4);
        let rest = store.list_all().await.unwrap();
        assert_eq!(rest.len(), 3);
        assert!(rest.iter().all(|r| r.account_name == "a@s"));

        assert_eq!(store.delete_by_account("b@s").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn insert_batch_is_transactional() {
        let store = make_store().await;
        let ids = store
            .insert_batch(&[sample("a@s"), sample("a@s"), sample("b@s")])
            .await
            .unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(store.list_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn list_by_statuses_filters_rows_within_one_account() {
        let store = make_store().await;
        store.insert(&sample("a@s")).await.unwrap();
        let mut running = sample("a@s");
        running.status = UploadStatus::InProgress;
        store.insert(&running).await.unwrap();
        let mut failed = sample("a@s");
        failed.status = UploadStatus::Failed;
        failed.last_result = UploadResult::NetworkError;
        failed.upload_end = 1_700_000_000_000;
        store.insert(&failed).await.unwrap();
        // Same statuses under another account must not leak in.
        store.insert(&sample("b@s")).await.unwrap();

        let current = store
            .list_by_statuses("a@s", &[UploadStatus::Pending, UploadStatus::InProgress])
            .await
            .unwrap();
        assert_eq!(current.len(), 2);
        assert!(current.iter().all(|r| r.account_name == "a@s"));

        let failed_rows = store
            .list_by_statuses("a@s", &[UploadStatus::Failed])
            .await
            .unwrap();
        assert_eq!(failed_rows.len(), 1);
        assert_eq!(failed_rows[0].last_result, UploadResult::NetworkError);

        assert!(store.list_by_statuses("a@s", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scan_honours_cancellation() {
        let store = make_store().await;
        for _ in 0..10 {
            store.insert(&sample("a@s")).await.unwrap();
        }

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = store.scan_all(&cancel).await.expect_err("expected cancel");
        assert!(matches!(err, StoreError::Cancelled));

        let fresh = CancellationToken::new();
        assert_eq!(store.scan_all(&fresh).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn unknown_status_code_is_surfaced() {
        let store = make_store().await;
        let id = store.insert(&sample("a@s")).await.unwrap();
        sqlx::query("UPDATE uploads SET status = 99 WHERE id = ?1")
            .bind(id)
            .execute(&store.pool)
            .await
            .unwrap();

        let err = store.get(id).await.expect_err("expected decode failure");
        assert!(matches!(err, StoreError::InvalidStatus(99)));
    }

    #[tokio::test]
    async fn delete_succeeded_before_sweeps_old_rows() {
        let store = make_store().await;
        let mut old = sample("a@s");
        old.status = UploadStatus::Succeeded;
        old.last_result = UploadResult::Uploaded;
        old.upload_end = 1_000;
        store.insert(&old).await.unwrap();

        let mut recent = old.clone();
        recent.upload_end = 2_000;
        store.insert(&recent).await.unwrap();

        assert_eq!(store.delete_succeeded_before(1_500).await.unwrap(), 1);
        let rest = store.list_all().await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].upload_end, 2_000);
    }
}
