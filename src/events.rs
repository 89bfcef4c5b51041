use crate::record::UploadStatus;

/// Broadcast to subscribers after a mutation has been persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Stored { id: i64, account_name: String },
    Updated { id: i64, status: UploadStatus },
    Removed { id: i64 },
    AccountRemoved { account_name: String, removed: u64 },
    Swept { removed: u64 },
}
