use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("local path is empty")]
    EmptyLocalPath,
    #[error("remote path is empty")]
    EmptyRemotePath,
    #[error("remote path does not start with '/': {0}")]
    RelativeRemotePath(String),
    #[error("account name is empty")]
    EmptyAccountName,
    #[error("file size is negative: {0}")]
    NegativeFileSize(i64),
    #[error("terminal status requires an end timestamp")]
    MissingEndTimestamp,
    #[error("end timestamp set while upload is not terminal")]
    UnexpectedEndTimestamp,
    #[error("terminal status requires a concrete last result")]
    MissingLastResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
    Cancelled,
}

impl UploadStatus {
    pub fn code(self) -> i64 {
        match self {
            UploadStatus::Pending => 0,
            UploadStatus::InProgress => 1,
            UploadStatus::Succeeded => 2,
            UploadStatus::Failed => 3,
            UploadStatus::Cancelled => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(UploadStatus::Pending),
            1 => Some(UploadStatus::InProgress),
            2 => Some(UploadStatus::Succeeded),
            3 => Some(UploadStatus::Failed),
            4 => Some(UploadStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UploadStatus::Succeeded | UploadStatus::Failed | UploadStatus::Cancelled
        )
    }

    pub fn can_transition_to(self, next: UploadStatus) -> bool {
        use UploadStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Succeeded)
                | (InProgress, Failed)
                | (InProgress, Cancelled)
                | (Failed, Pending)
                | (Cancelled, Pending)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadResult {
    Unknown,
    Uploaded,
    NetworkError,
    CredentialError,
    Conflict,
    FileNotFound,
    DelayedForWifi,
    DelayedForCharging,
    QuotaExceeded,
}

impl UploadResult {
    pub fn code(self) -> i64 {
        match self {
            UploadResult::Unknown => 0,
            UploadResult::Uploaded => 1,
            UploadResult::NetworkError => 2,
            UploadResult::CredentialError => 3,
            UploadResult::Conflict => 4,
            UploadResult::FileNotFound => 5,
            UploadResult::DelayedForWifi => 6,
            UploadResult::DelayedForCharging => 7,
            UploadResult::QuotaExceeded => 8,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(UploadResult::Unknown),
            1 => Some(UploadResult::Uploaded),
            2 => Some(UploadResult::NetworkError),
            3 => Some(UploadResult::CredentialError),
            4 => Some(UploadResult::Conflict),
            5 => Some(UploadResult::FileNotFound),
            6 => Some(UploadResult::DelayedForWifi),
            7 => Some(UploadResult::DelayedForCharging),
            8 => Some(UploadResult::QuotaExceeded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    AskUser,
    Overwrite,
    Rename,
    Cancel,
}

impl CollisionPolicy {
    pub fn code(self) -> i64 {
        match self {
            CollisionPolicy::AskUser => 0,
            CollisionPolicy::Overwrite => 1,
            CollisionPolicy::Rename => 2,
            CollisionPolicy::Cancel => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(CollisionPolicy::AskUser),
            1 => Some(CollisionPolicy::Overwrite),
            2 => Some(CollisionPolicy::Rename),
            3 => Some(CollisionPolicy::Cancel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatedBy {
    User,
    InstantPicture,
    InstantVideo,
}

impl CreatedBy {
    pub fn code(self) -> i64 {
        match self {
            CreatedBy::User => 0,
            CreatedBy::InstantPicture => 1,
            CreatedBy::InstantVideo => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(CreatedBy::User),
            1 => Some(CreatedBy::InstantPicture),
            2 => Some(CreatedBy::InstantVideo),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalAction {
    None,
    Move,
    Delete,
    Forget,
}

impl LocalAction {
    pub fn code(self) -> i64 {
        match self {
            LocalAction::None => 0,
            LocalAction::Move => 1,
            LocalAction::Delete => 2,
            LocalAction::Forget => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(LocalAction::None),
            1 => Some(LocalAction::Move),
            2 => Some(LocalAction::Delete),
            3 => Some(LocalAction::Forget),
            _ => None,
        }
    }
}

/// Input for a new queue entry; the store assigns the id on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUpload {
    pub local_path: String,
    pub remote_path: String,
    pub account_name: String,
    pub file_size: i64,
    pub status: UploadStatus,
    pub last_result: UploadResult,
    pub collision_policy: CollisionPolicy,
    pub created_by: CreatedBy,
    pub local_action: LocalAction,
    pub use_wifi_only: bool,
    pub while_charging_only: bool,
    pub create_remote_folder: bool,
    pub upload_time: i64,
    pub upload_end: i64,
    pub folder_unlock_token: Option<String>,
}

impl NewUpload {
    pub fn new(local_path: &str, remote_path: &str, account_name: &str) -> Self {
        Self {
            local_path: local_path.to_string(),
            remote_path: remote_path.to_string(),
            account_name: account_name.to_string(),
            file_size: 0,
            status: UploadStatus::Pending,
            last_result: UploadResult::Unknown,
            collision_policy: CollisionPolicy::AskUser,
            created_by: CreatedBy::User,
            local_action: LocalAction::None,
            use_wifi_only: false,
            while_charging_only: false,
            create_remote_folder: false,
            upload_time: 0,
            upload_end: 0,
            folder_unlock_token: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(
            &self.local_path,
            &self.remote_path,
            &self.account_name,
            self.file_size,
            self.status,
            self.last_result,
            self.upload_end,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: i64,
    pub local_path: String,
    pub remote_path: String,
    pub account_name: String,
    pub file_size: i64,
    pub status: UploadStatus,
    pub last_result: UploadResult,
    pub collision_policy: CollisionPolicy,
    pub created_by: CreatedBy,
    pub local_action: LocalAction,
    pub use_wifi_only: bool,
    pub while_charging_only: bool,
    pub create_remote_folder: bool,
    pub upload_time: i64,
    pub upload_end: i64,
    pub folder_unlock_token: Option<String>,
}

impl UploadRecord {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(
            &self.local_path,
            &self.remote_path,
            &self.account_name,
            self.file_size,
            self.status,
            self.last_result,
            self.upload_end,
        )
    }
}

fn validate_fields(
    local_path: &str,
    remote_path: &str,
    account_name: &str,
    file_size: i64,
    status: UploadStatus,
    last_result: UploadResult,
    upload_end: i64,
) -> Result<(), ValidationError> {
    if local_path.is_empty() {
        return Err(ValidationError::EmptyLocalPath);
    }
    if remote_path.is_empty() {
        return Err(ValidationError::EmptyRemotePath);
    }
    if !remote_path.starts_with('/') {
        return Err(ValidationError::RelativeRemotePath(remote_path.to_string()));
    }
    if account_name.is_empty() {
        return Err(ValidationError::EmptyAccountName);
    }
    if file_size < 0 {
        return Err(ValidationError::NegativeFileSize(file_size));
    }
    // upload_end is zero exactly while the upload can still run.
    if status.is_terminal() && upload_end == 0 {
        return Err(ValidationError::MissingEndTimestamp);
    }
    if !status.is_terminal() && upload_end != 0 {
        return Err(ValidationError::UnexpectedEndTimestamp);
    }
    if status.is_terminal() && last_result == UploadResult::Unknown {
        return Err(ValidationError::MissingLastResult);
    }
    Ok(())
}
