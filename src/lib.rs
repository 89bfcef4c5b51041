mod account;
mod events;
mod manager;
mod record;
mod store;

pub use account::{Account, AccountProvider, StaticAccountProvider};
pub use events::UploadEvent;
pub use manager::{UploadError, UploadManager};
pub use record::{
    CollisionPolicy, CreatedBy, LocalAction, NewUpload, UploadRecord, UploadResult, UploadStatus,
    ValidationError,
};
pub use store::{StoreError, UploadStore};
