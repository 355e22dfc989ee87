mod logs;
mod policy;
mod store;

pub use logs::{LogFileEntry, LogFileStore};
pub use policy::RetentionPolicySource;
pub use store::{ArchivableRow, ArchivedRow, LifecycleStore};
