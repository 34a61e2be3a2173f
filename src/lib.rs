pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod storage;

pub use config::{KeepConfig, RemoteConfig, RemoteKind, TransferConfig};
pub use crate::core::{
    decide, diff, probe_local, probe_remote, ContentHash, Decision, EngineConfig, FileProperties,
    FolderDiffEntry, FolderReport, KeepEngine, ReconcilePolicy, StoreOutcome,
};
pub use error::{KeepError, Result};
pub use storage::{create_store, AzblobStore, ObjectInfo, ObjectMeta, ObjectStore, S3Store};
