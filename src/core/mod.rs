pub mod engine;
pub mod folder_diff;
pub mod format;
pub mod props;
pub mod reconciler;
pub mod scanner;

pub use engine::{EngineConfig, FolderReport, KeepEngine, StoreOutcome};
pub use folder_diff::{
    diff, plan_transfers, summarize, BatchAbort, DiffSummary, EntryStatus, FolderDiffEntry,
};
pub use format::{FormatRegistry, OCTET_STREAM};
pub use props::{probe_local, probe_remote, ContentHash, FileProperties};
pub use reconciler::{decide, ConflictInfo, ConflictKind, Decision, ReconcilePolicy};
pub use scanner::{FolderScanner, ScanConfig};
