//! 目录差异
//!
//! 把单文件的调和决策扩展到一个本地目录对一个远端前缀：按相对路径做外连接，
//! 给每个条目定状态，再由批量闸门一次性决定整批是传输还是中止。
//! 协议只从本地推向远端，远端独有的对象不参与（不删除、不拉取）。

use crate::core::props::FileProperties;
use crate::core::reconciler::ReconcilePolicy;
use crate::error::{KeepError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 单个条目的差异状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// 仅本地存在
    New,
    /// 两侧哈希一致
    Unchanged,
    /// 本地严格更新且内容不同
    Updated,
    /// 远端更新或无法裁决
    Error,
}

/// 差异条目，按相对路径唯一
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderDiffEntry {
    pub relative_path: String,
    pub local: Option<FileProperties>,
    pub remote: Option<FileProperties>,
    pub status: EntryStatus,
}

/// 差异统计
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DiffSummary {
    pub new_count: usize,
    pub unchanged_count: usize,
    pub updated_count: usize,
    pub error_count: usize,
}

/// 批量中止详情：所有触发中止的条目，带两侧属性
#[derive(Debug, Clone)]
pub struct BatchAbort {
    pub entries: Vec<FolderDiffEntry>,
}

impl std::fmt::Display for BatchAbort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "batch aborted, {} entries need attention (nothing was transferred): ",
            self.entries.len()
        )?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "'{}' [{:?}]", entry.relative_path, entry.status)?;
        }
        f.write_str("; use forced to overwrite")
    }
}

/// 对两份清单做外连接，产出按路径排序的差异条目
///
/// 两侧都有时：哈希都已知且相等 -> Unchanged；否则本地严格更新 -> Updated
/// （哈希未知按单文件决策的时间回退处理）；其余 -> Error。
pub fn diff(
    local: &HashMap<String, FileProperties>,
    remote: &HashMap<String, FileProperties>,
) -> Vec<FolderDiffEntry> {
    let mut entries: Vec<FolderDiffEntry> = local
        .iter()
        .map(|(path, local_props)| {
            let remote_props = remote.get(path);
            let status = match remote_props {
                None => EntryStatus::New,
                Some(rp) => classify_pair(local_props, rp),
            };
            FolderDiffEntry {
                relative_path: path.clone(),
                local: Some(local_props.clone()),
                remote: remote_props.cloned(),
                status,
            }
        })
        .collect();

    // 输出排序，保证结果稳定
    entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    entries
}

fn classify_pair(local: &FileProperties, remote: &FileProperties) -> EntryStatus {
    if let (Some(lh), Some(rh)) = (&local.hash, &remote.hash) {
        if lh == rh {
            return EntryStatus::Unchanged;
        }
    }
    if local.modified > remote.modified {
        EntryStatus::Updated
    } else {
        EntryStatus::Error
    }
}

/// 统计各状态条目数
pub fn summarize(entries: &[FolderDiffEntry]) -> DiffSummary {
    let mut summary = DiffSummary::default();
    for entry in entries {
        match entry.status {
            EntryStatus::New => summary.new_count += 1,
            EntryStatus::Unchanged => summary.unchanged_count += 1,
            EntryStatus::Updated => summary.updated_count += 1,
            EntryStatus::Error => summary.error_count += 1,
        }
    }
    summary
}

/// 批量闸门：在任何传输开始前，对整份清单一次性裁决
///
/// - forced -> New、Updated、Error 全部传输（forced 绕过所有检查）
/// - 存在 Error 条目 -> 整批中止，零传输
/// - 存在 Updated 条目但不允许 update -> 同样整批中止
/// - 其余 -> 传输 New 和 Updated；Unchanged 永不重传
pub fn plan_transfers<'a>(
    entries: &'a [FolderDiffEntry],
    policy: &ReconcilePolicy,
) -> Result<Vec<&'a FolderDiffEntry>> {
    if policy.forced {
        return Ok(entries
            .iter()
            .filter(|e| e.status != EntryStatus::Unchanged)
            .collect());
    }

    let errors: Vec<FolderDiffEntry> = entries
        .iter()
        .filter(|e| e.status == EntryStatus::Error)
        .cloned()
        .collect();
    if !errors.is_empty() {
        return Err(KeepError::BatchAborted(BatchAbort { entries: errors }));
    }

    if !policy.update {
        let updated: Vec<FolderDiffEntry> = entries
            .iter()
            .filter(|e| e.status == EntryStatus::Updated)
            .cloned()
            .collect();
        if !updated.is_empty() {
            return Err(KeepError::BatchAborted(BatchAbort { entries: updated }));
        }
    }

    Ok(entries
        .iter()
        .filter(|e| matches!(e.status, EntryStatus::New | EntryStatus::Updated))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::props::ContentHash;
    use chrono::{Duration, TimeZone, Utc};

    const HASH_A: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";
    const HASH_B: &str = "9e107d9d372bb6826bd81d3542a419d6";

    fn props(hash: Option<&str>, offset_secs: i64) -> FileProperties {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        FileProperties {
            hash: hash.map(|h| ContentHash::parse(h).unwrap()),
            size: 100,
            modified: base + Duration::seconds(offset_secs),
        }
    }

    fn listing(items: &[(&str, Option<&str>, i64)]) -> HashMap<String, FileProperties> {
        items
            .iter()
            .map(|(path, hash, offset)| (path.to_string(), props(*hash, *offset)))
            .collect()
    }

    #[test]
    fn test_diff_new_and_unchanged() {
        let local = listing(&[("a.csv", Some(HASH_A), 0), ("b.csv", Some(HASH_B), 0)]);
        let remote = listing(&[("b.csv", Some(HASH_B), -3600)]);

        let entries = diff(&local, &remote);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].relative_path, "a.csv");
        assert_eq!(entries[0].status, EntryStatus::New);
        assert_eq!(entries[1].relative_path, "b.csv");
        assert_eq!(entries[1].status, EntryStatus::Unchanged);
    }

    #[test]
    fn test_diff_ignores_remote_only_paths() {
        let local = listing(&[("a.csv", Some(HASH_A), 0)]);
        let remote = listing(&[("ghost.csv", Some(HASH_B), 0)]);

        let entries = diff(&local, &remote);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].relative_path, "a.csv");
    }

    #[test]
    fn test_diff_updated_and_error() {
        let local = listing(&[("up.csv", Some(HASH_A), 60), ("old.csv", Some(HASH_A), -60)]);
        let remote = listing(&[("up.csv", Some(HASH_B), 0), ("old.csv", Some(HASH_B), 0)]);

        let entries = diff(&local, &remote);
        let by_path: HashMap<_, _> = entries
            .iter()
            .map(|e| (e.relative_path.as_str(), e.status))
            .collect();
        assert_eq!(by_path["up.csv"], EntryStatus::Updated);
        assert_eq!(by_path["old.csv"], EntryStatus::Error);
    }

    #[test]
    fn test_diff_unknown_hash_uses_mtime() {
        // 远端无哈希：本地严格更新 -> Updated，时间相同 -> Error
        let local = listing(&[("x.csv", Some(HASH_A), 60), ("y.csv", Some(HASH_A), 0)]);
        let remote = listing(&[("x.csv", None, 0), ("y.csv", None, 0)]);

        let entries = diff(&local, &remote);
        let by_path: HashMap<_, _> = entries
            .iter()
            .map(|e| (e.relative_path.as_str(), e.status))
            .collect();
        assert_eq!(by_path["x.csv"], EntryStatus::Updated);
        assert_eq!(by_path["y.csv"], EntryStatus::Error);
    }

    #[test]
    fn test_plan_transfers_new_and_updated_only() {
        let local = listing(&[
            ("a.csv", Some(HASH_A), 0),
            ("b.csv", Some(HASH_B), 60),
            ("c.csv", Some(HASH_A), 0),
        ]);
        let remote = listing(&[("b.csv", Some(HASH_A), 0), ("c.csv", Some(HASH_A), -60)]);

        let entries = diff(&local, &remote);
        let planned = plan_transfers(&entries, &ReconcilePolicy::updating()).unwrap();
        let paths: Vec<_> = planned.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn test_one_error_aborts_whole_batch() {
        let local = listing(&[
            ("fresh.csv", Some(HASH_A), 0), // New
            ("stale.csv", Some(HASH_A), -60), // Error: 远端更新
        ]);
        let remote = listing(&[("stale.csv", Some(HASH_B), 0)]);

        let entries = diff(&local, &remote);
        let err = plan_transfers(&entries, &ReconcilePolicy::updating()).unwrap_err();
        match err {
            KeepError::BatchAborted(abort) => {
                assert_eq!(abort.entries.len(), 1);
                assert_eq!(abort.entries[0].relative_path, "stale.csv");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_updated_without_update_aborts() {
        let local = listing(&[("b.csv", Some(HASH_B), 60)]);
        let remote = listing(&[("b.csv", Some(HASH_A), 0)]);

        let entries = diff(&local, &remote);
        let err = plan_transfers(&entries, &ReconcilePolicy::default()).unwrap_err();
        assert!(matches!(err, KeepError::BatchAborted(_)));
    }

    #[test]
    fn test_forced_bypasses_gate() {
        let local = listing(&[
            ("stale.csv", Some(HASH_A), -60),
            ("same.csv", Some(HASH_A), 0),
        ]);
        let remote = listing(&[
            ("stale.csv", Some(HASH_B), 0),
            ("same.csv", Some(HASH_A), 0),
        ]);

        let entries = diff(&local, &remote);
        let planned = plan_transfers(&entries, &ReconcilePolicy::overwriting()).unwrap();
        let paths: Vec<_> = planned.iter().map(|e| e.relative_path.as_str()).collect();
        // Error 条目被强制传输，Unchanged 仍然跳过
        assert_eq!(paths, vec!["stale.csv"]);
    }

    #[test]
    fn test_summarize() {
        let local = listing(&[
            ("a.csv", Some(HASH_A), 0),
            ("b.csv", Some(HASH_B), 60),
            ("c.csv", Some(HASH_A), 0),
        ]);
        let remote = listing(&[("b.csv", Some(HASH_A), 0), ("c.csv", Some(HASH_A), 0)]);

        let summary = summarize(&diff(&local, &remote));
        assert_eq!(summary.new_count, 1);
        assert_eq!(summary.updated_count, 1);
        assert_eq!(summary.unchanged_count, 1);
        assert_eq!(summary.error_count, 0);
    }
}
