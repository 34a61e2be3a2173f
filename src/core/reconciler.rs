//! 调和决策
//!
//! 对同一逻辑文件的本地副本和远端副本做比较，决定跳过、传输还是冲突。
//! store 方向 source=本地 / destination=远端，retrieve 方向正好相反，
//! 算法对两个方向完全对称。

use crate::core::props::FileProperties;
use serde::{Deserialize, Serialize};

/// 调和策略，每次调用单独给定
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReconcilePolicy {
    /// 允许较新的源覆盖目标
    pub update: bool,
    /// 跳过所有检查，无条件覆盖
    pub forced: bool,
}

impl ReconcilePolicy {
    pub fn new(update: bool, forced: bool) -> Self {
        Self { update, forced }
    }

    /// update=true 的策略
    pub fn updating() -> Self {
        Self {
            update: true,
            forced: false,
        }
    }

    /// forced=true 的策略
    pub fn overwriting() -> Self {
        Self {
            update: false,
            forced: true,
        }
    }
}

/// 冲突类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// 目标严格比源新，覆盖会丢数据
    DestinationNewer,
    /// 目标存在且内容不同，但策略不允许更新
    UpdateDisallowed,
}

/// 单次调和的裁决
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// 两侧已一致
    Skip,
    /// 执行上传/下载
    Transfer,
    /// 拒绝，由调用方决定是否 forced 重试
    Conflict(ConflictKind),
}

/// 冲突详情，带两侧的大小和修改时间，供人工判断是否强制覆盖
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub path: String,
    pub kind: ConflictKind,
    pub source: FileProperties,
    pub destination: FileProperties,
}

impl std::fmt::Display for ConflictInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ConflictKind::DestinationNewer => write!(
                f,
                "'{}': destination ({} bytes, last modified {}) is newer than source ({} bytes, last modified {}); use forced to overwrite",
                self.path,
                self.destination.size,
                self.destination.modified,
                self.source.size,
                self.source.modified,
            ),
            ConflictKind::UpdateDisallowed => write!(
                f,
                "'{}': destination ({} bytes, last modified {}) doesn't match source ({} bytes, last modified {}); use update or forced to overwrite",
                self.path,
                self.destination.size,
                self.destination.modified,
                self.source.size,
                self.source.modified,
            ),
        }
    }
}

/// 核心决策函数
///
/// 1. 目标不存在 -> Transfer
/// 2. forced -> Transfer
/// 3. 两侧哈希都已知且相等（归一化后）-> Skip
/// 4. 目标严格比源新 -> Conflict(DestinationNewer)
/// 5. 不允许 update -> Conflict(UpdateDisallowed)
/// 6. 其余 -> Transfer
///
/// 目标哈希未知时只跳过第 3 步，4-6 步仍按修改时间裁决：
/// 哈希未知是比哈希不匹配更弱的信号，目标不更新时传输照常进行。
pub fn decide(
    source: &FileProperties,
    destination: Option<&FileProperties>,
    policy: &ReconcilePolicy,
) -> Decision {
    let dest = match destination {
        None => return Decision::Transfer,
        Some(d) => d,
    };

    if policy.forced {
        return Decision::Transfer;
    }

    if let (Some(src_hash), Some(dst_hash)) = (&source.hash, &dest.hash) {
        if src_hash == dst_hash {
            return Decision::Skip;
        }
    }

    if dest.modified > source.modified {
        return Decision::Conflict(ConflictKind::DestinationNewer);
    }

    if !policy.update {
        return Decision::Conflict(ConflictKind::UpdateDisallowed);
    }

    Decision::Transfer
}
