//! 错误类型定义

use crate::core::folder_diff::BatchAbort;
use crate::core::reconciler::ConflictInfo;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KeepError>;

/// 库的统一错误类型
///
/// 传输层错误（网络、权限）直接透传底层存储客户端的错误，不做包装。
#[derive(Error, Debug)]
pub enum KeepError {
    /// 本地文件不存在
    #[error("local file not found: {}", .0.display())]
    LocalNotFound(PathBuf),

    /// 远端对象不存在
    #[error("object not found: {0}")]
    RemoteNotFound(String),

    /// 目标比源更新，拒绝覆盖
    #[error("{0}")]
    Conflict(ConflictInfo),

    /// 目标存在且内容不同，但调用方未允许更新
    #[error("{0}")]
    PolicyViolation(ConflictInfo),

    /// 批量传输被整体中止（没有任何文件被传输）
    #[error("{0}")]
    BatchAborted(BatchAbort),

    /// 扩展名未注册任何格式
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// 哈希字符串既不是合法的 hex 也不是合法的 base64
    #[error("invalid hash encoding: {0}")]
    InvalidHash(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] opendal::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
