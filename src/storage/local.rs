//! 本地文件系统协作方
//!
//! 核心需要的能力：exists / stat / 读字节 / 原子写 / 目录遍历。

use crate::error::{KeepError, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

/// 目录遍历得到的一个文件条目
#[derive(Debug, Clone)]
pub struct LocalEntry {
    /// 相对于遍历根的路径，分隔符统一为 /
    pub relative_path: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// 检查路径是否存在
pub async fn exists(path: impl AsRef<Path>) -> bool {
    fs::metadata(path.as_ref()).await.is_ok()
}

/// 获取文件大小和修改时间，不存在时返回 None
pub async fn stat(path: impl AsRef<Path>) -> Result<Option<(u64, DateTime<Utc>)>> {
    match fs::metadata(path.as_ref()).await {
        Ok(meta) => {
            let modified = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or(DateTime::UNIX_EPOCH);
            Ok(Some((meta.len(), modified)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// 读取整个文件
pub async fn read_bytes(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    match fs::read(path).await {
        Ok(data) => Ok(data),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(KeepError::LocalNotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// 原子写入：先写临时文件再重命名，避免半截文件
pub async fn write_bytes(path: impl AsRef<Path>, data: Vec<u8>) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, data).await?;
    fs::rename(&temp_path, path).await?;

    Ok(())
}

/// 递归遍历目录，返回所有普通文件
///
/// walkdir 是阻塞的，放进 spawn_blocking 避免卡住 runtime。
pub async fn list_folder(dir: impl AsRef<Path>) -> Result<Vec<LocalEntry>> {
    let base: PathBuf = dir.as_ref().to_path_buf();

    if !base.exists() {
        return Err(KeepError::LocalNotFound(base));
    }

    let entries = tokio::task::spawn_blocking(move || {
        WalkDir::new(&base)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter_map(|entry| {
                let metadata = entry.metadata().ok()?;
                if metadata.is_dir() {
                    return None;
                }

                let relative_path = entry
                    .path()
                    .strip_prefix(&base)
                    .ok()?
                    .to_str()?
                    .replace('\\', "/");
                if relative_path.is_empty() {
                    return None;
                }

                let modified = metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or(DateTime::UNIX_EPOCH);

                Some(LocalEntry {
                    relative_path,
                    size: metadata.len(),
                    modified,
                })
            })
            .collect::<Vec<_>>()
    })
    .await
    .map_err(std::io::Error::other)?;

    Ok(entries)
}
