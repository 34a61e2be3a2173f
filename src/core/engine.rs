//! 存取引擎
//!
//! 把属性探测、调和决策和存储客户端串起来：单文件的 store / retrieve，
//! 目录级的 store_folder，以及远端清单查询。引擎不拥有凭据，
//! 只持有调用方构造好的客户端。

use crate::config::KeepConfig;
use crate::core::folder_diff;
use crate::core::format::FormatRegistry;
use crate::core::props::{probe_local, probe_remote, FileProperties};
use crate::core::reconciler::{decide, ConflictInfo, ConflictKind, Decision, ReconcilePolicy};
use crate::core::scanner::{FolderScanner, ScanConfig};
use crate::error::{KeepError, Result};
use crate::storage::{self, local, ObjectInfo, ObjectMeta, ObjectStore};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, info};

/// 引擎配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 目录推送的最大并发传输数
    pub max_concurrent_transfers: usize,
    /// 目录扫描配置
    pub scan: ScanConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_transfers: 4,
            scan: ScanConfig::default(),
        }
    }
}

/// 单文件操作的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// 执行了传输
    Transferred { bytes: u64 },
    /// 两侧已一致，未做任何传输
    UpToDate,
}

impl StoreOutcome {
    pub fn is_transferred(&self) -> bool {
        matches!(self, StoreOutcome::Transferred { .. })
    }
}

/// 目录推送报告
#[derive(Debug, Clone, Serialize)]
pub struct FolderReport {
    /// 参与比较的条目数
    pub entries: usize,
    pub transferred: u32,
    pub skipped: u32,
    pub failed: u32,
    pub bytes_transferred: u64,
    pub duration_ms: u64,
    /// 闸门之后发生的单文件传输错误
    pub errors: Vec<String>,
}

/// 存取引擎
pub struct KeepEngine {
    remote: Arc<dyn ObjectStore>,
    formats: FormatRegistry,
    config: EngineConfig,
}

impl KeepEngine {
    pub fn new(remote: Arc<dyn ObjectStore>) -> Self {
        Self {
            remote,
            formats: FormatRegistry::default(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(remote: Arc<dyn ObjectStore>, config: EngineConfig) -> Self {
        Self {
            remote,
            formats: FormatRegistry::default(),
            config,
        }
    }

    /// 按配置创建存储客户端并构造引擎
    pub fn connect(config: &KeepConfig) -> Result<Self> {
        let remote = storage::create_store(&config.remote)?;
        Ok(Self::with_config(
            remote,
            EngineConfig {
                max_concurrent_transfers: config.transfer.max_concurrent,
                scan: ScanConfig::default(),
            },
        ))
    }

    /// 格式注册表（可注册自定义扩展名）
    pub fn formats_mut(&mut self) -> &mut FormatRegistry {
        &mut self.formats
    }

    /// 把本地文件存到远端
    ///
    /// source=本地 / destination=远端。远端已有相同哈希的副本时跳过；
    /// 远端更新或策略不允许时返回冲突错误，由调用方决定是否 forced。
    pub async fn store(
        &self,
        local_path: impl AsRef<Path>,
        remote_name: &str,
        policy: ReconcilePolicy,
    ) -> Result<StoreOutcome> {
        let local_path = local_path.as_ref();
        info!(
            "存储 '{}' -> '{}' ({})",
            local_path.display(),
            remote_name,
            self.remote.name()
        );

        let source = probe_local(local_path).await?;
        let destination = probe_remote(self.remote.as_ref(), remote_name).await?;

        match (decide(&source, destination.as_ref(), &policy), destination) {
            (Decision::Transfer, _) => {
                let data = local::read_bytes(local_path).await?;
                let content_type = self.formats.lookup_or_default(local_path);
                self.remote.upload(remote_name, data, content_type).await?;
                info!("上传完成: '{}' ({} 字节)", remote_name, source.size);
                Ok(StoreOutcome::Transferred { bytes: source.size })
            }
            (Decision::Skip, Some(dest)) => {
                info!("远端已有相同哈希的副本 (存储于 {})", dest.modified);
                Ok(StoreOutcome::UpToDate)
            }
            (Decision::Conflict(kind), Some(dest)) => {
                Err(conflict_error(remote_name, kind, source, dest))
            }
            // decide 对不存在的目标只会返回 Transfer
            (_, None) => unreachable!(),
        }
    }

    /// 把远端对象取回本地
    ///
    /// source=远端 / destination=本地，与 store 完全对称。
    pub async fn retrieve(
        &self,
        local_path: impl AsRef<Path>,
        remote_name: &str,
        policy: ReconcilePolicy,
    ) -> Result<StoreOutcome> {
        let local_path = local_path.as_ref();
        info!(
            "取回 '{}' <- '{}' ({})",
            local_path.display(),
            remote_name,
            self.remote.name()
        );

        let source = probe_remote(self.remote.as_ref(), remote_name)
            .await?
            .ok_or_else(|| KeepError::RemoteNotFound(remote_name.to_string()))?;

        let destination = if local::exists(local_path).await {
            Some(probe_local(local_path).await?)
        } else {
            None
        };

        match (decide(&source, destination.as_ref(), &policy), destination) {
            (Decision::Transfer, _) => {
                let data = self.remote.download(remote_name).await?;
                let bytes = data.len() as u64;
                local::write_bytes(local_path, data).await?;
                info!("下载完成: '{}' ({} 字节)", local_path.display(), bytes);
                Ok(StoreOutcome::Transferred { bytes })
            }
            (Decision::Skip, Some(_)) => {
                info!("本地文件已存在且哈希一致");
                Ok(StoreOutcome::UpToDate)
            }
            (Decision::Conflict(kind), Some(dest)) => Err(conflict_error(
                &local_path.display().to_string(),
                kind,
                source,
                dest,
            )),
            (_, None) => unreachable!(),
        }
    }

    /// 把本地目录推送到远端前缀
    ///
    /// 先扫描、比较并对整份清单过一遍批量闸门（闸门中止时零传输），
    /// 然后以受限并发上传 New/Updated 条目。闸门之后的单文件传输错误
    /// 收集进报告，不中断其余传输。
    pub async fn store_folder(
        &self,
        local_dir: impl AsRef<Path>,
        remote_prefix: &str,
        policy: ReconcilePolicy,
    ) -> Result<FolderReport> {
        let local_dir = local_dir.as_ref();
        let started = Instant::now();
        info!(
            "推送目录 '{}' -> '{}' ({})",
            local_dir.display(),
            remote_prefix,
            self.remote.name()
        );

        let local_tree = FolderScanner::with_config(self.config.scan.clone())
            .scan(local_dir)
            .await?;
        let remote_tree = self.list_remote_tree(remote_prefix).await?;

        let entries = folder_diff::diff(&local_tree, &remote_tree);
        let summary = folder_diff::summarize(&entries);
        debug!(
            "差异: {} 新增, {} 未变, {} 更新, {} 异常",
            summary.new_count, summary.unchanged_count, summary.updated_count, summary.error_count
        );

        // 闸门对整份清单一次性裁决，任何传输都在这之后才开始
        let planned = folder_diff::plan_transfers(&entries, &policy)?;

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_transfers));
        let transferred = Arc::new(AtomicU64::new(0));
        let bytes_transferred = Arc::new(AtomicU64::new(0));
        let errors = Arc::new(RwLock::new(Vec::<String>::new()));

        let mut handles = Vec::new();
        for entry in &planned {
            let relative_path = entry.relative_path.clone();
            let absolute = local_dir.join(&relative_path);
            let object_name = join_remote(remote_prefix, &relative_path);
            let content_type = self.formats.lookup_or_default(&absolute).to_string();

            let permit = semaphore.clone().acquire_owned().await.unwrap();
            let remote = self.remote.clone();
            let transferred = transferred.clone();
            let bytes_transferred = bytes_transferred.clone();
            let errors = errors.clone();

            handles.push(tokio::spawn(async move {
                let result: Result<u64> = async {
                    let data = local::read_bytes(&absolute).await?;
                    let size = data.len() as u64;
                    remote.upload(&object_name, data, &content_type).await?;
                    Ok(size)
                }
                .await;

                match result {
                    Ok(size) => {
                        debug!("已上传: {} ({} 字节)", relative_path, size);
                        transferred.fetch_add(1, Ordering::Relaxed);
                        bytes_transferred.fetch_add(size, Ordering::Relaxed);
                    }
                    Err(e) => {
                        let mut errs = errors.write().await;
                        errs.push(format!("{}: {}", relative_path, e));
                    }
                }

                drop(permit);
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        let error_list = errors.read().await.clone();
        let report = FolderReport {
            entries: entries.len(),
            transferred: transferred.load(Ordering::Relaxed) as u32,
            skipped: summary.unchanged_count as u32,
            failed: error_list.len() as u32,
            bytes_transferred: bytes_transferred.load(Ordering::Relaxed),
            duration_ms: started.elapsed().as_millis() as u64,
            errors: error_list,
        };

        info!(
            "目录推送完成: 传输 {}, 跳过 {}, 失败 {}",
            report.transferred, report.skipped, report.failed
        );
        Ok(report)
    }

    /// 列出远端前缀下的对象
    pub async fn list_stored(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        self.remote.list(prefix).await
    }

    /// 远端清单 -> 相对路径 keyed 的属性表
    async fn list_remote_tree(&self, prefix: &str) -> Result<HashMap<String, FileProperties>> {
        let objects = self.remote.list(prefix).await?;
        let prefix = prefix.trim_matches('/');

        let mut tree = HashMap::new();
        for obj in objects {
            let relative = strip_remote_prefix(&obj.name, prefix);
            let meta = ObjectMeta {
                size: obj.size,
                modified: obj.modified,
                hash: obj.hash,
            };
            tree.insert(relative, FileProperties::from_object_meta(&meta));
        }
        Ok(tree)
    }
}

fn conflict_error(
    path: &str,
    kind: ConflictKind,
    source: FileProperties,
    destination: FileProperties,
) -> KeepError {
    let info = ConflictInfo {
        path: path.to_string(),
        kind,
        source,
        destination,
    };
    match kind {
        ConflictKind::DestinationNewer => KeepError::Conflict(info),
        ConflictKind::UpdateDisallowed => KeepError::PolicyViolation(info),
    }
}

/// 对象名 -> 相对路径
fn strip_remote_prefix(name: &str, prefix: &str) -> String {
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        return name.to_string();
    }
    name.strip_prefix(prefix)
        .map(|s| s.trim_start_matches('/'))
        .unwrap_or(name)
        .to_string()
}

/// 相对路径 -> 对象名
fn join_remote(prefix: &str, relative: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", prefix, relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_path_mapping() {
        assert_eq!(join_remote("", "a.csv"), "a.csv");
        assert_eq!(join_remote("backups/", "a.csv"), "backups/a.csv");
        assert_eq!(strip_remote_prefix("backups/a.csv", "backups"), "a.csv");
        assert_eq!(strip_remote_prefix("/a.csv", ""), "a.csv");
        // 往返一致
        assert_eq!(
            strip_remote_prefix(&join_remote("pre", "x/y.csv"), "pre"),
            "x/y.csv"
        );
    }
}
