//! 对象存储抽象
//!
//! 核心只消费这里定义的能力集合：exists / stat / list / upload / download。
//! 凭据生命周期完全在外部管理，引擎只持有调用方构造好的客户端。

pub mod azblob;
pub mod local;
pub mod s3;

use crate::config::{RemoteConfig, RemoteKind};
use crate::error::{KeepError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use azblob::AzblobStore;
pub use s3::S3Store;

/// 非 IO 操作超时（秒）- stat, list 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- upload, download
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 单个对象的元数据
///
/// `hash` 是后端报告的原始摘要字符串：azblob 的 base64 Content-MD5 优先，
/// 退而取 etag。编码归一化在 `FileProperties::from_object_meta` 里做。
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub hash: Option<String>,
}

/// 列表条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub hash: Option<String>,
}

/// 对象存储客户端接口
///
/// 协议从不删除远端对象，所以没有 delete。
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 获取对象元数据，对象不存在时返回 None
    async fn stat(&self, name: &str) -> Result<Option<ObjectMeta>>;

    /// 递归列出前缀下的所有对象
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    /// 上传整个对象
    async fn upload(&self, name: &str, data: Vec<u8>, content_type: &str) -> Result<()>;

    /// 下载整个对象
    async fn download(&self, name: &str) -> Result<Vec<u8>>;

    /// 检查对象是否存在
    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.stat(name).await?.is_some())
    }

    /// 存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 根据配置创建存储客户端
pub fn create_store(config: &RemoteConfig) -> Result<Arc<dyn ObjectStore>> {
    fn require<'a>(field: &'a Option<String>, msg: &str) -> Result<&'a str> {
        field
            .as_deref()
            .ok_or_else(|| KeepError::Config(msg.to_string()))
    }

    match config.kind {
        RemoteKind::Azblob => {
            let endpoint = require(&config.endpoint, "azblob storage requires endpoint")?;
            let container = require(&config.container, "azblob storage requires container")?;
            tracing::info!("初始化 azblob 存储: container={}", container);
            Ok(Arc::new(AzblobStore::new(
                endpoint,
                container,
                config.account_name.clone(),
                config.account_key.clone(),
                config.sas_token.clone(),
                config.prefix.clone(),
            )?) as Arc<dyn ObjectStore>)
        }
        RemoteKind::S3 => {
            let bucket = require(&config.bucket, "s3 storage requires bucket")?;
            let region = require(&config.region, "s3 storage requires region")?;
            let access_key = require(&config.access_key, "s3 storage requires accessKey")?;
            let secret_key = require(&config.secret_key, "s3 storage requires secretKey")?;
            tracing::info!("初始化 s3 存储: bucket={}, region={}", bucket, region);
            Ok(Arc::new(S3Store::new(
                bucket,
                region,
                access_key,
                secret_key,
                config.endpoint.clone(),
                config.prefix.clone(),
            )?) as Arc<dyn ObjectStore>)
        }
    }
}
