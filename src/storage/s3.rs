use super::{ObjectInfo, ObjectMeta, ObjectStore, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use crate::error::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::{layers::TimeoutLayer, Metakey, Operator};
use std::time::Duration;

/// S3 兼容对象存储
///
/// 简单上传的 etag 就是 hex 编码的 MD5，分段上传的 etag 不是（解析失败会被
/// 归一化层按"哈希未知"处理，走修改时间回退）。
pub struct S3Store {
    operator: Operator,
    name: String,
}

impl S3Store {
    pub fn new(
        bucket: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        endpoint: Option<String>,
        prefix: Option<String>,
    ) -> Result<Self> {
        use opendal::services::S3;

        let mut builder = S3::default()
            .bucket(bucket)
            .region(region)
            .access_key_id(access_key)
            .secret_access_key(secret_key);

        if let Some(ref ep) = endpoint {
            builder = builder.endpoint(ep);
        }
        if let Some(ref p) = prefix {
            builder = builder.root(p);
        }

        let operator = Operator::new(builder)?
            .layer(
                TimeoutLayer::default()
                    .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                    .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
            )
            .finish();

        let name = format!(
            "s3://{}{}",
            bucket,
            prefix
                .as_deref()
                .map(|p| format!("/{}", p.trim_matches('/')))
                .unwrap_or_default()
        );

        Ok(Self { operator, name })
    }

    fn pick_hash(meta: &opendal::Metadata) -> Option<String> {
        meta.content_md5()
            .map(|s| s.to_string())
            .or_else(|| meta.etag().map(|s| s.trim_matches('"').to_string()))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn stat(&self, name: &str) -> Result<Option<ObjectMeta>> {
        match self.operator.stat(name).await {
            Ok(meta) => Ok(Some(ObjectMeta {
                size: meta.content_length(),
                modified: meta.last_modified(),
                hash: Self::pick_hash(&meta),
            })),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let mut objects = Vec::new();

        let mut lister = self
            .operator
            .lister_with(prefix)
            .recursive(true)
            .metakey(
                Metakey::ContentLength | Metakey::LastModified | Metakey::ContentMd5 | Metakey::Etag,
            )
            .await?;

        while let Some(entry) = lister.try_next().await? {
            let path = entry.path().to_string();

            if path.is_empty() || path.ends_with('/') {
                continue;
            }

            let meta = entry.metadata();
            objects.push(ObjectInfo {
                name: path.trim_start_matches('/').to_string(),
                size: meta.content_length(),
                modified: meta.last_modified(),
                hash: Self::pick_hash(meta),
            });
        }

        Ok(objects)
    }

    async fn upload(&self, name: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        self.operator
            .write_with(name, data)
            .content_type(content_type)
            .await?;
        Ok(())
    }

    async fn download(&self, name: &str) -> Result<Vec<u8>> {
        let data = self.operator.read(name).await?;
        Ok(data.to_vec())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
