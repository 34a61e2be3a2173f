use super::{ObjectInfo, ObjectMeta, ObjectStore, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use crate::error::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::{layers::TimeoutLayer, Metakey, Operator};
use std::time::Duration;

/// Azure Blob 容器存储
///
/// 容器引用在外部解析成 endpoint + container 后传入，这里不做任何 URL 解析。
/// 认证方式（account key 或 SAS token）由调用方在配置里决定。
pub struct AzblobStore {
    operator: Operator,
    name: String,
}

impl AzblobStore {
    pub fn new(
        endpoint: &str,
        container: &str,
        account_name: Option<String>,
        account_key: Option<String>,
        sas_token: Option<String>,
        prefix: Option<String>,
    ) -> Result<Self> {
        use opendal::services::Azblob;

        let mut builder = Azblob::default().endpoint(endpoint).container(container);

        if let Some(ref n) = account_name {
            builder = builder.account_name(n);
        }
        if let Some(ref k) = account_key {
            builder = builder.account_key(k);
        }
        if let Some(ref t) = sas_token {
            builder = builder.sas_token(t);
        }
        if let Some(ref p) = prefix {
            builder = builder.root(p);
        }

        // 添加超时层
        let operator = Operator::new(builder)?
            .layer(
                TimeoutLayer::default()
                    .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                    .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
            )
            .finish();

        let name = format!(
            "azblob://{}{}",
            container,
            prefix
                .as_deref()
                .map(|p| format!("/{}", p.trim_matches('/')))
                .unwrap_or_default()
        );

        Ok(Self { operator, name })
    }

    /// Content-MD5 优先，etag 兜底（etag 带引号，统一去掉）
    fn pick_hash(meta: &opendal::Metadata) -> Option<String> {
        meta.content_md5()
            .map(|s| s.to_string())
            .or_else(|| meta.etag().map(|s| s.trim_matches('"').to_string()))
    }
}

#[async_trait]
impl ObjectStore for AzblobStore {
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

            // 跳过目录占位条目
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
