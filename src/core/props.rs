//! 文件属性探测
//!
//! 本地文件通过整文件 MD5 计算属性，远端对象从存储元数据转换。
//! 两侧的哈希编码不同（本地为原始字节，azblob 为 base64 的 Content-MD5，
//! s3 为 hex 的 etag），比较前必须先归一化为同一种形式。

use crate::error::{KeepError, Result};
use crate::storage::ObjectMeta;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// 读取本地文件时的分块大小
const HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// 整文件内容摘要（MD5，16 字节）
///
/// 统一的可比较形式。hex（32 字符）和 base64（24 字符）两种编码都能解析，
/// 相等性只在原始字节上判断。
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// 从 hex 编码解析（s3 etag 风格）
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|_| KeepError::InvalidHash(s.to_string()))?;
        Self::from_vec(bytes, s)
    }

    /// 从标准 base64 编码解析（azblob Content-MD5 风格）
    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(s)
            .map_err(|_| KeepError::InvalidHash(s.to_string()))?;
        Self::from_vec(bytes, s)
    }

    /// 自动识别编码并解析
    ///
    /// 先剥掉 etag 常见的引号。32 个 hex 字符按 hex 解析，其余尝试 base64。
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim().trim_matches('"');
        if s.len() == 32 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Self::from_hex(s)
        } else {
            Self::from_base64(s)
        }
    }

    fn from_vec(bytes: Vec<u8>, original: &str) -> Result<Self> {
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| KeepError::InvalidHash(original.to_string()))?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ContentHash::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// 一侧（本地或远端）的文件属性
///
/// 每次调和调用现算，从不持久化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileProperties {
    /// 内容哈希；部分远端后端不提供时为 None（按"未知"处理，不当作不匹配）
    pub hash: Option<ContentHash>,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

impl FileProperties {
    /// 从远端对象元数据转换
    ///
    /// 哈希字符串解析失败视同后端未提供；缺失的修改时间映射为 Unix 纪元，
    /// 这样它永远不会"严格更新"。
    pub fn from_object_meta(meta: &ObjectMeta) -> Self {
        Self {
            hash: meta.hash.as_deref().and_then(|s| ContentHash::parse(s).ok()),
            size: meta.size,
            modified: meta.modified.unwrap_or(DateTime::UNIX_EPOCH),
        }
    }
}

/// 探测远端对象属性
///
/// 对象不存在时返回 None。后端不报告哈希时 `hash` 为 None，不算错误。
pub async fn probe_remote(
    store: &dyn crate::storage::ObjectStore,
    name: &str,
) -> Result<Option<FileProperties>> {
    Ok(store
        .stat(name)
        .await?
        .map(|meta| FileProperties::from_object_meta(&meta)))
}

/// 探测本地文件属性
///
/// 文件不存在时返回 `LocalNotFound`。哈希按 1MiB 分块计算，避免整文件进内存。
pub async fn probe_local(path: impl AsRef<Path>) -> Result<FileProperties> {
    let path = path.as_ref();

    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(KeepError::LocalNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let modified = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or(DateTime::UNIX_EPOCH);

    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest: [u8; 16] = hasher.finalize().into();

    Ok(FileProperties {
        hash: Some(ContentHash::from_bytes(digest)),
        size: metadata.len(),
        modified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // "hello world" 的 MD5
    const HELLO_HEX: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";
    const HELLO_B64: &str = "XrY7u+Ae7tCTyyK7j1rNww==";

    #[test]
    fn test_parse_hex_and_base64_normalize() {
        let from_hex = ContentHash::parse(HELLO_HEX).unwrap();
        let from_b64 = ContentHash::parse(HELLO_B64).unwrap();
        assert_eq!(from_hex, from_b64);
        assert_eq!(from_hex.to_hex(), HELLO_HEX);
        assert_eq!(from_hex.to_base64(), HELLO_B64);
    }

    #[test]
    fn test_parse_quoted_etag() {
        let quoted = format!("\"{}\"", HELLO_HEX);
        let hash = ContentHash::parse(&quoted).unwrap();
        assert_eq!(hash.to_hex(), HELLO_HEX);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ContentHash::parse("not a hash!!").is_err());
        // 合法 base64 但长度不是 16 字节
        assert!(ContentHash::parse("aGVsbG8=").is_err());
    }

    #[test]
    fn test_meta_with_unparseable_hash_is_unknown() {
        let meta = ObjectMeta {
            size: 10,
            modified: None,
            hash: Some("???".to_string()),
        };
        let props = FileProperties::from_object_meta(&meta);
        assert!(props.hash.is_none());
        assert_eq!(props.modified, DateTime::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn test_probe_local() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello world").unwrap();

        let props = probe_local(&path).await.unwrap();
        assert_eq!(props.size, 11);
        assert_eq!(props.hash.unwrap().to_hex(), HELLO_HEX);
    }

    #[tokio::test]
    async fn test_probe_local_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = probe_local(dir.path().join("nope.txt")).await.unwrap_err();
        assert!(matches!(err, KeepError::LocalNotFound(_)));
    }
}
