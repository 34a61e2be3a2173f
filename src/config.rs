//! 应用配置模块

use crate::error::{KeepError, Result};
use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 远端存储类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    Azblob,
    S3,
}

/// 远端存储配置
///
/// 容器引用在这里已经是解析好的 endpoint + container，库内不做 URL 解析，
/// 也不允许把访问令牌塞进地址里。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    #[serde(rename = "type")]
    pub kind: RemoteKind,
    /// 服务端点（azblob 必填，s3 兼容服务可选）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// azblob 容器名
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sas_token: Option<String>,
    /// s3 桶名
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    /// 所有操作共用的对象名前缀
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            kind: RemoteKind::Azblob,
            endpoint: None,
            container: None,
            account_name: None,
            account_key: None,
            sas_token: None,
            bucket: None,
            region: None,
            access_key: None,
            secret_key: None,
            prefix: None,
        }
    }
}

/// 传输配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferConfig {
    /// 目录推送的最大并发传输数
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// 顶层配置，对应 config.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl KeepConfig {
    /// 从配置目录加载，文件不存在时返回默认配置
    pub fn load(config_dir: &Path) -> Result<Self> {
        let config_file = config_dir.join("config.json");
        if !config_file.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_file)?;
        serde_json::from_str(&content)
            .map_err(|e| KeepError::Config(format!("invalid config.json: {e}")))
    }

    /// 保存到配置目录
    pub fn save(&self, config_dir: &Path) -> Result<()> {
        fs::create_dir_all(config_dir)?;
        let config_file = config_dir.join("config.json");
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&config_file, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = KeepConfig::load(dir.path()).unwrap();
        assert_eq!(config.transfer.max_concurrent, 4);
        assert_eq!(config.remote.kind, RemoteKind::Azblob);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = KeepConfig::default();
        config.remote.kind = RemoteKind::S3;
        config.remote.bucket = Some("artifacts".to_string());
        config.transfer.max_concurrent = 8;

        config.save(dir.path()).unwrap();
        let loaded = KeepConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.remote.kind, RemoteKind::S3);
        assert_eq!(loaded.remote.bucket.as_deref(), Some("artifacts"));
        assert_eq!(loaded.transfer.max_concurrent, 8);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"remote": {"type": "azblob", "container": "data"}}"#,
        )
        .unwrap();

        let config = KeepConfig::load(dir.path()).unwrap();
        assert_eq!(config.remote.container.as_deref(), Some("data"));
        assert_eq!(config.transfer.max_concurrent, 4);
        assert!(config.log.enabled);
    }
}
