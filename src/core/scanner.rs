//! 本地目录扫描
//!
//! 把一个目录整理成 相对路径 -> FileProperties 的清单，供目录差异使用。
//! 每个文件都会计算整文件哈希。

use crate::core::props::{probe_local, FileProperties};
use crate::error::Result;
use crate::storage::local;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// 扫描配置
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// 排除规则（glob patterns）
    pub exclude_patterns: Vec<String>,
    /// 最大文件大小（0 表示不限制）
    pub max_file_size: u64,
    /// 仅包含的扩展名（空表示不限制）
    pub include_extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: vec![
                ".git/**".to_string(),
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                "*.tmp".to_string(),
                "~*".to_string(),
            ],
            max_file_size: 0,
            include_extensions: vec![],
        }
    }
}

/// 目录扫描器
pub struct FolderScanner {
    config: ScanConfig,
}

impl FolderScanner {
    pub fn new() -> Self {
        Self {
            config: ScanConfig::default(),
        }
    }

    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// 检查路径是否应该被排除
    fn should_exclude(&self, path: &str, size: u64) -> bool {
        for pattern in &self.config.exclude_patterns {
            if matches_pattern(path, pattern) {
                return true;
            }
        }

        if self.config.max_file_size > 0 && size > self.config.max_file_size {
            return true;
        }

        if !self.config.include_extensions.is_empty() {
            let ext = Path::new(path)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .unwrap_or_default();

            if !self
                .config
                .include_extensions
                .iter()
                .any(|e| e.to_lowercase() == ext)
            {
                return true;
            }
        }

        false
    }

    /// 扫描目录并为每个保留的文件计算属性
    pub async fn scan(&self, dir: impl AsRef<Path>) -> Result<HashMap<String, FileProperties>> {
        let dir = dir.as_ref();
        info!("扫描本地目录: {}", dir.display());

        let entries = local::list_folder(dir).await?;

        let mut tree = HashMap::new();
        let mut excluded_count = 0;

        for entry in entries {
            if self.should_exclude(&entry.relative_path, entry.size) {
                debug!("排除文件: {}", entry.relative_path);
                excluded_count += 1;
                continue;
            }

            let props = probe_local(dir.join(&entry.relative_path)).await?;
            tree.insert(entry.relative_path, props);
        }

        info!("扫描完成: {} 个文件, {} 个被排除", tree.len(), excluded_count);
        Ok(tree)
    }
}

impl Default for FolderScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// 简单的 glob 模式匹配，支持 ** 和 *
fn matches_pattern(path: &str, pattern: &str) -> bool {
    let path = path.to_lowercase();
    let pattern = pattern.to_lowercase();

    if pattern.contains("**") {
        let parts: Vec<&str> = pattern.split("**").collect();
        if parts.len() == 2 {
            let prefix = parts[0].trim_end_matches('/');
            let suffix = parts[1].trim_start_matches('/');

            if !prefix.is_empty() && !path.starts_with(prefix) {
                return false;
            }
            if !suffix.is_empty() && !path.ends_with(suffix) {
                return false;
            }
            return true;
        }
    }

    if pattern.contains('*') {
        let regex_pattern = pattern.replace('.', "\\.").replace('*', ".*");
        if let Ok(re) = regex::Regex::new(&format!("^{}$", regex_pattern)) {
            return re.is_match(&path);
        }
    }

    // 精确匹配，或匹配任意目录下的同名文件
    path == pattern || path.ends_with(&format!("/{}", pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_pattern() {
        assert!(matches_pattern(".git/config", ".git/**"));
        assert!(matches_pattern("work/cache.tmp", "*.tmp"));
        assert!(matches_pattern("nested/.DS_Store", ".ds_store"));
        assert!(!matches_pattern("data/report.csv", "*.tmp"));
    }

    #[tokio::test]
    async fn test_scan_excludes_and_hashes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.csv"), b"hello world").unwrap();
        std::fs::write(dir.path().join("junk.tmp"), b"x").unwrap();

        let tree = FolderScanner::new().scan(dir.path()).await.unwrap();
        assert_eq!(tree.len(), 1);
        let props = &tree["keep.csv"];
        assert_eq!(props.size, 11);
        assert_eq!(
            props.hash.unwrap().to_hex(),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
    }

    #[tokio::test]
    async fn test_scan_extension_filter() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.csv"), b"a").unwrap();
        std::fs::write(dir.path().join("b.json"), b"b").unwrap();

        let scanner = FolderScanner::with_config(ScanConfig {
            include_extensions: vec!["csv".to_string()],
            ..Default::default()
        });
        let tree = scanner.scan(dir.path()).await.unwrap();
        assert_eq!(tree.len(), 1);
        assert!(tree.contains_key("a.csv"));
    }
}
