//! 文件格式注册表
//!
//! 扩展名到媒体类型的有界映射，用于给上传打 content type。
//! 严格查询对未注册的扩展名报 UnsupportedFormat；上传路径用宽松查询，
//! 未知扩展名落到 application/octet-stream。

use crate::error::{KeepError, Result};
use std::collections::HashMap;
use std::path::Path;

/// 未注册扩展名的兜底媒体类型
pub const OCTET_STREAM: &str = "application/octet-stream";

/// 扩展名 -> 媒体类型注册表
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    map: HashMap<String, String>,
}

impl FormatRegistry {
    /// 空注册表
    pub fn empty() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// 注册一个扩展名（不带点，大小写不敏感）
    pub fn register(&mut self, extension: &str, media_type: &str) {
        self.map
            .insert(extension.to_lowercase(), media_type.to_string());
    }

    /// 严格查询：未注册的扩展名（或没有扩展名）返回 UnsupportedFormat
    pub fn lookup(&self, path: impl AsRef<Path>) -> Result<&str> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| KeepError::UnsupportedFormat(path.display().to_string()))?;

        self.map
            .get(&ext)
            .map(|s| s.as_str())
            .ok_or_else(|| KeepError::UnsupportedFormat(path.display().to_string()))
    }

    /// 宽松查询：未注册时返回 octet-stream
    pub fn lookup_or_default(&self, path: impl AsRef<Path>) -> &str {
        self.lookup(path).unwrap_or(OCTET_STREAM)
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for (ext, media_type) in [
            ("csv", "text/csv"),
            ("tsv", "text/tab-separated-values"),
            ("txt", "text/plain"),
            ("json", "application/json"),
            ("xml", "application/xml"),
            ("pdf", "application/pdf"),
            ("zip", "application/zip"),
            ("gz", "application/gzip"),
            ("parquet", "application/vnd.apache.parquet"),
            (
                "xlsx",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ),
            ("xls", "application/vnd.ms-excel"),
            ("png", "image/png"),
            ("jpg", "image/jpeg"),
            ("jpeg", "image/jpeg"),
            ("geojson", "application/geo+json"),
        ] {
            registry.register(ext, media_type);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known() {
        let registry = FormatRegistry::default();
        assert_eq!(registry.lookup("data/report.CSV").unwrap(), "text/csv");
        assert_eq!(registry.lookup("a.json").unwrap(), "application/json");
    }

    #[test]
    fn test_lookup_unregistered_errors() {
        let registry = FormatRegistry::default();
        let err = registry.lookup("model.onnx").unwrap_err();
        assert!(matches!(err, KeepError::UnsupportedFormat(_)));

        // 没有扩展名也算未注册
        assert!(registry.lookup("Makefile").is_err());
    }

    #[test]
    fn test_lookup_or_default_falls_back() {
        let registry = FormatRegistry::default();
        assert_eq!(registry.lookup_or_default("model.onnx"), OCTET_STREAM);
    }

    #[test]
    fn test_register_custom() {
        let mut registry = FormatRegistry::default();
        registry.register("onnx", "application/octet-stream");
        assert!(registry.lookup("model.onnx").is_ok());
    }
}
