//! 日志模块 - 文件日志加大小轮转

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// 是否启用日志记录
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 最大日志文件大小（MB），超出后轮转为 app.log.old
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u32,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_enabled() -> bool {
    true
}

fn default_max_size_mb() -> u32 {
    5
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_size_mb: default_max_size_mb(),
            level: default_level(),
        }
    }
}

impl LogConfig {
    /// 配置的日志级别转成 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

struct WriterState {
    writer: BufWriter<File>,
    written: u64,
}

/// 带大小上限的日志写入器
///
/// 超过上限时当前文件改名为 app.log.old（覆盖旧备份）并重新开始。
#[derive(Clone)]
pub struct RotatingFileWriter {
    file_path: PathBuf,
    max_size: u64,
    state: Arc<Mutex<WriterState>>,
}

impl RotatingFileWriter {
    pub fn new(log_dir: &Path, max_size_mb: u32) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;

        let file_path = log_dir.join("app.log");
        let max_size = (max_size_mb as u64) * 1024 * 1024;

        // 启动时已超限的旧日志先轮转掉
        if let Ok(metadata) = fs::metadata(&file_path) {
            if metadata.len() > max_size {
                Self::rotate(&file_path)?;
            }
        }

        let state = WriterState {
            written: fs::metadata(&file_path).map(|m| m.len()).unwrap_or(0),
            writer: Self::open(&file_path)?,
        };

        Ok(Self {
            file_path,
            max_size,
            state: Arc::new(Mutex::new(state)),
        })
    }

    fn open(file_path: &Path) -> io::Result<BufWriter<File>> {
        let file = OpenOptions::new().create(true).append(true).open(file_path)?;
        Ok(BufWriter::new(file))
    }

    fn rotate(file_path: &Path) -> io::Result<()> {
        let backup_path = file_path.with_extension("log.old");
        if backup_path.exists() {
            fs::remove_file(&backup_path)?;
        }
        fs::rename(file_path, &backup_path)
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();

        let n = state.writer.write(buf)?;
        state.writer.flush()?;
        state.written += n as u64;

        if state.written > self.max_size {
            Self::rotate(&self.file_path)?;
            state.writer = Self::open(&self.file_path)?;
            state.written = 0;
        }

        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.lock().unwrap().writer.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingFileWriter {
    type Writer = RotatingFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// 初始化日志系统
///
/// 文件日志始终开启（配置允许时），debug 构建额外输出到控制台。
pub fn init(log_dir: &Path, config: &LogConfig) {
    if !config.enabled {
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
        return;
    }

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(config.tracing_level().into())
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("reqwest=warn".parse().unwrap())
        .add_directive("opendal=warn".parse().unwrap());

    match RotatingFileWriter::new(log_dir, config.max_size_mb) {
        Ok(file_writer) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false);

            #[cfg(debug_assertions)]
            {
                let console_layer = tracing_subscriber::fmt::layer().with_target(false);
                let subscriber = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(file_layer)
                    .with(console_layer);
                let _ = tracing::subscriber::set_global_default(subscriber);
            }

            #[cfg(not(debug_assertions))]
            {
                let subscriber = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(file_layer);
                let _ = tracing::subscriber::set_global_default(subscriber);
            }
        }
        Err(_) => {
            // 文件日志创建失败，回退到控制台
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .try_init();
        }
    }
}
