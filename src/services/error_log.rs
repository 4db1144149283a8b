//! 错误日志服务 - 业务能力层
//!
//! 只负责"记一条错误"，记录失败也不向上抛

use std::error::Error;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::error::AppError;

/// detail / stack 的最大长度
pub const MAX_FIELD_LEN: usize = 25_000;

/// 一条错误记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    /// 相关的表格或表单 id
    pub target_id: String,
    pub category: String,
    pub message: String,
    pub detail: String,
    pub stack: String,
}

impl ErrorEntry {
    pub fn new(
        user: impl Into<String>,
        target_id: impl Into<String>,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            user: user.into(),
            target_id: target_id.into(),
            category: category.into(),
            message: message.into(),
            detail: String::new(),
            stack: String::new(),
        }
    }

    /// 由错误构造，错误链写入 stack
    pub fn from_error(
        user: impl Into<String>,
        target_id: impl Into<String>,
        context: &str,
        err: &AppError,
    ) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        Self::new(
            user,
            target_id,
            format!("{context} {}", err.category()),
            err.to_string(),
        )
        .with_stack(chain.join("\ncaused by: "))
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = clip(detail.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = clip(stack.into());
        self
    }
}

fn clip(text: String) -> String {
    if text.chars().count() > MAX_FIELD_LEN {
        text.chars().take(MAX_FIELD_LEN).collect()
    } else {
        text
    }
}

/// 错误日志接口
///
/// 只追加，不返回错误。
pub trait ErrorLog {
    fn record(&self, entry: ErrorEntry);
}

/// 追加 JSON 行到文件；没有配置文件时写到 tracing
pub struct FileErrorLog {
    path: Option<PathBuf>,
}

impl FileErrorLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.error_log_file.as_ref().map(PathBuf::from))
    }

    fn append(&self, path: &PathBuf, entry: &ErrorEntry) -> std::io::Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())
    }
}

impl ErrorLog for FileErrorLog {
    fn record(&self, entry: ErrorEntry) {
        let Some(path) = &self.path else {
            error!(
                "错误日志文件未配置: user={} target={} category={} message={}",
                entry.user, entry.target_id, entry.category, entry.message
            );
            return;
        };

        debug!("写入错误日志: {} | {}", entry.category, entry.message);
        if let Err(e) = self.append(path, &entry) {
            warn!(
                "无法写入错误日志 {}: {}。原始错误: {} - {}",
                path.display(),
                e,
                entry.category,
                entry.message
            );
        }
    }
}

/// 内存中的错误日志，测试和离线运行时查看记录
#[derive(Default)]
pub struct MemoryErrorLog {
    entries: Mutex<Vec<ErrorEntry>>,
}

impl MemoryErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ErrorEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 分类中包含 `needle` 的记录
    pub fn with_category(&self, needle: &str) -> Vec<ErrorEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.category.contains(needle))
            .collect()
    }
}

impl ErrorLog for MemoryErrorLog {
    fn record(&self, entry: ErrorEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

impl<T: ErrorLog + ?Sized> ErrorLog for &T {
    fn record(&self, entry: ErrorEntry) {
        (**self).record(entry)
    }
}
