//! 提交处理器登记服务 - 业务能力层
//!
//! 把每个挂载到表单上的提交处理器和它的创建信息记在一个 JSON 文件里，
//! 供列出和批量删除使用

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::FormService;
use crate::models::StatusResult;

fn not_available() -> String {
    "N/A".to_string()
}

/// 处理器的创建信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerRecord {
    #[serde(default = "not_available")]
    pub form_id: String,
    #[serde(default = "not_available")]
    pub form_title: String,
    #[serde(default = "not_available")]
    pub sheet: String,
    #[serde(default = "not_available")]
    pub group: String,
    #[serde(default = "not_available")]
    pub course: String,
    /// `2025/03/14 09:05 AM (UTC+0800)`
    #[serde(default = "not_available")]
    pub created: String,
}

/// 列表中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredHandler {
    pub id: String,
    #[serde(flatten)]
    pub record: HandlerRecord,
}

/// JSON 文件登记表
pub struct HandlerRegistry {
    path: PathBuf,
}

impl HandlerRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.handler_registry_file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> AppResult<BTreeMap<String, HandlerRecord>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, records: &BTreeMap<String, HandlerRecord>) -> AppResult<()> {
        let content = serde_json::to_string_pretty(records)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }

    pub async fn register(&self, handler_id: &str, record: HandlerRecord) -> AppResult<()> {
        let mut records = self.load().await?;
        debug!("登记处理器 {} → 表单 {}", handler_id, record.form_id);
        records.insert(handler_id.to_string(), record);
        self.save(&records).await
    }

    pub async fn list(&self) -> AppResult<Vec<RegisteredHandler>> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .map(|(id, record)| RegisteredHandler { id, record })
            .collect())
    }

    pub async fn get(&self, handler_id: &str) -> AppResult<Option<HandlerRecord>> {
        Ok(self.load().await?.remove(handler_id))
    }

    /// 某个表单上登记的全部处理器 id
    pub async fn for_form(&self, form_id: &str) -> AppResult<Vec<String>> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .filter(|(_, r)| r.form_id == form_id)
            .map(|(id, _)| id)
            .collect())
    }

    /// 删除登记，返回是否存在
    pub async fn remove(&self, handler_id: &str) -> AppResult<bool> {
        let mut records = self.load().await?;
        let existed = records.remove(handler_id).is_some();
        if existed {
            self.save(&records).await?;
        }
        Ok(existed)
    }
}

/// 删除选中的处理器
pub async fn delete_selected<F: FormService>(
    forms: &F,
    registry: &HandlerRegistry,
    handler_ids: &[String],
) -> AppResult<StatusResult> {
    if handler_ids.is_empty() {
        return Ok(StatusResult::info("No handlers selected for deletion."));
    }

    let mut deleted = 0;
    let mut failed = 0;
    for id in handler_ids {
        let Some(record) = registry.get(id).await? else {
            info!("处理器 {} 未登记（可能已删除）", id);
            continue;
        };
        match forms.remove_submit_handler(&record.form_id, id).await {
            Ok(()) => {
                registry.remove(id).await?;
                deleted += 1;
            }
            Err(e) => {
                warn!("删除处理器 {} 失败: {}", id, e);
                failed += 1;
            }
        }
    }

    let mut message = String::new();
    if deleted > 0 {
        message.push_str(&format!("{deleted} handler(s) deleted successfully. "));
    }
    if failed > 0 {
        message.push_str(&format!("{failed} handler(s) failed to delete (see logs)."));
    }
    if deleted == 0 && failed == 0 {
        message = "Selected handlers were not found or already deleted.".to_string();
    }
    let message = message.trim_end().to_string();

    Ok(if deleted > 0 {
        StatusResult::success(message)
    } else {
        StatusResult::error(message)
    })
}

/// 删除全部登记的处理器
pub async fn delete_all<F: FormService>(
    forms: &F,
    registry: &HandlerRegistry,
) -> AppResult<StatusResult> {
    let mut deleted = 0;
    let mut errors = Vec::new();
    for handler in registry.list().await? {
        match forms
            .remove_submit_handler(&handler.record.form_id, &handler.id)
            .await
        {
            Ok(()) => {
                registry.remove(&handler.id).await?;
                deleted += 1;
            }
            Err(e) => {
                warn!("删除处理器 {} 失败: {}", handler.id, e);
                errors.push(e.to_string());
            }
        }
    }

    if !errors.is_empty() {
        return Ok(StatusResult::error(format!(
            "Deleted {deleted} handlers, but encountered errors: {}",
            errors.join("; ")
        )));
    }
    Ok(StatusResult::success(format!(
        "Successfully deleted {deleted} submit handlers."
    )))
}
