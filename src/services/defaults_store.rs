//! 默认配置存储
//!
//! 保存用户上一次提交的生成配置，下次直接作为默认值

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::models::GenerationSettings;

pub struct DefaultsStore {
    path: PathBuf,
}

impl DefaultsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.defaults_file)
    }

    pub async fn save(&self, settings: &GenerationSettings) -> AppResult<()> {
        let content = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.path, content).await?;
        info!("✓ 默认配置已保存: {}", self.path.display());
        Ok(())
    }

    /// 读取默认配置，文件不存在或损坏时返回 `None`
    pub async fn load(&self) -> Option<GenerationSettings> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("读取默认配置失败 {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!("默认配置已损坏 {}: {}", self.path.display(), e);
                None
            }
        }
    }
}
