use crate::error::{AppResult, ConfigError};
use crate::models::settings::GenerationSettings;
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载生成配置
pub async fn load_settings(toml_file_path: &Path) -> AppResult<GenerationSettings> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .map_err(|source| ConfigError::ReadFailed {
            path: toml_file_path.display().to_string(),
            source,
        })?;

    let settings: GenerationSettings =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: toml_file_path.display().to_string(),
            source,
        })?;

    tracing::info!(
        "已加载配置: {} (表格: {}, 课程: {})",
        toml_file_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy(),
        settings.sheet_name,
        settings.course_name
    );

    Ok(settings)
}
