use std::path::Path;

use serde::Deserialize;

use crate::error::{AppResult, ConfigError};

/// 程序配置
///
/// 启动时构造一次，显式传给上下文编解码器、错误日志、处理器登记表和 HTTP 客户端。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 表单上下文混淆用的共享密钥
    pub context_secret: String,
    /// 开发者错误日志文件（JSON lines），为空时只写 tracing
    pub error_log_file: Option<String>,
    /// 提交处理器登记表文件
    pub handler_registry_file: String,
    /// 用户默认配置文件
    pub defaults_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 当前操作者（写入错误日志的 user 列）
    pub acting_user: String,
    // --- Google API 配置 ---
    pub google_access_token: String,
    pub spreadsheet_id: String,
    /// 表单提交通知推送的 Pub/Sub topic
    pub watch_topic: String,
    pub sheets_api_base_url: String,
    pub forms_api_base_url: String,
    pub classroom_api_base_url: String,
    pub drive_api_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            context_secret: "YourSecretKeyForXOR".to_string(),
            error_log_file: None,
            handler_registry_file: "handlers.json".to_string(),
            defaults_file: "user_defaults.json".to_string(),
            verbose_logging: false,
            acting_user: "unknown".to_string(),
            google_access_token: String::new(),
            spreadsheet_id: String::new(),
            watch_topic: String::new(),
            sheets_api_base_url: "https://sheets.googleapis.com".to_string(),
            forms_api_base_url: "https://forms.googleapis.com".to_string(),
            classroom_api_base_url: "https://classroom.googleapis.com".to_string(),
            drive_api_base_url: "https://www.googleapis.com".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        Self::default().overlay_env()
    }

    /// 从 TOML 文件加载配置，缺失的键使用默认值，之后再叠加环境变量
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
                path: path.display().to_string(),
                source,
            })?;
        config.overlay_env()
    }

    fn overlay_env(self) -> AppResult<Self> {
        let verbose_logging = match std::env::var("VERBOSE_LOGGING") {
            Ok(v) => v.parse().map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: "VERBOSE_LOGGING".to_string(),
                value: v.clone(),
                expected_type: "bool".to_string(),
            })?,
            Err(_) => self.verbose_logging,
        };

        Ok(Self {
            context_secret: std::env::var("CONTEXT_SECRET").unwrap_or(self.context_secret),
            error_log_file: std::env::var("ERROR_LOG_FILE").ok().or(self.error_log_file),
            handler_registry_file: std::env::var("HANDLER_REGISTRY_FILE")
                .unwrap_or(self.handler_registry_file),
            defaults_file: std::env::var("DEFAULTS_FILE").unwrap_or(self.defaults_file),
            verbose_logging,
            acting_user: std::env::var("ACTING_USER").unwrap_or(self.acting_user),
            google_access_token: std::env::var("GOOGLE_ACCESS_TOKEN")
                .unwrap_or(self.google_access_token),
            spreadsheet_id: std::env::var("SPREADSHEET_ID").unwrap_or(self.spreadsheet_id),
            watch_topic: std::env::var("WATCH_TOPIC").unwrap_or(self.watch_topic),
            sheets_api_base_url: std::env::var("SHEETS_API_BASE_URL")
                .unwrap_or(self.sheets_api_base_url),
            forms_api_base_url: std::env::var("FORMS_API_BASE_URL")
                .unwrap_or(self.forms_api_base_url),
            classroom_api_base_url: std::env::var("CLASSROOM_API_BASE_URL")
                .unwrap_or(self.classroom_api_base_url),
            drive_api_base_url: std::env::var("DRIVE_API_BASE_URL")
                .unwrap_or(self.drive_api_base_url),
        })
    }
}
