//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 宿主（CLI 或事件推送）调用的全部入口都在这里：
//!
//! 1. **预检**：`preview`
//! 2. **生成**：`generate`
//! 3. **提交路由**：`route_submission` / `route_response` / `route_notification`
//! 4. **处理器管理**：`list_handlers` / `handlers_for_form` / `delete_handlers` / `delete_all_handlers`
//! 5. **默认配置**：`save_defaults` / `load_defaults`
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一持有配置、协作者、编解码器和各个存储
//! - **兜底**：入口不向宿主抛错，失败写进错误日志后转成结果消息或直接返回

use chrono::Utc;
use tracing::{error, info};

use crate::clients::GoogleClient;
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{Backend, Classroom, FileStorage, FormService, Spreadsheet};
use crate::models::{
    FormNotification, GenerationSettings, PreviewReport, StatusResult, SubmissionEvent,
};
use crate::services::error_log::{ErrorEntry, ErrorLog, FileErrorLog};
use crate::services::handler_registry::{self, HandlerRegistry, RegisteredHandler};
use crate::services::{ContextCodec, DefaultsStore};
use crate::utils::logging::log_startup;
use crate::workflow::{Generation, Preview, RouteOutcome, SubmissionRouter};

/// 接 Google API 的应用
pub type GoogleApp = App<GoogleClient, GoogleClient, GoogleClient, GoogleClient, FileErrorLog>;

/// 应用主结构
pub struct App<S, F, C, D, L> {
    config: Config,
    backend: Backend<S, F, C, D>,
    codec: ContextCodec,
    error_log: L,
    registry: HandlerRegistry,
    defaults: DefaultsStore,
}

impl GoogleApp {
    /// 用配置里的 token 连接 Google API
    pub fn initialize(config: Config) -> AppResult<Self> {
        let client = GoogleClient::new(&config)?;
        let error_log = FileErrorLog::from_config(&config);
        let backend = Backend::new(client.clone(), client.clone(), client.clone(), client);
        Ok(App::new(config, backend, error_log))
    }
}

impl<S, F, C, D, L> App<S, F, C, D, L>
where
    S: Spreadsheet,
    F: FormService,
    C: Classroom,
    D: FileStorage,
    L: ErrorLog,
{
    pub fn new(config: Config, backend: Backend<S, F, C, D>, error_log: L) -> Self {
        Self {
            codec: ContextCodec::from_config(&config),
            registry: HandlerRegistry::from_config(&config),
            defaults: DefaultsStore::from_config(&config),
            config,
            backend,
            error_log,
        }
    }

    pub fn backend(&self) -> &Backend<S, F, C, D> {
        &self.backend
    }

    pub fn error_log(&self) -> &L {
        &self.error_log
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    fn user(&self) -> &str {
        &self.config.acting_user
    }

    /// 预检配置，不修改任何东西
    pub async fn preview(&self, settings: &GenerationSettings) -> PreviewReport {
        log_startup("预检", self.backend.sheets.id());
        let preview = Preview::new(
            &self.backend.sheets,
            &self.backend.classroom,
            &self.backend.storage,
        );
        match preview.run(settings, Utc::now()).await {
            Ok(report) => report,
            Err(e) => {
                error!("❌ 预检失败: {}", e);
                self.error_log.record(ErrorEntry::from_error(
                    self.user(),
                    self.backend.sheets.id(),
                    "Preview Crash",
                    &e,
                ));
                PreviewReport {
                    error: Some(format!("Server error in preview: {e}.")),
                    classroom_roster: vec![
                        "Error occurred before roster could be fetched.".to_string(),
                    ],
                    ..Default::default()
                }
            }
        }
    }

    /// 生成表单、互评表和作业
    ///
    /// `replace_handlers` 为真时先删掉之前登记的全部提交处理器。
    pub async fn generate(&self, settings: &GenerationSettings, replace_handlers: bool) -> StatusResult {
        log_startup("生成", self.backend.sheets.id());
        let generation = Generation::new(
            &self.backend,
            &self.codec,
            &self.registry,
            &self.error_log,
            self.user(),
        );
        match generation.run(settings, replace_handlers, Utc::now()).await {
            Ok(report) => report.to_status(),
            Err(e) => {
                error!("❌ 生成失败: {}", e);
                self.error_log.record(ErrorEntry::from_error(
                    self.user(),
                    self.backend.sheets.id(),
                    "Processing",
                    &e,
                ));
                StatusResult::error(format!("An error occurred: {e}"))
            }
        }
    }

    fn router(&self) -> SubmissionRouter<'_, S, F, C, L> {
        SubmissionRouter::new(
            &self.backend.sheets,
            &self.backend.forms,
            &self.backend.classroom,
            &self.codec,
            &self.error_log,
        )
    }

    /// 处理一次表单提交，结果只体现在表格和错误日志里
    pub async fn route_submission(&self, event: &SubmissionEvent) {
        report_outcome(self.router().route(event).await);
    }

    /// 按 response id 读取作答并处理
    pub async fn route_response(&self, form_id: &str, response_id: &str) {
        report_outcome(self.router().route_response(form_id, response_id).await);
    }

    /// 处理 Forms watch 推来的通知，返回处理了几份作答
    pub async fn route_notification(&self, notification: &FormNotification) -> usize {
        let outcomes = self.router().route_notification(notification).await;
        let count = outcomes.len();
        for outcome in outcomes {
            report_outcome(Some(outcome));
        }
        count
    }

    pub async fn list_handlers(&self) -> AppResult<Vec<RegisteredHandler>> {
        self.registry.list().await
    }

    /// 某个表单上登记的处理器 id
    pub async fn handlers_for_form(&self, form_id: &str) -> AppResult<Vec<String>> {
        self.registry.for_form(form_id).await
    }

    pub async fn delete_handlers(&self, handler_ids: &[String]) -> StatusResult {
        handler_registry::delete_selected(&self.backend.forms, &self.registry, handler_ids)
            .await
            .unwrap_or_else(|e| self.handler_failure(e))
    }

    pub async fn delete_all_handlers(&self) -> StatusResult {
        handler_registry::delete_all(&self.backend.forms, &self.registry)
            .await
            .unwrap_or_else(|e| self.handler_failure(e))
    }

    fn handler_failure(&self, e: crate::error::AppError) -> StatusResult {
        error!("❌ 删除处理器失败: {}", e);
        self.error_log.record(ErrorEntry::from_error(
            self.user(),
            self.registry.path().display().to_string(),
            "Handler Deletion",
            &e,
        ));
        StatusResult::error(format!("Error deleting handlers: {e}"))
    }

    pub async fn save_defaults(&self, settings: &GenerationSettings) -> StatusResult {
        match self.defaults.save(settings).await {
            Ok(()) => StatusResult::success("Defaults saved successfully."),
            Err(e) => {
                error!("保存默认配置失败: {}", e);
                StatusResult::error(format!("Error saving defaults: {e}"))
            }
        }
    }

    /// 没有保存过或文件损坏时返回空配置
    pub async fn load_defaults(&self) -> GenerationSettings {
        self.defaults.load().await.unwrap_or_default()
    }
}

fn report_outcome(outcome: Option<RouteOutcome>) {
    match outcome {
        Some(RouteOutcome::Written(record)) => info!(
            "✓ {} 的提交已写入 {} 个单元格",
            record.respondent,
            record.writes.len()
        ),
        Some(RouteOutcome::Ignored { respondent, .. }) => {
            info!("{} 不属于该表单的小组，未写入", respondent)
        }
        None => {}
    }
}
