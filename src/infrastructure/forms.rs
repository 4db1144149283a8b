use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::models::{CreatedQuestion, FormHandle, FormSettings, QuestionSpec, SubmissionEvent};

/// 表单服务契约
#[allow(async_fn_in_trait)]
pub trait FormService {
    /// 创建并发布表单，返回 id 和公开链接
    async fn create_form(&self, title: &str, settings: FormSettings) -> AppResult<FormHandle>;

    /// 追加一道题，返回 item id 和 question id
    async fn add_question(&self, form_id: &str, question: &QuestionSpec) -> AppResult<CreatedQuestion>;

    async fn set_description(&self, form_id: &str, description: &str) -> AppResult<()>;

    async fn description(&self, form_id: &str) -> AppResult<String>;

    /// 挂载提交处理器，返回处理器 id
    async fn attach_submit_handler(&self, form_id: &str) -> AppResult<String>;

    async fn remove_submit_handler(&self, form_id: &str, handler_id: &str) -> AppResult<()>;

    /// 读取一份作答，作答按表单题目顺序排列
    async fn response(&self, form_id: &str, response_id: &str) -> AppResult<SubmissionEvent>;

    /// `since` 之后（含）提交或修改过的作答 id
    async fn responses_since(&self, form_id: &str, since: DateTime<Utc>) -> AppResult<Vec<String>>;
}
