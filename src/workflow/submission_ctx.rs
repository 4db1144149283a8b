//! 提交处理上下文
//!
//! 封装"我正在处理谁对哪份表单的提交"这一信息

use std::fmt::Display;

/// 提交处理上下文
#[derive(Debug, Clone)]
pub struct SubmissionCtx {
    /// 表单 ID
    pub form_id: String,

    /// 提交者邮箱
    pub respondent_email: String,

    /// 目标表格 ID，写入错误日志
    pub spreadsheet_id: String,
}

impl SubmissionCtx {
    pub fn new(
        form_id: impl Into<String>,
        respondent_email: impl Into<String>,
        spreadsheet_id: impl Into<String>,
    ) -> Self {
        Self {
            form_id: form_id.into(),
            respondent_email: respondent_email.into(),
            spreadsheet_id: spreadsheet_id.into(),
        }
    }
}

impl Display for SubmissionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[提交 表单#{} 来自#{}]", self.form_id, self.respondent_email)
    }
}
