use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::a1::CellRef;
use crate::models::cell::{CellFormat, CellValue};

/// 一道题的作答
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(default)]
    pub item_id: String,
    pub title: String,
    pub response: String,
}

impl Answer {
    pub fn new(
        item_id: impl Into<String>,
        title: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            title: title.into(),
            response: response.into(),
        }
    }
}

/// 一次表单提交事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionEvent {
    pub form_id: String,
    pub respondent_email: String,
    /// 按表单顺序排列的作答
    pub answers: Vec<Answer>,
    #[serde(default = "Utc::now")]
    pub submitted_at: DateTime<Utc>,
}

/// Forms watch 推到 Pub/Sub 的一条通知（push 订阅的请求体）
///
/// 通知只带表单 id，作答要另外读取。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormNotification {
    pub message: NotificationMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    #[serde(default)]
    pub attributes: NotificationAttributes,
    #[serde(rename = "publishTime")]
    pub publish_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAttributes {
    #[serde(rename = "formId", default)]
    pub form_id: String,
    #[serde(rename = "watchId", default)]
    pub watch_id: String,
    #[serde(rename = "eventType", default)]
    pub event_type: String,
}

impl FormNotification {
    pub fn form_id(&self) -> &str {
        &self.message.attributes.form_id
    }

    /// 只有 `RESPONSES` 通知对应新的作答
    pub fn is_responses(&self) -> bool {
        self.message.attributes.event_type == "RESPONSES"
    }
}

/// 写入的内容种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteKind {
    Score,
    Justification,
    Feedback,
    Timestamp,
}

impl WriteKind {
    pub fn label(self) -> &'static str {
        match self {
            WriteKind::Score => "Score",
            WriteKind::Justification => "Just.",
            WriteKind::Feedback => "Feedback",
            WriteKind::Timestamp => "Timestamp",
        }
    }
}

/// 一次单元格写入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellWrite {
    pub kind: WriteKind,
    /// 这一行属于谁
    pub row_owner: String,
    pub cell: CellRef,
    pub value: CellValue,
    pub format: Option<CellFormat>,
}

/// 因映射缺失而跳过的写入
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedWrite {
    pub category: String,
    pub message: String,
}

/// 一次提交的路由结果，只在处理期间存在
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub respondent: String,
    pub group: String,
    pub index_in_group: usize,
    pub writes: Vec<CellWrite>,
    pub skipped: Vec<SkippedWrite>,
}
