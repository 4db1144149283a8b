//! 外部服务中的资源：课程、学生、主题、文件夹、表单、作业

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
}

/// 课程名单里的学生
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassroomStudent {
    pub user_id: String,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub topic_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
}

/// 表单设置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSettings {
    pub collect_email: bool,
    pub allow_response_edits: bool,
    pub limit_one_response_per_user: bool,
}

/// 已创建的表单
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormHandle {
    pub form_id: String,
    pub published_url: String,
}

/// 作业发布状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentState {
    Published,
    Draft,
}

/// 待创建的课程作业
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub title: String,
    pub description: String,
    pub max_points: i64,
    pub topic_id: String,
    pub due: DateTime<Utc>,
    /// 只分配给这些学生
    pub student_ids: Vec<String>,
    pub link_url: String,
    /// 有值时按时发布，否则立即发布
    pub scheduled_time: Option<DateTime<Utc>>,
}

impl Assignment {
    pub fn state(&self) -> AssignmentState {
        if self.scheduled_time.is_some() {
            AssignmentState::Draft
        } else {
            AssignmentState::Published
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedAssignment {
    pub id: String,
    pub state: AssignmentState,
    pub scheduled_time: Option<DateTime<Utc>>,
}
