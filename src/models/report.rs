use serde::{Deserialize, Serialize};

/// 返回给调用方的执行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResult {
    pub status: Status,
    pub message: String,
}

impl StatusResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            status: Status::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// 单个单元格（或单元格区域）的检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellCheck {
    pub is_empty: bool,
    pub value: String,
}

impl Default for CellCheck {
    fn default() -> Self {
        Self {
            is_empty: true,
            value: String::new(),
        }
    }
}

/// 配置预检报告，不修改任何外部状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewReport {
    pub names: Vec<String>,
    pub group_names: Vec<String>,
    pub student_count: usize,
    pub names_range_valid: bool,
    pub all_names_have_group: bool,
    pub names_missing_group_count: usize,
    pub duplicate_names: Vec<String>,
    pub unique_group_count: usize,
    pub unique_groups: Vec<String>,
    pub unique_groups_preview: Vec<String>,
    pub eval_header: CellCheck,
    pub url_cell: CellCheck,
    pub eval_table_area_clear: bool,
    pub eval_table_check_message: String,
    pub drive_folder_exists: bool,
    pub drive_folder_check_message: String,
    pub classroom_topic_exists: bool,
    pub classroom_topic_check_message: String,
    pub due_date_in_future: Option<bool>,
    pub due_date_check_message: String,
    pub classroom_name_mismatches: Vec<String>,
    pub classroom_name_mismatch_count: usize,
    pub classroom_name_mismatches_preview: Vec<String>,
    pub classroom_roster_check_message: String,
    pub classroom_roster: Vec<String>,
    pub schedule_date_check_message: String,
    /// 阻止生成的严重问题，`; ` 连接
    pub error: Option<String>,
    /// 全部问题（含警告），`; ` 连接
    pub errors: Option<String>,
}

impl Default for PreviewReport {
    fn default() -> Self {
        let not_checked = || "Not checked.".to_string();
        Self {
            names: Vec::new(),
            group_names: Vec::new(),
            student_count: 0,
            names_range_valid: false,
            all_names_have_group: true,
            names_missing_group_count: 0,
            duplicate_names: Vec::new(),
            unique_group_count: 0,
            unique_groups: Vec::new(),
            unique_groups_preview: Vec::new(),
            eval_header: CellCheck::default(),
            url_cell: CellCheck::default(),
            eval_table_area_clear: true,
            eval_table_check_message: not_checked(),
            drive_folder_exists: false,
            drive_folder_check_message: not_checked(),
            classroom_topic_exists: false,
            classroom_topic_check_message: not_checked(),
            due_date_in_future: None,
            due_date_check_message: not_checked(),
            classroom_name_mismatches: Vec::new(),
            classroom_name_mismatch_count: 0,
            classroom_name_mismatches_preview: Vec::new(),
            classroom_roster_check_message: not_checked(),
            classroom_roster: Vec::new(),
            schedule_date_check_message: not_checked(),
            error: None,
            errors: None,
        }
    }
}
