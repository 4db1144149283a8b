use serde::{Deserialize, Serialize};

use crate::models::question::ScaleSettings;

/// 用户提交的生成配置
///
/// 所有字段都有默认值，缺失的必填项由预检报告给用户，而不是在解析阶段失败。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub sheet_name: String,
    /// 学生姓名范围（A1，如 `A2:A17`）
    pub names_range: String,
    /// 小组名范围，与姓名范围逐行对应
    pub group_names_range: String,
    /// 互评表起始列（列字母，如 `E`）
    pub evaluation_table_start_col: String,
    /// 写入表单链接的单元格
    pub url_links_cell: String,
    /// 存放表单的 Drive 文件夹
    pub form_folder: String,
    pub course_name: String,
    pub course_topic_name: String,
    /// `YYYY-MM-DD`
    pub due_date: String,
    /// `HH:MM:SS`
    pub due_time: String,
    /// `+HHMM` / `-HHMM`
    pub utc_offset: String,
    pub assignment_schedule_date: Option<String>,
    pub assignment_schedule_time: Option<String>,
    pub form_title: String,
    pub form_description: String,
    pub scale_lower_bound: i64,
    pub scale_upper_bound: i64,
    pub scale_lower_label: String,
    pub scale_upper_label: String,
    pub assignment_title: String,
    pub assignment_description: String,
    pub assignment_points: i64,
    pub allow_response_edits: bool,
    pub include_justification_in_table: bool,
    pub include_feedback_in_table: bool,
}

impl GenerationSettings {
    pub fn scale(&self) -> ScaleSettings {
        ScaleSettings {
            lower: self.scale_lower_bound,
            upper: self.scale_upper_bound,
            lower_label: self.scale_lower_label.clone(),
            upper_label: self.scale_upper_label.clone(),
        }
    }

    /// 排程日期和时间，两者都填写才算
    pub fn schedule(&self) -> Option<(&str, &str)> {
        match (
            self.assignment_schedule_date.as_deref().map(str::trim),
            self.assignment_schedule_time.as_deref().map(str::trim),
        ) {
            (Some(date), Some(time)) if !date.is_empty() && !time.is_empty() => Some((date, time)),
            _ => None,
        }
    }

    /// 只填了排程日期或时间中的一个
    pub fn schedule_incomplete(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        self.schedule().is_none()
            && (filled(&self.assignment_schedule_date) || filled(&self.assignment_schedule_time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: GenerationSettings = toml::from_str(
            r#"
            sheet_name = "Roster"
            names_range = "A2:A17"
            scale_upper_bound = 5
            include_feedback_in_table = true
            "#,
        )
        .unwrap();
        assert_eq!(settings.sheet_name, "Roster");
        assert_eq!(settings.scale_upper_bound, 5);
        assert!(settings.include_feedback_in_table);
        assert!(settings.course_name.is_empty());
        assert!(settings.schedule().is_none());
    }

    #[test]
    fn test_schedule_needs_both_parts() {
        let mut settings = GenerationSettings {
            assignment_schedule_date: Some("2030-01-01".into()),
            ..Default::default()
        };
        assert!(settings.schedule().is_none());
        assert!(settings.schedule_incomplete());

        settings.assignment_schedule_time = Some("08:00:00".into());
        assert_eq!(settings.schedule(), Some(("2030-01-01", "08:00:00")));
        assert!(!settings.schedule_incomplete());
    }
}
