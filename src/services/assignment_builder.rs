//! 作业构建服务 - 业务能力层
//!
//! 根据生成配置拼出每个小组的课程作业

use chrono::{DateTime, Duration, FixedOffset, Utc};
use tracing::info;

use crate::error::AppResult;
use crate::models::{Assignment, GenerationSettings, Group};
use crate::services::form_builder::{form_title, group_notice};
use crate::utils::time::{format_due_date, format_due_time, parse_local_datetime};

/// 排程时间至少要比现在晚这么多，否则立即发布
pub const MIN_SCHEDULE_LEAD_SECS: i64 = 5 * 60 + 1;

/// 截止时间（带用户时区）
pub fn due_datetime(settings: &GenerationSettings) -> AppResult<DateTime<FixedOffset>> {
    parse_local_datetime(&settings.due_date, &settings.due_time, &settings.utc_offset)
}

/// 作业排程时间
///
/// 没填、解析失败或不够靠后时返回 `None`，表示立即发布。
pub fn schedule_time(settings: &GenerationSettings, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (date, time) = settings.schedule()?;
    let earliest = now + Duration::seconds(MIN_SCHEDULE_LEAD_SECS);
    match parse_local_datetime(date, time, &settings.utc_offset) {
        Ok(at) if at.with_timezone(&Utc) > earliest => Some(at.with_timezone(&Utc)),
        Ok(at) => {
            info!("排程时间 {} 不够靠后，立即发布", at.to_rfc3339());
            None
        }
        Err(e) => {
            info!("排程时间无法解析 ({})，立即发布", e);
            None
        }
    }
}

/// 作业说明
pub fn assignment_description(
    settings: &GenerationSettings,
    group: &Group,
    form_url: &str,
    due: DateTime<FixedOffset>,
) -> String {
    format!(
        "Please complete this peer evaluation before {}, {}.\nForm Link: {}\n\n{}\n\n{}",
        format_due_date(due),
        format_due_time(due),
        form_url,
        group_notice(group),
        settings.assignment_description
    )
}

/// 拼出一个小组的作业
pub fn build_assignment(
    settings: &GenerationSettings,
    group: &Group,
    form_url: &str,
    topic_id: &str,
    student_ids: Vec<String>,
    due: DateTime<FixedOffset>,
    scheduled_time: Option<DateTime<Utc>>,
) -> Assignment {
    Assignment {
        title: form_title(&settings.assignment_title, &group.label),
        description: assignment_description(settings, group, form_url, due),
        max_points: settings.assignment_points,
        topic_id: topic_id.to_string(),
        due: due.with_timezone(&Utc),
        student_ids,
        link_url: form_url.to_string(),
        scheduled_time,
    }
}
