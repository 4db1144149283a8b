//! 配置预检流程 - 流程层
//!
//! 核心职责：在生成任何东西之前检查用户配置，汇总成一份报告
//!
//! 只读不写：表格、文件夹、课程都只查询。严重问题进 `error`，
//! 全部问题（含警告）进 `errors`，生成流程以 `error` 为准。

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::infrastructure::{Classroom, FileStorage, Spreadsheet};
use crate::models::{
    A1Range, CellRef, CellValue, GenerationSettings, PreviewReport, Student,
};
use crate::services::classroom_service::{sorted_by_last_name, ClassroomService};
use crate::services::layout::TableLayout;
use crate::services::roster;
use crate::services::roster_reader::{parse_start_column, read_roster, RosterSnapshot};
use crate::utils::time::{is_valid_date, is_valid_time, is_valid_utc_offset, parse_local_datetime};

/// 预览列表首尾各保留的条数
const PREVIEW_EDGE: usize = 5;
/// 小组预览最多显示的条数
const MAX_GROUP_PREVIEW: usize = 10;

const NO_CLASSROOM_STUDENTS: &str = "No students found in Classroom course.";

/// 超过 2 × `PREVIEW_EDGE` 条时只保留首尾
pub fn preview_list(items: &[String]) -> Vec<String> {
    if items.len() > PREVIEW_EDGE * 2 {
        let mut preview = items[..PREVIEW_EDGE].to_vec();
        preview.push("...".to_string());
        preview.extend_from_slice(&items[items.len() - PREVIEW_EDGE..]);
        preview
    } else {
        items.to_vec()
    }
}

/// 预检中发现的问题
#[derive(Default)]
struct Findings {
    critical: Vec<String>,
    messages: Vec<String>,
}

impl Findings {
    fn critical(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.critical.push(message.clone());
        self.messages.push(message);
    }

    /// 严重问题和展示给用户的文字不同
    fn critical_as(&mut self, critical: impl Into<String>, message: impl Into<String>) {
        self.critical.push(critical.into());
        self.messages.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    fn finish(self, report: &mut PreviewReport) {
        if !self.critical.is_empty() {
            report.error = Some(self.critical.join("; "));
        }
        if !self.messages.is_empty() {
            report.errors = Some(self.messages.join("; "));
        }
    }
}

/// 配置预检流程
pub struct Preview<'a, S, C, D> {
    sheets: &'a S,
    classroom: &'a C,
    storage: &'a D,
}

impl<'a, S, C, D> Preview<'a, S, C, D>
where
    S: Spreadsheet,
    C: Classroom,
    D: FileStorage,
{
    pub fn new(sheets: &'a S, classroom: &'a C, storage: &'a D) -> Self {
        Self {
            sheets,
            classroom,
            storage,
        }
    }

    /// 生成预检报告，`now` 用于判断截止和排程时间
    pub async fn run(&self, settings: &GenerationSettings, now: DateTime<Utc>) -> AppResult<PreviewReport> {
        let mut report = PreviewReport::default();
        let sheet = settings.sheet_name.trim();
        if sheet.is_empty() {
            report.error = Some("Sheet Name is required.".to_string());
            return Ok(report);
        }
        if !self.sheets.sheet_exists(sheet).await? {
            report.error = Some(format!("Sheet \"{sheet}\" not found."));
            return Ok(report);
        }

        let mut findings = Findings::default();

        // ========== 1. 名单 ==========
        let snapshot = match read_roster(
            self.sheets,
            sheet,
            &settings.names_range,
            &settings.group_names_range,
        )
        .await
        {
            Ok(snapshot) => {
                report.names_range_valid = true;
                Some(snapshot)
            }
            Err(e) => {
                findings.critical(format!(
                    "Error reading Names/Group Names Ranges: {e}. Ensure ranges are valid A1 notation (e.g., A2:A17)."
                ));
                None
            }
        };
        let students = snapshot.as_ref().map(RosterSnapshot::students).unwrap_or_default();
        report.student_count = students.len();
        if report.names_range_valid && students.is_empty() {
            findings.critical(
                "No valid student names found in the specified 'Names Range'. Ensure the range is correct and contains names.",
            );
        }
        let names: Vec<String> = students.iter().map(|s| s.name.clone()).collect();
        let groups: Vec<String> = students.iter().map(|s| s.group.clone()).collect();
        report.names = preview_list(&names);
        report.group_names = preview_list(&groups);

        // ========== 2. 小组 ==========
        self.check_groups(&students, &mut report, &mut findings);

        // ========== 3. 表头和链接单元格 ==========
        let table = self
            .check_eval_header(settings, sheet, &students, snapshot.as_ref(), &mut report, &mut findings)
            .await;
        self.check_url_cell(settings, sheet, &mut report, &mut findings).await;

        // ========== 4. 互评表区域 ==========
        match (&snapshot, table) {
            (Some(snapshot), Some(table)) if !students.is_empty() => {
                self.check_table_area(sheet, snapshot, &table, &mut report, &mut findings)
                    .await;
            }
            _ if report.names_range_valid && students.is_empty() => {
                report.eval_table_check_message = "No students to check.".to_string();
            }
            _ => {
                report.eval_table_check_message =
                    "Skipped (student data or eval starting column invalid).".to_string();
            }
        }

        // ========== 5. 文件夹 ==========
        self.check_folder(settings, &mut report, &mut findings).await;

        // ========== 6. 课程、主题、名单 ==========
        let roster_usable = self.check_classroom(settings, &mut report, &mut findings).await;
        self.check_roster_names(&names, roster_usable, &mut report, &mut findings);

        // ========== 7. 截止与排程 ==========
        check_due_date(settings, now, &mut report, &mut findings);
        check_schedule(settings, now, &mut report, &mut findings);

        findings.finish(&mut report);
        info!(
            "预检完成: {} 名学生, {} 个小组, {}",
            report.student_count,
            report.unique_group_count,
            report.error.as_deref().unwrap_or("无严重问题")
        );
        Ok(report)
    }

    fn check_groups(&self, students: &[Student], report: &mut PreviewReport, findings: &mut Findings) {
        if students.is_empty() {
            return;
        }
        report.names_missing_group_count = students.iter().filter(|s| !s.has_group()).count();
        report.all_names_have_group = report.names_missing_group_count == 0;
        if report.names_missing_group_count == students.len() {
            findings.critical(
                "Critical: All students found are missing group names. Group names are required for processing.",
            );
        } else if report.names_missing_group_count > 0 {
            findings.warning(format!(
                "Warning: {} student(s) are missing group names and will be skipped during processing if not assigned a group.",
                report.names_missing_group_count
            ));
        }

        let mut seen = HashSet::new();
        report.unique_groups = students
            .iter()
            .filter(|s| s.has_group())
            .filter(|s| seen.insert(s.group.clone()))
            .map(|s| s.group.clone())
            .collect();
        report.unique_group_count = report.unique_groups.len();
        report.unique_groups_preview = if report.unique_group_count > MAX_GROUP_PREVIEW {
            let mut preview = report.unique_groups[..MAX_GROUP_PREVIEW].to_vec();
            preview.push(format!(
                "... and {} more",
                report.unique_group_count - MAX_GROUP_PREVIEW
            ));
            preview
        } else {
            report.unique_groups.clone()
        };

        let mut seen_names = HashSet::new();
        let duplicates: BTreeSet<String> = students
            .iter()
            .filter(|s| !seen_names.insert(s.name.as_str()))
            .map(|s| s.name.clone())
            .collect();
        if !duplicates.is_empty() {
            report.duplicate_names = duplicates.into_iter().collect();
            findings.warning(format!(
                "Warning: {} name(s) appear more than once on the sheet ({}). Only the last occurrence of each will receive evaluations.",
                report.duplicate_names.len(),
                report.duplicate_names.join(", ")
            ));
        }
    }

    async fn check_eval_header(
        &self,
        settings: &GenerationSettings,
        sheet: &str,
        students: &[Student],
        snapshot: Option<&RosterSnapshot>,
        report: &mut PreviewReport,
        findings: &mut Findings,
    ) -> Option<TableLayout> {
        let label = match settings.evaluation_table_start_col.trim() {
            "" => "not specified",
            col => col,
        };
        let result: AppResult<Option<TableLayout>> = async {
            let start_column = parse_start_column(&settings.evaluation_table_start_col)?;
            let grouped = roster::with_groups(students.to_vec());
            let layout = crate::services::layout::resolve(&grouped, &[], 1, start_column);
            let table = layout.table_layout(
                settings.include_justification_in_table,
                settings.include_feedback_in_table,
            );
            let Some(snapshot) = snapshot else {
                report.eval_header.value = "Skipped (names range invalid).".to_string();
                return Ok(Some(table));
            };
            let first_row = snapshot.first_row();
            if first_row > 1 {
                let header = A1Range::from_origin(CellRef::new(first_row - 1, start_column), 1, table.width());
                let values = self.sheets.read_range(sheet, header).await?;
                let cells: Vec<&CellValue> = values.iter().flatten().collect();
                report.eval_header.is_empty = cells.iter().all(|c| c.is_blank());
                report.eval_header.value = if report.eval_header.is_empty {
                    String::new()
                } else {
                    let shown: Vec<String> = cells.iter().map(|c| c.display()).collect();
                    format!("Not empty: {}", shown.join(","))
                };
            } else {
                report.eval_header.value = "Warning: No space for Eval Table Headers.".to_string();
                report.eval_header.is_empty = false;
            }
            Ok(Some(table))
        }
        .await;

        match result {
            Ok(table) => table,
            Err(e) => {
                findings.critical(format!("Eval Start Column ({label}): {e}"));
                report.eval_header.value = "Error".to_string();
                None
            }
        }
    }

    async fn check_url_cell(
        &self,
        settings: &GenerationSettings,
        sheet: &str,
        report: &mut PreviewReport,
        findings: &mut Findings,
    ) {
        let a1 = settings.url_links_cell.trim();
        let result: AppResult<CellValue> = async {
            if a1.is_empty() {
                return Err(AppError::validation("Cell to Write Form URLs is required."));
            }
            let cell = CellRef::from_a1(a1).map_err(|e| AppError::validation(e.to_string()))?;
            let values = self.sheets.read_range(sheet, A1Range::single(cell)).await?;
            Ok(crate::infrastructure::spreadsheet::cell_at(&values, 0, 0))
        }
        .await;

        match result {
            Ok(value) => {
                report.url_cell.is_empty = value.is_blank();
                report.url_cell.value = value.display();
            }
            Err(e) => {
                let shown = if a1.is_empty() { "not specified" } else { a1 };
                findings.critical(format!("URL Links Cell ({shown}): {e}"));
                report.url_cell.value = "Error".to_string();
            }
        }
    }

    /// 每名学生那一行的互评表区域必须为空
    async fn check_table_area(
        &self,
        sheet: &str,
        snapshot: &RosterSnapshot,
        table: &TableLayout,
        report: &mut PreviewReport,
        findings: &mut Findings,
    ) {
        let rows = roster::raw_rows(&snapshot.raw_names, snapshot.first_row());
        let area = A1Range::from_origin(
            CellRef::new(snapshot.first_row(), table.start_column),
            snapshot.names_range.height(),
            table.width(),
        );
        let values = match self.sheets.read_range(sheet, area).await {
            Ok(values) => values,
            Err(e) => {
                report.eval_table_check_message = format!("Error: {e}");
                report.eval_table_area_clear = false;
                findings.warning(report.eval_table_check_message.clone());
                return;
            }
        };

        for (name, row) in rows {
            let offset = (row - snapshot.first_row()) as usize;
            let first_filled = (0..table.width() as usize).find(|&j| {
                !crate::infrastructure::spreadsheet::cell_at(&values, offset, j).is_blank()
            });
            if let Some(j) = first_filled {
                let cell = CellRef::new(row, table.start_column + j as u32);
                report.eval_table_area_clear = false;
                report.eval_table_check_message = format!(
                    "Evaluation table area for students is NOT clear. First non-empty cell found at {cell} (row of student '{name}')."
                );
                debug!("互评表区域非空: {} ({})", cell, name);
                return;
            }
        }
        report.eval_table_check_message =
            "Evaluation table area for students appears clear.".to_string();
    }

    async fn check_folder(&self, settings: &GenerationSettings, report: &mut PreviewReport, findings: &mut Findings) {
        let result: AppResult<bool> = async {
            let name = settings.form_folder.trim();
            if name.is_empty() {
                return Err(AppError::validation("Drive Folder Name is required."));
            }
            Ok(self.storage.find_folder(name).await?.is_some())
        }
        .await;

        match result {
            Ok(exists) => {
                report.drive_folder_exists = exists;
                report.drive_folder_check_message = if exists {
                    "Folder exists.".to_string()
                } else {
                    "Folder does NOT exist (will be created).".to_string()
                };
            }
            Err(e) => {
                report.drive_folder_check_message = format!("Error: {e}");
                findings.critical_as(
                    format!("Drive Folder: {e}"),
                    report.drive_folder_check_message.clone(),
                );
            }
        }
    }

    /// 返回课程名单是否可用于比对
    async fn check_classroom(
        &self,
        settings: &GenerationSettings,
        report: &mut PreviewReport,
        findings: &mut Findings,
    ) -> bool {
        let service = ClassroomService::new(self.classroom);
        let result: AppResult<bool> = async {
            if settings.course_name.trim().is_empty() {
                return Err(AppError::validation("Classroom Course Name is required."));
            }
            let course_id = service.course_id_by_name(&settings.course_name).await?;
            if settings.course_topic_name.trim().is_empty() {
                return Err(AppError::validation("Classroom Topic Name is required."));
            }
            report.classroom_topic_exists = service
                .topic_exists(&course_id, &settings.course_topic_name)
                .await?;
            report.classroom_topic_check_message = if report.classroom_topic_exists {
                "Topic exists.".to_string()
            } else {
                "Topic does NOT exist (will be created).".to_string()
            };

            let students = self.classroom.list_students(&course_id).await?;
            if students.is_empty() {
                report.classroom_roster = vec![NO_CLASSROOM_STUDENTS.to_string()];
                Ok(false)
            } else {
                report.classroom_roster = sorted_by_last_name(&students);
                Ok(true)
            }
        }
        .await;

        match result {
            Ok(usable) => usable,
            Err(e) => {
                report.classroom_topic_check_message = format!("Error related to topic/course: {e}");
                report.classroom_roster_check_message = format!("Could not fetch roster: {e}");
                report.classroom_roster = vec![format!("Error fetching roster: {e}")];
                findings.critical_as(
                    format!("Classroom Course/Topic/Roster: {e}"),
                    report.classroom_topic_check_message.clone(),
                );
                false
            }
        }
    }

    fn check_roster_names(
        &self,
        names: &[String],
        roster_usable: bool,
        report: &mut PreviewReport,
        findings: &mut Findings,
    ) {
        if names.is_empty() {
            if report.names_range_valid {
                report.classroom_roster_check_message = "No students on sheet to check.".to_string();
            }
            return;
        }
        if !roster_usable {
            if report.classroom_roster.first().map(String::as_str) == Some(NO_CLASSROOM_STUDENTS) {
                report.classroom_roster_check_message =
                    "Skipped (Problem with Classroom roster for comparison).".to_string();
            } else {
                report.classroom_roster_check_message =
                    "Skipped (Classroom course not found/specified or error fetching roster).".to_string();
            }
            return;
        }

        let roster: HashSet<&str> = report.classroom_roster.iter().map(String::as_str).collect();
        let mismatches: Vec<String> = names
            .iter()
            .filter(|n| !roster.contains(n.as_str()))
            .cloned()
            .collect();
        report.classroom_name_mismatch_count = mismatches.len();
        report.classroom_name_mismatches_preview = preview_list(&mismatches);
        report.classroom_name_mismatches = mismatches;

        if report.classroom_name_mismatch_count > 0 {
            report.classroom_roster_check_message = format!(
                "{} name(s) from sheet NOT found in Classroom roster.",
                report.classroom_name_mismatch_count
            );
            findings.critical_as(
                format!("{} This is a critical error.", report.classroom_roster_check_message),
                format!(
                    "{} Assignments will not be correctly made for these students.",
                    report.classroom_roster_check_message
                ),
            );
        } else {
            report.classroom_roster_check_message =
                "All names from sheet appear to match Classroom roster.".to_string();
        }
    }
}

fn check_due_date(
    settings: &GenerationSettings,
    now: DateTime<Utc>,
    report: &mut PreviewReport,
    findings: &mut Findings,
) {
    let (date, time, offset) = (
        settings.due_date.trim(),
        settings.due_time.trim(),
        settings.utc_offset.trim(),
    );
    let result: Result<bool, String> = if date.is_empty() || time.is_empty() || offset.is_empty() {
        Err("Due Date, Time, and UTC Offset are all required.".to_string())
    } else if !is_valid_date(date) || !is_valid_time(time) || !is_valid_utc_offset(offset) {
        Err("Invalid due date, time, or UTC offset format.".to_string())
    } else {
        parse_local_datetime(date, time, offset)
            .map(|due| due.with_timezone(&Utc) > now)
            .map_err(|_| "Could not parse due date/time.".to_string())
    };

    match result {
        Ok(in_future) => {
            report.due_date_in_future = Some(in_future);
            if in_future {
                report.due_date_check_message = "Due date is in the future.".to_string();
            } else {
                report.due_date_check_message = "Due date is NOT in the future.".to_string();
                findings.critical("Due date must be in the future.");
            }
        }
        Err(message) => {
            report.due_date_check_message = format!("Error: {message}");
            report.due_date_in_future = Some(false);
            findings.critical_as(
                format!("Due Date: {message}"),
                report.due_date_check_message.clone(),
            );
        }
    }
}

fn check_schedule(
    settings: &GenerationSettings,
    now: DateTime<Utc>,
    report: &mut PreviewReport,
    findings: &mut Findings,
) {
    let Some((date, time)) = settings.schedule() else {
        report.schedule_date_check_message = if settings.schedule_incomplete() {
            "Provide both Schedule Date and Time for check.".to_string()
        } else {
            "Not scheduled.".to_string()
        };
        return;
    };

    let offset = settings.utc_offset.trim();
    if !is_valid_date(date) || !is_valid_time(time) || !is_valid_utc_offset(offset) {
        report.schedule_date_check_message =
            "Invalid schedule date, time, or missing UTC offset for this check.".to_string();
        findings.warning(report.schedule_date_check_message.clone());
        return;
    }
    match parse_local_datetime(date, time, offset) {
        Err(_) => {
            report.schedule_date_check_message = "Could not parse schedule date/time.".to_string();
            findings.warning(report.schedule_date_check_message.clone());
        }
        Ok(at) if at.with_timezone(&Utc) <= now => {
            report.schedule_date_check_message = "Warning: Schedule date/time is in the past or is now. Assignment would publish immediately if not far enough in future for Classroom API.".to_string();
            findings.warning(report.schedule_date_check_message.clone());
        }
        Ok(_) => {
            report.schedule_date_check_message = "Schedule date/time is in the future.".to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("S{i}")).collect()
    }

    #[test]
    fn test_preview_list_short() {
        assert_eq!(preview_list(&names(10)), names(10));
    }

    #[test]
    fn test_preview_list_long() {
        let preview = preview_list(&names(12));
        assert_eq!(preview.len(), 11);
        assert_eq!(preview[4], "S5");
        assert_eq!(preview[5], "...");
        assert_eq!(preview[6], "S8");
    }

    #[test]
    fn test_due_date_checks() {
        let now = Utc::now();
        let mut settings = GenerationSettings {
            due_date: "2000-01-01".into(),
            due_time: "08:00:00".into(),
            utc_offset: "+0000".into(),
            ..Default::default()
        };
        let mut report = PreviewReport::default();
        let mut findings = Findings::default();
        check_due_date(&settings, now, &mut report, &mut findings);
        assert_eq!(report.due_date_in_future, Some(false));
        assert_eq!(findings.critical, vec!["Due date must be in the future."]);

        settings.due_time = "8am".into();
        let mut report = PreviewReport::default();
        let mut findings = Findings::default();
        check_due_date(&settings, now, &mut report, &mut findings);
        assert_eq!(
            report.due_date_check_message,
            "Error: Invalid due date, time, or UTC offset format."
        );
        assert_eq!(
            findings.critical,
            vec!["Due Date: Invalid due date, time, or UTC offset format."]
        );
    }

    #[test]
    fn test_schedule_checks() {
        let now = Utc::now();
        let mut settings = GenerationSettings {
            utc_offset: "+0800".into(),
            assignment_schedule_date: Some("2000-01-01".into()),
            ..Default::default()
        };
        let mut report = PreviewReport::default();
        let mut findings = Findings::default();
        check_schedule(&settings, now, &mut report, &mut findings);
        assert_eq!(
            report.schedule_date_check_message,
            "Provide both Schedule Date and Time for check."
        );

        settings.assignment_schedule_time = Some("08:00:00".into());
        let mut report = PreviewReport::default();
        check_schedule(&settings, now, &mut report, &mut findings);
        assert!(report.schedule_date_check_message.starts_with("Warning:"));
        assert!(findings.critical.is_empty());
        assert_eq!(findings.messages.len(), 1);
    }
}
