//! 表单生成流程 - 流程层
//!
//! 核心职责：按配置为每个小组建表单、挂处理器、建作业
//!
//! 流程顺序：
//! 1. （可选）删除之前登记的全部提交处理器
//! 2. 预检，有严重问题就中止
//! 3. 检查量表范围和作业分值
//! 4. 查课程、取课程名单
//! 5. 过滤学生（没有小组、不在课程名单里的跳过并记日志）
//! 6. 计算布局，准备主题和文件夹
//! 7. 初始化互评表
//! 8. 每个小组：建表单 → 挂处理器 → 登记 → 移进文件夹
//! 9. 把表单链接写进链接单元格
//! 10. 每个小组建一份作业
//! 11. 汇总结果

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::{AppError, AppResult, LookupError};
use crate::infrastructure::{Backend, Classroom, FileStorage, FormService, Spreadsheet};
use crate::models::{
    CellRef, CellValue, Folder, FormContext, GenerationSettings, Group, StatusResult, Student,
};
use crate::services::assignment_builder::{build_assignment, due_datetime, schedule_time};
use crate::services::error_log::{ErrorEntry, ErrorLog};
use crate::services::folder_service::get_or_create_folder;
use crate::services::handler_registry::{self, HandlerRecord, HandlerRegistry};
use crate::services::layout;
use crate::services::roster_reader::{parse_start_column, read_roster};
use crate::services::{ClassroomService, ContextCodec, FormBuilder, PeerTable};
use crate::utils::logging::log_generation_summary;
use crate::utils::time::format_created_timestamp;
use crate::workflow::preview::Preview;

const NO_FORMS_CREATED: &str = "No forms were created (e.g., no valid groups after filters).";

/// 一个小组生成出来的表单
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedForm {
    pub group: String,
    pub form_id: String,
    pub url: String,
    pub handler_id: String,
}

/// 生成结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub forms: Vec<GeneratedForm>,
    pub assignments_created: usize,
    /// 被跳过的学生及原因
    pub skipped_students: Vec<(String, String)>,
    pub url_cell: String,
}

impl GenerationReport {
    pub fn to_status(&self) -> StatusResult {
        let mut message = format!(
            "Forms and assignments processed successfully! URLs written to {}. Don't forget to set \"Collect email addresses\" to \"Verified\" under \"Responses\" of each form's settings.",
            self.url_cell
        );
        if !self.skipped_students.is_empty() {
            message.push_str(
                " Some students were skipped (see script logs/developer log for details).",
            );
        }
        StatusResult::success(message)
    }
}

/// 表单生成流程
///
/// - 只依赖协作者 trait，不持有连接
/// - 单个小组的移动文件夹、建作业失败只记日志
pub struct Generation<'a, S, F, C, D, L> {
    backend: &'a Backend<S, F, C, D>,
    codec: &'a ContextCodec,
    registry: &'a HandlerRegistry,
    log: &'a L,
    user: &'a str,
}

impl<'a, S, F, C, D, L> Generation<'a, S, F, C, D, L>
where
    S: Spreadsheet,
    F: FormService,
    C: Classroom,
    D: FileStorage,
    L: ErrorLog,
{
    pub fn new(
        backend: &'a Backend<S, F, C, D>,
        codec: &'a ContextCodec,
        registry: &'a HandlerRegistry,
        log: &'a L,
        user: &'a str,
    ) -> Self {
        Self {
            backend,
            codec,
            registry,
            log,
            user,
        }
    }

    pub async fn run(
        &self,
        settings: &GenerationSettings,
        replace_handlers: bool,
        now: DateTime<Utc>,
    ) -> AppResult<GenerationReport> {
        let sheet = settings.sheet_name.trim();

        // ========== 步骤 1: 清理旧处理器 ==========
        if replace_handlers {
            let status = handler_registry::delete_all(&self.backend.forms, self.registry).await?;
            info!("🧹 清理旧处理器: {}", status.message);
        }

        // ========== 步骤 2-3: 预检 ==========
        let report = Preview::new(
            &self.backend.sheets,
            &self.backend.classroom,
            &self.backend.storage,
        )
        .run(settings, now)
        .await?;
        if let Some(error) = &report.error {
            return Err(AppError::validation(format!("Input validation failed: {error}")));
        }
        if settings.scale_upper_bound <= settings.scale_lower_bound {
            return Err(AppError::validation(
                "Invalid scale bounds: Must be integers and upper bound must be greater than lower bound.",
            ));
        }
        if settings.assignment_points < 0 {
            return Err(AppError::validation("Assignment points cannot be negative."));
        }
        let due = due_datetime(settings)?;
        let url_cell = CellRef::from_a1(&settings.url_links_cell)
            .map_err(|e| AppError::validation(format!("URL Links Cell: {e}")))?;
        let start_column = parse_start_column(&settings.evaluation_table_start_col)?;

        // ========== 步骤 4: 课程和名单 ==========
        let classroom = ClassroomService::new(&self.backend.classroom);
        let course_id = classroom.course_id_by_name(&settings.course_name).await?;
        let roster = self.backend.classroom.list_students(&course_id).await?;
        if roster.is_empty() {
            return Err(LookupError::EmptyClassroomRoster.into());
        }
        let user_ids: HashMap<&str, &str> = roster
            .iter()
            .map(|s| (s.full_name.as_str(), s.user_id.as_str()))
            .collect();
        info!("👥 课程名单: {} 名学生", roster.len());

        // ========== 步骤 5: 过滤学生 ==========
        let snapshot = read_roster(
            &self.backend.sheets,
            sheet,
            &settings.names_range,
            &settings.group_names_range,
        )
        .await?;
        let (kept, skipped) = partition_students(snapshot.students(), |name| {
            user_ids.contains_key(name)
        });
        self.log_skipped(&skipped, sheet);
        if kept.is_empty() {
            return Err(AppError::validation(
                "No students remaining for processing after initial filters (missing group or Classroom name mismatch).",
            ));
        }

        // ========== 步骤 6: 布局、主题、文件夹 ==========
        let layout = layout::resolve(&kept, &snapshot.raw_names, snapshot.first_row(), start_column);
        let table = layout.table_layout(
            settings.include_justification_in_table,
            settings.include_feedback_in_table,
        );
        let topic = classroom
            .get_or_create_topic(&course_id, &settings.course_topic_name)
            .await?;
        let folder = get_or_create_folder(&self.backend.storage, &settings.form_folder).await?;
        info!(
            "📐 布局: {} 个小组, 最大组 {} 人, 互评表从 {} 列开始",
            layout.groups.len(),
            layout.max_group_size,
            table.start_letters()
        );

        // ========== 步骤 7: 互评表 ==========
        PeerTable::new(&self.backend.sheets, sheet)
            .initialize(&layout, &table, snapshot.first_row())
            .await?;

        // ========== 步骤 8: 每个小组的表单 ==========
        let base_context = FormContext {
            sheet: sheet.to_string(),
            names_range: settings.names_range.trim().to_string(),
            group_names_range: settings.group_names_range.trim().to_string(),
            eval_start_column: table.start_letters(),
            course: settings.course_name.clone(),
            group: String::new(),
            utc_offset: settings.utc_offset.trim().to_string(),
            include_justification: settings.include_justification_in_table,
            include_feedback: settings.include_feedback_in_table,
            questions: Vec::new(),
        };
        let mut forms = Vec::with_capacity(layout.groups.len());
        for group in &layout.groups {
            let form = self
                .build_group_form(settings, group, &base_context, &folder, now)
                .await?;
            forms.push(form);
        }

        // ========== 步骤 9: 链接单元格 ==========
        let urls = if forms.is_empty() {
            NO_FORMS_CREATED.to_string()
        } else {
            forms
                .iter()
                .map(|f| f.url.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        };
        self.backend
            .sheets
            .write_cell(sheet, url_cell, CellValue::text(urls))
            .await?;
        info!("🔗 表单链接已写入 {}!{}", sheet, url_cell);

        // ========== 步骤 10: 作业 ==========
        let scheduled = schedule_time(settings, now);
        let mut assignments_created = 0;
        for (group, form) in layout.groups.iter().zip(&forms) {
            let student_ids = student_ids_for(group, &user_ids);
            if student_ids.is_empty() {
                warn!("[小组 {}] 没有可分配的学生，跳过作业", group.label);
                continue;
            }
            let assignment = build_assignment(
                settings,
                group,
                &form.url,
                &topic.topic_id,
                student_ids,
                due,
                scheduled,
            );
            match self
                .backend
                .classroom
                .create_assignment(&course_id, &assignment)
                .await
            {
                Ok(created) => {
                    assignments_created += 1;
                    info!(
                        "[小组 {}] ✓ 作业已创建: {} ({:?})",
                        group.label, created.id, created.state
                    );
                }
                Err(e) => {
                    warn!("[小组 {}] ⚠️ 作业创建失败: {}", group.label, e);
                    self.log.record(
                        ErrorEntry::from_error(self.user, &course_id, "Assignment Creation", &e)
                            .with_detail(format!("Group: {} | Form: {}", group.label, form.url)),
                    );
                }
            }
        }

        // ========== 步骤 11: 汇总 ==========
        log_generation_summary(forms.len(), assignments_created, skipped.len());
        Ok(GenerationReport {
            forms,
            assignments_created,
            skipped_students: skipped,
            url_cell: url_cell.to_a1(),
        })
    }

    async fn build_group_form(
        &self,
        settings: &GenerationSettings,
        group: &Group,
        base_context: &FormContext,
        folder: &Folder,
        now: DateTime<Utc>,
    ) -> AppResult<GeneratedForm> {
        let forms = &self.backend.forms;
        let built = FormBuilder::new(forms, self.codec)
            .build(settings, group, base_context)
            .await?;
        let form_id = built.handle.form_id.clone();

        // 新表单还没有处理器；上一轮的处理器由 replace_handlers 统一清理
        let handler_id = forms.attach_submit_handler(&form_id).await?;
        self.registry
            .register(
                &handler_id,
                HandlerRecord {
                    form_id: form_id.clone(),
                    form_title: built.title.clone(),
                    sheet: base_context.sheet.clone(),
                    group: group.label.clone(),
                    course: settings.course_name.clone(),
                    created: format_created_timestamp(now, &settings.utc_offset),
                },
            )
            .await?;

        if let Err(e) = self.backend.storage.move_file(&form_id, folder).await {
            warn!("[表单 {}] ⚠️ 移动到文件夹 {} 失败: {}", group.label, folder.name, e);
            self.log.record(
                ErrorEntry::from_error(self.user, &form_id, "Processing Warning", &e)
                    .with_detail(format!("Could not move form to folder \"{}\"", folder.name)),
            );
        }

        Ok(GeneratedForm {
            group: group.label.clone(),
            form_id,
            url: built.handle.published_url,
            handler_id,
        })
    }

    fn log_skipped(&self, skipped: &[(String, String)], sheet: &str) {
        if skipped.is_empty() {
            return;
        }
        for (name, reason) in skipped {
            warn!("⏭️ 跳过 {}: {}", name, reason);
            self.log.record(ErrorEntry::new(
                self.user,
                sheet,
                "Processing - Name Mismatch Skip",
                format!("Skipped student \"{name}\": {reason}"),
            ));
        }
        let names: Vec<&str> = skipped.iter().map(|(n, _)| n.as_str()).collect();
        self.log.record(ErrorEntry::new(
            self.user,
            sheet,
            "Processing Info",
            format!("Students skipped: {}", names.join(", ")),
        ));
    }
}

/// 拆出要处理的学生和跳过的学生（附原因）
fn partition_students(
    students: Vec<Student>,
    in_classroom: impl Fn(&str) -> bool,
) -> (Vec<Student>, Vec<(String, String)>) {
    let mut kept = Vec::new();
    let mut skipped = Vec::new();
    for student in students {
        if !student.has_group() {
            skipped.push((student.name, "missing group name".to_string()));
        } else if !in_classroom(&student.name) {
            skipped.push((student.name, "not found in Classroom roster".to_string()));
        } else {
            kept.push(student);
        }
    }
    (kept, skipped)
}

fn student_ids_for(group: &Group, user_ids: &HashMap<&str, &str>) -> Vec<String> {
    group
        .members
        .iter()
        .filter_map(|m| user_ids.get(m.as_str()).map(|id| id.to_string()))
        .collect()
}
