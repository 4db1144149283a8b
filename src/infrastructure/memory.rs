//! 内存实现
//!
//! 四个外部服务的内存版本，用于离线运行和测试。写入失败可以按单元格注入。

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{AppError, AppResult, ServiceError};
use crate::infrastructure::{Classroom, FileStorage, FormService, Spreadsheet};
use chrono::{DateTime, Utc};

use crate::models::{
    A1Range, Answer, Assignment, CellFormat, CellRef, CellValue, ClassroomStudent, Course,
    CreatedAssignment, CreatedQuestion, Folder, FormHandle, FormSettings, QuestionSpec,
    SubmissionEvent, Topic,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn parse_cell(a1: &str) -> CellRef {
    CellRef::from_a1(a1).unwrap_or_else(|e| panic!("invalid test cell '{a1}': {e}"))
}

// ========== 表格 ==========

type SheetCells = BTreeMap<CellRef, CellValue>;

#[derive(Default)]
pub struct MemorySpreadsheet {
    id: String,
    sheets: Mutex<HashMap<String, SheetCells>>,
    formats: Mutex<HashMap<(String, CellRef), CellFormat>>,
    failing_cells: Mutex<HashSet<(String, CellRef)>>,
}

impl MemorySpreadsheet {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_sheet(self, name: &str) -> Self {
        lock(&self.sheets).entry(name.to_string()).or_default();
        self
    }

    /// 按列写入，`values[i]` 写到 `origin` 下方第 i 行
    pub fn with_column(self, sheet: &str, origin: &str, values: &[&str]) -> Self {
        let origin = parse_cell(origin);
        {
            let mut sheets = lock(&self.sheets);
            let cells = sheets.entry(sheet.to_string()).or_default();
            for (i, v) in values.iter().enumerate() {
                let cell = CellRef::new(origin.row + i as u32, origin.col);
                if v.is_empty() {
                    cells.remove(&cell);
                } else {
                    cells.insert(cell, CellValue::text(*v));
                }
            }
        }
        self
    }

    pub fn set(&self, sheet: &str, a1: &str, value: CellValue) {
        lock(&self.sheets)
            .entry(sheet.to_string())
            .or_default()
            .insert(parse_cell(a1), value);
    }

    pub fn get(&self, sheet: &str, a1: &str) -> CellValue {
        self.get_cell(sheet, parse_cell(a1))
    }

    pub fn get_cell(&self, sheet: &str, cell: CellRef) -> CellValue {
        lock(&self.sheets)
            .get(sheet)
            .and_then(|cells| cells.get(&cell))
            .cloned()
            .unwrap_or_default()
    }

    pub fn format(&self, sheet: &str, a1: &str) -> Option<CellFormat> {
        lock(&self.formats)
            .get(&(sheet.to_string(), parse_cell(a1)))
            .copied()
    }

    /// 非空单元格数量
    pub fn filled_cells(&self, sheet: &str) -> usize {
        lock(&self.sheets)
            .get(sheet)
            .map(|cells| cells.values().filter(|v| !v.is_blank()).count())
            .unwrap_or(0)
    }

    /// 让指定单元格的写入失败
    pub fn fail_writes_at(&self, sheet: &str, a1: &str) {
        lock(&self.failing_cells).insert((sheet.to_string(), parse_cell(a1)));
    }

    fn ensure_sheet(&self, sheet: &str) -> AppResult<()> {
        if lock(&self.sheets).contains_key(sheet) {
            Ok(())
        } else {
            Err(AppError::not_found("sheets", format!("sheet {sheet}")))
        }
    }
}

impl Spreadsheet for MemorySpreadsheet {
    fn id(&self) -> &str {
        &self.id
    }

    async fn sheet_exists(&self, sheet: &str) -> AppResult<bool> {
        Ok(lock(&self.sheets).contains_key(sheet))
    }

    async fn read_range(&self, sheet: &str, range: A1Range) -> AppResult<Vec<Vec<CellValue>>> {
        self.ensure_sheet(sheet)?;
        let sheets = lock(&self.sheets);
        let cells = sheets.get(sheet);
        let rows = (range.start.row..=range.end.row)
            .map(|row| {
                (range.start.col..=range.end.col)
                    .map(|col| {
                        cells
                            .and_then(|c| c.get(&CellRef::new(row, col)))
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();
        Ok(rows)
    }

    async fn write_cell(&self, sheet: &str, cell: CellRef, value: CellValue) -> AppResult<()> {
        self.ensure_sheet(sheet)?;
        if lock(&self.failing_cells).contains(&(sheet.to_string(), cell)) {
            return Err(AppError::Service(ServiceError::BadResponse {
                service: "sheets",
                endpoint: format!("{sheet}!{cell}"),
                status: 500,
                message: "injected write failure".to_string(),
            }));
        }
        lock(&self.sheets)
            .entry(sheet.to_string())
            .or_default()
            .insert(cell, value);
        Ok(())
    }

    async fn write_row(&self, sheet: &str, origin: CellRef, values: Vec<CellValue>) -> AppResult<()> {
        for (i, value) in values.into_iter().enumerate() {
            self.write_cell(sheet, CellRef::new(origin.row, origin.col + i as u32), value)
                .await?;
        }
        Ok(())
    }

    async fn clear_range(&self, sheet: &str, range: A1Range) -> AppResult<()> {
        self.ensure_sheet(sheet)?;
        if let Some(cells) = lock(&self.sheets).get_mut(sheet) {
            cells.retain(|cell, _| !range.contains(*cell));
        }
        lock(&self.formats).retain(|(s, cell), _| s != sheet || !range.contains(*cell));
        Ok(())
    }

    async fn set_format(&self, sheet: &str, range: A1Range, format: CellFormat) -> AppResult<()> {
        self.ensure_sheet(sheet)?;
        let mut formats = lock(&self.formats);
        for row in range.start.row..=range.end.row {
            for col in range.start.col..=range.end.col {
                formats.insert((sheet.to_string(), CellRef::new(row, col)), format);
            }
        }
        Ok(())
    }
}

// ========== 表单 ==========

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryForm {
    pub title: String,
    pub description: String,
    pub settings: FormSettings,
    pub published_url: String,
    pub questions: Vec<MemoryQuestion>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryQuestion {
    pub item_id: String,
    pub question_id: String,
    pub spec: QuestionSpec,
}

/// 一份作答：question id → 作答文字
#[derive(Debug, Clone, PartialEq)]
struct MemoryResponse {
    form_id: String,
    respondent_email: String,
    answers: BTreeMap<String, String>,
    submitted_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryForms {
    forms: Mutex<BTreeMap<String, MemoryForm>>,
    /// handler id → form id
    handlers: Mutex<BTreeMap<String, String>>,
    /// response id → 作答
    responses: Mutex<BTreeMap<String, MemoryResponse>>,
    next_id: AtomicUsize,
}

impl MemoryForms {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// 直接放入一份表单（用于模拟已存在的表单）
    pub fn insert_form(&self, form_id: &str, description: &str) {
        lock(&self.forms).insert(
            form_id.to_string(),
            MemoryForm {
                title: form_id.to_string(),
                description: description.to_string(),
                settings: FormSettings {
                    collect_email: true,
                    allow_response_edits: false,
                    limit_one_response_per_user: true,
                },
                published_url: format!("https://forms.example/{form_id}/viewform"),
                questions: Vec::new(),
            },
        );
    }

    pub fn form(&self, form_id: &str) -> Option<MemoryForm> {
        lock(&self.forms).get(form_id).cloned()
    }

    /// 按创建顺序返回全部表单
    pub fn forms(&self) -> Vec<(String, MemoryForm)> {
        let mut forms: Vec<_> = lock(&self.forms)
            .iter()
            .map(|(id, f)| (id.clone(), f.clone()))
            .collect();
        forms.sort_by_key(|(id, _)| {
            id.rsplit('-')
                .next()
                .and_then(|n| n.parse::<usize>().ok())
                .unwrap_or(0)
        });
        forms
    }

    /// handler id → form id
    pub fn handlers(&self) -> BTreeMap<String, String> {
        lock(&self.handlers).clone()
    }

    /// 模拟一次提交，`answers` 是 (question id, 作答)，返回 response id
    pub fn submit(
        &self,
        form_id: &str,
        respondent_email: &str,
        answers: &[(String, String)],
        submitted_at: DateTime<Utc>,
    ) -> String {
        let response_id = self.next("response");
        lock(&self.responses).insert(
            response_id.clone(),
            MemoryResponse {
                form_id: form_id.to_string(),
                respondent_email: respondent_email.to_string(),
                answers: answers.iter().cloned().collect(),
                submitted_at,
            },
        );
        response_id
    }

    fn with_form<T>(&self, form_id: &str, f: impl FnOnce(&mut MemoryForm) -> T) -> AppResult<T> {
        lock(&self.forms)
            .get_mut(form_id)
            .map(f)
            .ok_or_else(|| AppError::not_found("forms", format!("form {form_id}")))
    }
}

impl FormService for MemoryForms {
    async fn create_form(&self, title: &str, settings: FormSettings) -> AppResult<FormHandle> {
        let form_id = self.next("form");
        let published_url = format!("https://forms.example/{form_id}/viewform");
        lock(&self.forms).insert(
            form_id.clone(),
            MemoryForm {
                title: title.to_string(),
                description: String::new(),
                settings,
                published_url: published_url.clone(),
                questions: Vec::new(),
            },
        );
        Ok(FormHandle {
            form_id,
            published_url,
        })
    }

    async fn add_question(&self, form_id: &str, question: &QuestionSpec) -> AppResult<CreatedQuestion> {
        let created = CreatedQuestion {
            item_id: self.next("item"),
            question_id: self.next("question"),
        };
        self.with_form(form_id, |form| {
            form.questions.push(MemoryQuestion {
                item_id: created.item_id.clone(),
                question_id: created.question_id.clone(),
                spec: question.clone(),
            })
        })?;
        Ok(created)
    }

    async fn set_description(&self, form_id: &str, description: &str) -> AppResult<()> {
        self.with_form(form_id, |form| form.description = description.to_string())
    }

    async fn description(&self, form_id: &str) -> AppResult<String> {
        self.with_form(form_id, |form| form.description.clone())
    }

    async fn attach_submit_handler(&self, form_id: &str) -> AppResult<String> {
        self.with_form(form_id, |_| ())?;
        let handler_id = self.next("handler");
        lock(&self.handlers).insert(handler_id.clone(), form_id.to_string());
        Ok(handler_id)
    }

    async fn remove_submit_handler(&self, _form_id: &str, handler_id: &str) -> AppResult<()> {
        lock(&self.handlers)
            .remove(handler_id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("forms", format!("handler {handler_id}")))
    }

    async fn response(&self, form_id: &str, response_id: &str) -> AppResult<SubmissionEvent> {
        let response = lock(&self.responses)
            .get(response_id)
            .filter(|r| r.form_id == form_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("forms", format!("response {response_id}")))?;
        let questions = self.with_form(form_id, |form| form.questions.clone())?;
        let answers = questions
            .iter()
            .filter_map(|q| {
                let value = response.answers.get(&q.question_id)?;
                Some(Answer::new(q.item_id.clone(), q.spec.title(), value.clone()))
            })
            .collect();
        Ok(SubmissionEvent {
            form_id: form_id.to_string(),
            respondent_email: response.respondent_email,
            answers,
            submitted_at: response.submitted_at,
        })
    }

    async fn responses_since(&self, form_id: &str, since: DateTime<Utc>) -> AppResult<Vec<String>> {
        self.with_form(form_id, |_| ())?;
        Ok(lock(&self.responses)
            .iter()
            .filter(|(_, r)| r.form_id == form_id && r.submitted_at >= since)
            .map(|(id, _)| id.clone())
            .collect())
    }
}

// ========== 课堂 ==========

#[derive(Default)]
pub struct MemoryClassroom {
    courses: Vec<Course>,
    students: HashMap<String, Vec<ClassroomStudent>>,
    topics: Mutex<HashMap<String, Vec<Topic>>>,
    assignments: Mutex<Vec<(String, Assignment)>>,
    failing_assignment_titles: HashSet<String>,
    next_id: AtomicUsize,
}

impl MemoryClassroom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_course(mut self, id: &str, name: &str) -> Self {
        self.courses.push(Course {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_student(mut self, course_id: &str, full_name: &str, email: &str) -> Self {
        let list = self.students.entry(course_id.to_string()).or_default();
        let user_id = format!("user-{}", list.len() + 1);
        list.push(ClassroomStudent {
            user_id,
            full_name: full_name.to_string(),
            email: email.to_string(),
        });
        self
    }

    pub fn with_topic(self, course_id: &str, topic_id: &str, name: &str) -> Self {
        lock(&self.topics)
            .entry(course_id.to_string())
            .or_default()
            .push(Topic {
                topic_id: topic_id.to_string(),
                name: name.to_string(),
            });
        self
    }

    /// 让指定标题的作业创建失败
    pub fn failing_assignment(mut self, title: &str) -> Self {
        self.failing_assignment_titles.insert(title.to_string());
        self
    }

    pub fn assignments(&self) -> Vec<(String, Assignment)> {
        lock(&self.assignments).clone()
    }

    pub fn topics(&self, course_id: &str) -> Vec<Topic> {
        lock(&self.topics).get(course_id).cloned().unwrap_or_default()
    }

    fn ensure_course(&self, course_id: &str) -> AppResult<()> {
        if self.courses.iter().any(|c| c.id == course_id) {
            Ok(())
        } else {
            Err(AppError::not_found("classroom", format!("course {course_id}")))
        }
    }
}

impl Classroom for MemoryClassroom {
    async fn list_active_courses(&self) -> AppResult<Vec<Course>> {
        Ok(self.courses.clone())
    }

    async fn list_students(&self, course_id: &str) -> AppResult<Vec<ClassroomStudent>> {
        self.ensure_course(course_id)?;
        Ok(self.students.get(course_id).cloned().unwrap_or_default())
    }

    async fn get_student(
        &self,
        course_id: &str,
        user_key: &str,
    ) -> AppResult<Option<ClassroomStudent>> {
        self.ensure_course(course_id)?;
        Ok(self.students.get(course_id).and_then(|list| {
            list.iter()
                .find(|s| s.user_id == user_key || s.email == user_key)
                .cloned()
        }))
    }

    async fn list_topics(&self, course_id: &str) -> AppResult<Vec<Topic>> {
        self.ensure_course(course_id)?;
        Ok(self.topics(course_id))
    }

    async fn create_topic(&self, course_id: &str, name: &str) -> AppResult<Topic> {
        self.ensure_course(course_id)?;
        let topic = Topic {
            topic_id: format!("topic-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
            name: name.to_string(),
        };
        lock(&self.topics)
            .entry(course_id.to_string())
            .or_default()
            .push(topic.clone());
        Ok(topic)
    }

    async fn create_assignment(
        &self,
        course_id: &str,
        assignment: &Assignment,
    ) -> AppResult<CreatedAssignment> {
        self.ensure_course(course_id)?;
        if self.failing_assignment_titles.contains(&assignment.title) {
            return Err(AppError::Service(ServiceError::BadResponse {
                service: "classroom",
                endpoint: format!("courses/{course_id}/courseWork"),
                status: 400,
                message: "injected assignment failure".to_string(),
            }));
        }
        lock(&self.assignments).push((course_id.to_string(), assignment.clone()));
        Ok(CreatedAssignment {
            id: format!("work-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
            state: assignment.state(),
            scheduled_time: assignment.scheduled_time,
        })
    }
}

// ========== 文件存储 ==========

#[derive(Default)]
pub struct MemoryStorage {
    folders: Mutex<Vec<Folder>>,
    /// file id → folder id
    placements: Mutex<HashMap<String, String>>,
    fail_moves: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder(self, id: &str, name: &str) -> Self {
        lock(&self.folders).push(Folder {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn failing_moves(mut self) -> Self {
        self.fail_moves = true;
        self
    }

    pub fn folders(&self) -> Vec<Folder> {
        lock(&self.folders).clone()
    }

    pub fn folder_of(&self, file_id: &str) -> Option<String> {
        lock(&self.placements).get(file_id).cloned()
    }
}

impl FileStorage for MemoryStorage {
    async fn find_folder(&self, name: &str) -> AppResult<Option<Folder>> {
        Ok(lock(&self.folders).iter().find(|f| f.name == name).cloned())
    }

    async fn create_folder(&self, name: &str) -> AppResult<Folder> {
        let mut folders = lock(&self.folders);
        let folder = Folder {
            id: format!("folder-{}", folders.len() + 1),
            name: name.to_string(),
        };
        folders.push(folder.clone());
        Ok(folder)
    }

    async fn move_file(&self, file_id: &str, folder: &Folder) -> AppResult<()> {
        if self.fail_moves {
            return Err(AppError::Service(ServiceError::BadResponse {
                service: "drive",
                endpoint: format!("files/{file_id}"),
                status: 403,
                message: "injected move failure".to_string(),
            }));
        }
        lock(&self.placements).insert(file_id.to_string(), folder.id.clone());
        Ok(())
    }
}
